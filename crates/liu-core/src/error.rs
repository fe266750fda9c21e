//! 统一错误类型定义.
//!
//! 所有 Liu crate 共用的错误类型, 支持跨模块传播.
//!
//! 熵解码的错误全部是致命的: CABAC 状态依赖于此前解码的每一个 bin,
//! 出错后当前 slice 无法恢复, 只能由外层在下一个起始码处重新同步.

use thiserror::Error;

/// Liu 统一错误类型
#[derive(Debug, Error)]
pub enum LiuError {
    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 码流在读取中途耗尽
    #[error("码流提前结束")]
    UnexpectedEndOfStream,

    /// Exp-Golomb 编码损坏 (前导零超过上限仍未出现终止位)
    #[error("Exp-Golomb 编码损坏: 前导零超过上限")]
    MalformedExpGolomb,

    /// 算术解码重归一化时码流位不足
    #[error("算术解码重归一化时码流位不足")]
    ArithmeticUnderflow,

    /// 上下文变量重复初始化 (slice 起始序列的调用顺序错误)
    #[error("上下文 {0} 已初始化, 禁止重复初始化")]
    ContextAlreadyInitialized(usize),

    /// 残差块尚未解码即被访问 (调用方时序错误)
    #[error("残差块尚未解码或未附加")]
    MissingResidualBlock,

    /// 块类别超出标准定义范围 (调用方错误)
    #[error("无效的残差块类别: {0}")]
    InvalidBlockCategory(usize),

    /// 无效数据 (损坏的码流等)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// 内部错误 (不应发生)
    #[error("内部错误: {0}")]
    Internal(String),
}

/// Liu 统一 Result 类型
pub type LiuResult<T> = Result<T, LiuError>;
