//! # Liu (流)
//!
//! 纯 Rust 实现的 H.264 熵解码栈.
//!
//! Liu 实现了 H.264/AVC 比特流到语法元素的解码管线:
//! - **RBSP 读取**: 透明移除 emulation prevention 字节的比特流读取器
//! - **CABAC 算术解码**: range/offset 双寄存器状态机与重归一化
//! - **上下文建模**: ctxIdx 推导 (闭式函数 + 组合子 DSL) 与上下文状态表
//! - **残差解码**: coded_block_flag / 显著性扫描 / 系数幅值的完整残差块解码
//!
//! # 快速开始
//!
//! ```rust
//! use liu::h264::rbsp::RbspReader;
//!
//! // 码流中的 00 00 03 序列会被透明还原为 00 00
//! let data = [0x00, 0x00, 0x03, 0xAB];
//! let mut reader = RbspReader::new(&data);
//! assert_eq!(reader.read_bits(16).unwrap(), 0x0000);
//! assert_eq!(reader.read_bits(8).unwrap(), 0xAB);
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `liu-core` | 错误类型与比特流基础设施 |
//! | `liu-h264` | H.264 熵解码 (RBSP, CABAC, 上下文模型, 残差) |

/// 核心类型与比特流工具
pub use liu_core as core;

/// H.264 熵解码栈
pub use liu_h264 as h264;

/// 获取 Liu 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
