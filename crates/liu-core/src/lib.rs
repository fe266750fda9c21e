//! # liu-core
//!
//! Liu 熵解码栈核心库, 提供统一错误类型与比特流读取基础设施.
//!
//! 本 crate 是上层 H.264 熵解码 crate 的底层依赖, 不包含任何编解码语义.

pub mod bitreader;
pub mod error;

// 重导出常用类型
pub use bitreader::BitReader;
pub use error::{LiuError, LiuResult};
