//! # liu-h264
//!
//! H.264/AVC 熵解码栈.
//!
//! 实现从 RBSP 字节流到语法元素的完整解码管线:
//!
//! ```text
//! 字节源 → RbspReader (去 emulation prevention 的比特流)
//!        → CabacDecoder (bin 流)
//!        → ctxidx/model + ContextTable (概率自适应)
//!        → residual (结构化系数容器)
//! ```
//!
//! 整条管线是严格串行的: 每个 bin 的解码都依赖上一个 bin 留下的
//! 位游标与上下文状态, 单个码流内不存在任何并行性. 并行解码多个
//! 独立 slice 时, 每个 slice 须持有自己独立的读取器/引擎/状态表.

pub mod cabac;
pub mod context;
pub mod ctxidx;
pub mod init_tables;
pub mod model;
pub mod rbsp;
pub mod residual;
pub mod syntax;

// 重导出常用类型
pub use cabac::{BinRead, CabacCtx, CabacDecoder};
pub use context::{ContextTable, SliceType};
pub use rbsp::RbspReader;
pub use residual::{MacroblockResidual, ResidualBlock, ResidualDimension};
