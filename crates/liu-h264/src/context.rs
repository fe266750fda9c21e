//! CABAC 上下文状态表.
//!
//! 持有全部 1024 个上下文槽位 (帧编码实际使用 0..460), 负责
//! slice 级初始化和按 ctxIdx 的带边界检查访问. 状态本身的
//! 转移由算术解码引擎 ([`crate::cabac`]) 在每个 bin 上完成.

use liu_core::{LiuError, LiuResult};
use log::debug;

use crate::cabac::CabacCtx;
use crate::init_tables::{INIT_CTX_COUNT, INIT_I, INIT_PB};

/// 上下文槽位总数
pub const CTX_COUNT: usize = 1024;

/// end_of_slice_flag 专用上下文, 初始化为固定终止状态而不查表
pub const CTX_TERMINATE: usize = 276;

/// slice 类型, 决定初始化参数取哪一列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceType {
    P,
    B,
    I,
    Sp,
    Si,
}

impl SliceType {
    /// I/SI slice 不携带 cabac_init_idc, 使用固定列
    pub fn is_intra(self) -> bool {
        matches!(self, SliceType::I | SliceType::Si)
    }
}

/// 全部上下文变量及其初始化标记
pub struct ContextTable {
    ctx: [CabacCtx; CTX_COUNT],
    initialized: [bool; CTX_COUNT],
}

impl Default for ContextTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextTable {
    pub fn new() -> Self {
        ContextTable {
            ctx: [CabacCtx::default(); CTX_COUNT],
            initialized: [false; CTX_COUNT],
        }
    }

    /// 按 9.3.1.1 初始化单个上下文.
    ///
    /// 已初始化的槽位再次初始化是错误, 除非 `reinitialize` 为真
    /// (对应 slice 边界上的整表复位).
    pub fn initialize(
        &mut self,
        ctx_idx: usize,
        slice_qpy: i32,
        cabac_init_idc: u8,
        slice_type: SliceType,
        reinitialize: bool,
    ) -> LiuResult<()> {
        if ctx_idx >= INIT_CTX_COUNT {
            return Err(LiuError::InvalidArgument(format!(
                "ctxIdx {} 超出初始化表范围 0..{}",
                ctx_idx, INIT_CTX_COUNT
            )));
        }
        if self.initialized[ctx_idx] && !reinitialize {
            return Err(LiuError::ContextAlreadyInitialized(ctx_idx));
        }

        if ctx_idx == CTX_TERMINATE {
            // end_of_slice_flag 不参与自适应, 固定在最高确定度状态
            self.ctx[ctx_idx] = CabacCtx {
                p_state_idx: 63,
                val_mps: 0,
            };
            self.initialized[ctx_idx] = true;
            return Ok(());
        }

        let [m, n] = if slice_type.is_intra() {
            INIT_I[ctx_idx]
        } else {
            if cabac_init_idc > 2 {
                return Err(LiuError::InvalidArgument(format!(
                    "cabac_init_idc 必须在 0..=2, 实际为 {}",
                    cabac_init_idc
                )));
            }
            INIT_PB[cabac_init_idc as usize][ctx_idx]
        };

        let pre = clip3(1, 126, ((m as i32 * clip3(0, 51, slice_qpy)) >> 4) + n as i32);
        self.ctx[ctx_idx] = if pre <= 63 {
            CabacCtx {
                p_state_idx: (63 - pre) as u8,
                val_mps: 0,
            }
        } else {
            CabacCtx {
                p_state_idx: (pre - 64) as u8,
                val_mps: 1,
            }
        };
        self.initialized[ctx_idx] = true;
        Ok(())
    }

    /// slice 头解码后的整表初始化, 覆盖帧编码使用的全部 ctxIdx
    pub fn init_slice(
        &mut self,
        slice_qpy: i32,
        cabac_init_idc: u8,
        slice_type: SliceType,
    ) -> LiuResult<()> {
        for ctx_idx in 0..INIT_CTX_COUNT {
            self.initialize(ctx_idx, slice_qpy, cabac_init_idc, slice_type, true)?;
        }
        debug!(
            "上下文表初始化完成: slice_type={:?} qp={} idc={}",
            slice_type, slice_qpy, cabac_init_idc
        );
        Ok(())
    }

    pub fn is_initialized(&self, ctx_idx: usize) -> bool {
        ctx_idx < CTX_COUNT && self.initialized[ctx_idx]
    }

    /// 读取上下文状态, ctxIdx 越界返回错误而不是 panic
    pub fn ctx(&self, ctx_idx: usize) -> LiuResult<&CabacCtx> {
        self.ctx
            .get(ctx_idx)
            .ok_or_else(|| LiuError::InvalidArgument(format!("ctxIdx {} 越界", ctx_idx)))
    }

    pub fn ctx_mut(&mut self, ctx_idx: usize) -> LiuResult<&mut CabacCtx> {
        self.ctx
            .get_mut(ctx_idx)
            .ok_or_else(|| LiuError::InvalidArgument(format!("ctxIdx {} 越界", ctx_idx)))
    }
}

pub(crate) fn clip3(low: i32, high: i32, x: i32) -> i32 {
    x.clamp(low, high)
}
