//! 基于引擎和上下文表的语法元素解码.
//!
//! 这里只覆盖熵解码层自洽的元素: mb_qp_delta 和 I slice 的
//! mb_type (含 I_PCM 的 decode_terminate 逃逸). 相邻块条件由
//! 调用方给出.

use liu_core::{LiuError, LiuResult};

use crate::cabac::BinRead;
use crate::context::ContextTable;

/// I slice mb_type 的 ctxIdxOffset
pub(crate) const MB_TYPE_I_OFFSET: usize = 3;

/// mb_qp_delta 的 ctxIdxOffset
const MB_QP_DELTA_OFFSET: usize = 60;

pub const MB_TYPE_I_NXN: u32 = 0;
pub const MB_TYPE_I_PCM: u32 = 25;

/// mb_qp_delta: 一元码映射回带符号值.
///
/// `prev_nonzero` 是同 slice 内上一个宏块的 mb_qp_delta 是否非零,
/// 决定第一个 bin 的上下文.
pub fn decode_mb_qp_delta<B: BinRead>(
    bins: &mut B,
    table: &mut ContextTable,
    prev_nonzero: bool,
) -> LiuResult<i32> {
    let mut k = 0u32;
    loop {
        let ctx_idx = match k {
            0 => MB_QP_DELTA_OFFSET + usize::from(prev_nonzero),
            1 => MB_QP_DELTA_OFFSET + 2,
            _ => MB_QP_DELTA_OFFSET + 3,
        };
        if bins.decode_decision(table.ctx_mut(ctx_idx)?)? == 0 {
            break;
        }
        k += 1;
        // QP 范围限定了映射值的上界
        if k > 52 {
            return Err(LiuError::InvalidData(format!("mb_qp_delta 一元码过长: {}", k)));
        }
    }
    // 奇数码字为正, 偶数为负
    Ok(if k % 2 == 1 {
        (k as i32 + 1) / 2
    } else {
        -((k / 2) as i32)
    })
}

/// I slice 的 mb_type.
///
/// 第一个 bin 区分 I_NxN 与其余类型; 之后一个 decode_terminate
/// bin 标记 I_PCM; 其余情况继续解出 I_16x16 的 cbp 与预测模式
/// 后缀. `l` / `t` 是左邻与上邻的条件标记.
pub fn decode_intra_mb_type<B: BinRead>(
    bins: &mut B,
    table: &mut ContextTable,
    l: u32,
    t: u32,
) -> LiuResult<u32> {
    if l > 1 || t > 1 {
        return Err(LiuError::InvalidArgument(format!(
            "相邻条件标记越界: l={} t={}",
            l, t
        )));
    }
    let first = MB_TYPE_I_OFFSET + (l + t) as usize;
    if bins.decode_decision(table.ctx_mut(first)?)? == 0 {
        return Ok(MB_TYPE_I_NXN);
    }
    if bins.decode_terminate()? == 1 {
        return Ok(MB_TYPE_I_PCM);
    }

    // I_16x16 后缀: cbp_luma 1 bin, cbp_chroma 1-2 bin, 预测模式 2 bin
    let cbp_luma = bins.decode_decision(table.ctx_mut(MB_TYPE_I_OFFSET + 3)?)?;
    let cbp_chroma = if bins.decode_decision(table.ctx_mut(MB_TYPE_I_OFFSET + 4)?)? == 0 {
        0
    } else {
        1 + bins.decode_decision(table.ctx_mut(MB_TYPE_I_OFFSET + 5)?)?
    };
    let pred_hi = bins.decode_decision(table.ctx_mut(MB_TYPE_I_OFFSET + 6)?)?;
    let pred_lo = bins.decode_decision(table.ctx_mut(MB_TYPE_I_OFFSET + 7)?)?;
    let pred_mode = (pred_hi << 1) | pred_lo;

    Ok(1 + pred_mode + 4 * cbp_chroma + 12 * cbp_luma)
}
