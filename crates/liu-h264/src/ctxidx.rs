//! 语法元素到 ctxIdx 的闭式映射.
//!
//! 每个语法元素的 ctxIdx = 基准偏移 + ctxIdxInc, 其中 ctxIdxInc
//! 由相邻块条件 (左/上) 或块类别决定. 这里只做索引代数, 不访问
//! 上下文状态; 与 [`crate::model`] 中的组合子表在公共路径上一致.

use liu_core::{LiuError, LiuResult};

/// ctxBlockCat 的数量 (0-4 为 4x4 语法, 5 为 8x8 亮度)
pub const BLOCK_CAT_COUNT: usize = 6;

/// coded_block_flag 基准 85 上的类别偏移 (类别 0..5)
pub const CBF_CAT_OFFSET: [usize; 5] = [0, 4, 8, 12, 16];

/// significant / last_significant 基准 (105 / 166) 上的类别偏移
pub const SIG_CAT_OFFSET: [usize; 5] = [0, 15, 29, 44, 47];

/// coeff_abs_level_minus1 基准 227 上的类别偏移
pub const ABS_CAT_OFFSET: [usize; 5] = [0, 10, 20, 30, 39];

/// 8x8 亮度块 (类别 5) 的专用区段
pub const SIG_8X8_BASE: usize = 402;
pub const LAST_8X8_BASE: usize = 417;
pub const ABS_8X8_BASE: usize = 426;

/// `l` / `t` 是左邻与上邻的条件标记 (0 或 1)
pub fn mb_type(l: u32, t: u32) -> usize {
    debug_assert!(l <= 1 && t <= 1);
    27 + (l + t) as usize
}

pub fn mb_skip_flag(l: u32, t: u32) -> usize {
    debug_assert!(l <= 1 && t <= 1);
    11 + (l + t) as usize
}

pub fn sub_mb_type() -> usize {
    21
}

pub fn mvd() -> usize {
    40
}

pub fn ref_idx(l: u32, t: u32) -> usize {
    debug_assert!(l <= 1 && t <= 1);
    54 + (l + t) as usize
}

/// `inc` 为 bin 序号相关的增量 (0..=3)
pub fn mb_qp_delta(inc: u32) -> usize {
    debug_assert!(inc <= 3);
    60 + inc as usize
}

pub fn intra_chroma_pred_mode(l: u32, t: u32) -> usize {
    debug_assert!(l <= 1 && t <= 1);
    64 + (l + t) as usize
}

pub fn prev_intra4x4_pred_mode_flag() -> usize {
    68
}

pub fn rem_intra4x4_pred_mode() -> usize {
    69
}

/// 前 4 个 bin 用 73 区段, 色度部分用 77 区段
pub fn coded_block_pattern(chroma_part: bool) -> usize {
    if chroma_part { 77 } else { 73 }
}

pub fn end_of_slice_flag() -> usize {
    276
}

pub fn transform_size_8x8_flag(l: u32, t: u32) -> usize {
    debug_assert!(l <= 1 && t <= 1);
    399 + (l + t) as usize
}

fn check_cat(block_cat: usize) -> LiuResult<()> {
    if block_cat >= BLOCK_CAT_COUNT {
        return Err(LiuError::InvalidBlockCategory(block_cat));
    }
    Ok(())
}

/// 类别 5 (8x8 亮度) 的 coded_block_flag 不编码, 返回 None
pub fn coded_block_flag(block_cat: usize) -> LiuResult<Option<usize>> {
    check_cat(block_cat)?;
    if block_cat == 5 {
        return Ok(None);
    }
    Ok(Some(85 + CBF_CAT_OFFSET[block_cat]))
}

pub fn significant_coeff_flag(block_cat: usize) -> LiuResult<usize> {
    check_cat(block_cat)?;
    if block_cat == 5 {
        return Ok(SIG_8X8_BASE);
    }
    Ok(105 + SIG_CAT_OFFSET[block_cat])
}

pub fn last_significant_coeff_flag(block_cat: usize) -> LiuResult<usize> {
    check_cat(block_cat)?;
    if block_cat == 5 {
        return Ok(LAST_8X8_BASE);
    }
    Ok(166 + SIG_CAT_OFFSET[block_cat])
}

pub fn coeff_abs_level_minus1(block_cat: usize) -> LiuResult<usize> {
    check_cat(block_cat)?;
    if block_cat == 5 {
        return Ok(ABS_8X8_BASE);
    }
    Ok(227 + ABS_CAT_OFFSET[block_cat])
}
