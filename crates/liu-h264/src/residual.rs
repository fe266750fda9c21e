//! 残差块解码.
//!
//! 单个块的解码顺序: coded_block_flag (可被上层推断而跳过) →
//! significant / last_significant 交织扫描 (最后一个位置隐含显著)
//! → 逆扫描序的 coeff_abs_level_minus1 (截断一元前缀到 14, 超出
//! 走 UEG0 旁路后缀) → 旁路符号位. 系数落入带维度标签的
//! [`ResidualBlock`], 宏块级集合由 [`MacroblockResidual`] 持有.

use liu_core::{LiuError, LiuResult};
use log::trace;

use crate::cabac::BinRead;
use crate::context::ContextTable;
use crate::ctxidx;

/// 截断一元前缀的上限, 之后转 UEG0 后缀
const LEVEL_PREFIX_CAP: u32 = 14;

/// 8x8 亮度块 (类别 5) 帧扫描位置到 significant ctxIdxInc 的映射
const SIG_INC_8X8_FRAME: [u8; 63] = [
    0, 1, 2, 3, 4, 5, 5, 4, 4, 3, 3, 4, 4, 4, 5, 5, 4, 4, 4, 4, 3, 3, 6, 7, 7, 7, 8, 9, 10, 9, 8,
    7, 7, 6, 11, 12, 13, 11, 6, 7, 8, 9, 14, 10, 9, 8, 6, 11, 12, 13, 11, 6, 9, 14, 10, 9, 11, 12,
    13, 11, 14, 10, 12,
];

/// 8x8 亮度块帧扫描位置到 last_significant ctxIdxInc 的映射
const LAST_INC_8X8_FRAME: [u8; 63] = [
    0, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2,
    2, 3, 3, 3, 3, 3, 3, 3, 3, 4, 4, 4, 4, 4, 4, 4, 4, 5, 5, 5, 5, 6, 6, 6, 6, 7, 7, 7, 7, 8, 8,
    8,
];

/// 系数容器的维度标签, 决定 2D/3D 视图的形状
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResidualDimension {
    /// Intra16x16 亮度 DC, 4x4
    LumaDc,
    /// Intra16x16 亮度 AC, 15 个系数 (无矩形视图)
    LumaAc,
    /// 普通 4x4 亮度块
    Luma4x4,
    /// 8x8 亮度块
    Luma8x8,
    /// 色度 DC (4:2:0), 2x2
    ChromaDc,
    /// 色度 AC, 15 个系数 (无矩形视图)
    ChromaAc,
}

impl ResidualDimension {
    /// (平面数, 行数, 列数); AC 块不是矩形, 返回 None
    pub fn shape(self) -> Option<(usize, usize, usize)> {
        match self {
            ResidualDimension::LumaDc | ResidualDimension::Luma4x4 => Some((1, 4, 4)),
            ResidualDimension::Luma8x8 => Some((1, 8, 8)),
            ResidualDimension::ChromaDc => Some((1, 2, 2)),
            ResidualDimension::LumaAc | ResidualDimension::ChromaAc => None,
        }
    }
}

/// 块类别: ctxBlockCat 编号, 系数上限与维度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockCat {
    pub id: usize,
    pub max_coeff: usize,
    pub dimension: ResidualDimension,
}

pub const CAT_LUMA_DC: BlockCat = BlockCat {
    id: 0,
    max_coeff: 16,
    dimension: ResidualDimension::LumaDc,
};
pub const CAT_LUMA_AC: BlockCat = BlockCat {
    id: 1,
    max_coeff: 15,
    dimension: ResidualDimension::LumaAc,
};
pub const CAT_LUMA_4X4: BlockCat = BlockCat {
    id: 2,
    max_coeff: 16,
    dimension: ResidualDimension::Luma4x4,
};
pub const CAT_CHROMA_DC: BlockCat = BlockCat {
    id: 3,
    max_coeff: 4,
    dimension: ResidualDimension::ChromaDc,
};
pub const CAT_CHROMA_AC: BlockCat = BlockCat {
    id: 4,
    max_coeff: 15,
    dimension: ResidualDimension::ChromaAc,
};
pub const CAT_LUMA_8X8: BlockCat = BlockCat {
    id: 5,
    max_coeff: 64,
    dimension: ResidualDimension::Luma8x8,
};

impl BlockCat {
    pub fn from_id(id: usize) -> LiuResult<BlockCat> {
        match id {
            0 => Ok(CAT_LUMA_DC),
            1 => Ok(CAT_LUMA_AC),
            2 => Ok(CAT_LUMA_4X4),
            3 => Ok(CAT_CHROMA_DC),
            4 => Ok(CAT_CHROMA_AC),
            5 => Ok(CAT_LUMA_8X8),
            _ => Err(LiuError::InvalidBlockCategory(id)),
        }
    }
}

/// 一个残差块的系数, 定长存储加维度标签
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResidualBlock {
    dimension: ResidualDimension,
    len: usize,
    coeffs: [i32; 64],
}

impl ResidualBlock {
    pub fn zeroed(dimension: ResidualDimension, len: usize) -> Self {
        debug_assert!(len <= 64);
        ResidualBlock {
            dimension,
            len,
            coeffs: [0; 64],
        }
    }

    pub fn dimension(&self) -> ResidualDimension {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 一维视图
    pub fn as_slice(&self) -> &[i32] {
        &self.coeffs[..self.len]
    }

    pub fn coeff(&self, idx: usize) -> LiuResult<i32> {
        self.as_slice()
            .get(idx)
            .copied()
            .ok_or_else(|| LiuError::InvalidArgument(format!("系数下标 {} 越界", idx)))
    }

    fn rect(&self) -> LiuResult<(usize, usize, usize)> {
        self.dimension.shape().ok_or_else(|| {
            LiuError::InvalidArgument(format!("{:?} 不是矩形块, 没有 2D/3D 视图", self.dimension))
        })
    }

    /// 二维行视图, 不复制数据
    pub fn rows(&self) -> LiuResult<std::slice::ChunksExact<'_, i32>> {
        let (_, _, w) = self.rect()?;
        Ok(self.as_slice().chunks_exact(w))
    }

    /// 三维视图: 外层按平面, 内层按行
    pub fn planes(
        &self,
    ) -> LiuResult<impl Iterator<Item = std::slice::ChunksExact<'_, i32>>> {
        let (_, h, w) = self.rect()?;
        Ok(self
            .as_slice()
            .chunks_exact(h * w)
            .map(move |plane| plane.chunks_exact(w)))
    }
}

fn sig_ctx_inc(cat: BlockCat, idx: usize) -> usize {
    match cat.id {
        5 => SIG_INC_8X8_FRAME[idx] as usize,
        // 4:2:0 色度 DC 的增量封顶在 2
        3 => idx.min(2),
        _ => idx,
    }
}

fn last_ctx_inc(cat: BlockCat, idx: usize) -> usize {
    match cat.id {
        5 => LAST_INC_8X8_FRAME[idx] as usize,
        3 => idx.min(2),
        _ => idx,
    }
}

/// 截断一元前缀满 14 个 1 之后的 UEG0 旁路后缀
fn ueg0_suffix<B: BinRead>(bins: &mut B) -> LiuResult<u32> {
    let mut value = 0u32;
    let mut k = 0u32;
    while bins.decode_bypass()? == 1 {
        value += 1 << k;
        k += 1;
        if k > 30 {
            return Err(LiuError::InvalidData("UEG0 后缀指数部分过长".to_string()));
        }
    }
    let mut tail = 0u32;
    for _ in 0..k {
        tail = (tail << 1) | bins.decode_bypass()?;
    }
    Ok(value + tail)
}

/// 单个系数的 coeff_abs_level_minus1.
///
/// bin 0 的增量由已解码的 |level|==1 计数决定, 后续 bin 由
/// |level|>1 计数决定 (9.3.3.1.3).
fn abs_level_first_inc(num_eq1: u32, num_gt1: u32) -> usize {
    if num_gt1 > 0 {
        0
    } else {
        (1 + num_eq1).min(4) as usize
    }
}

fn abs_level_rest_inc(cat: BlockCat, num_gt1: u32) -> usize {
    // 色度 DC 的上限是 3 而不是 4 (9.3.3.1.3)
    let cap = if cat.id == 3 { 3 } else { 4 };
    5 + num_gt1.min(cap) as usize
}

fn decode_abs_level_minus1<B: BinRead>(
    bins: &mut B,
    table: &mut ContextTable,
    cat: BlockCat,
    num_eq1: u32,
    num_gt1: u32,
) -> LiuResult<u32> {
    let base = ctxidx::coeff_abs_level_minus1(cat.id)?;
    let ctx_first = base + abs_level_first_inc(num_eq1, num_gt1);
    let ctx_rest = base + abs_level_rest_inc(cat, num_gt1);

    let mut prefix = 0u32;
    while prefix < LEVEL_PREFIX_CAP {
        let ctx_idx = if prefix == 0 { ctx_first } else { ctx_rest };
        if bins.decode_decision(table.ctx_mut(ctx_idx)?)? == 0 {
            return Ok(prefix);
        }
        prefix += 1;
    }
    Ok(LEVEL_PREFIX_CAP + ueg0_suffix(bins)?)
}

/// 解码一个残差块.
///
/// `cbf_inc` 是相邻块条件给出的 coded_block_flag 增量 (0..=3);
/// 对不编码 coded_block_flag 的类别 (8x8 亮度), `cbf_inferred`
/// 给出上层从 coded_block_pattern 推断的取值.
pub fn decode_block<B: BinRead>(
    bins: &mut B,
    table: &mut ContextTable,
    cat: BlockCat,
    cbf_inc: u32,
    cbf_inferred: bool,
) -> LiuResult<ResidualBlock> {
    if cbf_inc > 3 {
        return Err(LiuError::InvalidArgument(format!(
            "coded_block_flag 增量 {} 越界",
            cbf_inc
        )));
    }

    let cbf = match ctxidx::coded_block_flag(cat.id)? {
        Some(base) => bins.decode_decision(table.ctx_mut(base + cbf_inc as usize)?)? == 1,
        None => cbf_inferred,
    };

    let mut block = ResidualBlock::zeroed(cat.dimension, cat.max_coeff);
    if !cbf {
        trace!("残差块类别 {} 无系数", cat.id);
        return Ok(block);
    }

    let sig_base = ctxidx::significant_coeff_flag(cat.id)?;
    let last_base = ctxidx::last_significant_coeff_flag(cat.id)?;

    // 交织扫描: 最后一个扫描位置不读显著标记, 隐含显著
    let mut significant = [false; 64];
    let mut num_coeff = cat.max_coeff;
    let mut i = 0;
    while i < num_coeff - 1 {
        if bins.decode_decision(table.ctx_mut(sig_base + sig_ctx_inc(cat, i))?)? == 1 {
            significant[i] = true;
            if bins.decode_decision(table.ctx_mut(last_base + last_ctx_inc(cat, i))?)? == 1 {
                num_coeff = i + 1;
            }
        }
        i += 1;
    }
    significant[num_coeff - 1] = true;

    // 逆扫描序解码幅值与符号
    let mut num_eq1 = 0u32;
    let mut num_gt1 = 0u32;
    for idx in (0..num_coeff).rev() {
        if !significant[idx] {
            continue;
        }
        let minus1 = decode_abs_level_minus1(bins, table, cat, num_eq1, num_gt1)?;
        let sign = bins.decode_bypass()?;
        let abs = minus1 + 1;
        if abs == 1 {
            num_eq1 += 1;
        } else {
            num_gt1 += 1;
        }
        block.coeffs[idx] = if sign == 1 { -(abs as i32) } else { abs as i32 };
    }

    trace!(
        "残差块类别 {} 解码完成: numCoeff={} eq1={} gt1={}",
        cat.id, num_coeff, num_eq1, num_gt1
    );
    Ok(block)
}

/// 一个宏块的全部残差块. 访问尚未填入的块返回
/// [`LiuError::MissingResidualBlock`].
#[derive(Debug, Default)]
pub struct MacroblockResidual {
    luma_dc: Option<ResidualBlock>,
    luma_ac: [Option<ResidualBlock>; 16],
    luma_4x4: [Option<ResidualBlock>; 16],
    luma_8x8: [Option<ResidualBlock>; 4],
    chroma_dc: [Option<ResidualBlock>; 2],
    chroma_ac: [[Option<ResidualBlock>; 8]; 2],
}

fn slot<'a, const N: usize>(
    arr: &'a [Option<ResidualBlock>; N],
    idx: usize,
    what: &str,
) -> LiuResult<&'a ResidualBlock> {
    arr.get(idx)
        .ok_or_else(|| LiuError::InvalidArgument(format!("{} 下标 {} 越界", what, idx)))?
        .as_ref()
        .ok_or(LiuError::MissingResidualBlock)
}

impl MacroblockResidual {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_luma_dc(&mut self, block: ResidualBlock) {
        self.luma_dc = Some(block);
    }

    pub fn luma_dc(&self) -> LiuResult<&ResidualBlock> {
        self.luma_dc.as_ref().ok_or(LiuError::MissingResidualBlock)
    }

    pub fn set_luma_ac(&mut self, idx: usize, block: ResidualBlock) -> LiuResult<()> {
        *checked_slot_mut(&mut self.luma_ac, idx, "亮度 AC 块")? = Some(block);
        Ok(())
    }

    pub fn luma_ac(&self, idx: usize) -> LiuResult<&ResidualBlock> {
        slot(&self.luma_ac, idx, "亮度 AC 块")
    }

    pub fn set_luma_4x4(&mut self, idx: usize, block: ResidualBlock) -> LiuResult<()> {
        *checked_slot_mut(&mut self.luma_4x4, idx, "亮度 4x4 块")? = Some(block);
        Ok(())
    }

    pub fn luma_4x4(&self, idx: usize) -> LiuResult<&ResidualBlock> {
        slot(&self.luma_4x4, idx, "亮度 4x4 块")
    }

    pub fn set_luma_8x8(&mut self, idx: usize, block: ResidualBlock) -> LiuResult<()> {
        *checked_slot_mut(&mut self.luma_8x8, idx, "亮度 8x8 块")? = Some(block);
        Ok(())
    }

    pub fn luma_8x8(&self, idx: usize) -> LiuResult<&ResidualBlock> {
        slot(&self.luma_8x8, idx, "亮度 8x8 块")
    }

    pub fn set_chroma_dc(&mut self, icbcr: usize, block: ResidualBlock) -> LiuResult<()> {
        *checked_slot_mut(&mut self.chroma_dc, icbcr, "色度 DC 块")? = Some(block);
        Ok(())
    }

    pub fn chroma_dc(&self, icbcr: usize) -> LiuResult<&ResidualBlock> {
        slot(&self.chroma_dc, icbcr, "色度 DC 块")
    }

    pub fn set_chroma_ac(
        &mut self,
        icbcr: usize,
        idx: usize,
        block: ResidualBlock,
    ) -> LiuResult<()> {
        let plane = self.chroma_ac.get_mut(icbcr).ok_or_else(|| {
            LiuError::InvalidArgument(format!("色度分量下标 {} 越界", icbcr))
        })?;
        *checked_slot_mut(plane, idx, "色度 AC 块")? = Some(block);
        Ok(())
    }

    pub fn chroma_ac(&self, icbcr: usize, idx: usize) -> LiuResult<&ResidualBlock> {
        let plane = self.chroma_ac.get(icbcr).ok_or_else(|| {
            LiuError::InvalidArgument(format!("色度分量下标 {} 越界", icbcr))
        })?;
        slot(plane, idx, "色度 AC 块")
    }
}

fn checked_slot_mut<'a, const N: usize>(
    arr: &'a mut [Option<ResidualBlock>; N],
    idx: usize,
    what: &str,
) -> LiuResult<&'a mut Option<ResidualBlock>> {
    arr.get_mut(idx)
        .ok_or_else(|| LiuError::InvalidArgument(format!("{} 下标 {} 越界", what, idx)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SliceType;
    use std::collections::VecDeque;

    /// 按脚本回放 bin 的解码源, 用来绕过真实算术编码构造用例
    struct ScriptedBins {
        decisions: VecDeque<u32>,
        bypass: VecDeque<u32>,
    }

    impl ScriptedBins {
        fn new(decisions: &[u32], bypass: &[u32]) -> Self {
            ScriptedBins {
                decisions: decisions.iter().copied().collect(),
                bypass: bypass.iter().copied().collect(),
            }
        }

        fn exhausted(&self) -> bool {
            self.decisions.is_empty() && self.bypass.is_empty()
        }
    }

    impl BinRead for ScriptedBins {
        fn decode_decision(&mut self, _ctx: &mut crate::cabac::CabacCtx) -> LiuResult<u32> {
            self.decisions
                .pop_front()
                .ok_or(LiuError::UnexpectedEndOfStream)
        }

        fn decode_bypass(&mut self) -> LiuResult<u32> {
            self.bypass
                .pop_front()
                .ok_or(LiuError::UnexpectedEndOfStream)
        }

        fn decode_terminate(&mut self) -> LiuResult<u32> {
            Ok(0)
        }
    }

    fn ctx_table() -> ContextTable {
        let mut table = ContextTable::new();
        table.init_slice(26, 0, SliceType::I).unwrap();
        table
    }

    #[test]
    fn test_two_coefficient_scan() {
        // cbf=1; 位置 0 显著非末尾, 位置 1 不显著, 位置 2 显著且
        // 为末尾 => 恰好两个非零系数.
        // 逆序幅值: 位置 2 前缀 0 => |1|, 符号 0; 位置 0 前缀 110
        // => |3|, 符号 1.
        let mut bins = ScriptedBins::new(&[1, 1, 0, 0, 1, 1, 0, 1, 1, 0], &[0, 1]);
        let mut table = ctx_table();
        let block = decode_block(&mut bins, &mut table, CAT_CHROMA_DC, 0, false).unwrap();
        assert_eq!(block.as_slice(), &[-3, 0, 1, 0]);
        assert!(bins.exhausted());
    }

    #[test]
    fn test_cbf_zero_yields_empty_block() {
        let mut bins = ScriptedBins::new(&[0], &[]);
        let mut table = ctx_table();
        let block = decode_block(&mut bins, &mut table, CAT_LUMA_4X4, 0, false).unwrap();
        assert_eq!(block.as_slice(), &[0; 16]);
        assert!(bins.exhausted());
    }

    #[test]
    fn test_last_position_implied_significant() {
        // 16 个位置全扫完都不显著 => 最后一个位置隐含显著
        let mut decisions = vec![1];
        decisions.extend(std::iter::repeat_n(0, 15)); // sig 0..14 全 0
        decisions.push(0); // 末位幅值前缀 0 => |1|
        let mut bins = ScriptedBins::new(&decisions, &[0]);
        let mut table = ctx_table();
        let block = decode_block(&mut bins, &mut table, CAT_LUMA_4X4, 0, false).unwrap();
        let mut expected = [0i32; 16];
        expected[15] = 1;
        assert_eq!(block.as_slice(), &expected);
        assert!(bins.exhausted());
    }

    #[test]
    fn test_level_escape_to_ueg0_suffix() {
        // 单系数块 (色度 DC 位置 0 即末尾): 前缀 14 个 1 后转
        // UEG0 后缀 10 + 1 位尾巴 1 => 后缀值 2, 幅值 14+2+1=17
        let mut decisions = vec![1, 1, 1]; // cbf, sig0, last0
        decisions.extend(std::iter::repeat_n(1, 14));
        let mut bins = ScriptedBins::new(&decisions, &[1, 0, 1, 0]);
        let mut table = ctx_table();
        let block = decode_block(&mut bins, &mut table, CAT_CHROMA_DC, 0, false).unwrap();
        assert_eq!(block.coeff(0).unwrap(), 17);
        assert!(bins.exhausted());
    }

    #[test]
    fn test_inferred_cbf_for_luma_8x8() {
        // 类别 5 不读 coded_block_flag, 直接用推断值
        let mut decisions = Vec::new();
        decisions.extend(std::iter::repeat_n(0, 63)); // sig 0..62 全 0
        decisions.push(0); // 隐含末位的幅值前缀
        let mut bins = ScriptedBins::new(&decisions, &[1]);
        let mut table = ctx_table();
        let block = decode_block(&mut bins, &mut table, CAT_LUMA_8X8, 0, true).unwrap();
        assert_eq!(block.coeff(63).unwrap(), -1);
        assert!(bins.exhausted());

        // 推断为假则一个 bin 都不消费
        let mut bins = ScriptedBins::new(&[], &[]);
        let block = decode_block(&mut bins, &mut table, CAT_LUMA_8X8, 0, false).unwrap();
        assert_eq!(block.as_slice(), &[0; 64]);
    }

    #[test]
    fn test_block_views() {
        let mut block = ResidualBlock::zeroed(ResidualDimension::Luma4x4, 16);
        for (i, c) in block.coeffs.iter_mut().take(16).enumerate() {
            *c = i as i32;
        }
        assert_eq!(block.as_slice().len(), 16);
        let rows: Vec<&[i32]> = block.rows().unwrap().collect();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[1], &[4, 5, 6, 7]);
        let planes: Vec<_> = block.planes().unwrap().collect();
        assert_eq!(planes.len(), 1);

        // AC 块不是矩形, 视图不可用
        let ac = ResidualBlock::zeroed(ResidualDimension::ChromaAc, 15);
        assert!(ac.rows().is_err());
        assert!(ac.planes().is_err());
        assert!(ac.coeff(15).is_err());
    }

    #[test]
    fn test_macroblock_residual_missing_block() {
        let mut mbr = MacroblockResidual::new();
        assert!(matches!(
            mbr.luma_dc().unwrap_err(),
            LiuError::MissingResidualBlock
        ));
        assert!(matches!(
            mbr.chroma_ac(1, 3).unwrap_err(),
            LiuError::MissingResidualBlock
        ));

        mbr.set_luma_dc(ResidualBlock::zeroed(ResidualDimension::LumaDc, 16));
        assert!(mbr.luma_dc().is_ok());

        mbr.set_luma_4x4(3, ResidualBlock::zeroed(ResidualDimension::Luma4x4, 16))
            .unwrap();
        assert!(mbr.luma_4x4(3).is_ok());
        assert!(matches!(
            mbr.luma_4x4(4).unwrap_err(),
            LiuError::MissingResidualBlock
        ));
        assert!(mbr.set_luma_4x4(16, ResidualBlock::zeroed(ResidualDimension::Luma4x4, 16))
            .is_err());
        assert!(mbr.chroma_dc(2).is_err());
    }

    #[test]
    fn test_abs_level_ctx_increments() {
        // bin 0: 出现过 >1 的幅值后固定 0, 否则由 ==1 计数决定
        assert_eq!(abs_level_first_inc(0, 0), 1);
        assert_eq!(abs_level_first_inc(2, 0), 3);
        assert_eq!(abs_level_first_inc(9, 0), 4);
        assert_eq!(abs_level_first_inc(9, 1), 0);
        // 后续 bin: >1 计数封顶 4, 色度 DC 封顶 3
        assert_eq!(abs_level_rest_inc(CAT_LUMA_4X4, 2), 7);
        assert_eq!(abs_level_rest_inc(CAT_LUMA_4X4, 9), 9);
        assert_eq!(abs_level_rest_inc(CAT_CHROMA_DC, 9), 8);
        assert_eq!(abs_level_rest_inc(CAT_CHROMA_DC, 2), 7);
    }

    #[test]
    fn test_invalid_category_and_inc() {
        let mut bins = ScriptedBins::new(&[], &[]);
        let mut table = ctx_table();
        assert!(matches!(
            BlockCat::from_id(6).unwrap_err(),
            LiuError::InvalidBlockCategory(6)
        ));
        assert!(decode_block(&mut bins, &mut table, CAT_LUMA_DC, 4, false).is_err());
    }
}
