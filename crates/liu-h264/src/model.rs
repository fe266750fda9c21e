//! 上下文索引组合子模型.
//!
//! 用一组小的组合子 (`i` / `a` / `r` / `b` / `n`) 把标准里按语法
//! 元素排布的 ctxIdxOffset / maxBinIdxCtx 表写成声明式常量, 再由
//! [`assignment`] 按 (语法元素, slice 类型, 块类别) 查出记录.
//! 在公共路径上与 [`crate::ctxidx`] 的闭式函数一致, 测试里互相校验.

use liu_core::{LiuError, LiuResult};

use crate::context::SliceType;

/// 前缀/后缀 ctxIdx 基准值.
///
/// `has_suffix` 为假表示该元素的二值化没有独立后缀区段;
/// `uses_bypass` 为真表示后缀 bin 走旁路解码.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CtxIdxValue {
    pub prefix: u32,
    pub suffix: u32,
    pub has_suffix: bool,
    pub uses_bypass: bool,
}

/// 单值: 前后缀共用一个基准
pub const fn i(c: u32) -> CtxIdxValue {
    CtxIdxValue {
        prefix: c,
        suffix: c,
        has_suffix: false,
        uses_bypass: false,
    }
}

/// 前缀与后缀各自的基准
pub const fn a(prefix: u32, suffix: u32) -> CtxIdxValue {
    CtxIdxValue {
        prefix,
        suffix,
        has_suffix: true,
        uses_bypass: false,
    }
}

/// 标记后缀走旁路解码
pub const fn b(mut v: CtxIdxValue) -> CtxIdxValue {
    v.uses_bypass = true;
    v
}

/// 去掉后缀区段
pub const fn n(mut v: CtxIdxValue) -> CtxIdxValue {
    v.has_suffix = false;
    v
}

/// 一条完整的赋值记录: maxBinIdxCtx 与 ctxIdxOffset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CtxIdxRecord {
    pub max_bin_idx_ctx: CtxIdxValue,
    pub ctx_idx_offset: CtxIdxValue,
}

pub const fn r(max_bin_idx_ctx: CtxIdxValue, ctx_idx_offset: CtxIdxValue) -> CtxIdxRecord {
    CtxIdxRecord {
        max_bin_idx_ctx,
        ctx_idx_offset,
    }
}

/// CABAC 编码的语法元素
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxElement {
    MbType,
    MbSkipFlag,
    SubMbType,
    MvdX,
    MvdY,
    RefIdx,
    MbQpDelta,
    IntraChromaPredMode,
    PrevIntra4x4PredModeFlag,
    RemIntra4x4PredMode,
    MbFieldDecodingFlag,
    CodedBlockPattern,
    CodedBlockFlag,
    SignificantCoeffFlag,
    LastSignificantCoeffFlag,
    CoeffAbsLevelMinus1,
    CoeffSignFlag,
    EndOfSliceFlag,
    TransformSize8x8Flag,
}

const MB_TYPE_SI: CtxIdxRecord = r(a(0, 6), a(0, 3));
const MB_TYPE_I: CtxIdxRecord = r(i(6), i(3));
const MB_SKIP_FLAG_PSP: CtxIdxRecord = r(i(0), i(11));
const MB_TYPE_PSP: CtxIdxRecord = r(a(2, 5), a(14, 17));
const SUB_MB_TYPE_PSP: CtxIdxRecord = r(i(2), i(21));
const MB_SKIP_FLAG_B: CtxIdxRecord = r(i(0), i(24));
const MB_TYPE_B: CtxIdxRecord = r(a(3, 5), a(27, 32));
const SUB_MB_TYPE_B: CtxIdxRecord = r(i(3), i(36));
const MVD_LX_0: CtxIdxRecord = r(n(a(4, 0)), b(n(a(40, 0))));
const MVD_LX_1: CtxIdxRecord = r(n(a(4, 0)), b(n(a(47, 0))));
const REF_IDX_LX: CtxIdxRecord = r(i(2), i(54));
const MB_QP_DELTA: CtxIdxRecord = r(i(2), i(60));
const INTRA_CHROMA_PRED_MODE: CtxIdxRecord = r(i(1), i(64));
const PREV_INTRA4X4_PRED_MODE_FLAG: CtxIdxRecord = r(i(0), i(68));
const REM_INTRA4X4_PRED_MODE: CtxIdxRecord = r(i(0), i(69));
const MB_FIELD_DECODING_FLAG: CtxIdxRecord = r(i(0), i(70));
const CODED_BLOCK_PATTERN: CtxIdxRecord = r(a(3, 1), a(73, 77));
const COEFF_SIGN_FLAG: CtxIdxRecord = r(i(0), n(b(i(0))));
const END_OF_SLICE_FLAG: CtxIdxRecord = r(i(0), i(276));
const TRANSFORM_SIZE_8X8_FLAG: CtxIdxRecord = r(i(0), i(399));

const CODED_BLOCK_FLAG_LT5: CtxIdxRecord = r(i(0), i(85));
const SIG_COEFF_FLAG_LT5: CtxIdxRecord = r(i(0), i(105));
const SIG_COEFF_FLAG_EQ5: CtxIdxRecord = r(i(0), i(402));
const LAST_SIG_COEFF_FLAG_LT5: CtxIdxRecord = r(i(0), i(166));
const LAST_SIG_COEFF_FLAG_EQ5: CtxIdxRecord = r(i(0), i(417));
const COEFF_ABS_LEVEL_LT5: CtxIdxRecord = r(n(a(1, 0)), b(n(a(227, 0))));
const COEFF_ABS_LEVEL_EQ5: CtxIdxRecord = r(n(a(1, 0)), b(n(a(426, 0))));

fn check_cat(block_cat: usize) -> LiuResult<()> {
    if block_cat > 5 {
        return Err(LiuError::InvalidBlockCategory(block_cat));
    }
    Ok(())
}

/// 查出语法元素的赋值记录.
///
/// `block_cat` 只对残差类元素有意义, 其余元素忽略. 表中没有对应
/// 行的组合 (例如 I slice 的 sub_mb_type) 返回 `None`; 非法的
/// (元素, slice 类型) 组合与越界块类别返回错误.
pub fn assignment(
    se: SyntaxElement,
    slice_type: SliceType,
    block_cat: usize,
) -> LiuResult<Option<CtxIdxRecord>> {
    use SyntaxElement::*;
    let rec = match se {
        MbType => match slice_type {
            SliceType::Si => Some(MB_TYPE_SI),
            SliceType::I => Some(MB_TYPE_I),
            SliceType::P | SliceType::Sp => Some(MB_TYPE_PSP),
            SliceType::B => Some(MB_TYPE_B),
        },
        MbSkipFlag => match slice_type {
            SliceType::P | SliceType::Sp => Some(MB_SKIP_FLAG_PSP),
            SliceType::B => Some(MB_SKIP_FLAG_B),
            _ => {
                return Err(LiuError::InvalidArgument(format!(
                    "{:?} slice 不携带 mb_skip_flag",
                    slice_type
                )));
            }
        },
        SubMbType => match slice_type {
            SliceType::P | SliceType::Sp => Some(SUB_MB_TYPE_PSP),
            SliceType::B => Some(SUB_MB_TYPE_B),
            _ => None,
        },
        MvdX => Some(MVD_LX_0),
        MvdY => Some(MVD_LX_1),
        RefIdx => Some(REF_IDX_LX),
        MbQpDelta => Some(MB_QP_DELTA),
        IntraChromaPredMode => Some(INTRA_CHROMA_PRED_MODE),
        PrevIntra4x4PredModeFlag => Some(PREV_INTRA4X4_PRED_MODE_FLAG),
        RemIntra4x4PredMode => Some(REM_INTRA4X4_PRED_MODE),
        MbFieldDecodingFlag => Some(MB_FIELD_DECODING_FLAG),
        CodedBlockPattern => Some(CODED_BLOCK_PATTERN),
        CoeffSignFlag => Some(COEFF_SIGN_FLAG),
        EndOfSliceFlag => Some(END_OF_SLICE_FLAG),
        TransformSize8x8Flag => Some(TRANSFORM_SIZE_8X8_FLAG),
        CodedBlockFlag => {
            check_cat(block_cat)?;
            // 8x8 亮度块的 coded_block_flag 不编码
            if block_cat == 5 {
                None
            } else {
                Some(CODED_BLOCK_FLAG_LT5)
            }
        }
        SignificantCoeffFlag => {
            check_cat(block_cat)?;
            Some(if block_cat == 5 {
                SIG_COEFF_FLAG_EQ5
            } else {
                SIG_COEFF_FLAG_LT5
            })
        }
        LastSignificantCoeffFlag => {
            check_cat(block_cat)?;
            Some(if block_cat == 5 {
                LAST_SIG_COEFF_FLAG_EQ5
            } else {
                LAST_SIG_COEFF_FLAG_LT5
            })
        }
        CoeffAbsLevelMinus1 => {
            check_cat(block_cat)?;
            Some(if block_cat == 5 {
                COEFF_ABS_LEVEL_EQ5
            } else {
                COEFF_ABS_LEVEL_LT5
            })
        }
    };
    Ok(rec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctxidx;

    fn offset(se: SyntaxElement, st: SliceType, cat: usize) -> u32 {
        assignment(se, st, cat).unwrap().unwrap().ctx_idx_offset.prefix
    }

    #[test]
    fn test_combinator_flags() {
        let v = b(n(a(40, 0)));
        assert!(v.uses_bypass);
        assert!(!v.has_suffix);
        assert_eq!(v.prefix, 40);

        let plain = i(21);
        assert!(!plain.uses_bypass);
        assert!(!plain.has_suffix);
        assert_eq!(plain.prefix, 21);
        assert_eq!(plain.suffix, 21);
    }

    #[test]
    fn test_mb_type_rows_per_slice_type() {
        // I slice 的 mb_type 基准是 3 (6 是 maxBinIdxCtx)
        assert_eq!(offset(SyntaxElement::MbType, SliceType::I, 0), 3);
        assert_eq!(
            offset(SyntaxElement::MbType, SliceType::I, 0) as usize,
            crate::syntax::MB_TYPE_I_OFFSET
        );
        let psp = assignment(SyntaxElement::MbType, SliceType::P, 0)
            .unwrap()
            .unwrap();
        assert_eq!(psp.ctx_idx_offset, a(14, 17));
        let b_rec = assignment(SyntaxElement::MbType, SliceType::B, 0)
            .unwrap()
            .unwrap();
        assert_eq!(b_rec.ctx_idx_offset, a(27, 32));
        // B slice 的前缀区段基准与闭式 mb_type(0, 0) 一致
        assert_eq!(b_rec.ctx_idx_offset.prefix as usize, ctxidx::mb_type(0, 0));
    }

    #[test]
    fn test_agreement_with_closed_forms() {
        assert_eq!(
            offset(SyntaxElement::MbSkipFlag, SliceType::P, 0) as usize,
            ctxidx::mb_skip_flag(0, 0)
        );
        assert_eq!(
            offset(SyntaxElement::SubMbType, SliceType::P, 0) as usize,
            ctxidx::sub_mb_type()
        );
        assert_eq!(
            offset(SyntaxElement::MvdX, SliceType::P, 0) as usize,
            ctxidx::mvd()
        );
        assert_eq!(
            offset(SyntaxElement::RefIdx, SliceType::P, 0) as usize,
            ctxidx::ref_idx(0, 0)
        );
        assert_eq!(
            offset(SyntaxElement::MbQpDelta, SliceType::I, 0) as usize,
            ctxidx::mb_qp_delta(0)
        );
        assert_eq!(
            offset(SyntaxElement::IntraChromaPredMode, SliceType::I, 0) as usize,
            ctxidx::intra_chroma_pred_mode(0, 0)
        );
        assert_eq!(
            offset(SyntaxElement::PrevIntra4x4PredModeFlag, SliceType::I, 0) as usize,
            ctxidx::prev_intra4x4_pred_mode_flag()
        );
        assert_eq!(
            offset(SyntaxElement::EndOfSliceFlag, SliceType::I, 0) as usize,
            ctxidx::end_of_slice_flag()
        );
        assert_eq!(
            offset(SyntaxElement::TransformSize8x8Flag, SliceType::I, 0) as usize,
            ctxidx::transform_size_8x8_flag(0, 0)
        );
        for cat in 0..5 {
            assert_eq!(
                offset(SyntaxElement::CodedBlockFlag, SliceType::I, cat) as usize
                    + ctxidx::CBF_CAT_OFFSET[cat],
                ctxidx::coded_block_flag(cat).unwrap().unwrap()
            );
            assert_eq!(
                offset(SyntaxElement::SignificantCoeffFlag, SliceType::I, cat) as usize
                    + ctxidx::SIG_CAT_OFFSET[cat],
                ctxidx::significant_coeff_flag(cat).unwrap()
            );
            assert_eq!(
                offset(SyntaxElement::LastSignificantCoeffFlag, SliceType::I, cat) as usize
                    + ctxidx::SIG_CAT_OFFSET[cat],
                ctxidx::last_significant_coeff_flag(cat).unwrap()
            );
            assert_eq!(
                offset(SyntaxElement::CoeffAbsLevelMinus1, SliceType::I, cat) as usize
                    + ctxidx::ABS_CAT_OFFSET[cat],
                ctxidx::coeff_abs_level_minus1(cat).unwrap()
            );
        }
        assert_eq!(
            offset(SyntaxElement::SignificantCoeffFlag, SliceType::I, 5) as usize,
            ctxidx::significant_coeff_flag(5).unwrap()
        );
        assert_eq!(
            offset(SyntaxElement::LastSignificantCoeffFlag, SliceType::I, 5) as usize,
            ctxidx::last_significant_coeff_flag(5).unwrap()
        );
        assert_eq!(
            offset(SyntaxElement::CoeffAbsLevelMinus1, SliceType::I, 5) as usize,
            ctxidx::coeff_abs_level_minus1(5).unwrap()
        );
    }

    #[test]
    fn test_bypass_rows() {
        let sign = assignment(SyntaxElement::CoeffSignFlag, SliceType::P, 0)
            .unwrap()
            .unwrap();
        assert!(sign.ctx_idx_offset.uses_bypass);
        let mvd = assignment(SyntaxElement::MvdY, SliceType::B, 0)
            .unwrap()
            .unwrap();
        assert!(mvd.ctx_idx_offset.uses_bypass);
        assert_eq!(mvd.ctx_idx_offset.prefix, 47);
    }

    #[test]
    fn test_missing_and_invalid_rows() {
        assert!(
            assignment(SyntaxElement::SubMbType, SliceType::I, 0)
                .unwrap()
                .is_none()
        );
        assert!(
            assignment(SyntaxElement::CodedBlockFlag, SliceType::I, 5)
                .unwrap()
                .is_none()
        );
        assert!(assignment(SyntaxElement::MbSkipFlag, SliceType::I, 0).is_err());
        assert!(matches!(
            assignment(SyntaxElement::SignificantCoeffFlag, SliceType::I, 6),
            Err(LiuError::InvalidBlockCategory(6))
        ));
    }
}
