//! CABAC 算术解码引擎.
//!
//! 维护 9 位 range/offset 双寄存器 (codIRange / codIOffset), 在 RBSP
//! 位流之上逐 bin 解码. 三条解码路径:
//!
//! - [`CabacDecoder::decode_decision`]: 上下文建模解码, 查 rangeTabLPS 表
//!   分割区间, 按 MPS/LPS 分支更新概率状态, 随后重归一化
//! - [`CabacDecoder::decode_bypass`]: 等概率旁路解码, 不更新上下文
//! - [`CabacDecoder::decode_terminate`]: slice 终止检测, 命中时不做
//!   重归一化 (码流可能就此结束)
//!
//! 重归一化不变量: 每次解码返回后 `0x0100 <= range <= 0x01FF` 且
//! `offset < range` (decode_terminate 返回 1 时除外).

use liu_core::{LiuError, LiuResult};

use crate::rbsp::RbspReader;

/// 初始 codIRange 值
const INITIAL_RANGE: u32 = 0x01FE;

/// rangeTabLPS: 按 (pStateIdx, qCodIRangeIdx) 索引的 LPS 子区间宽度.
///
/// qCodIRangeIdx = (codIRange >> 6) & 3.
const RANGE_TAB_LPS: [[u8; 4]; 64] = [
    [128, 176, 208, 240],
    [128, 167, 197, 227],
    [128, 158, 187, 216],
    [123, 150, 178, 205],
    [116, 142, 169, 195],
    [111, 135, 160, 185],
    [105, 128, 152, 175],
    [100, 122, 144, 166],
    [95, 116, 137, 158],
    [90, 110, 130, 150],
    [85, 104, 123, 142],
    [81, 99, 117, 135],
    [77, 94, 111, 128],
    [73, 89, 105, 122],
    [69, 85, 100, 116],
    [66, 80, 95, 110],
    [62, 76, 90, 104],
    [59, 72, 86, 99],
    [56, 69, 81, 94],
    [53, 65, 77, 89],
    [51, 62, 73, 85],
    [48, 59, 69, 80],
    [46, 56, 66, 76],
    [43, 53, 63, 72],
    [41, 50, 59, 69],
    [39, 48, 56, 65],
    [37, 45, 54, 62],
    [35, 43, 51, 59],
    [33, 41, 48, 56],
    [32, 39, 46, 53],
    [30, 37, 43, 50],
    [28, 35, 41, 48],
    [27, 33, 39, 45],
    [26, 31, 37, 43],
    [24, 30, 35, 41],
    [23, 28, 33, 39],
    [22, 27, 32, 37],
    [21, 26, 30, 35],
    [20, 24, 29, 33],
    [19, 23, 27, 31],
    [18, 22, 26, 30],
    [17, 21, 25, 28],
    [16, 20, 23, 27],
    [15, 19, 22, 25],
    [14, 18, 21, 24],
    [14, 17, 20, 23],
    [13, 16, 19, 22],
    [12, 15, 18, 21],
    [12, 14, 17, 20],
    [11, 14, 16, 19],
    [11, 13, 15, 18],
    [10, 12, 15, 17],
    [10, 12, 14, 16],
    [9, 11, 13, 15],
    [9, 11, 12, 14],
    [8, 10, 12, 14],
    [8, 9, 11, 13],
    [7, 9, 11, 12],
    [7, 9, 10, 12],
    [7, 8, 10, 11],
    [6, 8, 9, 11],
    [6, 7, 9, 10],
    [6, 7, 8, 9],
    [2, 2, 2, 2],
];

/// LPS 分支的概率状态转移表
const TRANS_IDX_LPS: [u8; 64] = [
    0, 0, 1, 2, 2, 4, 4, 5, 6, 7, 8, 9, 9, 11, 11, 12, 13, 13, 15, 15, 16, 16, 18, 18, 19, 19, 21,
    21, 23, 23, 24, 24, 25, 26, 26, 27, 27, 28, 29, 29, 30, 30, 30, 31, 32, 32, 33, 33, 33, 34,
    34, 35, 35, 35, 36, 36, 36, 37, 37, 37, 38, 38, 38, 63,
];

/// MPS 分支的概率状态转移表: 递增至 62 封顶, 63 为终止状态
const TRANS_IDX_MPS: [u8; 64] = [
    1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25,
    26, 27, 28, 29, 30, 31, 32, 33, 34, 35, 36, 37, 38, 39, 40, 41, 42, 43, 44, 45, 46, 47, 48,
    49, 50, 51, 52, 53, 54, 55, 56, 57, 58, 59, 60, 61, 62, 62, 63,
];

/// CABAC 上下文变量: 概率状态索引 + 最可能符号
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CabacCtx {
    /// 概率状态索引 (0-63)
    pub p_state_idx: u8,
    /// 最可能符号 valMPS (0/1)
    pub val_mps: u8,
}

/// bin 解码操作的抽象.
///
/// 残差与语法元素解码对 bin 来源泛型化 (单态展开, 每 bin 热路径上
/// 没有虚调用), 测试可用脚本化的 bin 序列替换真实算术引擎.
pub trait BinRead {
    /// 上下文建模解码一个 bin
    fn decode_decision(&mut self, ctx: &mut CabacCtx) -> LiuResult<u32>;

    /// 旁路 (等概率) 解码一个 bin
    fn decode_bypass(&mut self) -> LiuResult<u32>;

    /// 终止检测: 返回 1 表示 slice 数据结束
    fn decode_terminate(&mut self) -> LiuResult<u32>;
}

/// CABAC 算术解码器
///
/// 构造时从 RBSP 读取器读取 9 位初始 codIOffset. 解码器独占读取器:
/// 重归一化需要的每一个位都必须按序从同一游标读出.
pub struct CabacDecoder<'a> {
    reader: RbspReader<'a>,
    /// codIRange
    range: u32,
    /// codIOffset
    offset: u32,
}

impl<'a> CabacDecoder<'a> {
    /// 创建解码器并完成算术引擎初始化
    ///
    /// codIOffset 为 510/511 的码流不合法 (会使初始区间比较退化).
    pub fn new(mut reader: RbspReader<'a>) -> LiuResult<Self> {
        let offset = reader.read_bits(9)?;
        if offset >= INITIAL_RANGE {
            return Err(LiuError::InvalidData(format!(
                "CABAC: 初始 codIOffset={} 不合法 (>= 510)",
                offset,
            )));
        }
        Ok(Self {
            reader,
            range: INITIAL_RANGE,
            offset,
        })
    }

    /// 当前 codIRange
    pub fn range(&self) -> u32 {
        self.range
    }

    /// 当前 codIOffset
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// 收回底层 RBSP 读取器 (slice 解码结束后继续按字节解析时使用)
    pub fn into_reader(self) -> RbspReader<'a> {
        self.reader
    }

    /// 重归一化: 左移 range/offset 直至 range 回到 [0x100, 0x1FF],
    /// 每移一位从码流补入一个新位.
    fn renormalize(&mut self) -> LiuResult<()> {
        while self.range < 0x0100 {
            let bit = match self.reader.read_bit() {
                Ok(b) => b,
                Err(LiuError::UnexpectedEndOfStream) => {
                    return Err(LiuError::ArithmeticUnderflow);
                }
                Err(e) => return Err(e),
            };
            self.range <<= 1;
            self.offset = (self.offset << 1) | bit;
        }
        Ok(())
    }
}

impl BinRead for CabacDecoder<'_> {
    fn decode_decision(&mut self, ctx: &mut CabacCtx) -> LiuResult<u32> {
        let q_idx = ((self.range >> 6) & 3) as usize;
        let range_lps = u32::from(RANGE_TAB_LPS[ctx.p_state_idx as usize][q_idx]);
        self.range -= range_lps;

        let bin;
        if self.offset >= self.range {
            // LPS 分支: 偏移落入 LPS 子区间
            bin = u32::from(ctx.val_mps ^ 1);
            self.offset -= self.range;
            self.range = range_lps;
            if ctx.p_state_idx == 0 {
                ctx.val_mps ^= 1;
            }
            ctx.p_state_idx = TRANS_IDX_LPS[ctx.p_state_idx as usize];
        } else {
            bin = u32::from(ctx.val_mps);
            ctx.p_state_idx = TRANS_IDX_MPS[ctx.p_state_idx as usize];
        }

        self.renormalize()?;
        Ok(bin)
    }

    fn decode_bypass(&mut self) -> LiuResult<u32> {
        let bit = match self.reader.read_bit() {
            Ok(b) => b,
            Err(LiuError::UnexpectedEndOfStream) => {
                return Err(LiuError::ArithmeticUnderflow);
            }
            Err(e) => return Err(e),
        };
        self.offset = (self.offset << 1) | bit;

        if self.offset >= self.range {
            self.offset -= self.range;
            Ok(1)
        } else {
            Ok(0)
        }
    }

    fn decode_terminate(&mut self) -> LiuResult<u32> {
        self.range -= 2;
        if self.offset >= self.range {
            // 终止: 不做重归一化, 码流可能就此结束
            Ok(1)
        } else {
            self.renormalize()?;
            Ok(0)
        }
    }
}
