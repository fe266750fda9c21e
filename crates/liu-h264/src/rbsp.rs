//! RBSP (Raw Byte Sequence Payload) 比特流读取.
//!
//! NAL 单元载荷中, 为避免与起始码冲突, 编码器会在每个 `00 00` 之后
//! 插入 emulation prevention 字节 `0x03`:
//!
//! ```text
//! 00 00 03 xx  →  00 00 xx   (0x03 被透明删除)
//! ```
//!
//! [`RbspReader`] 在按位读取的同时流式完成该还原, 上层 (Exp-Golomb 解析,
//! CABAC 引擎) 看到的始终是纯净的 RBSP 位流, 无须预先拷贝整段载荷.
//!
//! 扫描是非重叠的: 跳过一个被转义的 `0x03` 后, 两字节滚动窗口立即复位,
//! 因此紧随其后的字面 `00 00 03` 仍会被正确识别.

use liu_core::{BitReader, LiuError, LiuResult};

/// Exp-Golomb 前导零上限, 防止损坏码流导致的无界读取
const MAX_UE_LEADING_ZEROS: u32 = 31;

/// RBSP 读取位置快照
///
/// 由 [`RbspReader::checkpoint`] 产生, 包含滚动窗口状态,
/// 恢复后 emulation prevention 检测与保存时完全一致.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RbspCursor {
    byte_pos: usize,
    bit_pos: u8,
    zero_run: u8,
}

/// RBSP 比特流读取器
///
/// 包装 [`BitReader`], 在字节边界处透明跳过 emulation prevention 字节.
/// 单读者约束: 游标由本读取器独占推进, 不支持多方并发读取同一游标.
pub struct RbspReader<'a> {
    br: BitReader<'a>,
    /// 已消费原始字节中末尾连续 0x00 的数量 (封顶 2), 即滚动检测窗口
    zero_run: u8,
}

impl<'a> RbspReader<'a> {
    /// 创建新的 RBSP 读取器
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            br: BitReader::new(data),
            zero_run: 0,
        }
    }

    /// 底层原始数据中剩余的位数 (未扣除尚未跳过的 emulation prevention 字节)
    pub fn raw_bits_left(&self) -> usize {
        self.bits_left()
    }

    fn bits_left(&self) -> usize {
        self.br.bits_left()
    }

    /// 是否已消费完底层数据
    pub fn is_eof(&self) -> bool {
        self.bits_left() == 0
    }

    /// 保存当前读取位置
    pub fn checkpoint(&self) -> RbspCursor {
        let (byte_pos, bit_pos) = self.br.position();
        RbspCursor {
            byte_pos,
            bit_pos,
            zero_run: self.zero_run,
        }
    }

    /// 恢复到此前保存的位置
    pub fn restore(&mut self, cursor: RbspCursor) -> LiuResult<()> {
        self.br.seek(cursor.byte_pos, cursor.bit_pos)?;
        self.zero_run = cursor.zero_run;
        Ok(())
    }

    /// 进入新字节前的处理: 跳过 emulation prevention 字节并更新滚动窗口.
    ///
    /// 即将读取的字节会被整字节消费完才再次到达边界, 因此窗口在
    /// 进入时一次性推入该字节.
    fn enter_byte(&mut self) -> LiuResult<()> {
        if self.zero_run >= 2 && self.br.peek_bits(8).is_ok_and(|b| b == 0x03) {
            self.br.skip_bits(8)?;
            // 非重叠扫描: 被转义的 0x03 不计入窗口, 窗口复位
            self.zero_run = 0;
        }
        if let Ok(b) = self.br.peek_bits(8) {
            self.zero_run = if b == 0 { (self.zero_run + 1).min(2) } else { 0 };
        }
        Ok(())
    }

    /// 读取 1 个位
    pub fn read_bit(&mut self) -> LiuResult<u32> {
        if self.br.bits_read() % 8 == 0 {
            self.enter_byte()?;
        }
        self.br.read_bit()
    }

    /// 读取 N 个位 (1-32), 大端位序, 返回值的低 N 位有效
    pub fn read_bits(&mut self, n: u32) -> LiuResult<u32> {
        if n == 0 || n > 32 {
            return Err(LiuError::InvalidArgument(format!(
                "read_bits: n={} 超出 1-32 位范围",
                n,
            )));
        }

        let mut result = 0u32;
        for _ in 0..n {
            result = (result << 1) | self.read_bit()?;
        }
        Ok(result)
    }

    /// 读取 1 个字节
    pub fn read_byte(&mut self) -> LiuResult<u32> {
        self.read_bits(8)
    }

    /// 读取无符号 Exp-Golomb 编码值 ue(v)
    ///
    /// 前导零超过 31 位仍未出现终止位时, 视为码流损坏.
    pub fn read_ue(&mut self) -> LiuResult<u32> {
        let mut zeros = 0u32;
        while self.read_bit()? == 0 {
            zeros += 1;
            if zeros > MAX_UE_LEADING_ZEROS {
                return Err(LiuError::MalformedExpGolomb);
            }
        }

        if zeros == 0 {
            return Ok(0);
        }
        let tail = self.read_bits(zeros)?;
        Ok((1u32 << zeros) - 1 + tail)
    }

    /// 读取有符号 Exp-Golomb 编码值 se(v)
    ///
    /// 由 ue(v) 派生: codeNum 为奇数取正, 偶数取负, 幅值为 ceil(codeNum/2).
    pub fn read_se(&mut self) -> LiuResult<i32> {
        let code = self.read_ue()?;
        let magnitude = code.div_ceil(2) as i32;
        if code & 1 == 1 {
            Ok(magnitude)
        } else {
            Ok(-magnitude)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 把一段位序列 (MSB first) 打包为字节, 不足一字节补零
    fn pack_bits(bits: &[u32]) -> Vec<u8> {
        let mut out = Vec::new();
        for chunk in bits.chunks(8) {
            let mut byte = 0u8;
            for (i, &b) in chunk.iter().enumerate() {
                byte |= ((b & 1) as u8) << (7 - i);
            }
            out.push(byte);
        }
        out
    }

    /// 将 n 编码为 ue(v) 的位序列
    fn encode_ue(n: u32) -> Vec<u32> {
        let code = n as u64 + 1;
        let width = 64 - code.leading_zeros();
        let mut bits = vec![0u32; (width - 1) as usize];
        for i in (0..width).rev() {
            bits.push(((code >> i) & 1) as u32);
        }
        bits
    }

    /// 将 n 编码为 se(v) 的位序列
    fn encode_se(n: i32) -> Vec<u32> {
        let code = if n > 0 {
            (n as u32) * 2 - 1
        } else {
            (-(n as i64) as u32) * 2
        };
        encode_ue(code)
    }

    #[test]
    fn test_emulation_prevention_skip() {
        // 00 00 03 AB 应读出 00 00 AB
        let data = [0x00, 0x00, 0x03, 0xAB];
        let mut r = RbspReader::new(&data);
        assert_eq!(r.read_bits(8).unwrap(), 0x00);
        assert_eq!(r.read_bits(8).unwrap(), 0x00);
        assert_eq!(r.read_bits(8).unwrap(), 0xAB);
    }

    #[test]
    fn test_emulation_prevention_any_following_byte() {
        // 对任意 X != 03, 00 00 03 X 必须等价于 00 00 X
        // (X == 03 时裸流 00 00 03 自身就会触发跳过,
        // 由 test_escaped_03_is_literal_after_skip 单独覆盖)
        for x in 0u16..=255 {
            if x == 0x03 {
                continue;
            }
            let escaped = [0x00, 0x00, 0x03, x as u8];
            let plain = [0x00, 0x00, x as u8];

            let mut a = RbspReader::new(&escaped);
            let mut b = RbspReader::new(&plain);
            for _ in 0..24 {
                assert_eq!(a.read_bit().unwrap(), b.read_bit().unwrap(), "X={x:02X}");
            }
        }
    }

    #[test]
    fn test_no_emulation_passthrough() {
        // 不含 00 00 03 的序列必须逐位原样读出
        let data = [0x12, 0x00, 0x03, 0x00, 0x00, 0x02, 0xFF];
        let mut r = RbspReader::new(&data);
        for &byte in &data {
            assert_eq!(r.read_bits(8).unwrap(), u32::from(byte));
        }
    }

    #[test]
    fn test_escaped_03_is_literal_after_skip() {
        // 00 00 03 03: 第一个 03 被跳过后窗口复位, 第二个 03 是字面值
        let data = [0x00, 0x00, 0x03, 0x03];
        let mut r = RbspReader::new(&data);
        assert_eq!(r.read_bits(8).unwrap(), 0x00);
        assert_eq!(r.read_bits(8).unwrap(), 0x00);
        assert_eq!(r.read_bits(8).unwrap(), 0x03);
        assert!(r.read_bit().is_err());
    }

    #[test]
    fn test_non_overlapping_rescan() {
        // 跳过一次转义后, 紧随其后的字面 00 00 03 仍须被识别
        let data = [0x00, 0x00, 0x03, 0x00, 0x00, 0x03, 0x7F];
        let mut r = RbspReader::new(&data);
        assert_eq!(r.read_bits(8).unwrap(), 0x00);
        assert_eq!(r.read_bits(8).unwrap(), 0x00);
        assert_eq!(r.read_bits(8).unwrap(), 0x00);
        assert_eq!(r.read_bits(8).unwrap(), 0x00);
        assert_eq!(r.read_bits(8).unwrap(), 0x7F);
    }

    #[test]
    fn test_checkpoint_restore() {
        let data = [0x00, 0x00, 0x03, 0xAB, 0xCD];
        let mut r = RbspReader::new(&data);
        assert_eq!(r.read_bits(16).unwrap(), 0x0000);

        let saved = r.checkpoint();
        assert_eq!(r.read_bits(8).unwrap(), 0xAB);
        r.restore(saved).unwrap();
        // 恢复后 emulation prevention 跳过行为必须一致
        assert_eq!(r.read_bits(16).unwrap(), 0xABCD);
    }

    #[test]
    fn test_read_ue_small_values() {
        // 1 → 0, 010 → 1, 011 → 2, 00100 → 3 ...
        for n in 0..64u32 {
            let data = pack_bits(&encode_ue(n));
            let mut r = RbspReader::new(&data);
            assert_eq!(r.read_ue().unwrap(), n, "ue({n})");
        }
    }

    #[test]
    fn test_read_ue_sampled_round_trip() {
        let mut n = 1u32;
        while n < (1 << 20) {
            let data = pack_bits(&encode_ue(n));
            let mut r = RbspReader::new(&data);
            assert_eq!(r.read_ue().unwrap(), n, "ue({n})");
            n = n * 3 + 7;
        }
    }

    #[test]
    fn test_read_se_round_trip() {
        for n in -64i32..=64 {
            let data = pack_bits(&encode_se(n));
            let mut r = RbspReader::new(&data);
            assert_eq!(r.read_se().unwrap(), n, "se({n})");
        }

        let mut n = 1i32;
        while n < (1 << 19) {
            for v in [n, -n] {
                let data = pack_bits(&encode_se(v));
                let mut r = RbspReader::new(&data);
                assert_eq!(r.read_se().unwrap(), v, "se({v})");
            }
            n = n * 3 + 7;
        }
    }

    #[test]
    fn test_read_ue_malformed() {
        // 全零码流: 前导零超过上限
        let data = [0x00; 8];
        let mut r = RbspReader::new(&data);
        assert!(matches!(r.read_ue(), Err(LiuError::MalformedExpGolomb)));
    }

    #[test]
    fn test_read_ue_truncated() {
        // 前导零后码流耗尽
        let data = [0b00000001, 0b00000000];
        let mut r = RbspReader::new(&data);
        // 7 个前导零 + 终止位, 还需要再读 7 位但只剩 8 位 → 可以
        assert_eq!(r.read_ue().unwrap(), (1 << 7) - 1);

        let data2 = [0b00000001];
        let mut r2 = RbspReader::new(&data2);
        assert!(matches!(
            r2.read_ue(),
            Err(LiuError::UnexpectedEndOfStream)
        ));
    }

    #[test]
    fn test_read_bits_invalid_n() {
        let data = [0xFF; 8];
        let mut r = RbspReader::new(&data);
        assert!(matches!(r.read_bits(0), Err(LiuError::InvalidArgument(_))));
        assert!(matches!(r.read_bits(33), Err(LiuError::InvalidArgument(_))));
    }
}
