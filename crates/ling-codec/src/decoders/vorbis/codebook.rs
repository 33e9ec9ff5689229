//! Vorbis codebook: Huffman 解码与 VQ 向量查找.
//!
//! 每个 codebook 包含一棵由码长表构造的 Huffman 树, 以及可选的
//! VQ (向量量化) 查找配置, 用于把标量符号展开为 D 维浮点向量.

use ling_core::{LingError, LingResult};

use super::bitreader::{LsbBitReader, ilog};

/// 无符号标记: 节点不是叶子
const NO_SYMBOL: u32 = u32::MAX;

/// Huffman 树节点, 扁平数组中的一项
///
/// 子节点以数组下标引用, -1 表示缺失. 相比指针链表, 扁平布局对缓存更友好.
#[derive(Debug, Clone, Copy)]
struct HuffNode {
    /// 左右子节点下标 (-1 = 无)
    children: [i32; 2],
    /// 叶子符号 (NO_SYMBOL = 内部节点)
    symbol: u32,
}

impl HuffNode {
    fn new() -> Self {
        Self {
            children: [-1, -1],
            symbol: NO_SYMBOL,
        }
    }
}

/// 二叉树 Huffman 解码器
#[derive(Debug, Clone)]
pub(crate) struct Huffman {
    nodes: Vec<HuffNode>,
}

impl Huffman {
    /// 由码长表构造 Huffman 树
    ///
    /// 码长 0 表示该符号无码字; 码长超过 32 的表被拒绝.
    /// 按符号序采用最左空位规则分配码字: 在要求深度上优先向左子树
    /// 寻找空位, 左子树无法容纳时转向右子树. 两边都无法容纳说明
    /// 码长表冲突, 构造失败. 表尾留空 (欠指定) 是合法的.
    pub(crate) fn from_lengths(lengths: &[u8]) -> LingResult<Self> {
        let mut huffman = Self {
            nodes: vec![HuffNode::new()],
        };
        for (sym, &len) in lengths.iter().enumerate() {
            if len == 0 {
                continue; // 稀疏表: 无码字
            }
            if len > 32 {
                return Err(LingError::InvalidData(format!(
                    "Vorbis Huffman 码长非法: {}",
                    len,
                )));
            }
            if !huffman.insert(0, sym as u32, len) {
                return Err(LingError::InvalidData(format!(
                    "Vorbis Huffman 码长表冲突: 符号 {}",
                    sym,
                )));
            }
        }
        Ok(huffman)
    }

    /// 分配新节点, 返回下标
    fn alloc(&mut self) -> usize {
        self.nodes.push(HuffNode::new());
        self.nodes.len() - 1
    }

    /// 从 `idx` 节点出发, 在深度 `len` 处放置符号 `sym`
    fn insert(&mut self, idx: usize, sym: u32, len: u8) -> bool {
        if len == 0 {
            // 符号只能落在新开辟的节点上
            return false;
        }
        if self.nodes[idx].symbol != NO_SYMBOL {
            // 叶子不可再分
            return false;
        }

        if self.nodes[idx].children[0] < 0 {
            // 左子树为空: 沿全零路径开辟到目标深度
            let mut cur = idx;
            for _ in 0..len {
                let next = self.alloc();
                self.nodes[cur].children[0] = next as i32;
                cur = next;
            }
            self.nodes[cur].symbol = sym;
            return true;
        }

        let left = self.nodes[idx].children[0] as usize;
        if self.insert(left, sym, len - 1) {
            return true;
        }

        if self.nodes[idx].children[1] < 0 {
            // 右子树为空: 走一步 1, 其余沿全零路径
            let mut cur = self.alloc();
            self.nodes[idx].children[1] = cur as i32;
            for _ in 0..len - 1 {
                let next = self.alloc();
                self.nodes[cur].children[0] = next as i32;
                cur = next;
            }
            self.nodes[cur].symbol = sym;
            return true;
        }

        let right = self.nodes[idx].children[1] as usize;
        self.insert(right, sym, len - 1)
    }

    /// 逐位读取直到命中叶子, 返回符号
    pub(crate) fn decode(&self, br: &mut LsbBitReader<'_>) -> LingResult<u32> {
        let mut idx = 0usize;
        loop {
            let bit = br.read_bits(1) as usize;
            let next = self.nodes[idx].children[bit];
            if next < 0 {
                return Err(LingError::InvalidData(
                    "Vorbis Huffman 解码走入空分支".into(),
                ));
            }
            idx = next as usize;
            if self.nodes[idx].symbol != NO_SYMBOL {
                return Ok(self.nodes[idx].symbol);
            }
        }
    }
}

/// Vorbis codebook
#[derive(Debug, Clone)]
pub(crate) struct Codebook {
    /// 向量维数 D
    pub(crate) dimensions: u32,
    /// 条目数 E
    pub(crate) entries: u32,
    /// VQ 查找类型: 0=无, 1=隐式多维查找, 2=显式
    lookup_type: u8,
    /// VQ 最小值
    min_value: f32,
    /// VQ 增量
    delta_value: f32,
    /// 序列累加标志 (sequence_p)
    sequence_p: bool,
    /// 查找表条目数: 类型 1 为 lookup1_values(E,D), 类型 2 为 E*D
    lookup_values: u32,
    /// 量化乘数表
    multiplicands: Vec<u16>,
    /// Huffman 解码树
    huffman: Huffman,
}

impl Codebook {
    /// 从 setup 头包中解析一个 codebook 配置
    pub(crate) fn read(br: &mut LsbBitReader<'_>) -> LingResult<Self> {
        // 同步字 "BCV" (LSB 打包后为 0x564342)
        let sync = br.read_bits(24);
        if sync != 0x56_4342 {
            return Err(LingError::InvalidData(format!(
                "Vorbis codebook 同步字错误: 0x{sync:06X}",
            )));
        }

        let dimensions = br.read_bits(16);
        let entries = br.read_bits(24);
        if dimensions == 0 || entries == 0 {
            return Err(LingError::InvalidData(
                "Vorbis codebook 维数或条目数为 0".into(),
            ));
        }

        let ordered = br.read_flag();
        let mut lengths = vec![0u8; entries as usize];
        if ordered {
            // 有序模式: 码长单调不减, 按 run-length 编码
            let mut cur_entry = 0u32;
            let mut cur_len = br.read_bits(5) + 1;
            while cur_entry < entries {
                let number = br.read_bits(ilog(entries - cur_entry));
                if number == 0 || cur_entry + number > entries {
                    return Err(LingError::InvalidData(
                        "Vorbis codebook 有序码长组非法".into(),
                    ));
                }
                if cur_len > 32 {
                    return Err(LingError::InvalidData(
                        "Vorbis codebook 有序码长超出 32".into(),
                    ));
                }
                for len in &mut lengths[cur_entry as usize..(cur_entry + number) as usize] {
                    *len = cur_len as u8;
                }
                cur_entry += number;
                cur_len += 1;
            }
        } else {
            let sparse = br.read_flag();
            for len in &mut lengths {
                let used = if sparse { br.read_flag() } else { true };
                if used {
                    *len = (br.read_bits(5) + 1) as u8;
                }
            }
        }

        let lookup_type = br.read_bits(4) as u8;
        if lookup_type > 2 {
            return Err(LingError::InvalidData(format!(
                "Vorbis codebook lookup_type 非法: {}",
                lookup_type,
            )));
        }

        let mut min_value = 0.0f32;
        let mut delta_value = 0.0f32;
        let mut sequence_p = false;
        let mut lookup_values = 0u32;
        let mut multiplicands = Vec::new();
        if lookup_type > 0 {
            min_value = float32_unpack(br.read_bits(32));
            delta_value = float32_unpack(br.read_bits(32));
            let value_bits = br.read_bits(4) + 1;
            sequence_p = br.read_flag();
            lookup_values = if lookup_type == 1 {
                lookup1_values(entries, dimensions)
            } else {
                entries.checked_mul(dimensions).ok_or_else(|| {
                    LingError::InvalidData("Vorbis codebook 查找表条目数溢出".into())
                })?
            };
            multiplicands.reserve(lookup_values as usize);
            for _ in 0..lookup_values {
                multiplicands.push(br.read_bits(value_bits) as u16);
            }
        }

        let huffman = Huffman::from_lengths(&lengths)?;

        Ok(Self {
            dimensions,
            entries,
            lookup_type,
            min_value,
            delta_value,
            sequence_p,
            lookup_values,
            multiplicands,
            huffman,
        })
    }

    /// 解码一个标量符号, 结果在 [0, entries) 内
    pub(crate) fn decode_scalar(&self, br: &mut LsbBitReader<'_>) -> LingResult<u32> {
        let sym = self.huffman.decode(br)?;
        debug_assert!(sym < self.entries, "Huffman 符号超出 entries");
        Ok(sym)
    }

    /// 解码一个 VQ 向量, 填入 `out` (长度至多 D)
    pub(crate) fn decode_vector(
        &self,
        br: &mut LsbBitReader<'_>,
        out: &mut [f32],
    ) -> LingResult<()> {
        let index = self.decode_scalar(br)? as u64;
        let dims = (self.dimensions as usize).min(out.len());
        if self.lookup_values == 0 {
            return Err(LingError::InvalidData(
                "Vorbis codebook 缺少 VQ 查找表".into(),
            ));
        }

        let mut last = 0.0f32;
        match self.lookup_type {
            1 => {
                let mut index_divisor = 1u64;
                for slot in out.iter_mut().take(dims) {
                    let off = ((index / index_divisor) % u64::from(self.lookup_values)) as usize;
                    let v = f32::from(self.multiplicands[off]) * self.delta_value
                        + self.min_value
                        + last;
                    if self.sequence_p {
                        last = v;
                    }
                    *slot = v;
                    index_divisor *= u64::from(self.lookup_values);
                }
            }
            2 => {
                let mut off = index as usize * self.dimensions as usize;
                for slot in out.iter_mut().take(dims) {
                    let v = f32::from(self.multiplicands[off]) * self.delta_value
                        + self.min_value
                        + last;
                    if self.sequence_p {
                        last = v;
                    }
                    *slot = v;
                    off += 1;
                }
            }
            _ => {
                return Err(LingError::InvalidData(
                    "Vorbis 标量 codebook 不支持向量解码".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Vorbis float32 解包: 21 位尾数 + 10 位指数 + 符号位, 指数偏置 788
fn float32_unpack(x: u32) -> f32 {
    let mut mantissa = (x & 0x1F_FFFF) as f64;
    let exponent = (x & 0x7FE0_0000) >> 21;
    if x & 0x8000_0000 != 0 {
        mantissa = -mantissa;
    }
    (mantissa * 2.0f64.powi(exponent as i32 - 788)) as f32
}

/// lookup1_values(E, D): 满足 k^D ≤ E 的最大 k
pub(crate) fn lookup1_values(entries: u32, dimensions: u32) -> u32 {
    if dimensions == 0 {
        return 0;
    }
    let mut ret = (f64::from(entries)).powf(1.0 / f64::from(dimensions)) as u32;
    if ret == 0 {
        ret = 1;
    }
    // 浮点开方可能偏差 1, 用整数幂校正
    loop {
        if ipower(ret, dimensions) > entries {
            ret -= 1;
            if ret == 0 {
                break;
            }
        } else if ipower(ret + 1, dimensions) <= entries {
            ret += 1;
        } else {
            break;
        }
    }
    ret
}

/// 整数幂, 饱和避免溢出
fn ipower(base: u32, exp: u32) -> u32 {
    let mut ret = 1u64;
    for _ in 0..exp {
        ret = ret.saturating_mul(u64::from(base));
        if ret > u64::from(u32::MAX) {
            return u32::MAX;
        }
    }
    ret as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 按 LSB 位序打包码字序列 (每个码字按自然书写顺序首位先入流)
    fn pack_codewords(codes: &[(u32, u8)]) -> Vec<u8> {
        let mut bytes = Vec::new();
        let mut acc = 0u64;
        let mut nbits = 0u32;
        for &(code, len) in codes {
            for i in (0..len).rev() {
                let bit = (code >> i) & 1;
                acc |= u64::from(bit) << nbits;
                nbits += 1;
                while nbits >= 8 {
                    bytes.push((acc & 0xFF) as u8);
                    acc >>= 8;
                    nbits -= 8;
                }
            }
        }
        if nbits > 0 {
            bytes.push((acc & 0xFF) as u8);
        }
        bytes
    }

    #[test]
    fn test_huffman_构建与解码() {
        let h = Huffman::from_lengths(&[1, 2, 2]).expect("构建失败");
        let data = pack_codewords(&[(0b0, 1), (0b10, 2), (0b11, 2)]);
        let mut br = LsbBitReader::new(&data);
        assert_eq!(h.decode(&mut br).unwrap(), 0);
        assert_eq!(h.decode(&mut br).unwrap(), 1);
        assert_eq!(h.decode(&mut br).unwrap(), 2);
    }

    #[test]
    fn test_huffman_官方示例映射() {
        // Vorbis I 规范的构造示例: 含两处码长 0 (无码字) 与表尾留空
        let lengths = [2u8, 4, 4, 4, 4, 2, 0, 3, 3, 0, 0, 0, 0];
        let h = Huffman::from_lengths(&lengths).expect("构建失败");
        let codes = [
            (0b00u32, 2u8),
            (0b0100, 4),
            (0b0101, 4),
            (0b0110, 4),
            (0b0111, 4),
            (0b10, 2),
            (0b110, 3),
            (0b111, 3),
        ];
        let data = pack_codewords(&codes);
        let mut br = LsbBitReader::new(&data);
        let expect = [0u32, 1, 2, 3, 4, 5, 7, 8];
        for &sym in &expect {
            assert_eq!(h.decode(&mut br).unwrap(), sym, "符号 {} 解码错误", sym);
        }
    }

    #[test]
    fn test_huffman_冲突表被拒绝() {
        // 两个 1 位码字加一个 2 位码字: 树已满, 第三项必然冲突
        assert!(Huffman::from_lengths(&[1, 1, 2]).is_err());
    }

    #[test]
    fn test_huffman_码长超过32被拒绝() {
        assert!(Huffman::from_lengths(&[33]).is_err());
    }

    #[test]
    fn test_huffman_欠指定树合法() {
        // 只有一个 2 位码字, 树大部分留空
        let h = Huffman::from_lengths(&[2]).expect("欠指定树应构建成功");
        let data = pack_codewords(&[(0b00, 2)]);
        let mut br = LsbBitReader::new(&data);
        assert_eq!(h.decode(&mut br).unwrap(), 0);
    }

    #[test]
    fn test_float32_unpack() {
        // 0 值
        assert_eq!(float32_unpack(0), 0.0);
        // 尾数 1, 指数 788: 1.0
        let x = (788u32 << 21) | 1;
        assert!((float32_unpack(x) - 1.0).abs() < 1e-9);
        // 符号位
        let x = 0x8000_0000 | (788u32 << 21) | 1;
        assert!((float32_unpack(x) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_lookup1_values() {
        // 最大 k 满足 k^D ≤ E
        assert_eq!(lookup1_values(8, 3), 2);
        assert_eq!(lookup1_values(26, 3), 2);
        assert_eq!(lookup1_values(27, 3), 3);
        assert_eq!(lookup1_values(9, 2), 3);
        assert_eq!(lookup1_values(1, 1), 1);
    }
}
