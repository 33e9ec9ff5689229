//! Vorbis residue 解码 (format 0/1/2).
//!
//! residue 是频谱的细节部分, 与 floor 曲线相乘后得到 MDCT 系数.
//! 解码范围 [begin, end) 划分为等宽分区, 每个分区先由 classbook
//! 解出分类号, 再按 8 趟 (pass) 级联查询各分类的 VQ codebook,
//! 把解出的向量累加进声道残差:
//! - format 0: 散布写入, 步长 partition_size / D
//! - format 1: 顺序追加
//! - format 2: 多声道交错为单一向量按 format 1 解码, 再按声道数解交错

use ling_core::{LingError, LingResult};

use super::bitreader::LsbBitReader;
use super::codebook::Codebook;
use super::synthesis::ChannelState;

/// 单个 residue 的分区数上限
const MAX_PARTITIONS: usize = 256;

/// 级联趟数
const PASS_COUNT: usize = 8;

/// residue 配置
#[derive(Debug, Clone)]
pub(crate) struct Residue {
    /// 格式 0/1/2
    pub(crate) residue_type: u32,
    /// 解码范围起点 (样本)
    begin: u32,
    /// 解码范围终点 (样本)
    end: u32,
    /// 分区宽度 (样本)
    partition_size: u32,
    /// 分类数
    classifications: u32,
    /// 分类 codebook 下标
    classbook: u32,
    /// 每个分类在 8 趟中使用的 codebook, -1 表示该趟不解码
    books: Vec<[i32; PASS_COUNT]>,
}

/// residue 解码共享暂存区, 在解码器 setup 时分配一次
pub(crate) struct ResidueScratch {
    /// 每声道的分区分类号
    classifications: Vec<Vec<u32>>,
    /// format 2 的交错缓冲, 单调增长到 chCount * B1/2
    interleaved: Vec<f32>,
}

impl ResidueScratch {
    pub(crate) fn new(channels: usize) -> Self {
        Self {
            classifications: vec![Vec::new(); channels],
            interleaved: Vec::new(),
        }
    }
}

impl Residue {
    /// 从 setup 头包解析一个 residue 配置
    pub(crate) fn read(br: &mut LsbBitReader<'_>, codebooks: &[Codebook]) -> LingResult<Self> {
        let residue_type = br.read_bits(16);
        if residue_type > 2 {
            return Err(LingError::InvalidData(format!(
                "Vorbis residue 类型不支持: {}",
                residue_type,
            )));
        }
        let begin = br.read_bits(24);
        let end = br.read_bits(24);
        let partition_size = br.read_bits(24) + 1;
        let classifications = br.read_bits(6) + 1;
        let classbook = br.read_bits(8);
        if classbook as usize >= codebooks.len() {
            return Err(LingError::InvalidData(
                "Vorbis residue classbook 索引越界".into(),
            ));
        }

        let mut cascades = Vec::with_capacity(classifications as usize);
        for _ in 0..classifications {
            let low_bits = br.read_bits(3);
            let high_bits = if br.read_flag() { br.read_bits(5) } else { 0 };
            cascades.push((high_bits << 3) | low_bits);
        }

        let mut books = Vec::with_capacity(classifications as usize);
        for cascade in cascades {
            let mut row = [-1i32; PASS_COUNT];
            for (pass, slot) in row.iter_mut().enumerate() {
                if cascade & (1 << pass) != 0 {
                    let book = br.read_bits(8);
                    if book as usize >= codebooks.len() {
                        return Err(LingError::InvalidData(
                            "Vorbis residue codebook 索引越界".into(),
                        ));
                    }
                    *slot = book as i32;
                }
            }
            books.push(row);
        }

        Ok(Self {
            residue_type,
            begin,
            end,
            partition_size,
            classifications,
            classbook,
            books,
        })
    }

    /// format 0/1 解码
    ///
    /// `order` 是本 submap 内按声道序排列的声道下标,
    /// `cur` 是乒乓缓冲的当前侧, `n2` 是半块长.
    pub(crate) fn decode_format01(
        &self,
        br: &mut LsbBitReader<'_>,
        codebooks: &[Codebook],
        chans: &mut [ChannelState],
        order: &[usize],
        cur: usize,
        n2: usize,
        scratch: &mut ResidueScratch,
    ) -> LingResult<()> {
        for &ch in order {
            chans[ch].audio[cur][..n2].fill(0.0);
        }

        let limit_begin = (self.begin as usize).min(n2);
        let limit_end = (self.end as usize).min(n2);
        if limit_end <= limit_begin {
            return Ok(());
        }
        let psize = self.partition_size as usize;
        let partition_count = (limit_end - limit_begin) / psize;
        if partition_count == 0 {
            return Ok(());
        }

        let classbook = &codebooks[self.classbook as usize];
        let classwords = classbook.dimensions as usize;
        if classwords > 64 || partition_count > MAX_PARTITIONS || order.len() > 64 {
            return Err(LingError::InvalidData(
                "Vorbis residue 规模超出限制".into(),
            ));
        }
        for ci in 0..order.len() {
            let cls = &mut scratch.classifications[ci];
            cls.clear();
            cls.resize(partition_count + classwords, 0);
        }

        let mut ent_temp = [0.0f32; 64];
        for pass in 0..PASS_COUNT {
            let mut id_part = 0usize;
            while id_part < partition_count {
                // 包尾不是错误: 已解出的部分保留, 其余保持为零
                if br.is_end_of_packet() {
                    return Ok(());
                }
                if pass == 0 {
                    // 首趟: 为 floor 可用的声道解出本组分区的分类号
                    for (ci, &ch) in order.iter().enumerate() {
                        if chans[ch].floor_unused {
                            continue;
                        }
                        let mut temp = classbook.decode_scalar(br)?;
                        for i in (0..classwords).rev() {
                            scratch.classifications[ci][i + id_part] = temp % self.classifications;
                            temp /= self.classifications;
                        }
                    }
                }
                let mut i = 0;
                while i < classwords && id_part < partition_count {
                    for (ci, &ch) in order.iter().enumerate() {
                        if chans[ch].floor_unused {
                            continue;
                        }
                        let vq_class = scratch.classifications[ci][id_part] as usize;
                        let book = self.books[vq_class][pass];
                        if book < 0 {
                            continue;
                        }
                        let vq_book = &codebooks[book as usize];
                        let offset = limit_begin + id_part * psize;
                        let v = &mut chans[ch].audio[cur];
                        match self.residue_type {
                            0 => decode_partition_format0(
                                br, vq_book, v, offset, psize, &mut ent_temp,
                            )?,
                            _ => decode_partition_format1(
                                br, vq_book, v, offset, psize, &mut ent_temp,
                            )?,
                        }
                    }
                    id_part += 1;
                    i += 1;
                }
            }
        }
        Ok(())
    }

    /// format 2 解码: 交错为单一向量, 再解交错回各声道
    pub(crate) fn decode_format2(
        &self,
        br: &mut LsbBitReader<'_>,
        codebooks: &[Codebook],
        chans: &mut [ChannelState],
        order: &[usize],
        cur: usize,
        n2: usize,
        scratch: &mut ResidueScratch,
    ) -> LingResult<()> {
        let ch_count = order.len();
        let actual_size = n2 * ch_count;
        if scratch.interleaved.len() < actual_size {
            scratch.interleaved.resize(actual_size, 0.0);
        }
        let need_decode = order.iter().any(|&ch| !chans[ch].floor_unused);

        let v = &mut scratch.interleaved[..actual_size];
        v.fill(0.0);

        if need_decode {
            let limit_begin = (self.begin as usize).min(actual_size);
            let limit_end = (self.end as usize).min(actual_size);
            if limit_end > limit_begin {
                let psize = self.partition_size as usize;
                let partition_count = (limit_end - limit_begin) / psize;

                let classbook = &codebooks[self.classbook as usize];
                let classwords = classbook.dimensions as usize;
                if classwords > 64 || partition_count > MAX_PARTITIONS || ch_count > 64 {
                    return Err(LingError::InvalidData(
                        "Vorbis residue 规模超出限制".into(),
                    ));
                }
                let cls = &mut scratch.classifications[0];
                cls.clear();
                cls.resize(partition_count + classwords, 0);

                let mut ent_temp = [0.0f32; 64];
                'passes: for pass in 0..PASS_COUNT {
                    let mut id_part = 0usize;
                    while id_part < partition_count {
                        // 包尾不是错误: 已解出的部分保留
                        if br.is_end_of_packet() {
                            break 'passes;
                        }
                        if pass == 0 {
                            let mut temp = classbook.decode_scalar(br)?;
                            for i in (0..classwords).rev() {
                                scratch.classifications[0][i + id_part] =
                                    temp % self.classifications;
                                temp /= self.classifications;
                            }
                        }
                        let mut i = 0;
                        while i < classwords && id_part < partition_count {
                            let vq_class = scratch.classifications[0][id_part] as usize;
                            let book = self.books[vq_class][pass];
                            if book >= 0 {
                                let offset = limit_begin + id_part * psize;
                                decode_partition_format1(
                                    br,
                                    &codebooks[book as usize],
                                    &mut scratch.interleaved,
                                    offset,
                                    psize,
                                    &mut ent_temp,
                                )?;
                            }
                            id_part += 1;
                            i += 1;
                        }
                    }
                }
            }
        }

        // 按声道数步长解交错
        for (ci, &ch) in order.iter().enumerate() {
            let dst = &mut chans[ch].audio[cur];
            for (i, j) in (ci..actual_size).step_by(ch_count).enumerate() {
                dst[i] = scratch.interleaved[j];
            }
        }
        Ok(())
    }
}

/// format 0 分区解码: 向量按步长 n/D 散布累加
fn decode_partition_format0(
    br: &mut LsbBitReader<'_>,
    vq_book: &Codebook,
    v: &mut [f32],
    offset: usize,
    n: usize,
    ent_temp: &mut [f32; 64],
) -> LingResult<()> {
    let dims = vq_book.dimensions as usize;
    if dims == 0 || dims > 64 {
        return Err(LingError::InvalidData(
            "Vorbis residue codebook 维数非法".into(),
        ));
    }
    let step = n / dims;
    for i in 0..step {
        vq_book.decode_vector(br, &mut ent_temp[..dims])?;
        for j in 0..dims {
            v[offset + i + j * step] += ent_temp[j];
        }
    }
    Ok(())
}

/// format 1 分区解码: 向量顺序累加
fn decode_partition_format1(
    br: &mut LsbBitReader<'_>,
    vq_book: &Codebook,
    v: &mut [f32],
    offset: usize,
    n: usize,
    ent_temp: &mut [f32; 64],
) -> LingResult<()> {
    let dims = vq_book.dimensions as usize;
    if dims == 0 || dims > 64 {
        return Err(LingError::InvalidData(
            "Vorbis residue codebook 维数非法".into(),
        ));
    }
    let mut i = 0usize;
    while i < n {
        vq_book.decode_vector(br, &mut ent_temp[..dims])?;
        for &e in ent_temp.iter().take(dims) {
            if i >= n {
                break;
            }
            v[offset + i] += e;
            i += 1;
        }
    }
    Ok(())
}
