//! Ogg 容器解封装器.
//!
//! 解析 Ogg 帧层 (framing), 将分段重组为完整的 packet 交给解码器.
//! 本实现只支持单逻辑流的容器 (承载 Vorbis);
//! 出现第二个逻辑流序列号视为数据损坏.
//!
//! # Ogg 页面结构
//! ```text
//! Capture pattern: "OggS" (4 bytes)
//! Version:         1 byte (always 0)
//! Header type:     1 byte (flags: continued=0x01, BOS=0x02, EOS=0x04)
//! Granule pos:     8 bytes (little-endian)
//! Serial number:   4 bytes (identifies logical stream)
//! Page seq no:     4 bytes
//! CRC checksum:    4 bytes
//! Num segments:    1 byte
//! Segment table:   N bytes (each 1 byte, lacing values)
//! Page data:       sum(segment_table) bytes
//! ```
//!
//! 段表中连续的 255 值段与其后首个非 255 值段组合成一个完整的 packet.
//! packet 只有在下一页置 continued 标志时才允许跨页, 违反为硬错误.
//! EOS 标志页耗尽后流结束, 继续推进返回流末尾.

use bytes::Bytes;
use log::debug;
use ling_codec::{CodecId, Packet};
use ling_core::{ChannelLayout, LingError, LingResult, Rational, SampleFormat};

use crate::demuxer::Demuxer;
use crate::format_id::FormatId;
use crate::io::IoContext;
use crate::probe::{FormatProbe, ProbeScore, SCORE_EXTENSION, SCORE_MAX};
use crate::stream::{AudioStreamParams, Stream, StreamParams};

/// Ogg 同步字 (capture pattern)
const OGG_SYNC: &[u8; 4] = b"OggS";
/// Ogg CRC-32 多项式
const OGG_CRC_POLY: u32 = 0x04C11DB7;

/// 页面头部标志
const FLAG_CONTINUED: u8 = 0x01;
const FLAG_BOS: u8 = 0x02;
const FLAG_EOS: u8 = 0x04;

/// 已解析的 Ogg 页面
struct OggPage {
    /// 头部标志
    header_type: u8,
    /// 粒度位置
    granule_position: i64,
    /// 逻辑流序列号
    serial_number: u32,
    /// 段表
    segment_table: Vec<u8>,
    /// 页面数据
    data: Vec<u8>,
}

impl OggPage {
    /// 是否为 BOS (beginning of stream) 页面
    fn is_bos(&self) -> bool {
        self.header_type & FLAG_BOS != 0
    }

    /// 是否为 EOS (end of stream) 页面
    fn is_eos(&self) -> bool {
        self.header_type & FLAG_EOS != 0
    }

    /// 是否为续延页面 (前一个 packet 的延续)
    fn is_continued(&self) -> bool {
        self.header_type & FLAG_CONTINUED != 0
    }

    /// 从段表中提取 packet 边界
    ///
    /// 返回 (offset, length, is_complete) 列表
    fn extract_packets(&self) -> Vec<(usize, usize, bool)> {
        let mut packets = Vec::new();
        let mut offset = 0usize;
        let mut current_len = 0usize;

        for &seg_size in &self.segment_table {
            current_len += seg_size as usize;
            if seg_size < 255 {
                // packet 完成
                packets.push((offset, current_len, true));
                offset += current_len;
                current_len = 0;
            }
        }

        // 最后一个段是 255: packet 未完成, 跨页面
        if current_len > 0 {
            packets.push((offset, current_len, false));
        }

        packets
    }
}

/// Ogg 解封装器
pub struct OggDemuxer {
    /// 流信息 (单逻辑流, 最多 1 条)
    streams: Vec<Stream>,
    /// 逻辑流序列号, 首页确定后不允许变化
    serial: Option<u32>,
    /// 跨页 packet 的累积数据
    partial_packet: Vec<u8>,
    /// 待发送的数据包队列
    packet_queue: Vec<Packet>,
    /// EOS 页面已耗尽或物理输入已结束
    ended: bool,
    /// 容器时长 (秒)
    duration_sec: Option<f64>,
}

impl OggDemuxer {
    /// 创建 Ogg 解封装器实例 (工厂函数)
    pub fn create() -> LingResult<Box<dyn Demuxer>> {
        Ok(Box::new(Self {
            streams: Vec::new(),
            serial: None,
            partial_packet: Vec::new(),
            packet_queue: Vec::new(),
            ended: false,
            duration_sec: None,
        }))
    }

    /// 归一化 Ogg granule 值.
    ///
    /// 负值 (常见为 -1) 表示当前页没有可用 granule 时间戳,
    /// 统一映射到框架的 NOPTS 表示.
    fn normalize_granule(granule: i64) -> i64 {
        if granule < 0 {
            ling_core::timestamp::NOPTS_VALUE
        } else {
            granule
        }
    }

    /// 计算 Ogg 页面 CRC-32
    fn ogg_crc32(data: &[u8]) -> u32 {
        let mut crc = 0u32;
        for &byte in data {
            crc ^= u32::from(byte) << 24;
            for _ in 0..8 {
                if crc & 0x8000_0000 != 0 {
                    crc = (crc << 1) ^ OGG_CRC_POLY;
                } else {
                    crc <<= 1;
                }
            }
        }
        crc
    }

    /// 读取一个 Ogg 页面
    ///
    /// 同步字处的干净 EOF 作为流末尾返回; 页头/页体中途 EOF 视为损坏.
    fn read_page(io: &mut IoContext) -> LingResult<OggPage> {
        let sync = io.read_tag()?;
        if &sync != OGG_SYNC {
            return Err(LingError::InvalidData("无效的 Ogg 同步字".into()));
        }

        // 同步字之后的任何 EOF 都是页面截断
        let truncated = |e: LingError| match e {
            LingError::Eof => LingError::InvalidData("Ogg 页面不完整".into()),
            other => other,
        };

        let version = io.read_u8().map_err(truncated)?;
        if version != 0 {
            return Err(LingError::InvalidData(format!(
                "不支持的 Ogg 版本: {}",
                version,
            )));
        }

        let header_type = io.read_u8().map_err(truncated)?;
        let granule_position = io.read_u64_le().map_err(truncated)? as i64;
        let serial_number = io.read_u32_le().map_err(truncated)?;
        let page_sequence = io.read_u32_le().map_err(truncated)?;
        let crc = io.read_u32_le().map_err(truncated)?;
        let num_segments = io.read_u8().map_err(truncated)? as usize;

        let mut segment_table = vec![0u8; num_segments];
        io.read_exact(&mut segment_table).map_err(truncated)?;

        let data_size: usize = segment_table.iter().map(|&s| s as usize).sum();
        let mut data = vec![0u8; data_size];
        io.read_exact(&mut data).map_err(truncated)?;

        // Ogg CRC 覆盖整个页面, 其中 CRC 字段本身按 0 参与计算
        let mut crc_page = Vec::with_capacity(27 + num_segments + data_size);
        crc_page.extend_from_slice(OGG_SYNC);
        crc_page.push(version);
        crc_page.push(header_type);
        crc_page.extend_from_slice(&(granule_position as u64).to_le_bytes());
        crc_page.extend_from_slice(&serial_number.to_le_bytes());
        crc_page.extend_from_slice(&page_sequence.to_le_bytes());
        crc_page.extend_from_slice(&0u32.to_le_bytes());
        crc_page.push(num_segments as u8);
        crc_page.extend_from_slice(&segment_table);
        crc_page.extend_from_slice(&data);
        let crc_calc = Self::ogg_crc32(&crc_page);
        if crc != crc_calc {
            return Err(LingError::InvalidData(format!(
                "Ogg 页面 CRC 校验失败: 读取=0x{crc:08X}, 计算=0x{crc_calc:08X}",
            )));
        }

        Ok(OggPage {
            header_type,
            granule_position,
            serial_number,
            segment_table,
            data,
        })
    }

    /// 从 BOS 页面的第一个 packet 识别编解码器
    fn identify_codec(packet_data: &[u8]) -> CodecId {
        if packet_data.len() >= 7 && packet_data[0] == 0x01 && &packet_data[1..7] == b"vorbis" {
            return CodecId::Vorbis;
        }
        CodecId::None
    }

    /// 从 Vorbis identification 头包提取 (sample_rate, channels)
    fn parse_vorbis_header(data: &[u8]) -> Option<(u32, u32)> {
        // packet type (1) + "vorbis" (6) + version (4) + channels (1) + sample_rate (4)
        if data.len() < 16 {
            return None;
        }
        let channels = u32::from(data[11]);
        let sample_rate = u32::from_le_bytes([data[12], data[13], data[14], data[15]]);
        Some((sample_rate, channels))
    }

    /// 处理 BOS 页面, 创建流
    fn handle_bos_page(&mut self, page: &OggPage) -> LingResult<()> {
        let packets = page.extract_packets();
        let first = match packets.first() {
            Some(&(offset, length, true)) => &page.data[offset..offset + length],
            _ => {
                return Err(LingError::InvalidData(
                    "Ogg BOS 页面缺少完整的头 packet".into(),
                ));
            }
        };

        let codec_id = Self::identify_codec(first);
        if codec_id == CodecId::None {
            return Err(LingError::Unsupported(
                "Ogg 流中未识别出支持的编解码器".into(),
            ));
        }

        let (sample_rate, channels) =
            Self::parse_vorbis_header(first).unwrap_or((44100, 2));

        let stream = Stream {
            index: 0,
            codec_id,
            time_base: Rational::new(1, sample_rate as i32),
            duration: -1,
            nb_frames: 0,
            extra_data: first.to_vec(),
            params: StreamParams::Audio(AudioStreamParams {
                sample_rate,
                channel_layout: ChannelLayout::from_channels(channels),
                sample_format: SampleFormat::F32,
                bit_rate: 0,
                frame_size: 0,
            }),
            metadata: Vec::new(),
        };

        debug!("Ogg: 发现流: {} ({} Hz, {} 声道)", codec_id, sample_rate, channels);

        self.streams.push(stream);
        self.serial = Some(page.serial_number);

        // BOS 页面上偶尔还跟着后续头 packet, 照常入队
        let last_complete = packets.iter().rposition(|p| p.2);
        for (i, &(offset, length, complete)) in packets.iter().enumerate().skip(1) {
            let chunk = &page.data[offset..offset + length];
            if complete {
                let granule = if Some(i) == last_complete {
                    Self::normalize_granule(page.granule_position)
                } else {
                    ling_core::timestamp::NOPTS_VALUE
                };
                self.emit_packet(granule, chunk.to_vec());
            } else {
                self.partial_packet.extend_from_slice(chunk);
            }
        }
        Ok(())
    }

    /// 处理数据页面, 重组并入队 packet
    fn process_page(&mut self, page: OggPage) -> LingResult<()> {
        match self.serial {
            Some(serial) if serial != page.serial_number => {
                return Err(LingError::InvalidData(format!(
                    "Ogg 容器包含多个逻辑流: 0x{:08X} 与 0x{:08X}",
                    serial, page.serial_number,
                )));
            }
            _ => {}
        }

        // packet 跨页必须有 continued 标志, 反之亦然
        if !self.partial_packet.is_empty() && !page.is_continued() {
            return Err(LingError::InvalidData(
                "Ogg packet 跨页但下一页缺少 continued 标志".into(),
            ));
        }
        if page.is_continued() && self.partial_packet.is_empty() {
            return Err(LingError::InvalidData(
                "Ogg continued 页面缺少前置片段".into(),
            ));
        }

        let packets = page.extract_packets();
        let last_complete = packets.iter().rposition(|p| p.2);
        for (i, &(offset, length, complete)) in packets.iter().enumerate() {
            let chunk = &page.data[offset..offset + length];
            let granule = if Some(i) == last_complete {
                Self::normalize_granule(page.granule_position)
            } else {
                ling_core::timestamp::NOPTS_VALUE
            };

            if i == 0 && page.is_continued() {
                self.partial_packet.extend_from_slice(chunk);
                if complete {
                    let data = std::mem::take(&mut self.partial_packet);
                    self.emit_packet(granule, data);
                }
            } else if complete {
                self.emit_packet(granule, chunk.to_vec());
            } else {
                // 未完成的只可能是页面最后一个 packet, 缓存等待续页
                self.partial_packet.extend_from_slice(chunk);
            }
        }

        if page.is_eos() {
            self.ended = true;
            if !self.partial_packet.is_empty() {
                debug!(
                    "Ogg: EOS 页面遗留 {} 字节残片, 丢弃",
                    self.partial_packet.len(),
                );
                self.partial_packet.clear();
            }
            debug!("Ogg: 流 (serial={:?}) 结束", self.serial);
        }
        Ok(())
    }

    /// 创建并入队一个数据包
    fn emit_packet(&mut self, granule: i64, data: Vec<u8>) {
        let mut pkt = Packet::from_data(Bytes::from(data));
        pkt.stream_index = 0;
        pkt.pts = granule;
        pkt.dts = granule;
        pkt.is_keyframe = true;

        if let Some(stream) = self.streams.first() {
            pkt.time_base = stream.time_base;
        }

        self.packet_queue.push(pkt);
    }

    /// 扫描剩余页面估算时长并回填流 duration
    ///
    /// 时长必须扫描到最后一页的 granule 才可知, 因此只在可定位输入上
    /// 进行, 扫描后恢复读取位置; 不可定位时保持未知.
    fn estimate_duration(&mut self, io: &mut IoContext) -> LingResult<()> {
        self.duration_sec = None;
        if !io.is_seekable() {
            return Ok(());
        }

        let resume_pos = io.position()?;
        let mut max_granule: Option<i64> = None;

        loop {
            match Self::read_page(io) {
                Ok(page) => {
                    if Some(page.serial_number) != self.serial || page.granule_position < 0 {
                        continue;
                    }
                    if max_granule.map_or(true, |g| page.granule_position > g) {
                        max_granule = Some(page.granule_position);
                    }
                }
                Err(LingError::Eof) => break,
                Err(_) => break,
            }
        }

        io.seek(std::io::SeekFrom::Start(resume_pos))?;

        if let (Some(granule), Some(stream)) = (max_granule, self.streams.first_mut()) {
            stream.duration = granule;
            stream.nb_frames = granule as u64;
            if stream.time_base.den > 0 {
                self.duration_sec =
                    Some(granule as f64 * stream.time_base.num as f64 / stream.time_base.den as f64);
            }
        }

        Ok(())
    }
}

impl Demuxer for OggDemuxer {
    fn format_id(&self) -> FormatId {
        FormatId::Ogg
    }

    fn name(&self) -> &str {
        "ogg"
    }

    fn open(&mut self, io: &mut IoContext) -> LingResult<()> {
        // 首页必须完整存在, 此处 EOF 说明不是 Ogg 流
        let page = Self::read_page(io).map_err(|e| match e {
            LingError::Eof => LingError::InvalidData("输入过短, 不是 Ogg 流".into()),
            other => other,
        })?;
        if !page.is_bos() {
            return Err(LingError::InvalidData("Ogg 首页缺少 BOS 标志".into()));
        }
        self.handle_bos_page(&page)?;
        if page.is_eos() {
            self.ended = true;
        }

        if let Err(e) = self.estimate_duration(io) {
            debug!("Ogg 时长估算失败: {}", e);
        }

        Ok(())
    }

    fn streams(&self) -> &[Stream] {
        &self.streams
    }

    fn read_packet(&mut self, io: &mut IoContext) -> LingResult<Packet> {
        loop {
            if !self.packet_queue.is_empty() {
                return Ok(self.packet_queue.remove(0));
            }
            if self.ended {
                return Err(LingError::Eof);
            }

            match Self::read_page(io) {
                Ok(page) => self.process_page(page)?,
                Err(LingError::Eof) => {
                    // 无 EOS 标志的物理流尾, 同样按正常结束处理
                    self.ended = true;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn duration(&self) -> Option<f64> {
        self.duration_sec
    }
}

/// Ogg 格式探测器
pub struct OggProbe;

impl FormatProbe for OggProbe {
    fn probe(&self, data: &[u8], filename: Option<&str>) -> Option<ProbeScore> {
        // 魔数匹配
        if data.len() >= 4 && &data[0..4] == OGG_SYNC {
            return Some(SCORE_MAX);
        }

        // 扩展名匹配
        if let Some(name) = filename {
            if let Some(ext) = name.rsplit('.').next() {
                let ext_lower = ext.to_lowercase();
                if matches!(ext_lower.as_str(), "ogg" | "oga") {
                    return Some(SCORE_EXTENSION);
                }
            }
        }

        None
    }

    fn format_id(&self) -> FormatId {
        FormatId::Ogg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryBackend;

    /// 构建一个 Ogg 页面 (含正确的 CRC), 每个切片为一个 packet 片段
    ///
    /// `packets` 中标记为 true 的片段按完整 packet 切分 lacing,
    /// 标记为 false 的片段以 255 结尾表示跨页未完.
    fn build_ogg_page_ex(
        header_type: u8,
        granule: i64,
        serial: u32,
        page_seq: u32,
        packets: &[(&[u8], bool)],
    ) -> Vec<u8> {
        let mut page = Vec::new();
        page.extend_from_slice(b"OggS");
        page.push(0);
        page.push(header_type);
        page.extend_from_slice(&(granule as u64).to_le_bytes());
        page.extend_from_slice(&serial.to_le_bytes());
        page.extend_from_slice(&page_seq.to_le_bytes());
        let crc_offset = page.len();
        page.extend_from_slice(&0u32.to_le_bytes());

        let mut segments = Vec::new();
        let mut body = Vec::new();
        for &(data, complete) in packets {
            let mut remaining = data.len();
            while remaining >= 255 {
                segments.push(255u8);
                remaining -= 255;
            }
            if complete {
                segments.push(remaining as u8);
            } else {
                assert_eq!(remaining, 0, "未完成片段长度必须是 255 的倍数");
            }
            body.extend_from_slice(data);
        }
        page.push(segments.len() as u8);
        page.extend_from_slice(&segments);
        page.extend_from_slice(&body);

        let crc = OggDemuxer::ogg_crc32(&page);
        page[crc_offset..crc_offset + 4].copy_from_slice(&crc.to_le_bytes());
        page
    }

    /// 构建单 packet 页面
    fn build_ogg_page(
        header_type: u8,
        granule: i64,
        serial: u32,
        page_seq: u32,
        packet_data: &[u8],
    ) -> Vec<u8> {
        build_ogg_page_ex(header_type, granule, serial, page_seq, &[(packet_data, true)])
    }

    /// Vorbis identification 头包字节
    fn vorbis_ident_packet() -> Vec<u8> {
        let mut v = Vec::new();
        v.push(1u8);
        v.extend_from_slice(b"vorbis");
        v.extend_from_slice(&0u32.to_le_bytes());
        v.push(2);
        v.extend_from_slice(&44100u32.to_le_bytes());
        v.extend_from_slice(&0i32.to_le_bytes());
        v.extend_from_slice(&128_000i32.to_le_bytes());
        v.extend_from_slice(&0i32.to_le_bytes());
        v.push(0x88);
        v.push(1);
        v
    }

    /// 手动构造一个简单的 Ogg 文件 (Vorbis BOS + 数据页 + EOS)
    fn build_minimal_ogg_vorbis() -> Vec<u8> {
        let serial = 0x1234_5678;
        let mut data = Vec::new();
        data.extend_from_slice(&build_ogg_page(FLAG_BOS, 0, serial, 0, &vorbis_ident_packet()));
        data.extend_from_slice(&build_ogg_page(0, 1024, serial, 1, &[0u8; 100]));
        data.extend_from_slice(&build_ogg_page(FLAG_EOS, 2048, serial, 2, &[]));
        data
    }

    fn open_demuxer(data: Vec<u8>) -> (Box<dyn Demuxer>, IoContext) {
        let mut io = IoContext::new(Box::new(MemoryBackend::from_data(data)));
        let mut demuxer = OggDemuxer::create().unwrap();
        demuxer.open(&mut io).unwrap();
        (demuxer, io)
    }

    #[test]
    fn test_probe_ogg_magic() {
        let probe = OggProbe;
        assert!(probe.probe(b"OggS", None).is_some());
        assert!(probe.probe(b"RIFF", None).is_none());
        assert_eq!(probe.format_id(), FormatId::Ogg);
    }

    #[test]
    fn test_probe_ogg_extension() {
        let probe = OggProbe;
        assert!(probe.probe(&[], Some("test.ogg")).is_some());
        assert!(probe.probe(&[], Some("test.oga")).is_some());
        assert!(probe.probe(&[], Some("test.wav")).is_none());
    }

    #[test]
    fn test_demux_vorbis_单流() {
        let (demuxer, _io) = open_demuxer(build_minimal_ogg_vorbis());
        let streams = demuxer.streams();
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].codec_id, CodecId::Vorbis);
        assert_eq!(streams[0].extra_data, vorbis_ident_packet());

        match &streams[0].params {
            StreamParams::Audio(a) => {
                assert_eq!(a.sample_rate, 44100);
                assert_eq!(a.channel_layout.channels, 2);
            }
            _ => panic!("期望音频流参数"),
        }
    }

    #[test]
    fn test_read_packets_与流尾() {
        let (mut demuxer, mut io) = open_demuxer(build_minimal_ogg_vorbis());

        let pkt = demuxer.read_packet(&mut io).unwrap();
        assert_eq!(pkt.stream_index, 0);
        assert_eq!(pkt.size(), 100);
        assert_eq!(pkt.pts, 1024);

        // EOS 之后所有读取都返回流末尾
        assert!(matches!(
            demuxer.read_packet(&mut io).unwrap_err(),
            LingError::Eof
        ));
        assert!(matches!(
            demuxer.read_packet(&mut io).unwrap_err(),
            LingError::Eof
        ));
    }

    #[test]
    fn test_跨页packet重组() {
        let serial = 7;
        // 600 字节 packet: 第一页带 510 字节 (两个 255 段), 续页带其余 90 字节
        let big: Vec<u8> = (0..600u32).map(|i| (i % 251) as u8).collect();
        let mut data = Vec::new();
        data.extend_from_slice(&build_ogg_page(FLAG_BOS, 0, serial, 0, &vorbis_ident_packet()));
        data.extend_from_slice(&build_ogg_page_ex(0, -1, serial, 1, &[(&big[..510], false)]));
        data.extend_from_slice(&build_ogg_page_ex(
            FLAG_CONTINUED | FLAG_EOS,
            600,
            serial,
            2,
            &[(&big[510..], true)],
        ));

        let (mut demuxer, mut io) = open_demuxer(data);
        let pkt = demuxer.read_packet(&mut io).unwrap();
        assert_eq!(&pkt.data[..], &big[..], "跨页 packet 应按序重组");
        assert_eq!(pkt.pts, 600);
    }

    #[test]
    fn test_packet整255字节结尾需要零段() {
        let serial = 9;
        // 510 字节的 packet 恰好是 255 的倍数: lacing 以续页零段收尾
        let big = vec![0xABu8; 510];
        let mut data = Vec::new();
        data.extend_from_slice(&build_ogg_page(FLAG_BOS, 0, serial, 0, &vorbis_ident_packet()));
        data.extend_from_slice(&build_ogg_page_ex(0, -1, serial, 1, &[(&big, false)]));
        data.extend_from_slice(&build_ogg_page_ex(
            FLAG_CONTINUED | FLAG_EOS,
            510,
            serial,
            2,
            &[(&[], true)],
        ));

        let (mut demuxer, mut io) = open_demuxer(data);
        let pkt = demuxer.read_packet(&mut io).unwrap();
        assert_eq!(pkt.size(), 510);
    }

    #[test]
    fn test_跨页缺少continued标志报错() {
        let serial = 11;
        let big = vec![0x55u8; 255];
        let mut data = Vec::new();
        data.extend_from_slice(&build_ogg_page(FLAG_BOS, 0, serial, 0, &vorbis_ident_packet()));
        data.extend_from_slice(&build_ogg_page_ex(0, -1, serial, 1, &[(&big, false)]));
        // 下一页未置 continued 标志
        data.extend_from_slice(&build_ogg_page(FLAG_EOS, 300, serial, 2, &[1, 2, 3]));

        let (mut demuxer, mut io) = open_demuxer(data);
        // 第一页没有入队任何完整包, 推进到第三页时报错
        let err = demuxer.read_packet(&mut io).unwrap_err();
        assert!(matches!(err, LingError::InvalidData(_)));
    }

    #[test]
    fn test_多逻辑流报错() {
        let mut data = Vec::new();
        data.extend_from_slice(&build_ogg_page(FLAG_BOS, 0, 1, 0, &vorbis_ident_packet()));
        data.extend_from_slice(&build_ogg_page(0, 100, 2, 0, &[0u8; 10]));

        let (mut demuxer, mut io) = open_demuxer(data);
        let err = demuxer.read_packet(&mut io).unwrap_err();
        assert!(matches!(err, LingError::InvalidData(_)));
    }

    #[test]
    fn test_crc错误报损坏() {
        let mut data = build_minimal_ogg_vorbis();
        // 翻转首页数据区的一个位
        let len = data.len();
        data[len - 60] ^= 0x01;

        let mut io = IoContext::new(Box::new(MemoryBackend::from_data(data)));
        let mut demuxer = OggDemuxer::create().unwrap();
        let mut ok = demuxer.open(&mut io).is_err();
        if !ok {
            ok = demuxer.read_packet(&mut io).is_err();
        }
        assert!(ok, "CRC 被破坏的页面应报损坏");
    }

    #[test]
    fn test_损坏同步字报错() {
        let mut data = build_minimal_ogg_vorbis();
        data[0] = b'X';
        let mut io = IoContext::new(Box::new(MemoryBackend::from_data(data)));
        let mut demuxer = OggDemuxer::create().unwrap();
        assert!(matches!(
            demuxer.open(&mut io).unwrap_err(),
            LingError::InvalidData(_)
        ));
    }

    #[test]
    fn test_duration_扫描() {
        let (demuxer, _io) = open_demuxer(build_minimal_ogg_vorbis());
        let duration = demuxer.duration().expect("可定位输入应回填时长");
        assert!((duration - 2048.0 / 44100.0).abs() < 1e-9);
        assert_eq!(demuxer.streams()[0].duration, 2048);
    }

    #[test]
    fn test_packetization_等价性() {
        // 多页多 packet: 重组结果应等于各 packet 原始字节的顺序拼接
        let serial = 21;
        let p1 = vec![0x11u8; 10];
        let p2: Vec<u8> = (0..700u32).map(|i| (i & 0xFF) as u8).collect();
        let p3 = vec![0x33u8; 3];
        let p4 = vec![0x44u8; 260];

        let mut data = Vec::new();
        data.extend_from_slice(&build_ogg_page(FLAG_BOS, 0, serial, 0, &vorbis_ident_packet()));
        // 页 1: p1 完整 + p2 前 510 字节
        data.extend_from_slice(&build_ogg_page_ex(
            0,
            -1,
            serial,
            1,
            &[(&p1, true), (&p2[..510], false)],
        ));
        // 页 2: p2 其余 + p3 完整
        data.extend_from_slice(&build_ogg_page_ex(
            FLAG_CONTINUED,
            800,
            serial,
            2,
            &[(&p2[510..], true), (&p3, true)],
        ));
        // 页 3: p4 完整
        data.extend_from_slice(&build_ogg_page_ex(FLAG_EOS, 1100, serial, 3, &[(&p4, true)]));

        let (mut demuxer, mut io) = open_demuxer(data);
        let mut reassembled = Vec::new();
        loop {
            match demuxer.read_packet(&mut io) {
                Ok(pkt) => reassembled.extend_from_slice(&pkt.data),
                Err(LingError::Eof) => break,
                Err(e) => panic!("意外错误: {}", e),
            }
        }

        let mut expect = Vec::new();
        expect.extend_from_slice(&p1);
        expect.extend_from_slice(&p2);
        expect.extend_from_slice(&p3);
        expect.extend_from_slice(&p4);
        assert_eq!(reassembled, expect);
    }
}
