//! Vorbis 音频解码器.
//!
//! 从零实现的 Vorbis I 解码器, 按 Xiph 规范逐包解码:
//! 三个头包 (identification/comment/setup) 建立解码状态后,
//! 每个音频包依次经过 mode 选择、floor 曲线解码、residue 解码、
//! 声道逆耦合、点乘、逆 MDCT 与重叠相加, 产出交错 F32 音频帧.
//!
//! 输出到 U8/S16 等整数格式的转换由 PCM 编码器层完成.

mod bitreader;
mod codebook;
mod floor;
mod headers;
pub mod imdct;
mod residue;
mod setup;
mod synthesis;

use std::collections::VecDeque;

use log::debug;
use ling_core::{ChannelLayout, LingError, LingResult, Rational, SampleFormat};

use crate::codec_id::CodecId;
use crate::codec_parameters::CodecParameters;
use crate::decoder::Decoder;
use crate::frame::AudioFrame;
use crate::packet::Packet;

use self::bitreader::{LsbBitReader, ilog};
use self::headers::IdentHeader;
use self::imdct::Imdct;
use self::residue::ResidueScratch;
use self::setup::ParsedSetup;
use self::synthesis::{ChannelState, Overlap, build_overlaps, build_slope, dot_product,
    inverse_coupling, overlap_add};

/// 头包解析阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderStage {
    Identification,
    Comment,
    Setup,
    Audio,
}

/// Vorbis 解码器
pub struct VorbisDecoder {
    opened: bool,
    flushing: bool,
    stage: HeaderStage,
    ident: Option<IdentHeader>,
    setup: Option<ParsedSetup>,
    /// comment 头包内容, 首项为 VENDOR
    metadata: Vec<(String, String)>,
    sample_rate: u32,
    channel_layout: ChannelLayout,

    // 解码工作区, setup 头包就绪时一次分配
    channels: Vec<ChannelState>,
    slopes: [Vec<f32>; 2],
    overlaps: [[Overlap; 2]; 2],
    imdct: Vec<Imdct>,
    residue_scratch: ResidueScratch,
    submap_order: Vec<usize>,

    /// 已解码音频包计数, 决定乒乓侧与首帧判定
    audio_packet_index: u64,
    prev_window_flag: usize,
    prev_blocksize: usize,
    pending_frames: VecDeque<AudioFrame>,
    next_pts: i64,
    /// 码流损坏后的终止态: 此后所有调用返回同类错误
    fatal: Option<String>,
}

impl VorbisDecoder {
    /// 创建 Vorbis 解码器 (工厂函数)
    pub fn create() -> LingResult<Box<dyn Decoder>> {
        Ok(Box::new(Self {
            opened: false,
            flushing: false,
            stage: HeaderStage::Identification,
            ident: None,
            setup: None,
            metadata: Vec::new(),
            sample_rate: 0,
            channel_layout: ChannelLayout::STEREO,
            channels: Vec::new(),
            slopes: [Vec::new(), Vec::new()],
            overlaps: build_overlaps([64, 64]),
            imdct: Vec::new(),
            residue_scratch: ResidueScratch::new(0),
            submap_order: Vec::new(),
            audio_packet_index: 0,
            prev_window_flag: 0,
            prev_blocksize: 0,
            pending_frames: VecDeque::new(),
            next_pts: 0,
            fatal: None,
        }))
    }

    fn handle_identification(&mut self, packet: &[u8]) -> LingResult<()> {
        let ident = headers::parse_identification(packet)?;
        debug!(
            "Vorbis identification: {} 声道, {} Hz, blocksize {}/{}",
            ident.channels, ident.sample_rate, ident.blocksize[0], ident.blocksize[1],
        );
        self.sample_rate = ident.sample_rate;
        self.channel_layout = ChannelLayout::from_channels(ident.channels);
        self.ident = Some(ident);
        self.stage = HeaderStage::Comment;
        Ok(())
    }

    fn handle_comment(&mut self, packet: &[u8]) -> LingResult<()> {
        let comment = headers::parse_comment(packet)?;
        debug!(
            "Vorbis comment: vendor={}, {} 条注释",
            comment.vendor,
            comment.comments.len(),
        );
        self.metadata.clear();
        self.metadata.push(("VENDOR".to_string(), comment.vendor));
        self.metadata.extend(comment.comments);
        self.stage = HeaderStage::Setup;
        Ok(())
    }

    fn handle_setup(&mut self, packet: &[u8]) -> LingResult<()> {
        let ident = self
            .ident
            .as_ref()
            .ok_or_else(|| LingError::InvalidData("Vorbis setup 前缺少 identification 头".into()))?;
        let parsed = setup::parse_setup(packet, ident.channels)?;
        debug!(
            "Vorbis setup: {} codebook, {} floor, {} residue, {} mapping, {} mode",
            parsed.codebooks.len(),
            parsed.floors.len(),
            parsed.residues.len(),
            parsed.mappings.len(),
            parsed.modes.len(),
        );

        // 所有解码工作区按最大块 B1 一次分配
        let b1 = ident.blocksize[1];
        self.channels = (0..ident.channels)
            .map(|_| ChannelState::new(b1))
            .collect();
        self.slopes = [
            build_slope(ident.blocksize[0]),
            build_slope(ident.blocksize[1]),
        ];
        self.overlaps = build_overlaps(ident.blocksize);
        self.imdct = vec![
            Imdct::new(ident.blocksize[0]),
            Imdct::new(ident.blocksize[1]),
        ];
        self.residue_scratch = ResidueScratch::new(ident.channels as usize);
        self.setup = Some(parsed);
        self.audio_packet_index = 0;
        self.prev_window_flag = 0;
        self.prev_blocksize = 0;
        self.next_pts = 0;
        self.stage = HeaderStage::Audio;
        Ok(())
    }

    fn handle_audio_packet(&mut self, packet: &[u8]) -> LingResult<()> {
        let ident = self
            .ident
            .as_ref()
            .ok_or_else(|| LingError::Codec("Vorbis 头信息未就绪".into()))?;
        let setup = self
            .setup
            .as_ref()
            .ok_or_else(|| LingError::Codec("Vorbis setup 信息未就绪".into()))?;
        let channels = &mut self.channels;
        let scratch = &mut self.residue_scratch;
        let order = &mut self.submap_order;
        let ch_count = ident.channels as usize;

        let mut br = LsbBitReader::new(packet);

        // 包类型位: 非 0 为头包类型, 音频流中出现时跳过
        if br.read_bits(1) != 0 {
            debug!("Vorbis 跳过非音频包");
            return Ok(());
        }

        let mode_number = br.read_bits(ilog(setup.modes.len() as u32 - 1)) as usize;
        let mode = setup
            .modes
            .get(mode_number)
            .ok_or_else(|| LingError::InvalidData(format!(
                "Vorbis mode 索引越界: {}",
                mode_number,
            )))?;
        let cur_flag = mode.block_flag as usize;
        let blocksize = ident.blocksize[cur_flag];
        let n2 = blocksize / 2;
        if mode.block_flag {
            // 长块的两个窗形提示位; 重叠描述子实际由前后块标志决定
            br.read_bits(1);
            br.read_bits(1);
        }

        let mapping = &setup.mappings[mode.mapping as usize];

        // floor 曲线解码
        for ch in 0..ch_count {
            let submap = mapping.mux[ch] as usize;
            let floor_idx = mapping.submap_floor[submap] as usize;
            let used =
                setup.floors[floor_idx].decode(&mut br, &setup.codebooks, &mut channels[ch], n2)?;
            channels[ch].floor_unused = !used;
        }

        // 耦合对中任一侧 floor 未用, 两侧都按未用处理
        for step in &mapping.coupling_steps {
            let m = step.magnitude as usize;
            let a = step.angle as usize;
            if channels[m].floor_unused || channels[a].floor_unused {
                channels[m].floor_unused = true;
                channels[a].floor_unused = true;
            }
        }

        // residue 解码, 按 submap 归集声道
        let cur = (self.audio_packet_index & 1) as usize;
        for submap in 0..mapping.submaps as usize {
            order.clear();
            for ch in 0..ch_count {
                if mapping.mux[ch] as usize == submap {
                    order.push(ch);
                }
            }
            if order.is_empty() {
                continue;
            }
            let residue = &setup.residues[mapping.submap_residue[submap] as usize];
            if residue.residue_type == 2 {
                residue.decode_format2(
                    &mut br,
                    &setup.codebooks,
                    channels,
                    order,
                    cur,
                    n2,
                    scratch,
                )?;
            } else {
                residue.decode_format01(
                    &mut br,
                    &setup.codebooks,
                    channels,
                    order,
                    cur,
                    n2,
                    scratch,
                )?;
            }
        }

        // 逆耦合, 按声明的逆序
        for step in mapping.coupling_steps.iter().rev() {
            let m = step.magnitude as usize;
            let a = step.angle as usize;
            let (lo, hi) = (m.min(a), m.max(a));
            let (left, right) = channels.split_at_mut(hi);
            let (mag, ang) = if m < a {
                (&mut left[lo], &mut right[0])
            } else {
                (&mut right[0], &mut left[lo])
            };
            inverse_coupling(&mut mag.audio[cur], &mut ang.audio[cur], n2);
        }

        // 点乘、逆 MDCT 与重叠相加
        let first_frame = self.audio_packet_index == 0;
        let ov = self.overlaps[self.prev_window_flag][cur_flag];
        let prev = cur ^ 1;
        for ch in channels.iter_mut() {
            dot_product(&mut ch.audio[cur], &ch.floor, n2);
            self.imdct[cur_flag].inverse(&mut ch.audio[cur][..blocksize]);
            if !first_frame {
                let prev_tail = &ch.audio[prev][self.prev_blocksize / 2..self.prev_blocksize];
                overlap_add(&ov, &self.slopes[ov.slope], &mut ch.pcm, prev_tail, &ch.audio[cur]);
            }
        }

        // 首帧只建立重叠基线, 不产出样本
        if !first_frame {
            let num_pcm = ov.num_pcm;
            let mut data = Vec::with_capacity(num_pcm * ch_count * 4);
            for i in 0..num_pcm {
                for ch in channels.iter() {
                    data.extend_from_slice(&ch.pcm[i].to_le_bytes());
                }
            }
            let mut frame = AudioFrame::new(
                num_pcm as u32,
                self.sample_rate,
                SampleFormat::F32,
                self.channel_layout,
            );
            frame.data = data;
            frame.pts = self.next_pts;
            frame.time_base = Rational::new(1, self.sample_rate as i32);
            frame.duration = num_pcm as i64;
            self.next_pts += num_pcm as i64;
            self.pending_frames.push_back(frame);
        }

        self.prev_window_flag = cur_flag;
        self.prev_blocksize = blocksize;
        self.audio_packet_index += 1;
        Ok(())
    }
}

impl Decoder for VorbisDecoder {
    fn codec_id(&self) -> CodecId {
        CodecId::Vorbis
    }

    fn name(&self) -> &str {
        "vorbis"
    }

    fn open(&mut self, params: &CodecParameters) -> LingResult<()> {
        self.opened = true;
        self.flushing = false;
        self.stage = HeaderStage::Identification;
        self.ident = None;
        self.setup = None;
        self.metadata.clear();
        self.channels.clear();
        self.imdct.clear();
        self.pending_frames.clear();
        self.audio_packet_index = 0;
        self.prev_window_flag = 0;
        self.prev_blocksize = 0;
        self.next_pts = 0;
        self.fatal = None;

        if let Some(audio) = params.audio() {
            if audio.sample_rate > 0 {
                self.sample_rate = audio.sample_rate;
            }
            self.channel_layout = audio.channel_layout;
        }

        // 容器层通常把 identification 头包放在 extra_data 中
        if !params.extra_data.is_empty() {
            self.handle_identification(&params.extra_data)?;
        }

        Ok(())
    }

    fn send_packet(&mut self, packet: &Packet) -> LingResult<()> {
        if !self.opened {
            return Err(LingError::Codec("Vorbis 解码器未打开".into()));
        }
        if let Some(msg) = &self.fatal {
            return Err(LingError::InvalidData(msg.clone()));
        }

        if packet.is_empty() {
            self.flushing = true;
            return Ok(());
        }

        let data = packet.data.clone();
        let result = match self.stage {
            HeaderStage::Identification => self.handle_identification(&data),
            HeaderStage::Comment => self.handle_comment(&data),
            HeaderStage::Setup => self.handle_setup(&data),
            HeaderStage::Audio => self.handle_audio_packet(&data),
        };
        if let Err(e) = &result {
            // 码流损坏不可恢复, 解码器进入终止态
            if !matches!(e, LingError::NeedMoreData) {
                self.fatal = Some(e.to_string());
            }
        }
        result
    }

    fn receive_frame(&mut self) -> LingResult<AudioFrame> {
        if let Some(msg) = &self.fatal {
            return Err(LingError::InvalidData(msg.clone()));
        }
        if let Some(frame) = self.pending_frames.pop_front() {
            return Ok(frame);
        }
        if self.flushing {
            return Err(LingError::Eof);
        }
        Err(LingError::NeedMoreData)
    }

    fn flush(&mut self) {
        self.flushing = false;
        self.pending_frames.clear();
        self.audio_packet_index = 0;
        self.prev_window_flag = 0;
        self.prev_blocksize = 0;
    }

    fn metadata(&self) -> &[(String, String)] {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec_parameters::{AudioCodecParams, CodecParamsType};

    fn make_params(extra_data: Vec<u8>) -> CodecParameters {
        CodecParameters {
            codec_id: CodecId::Vorbis,
            extra_data,
            bit_rate: 0,
            params: CodecParamsType::Audio(AudioCodecParams {
                sample_rate: 0,
                channel_layout: ChannelLayout::STEREO,
                sample_format: SampleFormat::F32,
                frame_size: 0,
            }),
        }
    }

    fn build_ident_packet() -> Vec<u8> {
        let mut v = Vec::new();
        v.push(0x01);
        v.extend_from_slice(b"vorbis");
        v.extend_from_slice(&0u32.to_le_bytes());
        v.push(2);
        v.extend_from_slice(&44100u32.to_le_bytes());
        v.extend_from_slice(&[0u8; 12]);
        v.push((11 << 4) | 8);
        v.push(1);
        v
    }

    #[test]
    fn test_extra_data_中的identification头() {
        let mut dec = VorbisDecoder::create().unwrap();
        dec.open(&make_params(build_ident_packet())).unwrap();
        // identification 已消费, 下一包应为 comment
        let bad = Packet::from_data(vec![0xFFu8; 8]);
        assert!(dec.send_packet(&bad).is_err());
    }

    #[test]
    fn test_损坏头包进入终止态() {
        let mut dec = VorbisDecoder::create().unwrap();
        dec.open(&make_params(Vec::new())).unwrap();

        let bad = Packet::from_data(vec![0u8; 30]);
        assert!(dec.send_packet(&bad).is_err());
        // 终止态下任何后续调用都返回错误
        let good = Packet::from_data(build_ident_packet());
        assert!(matches!(
            dec.send_packet(&good).unwrap_err(),
            LingError::InvalidData(_)
        ));
        assert!(matches!(
            dec.receive_frame().unwrap_err(),
            LingError::InvalidData(_)
        ));
    }

    #[test]
    fn test_未打开时拒绝数据包() {
        let mut dec = VorbisDecoder::create().unwrap();
        let pkt = Packet::from_data(build_ident_packet());
        assert!(dec.send_packet(&pkt).is_err());
    }
}
