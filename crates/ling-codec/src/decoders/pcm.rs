//! PCM 音频解码器.
//!
//! 将未压缩的 PCM 数据从 Packet 转换为 AudioFrame.
//! 支持 3 种 PCM 变体 (U8/S16LE/F32LE), 共用解码逻辑.

use log::debug;
use ling_core::{ChannelLayout, LingError, LingResult, SampleFormat};

use crate::codec_id::CodecId;
use crate::codec_parameters::{CodecParameters, CodecParamsType};
use crate::decoder::Decoder;
use crate::frame::AudioFrame;
use crate::packet::Packet;

/// PCM 格式描述, 描述各 PCM 变体的差异
struct PcmFormatDesc {
    /// 编解码器 ID
    codec_id: CodecId,
    /// 码流中每个样本的字节数
    bytes_per_sample: u32,
    /// 输出的采样格式
    output_format: SampleFormat,
}

/// 获取指定 CodecId 的 PCM 格式描述
fn get_pcm_format_desc(codec_id: CodecId) -> Option<PcmFormatDesc> {
    Some(match codec_id {
        CodecId::PcmU8 => PcmFormatDesc {
            codec_id,
            bytes_per_sample: 1,
            output_format: SampleFormat::U8,
        },
        CodecId::PcmS16le => PcmFormatDesc {
            codec_id,
            bytes_per_sample: 2,
            output_format: SampleFormat::S16,
        },
        CodecId::PcmF32le => PcmFormatDesc {
            codec_id,
            bytes_per_sample: 4,
            output_format: SampleFormat::F32,
        },
        _ => return None,
    })
}

/// PCM 音频解码器
pub struct PcmDecoder {
    /// 格式描述
    desc: PcmFormatDesc,
    /// 采样率
    sample_rate: u32,
    /// 声道布局
    channel_layout: ChannelLayout,
    /// 每个样本块的字节数 (每样本字节数 * 声道数)
    block_align: u32,
    /// 已解码帧缓冲
    output_frame: Option<AudioFrame>,
    /// 是否已打开
    opened: bool,
    /// 是否已收到刷新信号
    flushing: bool,
}

impl PcmDecoder {
    /// 创建指定 PCM 变体的解码器工厂函数
    fn create(codec_id: CodecId) -> LingResult<Box<dyn Decoder>> {
        let desc = get_pcm_format_desc(codec_id)
            .ok_or_else(|| LingError::CodecNotFound(format!("不支持的 PCM 格式: {}", codec_id)))?;
        Ok(Box::new(Self {
            desc,
            sample_rate: 0,
            channel_layout: ChannelLayout::MONO,
            block_align: 0,
            output_frame: None,
            opened: false,
            flushing: false,
        }))
    }

    pub fn new_u8() -> LingResult<Box<dyn Decoder>> {
        Self::create(CodecId::PcmU8)
    }

    pub fn new_s16le() -> LingResult<Box<dyn Decoder>> {
        Self::create(CodecId::PcmS16le)
    }

    pub fn new_f32le() -> LingResult<Box<dyn Decoder>> {
        Self::create(CodecId::PcmF32le)
    }
}

impl Decoder for PcmDecoder {
    fn codec_id(&self) -> CodecId {
        self.desc.codec_id
    }

    fn name(&self) -> &str {
        self.desc.codec_id.name()
    }

    fn open(&mut self, params: &CodecParameters) -> LingResult<()> {
        let audio = match &params.params {
            CodecParamsType::Audio(a) => a,
            _ => {
                return Err(LingError::InvalidArgument("PCM 解码器需要音频参数".into()));
            }
        };

        if audio.sample_rate == 0 {
            return Err(LingError::InvalidArgument("采样率不能为 0".into()));
        }
        if audio.channel_layout.channels == 0 {
            return Err(LingError::InvalidArgument("声道数不能为 0".into()));
        }

        self.sample_rate = audio.sample_rate;
        self.channel_layout = audio.channel_layout;
        self.block_align = self.desc.bytes_per_sample * audio.channel_layout.channels;
        self.output_frame = None;
        self.opened = true;
        self.flushing = false;

        debug!(
            "打开 {} 解码器: {} Hz, {} 声道",
            self.name(),
            self.sample_rate,
            self.channel_layout.channels,
        );
        Ok(())
    }

    fn send_packet(&mut self, packet: &Packet) -> LingResult<()> {
        if !self.opened {
            return Err(LingError::Codec("PCM 解码器未打开, 请先调用 open()".into()));
        }
        if self.output_frame.is_some() {
            return Err(LingError::NeedMoreData);
        }
        if packet.is_empty() {
            self.flushing = true;
            return Ok(());
        }

        if packet.data.len() % self.block_align as usize != 0 {
            return Err(LingError::InvalidData(format!(
                "PCM 数据包长度 {} 未对齐到块大小 {}",
                packet.data.len(),
                self.block_align,
            )));
        }

        let nb_samples = (packet.data.len() / self.block_align as usize) as u32;
        let mut frame = AudioFrame::new(
            nb_samples,
            self.sample_rate,
            self.desc.output_format,
            self.channel_layout,
        );
        frame.data = packet.data.to_vec();
        frame.pts = packet.pts;
        frame.time_base = packet.time_base;
        frame.duration = i64::from(nb_samples);

        self.output_frame = Some(frame);
        Ok(())
    }

    fn receive_frame(&mut self) -> LingResult<AudioFrame> {
        if let Some(frame) = self.output_frame.take() {
            return Ok(frame);
        }
        if self.flushing {
            return Err(LingError::Eof);
        }
        Err(LingError::NeedMoreData)
    }

    fn flush(&mut self) {
        self.output_frame = None;
        self.flushing = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec_parameters::AudioCodecParams;

    fn make_audio_params(codec_id: CodecId, channels: u32) -> CodecParameters {
        CodecParameters {
            codec_id,
            extra_data: Vec::new(),
            bit_rate: 0,
            params: CodecParamsType::Audio(AudioCodecParams {
                sample_rate: 44100,
                channel_layout: ChannelLayout::from_channels(channels),
                sample_format: SampleFormat::None,
                frame_size: 0,
            }),
        }
    }

    #[test]
    fn test_s16le_解码() {
        let mut dec = PcmDecoder::new_s16le().unwrap();
        dec.open(&make_audio_params(CodecId::PcmS16le, 2)).unwrap();

        // 2 采样 * 2 声道 * 2 字节
        let data: Vec<u8> = vec![0x00, 0x01, 0xFF, 0x7F, 0x00, 0x80, 0x01, 0x00];
        let pkt = Packet::from_data(data.clone());
        dec.send_packet(&pkt).unwrap();

        let frame = dec.receive_frame().unwrap();
        assert_eq!(frame.nb_samples, 2);
        assert_eq!(frame.sample_format, SampleFormat::S16);
        assert_eq!(frame.data, data);
    }

    #[test]
    fn test_未对齐数据包报错() {
        let mut dec = PcmDecoder::new_s16le().unwrap();
        dec.open(&make_audio_params(CodecId::PcmS16le, 2)).unwrap();

        let pkt = Packet::from_data(vec![0u8; 7]);
        let err = dec.send_packet(&pkt).unwrap_err();
        assert!(matches!(err, LingError::InvalidData(_)));
    }

    #[test]
    fn test_flush_后返回_eof() {
        let mut dec = PcmDecoder::new_u8().unwrap();
        dec.open(&make_audio_params(CodecId::PcmU8, 1)).unwrap();

        dec.send_packet(&Packet::empty()).unwrap();
        assert!(matches!(dec.receive_frame().unwrap_err(), LingError::Eof));
    }
}
