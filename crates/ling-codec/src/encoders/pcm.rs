//! PCM 音频编码器.
//!
//! 将 AudioFrame 的采样数据转换为 Packet.
//! 支持 3 种 PCM 变体 (U8/S16LE/F32LE), 共用编码逻辑.
//!
//! 除同格式直接拷贝外, 编码器接受 F32 输入帧并转换为目标整数格式,
//! 这是解码管线 (Vorbis 解码输出 F32) 到 PCM 输出的标准路径:
//! - U8: `round(x*127) + 128`, 截断到 [0, 255]
//! - S16: `round(x*32767)`, 饱和截断, 小端
//! - F32: 位模式原样, 小端

use bytes::Bytes;
use log::debug;
use ling_core::{ChannelLayout, LingError, LingResult, SampleFormat};

use crate::codec_id::CodecId;
use crate::codec_parameters::{CodecParameters, CodecParamsType};
use crate::encoder::Encoder;
use crate::frame::AudioFrame;
use crate::packet::Packet;

/// PCM 编码格式描述
struct PcmEncodeDesc {
    /// 编解码器 ID
    codec_id: CodecId,
    /// 同格式输入的采样格式
    native_format: SampleFormat,
    /// 输出码流中每个样本的字节数
    bytes_per_sample: u32,
}

/// 获取指定 CodecId 的 PCM 编码格式描述
fn get_pcm_encode_desc(codec_id: CodecId) -> Option<PcmEncodeDesc> {
    Some(match codec_id {
        CodecId::PcmU8 => PcmEncodeDesc {
            codec_id,
            native_format: SampleFormat::U8,
            bytes_per_sample: 1,
        },
        CodecId::PcmS16le => PcmEncodeDesc {
            codec_id,
            native_format: SampleFormat::S16,
            bytes_per_sample: 2,
        },
        CodecId::PcmF32le => PcmEncodeDesc {
            codec_id,
            native_format: SampleFormat::F32,
            bytes_per_sample: 4,
        },
        _ => return None,
    })
}

/// 将 F32 采样转换为无符号 8 位, 静音点 128
fn convert_f32_to_u8(src: &[u8], dst: &mut Vec<u8>) {
    for chunk in src.chunks_exact(4) {
        let x = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        dst.push(((x * 127.0).round() + 128.0) as u8);
    }
}

/// 将 F32 采样转换为有符号 16 位小端, 饱和截断
fn convert_f32_to_s16le(src: &[u8], dst: &mut Vec<u8>) {
    for chunk in src.chunks_exact(4) {
        let x = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        let v = (x * 32767.0).round() as i16;
        dst.extend_from_slice(&v.to_le_bytes());
    }
}

/// PCM 音频编码器
pub struct PcmEncoder {
    /// 编码格式描述
    desc: PcmEncodeDesc,
    /// 采样率
    sample_rate: u32,
    /// 声道布局
    channel_layout: ChannelLayout,
    /// 输出数据包缓冲
    output_packet: Option<Packet>,
    /// 是否已打开
    opened: bool,
    /// 是否已收到刷新信号
    flushing: bool,
}

impl PcmEncoder {
    fn create(codec_id: CodecId) -> LingResult<Box<dyn Encoder>> {
        let desc = get_pcm_encode_desc(codec_id)
            .ok_or_else(|| LingError::CodecNotFound(format!("不支持的 PCM 格式: {}", codec_id)))?;
        Ok(Box::new(Self {
            desc,
            sample_rate: 0,
            channel_layout: ChannelLayout::MONO,
            output_packet: None,
            opened: false,
            flushing: false,
        }))
    }

    pub fn new_u8() -> LingResult<Box<dyn Encoder>> {
        Self::create(CodecId::PcmU8)
    }

    pub fn new_s16le() -> LingResult<Box<dyn Encoder>> {
        Self::create(CodecId::PcmS16le)
    }

    pub fn new_f32le() -> LingResult<Box<dyn Encoder>> {
        Self::create(CodecId::PcmF32le)
    }
}

impl Encoder for PcmEncoder {
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
                return Err(LingError::InvalidArgument("PCM 编码器需要音频参数".into()));
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
        self.output_packet = None;
        self.opened = true;
        self.flushing = false;

        debug!(
            "打开 {} 编码器: {} Hz, {} 声道",
            self.name(),
            self.sample_rate,
            self.channel_layout.channels,
        );
        Ok(())
    }

    fn send_frame(&mut self, frame: Option<&AudioFrame>) -> LingResult<()> {
        if !self.opened {
            return Err(LingError::Codec("编码器未打开, 请先调用 open()".into()));
        }
        if self.output_packet.is_some() {
            return Err(LingError::NeedMoreData);
        }

        let frame = match frame {
            Some(f) => f,
            None => {
                self.flushing = true;
                return Ok(());
            }
        };

        let output_size = frame.nb_samples as usize
            * self.channel_layout.channels as usize
            * self.desc.bytes_per_sample as usize;
        let mut encoded = Vec::with_capacity(output_size);

        if frame.sample_format == self.desc.native_format {
            encoded.extend_from_slice(&frame.data);
        } else if frame.sample_format == SampleFormat::F32 {
            match self.desc.codec_id {
                CodecId::PcmU8 => convert_f32_to_u8(&frame.data, &mut encoded),
                CodecId::PcmS16le => convert_f32_to_s16le(&frame.data, &mut encoded),
                _ => {
                    return Err(LingError::Internal("PCM 编码格式分派非法".into()));
                }
            }
        } else {
            return Err(LingError::InvalidArgument(format!(
                "期望采样格式 {} 或 flt, 实际为 {}",
                self.desc.native_format, frame.sample_format,
            )));
        }

        let mut pkt = Packet::from_data(Bytes::from(encoded));
        pkt.pts = frame.pts;
        pkt.dts = frame.pts;
        pkt.duration = frame.duration;
        pkt.time_base = frame.time_base;
        pkt.is_keyframe = true;

        self.output_packet = Some(pkt);
        Ok(())
    }

    fn receive_packet(&mut self) -> LingResult<Packet> {
        if let Some(pkt) = self.output_packet.take() {
            return Ok(pkt);
        }
        if self.flushing {
            return Err(LingError::Eof);
        }
        Err(LingError::NeedMoreData)
    }

    fn flush(&mut self) {
        self.output_packet = None;
        self.flushing = false;
    }
}
