//! 拉取式 PCM 读取器.
//!
//! `PcmReader` 把探测、解封装、解码与采样格式转换串成一条拉取管线:
//! 调用方请求 PCM 字节, 读取器按需从解封装器拉取 packet, 再从底层
//! 输入拉取字节. 实现 `std::io::Read`, 产出所选采样格式的交错 PCM;
//! 流结束时 `read` 返回 0 (io-EOF 语义). 码流损坏后读取器进入终止态,
//! 此后每次读取都返回同类错误.

use std::io::{self, Read};

use log::debug;
use ling_codec::codec_parameters::{AudioCodecParams, CodecParameters, CodecParamsType};
use ling_codec::{CodecId, Decoder, Encoder, Packet};
use ling_core::{LingError, LingResult, SampleFormat};
use ling_format::io::IoContext;
use ling_format::stream::StreamParams;
use ling_format::Demuxer;

/// 拉取式 PCM 读取器
///
/// 打开 Ogg/Vorbis 或 WAV 输入, 以请求的采样格式产出交错 PCM.
pub struct PcmReader {
    io: IoContext,
    demuxer: Box<dyn Demuxer>,
    decoder: Box<dyn Decoder>,
    /// F32 解码输出到整数请求格式的转换器
    converter: Option<Box<dyn Encoder>>,
    stream_index: usize,
    sample_format: SampleFormat,
    sample_rate: u32,
    channels: u32,
    duration_sec: Option<f64>,
    /// 已解码未取走的输出字节
    buffered: Vec<u8>,
    buf_pos: usize,
    demux_eof: bool,
    flushed: bool,
    /// 不可恢复错误后的终止态
    fatal: Option<String>,
}

impl std::fmt::Debug for PcmReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcmReader")
            .field("stream_index", &self.stream_index)
            .field("sample_format", &self.sample_format)
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("duration_sec", &self.duration_sec)
            .field("demux_eof", &self.demux_eof)
            .field("flushed", &self.flushed)
            .field("fatal", &self.fatal)
            .finish()
    }
}

impl PcmReader {
    /// 打开文件, 输出 S16LE PCM
    pub fn open(path: &str) -> LingResult<Self> {
        Self::open_with_format(path, SampleFormat::S16)
    }

    /// 打开文件, 指定输出采样格式 (U8 / S16 / F32)
    pub fn open_with_format(path: &str, format: SampleFormat) -> LingResult<Self> {
        let io = IoContext::open_read(path)?;
        Self::new(io, Some(path), format)
    }

    /// 从 I/O 上下文创建读取器
    ///
    /// 自动探测容器格式, 打开解封装器与解码器, 并完成头包解析;
    /// 格式不支持在此处即报告, 不会等到首次读取.
    pub fn new(
        mut io: IoContext,
        filename: Option<&str>,
        requested: SampleFormat,
    ) -> LingResult<Self> {
        if requested == SampleFormat::None {
            return Err(LingError::InvalidArgument(
                "必须指定输出采样格式".into(),
            ));
        }

        let format_registry = crate::default_format_registry();
        let codec_registry = crate::default_codec_registry();

        let demuxer = format_registry.open_input(&mut io, filename)?;
        let stream = demuxer
            .streams()
            .iter()
            .find(|s| matches!(s.params, StreamParams::Audio(_)))
            .cloned()
            .ok_or_else(|| LingError::Format("输入中没有音频流".into()))?;
        let audio = match &stream.params {
            StreamParams::Audio(a) => a.clone(),
            _ => unreachable!(),
        };

        let params = CodecParameters {
            codec_id: stream.codec_id,
            extra_data: stream.extra_data.clone(),
            bit_rate: audio.bit_rate,
            params: CodecParamsType::Audio(AudioCodecParams {
                sample_rate: audio.sample_rate,
                channel_layout: audio.channel_layout,
                sample_format: audio.sample_format,
                frame_size: audio.frame_size,
            }),
        };

        let mut decoder = codec_registry.create_decoder(stream.codec_id)?;
        decoder.open(&params)?;

        // 解码器的原生输出格式
        let native = match stream.codec_id {
            CodecId::Vorbis => SampleFormat::F32,
            CodecId::PcmU8 => SampleFormat::U8,
            CodecId::PcmS16le => SampleFormat::S16,
            CodecId::PcmF32le => SampleFormat::F32,
            other => {
                return Err(LingError::Unsupported(format!(
                    "不支持的音频编解码器: {}",
                    other,
                )));
            }
        };

        // 输出格式转换只提供 F32 -> 整数一条路径, 其余组合不做转换
        let converter = if requested == native {
            None
        } else if native == SampleFormat::F32
            && matches!(requested, SampleFormat::U8 | SampleFormat::S16)
        {
            let target = match requested {
                SampleFormat::U8 => CodecId::PcmU8,
                _ => CodecId::PcmS16le,
            };
            let mut encoder = codec_registry.create_encoder(target)?;
            encoder.open(&params)?;
            Some(encoder)
        } else {
            return Err(LingError::Unsupported(format!(
                "不支持把 {} 输出为 {}",
                native, requested,
            )));
        };

        let mut reader = Self {
            io,
            demuxer,
            decoder,
            converter,
            stream_index: stream.index,
            sample_format: requested,
            sample_rate: audio.sample_rate,
            channels: audio.channel_layout.channels,
            duration_sec: None,
            buffered: Vec::new(),
            buf_pos: 0,
            demux_eof: false,
            flushed: false,
            fatal: None,
        };
        reader.duration_sec = reader.demuxer.duration();

        // Vorbis 的 comment/setup 头包在首批 packet 中, 此处全部喂入
        // 使得格式错误在构造期暴露, 元数据立即可查
        if stream.codec_id == CodecId::Vorbis {
            let header_packets = if stream.extra_data.is_empty() { 3 } else { 2 };
            for _ in 0..header_packets {
                match reader.pump_one_packet() {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => return Err(e),
                }
            }
        }

        debug!(
            "PcmReader 就绪: {} Hz, {} 声道, 输出格式 {}",
            reader.sample_rate, reader.channels, reader.sample_format,
        );
        Ok(reader)
    }

    /// 输出采样格式
    pub fn sample_format(&self) -> SampleFormat {
        self.sample_format
    }

    /// 每采样位数
    pub fn bits_per_sample(&self) -> u32 {
        self.sample_format.bits_per_sample()
    }

    /// 采样率 (Hz)
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// 声道数
    pub fn channels(&self) -> u32 {
        self.channels
    }

    /// 时长 (秒), 不可定位的输入上为未知
    pub fn duration(&self) -> Option<f64> {
        self.duration_sec
    }

    /// 码流元数据 (Vorbis comment 等), 首项通常为 VENDOR
    pub fn metadata(&self) -> &[(String, String)] {
        self.decoder.metadata()
    }

    /// 按键查询注释, 如 `comment("TITLE")`
    pub fn comment(&self, name: &str) -> Option<&str> {
        self.decoder
            .metadata()
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// 向解码器喂入一个属于目标流的 packet
    ///
    /// 返回 false 表示解封装器已到流末尾 (解码器已收到 flush).
    fn pump_one_packet(&mut self) -> LingResult<bool> {
        loop {
            match self.demuxer.read_packet(&mut self.io) {
                Ok(pkt) => {
                    if pkt.stream_index != self.stream_index {
                        continue;
                    }
                    self.decoder.send_packet(&pkt)?;
                    return Ok(true);
                }
                Err(LingError::Eof) => {
                    self.demux_eof = true;
                    if !self.flushed {
                        self.flushed = true;
                        self.decoder.send_packet(&Packet::empty())?;
                    }
                    return Ok(false);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// 取出下一块输出字节; None 表示流已结束
    fn next_chunk(&mut self) -> LingResult<Option<Vec<u8>>> {
        loop {
            match self.decoder.receive_frame() {
                Ok(frame) => {
                    let bytes = match &mut self.converter {
                        Some(encoder) => {
                            encoder.send_frame(Some(&frame))?;
                            encoder.receive_packet()?.data.to_vec()
                        }
                        None => frame.data,
                    };
                    return Ok(Some(bytes));
                }
                Err(LingError::NeedMoreData) => {
                    if self.demux_eof {
                        if !self.flushed {
                            self.flushed = true;
                            self.decoder.send_packet(&Packet::empty())?;
                            continue;
                        }
                        return Ok(None);
                    }
                    self.pump_one_packet()?;
                }
                Err(LingError::Eof) => return Ok(None),
                Err(e) => return Err(e),
            }
        }
    }
}

/// 把框架错误映射为 I/O 错误
fn to_io_error(e: LingError) -> io::Error {
    let kind = match &e {
        LingError::InvalidData(_) => io::ErrorKind::InvalidData,
        LingError::Unsupported(_) => io::ErrorKind::Unsupported,
        LingError::Eof => io::ErrorKind::UnexpectedEof,
        _ => io::ErrorKind::Other,
    };
    io::Error::new(kind, e.to_string())
}

impl Read for PcmReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(msg) = &self.fatal {
            return Err(io::Error::new(io::ErrorKind::InvalidData, msg.clone()));
        }

        let mut written = 0;
        while written < buf.len() {
            // 先取走已解码的缓冲
            let available = self.buffered.len() - self.buf_pos;
            if available > 0 {
                let to_copy = available.min(buf.len() - written);
                buf[written..written + to_copy]
                    .copy_from_slice(&self.buffered[self.buf_pos..self.buf_pos + to_copy]);
                self.buf_pos += to_copy;
                written += to_copy;
                continue;
            }

            match self.next_chunk() {
                Ok(Some(bytes)) => {
                    self.buffered = bytes;
                    self.buf_pos = 0;
                }
                Ok(None) => break,
                Err(e) => {
                    let msg = e.to_string();
                    self.fatal = Some(msg);
                    return Err(to_io_error(e));
                }
            }
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ling_format::io::MemoryBackend;

    /// 构建单声道 S16LE WAV 文件字节
    fn make_wav_s16(pcm: &[u8], sample_rate: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&(36 + pcm.len() as u32).to_le_bytes());
        buf.extend_from_slice(b"WAVE");
        buf.extend_from_slice(b"fmt ");
        buf.extend_from_slice(&16u32.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes());
        buf.extend_from_slice(&sample_rate.to_le_bytes());
        buf.extend_from_slice(&(sample_rate * 2).to_le_bytes());
        buf.extend_from_slice(&2u16.to_le_bytes());
        buf.extend_from_slice(&16u16.to_le_bytes());
        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&(pcm.len() as u32).to_le_bytes());
        buf.extend_from_slice(pcm);
        buf
    }

    #[test]
    fn test_wav_直通读取() {
        let pcm: Vec<u8> = (0..64u8).collect();
        let io = IoContext::new(Box::new(MemoryBackend::from_data(make_wav_s16(&pcm, 8000))));
        let mut reader = PcmReader::new(io, None, SampleFormat::S16).unwrap();

        assert_eq!(reader.sample_rate(), 8000);
        assert_eq!(reader.channels(), 1);
        assert_eq!(reader.bits_per_sample(), 16);

        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, pcm);

        // 流尾之后继续读返回 0
        let mut buf = [0u8; 16];
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_不支持的格式转换() {
        let io = IoContext::new(Box::new(MemoryBackend::from_data(make_wav_s16(&[0; 4], 8000))));
        // WAV S16 源不提供到 U8 的转换
        let err = PcmReader::new(io, None, SampleFormat::U8).unwrap_err();
        assert!(matches!(err, LingError::Unsupported(_)));
    }

    #[test]
    fn test_必须指定输出格式() {
        let io = IoContext::new(Box::new(MemoryBackend::from_data(make_wav_s16(&[0; 4], 8000))));
        assert!(PcmReader::new(io, None, SampleFormat::None).is_err());
    }
}
