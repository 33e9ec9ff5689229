//! WAV (RIFF WAVE) 封装器.
//!
//! 将 PCM 音频数据写入标准 WAV 文件.
//!
//! 写入流程:
//! 1. `write_header()` - 写入 RIFF 和 fmt 块, 预留 data 块大小
//! 2. `write_packet()` - 追加 PCM 数据
//! 3. `write_trailer()` - 回填 RIFF 大小和 data 块大小, 奇数长度补齐

use log::debug;
use ling_codec::{CodecId, Packet};
use ling_core::{LingError, LingResult};

use crate::format_id::FormatId;
use crate::io::IoContext;
use crate::muxer::Muxer;
use crate::stream::{Stream, StreamParams};

/// WAV 音频格式码: PCM 整数
const WAV_FORMAT_PCM: u16 = 0x0001;
/// WAV 音频格式码: IEEE 浮点
const WAV_FORMAT_IEEE_FLOAT: u16 = 0x0003;

/// RIFF 大小字段的固定偏移
const RIFF_SIZE_OFFSET: u64 = 4;
/// data 块大小字段的固定偏移: 12 (RIFF) + 24 (fmt) + 4 (data tag)
const DATA_SIZE_OFFSET: u64 = 40;

/// WAV 封装器
pub struct WavMuxer {
    /// 已写入的数据字节数
    data_written: u64,
    /// 头部是否已写入
    header_written: bool,
}

impl WavMuxer {
    /// 创建 WAV 封装器实例 (工厂函数)
    pub fn create() -> LingResult<Box<dyn Muxer>> {
        Ok(Box::new(Self {
            data_written: 0,
            header_written: false,
        }))
    }

    /// 根据 CodecId 确定 WAV 格式码和位深
    fn resolve_wav_format(codec_id: CodecId) -> LingResult<(u16, u16)> {
        match codec_id {
            CodecId::PcmU8 => Ok((WAV_FORMAT_PCM, 8)),
            CodecId::PcmS16le => Ok((WAV_FORMAT_PCM, 16)),
            CodecId::PcmF32le => Ok((WAV_FORMAT_IEEE_FLOAT, 32)),
            _ => Err(LingError::Unsupported(format!(
                "WAV 不支持编解码器: {}",
                codec_id,
            ))),
        }
    }
}

impl Muxer for WavMuxer {
    fn format_id(&self) -> FormatId {
        FormatId::Wav
    }

    fn name(&self) -> &str {
        "wav"
    }

    fn write_header(&mut self, io: &mut IoContext, streams: &[Stream]) -> LingResult<()> {
        // WAV 只支持单个音频流
        if streams.len() != 1 {
            return Err(LingError::InvalidArgument("WAV 仅支持单个音频流".into()));
        }

        let stream = &streams[0];
        let audio = match &stream.params {
            StreamParams::Audio(a) => a,
            _ => {
                return Err(LingError::InvalidArgument("WAV 仅支持音频流".into()));
            }
        };

        let (audio_format, bits_per_sample) = Self::resolve_wav_format(stream.codec_id)?;
        let channels = audio.channel_layout.channels as u16;
        let sample_rate = audio.sample_rate;
        let block_align = channels * (bits_per_sample / 8);
        let byte_rate = sample_rate * u32::from(block_align);

        // RIFF header
        io.write_tag(b"RIFF")?;
        io.write_u32_le(0)?; // 占位, trailer 中回填
        io.write_tag(b"WAVE")?;

        // fmt chunk
        io.write_tag(b"fmt ")?;
        io.write_u32_le(16)?; // 标准 PCM fmt 块大小
        io.write_u16_le(audio_format)?;
        io.write_u16_le(channels)?;
        io.write_u32_le(sample_rate)?;
        io.write_u32_le(byte_rate)?;
        io.write_u16_le(block_align)?;
        io.write_u16_le(bits_per_sample)?;

        // data chunk header
        io.write_tag(b"data")?;
        io.write_u32_le(0)?; // 占位, trailer 中回填

        self.data_written = 0;
        self.header_written = true;

        debug!(
            "WAV 写入头部: {} Hz, {} 声道, {} 位",
            sample_rate, channels, bits_per_sample,
        );

        Ok(())
    }

    fn write_packet(&mut self, io: &mut IoContext, packet: &Packet) -> LingResult<()> {
        if !self.header_written {
            return Err(LingError::InvalidArgument(
                "WAV 头部未写入, 请先调用 write_header()".into(),
            ));
        }
        io.write_all(&packet.data)?;
        self.data_written += packet.data.len() as u64;
        Ok(())
    }

    fn write_trailer(&mut self, io: &mut IoContext) -> LingResult<()> {
        // RIFF 块要求偶数对齐, 奇数长度的 data 块补 1 个填充字节
        let padded = self.data_written % 2 != 0;
        if padded {
            io.write_u8(0)?;
        }

        if !io.is_seekable() {
            debug!("WAV 输出不支持 seek, 无法回填大小字段");
            return Ok(());
        }

        let data_size = self.data_written as u32;
        let riff_size = 36 + data_size + u32::from(padded);

        // 回填 RIFF 大小
        io.seek(std::io::SeekFrom::Start(RIFF_SIZE_OFFSET))?;
        io.write_u32_le(riff_size)?;

        // 回填 data 块大小
        io.seek(std::io::SeekFrom::Start(DATA_SIZE_OFFSET))?;
        io.write_u32_le(data_size)?;

        debug!(
            "WAV 写入尾部: riff_size={}, data_size={}",
            riff_size, data_size,
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demuxers::wav::WavDemuxer;
    use crate::demuxer::Demuxer;
    use crate::io::MemoryBackend;
    use ling_core::{ChannelLayout, Rational, SampleFormat};

    use crate::stream::AudioStreamParams;

    fn make_audio_stream(codec_id: CodecId, sample_rate: u32, channels: u32) -> Stream {
        Stream {
            index: 0,
            codec_id,
            time_base: Rational::new(1, sample_rate as i32),
            duration: 0,
            nb_frames: 0,
            extra_data: Vec::new(),
            params: StreamParams::Audio(AudioStreamParams {
                sample_rate,
                channel_layout: ChannelLayout::from_channels(channels),
                sample_format: SampleFormat::S16,
                bit_rate: 0,
                frame_size: 0,
            }),
            metadata: Vec::new(),
        }
    }

    /// 封装到内存, 返回完整文件字节
    fn mux_to_memory(codec_id: CodecId, channels: u32, pcm: &[u8]) -> Vec<u8> {
        let mut io = IoContext::new(Box::new(MemoryBackend::new()));
        let stream = make_audio_stream(codec_id, 44100, channels);
        let mut muxer = WavMuxer::create().unwrap();
        muxer.write_header(&mut io, &[stream]).unwrap();
        let pkt = Packet::from_data(bytes::Bytes::copy_from_slice(pcm));
        muxer.write_packet(&mut io, &pkt).unwrap();
        muxer.write_trailer(&mut io).unwrap();
        io.seek(std::io::SeekFrom::Start(0)).unwrap();
        let size = io.size().unwrap() as usize;
        io.read_bytes(size).unwrap()
    }

    #[test]
    fn test_封装_头部布局() {
        let pcm = vec![0x00, 0x01, 0xFF, 0x7F];
        let bytes = mux_to_memory(CodecId::PcmS16le, 1, &pcm);

        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(&bytes[36..40], b"data");
        // 回填的大小字段
        let riff_size = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let data_size = u32::from_le_bytes([bytes[40], bytes[41], bytes[42], bytes[43]]);
        assert_eq!(data_size, 4);
        assert_eq!(riff_size, 36 + 4);
        assert_eq!(&bytes[44..], &pcm[..]);
    }

    #[test]
    fn test_封装_浮点格式码() {
        let pcm = 0.5f32.to_le_bytes();
        let bytes = mux_to_memory(CodecId::PcmF32le, 1, &pcm);
        let format = u16::from_le_bytes([bytes[20], bytes[21]]);
        let bits = u16::from_le_bytes([bytes[34], bytes[35]]);
        assert_eq!(format, WAV_FORMAT_IEEE_FLOAT);
        assert_eq!(bits, 32);
    }

    #[test]
    fn test_封装_奇数长度补齐() {
        let pcm = vec![0x7Fu8; 3];
        let bytes = mux_to_memory(CodecId::PcmU8, 1, &pcm);
        let riff_size = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let data_size = u32::from_le_bytes([bytes[40], bytes[41], bytes[42], bytes[43]]);
        assert_eq!(data_size, 3);
        // 文件整体包含 1 个填充字节
        assert_eq!(riff_size, 36 + 3 + 1);
        assert_eq!(bytes.len(), 44 + 4);
    }

    #[test]
    fn test_封装解封装_往返() {
        let pcm_data = vec![
            0x01, 0x00, 0x02, 0x00, // 采样 0: L, R
            0x03, 0x00, 0x04, 0x00, // 采样 1: L, R
            0x05, 0x00, 0x06, 0x00, // 采样 2: L, R
        ];
        let bytes = mux_to_memory(CodecId::PcmS16le, 2, &pcm_data);

        let mut io = IoContext::new(Box::new(MemoryBackend::from_data(bytes)));
        let mut demuxer = WavDemuxer::create().unwrap();
        demuxer.open(&mut io).unwrap();
        assert_eq!(demuxer.streams()[0].codec_id, CodecId::PcmS16le);

        let pkt = demuxer.read_packet(&mut io).unwrap();
        assert_eq!(&pkt.data[..], &pcm_data[..]);
    }

    #[test]
    fn test_不支持的编解码器() {
        let mut io = IoContext::new(Box::new(MemoryBackend::new()));
        let stream = make_audio_stream(CodecId::Vorbis, 44100, 2);
        let mut muxer = WavMuxer::create().unwrap();
        assert!(matches!(
            muxer.write_header(&mut io, &[stream]).unwrap_err(),
            LingError::Unsupported(_)
        ));
    }
}
