//! 编解码器参数.
//!
//! 描述编解码器的配置参数, 通常从容器格式中提取.

use ling_core::{ChannelLayout, SampleFormat};

use crate::codec_id::CodecId;

/// 编解码器参数
#[derive(Debug, Clone)]
pub struct CodecParameters {
    /// 编解码器标识
    pub codec_id: CodecId,
    /// 额外数据 (如 Vorbis identification 头包)
    pub extra_data: Vec<u8>,
    /// 码率 (bits/s)
    pub bit_rate: u64,
    /// 媒体类型特定参数
    pub params: CodecParamsType,
}

/// 媒体类型特定参数
#[derive(Debug, Clone)]
pub enum CodecParamsType {
    /// 音频参数
    Audio(AudioCodecParams),
    /// 无特定参数
    None,
}

/// 音频编解码器参数
#[derive(Debug, Clone)]
pub struct AudioCodecParams {
    /// 采样率 (Hz)
    pub sample_rate: u32,
    /// 声道布局
    pub channel_layout: ChannelLayout,
    /// 采样格式
    pub sample_format: SampleFormat,
    /// 每帧采样数 (0 表示可变)
    pub frame_size: u32,
}

impl CodecParameters {
    /// 获取音频参数 (如果是音频流)
    pub fn audio(&self) -> Option<&AudioCodecParams> {
        match &self.params {
            CodecParamsType::Audio(a) => Some(a),
            _ => None,
        }
    }
}
