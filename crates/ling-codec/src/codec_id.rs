//! 编解码器标识符.
//!
//! 为每种编解码算法分配唯一标识, 与容器格式无关.

use std::fmt;

/// 编解码器标识符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CodecId {
    /// 未知编解码器
    None,
    /// Vorbis
    Vorbis,
    /// PCM 无符号 8 位
    PcmU8,
    /// PCM 有符号 16 位小端
    PcmS16le,
    /// PCM 32 位浮点小端
    PcmF32le,
}

impl CodecId {
    /// 获取编解码器的人类可读名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Vorbis => "vorbis",
            Self::PcmU8 => "pcm_u8",
            Self::PcmS16le => "pcm_s16le",
            Self::PcmF32le => "pcm_f32le",
        }
    }

    /// 是否为未压缩的 PCM 变体
    pub const fn is_pcm(&self) -> bool {
        matches!(self, Self::PcmU8 | Self::PcmS16le | Self::PcmF32le)
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
