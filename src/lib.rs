//! # Ling (聆)
//!
//! 纯 Rust 实现的 Ogg/Vorbis 音频解码框架.
//!
//! Ling 提供从容器到 PCM 的完整音频解码能力:
//! - **解码**: Vorbis (从零实现, 遵循 Vorbis I 规范), PCM
//! - **容器格式**: Ogg 解封装, WAV 读写
//! - **PCM 输出**: U8 / S16LE / F32LE 交错采样
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use ling::PcmReader;
//! use std::io::Read;
//!
//! let mut reader = PcmReader::open("music.ogg").unwrap();
//! println!("{} Hz, {} 声道", reader.sample_rate(), reader.channels());
//! let mut pcm = Vec::new();
//! reader.read_to_end(&mut pcm).unwrap();
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `ling-core` | 核心类型与工具 |
//! | `ling-codec` | 编解码器框架 |
//! | `ling-format` | 容器格式框架 |

/// 核心类型与工具
pub use ling_core as core;

/// 编解码器框架
pub use ling_codec as codec;

/// 容器格式框架
pub use ling_format as format;

mod pcm;

pub use pcm::PcmReader;

/// 获取 Ling 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// 创建已注册所有内置编解码器的注册表
pub fn default_codec_registry() -> ling_codec::CodecRegistry {
    let mut registry = ling_codec::CodecRegistry::new();
    ling_codec::register_all(&mut registry);
    registry
}

/// 创建已注册所有内置容器格式的注册表
pub fn default_format_registry() -> ling_format::FormatRegistry {
    let mut registry = ling_format::FormatRegistry::new();
    ling_format::register_all(&mut registry);
    registry
}
