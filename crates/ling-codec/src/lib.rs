//! # ling-codec
//!
//! Ling 音频框架编解码库, 提供编解码器框架与 Packet/Frame 抽象.
//!
//! 本 crate 定义了编解码器注册、解码流程的核心抽象.
//!
//! ## 支持的编解码器
//!
//! - **解码器**: Vorbis, PCM (U8/S16LE/F32LE)
//! - **编码器**: PCM (U8/S16LE/F32LE, 含 F32 帧到整数格式的转换)
//!
//! ## 使用示例
//!
//! ```rust
//! use ling_codec::{CodecRegistry, CodecId};
//!
//! let mut reg = CodecRegistry::new();
//! ling_codec::register_all(&mut reg);
//!
//! // 按 CodecId 创建编解码器实例
//! let decoder = reg.create_decoder(CodecId::Vorbis).unwrap();
//! let encoder = reg.create_encoder(CodecId::PcmS16le).unwrap();
//! ```

pub mod codec_id;
pub mod codec_parameters;
pub mod decoder;
pub mod decoders;
pub mod encoder;
pub mod encoders;
pub mod frame;
pub mod packet;
pub mod registry;

// 重导出常用类型
pub use codec_id::CodecId;
pub use codec_parameters::{AudioCodecParams, CodecParameters, CodecParamsType};
pub use decoder::Decoder;
pub use encoder::Encoder;
pub use frame::AudioFrame;
pub use packet::Packet;
pub use registry::CodecRegistry;

/// 注册所有内置编解码器
pub fn register_all(registry: &mut CodecRegistry) {
    decoders::register_all_decoders(registry);
    encoders::register_all_encoders(registry);
}
