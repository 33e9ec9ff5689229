//! 编码器实现模块.

pub mod pcm;

use crate::codec_id::CodecId;
use crate::registry::CodecRegistry;

/// 注册所有内置编码器
pub fn register_all_encoders(registry: &mut CodecRegistry) {
    registry.register_encoder(CodecId::PcmU8, "pcm_u8", pcm::PcmEncoder::new_u8);
    registry.register_encoder(CodecId::PcmS16le, "pcm_s16le", pcm::PcmEncoder::new_s16le);
    registry.register_encoder(CodecId::PcmF32le, "pcm_f32le", pcm::PcmEncoder::new_f32le);
}
