//! 编码器 trait 定义.

use ling_core::LingResult;

use crate::codec_id::CodecId;
use crate::codec_parameters::CodecParameters;
use crate::frame::AudioFrame;
use crate::packet::Packet;

/// 编码器 trait
///
/// 编码流程:
/// 1. 调用 `open()` 配置编码器
/// 2. 调用 `send_frame()` 送入原始音频帧
/// 3. 调用 `receive_packet()` 取出编码后的数据包
/// 4. 送入 `None` 表示刷新 (flush), 获取缓存包
pub trait Encoder: Send {
    /// 获取编码器标识
    fn codec_id(&self) -> CodecId;

    /// 获取编码器名称
    fn name(&self) -> &str;

    /// 使用参数配置编码器
    fn open(&mut self, params: &CodecParameters) -> LingResult<()>;

    /// 送入一帧原始音频数据
    ///
    /// # 参数
    /// - `frame`: 原始音频帧. 送入 `None` 表示刷新 (flush).
    fn send_frame(&mut self, frame: Option<&AudioFrame>) -> LingResult<()>;

    /// 从编码器取出一个编码后的数据包
    ///
    /// # 返回
    /// - `Ok(packet)`: 成功取出一个数据包
    /// - `Err(LingError::NeedMoreData)`: 需要送入更多帧
    /// - `Err(LingError::Eof)`: 所有数据包已取出
    fn receive_packet(&mut self) -> LingResult<Packet>;

    /// 刷新编码器, 清空内部状态
    fn flush(&mut self);
}
