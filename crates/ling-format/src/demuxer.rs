//! 解封装器 (Demuxer) trait 定义.
//!
//! 定义了从容器格式中读取数据包的接口. 读取是严格前向的:
//! 不提供按时间定位的操作, 需要重新开始只能重新打开输入.

use ling_codec::Packet;
use ling_core::LingResult;

use crate::format_id::FormatId;
use crate::io::IoContext;
use crate::stream::Stream;

/// 解封装器 trait
///
/// 从容器格式中读取压缩数据包. 所有格式的解封装器都实现此 trait.
///
/// 使用流程:
/// 1. 调用 `open()` 打开容器并解析头部
/// 2. 调用 `streams()` 获取流信息
/// 3. 循环调用 `read_packet()` 读取数据包, 直到返回 `Eof`
pub trait Demuxer: Send {
    /// 获取格式标识
    fn format_id(&self) -> FormatId;

    /// 获取格式名称
    fn name(&self) -> &str;

    /// 打开容器并解析头部信息
    ///
    /// 读取容器头部, 解析出所有流的信息.
    fn open(&mut self, io: &mut IoContext) -> LingResult<()>;

    /// 获取所有流信息
    fn streams(&self) -> &[Stream];

    /// 读取下一个数据包
    ///
    /// # 返回
    /// - `Ok(packet)`: 成功读取一个数据包
    /// - `Err(LingError::Eof)`: 已到达流末尾 (正常终止)
    /// - `Err(LingError::InvalidData)`: 容器数据损坏
    fn read_packet(&mut self, io: &mut IoContext) -> LingResult<Packet>;

    /// 获取容器时长 (秒), None 表示未知
    ///
    /// 时长通常需要扫描到容器末尾才可知; 不可定位的输入上返回 None.
    fn duration(&self) -> Option<f64>;

    /// 获取容器元数据
    fn metadata(&self) -> &[(String, String)] {
        &[]
    }
}
