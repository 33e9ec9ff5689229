//! 统一错误类型定义.
//!
//! 所有 Ling crate 共用的错误类型, 支持跨模块传播.
//!
//! 错误分为三类传播策略:
//! - 码流损坏 (`InvalidData`): 不可恢复, 解码器进入终止态
//! - 格式不支持 (`Unsupported`): 在 setup 阶段报告, 构造失败
//! - 流结束 (`Eof`): 正常终止, 不是损坏意义上的错误

use thiserror::Error;

/// Ling 框架统一错误类型
#[derive(Debug, Error)]
pub enum LingError {
    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 不支持的格式或操作
    #[error("不支持的格式: {0}")]
    Unsupported(String),

    /// 编解码器错误
    #[error("编解码器错误: {0}")]
    Codec(String),

    /// 容器格式错误
    #[error("格式错误: {0}")]
    Format(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 数据不足, 需要更多输入
    #[error("数据不足, 需要更多输入")]
    NeedMoreData,

    /// 已到达流末尾
    #[error("已到达流末尾")]
    Eof,

    /// 未找到指定的编解码器
    #[error("未找到编解码器: {0}")]
    CodecNotFound(String),

    /// 未找到指定的容器格式
    #[error("未找到容器格式: {0}")]
    FormatNotFound(String),

    /// 无效数据 (损坏的码流等)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// 内部错误 (不应发生)
    #[error("内部错误: {0}")]
    Internal(String),
}

/// Ling 框架统一 Result 类型
pub type LingResult<T> = Result<T, LingError>;
