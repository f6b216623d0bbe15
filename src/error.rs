//! 统一错误处理框架
//!
//! 覆盖完整错误分类的核心错误类型定义：
//! 前置条件违规、资源耗尽、格式/解码失败、内部一致性失败。

use std::fmt;
use std::io;

/// 采样引擎相关的统一错误类型
#[derive(Debug)]
pub enum AudioError {
    /// 引擎尚未初始化（或已退出）
    NotInitialized,

    /// 输入验证错误（空路径、未知采样句柄、非法缓冲区大小等）
    InvalidInput(String),

    /// 文件I/O错误
    IoError(io::Error),

    /// 音频格式错误（无解码器接受该流）
    FormatError(String),

    /// 解码过程失败（后端read/seek/rewind报错）
    DecodingError(String),

    /// 采样已处于错误状态，需先seek/rewind恢复
    PreviousError,

    /// 采样已到达EOF，无法继续解码
    AlreadyAtEof,

    /// 采样不支持定位
    NotSeekable,

    /// 内存不足错误
    OutOfMemory,

    /// 内部一致性错误（注册表状态异常）
    InternalError(String),
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioError::NotInitialized => write!(f, "引擎尚未初始化"),
            AudioError::InvalidInput(msg) => write!(f, "输入验证失败: {msg}"),
            AudioError::IoError(err) => write!(f, "文件I/O错误: {err}"),
            AudioError::FormatError(msg) => write!(f, "音频格式错误: {msg}"),
            AudioError::DecodingError(msg) => write!(f, "音频解码失败: {msg}"),
            AudioError::PreviousError => write!(f, "采样处于错误状态，需要先seek或rewind"),
            AudioError::AlreadyAtEof => write!(f, "采样已到达EOF"),
            AudioError::NotSeekable => write!(f, "采样不支持定位"),
            AudioError::OutOfMemory => write!(f, "内存不足"),
            AudioError::InternalError(msg) => write!(f, "内部一致性错误: {msg}"),
        }
    }
}

impl std::error::Error for AudioError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AudioError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for AudioError {
    fn from(err: io::Error) -> Self {
        AudioError::IoError(err)
    }
}

/// 音频处理结果类型别名
pub type AudioResult<T> = Result<T, AudioError>;
