//! SampleKit 音频采样引擎
//!
//! 轻量级的音频解码调度与采样生命周期管理：解码器表在运行时
//! 装配，格式调度器按"扩展名提示优先、暴力探测兜底"的两轮
//! 策略为字节流匹配后端，采样注册表跟踪所有存活会话以便退出
//! 时整体清理。
//!
//! ## 核心特性
//! - 显式引擎上下文，多实例相互隔离，drop即清理
//! - 运行时注册的解码后端（内置WAV/MP3/Vorbis/FLAC）
//! - 两轮格式调度：扩展名软提示 + 内容嗅探兜底
//! - 会话标志位状态机（EOF/ERROR/EAGAIN/CANSEEK）
//! - 线程粒度的最近错误池
//!
//! ## 使用示例
//!
//! ```no_run
//! use samplekit::SampleEngine;
//! use samplekit::constants::DEFAULT_BUFFER_SIZE;
//!
//! let mut engine = SampleEngine::with_default_backends();
//! engine.init().unwrap();
//!
//! let id = engine.new_sample_from_file("music.ogg", None, DEFAULT_BUFFER_SIZE).unwrap();
//! let total = engine.decode_all(id).unwrap();
//! println!("解码 {total} 字节, 时长 {}ms", engine.duration(id).unwrap());
//! engine.free_sample(id).unwrap();
//! ```

pub mod backend;
pub mod constants;
pub mod error;
pub mod format;
pub mod sample;
pub mod stream;

mod engine;

// 重新导出核心类型
pub use backend::{DecoderBackend, DecoderInfo, SymphoniaBackend, WavBackend};
pub use engine::{SampleEngine, SampleEngineBuilder};
pub use error::{AudioError, AudioResult};
pub use format::{AudioInfo, DesiredAudioSpec, SampleFormat};
pub use sample::{DecodeAccess, Sample, SampleFlags, SampleId};
pub use stream::{MediaStream, StreamHandle};

/// 链接的库版本号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

/// 返回当前链接的samplekit版本
pub fn linked_version() -> Version {
    Version {
        major: env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0),
        minor: env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0),
        patch: env!("CARGO_PKG_VERSION_PATCH").parse().unwrap_or(0),
    }
}
