//! 音频格式描述类型
//!
//! 定义采样格式、实际/期望格式三元组。期望格式允许部分留空，
//! 解码器绑定成功后用实际格式回填未指定字段。

use crate::error::{AudioError, AudioResult};

/// PCM采样格式
///
/// 解码后端产出的原生字节布局，均为本机字节序。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum SampleFormat {
    /// 无符号8位
    U8,
    /// 有符号16位
    S16,
    /// 有符号32位（24位源左移8位对齐至满量程）
    S32,
    /// 32位浮点
    F32,
}

impl SampleFormat {
    /// 单个采样占用的字节数
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::S16 => 2,
            SampleFormat::S32 => 4,
            SampleFormat::F32 => 4,
        }
    }
}

/// 音频格式信息三元组
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AudioInfo {
    /// 采样格式
    pub format: SampleFormat,

    /// 声道数
    pub channels: u16,

    /// 采样率 (Hz)
    pub rate: u32,
}

impl AudioInfo {
    /// 创建新的格式信息
    pub fn new(format: SampleFormat, channels: u16, rate: u32) -> Self {
        Self {
            format,
            channels,
            rate,
        }
    }

    /// 验证格式参数的有效性
    pub fn validate(&self) -> AudioResult<()> {
        if self.channels == 0 {
            return Err(AudioError::FormatError("声道数不能为0".to_string()));
        }
        if self.channels > 32 {
            return Err(AudioError::FormatError("声道数不能超过32".to_string()));
        }
        if self.rate == 0 {
            return Err(AudioError::FormatError("采样率不能为0".to_string()));
        }
        if self.rate > 384_000 {
            return Err(AudioError::FormatError(format!(
                "采样率({})超出支持范围(最大384kHz)",
                self.rate
            )));
        }
        Ok(())
    }

    /// 单帧字节数（采样宽度 × 声道数）
    pub fn frame_size(&self) -> usize {
        self.format.bytes_per_sample() * self.channels as usize
    }
}

/// 调用方期望的音频格式
///
/// 任一字段为 `None` 表示"由解码器决定"，绑定成功时从实际格式回填。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DesiredAudioSpec {
    /// 期望采样格式
    pub format: Option<SampleFormat>,

    /// 期望声道数
    pub channels: Option<u16>,

    /// 期望采样率 (Hz)
    pub rate: Option<u32>,
}

impl DesiredAudioSpec {
    /// 用实际格式逐字段回填未指定项，得到完整格式信息
    pub fn resolve_with(&self, actual: &AudioInfo) -> AudioInfo {
        AudioInfo {
            format: self.format.unwrap_or(actual.format),
            channels: self.channels.unwrap_or(actual.channels),
            rate: self.rate.unwrap_or(actual.rate),
        }
    }
}
