//! 采样会话状态
//!
//! 每个打开的音频流对应一个 `Sample`：期望/实际格式、解码输出
//! 缓冲区、状态标志位、已绑定的解码后端引用以及缓存的总时长。
//! 会话独占其缓冲区，与后端共享底层字节流句柄。

use std::any::Any;

use bitflags::bitflags;

use crate::constants::UNKNOWN_DURATION_MS;
use crate::format::{AudioInfo, DesiredAudioSpec, SampleFormat};
use crate::stream::StreamHandle;

bitflags! {
    /// 采样会话状态标志位
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SampleFlags: u8 {
        /// 流已耗尽
        const EOF = 0b0001;
        /// 解码出错（粘滞，直到seek/rewind成功）
        const ERROR = 0b0010;
        /// 本次调用未产出数据，应重试
        const EAGAIN = 0b0100;
        /// 后端支持定位
        const CANSEEK = 0b1000;
    }
}

/// 采样会话句柄
///
/// 由引擎分配的不透明标识，可复制，释放后失效。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleId(pub(crate) u64);

/// 解码调用的可变访问视图
///
/// 后端 `read` 需要同时写缓冲区、更新标志位并推进编解码状态，
/// 通过此视图一次性借出三者。
pub struct DecodeAccess<'a> {
    /// 解码输出缓冲区（定长，后端最多填满）
    pub buffer: &'a mut [u8],

    /// 状态标志位
    pub flags: &'a mut SampleFlags,

    /// 后端在 `open` 时存入的编解码状态
    pub state: Option<&'a mut (dyn Any + Send)>,
}

/// 一个打开的、可解码的音频流及其缓冲区/标志位
pub struct Sample {
    desired: DesiredAudioSpec,
    actual: AudioInfo,
    buffer: Vec<u8>,
    flags: SampleFlags,
    total_time_ms: i64,
    backend_index: Option<usize>,
    stream: StreamHandle,
    codec_state: Option<Box<dyn Any + Send>>,
    error_note: Option<String>,
}

impl Sample {
    pub(crate) fn new(stream: StreamHandle, desired: DesiredAudioSpec, buffer_size: usize) -> Self {
        Self {
            desired,
            // 占位值，绑定成功时由后端覆盖
            actual: AudioInfo::new(SampleFormat::U8, 0, 0),
            buffer: vec![0; buffer_size],
            flags: SampleFlags::empty(),
            total_time_ms: UNKNOWN_DURATION_MS,
            backend_index: None,
            stream,
            codec_state: None,
            error_note: None,
        }
    }

    /// 解码输出缓冲区（只读视图）
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// 缓冲区大小（字节）
    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    /// 当前标志位
    pub fn flags(&self) -> SampleFlags {
        self.flags
    }

    /// 置位指定标志
    pub fn insert_flags(&mut self, flags: SampleFlags) {
        self.flags.insert(flags);
    }

    /// 清除指定标志
    pub fn remove_flags(&mut self, flags: SampleFlags) {
        self.flags.remove(flags);
    }

    /// 实际音频格式（open成功后有效）
    pub fn actual_info(&self) -> AudioInfo {
        self.actual
    }

    /// 设置实际音频格式（由后端在open时调用）
    pub fn set_actual_info(&mut self, info: AudioInfo) {
        self.actual = info;
    }

    /// 期望音频格式（绑定后未指定字段已回填）
    pub fn desired_spec(&self) -> DesiredAudioSpec {
        self.desired
    }

    /// 解码器报告的总时长（毫秒），未知为-1
    pub fn total_time_ms(&self) -> i64 {
        self.total_time_ms
    }

    /// 设置总时长（由后端在open时调用）
    pub fn set_total_time_ms(&mut self, ms: i64) {
        self.total_time_ms = ms;
    }

    /// 底层字节流句柄的克隆（共享读取位置）
    pub fn stream(&self) -> StreamHandle {
        self.stream.clone()
    }

    /// 存入后端的编解码状态
    pub fn set_codec_state(&mut self, state: Box<dyn Any + Send>) {
        self.codec_state = Some(state);
    }

    /// 借出编解码状态
    pub fn codec_state_mut(&mut self) -> Option<&mut (dyn Any + Send)> {
        self.codec_state.as_deref_mut()
    }

    /// 取走编解码状态（close路径）
    pub fn take_codec_state(&mut self) -> Option<Box<dyn Any + Send>> {
        self.codec_state.take()
    }

    /// 借出解码调用所需的全部可变视图
    pub fn decode_access(&mut self) -> DecodeAccess<'_> {
        DecodeAccess {
            buffer: &mut self.buffer,
            flags: &mut self.flags,
            state: self.codec_state.as_deref_mut(),
        }
    }

    /// 记录后端错误详情，由流式控制器取走并写入错误池
    pub fn note_error(&mut self, message: impl Into<String>) {
        self.error_note = Some(message.into());
    }

    pub(crate) fn take_error_note(&mut self) -> Option<String> {
        self.error_note.take()
    }

    pub(crate) fn backend_index(&self) -> Option<usize> {
        self.backend_index
    }

    pub(crate) fn bind_backend(&mut self, index: usize) {
        debug_assert!(self.backend_index.is_none(), "boundDecoder绑定后不可变更");
        self.backend_index = Some(index);
        let resolved = self.desired.resolve_with(&self.actual);
        self.desired = DesiredAudioSpec {
            format: Some(resolved.format),
            channels: Some(resolved.channels),
            rate: Some(resolved.rate),
        };
    }

    /// 重新设置缓冲区大小，保留前min(旧, 新)字节（realloc语义）
    pub(crate) fn resize_buffer(&mut self, new_size: usize) -> Result<(), ()> {
        if new_size > self.buffer.len() {
            let additional = new_size - self.buffer.len();
            if self.buffer.try_reserve_exact(additional).is_err() {
                return Err(());
            }
        }
        self.buffer.resize(new_size, 0);
        Ok(())
    }

    /// 用一整块已解码数据替换缓冲区（decode_all成功路径）
    pub(crate) fn replace_buffer(&mut self, data: Vec<u8>) {
        self.buffer = data;
    }
}

impl std::fmt::Debug for Sample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sample")
            .field("actual", &self.actual)
            .field("flags", &self.flags)
            .field("buffer_size", &self.buffer.len())
            .field("total_time_ms", &self.total_time_ms)
            .field("backend_index", &self.backend_index)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn empty_sample(buffer_size: usize) -> Sample {
        let stream = StreamHandle::new(Box::new(Cursor::new(Vec::new())));
        Sample::new(stream, DesiredAudioSpec::default(), buffer_size)
    }

    #[test]
    fn test_new_sample_buffer_never_empty() {
        let sample = empty_sample(512);
        assert_eq!(sample.buffer_size(), 512);
        assert!(sample.flags().is_empty());
        assert_eq!(sample.total_time_ms(), UNKNOWN_DURATION_MS);
    }

    #[test]
    fn test_flag_set_and_clear() {
        let mut sample = empty_sample(16);
        sample.insert_flags(SampleFlags::EOF | SampleFlags::CANSEEK);
        assert!(sample.flags().contains(SampleFlags::EOF));

        sample.remove_flags(SampleFlags::EOF);
        assert!(!sample.flags().contains(SampleFlags::EOF));
        assert!(sample.flags().contains(SampleFlags::CANSEEK));
    }

    #[test]
    fn test_resize_buffer_preserves_prefix() {
        let mut sample = empty_sample(4);
        sample.decode_access().buffer.copy_from_slice(&[1, 2, 3, 4]);

        sample.resize_buffer(8).unwrap();
        assert_eq!(&sample.buffer()[..4], &[1, 2, 3, 4]);
        assert_eq!(sample.buffer_size(), 8);

        sample.resize_buffer(2).unwrap();
        assert_eq!(sample.buffer(), &[1, 2]);
    }

    #[test]
    fn test_bind_backfills_desired_fields() {
        let mut sample = empty_sample(16);
        sample.set_actual_info(AudioInfo::new(SampleFormat::F32, 2, 48000));
        sample.bind_backend(0);

        let desired = sample.desired_spec();
        assert_eq!(desired.format, Some(SampleFormat::F32));
        assert_eq!(desired.channels, Some(2));
        assert_eq!(desired.rate, Some(48000));
    }

    #[test]
    fn test_bind_keeps_caller_supplied_fields() {
        let stream = StreamHandle::new(Box::new(Cursor::new(Vec::new())));
        let desired = DesiredAudioSpec {
            channels: Some(1),
            ..Default::default()
        };
        let mut sample = Sample::new(stream, desired, 16);
        sample.set_actual_info(AudioInfo::new(SampleFormat::S16, 2, 44100));
        sample.bind_backend(3);

        let resolved = sample.desired_spec();
        assert_eq!(resolved.channels, Some(1)); // 调用方指定的字段不被覆盖
        assert_eq!(resolved.format, Some(SampleFormat::S16));
    }
}
