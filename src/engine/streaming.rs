//! 流式解码控制器
//!
//! 在会话标志位状态机之上驱动绑定的解码后端：
//!
//! - `decode` / `decode_all` 在 ERROR/EOF 置位时拒绝运行，且不清除
//!   这两个标志；
//! - `seek` / `rewind` 成功时整体清除 EAGAIN/ERROR/EOF（唯一的
//!   恢复路径），失败时置位 ERROR；
//! - EAGAIN 在每次解码/定位尝试开始时清除，由后端按需重新置位。

use log::trace;

use super::SampleEngine;
use crate::error::{AudioError, AudioResult};
use crate::sample::{SampleFlags, SampleId};

impl SampleEngine {
    /// 解码一块数据到会话缓冲区，返回产出字节数
    ///
    /// 0是合法返回：EAGAIN下表示"暂无数据，稍后重试"，或后端
    /// 刚刚置位了EOF/ERROR的终止结果。会话已处于ERROR或EOF状态
    /// 时各自以独立错误拒绝，不会调用后端。
    pub fn decode(&mut self, id: SampleId) -> AudioResult<usize> {
        if !self.initialized {
            return self.fail(AudioError::NotInitialized);
        }
        let position = self.verify_registered(id)?;

        let flags = self.registry[position].1.flags();
        if flags.contains(SampleFlags::ERROR) {
            return self.fail(AudioError::PreviousError);
        }
        if flags.contains(SampleFlags::EOF) {
            return self.fail(AudioError::AlreadyAtEof);
        }

        let Some(backend_index) = self.registry[position].1.backend_index() else {
            return self.fail(AudioError::InternalError("采样未绑定解码器".to_string()));
        };

        // 清除EAGAIN，后端可按需重新置位
        let (bytes_read, note) = {
            let Self {
                ref decoders,
                ref mut registry,
                ..
            } = *self;
            let sample = &mut registry[position].1;
            sample.remove_flags(SampleFlags::EAGAIN);
            let bytes_read = decoders[backend_index].backend.read(sample);
            (bytes_read, sample.take_error_note())
        };

        if let Some(note) = note {
            trace!("后端报告解码错误: {note}");
            self.record_error(&note);
        }
        Ok(bytes_read)
    }

    /// 循环解码直到EOF或ERROR，把全部产出累积为会话的新缓冲区
    ///
    /// 累积只追加、不依据时长预估容量——会话可能已被部分消费或
    /// 定位到中段，总量事先未知。成功时返回累积总字节数。
    ///
    /// 历史兼容行为：累积增长失败（分配失败或超出
    /// `max_decode_all_bytes` 上限）时丢弃整个部分累积，置位
    /// ERROR并记录"内存不足"，返回**最后一块**的字节数而非已
    /// 累积总量，会话缓冲区保持原样。
    pub fn decode_all(&mut self, id: SampleId) -> AudioResult<usize> {
        if !self.initialized {
            return self.fail(AudioError::NotInitialized);
        }
        let position = self.verify_registered(id)?;

        // 已处于终止态：不分配、不触碰缓冲区
        if self.registry[position]
            .1
            .flags()
            .intersects(SampleFlags::EOF | SampleFlags::ERROR)
        {
            return Ok(0);
        }

        let mut accumulated: Vec<u8> = Vec::new();
        loop {
            if self.registry[position]
                .1
                .flags()
                .intersects(SampleFlags::EOF | SampleFlags::ERROR)
            {
                break;
            }

            let chunk = self.decode(id)?;

            if accumulated.len().saturating_add(chunk) > self.max_decode_all_bytes
                || accumulated.try_reserve(chunk).is_err()
            {
                self.registry[position]
                    .1
                    .insert_flags(SampleFlags::ERROR);
                self.record_error(&AudioError::OutOfMemory.to_string());
                return Ok(chunk);
            }
            let sample = &self.registry[position].1;
            accumulated.extend_from_slice(&sample.buffer()[..chunk]);
        }

        let total = accumulated.len();
        if total > 0 {
            self.registry[position].1.replace_buffer(accumulated);
        }
        Ok(total)
    }

    /// 回到流起始位置
    ///
    /// 成功时整体清除EAGAIN/ERROR/EOF（与seek相同，是ERROR的
    /// 恢复路径）；失败时置位ERROR。
    pub fn rewind(&mut self, id: SampleId) -> AudioResult<()> {
        self.reposition(id, None)
    }

    /// 定位到指定毫秒处
    ///
    /// 要求会话的CANSEEK标志已置位，否则不触碰后端直接失败。
    pub fn seek(&mut self, id: SampleId, ms: u64) -> AudioResult<()> {
        if !self.initialized {
            return self.fail(AudioError::NotInitialized);
        }
        let position = self.verify_registered(id)?;
        if !self.registry[position]
            .1
            .flags()
            .contains(SampleFlags::CANSEEK)
        {
            return self.fail(AudioError::NotSeekable);
        }
        self.reposition(id, Some(ms))
    }

    /// 会话时长（毫秒），未知为-1
    pub fn duration(&self, id: SampleId) -> AudioResult<i64> {
        Ok(self.sample(id)?.total_time_ms())
    }

    fn reposition(&mut self, id: SampleId, target_ms: Option<u64>) -> AudioResult<()> {
        if !self.initialized {
            return self.fail(AudioError::NotInitialized);
        }
        let position = self.verify_registered(id)?;
        let Some(backend_index) = self.registry[position].1.backend_index() else {
            return self.fail(AudioError::InternalError("采样未绑定解码器".to_string()));
        };

        let succeeded = {
            let Self {
                ref decoders,
                ref mut registry,
                ..
            } = *self;
            let sample = &mut registry[position].1;
            let backend = &decoders[backend_index].backend;
            match target_ms {
                Some(ms) => backend.seek(sample, ms),
                None => backend.rewind(sample),
            }
        };

        let sample = &mut self.registry[position].1;
        if !succeeded {
            sample.insert_flags(SampleFlags::ERROR);
            let err = match target_ms {
                Some(ms) => AudioError::DecodingError(format!("定位到{ms}ms失败")),
                None => AudioError::DecodingError("rewind失败".to_string()),
            };
            return self.fail(err);
        }

        // 成功定位是ERROR/EOF的唯一恢复路径
        sample.remove_flags(SampleFlags::EAGAIN | SampleFlags::ERROR | SampleFlags::EOF);
        Ok(())
    }
}
