//! 采样引擎
//!
//! 显式的引擎上下文取代全局可变状态：解码器表、采样注册表与
//! 错误池都挂在 `SampleEngine` 实例上，允许多个相互隔离的引擎
//! 实例共存，测试清理也变得直接（drop即quit）。
//!
//! 解码器表在构建期由嵌入方装配（`SampleEngineBuilder`），
//! 而不是编译期条件选择。

mod dispatch;
mod error_pool;
mod streaming;

use log::{debug, warn};

use crate::backend::{DecoderBackend, DecoderInfo, SymphoniaBackend, WavBackend};
use crate::constants::DEFAULT_MAX_DECODE_ALL_BYTES;
use crate::error::{AudioError, AudioResult};
use crate::format::{AudioInfo, DesiredAudioSpec};
use crate::sample::{Sample, SampleFlags, SampleId};
use error_pool::ErrorPool;

/// 解码器表条目：后端单例及其可用性
struct DecoderSlot {
    available: bool,
    backend: Box<dyn DecoderBackend>,
}

/// 引擎构建器
///
/// 装配解码器表与引擎可调参数。注册顺序即调度时的尝试顺序。
pub struct SampleEngineBuilder {
    backends: Vec<Box<dyn DecoderBackend>>,
    max_decode_all_bytes: usize,
}

impl SampleEngineBuilder {
    /// 空表构建器（嵌入方自行注册后端）
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
            max_decode_all_bytes: DEFAULT_MAX_DECODE_ALL_BYTES,
        }
    }

    /// 注册本crate内置的全部后端（WAV、MP3、Vorbis、FLAC）
    pub fn with_default_backends(mut self) -> Self {
        self.backends.push(Box::new(WavBackend));
        self.backends.push(Box::new(SymphoniaBackend::mp3()));
        self.backends.push(Box::new(SymphoniaBackend::vorbis()));
        self.backends.push(Box::new(SymphoniaBackend::flac()));
        self
    }

    /// 注册自定义解码后端
    pub fn register(mut self, backend: Box<dyn DecoderBackend>) -> Self {
        self.backends.push(backend);
        self
    }

    /// 设置 `decode_all` 累积缓冲区上限（字节）
    ///
    /// 超限按内存不足路径处理。
    pub fn max_decode_all_bytes(mut self, limit: usize) -> Self {
        self.max_decode_all_bytes = limit;
        self
    }

    /// 构建引擎（未初始化状态，需调用 `init`）
    pub fn build(self) -> SampleEngine {
        SampleEngine {
            initialized: false,
            decoders: self
                .backends
                .into_iter()
                .map(|backend| DecoderSlot {
                    available: false,
                    backend,
                })
                .collect(),
            available_infos: Vec::new(),
            registry: Vec::new(),
            next_id: 1,
            max_decode_all_bytes: self.max_decode_all_bytes,
            error_pool: ErrorPool::new(),
        }
    }
}

impl Default for SampleEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 音频采样引擎
///
/// 持有解码器表、采样注册表与线程粒度错误池。单个会话的操作
/// 不是线程安全的，调用方需自行串行化；不同线程的最近错误串
/// 互不干扰。
pub struct SampleEngine {
    initialized: bool,
    decoders: Vec<DecoderSlot>,
    available_infos: Vec<DecoderInfo>,
    /// 注册表按打开顺序push，quit按LIFO弹出释放
    registry: Vec<(SampleId, Sample)>,
    next_id: u64,
    max_decode_all_bytes: usize,
    error_pool: ErrorPool,
}

impl SampleEngine {
    /// 带全部内置后端的引擎（未初始化）
    pub fn with_default_backends() -> Self {
        SampleEngineBuilder::new().with_default_backends().build()
    }

    /// 初始化引擎：逐个调用后端的 `init`，失败者标记为不可用
    ///
    /// 幂等：已初始化时直接返回成功，不会重建注册表。
    pub fn init(&mut self) -> AudioResult<()> {
        if self.initialized {
            return Ok(());
        }

        let mut infos = Vec::with_capacity(self.decoders.len());
        for slot in &mut self.decoders {
            slot.available = slot.backend.init();
            if slot.available {
                infos.push(slot.backend.info().clone());
            } else {
                warn!("解码后端 {} 初始化失败，标记为不可用", slot.backend.info().name);
            }
        }

        self.available_infos = infos;
        self.initialized = true;
        debug!("引擎初始化完成，可用解码器 {} 个", self.available_infos.len());
        Ok(())
    }

    /// 退出引擎：LIFO强制释放所有存活会话，再清理后端
    ///
    /// 未初始化时为空操作。退出后大多数调用以"尚未初始化"失败。
    pub fn quit(&mut self) {
        if !self.initialized {
            return;
        }

        while let Some((id, mut sample)) = self.registry.pop() {
            debug!("quit强制释放采样 {id:?}");
            if let Some(index) = sample.backend_index() {
                self.decoders[index].backend.close(&mut sample);
            }
        }

        for slot in &mut self.decoders {
            if slot.available {
                slot.backend.quit();
                slot.available = false;
            }
        }

        self.available_infos.clear();
        self.initialized = false;
        debug!("引擎已退出");
    }

    /// 引擎是否处于已初始化状态
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// 当前可用的解码器信息列表
    pub fn available_decoders(&self) -> AudioResult<&[DecoderInfo]> {
        if !self.initialized {
            return self.fail(AudioError::NotInitialized);
        }
        Ok(&self.available_infos)
    }

    /// 存活会话数（注册表大小）
    pub fn sample_count(&self) -> usize {
        self.registry.len()
    }

    /// 释放一个采样会话
    ///
    /// 顺序约定：先调用后端 `close` 释放编解码状态，再关闭字节流
    /// 并释放缓冲区（随会话drop完成）。注册表中找不到该句柄视为
    /// 内部一致性错误（重复释放走此路径，不会二次清理）。
    /// 引擎未初始化时为空操作（quit已整体释放所有会话）。
    pub fn free_sample(&mut self, id: SampleId) -> AudioResult<()> {
        if !self.initialized {
            return Ok(());
        }

        let Some(position) = self.position_of(id) else {
            return self.fail(AudioError::InternalError(format!(
                "free_sample: 采样 {id:?} 不在注册表中"
            )));
        };

        let (_, mut sample) = self.registry.remove(position);
        if let Some(index) = sample.backend_index() {
            self.decoders[index].backend.close(&mut sample);
        }
        debug!("采样 {id:?} 已释放");
        Ok(())
    }

    /// 重设会话公共缓冲区大小
    ///
    /// realloc语义：保留前 `min(旧, 新)` 字节；分配失败时旧缓冲区
    /// 原样保留。
    pub fn set_buffer_size(&mut self, id: SampleId, new_size: usize) -> AudioResult<()> {
        if !self.initialized {
            return self.fail(AudioError::NotInitialized);
        }
        if new_size == 0 {
            return self.fail(AudioError::InvalidInput(
                "缓冲区大小必须大于0".to_string(),
            ));
        }

        let Some(position) = self.position_of(id) else {
            return self.fail(unknown_sample(id));
        };
        if self.registry[position].1.resize_buffer(new_size).is_err() {
            return self.fail(AudioError::OutOfMemory);
        }
        Ok(())
    }

    /// 会话缓冲区只读视图
    pub fn buffer(&self, id: SampleId) -> AudioResult<&[u8]> {
        Ok(self.sample(id)?.buffer())
    }

    /// 会话缓冲区大小
    pub fn buffer_size(&self, id: SampleId) -> AudioResult<usize> {
        Ok(self.sample(id)?.buffer_size())
    }

    /// 会话当前标志位
    pub fn flags(&self, id: SampleId) -> AudioResult<SampleFlags> {
        Ok(self.sample(id)?.flags())
    }

    /// 会话的实际音频格式
    pub fn actual_info(&self, id: SampleId) -> AudioResult<AudioInfo> {
        Ok(self.sample(id)?.actual_info())
    }

    /// 会话的期望音频格式（未指定字段已从实际格式回填）
    pub fn desired_spec(&self, id: SampleId) -> AudioResult<DesiredAudioSpec> {
        Ok(self.sample(id)?.desired_spec())
    }

    /// 会话绑定的解码器信息
    pub fn bound_decoder(&self, id: SampleId) -> AudioResult<&DecoderInfo> {
        let sample = self.sample(id)?;
        let index = sample
            .backend_index()
            .ok_or_else(|| AudioError::InternalError("采样未绑定解码器".to_string()))?;
        Ok(self.decoders[index].backend.info())
    }

    // ---- 错误池表面 ----

    /// 当前线程的最近错误串；无错误返回空串，绝不失败
    pub fn last_error(&self) -> String {
        if !self.initialized {
            return "错误：引擎未初始化时不应查询最近错误".to_string();
        }
        self.error_pool.get()
    }

    /// 记录当前线程的最近错误
    pub fn set_error(&self, message: impl Into<String>) {
        if !self.initialized {
            warn!("引擎未初始化时不应设置最近错误");
            return;
        }
        self.error_pool.set(message);
    }

    /// 清除当前线程的最近错误
    pub fn clear_error(&self) {
        self.error_pool.clear();
    }

    // ---- 内部工具 ----

    /// 记录错误串并返回Err（统一失败路径）
    pub(crate) fn fail<T>(&self, err: AudioError) -> AudioResult<T> {
        if self.initialized {
            self.error_pool.set(err.to_string());
        }
        Err(err)
    }

    pub(crate) fn record_error(&self, message: &str) {
        if self.initialized {
            self.error_pool.set(message);
        }
    }

    pub(crate) fn position_of(&self, id: SampleId) -> Option<usize> {
        self.registry.iter().position(|(sid, _)| *sid == id)
    }

    pub(crate) fn sample(&self, id: SampleId) -> AudioResult<&Sample> {
        if !self.initialized {
            return self.fail(AudioError::NotInitialized);
        }
        match self.position_of(id) {
            Some(position) => Ok(&self.registry[position].1),
            None => self.fail(unknown_sample(id)),
        }
    }

    pub(crate) fn allocate_id(&mut self) -> SampleId {
        let id = SampleId(self.next_id);
        self.next_id += 1;
        id
    }
}

impl Drop for SampleEngine {
    fn drop(&mut self) {
        self.quit();
    }
}

pub(crate) fn unknown_sample(id: SampleId) -> AudioError {
    AudioError::InvalidInput(format!("采样 {id:?} 不存在或已释放"))
}
