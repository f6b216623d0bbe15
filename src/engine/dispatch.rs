//! 格式调度器
//!
//! 为新打开的字节流寻找愿意接管的解码后端并绑定到新会话：
//!
//! 1. **第一轮（扩展名匹配）**：提示扩展名与后端声明的扩展名
//!    大小写不敏感比对，命中者逐个尝试 `open`；
//! 2. **第二轮（暴力探测）**：对其余后端全部尝试一遍。是否
//!    "已在第一轮尝试过"以扩展名列表是否包含提示来判定，而非
//!    记录实际调用过哪些后端。
//!
//! 扩展名只是软提示（可能被伪造），正确性依赖每个后端在
//! `open` 里自行嗅探流内容。每次尝试失败后把流位置回退到尝试
//! 前，让下一个候选看到未消费的流。

use std::cmp::Ordering;
use std::path::Path;

use log::{debug, trace};

use super::{SampleEngine, unknown_sample};
use crate::backend::DecoderInfo;
use crate::error::{AudioError, AudioResult};
use crate::format::DesiredAudioSpec;
use crate::sample::{Sample, SampleId};
use crate::stream::{MediaStream, StreamHandle};

impl SampleEngine {
    /// 从文件路径创建采样会话
    ///
    /// 扩展名提示取路径字符串最后一个 `.` 之后的部分；没有 `.`
    /// 则不给提示。文件以二进制只读方式打开。
    pub fn new_sample_from_file<P: AsRef<Path>>(
        &mut self,
        path: P,
        desired: Option<DesiredAudioSpec>,
        buffer_size: usize,
    ) -> AudioResult<SampleId> {
        if !self.initialized {
            return self.fail(AudioError::NotInitialized);
        }
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return self.fail(AudioError::InvalidInput("未指定文件".to_string()));
        }

        let text = path.to_string_lossy();
        let hint = text.rfind('.').map(|dot| text[dot + 1..].to_string());

        let handle = match StreamHandle::from_file(path) {
            Ok(handle) => handle,
            Err(err) => return self.fail(err),
        };
        self.new_sample_with_handle(handle, hint.as_deref(), desired, buffer_size)
    }

    /// 从任意可定位字节流创建采样会话
    pub fn new_sample(
        &mut self,
        stream: Box<dyn MediaStream>,
        ext_hint: Option<&str>,
        desired: Option<DesiredAudioSpec>,
        buffer_size: usize,
    ) -> AudioResult<SampleId> {
        let handle = StreamHandle::new(stream);
        self.new_sample_with_handle(handle, ext_hint, desired, buffer_size)
    }

    fn new_sample_with_handle(
        &mut self,
        handle: StreamHandle,
        ext_hint: Option<&str>,
        desired: Option<DesiredAudioSpec>,
        buffer_size: usize,
    ) -> AudioResult<SampleId> {
        if !self.initialized {
            return self.fail(AudioError::NotInitialized);
        }
        if buffer_size == 0 {
            return self.fail(AudioError::InvalidInput("缓冲区大小必须大于0".to_string()));
        }

        let mut sample = Sample::new(handle, desired.unwrap_or_default(), buffer_size);

        // 第一轮：仅尝试扩展名命中的后端
        if let Some(hint) = ext_hint {
            for index in 0..self.decoders.len() {
                let slot = &self.decoders[index];
                if !slot.available || !info_matches_ext(slot.backend.info(), hint) {
                    continue;
                }
                if self.try_load(index, &mut sample, ext_hint) {
                    return Ok(self.register(sample));
                }
                // 失败：继续下一个同样命中扩展名的后端
            }
        }

        // 第二轮：暴力探测其余后端（扩展名命中者视为已尝试，跳过）
        for index in 0..self.decoders.len() {
            let slot = &self.decoders[index];
            if !slot.available {
                continue;
            }
            if ext_hint.is_some_and(|hint| info_matches_ext(slot.backend.info(), hint)) {
                continue;
            }
            if self.try_load(index, &mut sample, ext_hint) {
                return Ok(self.register(sample));
            }
        }

        // 无后端接受该流；会话与字节流随sample一起释放
        self.fail(AudioError::FormatError("没有解码器接受该流".to_string()))
    }

    /// 尝试用指定后端接管会话的流
    ///
    /// 失败时把流回退到尝试前的位置并报告失败；成功时绑定后端
    /// 并回填期望格式的未指定字段。
    fn try_load(&self, index: usize, sample: &mut Sample, ext_hint: Option<&str>) -> bool {
        let backend = &self.decoders[index].backend;
        let origin = sample.stream().position().unwrap_or(0);

        if !backend.open(sample, ext_hint) {
            if let Err(err) = sample.stream().seek_to(origin) {
                trace!("回退流位置失败: {err}");
            }
            return false;
        }

        sample.bind_backend(index);
        debug!("解码器 {} 接管流", backend.info().name);
        true
    }

    fn register(&mut self, sample: Sample) -> SampleId {
        let id = self.allocate_id();
        self.registry.push((id, sample));
        id
    }

    /// 会话句柄是否仍在注册表中（测试与诊断用途）
    pub fn contains(&self, id: SampleId) -> bool {
        self.position_of(id).is_some()
    }

    pub(crate) fn verify_registered(&self, id: SampleId) -> AudioResult<usize> {
        match self.position_of(id) {
            Some(position) => Ok(position),
            None => self.fail(unknown_sample(id)),
        }
    }
}

/// 后端扩展名列表是否包含提示（大小写不敏感）
fn info_matches_ext(info: &DecoderInfo, hint: &str) -> bool {
    info.extensions
        .iter()
        .any(|ext| ascii_casecmp(ext, hint) == Ordering::Equal)
}

/// 大小写不敏感的ASCII字符串比较
///
/// 逐字节按小写比较，短串在前；与locale无关。
pub(crate) fn ascii_casecmp(a: &str, b: &str) -> Ordering {
    let mut left = a.bytes().map(|c| c.to_ascii_lowercase());
    let mut right = b.bytes().map(|c| c.to_ascii_lowercase());
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => match l.cmp(&r) {
                Ordering::Equal => continue,
                other => return other,
            },
        }
    }
}
