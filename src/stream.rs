//! 字节流抽象
//!
//! 调度器与解码后端共享同一个底层字节流句柄：调度器负责在
//! 尝试失败后把流位置回退到尝试前的位置，后端在句柄之上构建
//! 各自的读取器。`StreamHandle` 以引用计数共享内部流，克隆后
//! 的句柄操作同一个读取位置。

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use symphonia::core::io::MediaSource;

use crate::error::AudioResult;

/// 可定位读取的字节流
///
/// 引擎只依赖 `seek`；实际读取发生在解码后端内部。
/// 关闭即丢弃（drop）。
pub trait MediaStream: Read + Seek + Send {}

impl<T: Read + Seek + Send> MediaStream for T {}

/// 共享字节流句柄
///
/// 采样会话与其绑定的解码后端在会话生命周期内共享此句柄。
/// 所有克隆共享同一读取位置，因此本类型与所属会话一样，
/// 不支持并发使用。
#[derive(Clone)]
pub struct StreamHandle {
    inner: Arc<Mutex<Box<dyn MediaStream>>>,
}

impl StreamHandle {
    /// 包装任意可定位字节流
    pub fn new(stream: Box<dyn MediaStream>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(stream)),
        }
    }

    /// 以二进制只读方式打开文件
    pub fn from_file<P: AsRef<Path>>(path: P) -> AudioResult<Self> {
        let file = File::open(path.as_ref())?;
        Ok(Self::new(Box::new(BufReader::new(file))))
    }

    /// 当前读取位置
    pub fn position(&self) -> io::Result<u64> {
        self.lock().stream_position()
    }

    /// 回退到指定的绝对位置
    pub fn seek_to(&self, pos: u64) -> io::Result<u64> {
        self.lock().seek(SeekFrom::Start(pos))
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn MediaStream>> {
        // 单线程使用约定下锁不可能中毒；如发生则继续使用内部值
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle").finish_non_exhaustive()
    }
}

impl Read for StreamHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.lock().read(buf)
    }
}

impl Seek for StreamHandle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.lock().seek(pos)
    }
}

impl MediaSource for StreamHandle {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        let mut guard = self.lock();
        let current = guard.stream_position().ok()?;
        let len = guard.seek(SeekFrom::End(0)).ok()?;
        guard.seek(SeekFrom::Start(current)).ok()?;
        Some(len)
    }
}
