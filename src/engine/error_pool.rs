//! 线程粒度的最近错误池
//!
//! 每个调用线程持有独立的错误槽，不同线程驱动各自的会话时
//! 互不覆盖对方的最近错误串。错误池随引擎实例存在，多个引擎
//! 实例之间互不共享。

use std::collections::HashMap;
use std::sync::Mutex;
use std::thread::{self, ThreadId};

/// 引擎作用域的错误池
#[derive(Debug, Default)]
pub(crate) struct ErrorPool {
    slots: Mutex<HashMap<ThreadId, String>>,
}

impl ErrorPool {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// 记录当前线程的最近错误
    pub(crate) fn set(&self, message: impl Into<String>) {
        let mut slots = self.lock();
        slots.insert(thread::current().id(), message.into());
    }

    /// 取当前线程的最近错误；无错误返回空串（绝不失败）
    pub(crate) fn get(&self) -> String {
        let slots = self.lock();
        slots
            .get(&thread::current().id())
            .cloned()
            .unwrap_or_default()
    }

    /// 清除当前线程的最近错误
    pub(crate) fn clear(&self) {
        let mut slots = self.lock();
        slots.remove(&thread::current().id());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ThreadId, String>> {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_empty_pool_returns_empty_string() {
        let pool = ErrorPool::new();
        assert_eq!(pool.get(), "");
    }

    #[test]
    fn test_set_get_clear() {
        let pool = ErrorPool::new();
        pool.set("解码失败");
        assert_eq!(pool.get(), "解码失败");

        pool.clear();
        assert_eq!(pool.get(), "");
    }

    #[test]
    fn test_slots_are_per_thread() {
        let pool = Arc::new(ErrorPool::new());
        pool.set("主线程错误");

        let remote = Arc::clone(&pool);
        let handle = std::thread::spawn(move || {
            // 新线程看不到主线程的错误
            assert_eq!(remote.get(), "");
            remote.set("子线程错误");
            assert_eq!(remote.get(), "子线程错误");
        });
        handle.join().unwrap();

        // 主线程的槽未被子线程覆盖
        assert_eq!(pool.get(), "主线程错误");
    }
}
