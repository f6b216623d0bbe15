//! 引擎常量定义

/// 默认解码缓冲区大小（字节）
///
/// 约合44.1kHz立体声16位PCM下约93毫秒的数据量。
pub const DEFAULT_BUFFER_SIZE: usize = 16 * 1024;

/// `decode_all` 累积缓冲区的默认上限（字节）
///
/// 默认不设上限，仅在分配失败时走内存不足路径。
/// 嵌入方可通过 `SampleEngineBuilder::max_decode_all_bytes` 收紧。
pub const DEFAULT_MAX_DECODE_ALL_BYTES: usize = usize::MAX;

/// 未知时长的哨兵值（毫秒）
pub const UNKNOWN_DURATION_MS: i64 = -1;
