//! 引擎生命周期测试
//!
//! 覆盖init幂等性、quit的LIFO整体清理、会话释放路径与
//! 线程粒度错误池表面。


use decoder_test_fixtures::{
    ABC_FIRST_INFO, ABC_SECOND_INFO, MockBackend, PLAIN_INFO, log, stream_of,
};
use samplekit::{AudioError, SampleEngineBuilder, SampleFlags};

// ========== 初始化 ==========

#[test]
fn test_init_is_idempotent() {
    let backend = MockBackend::accepting(&PLAIN_INFO);
    let counters = backend.counters();
    let mut engine = SampleEngineBuilder::new().register(Box::new(backend)).build();

    assert!(!engine.is_initialized());
    engine.init().expect("首次init应成功");
    engine.init().expect("重复init应直接成功");
    assert!(engine.is_initialized());

    // 后端init只被调用一次
    assert_eq!(counters.inits(), 1);

    log("init幂等性验证通过", "init idempotence verified");
}

#[test]
fn test_failed_backend_init_marks_unavailable() {
    let good = MockBackend::rejecting(&PLAIN_INFO);
    let bad = MockBackend::accepting(&ABC_FIRST_INFO).failing_init();
    let bad_counters = bad.counters();

    let mut engine = SampleEngineBuilder::new()
        .register(Box::new(good))
        .register(Box::new(bad))
        .build();
    engine.init().expect("部分后端失败不影响引擎init");

    let infos = engine.available_decoders().expect("已初始化");
    assert_eq!(infos.len(), 1);
    assert_eq!(infos[0].name, "plain");

    // 不可用后端不参与调度
    let err = engine
        .new_sample(stream_of(b"whatever".to_vec()), Some("abc"), None, 64)
        .unwrap_err();
    assert!(matches!(err, AudioError::FormatError(_)));
    assert_eq!(bad_counters.opens(), 0);
}

#[test]
fn test_operations_before_init_fail() {
    let mut engine = SampleEngineBuilder::new()
        .register(Box::new(MockBackend::accepting(&PLAIN_INFO)))
        .build();

    let err = engine
        .new_sample(stream_of(vec![0u8; 8]), None, None, 64)
        .unwrap_err();
    assert!(matches!(err, AudioError::NotInitialized));
    assert!(matches!(
        engine.available_decoders().unwrap_err(),
        AudioError::NotInitialized
    ));
}

// ========== 退出与释放 ==========

#[test]
fn test_quit_frees_all_live_sessions() {
    let backend = MockBackend::accepting(&PLAIN_INFO);
    let counters = backend.counters();
    let mut engine = SampleEngineBuilder::new().register(Box::new(backend)).build();
    engine.init().unwrap();

    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(
            engine
                .new_sample(stream_of(vec![0u8; 8]), Some("pln"), None, 64)
                .expect("打开会话"),
        );
    }
    assert_eq!(engine.sample_count(), 3);

    engine.quit();

    assert_eq!(engine.sample_count(), 0);
    assert_eq!(counters.closes(), 3);
    assert_eq!(counters.quits(), 1);
    assert!(!engine.is_initialized());

    // 退出后的调用以未初始化失败
    let err = engine.decode(ids[0]).unwrap_err();
    assert!(matches!(err, AudioError::NotInitialized));

    log("quit整体清理验证通过", "quit bulk teardown verified");
}

#[test]
fn test_quit_without_init_is_noop() {
    let backend = MockBackend::accepting(&PLAIN_INFO);
    let counters = backend.counters();
    let mut engine = SampleEngineBuilder::new().register(Box::new(backend)).build();

    engine.quit();
    assert_eq!(counters.quits(), 0);
}

#[test]
fn test_drop_closes_live_sessions() {
    let backend = MockBackend::accepting(&PLAIN_INFO);
    let counters = backend.counters();
    {
        let mut engine = SampleEngineBuilder::new().register(Box::new(backend)).build();
        engine.init().unwrap();
        engine
            .new_sample(stream_of(vec![0u8; 8]), Some("pln"), None, 64)
            .unwrap();
    }
    // drop即quit
    assert_eq!(counters.closes(), 1);
    assert_eq!(counters.quits(), 1);
}

#[test]
fn test_free_sample_then_double_free() {
    let backend = MockBackend::accepting(&PLAIN_INFO);
    let counters = backend.counters();
    let mut engine = SampleEngineBuilder::new().register(Box::new(backend)).build();
    engine.init().unwrap();

    let id = engine
        .new_sample(stream_of(vec![0u8; 8]), Some("pln"), None, 64)
        .unwrap();
    engine.free_sample(id).expect("首次释放成功");
    assert_eq!(engine.sample_count(), 0);
    assert_eq!(counters.closes(), 1);

    // 重复释放是内部一致性错误，不会二次清理
    let err = engine.free_sample(id).unwrap_err();
    assert!(matches!(err, AudioError::InternalError(_)));
    assert_eq!(counters.closes(), 1);
}

#[test]
fn test_free_sample_after_quit_is_noop() {
    let backend = MockBackend::accepting(&PLAIN_INFO);
    let counters = backend.counters();
    let mut engine = SampleEngineBuilder::new().register(Box::new(backend)).build();
    engine.init().unwrap();

    let id = engine
        .new_sample(stream_of(vec![0u8; 8]), Some("pln"), None, 64)
        .unwrap();
    engine.quit();
    assert_eq!(counters.closes(), 1);

    // quit已整体释放，未初始化状态下free是空操作
    engine.free_sample(id).expect("quit后free应为空操作");
    assert_eq!(counters.closes(), 1);
}

#[test]
fn test_sample_ids_are_not_reused() {
    let mut engine = SampleEngineBuilder::new()
        .register(Box::new(MockBackend::accepting(&PLAIN_INFO)))
        .build();
    engine.init().unwrap();

    let first = engine
        .new_sample(stream_of(vec![0u8; 8]), Some("pln"), None, 64)
        .unwrap();
    engine.free_sample(first).unwrap();

    let second = engine
        .new_sample(stream_of(vec![0u8; 8]), Some("pln"), None, 64)
        .unwrap();
    assert_ne!(first, second);
    assert!(!engine.contains(first));
    assert!(engine.contains(second));
}

// ========== 缓冲区管理 ==========

#[test]
fn test_set_buffer_size_preserves_content() {
    let backend = MockBackend::accepting(&PLAIN_INFO).with_chunks(vec![vec![9, 8, 7, 6]]);
    let mut engine = SampleEngineBuilder::new().register(Box::new(backend)).build();
    engine.init().unwrap();

    let id = engine
        .new_sample(stream_of(vec![0u8; 8]), Some("pln"), None, 4)
        .unwrap();
    assert_eq!(engine.decode(id).unwrap(), 4);

    engine.set_buffer_size(id, 16).expect("扩大缓冲区");
    assert_eq!(engine.buffer_size(id).unwrap(), 16);
    assert_eq!(&engine.buffer(id).unwrap()[..4], &[9, 8, 7, 6]);

    engine.set_buffer_size(id, 2).expect("缩小缓冲区");
    assert_eq!(engine.buffer(id).unwrap(), &[9, 8]);

    let err = engine.set_buffer_size(id, 0).unwrap_err();
    assert!(matches!(err, AudioError::InvalidInput(_)));
}

// ========== 错误池 ==========

#[test]
fn test_last_error_roundtrip() {
    let mut engine = SampleEngineBuilder::new()
        .register(Box::new(MockBackend::accepting(&PLAIN_INFO)))
        .build();
    engine.init().unwrap();

    // 无错误时返回空串，绝不失败
    assert_eq!(engine.last_error(), "");

    engine.set_error("自定义错误");
    assert_eq!(engine.last_error(), "自定义错误");

    engine.clear_error();
    assert_eq!(engine.last_error(), "");
}

#[test]
fn test_last_error_before_init_returns_diagnostic() {
    let engine = SampleEngineBuilder::new().build();
    let message = engine.last_error();
    assert!(!message.is_empty());
    assert!(message.contains("未初始化"));
}

#[test]
fn test_failed_open_records_last_error() {
    let mut engine = SampleEngineBuilder::new()
        .register(Box::new(MockBackend::rejecting(&ABC_SECOND_INFO)))
        .build();
    engine.init().unwrap();

    let err = engine
        .new_sample(stream_of(vec![0u8; 8]), Some("abc"), None, 64)
        .unwrap_err();
    assert!(matches!(err, AudioError::FormatError(_)));
    assert_eq!(engine.last_error(), err.to_string());
    assert_eq!(engine.sample_count(), 0);
}

// ========== 会话元数据 ==========

#[test]
fn test_open_session_metadata() {
    let backend = MockBackend::accepting(&PLAIN_INFO).total_time_ms(2500);
    let mut engine = SampleEngineBuilder::new().register(Box::new(backend)).build();
    engine.init().unwrap();

    let id = engine
        .new_sample(stream_of(vec![0u8; 8]), Some("pln"), None, 64)
        .unwrap();

    assert_eq!(engine.bound_decoder(id).unwrap().name, "plain");
    assert_eq!(engine.duration(id).unwrap(), 2500);
    assert!(engine.flags(id).unwrap().contains(SampleFlags::CANSEEK));

    let info = engine.actual_info(id).unwrap();
    assert_eq!(info.channels, 1);
    assert_eq!(info.rate, 8000);

    // 未指定的期望字段已从实际格式回填
    let desired = engine.desired_spec(id).unwrap();
    assert_eq!(desired.channels, Some(1));
    assert_eq!(desired.rate, Some(8000));
}
