//! Tests for configuration validation and loading

use std::collections::HashMap;

use prometheus_concurrency::config::{
    PrimitivesConfig, QueueConfig, TimerSchedulerConfig, WorkerPoolConfig, ENV_QUEUE_CAPACITY,
    ENV_SCHEDULER_THREAD_NAME, ENV_WORKER_COUNT, ENV_WORKER_NAME_PREFIX, ENV_WORKER_STACK_SIZE,
};

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn test_worker_pool_config_defaults() {
    let cfg = WorkerPoolConfig::new();
    assert_eq!(cfg.worker_count, num_cpus::get());
    assert_eq!(cfg.thread_stack_size, 2 * 1024 * 1024);
    assert_eq!(cfg.thread_name_prefix, "pc-worker");
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_worker_pool_config_builder() {
    let cfg = WorkerPoolConfig::new()
        .with_worker_count(3)
        .with_thread_stack_size(256 * 1024)
        .with_thread_name_prefix("ingest");
    assert_eq!(cfg.worker_count, 3);
    assert_eq!(cfg.thread_stack_size, 256 * 1024);
    assert_eq!(cfg.thread_name_prefix, "ingest");
}

#[test]
fn test_worker_pool_config_invalid_worker_count() {
    let cfg = WorkerPoolConfig::new().with_worker_count(0);
    assert_eq!(cfg.validate().unwrap_err(), "worker_count must be greater than 0");
}

#[test]
fn test_worker_pool_config_invalid_stack_size() {
    let cfg = WorkerPoolConfig::new().with_thread_stack_size(1024);
    assert!(cfg.validate().is_err());
}

#[test]
fn test_worker_pool_config_invalid_prefix() {
    let cfg = WorkerPoolConfig::new().with_thread_name_prefix("  ");
    assert!(cfg.validate().is_err());
}

#[test]
fn test_scheduler_config_validation() {
    assert!(TimerSchedulerConfig::default().validate().is_ok());
    assert!(TimerSchedulerConfig::default()
        .with_thread_name("")
        .validate()
        .is_err());
}

#[test]
fn test_queue_config_validation() {
    assert_eq!(QueueConfig::default().capacity, 64);
    assert!(QueueConfig { capacity: 0 }.validate().is_err());
}

#[test]
fn test_from_json_partial_uses_defaults() {
    let cfg = PrimitivesConfig::from_json_str(
        r#"{ "worker_pool": { "worker_count": 4 }, "queue": { "capacity": 16 } }"#,
    )
    .unwrap();
    assert_eq!(cfg.worker_pool.worker_count, 4);
    assert_eq!(cfg.worker_pool.thread_name_prefix, "pc-worker");
    assert_eq!(cfg.queue.capacity, 16);
    assert_eq!(cfg.scheduler, TimerSchedulerConfig::default());
}

#[test]
fn test_from_json_rejects_invalid_values() {
    let err = PrimitivesConfig::from_json_str(r#"{ "queue": { "capacity": 0 } }"#).unwrap_err();
    assert!(err.starts_with("queue invalid"), "{err}");
}

#[test]
fn test_from_json_rejects_malformed_input() {
    let err = PrimitivesConfig::from_json_str("{ not json").unwrap_err();
    assert!(err.starts_with("parse error"), "{err}");
}

#[test]
fn test_json_roundtrip_preserves_values() {
    let mut cfg = PrimitivesConfig::default();
    cfg.worker_pool.worker_count = 7;
    cfg.scheduler.thread_name = "cron".into();

    let json = serde_json::to_string(&cfg).unwrap();
    assert_eq!(PrimitivesConfig::from_json_str(&json).unwrap(), cfg);
}

#[test]
fn test_from_lookup_without_overrides() {
    let cfg = PrimitivesConfig::from_lookup(lookup(&[])).unwrap();
    assert_eq!(cfg, PrimitivesConfig::default());
}

#[test]
fn test_from_lookup_applies_every_override() {
    let cfg = PrimitivesConfig::from_lookup(lookup(&[
        (ENV_WORKER_COUNT, "6"),
        (ENV_WORKER_STACK_SIZE, " 131072 "),
        (ENV_WORKER_NAME_PREFIX, "render"),
        (ENV_SCHEDULER_THREAD_NAME, "ticker"),
        (ENV_QUEUE_CAPACITY, "128"),
    ]))
    .unwrap();

    assert_eq!(cfg.worker_pool.worker_count, 6);
    assert_eq!(cfg.worker_pool.thread_stack_size, 131_072);
    assert_eq!(cfg.worker_pool.thread_name_prefix, "render");
    assert_eq!(cfg.scheduler.thread_name, "ticker");
    assert_eq!(cfg.queue.capacity, 128);
}

#[test]
fn test_from_lookup_reports_unparsable_value() {
    let err = PrimitivesConfig::from_lookup(lookup(&[(ENV_WORKER_COUNT, "many")])).unwrap_err();
    assert!(err.contains(ENV_WORKER_COUNT), "{err}");
}

#[test]
fn test_from_lookup_validates_result() {
    let err = PrimitivesConfig::from_lookup(lookup(&[(ENV_QUEUE_CAPACITY, "0")])).unwrap_err();
    assert!(err.starts_with("queue invalid"), "{err}");
}
