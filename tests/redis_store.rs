//! Integration tests for the Redis record store.
//!
//! These tests require a Redis instance running at `redis://127.0.0.1/`.
//! Tests are ignored by default - run with `cargo test --features redis-storage --test redis_store -- --ignored`

#![cfg(feature = "redis-storage")]

use escrow_gate::{
    RedisRecordStore, RedisRecordStoreConfig, SubjectId, UniqueActionGuard, UniqueActionRecord,
    UniqueActionStore,
};
use std::sync::Arc;

/// Check if Redis is available before running tests
async fn redis_available() -> bool {
    RedisRecordStore::connect("redis://127.0.0.1/").await.is_ok()
}

/// Create a test store with a unique prefix, removing leftovers from
/// earlier runs
async fn create_test_store(test_name: &str) -> RedisRecordStore {
    let key_prefix = format!("test:escrow-gate:{}:", test_name);
    let client = redis::Client::open("redis://127.0.0.1/").expect("Invalid Redis URL");
    let mut conn = client
        .get_multiplexed_async_connection()
        .await
        .expect("Failed to connect to Redis");
    let keys: Vec<String> = redis::cmd("KEYS")
        .arg(format!("{}*", key_prefix))
        .query_async(&mut conn)
        .await
        .expect("KEYS failed");
    if !keys.is_empty() {
        let _: () = redis::cmd("DEL")
            .arg(keys)
            .query_async(&mut conn)
            .await
            .expect("DEL failed");
    }

    RedisRecordStore::connect_with_config(
        "redis://127.0.0.1/",
        RedisRecordStoreConfig { key_prefix },
    )
    .await
    .expect("Failed to connect to Redis")
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_redis_insert_conflict() {
    if !redis_available().await {
        eprintln!("Skipping test: Redis not available at redis://127.0.0.1/");
        return;
    }

    let store = create_test_store("insert_conflict").await;
    let record = UniqueActionRecord::new("S".into(), "A".into());

    store.insert(record.clone()).await.unwrap();
    assert!(store.insert(record).await.unwrap_err().is_conflict());
    assert_eq!(store.count(&SubjectId::from("S")).await.unwrap(), 1);
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_redis_count_for_unknown_subject() {
    if !redis_available().await {
        eprintln!("Skipping test: Redis not available");
        return;
    }

    let store = create_test_store("unknown_subject").await;
    assert_eq!(store.count(&SubjectId::from("nobody")).await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // Requires Redis
async fn test_redis_concurrent_record_once() {
    if !redis_available().await {
        eprintln!("Skipping test: Redis not available");
        return;
    }

    let guard = Arc::new(UniqueActionGuard::new(
        create_test_store("concurrent").await,
    ));
    let mut handles = vec![];

    for _ in 0..20 {
        let guard = Arc::clone(&guard);
        handles.push(tokio::spawn(async move {
            guard.record_once("deal".into(), 42_i64.into()).await.unwrap()
        }));
    }

    let mut recorded = 0;
    for handle in handles {
        let outcome = handle.await.unwrap();
        assert_eq!(outcome.count, 1);
        if outcome.recorded {
            recorded += 1;
        }
    }
    assert_eq!(recorded, 1);
}

#[tokio::test]
#[ignore] // Requires Redis
async fn test_redis_connect_failure() {
    let result = RedisRecordStore::connect("redis://127.0.0.1:1/").await;
    assert!(result.is_err());
}
