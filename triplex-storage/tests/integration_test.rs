use tempfile::TempDir;
use triplex_storage::{RocksDbAdapter, StorageAdapter, StorageConfig};

/// Helper to create a temporary storage engine for testing
async fn create_test_storage() -> (RocksDbAdapter, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().to_str().unwrap();
    let engine = RocksDbAdapter::new(path).expect("Failed to create storage engine");
    (engine, temp_dir)
}

/// Helper to create a storage engine with custom config
async fn create_test_storage_with_config(config: StorageConfig) -> (RocksDbAdapter, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().to_str().unwrap();
    let engine =
        RocksDbAdapter::with_config(path, config).expect("Failed to create storage engine");
    (engine, temp_dir)
}

#[tokio::test]
async fn test_basic_put_get() {
    let (engine, _temp) = create_test_storage().await;

    let key = b"test_key";
    let value = b"test_value";

    engine.put(key, value).await.expect("Put failed");
    let result = engine.get(key).await.expect("Get failed");

    assert_eq!(result, Some(value.to_vec()));
}

#[tokio::test]
async fn test_get_nonexistent_key() {
    let (engine, _temp) = create_test_storage().await;

    let result = engine.get(b"nonexistent").await.expect("Get failed");
    assert_eq!(result, None);
}

#[tokio::test]
async fn test_delete() {
    let (engine, _temp) = create_test_storage().await;

    let key = b"delete_test";
    let value = b"to_be_deleted";

    engine.put(key, value).await.expect("Put failed");
    engine.delete(key).await.expect("Delete failed");

    let result = engine.get(key).await.expect("Get failed");
    assert_eq!(result, None);
}

#[tokio::test]
async fn test_update_existing_key() {
    let (engine, _temp) = create_test_storage().await;

    let key = b"update_key";
    let value1 = b"original_value";
    let value2 = b"updated_value";

    engine.put(key, value1).await.expect("First put failed");
    engine.put(key, value2).await.expect("Second put failed");

    let result = engine.get(key).await.expect("Get failed");
    assert_eq!(result, Some(value2.to_vec()));
}

#[tokio::test]
async fn test_cache_integration() {
    let (engine, _temp) = create_test_storage().await;

    let key = b"cache_test";
    let value = b"cached_value";

    engine.put(key, value).await.expect("Put failed");

    let result1 = engine.get(key).await.expect("First get failed");
    assert_eq!(result1, Some(value.to_vec()));

    let result2 = engine.get(key).await.expect("Second get failed");
    assert_eq!(result2, Some(value.to_vec()));
}

#[tokio::test]
async fn test_wal_enabled_operations() {
    let config = StorageConfig {
        enable_wal: true,
        ..Default::default()
    };

    let (engine, temp) = create_test_storage_with_config(config).await;

    engine
        .put(b"wal_key1", b"wal_value1")
        .await
        .expect("Put 1 failed");
    engine
        .put(b"wal_key2", b"wal_value2")
        .await
        .expect("Put 2 failed");
    engine.delete(b"wal_key1").await.expect("Delete failed");

    let wal_path = temp.path().join("wal.log");
    assert!(wal_path.exists(), "WAL file should exist");

    let result = engine.get(b"wal_key2").await.expect("Get failed");
    assert_eq!(result, Some(b"wal_value2".to_vec()));
}

#[tokio::test]
async fn test_wal_disabled_operations() {
    let config = StorageConfig {
        enable_wal: false,
        ..Default::default()
    };

    let (engine, temp) = create_test_storage_with_config(config).await;

    engine
        .put(b"no_wal_key", b"no_wal_value")
        .await
        .expect("Put failed");

    let wal_path = temp.path().join("wal.log");
    assert!(
        !wal_path.exists(),
        "WAL file should not exist when disabled"
    );

    let result = engine.get(b"no_wal_key").await.expect("Get failed");
    assert_eq!(result, Some(b"no_wal_value".to_vec()));
}

#[tokio::test]
async fn test_compaction_task() {
    let config = StorageConfig {
        compaction_threshold: 2,
        ..Default::default()
    };

    let (engine, _temp) = create_test_storage_with_config(config).await;

    engine.start_compaction().await;

    for i in 0..10 {
        let key = format!("compact_key_{}", i);
        let value = format!("compact_value_{}", i);
        engine
            .put(key.as_bytes(), value.as_bytes())
            .await
            .expect("Put failed");
    }

    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

    engine.stop_compaction().await;

    for i in 0..10 {
        let key = format!("compact_key_{}", i);
        let expected = format!("compact_value_{}", i);
        let result = engine.get(key.as_bytes()).await.expect("Get failed");
        assert_eq!(result, Some(expected.as_bytes().to_vec()));
    }
}

#[tokio::test]
async fn test_storage_stats() {
    let (engine, _temp) = create_test_storage().await;

    let stats = engine.stats().await;

    assert_eq!(stats.cache_size, 1000);
    assert!(stats.wal_enabled);
    assert!(stats.lsm_levels >= 1);
}

#[tokio::test]
async fn test_custom_config() {
    let config = StorageConfig {
        cache_size: 500,
        compaction_threshold: 5,
        max_level_size: 20,
        enable_wal: false,
        max_pending_writes: 64,
    };

    let (engine, _temp) = create_test_storage_with_config(config.clone()).await;

    assert_eq!(engine.config().cache_size, 500);
    assert_eq!(engine.config().compaction_threshold, 5);
    assert_eq!(engine.config().max_level_size, 20);
    assert!(!engine.config().enable_wal);
}

#[tokio::test]
async fn test_large_batch_operations() {
    let (engine, _temp) = create_test_storage().await;

    let batch_size = 100;
    for i in 0..batch_size {
        let key = format!("batch_key_{}", i);
        let value = format!("batch_value_{}", i);
        engine
            .put(key.as_bytes(), value.as_bytes())
            .await
            .expect("Batch put failed");
    }

    for i in 0..batch_size {
        let key = format!("batch_key_{}", i);
        let expected = format!("batch_value_{}", i);
        let result = engine.get(key.as_bytes()).await.expect("Batch get failed");
        assert_eq!(result, Some(expected.as_bytes().to_vec()));
    }
}

#[tokio::test]
async fn test_binary_data() {
    let (engine, _temp) = create_test_storage().await;

    let key = vec![0xFF, 0xFE, 0xFD, 0xFC];
    let value = vec![0x00, 0x01, 0x02, 0x03, 0x04, 0x05];

    engine.put(&key, &value).await.expect("Binary put failed");
    let result = engine.get(&key).await.expect("Binary get failed");

    assert_eq!(result, Some(value));
}

#[tokio::test]
async fn test_empty_value() {
    let (engine, _temp) = create_test_storage().await;

    let key = b"empty_value_key";
    let empty_value = b"";

    engine
        .put(key, empty_value)
        .await
        .expect("Empty put failed");
    let result = engine.get(key).await.expect("Empty get failed");

    assert_eq!(result, Some(empty_value.to_vec()));
}

#[tokio::test]
async fn test_concurrent_operations() {
    let (engine, _temp) = create_test_storage().await;
    let engine = std::sync::Arc::new(engine);

    let mut handles = vec![];

    for i in 0..10 {
        let engine_clone = engine.clone();
        let handle = tokio::spawn(async move {
            let key = format!("concurrent_key_{}", i);
            let value = format!("concurrent_value_{}", i);

            engine_clone
                .put(key.as_bytes(), value.as_bytes())
                .await
                .expect("Concurrent put failed");

            let result = engine_clone
                .get(key.as_bytes())
                .await
                .expect("Concurrent get failed");
            assert_eq!(result, Some(value.as_bytes().to_vec()));
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.await.expect("Task panicked");
    }
}

#[tokio::test]
async fn test_cache_overflow() {
    let config = StorageConfig {
        cache_size: 5,
        ..Default::default()
    };

    let (engine, _temp) = create_test_storage_with_config(config).await;

    for i in 0..10 {
        let key = format!("overflow_key_{}", i);
        let value = format!("overflow_value_{}", i);
        engine
            .put(key.as_bytes(), value.as_bytes())
            .await
            .expect("Overflow put failed");
    }

    for i in 0..10 {
        let key = format!("overflow_key_{}", i);
        let expected = format!("overflow_value_{}", i);
        let result = engine
            .get(key.as_bytes())
            .await
            .expect("Overflow get failed");
        assert_eq!(result, Some(expected.as_bytes().to_vec()));
    }
}

#[tokio::test]
async fn test_path_and_config_getters() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().to_str().unwrap();

    let config = StorageConfig {
        cache_size: 777,
        ..Default::default()
    };

    let engine = RocksDbAdapter::with_config(path, config).expect("Failed to create engine");

    assert!(
        engine
            .path()
            .to_str()
            .unwrap()
            .contains(temp_dir.path().to_str().unwrap())
    );
    assert_eq!(engine.config().cache_size, 777);
}

#[tokio::test]
async fn test_list_by_prefix() {
    let (engine, _temp) = create_test_storage().await;

    engine.put(b"entities/nouns/ab/1", b"a").await.unwrap();
    engine.put(b"entities/nouns/ab/2", b"b").await.unwrap();
    engine.put(b"entities/nouns/cd/1", b"c").await.unwrap();

    let keys = engine.list(b"entities/nouns/ab/").await.unwrap();
    assert_eq!(keys.len(), 2);
}
