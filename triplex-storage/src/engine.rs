//! RocksDB-backed `StorageAdapter` (spec §1: storage adapter is an
//! external collaborator; this is one concrete implementation of the
//! contract, combining RocksDB, an LSM-tree compaction skeleton, a
//! write-ahead log, and an in-process read cache exactly as the teacher's
//! engine did).

use crate::adapter::StorageAdapter;
use crate::cache::CacheManager;
use crate::compaction::CompactionManager;
use crate::lsm::LSMTree;
use crate::wal::WriteAheadLog;
use crate::{Error, Result};
use async_trait::async_trait;
use rocksdb::{DB, IteratorMode, Options};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Configuration for the storage engine.
#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// Maximum cache size (number of entries).
    pub cache_size: usize,
    /// Compaction threshold (number of LSM levels before compaction triggers).
    pub compaction_threshold: usize,
    /// Maximum LSM level size.
    pub max_level_size: usize,
    /// Enable write-ahead logging.
    pub enable_wal: bool,
    /// High-water mark for in-flight writes before `put`/`delete` return
    /// `Busy` (spec §5 backpressure).
    pub max_pending_writes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_size: 1000,
            compaction_threshold: 4,
            max_level_size: 10,
            enable_wal: true,
            max_pending_writes: 4096,
        }
    }
}

/// Integrated storage engine combining RocksDB, an LSM-tree compaction
/// skeleton, a read cache, and write-ahead logging.
pub struct RocksDbAdapter {
    db: DB,
    path: PathBuf,
    cache: Arc<CacheManager>,
    lsm: Arc<LSMTree>,
    compaction_manager: Arc<CompactionManager>,
    wal: Arc<Mutex<Option<WriteAheadLog>>>,
    config: StorageConfig,
    compaction_handle: Mutex<Option<JoinHandle<()>>>,
    pending_writes: AtomicUsize,
}

impl RocksDbAdapter {
    /// Create a new storage engine with default configuration.
    pub fn new(path: &str) -> Result<Self> {
        Self::with_config(path, StorageConfig::default())
    }

    /// Create a new storage engine with custom configuration.
    pub fn with_config(path: &str, config: StorageConfig) -> Result<Self> {
        let path_buf = PathBuf::from(path);

        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, &path_buf)?;

        let cache = Arc::new(CacheManager::new(config.cache_size));
        let lsm = Arc::new(LSMTree::new(config.max_level_size));
        let compaction_manager = Arc::new(CompactionManager::new(
            Arc::clone(&lsm),
            config.compaction_threshold,
        ));

        let wal = if config.enable_wal {
            let wal_path = path_buf.join("wal.log");
            let wal = WriteAheadLog::new(wal_path).map_err(Error::Io)?;
            Arc::new(Mutex::new(Some(wal)))
        } else {
            Arc::new(Mutex::new(None))
        };

        Ok(Self {
            db,
            path: path_buf,
            cache,
            lsm,
            compaction_manager,
            wal,
            config,
            compaction_handle: Mutex::new(None),
            pending_writes: AtomicUsize::new(0),
        })
    }

    /// Start background compaction task.
    pub async fn start_compaction(&self) {
        let compaction_manager = Arc::clone(&self.compaction_manager);
        let handle = tokio::spawn(async move {
            loop {
                compaction_manager.check_and_compact().await;
                tokio::time::sleep(tokio::time::Duration::from_secs(10)).await;
            }
        });

        let mut compaction_handle = self.compaction_handle.lock().await;
        *compaction_handle = Some(handle);
    }

    /// Stop background compaction task.
    pub async fn stop_compaction(&self) {
        let mut handle = self.compaction_handle.lock().await;
        if let Some(h) = handle.take() {
            h.abort();
        }
    }

    /// Get storage statistics.
    pub async fn stats(&self) -> StorageStats {
        StorageStats {
            lsm_levels: self.lsm.level_count(),
            cache_size: self.config.cache_size,
            wal_enabled: self.config.enable_wal,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Enter the write-admission gate: reject with `Busy` once the
    /// high-water mark of concurrent in-flight writes is exceeded.
    fn admit_write(&self) -> Result<WriteGuard<'_>> {
        let in_flight = self.pending_writes.fetch_add(1, Ordering::SeqCst) + 1;
        if in_flight > self.config.max_pending_writes {
            self.pending_writes.fetch_sub(1, Ordering::SeqCst);
            warn!(in_flight, "write queue over high-water mark, returning Busy");
            return Err(Error::Busy);
        }
        Ok(WriteGuard { adapter: self })
    }
}

struct WriteGuard<'a> {
    adapter: &'a RocksDbAdapter,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.adapter.pending_writes.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StorageAdapter for RocksDbAdapter {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(value) = self.cache.get(key).await {
            return Ok(Some(value));
        }

        if let Some(_file_id) = self.lsm.search(key).await {
            debug!("lsm hinted an sstable location; falling back to rocksdb read");
        }

        let value = self.db.get(key)?;

        if let Some(ref v) = value {
            self.cache.put(key.to_vec(), v.clone()).await;
        }

        Ok(value)
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let _guard = self.admit_write()?;

        if self.config.enable_wal {
            let mut wal = self.wal.lock().await;
            if let Some(wal) = wal.as_mut() {
                let mut record = Vec::with_capacity(key.len() + value.len() + 16);
                record.extend_from_slice(b"PUT:");
                record.extend_from_slice(&(key.len() as u32).to_be_bytes());
                record.extend_from_slice(key);
                record.extend_from_slice(value);
                wal.append(&record).map_err(Error::Io)?;
            }
        }

        self.db.put(key, value)?;
        self.cache.put(key.to_vec(), value.to_vec()).await;

        Ok(())
    }

    async fn delete(&self, key: &[u8]) -> Result<()> {
        let _guard = self.admit_write()?;

        if self.config.enable_wal {
            let mut wal = self.wal.lock().await;
            if let Some(wal) = wal.as_mut() {
                let mut record = Vec::with_capacity(key.len() + 8);
                record.extend_from_slice(b"DEL:");
                record.extend_from_slice(key);
                wal.append(&record).map_err(Error::Io)?;
            }
        }

        self.db.delete(key)?;
        self.cache.remove(key).await;

        Ok(())
    }

    async fn list(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        let mut keys = Vec::new();
        let iter = self
            .db
            .iterator(IteratorMode::From(prefix, rocksdb::Direction::Forward));
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            keys.push(key.to_vec());
        }
        Ok(keys)
    }
}

/// Storage statistics.
#[derive(Debug, Clone)]
pub struct StorageStats {
    pub lsm_levels: usize,
    pub cache_size: usize,
    pub wal_enabled: bool,
}
