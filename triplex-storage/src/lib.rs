//! Storage Adapter & Entity Store Facade
//!
//! Implements the storage side of spec §4.4/§6: a narrow `StorageAdapter`
//! contract (get/put/delete/list-by-prefix over opaque blobs), two
//! concrete adapters (an in-memory one for tests and embedding, and a
//! RocksDB-backed one inherited from the teacher's LSM/WAL/cache stack),
//! and the `EntityStoreFacade` that layers entity/relationship sharding,
//! the 2-file vector/metadata split, and count/statistics bookkeeping on
//! top of either adapter.

mod adapter;
mod cache;
mod compaction;
mod engine;
mod error;
mod facade;
mod lsm;
mod memory;
mod wal;

pub use adapter::StorageAdapter;
pub use cache::CacheManager;
pub use engine::{RocksDbAdapter, StorageConfig, StorageStats};
pub use error::{Error, Result};
pub use facade::{Counts, EntityStoreFacade, FieldStats, Statistics};
pub use lsm::LSMTree;
pub use memory::MemoryAdapter;
pub use wal::WriteAheadLog;
