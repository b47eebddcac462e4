//! Storage-adapter contract (spec §4.4, §6).
//!
//! The core treats physical storage as an opaque, injectable blob-keyed
//! KV store with range-listing. Everything above this trait — entity
//! sharding, the 2-file layout, counts — is the core's concern
//! (`EntityStoreFacade`); everything below it (filesystem, RocksDB, S3,
//! OPFS) is an external collaborator's.

use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait StorageAdapter: Send + Sync {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;
    async fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;
    async fn delete(&self, key: &[u8]) -> Result<()>;
    /// All keys sharing `prefix`, in ascending byte order.
    async fn list(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>>;
}
