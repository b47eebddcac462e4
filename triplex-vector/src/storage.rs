//! Persistence for the vector/graph file (spec §4.4/§6:
//! `entities/nouns/vectors/{shard:2hex}/{id}`).
//!
//! `PersistentVectorIndex` is the sole writer of this key — the
//! `EntityStoreFacade`'s `put_entity`/`get_entity` family only ever touch
//! the sibling metadata key, so the two crates never race on the same
//! bytes. See `triplex_storage::facade::EntityStoreFacade::put_entity_metadata`.

use crate::{
    DistanceMetric, HnswConfig, Result, SearchResult, Vector, VectorError, VectorIndex,
    VectorIndexConfig,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use triplex_core::ids::{EntityId, shard_of};
use triplex_storage::StorageAdapter;

const INDEX_VERSION: u32 = 1;
const METADATA_KEY: &[u8] = b"_system/vector_index_metadata";

/// Configuration persisted alongside the index so `open` can rebuild an
/// identically-configured `VectorIndex` without the caller re-supplying it.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexMetadata {
    dimension: usize,
    metric: DistanceMetric,
    hnsw_config: HnswConfig,
    version: u32,
}

fn vector_key(id: &str) -> Vec<u8> {
    format!("entities/nouns/vectors/{}/{}", shard_of(id), id).into_bytes()
}

fn id_from_key(key: &[u8]) -> Option<EntityId> {
    let key = std::str::from_utf8(key).ok()?;
    key.rsplit('/').next().map(|s| s.to_string())
}

/// Encodes one node's record per spec §6: `{version:u32, dim:u32,
/// level:u32}` header, `dim` little-endian `f32`s, then one `{count:u32,
/// ids:[id]}` block per layer `0..=level`. A trailing optional label
/// (`VectorIndex`'s free-form per-vector metadata string) is appended
/// after the header/neighbor blocks the spec defines, since this key is
/// this module's alone to format.
fn encode_record(vector: &[f32], level: usize, neighbors: &[Vec<EntityId>], label: Option<&str>) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&INDEX_VERSION.to_le_bytes());
    buf.extend_from_slice(&(vector.len() as u32).to_le_bytes());
    buf.extend_from_slice(&(level as u32).to_le_bytes());
    for x in vector {
        buf.extend_from_slice(&x.to_le_bytes());
    }
    for layer in neighbors {
        buf.extend_from_slice(&(layer.len() as u32).to_le_bytes());
        for id in layer {
            let bytes = id.as_bytes();
            buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            buf.extend_from_slice(bytes);
        }
    }
    match label {
        Some(label) => {
            buf.push(1);
            let bytes = label.as_bytes();
            buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            buf.extend_from_slice(bytes);
        }
        None => buf.push(0),
    }
    buf
}

struct DecodedRecord {
    vector: Vec<f32>,
    level: usize,
    neighbors: Vec<Vec<EntityId>>,
    label: Option<String>,
}

fn decode_record(bytes: &[u8]) -> Result<DecodedRecord> {
    let mut cursor = Cursor::new(bytes);
    let version = cursor.read_u32()?;
    if version != INDEX_VERSION {
        return Err(VectorError::IndexError(format!(
            "unsupported vector record version: {version}"
        )));
    }
    let dim = cursor.read_u32()? as usize;
    let level = cursor.read_u32()? as usize;

    let mut vector = Vec::with_capacity(dim);
    for _ in 0..dim {
        vector.push(cursor.read_f32()?);
    }

    let mut neighbors = Vec::with_capacity(level + 1);
    for _ in 0..=level {
        let count = cursor.read_u32()? as usize;
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            ids.push(cursor.read_string()?);
        }
        neighbors.push(ids);
    }

    let has_label = cursor.read_u8()?;
    let label = if has_label == 1 {
        Some(cursor.read_string()?)
    } else {
        None
    };

    Ok(DecodedRecord {
        vector,
        level,
        neighbors,
        label,
    })
}

/// Minimal little-endian cursor over a borrowed byte slice, since record
/// fields are variable-length (string ids) and don't line up with a
/// fixed `#[repr(C)]` struct bincode could derive for us.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos + n;
        if end > self.bytes.len() {
            return Err(VectorError::IndexError(
                "truncated vector record".to_string(),
            ));
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32> {
        let slice = self.take(4)?;
        Ok(u32::from_le_bytes(slice.try_into().unwrap()))
    }

    fn read_f32(&mut self) -> Result<f32> {
        let slice = self.take(4)?;
        Ok(f32::from_le_bytes(slice.try_into().unwrap()))
    }

    fn read_string(&mut self) -> Result<String> {
        let len = self.read_u32()? as usize;
        let slice = self.take(len)?;
        String::from_utf8(slice.to_vec())
            .map_err(|e| VectorError::IndexError(format!("invalid id bytes: {e}")))
    }
}

/// Persistent HNSW vector index backed by any `StorageAdapter`.
///
/// Every mutation rewrites the record of every currently-live node: an
/// `insert` can add back-edges (and prune existing ones) on nodes other
/// than the one inserted, and `delete` unwires the deleted node from
/// every neighbor set it was part of, so those neighbors' own persisted
/// records are stale too.
pub struct PersistentVectorIndex<A: StorageAdapter> {
    index: VectorIndex,
    storage: Arc<A>,
    known_ids: HashSet<EntityId>,
}

impl<A: StorageAdapter> PersistentVectorIndex<A> {
    /// Create a new persistent vector index over `storage`, recording its
    /// configuration so `open` can rebuild it later.
    pub async fn create(storage: Arc<A>, config: VectorIndexConfig) -> Result<Self> {
        let metadata = IndexMetadata {
            dimension: config.dimension,
            metric: config.metric,
            hnsw_config: config.hnsw_config.clone(),
            version: INDEX_VERSION,
        };
        let metadata_bytes = bincode::serialize(&metadata)
            .map_err(|e| VectorError::SerializationError(e.to_string()))?;
        storage.put(METADATA_KEY, &metadata_bytes).await?;

        let index = VectorIndex::with_config(config)?;
        Ok(Self {
            index,
            storage,
            known_ids: HashSet::new(),
        })
    }

    /// Reopen a previously-created index, rebuilding the in-memory HNSW
    /// graph directly from each node's persisted level/neighbor lists
    /// (no re-insertion, so the loaded graph is bit-for-bit the one that
    /// was persisted).
    pub async fn open(storage: Arc<A>) -> Result<Self> {
        let metadata_bytes = storage
            .get(METADATA_KEY)
            .await?
            .ok_or_else(|| VectorError::InvalidVector("index metadata not found".to_string()))?;
        let metadata: IndexMetadata = bincode::deserialize(&metadata_bytes)
            .map_err(|e| VectorError::SerializationError(e.to_string()))?;

        if metadata.version != INDEX_VERSION {
            return Err(VectorError::InvalidVector(format!(
                "unsupported index version: {}",
                metadata.version
            )));
        }

        let config = VectorIndexConfig {
            dimension: metadata.dimension,
            metric: metadata.metric,
            hnsw_config: metadata.hnsw_config,
        };
        let mut index = VectorIndex::with_config(config)?;

        let keys = storage.list(b"entities/nouns/vectors/").await?;
        let mut known_ids = HashSet::with_capacity(keys.len());
        for key in keys {
            let Some(id) = id_from_key(&key) else { continue };
            let Some(bytes) = storage.get(&key).await? else {
                continue;
            };
            let record = decode_record(&bytes)?;
            index.load_node(
                id.clone(),
                Vector::new(record.vector),
                record.label,
                record.level,
                record.neighbors,
            );
            known_ids.insert(id);
        }
        index.finalize_load();

        Ok(Self {
            index,
            storage,
            known_ids,
        })
    }

    /// Insert a vector with automatic persistence.
    pub async fn insert(&mut self, id: EntityId, vector: Vector) -> Result<()> {
        self.insert_with_metadata(id, vector, None).await
    }

    /// Insert a vector with an attached label, with automatic persistence.
    pub async fn insert_with_metadata(
        &mut self,
        id: EntityId,
        vector: Vector,
        metadata: Option<String>,
    ) -> Result<()> {
        self.index
            .insert_with_metadata(id.clone(), vector, metadata)
            .await?;
        self.known_ids.insert(id);
        self.resync().await
    }

    /// Search for k nearest neighbors.
    pub async fn search(&self, query: &Vector, k: usize) -> Result<Vec<SearchResult>> {
        self.index.search(query, k).await
    }

    /// Search among a pre-filtered candidate set (spec §4.1 `search_within`).
    pub async fn search_within(
        &self,
        query: &Vector,
        k: usize,
        candidate_ids: &[EntityId],
    ) -> Result<Vec<SearchResult>> {
        self.index.search_within(query, k, candidate_ids).await
    }

    /// Get a vector by id.
    pub fn get(&self, id: &str) -> Option<&Vector> {
        self.index.get(id)
    }

    /// Delete a vector with automatic persistence. A no-op if `id` is
    /// unknown (spec §7).
    pub async fn delete(&mut self, id: &str) -> Result<()> {
        self.index.delete(id).await?;
        if self.known_ids.remove(id) {
            self.storage.delete(&vector_key(id)).await?;
        }
        self.resync().await
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn ids(&self) -> Vec<EntityId> {
        self.index.ids()
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    pub fn metric(&self) -> DistanceMetric {
        self.index.metric()
    }

    /// Rewrite every live node's record so storage matches the in-memory
    /// graph exactly, and drop records for ids that are no longer live.
    async fn resync(&mut self) -> Result<()> {
        let live_ids: HashSet<EntityId> = self.index.ids().into_iter().collect();

        for id in &live_ids {
            let Some((level, neighbors)) = self.index.export_node(id) else {
                continue;
            };
            let vector = self
                .index
                .get(id)
                .ok_or_else(|| VectorError::NotFound(id.clone()))?;
            let label = self.index.get_metadata(id);
            let bytes = encode_record(&vector.data, level, &neighbors, label);
            self.storage.put(&vector_key(id), &bytes).await?;
        }

        for stale in self.known_ids.difference(&live_ids) {
            self.storage.delete(&vector_key(stale)).await?;
        }

        self.known_ids = live_ids;
        Ok(())
    }
}
