//! Entity Store Facade (spec §4.4, C4).
//!
//! Uniform CRUD over entities and relationships on top of a
//! `StorageAdapter`, opaque to the query executor. Keys are sharded by the
//! first two hex characters of the id (256 shards); each entity is split
//! across two blobs — a vector/graph file (always loaded with the HNSW
//! index) and a metadata file (loaded lazily per query) — the "2-file
//! system" from spec §4.4/§6.

use crate::adapter::StorageAdapter;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use triplex_core::entity::{Entity, Relationship};
use triplex_core::ids::shard_of;

const COUNTS_KEY: &[u8] = b"_system/counts";
const STATISTICS_KEY: &[u8] = b"_system/statistics";

fn noun_vector_key(id: &str) -> Vec<u8> {
    format!("entities/nouns/vectors/{}/{}", shard_of(id), id).into_bytes()
}

fn noun_metadata_key(id: &str) -> Vec<u8> {
    format!("entities/nouns/metadata/{}/{}", shard_of(id), id).into_bytes()
}

fn verb_vector_key(id: &str) -> Vec<u8> {
    format!("entities/verbs/vectors/{}/{}", shard_of(id), id).into_bytes()
}

fn verb_metadata_key(id: &str) -> Vec<u8> {
    format!("entities/verbs/metadata/{}/{}", shard_of(id), id).into_bytes()
}

/// `_system/counts`: O(1) totals per entity type and edge type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Counts {
    pub entities: HashMap<String, u64>,
    pub relations: HashMap<String, u64>,
}

/// `_system/statistics`: per-field cardinality/min/max, maintained by
/// `triplex-metadata` and persisted here for recovery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Statistics {
    pub fields: HashMap<String, FieldStats>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldStats {
    pub cardinality: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Split representation of an entity as it is persisted: the vector file
/// (always loaded) and the metadata file (lazily loaded).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct NounRecord {
    id: String,
    vector: Vec<f32>,
    entity_type: Option<String>,
    created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VerbRecord {
    id: String,
    source: String,
    target: String,
    relation_type: String,
    vector: Option<Vec<f32>>,
    weight: f32,
}

pub struct EntityStoreFacade<A: StorageAdapter> {
    adapter: Arc<A>,
    counts: RwLock<Counts>,
}

impl<A: StorageAdapter> EntityStoreFacade<A> {
    /// Open a facade over `adapter`, loading `_system/counts` if present
    /// (falling back to zeroed counts — a full rebuild path exists via
    /// `recount`, see spec §3 "Lifecycle").
    pub async fn open(adapter: Arc<A>) -> Result<Self> {
        let counts = match adapter.get(COUNTS_KEY).await? {
            Some(bytes) => bincode::deserialize(&bytes)
                .map_err(|e| Error::Serialization(e.to_string()))?,
            None => Counts::default(),
        };
        Ok(Self {
            adapter,
            counts: RwLock::new(counts),
        })
    }

    async fn persist_counts(&self) -> Result<()> {
        let counts = self.counts.read().await;
        let bytes =
            bincode::serialize(&*counts).map_err(|e| Error::Serialization(e.to_string()))?;
        self.adapter.put(COUNTS_KEY, &bytes).await
    }

    pub async fn counts(&self) -> Counts {
        self.counts.read().await.clone()
    }

    /// Put an entity under the same write batch as its count update
    /// (spec §4.4: "updated under the same write batch as the underlying
    /// entity").
    pub async fn put_entity(&self, entity: &Entity) -> Result<()> {
        let record = NounRecord {
            id: entity.id.clone(),
            vector: entity.vector.clone(),
            entity_type: entity.entity_type.clone(),
            created_at: entity.created_at,
        };
        let vector_bytes =
            bincode::serialize(&record).map_err(|e| Error::Serialization(e.to_string()))?;
        let metadata_bytes = serde_json::to_vec(&entity.metadata)
            .map_err(|e| Error::Serialization(e.to_string()))?;

        let is_new = self.adapter.get(&noun_vector_key(&entity.id)).await?.is_none();

        self.adapter
            .put(&noun_vector_key(&entity.id), &vector_bytes)
            .await?;
        self.adapter
            .put(&noun_metadata_key(&entity.id), &metadata_bytes)
            .await?;

        if is_new {
            let type_key = entity.entity_type.clone().unwrap_or_default();
            let mut counts = self.counts.write().await;
            *counts.entities.entry(type_key).or_insert(0) += 1;
            drop(counts);
            self.persist_counts().await?;
        }

        Ok(())
    }

    /// Write only an entity's metadata file and bump its type counter,
    /// without touching the vector/graph file at `noun_vector_key` — used
    /// by callers (the top-level query engine) that own vector persistence
    /// themselves via `triplex-vector`'s `PersistentVectorIndex`, so the
    /// two crates don't race to write incompatible schemas under the same
    /// key (see DESIGN.md, "vector file ownership").
    pub async fn put_entity_metadata(
        &self,
        id: &str,
        entity_type: Option<&str>,
        metadata: &triplex_core::scalar::Metadata,
    ) -> Result<()> {
        let metadata_bytes =
            serde_json::to_vec(metadata).map_err(|e| Error::Serialization(e.to_string()))?;
        let is_new = self.adapter.get(&noun_metadata_key(id)).await?.is_none();

        self.adapter.put(&noun_metadata_key(id), &metadata_bytes).await?;

        if is_new {
            let type_key = entity_type.unwrap_or_default().to_string();
            let mut counts = self.counts.write().await;
            *counts.entities.entry(type_key).or_insert(0) += 1;
            drop(counts);
            self.persist_counts().await?;
        }

        Ok(())
    }

    /// Read only an entity's metadata file, independent of whether a
    /// vector file exists for it under `PersistentVectorIndex`.
    pub async fn get_entity_metadata(
        &self,
        id: &str,
    ) -> Result<Option<triplex_core::scalar::Metadata>> {
        match self.adapter.get(&noun_metadata_key(id)).await? {
            Some(bytes) => {
                serde_json::from_slice(&bytes).map_err(|e| Error::Serialization(e.to_string()))
            }
            None => Ok(None),
        }
    }

    /// Delete only an entity's metadata file and decrement its type
    /// counter, mirroring `put_entity_metadata`.
    pub async fn delete_entity_metadata(&self, id: &str, entity_type: Option<&str>) -> Result<()> {
        if self.adapter.get(&noun_metadata_key(id)).await?.is_none() {
            return Ok(());
        }
        self.adapter.delete(&noun_metadata_key(id)).await?;

        let type_key = entity_type.unwrap_or_default();
        let mut counts = self.counts.write().await;
        if let Some(count) = counts.entities.get_mut(type_key) {
            *count = count.saturating_sub(1);
        }
        drop(counts);
        self.persist_counts().await
    }

    pub async fn get_entity(&self, id: &str) -> Result<Option<Entity>> {
        let Some(vector_bytes) = self.adapter.get(&noun_vector_key(id)).await? else {
            return Ok(None);
        };
        let record: NounRecord = bincode::deserialize(&vector_bytes)
            .map_err(|e| Error::Serialization(e.to_string()))?;

        let metadata = match self.adapter.get(&noun_metadata_key(id)).await? {
            Some(bytes) => {
                serde_json::from_slice(&bytes).map_err(|e| Error::Serialization(e.to_string()))?
            }
            None => Default::default(),
        };

        let mut entity = Entity::new(record.id, record.vector, record.created_at)
            .with_metadata(metadata);
        entity.entity_type = record.entity_type;
        Ok(Some(entity))
    }

    /// Delete an entity's two files and decrement its type counter.
    /// A no-op (not an error) if the entity doesn't exist (spec §7).
    pub async fn delete_entity(&self, id: &str) -> Result<()> {
        let Some(existing) = self.get_entity(id).await? else {
            return Ok(());
        };

        self.adapter.delete(&noun_vector_key(id)).await?;
        self.adapter.delete(&noun_metadata_key(id)).await?;

        let type_key = existing.entity_type.unwrap_or_default();
        let mut counts = self.counts.write().await;
        if let Some(count) = counts.entities.get_mut(&type_key) {
            *count = count.saturating_sub(1);
        }
        drop(counts);
        self.persist_counts().await
    }

    pub async fn put_relation(&self, relation: &Relationship) -> Result<()> {
        let record = VerbRecord {
            id: relation.id.clone(),
            source: relation.source.clone(),
            target: relation.target.clone(),
            relation_type: relation.relation_type.clone(),
            vector: relation.vector.clone(),
            weight: relation.weight,
        };
        let vector_bytes =
            bincode::serialize(&record).map_err(|e| Error::Serialization(e.to_string()))?;
        let metadata_bytes = serde_json::to_vec(&relation.metadata)
            .map_err(|e| Error::Serialization(e.to_string()))?;

        let is_new = self.adapter.get(&verb_vector_key(&relation.id)).await?.is_none();

        self.adapter
            .put(&verb_vector_key(&relation.id), &vector_bytes)
            .await?;
        self.adapter
            .put(&verb_metadata_key(&relation.id), &metadata_bytes)
            .await?;

        if is_new {
            let mut counts = self.counts.write().await;
            *counts
                .relations
                .entry(relation.relation_type.clone())
                .or_insert(0) += 1;
            drop(counts);
            self.persist_counts().await?;
        }

        Ok(())
    }

    pub async fn get_relation(&self, id: &str) -> Result<Option<Relationship>> {
        let Some(vector_bytes) = self.adapter.get(&verb_vector_key(id)).await? else {
            return Ok(None);
        };
        let record: VerbRecord = bincode::deserialize(&vector_bytes)
            .map_err(|e| Error::Serialization(e.to_string()))?;

        let metadata = match self.adapter.get(&verb_metadata_key(id)).await? {
            Some(bytes) => {
                serde_json::from_slice(&bytes).map_err(|e| Error::Serialization(e.to_string()))?
            }
            None => Default::default(),
        };

        let mut relation =
            Relationship::new(record.id, record.source, record.target, record.relation_type)
                .with_weight(record.weight)
                .with_metadata(metadata);
        relation.vector = record.vector;
        Ok(Some(relation))
    }

    pub async fn delete_relation(&self, id: &str) -> Result<()> {
        let Some(existing) = self.get_relation(id).await? else {
            return Ok(());
        };

        self.adapter.delete(&verb_vector_key(id)).await?;
        self.adapter.delete(&verb_metadata_key(id)).await?;

        let mut counts = self.counts.write().await;
        if let Some(count) = counts.relations.get_mut(&existing.relation_type) {
            *count = count.saturating_sub(1);
        }
        drop(counts);
        self.persist_counts().await
    }

    /// All live entity ids, for index rebuilds (spec §3: "a rebuild from
    /// the storage adapter must reproduce any index").
    pub async fn list_entity_ids(&self) -> Result<Vec<String>> {
        let keys = self.adapter.list(b"entities/nouns/vectors/").await?;
        Ok(keys
            .into_iter()
            .filter_map(|k| String::from_utf8(k).ok())
            .filter_map(|k| k.rsplit('/').next().map(|s| s.to_string()))
            .collect())
    }

    pub async fn list_relation_ids(&self) -> Result<Vec<String>> {
        let keys = self.adapter.list(b"entities/verbs/vectors/").await?;
        Ok(keys
            .into_iter()
            .filter_map(|k| String::from_utf8(k).ok())
            .filter_map(|k| k.rsplit('/').next().map(|s| s.to_string()))
            .collect())
    }

    /// Rebuild `_system/counts` from the live corpus (spec §3: "a rebuild
    /// path exists for recovery"). Call after a detected `IndexCorrupt`.
    pub async fn recount(&self) -> Result<()> {
        let mut counts = Counts::default();
        for id in self.list_entity_ids().await? {
            if let Some(entity) = self.get_entity(&id).await? {
                let key = entity.entity_type.unwrap_or_default();
                *counts.entities.entry(key).or_insert(0) += 1;
            }
        }
        for id in self.list_relation_ids().await? {
            if let Some(relation) = self.get_relation(&id).await? {
                *counts.relations.entry(relation.relation_type).or_insert(0) += 1;
            }
        }
        *self.counts.write().await = counts;
        self.persist_counts().await
    }

    pub async fn load_statistics(&self) -> Result<Statistics> {
        match self.adapter.get(STATISTICS_KEY).await? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| Error::Serialization(e.to_string())),
            None => Ok(Statistics::default()),
        }
    }

    pub async fn persist_statistics(&self, stats: &Statistics) -> Result<()> {
        let bytes =
            serde_json::to_vec(stats).map_err(|e| Error::Serialization(e.to_string()))?;
        self.adapter.put(STATISTICS_KEY, &bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryAdapter;
    use triplex_core::scalar::Scalar;

    fn sample_entity(id: &str, entity_type: &str) -> Entity {
        Entity::new(id.to_string(), vec![1.0, 0.0], 0).with_type(entity_type)
    }

    #[tokio::test]
    async fn put_then_get_round_trips_vector_and_metadata() {
        let adapter = Arc::new(MemoryAdapter::new());
        let facade = EntityStoreFacade::open(adapter).await.unwrap();

        let mut entity = sample_entity("e1", "article");
        entity
            .metadata
            .insert("category".to_string(), Scalar::String("tech".to_string()));
        facade.put_entity(&entity).await.unwrap();

        let fetched = facade.get_entity("e1").await.unwrap().unwrap();
        assert_eq!(fetched.vector, vec![1.0, 0.0]);
        assert_eq!(
            fetched.metadata.get("category"),
            Some(&Scalar::String("tech".to_string()))
        );
    }

    #[tokio::test]
    async fn counts_increment_on_insert_and_decrement_on_delete() {
        let adapter = Arc::new(MemoryAdapter::new());
        let facade = EntityStoreFacade::open(adapter).await.unwrap();

        facade.put_entity(&sample_entity("e1", "article")).await.unwrap();
        facade.put_entity(&sample_entity("e2", "article")).await.unwrap();
        assert_eq!(facade.counts().await.entities["article"], 2);

        facade.delete_entity("e1").await.unwrap();
        assert_eq!(facade.counts().await.entities["article"], 1);
    }

    #[tokio::test]
    async fn reinsert_of_same_id_does_not_double_count() {
        let adapter = Arc::new(MemoryAdapter::new());
        let facade = EntityStoreFacade::open(adapter).await.unwrap();

        facade.put_entity(&sample_entity("e1", "article")).await.unwrap();
        facade.put_entity(&sample_entity("e1", "article")).await.unwrap();
        assert_eq!(facade.counts().await.entities["article"], 1);
    }

    #[tokio::test]
    async fn delete_of_unknown_entity_is_noop() {
        let adapter = Arc::new(MemoryAdapter::new());
        let facade = EntityStoreFacade::open(adapter).await.unwrap();
        assert!(facade.delete_entity("ghost").await.is_ok());
    }

    #[tokio::test]
    async fn recount_reproduces_counts_from_corpus() {
        let adapter = Arc::new(MemoryAdapter::new());
        let facade = EntityStoreFacade::open(adapter).await.unwrap();
        facade.put_entity(&sample_entity("e1", "article")).await.unwrap();
        facade.put_entity(&sample_entity("e2", "video")).await.unwrap();

        // Simulate drift, then rebuild.
        facade.counts.write().await.entities.clear();
        facade.recount().await.unwrap();

        let counts = facade.counts().await;
        assert_eq!(counts.entities["article"], 1);
        assert_eq!(counts.entities["video"], 1);
    }

    #[tokio::test]
    async fn metadata_only_put_does_not_touch_vector_key() {
        let adapter = Arc::new(MemoryAdapter::new());
        let facade = EntityStoreFacade::open(adapter).await.unwrap();

        let mut metadata = triplex_core::scalar::Metadata::new();
        metadata.insert("title".to_string(), Scalar::String("hello".to_string()));
        facade
            .put_entity_metadata("e1", Some("article"), &metadata)
            .await
            .unwrap();

        assert!(facade.get_entity("e1").await.unwrap().is_none());
        assert_eq!(
            facade.get_entity_metadata("e1").await.unwrap(),
            Some(metadata)
        );
        assert_eq!(facade.counts().await.entities["article"], 1);

        facade
            .delete_entity_metadata("e1", Some("article"))
            .await
            .unwrap();
        assert_eq!(facade.counts().await.entities["article"], 0);
    }

    #[tokio::test]
    async fn relationship_round_trip_and_counts() {
        let adapter = Arc::new(MemoryAdapter::new());
        let facade = EntityStoreFacade::open(adapter).await.unwrap();

        let rel = Relationship::new("r1".into(), "a".into(), "b".into(), "cites");
        facade.put_relation(&rel).await.unwrap();
        assert_eq!(facade.counts().await.relations["cites"], 1);

        let fetched = facade.get_relation("r1").await.unwrap().unwrap();
        assert_eq!(fetched.source, "a");
        assert_eq!(fetched.target, "b");

        facade.delete_relation("r1").await.unwrap();
        assert_eq!(facade.counts().await.relations["cites"], 0);
        assert!(facade.get_relation("r1").await.unwrap().is_none());
    }
}
