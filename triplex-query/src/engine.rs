//! The top-level query engine (spec §6): wires the vector index, entity
//! store facade, metadata index, and graph index behind one public API,
//! and implements `find`/`search` with the planner and fusion ranker.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tracing::instrument;

use triplex_core::entity::{Entity, Relationship};
use triplex_core::ids::{new_id, EntityId, RelationId};
use triplex_core::scalar::{Metadata, Scalar};
use triplex_core::{Error, Result};
use triplex_graph::GraphIndex;
use triplex_metadata::MetadataIndex;
use triplex_storage::{EntityStoreFacade, StorageAdapter};
use triplex_vector::{PersistentVectorIndex, Vector, VectorIndexConfig};

use crate::fusion::{FusionRanker, Signal};
use crate::planner::Planner;
use crate::types::{ConnectedSpec, Query, QueryMode, RankedResult, VectorSeed, MAX_LIMIT};

const DEFAULT_EF_SEARCH: usize = 64;
const OVERFETCH_FACTOR: usize = 3;

/// Reserved metadata key the facade's metadata file carries `entity_type`
/// under, so it survives a `get_entity` round trip without leaking into
/// `triplex-metadata`'s field index (which only ever sees user fields).
const ENTITY_TYPE_KEY: &str = "__entity_type";

/// Embedding models are injected as a capability rather than baked into
/// the engine, so callers can swap providers without touching query code
/// (spec §6: `like: { text }` resolves through this trait).
#[async_trait]
pub trait Embed: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Composes the four index crates plus storage into the single entry
/// point callers use (spec §6). Not `Clone`; share it behind an `Arc`.
pub struct Engine<A: StorageAdapter> {
    vectors: tokio::sync::RwLock<PersistentVectorIndex<A>>,
    facade: EntityStoreFacade<A>,
    metadata: MetadataIndex,
    graph: GraphIndex,
    embedder: Arc<dyn Embed>,
    planner: Planner,
}

impl<A: StorageAdapter> Engine<A> {
    /// Create a fresh engine backed by a new vector index and facade.
    pub async fn create(
        storage: Arc<A>,
        config: VectorIndexConfig,
        embedder: Arc<dyn Embed>,
    ) -> Result<Self> {
        let vectors = PersistentVectorIndex::create(storage.clone(), config).await?;
        let facade = EntityStoreFacade::open(storage).await?;
        Ok(Self {
            vectors: tokio::sync::RwLock::new(vectors),
            facade,
            metadata: MetadataIndex::new(),
            graph: GraphIndex::new(),
            embedder,
            planner: Planner::new(),
        })
    }

    /// Reopen an existing engine, rebuilding the metadata and graph
    /// indexes from storage (spec §3: "a rebuild from the storage
    /// adapter must reproduce any index").
    pub async fn open(storage: Arc<A>, embedder: Arc<dyn Embed>) -> Result<Self> {
        let vectors = PersistentVectorIndex::open(storage.clone()).await?;
        let facade = EntityStoreFacade::open(storage).await?;
        let metadata = MetadataIndex::new();
        let graph = GraphIndex::new();

        for id in facade.list_entity_ids().await? {
            if let Some(meta) = facade.get_entity_metadata(&id).await? {
                metadata.put(&id, &meta).await;
            }
        }
        for id in facade.list_relation_ids().await? {
            if let Some(relation) = facade.get_relation(&id).await? {
                graph.add(relation).await;
            }
        }

        Ok(Self {
            vectors: tokio::sync::RwLock::new(vectors),
            facade,
            metadata,
            graph,
            embedder,
            planner: Planner::new(),
        })
    }

    /// Insert or replace an entity. Vector persistence is owned entirely
    /// by `PersistentVectorIndex`; the facade only ever touches this
    /// entity's metadata file, so the two never race over
    /// `entities/nouns/vectors/{shard}/{id}` (see DESIGN.md).
    #[instrument(skip(self, vector, metadata))]
    pub async fn insert_entity(
        &self,
        id: Option<EntityId>,
        vector: Vec<f32>,
        metadata: Metadata,
        entity_type: Option<String>,
    ) -> Result<Entity> {
        let id = id.unwrap_or_else(new_id);
        let entity = Entity::new(id.clone(), vector.clone(), now_ms())
            .with_metadata(metadata.clone());
        let entity = match entity_type {
            Some(t) => entity.with_type(t.clone()),
            None => entity,
        };

        self.vectors
            .write()
            .await
            .insert_with_metadata(id.clone(), Vector::new(vector), entity.entity_type.clone())
            .await?;

        let mut stored_metadata = metadata.clone();
        if let Some(t) = &entity.entity_type {
            stored_metadata.insert(ENTITY_TYPE_KEY.to_string(), Scalar::String(t.clone()));
        }
        self.facade
            .put_entity_metadata(&id, entity.entity_type.as_deref(), &stored_metadata)
            .await?;
        self.metadata.put(&id, &metadata).await;

        Ok(entity)
    }

    /// Reassembles an entity from the vector index (vector) and the
    /// facade (metadata) — never from `facade.get_entity`, which reads a
    /// different, incompatible on-disk schema (see DESIGN.md).
    pub async fn get_entity(&self, id: &str) -> Result<Option<Entity>> {
        let vectors = self.vectors.read().await;
        let Some(vector) = vectors.get(id) else {
            return Ok(None);
        };
        let mut metadata = self.facade.get_entity_metadata(id).await?.unwrap_or_default();
        let entity_type = match metadata.remove(ENTITY_TYPE_KEY) {
            Some(Scalar::String(t)) => Some(t),
            _ => None,
        };
        let mut entity = Entity::new(id.to_string(), vector.as_ref().to_vec(), now_ms())
            .with_metadata(metadata);
        entity.entity_type = entity_type;
        Ok(Some(entity))
    }

    pub async fn update_entity(
        &self,
        id: EntityId,
        vector: Vec<f32>,
        metadata: Metadata,
        entity_type: Option<String>,
    ) -> Result<Entity> {
        self.insert_entity(Some(id), vector, metadata, entity_type).await
    }

    /// Delete an entity and, by default, cascade-delete every
    /// relationship incident to it (`orphan: true` keeps dangling edges,
    /// spec §6 "delete" open question resolved in DESIGN.md).
    #[instrument(skip(self))]
    pub async fn delete_entity(&self, id: &str, orphan: bool) -> Result<()> {
        if self.vectors.read().await.get(id).is_none() {
            return Ok(());
        }

        if !orphan {
            for relation_id in self.relations_touching(id).await? {
                self.delete_relation(&relation_id).await?;
            }
        }

        self.vectors.write().await.delete(id).await?;
        let metadata = self.facade.get_entity_metadata(id).await?.unwrap_or_default();
        self.facade.delete_entity_metadata(id, None).await?;
        self.metadata.delete(&id.to_string(), &metadata).await;
        Ok(())
    }

    /// Linear scan over the graph's known relation ids to find every
    /// relationship touching `id`. `GraphIndex` doesn't expose a direct
    /// "relations incident to a node" accessor, only endpoint-resolved
    /// neighbor lookups, so cascade-delete falls back to this.
    async fn relations_touching(&self, id: &str) -> Result<Vec<RelationId>> {
        let mut out = Vec::new();
        for relation_id in self.facade.list_relation_ids().await? {
            if let Some(edge) = self.graph.edge(&relation_id).await {
                if edge.source == id || edge.target == id {
                    out.push(relation_id);
                }
            }
        }
        Ok(out)
    }

    #[instrument(skip(self, metadata))]
    pub async fn insert_relation(
        &self,
        id: Option<RelationId>,
        source: EntityId,
        target: EntityId,
        relation_type: impl Into<String> + Send,
        weight: f32,
        metadata: Metadata,
    ) -> Result<Relationship> {
        let id = id.unwrap_or_else(new_id);
        let relation = Relationship::new(id, source, target, relation_type)
            .with_weight(weight)
            .with_metadata(metadata);
        self.facade.put_relation(&relation).await?;
        self.graph.add(relation.clone()).await;
        Ok(relation)
    }

    pub async fn get_relation(&self, id: &str) -> Result<Option<Relationship>> {
        self.facade.get_relation(id).await
    }

    pub async fn delete_relation(&self, id: &str) -> Result<()> {
        self.facade.delete_relation(id).await?;
        self.graph.remove(id).await;
        Ok(())
    }

    /// Run a `find` query end to end: validate, plan, execute, fuse,
    /// boost, paginate (spec §4.5-§4.7).
    #[instrument(skip(self, query))]
    pub async fn find(&self, query: Query) -> Result<Vec<RankedResult>> {
        self.validate(&query)?;
        if query.limit == 0 {
            return Ok(Vec::new());
        }

        let started = std::time::Instant::now();
        let population = self.population().await;

        let field_selectivity = match &query.where_ {
            Some(filter) => Some(self.metadata.estimate_selectivity(filter, population).await),
            None => None,
        };
        let plan = self
            .planner
            .plan(&query, population, field_selectivity, DEFAULT_EF_SEARCH);

        let field_ids: Option<HashSet<EntityId>> = match &query.where_ {
            Some(filter) => Some(self.metadata.query(filter).await?),
            None => None,
        };
        if let Some(ids) = &field_ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
        }

        let overfetch = query.limit.saturating_add(query.offset).saturating_mul(OVERFETCH_FACTOR).max(query.limit);

        let mut vector_scores: HashMap<EntityId, f32> = HashMap::new();
        let mut graph_scores: HashMap<EntityId, f32> = HashMap::new();
        let mut rankings: HashMap<Signal, Vec<EntityId>> = HashMap::new();

        if let Some(seed) = &query.like {
            let query_vector = self.resolve_seed(seed).await?;
            let results = match &field_ids {
                Some(ids) if plan.start == crate::planner::StepKind::Field => {
                    let candidates: Vec<EntityId> = ids.iter().cloned().collect();
                    self.vectors
                        .read()
                        .await
                        .search_within(&Vector::new(query_vector), overfetch, &candidates)
                        .await?
                }
                _ => self
                    .vectors
                    .read()
                    .await
                    .search(&Vector::new(query_vector), overfetch)
                    .await?,
            };
            let mut ordered = Vec::with_capacity(results.len());
            for r in results {
                if field_ids.as_ref().is_some_and(|ids| !ids.contains(&r.id)) {
                    continue;
                }
                vector_scores.insert(r.id.clone(), r.score);
                ordered.push(r.id);
            }
            rankings.insert(Signal::Vector, ordered);
        }

        if let Some(connected) = &query.connected {
            let reached = self.traverse(connected).await;
            let mut ordered: Vec<(EntityId, f32)> = reached
                .into_iter()
                .filter(|(id, _)| field_ids.as_ref().is_none_or(|ids| ids.contains(id)))
                .collect();
            ordered.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then_with(|| a.0.cmp(&b.0)));
            ordered.truncate(overfetch);
            for (id, score) in &ordered {
                graph_scores.insert(id.clone(), *score);
            }
            rankings.insert(Signal::Graph, ordered.into_iter().map(|(id, _)| id).collect());
        }

        if let Some(ids) = &field_ids {
            let mut ordered: Vec<EntityId> = ids.iter().cloned().collect();
            ordered.sort();
            rankings.insert(Signal::Field, ordered);
        }

        let fused: Vec<(EntityId, f64)> = if plan.skip_fusion {
            rankings
                .values()
                .next()
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .map(|id| {
                    let score = vector_scores
                        .get(&id)
                        .or_else(|| graph_scores.get(&id))
                        .copied()
                        .unwrap_or(1.0) as f64;
                    (id, score)
                })
                .collect()
        } else {
            FusionRanker::fuse(&rankings)
        };

        // Boosts are applied to the *whole* fused set, which can reorder
        // results (spec §4.6: offset/limit apply after fusion and boosts),
        // so metadata is fetched and scores are finalized before slicing
        // the page, not after.
        let mut scored = Vec::with_capacity(fused.len());
        for (id, fusion_score) in fused {
            let mut metadata = self.facade.get_entity_metadata(&id).await?.unwrap_or_default();
            metadata.remove(ENTITY_TYPE_KEY);

            let mut final_score = fusion_score;
            let mut boosts_applied = Vec::new();
            if let Some(boost) = &query.boost {
                let (boosted, label) =
                    FusionRanker::apply_boost(boost, final_score, &metadata, now_ms());
                final_score = boosted;
                boosts_applied.push(label);
            }

            scored.push((id, fusion_score, final_score, metadata, boosts_applied));
        }

        scored.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap().then_with(|| a.0.cmp(&b.0)));

        if let Some(threshold) = query.threshold {
            scored.retain(|(_, _, final_score, _, _)| *final_score >= threshold as f64);
        }

        let page = scored
            .into_iter()
            .skip(query.offset)
            .take(query.limit);

        let mut out = Vec::new();
        for (id, fusion_score, final_score, metadata, boosts_applied) in page {
            let mut result = RankedResult::new(id.clone());
            result.vector_score = vector_scores.get(&id).copied();
            result.graph_score = graph_scores.get(&id).copied();
            result.fusion_score = if plan.skip_fusion { None } else { Some(fusion_score as f32) };
            result.score = final_score as f32;
            result.entity = self.get_entity(&id).await?;
            result.metadata = metadata;
            if query.explain {
                result.explanation = Some(crate::types::Explanation {
                    plan_summary: plan.summary(),
                    step_costs: plan
                        .steps
                        .iter()
                        .map(|s| (format!("{:?}:{:?}", s.kind, s.op), s.estimated_cost))
                        .collect(),
                    elapsed: started.elapsed(),
                    boosts_applied,
                });
            }
            out.push(result);
        }

        if !matches!(query.mode, QueryMode::Auto) {
            tracing::debug!(mode = ?query.mode, "find: explicit mode hint noted (planner remains authoritative)");
        }

        Ok(out)
    }

    /// Convenience wrapper for a pure vector search (spec §6 `search`).
    pub async fn search(&self, seed: VectorSeed, limit: usize) -> Result<Vec<RankedResult>> {
        self.find(Query {
            like: Some(seed),
            limit,
            ..Default::default()
        })
        .await
    }

    fn validate(&self, query: &Query) -> Result<()> {
        if !query.has_signal() {
            return Err(Error::InvalidArgument(
                "query must set at least one of like/where/connected".to_string(),
            ));
        }
        if query.limit > MAX_LIMIT {
            return Err(Error::InvalidArgument(format!(
                "limit {} exceeds maximum of {}",
                query.limit, MAX_LIMIT
            )));
        }
        Ok(())
    }

    async fn population(&self) -> usize {
        self.vectors.read().await.len()
    }

    async fn resolve_seed(&self, seed: &VectorSeed) -> Result<Vec<f32>> {
        match seed {
            VectorSeed::Vector(v) => Ok(v.clone()),
            VectorSeed::Text(text) => self.embedder.embed(text).await,
            VectorSeed::Id(id) => self
                .vectors
                .read()
                .await
                .get(id)
                .map(|v| v.as_ref().to_vec())
                .ok_or_else(|| Error::NotFound(id.clone())),
        }
    }

    async fn traverse(&self, connected: &ConnectedSpec) -> Vec<(EntityId, f32)> {
        let seeds = connected.seeds();
        if seeds.is_empty() {
            return Vec::new();
        }

        let mut best_depth: HashMap<EntityId, usize> = HashMap::new();
        let type_filters: Vec<Option<&str>> = if connected.edge_types.is_empty() {
            vec![None]
        } else {
            connected.edge_types.iter().map(|t| Some(t.as_str())).collect()
        };

        for type_filter in type_filters {
            let reached = self
                .graph
                .bfs(&seeds, connected.max_depth, connected.direction, type_filter)
                .await;
            for (id, depth) in reached {
                best_depth
                    .entry(id)
                    .and_modify(|d| *d = (*d).min(depth))
                    .or_insert(depth);
            }
        }

        best_depth
            .into_iter()
            .map(|(id, depth)| (id, triplex_graph::decay_score(1.0, depth)))
            .collect()
    }
}
