//! HNSW (Hierarchical Navigable Small World) index implementation
//!
//! HNSW is a graph-based algorithm for approximate nearest neighbor search.
//! It builds a multi-layer graph where:
//! - Layer 0 contains all vectors
//! - Higher layers contain progressively fewer vectors
//! - Each vector connects to M neighbors at each layer
//!
//! Search starts at the top layer and greedily navigates to the nearest neighbors,
//! descending through layers until reaching layer 0.

use crate::distance::distance_to_score;
use crate::{DistanceMetric, Result, SearchResult, VectorError};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet};
use triplex_core::ids::EntityId;

/// Fraction of the corpus below which `search_within` scores candidates
/// by brute force instead of widening the HNSW search.
pub const BRUTE_FORCE_THRESHOLD: f64 = 0.05;

/// Configuration for HNSW index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Maximum number of bi-directional links per element per layer (M)
    /// Typical values: 5-48
    /// Higher M = better recall, more memory, slower insertions
    pub max_connections: usize,

    /// Maximum number of connections for layer 0 (typically M * 2)
    pub max_connections_layer0: usize,

    /// Size of the dynamic candidate list during construction (ef_construction)
    /// Typical values: 100-500
    /// Higher ef_construction = better quality index, slower construction
    pub ef_construction: usize,

    /// Size of the dynamic candidate list during search (ef_search)
    /// Typical values: 100-500
    /// Higher ef_search = better recall, slower search
    pub ef_search: usize,

    /// Normalization factor for level selection (ml)
    /// Typically 1.0 / ln(M)
    pub level_multiplier: f64,
}

impl Default for HnswConfig {
    fn default() -> Self {
        let m = 16;
        Self {
            max_connections: m,
            max_connections_layer0: m * 2,
            ef_construction: 200,
            ef_search: 50,
            level_multiplier: 1.0 / (m as f64).ln(),
        }
    }
}

impl HnswConfig {
    /// Create a fast configuration (less accuracy, faster search)
    pub fn fast() -> Self {
        let m = 8;
        Self {
            max_connections: m,
            max_connections_layer0: m * 2,
            ef_construction: 100,
            ef_search: 50,
            level_multiplier: 1.0 / (m as f64).ln(),
        }
    }

    /// Create a balanced configuration (default)
    pub fn balanced() -> Self {
        Self::default()
    }

    /// Create a high-quality configuration (better accuracy, slower search)
    pub fn high_quality() -> Self {
        let m = 32;
        Self {
            max_connections: m,
            max_connections_layer0: m * 2,
            ef_construction: 400,
            ef_search: 200,
            level_multiplier: 1.0 / (m as f64).ln(),
        }
    }
}

/// Lifecycle of a node in the graph. Search ignores any node that isn't
/// `Live`, so a concurrent reader never sees a half-wired insert or a
/// half-unwired delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Inserting,
    Live,
    Deleting,
    Gone,
}

/// A node in the HNSW graph
#[derive(Debug, Clone, Serialize, Deserialize)]
struct HnswNode {
    /// Entity id.
    id: EntityId,
    /// Layer at which this node was inserted
    level: usize,
    /// Connections at each layer (layer -> set of neighbor ids, kept
    /// ordered for deterministic tie-breaking downstream).
    connections: Vec<BTreeSet<EntityId>>,
    #[serde(skip, default = "default_state")]
    state: NodeState,
}

fn default_state() -> NodeState {
    NodeState::Live
}

impl HnswNode {
    fn new(id: EntityId, level: usize) -> Self {
        let connections = (0..=level).map(|_| BTreeSet::new()).collect();
        Self {
            id,
            level,
            connections,
            state: NodeState::Inserting,
        }
    }
}

/// HNSW index for fast approximate nearest neighbor search
pub struct HnswIndex {
    /// Configuration
    config: HnswConfig,
    /// Distance metric
    metric: DistanceMetric,
    /// All nodes in the graph
    nodes: HashMap<EntityId, HnswNode>,
    /// Cached vector data for distance calculations
    vectors: HashMap<EntityId, Vec<f32>>,
    /// Entry point (node at highest layer)
    entry_point: Option<EntityId>,
    /// Maximum layer in the graph
    max_layer: usize,
}

impl HnswIndex {
    /// Create a new HNSW index
    pub fn new(config: HnswConfig, metric: DistanceMetric) -> Self {
        Self {
            config,
            metric,
            nodes: HashMap::new(),
            vectors: HashMap::new(),
            entry_point: None,
            max_layer: 0,
        }
    }

    pub fn config(&self) -> &HnswConfig {
        &self.config
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn ids(&self) -> Vec<EntityId> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.state == NodeState::Live)
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn validate_vector(vector: &[f32]) -> Result<()> {
        if vector.iter().any(|x| x.is_nan() || x.is_infinite()) {
            return Err(VectorError::InvalidVector(
                "vector contains NaN or infinite components".to_string(),
            ));
        }
        if vector.iter().all(|&x| x == 0.0) {
            return Err(VectorError::InvalidVector(
                "vector is all-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Insert a vector into the index. Re-insert of an existing id
    /// replaces it (delete-then-insert), matching spec's "insert is
    /// idempotent on id" failure semantics.
    pub fn insert(&mut self, id: EntityId, vector: &[f32]) -> Result<()> {
        Self::validate_vector(vector)?;

        if self.nodes.contains_key(&id) {
            self.delete(id.clone())?;
        }

        self.vectors.insert(id.clone(), vector.to_vec());

        let level = self.select_layer();
        let mut node = HnswNode::new(id.clone(), level);

        if self.entry_point.is_none() {
            node.state = NodeState::Live;
            self.entry_point = Some(id.clone());
            self.max_layer = level;
            self.nodes.insert(id, node);
            return Ok(());
        }

        let entry_id = self
            .entry_point
            .clone()
            .ok_or_else(|| VectorError::IndexError("entry point not initialized".to_string()))?;
        let mut current_nearest = vec![entry_id];

        for layer in (level + 1..=self.max_layer).rev() {
            current_nearest = self.search_layer(vector, &current_nearest, 1, layer)?;
        }

        for layer in (0..=level).rev() {
            let candidates =
                self.search_layer(vector, &current_nearest, self.config.ef_construction, layer)?;

            let m = if layer == 0 {
                self.config.max_connections_layer0
            } else {
                self.config.max_connections
            };

            let neighbors = self.select_neighbors_robust_prune(&candidates, m, vector)?;

            for neighbor_id in &neighbors {
                node.connections[layer].insert(neighbor_id.clone());
            }

            for neighbor_id in &neighbors {
                if let Some(neighbor) = self.nodes.get_mut(neighbor_id)
                    && layer < neighbor.connections.len()
                {
                    neighbor.connections[layer].insert(id.clone());

                    if neighbor.connections[layer].len() > m {
                        let connections: Vec<EntityId> =
                            neighbor.connections[layer].iter().cloned().collect();
                        let neighbor_vec = match self.vectors.get(neighbor_id) {
                            Some(v) => v.clone(),
                            None => continue,
                        };

                        let to_keep =
                            self.select_neighbors_robust_prune(&connections, m, &neighbor_vec)?;

                        if let Some(neighbor) = self.nodes.get_mut(neighbor_id) {
                            neighbor.connections[layer] = to_keep.into_iter().collect();
                        }
                    }
                }
            }

            current_nearest = candidates;
        }

        if level > self.max_layer {
            self.max_layer = level;
            self.entry_point = Some(id.clone());
        }

        node.state = NodeState::Live;
        self.nodes.insert(id, node);
        Ok(())
    }

    /// Search for k nearest neighbors using `ef_search` (overridable).
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        self.search_with_ef(query, k, self.config.ef_search)
    }

    pub fn search_with_ef(&self, query: &[f32], k: usize, ef: usize) -> Result<Vec<SearchResult>> {
        Self::validate_vector(query)?;

        if self.entry_point.is_none() {
            return Ok(Vec::new());
        }

        let entry_id = self
            .entry_point
            .clone()
            .ok_or_else(|| VectorError::IndexError("entry point not initialized".to_string()))?;
        let mut current_nearest = vec![entry_id];

        for layer in (1..=self.max_layer).rev() {
            current_nearest = self.search_layer(query, &current_nearest, 1, layer)?;
        }

        let ef = ef.max(k);
        current_nearest = self.search_layer(query, &current_nearest, ef, 0)?;

        let mut results: Vec<SearchResult> = current_nearest
            .iter()
            .take(ef)
            .filter_map(|id| {
                self.vectors.get(id).map(|vector| {
                    let raw = self.metric.calculate(query, vector);
                    let distance = self.metric.to_distance(raw);
                    SearchResult::new(id.clone(), distance_to_score(distance))
                })
            })
            .collect();

        results.sort();
        results.truncate(k);
        Ok(results)
    }

    /// When `candidate_ids` is a small fraction of the corpus, score them
    /// by brute force; otherwise widen the HNSW search and post-filter
    /// (spec §4.1: the planner drives which path is used via `threshold`).
    pub fn search_within(
        &self,
        query: &[f32],
        k: usize,
        candidate_ids: &[EntityId],
    ) -> Result<Vec<SearchResult>> {
        Self::validate_vector(query)?;

        if candidate_ids.is_empty() || self.vectors.is_empty() {
            return Ok(Vec::new());
        }

        let fraction = candidate_ids.len() as f64 / self.vectors.len() as f64;

        if fraction <= BRUTE_FORCE_THRESHOLD {
            let candidates: HashSet<&EntityId> = candidate_ids.iter().collect();
            let mut results: Vec<SearchResult> = candidate_ids
                .iter()
                .filter_map(|id| {
                    self.vectors.get(id).map(|vector| {
                        let raw = self.metric.calculate(query, vector);
                        let distance = self.metric.to_distance(raw);
                        SearchResult::new(id.clone(), distance_to_score(distance))
                    })
                })
                .collect();
            // candidates is only used to silence an unused warning in the
            // (rare) case that candidate_ids contains ids not in the index.
            let _ = candidates;
            results.sort();
            results.truncate(k);
            Ok(results)
        } else {
            let extended_ef = (self.config.ef_search * 4).max(k * 4);
            let wide = self.search_with_ef(query, extended_ef, extended_ef)?;
            let allowed: HashSet<&EntityId> = candidate_ids.iter().collect();
            let mut filtered: Vec<SearchResult> = wide
                .into_iter()
                .filter(|r| allowed.contains(&r.id))
                .collect();
            filtered.truncate(k);
            Ok(filtered)
        }
    }

    /// Delete a vector from the index. Deleting an unknown id is a no-op
    /// (spec §7).
    pub fn delete(&mut self, id: EntityId) -> Result<()> {
        let Some(mut node) = self.nodes.remove(&id) else {
            return Ok(());
        };
        node.state = NodeState::Deleting;

        for layer in 0..=node.level {
            for neighbor_id in &node.connections[layer] {
                if let Some(neighbor) = self.nodes.get_mut(neighbor_id) {
                    neighbor.connections[layer].remove(&id);
                }
            }
        }

        self.vectors.remove(&id);
        node.state = NodeState::Gone;

        if self.entry_point.as_ref() == Some(&id) {
            self.entry_point = self
                .nodes
                .values()
                .max_by_key(|n| n.level)
                .map(|n| n.id.clone());
            self.max_layer = self.nodes.values().map(|n| n.level).max().unwrap_or(0);
        }

        Ok(())
    }

    /// Search a single layer for nearest neighbors. Ties in distance are
    /// broken by id, lexicographically, for determinism.
    fn search_layer(
        &self,
        query: &[f32],
        entry_points: &[EntityId],
        num_to_return: usize,
        layer: usize,
    ) -> Result<Vec<EntityId>> {
        let mut visited = HashSet::new();
        let mut candidates: BinaryHeap<Reverse<(OrderedFloat<f32>, EntityId)>> = BinaryHeap::new();
        let mut nearest: BinaryHeap<(OrderedFloat<f32>, Reverse<EntityId>)> = BinaryHeap::new();

        for ep in entry_points {
            if visited.insert(ep.clone()) && self.is_live(ep) {
                let dist = self.distance(query, ep)?;
                candidates.push(Reverse((OrderedFloat(dist), ep.clone())));
                nearest.push((OrderedFloat(dist), Reverse(ep.clone())));
            }
        }

        while let Some(Reverse((OrderedFloat(current_dist), current_id))) = candidates.pop() {
            if let Some(&(OrderedFloat(farthest_dist), _)) = nearest.peek()
                && current_dist > farthest_dist
            {
                break;
            }

            if let Some(node) = self.nodes.get(&current_id)
                && layer < node.connections.len()
            {
                for neighbor_id in &node.connections[layer] {
                    if visited.insert(neighbor_id.clone()) && self.is_live(neighbor_id) {
                        let dist = self.distance(query, neighbor_id)?;

                        let worst = nearest.peek().map(|(d, _)| d.0).unwrap_or(f32::MAX);
                        if nearest.len() < num_to_return || dist < worst {
                            candidates.push(Reverse((OrderedFloat(dist), neighbor_id.clone())));
                            nearest.push((OrderedFloat(dist), Reverse(neighbor_id.clone())));

                            if nearest.len() > num_to_return {
                                nearest.pop();
                            }
                        }
                    }
                }
            }
        }

        let mut result: Vec<_> = nearest.into_iter().collect();
        result.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.0.cmp(&b.1.0)));
        Ok(result.into_iter().map(|(_, Reverse(id))| id).collect())
    }

    fn is_live(&self, id: &EntityId) -> bool {
        self.nodes
            .get(id)
            .map(|n| n.state == NodeState::Live || n.state == NodeState::Inserting)
            .unwrap_or(false)
    }

    /// Diversity-preserving "robust prune": keep a candidate only if no
    /// already-selected neighbor is strictly closer to it than to the
    /// query (spec §4.1). Candidates are walked nearest-first so greedy
    /// selection approximates the optimal diverse set.
    fn select_neighbors_robust_prune(
        &self,
        candidates: &[EntityId],
        m: usize,
        query: &[f32],
    ) -> Result<Vec<EntityId>> {
        if candidates.len() <= m {
            return Ok(candidates.to_vec());
        }

        let mut scored: Vec<(f32, EntityId)> = candidates
            .iter()
            .map(|id| Ok((self.distance(query, id)?, id.clone())))
            .collect::<Result<Vec<_>>>()?;
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap().then_with(|| a.1.cmp(&b.1)));

        let mut selected: Vec<(f32, EntityId)> = Vec::with_capacity(m);
        for (dist_to_query, candidate_id) in scored {
            if selected.len() >= m {
                break;
            }
            let mut keep = true;
            for (_, selected_id) in &selected {
                let dist_to_selected = self.distance_between(&candidate_id, selected_id)?;
                if dist_to_selected < dist_to_query {
                    keep = false;
                    break;
                }
            }
            if keep {
                selected.push((dist_to_query, candidate_id));
            }
        }

        // Degenerate case: every candidate failed the diversity test
        // before we filled m slots. Fall back to nearest-by-distance so we
        // never under-connect a node.
        if selected.len() < m.min(candidates.len()) {
            let mut fallback: Vec<(f32, EntityId)> = candidates
                .iter()
                .map(|id| Ok((self.distance(query, id)?, id.clone())))
                .collect::<Result<Vec<_>>>()?;
            fallback.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap().then_with(|| a.1.cmp(&b.1)));
            return Ok(fallback.into_iter().take(m).map(|(_, id)| id).collect());
        }

        Ok(selected.into_iter().map(|(_, id)| id).collect())
    }

    /// Distance (lower = closer) between the query and a stored vector.
    fn distance(&self, query: &[f32], id: &EntityId) -> Result<f32> {
        let vector = self
            .vectors
            .get(id)
            .ok_or_else(|| VectorError::NotFound(id.clone()))?;
        let raw = self.metric.calculate(query, vector);
        Ok(self.metric.to_distance(raw))
    }

    fn distance_between(&self, a: &EntityId, b: &EntityId) -> Result<f32> {
        let va = self
            .vectors
            .get(a)
            .ok_or_else(|| VectorError::NotFound(a.clone()))?;
        self.distance(va, b)
    }

    /// The level and per-layer neighbor ids of a live node, for bit-exact
    /// persistence (spec §6 binary layout). Returns `None` if `id` is not
    /// currently live.
    pub(crate) fn export_node(&self, id: &EntityId) -> Option<(usize, Vec<Vec<EntityId>>)> {
        let node = self.nodes.get(id)?;
        if node.state != NodeState::Live {
            return None;
        }
        let neighbors = node
            .connections
            .iter()
            .map(|layer| layer.iter().cloned().collect())
            .collect();
        Some((node.level, neighbors))
    }

    /// Wire a node directly from its persisted level/neighbor lists,
    /// bypassing the randomized level-selection and robust-prune build
    /// path used by `insert`. Used only when rebuilding the index from
    /// storage, where the graph topology is already decided. Callers must
    /// call `finalize_load` once every node has been loaded.
    pub(crate) fn load_node(
        &mut self,
        id: EntityId,
        vector: Vec<f32>,
        level: usize,
        neighbors: Vec<Vec<EntityId>>,
    ) {
        self.vectors.insert(id.clone(), vector);
        let mut node = HnswNode::new(id.clone(), level);
        for (layer, ids) in neighbors.into_iter().enumerate() {
            if layer < node.connections.len() {
                node.connections[layer] = ids.into_iter().collect();
            }
        }
        node.state = NodeState::Live;
        self.nodes.insert(id, node);
    }

    /// Recompute `entry_point`/`max_layer` after a batch of `load_node`
    /// calls.
    pub(crate) fn finalize_load(&mut self) {
        self.entry_point = self
            .nodes
            .values()
            .max_by_key(|n| n.level)
            .map(|n| n.id.clone());
        self.max_layer = self.nodes.values().map(|n| n.level).max().unwrap_or(0);
    }

    /// Select a random layer for a new element
    fn select_layer(&self) -> usize {
        let uniform: f64 = rand::random();
        let level = (-uniform.ln() * self.config.level_multiplier).floor() as usize;
        level.min(16) // Cap at 16 layers
    }
}
