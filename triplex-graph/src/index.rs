//! Forward/reverse adjacency maps plus BFS traversal.

use std::collections::{HashMap, HashSet, VecDeque};
use tokio::sync::RwLock;
use triplex_core::entity::{Direction, Relationship};
use triplex_core::ids::{EntityId, RelationId};

/// Per-hop score decay used by `bfs` and by the executor's graph-step
/// re-scoring (spec §4.3: `score(id at depth d) = start_score · 0.8^d`).
pub const DECAY_BASE: f32 = 0.8;

pub fn decay_score(start_score: f32, depth: usize) -> f32 {
    start_score * DECAY_BASE.powi(depth as i32)
}

type EdgeTypeMap = HashMap<String, HashSet<RelationId>>;

/// Forward and reverse adjacency, keyed by `(id, edge-type)`. A coarse
/// lock guards each direction's node map (new nodes are rare once a graph
/// settles); each node's own lock is held only for the edge mutation or
/// lookup in progress, mirroring `triplex-metadata`'s per-field locking.
#[derive(Default)]
pub struct GraphIndex {
    forward: RwLock<HashMap<EntityId, RwLock<EdgeTypeMap>>>,
    reverse: RwLock<HashMap<EntityId, RwLock<EdgeTypeMap>>>,
    /// Full edge records, keyed by relationship id, so `remove` and
    /// `neighbors` can resolve a relationship id back to its endpoints
    /// without the caller re-supplying them.
    edges: RwLock<HashMap<RelationId, Relationship>>,
}

impl GraphIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `r` to the forward and reverse adjacency maps. Re-adding an id
    /// already present replaces the previous edge (same rebuild-in-place
    /// policy as `triplex-vector`'s HNSW insert and `triplex-metadata`'s
    /// field put).
    pub async fn add(&self, r: Relationship) {
        tracing::debug!(id = %r.id, source = %r.source, target = %r.target, "graph: add edge");
        if let Some(old) = self.edges.write().await.remove(&r.id) {
            self.unlink(&old).await;
        }
        self.link(&r).await;
        self.edges.write().await.insert(r.id.clone(), r);
    }

    /// Removes the edge with relationship id `relation_id`. No-op if
    /// unknown, matching the vector and metadata indexes' delete policy.
    pub async fn remove(&self, relation_id: &str) {
        let removed = self.edges.write().await.remove(relation_id);
        if let Some(old) = removed {
            tracing::debug!(id = %relation_id, "graph: remove edge");
            self.unlink(&old).await;
        }
    }

    async fn link(&self, r: &Relationship) {
        Self::ensure_node_exists(&self.forward, &r.source).await;
        {
            let nodes = self.forward.read().await;
            let node = nodes.get(&r.source).expect("just ensured");
            node.write()
                .await
                .entry(r.relation_type.clone())
                .or_default()
                .insert(r.id.clone());
        }

        Self::ensure_node_exists(&self.reverse, &r.target).await;
        {
            let nodes = self.reverse.read().await;
            let node = nodes.get(&r.target).expect("just ensured");
            node.write()
                .await
                .entry(r.relation_type.clone())
                .or_default()
                .insert(r.id.clone());
        }
    }

    async fn unlink(&self, r: &Relationship) {
        Self::remove_from_node(&self.forward, &r.source, &r.relation_type, &r.id).await;
        Self::remove_from_node(&self.reverse, &r.target, &r.relation_type, &r.id).await;
    }

    /// Creates an empty node entry if it doesn't exist yet, taking the
    /// cheap read-lock fast path once the node is already known (mirrors
    /// `triplex-metadata`'s `ensure_field`).
    async fn ensure_node_exists(map: &RwLock<HashMap<EntityId, RwLock<EdgeTypeMap>>>, id: &str) {
        {
            let nodes = map.read().await;
            if nodes.contains_key(id) {
                return;
            }
        }
        let mut nodes = map.write().await;
        nodes
            .entry(id.to_string())
            .or_insert_with(|| RwLock::new(HashMap::new()));
    }

    async fn remove_from_node(
        map: &RwLock<HashMap<EntityId, RwLock<EdgeTypeMap>>>,
        id: &str,
        relation_type: &str,
        relation_id: &str,
    ) {
        let nodes = map.read().await;
        if let Some(node) = nodes.get(id) {
            let mut edge_types = node.write().await;
            if let Some(bucket) = edge_types.get_mut(relation_type) {
                bucket.remove(relation_id);
                if bucket.is_empty() {
                    edge_types.remove(relation_type);
                }
            }
        }
    }

    /// Ids reachable from `id` in one hop, optionally filtered by edge
    /// type, per `direction`. Duplicates are possible (multiple edges to
    /// the same neighbor) and are not collapsed, matching the spec's
    /// "concatenate forward/reverse lists" wording.
    pub async fn neighbors(
        &self,
        id: &str,
        edge_type: Option<&str>,
        direction: Direction,
    ) -> Vec<EntityId> {
        let mut out = Vec::new();
        if matches!(direction, Direction::Out | Direction::Both) {
            out.extend(self.resolve(&self.forward, id, edge_type, |r| r.target.clone()).await);
        }
        if matches!(direction, Direction::In | Direction::Both) {
            out.extend(self.resolve(&self.reverse, id, edge_type, |r| r.source.clone()).await);
        }
        out
    }

    async fn resolve(
        &self,
        map: &RwLock<HashMap<EntityId, RwLock<EdgeTypeMap>>>,
        id: &str,
        edge_type: Option<&str>,
        endpoint: impl Fn(&Relationship) -> EntityId,
    ) -> Vec<EntityId> {
        let relation_ids: Vec<RelationId> = {
            let nodes = map.read().await;
            match nodes.get(id) {
                Some(node) => {
                    let edge_types = node.read().await;
                    match edge_type {
                        Some(t) => edge_types.get(t).map(|s| s.iter().cloned().collect()).unwrap_or_default(),
                        None => edge_types.values().flatten().cloned().collect(),
                    }
                }
                None => Vec::new(),
            }
        };

        let edges = self.edges.read().await;
        relation_ids
            .iter()
            .filter_map(|rid| edges.get(rid).map(&endpoint))
            .collect()
    }

    /// Breadth-first traversal from `starts`, up to `max_depth` hops.
    /// Start ids themselves are emitted at depth 0. Visited ids are never
    /// re-emitted at a greater depth (first-reached wins).
    pub async fn bfs(
        &self,
        starts: &[EntityId],
        max_depth: usize,
        direction: Direction,
        type_filter: Option<&str>,
    ) -> Vec<(EntityId, usize)> {
        let mut visited: HashSet<EntityId> = starts.iter().cloned().collect();
        let mut queue: VecDeque<(EntityId, usize)> =
            starts.iter().cloned().map(|id| (id, 0)).collect();
        let mut out: Vec<(EntityId, usize)> = queue.iter().cloned().collect();

        while let Some((id, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for neighbor in self.neighbors(&id, type_filter, direction).await {
                if visited.insert(neighbor.clone()) {
                    let next_depth = depth + 1;
                    out.push((neighbor.clone(), next_depth));
                    queue.push_back((neighbor, next_depth));
                }
            }
        }

        out
    }

    pub async fn edge(&self, relation_id: &str) -> Option<Relationship> {
        self.edges.read().await.get(relation_id).cloned()
    }

    pub async fn edge_count(&self) -> usize {
        self.edges.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(id: &str, source: &str, target: &str, relation_type: &str) -> Relationship {
        Relationship::new(id.to_string(), source.to_string(), target.to_string(), relation_type)
    }

    #[tokio::test]
    async fn add_then_remove_leaves_no_adjacency_entry() {
        let index = GraphIndex::new();
        index.add(edge("r1", "a", "b", "cites")).await;
        assert_eq!(index.neighbors("a", None, Direction::Out).await, vec!["b".to_string()]);

        index.remove("r1").await;
        assert!(index.neighbors("a", None, Direction::Out).await.is_empty());
        assert!(index.neighbors("b", None, Direction::In).await.is_empty());
    }

    #[tokio::test]
    async fn remove_unknown_id_is_noop() {
        let index = GraphIndex::new();
        index.remove("ghost").await;
    }

    #[tokio::test]
    async fn neighbors_filters_by_edge_type() {
        let index = GraphIndex::new();
        index.add(edge("r1", "a", "b", "cites")).await;
        index.add(edge("r2", "a", "c", "follows")).await;

        let cites = index.neighbors("a", Some("cites"), Direction::Out).await;
        assert_eq!(cites, vec!["b".to_string()]);

        let both_types = index.neighbors("a", None, Direction::Out).await;
        assert_eq!(both_types.len(), 2);
    }

    #[tokio::test]
    async fn direction_both_merges_forward_and_reverse() {
        let index = GraphIndex::new();
        index.add(edge("r1", "a", "b", "cites")).await;
        index.add(edge("r2", "c", "a", "cites")).await;

        let mut got = index.neighbors("a", None, Direction::Both).await;
        got.sort();
        assert_eq!(got, vec!["b".to_string(), "c".to_string()]);
    }

    #[tokio::test]
    async fn bfs_emits_starts_at_depth_zero_and_stops_at_max_depth() {
        let index = GraphIndex::new();
        index.add(edge("r1", "a", "b", "cites")).await;
        index.add(edge("r2", "b", "c", "cites")).await;
        index.add(edge("r3", "c", "d", "cites")).await;

        let mut result = index
            .bfs(&["a".to_string()], 2, Direction::Out, None)
            .await;
        result.sort();

        assert_eq!(
            result,
            vec![("a".to_string(), 0), ("b".to_string(), 1), ("c".to_string(), 2)]
        );
    }

    #[tokio::test]
    async fn bfs_never_revisits_an_id_at_a_greater_depth() {
        let index = GraphIndex::new();
        index.add(edge("r1", "a", "b", "cites")).await;
        index.add(edge("r2", "a", "c", "cites")).await;
        index.add(edge("r3", "b", "d", "cites")).await;
        index.add(edge("r4", "c", "d", "cites")).await;

        let result = index.bfs(&["a".to_string()], 2, Direction::Out, None).await;
        let d_entries: Vec<_> = result.iter().filter(|(id, _)| id == "d").collect();
        assert_eq!(d_entries.len(), 1);
        assert_eq!(d_entries[0].1, 2);
    }

    #[test]
    fn decay_score_halves_roughly_every_three_hops() {
        let s0 = decay_score(1.0, 0);
        let s3 = decay_score(1.0, 3);
        assert_eq!(s0, 1.0);
        assert!((s3 - 0.512).abs() < 1e-6);
    }
}
