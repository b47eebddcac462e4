//! Graph Adjacency Index (spec §4.3, C3).
//!
//! Forward and reverse adjacency maps keyed by `(id, edge-type)`, with
//! O(1) amortized `add`/`remove` and BFS traversal with distance-decayed
//! scoring. No teacher precedent exists for this component; its locking
//! shape is grounded in `triplex_storage::cache::CacheManager`'s
//! `Arc<RwLock<HashMap<..>>>` pattern, generalized to a per-node lock
//! nested inside a coarser map-level lock (spec §5: "per-node adjacency
//! locks").

mod index;

pub use index::{decay_score, GraphIndex, DECAY_BASE};

pub use triplex_core::entity::{Direction, Relationship};
pub use triplex_core::ids::{EntityId, RelationId};
pub use triplex_core::{Error, Result};
