//! Entity (noun) and Relationship (verb) records (spec §3).

use crate::ids::{EntityId, RelationId};
use crate::scalar::Metadata;
use serde::{Deserialize, Serialize};

/// Monotonic timestamp, epoch milliseconds. Kept as a plain alias rather
/// than a newtype so it composes directly with `Scalar::Timestamp`.
pub type Timestamp = i64;

/// A noun: a unit of content with an embedding and metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub vector: Vec<f32>,
    pub metadata: Metadata,
    pub entity_type: Option<String>,
    pub created_at: Timestamp,
}

impl Entity {
    pub fn new(id: EntityId, vector: Vec<f32>, created_at: Timestamp) -> Self {
        Self {
            id,
            vector,
            metadata: Metadata::new(),
            entity_type: None,
            created_at,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    pub fn dim(&self) -> usize {
        self.vector.len()
    }
}

/// Traversal direction for graph queries and adjacency lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    In,
    Out,
    Both,
}

/// A verb: a typed directed edge between two entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub id: RelationId,
    pub source: EntityId,
    pub target: EntityId,
    pub relation_type: String,
    pub vector: Option<Vec<f32>>,
    pub metadata: Metadata,
    pub weight: f32,
}

impl Relationship {
    pub fn new(
        id: RelationId,
        source: EntityId,
        target: EntityId,
        relation_type: impl Into<String>,
    ) -> Self {
        Self {
            id,
            source,
            target,
            relation_type: relation_type.into(),
            vector: None,
            metadata: Metadata::new(),
            weight: 1.0,
        }
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight.clamp(0.0, 1.0);
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}
