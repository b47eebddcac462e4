//! Vector type and ID definitions

use serde::{Deserialize, Serialize};
use triplex_core::ids::EntityId;

/// Result of a vector similarity search. `score` is monotone: higher
/// always means more similar, regardless of the underlying distance
/// metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The id of the found vector.
    pub id: EntityId,
    /// `1 / (1 + distance)`, in `(0, 1]`.
    pub score: f32,
    /// Optional metadata associated with the vector.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

impl SearchResult {
    pub fn new(id: EntityId, score: f32) -> Self {
        Self {
            id,
            score,
            metadata: None,
        }
    }

    pub fn with_metadata(id: EntityId, score: f32, metadata: String) -> Self {
        Self {
            id,
            score,
            metadata: Some(metadata),
        }
    }
}

impl PartialEq for SearchResult {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && (self.score - other.score).abs() < f32::EPSILON
    }
}

impl Eq for SearchResult {}

impl PartialOrd for SearchResult {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SearchResult {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Higher score first; break ties on id for determinism.
        other
            .score
            .partial_cmp(&self.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| self.id.cmp(&other.id))
    }
}
