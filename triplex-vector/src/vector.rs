//! Vector type and index implementation

use crate::{DistanceMetric, EntityId, HnswConfig, HnswIndex, Result, SearchResult, VectorError};
use serde::{Deserialize, Serialize};

/// A vector with a fixed dimension
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vector {
    /// The vector data
    pub data: Vec<f32>,
}

impl Vector {
    /// Create a new vector
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    /// Get the dimension of this vector
    pub fn dim(&self) -> usize {
        self.data.len()
    }

    /// Normalize this vector to unit length
    pub fn normalize(&mut self) {
        crate::distance::normalize(&mut self.data);
    }

    /// Get a normalized copy of this vector
    pub fn normalized(&self) -> Self {
        let mut copy = self.clone();
        copy.normalize();
        copy
    }

    /// Calculate magnitude (L2 norm)
    pub fn magnitude(&self) -> f32 {
        crate::distance::magnitude(&self.data)
    }
}

impl From<Vec<f32>> for Vector {
    fn from(data: Vec<f32>) -> Self {
        Self::new(data)
    }
}

impl AsRef<[f32]> for Vector {
    fn as_ref(&self) -> &[f32] {
        &self.data
    }
}

/// Configuration for vector index
#[derive(Debug, Clone)]
pub struct VectorIndexConfig {
    /// Dimension of vectors
    pub dimension: usize,
    /// Distance metric to use
    pub metric: DistanceMetric,
    /// HNSW configuration
    pub hnsw_config: HnswConfig,
}

impl VectorIndexConfig {
    /// Create a new configuration with default HNSW parameters
    pub fn new(dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            dimension,
            metric,
            hnsw_config: HnswConfig::default(),
        }
    }

    /// Set HNSW configuration
    pub fn with_hnsw_config(mut self, config: HnswConfig) -> Self {
        self.hnsw_config = config;
        self
    }
}

/// Vector index with HNSW for fast similarity search
pub struct VectorIndex {
    /// Configuration
    config: VectorIndexConfig,
    /// HNSW index
    hnsw: HnswIndex,
    /// Storage for vector data
    vectors: std::collections::HashMap<EntityId, Vector>,
    /// Optional metadata for vectors
    metadata: std::collections::HashMap<EntityId, String>,
}

impl VectorIndex {
    /// Create a new vector index
    pub fn new(dimension: usize, metric: DistanceMetric) -> Result<Self> {
        let config = VectorIndexConfig::new(dimension, metric);
        Self::with_config(config)
    }

    /// Create a vector index with custom configuration
    pub fn with_config(config: VectorIndexConfig) -> Result<Self> {
        let hnsw = HnswIndex::new(config.hnsw_config.clone(), config.metric);
        Ok(Self {
            config,
            hnsw,
            vectors: std::collections::HashMap::new(),
            metadata: std::collections::HashMap::new(),
        })
    }

    /// Get the dimension of vectors in this index
    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    /// Get the distance metric used by this index
    pub fn metric(&self) -> DistanceMetric {
        self.config.metric
    }

    /// Get the number of vectors in the index
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Insert a vector into the index
    pub async fn insert(&mut self, id: EntityId, vector: Vector) -> Result<()> {
        self.insert_with_metadata(id, vector, None).await
    }

    /// Insert a vector with metadata into the index
    pub async fn insert_with_metadata(
        &mut self,
        id: EntityId,
        vector: Vector,
        metadata: Option<String>,
    ) -> Result<()> {
        if vector.dim() != self.config.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.config.dimension,
                actual: vector.dim(),
            });
        }

        self.hnsw.insert(id.clone(), &vector.data)?;
        self.vectors.insert(id.clone(), vector);

        if let Some(meta) = metadata {
            self.metadata.insert(id, meta);
        }

        Ok(())
    }

    /// Search for k nearest neighbors
    pub async fn search(&self, query: &Vector, k: usize) -> Result<Vec<SearchResult>> {
        if query.dim() != self.config.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.config.dimension,
                actual: query.dim(),
            });
        }

        let results = self.hnsw.search(&query.data, k)?;

        let results_with_metadata = results
            .into_iter()
            .map(|mut r| {
                if let Some(meta) = self.metadata.get(&r.id) {
                    r.metadata = Some(meta.clone());
                }
                r
            })
            .collect();

        Ok(results_with_metadata)
    }

    /// Search for k nearest neighbors among a pre-filtered candidate set
    /// (spec §4.1 `search_within`).
    pub async fn search_within(
        &self,
        query: &Vector,
        k: usize,
        candidate_ids: &[EntityId],
    ) -> Result<Vec<SearchResult>> {
        if query.dim() != self.config.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.config.dimension,
                actual: query.dim(),
            });
        }

        let results = self.hnsw.search_within(&query.data, k, candidate_ids)?;
        Ok(results
            .into_iter()
            .map(|mut r| {
                if let Some(meta) = self.metadata.get(&r.id) {
                    r.metadata = Some(meta.clone());
                }
                r
            })
            .collect())
    }

    /// Get a vector by id
    pub fn get(&self, id: &str) -> Option<&Vector> {
        self.vectors.get(id)
    }

    /// Get metadata for a vector
    pub fn get_metadata(&self, id: &str) -> Option<&str> {
        self.metadata.get(id).map(|s| s.as_str())
    }

    /// Delete a vector from the index. A no-op if `id` is unknown.
    pub async fn delete(&mut self, id: &str) -> Result<()> {
        if !self.vectors.contains_key(id) {
            return Ok(());
        }

        self.hnsw.delete(id.to_string())?;
        self.vectors.remove(id);
        self.metadata.remove(id);

        Ok(())
    }

    /// Get all vector ids in the index
    pub fn ids(&self) -> Vec<EntityId> {
        self.vectors.keys().cloned().collect()
    }

    /// HNSW graph topology for a live node, for persistence. See
    /// `storage::PersistentVectorIndex`.
    pub(crate) fn export_node(&self, id: &str) -> Option<(usize, Vec<Vec<EntityId>>)> {
        self.hnsw.export_node(&id.to_string())
    }

    /// Wire a node directly from a persisted record, bypassing the normal
    /// randomized-level insert path. Used only while rebuilding from
    /// storage; call `finalize_load` once every node is loaded.
    pub(crate) fn load_node(
        &mut self,
        id: EntityId,
        vector: Vector,
        metadata: Option<String>,
        level: usize,
        neighbors: Vec<Vec<EntityId>>,
    ) {
        self.hnsw
            .load_node(id.clone(), vector.data.clone(), level, neighbors);
        self.vectors.insert(id.clone(), vector);
        if let Some(meta) = metadata {
            self.metadata.insert(id, meta);
        }
    }

    pub(crate) fn finalize_load(&mut self) {
        self.hnsw.finalize_load();
    }
}
