//! Query shape, ranked results, and the explanation attached when
//! `explain: true` (spec §6).

use std::time::Duration;
use triplex_core::entity::{Direction, Entity};
use triplex_core::filter::FilterExpr;
use triplex_core::ids::EntityId;
use triplex_core::scalar::Metadata;

/// The `like` signal: a similarity seed given as raw text (embedded via
/// the injected `Embed` capability), a precomputed vector, or another
/// entity's id (whose stored vector is reused as the seed).
#[derive(Debug, Clone)]
pub enum VectorSeed {
    Text(String),
    Vector(Vec<f32>),
    Id(EntityId),
}

/// The `connected` signal (spec §6).
#[derive(Debug, Clone)]
pub struct ConnectedSpec {
    pub from: Vec<EntityId>,
    pub to: Vec<EntityId>,
    pub edge_types: Vec<String>,
    pub direction: Direction,
    pub max_depth: usize,
}

impl Default for ConnectedSpec {
    fn default() -> Self {
        Self {
            from: Vec::new(),
            to: Vec::new(),
            edge_types: Vec::new(),
            direction: Direction::Both,
            max_depth: 2,
        }
    }
}

impl ConnectedSpec {
    /// Every seed id this traversal starts from, regardless of whether it
    /// was given as `from` or `to` (direction decides which edges apply).
    pub fn seeds(&self) -> Vec<EntityId> {
        let mut seeds = self.from.clone();
        seeds.extend(self.to.iter().cloned());
        seeds
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    Auto,
    Vector,
    Graph,
    Field,
    Fusion,
}

impl Default for QueryMode {
    fn default() -> Self {
        QueryMode::Auto
    }
}

#[derive(Debug, Clone)]
pub enum Boost {
    Recent,
    Popular,
    Verified,
    Custom(String),
}

pub const MAX_LIMIT: usize = 10_000;
pub const DEFAULT_LIMIT: usize = 10;

/// A `find` query (spec §6). At least one of `like`/`where_`/`connected`
/// must be set; the planner validates this before building a plan.
#[derive(Debug, Clone)]
pub struct Query {
    pub like: Option<VectorSeed>,
    pub where_: Option<FilterExpr>,
    pub connected: Option<ConnectedSpec>,
    pub mode: QueryMode,
    pub boost: Option<Boost>,
    pub limit: usize,
    pub offset: usize,
    pub threshold: Option<f32>,
    pub explain: bool,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            like: None,
            where_: None,
            connected: None,
            mode: QueryMode::default(),
            boost: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
            threshold: None,
            explain: false,
        }
    }
}

impl Query {
    pub fn has_signal(&self) -> bool {
        self.like.is_some() || self.where_.is_some() || self.connected.is_some()
    }
}

/// Plan step sequence plus per-step costs and timing, attached to a
/// result set when `explain: true` (spec §4.7).
#[derive(Debug, Clone)]
pub struct Explanation {
    /// e.g. `"vector:search -> field:filter -> fusion:rank"`.
    pub plan_summary: String,
    pub step_costs: Vec<(String, f64)>,
    pub elapsed: Duration,
    pub boosts_applied: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RankedResult {
    pub id: EntityId,
    pub score: f32,
    pub vector_score: Option<f32>,
    pub graph_score: Option<f32>,
    pub field_score: Option<f32>,
    pub fusion_score: Option<f32>,
    pub entity: Option<Entity>,
    pub metadata: Metadata,
    pub explanation: Option<Explanation>,
}

impl RankedResult {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            score: 0.0,
            vector_score: None,
            graph_score: None,
            field_score: None,
            fusion_score: None,
            entity: None,
            metadata: Metadata::new(),
            explanation: None,
        }
    }
}
