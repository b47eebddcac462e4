//! Query Planner, Executor, and Fusion Ranker (spec §4.5-§4.7, C5-C7),
//! plus the top-level `Engine` facade (spec §6).
//!
//! This is the one crate that sees all four index crates
//! (`triplex-vector`, `triplex-metadata`, `triplex-graph`) plus
//! `triplex-storage`, since wiring them together into a single query
//! surface is core, not a server concern.

mod engine;
mod fusion;
mod planner;
mod types;

pub use engine::{Embed, Engine};
pub use fusion::{FusionRanker, Signal};
pub use planner::{Plan, PlanStep, Planner, StepKind, StepOp};
pub use types::{
    Boost, ConnectedSpec, Explanation, Query, QueryMode, RankedResult, VectorSeed, DEFAULT_LIMIT,
    MAX_LIMIT,
};

pub use triplex_core::{Error, Result};
