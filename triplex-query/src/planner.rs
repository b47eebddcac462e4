//! Query planner (spec §4.5): a deterministic cost model over the three
//! signal kinds, plan-selection rules evaluated in a fixed order, and a
//! bounded LRU cache keyed by a canonicalized query fingerprint. Grounded
//! in `triplex_storage::cache::CacheManager`'s `Arc<RwLock<..>>` shape,
//! generalized to an actual LRU via the `lru` crate.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use triplex_core::filter::FilterExpr;

use crate::types::{ConnectedSpec, Query, VectorSeed};

const DEFAULT_BRANCHING: f64 = 10.0;
const PLAN_CACHE_SIZE: usize = 256;

/// Fraction of the population below which an operation is considered
/// "highly selective" (plan rule 2).
const HIGH_SELECTIVITY_THRESHOLD: f64 = 0.01;

/// Two costs are "close enough to run in parallel" (plan rule 3) when
/// neither is more than this multiple of the other.
const PARALLEL_COST_RATIO: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Vector,
    Graph,
    Field,
    Fusion,
}

impl StepKind {
    fn label(self) -> &'static str {
        match self {
            StepKind::Vector => "vector",
            StepKind::Graph => "graph",
            StepKind::Field => "field",
            StepKind::Fusion => "fusion",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOp {
    Search,
    Filter,
    Traverse,
    Rank,
}

impl StepOp {
    fn label(self) -> &'static str {
        match self {
            StepOp::Search => "search",
            StepOp::Filter => "filter",
            StepOp::Traverse => "traverse",
            StepOp::Rank => "rank",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlanStep {
    pub kind: StepKind,
    pub op: StepOp,
    pub estimated_cost: f64,
}

impl PlanStep {
    fn label(&self) -> String {
        format!("{}:{}", self.kind.label(), self.op.label())
    }
}

#[derive(Debug, Clone)]
pub struct Plan {
    pub start: StepKind,
    pub parallel: bool,
    pub estimated_cost: f64,
    pub steps: Vec<PlanStep>,
    pub skip_fusion: bool,
}

impl Plan {
    pub fn summary(&self) -> String {
        self.steps
            .iter()
            .map(PlanStep::label)
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// Per-signal cost estimate feeding plan selection.
#[derive(Debug, Clone, Copy)]
struct SignalCost {
    kind: StepKind,
    op: StepOp,
    cost: f64,
}

pub struct Planner {
    cache: Mutex<LruCache<String, Plan>>,
    branching: f64,
}

impl Default for Planner {
    fn default() -> Self {
        Self::new()
    }
}

impl Planner {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(LruCache::new(NonZeroUsize::new(PLAN_CACHE_SIZE).unwrap())),
            branching: DEFAULT_BRANCHING,
        }
    }

    /// Build (or reuse from cache) a plan for `query` over a collection
    /// of `population` entities, with per-field selectivity estimates
    /// already resolved by the caller (the metadata index knows its own
    /// cardinalities; the planner only composes costs).
    pub fn plan(
        &self,
        query: &Query,
        population: usize,
        field_selectivity: Option<f64>,
        ef_search: usize,
    ) -> Plan {
        let key = fingerprint(query);
        if let Some(cached) = self.cache.lock().unwrap().get(&key) {
            return cached.clone();
        }

        let plan = self.build_plan(query, population, field_selectivity, ef_search);
        self.cache.lock().unwrap().put(key, plan.clone());
        plan
    }

    fn build_plan(
        &self,
        query: &Query,
        population: usize,
        field_selectivity: Option<f64>,
        ef_search: usize,
    ) -> Plan {
        let n = population.max(1);
        let mut signals = Vec::new();

        if query.like.is_some() {
            signals.push(SignalCost {
                kind: StepKind::Vector,
                op: StepOp::Search,
                cost: vector_cost(n, ef_search),
            });
        }
        if let Some(filter) = &query.where_ {
            signals.push(SignalCost {
                kind: StepKind::Field,
                op: StepOp::Filter,
                cost: field_cost(n, filter, field_selectivity),
            });
        }
        if let Some(connected) = &query.connected {
            signals.push(SignalCost {
                kind: StepKind::Graph,
                op: StepOp::Traverse,
                cost: graph_cost(self.branching, connected),
            });
        }

        if signals.is_empty() {
            // No signal at all; the engine rejects this before planning,
            // but a planner must still return something well-formed.
            return Plan {
                start: StepKind::Field,
                parallel: false,
                estimated_cost: 0.0,
                steps: Vec::new(),
                skip_fusion: true,
            };
        }

        // Rule 1: single signal.
        if signals.len() == 1 {
            let s = signals[0];
            return Plan {
                start: s.kind,
                parallel: false,
                estimated_cost: s.cost,
                steps: vec![PlanStep {
                    kind: s.kind,
                    op: s.op,
                    estimated_cost: s.cost,
                }],
                skip_fusion: true,
            };
        }

        let mut sorted = signals.clone();
        sorted.sort_by(|a, b| a.cost.partial_cmp(&b.cost).unwrap());

        // Rule 2: a signal selective enough to shrink the population
        // below 1% up front starts a progressive plan with it first.
        if let Some(most_selective) = sorted
            .iter()
            .find(|s| s.kind == StepKind::Field)
            .filter(|_| field_selectivity.map(|sel| sel < HIGH_SELECTIVITY_THRESHOLD).unwrap_or(false))
        {
            return progressive_plan(&sorted, most_selective.kind);
        }

        // Rule 3: top two costs within an order of magnitude run in
        // parallel, fused at the end.
        if sorted.len() >= 2 {
            let (a, b) = (sorted[0].cost.max(1e-9), sorted[1].cost.max(1e-9));
            let ratio = a.max(b) / a.min(b);
            if ratio <= PARALLEL_COST_RATIO {
                let mut steps: Vec<PlanStep> = sorted
                    .iter()
                    .map(|s| PlanStep {
                        kind: s.kind,
                        op: s.op,
                        estimated_cost: s.cost,
                    })
                    .collect();
                let total: f64 = steps.iter().map(|s| s.estimated_cost).sum();
                steps.push(PlanStep {
                    kind: StepKind::Fusion,
                    op: StepOp::Rank,
                    estimated_cost: total * 0.05,
                });
                return Plan {
                    start: sorted[0].kind,
                    parallel: true,
                    estimated_cost: total,
                    steps,
                    skip_fusion: false,
                };
            }
        }

        // Rule 4: default, progressive in ascending cost order.
        progressive_plan(&sorted, sorted[0].kind)
    }
}

fn progressive_plan(sorted: &[SignalCost], start: StepKind) -> Plan {
    let mut ordered = sorted.to_vec();
    ordered.sort_by(|a, b| {
        if a.kind == start {
            std::cmp::Ordering::Less
        } else if b.kind == start {
            std::cmp::Ordering::Greater
        } else {
            a.cost.partial_cmp(&b.cost).unwrap()
        }
    });
    let mut steps: Vec<PlanStep> = ordered
        .iter()
        .map(|s| PlanStep {
            kind: s.kind,
            op: s.op,
            estimated_cost: s.cost,
        })
        .collect();
    let total: f64 = steps.iter().map(|s| s.estimated_cost).sum();
    let skip_fusion = steps.len() <= 1;
    if !skip_fusion {
        steps.push(PlanStep {
            kind: StepKind::Fusion,
            op: StepOp::Rank,
            estimated_cost: total * 0.05,
        });
    }
    Plan {
        start,
        parallel: false,
        estimated_cost: total,
        steps,
        skip_fusion,
    }
}

fn vector_cost(n: usize, ef_search: usize) -> f64 {
    (n as f64).max(2.0).log2() * ef_search.max(1) as f64
}

fn field_cost(n: usize, filter: &FilterExpr, selectivity: Option<f64>) -> f64 {
    if is_pure_range(filter) {
        return (n as f64).max(2.0).log2();
    }
    selectivity.unwrap_or(0.1) * n as f64
}

fn is_pure_range(filter: &FilterExpr) -> bool {
    matches!(
        filter,
        FilterExpr::GreaterThan { .. }
            | FilterExpr::GreaterOrEqual { .. }
            | FilterExpr::LessThan { .. }
            | FilterExpr::LessOrEqual { .. }
            | FilterExpr::Between { .. }
    )
}

fn graph_cost(branching: f64, connected: &ConnectedSpec) -> f64 {
    branching.powi(connected.max_depth.max(1) as i32)
}

/// A stable string fingerprint for the plan cache. Field order in
/// `FilterExpr::fields()` is not canonicalized here since the filter's
/// own structural `Debug` already reflects its exact shape.
fn fingerprint(query: &Query) -> String {
    let like = match &query.like {
        Some(VectorSeed::Text(t)) => format!("text:{t}"),
        Some(VectorSeed::Vector(v)) => format!("vec:{}", v.len()),
        Some(VectorSeed::Id(id)) => format!("id:{id}"),
        None => "none".to_string(),
    };
    let where_ = query
        .where_
        .as_ref()
        .map(|f| format!("{f:?}"))
        .unwrap_or_else(|| "none".to_string());
    let connected = query
        .connected
        .as_ref()
        .map(|c| format!("{:?}|{:?}|{:?}|{:?}|{}", c.from, c.to, c.edge_types, c.direction, c.max_depth))
        .unwrap_or_else(|| "none".to_string());
    format!(
        "like={like};where={where_};connected={connected};mode={:?};limit={};offset={};threshold={:?}",
        query.mode, query.limit, query.offset, query.threshold
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Query;
    use triplex_core::scalar::Scalar;

    #[test]
    fn single_signal_skips_fusion() {
        let planner = Planner::new();
        let query = Query {
            like: Some(VectorSeed::Text("hello".into())),
            ..Default::default()
        };
        let plan = planner.plan(&query, 10_000, None, 64);
        assert!(plan.skip_fusion);
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.start, StepKind::Vector);
    }

    #[test]
    fn highly_selective_field_starts_first() {
        let planner = Planner::new();
        let query = Query {
            like: Some(VectorSeed::Text("hello".into())),
            where_: Some(FilterExpr::equals("id", Scalar::String("x".into()))),
            ..Default::default()
        };
        let plan = planner.plan(&query, 1_000_000, Some(0.0001), 64);
        assert_eq!(plan.start, StepKind::Field);
        assert!(!plan.parallel);
    }

    #[test]
    fn close_costs_run_in_parallel_with_final_fusion() {
        let planner = Planner::new();
        let query = Query {
            like: Some(VectorSeed::Text("hello".into())),
            where_: Some(FilterExpr::equals("category", Scalar::String("tech".into()))),
            ..Default::default()
        };
        let plan = planner.plan(&query, 100, Some(0.5), 8);
        assert!(plan.parallel);
        assert_eq!(plan.steps.last().unwrap().kind, StepKind::Fusion);
    }

    #[test]
    fn plan_cache_hits_on_identical_query() {
        let planner = Planner::new();
        let query = Query {
            like: Some(VectorSeed::Text("hello".into())),
            ..Default::default()
        };
        let a = planner.plan(&query, 10_000, None, 64);
        let b = planner.plan(&query, 10_000, None, 64);
        assert_eq!(a.summary(), b.summary());
    }
}
