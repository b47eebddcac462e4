//! Fusion ranker (spec §4.7): Reciprocal Rank Fusion across active
//! signals, adaptive per-signal weights, and post-fusion boosts.

use std::collections::HashMap;

use triplex_core::ids::EntityId;
use triplex_core::scalar::{Metadata, Scalar};

use crate::types::Boost;

const RRF_K: f64 = 60.0;
const RECENT_HALF_LIFE_MS: f64 = 30.0 * 24.0 * 60.0 * 60.0 * 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Vector,
    Graph,
    Field,
}

/// One signal's ranked contribution for a single id: its rank (0-based)
/// within that signal's own ordering.
#[derive(Debug, Clone)]
pub struct SignalRank {
    pub signal: Signal,
    pub rank: usize,
}

fn weights_for(active: &[Signal]) -> HashMap<Signal, f64> {
    let mut set: Vec<Signal> = active.to_vec();
    set.sort_by_key(signal_order);
    set.dedup();

    use Signal::*;
    let table: &[(&[Signal], &[f64])] = &[
        (&[Vector], &[1.0]),
        (&[Graph], &[1.0]),
        (&[Field], &[1.0]),
        (&[Vector, Graph, Field], &[0.40, 0.35, 0.25]),
        (&[Vector, Graph], &[0.60, 0.40]),
        (&[Vector, Field], &[0.50, 0.50]),
        (&[Graph, Field], &[0.60, 0.40]),
    ];

    for (combo, weights) in table {
        if combo.len() == set.len() && combo.iter().zip(set.iter()).all(|(a, b)| a == b) {
            return set.into_iter().zip(weights.iter().copied()).collect();
        }
    }
    // Fallback: equal weights, normalized.
    let w = 1.0 / set.len().max(1) as f64;
    set.into_iter().map(|s| (s, w)).collect()
}

fn signal_order(s: &Signal) -> u8 {
    match s {
        Signal::Vector => 0,
        Signal::Graph => 1,
        Signal::Field => 2,
    }
}

pub struct FusionRanker;

impl FusionRanker {
    /// Fuse per-signal rankings into a single score per id via RRF.
    /// `rankings` maps each active signal to its own id ordering
    /// (best-first); ids missing from a signal's list simply don't
    /// contribute that signal's term.
    pub fn fuse(rankings: &HashMap<Signal, Vec<EntityId>>) -> Vec<(EntityId, f64)> {
        let active: Vec<Signal> = rankings.keys().copied().collect();
        let weights = weights_for(&active);

        let mut scores: HashMap<EntityId, f64> = HashMap::new();
        for (signal, ids) in rankings {
            let w = weights.get(signal).copied().unwrap_or(0.0);
            for (rank, id) in ids.iter().enumerate() {
                *scores.entry(id.clone()).or_insert(0.0) += w * (1.0 / (RRF_K + rank as f64 + 1.0));
            }
        }

        let mut out: Vec<(EntityId, f64)> = scores.into_iter().collect();
        out.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then_with(|| a.0.cmp(&b.0)));
        out
    }

    /// Apply a single post-fusion multiplicative boost, returning the
    /// factor applied (for the `explain` trail) along with the new score.
    pub fn apply_boost(
        boost: &Boost,
        score: f64,
        metadata: &Metadata,
        now_ms: i64,
    ) -> (f64, String) {
        match boost {
            Boost::Recent => {
                let factor = match metadata.get("timestamp").or_else(|| metadata.get("createdAt")) {
                    Some(Scalar::Timestamp(t)) => {
                        let age = (now_ms - *t).max(0) as f64;
                        (-age / RECENT_HALF_LIFE_MS).exp()
                    }
                    _ => 0.0,
                };
                (score * factor, format!("recent({factor:.4})"))
            }
            Boost::Popular => {
                let views = match metadata.get("views") {
                    Some(Scalar::Int64(n)) => *n as f64,
                    Some(Scalar::Float64(f)) => *f,
                    _ => 0.0,
                };
                let factor = (views + 10.0).log10() / 2.0;
                (score * factor, format!("popular({factor:.4})"))
            }
            Boost::Verified => {
                let verified = matches!(metadata.get("verified"), Some(Scalar::Bool(true)));
                let factor = if verified { 1.5 } else { 1.0 };
                (score * factor, format!("verified({factor:.1})"))
            }
            Boost::Custom(label) => (score, format!("custom({label}):noop")),
        }
    }
}
