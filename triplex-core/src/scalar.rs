//! Tagged metadata value union (spec §3, §9 redesign note).
//!
//! The original system carries metadata as dynamically typed values; a
//! statically typed implementation models that as a tagged union instead of
//! a byte-blob-plus-tag pair, matching how `serde_json::Value` is used
//! elsewhere in the corpus for open-ended scalar payloads.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// One metadata value. `List` holds an ordered sequence of scalars
/// (spec §3: "ordered sequence of scalars"); lists of lists are permitted
/// by the type but fields holding them degrade to `FieldType::Mixed` for
/// indexing purposes (§4.2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Scalar {
    String(String),
    Int64(i64),
    Float64(f64),
    Bool(bool),
    /// Epoch milliseconds.
    Timestamp(i64),
    List(Vec<Scalar>),
}

impl Scalar {
    pub fn type_tag(&self) -> FieldType {
        match self {
            Scalar::String(_) => FieldType::String,
            Scalar::Int64(_) | Scalar::Float64(_) => FieldType::Number,
            Scalar::Bool(_) => FieldType::Boolean,
            Scalar::Timestamp(_) => FieldType::Timestamp,
            Scalar::List(_) => FieldType::Mixed,
        }
    }

    /// Numeric projection used by range comparisons, `None` for non-numeric
    /// scalars (strings compare lexicographically instead, see `Ord` below).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int64(v) => Some(*v as f64),
            Scalar::Float64(v) => Some(*v),
            Scalar::Timestamp(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }

    /// Total order required by the sorted index (spec §3 invariant:
    /// "numeric < numeric by value; strings lexicographic; timestamps by
    /// epoch"). Cross-type comparisons order by `FieldType` discriminant so
    /// a `mixed` field still produces a stable (if not meaningful) order.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Scalar::String(a), Scalar::String(b)) => a.cmp(b),
            (Scalar::Bool(a), Scalar::Bool(b)) => a.cmp(b),
            (Scalar::Timestamp(a), Scalar::Timestamp(b)) => a.cmp(b),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
                _ => self.type_tag().cmp(&other.type_tag()),
            },
        }
    }
}

/// Inferred type tag for a metadata field (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldType {
    Number,
    String,
    Boolean,
    Timestamp,
    Mixed,
}

/// Metadata attached to an entity or relationship: field name -> value.
pub type Metadata = HashMap<String, Scalar>;
