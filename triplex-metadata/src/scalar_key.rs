//! Hashable/orderable projections of `Scalar` for index buckets.
//!
//! `Scalar` carries `f64` and isn't `Eq`/`Hash`/`Ord`, so the hash and
//! sorted indexes each get a purpose-built key type instead, the same way
//! `triplex-vector`'s search heap wraps scores in `OrderedFloat` rather
//! than implementing `Ord` on the raw value.

use ordered_float::OrderedFloat;
use triplex_core::scalar::Scalar;

/// Exact-equality key for the hash index. Preserves the scalar's variant,
/// so `Int64(3)` and `Float64(3.0)` are distinct buckets — `equals` means
/// "the same value as stored", not "numerically equal".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum ScalarKey {
    String(String),
    Int64(i64),
    Float64(OrderedFloat<f64>),
    Bool(bool),
    Timestamp(i64),
    /// Never a top-level field value in the sorted index; only used to
    /// recurse into a list's elements for `contains` lookups.
    List(Vec<ScalarKey>),
}

impl ScalarKey {
    pub(crate) fn from_scalar(value: &Scalar) -> Self {
        match value {
            Scalar::String(s) => ScalarKey::String(s.clone()),
            Scalar::Int64(n) => ScalarKey::Int64(*n),
            Scalar::Float64(f) => ScalarKey::Float64(OrderedFloat(*f)),
            Scalar::Bool(b) => ScalarKey::Bool(*b),
            Scalar::Timestamp(t) => ScalarKey::Timestamp(*t),
            Scalar::List(items) => {
                ScalarKey::List(items.iter().map(ScalarKey::from_scalar).collect())
            }
        }
    }
}

/// Total-order key for the sorted index, mirroring `Scalar::total_cmp`:
/// all numeric variants (`Int64`/`Float64`) collapse into `Num` so a field
/// holding a mix of the two still interleaves by value under a range scan.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum SortKey {
    Str(String),
    Num(OrderedFloat<f64>),
    Bool(bool),
    Time(i64),
}

impl SortKey {
    /// `None` for a `List` scalar — lists are excluded from the sorted
    /// index since no meaningful total order applies to them.
    pub(crate) fn from_scalar(value: &Scalar) -> Option<Self> {
        match value {
            Scalar::String(s) => Some(SortKey::Str(s.clone())),
            Scalar::Int64(n) => Some(SortKey::Num(OrderedFloat(*n as f64))),
            Scalar::Float64(f) => Some(SortKey::Num(OrderedFloat(*f))),
            Scalar::Bool(b) => Some(SortKey::Bool(*b)),
            Scalar::Timestamp(t) => Some(SortKey::Time(*t)),
            Scalar::List(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_values_hash_equal() {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let a = ScalarKey::from_scalar(&Scalar::String("x".into()));
        let b = ScalarKey::from_scalar(&Scalar::String("x".into()));

        let mut ha = DefaultHasher::new();
        a.hash(&mut ha);
        let mut hb = DefaultHasher::new();
        b.hash(&mut hb);
        assert_eq!(ha.finish(), hb.finish());
    }
}
