//! Top-level metadata index: one `FieldIndex` per field, behind its own
//! read-write lock (spec §5), plus `FilterExpr` evaluation and selectivity
//! estimation for the query planner.
//!
//! Grounded on `triplex_storage::cache::CacheManager`'s
//! `Arc<RwLock<HashMap<..>>>` shape: a coarse lock guards the field-name
//! map itself (new fields are rare), while each field's own lock is held
//! only for the duration of a single `put`/`delete`/lookup.

use crate::field::{FieldIndex, FieldStats};
use std::collections::HashSet;
use tokio::sync::RwLock;
use triplex_core::filter::FilterExpr;
use triplex_core::ids::EntityId;
use triplex_core::scalar::{Metadata, Scalar};
use triplex_core::Result;

/// Selectivity floor/ceiling so a degenerate estimate (0 or >1) can never
/// make the planner treat a clause as free or impossible.
const MIN_SELECTIVITY: f64 = 0.0001;
const UNKNOWN_FIELD_SELECTIVITY: f64 = 0.1;

#[derive(Default)]
pub struct MetadataIndex {
    fields: RwLock<std::collections::HashMap<String, RwLock<FieldIndex>>>,
    /// Every id that currently has at least one metadata field set, needed
    /// to ground `exists(expected: false)` and `not(..)` in a concrete
    /// universe rather than "everything that could possibly exist".
    universe: RwLock<HashSet<EntityId>>,
}

impl MetadataIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, id: &EntityId, metadata: &Metadata) {
        for (field, value) in metadata {
            self.ensure_field(field).await;
            let fields = self.fields.read().await;
            let index = fields.get(field).expect("field just ensured");
            index.write().await.put(id, value.clone());
        }
        self.universe.write().await.insert(id.clone());
    }

    /// Creates an empty `FieldIndex` for `field` if it doesn't exist yet.
    /// Takes the cheap read-lock fast path when the field is already known
    /// (the common case once a schema has settled) and only falls back to
    /// the coarse write lock the first time a field is seen.
    async fn ensure_field(&self, field: &str) {
        {
            let fields = self.fields.read().await;
            if fields.contains_key(field) {
                return;
            }
        }
        let mut fields = self.fields.write().await;
        if let std::collections::hash_map::Entry::Vacant(e) = fields.entry(field.to_string()) {
            tracing::debug!(field, "metadata: new field observed");
            e.insert(RwLock::new(FieldIndex::new()));
        }
    }

    pub async fn delete(&self, id: &EntityId, metadata: &Metadata) {
        let fields = self.fields.read().await;
        for field in metadata.keys() {
            if let Some(index) = fields.get(field) {
                index.write().await.delete(id);
            }
        }
        drop(fields);
        self.universe.write().await.remove(id);
    }

    pub async fn stats(&self, field: &str) -> Option<FieldStats> {
        let fields = self.fields.read().await;
        match fields.get(field) {
            Some(index) => Some(index.read().await.stats()),
            None => None,
        }
    }

    pub async fn query(&self, filter: &FilterExpr) -> Result<HashSet<EntityId>> {
        match filter {
            FilterExpr::Equals { field, value } => Ok(self.with_field(field, |f| f.equals(value)).await),
            FilterExpr::OneOf { field, values } => {
                Ok(self.with_field(field, |f| f.one_of(values)).await)
            }
            FilterExpr::Contains { field, value } => self.with_field_fallible(field, |f| f.contains(value)).await,
            FilterExpr::GreaterThan { field, value } => {
                let ids = self.with_field(field, |f| f.range(Some(value), None)).await;
                Ok(self.exclude_equal(field, value, ids).await)
            }
            FilterExpr::GreaterOrEqual { field, value } => {
                Ok(self.with_field(field, |f| f.range(Some(value), None)).await)
            }
            FilterExpr::LessThan { field, value } => {
                let ids = self.with_field(field, |f| f.range(None, Some(value))).await;
                Ok(self.exclude_equal(field, value, ids).await)
            }
            FilterExpr::LessOrEqual { field, value } => {
                Ok(self.with_field(field, |f| f.range(None, Some(value))).await)
            }
            FilterExpr::Between { field, lo, hi } => {
                Ok(self.with_field(field, |f| f.range(Some(lo), Some(hi))).await)
            }
            FilterExpr::Exists { field, expected } => {
                let present = self.with_field(field, |f| f.exists_ids()).await;
                if *expected {
                    Ok(present)
                } else {
                    let universe = self.universe.read().await.clone();
                    Ok(universe.difference(&present).cloned().collect())
                }
            }
            FilterExpr::Not { expr } => {
                let inner = Box::pin(self.query(expr)).await?;
                let universe = self.universe.read().await.clone();
                Ok(universe.difference(&inner).cloned().collect())
            }
            FilterExpr::AllOf { exprs } => {
                let mut result: Option<HashSet<EntityId>> = None;
                for expr in exprs {
                    let ids = Box::pin(self.query(expr)).await?;
                    result = Some(match result {
                        None => ids,
                        Some(acc) => acc.intersection(&ids).cloned().collect(),
                    });
                    if result.as_ref().is_some_and(|r| r.is_empty()) {
                        break;
                    }
                }
                Ok(result.unwrap_or_default())
            }
            FilterExpr::AnyOf { exprs } => {
                let mut result = HashSet::new();
                for expr in exprs {
                    result.extend(Box::pin(self.query(expr)).await?);
                }
                Ok(result)
            }
        }
    }

    /// Product-under-independence estimate of the fraction of `n` entities
    /// a filter is expected to match (spec §4.5). Used by the planner's
    /// cost model, never by query execution itself.
    pub async fn estimate_selectivity(&self, filter: &FilterExpr, n: usize) -> f64 {
        if n == 0 {
            return 0.0;
        }
        match filter {
            FilterExpr::Equals { field, .. } | FilterExpr::Contains { field, .. } => {
                match self.stats(field).await {
                    Some(stats) if stats.cardinality > 0 => (1.0 / stats.cardinality as f64).max(MIN_SELECTIVITY),
                    _ => UNKNOWN_FIELD_SELECTIVITY,
                }
            }
            FilterExpr::OneOf { field, values } => match self.stats(field).await {
                Some(stats) if stats.cardinality > 0 => {
                    ((values.len() as f64) / stats.cardinality as f64).clamp(MIN_SELECTIVITY, 1.0)
                }
                _ => UNKNOWN_FIELD_SELECTIVITY,
            },
            FilterExpr::GreaterThan { field, value }
            | FilterExpr::GreaterOrEqual { field, value }
            | FilterExpr::LessThan { field, value } => {
                self.range_selectivity(field, Self::lower_bound(filter, value), Self::upper_bound(filter, value))
                    .await
            }
            FilterExpr::LessOrEqual { field, value } => {
                self.range_selectivity(field, None, Some(value)).await
            }
            FilterExpr::Between { field, lo, hi } => {
                self.range_selectivity(field, Some(lo), Some(hi)).await
            }
            FilterExpr::Exists { field, expected } => match self.stats(field).await {
                Some(stats) => {
                    let frac = stats.count as f64 / n as f64;
                    if *expected { frac.clamp(MIN_SELECTIVITY, 1.0) } else { (1.0 - frac).clamp(MIN_SELECTIVITY, 1.0) }
                }
                None => {
                    if *expected { MIN_SELECTIVITY } else { 1.0 }
                }
            },
            FilterExpr::Not { expr } => {
                (1.0 - Box::pin(self.estimate_selectivity(expr, n)).await).clamp(MIN_SELECTIVITY, 1.0)
            }
            FilterExpr::AllOf { exprs } => {
                let mut product = 1.0;
                for expr in exprs {
                    product *= Box::pin(self.estimate_selectivity(expr, n)).await;
                }
                product.max(MIN_SELECTIVITY)
            }
            FilterExpr::AnyOf { exprs } => {
                let mut complement = 1.0;
                for expr in exprs {
                    complement *= 1.0 - Box::pin(self.estimate_selectivity(expr, n)).await;
                }
                (1.0 - complement).clamp(MIN_SELECTIVITY, 1.0)
            }
        }
    }

    async fn range_selectivity(&self, field: &str, lo: Option<&Scalar>, hi: Option<&Scalar>) -> f64 {
        let stats = match self.stats(field).await {
            Some(s) => s,
            None => return UNKNOWN_FIELD_SELECTIVITY,
        };
        let (Some(min), Some(max)) = (stats.min.as_ref().and_then(Scalar::as_f64), stats.max.as_ref().and_then(Scalar::as_f64)) else {
            return UNKNOWN_FIELD_SELECTIVITY;
        };
        let width = (max - min).max(f64::EPSILON);
        let lo_v = lo.and_then(Scalar::as_f64).unwrap_or(min);
        let hi_v = hi.and_then(Scalar::as_f64).unwrap_or(max);
        ((hi_v.min(max) - lo_v.max(min)).max(0.0) / width).clamp(MIN_SELECTIVITY, 1.0)
    }

    fn lower_bound<'a>(filter: &'a FilterExpr, value: &'a Scalar) -> Option<&'a Scalar> {
        match filter {
            FilterExpr::GreaterThan { .. } | FilterExpr::GreaterOrEqual { .. } => Some(value),
            _ => None,
        }
    }

    fn upper_bound<'a>(filter: &'a FilterExpr, value: &'a Scalar) -> Option<&'a Scalar> {
        match filter {
            FilterExpr::LessThan { .. } => Some(value),
            _ => None,
        }
    }

    /// `greaterThan`/`lessThan` are exclusive; the sorted index's range
    /// query is inclusive, so strip out ids whose value equals the bound.
    async fn exclude_equal(&self, field: &str, bound: &Scalar, ids: HashSet<EntityId>) -> HashSet<EntityId> {
        let equal = self.with_field(field, |f| f.equals(bound)).await;
        ids.difference(&equal).cloned().collect()
    }

    async fn with_field<R>(&self, field: &str, f: impl FnOnce(&FieldIndex) -> R) -> R
    where
        R: Default,
    {
        let fields = self.fields.read().await;
        match fields.get(field) {
            Some(index) => f(&*index.read().await),
            None => R::default(),
        }
    }

    async fn with_field_fallible<R>(
        &self,
        field: &str,
        f: impl FnOnce(&FieldIndex) -> Result<R>,
    ) -> Result<R>
    where
        R: Default,
    {
        let fields = self.fields.read().await;
        match fields.get(field) {
            Some(index) => f(&*index.read().await),
            None => Ok(R::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(pairs: &[(&str, Scalar)]) -> Metadata {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[tokio::test]
    async fn equals_finds_inserted_id() {
        let index = MetadataIndex::new();
        index
            .put(&"a".to_string(), &meta(&[("category", Scalar::String("tech".into()))]))
            .await;

        let filter = FilterExpr::equals("category", Scalar::String("tech".into()));
        let got = index.query(&filter).await.unwrap();
        assert_eq!(got, HashSet::from(["a".to_string()]));
    }

    #[tokio::test]
    async fn delete_then_query_finds_nothing() {
        let index = MetadataIndex::new();
        let m = meta(&[("category", Scalar::String("tech".into()))]);
        index.put(&"a".to_string(), &m).await;
        index.delete(&"a".to_string(), &m).await;

        let filter = FilterExpr::equals("category", Scalar::String("tech".into()));
        assert!(index.query(&filter).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn all_of_intersects_and_any_of_unions() {
        let index = MetadataIndex::new();
        index
            .put(
                &"a".to_string(),
                &meta(&[
                    ("category", Scalar::String("tech".into())),
                    ("archived", Scalar::Bool(false)),
                ]),
            )
            .await;
        index
            .put(
                &"b".to_string(),
                &meta(&[
                    ("category", Scalar::String("tech".into())),
                    ("archived", Scalar::Bool(true)),
                ]),
            )
            .await;

        let all = FilterExpr::all_of(vec![
            FilterExpr::equals("category", Scalar::String("tech".into())),
            FilterExpr::equals("archived", Scalar::Bool(false)),
        ]);
        assert_eq!(index.query(&all).await.unwrap(), HashSet::from(["a".to_string()]));

        let any = FilterExpr::any_of(vec![
            FilterExpr::equals("archived", Scalar::Bool(false)),
            FilterExpr::equals("archived", Scalar::Bool(true)),
        ]);
        assert_eq!(
            index.query(&any).await.unwrap(),
            HashSet::from(["a".to_string(), "b".to_string()])
        );
    }

    #[tokio::test]
    async fn not_complements_against_the_known_universe() {
        let index = MetadataIndex::new();
        index
            .put(&"a".to_string(), &meta(&[("archived", Scalar::Bool(true))]))
            .await;
        index
            .put(&"b".to_string(), &meta(&[("archived", Scalar::Bool(false))]))
            .await;

        let filter = FilterExpr::not(FilterExpr::equals("archived", Scalar::Bool(true)));
        assert_eq!(index.query(&filter).await.unwrap(), HashSet::from(["b".to_string()]));
    }

    #[tokio::test]
    async fn exists_false_returns_ids_missing_the_field() {
        let index = MetadataIndex::new();
        index
            .put(&"a".to_string(), &meta(&[("verified", Scalar::Bool(true))]))
            .await;
        index.put(&"b".to_string(), &meta(&[])).await;

        let filter = FilterExpr::Exists { field: "verified".into(), expected: false };
        assert_eq!(index.query(&filter).await.unwrap(), HashSet::from(["b".to_string()]));
    }

    #[tokio::test]
    async fn between_is_inclusive_on_both_ends() {
        let index = MetadataIndex::new();
        for (id, v) in [("a", 1i64), ("b", 5), ("c", 10)] {
            index.put(&id.to_string(), &meta(&[("score", Scalar::Int64(v))])).await;
        }

        let filter = FilterExpr::Between {
            field: "score".into(),
            lo: Scalar::Int64(1),
            hi: Scalar::Int64(5),
        };
        assert_eq!(
            index.query(&filter).await.unwrap(),
            HashSet::from(["a".to_string(), "b".to_string()])
        );
    }

    #[tokio::test]
    async fn greater_than_is_exclusive() {
        let index = MetadataIndex::new();
        for (id, v) in [("a", 1i64), ("b", 5)] {
            index.put(&id.to_string(), &meta(&[("score", Scalar::Int64(v))])).await;
        }

        let filter = FilterExpr::GreaterThan { field: "score".into(), value: Scalar::Int64(1) };
        assert_eq!(index.query(&filter).await.unwrap(), HashSet::from(["b".to_string()]));
    }

    #[tokio::test]
    async fn selectivity_of_unknown_field_is_the_default() {
        let index = MetadataIndex::new();
        let filter = FilterExpr::equals("ghost", Scalar::Bool(true));
        assert_eq!(index.estimate_selectivity(&filter, 100).await, UNKNOWN_FIELD_SELECTIVITY);
    }

    #[tokio::test]
    async fn selectivity_of_equality_is_inverse_cardinality() {
        let index = MetadataIndex::new();
        for (id, v) in [("a", "x"), ("b", "y"), ("c", "x")] {
            index
                .put(&id.to_string(), &meta(&[("category", Scalar::String(v.into()))]))
                .await;
        }

        let filter = FilterExpr::equals("category", Scalar::String("x".into()));
        let selectivity = index.estimate_selectivity(&filter, 3).await;
        assert!((selectivity - 0.5).abs() < 1e-9);
    }
}
