//! A single field's hash index, sorted index, and statistics (spec §4.2).

use crate::scalar_key::{ScalarKey, SortKey};
use std::collections::{BTreeMap, HashMap, HashSet};
use triplex_core::ids::EntityId;
use triplex_core::scalar::{FieldType, Scalar};
use triplex_core::{Error, Result};

/// Cardinality/min/max summary used by the planner's selectivity estimates
/// (spec §4.5). Computed on demand from the live indexes rather than kept
/// as running counters, so `put`/`delete` can't drift out of sync with it.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldStats {
    pub field_type: FieldType,
    /// Number of entities carrying this field.
    pub count: usize,
    /// Number of distinct values observed (hash index bucket count).
    pub cardinality: usize,
    pub min: Option<Scalar>,
    pub max: Option<Scalar>,
}

/// Hash index `H_f` plus sorted index `S_f` for one metadata field.
#[derive(Debug, Default)]
pub struct FieldIndex {
    field_type: Option<FieldType>,
    /// `H_f`: exact value -> ids. For `List` values, each element is also
    /// indexed here (in addition to the list's own key) so `contains` is a
    /// hash lookup rather than a scan.
    hash_index: HashMap<ScalarKey, HashSet<EntityId>>,
    /// `S_f`: ordered value -> ids, for range operators.
    sorted_index: BTreeMap<SortKey, HashSet<EntityId>>,
    /// Exact last-written value per id, needed so `delete` (and substring
    /// `contains`) can find buckets without the caller re-supplying the
    /// original value, and so `put` can retract the old entry on update.
    values: HashMap<EntityId, Scalar>,
}

impl FieldIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field_type(&self) -> Option<FieldType> {
        self.field_type
    }

    pub fn stats(&self) -> FieldStats {
        FieldStats {
            field_type: self.field_type.unwrap_or(FieldType::Mixed),
            count: self.values.len(),
            cardinality: self.hash_index.len(),
            min: self.min_value(),
            max: self.max_value(),
        }
    }

    fn min_value(&self) -> Option<Scalar> {
        let key = self.sorted_index.keys().next()?;
        self.values
            .values()
            .find(|v| SortKey::from_scalar(v).as_ref() == Some(key))
            .cloned()
    }

    fn max_value(&self) -> Option<Scalar> {
        let key = self.sorted_index.keys().next_back()?;
        self.values
            .values()
            .find(|v| SortKey::from_scalar(v).as_ref() == Some(key))
            .cloned()
    }

    /// Insert or replace `id`'s value for this field. A type mismatch
    /// against the field's established type silently degrades the field to
    /// `Mixed` rather than erroring (spec §9 open question: compatibility
    /// mode is the default so one malformed document can't poison writes
    /// for an entire field).
    pub fn put(&mut self, id: &EntityId, value: Scalar) {
        if let Some(old) = self.values.remove(id) {
            self.retract(id, &old);
        }

        let tag = value.type_tag();
        self.field_type = Some(match self.field_type {
            None => tag,
            Some(existing) if existing == tag => existing,
            Some(_) => FieldType::Mixed,
        });

        self.insert_hash_entries(id, &value);
        if let Some(sort_key) = SortKey::from_scalar(&value) {
            self.sorted_index.entry(sort_key).or_default().insert(id.clone());
        }
        self.values.insert(id.clone(), value);
    }

    /// Remove `id` from every bucket it occupies. No-op if `id` has no
    /// value on this field.
    pub fn delete(&mut self, id: &EntityId) {
        if let Some(old) = self.values.remove(id) {
            self.retract(id, &old);
        }
    }

    fn insert_hash_entries(&mut self, id: &EntityId, value: &Scalar) {
        let key = ScalarKey::from_scalar(value);
        self.hash_index.entry(key).or_default().insert(id.clone());
        if let Scalar::List(items) = value {
            for item in items {
                let item_key = ScalarKey::from_scalar(item);
                self.hash_index.entry(item_key).or_default().insert(id.clone());
            }
        }
    }

    fn retract(&mut self, id: &EntityId, value: &Scalar) {
        let key = ScalarKey::from_scalar(value);
        Self::remove_from_bucket(&mut self.hash_index, &key, id);
        if let Scalar::List(items) = value {
            for item in items {
                let item_key = ScalarKey::from_scalar(item);
                Self::remove_from_bucket(&mut self.hash_index, &item_key, id);
            }
        }
        if let Some(sort_key) = SortKey::from_scalar(value) {
            if let Some(bucket) = self.sorted_index.get_mut(&sort_key) {
                bucket.remove(id);
                if bucket.is_empty() {
                    self.sorted_index.remove(&sort_key);
                }
            }
        }
    }

    fn remove_from_bucket(
        index: &mut HashMap<ScalarKey, HashSet<EntityId>>,
        key: &ScalarKey,
        id: &EntityId,
    ) {
        if let Some(bucket) = index.get_mut(key) {
            bucket.remove(id);
            if bucket.is_empty() {
                index.remove(key);
            }
        }
    }

    pub fn equals(&self, value: &Scalar) -> HashSet<EntityId> {
        self.hash_index
            .get(&ScalarKey::from_scalar(value))
            .cloned()
            .unwrap_or_default()
    }

    pub fn one_of(&self, values: &[Scalar]) -> HashSet<EntityId> {
        let mut out = HashSet::new();
        for value in values {
            out.extend(self.equals(value).into_iter());
        }
        out
    }

    /// `contains` semantics: substring match for `String` fields (scanning
    /// stored values, since substring isn't a hash lookup); exact-element
    /// membership for fields built from `List` values (a hash lookup, since
    /// list elements are pre-indexed); `InvalidArgument` for every other
    /// scalar type, which has no natural "contains".
    pub fn contains(&self, value: &Scalar) -> Result<HashSet<EntityId>> {
        match self.field_type {
            Some(FieldType::String) => {
                let needle = value.as_str().ok_or_else(|| {
                    Error::InvalidArgument(
                        "contains on a string field requires a string value".into(),
                    )
                })?;
                Ok(self
                    .values
                    .iter()
                    .filter(|(_, v)| v.as_str().is_some_and(|s| s.contains(needle)))
                    .map(|(id, _)| id.clone())
                    .collect())
            }
            Some(FieldType::Mixed) | None => Ok(self.equals(value)),
            Some(other) => Err(Error::InvalidArgument(format!(
                "contains is not supported on {other:?} fields"
            ))),
        }
    }

    pub fn range(&self, lo: Option<&Scalar>, hi: Option<&Scalar>) -> HashSet<EntityId> {
        let lo_key = lo.and_then(SortKey::from_scalar);
        let hi_key = hi.and_then(SortKey::from_scalar);
        self.sorted_index
            .range((
                lo_key.map(std::ops::Bound::Included).unwrap_or(std::ops::Bound::Unbounded),
                hi_key.map(std::ops::Bound::Included).unwrap_or(std::ops::Bound::Unbounded),
            ))
            .flat_map(|(_, ids)| ids.iter().cloned())
            .collect()
    }

    pub fn exists_ids(&self) -> HashSet<EntityId> {
        self.values.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
