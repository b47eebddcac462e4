//! Metadata Index (spec §4.2, C2).
//!
//! Per-field hash index (`equals`/`oneOf`/`contains`) plus a sorted index
//! (`greaterThan`/`between`/…), with type-tag inference and per-field
//! statistics feeding the query planner's selectivity estimates. Grounded
//! in `triplex_core::scalar::Scalar`'s tagged-union redesign and in
//! `triplex_storage::cache::CacheManager`'s `Arc<RwLock<HashMap<..>>>`
//! shape for per-field locking (spec §5: "metadata indexes: per-field
//! read-write locks").

mod field;
mod index;
mod scalar_key;

pub use field::{FieldIndex, FieldStats};
pub use index::MetadataIndex;

pub use triplex_core::filter::FilterExpr;
pub use triplex_core::scalar::{FieldType, Metadata, Scalar};
pub use triplex_core::{Error, Result};
