//! Triplex Core
//!
//! Shared vocabulary for the rest of the workspace: entity/relationship
//! records, the tagged metadata value union, the filter expression tree,
//! the error taxonomy, and cooperative cancellation tokens. Holds no
//! index structures of its own — those live in `triplex-vector`,
//! `triplex-metadata`, `triplex-graph`, and `triplex-storage`.

pub mod cancel;
pub mod entity;
pub mod error;
pub mod filter;
pub mod ids;
pub mod scalar;

pub use error::{Error, Result};

/// Default embedding dimension for a corpus when none is specified
/// (spec §3: "fixed length D (default 384) per corpus").
pub const DEFAULT_DIMENSION: usize = 384;
