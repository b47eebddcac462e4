//! Shared error taxonomy (spec §7).
//!
//! Every sub-crate keeps its own narrower error enum for the failures only
//! it can produce, and converts into this one at the point where it hands
//! control back to a caller that doesn't care which index produced the
//! failure (the `Engine` facade in `triplex-query`).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid vector: {0}")]
    InvalidVector(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("index corrupt, rebuild triggered: {0}")]
    IndexCorrupt(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("busy: write queue over high-water mark")]
    Busy,

    #[error("performance budget exceeded: {0}")]
    PerformanceViolation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
