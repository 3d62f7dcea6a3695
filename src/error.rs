//! Crate-wide error type.
//!
//! Every fallible operation in latticedb returns [`Result`]. Errors are fatal
//! to the current operation; mutations roll back any partially applied index
//! changes before returning.

use thiserror::Error;

/// Errors produced by table mutations, index management, and queries.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("vector dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("vector contains NaN or infinite components")]
    NumericDomain,

    #[error("no record with id {0}")]
    UnknownId(u64),

    #[error("no index named '{0}'")]
    UnknownIndex(String),

    #[error("index '{0}' already exists")]
    DuplicateIndex(String),

    #[error("incompatible index: {0}")]
    IncompatibleIndex(String),

    #[error("schema violation: {0}")]
    SchemaViolation(String),

    #[error("auto-embedding requires a non-empty 'text' payload field and a configured embedder")]
    EmbeddingMissing,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("table '{0}' already exists")]
    DuplicateTable(String),

    #[error("no table named '{0}'")]
    UnknownTable(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
