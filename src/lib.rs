//! # latticedb
//!
//! An in-memory vector database: records pair a dense f32 vector with an
//! arbitrary key/value payload and are retrieved by nearest-neighbor
//! similarity, BM25 full-text relevance, or a weighted hybrid of the two.
//!
//! ## Features
//!
//! - **Four vector indexes** behind one contract: exact brute force, a
//!   euclidean KD-tree, IVF-Flat coarse clustering, and random-hyperplane
//!   LSH, all with deterministic seeded training
//! - **BM25 full-text search** over configured payload fields with a
//!   pluggable tokenizer
//! - **Hybrid retrieval** fusing per-modality-normalized vector and text
//!   scores with a caller-chosen weight
//! - **Scalar B-tree indexes** for equality/range filter pushdown
//! - **Composable query pipeline**: filters, ranking, pagination, and
//!   projection accumulate on a plain builder value with a fixed execution
//!   order
//! - **Atomic mutations**: every add/update/merge/upsert/delete propagates
//!   to all indexes or rolls back entirely
//!
//! ## Architecture
//!
//! ```text
//! Table (RwLock) → RecordStore → { default + named VectorIndexes,
//!                                  ScalarIndexes, FullTextIndex }
//! Query (builder value) → execute → candidates → filter → rank/fuse
//!                                  → paginate → project
//! ```
//!
//! There is no persistence layer and no network surface; the crate targets
//! learning and experimentation. Embeddings come from a caller-supplied
//! [`Embedder`](embed::Embedder).

/// Global tuning constants: BM25 parameters, rebuild thresholds, defaults.
pub mod config;
/// Distance kernels: cosine, euclidean, dot; normalization helpers.
pub mod distance;
/// Caller-supplied text embedding capability.
pub mod embed;
/// Crate-wide error enum and `Result` alias.
pub mod error;
/// Full-text search: tokenizer, postings, BM25 scoring.
pub mod fulltext;
/// Vector indexes (brute force, KD-tree, IVF-Flat, LSH) and the scalar
/// B-tree index.
pub mod index;
/// Chainable query builder and result rows.
pub mod query;
/// Record, payload, and schema types.
pub mod record;
/// Ranking primitives: payload filtering and hybrid score fusion.
pub mod search;
/// Record store, tables, and the database registry.
pub mod storage;

pub use distance::DistanceMetric;
pub use embed::Embedder;
pub use error::{Error, Result};
pub use index::{IvfConfig, LshConfig, VectorIndexSpec};
pub use query::{Query, QueryRow};
pub use record::{
    payload_from_json, payload_to_json, FieldType, Payload, PayloadValue, Record, RecordId, Schema,
};
pub use storage::{Database, Table, TableConfig};
