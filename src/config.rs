//! Global configuration constants for latticedb.
//!
//! Tuning parameters and input validation limits are defined here as
//! compile-time constants. Per-index runtime parameters (list counts, probe
//! counts, seeds) live in the index config structs.

/// BM25 Okapi term frequency saturation parameter.
///
/// Controls how quickly term frequency saturates. Higher values allow TF to
/// grow more before saturating.
pub const BM25_K1: f32 = 1.5;

/// BM25 Okapi document length normalization parameter.
///
/// 0.0 = no normalization, 1.0 = full normalization.
pub const BM25_B: f32 = 0.75;

/// Fraction of tombstoned KD-tree nodes that triggers a rebuild.
pub const KDTREE_TOMBSTONE_REBUILD_FRACTION: f64 = 0.25;

/// Maximum Lloyd iterations during IVF centroid training.
///
/// Training stops early when an iteration reassigns no points.
pub const IVF_MAX_TRAIN_ITERATIONS: usize = 25;

/// Fraction of deleted records that triggers IVF retraining.
pub const IVF_DELETED_RETRAIN_FRACTION: f64 = 0.20;

/// Growth factor since last training that triggers IVF retraining.
///
/// Retraining fires when the live count reaches this multiple of the count
/// at the previous training.
pub const IVF_GROWTH_RETRAIN_FACTOR: usize = 2;

/// Default number of IVF coarse clusters.
pub const IVF_DEFAULT_N_LISTS: usize = 16;

/// Default number of IVF lists consulted per query.
pub const IVF_DEFAULT_N_PROBE: usize = 4;

/// Default number of LSH hash tables.
pub const LSH_DEFAULT_N_TABLES: usize = 8;

/// Default number of hyperplane bits per LSH table.
pub const LSH_DEFAULT_N_BITS: usize = 16;

/// Maximum hyperplane bits per LSH table (signatures pack into a u64).
pub const LSH_MAX_N_BITS: usize = 64;

/// Default RNG seed for approximate indexes when none is supplied.
pub const DEFAULT_RNG_SEED: u64 = 42;

/// Maximum rounds of the candidate oversampling loop when a post-filtered
/// result comes back short (each round doubles the requested k).
pub const OVERSAMPLE_MAX_ROUNDS: usize = 3;

/// Maximum allowed embedding dimension.
pub const MAX_DIMENSION: usize = 16_384;

/// Name of the always-present brute-force vector index.
pub const DEFAULT_INDEX_NAME: &str = "default";

/// Payload field consulted by auto-embedding when no vector is supplied.
pub const AUTO_EMBED_FIELD: &str = "text";
