//! Vector indexes and the scalar B-tree index.
//!
//! The four vector index variants share one retrieval contract and are
//! dispatched through the [`VectorIndex`] tagged union rather than trait
//! objects: the variant set is closed and the query planner matches on it.
//!
//! Indexes do not own the ground-truth records. Brute force holds member ids
//! only and scans vectors through the [`VectorSource`] view of the record
//! store; KD-tree, IVF, and LSH keep vector copies for structure locality.

/// Exact exhaustive scan.
pub mod brute_force;
/// Inverted-file index with flat lists (coarse clustering + probes).
pub mod ivf_flat;
/// Axis-aligned binary space partition for euclidean search.
pub mod kd_tree;
/// Random-hyperplane locality-sensitive hashing for cosine search.
pub mod lsh;
/// Ordered field-value index for filter pushdown.
pub mod scalar;

pub use brute_force::BruteForceIndex;
pub use ivf_flat::{IvfConfig, IvfFlatIndex};
pub use kd_tree::KdTreeIndex;
pub use lsh::{LshConfig, LshIndex};
pub use scalar::{Inclusivity, ScalarIndex};

use crate::config;
use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::record::RecordId;

/// Read view of the record store consumed by index search and rebuild.
///
/// Implemented by the record store; one logical lock covers both, so a view
/// handed to an index is always consistent with the mutation being applied.
pub trait VectorSource {
    /// Resolve a record id to its vector, `None` if not live.
    fn vector(&self, id: RecordId) -> Option<&[f32]>;
    /// Iterate all live (id, vector) pairs in ascending id order.
    fn live_vectors(&self) -> Box<dyn Iterator<Item = (RecordId, &[f32])> + '_>;
    /// Number of live records.
    fn live_len(&self) -> usize;
}

/// Vector index variant tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorIndexKind {
    BruteForce,
    KdTree,
    IvfFlat,
    Lsh,
}

/// Creation-time parameters, one variant per index kind.
#[derive(Debug, Clone)]
pub enum VectorIndexSpec {
    /// Exhaustive scan; no parameters.
    BruteForce,
    /// Balanced euclidean tree; no parameters.
    KdTree,
    /// Coarse clustering with `n_lists` lists and `n_probe` probes.
    IvfFlat(IvfConfig),
    /// `n_tables` hash tables of `n_bits` hyperplane bits each.
    Lsh(LshConfig),
}

/// A vector index: one of the four variants behind a shared contract.
///
/// Search returns up to `k` `(id, distance)` pairs in ascending distance,
/// ties broken by ascending id.
#[derive(Debug)]
pub enum VectorIndex {
    BruteForce(BruteForceIndex),
    KdTree(KdTreeIndex),
    IvfFlat(IvfFlatIndex),
    Lsh(LshIndex),
}

impl VectorIndex {
    /// Builds an empty index from its spec, validating kind/metric and
    /// parameter legality.
    pub fn new(spec: VectorIndexSpec, metric: DistanceMetric, dimension: usize) -> Result<Self> {
        match spec {
            VectorIndexSpec::BruteForce => Ok(VectorIndex::BruteForce(BruteForceIndex::new(metric))),
            VectorIndexSpec::KdTree => {
                if metric != DistanceMetric::Euclidean {
                    return Err(Error::IncompatibleIndex(format!(
                        "kd-tree supports euclidean only, got {metric:?}"
                    )));
                }
                Ok(VectorIndex::KdTree(KdTreeIndex::new()))
            }
            VectorIndexSpec::IvfFlat(cfg) => {
                if cfg.n_lists == 0 {
                    return Err(Error::InvalidParameter("ivf n_lists must be > 0".into()));
                }
                if cfg.n_probe == 0 || cfg.n_probe > cfg.n_lists {
                    return Err(Error::InvalidParameter(format!(
                        "ivf n_probe must be in 1..={}, got {}",
                        cfg.n_lists, cfg.n_probe
                    )));
                }
                Ok(VectorIndex::IvfFlat(IvfFlatIndex::new(cfg, metric)))
            }
            VectorIndexSpec::Lsh(cfg) => {
                if metric != DistanceMetric::Cosine {
                    return Err(Error::IncompatibleIndex(format!(
                        "lsh supports cosine only, got {metric:?}"
                    )));
                }
                if cfg.n_tables == 0 {
                    return Err(Error::InvalidParameter("lsh n_tables must be > 0".into()));
                }
                if cfg.n_bits == 0 || cfg.n_bits > config::LSH_MAX_N_BITS {
                    return Err(Error::InvalidParameter(format!(
                        "lsh n_bits must be in 1..={}, got {}",
                        config::LSH_MAX_N_BITS,
                        cfg.n_bits
                    )));
                }
                Ok(VectorIndex::Lsh(LshIndex::new(cfg, dimension)))
            }
        }
    }

    /// The variant tag.
    pub fn kind(&self) -> VectorIndexKind {
        match self {
            VectorIndex::BruteForce(_) => VectorIndexKind::BruteForce,
            VectorIndex::KdTree(_) => VectorIndexKind::KdTree,
            VectorIndex::IvfFlat(_) => VectorIndexKind::IvfFlat,
            VectorIndex::Lsh(_) => VectorIndexKind::Lsh,
        }
    }

    /// The distance metric this index ranks by.
    pub fn metric(&self) -> DistanceMetric {
        match self {
            VectorIndex::BruteForce(idx) => idx.metric(),
            VectorIndex::KdTree(_) => DistanceMetric::Euclidean,
            VectorIndex::IvfFlat(idx) => idx.metric(),
            VectorIndex::Lsh(_) => DistanceMetric::Cosine,
        }
    }

    /// Number of live members.
    pub fn len(&self) -> usize {
        match self {
            VectorIndex::BruteForce(idx) => idx.len(),
            VectorIndex::KdTree(idx) => idx.len(),
            VectorIndex::IvfFlat(idx) => idx.len(),
            VectorIndex::Lsh(idx) => idx.len(),
        }
    }

    /// True if the index holds no live members.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adds `(id, v)`; replaces on duplicate id.
    pub fn insert(&mut self, id: RecordId, vector: &[f32]) {
        match self {
            VectorIndex::BruteForce(idx) => idx.insert(id),
            VectorIndex::KdTree(idx) => idx.insert(id, vector),
            VectorIndex::IvfFlat(idx) => idx.insert(id, vector),
            VectorIndex::Lsh(idx) => idx.insert(id, vector),
        }
    }

    /// Removes `id`; no-op if absent. Tree variants may tombstone.
    pub fn remove(&mut self, id: RecordId) {
        match self {
            VectorIndex::BruteForce(idx) => idx.remove(id),
            VectorIndex::KdTree(idx) => idx.remove(id),
            VectorIndex::IvfFlat(idx) => idx.remove(id),
            VectorIndex::Lsh(idx) => idx.remove(id),
        }
    }

    /// Top-k search with an optional pushed-down id predicate.
    ///
    /// Brute force intersects the predicate during its scan. The other
    /// variants post-filter candidates and oversample (doubling `k`, and
    /// for IVF the probe count, up to [`config::OVERSAMPLE_MAX_ROUNDS`]
    /// rounds) to preserve recall.
    pub fn search(
        &self,
        source: &dyn VectorSource,
        query: &[f32],
        k: usize,
        filter: Option<&dyn Fn(RecordId) -> bool>,
    ) -> Vec<(RecordId, f32)> {
        if k == 0 {
            return Vec::new();
        }
        match (self, filter) {
            (VectorIndex::BruteForce(idx), _) => idx.search(source, query, k, filter),
            (_, None) => self.search_raw(source, query, k, 0),
            (_, Some(pred)) => self.search_oversampled(source, query, k, pred),
        }
    }

    /// Rebuilds internal structure from the current live set.
    pub fn rebuild(&mut self, source: &dyn VectorSource) {
        match self {
            VectorIndex::BruteForce(idx) => idx.rebuild(source),
            VectorIndex::KdTree(idx) => idx.rebuild(source),
            VectorIndex::IvfFlat(idx) => idx.rebuild(source),
            VectorIndex::Lsh(idx) => idx.rebuild(source),
        }
    }

    /// True when tombstone or growth thresholds call for a rebuild.
    pub fn needs_rebuild(&self) -> bool {
        match self {
            VectorIndex::BruteForce(_) => false,
            VectorIndex::KdTree(idx) => idx.needs_rebuild(),
            VectorIndex::IvfFlat(idx) => idx.needs_retrain(),
            VectorIndex::Lsh(_) => false,
        }
    }

    /// Unfiltered search; `probe_boost` widens IVF probing by `2^boost`.
    fn search_raw(
        &self,
        source: &dyn VectorSource,
        query: &[f32],
        k: usize,
        probe_boost: u32,
    ) -> Vec<(RecordId, f32)> {
        match self {
            VectorIndex::BruteForce(idx) => idx.search(source, query, k, None),
            VectorIndex::KdTree(idx) => idx.search(query, k),
            VectorIndex::IvfFlat(idx) => idx.search(query, k, probe_boost),
            VectorIndex::Lsh(idx) => idx.search(query, k),
        }
    }

    fn search_oversampled(
        &self,
        source: &dyn VectorSource,
        query: &[f32],
        k: usize,
        pred: &dyn Fn(RecordId) -> bool,
    ) -> Vec<(RecordId, f32)> {
        let live = self.len().max(1);
        let mut requested = k;
        let mut round = 0u32;
        loop {
            let candidates = self.search_raw(source, query, requested, round);
            let mut filtered: Vec<(RecordId, f32)> = candidates
                .into_iter()
                .filter(|&(id, _)| pred(id))
                .collect();
            if filtered.len() >= k
                || requested >= live
                || round as usize >= config::OVERSAMPLE_MAX_ROUNDS
            {
                filtered.truncate(k);
                return filtered;
            }
            requested = requested.saturating_mul(2).min(live);
            round += 1;
        }
    }
}

/// Sort hits ascending by distance, ties by ascending id.
pub(crate) fn sort_hits(hits: &mut [(RecordId, f32)]) {
    hits.sort_unstable_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kdtree_rejects_cosine() {
        let err =
            VectorIndex::new(VectorIndexSpec::KdTree, DistanceMetric::Cosine, 4).unwrap_err();
        assert!(matches!(err, Error::IncompatibleIndex(_)));
    }

    #[test]
    fn test_lsh_rejects_euclidean() {
        let cfg = LshConfig::default();
        let err = VectorIndex::new(VectorIndexSpec::Lsh(cfg), DistanceMetric::Euclidean, 4)
            .unwrap_err();
        assert!(matches!(err, Error::IncompatibleIndex(_)));
    }

    #[test]
    fn test_ivf_rejects_probe_above_lists() {
        let cfg = IvfConfig {
            n_lists: 4,
            n_probe: 8,
            seed: 1,
        };
        let err = VectorIndex::new(VectorIndexSpec::IvfFlat(cfg), DistanceMetric::Euclidean, 4)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[test]
    fn test_sort_hits_stable_by_id() {
        let mut hits = vec![(9, 1.0), (2, 0.5), (7, 0.5), (1, 2.0)];
        sort_hits(&mut hits);
        assert_eq!(hits, vec![(2, 0.5), (7, 0.5), (9, 1.0), (1, 2.0)]);
    }
}
