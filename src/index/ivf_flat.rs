//! IVF-Flat approximate vector index.
//!
//! Coarse k-means clustering partitions the records into `n_lists` inverted
//! lists of `(id, vector)` pairs; a query brute-forces the union of the
//! `n_probe` lists whose centroids sit closest to it.
//!
//! Training runs on the first build that sees at least `n_lists` records:
//! initial centroids are a uniform random sample without replacement from a
//! seeded RNG, refined by at most
//! [`config::IVF_MAX_TRAIN_ITERATIONS`] Lloyd iterations with early stop
//! when no point changes cluster. Identical seeds and insertion order yield
//! identical index contents.

use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::{BinaryHeap, HashMap};
use tracing::debug;

use crate::config;
use crate::distance::{normalize, DistanceMetric};
use crate::index::VectorSource;
use crate::record::RecordId;

/// IVF runtime parameters. The seed makes training deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IvfConfig {
    /// Number of coarse clusters.
    pub n_lists: usize,
    /// Lists consulted at query time.
    pub n_probe: usize,
    /// RNG seed for centroid sampling.
    pub seed: u64,
}

impl Default for IvfConfig {
    fn default() -> Self {
        Self {
            n_lists: config::IVF_DEFAULT_N_LISTS,
            n_probe: config::IVF_DEFAULT_N_PROBE,
            seed: config::DEFAULT_RNG_SEED,
        }
    }
}

/// Inverted-file index with flat (uncompressed) lists.
#[derive(Debug)]
pub struct IvfFlatIndex {
    config: IvfConfig,
    metric: DistanceMetric,
    centroids: Vec<Vec<f32>>,
    lists: Vec<Vec<(RecordId, Vec<f32>)>>,
    /// id → list holding it, for O(1) removal lookups.
    assignments: HashMap<RecordId, usize>,
    /// Flat buffer used before training; scanned exhaustively.
    pending: Vec<(RecordId, Vec<f32>)>,
    live_at_training: usize,
    deletions_since_training: usize,
}

impl IvfFlatIndex {
    /// Creates an untrained index.
    pub fn new(config: IvfConfig, metric: DistanceMetric) -> Self {
        Self {
            config,
            metric,
            centroids: Vec::new(),
            lists: Vec::new(),
            assignments: HashMap::new(),
            pending: Vec::new(),
            live_at_training: 0,
            deletions_since_training: 0,
        }
    }

    /// The metric this index clusters and ranks by.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Number of live members.
    pub fn len(&self) -> usize {
        self.assignments.len() + self.pending.len()
    }

    /// True if the index has no live members.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once centroids have been trained.
    pub fn is_trained(&self) -> bool {
        !self.centroids.is_empty()
    }

    /// Adds `(id, v)`; replaces on duplicate id. Trained indexes assign to
    /// the nearest centroid without retraining; untrained ones buffer and
    /// train once `n_lists` records have accumulated.
    pub fn insert(&mut self, id: RecordId, vector: &[f32]) {
        self.remove_untracked(id);
        if self.is_trained() {
            let list = self.nearest_centroid(vector);
            self.lists[list].push((id, vector.to_vec()));
            self.assignments.insert(id, list);
        } else {
            self.pending.push((id, vector.to_vec()));
            if self.pending.len() >= self.config.n_lists {
                let entries = std::mem::take(&mut self.pending);
                self.train(entries);
            }
        }
    }

    /// Removes `id`; no-op if absent. Counts toward the retrain threshold.
    pub fn remove(&mut self, id: RecordId) {
        if self.remove_untracked(id) && self.is_trained() {
            self.deletions_since_training += 1;
        }
    }

    fn remove_untracked(&mut self, id: RecordId) -> bool {
        if let Some(list) = self.assignments.remove(&id) {
            self.lists[list].retain(|(lid, _)| *lid != id);
            true
        } else {
            let before = self.pending.len();
            self.pending.retain(|(pid, _)| *pid != id);
            before != self.pending.len()
        }
    }

    /// Top-k search probing `n_probe · 2^probe_boost` lists (capped at
    /// `n_lists`). Falls back to an exhaustive scan while untrained.
    /// Ascending distance, ties by ascending id.
    pub fn search(&self, query: &[f32], k: usize, probe_boost: u32) -> Vec<(RecordId, f32)> {
        if k == 0 {
            return Vec::new();
        }
        let mut heap: BinaryHeap<(OrderedFloat<f32>, RecordId)> =
            BinaryHeap::with_capacity(k + 1);
        if !self.is_trained() {
            for (id, v) in &self.pending {
                push_bounded(&mut heap, k, self.metric.distance(query, v), *id);
            }
        } else {
            let n_probe = self
                .config
                .n_probe
                .saturating_mul(1usize << probe_boost.min(31))
                .min(self.config.n_lists);
            let mut by_centroid: Vec<(f32, usize)> = self
                .centroids
                .iter()
                .enumerate()
                .map(|(i, c)| (self.metric.distance(query, c), i))
                .collect();
            by_centroid.sort_unstable_by(|a, b| {
                a.0.partial_cmp(&b.0)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.1.cmp(&b.1))
            });
            for &(_, list) in by_centroid.iter().take(n_probe) {
                for (id, v) in &self.lists[list] {
                    push_bounded(&mut heap, k, self.metric.distance(query, v), *id);
                }
            }
        }
        let mut hits: Vec<(RecordId, f32)> =
            heap.into_sorted_vec().into_iter().map(|(d, id)| (id, d.0)).collect();
        crate::index::sort_hits(&mut hits);
        hits
    }

    /// Retrains from the current live set (ascending id order).
    pub fn rebuild(&mut self, source: &dyn VectorSource) {
        let entries: Vec<(RecordId, Vec<f32>)> = source
            .live_vectors()
            .map(|(id, v)| (id, v.to_vec()))
            .collect();
        self.centroids.clear();
        self.lists.clear();
        self.assignments.clear();
        self.pending.clear();
        self.deletions_since_training = 0;
        self.live_at_training = 0;
        if entries.len() >= self.config.n_lists {
            self.train(entries);
        } else {
            self.pending = entries;
        }
    }

    /// True when the live count doubled since training or deletions passed
    /// a fifth of the trained population.
    pub fn needs_retrain(&self) -> bool {
        if !self.is_trained() {
            return false;
        }
        let grown = self.len() >= config::IVF_GROWTH_RETRAIN_FACTOR * self.live_at_training.max(1);
        let eroded = self.deletions_since_training as f64
            >= config::IVF_DELETED_RETRAIN_FRACTION * self.live_at_training as f64
            && self.deletions_since_training > 0;
        grown || eroded
    }

    /// Lloyd's algorithm over `entries`, in their given order.
    fn train(&mut self, entries: Vec<(RecordId, Vec<f32>)>) {
        let n_lists = self.config.n_lists;
        let dimension = match entries.first() {
            Some((_, v)) => v.len(),
            None => return,
        };

        // Uniform sample without replacement for the initial centroids.
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut indices: Vec<usize> = (0..entries.len()).collect();
        indices.shuffle(&mut rng);
        indices.truncate(n_lists);
        let mut centroids: Vec<Vec<f32>> =
            indices.iter().map(|&i| entries[i].1.clone()).collect();

        let metric = self.metric;
        let nearest = |centroids: &[Vec<f32>], v: &[f32]| -> usize {
            let mut best = 0usize;
            let mut best_dist = f32::MAX;
            for (i, c) in centroids.iter().enumerate() {
                let d = metric.distance(v, c);
                if d < best_dist {
                    best_dist = d;
                    best = i;
                }
            }
            best
        };

        let mut assignment: Vec<usize> = entries
            .iter()
            .map(|(_, v)| nearest(&centroids, v))
            .collect();

        let mut iterations = 0usize;
        for _ in 0..config::IVF_MAX_TRAIN_ITERATIONS {
            iterations += 1;
            // Recompute centroids as the arithmetic mean of their members;
            // an empty cluster keeps its previous centroid.
            let mut sums = vec![vec![0.0f64; dimension]; n_lists];
            let mut counts = vec![0usize; n_lists];
            for ((_, v), &list) in entries.iter().zip(&assignment) {
                counts[list] += 1;
                for (acc, x) in sums[list].iter_mut().zip(v) {
                    *acc += *x as f64;
                }
            }
            for (list, count) in counts.iter().enumerate() {
                if *count == 0 {
                    continue;
                }
                let mean: Vec<f32> = sums[list]
                    .iter()
                    .map(|s| (*s / *count as f64) as f32)
                    .collect();
                centroids[list] = if self.metric == DistanceMetric::Cosine {
                    normalize(&mean)
                } else {
                    mean
                };
            }

            let mut changed = false;
            for ((_, v), slot) in entries.iter().zip(assignment.iter_mut()) {
                let best = nearest(&centroids, v);
                if best != *slot {
                    *slot = best;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let mut lists: Vec<Vec<(RecordId, Vec<f32>)>> = vec![Vec::new(); n_lists];
        let mut assignments = HashMap::with_capacity(entries.len());
        let total = entries.len();
        for ((id, v), list) in entries.into_iter().zip(assignment) {
            assignments.insert(id, list);
            lists[list].push((id, v));
        }

        debug!(
            n_lists,
            records = total,
            iterations,
            "trained ivf centroids"
        );

        self.centroids = centroids;
        self.lists = lists;
        self.assignments = assignments;
        self.live_at_training = total;
        self.deletions_since_training = 0;
    }

    fn nearest_centroid(&self, v: &[f32]) -> usize {
        let mut best = 0usize;
        let mut best_dist = f32::MAX;
        for (i, c) in self.centroids.iter().enumerate() {
            let d = self.metric.distance(v, c);
            if d < best_dist {
                best_dist = d;
                best = i;
            }
        }
        best
    }
}

fn push_bounded(
    heap: &mut BinaryHeap<(OrderedFloat<f32>, RecordId)>,
    k: usize,
    dist: f32,
    id: RecordId,
) {
    heap.push((OrderedFloat(dist), id));
    if heap.len() > k {
        heap.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(n_lists: usize, n_probe: usize) -> IvfConfig {
        IvfConfig {
            n_lists,
            n_probe,
            seed: 42,
        }
    }

    fn cluster_point(center: f32, offset: f32) -> Vec<f32> {
        vec![center + offset, center - offset]
    }

    #[test]
    fn test_untrained_scans_exhaustively() {
        let mut idx = IvfFlatIndex::new(config(8, 2), DistanceMetric::Euclidean);
        idx.insert(1, &[0.0, 0.0]);
        idx.insert(2, &[1.0, 1.0]);
        assert!(!idx.is_trained());
        let hits = idx.search(&[0.1, 0.1], 2, 0);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, 1);
    }

    #[test]
    fn test_training_triggers_at_n_lists() {
        let mut idx = IvfFlatIndex::new(config(4, 2), DistanceMetric::Euclidean);
        for i in 0..4u64 {
            idx.insert(i + 1, &cluster_point(i as f32 * 10.0, 0.1));
        }
        assert!(idx.is_trained());
        assert_eq!(idx.len(), 4);
    }

    #[test]
    fn test_deterministic_under_seed_and_order() {
        let build = || {
            let mut idx = IvfFlatIndex::new(config(4, 4), DistanceMetric::Euclidean);
            for i in 0..32u64 {
                idx.insert(i + 1, &cluster_point((i % 4) as f32 * 10.0, (i / 4) as f32 * 0.1));
            }
            idx
        };
        let a = build();
        let b = build();
        assert_eq!(a.centroids, b.centroids);
        for (la, lb) in a.lists.iter().zip(&b.lists) {
            assert_eq!(
                la.iter().map(|e| e.0).collect::<Vec<_>>(),
                lb.iter().map(|e| e.0).collect::<Vec<_>>()
            );
        }
    }

    #[test]
    fn test_probing_all_lists_is_exact() {
        let mut idx = IvfFlatIndex::new(config(4, 4), DistanceMetric::Euclidean);
        for i in 0..32u64 {
            idx.insert(i + 1, &cluster_point((i % 4) as f32 * 10.0, (i / 4) as f32 * 0.1));
        }
        let query = cluster_point(10.0, 0.0);
        let hits = idx.search(&query, 8, 0);
        assert_eq!(hits.len(), 8);
        // all 8 members of the cluster around 10.0 come first
        for (id, _) in &hits {
            assert_eq!((id - 1) % 4, 1, "id {id} belongs to the wrong cluster");
        }
    }

    #[test]
    fn test_retrain_threshold_on_growth() {
        let mut idx = IvfFlatIndex::new(config(4, 2), DistanceMetric::Euclidean);
        for i in 0..4u64 {
            idx.insert(i + 1, &cluster_point(i as f32, 0.0));
        }
        assert!(!idx.needs_retrain());
        for i in 4..8u64 {
            idx.insert(i + 1, &cluster_point(i as f32, 0.0));
        }
        assert!(idx.needs_retrain());
    }

    #[test]
    fn test_retrain_threshold_on_deletions() {
        let mut idx = IvfFlatIndex::new(config(8, 2), DistanceMetric::Euclidean);
        for i in 0..10u64 {
            idx.insert(i + 1, &cluster_point(i as f32, 0.0));
        }
        assert!(idx.is_trained());
        assert!(!idx.needs_retrain());
        idx.remove(1);
        idx.remove(2);
        assert!(idx.needs_retrain());
    }

    #[test]
    fn test_cosine_centroids_unit_length() {
        let mut idx = IvfFlatIndex::new(config(2, 1), DistanceMetric::Cosine);
        idx.insert(1, &[1.0, 0.0]);
        idx.insert(2, &[0.9, 0.1]);
        idx.insert(3, &[0.0, 1.0]);
        assert!(idx.is_trained());
        for c in &idx.centroids {
            let norm = crate::distance::norm(c);
            assert!((norm - 1.0).abs() < 1e-4, "centroid norm {norm}");
        }
    }

    #[test]
    fn test_remove_from_pending() {
        let mut idx = IvfFlatIndex::new(config(8, 2), DistanceMetric::Euclidean);
        idx.insert(1, &[0.0, 0.0]);
        idx.remove(1);
        assert_eq!(idx.len(), 0);
    }
}
