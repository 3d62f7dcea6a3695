//! Locality-sensitive hashing index (cosine only).
//!
//! Each of `n_tables` hash tables carries `n_bits` random hyperplanes drawn
//! from a standard normal distribution with a seeded RNG. A vector's
//! signature in a table is the packed sign bits of its hyperplane dot
//! products; vectors sharing a full signature land in the same bucket.
//!
//! Queries union the matching buckets across all tables and rerank the pool
//! exactly with cosine distance. A pool smaller than k falls back to a
//! brute-force pass over the whole set, merged into the candidates.

use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, BinaryHeap, HashMap};
use tracing::debug;

use crate::config;
use crate::distance::{cosine_distance, dot};
use crate::index::VectorSource;
use crate::record::RecordId;

/// LSH runtime parameters. The seed makes hyperplane sampling deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LshConfig {
    /// Number of hash tables.
    pub n_tables: usize,
    /// Hyperplane bits per table (at most 64; signatures pack into a u64).
    pub n_bits: usize,
    /// RNG seed for hyperplane sampling.
    pub seed: u64,
}

impl Default for LshConfig {
    fn default() -> Self {
        Self {
            n_tables: config::LSH_DEFAULT_N_TABLES,
            n_bits: config::LSH_DEFAULT_N_BITS,
            seed: config::DEFAULT_RNG_SEED,
        }
    }
}

/// Random-hyperplane LSH over cosine distance.
#[derive(Debug)]
pub struct LshIndex {
    config: LshConfig,
    dimension: usize,
    /// Per table: a flat `n_bits × dimension` hyperplane matrix.
    hyperplanes: Vec<Vec<f32>>,
    /// Per table: signature → member ids.
    buckets: Vec<HashMap<u64, Vec<RecordId>>>,
    /// Vector copies for exact reranking and the brute-force fallback.
    vectors: HashMap<RecordId, Vec<f32>>,
}

impl LshIndex {
    /// Creates an empty index, sampling all hyperplanes up front from the
    /// configured seed.
    pub fn new(config: LshConfig, dimension: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let hyperplanes = (0..config.n_tables)
            .map(|_| {
                (0..config.n_bits * dimension)
                    .map(|_| rng.sample(StandardNormal))
                    .collect()
            })
            .collect();
        let buckets = (0..config.n_tables).map(|_| HashMap::new()).collect();
        Self {
            config,
            dimension,
            hyperplanes,
            buckets,
            vectors: HashMap::new(),
        }
    }

    /// Number of live members.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// True if the index has no live members.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Packed sign bits of `v` against table `t`'s hyperplanes.
    fn signature(&self, table: usize, v: &[f32]) -> u64 {
        let planes = &self.hyperplanes[table];
        let mut sig = 0u64;
        for bit in 0..self.config.n_bits {
            let h = &planes[bit * self.dimension..(bit + 1) * self.dimension];
            if dot(h, v) >= 0.0 {
                sig |= 1u64 << bit;
            }
        }
        sig
    }

    /// Adds `(id, v)` to every table's bucket; replaces on duplicate id.
    pub fn insert(&mut self, id: RecordId, vector: &[f32]) {
        if self.vectors.contains_key(&id) {
            self.remove(id);
        }
        for table in 0..self.config.n_tables {
            let sig = self.signature(table, vector);
            self.buckets[table].entry(sig).or_default().push(id);
        }
        self.vectors.insert(id, vector.to_vec());
    }

    /// Removes `id` from every table. No-op if absent.
    pub fn remove(&mut self, id: RecordId) {
        let Some(vector) = self.vectors.remove(&id) else {
            return;
        };
        for table in 0..self.config.n_tables {
            let sig = self.signature(table, &vector);
            if let Some(ids) = self.buckets[table].get_mut(&sig) {
                ids.retain(|&bid| bid != id);
                if ids.is_empty() {
                    self.buckets[table].remove(&sig);
                }
            }
        }
    }

    /// Top-k by exact cosine distance over the bucket-candidate pool, with
    /// brute-force fallback when the pool comes up short of k. Ascending
    /// distance, ties by ascending id.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(RecordId, f32)> {
        if k == 0 {
            return Vec::new();
        }
        let mut candidates: BTreeSet<RecordId> = BTreeSet::new();
        for table in 0..self.config.n_tables {
            let sig = self.signature(table, query);
            if let Some(ids) = self.buckets[table].get(&sig) {
                candidates.extend(ids.iter().copied());
            }
        }
        if candidates.len() < k {
            debug!(
                pool = candidates.len(),
                k, "lsh candidate pool short, merging brute-force scan"
            );
            candidates.extend(self.vectors.keys().copied());
        }
        let mut heap: BinaryHeap<(OrderedFloat<f32>, RecordId)> =
            BinaryHeap::with_capacity(k + 1);
        for id in candidates {
            if let Some(v) = self.vectors.get(&id) {
                heap.push((OrderedFloat(cosine_distance(query, v)), id));
                if heap.len() > k {
                    heap.pop();
                }
            }
        }
        let mut hits: Vec<(RecordId, f32)> =
            heap.into_sorted_vec().into_iter().map(|(d, id)| (id, d.0)).collect();
        crate::index::sort_hits(&mut hits);
        hits
    }

    /// Re-buckets the current live set, keeping the sampled hyperplanes.
    pub fn rebuild(&mut self, source: &dyn VectorSource) {
        self.buckets = (0..self.config.n_tables).map(|_| HashMap::new()).collect();
        self.vectors.clear();
        let live: Vec<(RecordId, Vec<f32>)> = source
            .live_vectors()
            .map(|(id, v)| (id, v.to_vec()))
            .collect();
        for (id, v) in live {
            self.insert(id, &v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::normalize;

    fn config(n_tables: usize, n_bits: usize) -> LshConfig {
        LshConfig {
            n_tables,
            n_bits,
            seed: 42,
        }
    }

    fn unit_vectors(n: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                let v: Vec<f32> = (0..dim).map(|_| rng.sample::<f32, _>(StandardNormal)).collect();
                normalize(&v)
            })
            .collect()
    }

    #[test]
    fn test_identical_vector_always_found() {
        let mut idx = LshIndex::new(config(8, 8), 16);
        let vectors = unit_vectors(100, 16, 7);
        for (i, v) in vectors.iter().enumerate() {
            idx.insert(i as RecordId + 1, v);
        }
        // a stored vector shares every full signature with itself
        let hits = idx.search(&vectors[10], 1);
        assert_eq!(hits[0].0, 11);
        assert!(hits[0].1.abs() < 1e-5);
    }

    #[test]
    fn test_fallback_when_pool_short() {
        let mut idx = LshIndex::new(config(2, 16), 8);
        let vectors = unit_vectors(20, 8, 9);
        for (i, v) in vectors.iter().enumerate() {
            idx.insert(i as RecordId + 1, v);
        }
        // 16 bits over 20 vectors → buckets are tiny; k near the full set
        // exercises the merge path
        let hits = idx.search(&vectors[0], 20);
        assert_eq!(hits.len(), 20);
    }

    #[test]
    fn test_remove_purges_buckets() {
        let mut idx = LshIndex::new(config(4, 8), 8);
        let vectors = unit_vectors(10, 8, 3);
        for (i, v) in vectors.iter().enumerate() {
            idx.insert(i as RecordId + 1, v);
        }
        idx.remove(5);
        assert_eq!(idx.len(), 9);
        let hits = idx.search(&vectors[4], 10);
        assert!(hits.iter().all(|h| h.0 != 5));
    }

    #[test]
    fn test_deterministic_hyperplanes() {
        let a = LshIndex::new(config(4, 8), 8);
        let b = LshIndex::new(config(4, 8), 8);
        assert_eq!(a.hyperplanes, b.hyperplanes);
    }

    #[test]
    fn test_duplicate_insert_replaces() {
        let mut idx = LshIndex::new(config(4, 8), 4);
        idx.insert(1, &normalize(&[1.0, 0.0, 0.0, 0.0]));
        idx.insert(1, &normalize(&[0.0, 1.0, 0.0, 0.0]));
        assert_eq!(idx.len(), 1);
        let hits = idx.search(&[0.0, 1.0, 0.0, 0.0], 1);
        assert!(hits[0].1.abs() < 1e-5);
    }

    #[test]
    fn test_recall_against_exact_on_unit_sphere() {
        let mut idx = LshIndex::new(config(8, 16), 32);
        let vectors = unit_vectors(500, 32, 11);
        for (i, v) in vectors.iter().enumerate() {
            idx.insert(i as RecordId + 1, v);
        }
        let queries = unit_vectors(20, 32, 99);
        let mut recall_sum = 0.0f64;
        for q in &queries {
            let mut exact: Vec<(RecordId, f32)> = vectors
                .iter()
                .enumerate()
                .map(|(i, v)| (i as RecordId + 1, cosine_distance(q, v)))
                .collect();
            crate::index::sort_hits(&mut exact);
            let truth: BTreeSet<RecordId> = exact.iter().take(10).map(|h| h.0).collect();
            let got: BTreeSet<RecordId> = idx.search(q, 10).iter().map(|h| h.0).collect();
            recall_sum += truth.intersection(&got).count() as f64 / 10.0;
        }
        let recall = recall_sum / queries.len() as f64;
        assert!(recall >= 0.7, "lsh recall@10 too low: {recall}");
    }

    #[test]
    fn test_rebuild_rebuckets_live_set() {
        use std::collections::BTreeMap;
        struct MapSource(BTreeMap<RecordId, Vec<f32>>);
        impl VectorSource for MapSource {
            fn vector(&self, id: RecordId) -> Option<&[f32]> {
                self.0.get(&id).map(|v| v.as_slice())
            }
            fn live_vectors(&self) -> Box<dyn Iterator<Item = (RecordId, &[f32])> + '_> {
                Box::new(self.0.iter().map(|(id, v)| (*id, v.as_slice())))
            }
            fn live_len(&self) -> usize {
                self.0.len()
            }
        }
        let mut idx = LshIndex::new(config(4, 8), 4);
        idx.insert(99, &[1.0, 0.0, 0.0, 0.0]);
        let mut map = BTreeMap::new();
        map.insert(1u64, vec![0.0, 1.0, 0.0, 0.0]);
        idx.rebuild(&MapSource(map));
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.search(&[0.0, 1.0, 0.0, 0.0], 1)[0].0, 1);
    }
}
