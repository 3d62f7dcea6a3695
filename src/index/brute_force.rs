//! Exact brute-force vector index.
//!
//! Holds member ids only and scans vectors through the record store view,
//! keeping the partial top-k in a bounded max-heap. Results are exact for
//! any metric.

use ordered_float::OrderedFloat;
use std::collections::{BTreeSet, BinaryHeap};

use crate::distance::DistanceMetric;
use crate::index::VectorSource;
use crate::record::RecordId;

/// Exhaustive-scan index with a per-instance metric.
#[derive(Debug)]
pub struct BruteForceIndex {
    metric: DistanceMetric,
    ids: BTreeSet<RecordId>,
}

impl BruteForceIndex {
    /// Creates an empty index ranking by `metric`.
    pub fn new(metric: DistanceMetric) -> Self {
        Self {
            metric,
            ids: BTreeSet::new(),
        }
    }

    /// The metric this index ranks by.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True if the index has no members.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Adds an id; duplicate insertion is a no-op (the vector lives in the
    /// store).
    pub fn insert(&mut self, id: RecordId) {
        self.ids.insert(id);
    }

    /// Removes an id; no-op if absent.
    pub fn remove(&mut self, id: RecordId) {
        self.ids.remove(&id);
    }

    /// Scans every member, computing the metric distance to `query` and
    /// keeping the k best in a bounded max-heap. The optional predicate is
    /// intersected during the scan, so filtered searches stay exact without
    /// oversampling.
    ///
    /// Returns ascending distance, ties by ascending id.
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
        // Max-heap on (distance, id): the worst hit sits on top and is
        // evicted when a better one arrives.
        let mut heap: BinaryHeap<(OrderedFloat<f32>, RecordId)> =
            BinaryHeap::with_capacity(k + 1);
        for &id in &self.ids {
            if let Some(pred) = filter {
                if !pred(id) {
                    continue;
                }
            }
            let Some(vector) = source.vector(id) else {
                continue;
            };
            let dist = self.metric.distance(query, vector);
            heap.push((OrderedFloat(dist), id));
            if heap.len() > k {
                heap.pop();
            }
        }
        let mut hits: Vec<(RecordId, f32)> =
            heap.into_sorted_vec().into_iter().map(|(d, id)| (id, d.0)).collect();
        crate::index::sort_hits(&mut hits);
        hits
    }

    /// Re-synchronizes membership with the live set.
    pub fn rebuild(&mut self, source: &dyn VectorSource) {
        self.ids = source.live_vectors().map(|(id, _)| id).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn setup() -> (MapSource, BruteForceIndex) {
        let mut map = BTreeMap::new();
        map.insert(1, vec![0.0, 0.0]);
        map.insert(2, vec![1.0, 0.0]);
        map.insert(3, vec![2.0, 0.0]);
        map.insert(4, vec![3.0, 0.0]);
        let mut idx = BruteForceIndex::new(DistanceMetric::Euclidean);
        for id in map.keys() {
            idx.insert(*id);
        }
        (MapSource(map), idx)
    }

    #[test]
    fn test_exact_topk_ascending() {
        let (source, idx) = setup();
        let hits = idx.search(&source, &[0.1, 0.0], 2, None);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, 1);
        assert_eq!(hits[1].0, 2);
        assert!(hits[0].1 <= hits[1].1);
    }

    #[test]
    fn test_k_larger_than_size() {
        let (source, idx) = setup();
        let hits = idx.search(&source, &[0.0, 0.0], 10, None);
        assert_eq!(hits.len(), 4);
    }

    #[test]
    fn test_filter_intersected_during_scan() {
        let (source, idx) = setup();
        let odd = |id: RecordId| id % 2 == 1;
        let hits = idx.search(&source, &[0.0, 0.0], 2, Some(&odd));
        let ids: Vec<RecordId> = hits.iter().map(|h| h.0).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_tie_break_by_id() {
        let mut map = BTreeMap::new();
        map.insert(5, vec![1.0, 0.0]);
        map.insert(2, vec![-1.0, 0.0]);
        let mut idx = BruteForceIndex::new(DistanceMetric::Euclidean);
        idx.insert(5);
        idx.insert(2);
        let hits = idx.search(&MapSource(map), &[0.0, 0.0], 2, None);
        assert_eq!(hits[0].0, 2);
        assert_eq!(hits[1].0, 5);
    }

    #[test]
    fn test_remove_then_search() {
        let (source, mut idx) = setup();
        idx.remove(1);
        let hits = idx.search(&source, &[0.0, 0.0], 10, None);
        assert!(hits.iter().all(|h| h.0 != 1));
    }
}
