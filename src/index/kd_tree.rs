//! KD-tree vector index (euclidean only).
//!
//! A balanced axis-aligned binary partition built by median split: the
//! splitting dimension at depth `d` is `d mod D`, ordered by the composite
//! key `(value, id)` so duplicate axis values still partition cleanly.
//! Search keeps a bounded max-heap of size k and prunes a subtree when the
//! perpendicular distance to the splitting hyperplane exceeds the current
//! k-th best.
//!
//! Deletions tombstone their node; the tree is rebuilt once tombstones pass
//! a quarter of its size. Insertions after build land in a linear buffer
//! that every search scans in full; the buffer spilling past √n also
//! triggers a rebuild.

use ordered_float::OrderedFloat;
use std::collections::{BinaryHeap, HashMap};
use tracing::debug;

use crate::config;
use crate::distance::euclidean_distance;
use crate::index::VectorSource;
use crate::record::RecordId;

#[derive(Debug)]
struct KdNode {
    id: RecordId,
    point: Vec<f32>,
    deleted: bool,
    left: Option<Box<KdNode>>,
    right: Option<Box<KdNode>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Location {
    Tree,
    Buffer,
}

/// Balanced euclidean KD-tree with tombstoned deletes and a linear insert
/// buffer.
#[derive(Debug, Default)]
pub struct KdTreeIndex {
    root: Option<Box<KdNode>>,
    dimension: usize,
    /// Nodes in the tree, tombstones included.
    tree_size: usize,
    tombstones: usize,
    buffer: Vec<(RecordId, Vec<f32>)>,
    locations: HashMap<RecordId, Location>,
}

impl KdTreeIndex {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live members (tree minus tombstones, plus buffer).
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// True if the index has no live members.
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Adds `(id, v)` to the insert buffer; replaces on duplicate id.
    pub fn insert(&mut self, id: RecordId, vector: &[f32]) {
        if self.locations.contains_key(&id) {
            self.remove(id);
        }
        if self.dimension == 0 {
            self.dimension = vector.len();
        }
        self.buffer.push((id, vector.to_vec()));
        self.locations.insert(id, Location::Buffer);
    }

    /// Tombstones a tree node or drops a buffer entry. No-op if absent.
    pub fn remove(&mut self, id: RecordId) {
        match self.locations.remove(&id) {
            Some(Location::Buffer) => {
                self.buffer.retain(|(bid, _)| *bid != id);
            }
            Some(Location::Tree) => {
                if mark_deleted(&mut self.root, id) {
                    self.tombstones += 1;
                }
            }
            None => {}
        }
    }

    /// Top-k by euclidean distance: pruned tree descent plus a full scan of
    /// the insert buffer. Ascending distance, ties by ascending id.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(RecordId, f32)> {
        if k == 0 {
            return Vec::new();
        }
        let mut heap: BinaryHeap<(OrderedFloat<f32>, RecordId)> =
            BinaryHeap::with_capacity(k + 1);
        if let Some(root) = &self.root {
            search_node(root, query, k, 0, self.dimension, &mut heap);
        }
        for (id, point) in &self.buffer {
            push_bounded(&mut heap, k, euclidean_distance(query, point), *id);
        }
        let mut hits: Vec<(RecordId, f32)> =
            heap.into_sorted_vec().into_iter().map(|(d, id)| (id, d.0)).collect();
        crate::index::sort_hits(&mut hits);
        hits
    }

    /// Rebuilds a balanced tree from the current live set; clears the
    /// buffer and all tombstones.
    pub fn rebuild(&mut self, source: &dyn VectorSource) {
        let points: Vec<(RecordId, Vec<f32>)> = source
            .live_vectors()
            .map(|(id, v)| (id, v.to_vec()))
            .collect();
        debug!(
            live = points.len(),
            tombstones = self.tombstones,
            buffered = self.buffer.len(),
            "rebuilding kd-tree"
        );
        self.dimension = points.first().map(|(_, v)| v.len()).unwrap_or(0);
        self.tree_size = points.len();
        self.tombstones = 0;
        self.buffer.clear();
        self.locations = points.iter().map(|(id, _)| (*id, Location::Tree)).collect();
        self.root = if self.dimension == 0 {
            None
        } else {
            build(points, 0, self.dimension)
        };
    }

    /// True once tombstones exceed a quarter of the tree or the buffer
    /// outgrows √n.
    pub fn needs_rebuild(&self) -> bool {
        if self.tree_size > 0
            && self.tombstones as f64
                > self.tree_size as f64 * config::KDTREE_TOMBSTONE_REBUILD_FRACTION
        {
            return true;
        }
        let live = self.len();
        live > 0 && self.buffer.len() as f64 > (live as f64).sqrt()
    }
}

/// Composite split key: axis value first, id as the duplicate-breaker.
fn key_cmp(a_val: f32, a_id: RecordId, b_val: f32, b_id: RecordId) -> std::cmp::Ordering {
    a_val
        .partial_cmp(&b_val)
        .unwrap_or(std::cmp::Ordering::Equal)
        .then(a_id.cmp(&b_id))
}

fn build(
    mut points: Vec<(RecordId, Vec<f32>)>,
    depth: usize,
    dimension: usize,
) -> Option<Box<KdNode>> {
    if points.is_empty() {
        return None;
    }
    let axis = depth % dimension;
    points.sort_unstable_by(|a, b| key_cmp(a.1[axis], a.0, b.1[axis], b.0));
    let median = points.len() / 2;
    let mut right_points = points.split_off(median);
    let (id, point) = right_points.remove(0);
    Some(Box::new(KdNode {
        id,
        point,
        deleted: false,
        left: build(points, depth + 1, dimension),
        right: build(right_points, depth + 1, dimension),
    }))
}

/// Traverses to the node holding `id` and tombstones it. Returns false when
/// the node is already tombstoned or missing.
fn mark_deleted(node: &mut Option<Box<KdNode>>, id: RecordId) -> bool {
    let Some(n) = node else {
        return false;
    };
    if n.id == id {
        if n.deleted {
            return false;
        }
        n.deleted = true;
        return true;
    }
    mark_deleted(&mut n.left, id) || mark_deleted(&mut n.right, id)
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

fn search_node(
    node: &KdNode,
    query: &[f32],
    k: usize,
    depth: usize,
    dimension: usize,
    heap: &mut BinaryHeap<(OrderedFloat<f32>, RecordId)>,
) {
    if !node.deleted {
        push_bounded(heap, k, euclidean_distance(query, &node.point), node.id);
    }
    let axis = depth % dimension;
    let diff = query[axis] - node.point[axis];
    let (near, far) = if diff < 0.0 {
        (&node.left, &node.right)
    } else {
        (&node.right, &node.left)
    };
    if let Some(child) = near {
        search_node(child, query, k, depth + 1, dimension, heap);
    }
    // Visit the far side only while the hyperplane is not provably farther
    // than the current k-th best.
    let worst = if heap.len() >= k {
        heap.peek().map_or(f32::MAX, |(d, _)| d.0)
    } else {
        f32::MAX
    };
    if diff.abs() <= worst {
        if let Some(child) = far {
            search_node(child, query, k, depth + 1, dimension, heap);
        }
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

    fn grid_source() -> MapSource {
        // 10×10 integer grid, ids 1..=100 in row-major order
        let mut map = BTreeMap::new();
        for x in 0..10 {
            for y in 0..10 {
                map.insert((x * 10 + y + 1) as RecordId, vec![x as f32, y as f32]);
            }
        }
        MapSource(map)
    }

    fn built_tree(source: &MapSource) -> KdTreeIndex {
        let mut idx = KdTreeIndex::new();
        idx.rebuild(source);
        idx
    }

    fn brute(source: &MapSource, query: &[f32], k: usize) -> Vec<(RecordId, f32)> {
        let mut all: Vec<(RecordId, f32)> = source
            .live_vectors()
            .map(|(id, v)| (id, euclidean_distance(query, v)))
            .collect();
        crate::index::sort_hits(&mut all);
        all.truncate(k);
        all
    }

    #[test]
    fn test_matches_brute_force_on_grid() {
        let source = grid_source();
        let idx = built_tree(&source);
        for query in [[4.2, 5.1], [0.0, 0.0], [9.9, 9.9], [5.0, 5.0]] {
            for k in [1, 3, 10] {
                assert_eq!(idx.search(&query, k), brute(&source, &query, k));
            }
        }
    }

    #[test]
    fn test_buffer_inserts_found() {
        let source = grid_source();
        let mut idx = built_tree(&source);
        idx.insert(500, &[4.2, 5.1]);
        let hits = idx.search(&[4.2, 5.1], 1);
        assert_eq!(hits[0].0, 500);
        assert!(hits[0].1.abs() < 1e-6);
    }

    #[test]
    fn test_tombstoned_node_excluded() {
        let source = grid_source();
        let mut idx = built_tree(&source);
        // (4,5) has id 4*10+5+1 = 46
        idx.remove(46);
        let hits = idx.search(&[4.0, 5.0], 1);
        assert_ne!(hits[0].0, 46);
        assert_eq!(idx.len(), 99);
    }

    #[test]
    fn test_rebuild_threshold_on_tombstones() {
        let source = grid_source();
        let mut idx = built_tree(&source);
        assert!(!idx.needs_rebuild());
        for id in 1..=26 {
            idx.remove(id);
        }
        assert!(idx.needs_rebuild());
    }

    #[test]
    fn test_rebuild_threshold_on_buffer() {
        let source = grid_source();
        let mut idx = built_tree(&source);
        for i in 0..11 {
            idx.insert(200 + i, &[i as f32, 0.0]);
        }
        // buffer 11 > sqrt(111)
        assert!(idx.needs_rebuild());
    }

    #[test]
    fn test_duplicate_insert_replaces() {
        let mut idx = KdTreeIndex::new();
        idx.insert(1, &[0.0, 0.0]);
        idx.insert(1, &[5.0, 5.0]);
        assert_eq!(idx.len(), 1);
        let hits = idx.search(&[5.0, 5.0], 1);
        assert!(hits[0].1.abs() < 1e-6);
    }

    #[test]
    fn test_duplicate_axis_values() {
        let mut map = BTreeMap::new();
        for id in 1..=20u64 {
            map.insert(id, vec![1.0, id as f32]);
        }
        let source = MapSource(map);
        let idx = built_tree(&source);
        assert_eq!(idx.search(&[1.0, 7.0], 3), brute(&source, &[1.0, 7.0], 3));
    }
}
