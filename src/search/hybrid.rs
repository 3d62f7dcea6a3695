//! Hybrid score fusion.
//!
//! Combines a vector hit list (distances, lower is better) and a text hit
//! list (BM25 scores, higher is better) into a single ranking. Each side is
//! first converted to a similarity in [0, 1]: distances through a
//! metric-specific map, BM25 through min-max normalization over the
//! candidate set. The fused score is `w · sim_vec + (1 − w) · sim_text`,
//! with a record missing from one list contributing 0 on that side.

use std::collections::HashMap;

use crate::distance::DistanceMetric;
use crate::fulltext::scorer::top_k_desc;
use crate::record::RecordId;

/// Maps a metric distance onto a similarity in [0, 1].
///
/// Euclidean uses `1/(1+d)`; cosine uses `1−d` clipped; dot uses the
/// logistic of the (un-negated) dot product.
pub fn distance_to_similarity(metric: DistanceMetric, distance: f32) -> f32 {
    match metric {
        DistanceMetric::Euclidean => 1.0 / (1.0 + distance),
        DistanceMetric::Cosine => (1.0 - distance).clamp(0.0, 1.0),
        // distance = -(a·b), so σ(a·b) = 1/(1 + e^distance)
        DistanceMetric::Dot => 1.0 / (1.0 + distance.exp()),
    }
}

/// Fuses vector and text hits with weight `w` on the vector side.
///
/// Returns up to `k` (id, fused score) pairs in descending score, ties by
/// ascending id.
pub fn fuse(
    vector_hits: &[(RecordId, f32)],
    metric: DistanceMetric,
    text_hits: &[(RecordId, f32)],
    weight: f32,
    k: usize,
) -> Vec<(RecordId, f32)> {
    let mut scores: HashMap<RecordId, f32> =
        HashMap::with_capacity(vector_hits.len() + text_hits.len());

    for &(id, distance) in vector_hits {
        *scores.entry(id).or_insert(0.0) += weight * distance_to_similarity(metric, distance);
    }

    if let Some((min_s, max_s)) = min_max(text_hits) {
        let range = max_s - min_s;
        for &(id, score) in text_hits {
            let norm = if range < f32::EPSILON {
                1.0
            } else {
                (score - min_s) / range
            };
            *scores.entry(id).or_insert(0.0) += (1.0 - weight) * norm;
        }
    }

    top_k_desc(scores, k)
}

/// Single-pass min/max computation.
fn min_max(hits: &[(RecordId, f32)]) -> Option<(f32, f32)> {
    if hits.is_empty() {
        return None;
    }
    let mut min = f32::MAX;
    let mut max = f32::MIN;
    for &(_, s) in hits {
        if s < min {
            min = s;
        }
        if s > max {
            max = s;
        }
    }
    Some((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity_euclidean() {
        assert_eq!(distance_to_similarity(DistanceMetric::Euclidean, 0.0), 1.0);
        assert_eq!(distance_to_similarity(DistanceMetric::Euclidean, 1.0), 0.5);
    }

    #[test]
    fn test_similarity_cosine_clipped() {
        assert_eq!(distance_to_similarity(DistanceMetric::Cosine, 0.0), 1.0);
        assert_eq!(distance_to_similarity(DistanceMetric::Cosine, 2.0), 0.0);
    }

    #[test]
    fn test_similarity_dot_logistic() {
        // distance -(a·b) = 0 → σ(0) = 0.5
        assert!((distance_to_similarity(DistanceMetric::Dot, 0.0) - 0.5).abs() < 1e-6);
        // strongly positive dot product → similarity near 1
        assert!(distance_to_similarity(DistanceMetric::Dot, -10.0) > 0.99);
    }

    #[test]
    fn test_weight_one_is_pure_vector_order() {
        let vector = vec![(1, 0.1), (2, 0.5), (3, 0.9)];
        let text = vec![(3, 10.0), (2, 5.0)];
        let fused = fuse(&vector, DistanceMetric::Cosine, &text, 1.0, 3);
        let ids: Vec<RecordId> = fused.iter().map(|h| h.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_weight_zero_is_pure_text_order() {
        let vector = vec![(1, 0.1), (2, 0.5), (3, 0.9)];
        let text = vec![(3, 10.0), (2, 5.0), (1, 1.0)];
        let fused = fuse(&vector, DistanceMetric::Cosine, &text, 0.0, 3);
        let ids: Vec<RecordId> = fused.iter().map(|h| h.0).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn test_missing_side_contributes_zero() {
        let vector = vec![(1, 0.0)];
        let text = vec![(2, 4.0), (3, 2.0)];
        let fused = fuse(&vector, DistanceMetric::Cosine, &text, 0.5, 3);
        // id 1: 0.5·1.0 = 0.5; id 2: 0.5·1.0 = 0.5; id 3: 0.5·0.0 = 0.0
        assert_eq!(fused[0].0, 1, "tie broken by ascending id");
        assert_eq!(fused[1].0, 2);
        assert_eq!(fused[2].0, 3);
    }

    #[test]
    fn test_constant_text_scores_normalize_to_one() {
        let text = vec![(1, 3.0), (2, 3.0)];
        let fused = fuse(&[], DistanceMetric::Cosine, &text, 0.0, 2);
        assert!((fused[0].1 - 1.0).abs() < 1e-6);
        assert!((fused[1].1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_truncates_to_k() {
        let vector: Vec<(RecordId, f32)> = (1..=20).map(|i| (i, i as f32 * 0.01)).collect();
        let fused = fuse(&vector, DistanceMetric::Cosine, &[], 1.0, 5);
        assert_eq!(fused.len(), 5);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(fuse(&[], DistanceMetric::Cosine, &[], 0.5, 10).is_empty());
    }
}
