//! Distance kernels.
//!
//! All metrics return a distance where **lower is better**, so one ranking
//! rule holds across kernels. Dot product is negated for this reason;
//! consumers that need a similarity flip the sign at the boundary.
//!
//! Accumulation runs in f64 so results stay stable for dimensions up to
//! 10^4 with components up to 10^6 in magnitude.

use serde::{Deserialize, Serialize};

/// Distance metric used for vector similarity computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Cosine distance: `1 - cosine_similarity`. Range: \[0, 2\].
    Cosine,
    /// Euclidean (L2) distance. Range: \[0, ∞).
    Euclidean,
    /// Negative dot product: `-dot(a, b)`. Lower = higher similarity.
    Dot,
}

impl DistanceMetric {
    /// Compute the distance between two vectors of equal length.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        match self {
            DistanceMetric::Cosine => cosine_distance(a, b),
            DistanceMetric::Euclidean => euclidean_distance(a, b),
            DistanceMetric::Dot => -dot(a, b),
        }
    }
}

/// Dot product with f64 accumulation.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    let mut acc = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        acc += *x as f64 * *y as f64;
    }
    acc as f32
}

/// L2 norm with f64 accumulation.
pub fn norm(v: &[f32]) -> f32 {
    let mut acc = 0.0f64;
    for x in v {
        acc += *x as f64 * *x as f64;
    }
    acc.sqrt() as f32
}

/// Cosine distance: `1 - a·b / (‖a‖·‖b‖)`.
///
/// When either norm is zero the vectors are maximally dissimilar (1.0).
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot_acc = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (xf, yf) = (*x as f64, *y as f64);
        dot_acc += xf * yf;
        norm_a += xf * xf;
        norm_b += yf * yf;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    (1.0 - dot_acc / (norm_a.sqrt() * norm_b.sqrt())) as f32
}

/// Euclidean distance: `√Σ(aᵢ-bᵢ)²`.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut acc = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let d = *x as f64 - *y as f64;
        acc += d * d;
    }
    acc.sqrt() as f32
}

/// Returns `v` scaled to unit length. A zero vector is returned unchanged.
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let n = norm(v);
    if n == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / n).collect()
}
