//! Shared helpers for embedding backends.

/// L2-normalize a vector in place.
///
/// Zero vectors are returned unchanged. Normalized vectors make cosine
/// distance and inner product interchangeable in the index.
pub fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}
