//! Cosine similarity between embedding vectors.

/// Errors that can occur while scoring two vectors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimilarityError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Compute cosine similarity between two vectors.
///
/// `a` is treated as the reference side when reporting a dimension mismatch.
/// Returns `0.0` when either vector has zero magnitude, so a zero vector is
/// maximally dissimilar to everything, itself included.
/// The result is clamped to `[-1.0, 1.0]`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, SimilarityError> {
    if a.len() != b.len() {
        return Err(SimilarityError::DimensionMismatch {
            expected: a.len(),
            got: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    let score = dot / (norm_a.sqrt() * norm_b.sqrt());
    Ok(score.clamp(-1.0, 1.0) as f32)
}
