/// Cosine similarity in `[-1, 1]`. Mismatched dimensions, zero vectors and
/// vectors carrying NaN or infinite components yield 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        tracing::warn!(
            a_len = a.len(),
            b_len = b.len(),
            "embedding dimension mismatch; returning zero similarity"
        );
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let similarity = dot / (norm_a * norm_b);
    if !similarity.is_finite() {
        return 0.0;
    }

    similarity.clamp(-1.0, 1.0)
}

/// Maps a cosine similarity onto the 0-100 compatibility scale.
pub fn similarity_to_score(similarity: f32) -> f64 {
    let similarity = f64::from(similarity).clamp(-1.0, 1.0);
    (similarity + 1.0) / 2.0 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_returns_one_for_identical_vectors() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]);
        assert!((sim - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn cosine_similarity_is_negative_for_opposite_vectors() {
        let sim = cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]);
        assert!((sim + 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn cosine_similarity_handles_zero_vectors() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn cosine_similarity_returns_zero_on_dimension_mismatch() {
        assert_eq!(cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn cosine_similarity_is_zero_for_non_finite_components() {
        assert_eq!(cosine_similarity(&[f32::NAN, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[f32::NAN, f32::NAN]), 0.0);
        assert_eq!(cosine_similarity(&[f32::INFINITY, 1.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn score_mapping_is_monotonic_and_bounded() {
        assert_eq!(similarity_to_score(-1.0), 0.0);
        assert_eq!(similarity_to_score(0.0), 50.0);
        assert_eq!(similarity_to_score(1.0), 100.0);
        assert!(similarity_to_score(0.2) < similarity_to_score(0.3));
        assert_eq!(similarity_to_score(1.5), 100.0);
    }
}
