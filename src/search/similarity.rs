type Float = f32;

/// Cosine similarity of two vectors, computed in `f64`.
///
/// Returns 0.0 when either vector is empty, has zero norm, or the two
/// lengths differ.
pub fn cosine_similarity(a: &[Float], b: &[Float]) -> f64 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x64, y64) = (f64::from(x), f64::from(y));
        dot += x64 * y64;
        norm_a += x64 * x64;
        norm_b += y64 * y64;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    dot / denom
}

/// Highest similarity between `candidate` and any of `previous`; 0.0 when
/// there is nothing to compare against.
pub fn max_similarity(candidate: &[Float], previous: &[&[Float]]) -> f64 {
    previous
        .iter()
        .map(|prev| cosine_similarity(candidate, prev))
        .fold(None, |best: Option<f64>, sim| Some(best.map_or(sim, |b| b.max(sim))))
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_empty_vector_is_zero() {
        assert_eq!(cosine_similarity(&[], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[]), 0.0);
    }

    #[test]
    fn test_cosine_length_mismatch_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0, 5.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_cosine_zero_norm_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_cosine_known_values() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-12);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-12);
        assert!((cosine_similarity(&[1.0, 0.0], &[-2.0, 0.0]) + 1.0).abs() < 1e-12);
        // 3*4 / (5 * 5)
        assert!((cosine_similarity(&[3.0, 4.0], &[4.0, 3.0]) - 0.96).abs() < 1e-9);
    }

    #[test]
    fn test_max_similarity_picks_closest_previous() {
        let a: &[f32] = &[1.0, 0.0];
        let b: &[f32] = &[0.0, 1.0];
        let candidate = [0.6, 0.8];
        assert!((max_similarity(&candidate, &[a, b]) - 0.8).abs() < 1e-6);
        assert_eq!(max_similarity(&candidate, &[]), 0.0);
    }

    #[test]
    fn test_max_similarity_keeps_negative_best() {
        let a: &[f32] = &[-1.0, 0.0];
        assert!((max_similarity(&[1.0, 0.0], &[a]) + 1.0).abs() < 1e-12);
    }
}
