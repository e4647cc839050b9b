//! Similarity computation for embeddings.

use ordered_float::OrderedFloat;

use crate::error::{Result, StoreError};

/// Compute the cosine similarity between two embeddings.
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 means identical direction
/// - 0.0 means orthogonal vectors (or a zero vector on either side)
/// - -1.0 means opposite vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(StoreError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot_product / (magnitude_a * magnitude_b))
}

/// Find the `k` candidates most similar to `query`.
///
/// Results are ordered by descending score; equal scores are ordered by
/// ascending key, so callers control tie-breaking through the key type.
pub fn find_top_k<'a, K>(
    query: &[f32],
    candidates: impl IntoIterator<Item = (K, &'a [f32])>,
    k: usize,
) -> Result<Vec<(K, f32)>>
where
    K: Ord,
{
    if k == 0 {
        return Ok(Vec::new());
    }

    let mut scored: Vec<(OrderedFloat<f32>, K)> = Vec::new();
    for (key, embedding) in candidates {
        let score = cosine_similarity(query, embedding)?;
        scored.push((OrderedFloat(score), key));
    }

    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    scored.truncate(k);

    Ok(scored.into_iter().map(|(score, key)| (key, score.0)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cosine_similarity_identical() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]).unwrap();
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[-1.0, 0.0, 0.0]).unwrap();
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_vector_scores_zero() {
        let sim = cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).unwrap();
        assert_eq!(sim, 0.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        assert!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn test_find_top_k_orders_by_score_then_key() {
        let a = [1.0, 0.0, 0.0];
        let b = [0.0, 1.0, 0.0];
        let c = [0.7, 0.7, 0.0];
        let a_twin = [2.0, 0.0, 0.0];
        let candidates = vec![
            (3, &b[..]),
            (2, &a_twin[..]),
            (1, &c[..]),
            (0, &a[..]),
        ];

        let results = find_top_k(&[1.0, 0.0, 0.0], candidates, 3).unwrap();
        let keys: Vec<i32> = results.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![0, 2, 1]);
    }

    #[test]
    fn test_find_top_k_zero() {
        let a = [1.0];
        let results = find_top_k(&[1.0], vec![(0, &a[..])], 0).unwrap();
        assert!(results.is_empty());
    }
}
