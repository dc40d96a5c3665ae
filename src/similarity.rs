//! Boundary scoring: similarity between adjacent sentences.
//!
//! Adjacent sentences about the same topic have similar embeddings.
//! When the topic changes, similarity drops.
//!
//! ```text
//! Sentences:    [S1]  [S2]  [S3]  [S4]  [S5]
//! Gaps:             0     1     2     3
//! Similarities:   0.9  0.85   0.3   0.8
//!                             ↑
//!                        Topic shift!
//! ```
//!
//! N sentences always produce exactly N - 1 gap scores.

/// Compute cosine similarity between two embeddings.
///
/// Zero vectors have no direction; their similarity to anything is 0.0.
/// Non-finite components yield NaN rather than a plausible score.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    #[cfg(feature = "simd")]
    {
        innr::cosine(a, b)
    }

    #[cfg(not(feature = "simd"))]
    {
        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
    }
}

/// Similarity of every adjacent pair: `out[i] = cosine(embeddings[i], embeddings[i + 1])`.
///
/// Fewer than two embeddings yield an empty vector.
///
/// ```rust
/// use cleave::adjacent_similarities;
///
/// let embeddings = vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]];
/// let sims = adjacent_similarities(&embeddings);
/// assert_eq!(sims.len(), 2);
/// assert!((sims[0] - 1.0).abs() < 1e-6);
/// assert!(sims[1].abs() < 1e-6);
/// ```
#[must_use]
pub fn adjacent_similarities(embeddings: &[Vec<f32>]) -> Vec<f32> {
    embeddings
        .windows(2)
        .map(|pair| cosine_similarity(&pair[0], &pair[1]))
        .collect()
}
