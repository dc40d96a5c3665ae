//! Chunk assembly: turning gap similarities into chunk boundaries.
//!
//! ## First Pass: Greedy Walk
//!
//! Walk the sentences left to right. After sentence `i`, cut if either:
//!
//! 1. `similarity[i] < threshold` and the open chunk has at least `min`
//!    sentences, or
//! 2. the open chunk has reached `max` sentences.
//!
//! When both the floor and the similarity condition hold at the same index,
//! the cut happens; eligibility favours splitting.
//!
//! ```text
//! min = 2, max = 4, threshold = 0.5
//!
//! Similarities:  0.9  0.3  0.8  0.9  0.9  0.9  0.2
//! Sentences:    S0 | S1 | S2 | S3 | S4 | S5 | S6 | S7
//!                       ↑               ↑
//!                  drop, size 2    forced, size 4
//!
//! Chunks: [S0 S1] [S2 S3 S4 S5] [S6 S7]
//! ```
//!
//! ## Second Pass: Merge
//!
//! Only the tail can end up below `min`. It is folded into its predecessor
//! unless that would exceed the merge limit (1.5 × `max` by default), in which
//! case it stands alone.
//!
//! ## Coherence
//!
//! Each chunk is scored by the mean similarity of the adjacent pairs strictly
//! inside it. A single sentence has no pairs and scores
//! [`SINGLETON_COHERENCE`].

use std::cmp::Ordering;
use std::ops::Range;

use crate::{Chunk, Sentence, SentenceBounds, SINGLETON_COHERENCE};

/// Builds chunks from sentences, gap similarities and a threshold.
#[derive(Debug, Clone, Copy)]
pub struct ChunkAssembler {
    bounds: SentenceBounds,
}

impl ChunkAssembler {
    /// Create an assembler with the given size limits.
    #[must_use]
    pub fn new(bounds: SentenceBounds) -> Self {
        Self { bounds }
    }

    /// The size limits in use.
    #[must_use]
    pub fn bounds(&self) -> SentenceBounds {
        self.bounds
    }

    /// First-pass boundaries: half-open sentence ranges covering `0..n`.
    ///
    /// `similarities` must hold `n - 1` gap scores.
    #[must_use]
    pub fn find_ranges(&self, similarities: &[f32], threshold: f32) -> Vec<Range<usize>> {
        let n = similarities.len() + 1;
        let mut ranges = Vec::with_capacity(self.estimate_chunks(n));
        let mut start = 0;

        for (gap, &sim) in similarities.iter().enumerate() {
            let size = gap + 1 - start;
            let cut = match self.bounds.fits(size) {
                Ordering::Less => false,
                Ordering::Equal => sim < threshold || size == self.bounds.max(),
                Ordering::Greater => true,
            };
            if cut {
                ranges.push(start..gap + 1);
                start = gap + 1;
            }
        }
        ranges.push(start..n);

        ranges
    }

    /// Merge undersized chunks into their predecessor where the merge limit allows.
    #[must_use]
    pub fn merge_small(&self, ranges: Vec<Range<usize>>) -> Vec<Range<usize>> {
        let mut merged: Vec<Range<usize>> = Vec::with_capacity(ranges.len());

        for range in ranges {
            let size = range.len();
            match merged.last_mut() {
                Some(prev)
                    if self.bounds.fits(size) == Ordering::Less
                        && !self.bounds.would_overflow(prev.len(), size) =>
                {
                    prev.end = range.end;
                }
                _ => merged.push(range),
            }
        }

        merged
    }

    /// Run both passes and build scored chunks.
    ///
    /// `similarities[i]` is the score between `sentences[i]` and
    /// `sentences[i + 1]`.
    ///
    /// # Panics
    ///
    /// Panics if `similarities.len() + 1 != sentences.len()` for a non-empty
    /// sentence slice.
    #[must_use]
    pub fn assemble(&self, sentences: &[Sentence], similarities: &[f32], threshold: f32) -> Vec<Chunk> {
        if sentences.is_empty() {
            return vec![];
        }
        assert_eq!(
            similarities.len() + 1,
            sentences.len(),
            "need exactly one similarity per gap"
        );

        let first_pass = self.find_ranges(similarities, threshold);
        let first_count = first_pass.len();
        let ranges = self.merge_small(first_pass);
        if ranges.len() != first_count {
            tracing::debug!(
                before = first_count,
                after = ranges.len(),
                "merged undersized chunks"
            );
        }

        ranges
            .into_iter()
            .enumerate()
            .map(|(index, range)| {
                let coherence = coherence(similarities, range.clone());
                Chunk::from_sentences(index, &sentences[range], coherence)
            })
            .collect()
    }

    /// Rough chunk count for `n` sentences, for pre-allocation.
    #[must_use]
    pub fn estimate_chunks(&self, n: usize) -> usize {
        (n / self.bounds.max()).max(1)
    }
}

/// Mean similarity of the gaps strictly inside a sentence range.
///
/// ```rust
/// use cleave::coherence;
///
/// let sims = [0.9, 0.7, 0.1, 0.5];
/// assert!((coherence(&sims, 0..3) - 0.8).abs() < 1e-6);
/// assert_eq!(coherence(&sims, 2..3), 1.0);
/// ```
#[must_use]
pub fn coherence(similarities: &[f32], range: Range<usize>) -> f32 {
    if range.len() < 2 {
        return SINGLETON_COHERENCE;
    }
    let inner = &similarities[range.start..range.end - 1];
    inner.iter().sum::<f32>() / inner.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment;

    fn assembler(min: usize, max: usize) -> ChunkAssembler {
        ChunkAssembler::new(SentenceBounds::new(min, max).unwrap())
    }

    fn sentences(n: usize) -> Vec<Sentence> {
        let text: String = (0..n).map(|i| format!("Line {i} here. ")).collect();
        segment(&text)
    }

    #[test]
    fn test_doc_example() {
        let sims = [0.9, 0.3, 0.8, 0.9, 0.9, 0.9, 0.2];
        let ranges = assembler(2, 4).find_ranges(&sims, 0.5);
        assert_eq!(ranges, vec![0..2, 2..6, 6..8]);
    }

    #[test]
    fn test_no_cut_below_floor() {
        let sims = [0.1, 0.1, 0.1, 0.1, 0.1];
        let ranges = assembler(3, 10).find_ranges(&sims, 0.5);
        assert_eq!(ranges, vec![0..3, 3..6]);
    }

    #[test]
    fn test_cut_at_exact_floor() {
        // Floor and drop satisfied at the same gap: cut.
        let sims = [0.9, 0.9, 0.1, 0.9, 0.9];
        let ranges = assembler(3, 10).find_ranges(&sims, 0.5);
        assert_eq!(ranges, vec![0..3, 3..6]);
    }

    #[test]
    fn test_threshold_is_strict() {
        let sims = [0.9, 0.5, 0.9];
        let ranges = assembler(1, 10).find_ranges(&sims, 0.5);
        assert_eq!(ranges, vec![0..4]);
    }

    #[test]
    fn test_forced_cut_at_max() {
        let sims = vec![0.99; 9];
        let ranges = assembler(1, 4).find_ranges(&sims, 0.1);
        assert_eq!(ranges, vec![0..4, 4..8, 8..10]);
    }

    #[test]
    fn test_min_equals_max() {
        let sims = vec![0.99; 6];
        let ranges = assembler(3, 3).find_ranges(&sims, 0.1);
        assert_eq!(ranges, vec![0..3, 3..6, 6..7]);
    }

    #[test]
    fn test_merge_absorbs_small_tail() {
        let merged = assembler(3, 4).merge_small(vec![0..4, 4..8, 8..10]);
        assert_eq!(merged, vec![0..4, 4..10]);
    }

    #[test]
    fn test_bounds_report_merge_limit() {
        let a = assembler(2, 4);
        assert_eq!(a.bounds(), SentenceBounds::new(2, 4).unwrap());
        assert_eq!(a.bounds().merge_limit(), 6);
    }

    #[test]
    fn test_merge_respects_limit() {
        // 4 + 3 = 7 > floor(4 * 1.5) = 6: tail stands alone.
        let merged = assembler(4, 4).merge_small(vec![0..4, 4..7]);
        assert_eq!(merged, vec![0..4, 4..7]);
    }

    #[test]
    fn test_merge_keeps_lone_small_chunk() {
        let merged = assembler(5, 10).merge_small(vec![0..2]);
        assert_eq!(merged, vec![0..2]);
    }

    #[test]
    fn test_assemble_scores_coherence() {
        let s = sentences(4);
        let sims = [0.8, 0.1, 0.6];
        let chunks = assembler(1, 10).assemble(&s, &sims, 0.5);

        assert_eq!(chunks.len(), 2);
        assert!((chunks[0].coherence - 0.8).abs() < 1e-6);
        assert!((chunks[1].coherence - 0.6).abs() < 1e-6);
        assert_eq!(chunks[1].index, 1);
    }

    #[test]
    fn test_assemble_single_sentence() {
        let s = sentences(1);
        let chunks = assembler(3, 10).assemble(&s, &[], 0.5);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].coherence, SINGLETON_COHERENCE);
    }

    #[test]
    fn test_assemble_empty() {
        assert!(assembler(3, 10).assemble(&[], &[], 0.5).is_empty());
    }

    #[test]
    #[should_panic]
    fn test_assemble_rejects_wrong_gap_count() {
        let s = sentences(3);
        let _ = assembler(1, 10).assemble(&s, &[0.5], 0.5);
    }
}
