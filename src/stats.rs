//! Summary statistics over a document's chunks.

use serde::Serialize;

use crate::Chunk;

/// Shape and quality of one document's chunking.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChunkStats {
    /// Number of chunks.
    pub num_chunks: usize,
    /// Mean chunk coherence.
    pub avg_coherence: f32,
    /// Lowest chunk coherence.
    pub min_coherence: f32,
    /// Highest chunk coherence.
    pub max_coherence: f32,
    /// Mean sentences per chunk.
    pub avg_sentences: f32,
    /// Mean characters per chunk.
    pub avg_chars: f32,
    /// Characters across all chunks (overlapping text counts twice).
    pub total_chars: usize,
    /// Sentence count of each chunk, in order.
    pub sentence_distribution: Vec<usize>,
}

impl ChunkStats {
    /// Compute statistics for a chunk list. Empty input gives all zeros.
    ///
    /// ```rust
    /// use cleave::{ChunkStats, Chunker, FixedChunker};
    ///
    /// let chunks = FixedChunker::no_overlap(2).chunk("One. Two. Three.");
    /// let stats = ChunkStats::from_chunks(&chunks);
    /// assert_eq!(stats.num_chunks, 2);
    /// assert_eq!(stats.sentence_distribution, vec![2, 1]);
    /// ```
    #[must_use]
    pub fn from_chunks(chunks: &[Chunk]) -> Self {
        if chunks.is_empty() {
            return Self::default();
        }

        let n = chunks.len() as f32;
        let coherences = chunks.iter().map(|c| c.coherence);
        let sentence_distribution: Vec<usize> = chunks.iter().map(Chunk::sentence_count).collect();
        let total_chars: usize = chunks.iter().map(|c| c.char_count).sum();

        Self {
            num_chunks: chunks.len(),
            avg_coherence: coherences.clone().sum::<f32>() / n,
            min_coherence: coherences.clone().fold(f32::INFINITY, f32::min),
            max_coherence: coherences.fold(f32::NEG_INFINITY, f32::max),
            avg_sentences: sentence_distribution.iter().sum::<usize>() as f32 / n,
            avg_chars: total_chars as f32 / n,
            total_chars,
            sentence_distribution,
        }
    }
}
