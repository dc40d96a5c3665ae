//! Fixed-size fallback chunking and the guard that decides when to use it.
//!
//! ## Fixed Sentence Windows
//!
//! The fallback needs no embeddings and cannot fail: it groups `window`
//! sentences per chunk, with `overlap` sentences shared between neighbours.
//!
//! ```text
//! window = 4, overlap = 1
//!
//! Sentences: S0 S1 S2 S3 S4 S5 S6 S7 S8
//!
//! Chunk 0:   S0 S1 S2 S3
//! Chunk 1:            S3 S4 S5 S6       <- starts at 4 - 1 = 3
//! Chunk 2:                     S6 S7 S8 <- final chunk may be shorter
//! ```
//!
//! Every sentence lands in at least one chunk. With `overlap = 0` the chunks
//! partition the document exactly.
//!
//! ## The Guard
//!
//! The semantic path returns `Result<Vec<Chunk>, ChunkingFailure>`. The guard
//! checks successful output against a chunk-count ceiling and replaces any
//! failure, or any output outside the ceiling, with fixed windows.

use crate::{segment, Chunk, ChunkingFailure, Chunker, Sentence, UNMEASURED_COHERENCE};

/// Fixed-size chunker over sentences with configurable overlap.
///
/// ## Example
///
/// ```rust
/// use cleave::{Chunker, FixedChunker};
///
/// let chunker = FixedChunker::new(2, 0);
/// let chunks = chunker.chunk("One. Two. Three. Four. Five.");
///
/// assert_eq!(chunks.len(), 3);
/// assert_eq!(chunks[0].text, "One. Two.");
/// assert_eq!(chunks[2].text, "Five.");
/// ```
#[derive(Debug, Clone)]
pub struct FixedChunker {
    window: usize,
    overlap: usize,
}

impl FixedChunker {
    /// Create a new fixed-size chunker.
    ///
    /// # Arguments
    ///
    /// * `window` - Sentences per chunk
    /// * `overlap` - Sentences shared by adjacent chunks
    ///
    /// # Panics
    ///
    /// Panics if `window == 0` or `overlap >= window`.
    #[must_use]
    pub fn new(window: usize, overlap: usize) -> Self {
        assert!(window > 0, "window must be > 0");
        assert!(overlap < window, "overlap must be < window");
        Self { window, overlap }
    }

    /// Create a chunker with no overlap.
    #[must_use]
    pub fn no_overlap(window: usize) -> Self {
        Self::new(window, 0)
    }

    /// The step between chunk starts.
    #[must_use]
    fn step(&self) -> usize {
        self.window - self.overlap
    }

    /// Chunk already-segmented sentences.
    #[must_use]
    pub fn chunk_sentences(&self, sentences: &[Sentence]) -> Vec<Chunk> {
        let n = sentences.len();
        let mut chunks = Vec::with_capacity(self.estimate_sentence_chunks(n));
        let mut start = 0;

        while start < n {
            let end = (start + self.window).min(n);
            chunks.push(Chunk::from_sentences(
                chunks.len(),
                &sentences[start..end],
                UNMEASURED_COHERENCE,
            ));
            if end == n {
                break;
            }
            start += self.step();
        }

        chunks
    }

    fn estimate_sentence_chunks(&self, n: usize) -> usize {
        if n <= self.window {
            return n.min(1);
        }
        1 + (n - self.window).div_ceil(self.step())
    }
}

impl Chunker for FixedChunker {
    fn chunk(&self, text: &str) -> Vec<Chunk> {
        self.chunk_sentences(&segment(text))
    }

    fn estimate_chunks(&self, text_len: usize) -> usize {
        // Rough estimate: ~100 bytes per sentence
        self.estimate_sentence_chunks(text_len / 100).max(1)
    }
}

/// Validates semantic output and substitutes fixed windows when it fails.
#[derive(Debug, Clone)]
pub struct FallbackGuard {
    fixed: FixedChunker,
    max_chunk_ratio: f32,
    min_chunk_ceiling: usize,
}

impl FallbackGuard {
    /// Create a guard.
    ///
    /// The ceiling for a document of `n` sentences is
    /// `max(min_chunk_ceiling, floor(n × max_chunk_ratio))`.
    #[must_use]
    pub fn new(fixed: FixedChunker, max_chunk_ratio: f32, min_chunk_ceiling: usize) -> Self {
        Self {
            fixed,
            max_chunk_ratio,
            min_chunk_ceiling,
        }
    }

    /// Largest chunk count accepted for `num_sentences`.
    #[must_use]
    pub fn ceiling(&self, num_sentences: usize) -> usize {
        let scaled = (num_sentences as f64 * f64::from(self.max_chunk_ratio)).floor() as usize;
        scaled.max(self.min_chunk_ceiling)
    }

    /// Check a semantic result against the count bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkingFailure::Empty`] for no chunks on a non-empty
    /// document, or [`ChunkingFailure::Degenerate`] above the ceiling.
    pub fn validate(&self, num_sentences: usize, chunks: &[Chunk]) -> Result<(), ChunkingFailure> {
        if chunks.is_empty() && num_sentences > 0 {
            return Err(ChunkingFailure::Empty);
        }
        let ceiling = self.ceiling(num_sentences);
        if chunks.len() > ceiling {
            return Err(ChunkingFailure::Degenerate {
                num_chunks: chunks.len(),
                ceiling,
            });
        }
        Ok(())
    }

    /// Accept valid semantic output or fall back to fixed windows.
    ///
    /// Returns the chunks to use and, if the fallback ran, why. Never fails.
    #[must_use]
    pub fn resolve(
        &self,
        sentences: &[Sentence],
        semantic: Result<Vec<Chunk>, ChunkingFailure>,
    ) -> (Vec<Chunk>, Option<ChunkingFailure>) {
        let failure = match semantic.and_then(|chunks| {
            self.validate(sentences.len(), &chunks)?;
            Ok(chunks)
        }) {
            Ok(chunks) => return (chunks, None),
            Err(failure) => failure,
        };

        match &failure {
            ChunkingFailure::Embedding(e) => {
                tracing::warn!(error = %e, sentences = sentences.len(), "embedding failed, using fallback chunking");
            }
            ChunkingFailure::NonFiniteSimilarity { gap } => {
                tracing::warn!(gap, "non-finite similarity, using fallback chunking");
            }
            ChunkingFailure::Degenerate {
                num_chunks,
                ceiling,
            } => {
                tracing::warn!(num_chunks, ceiling, "degenerate chunk count, using fallback chunking");
            }
            ChunkingFailure::Empty => {
                tracing::warn!(sentences = sentences.len(), "semantic pass produced nothing, using fallback chunking");
            }
        }

        (self.fixed.chunk_sentences(sentences), Some(failure))
    }
}
