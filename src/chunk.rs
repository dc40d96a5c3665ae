//! The Chunk type: a contiguous run of sentences with quality metadata.

use serde::{Deserialize, Serialize};

use crate::Sentence;

/// Coherence reported for a chunk with a single sentence.
///
/// There are no adjacent pairs to average, so the chunk is trivially coherent.
pub const SINGLETON_COHERENCE: f32 = 1.0;

/// Coherence reported for chunks produced by the fixed-size fallback, which
/// never computes similarities.
pub const UNMEASURED_COHERENCE: f32 = 0.0;

/// A run of sentences `[start, end)` emitted by a chunker.
///
/// Chunks are immutable once built. `start` and `end` are sentence indices;
/// `byte_start` and `byte_end` locate the run in the original document:
///
/// ```rust
/// use cleave::{segment, Chunk};
///
/// let text = "First point. Second point. Unrelated aside.";
/// let sentences = segment(text);
/// let chunk = Chunk::from_sentences(0, &sentences[..2], 0.9);
///
/// assert_eq!(chunk.sentence_range(), 0..2);
/// assert_eq!(chunk.text, "First point. Second point.");
/// assert_eq!(&text[chunk.byte_start..chunk.byte_end], "First point. Second point.");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Zero-based index of this chunk in the sequence.
    pub index: usize,
    /// First sentence index (inclusive).
    pub start: usize,
    /// Last sentence index (exclusive).
    pub end: usize,
    /// Member sentences joined by a single space.
    pub text: String,
    /// Byte offset of the first sentence in the source document.
    pub byte_start: usize,
    /// Byte offset one past the last sentence in the source document.
    pub byte_end: usize,
    /// Number of characters in `text`.
    pub char_count: usize,
    /// Number of whitespace-separated words in `text`.
    pub word_count: usize,
    /// Mean adjacent-sentence similarity inside the chunk.
    pub coherence: f32,
}

impl Chunk {
    /// Build a chunk from a non-empty, contiguous slice of sentences.
    ///
    /// # Panics
    ///
    /// Panics if `sentences` is empty.
    #[must_use]
    pub fn from_sentences(index: usize, sentences: &[Sentence], coherence: f32) -> Self {
        assert!(!sentences.is_empty(), "chunk needs at least one sentence");
        let first = &sentences[0];
        let last = &sentences[sentences.len() - 1];

        let text = sentences
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        Self {
            index,
            start: first.index,
            end: last.index + 1,
            char_count: text.chars().count(),
            word_count: text.split_whitespace().count(),
            text,
            byte_start: first.start,
            byte_end: last.end,
            coherence,
        }
    }

    /// Number of sentences in this chunk.
    #[must_use]
    pub fn sentence_count(&self) -> usize {
        self.end - self.start
    }

    /// The sentence index range of this chunk.
    #[must_use]
    pub fn sentence_range(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }

    /// The byte span of this chunk in the original document.
    #[must_use]
    pub fn span(&self) -> std::ops::Range<usize> {
        self.byte_start..self.byte_end
    }
}

impl std::fmt::Display for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Chunk {{ index: {}, sentences: {}..{}, chars: {}, coherence: {:.3} }}",
            self.index, self.start, self.end, self.char_count, self.coherence
        )
    }
}
