//! Sentence segmentation.
//!
//! Splits raw document text into an ordered sequence of sentences, the unit
//! every later stage works in.
//!
//! ## The Hard Part: Finding Sentences
//!
//! Sentence detection seems simple until you encounter:
//!
//! ```text
//! "Dr. Smith went to Washington D.C. on Jan. 15th."
//!     ^                          ^       ^
//!     Not a sentence end (abbreviation)
//! ```
//!
//! We use Unicode Standard Annex #29 (UAX #29) for sentence segmentation,
//! which handles most edge cases including:
//!
//! - Abbreviations followed by a lowercase word ("approx. ten")
//! - Decimal numbers (3.14159)
//! - Ellipses (...)
//! - URLs (https://example.com/path)
//!
//! When UAX #29 is unsure it keeps text together rather than splitting, so
//! ambiguity never drops a sentence: every non-whitespace byte of the input
//! lands in exactly one [`Sentence`].

use unicode_segmentation::UnicodeSegmentation;

/// A trimmed sentence with its position in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    /// Zero-based position in the sentence sequence.
    pub index: usize,
    /// Sentence text with surrounding whitespace removed. Never empty.
    pub text: String,
    /// Byte offset of the trimmed text in the source document.
    pub start: usize,
    /// Byte offset one past the trimmed text in the source document.
    pub end: usize,
}

impl Sentence {
    /// Length of the sentence text in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Always false: segmentation never emits empty sentences.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// The byte span of this sentence in the source document.
    #[must_use]
    pub fn span(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

/// Split text into sentences.
///
/// Pure function of the input. Empty or whitespace-only text yields an empty
/// vector rather than an error.
///
/// ## Example
///
/// ```rust
/// use cleave::segment;
///
/// let sentences = segment("Hello world. How are you? I am fine.");
/// assert_eq!(sentences.len(), 3);
/// assert_eq!(sentences[1].text, "How are you?");
/// assert_eq!(sentences[1].index, 1);
/// ```
#[must_use]
pub fn segment(text: &str) -> Vec<Sentence> {
    if text.trim().is_empty() {
        return vec![];
    }

    text.split_sentence_bounds()
        .scan(0usize, |offset, s| {
            let start = *offset;
            *offset += s.len();
            Some((start, s))
        })
        .filter_map(|(offset, s)| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            let leading_ws = s.len() - s.trim_start().len();
            let start = offset + leading_ws;
            Some((start, start + trimmed.len(), trimmed))
        })
        .enumerate()
        .map(|(index, (start, end, trimmed))| Sentence {
            index,
            text: trimmed.to_string(),
            start,
            end,
        })
        .collect()
}
