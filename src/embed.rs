//! Contextual sentence embeddings.
//!
//! ## Sliding Windows
//!
//! A sentence embedded alone is noisy: "It failed." says nothing about topic.
//! Each sentence is instead embedded together with its neighbours:
//!
//! ```text
//! window = 1
//!
//! Sentences:  [S0] [S1] [S2] [S3] [S4]
//! Text for 0:  S0 S1
//! Text for 2:       S1 S2 S3
//! Text for 4:                S3 S4          <- clamped at the edge
//! ```
//!
//! Boundary detection then compares local topic context rather than isolated
//! sentences.
//!
//! ## Batching
//!
//! Window texts are built up front, then sent to the provider in groups of
//! `batch_size` (96 by default, a common provider limit). Up to
//! `max_in_flight` groups are sent concurrently. Any failed group fails the
//! whole document; there are no partial results.

use std::panic::AssertUnwindSafe;

use crate::{EmbeddingError, Sentence};

/// An external embedding service.
///
/// Implementations return one vector per input, in input order, all with the
/// same dimension.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts.
    ///
    /// # Errors
    ///
    /// Returns [`EmbeddingError::Provider`] if the service call fails.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Largest batch the provider accepts, if it has a limit.
    fn max_batch_size(&self) -> Option<usize> {
        None
    }
}

impl<P: EmbeddingProvider + ?Sized> EmbeddingProvider for std::sync::Arc<P> {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        (**self).embed_batch(texts)
    }

    fn max_batch_size(&self) -> Option<usize> {
        (**self).max_batch_size()
    }
}

/// Build the text embedded for each sentence: the sentence plus up to
/// `window` neighbours on each side, joined by spaces.
///
/// ```rust
/// use cleave::{segment, window_texts};
///
/// let sentences = segment("A one. B two. C three.");
/// let texts = window_texts(&sentences, 1);
/// assert_eq!(texts[0], "A one. B two.");
/// assert_eq!(texts[1], "A one. B two. C three.");
/// assert_eq!(texts[2], "B two. C three.");
/// ```
#[must_use]
pub fn window_texts(sentences: &[Sentence], window: usize) -> Vec<String> {
    let n = sentences.len();
    (0..n)
        .map(|i| {
            let start = i.saturating_sub(window);
            let end = (i + window + 1).min(n);
            sentences[start..end]
                .iter()
                .map(|s| s.text.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

/// Embeds sentences with surrounding context, batching provider calls.
#[derive(Debug, Clone, Copy)]
pub struct ContextualEmbedder {
    window: usize,
    batch_size: usize,
    max_in_flight: usize,
}

impl ContextualEmbedder {
    /// Create an embedder.
    ///
    /// # Panics
    ///
    /// Panics if `batch_size == 0` or `max_in_flight == 0`.
    #[must_use]
    pub fn new(window: usize, batch_size: usize, max_in_flight: usize) -> Self {
        assert!(batch_size > 0, "batch_size must be > 0");
        assert!(max_in_flight > 0, "max_in_flight must be > 0");
        Self {
            window,
            batch_size,
            max_in_flight,
        }
    }

    /// Context window on each side.
    #[must_use]
    pub fn window(&self) -> usize {
        self.window
    }

    /// Embed every sentence, one vector per sentence in order.
    ///
    /// # Errors
    ///
    /// Returns the first provider error, or a validation error if the provider
    /// returns the wrong number of vectors or mixed dimensions.
    pub fn embed<P>(&self, provider: &P, sentences: &[Sentence]) -> Result<Vec<Vec<f32>>, EmbeddingError>
    where
        P: EmbeddingProvider + ?Sized,
    {
        if sentences.is_empty() {
            return Ok(vec![]);
        }

        let texts = window_texts(sentences, self.window);
        let batch_size = provider
            .max_batch_size()
            .map_or(self.batch_size, |limit| self.batch_size.min(limit.max(1)));
        let batches: Vec<&[String]> = texts.chunks(batch_size).collect();
        let total = batches.len();

        let mut embeddings = Vec::with_capacity(texts.len());
        for (round, group) in batches.chunks(self.max_in_flight).enumerate() {
            for (offset, result) in run_group(provider, group).into_iter().enumerate() {
                let batch_no = round * self.max_in_flight + offset;
                let expected = group[offset].len();
                let vectors = result?;
                if vectors.len() != expected {
                    return Err(EmbeddingError::CountMismatch {
                        expected,
                        got: vectors.len(),
                    });
                }
                tracing::debug!(batch = batch_no + 1, total, size = expected, "embedded batch");
                embeddings.extend(vectors);
            }
        }

        validate_dimensions(&embeddings)?;
        Ok(embeddings)
    }
}

impl Default for ContextualEmbedder {
    fn default() -> Self {
        Self::new(1, 96, 1)
    }
}

/// Run one group of batches, concurrently when there is more than one.
fn run_group<P>(provider: &P, group: &[&[String]]) -> Vec<Result<Vec<Vec<f32>>, EmbeddingError>>
where
    P: EmbeddingProvider + ?Sized,
{
    if group.len() == 1 {
        return vec![embed_guarded(provider, group[0])];
    }

    std::thread::scope(|scope| {
        let handles: Vec<_> = group
            .iter()
            .map(|batch| scope.spawn(move || embed_guarded(provider, batch)))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or_else(|_| Err(provider_panicked())))
            .collect()
    })
}

/// Call the provider, turning a panic into a provider error.
fn embed_guarded<P>(provider: &P, batch: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>
where
    P: EmbeddingProvider + ?Sized,
{
    std::panic::catch_unwind(AssertUnwindSafe(|| provider.embed_batch(batch)))
        .unwrap_or_else(|_| Err(provider_panicked()))
}

fn provider_panicked() -> EmbeddingError {
    EmbeddingError::Provider("embedding provider panicked".into())
}

fn validate_dimensions(embeddings: &[Vec<f32>]) -> Result<(), EmbeddingError> {
    let Some(first) = embeddings.first() else {
        return Ok(());
    };
    let expected = first.len();
    if expected == 0 {
        return Err(EmbeddingError::EmptyVector);
    }
    match embeddings
        .iter()
        .enumerate()
        .find(|(_, v)| v.len() != expected)
    {
        Some((index, v)) => Err(EmbeddingError::DimensionMismatch {
            index,
            expected,
            got: v.len(),
        }),
        None => Ok(()),
    }
}

/// Embedding provider backed by a local fastembed model.
///
/// Uses fastembed's default model (BGE-small-en, 384 dimensions).
#[cfg(feature = "fastembed")]
pub struct FastEmbedProvider {
    model: fastembed::TextEmbedding,
}

#[cfg(feature = "fastembed")]
impl FastEmbedProvider {
    /// Load the default model.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedding model fails to load.
    pub fn new() -> crate::Result<Self> {
        let model = fastembed::TextEmbedding::try_new(Default::default())
            .map_err(|e| crate::Error::Embedding(e.to_string()))?;
        Ok(Self { model })
    }
}

#[cfg(feature = "fastembed")]
impl EmbeddingProvider for FastEmbedProvider {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.model
            .embed(texts.to_vec(), None)
            .map_err(|e| EmbeddingError::Provider(e.to_string()))
    }
}

#[cfg(feature = "fastembed")]
impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider").finish_non_exhaustive()
    }
}
