//! # cleave
//!
//! Adaptive semantic chunking for retrieval-augmented generation (RAG) pipelines.
//!
//! ## The Problem
//!
//! Documents have to be cut into chunks before they can be embedded and
//! retrieved. Fixed-size cuts ignore meaning. Semantic cuts follow topic
//! shifts, but they depend on a similarity threshold, and no single threshold
//! suits every document: a resume changes subject every few lines while a
//! paper develops one argument for pages.
//!
//! `cleave` picks the threshold per document from that document's own
//! similarity distribution, scales it by document type, and nudges a learned
//! multiplier up or down according to how well retrieval actually went.
//!
//! ## The Pipeline
//!
//! ```text
//!   text
//!    │
//!    ▼
//!  segment ──────────── sentences (UAX #29)
//!    │
//!    ▼
//!  ContextualEmbedder ─ one vector per sentence, embedded with its neighbours
//!    │
//!    ▼
//!  adjacent_similarities  N sentences → N - 1 gap scores
//!    │
//!    ▼
//!  AdaptiveThreshold ── p20(scores) × type multiplier × learned multiplier
//!    │
//!    ▼
//!  ChunkAssembler ───── greedy cuts within [min, max] sentences, merge tail
//!    │
//!    ▼
//!  FallbackGuard ────── any failure or implausible count → fixed windows
//!    │
//!    ▼
//!  ChunkedDocument
//! ```
//!
//! Feedback flows the other way:
//!
//! ```text
//!  query pipeline ─▶ FeedbackRecorder ─▶ (queue) ─▶ AdaptiveThreshold
//!                                                    good results: multiplier down
//!                                                    poor results: multiplier up
//! ```
//!
//! ## Threshold Math
//!
//! ```text
//! effective = percentile(similarities, 0.2) × type_multiplier × multiplier
//!
//! multiplier ∈ [0.15, 0.45], starts at 0.3, moves 0.01 per feedback sample
//! ```
//!
//! A higher effective threshold means more gaps fall below it, so more cuts.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use cleave::{
//!     AdaptiveThreshold, ChunkingConfig, DocumentType, EmbeddingError, EmbeddingProvider,
//!     FeedbackRecorder, FeedbackSample, SemanticChunker, ThresholdConfig,
//! };
//!
//! // Any embedding service: implement one method.
//! struct Keywords;
//!
//! impl EmbeddingProvider for Keywords {
//!     fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
//!         Ok(texts
//!             .iter()
//!             .map(|t| t.to_lowercase())
//!             .map(|t| vec![t.matches("rust").count() as f32, t.matches("tea").count() as f32])
//!             .collect())
//!     }
//! }
//!
//! let threshold = AdaptiveThreshold::new(ThresholdConfig::default()).unwrap();
//! let config = ChunkingConfig::default().with_window_size(0);
//! let chunker = SemanticChunker::new(config, Arc::new(Keywords), threshold.clone()).unwrap();
//!
//! let text = "I write Rust. Rust is fast. Rust has traits. \
//!             I drink tea. Tea is warm. Tea has leaves.";
//! let doc = chunker.chunk_document(text, DocumentType::General);
//! assert_eq!(doc.chunks.len(), 2);
//! assert!(!doc.used_fallback);
//!
//! // Later, after answering queries against those chunks:
//! let recorder = FeedbackRecorder::new(threshold).unwrap();
//! recorder.record(DocumentType::General, FeedbackSample::new(0.9, 0.95, 5, 5));
//! ```
//!
//! ## Failure Handling
//!
//! Chunking never fails. The semantic path returns
//! `Result<Vec<Chunk>, ChunkingFailure>` and the [`FallbackGuard`] replaces
//! any failure with fixed sentence windows, recording why in
//! [`ChunkedDocument::fallback_reason`].
//!
//! | Failure | Cause |
//! |---------|-------|
//! | `Embedding` | provider error, wrong vector count, mixed dimensions |
//! | `NonFiniteSimilarity` | NaN or infinite score |
//! | `Degenerate` | more chunks than `max(3, 0.2 × sentences)` |
//! | `Empty` | no chunks for a non-empty document |
//!
//! ## Features
//!
//! | Feature | Effect |
//! |---------|--------|
//! | `fastembed` | `FastEmbedProvider` backed by a local ONNX model |
//! | `simd` | SIMD cosine similarity via `innr` |

mod assemble;
mod capacity;
mod chunk;
mod chunker;
mod config;
mod embed;
mod error;
mod fallback;
mod feedback;
mod sentence;
mod similarity;
mod stats;
mod store;
mod threshold;

pub use assemble::{coherence, ChunkAssembler};
pub use capacity::{SentenceBounds, SentenceBoundsError};
pub use chunk::{Chunk, SINGLETON_COHERENCE, UNMEASURED_COHERENCE};
pub use chunker::{ChunkedDocument, SemanticChunker};
pub use config::{ChunkingConfig, Settings};
pub use embed::{window_texts, ContextualEmbedder, EmbeddingProvider};
pub use error::{ChunkingFailure, EmbeddingError, Error, Result};
pub use fallback::{FallbackGuard, FixedChunker};
pub use feedback::{FeedbackCounts, FeedbackDropped, FeedbackRecorder, DEFAULT_QUEUE_CAPACITY};
pub use sentence::{segment, Sentence};
pub use similarity::{adjacent_similarities, cosine_similarity};
pub use stats::ChunkStats;
pub use store::{InMemoryThresholdStore, JsonFileThresholdStore};
pub use threshold::{
    percentile, AdaptiveStats, AdaptiveThreshold, Adjustment, DocumentType, FeedbackCriteria,
    FeedbackSample, MultiplierState, ThresholdConfig, ThresholdDecision, ThresholdKey,
    ThresholdScope, ThresholdStore, Verdict,
};

#[cfg(feature = "fastembed")]
pub use embed::FastEmbedProvider;

/// A text chunking strategy.
///
/// Both chunkers implement this trait, enabling polymorphic usage:
///
/// ```rust
/// use cleave::{Chunk, Chunker, FixedChunker};
///
/// fn chunk_document(chunker: &dyn Chunker, text: &str) -> Vec<Chunk> {
///     chunker.chunk(text)
/// }
///
/// let fixed = FixedChunker::new(3, 1);
/// let chunks = chunk_document(&fixed, "Hello world. This is a test.");
/// assert_eq!(chunks.len(), 1);
/// ```
pub trait Chunker: Send + Sync {
    /// Split text into chunks.
    ///
    /// Each [`Chunk`] holds whole sentences, its sentence range, and its byte
    /// span in the original document.
    fn chunk(&self, text: &str) -> Vec<Chunk>;

    /// Estimate the number of chunks for a given text length.
    ///
    /// Useful for pre-allocation. May be approximate.
    fn estimate_chunks(&self, text_len: usize) -> usize {
        // Conservative default
        (text_len / 500).max(1)
    }
}
