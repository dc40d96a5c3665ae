//! Error types for cleave.
//!
//! Three layers, matching who gets to see them:
//!
//! - [`Error`]: configuration and I/O problems, returned when a chunker or store
//!   is built. These are the only errors a caller handles.
//! - [`ChunkingFailure`]: why the semantic path gave up on a document. Always
//!   absorbed by the fallback guard and reported back as data.
//! - [`EmbeddingError`]: what the embedding provider reported. Wrapped in
//!   [`ChunkingFailure::Embedding`] on its way to the guard.

use std::path::PathBuf;

/// Errors that can occur while configuring cleave.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid sentence bounds.
    #[error("invalid sentence bounds: min {min}, max {max} (need 0 < min <= max)")]
    InvalidSentenceBounds {
        /// The configured minimum.
        min: usize,
        /// The configured maximum.
        max: usize,
    },

    /// A size parameter that must be positive was zero.
    #[error("{name} must be > 0")]
    ZeroSize {
        /// Name of the offending parameter.
        name: &'static str,
    },

    /// Fallback overlap must leave the window room to advance.
    #[error("fallback overlap {overlap} must be < fallback window {window}")]
    OverlapExceedsWindow {
        /// The fallback window in sentences.
        window: usize,
        /// The overlap that exceeded it.
        overlap: usize,
    },

    /// A numeric parameter was out of its valid range.
    #[error("{name} = {value} is outside {range}")]
    OutOfRange {
        /// Name of the offending parameter.
        name: &'static str,
        /// The rejected value.
        value: f32,
        /// Human-readable description of the valid range.
        range: &'static str,
    },

    /// Multiplier bounds are inverted or do not contain the initial value.
    #[error("multiplier bounds [{min}, {max}] must be ordered and contain initial {initial}")]
    InvalidMultiplierBounds {
        /// Lower bound.
        min: f32,
        /// Upper bound.
        max: f32,
        /// Initial multiplier.
        initial: f32,
    },

    /// Unrecognised document type label.
    #[error("unknown document type: {0}")]
    UnknownDocumentType(String),

    /// Reading or writing a settings or state file failed.
    #[error("io error on {}: {source}", path.display())]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Settings or state file was not valid JSON for its schema.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A background worker thread could not be started.
    #[error("failed to spawn {name} worker: {source}")]
    Spawn {
        /// Which worker.
        name: &'static str,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Embedding model failed to load.
    #[error("embedding error: {0}")]
    Embedding(String),
}

/// Result type for cleave operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by an embedding provider or detected in its output.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EmbeddingError {
    /// The provider call itself failed (network, auth, rate limit, timeout).
    #[error("embedding provider failed: {0}")]
    Provider(String),

    /// The provider returned a different number of vectors than inputs.
    #[error("provider returned {got} vectors for {expected} inputs")]
    CountMismatch {
        /// Inputs sent.
        expected: usize,
        /// Vectors received.
        got: usize,
    },

    /// Vectors within one document disagree on dimension.
    #[error("vector {index} has dimension {got}, expected {expected}")]
    DimensionMismatch {
        /// Position of the offending vector.
        index: usize,
        /// Dimension of the first vector.
        expected: usize,
        /// Dimension of the offending vector.
        got: usize,
    },

    /// The provider returned zero-length vectors.
    #[error("provider returned empty vectors")]
    EmptyVector,
}

/// Why the semantic path could not produce chunks for a document.
///
/// The fallback guard matches on this to decide what to log; every variant
/// ends in the fixed-size chunker.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChunkingFailure {
    /// Embedding failed for some batch of the document.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    /// A similarity score came out NaN or infinite.
    #[error("non-finite similarity at gap {gap}")]
    NonFiniteSimilarity {
        /// Gap index (between sentence `gap` and `gap + 1`).
        gap: usize,
    },

    /// Chunk count fell outside the sanity ceiling.
    #[error("degenerate chunking: {num_chunks} chunks exceeds ceiling {ceiling}")]
    Degenerate {
        /// Chunks produced.
        num_chunks: usize,
        /// Maximum accepted.
        ceiling: usize,
    },

    /// The semantic pass produced no chunks for a non-empty document.
    #[error("semantic pass produced no chunks")]
    Empty,
}
