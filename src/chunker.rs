//! The document-level entry point.
//!
//! ```text
//!  text ─▶ segment ─▶ embed (windows, batches) ─▶ adjacent cosine
//!                                                      │
//!                         AdaptiveThreshold::decide ◀──┘
//!                                   │
//!                          ChunkAssembler::assemble
//!                                   │
//!            Result<Vec<Chunk>, ChunkingFailure> ─▶ FallbackGuard ─▶ ChunkedDocument
//! ```
//!
//! The semantic path returns an explicit `Result`; the guard is the only place
//! that turns a failure into fixed windows. `chunk_document` itself never fails.

use std::sync::Arc;

use serde::Serialize;

use crate::{
    adjacent_similarities, segment, AdaptiveThreshold, Chunk, ChunkAssembler, ChunkStats, Chunker,
    ChunkingConfig, ChunkingFailure, ContextualEmbedder, DocumentType, EmbeddingProvider,
    FallbackGuard, FixedChunker, Result, Sentence, SentenceBounds, ThresholdDecision,
    SINGLETON_COHERENCE,
};

/// The outcome of chunking one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkedDocument {
    /// Chunks in document order.
    pub chunks: Vec<Chunk>,
    /// Whether fixed windows replaced the semantic result.
    pub used_fallback: bool,
    /// Why the fallback ran, if it did.
    #[serde(skip)]
    pub fallback_reason: Option<ChunkingFailure>,
    /// The threshold the semantic path used, if it got that far.
    pub threshold: Option<ThresholdDecision>,
    /// Summary statistics over `chunks`.
    pub stats: ChunkStats,
}

impl ChunkedDocument {
    fn new(
        chunks: Vec<Chunk>,
        fallback_reason: Option<ChunkingFailure>,
        threshold: Option<ThresholdDecision>,
    ) -> Self {
        let stats = ChunkStats::from_chunks(&chunks);
        Self {
            chunks,
            used_fallback: fallback_reason.is_some(),
            fallback_reason,
            threshold,
            stats,
        }
    }
}

/// Adaptive semantic chunker.
///
/// Holds the embedding provider and a handle to the shared threshold state.
/// Cloning is cheap and clones share both, so one chunker can serve many
/// documents concurrently.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use cleave::{
///     AdaptiveThreshold, ChunkingConfig, DocumentType, EmbeddingError, EmbeddingProvider,
///     SemanticChunker, ThresholdConfig,
/// };
///
/// struct Unavailable;
///
/// impl EmbeddingProvider for Unavailable {
///     fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
///         Err(EmbeddingError::Provider("offline".into()))
///     }
/// }
///
/// let threshold = AdaptiveThreshold::new(ThresholdConfig::default()).unwrap();
/// let chunker = SemanticChunker::new(ChunkingConfig::default(), Arc::new(Unavailable), threshold).unwrap();
///
/// let doc = chunker.chunk_document("First point. Second point. Third point.", DocumentType::General);
/// assert!(doc.used_fallback);
/// assert_eq!(doc.chunks.len(), 1);
/// ```
#[derive(Clone)]
pub struct SemanticChunker {
    config: ChunkingConfig,
    provider: Arc<dyn EmbeddingProvider>,
    threshold: AdaptiveThreshold,
    embedder: ContextualEmbedder,
    assembler: ChunkAssembler,
    guard: FallbackGuard,
}

impl SemanticChunker {
    /// Create a chunker.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` fails validation.
    pub fn new(
        config: ChunkingConfig,
        provider: Arc<dyn EmbeddingProvider>,
        threshold: AdaptiveThreshold,
    ) -> Result<Self> {
        let bounds: SentenceBounds = config.validate()?;
        let embedder =
            ContextualEmbedder::new(config.window_size, config.batch_size, config.max_in_flight);
        let guard = FallbackGuard::new(
            FixedChunker::new(config.fallback_window, config.fallback_overlap),
            config.max_chunk_ratio,
            config.min_chunk_ceiling,
        );

        Ok(Self {
            config,
            provider,
            threshold,
            embedder,
            assembler: ChunkAssembler::new(bounds),
            guard,
        })
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// The shared threshold controller.
    #[must_use]
    pub fn threshold(&self) -> &AdaptiveThreshold {
        &self.threshold
    }

    /// Chunk one document.
    ///
    /// Never fails: provider errors, non-finite scores and implausible chunk
    /// counts all end in fixed-size windows, reported through
    /// [`ChunkedDocument::used_fallback`].
    #[must_use]
    pub fn chunk_document(&self, text: &str, doc_type: DocumentType) -> ChunkedDocument {
        let sentences = segment(text);
        tracing::debug!(sentences = sentences.len(), %doc_type, "chunking document");

        match sentences.len() {
            0 => ChunkedDocument::new(vec![], None, None),
            1 => ChunkedDocument::new(
                vec![Chunk::from_sentences(0, &sentences, SINGLETON_COHERENCE)],
                None,
                None,
            ),
            _ => {
                let (semantic, decision) = match self.semantic_chunks(&sentences, doc_type) {
                    Ok((chunks, decision)) => (Ok(chunks), Some(decision)),
                    Err(failure) => (Err(failure), None),
                };
                let (chunks, failure) = self.guard.resolve(&sentences, semantic);
                let doc = ChunkedDocument::new(chunks, failure, decision);
                tracing::debug!(
                    chunks = doc.stats.num_chunks,
                    avg_coherence = doc.stats.avg_coherence,
                    used_fallback = doc.used_fallback,
                    "document chunked"
                );
                doc
            }
        }
    }

    fn semantic_chunks(
        &self,
        sentences: &[Sentence],
        doc_type: DocumentType,
    ) -> std::result::Result<(Vec<Chunk>, ThresholdDecision), ChunkingFailure> {
        let embeddings = self.embedder.embed(&*self.provider, sentences)?;
        let similarities = adjacent_similarities(&embeddings);

        if let Some(gap) = similarities.iter().position(|s| !s.is_finite()) {
            return Err(ChunkingFailure::NonFiniteSimilarity { gap });
        }

        let decision = self.threshold.decide(&similarities, doc_type);
        tracing::debug!(
            percentile = decision.percentile_value,
            type_multiplier = decision.type_multiplier,
            multiplier = decision.multiplier,
            effective = decision.effective,
            "threshold decided"
        );

        let chunks = self
            .assembler
            .assemble(sentences, &similarities, decision.effective);
        Ok((chunks, decision))
    }
}

impl std::fmt::Debug for SemanticChunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticChunker")
            .field("config", &self.config)
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

impl Chunker for SemanticChunker {
    fn chunk(&self, text: &str) -> Vec<Chunk> {
        self.chunk_document(text, DocumentType::General).chunks
    }

    fn estimate_chunks(&self, text_len: usize) -> usize {
        // Rough estimate: ~100 bytes per sentence
        self.assembler.estimate_chunks(text_len / 100)
    }
}
