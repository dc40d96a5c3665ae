//! Chunking configuration and settings files.
//!
//! Every constant the chunker uses is a field here. Defaults match the values
//! the chunker was tuned with; a deployment overrides them from JSON:
//!
//! ```json
//! {
//!   "chunking": { "min_sentences": 5, "max_sentences": 40 },
//!   "threshold": { "initial_multiplier": 0.25, "scope": "global" }
//! }
//! ```
//!
//! Missing fields take their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result, SentenceBounds, ThresholdConfig};

/// Per-document chunking parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Minimum sentences before a similarity cut is allowed.
    pub min_sentences: usize,
    /// Sentences at which a cut is forced.
    pub max_sentences: usize,
    /// Neighbours on each side folded into a sentence's embedding text.
    pub window_size: usize,
    /// Texts per embedding provider call.
    pub batch_size: usize,
    /// Provider calls allowed in flight at once for one document.
    pub max_in_flight: usize,
    /// Merge-pass ceiling as a multiple of `max_sentences`.
    pub merge_factor: f32,
    /// Chunk-count ceiling as a fraction of the sentence count.
    pub max_chunk_ratio: f32,
    /// Chunk-count ceiling never drops below this.
    pub min_chunk_ceiling: usize,
    /// Sentences per fallback window.
    pub fallback_window: usize,
    /// Sentences shared by adjacent fallback windows.
    pub fallback_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            min_sentences: 3,
            max_sentences: 30,
            window_size: 1,
            batch_size: 96,
            max_in_flight: 1,
            merge_factor: SentenceBounds::DEFAULT_MERGE_FACTOR,
            max_chunk_ratio: 0.2,
            min_chunk_ceiling: 3,
            fallback_window: 5,
            fallback_overlap: 1,
        }
    }
}

impl ChunkingConfig {
    /// Set the minimum sentences per chunk.
    #[must_use]
    pub fn with_min_sentences(mut self, min: usize) -> Self {
        self.min_sentences = min;
        self
    }

    /// Set the maximum sentences per chunk.
    #[must_use]
    pub fn with_max_sentences(mut self, max: usize) -> Self {
        self.max_sentences = max;
        self
    }

    /// Set the embedding context window (sentences on each side).
    #[must_use]
    pub fn with_window_size(mut self, window: usize) -> Self {
        self.window_size = window;
        self
    }

    /// Set the embedding batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set how many embedding batches may run concurrently.
    #[must_use]
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    /// Set the fallback window and overlap.
    #[must_use]
    pub fn with_fallback(mut self, window: usize, overlap: usize) -> Self {
        self.fallback_window = window;
        self.fallback_overlap = overlap;
        self
    }

    /// Set the chunk-count ceiling parameters.
    #[must_use]
    pub fn with_chunk_ceiling(mut self, ratio: f32, floor: usize) -> Self {
        self.max_chunk_ratio = ratio;
        self.min_chunk_ceiling = floor;
        self
    }

    /// Check every parameter and derive the sentence bounds.
    ///
    /// # Errors
    ///
    /// Returns the first invalid parameter found.
    pub fn validate(&self) -> Result<SentenceBounds> {
        let bounds = SentenceBounds::new(self.min_sentences, self.max_sentences).map_err(|_| {
            Error::InvalidSentenceBounds {
                min: self.min_sentences,
                max: self.max_sentences,
            }
        })?;
        let bounds = bounds
            .with_merge_factor(self.merge_factor)
            .map_err(|_| Error::OutOfRange {
                name: "merge_factor",
                value: self.merge_factor,
                range: "[1.0, inf)",
            })?;

        for (name, value) in [
            ("batch_size", self.batch_size),
            ("max_in_flight", self.max_in_flight),
            ("fallback_window", self.fallback_window),
            ("min_chunk_ceiling", self.min_chunk_ceiling),
        ] {
            if value == 0 {
                return Err(Error::ZeroSize { name });
            }
        }

        if self.fallback_overlap >= self.fallback_window {
            return Err(Error::OverlapExceedsWindow {
                window: self.fallback_window,
                overlap: self.fallback_overlap,
            });
        }

        if !(self.max_chunk_ratio.is_finite() && self.max_chunk_ratio > 0.0) {
            return Err(Error::OutOfRange {
                name: "max_chunk_ratio",
                value: self.max_chunk_ratio,
                range: "(0.0, inf)",
            });
        }

        Ok(bounds)
    }
}

/// Complete settings: chunking parameters plus adaptive threshold parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Per-document chunking parameters.
    pub chunking: ChunkingConfig,
    /// Adaptive threshold parameters.
    pub threshold: ThresholdConfig,
}

impl Settings {
    /// Parse and validate settings from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or any value is invalid.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read, parse and validate settings from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or its contents are invalid.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Validate both sections.
    ///
    /// # Errors
    ///
    /// Returns the first invalid parameter found.
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        self.threshold.validate()
    }
}
