//! Adaptive split thresholds learned from retrieval feedback.
//!
//! ## Reading: one cut-off per document
//!
//! A fixed similarity threshold does not transfer between documents: a resume's
//! adjacent lines are far less similar than a paper's adjacent sentences. So
//! the cut-off is derived from the document's own similarity distribution:
//!
//! ```text
//! effective = percentile_20(similarities) × type_multiplier × multiplier
//! ```
//!
//! The percentile is rank-based, so a few outlier pairs (list items,
//! headings) barely move it.
//!
//! ## Writing: nudging `multiplier` from feedback
//!
//! After a query is answered, the retrieval scores come back as a
//! [`FeedbackSample`] and are classified:
//!
//! | Verdict | Condition | Update |
//! |---------|-----------|--------|
//! | Useful | avg > 0.8, top > 0.85, got every requested result | `multiplier -= lr` |
//! | Poor | avg < 0.5 | `multiplier += lr` |
//! | Neutral | anything else | none |
//!
//! The result is clamped to `[min_multiplier, max_multiplier]` before it is
//! stored. Good retrieval lowers the multiplier, which means fewer cuts.
//!
//! ## Sharing
//!
//! The multiplier is the only state that outlives a document. It lives behind
//! a [`ThresholdStore`]: reads take a consistent snapshot, and each update is a
//! read-modify-clamp-write under one lock.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{Error, InMemoryThresholdStore, Result};

/// Number of recent multiplier values kept for statistics.
const HISTORY_LEN: usize = 10;

// =============================================================================
// Document types
// =============================================================================

/// Category of document, selecting how aggressively it is split.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// CVs and resumes: short, list-heavy, many topic changes.
    Resume,
    /// Anything too short to have much internal structure.
    ShortDocument,
    /// Research papers.
    AcademicPaper,
    /// Manuals and technical reports.
    TechnicalReport,
    /// Default category.
    #[default]
    General,
}

/// Built-in type multipliers. Higher means more splitting.
const TYPE_MULTIPLIERS: &[(DocumentType, f32)] = &[
    (DocumentType::Resume, 0.4),
    (DocumentType::ShortDocument, 0.4),
    (DocumentType::TechnicalReport, 0.35),
    (DocumentType::AcademicPaper, 0.3),
    (DocumentType::General, 0.3),
];

impl DocumentType {
    /// Every document type.
    pub const ALL: [DocumentType; 5] = [
        DocumentType::Resume,
        DocumentType::ShortDocument,
        DocumentType::AcademicPaper,
        DocumentType::TechnicalReport,
        DocumentType::General,
    ];

    /// Stable lowercase label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Resume => "resume",
            DocumentType::ShortDocument => "short_document",
            DocumentType::AcademicPaper => "academic_paper",
            DocumentType::TechnicalReport => "technical_report",
            DocumentType::General => "general",
        }
    }

    /// The built-in multiplier for this type.
    #[must_use]
    pub fn default_multiplier(&self) -> f32 {
        TYPE_MULTIPLIERS
            .iter()
            .find(|(doc_type, _)| doc_type == self)
            .map_or(0.3, |(_, multiplier)| *multiplier)
    }

    /// Parse a label, mapping anything unrecognised to [`DocumentType::General`].
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        label.parse().unwrap_or_else(|_| {
            tracing::debug!(label, "unknown document type, using general");
            DocumentType::General
        })
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "resume" | "cv" => Ok(DocumentType::Resume),
            "short_document" => Ok(DocumentType::ShortDocument),
            "academic_paper" | "paper" => Ok(DocumentType::AcademicPaper),
            "technical_report" | "technical_doc" => Ok(DocumentType::TechnicalReport),
            "general" => Ok(DocumentType::General),
            _ => Err(Error::UnknownDocumentType(s.to_string())),
        }
    }
}

// =============================================================================
// Keys and scope
// =============================================================================

/// Whether one multiplier is learned for all documents or one per type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdScope {
    /// One multiplier per [`DocumentType`].
    #[default]
    PerType,
    /// A single shared multiplier.
    Global,
}

/// Identifies one learned multiplier in a [`ThresholdStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ThresholdKey {
    /// The shared multiplier.
    Global,
    /// The multiplier for one document type.
    Type(DocumentType),
}

impl fmt::Display for ThresholdKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThresholdKey::Global => f.write_str("global"),
            ThresholdKey::Type(doc_type) => f.write_str(doc_type.as_str()),
        }
    }
}

impl FromStr for ThresholdKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s == "global" {
            Ok(ThresholdKey::Global)
        } else {
            s.parse().map(ThresholdKey::Type)
        }
    }
}

// =============================================================================
// Feedback
// =============================================================================

/// Retrieval quality observed for one answered query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeedbackSample {
    /// Mean relevance score of the retrieved chunks, in [0, 1].
    pub avg_score: f32,
    /// Best relevance score, in [0, 1].
    pub top_score: f32,
    /// Chunks actually returned.
    pub result_count: usize,
    /// Chunks the query asked for.
    pub requested_count: usize,
}

impl FeedbackSample {
    /// Create a sample.
    #[must_use]
    pub fn new(avg_score: f32, top_score: f32, result_count: usize, requested_count: usize) -> Self {
        Self {
            avg_score,
            top_score,
            result_count,
            requested_count,
        }
    }

    /// Whether both scores are finite numbers.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.avg_score.is_finite() && self.top_score.is_finite()
    }
}

/// How a feedback sample moves the multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Retrieval was good: split less.
    Useful,
    /// Retrieval was poor: split more.
    Poor,
    /// Borderline: leave the multiplier alone.
    Neutral,
}

/// Score cut-offs that classify a [`FeedbackSample`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackCriteria {
    /// `avg_score` must exceed this for a useful verdict.
    pub useful_avg: f32,
    /// `top_score` must exceed this for a useful verdict.
    pub useful_top: f32,
    /// `avg_score` below this is a poor verdict.
    pub poor_avg: f32,
}

impl Default for FeedbackCriteria {
    fn default() -> Self {
        Self {
            useful_avg: 0.8,
            useful_top: 0.85,
            poor_avg: 0.5,
        }
    }
}

impl FeedbackCriteria {
    /// Classify a sample.
    ///
    /// ```rust
    /// use cleave::{FeedbackCriteria, FeedbackSample, Verdict};
    ///
    /// let criteria = FeedbackCriteria::default();
    /// assert_eq!(criteria.classify(&FeedbackSample::new(0.9, 0.95, 5, 5)), Verdict::Useful);
    /// assert_eq!(criteria.classify(&FeedbackSample::new(0.9, 0.95, 4, 5)), Verdict::Neutral);
    /// assert_eq!(criteria.classify(&FeedbackSample::new(0.3, 0.6, 5, 5)), Verdict::Poor);
    /// ```
    #[must_use]
    pub fn classify(&self, sample: &FeedbackSample) -> Verdict {
        if sample.avg_score > self.useful_avg
            && sample.top_score > self.useful_top
            && sample.result_count >= sample.requested_count
        {
            Verdict::Useful
        } else if sample.avg_score < self.poor_avg {
            Verdict::Poor
        } else {
            Verdict::Neutral
        }
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Parameters of the adaptive threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Multiplier before any feedback arrives.
    pub initial_multiplier: f32,
    /// Step applied per useful or poor sample.
    pub learning_rate: f32,
    /// Lower clamp for the multiplier.
    pub min_multiplier: f32,
    /// Upper clamp for the multiplier.
    pub max_multiplier: f32,
    /// Percentile of the similarity distribution used as the base cut-off, in [0, 1].
    pub percentile: f32,
    /// One multiplier overall or one per document type.
    pub scope: ThresholdScope,
    /// Feedback classification cut-offs.
    pub criteria: FeedbackCriteria,
    /// Overrides for the built-in type multipliers.
    pub type_multipliers: BTreeMap<DocumentType, f32>,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            initial_multiplier: 0.3,
            learning_rate: 0.01,
            min_multiplier: 0.15,
            max_multiplier: 0.45,
            percentile: 0.2,
            scope: ThresholdScope::PerType,
            criteria: FeedbackCriteria::default(),
            type_multipliers: BTreeMap::new(),
        }
    }
}

impl ThresholdConfig {
    /// Set the initial multiplier.
    #[must_use]
    pub fn with_initial_multiplier(mut self, initial: f32) -> Self {
        self.initial_multiplier = initial;
        self
    }

    /// Set the learning rate.
    #[must_use]
    pub fn with_learning_rate(mut self, learning_rate: f32) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Set the multiplier clamp.
    #[must_use]
    pub fn with_bounds(mut self, min: f32, max: f32) -> Self {
        self.min_multiplier = min;
        self.max_multiplier = max;
        self
    }

    /// Set the learning scope.
    #[must_use]
    pub fn with_scope(mut self, scope: ThresholdScope) -> Self {
        self.scope = scope;
        self
    }

    /// Override the multiplier for one document type.
    #[must_use]
    pub fn with_type_multiplier(mut self, doc_type: DocumentType, multiplier: f32) -> Self {
        self.type_multipliers.insert(doc_type, multiplier);
        self
    }

    /// Check every parameter.
    ///
    /// # Errors
    ///
    /// Returns the first invalid parameter found.
    pub fn validate(&self) -> Result<()> {
        let (min, max, initial) = (
            self.min_multiplier,
            self.max_multiplier,
            self.initial_multiplier,
        );
        if !(min.is_finite() && max.is_finite() && initial.is_finite())
            || min > max
            || initial < min
            || initial > max
        {
            return Err(Error::InvalidMultiplierBounds { min, max, initial });
        }
        if !(self.learning_rate.is_finite() && self.learning_rate >= 0.0) {
            return Err(Error::OutOfRange {
                name: "learning_rate",
                value: self.learning_rate,
                range: "[0.0, inf)",
            });
        }
        if !(0.0..=1.0).contains(&self.percentile) {
            return Err(Error::OutOfRange {
                name: "percentile",
                value: self.percentile,
                range: "[0.0, 1.0]",
            });
        }
        if let Some(value) = self
            .type_multipliers
            .values()
            .copied()
            .find(|m| !(m.is_finite() && *m > 0.0))
        {
            return Err(Error::OutOfRange {
                name: "type_multipliers",
                value,
                range: "(0.0, inf)",
            });
        }
        Ok(())
    }

    /// The multiplier for a document type, honouring overrides.
    #[must_use]
    pub fn type_multiplier(&self, doc_type: DocumentType) -> f32 {
        self.type_multipliers
            .get(&doc_type)
            .copied()
            .unwrap_or_else(|| doc_type.default_multiplier())
    }

    /// The store key a document type learns under.
    #[must_use]
    pub fn key_for(&self, doc_type: DocumentType) -> ThresholdKey {
        match self.scope {
            ThresholdScope::PerType => ThresholdKey::Type(doc_type),
            ThresholdScope::Global => ThresholdKey::Global,
        }
    }

    /// Clamp a multiplier into the configured bounds.
    #[must_use]
    pub fn clamp(&self, multiplier: f32) -> f32 {
        multiplier.clamp(self.min_multiplier, self.max_multiplier)
    }

    /// The next multiplier after a verdict, already clamped.
    #[must_use]
    pub fn step(&self, current: f32, verdict: Verdict) -> f32 {
        let next = match verdict {
            Verdict::Useful => current - self.learning_rate,
            Verdict::Poor => current + self.learning_rate,
            Verdict::Neutral => current,
        };
        self.clamp(next)
    }
}

// =============================================================================
// Learned state
// =============================================================================

/// One learned multiplier and the feedback that shaped it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiplierState {
    /// Current multiplier.
    pub value: f32,
    /// Samples applied, including neutral ones.
    pub total_updates: u64,
    /// Samples classified useful.
    pub useful_count: u64,
    /// Samples classified poor.
    pub poor_count: u64,
    /// Sum of `avg_score` over all applied samples.
    pub score_sum: f64,
    /// Most recent multiplier values, oldest first.
    pub recent: VecDeque<f32>,
    /// Lowest multiplier observed.
    pub lowest: f32,
    /// Highest multiplier observed.
    pub highest: f32,
}

impl MultiplierState {
    /// Fresh state at `initial`.
    #[must_use]
    pub fn new(initial: f32) -> Self {
        Self {
            value: initial,
            total_updates: 0,
            useful_count: 0,
            poor_count: 0,
            score_sum: 0.0,
            recent: VecDeque::from([initial]),
            lowest: initial,
            highest: initial,
        }
    }

    /// Fold one sample into the state. Callers must hold the store's write lock.
    pub fn apply(
        &mut self,
        key: ThresholdKey,
        sample: &FeedbackSample,
        config: &ThresholdConfig,
    ) -> Adjustment {
        let verdict = config.criteria.classify(sample);
        let before = self.value;
        let after = config.step(before, verdict);

        self.value = after;
        self.total_updates += 1;
        self.score_sum += f64::from(sample.avg_score);
        match verdict {
            Verdict::Useful => self.useful_count += 1,
            Verdict::Poor => self.poor_count += 1,
            Verdict::Neutral => {}
        }
        self.recent.push_back(after);
        while self.recent.len() > HISTORY_LEN {
            self.recent.pop_front();
        }
        self.lowest = self.lowest.min(after);
        self.highest = self.highest.max(after);

        Adjustment {
            key,
            verdict,
            before,
            after,
        }
    }

    /// Summary statistics for this state.
    #[must_use]
    pub fn stats(&self) -> AdaptiveStats {
        let total = self.total_updates as f64;
        AdaptiveStats {
            total_updates: self.total_updates,
            useful_count: self.useful_count,
            poor_count: self.poor_count,
            useful_rate: if self.total_updates == 0 {
                0.0
            } else {
                self.useful_count as f64 / total
            },
            avg_retrieval_score: if self.total_updates == 0 {
                0.0
            } else {
                self.score_sum / total
            },
            current_multiplier: self.value,
            recent: self.recent.iter().copied().collect(),
            range: (self.lowest, self.highest),
        }
    }
}

/// The effect of one feedback sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adjustment {
    /// Which multiplier was touched.
    pub key: ThresholdKey,
    /// How the sample was classified.
    pub verdict: Verdict,
    /// Multiplier before the update.
    pub before: f32,
    /// Multiplier after the update and clamp.
    pub after: f32,
}

/// Learning statistics for one multiplier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdaptiveStats {
    /// Samples applied.
    pub total_updates: u64,
    /// Samples classified useful.
    pub useful_count: u64,
    /// Samples classified poor.
    pub poor_count: u64,
    /// Fraction of samples classified useful.
    pub useful_rate: f64,
    /// Mean `avg_score` across samples.
    pub avg_retrieval_score: f64,
    /// Current multiplier.
    pub current_multiplier: f32,
    /// Last few multiplier values, oldest first.
    pub recent: Vec<f32>,
    /// Lowest and highest multiplier observed.
    pub range: (f32, f32),
}

// =============================================================================
// Store
// =============================================================================

/// Holds learned multipliers shared between chunking calls.
///
/// `get` must return a consistent snapshot and `update` must apply its
/// read-modify-clamp-write atomically with respect to other updates.
pub trait ThresholdStore: Send + Sync + fmt::Debug {
    /// Snapshot of the state for `key`, or `None` if nothing was learned yet.
    fn get(&self, key: ThresholdKey) -> Option<MultiplierState>;

    /// Apply one feedback sample to `key`.
    fn update(
        &self,
        key: ThresholdKey,
        sample: &FeedbackSample,
        config: &ThresholdConfig,
    ) -> Adjustment;
}

// =============================================================================
// Controller
// =============================================================================

/// The cut-off chosen for one document and how it was derived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdDecision {
    /// The configured percentile of the document's similarities.
    pub percentile_value: f32,
    /// Static multiplier for the document type.
    pub type_multiplier: f32,
    /// Learned multiplier at the time of the read.
    pub multiplier: f32,
    /// `percentile_value × type_multiplier × multiplier`.
    pub effective: f32,
}

/// Computes per-document thresholds and applies feedback to the learned state.
///
/// ```rust
/// use cleave::{AdaptiveThreshold, DocumentType, FeedbackSample, ThresholdConfig};
///
/// let threshold = AdaptiveThreshold::new(ThresholdConfig::default()).unwrap();
/// let before = threshold.multiplier(DocumentType::General);
///
/// threshold.apply_feedback(DocumentType::General, &FeedbackSample::new(0.9, 0.95, 5, 5));
/// assert!(threshold.multiplier(DocumentType::General) < before);
/// ```
#[derive(Debug, Clone)]
pub struct AdaptiveThreshold {
    config: ThresholdConfig,
    store: Arc<dyn ThresholdStore>,
}

impl AdaptiveThreshold {
    /// Create a controller backed by an in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: ThresholdConfig) -> Result<Self> {
        Self::with_store(config, Arc::new(InMemoryThresholdStore::new()))
    }

    /// Create a controller backed by the given store.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_store(config: ThresholdConfig, store: Arc<dyn ThresholdStore>) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            initial = config.initial_multiplier,
            learning_rate = config.learning_rate,
            min = config.min_multiplier,
            max = config.max_multiplier,
            scope = ?config.scope,
            "adaptive threshold initialized"
        );
        Ok(Self { config, store })
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &ThresholdConfig {
        &self.config
    }

    /// Current learned multiplier for a document type.
    ///
    /// Stored values are re-clamped so a store written under wider bounds
    /// still reads inside the current ones.
    #[must_use]
    pub fn multiplier(&self, doc_type: DocumentType) -> f32 {
        let key = self.config.key_for(doc_type);
        self.store
            .get(key)
            .map_or(self.config.initial_multiplier, |state| {
                self.config.clamp(state.value)
            })
    }

    /// Derive the split threshold for a document's similarities.
    ///
    /// Reads the learned state; never writes it. An empty similarity slice
    /// yields a percentile of 0.0.
    #[must_use]
    pub fn decide(&self, similarities: &[f32], doc_type: DocumentType) -> ThresholdDecision {
        let percentile_value = percentile(similarities, self.config.percentile).unwrap_or(0.0);
        let type_multiplier = self.config.type_multiplier(doc_type);
        let multiplier = self.multiplier(doc_type);

        ThresholdDecision {
            percentile_value,
            type_multiplier,
            multiplier,
            effective: percentile_value * type_multiplier * multiplier,
        }
    }

    /// Fold one feedback sample into the learned state.
    pub fn apply_feedback(&self, doc_type: DocumentType, sample: &FeedbackSample) -> Adjustment {
        let key = self.config.key_for(doc_type);
        let adjustment = self.store.update(key, sample, &self.config);
        tracing::debug!(
            key = %adjustment.key,
            verdict = ?adjustment.verdict,
            before = adjustment.before,
            after = adjustment.after,
            avg_score = sample.avg_score,
            top_score = sample.top_score,
            "threshold multiplier updated"
        );
        adjustment
    }

    /// Learning statistics for a document type.
    ///
    /// `current_multiplier` is clamped like [`multiplier`](Self::multiplier).
    #[must_use]
    pub fn stats(&self, doc_type: DocumentType) -> AdaptiveStats {
        let key = self.config.key_for(doc_type);
        let mut stats = self
            .store
            .get(key)
            .unwrap_or_else(|| MultiplierState::new(self.config.initial_multiplier))
            .stats();
        stats.current_multiplier = self.config.clamp(stats.current_multiplier);
        stats
    }
}

/// Rank-based percentile with linear interpolation between closest ranks.
///
/// `p` is a fraction in [0, 1]. Returns `None` for an empty slice.
///
/// ```rust
/// use cleave::percentile;
///
/// assert_eq!(percentile(&[4.0, 1.0, 3.0, 2.0, 5.0], 0.5), Some(3.0));
/// assert_eq!(percentile(&[1.0, 2.0], 0.25), Some(1.25));
/// assert_eq!(percentile(&[], 0.2), None);
/// ```
#[must_use]
pub fn percentile(values: &[f32], p: f32) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f32::total_cmp);

    let rank = f64::from(p.clamp(0.0, 1.0)) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = (rank - lower as f64) as f32;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}
