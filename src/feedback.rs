//! Fire-and-forget delivery of retrieval feedback to the adaptive threshold.
//!
//! The query pipeline calls [`FeedbackRecorder::record`] once per answered
//! query. The call only enqueues: a bounded channel feeds a dedicated worker
//! thread that applies samples to the threshold store one at a time.
//!
//! ```text
//! query pipeline ──try_send──▶ [ queue (1024) ] ──▶ worker ──▶ AdaptiveThreshold
//!                     │
//!                     └── full? log, count, drop
//! ```
//!
//! Samples carry no ordering requirement; delayed or reordered delivery is
//! fine. The caller never waits.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::{AdaptiveThreshold, DocumentType, Error, FeedbackSample, Result};

/// Queue capacity used by [`FeedbackRecorder::new`].
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Why a feedback sample was not recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FeedbackDropped {
    /// The queue was full.
    #[error("feedback queue full")]
    QueueFull,
    /// The worker has shut down.
    #[error("feedback recorder closed")]
    Closed,
    /// The sample had non-finite scores.
    #[error("feedback sample has non-finite scores")]
    InvalidSample,
}

/// Delivery counters for a recorder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedbackCounts {
    /// Samples accepted into the queue.
    pub enqueued: u64,
    /// Samples applied to the threshold.
    pub applied: u64,
    /// Samples dropped before reaching the queue.
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    enqueued: AtomicU64,
    applied: AtomicU64,
    dropped: AtomicU64,
}

struct Message {
    doc_type: DocumentType,
    sample: FeedbackSample,
}

/// Forwards feedback samples to an [`AdaptiveThreshold`] without blocking.
///
/// ```rust
/// use cleave::{AdaptiveThreshold, DocumentType, FeedbackRecorder, FeedbackSample, ThresholdConfig};
///
/// let threshold = AdaptiveThreshold::new(ThresholdConfig::default()).unwrap();
/// let recorder = FeedbackRecorder::new(threshold.clone()).unwrap();
///
/// recorder.record(DocumentType::General, FeedbackSample::new(0.9, 0.95, 5, 5));
/// let counts = recorder.shutdown();
///
/// assert_eq!(counts.applied, 1);
/// assert!(threshold.multiplier(DocumentType::General) < 0.3);
/// ```
#[derive(Debug)]
pub struct FeedbackRecorder {
    tx: Option<mpsc::Sender<Message>>,
    worker: Option<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl FeedbackRecorder {
    /// Start a recorder with the default queue capacity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Spawn`] if the worker thread cannot be started.
    pub fn new(threshold: AdaptiveThreshold) -> Result<Self> {
        Self::with_capacity(threshold, DEFAULT_QUEUE_CAPACITY)
    }

    /// Start a recorder with a specific queue capacity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ZeroSize`] if `capacity == 0`, or [`Error::Spawn`] if
    /// the worker thread cannot be started.
    pub fn with_capacity(threshold: AdaptiveThreshold, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::ZeroSize {
                name: "feedback queue capacity",
            });
        }
        let (tx, mut rx) = mpsc::channel::<Message>(capacity);
        let counters = Arc::new(Counters::default());

        let worker_counters = Arc::clone(&counters);
        let worker = std::thread::Builder::new()
            .name("cleave-feedback".into())
            .spawn(move || {
                while let Some(Message { doc_type, sample }) = rx.blocking_recv() {
                    threshold.apply_feedback(doc_type, &sample);
                    worker_counters.applied.fetch_add(1, Ordering::Relaxed);
                }
                tracing::debug!("feedback worker stopped");
            })
            .map_err(|source| Error::Spawn {
                name: "feedback",
                source,
            })?;

        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
            counters,
        })
    }

    /// Record one sample. Never blocks and never fails the caller.
    ///
    /// Drops are logged and counted; use [`try_record`](Self::try_record) to
    /// observe them directly.
    pub fn record(&self, doc_type: DocumentType, sample: FeedbackSample) {
        if let Err(reason) = self.try_record(doc_type, sample) {
            tracing::warn!(%doc_type, %reason, "feedback sample dropped");
        }
    }

    /// Record the scores of one answered query.
    pub fn record_feedback(
        &self,
        avg_score: f32,
        top_score: f32,
        result_count: usize,
        requested_count: usize,
        doc_type: DocumentType,
    ) {
        self.record(
            doc_type,
            FeedbackSample::new(avg_score, top_score, result_count, requested_count),
        );
    }

    /// Record one sample, reporting whether it was enqueued.
    ///
    /// # Errors
    ///
    /// Returns why the sample was dropped.
    pub fn try_record(
        &self,
        doc_type: DocumentType,
        sample: FeedbackSample,
    ) -> std::result::Result<(), FeedbackDropped> {
        let result = if !sample.is_valid() {
            Err(FeedbackDropped::InvalidSample)
        } else {
            match &self.tx {
                Some(tx) => tx
                    .try_send(Message { doc_type, sample })
                    .map_err(|e| match e {
                        TrySendError::Full(_) => FeedbackDropped::QueueFull,
                        TrySendError::Closed(_) => FeedbackDropped::Closed,
                    }),
                None => Err(FeedbackDropped::Closed),
            }
        };

        match result {
            Ok(()) => self.counters.enqueued.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.counters.dropped.fetch_add(1, Ordering::Relaxed),
        };
        result
    }

    /// Current delivery counters.
    #[must_use]
    pub fn counts(&self) -> FeedbackCounts {
        FeedbackCounts {
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            applied: self.counters.applied.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting samples, apply everything queued, and return the final counts.
    #[must_use]
    pub fn shutdown(mut self) -> FeedbackCounts {
        self.close();
        self.counts()
    }

    fn close(&mut self) {
        drop(self.tx.take());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("feedback worker panicked");
            }
        }
    }
}

impl Drop for FeedbackRecorder {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FeedbackSample, ThresholdConfig};

    fn threshold() -> AdaptiveThreshold {
        AdaptiveThreshold::new(ThresholdConfig::default()).unwrap()
    }

    #[test]
    fn test_samples_reach_threshold() {
        let threshold = threshold();
        let recorder = FeedbackRecorder::new(threshold.clone()).unwrap();
        for _ in 0..5 {
            recorder.record_feedback(0.2, 0.3, 5, 5, DocumentType::Resume);
        }
        let counts = recorder.shutdown();

        assert_eq!(counts.enqueued, 5);
        assert_eq!(counts.applied, 5);
        assert_eq!(counts.dropped, 0);
        assert!((threshold.multiplier(DocumentType::Resume) - 0.35).abs() < 1e-5);
    }

    #[test]
    fn test_invalid_sample_dropped() {
        let recorder = FeedbackRecorder::new(threshold()).unwrap();
        let result = recorder.try_record(
            DocumentType::General,
            FeedbackSample::new(f32::NAN, 0.9, 5, 5),
        );
        assert_eq!(result, Err(FeedbackDropped::InvalidSample));
        assert_eq!(recorder.shutdown().dropped, 1);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            FeedbackRecorder::with_capacity(threshold(), 0),
            Err(Error::ZeroSize { .. })
        ));
    }

    #[test]
    fn test_full_queue_drops_instead_of_blocking() {
        let recorder = FeedbackRecorder::with_capacity(threshold(), 1).unwrap();
        let sample = FeedbackSample::new(0.9, 0.95, 5, 5);

        // The worker may drain between sends, so only the totals are exact.
        let outcomes: Vec<_> = (0..1000)
            .map(|_| recorder.try_record(DocumentType::General, sample))
            .collect();
        let dropped = outcomes.iter().filter(|r| r.is_err()).count() as u64;
        assert!(outcomes
            .iter()
            .all(|r| matches!(r, Ok(()) | Err(FeedbackDropped::QueueFull))));

        let counts = recorder.shutdown();
        assert_eq!(counts.dropped, dropped);
        assert_eq!(counts.enqueued + counts.dropped, 1000);
        assert_eq!(counts.applied, counts.enqueued);
    }

    #[test]
    fn test_concurrent_producers() {
        let threshold = threshold();
        let recorder = Arc::new(FeedbackRecorder::new(threshold.clone()).unwrap());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let recorder = Arc::clone(&recorder);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        recorder.record(
                            DocumentType::General,
                            FeedbackSample::new(0.1, 0.2, 1, 5),
                        );
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let recorder = Arc::try_unwrap(recorder).unwrap();
        let counts = recorder.shutdown();
        assert_eq!(counts.enqueued + counts.dropped, 200);
        assert_eq!(threshold.multiplier(DocumentType::General), 0.45);
    }
}
