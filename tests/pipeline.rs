//! Pipeline tests: chunking, feedback, persistence and settings together.

use std::sync::Arc;

use cleave::{
    AdaptiveThreshold, ChunkStats, Chunker, ChunkingConfig, ChunkingFailure, DocumentType,
    EmbeddingError, EmbeddingProvider, FeedbackRecorder, FeedbackSample, JsonFileThresholdStore,
    SemanticChunker, Settings, ThresholdConfig, ThresholdScope, ThresholdStore,
};

/// Bag-of-topics embedding: one axis per topic word.
struct TopicWords;

const TOPICS: [&str; 4] = ["kernel", "harvest", "orbit", "ledger"];

impl EmbeddingProvider for TopicWords {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                TOPICS
                    .iter()
                    .map(|w| lower.matches(w).count() as f32 + 0.01)
                    .collect()
            })
            .collect())
    }

    fn max_batch_size(&self) -> Option<usize> {
        Some(7)
    }
}

/// Groups of three sentences pointing in opposite directions.
struct Alternating;

impl EmbeddingProvider for Alternating {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts
            .iter()
            .map(|t| {
                let n: usize = t
                    .split_whitespace()
                    .find_map(|w| w.parse().ok())
                    .unwrap_or(0);
                if (n / 3) % 2 == 0 {
                    vec![1.0, 0.0]
                } else {
                    vec![-1.0, 0.0]
                }
            })
            .collect())
    }
}

fn topic_document() -> String {
    let mut text = String::new();
    for topic in ["Kernel", "Harvest", "Orbit", "Ledger"] {
        for i in 0..8 {
            text.push_str(&format!("{topic} detail {i} matters here. "));
        }
    }
    text
}

fn threshold() -> AdaptiveThreshold {
    AdaptiveThreshold::new(ThresholdConfig::default()).unwrap()
}

#[test]
fn splits_document_by_topic() {
    let config = ChunkingConfig::default()
        .with_window_size(0)
        .with_batch_size(5)
        .with_max_in_flight(3);
    let chunker = SemanticChunker::new(config, Arc::new(TopicWords), threshold()).unwrap();

    let text = topic_document();
    let doc = chunker.chunk_document(&text, DocumentType::General);

    assert!(!doc.used_fallback, "fell back: {:?}", doc.fallback_reason);
    let ranges: Vec<_> = doc.chunks.iter().map(|c| c.sentence_range()).collect();
    assert_eq!(ranges, vec![0..8, 8..16, 16..24, 24..32]);
    assert!(doc.chunks[1].text.starts_with("Harvest detail 0"));
    for chunk in &doc.chunks {
        assert_eq!(&text[chunk.span()], chunk.text);
    }
    assert_eq!(doc.stats, ChunkStats::from_chunks(&doc.chunks));
    assert_eq!(doc.stats.sentence_distribution, vec![8, 8, 8, 8]);
}

#[test]
fn too_many_chunks_falls_back() {
    // Every third gap is -1.0, so every group of three becomes a chunk:
    // 10 chunks against a ceiling of max(3, 30 * 0.2) = 6.
    let text: String = (0..30).map(|i| format!("Item {i} is listed. ")).collect();
    let chunker = SemanticChunker::new(
        ChunkingConfig::default().with_window_size(0),
        Arc::new(Alternating),
        threshold(),
    )
    .unwrap();

    let doc = chunker.chunk_document(&text, DocumentType::General);

    assert!(doc.used_fallback);
    assert_eq!(
        doc.fallback_reason,
        Some(ChunkingFailure::Degenerate {
            num_chunks: 10,
            ceiling: 6
        })
    );
    assert!(doc.threshold.is_some());
    assert_eq!(doc.chunks.first().map(|c| c.start), Some(0));
    assert_eq!(doc.chunks.last().map(|c| c.end), Some(30));
}

#[test]
fn learned_multiplier_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("thresholds.json");

    {
        let store = Arc::new(JsonFileThresholdStore::open(&path).unwrap());
        let threshold = AdaptiveThreshold::with_store(ThresholdConfig::default(), store).unwrap();
        let recorder = FeedbackRecorder::new(threshold).unwrap();
        for _ in 0..4 {
            recorder.record(DocumentType::Resume, FeedbackSample::new(0.3, 0.4, 2, 5));
        }
        let counts = recorder.shutdown();
        assert_eq!(counts.applied, 4);
    }

    let store = Arc::new(JsonFileThresholdStore::open(&path).unwrap());
    assert!(store.get(cleave::ThresholdKey::Type(DocumentType::Resume)).is_some());
    let threshold = AdaptiveThreshold::with_store(ThresholdConfig::default(), store).unwrap();
    assert!((threshold.multiplier(DocumentType::Resume) - 0.34).abs() < 1e-5);
    assert_eq!(threshold.multiplier(DocumentType::General), 0.3);
    assert_eq!(threshold.stats(DocumentType::Resume).poor_count, 4);
}

#[test]
fn settings_file_drives_chunker() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cleave.json");
    std::fs::write(
        &path,
        r#"{
            "chunking": { "min_sentences": 2, "max_sentences": 8, "window_size": 0 },
            "threshold": { "scope": "global", "initial_multiplier": 0.25 }
        }"#,
    )
    .unwrap();

    let settings = Settings::from_path(&path).unwrap();
    assert_eq!(settings.threshold.scope, ThresholdScope::Global);

    let threshold = AdaptiveThreshold::new(settings.threshold.clone()).unwrap();
    let chunker = SemanticChunker::new(settings.chunking, Arc::new(TopicWords), threshold).unwrap();
    assert_eq!(chunker.config().max_sentences, 8);
    assert_eq!(chunker.threshold().multiplier(DocumentType::Resume), 0.25);

    let chunks = chunker.chunk(&topic_document());
    assert!(chunks.iter().all(|c| c.sentence_count() <= 8));
}

#[test]
fn global_scope_shares_feedback_across_types() {
    let config = ThresholdConfig::default().with_scope(ThresholdScope::Global);
    let threshold = AdaptiveThreshold::new(config).unwrap();
    let recorder = FeedbackRecorder::new(threshold.clone()).unwrap();

    recorder.record(DocumentType::Resume, FeedbackSample::new(0.95, 0.99, 3, 3));
    recorder.record(DocumentType::AcademicPaper, FeedbackSample::new(0.95, 0.99, 3, 3));
    let _ = recorder.shutdown();

    assert!((threshold.multiplier(DocumentType::General) - 0.28).abs() < 1e-5);
}

#[test]
fn concurrent_chunking_with_feedback() {
    let threshold = threshold();
    let chunker = SemanticChunker::new(
        ChunkingConfig::default().with_window_size(0),
        Arc::new(TopicWords),
        threshold.clone(),
    )
    .unwrap();
    let recorder = FeedbackRecorder::new(threshold.clone()).unwrap();
    let text = topic_document();

    std::thread::scope(|scope| {
        for worker in 0..4 {
            let chunker = chunker.clone();
            let recorder = &recorder;
            let text = &text;
            scope.spawn(move || {
                for round in 0..25 {
                    let doc = chunker.chunk_document(text, DocumentType::General);
                    assert!(!doc.chunks.is_empty());
                    let m = doc.threshold.map(|d| d.multiplier).unwrap_or(0.3);
                    assert!((0.15..=0.45).contains(&m));

                    let good = (worker + round) % 2 == 0;
                    let sample = if good {
                        FeedbackSample::new(0.9, 0.95, 5, 5)
                    } else {
                        FeedbackSample::new(0.2, 0.4, 5, 5)
                    };
                    recorder.record(DocumentType::General, sample);
                }
            });
        }
    });

    let counts = recorder.shutdown();
    assert_eq!(counts.enqueued + counts.dropped, 100);
    let stats = threshold.stats(DocumentType::General);
    assert_eq!(stats.total_updates, counts.applied);
    assert!((0.15..=0.45).contains(&stats.current_multiplier));
}
