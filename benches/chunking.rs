//! Benchmarks for segmentation, assembly and the full chunking pipeline.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use cleave::{
    adjacent_similarities, segment, AdaptiveThreshold, ChunkAssembler, ChunkingConfig,
    DocumentType, EmbeddingError, EmbeddingProvider, SemanticChunker, SentenceBounds,
    ThresholdConfig,
};

fn sample_text(size: usize) -> String {
    // Generate realistic text with sentence structure
    let sentences = [
        "The quick brown fox jumps over the lazy dog. ",
        "Pack my box with five dozen liquor jugs. ",
        "How vexingly quick daft zebras jump! ",
        "The five boxing wizards jump quickly. ",
        "Sphinx of black quartz, judge my vow. ",
    ];
    let mut text = String::with_capacity(size);
    let mut i = 0;
    while text.len() < size {
        text.push_str(sentences[i % sentences.len()]);
        i += 1;
    }
    text.truncate(size);
    text
}

/// Feature-hashed bag of words, so embeddings cost roughly what reading the text costs.
struct HashingProvider {
    dim: usize,
}

impl EmbeddingProvider for HashingProvider {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0; self.dim];
                for word in text.split_whitespace() {
                    let mut hasher = DefaultHasher::new();
                    word.hash(&mut hasher);
                    v[(hasher.finish() as usize) % self.dim] += 1.0;
                }
                v
            })
            .collect())
    }
}

fn bench_segment(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment");

    for size in [1_000, 10_000, 100_000] {
        let text = sample_text(size);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("uax29", size), &text, |b, text| {
            b.iter(|| segment(black_box(text)))
        });
    }

    group.finish();
}

fn bench_assemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("assemble");
    let assembler = ChunkAssembler::new(SentenceBounds::default());
    let provider = HashingProvider { dim: 64 };

    for size in [10_000, 100_000] {
        let sentences = segment(&sample_text(size));
        let texts: Vec<String> = sentences.iter().map(|s| s.text.clone()).collect();
        let Ok(embeddings) = provider.embed_batch(&texts) else {
            continue;
        };
        let sims = adjacent_similarities(&embeddings);

        group.throughput(Throughput::Elements(sentences.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("greedy_merge", sentences.len()),
            &(sentences, sims),
            |b, (sentences, sims)| b.iter(|| assembler.assemble(black_box(sentences), sims, 0.3)),
        );
    }

    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");

    let threshold = AdaptiveThreshold::new(ThresholdConfig::default()).unwrap();
    let provider = Arc::new(HashingProvider { dim: 128 });
    for (name, config) in [
        ("sequential", ChunkingConfig::default()),
        ("in_flight_4", ChunkingConfig::default().with_batch_size(32).with_max_in_flight(4)),
    ] {
        let chunker = SemanticChunker::new(config, provider.clone(), threshold.clone()).unwrap();

        for size in [10_000, 50_000] {
            let text = sample_text(size);

            group.throughput(Throughput::Bytes(size as u64));
            group.bench_with_input(BenchmarkId::new(name, size), &text, |b, text| {
                b.iter(|| chunker.chunk_document(black_box(text), DocumentType::General))
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_segment, bench_assemble, bench_pipeline);
criterion_main!(benches);
