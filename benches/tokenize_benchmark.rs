use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use forest_engine::text::analyzer::TextProcessor;

fn sample_text(word_count: usize) -> String {
    let words = [
        "the", "quick", "brown", "fox", "jumps", "running", "studies", "linking", "notes",
        "graph", "semantic", "embedding",
    ];
    (0..word_count).map(|i| words[i % words.len()]).collect::<Vec<_>>().join(" ")
}

fn bench_tokenize(c: &mut Criterion) {
    let processor = TextProcessor::standard();
    let mut group = c.benchmark_group("tokenize");

    for word_count in [50, 500, 5000].iter() {
        let text = sample_text(*word_count);
        group.bench_with_input(BenchmarkId::from_parameter(word_count), &text, |b, text| {
            b.iter(|| {
                processor.tokenize(black_box(text));
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_tokenize);
criterion_main!(benches);
