use criterion::{black_box, criterion_group, criterion_main, Criterion};

use hf_core::{evaluate, BlockDuration, Candidate, Category, ManualClock, MemoryBackend, RuleStore};

fn bench_evaluate(c: &mut Criterion) {
    let clock = ManualClock::new(1_700_000_000_000);
    let mut store = RuleStore::open(MemoryBackend::new(), &clock);
    for i in 0..200 {
        store.add_block(Category::Tags, &format!("tag-{i}"), BlockDuration::Week);
        store.add_block(Category::Authors, &format!("author-{i}"), BlockDuration::Permanent);
    }

    let visible = Candidate::for_item(["rust", "go", "linux", "open source"], Some("someone"));
    let hidden = Candidate::for_item(["rust", "tag-17", "tag-17", "tag-150"], Some("author-3"));

    c.bench_function("evaluate_visible", |b| {
        b.iter(|| evaluate(&mut store, black_box(&visible)))
    });
    c.bench_function("evaluate_hidden", |b| {
        b.iter(|| evaluate(&mut store, black_box(&hidden)))
    });
}

criterion_group!(benches, bench_evaluate);
criterion_main!(benches);
