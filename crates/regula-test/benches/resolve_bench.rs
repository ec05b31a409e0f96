//! Benchmarks for bitemporal resolution and time travel

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use regula_core::{KnowledgeDate, LegalDate};
use regula_test::long_history;
use regula_time::{knowledge_timeline, legal_timeline, resolve};

fn bench_resolve(c: &mut Criterion) {
    let Ok(s) = long_history("R", 200) else {
        return;
    };
    let Ok(snapshot) = s.engine.snapshot(&s.instrument) else {
        return;
    };
    let (Some(legal), Some(known)) = (
        LegalDate::from_ymd_opt(2005, 6, 1),
        KnowledgeDate::from_ymd_opt(2010, 1, 1),
    ) else {
        return;
    };

    c.bench_function("resolve_point", |b| {
        b.iter(|| black_box(resolve(&snapshot.history, black_box(legal), black_box(known))))
    });

    c.bench_function("engine_resolve_point", |b| {
        b.iter(|| black_box(s.engine.resolve(&s.instrument, black_box(legal), black_box(known))))
    });
}

fn bench_legal_timeline(c: &mut Criterion) {
    let Ok(s) = long_history("R", 200) else {
        return;
    };
    let Ok(snapshot) = s.engine.snapshot(&s.instrument) else {
        return;
    };
    let Some(known) = KnowledgeDate::from_ymd_opt(2010, 1, 1) else {
        return;
    };

    c.bench_function("legal_timeline", |b| {
        b.iter(|| black_box(legal_timeline(&snapshot.history, black_box(known))))
    });
}

fn bench_knowledge_timeline(c: &mut Criterion) {
    let Ok(s) = long_history("R", 200) else {
        return;
    };
    let Ok(snapshot) = s.engine.snapshot(&s.instrument) else {
        return;
    };
    let Some(legal) = LegalDate::from_ymd_opt(2005, 6, 1) else {
        return;
    };

    c.bench_function("knowledge_timeline", |b| {
        b.iter(|| black_box(knowledge_timeline(&snapshot.history, black_box(legal))))
    });
}

criterion_group!(
    benches,
    bench_resolve,
    bench_legal_timeline,
    bench_knowledge_timeline,
);
criterion_main!(benches);
