//! Criterion benchmarks for the trace evaluation engine.
//!
//! Covers: defence validation, utility scoring, the leak-resistant split at
//! the default exercise size, and the one-vs-rest AUC.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use stroll_core::context::EngineContext;
use stroll_core::types::{ClassId, TraceRow};
use stroll_eval::auc::one_vs_rest_auc;
use stroll_eval::split::SplitEngine;
use stroll_eval::{evaluate_utility, validate_defence, DefenceTable};

/// 100 classes, 32..=39 repetitions, 6 rows per capture.
fn reference_trace() -> Vec<TraceRow> {
    let mut rows = Vec::new();
    for class_id in 1..=100 as ClassId {
        for repetition_id in 0..(32 + u64::from(class_id % 8)) {
            for i in 0..6i64 {
                rows.push(TraceRow {
                    class_id,
                    repetition_id,
                    signed_byte_count: if i % 2 == 0 { -1500 + i } else { 200 + i },
                    timestamp: i as f64 * 0.05,
                });
            }
        }
    }
    rows
}

fn bench_validate(c: &mut Criterion) {
    let table = DefenceTable::from_rows(reference_trace());
    let ctx = EngineContext::default();

    c.bench_function("validate_defence", |b| {
        b.iter(|| validate_defence(black_box(&table), black_box(&ctx)))
    });
}

fn bench_utility(c: &mut Criterion) {
    let rows = reference_trace();

    c.bench_function("evaluate_utility", |b| {
        b.iter(|| evaluate_utility(black_box(&rows)))
    });
}

fn bench_split(c: &mut Criterion) {
    let rows = reference_trace();
    let engine = SplitEngine::new(&EngineContext::default());
    let mut rng = StdRng::seed_from_u64(0x5eed);

    c.bench_function("split_reference_trace", |b| {
        b.iter(|| engine.split_with_rng(black_box(&rows), &mut rng))
    });
}

fn bench_auc(c: &mut Criterion) {
    // 300 captures, 100 classes, random distributions.
    let mut rng = StdRng::seed_from_u64(7);
    let labels: Vec<ClassId> = (0..300).map(|i| (i % 100) as ClassId + 1).collect();
    let probabilities: Vec<Vec<f64>> = (0..300)
        .map(|_| {
            let raw: Vec<f64> = (0..100).map(|_| rng.gen_range(0.0..1.0)).collect();
            let sum: f64 = raw.iter().sum();
            raw.into_iter().map(|p| p / sum).collect()
        })
        .collect();

    c.bench_function("one_vs_rest_auc_300x100", |b| {
        b.iter(|| one_vs_rest_auc(black_box(&probabilities), black_box(&labels)))
    });
}

criterion_group!(benches, bench_validate, bench_utility, bench_split, bench_auc);
criterion_main!(benches);
