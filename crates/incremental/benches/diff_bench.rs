//! Benchmarks for ripple-incremental.
//!
//! Target: diff of a 1000 element snapshot with a handful of edits < 100μs

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ripple_incremental::{diff_ordered, RecordChange};

fn snapshot(len: u64) -> Vec<(u64, u64)> {
    (0..len).map(|id| (id, 1)).collect()
}

fn bench_record_change(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_change");

    group.bench_function("create_insert", |b| {
        b.iter(|| RecordChange::insert(black_box(42u64), black_box(3)))
    });

    group.bench_function("create_move", |b| {
        b.iter(|| RecordChange::moved(black_box(42u64), black_box(3), black_box(7)))
    });

    group.finish();
}

fn bench_diff_few_edits(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff_few_edits");

    for size in [10u64, 100, 1000, 10000] {
        let old = snapshot(size);
        let mut new = old.clone();
        new.remove(0);
        new.push((size + 1, 1));
        if let Some(last) = new.first_mut() {
            last.1 = 2;
        }

        group.bench_with_input(BenchmarkId::new("remove_insert_update", size), &(old, new), |b, (old, new)| {
            b.iter(|| diff_ordered(black_box(old), black_box(new), |e| e.0, |a, b| a.1 != b.1))
        });
    }

    group.finish();
}

fn bench_diff_move_to_front(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff_move_to_front");

    for size in [10u64, 100, 1000] {
        let old = snapshot(size);
        let mut new = old.clone();
        let last = new.pop();
        if let Some(last) = last {
            new.insert(0, (last.0, last.1 + 1));
        }

        group.bench_with_input(BenchmarkId::new("bump", size), &(old, new), |b, (old, new)| {
            b.iter(|| diff_ordered(black_box(old), black_box(new), |e| e.0, |a, b| a.1 != b.1))
        });
    }

    group.finish();
}

fn bench_diff_reverse(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff_reverse");

    for size in [10u64, 100, 1000] {
        let old = snapshot(size);
        let new: Vec<(u64, u64)> = old.iter().rev().copied().collect();

        group.bench_with_input(BenchmarkId::new("reverse", size), &(old, new), |b, (old, new)| {
            b.iter(|| diff_ordered(black_box(old), black_box(new), |e| e.0, |_, _| false))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_record_change,
    bench_diff_few_edits,
    bench_diff_move_to_front,
    bench_diff_reverse,
);
criterion_main!(benches);
