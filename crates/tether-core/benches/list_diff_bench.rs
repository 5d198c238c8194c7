//! Benchmarks for list diff computation and replay.
//!
//! Run with: cargo bench -p tether-core --bench list_diff_bench

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use tether_core::{ListDiff, ListDiffVisitor};

/// A list of `len` elements and a copy with every `stride`-th element changed.
fn make_pair(len: usize, stride: usize) -> (Vec<u32>, Vec<u32>) {
    let old: Vec<u32> = (0..len as u32).collect();
    let new = old
        .iter()
        .enumerate()
        .map(|(i, v)| if i % stride == 0 { v + 1_000_000 } else { *v })
        .collect();
    (old, new)
}

struct Count(usize);

impl ListDiffVisitor<u32> for Count {
    fn handle_add(&mut self, _index: usize, _element: &u32) {
        self.0 += 1;
    }

    fn handle_remove(&mut self, _index: usize, _element: &u32) {
        self.0 += 1;
    }

    fn handle_replace(&mut self, _index: usize, _old: &u32, _new: &u32) {
        self.0 += 1;
    }
}

fn bench_compute(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_diff/compute");
    for len in [64usize, 256, 1024] {
        group.throughput(Throughput::Elements(len as u64));
        for stride in [2usize, 16] {
            let (old, new) = make_pair(len, stride);
            group.bench_with_input(
                BenchmarkId::new(format!("every_{stride}"), len),
                &(),
                |b, _| b.iter(|| black_box(ListDiff::compute(&old, &new))),
            );
        }
    }
    group.finish();
}

fn bench_single_edit(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_diff/single_edit");
    for len in [256usize, 4096] {
        let old: Vec<u32> = (0..len as u32).collect();
        let mut new = old.clone();
        new.insert(len / 2, u32::MAX);
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::new("insert_middle", len), &(), |b, _| {
            b.iter(|| black_box(ListDiff::compute(&old, &new)))
        });
    }
    group.finish();
}

fn bench_accept(c: &mut Criterion) {
    let (old, new) = make_pair(1024, 4);
    let diff = ListDiff::compute(&old, &new);
    c.bench_function("list_diff/accept_1024", |b| {
        b.iter(|| {
            let mut count = Count(0);
            diff.accept(&mut count);
            black_box(count.0)
        })
    });
}

criterion_group!(benches, bench_compute, bench_single_edit, bench_accept);
criterion_main!(benches);
