// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use lsm_zdd_index::Storage;

fn bench_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("Storage::set");
    for size in [1_000u32, 10_000, 100_000] {
        group.bench_with_input(BenchmarkId::new("sequential_keys", size), &size, |b, &size| {
            b.iter(|| {
                let storage = Storage::with_key_len(4);
                for i in 0..size {
                    storage.set(&i.to_be_bytes(), i);
                }
            })
        });
    }
    group.finish();
}

fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("Storage::get_level");
    for size in [1_000u32, 10_000, 100_000] {
        let storage = Storage::with_key_len(4);
        for i in 0..size {
            storage.set(&i.to_be_bytes(), i);
        }
        group.bench_with_input(BenchmarkId::new("hit", size), &size, |b, &size| {
            b.iter(|| storage.get_level(&(size / 2).to_be_bytes()))
        });
    }
    group.finish();
}

fn bench_delete_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("Storage::delete_churn");
    group.bench_function("insert_then_delete_half", |b| {
        b.iter(|| {
            let storage = Storage::with_key_len(4);
            for i in 0..10_000u32 {
                storage.set(&i.to_be_bytes(), i);
            }
            for i in (0..10_000u32).step_by(2) {
                storage.delete(&i.to_be_bytes());
            }
        })
    });
    group.finish();
}

criterion_group!(benches, bench_set, bench_get, bench_delete_churn);
criterion_main!(benches);
