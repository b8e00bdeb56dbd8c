//! Selection policy benchmarks using criterion.
//!
//! Measures each policy in isolation, without a scheduler running
//! underneath: branch draws at fixed chances, every dispatch policy in every
//! dispatch mode, and the present/absent paths of the nullable check.
//!
//! Run with: cargo bench --bench policy_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use perturb_runtime::policy::{branch, nullable};
use perturb_runtime::scenario::nmorphic::{START, STEP};
use perturb_runtime::{Calculators, DispatchMode, DispatchPolicy, Sink};
use rand::rngs::SmallRng;
use rand::SeedableRng;

const SEED: u64 = 0x5eed;

/// Benchmark the biased branch at a range of chances
fn bench_branch(c: &mut Criterion) {
    let mut group = c.benchmark_group("branch");
    group.throughput(Throughput::Elements(1));

    for chance in [0.0, 0.01, 0.1, 0.3, 0.5, 1.0] {
        group.bench_with_input(BenchmarkId::from_parameter(chance), &chance, |b, &chance| {
            let mut rng = SmallRng::seed_from_u64(SEED);
            let sink = Sink::new();
            b.iter(|| {
                let outcome = branch::draw(&mut rng, black_box(chance));
                sink.add(branch::take_branch(outcome));
            });
            black_box(sink.get());
        });
    }

    group.finish();
}

/// Benchmark select-then-invoke for every policy and mode
fn bench_dispatch(c: &mut Criterion) {
    let calculators = Calculators::new();

    for mode in DispatchMode::ALL {
        let mut group = c.benchmark_group(format!("dispatch_{}", mode.as_str()));
        group.throughput(Throughput::Elements(1));

        for policy in DispatchPolicy::ALL {
            group.bench_function(policy.as_str(), |b| {
                let mut rng = SmallRng::seed_from_u64(SEED);
                let sink = Sink::new();
                b.iter(|| {
                    let kind = policy.select(&mut rng, &sink);
                    let result = mode.invoke(&calculators, kind, black_box(START), black_box(STEP));
                    sink.add(result as i64);
                });
                black_box(sink.get());
            });
        }

        group.finish();
    }
}

/// Benchmark the nullable check on both paths
fn bench_nullable(c: &mut Criterion) {
    let mut group = c.benchmark_group("nullable");

    for phase in [0, 1] {
        let label = if nullable::value_for(phase).is_some() { "present" } else { "absent" };
        group.bench_function(label, |b| {
            let sink = Sink::new();
            b.iter(|| {
                let value = nullable::value_for(black_box(phase));
                if let Ok(upper) = nullable::safe_upper(value) {
                    sink.add(nullable::string_hash(&upper) as i64);
                }
            });
            black_box(sink.get());
        });
    }

    group.finish();
}

criterion_group!(policy_benches, bench_branch, bench_dispatch, bench_nullable);
criterion_main!(policy_benches);
