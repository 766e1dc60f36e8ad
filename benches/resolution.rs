//! Performance benchmarks for flag and compliance resolution.
//!
//! Run with: `cargo bench --bench resolution`
//!
//! ## Performance Targets
//!
//! | Operation | Target | Notes |
//! |-----------|--------|-------|
//! | Single flag, station | <2µs | Four-link chain walk |
//! | All flags, station | <20µs | One chain, every flag |
//! | Upsert (memory store) | <200µs | Includes snapshot capture |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use factory_capability_kernel::{
    seed, CapabilityFlag, EntityId, FactoryKernel, InMemorySnapshotStore, KernelConfig, Scope,
};

fn kernel_with_flags(extra_flags: usize) -> FactoryKernel<InMemorySnapshotStore> {
    let mut kernel = FactoryKernel::with_state(
        KernelConfig::default(),
        InMemorySnapshotStore::new(),
        seed::seed_state(),
    );
    for i in 0..extra_flags {
        let id = format!("BENCH_FLAG_{}", i);
        kernel
            .register_flag(CapabilityFlag::new(id.as_str(), "Bench flag", "BENCH", i % 2 == 0), "bench")
            .unwrap();
        if i % 3 == 0 {
            kernel
                .upsert_override(&id.as_str().into(), Scope::Plant, &"FAC-WB-01".into(), true, "bench")
                .unwrap();
        }
    }
    kernel
}

/// Benchmark one flag resolved at each depth of the topology.
fn bench_single_flag_by_depth(c: &mut Criterion) {
    let mut kernel = kernel_with_flags(0);
    kernel
        .upsert_override(&"STRICT_GATING".into(), Scope::Enterprise, &"ENT-01".into(), false, "bench")
        .unwrap();
    let flag = EntityId::from("STRICT_GATING");

    let mut group = c.benchmark_group("single_flag");
    for (scope, node) in [
        (Scope::Global, "GLOBAL"),
        (Scope::Enterprise, "ENT-01"),
        (Scope::Plant, "FAC-WB-01"),
        (Scope::Line, "LINE-A"),
        (Scope::Station, "STN-A4"),
    ] {
        let node = EntityId::from(node);
        group.bench_with_input(BenchmarkId::from_parameter(scope), &node, |b, node| {
            b.iter(|| kernel.effective_flag(black_box(&flag), scope, black_box(node)).unwrap())
        });
    }
    group.finish();
}

/// Benchmark resolving every flag at a station as the registry grows.
fn bench_all_flags(c: &mut Criterion) {
    let mut group = c.benchmark_group("all_flags_station");
    for extra in [0usize, 50, 500] {
        let kernel = kernel_with_flags(extra);
        let total = kernel.state().flags().len();
        let station = EntityId::from("STN-A4");

        group.throughput(Throughput::Elements(total as u64));
        group.bench_with_input(BenchmarkId::from_parameter(total), &station, |b, station| {
            b.iter(|| kernel.effective_flags(Scope::Station, black_box(station)).unwrap())
        });
    }
    group.finish();
}

/// Benchmark compliance resolution.
fn bench_compliance(c: &mut Criterion) {
    let kernel = kernel_with_flags(0);
    let station = EntityId::from("STN-A4");

    c.bench_function("compliance_station", |b| {
        b.iter(|| kernel.effective_compliance(Scope::Station, black_box(&station)).unwrap())
    });
}

/// Benchmark the full mutation path (audit + snapshot capture + save).
fn bench_upsert(c: &mut Criterion) {
    let mut kernel = kernel_with_flags(0);
    let flag = EntityId::from("AUTO_RELEASE");
    let line = EntityId::from("LINE-A");
    let mut value = false;

    c.bench_function("upsert_override_memory_store", |b| {
        b.iter(|| {
            value = !value;
            kernel
                .upsert_override(&flag, Scope::Line, &line, black_box(value), "bench")
                .unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_single_flag_by_depth,
    bench_all_flags,
    bench_compliance,
    bench_upsert,
);
criterion_main!(benches);
