//! Allocator benchmarks
//!
//! Measures the fail-fast paths used from the real-time thread.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dynparam_rtmem::{Capability, MemoryConfig, RtMemory, RtString, TypedPool};

fn benchmark_typed_pool(c: &mut Criterion) {
    let pool: TypedPool<[u64; 8]> = TypedPool::new("bench", 64, 128).unwrap();

    c.bench_function("typed_pool_try_alloc_drop", |b| {
        b.iter(|| {
            let boxed = pool.try_alloc(black_box([7; 8])).unwrap();
            black_box(&boxed);
        })
    });
}

fn benchmark_size_classes(c: &mut Criterion) {
    let mut group = c.benchmark_group("rt_memory");
    let memory = RtMemory::new(&MemoryConfig::large()).unwrap();

    for size in [16usize, 1000, 4000, 60000].iter() {
        group.bench_function(format!("try_allocate_{}_bytes", size), |b| {
            b.iter(|| {
                let block = memory.allocate(Capability::Atomic, black_box(*size)).unwrap();
                black_box(block.capacity());
            })
        });
    }

    group.bench_function("string_copy", |b| {
        b.iter(|| {
            let name = RtString::try_from_str(&memory, black_box("filter/cutoff")).unwrap();
            black_box(name.len());
        })
    });

    group.finish();
}

criterion_group!(benches, benchmark_typed_pool, benchmark_size_classes);
criterion_main!(benches);
