use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};

use gk_gpu::fake::FakeBackend;
use gk_gpu::{ChunkAllocator, ROW_ALIGNMENT};

criterion_group!(benches, allocate_many_small_rows, allocate_forces_chunk_rollover);
criterion_main!(benches);

// `cargo test` also runs benchmark setup code, so keep it cheap under debug_assertions.
#[cfg(not(debug_assertions))]
const ROW_COUNT: usize = 50_000;
#[cfg(debug_assertions)]
const ROW_COUNT: usize = 16;

fn allocate_many_small_rows(c: &mut Criterion) {
    let mut group = c.benchmark_group(format!("allocator/allocate/rows={ROW_COUNT}"));
    group.throughput(Throughput::Elements(ROW_COUNT as u64));
    group.bench_function("single_growing_chunk", |b| {
        b.iter_batched(
            || {
                ChunkAllocator::new(
                    FakeBackend::arc(),
                    "bench",
                    ROW_ALIGNMENT * ROW_COUNT as u64 * 2,
                    wgpu::BufferUsages::STORAGE,
                )
            },
            |mut allocator| {
                for _ in 0..ROW_COUNT {
                    criterion::black_box(allocator.allocate(64));
                }
            },
            BatchSize::LargeInput,
        );
    });
    group.finish();
}

fn allocate_forces_chunk_rollover(c: &mut Criterion) {
    let mut group = c.benchmark_group(format!("allocator/allocate/rows={ROW_COUNT}/small_chunks"));
    group.throughput(Throughput::Elements(ROW_COUNT as u64));
    group.bench_function("many_chunk_rollovers", |b| {
        b.iter_batched(
            || {
                ChunkAllocator::new(
                    FakeBackend::arc(),
                    "bench",
                    ROW_ALIGNMENT * 8,
                    wgpu::BufferUsages::STORAGE,
                )
            },
            |mut allocator| {
                for _ in 0..ROW_COUNT {
                    criterion::black_box(allocator.allocate(64));
                }
            },
            BatchSize::LargeInput,
        );
    });
    group.finish();
}
