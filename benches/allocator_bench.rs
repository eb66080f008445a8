use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rawstruct::{FieldSchema, FieldType, HeapAllocator, MmapAllocator, StructAllocator, StructSchema};
use std::hint::black_box;

fn record() -> StructSchema {
    StructSchema::new("Record")
        .with_c_compatible(true)
        .with_pad(8)
        .field(FieldSchema::new("id", FieldType::Long))
        .field(FieldSchema::new("flags", FieldType::Int))
        .field(FieldSchema::new("name", FieldType::String).with_len(16))
}

fn benchmark_heap_allocate(c: &mut Criterion) {
    let mut group = c.benchmark_group("HeapAllocator");
    let allocator = HeapAllocator::new(vec![record()]).unwrap();

    group.bench_function("allocate_free", |b| {
        b.iter(|| {
            let pointer = allocator.allocate("Record").unwrap();
            black_box(pointer.address());
        });
    });

    group.bench_function("allocate_zeroed_free", |b| {
        b.iter(|| {
            let pointer = allocator.allocate_zeroed("Record").unwrap();
            black_box(pointer.address());
        });
    });

    for count in [16, 256, 4096].iter() {
        group.bench_with_input(BenchmarkId::new("allocate_array_zeroed", count), count, |b, &count| {
            b.iter(|| {
                let array = allocator.allocate_array_zeroed(count, "Record").unwrap();
                black_box(array.byte_len());
            });
        });
    }

    group.finish();
}

fn benchmark_heap_resize(c: &mut Criterion) {
    let mut group = c.benchmark_group("HeapResize");
    let allocator = HeapAllocator::new(vec![record()]).unwrap();

    for count in [16, 256, 4096].iter() {
        group.bench_with_input(BenchmarkId::new("grow_shrink", count), count, |b, &count| {
            let mut array = allocator.allocate_array_zeroed(1, "Record").unwrap();
            b.iter(|| {
                allocator.resize(&mut array, count).unwrap();
                allocator.resize(&mut array, 1).unwrap();
            });
        });
    }

    group.finish();
}

fn benchmark_mmap_anonymous(c: &mut Criterion) {
    let mut group = c.benchmark_group("MmapAllocator");
    let allocator = MmapAllocator::new(vec![record()]).unwrap();

    for count in [16, 256, 4096].iter() {
        group.bench_with_input(BenchmarkId::new("map_anonymous", count), count, |b, &count| {
            b.iter(|| {
                let array = allocator.map_anonymous(count, "Record").unwrap();
                black_box(array.address());
            });
        });
    }

    group.bench_function("wrap_buffer", |b| {
        let mut buffer = vec![0u8; 64 * 1024];
        b.iter(|| {
            let array = allocator.wrap_buffer(&mut buffer, "Record").unwrap();
            black_box(array.size());
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_heap_allocate, benchmark_heap_resize, benchmark_mmap_anonymous);
criterion_main!(benches);
