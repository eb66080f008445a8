use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rawstruct::{FieldSchema, FieldType, HeapAllocator, StructSchema};
use std::hint::black_box;

fn schemas() -> Vec<StructSchema> {
    vec![
        StructSchema::new("Sample")
            .field(FieldSchema::new("ts", FieldType::Long))
            .field(FieldSchema::new("value", FieldType::Int))
            .field(FieldSchema::new("tag", FieldType::Byte))
            .field(FieldSchema::new("label", FieldType::String).with_len(12)),
        StructSchema::new("CSample")
            .with_c_compatible(true)
            .field(FieldSchema::new("label", FieldType::String).with_len(12)),
    ]
}

fn benchmark_scalar_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("ScalarAccess");
    let allocator = HeapAllocator::new(schemas()).unwrap();
    let pointer = allocator.allocate_zeroed("Sample").unwrap();
    let view = pointer.deref();

    group.bench_function("set_get_long", |b| {
        b.iter(|| {
            view.set_long("ts", black_box(42)).unwrap();
            black_box(view.get_long("ts").unwrap());
        });
    });

    group.bench_function("set_get_int", |b| {
        b.iter(|| {
            view.set_int("value", black_box(-7)).unwrap();
            black_box(view.get_int("value").unwrap());
        });
    });

    group.finish();
}

fn benchmark_string_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("StringAccess");
    let allocator = HeapAllocator::new(schemas()).unwrap();
    let wide = allocator.allocate_zeroed("Sample").unwrap();
    let narrow = allocator.allocate_zeroed("CSample").unwrap();

    group.bench_function("utf16", |b| {
        let view = wide.deref();
        b.iter(|| {
            view.set_string("label", black_box("sensor-0042")).unwrap();
            black_box(view.get_string("label").unwrap());
        });
    });

    group.bench_function("c_terminated", |b| {
        let view = narrow.deref();
        b.iter(|| {
            view.set_string("label", black_box("sensor-0042")).unwrap();
            black_box(view.get_string("label").unwrap());
        });
    });

    group.finish();
}

fn benchmark_array_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("ArrayScan");
    let allocator = HeapAllocator::new(schemas()).unwrap();

    for count in [64, 1024, 16384].iter() {
        group.bench_with_input(BenchmarkId::new("sum_values", count), count, |b, &count| {
            let array = allocator.allocate_array_zeroed(count, "Sample").unwrap();
            for (i, element) in array.iter().enumerate() {
                element.set_int("value", i as i32).unwrap();
            }

            b.iter(|| {
                let sum: i64 = array
                    .iter()
                    .map(|element| i64::from(element.get_int("value").unwrap()))
                    .sum();
                black_box(sum);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_scalar_access, benchmark_string_access, benchmark_array_scan);
criterion_main!(benches);
