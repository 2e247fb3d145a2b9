//! Insert, query and codec throughput.

use bloomsync_filter::{BloomFilter, FilterParams};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn ids(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("element-{i:08}")).collect()
}

fn filled(items: &[String], rate: f64) -> BloomFilter {
    let params = FilterParams::new(items.len() as u64, rate).seed(1);
    let mut filter = BloomFilter::with_params(params).unwrap();
    for item in items {
        filter.insert(item);
    }
    filter
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    for size in [1_000usize, 100_000] {
        let items = ids(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &items, |b, items| {
            b.iter(|| filled(black_box(items), 0.01));
        });
    }
    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let items = ids(100_000);
    let filter = filled(&items, 0.01);
    let lookups = ids(200_000);

    c.bench_function("query/100000", |b| {
        b.iter(|| {
            lookups
                .iter()
                .filter(|p| filter.possibly_contains(black_box(p)))
                .count()
        });
    });
}

fn bench_codec(c: &mut Criterion) {
    let filter = filled(&ids(100_000), 0.01);
    let encoded = filter.serialize();

    c.bench_function("encode/100000", |b| b.iter(|| black_box(&filter).serialize()));
    c.bench_function("decode/100000", |b| {
        b.iter(|| BloomFilter::deserialize(black_box(&encoded)).unwrap())
    });
}

criterion_group!(benches, bench_insert, bench_query, bench_codec);
criterion_main!(benches);
