use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use filecache::{codec, CacheConfig, FileCache};
use tempfile::TempDir;

fn sample_payload() -> HashMap<String, Vec<u64>> {
    (0..64)
        .map(|i| (format!("series-{}", i), (0..32).collect()))
        .collect()
}

fn benchmark_codec(c: &mut Criterion) {
    let payload = sample_payload();
    let encoded = codec::encode(&payload, true).unwrap();

    c.bench_function("encode_gzip", |b| {
        b.iter(|| codec::encode(black_box(&payload), true))
    });
    c.bench_function("decode_gzip", |b| {
        b.iter(|| codec::decode::<HashMap<String, Vec<u64>>>(black_box(&encoded)))
    });
}

fn benchmark_cache_hit(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let cache = FileCache::new(CacheConfig::default().with_cache_dir(temp_dir.path()));
    cache.cache_value(sample_payload(), Some("hit")).unwrap();

    c.bench_function("cache_computation_hit", |b| {
        b.iter(|| {
            cache
                .cache_computation("hit", sample_payload)
                .unwrap()
        })
    });
}

fn benchmark_cache_miss(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let cache = FileCache::new(CacheConfig::default().with_cache_dir(temp_dir.path()));

    c.bench_function("cache_value_miss", |b| {
        b.iter(|| {
            cache.invalidate("miss").unwrap();
            cache.cache_value(sample_payload(), Some("miss")).unwrap()
        })
    });
}

criterion_group!(benches, benchmark_codec, benchmark_cache_hit, benchmark_cache_miss);
criterion_main!(benches);
