//! Benchmark: Cache hit performance

use archetype_tier::{AssetCache, CacheConfig, LoadRequest, MockGpu, MockLoader, MockRuntime};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use futures::executor::block_on;

fn cache_hit_perf_benchmark(c: &mut Criterion) {
    let cache = AssetCache::new(
        MockGpu::new(),
        MockLoader::new(),
        MockRuntime::new(),
        CacheConfig::default(),
    );
    for i in 0..64 {
        block_on(cache.load(LoadRequest::new(format!("asset_{i}.glb")))).unwrap();
    }

    c.bench_function("cache_resident_hit", |b| {
        b.iter(|| black_box(block_on(cache.load(LoadRequest::new("asset_17.glb")))))
    });

    c.bench_function("cache_stats", |b| b.iter(|| black_box(cache.stats())));

    c.bench_function("cache_resident_listing", |b| {
        b.iter(|| black_box(cache.resident().len()))
    });
}

criterion_group!(benches, cache_hit_perf_benchmark);
criterion_main!(benches);
