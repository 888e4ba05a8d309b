//! Integration tests for AssetCache

use archetype_tier::loader::mock::MockResponse;
use archetype_tier::runtime::{MockSleep, MockSpawn};
use archetype_tier::{
    AssetCache, CacheConfig, LoadRequest, MockGpu, MockLoader, MockRuntime, Priority, TierError,
};
use futures::executor::block_on;
use futures::FutureExt;
use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

type TestCache = AssetCache<MockGpu, MockLoader, MockRuntime>;

/// Bytes held by one default mock asset: triangle plus a 16x16 texture
const ASSET_BYTES: u64 = 96 + 12 + 16 * 16 * 4;

fn config_bytes(ceiling_bytes: u64, ratio: f64) -> CacheConfig {
    CacheConfig {
        memory_ceiling_mb: ceiling_bytes as f64 / (1024.0 * 1024.0),
        eviction_target_ratio: ratio,
    }
}

fn build(loader: MockLoader, runtime: MockRuntime, config: CacheConfig) -> (TestCache, MockGpu) {
    let gpu = MockGpu::new();
    (AssetCache::new(gpu.clone(), loader, runtime, config), gpu)
}

fn resident_sum(cache: &TestCache) -> u64 {
    cache.resident().iter().map(|a| a.memory_bytes).sum()
}

#[test]
fn test_concurrent_loads_share_one_fetch() {
    let loader = MockLoader::new();
    let gate = loader.gate("shared.glb");
    let (cache, _) = build(
        loader.clone(),
        MockRuntime::without_deadlines(),
        CacheConfig::default(),
    );

    let mut first = Box::pin(cache.load(LoadRequest::new("shared.glb")));
    let mut second = Box::pin(cache.load(LoadRequest::new("shared.glb")));
    assert!(first.as_mut().now_or_never().is_none());
    assert!(second.as_mut().now_or_never().is_none());

    gate.open();
    let (a, b) = block_on(futures::future::join(first, second));

    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(loader.fetch_count("shared.glb"), 1);
    assert_eq!(cache.stats().entry_count, 1);
}

#[test]
fn test_timed_out_joiner_keeps_shared_load_for_others() {
    let loader = MockLoader::new();
    let gate = loader.gate("slow.glb");
    // One millisecond deadlines fire at once, thirty second ones never do
    let runtime = MockRuntime::with_behavior(
        MockSpawn::BlockSync,
        MockSleep::FireBelow(Duration::from_secs(1)),
    );
    let (cache, _) = build(loader.clone(), runtime, CacheConfig::default());
    let patient = || LoadRequest::new("slow.glb").with_deadline(Duration::from_secs(30));

    let mut first = Box::pin(cache.load(patient()));
    assert!(first.as_mut().now_or_never().is_none());

    let hasty = block_on(
        cache.load(LoadRequest::new("slow.glb").with_deadline(Duration::from_millis(1))),
    );
    assert!(matches!(hasty, Err(TierError::LoadTimeout { .. })));

    // Still joins the original fetch instead of starting another
    let mut third = Box::pin(cache.load(patient()));
    assert!(third.as_mut().now_or_never().is_none());

    gate.open();
    let (a, b) = block_on(futures::future::join(first, third));
    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(loader.fetch_count("slow.glb"), 1);
    assert_eq!(cache.metrics().misses(), 1);
}

#[test]
fn test_sole_timed_out_load_is_refetched() {
    let loader = MockLoader::new();
    let gate = loader.gate("stuck.glb");
    let (cache, _) = build(loader.clone(), MockRuntime::new(), CacheConfig::default());

    let first = block_on(cache.load(LoadRequest::new("stuck.glb")));
    assert!(matches!(first, Err(TierError::LoadTimeout { .. })));

    // Nobody else was waiting, so the next load starts over and, with the
    // gate open, finishes before its deadline is polled
    gate.open();
    assert!(block_on(cache.load(LoadRequest::new("stuck.glb"))).is_ok());
    assert_eq!(loader.fetch_count("stuck.glb"), 2);
}

#[test]
fn test_eviction_removes_low_priority_first() {
    let (cache, _) = build(
        MockLoader::new(),
        MockRuntime::new(),
        config_bytes(3500, 0.7),
    );

    let evicted = Arc::new(Mutex::new(Vec::new()));
    let sink = evicted.clone();
    cache.on_evict(move |info| sink.lock().push(info.path.to_string()));

    for (path, priority) in [
        ("low.glb", Priority::Low),
        ("high.glb", Priority::High),
        ("normal.glb", Priority::Normal),
    ] {
        block_on(cache.load(LoadRequest::new(path).with_priority(priority))).unwrap();
    }
    assert_eq!(cache.stats().total_memory_bytes, 3 * ASSET_BYTES);

    assert_eq!(cache.evict(), 1);
    assert_eq!(*evicted.lock(), vec!["low.glb".to_string()]);
    assert!(cache.contains("high.glb"));
    assert!(cache.contains("normal.glb"));
}

#[test]
fn test_insert_over_ceiling_evicts_to_target() {
    let (cache, gpu) = build(
        MockLoader::new(),
        MockRuntime::new(),
        config_bytes(3 * ASSET_BYTES, 0.6),
    );

    for path in ["a.glb", "b.glb", "c.glb", "d.glb"] {
        block_on(cache.load(LoadRequest::new(path))).unwrap();
    }

    let stats = cache.stats();
    assert!(stats.total_memory_bytes <= 3 * ASSET_BYTES);
    assert!(cache.contains("d.glb"));
    assert!(!cache.contains("a.glb"));
    assert_eq!(stats.total_memory_bytes, gpu.allocated_bytes());
}

#[test]
fn test_clear_releases_gpu_memory() {
    let (cache, gpu) = build(MockLoader::new(), MockRuntime::new(), CacheConfig::default());
    for path in ["a.glb", "b.glb"] {
        block_on(cache.load(LoadRequest::new(path))).unwrap();
    }
    assert!(gpu.allocated_bytes() > 0);

    cache.clear();
    assert_eq!(gpu.allocated_bytes(), 0);
    assert_eq!(gpu.live_resources(), 0);
    assert_eq!(cache.stats().total_memory_bytes, 0);
}

#[test]
fn test_observers_may_reenter_the_cache() {
    let (cache, _) = build(
        MockLoader::new(),
        MockRuntime::new(),
        config_bytes(2 * ASSET_BYTES, 0.5),
    );

    let seen = Arc::new(Mutex::new(Vec::new()));
    let observer_cache = cache.clone();
    let sink = seen.clone();
    cache.on_evict(move |info| {
        let stats = observer_cache.stats();
        let sum = resident_sum(&observer_cache);
        assert!(!observer_cache.contains(&info.path));
        observer_cache.set_priority("b.glb", Priority::High);
        sink.lock().push((stats.total_memory_bytes, sum));
    });

    for path in ["a.glb", "b.glb", "c.glb"] {
        block_on(cache.load(LoadRequest::new(path))).unwrap();
    }

    let seen = seen.lock();
    assert!(!seen.is_empty());
    for (total, sum) in seen.iter() {
        assert_eq!(total, sum);
    }
    assert_eq!(cache.stats().total_memory_bytes, resident_sum(&cache));
}

#[test]
fn test_removed_observer_is_not_called() {
    let (cache, _) = build(MockLoader::new(), MockRuntime::new(), CacheConfig::default());
    let calls = Arc::new(Mutex::new(0));
    let counter = calls.clone();
    let id = cache.on_evict(move |_| *counter.lock() += 1);
    assert!(cache.remove_observer(id));

    block_on(cache.load(LoadRequest::new("a.glb"))).unwrap();
    cache.clear();
    assert_eq!(*calls.lock(), 0);
}

#[test]
fn test_late_completion_after_close_releases_resources() {
    let loader = MockLoader::new();
    let gate = loader.gate("late.glb");
    let (cache, gpu) = build(loader, MockRuntime::without_deadlines(), CacheConfig::default());

    let mut pending = Box::pin(cache.load(LoadRequest::new("late.glb")));
    assert!(pending.as_mut().now_or_never().is_none());

    cache.close();
    gate.open();

    assert!(matches!(block_on(pending), Err(TierError::Disposed)));
    assert_eq!(gpu.allocated_bytes(), 0);
    assert_eq!(cache.stats().entry_count, 0);
}

#[test]
fn test_failed_load_is_not_cached() {
    let loader = MockLoader::new();
    loader.fail(
        "broken.glb",
        archetype_tier::LoadFailure::Parse("bad magic".into()),
    );
    let (cache, gpu) = build(loader.clone(), MockRuntime::new(), CacheConfig::default());

    let result = block_on(cache.load(LoadRequest::new("broken.glb")));
    assert!(matches!(result, Err(TierError::LoadError { .. })));
    assert!(!cache.contains("broken.glb"));
    assert_eq!(gpu.allocated_bytes(), 0);

    // A later request fetches again
    let _ = block_on(cache.load(LoadRequest::new("broken.glb")));
    assert_eq!(loader.fetch_count("broken.glb"), 2);
}

#[derive(Debug, Clone)]
enum Op {
    Load(usize, Priority),
    Evict,
    SetPriority(usize, Priority),
    Clear,
}

fn priority() -> impl Strategy<Value = Priority> {
    prop_oneof![
        Just(Priority::Low),
        Just(Priority::Normal),
        Just(Priority::High)
    ]
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (0..8usize, priority()).prop_map(|(i, p)| Op::Load(i, p)),
        2 => Just(Op::Evict),
        2 => (0..8usize, priority()).prop_map(|(i, p)| Op::SetPriority(i, p)),
        1 => Just(Op::Clear),
    ]
}

proptest! {
    #[test]
    fn prop_memory_accounting_is_exact(ops in prop::collection::vec(op(), 1..40)) {
        let loader = MockLoader::new();
        for i in 0..8u32 {
            let side = 4 + i * 4;
            loader.respond(
                format!("asset_{i}.glb"),
                MockResponse::Asset(MockLoader::textured_asset(side)),
            );
        }
        let (cache, gpu) = build(loader, MockRuntime::new(), config_bytes(12_000, 0.6));

        for op in ops {
            match op {
                Op::Load(i, p) => {
                    let request = LoadRequest::new(format!("asset_{i}.glb")).with_priority(p);
                    prop_assert!(block_on(cache.load(request)).is_ok());
                }
                Op::Evict => {
                    cache.evict();
                }
                Op::SetPriority(i, p) => {
                    cache.set_priority(&format!("asset_{i}.glb"), p);
                }
                Op::Clear => cache.clear(),
            }

            let stats = cache.stats();
            prop_assert_eq!(resident_sum(&cache), stats.total_memory_bytes);
            prop_assert_eq!(gpu.allocated_bytes(), stats.total_memory_bytes);
            prop_assert_eq!(cache.resident().len(), stats.entry_count);
        }
    }
}
