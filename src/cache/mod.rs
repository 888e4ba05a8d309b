//! Asset caching with priority-then-LRU eviction
//!
//! The cache owns every loaded asset's GPU resources. Concurrent loads of
//! one path share a single in-flight future, and a soft memory ceiling is
//! enforced by evicting the least valuable entries before inserting.
//!
//! Bookkeeping lives behind one `parking_lot` mutex that is never held
//! across an await point or while eviction observers run, so observers may
//! call back into the cache.

pub mod entry;
pub mod metrics;

use futures::future::{self, Either, FutureExt, Shared};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;
use xxhash_rust::xxh3::xxh3_64;

use crate::config::CacheConfig;
use crate::error::{Result, TierError};
use crate::gpu::{GpuAsset, GpuDevice};
use crate::loader::{AssetLoader, LoadFailure};
use crate::optimize::optimize;
use crate::runtime::{BoxFuture, HostRuntime};
use entry::CacheEntry;
use metrics::CacheMetrics;

pub use entry::{AssetHandle, AssetInfo, Priority};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// One request to [`AssetCache::load`]
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub path: String,
    pub priority: Priority,
    /// Texture downsampling factor in (0, 1]
    pub texture_scale: f32,
    /// Time allowed before the caller gets `LoadTimeout`
    pub deadline: Duration,
}

impl LoadRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            priority: Priority::Normal,
            texture_scale: 1.0,
            deadline: Duration::from_secs(30),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_texture_scale(mut self, scale: f32) -> Self {
        self.texture_scale = scale;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }
}

/// Point-in-time cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub entry_count: usize,
    pub total_memory_bytes: u64,
    pub total_memory_mb: f64,
    pub utilization_percent: f64,
    pub hit_rate_percent: f32,
}

/// Identifies a registered eviction observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type EvictObserver = Arc<dyn Fn(&AssetInfo) + Send + Sync>;
type SharedLoad = Shared<BoxFuture<'static, Result<AssetHandle>>>;

struct InFlight {
    id: Uuid,
    load: SharedLoad,
}

struct CacheState<G: GpuDevice> {
    entries: HashMap<u64, CacheEntry<G>>,
    in_flight: HashMap<u64, InFlight>,
    total_bytes: u64,
    next_seq: u64,
    closed: bool,
}

impl<G: GpuDevice> CacheState<G> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            in_flight: HashMap::new(),
            total_bytes: 0,
            next_seq: 0,
            closed: false,
        }
    }

    /// Remove least valuable entries until `total_bytes + incoming <= target`.
    ///
    /// Payloads are dropped here, which releases their GPU resources.
    fn evict_until(&mut self, target: u64, incoming: u64) -> Vec<AssetInfo> {
        let mut evicted = Vec::new();
        if self.total_bytes + incoming <= target {
            return evicted;
        }

        let mut ranked: Vec<_> = self
            .entries
            .iter()
            .map(|(key, entry)| (entry.eviction_rank(), *key))
            .collect();
        ranked.sort_unstable();

        for (_, key) in ranked {
            if self.total_bytes + incoming <= target {
                break;
            }
            if let Some(entry) = self.remove(key) {
                evicted.push(entry.info());
            }
        }
        evicted
    }

    fn remove(&mut self, key: u64) -> Option<CacheEntry<G>> {
        let entry = self.entries.remove(&key)?;
        self.total_bytes -= entry.memory_bytes;
        Some(entry)
    }

    fn drain(&mut self) -> Vec<AssetInfo> {
        let evicted = self.entries.values().map(CacheEntry::info).collect();
        self.entries.clear();
        self.total_bytes = 0;
        evicted
    }
}

struct CacheInner<G: GpuDevice, L: AssetLoader, R: HostRuntime> {
    gpu: G,
    loader: Arc<L>,
    runtime: R,
    config: CacheConfig,
    state: Mutex<CacheState<G>>,
    observers: Mutex<Vec<(ObserverId, EvictObserver)>>,
    next_observer: AtomicU64,
    metrics: CacheMetrics,
}

impl<G: GpuDevice, L: AssetLoader, R: HostRuntime> CacheInner<G, L, R> {
    async fn fetch(
        &self,
        path: &str,
        texture_scale: f32,
    ) -> std::result::Result<GpuAsset<G>, LoadFailure> {
        let raw = self.loader.fetch(path).await?;
        let optimized = optimize(raw, texture_scale)?;
        Ok(GpuAsset::upload(&self.gpu, &optimized)?)
    }

    /// Settle a finished fetch: clear the in-flight slot and insert the payload
    fn finish_load(
        &self,
        key: u64,
        id: Uuid,
        request: &LoadRequest,
        outcome: std::result::Result<GpuAsset<G>, LoadFailure>,
        latency: Duration,
    ) -> Result<AssetHandle> {
        self.metrics.record_load(&request.path, latency);

        let mut evicted = Vec::new();
        let result = {
            let mut state = self.state.lock();
            if state.in_flight.get(&key).map(|f| f.id) == Some(id) {
                state.in_flight.remove(&key);
            }

            match outcome {
                Err(source) => {
                    log::warn!("Failed to load {}: {}", request.path, source);
                    Err(TierError::LoadError {
                        path: request.path.clone(),
                        source,
                    })
                }
                Ok(payload) if state.closed => {
                    log::debug!("Cache closed; releasing late load of {}", request.path);
                    drop(payload);
                    Err(TierError::Disposed)
                }
                Ok(payload) => {
                    if let Some(existing) = state.entries.get_mut(&key) {
                        // Superseded by a concurrent load that was not shared
                        existing.touch();
                        Ok(existing.handle())
                    } else {
                        let memory_bytes = payload.size_bytes();
                        if state.total_bytes + memory_bytes > self.config.ceiling_bytes() {
                            evicted = state.evict_until(self.config.target_bytes(), memory_bytes);
                        }
                        if state.total_bytes + memory_bytes > self.config.ceiling_bytes() {
                            log::warn!(
                                "{} ({} bytes) exceeds the cache ceiling on its own",
                                request.path,
                                memory_bytes
                            );
                        }

                        let seq = state.next_seq;
                        state.next_seq += 1;
                        let entry = CacheEntry {
                            path: Arc::from(request.path.as_str()),
                            id,
                            payload,
                            memory_bytes,
                            last_accessed: Instant::now(),
                            priority: request.priority,
                            insertion_seq: seq,
                            load_latency: latency,
                        };
                        let handle = entry.handle();
                        state.total_bytes += memory_bytes;
                        state.entries.insert(key, entry);
                        log::debug!(
                            "Cached {} ({} bytes, {:?}), total {} bytes",
                            request.path,
                            memory_bytes,
                            latency,
                            state.total_bytes
                        );
                        Ok(handle)
                    }
                }
            }
        };

        self.notify_evicted(&evicted);
        result
    }

    fn notify_evicted(&self, evicted: &[AssetInfo]) {
        if evicted.is_empty() {
            return;
        }
        let observers: Vec<EvictObserver> = self
            .observers
            .lock()
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();

        for info in evicted {
            self.metrics.record_eviction();
            log::debug!("Evicted {} ({} bytes)", info.path, info.memory_bytes);
            for observer in &observers {
                observer(info);
            }
        }
    }
}

enum Begin {
    Resident(AssetHandle),
    Pending { id: Uuid, load: SharedLoad },
}

/// Deduplicating, memory-bounded cache of GPU-resident assets
///
/// Cheap to clone; clones share the same entries.
pub struct AssetCache<G: GpuDevice, L: AssetLoader, R: HostRuntime> {
    inner: Arc<CacheInner<G, L, R>>,
}

impl<G: GpuDevice, L: AssetLoader, R: HostRuntime> Clone for AssetCache<G, L, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<G: GpuDevice, L: AssetLoader, R: HostRuntime> AssetCache<G, L, R> {
    pub fn new(gpu: G, loader: L, runtime: R, config: CacheConfig) -> Self {
        Self::with_shared_loader(gpu, Arc::new(loader), runtime, config)
    }

    /// Build a cache around a loader that is also used elsewhere
    pub fn with_shared_loader(gpu: G, loader: Arc<L>, runtime: R, config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                gpu,
                loader,
                runtime,
                config,
                state: Mutex::new(CacheState::new()),
                observers: Mutex::new(Vec::new()),
                next_observer: AtomicU64::new(0),
                metrics: CacheMetrics::new(),
            }),
        }
    }

    pub fn gpu(&self) -> &G {
        &self.inner.gpu
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.inner.metrics
    }

    fn key(path: &str) -> u64 {
        xxh3_64(path.as_bytes())
    }

    /// Load an asset, sharing any in-flight load of the same path
    pub async fn load(&self, request: LoadRequest) -> Result<AssetHandle> {
        let key = Self::key(&request.path);
        let (id, load) = match self.begin_load(key, &request)? {
            Begin::Resident(handle) => return Ok(handle),
            Begin::Pending { id, load } => (id, load),
        };

        let deadline = self.inner.runtime.sleep(request.deadline);
        match future::select(load, deadline).await {
            Either::Left((result, _)) => result,
            Either::Right(((), abandoned)) => {
                {
                    let mut state = self.inner.state.lock();
                    // Other waiters keep the shared load alive; only the
                    // last one out clears it so the next caller refetches
                    let waiters = abandoned.strong_count().unwrap_or(0);
                    if waiters <= 2 && state.in_flight.get(&key).map(|f| f.id) == Some(id) {
                        state.in_flight.remove(&key);
                    }
                }
                drop(abandoned);
                log::warn!(
                    "Loading {} timed out after {:?}",
                    request.path,
                    request.deadline
                );
                Err(TierError::LoadTimeout {
                    path: request.path,
                    after: request.deadline,
                })
            }
        }
    }

    fn begin_load(&self, key: u64, request: &LoadRequest) -> Result<Begin> {
        let mut state = self.inner.state.lock();
        if state.closed {
            return Err(TierError::Disposed);
        }

        if let Some(entry) = state.entries.get_mut(&key) {
            entry.touch();
            self.inner.metrics.record_cache_hit();
            return Ok(Begin::Resident(entry.handle()));
        }

        if let Some(flight) = state.in_flight.get(&key) {
            self.inner.metrics.record_cache_hit();
            return Ok(Begin::Pending {
                id: flight.id,
                load: flight.load.clone(),
            });
        }

        self.inner.metrics.record_cache_miss();
        let id = Uuid::new_v4();
        let inner = Arc::clone(&self.inner);
        let request = request.clone();
        let fut: BoxFuture<'static, Result<AssetHandle>> = Box::pin(async move {
            let started = Instant::now();
            let outcome = inner.fetch(&request.path, request.texture_scale).await;
            inner.finish_load(key, id, &request, outcome, started.elapsed())
        });
        let load = fut.shared();
        state.in_flight.insert(
            key,
            InFlight {
                id,
                load: load.clone(),
            },
        );
        Ok(Begin::Pending { id, load })
    }

    /// Evict least valuable entries until usage is at or below the target
    /// share of the ceiling. Returns the number of entries removed.
    pub fn evict(&self) -> usize {
        let evicted = self
            .inner
            .state
            .lock()
            .evict_until(self.inner.config.target_bytes(), 0);
        self.inner.notify_evicted(&evicted);
        evicted.len()
    }

    /// Evict every entry
    pub fn clear(&self) {
        let evicted = self.inner.state.lock().drain();
        self.inner.notify_evicted(&evicted);
    }

    /// Evict every entry and refuse further loads.
    ///
    /// Loads still in flight release their resources when they finish and
    /// report [`TierError::Disposed`].
    pub fn close(&self) {
        let evicted = {
            let mut state = self.inner.state.lock();
            state.closed = true;
            state.in_flight.clear();
            state.drain()
        };
        self.inner.notify_evicted(&evicted);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Change the eviction priority of a resident asset
    pub fn set_priority(&self, path: &str, priority: Priority) -> bool {
        let mut state = self.inner.state.lock();
        match state.entries.get_mut(&Self::key(path)) {
            Some(entry) => {
                entry.priority = priority;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.inner.state.lock().entries.contains_key(&Self::key(path))
    }

    /// Snapshot of resident entries, least valuable first
    pub fn resident(&self) -> Vec<AssetInfo> {
        let state = self.inner.state.lock();
        let mut entries: Vec<_> = state.entries.values().collect();
        entries.sort_unstable_by_key(|entry| entry.eviction_rank());
        entries.into_iter().map(CacheEntry::info).collect()
    }

    /// Run `f` against the payload behind `handle`.
    ///
    /// Returns `None` if the handle is stale. The cache is locked while `f`
    /// runs, so `f` must not call back into the cache.
    pub fn with_asset<T>(&self, handle: &AssetHandle, f: impl FnOnce(&GpuAsset<G>) -> T) -> Option<T> {
        let state = self.inner.state.lock();
        state
            .entries
            .get(&Self::key(handle.path()))
            .filter(|entry| entry.id == handle.id())
            .map(|entry| f(&entry.payload))
    }

    pub fn stats(&self) -> CacheStats {
        let (entry_count, total_memory_bytes) = {
            let state = self.inner.state.lock();
            (state.entries.len(), state.total_bytes)
        };
        let ceiling = self.inner.config.ceiling_bytes();
        CacheStats {
            entry_count,
            total_memory_bytes,
            total_memory_mb: total_memory_bytes as f64 / BYTES_PER_MB,
            utilization_percent: if ceiling > 0 {
                total_memory_bytes as f64 / ceiling as f64 * 100.0
            } else {
                0.0
            },
            hit_rate_percent: self.inner.metrics.cache_hit_rate(),
        }
    }

    /// Register a callback run after each eviction, with no cache lock held
    pub fn on_evict(&self, observer: impl Fn(&AssetInfo) + Send + Sync + 'static) -> ObserverId {
        let id = ObserverId(self.inner.next_observer.fetch_add(1, Ordering::Relaxed));
        self.inner.observers.lock().push((id, Arc::new(observer)));
        id
    }

    pub fn remove_observer(&self, id: ObserverId) -> bool {
        let mut observers = self.inner.observers.lock();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }
}
