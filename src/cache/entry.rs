//! Cache entry bookkeeping

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::gpu::{GpuAsset, GpuDevice};

/// How valuable a resident asset is; lower priorities are evicted first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

/// Key to a resident asset.
///
/// A handle never owns GPU resources. Use [`AssetCache::with_asset`] to
/// reach the payload; once the entry is evicted the handle goes stale.
///
/// [`AssetCache::with_asset`]: super::AssetCache::with_asset
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetHandle {
    path: Arc<str>,
    id: Uuid,
}

impl AssetHandle {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Unique per successful load; a reloaded path gets a new id
    pub fn id(&self) -> Uuid {
        self.id
    }
}

/// Public view of one entry, handed to eviction observers and `resident()`
#[derive(Debug, Clone, PartialEq)]
pub struct AssetInfo {
    pub path: Arc<str>,
    pub memory_bytes: u64,
    pub priority: Priority,
    pub load_latency: Duration,
}

pub(crate) struct CacheEntry<G: GpuDevice> {
    pub(crate) path: Arc<str>,
    pub(crate) id: Uuid,
    pub(crate) payload: GpuAsset<G>,
    pub(crate) memory_bytes: u64,
    pub(crate) last_accessed: Instant,
    pub(crate) priority: Priority,
    pub(crate) insertion_seq: u64,
    pub(crate) load_latency: Duration,
}

impl<G: GpuDevice> CacheEntry<G> {
    pub(crate) fn touch(&mut self) {
        self.last_accessed = Instant::now();
    }

    pub(crate) fn handle(&self) -> AssetHandle {
        AssetHandle {
            path: self.path.clone(),
            id: self.id,
        }
    }

    pub(crate) fn info(&self) -> AssetInfo {
        AssetInfo {
            path: self.path.clone(),
            memory_bytes: self.memory_bytes,
            priority: self.priority,
            load_latency: self.load_latency,
        }
    }

    /// Sort key for eviction: least valuable first
    pub(crate) fn eviction_rank(&self) -> (Priority, Instant, u64) {
        (self.priority, self.last_accessed, self.insertion_seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        assert!(Priority::Low < Priority::Normal);
        assert!(Priority::Normal < Priority::High);
        assert_eq!(Priority::default(), Priority::Normal);
    }
}
