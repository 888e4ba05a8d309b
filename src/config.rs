//! Tunable parameters
//!
//! All knobs live here with their defaults so they can be adjusted without
//! touching the state machine. Every struct deserializes from JSON with
//! missing fields falling back to the defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::capability::NetworkClass;
use crate::error::{Result, TierError};
use crate::registry::DEFAULT_ASSET_GROUP;
use crate::tier::QualityTier;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Largest stretch a network class may apply to a load deadline
pub const MAX_NETWORK_FACTOR: f64 = 100.0;

/// Asset cache budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Soft memory ceiling for all resident assets
    pub memory_ceiling_mb: f64,
    /// Eviction stops once usage is at or below this share of the ceiling
    pub eviction_target_ratio: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_ceiling_mb: 512.0,
            eviction_target_ratio: 0.6,
        }
    }
}

impl CacheConfig {
    pub fn ceiling_bytes(&self) -> u64 {
        (self.memory_ceiling_mb * BYTES_PER_MB) as u64
    }

    pub fn target_bytes(&self) -> u64 {
        (self.ceiling_bytes() as f64 * self.eviction_target_ratio) as u64
    }
}

/// Sampling cadence of the performance monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Trailing window used for rolling FPS and render time
    pub fps_window_ms: u64,
    /// How often thresholds are checked
    pub evaluation_interval_ms: u64,
    /// Minimum spacing between memory samples
    pub memory_sample_interval_ms: u64,
    /// Frames required in the window before thresholds are checked
    pub min_frames: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            fps_window_ms: 1000,
            evaluation_interval_ms: 1000,
            memory_sample_interval_ms: 2000,
            min_frames: 5,
        }
    }
}

impl MonitorConfig {
    pub fn fps_window(&self) -> Duration {
        Duration::from_millis(self.fps_window_ms)
    }

    pub fn evaluation_interval(&self) -> Duration {
        Duration::from_millis(self.evaluation_interval_ms)
    }

    pub fn memory_sample_interval(&self) -> Duration {
        Duration::from_millis(self.memory_sample_interval_ms)
    }
}

/// Per-tier load deadlines, stretched on slower networks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadTimeouts {
    pub high_ms: u64,
    pub medium_ms: u64,
    pub low_ms: u64,
    pub ultra_low_ms: u64,
    pub fast_network_factor: f64,
    pub medium_network_factor: f64,
    pub slow_network_factor: f64,
    pub unknown_network_factor: f64,
}

impl Default for LoadTimeouts {
    fn default() -> Self {
        Self {
            high_ms: 15_000,
            medium_ms: 12_000,
            low_ms: 10_000,
            ultra_low_ms: 8_000,
            fast_network_factor: 1.0,
            medium_network_factor: 1.5,
            slow_network_factor: 2.5,
            unknown_network_factor: 1.25,
        }
    }
}

impl LoadTimeouts {
    /// Deadline for loading `tier` over `network`
    pub fn deadline(&self, tier: QualityTier, network: NetworkClass) -> Result<Duration> {
        let base = match tier {
            QualityTier::High => self.high_ms,
            QualityTier::Medium => self.medium_ms,
            QualityTier::Low => self.low_ms,
            QualityTier::UltraLow => self.ultra_low_ms,
        };
        let factor = match network {
            NetworkClass::Fast => self.fast_network_factor,
            NetworkClass::Medium => self.medium_network_factor,
            NetworkClass::Slow => self.slow_network_factor,
            NetworkClass::Unknown => self.unknown_network_factor,
        };
        Duration::try_from_secs_f64(base as f64 / 1000.0 * factor).map_err(|err| {
            TierError::Config(format!(
                "no {tier} deadline for {network:?} network ({base} ms x {factor}): {err}"
            ))
        })
    }

    fn factors(&self) -> [(&'static str, f64); 4] {
        [
            ("fast_network_factor", self.fast_network_factor),
            ("medium_network_factor", self.medium_network_factor),
            ("slow_network_factor", self.slow_network_factor),
            ("unknown_network_factor", self.unknown_network_factor),
        ]
    }
}

/// Top-level controller configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Failed load attempts tolerated within one transition before giving up
    pub max_retries: u32,
    /// Minimum spacing between two automatic downgrades
    pub downgrade_cooldown_ms: u64,
    /// Asset group whose per-tier asset the controller loads
    pub asset_group: String,
    pub load_timeouts: LoadTimeouts,
    pub cache: CacheConfig,
    pub monitor: MonitorConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            downgrade_cooldown_ms: 5_000,
            asset_group: DEFAULT_ASSET_GROUP.to_string(),
            load_timeouts: LoadTimeouts::default(),
            cache: CacheConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

impl ControllerConfig {
    /// Parse and validate a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn downgrade_cooldown(&self) -> Duration {
        Duration::from_millis(self.downgrade_cooldown_ms)
    }

    /// Reject values the controller cannot operate with
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(TierError::Config(msg.to_string()));

        if self.max_retries == 0 {
            return fail("max_retries must be at least 1");
        }
        if !(self.cache.memory_ceiling_mb > 0.0) {
            return fail("memory_ceiling_mb must be positive");
        }
        if !(self.cache.eviction_target_ratio > 0.0 && self.cache.eviction_target_ratio <= 1.0) {
            return fail("eviction_target_ratio must be in (0, 1]");
        }
        if self.monitor.fps_window_ms == 0 || self.monitor.evaluation_interval_ms == 0 {
            return fail("monitor intervals must be non-zero");
        }
        let t = &self.load_timeouts;
        for (name, factor) in t.factors() {
            if !(factor.is_finite() && factor > 0.0 && factor <= MAX_NETWORK_FACTOR) {
                return Err(TierError::Config(format!(
                    "{name} must be in (0, {MAX_NETWORK_FACTOR}], got {factor}"
                )));
            }
        }
        if !(t.fast_network_factor <= t.medium_network_factor
            && t.medium_network_factor <= t.slow_network_factor)
        {
            return fail("network factors must grow as the network gets slower");
        }
        Ok(())
    }
}
