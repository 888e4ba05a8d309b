//! Static per-tier configuration
//!
//! The registry maps every [`QualityTier`] to a [`TierProfile`] and every
//! asset group to one asset path per tier. It is built once at startup,
//! either from the built-in table or from JSON, and never mutated.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Result, TierError};
use crate::tier::QualityTier;

/// Name of the asset group used by the built-in table
pub const DEFAULT_ASSET_GROUP: &str = "phoenix";

/// Renderer-facing settings for one tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Upper bound applied to the device pixel ratio
    pub pixel_ratio_cap: f32,
    pub shadows: bool,
    pub antialias: bool,
    /// Target time for one frame, in milliseconds
    pub frame_budget_ms: f32,
    /// Texture downsampling factor applied at load time (1.0 = full size)
    pub texture_scale: f32,
}

/// Which parts of the mascot animation run at this tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationSettings {
    pub rotation: bool,
    pub position: bool,
    pub scale: bool,
    /// Animate every Nth frame
    pub frame_skip: u32,
}

/// Tier-relative limits checked by the performance monitor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DegradeThresholds {
    pub max_render_time_ms: f32,
    pub min_fps: f32,
    pub max_memory_mb: f64,
}

/// Complete static configuration for one tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierProfile {
    /// Path of this tier's asset in the default asset group
    pub asset_path: String,
    pub render: RenderSettings,
    pub animation: AnimationSettings,
    pub thresholds: DegradeThresholds,
}

/// Lookup table from tier to profile and from asset group to per-tier paths
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierRegistry {
    profiles: BTreeMap<QualityTier, TierProfile>,
    asset_groups: BTreeMap<String, BTreeMap<QualityTier, String>>,
}

impl Default for TierRegistry {
    fn default() -> Self {
        let profiles = BTreeMap::from([
            (
                QualityTier::High,
                TierProfile {
                    asset_path: "models/phoenix/phoenix_high.glb".to_string(),
                    render: RenderSettings {
                        pixel_ratio_cap: 2.0,
                        shadows: true,
                        antialias: true,
                        frame_budget_ms: 16.7,
                        texture_scale: 1.0,
                    },
                    animation: AnimationSettings {
                        rotation: true,
                        position: true,
                        scale: true,
                        frame_skip: 1,
                    },
                    thresholds: DegradeThresholds {
                        max_render_time_ms: 25.0,
                        min_fps: 45.0,
                        max_memory_mb: 600.0,
                    },
                },
            ),
            (
                QualityTier::Medium,
                TierProfile {
                    asset_path: "models/phoenix/phoenix_medium.glb".to_string(),
                    render: RenderSettings {
                        pixel_ratio_cap: 1.5,
                        shadows: false,
                        antialias: true,
                        frame_budget_ms: 22.2,
                        texture_scale: 0.75,
                    },
                    animation: AnimationSettings {
                        rotation: true,
                        position: true,
                        scale: false,
                        frame_skip: 1,
                    },
                    thresholds: DegradeThresholds {
                        max_render_time_ms: 33.0,
                        min_fps: 35.0,
                        max_memory_mb: 450.0,
                    },
                },
            ),
            (
                QualityTier::Low,
                TierProfile {
                    asset_path: "models/phoenix/phoenix_low.glb".to_string(),
                    render: RenderSettings {
                        pixel_ratio_cap: 1.0,
                        shadows: false,
                        antialias: false,
                        frame_budget_ms: 33.3,
                        texture_scale: 0.5,
                    },
                    animation: AnimationSettings {
                        rotation: true,
                        position: false,
                        scale: false,
                        frame_skip: 2,
                    },
                    thresholds: DegradeThresholds {
                        max_render_time_ms: 45.0,
                        min_fps: 24.0,
                        max_memory_mb: 300.0,
                    },
                },
            ),
            (
                QualityTier::UltraLow,
                TierProfile {
                    asset_path: "models/phoenix/phoenix_ultra_low.glb".to_string(),
                    render: RenderSettings {
                        pixel_ratio_cap: 1.0,
                        shadows: false,
                        antialias: false,
                        frame_budget_ms: 41.7,
                        texture_scale: 0.25,
                    },
                    animation: AnimationSettings {
                        rotation: true,
                        position: false,
                        scale: false,
                        frame_skip: 3,
                    },
                    thresholds: DegradeThresholds {
                        max_render_time_ms: 60.0,
                        min_fps: 18.0,
                        max_memory_mb: 200.0,
                    },
                },
            ),
        ]);

        let phoenix = profiles
            .iter()
            .map(|(tier, profile)| (*tier, profile.asset_path.clone()))
            .collect();
        let galaxy = QualityTier::ALL
            .iter()
            .map(|tier| {
                let suffix = tier.as_str().replace('-', "_");
                (*tier, format!("models/galaxy/galaxy_{suffix}.glb"))
            })
            .collect();

        Self {
            profiles,
            asset_groups: BTreeMap::from([
                (DEFAULT_ASSET_GROUP.to_string(), phoenix),
                ("galaxy".to_string(), galaxy),
            ]),
        }
    }
}

impl TierRegistry {
    /// Build a registry from explicit tables, validating them first
    pub fn new(
        profiles: BTreeMap<QualityTier, TierProfile>,
        asset_groups: BTreeMap<String, BTreeMap<QualityTier, String>>,
    ) -> Result<Self> {
        let registry = Self {
            profiles,
            asset_groups,
        };
        registry.validate()?;
        Ok(registry)
    }

    /// Parse and validate a registry from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let registry: Self = serde_json::from_str(json)?;
        registry.validate()?;
        Ok(registry)
    }

    /// Profile for `tier`
    pub fn profile_for(&self, tier: QualityTier) -> Result<&TierProfile> {
        self.profiles
            .get(&tier)
            .ok_or_else(|| TierError::Config(format!("no profile registered for tier {tier}")))
    }

    /// Asset path for `tier` within `group`
    pub fn asset_path_for(&self, tier: QualityTier, group: &str) -> Result<&str> {
        let paths = self
            .asset_groups
            .get(group)
            .ok_or_else(|| TierError::Config(format!("unknown asset group '{group}'")))?;
        paths.get(&tier).map(String::as_str).ok_or_else(|| {
            TierError::Config(format!("asset group '{group}' has no path for tier {tier}"))
        })
    }

    /// Names of all registered asset groups
    pub fn asset_groups(&self) -> impl Iterator<Item = &str> {
        self.asset_groups.keys().map(String::as_str)
    }

    fn validate(&self) -> Result<()> {
        for tier in QualityTier::ALL {
            self.profile_for(tier)?;
        }
        for (group, paths) in &self.asset_groups {
            if let Some(missing) = QualityTier::ALL.iter().find(|t| !paths.contains_key(t)) {
                return Err(TierError::Config(format!(
                    "asset group '{group}' is missing tier {missing}"
                )));
            }
        }

        // A profile's own path and the default group must agree
        if let Some(defaults) = self.asset_groups.get(DEFAULT_ASSET_GROUP) {
            for (tier, profile) in &self.profiles {
                if defaults.get(tier) != Some(&profile.asset_path) {
                    return Err(TierError::Config(format!(
                        "tier {tier} profile path '{}' differs from the '{DEFAULT_ASSET_GROUP}' group",
                        profile.asset_path
                    )));
                }
            }
        }

        // Compare each tier against the one directly above it
        for pair in QualityTier::ALL.windows(2) {
            let (lower, higher) = (pair[0], pair[1]);
            let lo = &self.profiles[&lower];
            let hi = &self.profiles[&higher];

            let fidelity_ok = hi.render.pixel_ratio_cap >= lo.render.pixel_ratio_cap
                && hi.render.texture_scale >= lo.render.texture_scale
                && (hi.render.shadows || !lo.render.shadows)
                && (hi.render.antialias || !lo.render.antialias)
                && (hi.animation.rotation || !lo.animation.rotation)
                && (hi.animation.position || !lo.animation.position)
                && (hi.animation.scale || !lo.animation.scale);
            if !fidelity_ok {
                return Err(TierError::Config(format!(
                    "tier {higher} has lower visual fidelity than tier {lower}"
                )));
            }
            if hi.animation.frame_skip > lo.animation.frame_skip {
                return Err(TierError::Config(format!(
                    "tier {higher} skips more frames than tier {lower}"
                )));
            }
            if hi.render.frame_budget_ms > lo.render.frame_budget_ms {
                return Err(TierError::Config(format!(
                    "tier {lower} demands a smaller frame budget than tier {higher}"
                )));
            }
        }
        Ok(())
    }
}
