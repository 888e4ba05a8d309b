//! Quality tiers and the capability recommendation

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, TierError};

/// Discrete rendering-quality level.
///
/// Variants are declared in ascending order so the derived `Ord` gives
/// `UltraLow < Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QualityTier {
    UltraLow,
    Low,
    Medium,
    High,
}

impl QualityTier {
    /// Every tier, lowest first
    pub const ALL: [QualityTier; 4] = [Self::UltraLow, Self::Low, Self::Medium, Self::High];

    /// The next tier down, or `None` at the floor
    pub fn lower(self) -> Option<Self> {
        match self {
            Self::High => Some(Self::Medium),
            Self::Medium => Some(Self::Low),
            Self::Low => Some(Self::UltraLow),
            Self::UltraLow => None,
        }
    }

    /// One step down, staying at `UltraLow` once there
    pub fn step_down(self) -> Self {
        self.lower().unwrap_or(Self::UltraLow)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::UltraLow => "ultra-low",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a capability assessment.
///
/// `NoRendering` means 3D is skipped entirely and a static fallback is shown.
/// It is a terminal outcome and is never folded into `UltraLow`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recommendation {
    Tier(QualityTier),
    NoRendering,
}

impl Recommendation {
    /// The recommended tier, if any 3D rendering should happen
    pub fn tier(self) -> Option<QualityTier> {
        match self {
            Self::Tier(tier) => Some(tier),
            Self::NoRendering => None,
        }
    }

    /// The tier to load, or [`TierError::Unsupported`] when 3D is skipped
    pub fn require_tier(self) -> Result<QualityTier> {
        self.tier().ok_or(TierError::Unsupported)
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tier(tier) => tier.fmt(f),
            Self::NoRendering => f.write_str("none"),
        }
    }
}
