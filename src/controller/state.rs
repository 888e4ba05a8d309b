//! Controller state and transition events

use serde::Serialize;
use std::fmt;
use std::time::Instant;

use crate::cache::AssetHandle;
use crate::error::TierError;
use crate::monitor::Indicator;
use crate::tier::QualityTier;

/// Lifecycle of a [`TierController`](super::TierController)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ControllerState {
    /// Not started yet
    Uninitialized,

    /// Probing the device
    Assessing,

    /// Waiting for a tier's asset
    Loading,

    /// A tier's asset is resident and rendering
    Ready,

    /// A downgrade was accepted and is about to load
    Degrading,

    /// Retries exhausted or configuration broken; show a static fallback
    Failed,

    /// The device cannot render 3D content
    NoRendering,

    /// Torn down; every later completion is ignored
    Disposed,
}

impl ControllerState {
    /// States no transition ever leaves
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::NoRendering | Self::Disposed)
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Why a tier was stepped down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DegradeReason {
    LowFps,
    HighRenderTime,
    HighMemory,
    LoadTimeout,
    LoadError,
}

impl From<Indicator> for DegradeReason {
    fn from(indicator: Indicator) -> Self {
        match indicator {
            Indicator::LowFps => Self::LowFps,
            Indicator::HighRenderTime => Self::HighRenderTime,
            Indicator::HighMemory => Self::HighMemory,
        }
    }
}

impl DegradeReason {
    pub(crate) fn from_load_error(err: &TierError) -> Self {
        match err {
            TierError::LoadTimeout { .. } => Self::LoadTimeout,
            _ => Self::LoadError,
        }
    }
}

/// One step down, attached to the tier change it caused
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DegradeEvent {
    pub previous_tier: QualityTier,
    pub proposed_tier: QualityTier,
    pub reason: DegradeReason,
    pub timestamp: Instant,
}

/// Published to subscribers whenever the rendered tier changes
#[derive(Debug, Clone, PartialEq)]
pub enum TierUpdate {
    /// `tier`'s asset is resident; `cause` is set when this was a step down
    Ready {
        tier: QualityTier,
        handle: AssetHandle,
        cause: Option<DegradeEvent>,
    },
    /// No 3D content will be rendered this session
    NoRendering,
}

impl TierUpdate {
    pub fn tier(&self) -> Option<QualityTier> {
        match self {
            Self::Ready { tier, .. } => Some(*tier),
            Self::NoRendering => None,
        }
    }
}
