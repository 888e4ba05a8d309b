//! Error types for archetype_tier

use std::time::Duration;
use thiserror::Error;

use crate::loader::LoadFailure;

/// Main error type for tier selection, asset loading and configuration
#[derive(Error, Debug, Clone)]
pub enum TierError {
    /// Unknown tier, unknown asset group or an invalid configuration table.
    /// Programmer error: never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Loading {path} timed out after {after:?}")]
    LoadTimeout { path: String, after: Duration },

    #[error("Loading {path} failed: {source}")]
    LoadError {
        path: String,
        #[source]
        source: LoadFailure,
    },

    /// The device cannot render 3D content at all. Never retried.
    #[error("3D rendering is not supported on this device")]
    Unsupported,

    #[error("Controller has been disposed")]
    Disposed,
}

impl TierError {
    /// Whether the controller should retry at the next-lower tier
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::LoadTimeout { .. } | Self::LoadError { .. })
    }
}

impl From<serde_json::Error> for TierError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type alias for tier operations
pub type Result<T> = std::result::Result<T, TierError>;
