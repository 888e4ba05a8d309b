//! archetype_tier - Adaptive quality tiers for 3D content
//!
//! # Features
//! - One-shot device capability assessment (GPU, memory, network, form factor)
//! - Static per-tier render, animation and threshold profiles
//! - Deduplicating asset cache with a soft memory ceiling and deterministic
//!   GPU resource release
//! - Rolling performance monitor with multi-signal degradation detection
//! - A session controller that steps down, never up, when the device struggles
//! - GPU, loader and host runtime abstractions via traits
//!
//! # Quick Start
//!
//! ```ignore
//! use archetype_tier::{HostHints, MockGpu, MockLoader, MockProbe, MockRuntime, TierController};
//!
//! let controller = TierController::with_defaults(MockGpu::new(), MockLoader::new(), MockRuntime::new())?;
//! let tier = controller.start(&MockProbe::capable(), &HostHints::default()).await?;
//! controller.on_tick(FrameTick::new(Instant::now(), render_time));
//! ```
//!
//! # Feature Flags
//!
//! - `runtime-tokio`: Tokio host runtime and async file reads in `GlbFileLoader`

// Core modules
pub mod cache;
pub mod capability;
pub mod controller;
pub mod monitor;
pub mod registry;
pub mod tier;

// Support modules
pub mod config;
pub mod gpu;
pub mod loader;
pub mod optimize;
pub mod runtime;

// Error types
mod error;
pub use error::{Result, TierError};

// Re-export tier and registry types
pub use registry::{AnimationSettings, DegradeThresholds, RenderSettings, TierProfile, TierRegistry};
pub use tier::{QualityTier, Recommendation};

// Re-export capability types
pub use capability::mock::MockProbe;
pub use capability::{
    CapabilityAssessment, CapabilityAssessor, CapabilityProbe, ConnectionHint, DeviceClass,
    GpuTier, HostHints, NetworkClass, ProbeContext,
};

// Re-export cache types
pub use cache::metrics::CacheMetrics;
pub use cache::{AssetCache, AssetHandle, AssetInfo, CacheStats, LoadRequest, Priority};

// Re-export monitor types
pub use monitor::{
    DegradationSignal, FrameTick, Indicator, MonitorReport, PerformanceMonitor,
    PerformanceSnapshot, PerformanceWarning,
};

// Re-export controller types
pub use controller::{
    ControllerState, ControllerStats, DegradeEvent, DegradeReason, Subscription, TierController,
    TierUpdate,
};

// Re-export configuration
pub use config::{CacheConfig, ControllerConfig, LoadTimeouts, MonitorConfig};

// Re-export GPU types
pub use gpu::mock::MockGpu;
pub use gpu::{BufferUsage, GpuAsset, GpuDevice, GpuError, GpuResult, GpuTextureFormat, TextureDescriptor};

// Re-export loader types
pub use loader::{AssetLoader, GlbFileLoader, LoadFailure, MockLoader, RawAsset};

// Re-export runtime types
pub use runtime::mock::MockRuntime;
#[cfg(feature = "runtime-tokio")]
pub use runtime::tokio_impl::TokioRuntime;
pub use runtime::{HostRuntime, TaskHandle};

// Version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
