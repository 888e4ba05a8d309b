//! Asset loading
//!
//! An [`AssetLoader`] fetches and parses the bytes behind an asset path into
//! a [`RawAsset`]. Optimization and GPU upload happen afterwards in the
//! cache, so loaders stay oblivious of tiers and memory budgets.

pub mod gltf;
pub mod mock;

use thiserror::Error;

pub use self::gltf::{parse_glb, GlbFileLoader};
pub use mock::{MockGate, MockLoader};

/// Why a single fetch failed.
///
/// `Clone` so one failure can be handed to every caller sharing an
/// in-flight load.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadFailure {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("GPU upload failed: {0}")]
    Upload(String),
}

impl From<crate::gpu::GpuError> for LoadFailure {
    fn from(err: crate::gpu::GpuError) -> Self {
        Self::Upload(err.to_string())
    }
}

/// Geometry of one mesh primitive as found in the file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub uvs: Option<Vec<[f32; 2]>>,
    pub indices: Option<Vec<u32>>,
}

/// A decoded RGBA8 texture
#[derive(Debug, Clone, PartialEq)]
pub struct RawTexture {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Everything a loader extracted from one asset file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawAsset {
    pub meshes: Vec<RawMesh>,
    pub textures: Vec<RawTexture>,
}

/// Source of raw assets
///
/// Uses async-trait so loaders can be shared behind an `Arc`.
#[async_trait::async_trait]
pub trait AssetLoader: Send + Sync + 'static {
    /// Fetch and parse the asset at `path`
    async fn fetch(&self, path: &str) -> Result<RawAsset, LoadFailure>;
}
