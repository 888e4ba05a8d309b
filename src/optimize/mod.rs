//! Post-load optimization
//!
//! Turns a [`RawAsset`] straight out of a loader into GPU-ready data:
//! geometry is normalized to a centred unit box, missing normals, UVs and
//! indices are derived, and textures are downsampled by the tier's texture
//! scale.

pub mod geometry;
pub mod texture;

use crate::loader::{LoadFailure, RawAsset};

/// Interleaved vertex layout uploaded to the GPU
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            normal: [0.0, 0.0, 1.0],
            uv: [0.0, 0.0],
        }
    }
}

impl Vertex {
    /// Size of a vertex in bytes
    pub const fn size() -> usize {
        std::mem::size_of::<Self>()
    }
}

/// One mesh ready for upload
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizedMesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

/// One RGBA8 texture ready for upload
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizedTexture {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// A whole asset ready for upload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptimizedAsset {
    pub meshes: Vec<OptimizedMesh>,
    pub textures: Vec<OptimizedTexture>,
}

/// Optimize a raw asset for a tier with the given texture scale
pub fn optimize(raw: RawAsset, texture_scale: f32) -> Result<OptimizedAsset, LoadFailure> {
    let meshes = geometry::build_meshes(raw.meshes)?;
    let textures = raw
        .textures
        .into_iter()
        .map(|t| texture::downsample(t, texture_scale))
        .collect::<Result<Vec<_>, _>>()?;

    log::debug!(
        "Optimized asset: {} meshes, {} textures (scale {:.2})",
        meshes.len(),
        textures.len(),
        texture_scale
    );
    Ok(OptimizedAsset { meshes, textures })
}
