//! GPU resource abstraction
//!
//! The controller never renders; it only needs somewhere to put the
//! optimized vertex, index and texture data of a loaded asset, and a way to
//! release it again. [`GpuDevice`] is that seam, and [`GpuAsset`] owns the
//! resources of one asset and destroys them when dropped.

pub mod mock;

use std::fmt::Debug;
use thiserror::Error;

use crate::optimize::OptimizedAsset;

/// Error type for GPU operations
#[derive(Error, Debug, Clone)]
pub enum GpuError {
    #[error("Buffer allocation failed: {0}")]
    AllocationFailed(String),

    #[error("Buffer upload failed: {0}")]
    UploadFailed(String),

    #[error("Texture creation failed: {0}")]
    TextureCreationFailed(String),

    #[error("Invalid buffer size: {0}")]
    InvalidSize(usize),

    #[error("Device lost")]
    DeviceLost,

    #[error("Out of memory")]
    OutOfMemory,
}

/// Result type for GPU operations
pub type GpuResult<T> = Result<T, GpuError>;

/// Buffer usage flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    Vertex,
    Index,
}

/// Texture format; optimized textures are always 8-bit sRGB RGBA
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuTextureFormat {
    Rgba8Srgb,
}

/// Texture descriptor for creation
#[derive(Debug, Clone)]
pub struct TextureDescriptor {
    pub width: u32,
    pub height: u32,
    pub format: GpuTextureFormat,
}

impl TextureDescriptor {
    pub fn rgba(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: GpuTextureFormat::Rgba8Srgb,
        }
    }
}

/// Backend-agnostic GPU operations used by the asset cache
///
/// Implementations are cheap to clone; clones share the same device.
pub trait GpuDevice: Send + Sync + Clone + Debug + 'static {
    type Buffer: Send + Sync + Debug;
    type Texture: Send + Sync + Debug;

    /// Allocate a buffer of `size` bytes
    fn allocate_buffer(&self, size: usize, usage: BufferUsage) -> GpuResult<Self::Buffer>;

    /// Copy `data` into `buffer` starting at `offset`
    fn upload_buffer_data(&self, buffer: &Self::Buffer, offset: usize, data: &[u8])
        -> GpuResult<()>;

    /// Create a texture initialised with `data`
    fn create_texture(&self, desc: &TextureDescriptor, data: &[u8]) -> GpuResult<Self::Texture>;

    /// Release a buffer immediately
    fn destroy_buffer(&self, buffer: Self::Buffer);

    /// Release a texture immediately
    fn destroy_texture(&self, texture: Self::Texture);

    /// Get the name of this GPU backend (for debugging)
    fn backend_name(&self) -> &'static str;
}

/// GPU resources belonging to one cached asset.
///
/// Dropping a `GpuAsset` destroys every buffer and texture it owns, so
/// releasing an asset never depends on anything but ownership.
#[derive(Debug)]
pub struct GpuAsset<G: GpuDevice> {
    gpu: G,
    buffers: Vec<G::Buffer>,
    textures: Vec<G::Texture>,
    mesh_count: usize,
    size_bytes: u64,
}

impl<G: GpuDevice> GpuAsset<G> {
    /// Upload an optimized asset.
    ///
    /// On failure the resources created so far are released before the
    /// error is returned.
    pub fn upload(gpu: &G, asset: &OptimizedAsset) -> GpuResult<Self> {
        let mut uploaded = Self {
            gpu: gpu.clone(),
            buffers: Vec::with_capacity(asset.meshes.len() * 2),
            textures: Vec::with_capacity(asset.textures.len()),
            mesh_count: asset.meshes.len(),
            size_bytes: 0,
        };

        for mesh in &asset.meshes {
            let vertex_bytes: &[u8] = bytemuck::cast_slice(&mesh.vertices);
            let index_bytes: &[u8] = bytemuck::cast_slice(&mesh.indices);
            uploaded.push_buffer(vertex_bytes, BufferUsage::Vertex)?;
            uploaded.push_buffer(index_bytes, BufferUsage::Index)?;
        }

        for texture in &asset.textures {
            let desc = TextureDescriptor::rgba(texture.width, texture.height);
            let handle = uploaded.gpu.create_texture(&desc, &texture.rgba)?;
            uploaded.textures.push(handle);
            uploaded.size_bytes += texture.rgba.len() as u64;
        }

        Ok(uploaded)
    }

    fn push_buffer(&mut self, data: &[u8], usage: BufferUsage) -> GpuResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        let buffer = self.gpu.allocate_buffer(data.len(), usage)?;
        // Keep ownership first so a failed upload still releases the buffer
        self.buffers.push(buffer);
        if let Some(buffer) = self.buffers.last() {
            self.gpu.upload_buffer_data(buffer, 0, data)?;
        }
        self.size_bytes += data.len() as u64;
        Ok(())
    }

    /// Bytes of GPU memory held by this asset
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn mesh_count(&self) -> usize {
        self.mesh_count
    }

    pub fn buffers(&self) -> &[G::Buffer] {
        &self.buffers
    }

    pub fn textures(&self) -> &[G::Texture] {
        &self.textures
    }
}

impl<G: GpuDevice> Drop for GpuAsset<G> {
    fn drop(&mut self) {
        for buffer in self.buffers.drain(..) {
            self.gpu.destroy_buffer(buffer);
        }
        for texture in self.textures.drain(..) {
            self.gpu.destroy_texture(texture);
        }
    }
}

// Re-export implementations
pub use mock::MockGpu;
