//! In-memory [`GpuDevice`] for tests and the demo
//!
//! Every allocation is booked on a shared [`Ledger`], so a test can assert
//! that evicting or dropping an asset really returns its memory.

use super::{BufferUsage, GpuDevice, GpuError, GpuResult, GpuTextureFormat, TextureDescriptor};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

static RESOURCE_IDS: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Default)]
struct Ledger {
    bytes: AtomicU64,
    live: AtomicI64,
    texture_failure: AtomicBool,
}

impl Ledger {
    fn book(&self, bytes: u64) -> u64 {
        self.bytes.fetch_add(bytes, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        RESOURCE_IDS.fetch_add(1, Ordering::Relaxed)
    }

    fn release(&self, bytes: u64) {
        self.bytes.fetch_sub(bytes, Ordering::SeqCst);
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Fake device; clones share one ledger
#[derive(Clone, Debug, Default)]
pub struct MockGpu {
    ledger: Arc<Ledger>,
}

impl MockGpu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes currently held by live buffers and textures
    pub fn allocated_bytes(&self) -> u64 {
        self.ledger.bytes.load(Ordering::SeqCst)
    }

    /// Buffers and textures created but not yet destroyed
    pub fn live_resources(&self) -> i64 {
        self.ledger.live.load(Ordering::SeqCst)
    }

    /// While set, texture creation reports out-of-memory
    pub fn fail_textures(&self, fail: bool) {
        self.ledger.texture_failure.store(fail, Ordering::SeqCst);
    }
}

#[derive(Debug)]
pub struct MockBuffer {
    pub id: u64,
    pub usage: BufferUsage,
    bytes: RwLock<Vec<u8>>,
}

impl MockBuffer {
    pub fn size(&self) -> usize {
        self.bytes.read().len()
    }

    /// Copy of the current contents
    pub fn contents(&self) -> Vec<u8> {
        self.bytes.read().clone()
    }
}

/// RGBA texture; pixels are kept only so sizes can be checked
#[derive(Debug)]
pub struct MockTexture {
    pub id: u64,
    pub width: u32,
    pub height: u32,
    pub format: GpuTextureFormat,
    pub pixels: Vec<u8>,
}

impl MockTexture {
    fn footprint(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height) * 4
    }
}

impl GpuDevice for MockGpu {
    type Buffer = MockBuffer;
    type Texture = MockTexture;

    fn allocate_buffer(&self, size: usize, usage: BufferUsage) -> GpuResult<MockBuffer> {
        if size == 0 {
            return Err(GpuError::InvalidSize(size));
        }
        let id = self.ledger.book(size as u64);
        Ok(MockBuffer {
            id,
            usage,
            bytes: RwLock::new(vec![0; size]),
        })
    }

    fn upload_buffer_data(&self, buffer: &MockBuffer, offset: usize, data: &[u8]) -> GpuResult<()> {
        let mut bytes = buffer.bytes.write();
        let end = offset
            .checked_add(data.len())
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| {
                GpuError::UploadFailed(format!(
                    "{} bytes at offset {} overrun a {} byte buffer",
                    data.len(),
                    offset,
                    bytes.len()
                ))
            })?;
        bytes[offset..end].copy_from_slice(data);
        Ok(())
    }

    fn create_texture(&self, desc: &TextureDescriptor, data: &[u8]) -> GpuResult<MockTexture> {
        if self.ledger.texture_failure.load(Ordering::SeqCst) {
            return Err(GpuError::OutOfMemory);
        }
        if desc.width == 0 || desc.height == 0 {
            return Err(GpuError::TextureCreationFailed(format!(
                "zero-sized texture {}x{}",
                desc.width, desc.height
            )));
        }

        let mut texture = MockTexture {
            id: 0,
            width: desc.width,
            height: desc.height,
            format: desc.format,
            pixels: data.to_vec(),
        };
        texture.id = self.ledger.book(texture.footprint());
        Ok(texture)
    }

    fn destroy_buffer(&self, buffer: MockBuffer) {
        self.ledger.release(buffer.size() as u64);
    }

    fn destroy_texture(&self, texture: MockTexture) {
        self.ledger.release(texture.footprint());
    }

    fn backend_name(&self) -> &'static str {
        "Mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_is_booked_and_released() {
        let gpu = MockGpu::new();
        let buffer = gpu.allocate_buffer(1024, BufferUsage::Vertex).unwrap();
        assert_eq!((gpu.allocated_bytes(), gpu.live_resources()), (1024, 1));

        gpu.destroy_buffer(buffer);
        assert_eq!((gpu.allocated_bytes(), gpu.live_resources()), (0, 0));
    }

    #[test]
    fn test_upload_lands_at_offset() {
        let gpu = MockGpu::new();
        let buffer = gpu.allocate_buffer(128, BufferUsage::Index).unwrap();
        gpu.upload_buffer_data(&buffer, 100, &[5, 6, 7, 8]).unwrap();
        assert_eq!(&buffer.contents()[100..104], &[5, 6, 7, 8]);
    }

    #[test]
    fn test_upload_overrun_rejected() {
        let gpu = MockGpu::new();
        let buffer = gpu.allocate_buffer(10, BufferUsage::Vertex).unwrap();
        assert!(gpu.upload_buffer_data(&buffer, 0, &[0; 20]).is_err());
        assert!(gpu.upload_buffer_data(&buffer, usize::MAX, &[1]).is_err());
    }

    #[test]
    fn test_zero_sized_resources_rejected() {
        let gpu = MockGpu::new();
        assert!(gpu.allocate_buffer(0, BufferUsage::Vertex).is_err());
        assert!(gpu.create_texture(&TextureDescriptor::rgba(0, 4), &[]).is_err());
        assert_eq!(gpu.live_resources(), 0);
    }

    #[test]
    fn test_texture_failure_switch() {
        let gpu = MockGpu::new();
        let desc = TextureDescriptor::rgba(2, 2);
        gpu.fail_textures(true);
        assert!(matches!(
            gpu.create_texture(&desc, &[0; 16]),
            Err(GpuError::OutOfMemory)
        ));
        gpu.fail_textures(false);
        let texture = gpu.create_texture(&desc, &[0; 16]).unwrap();
        assert_eq!(gpu.allocated_bytes(), 16);
        gpu.destroy_texture(texture);
        assert_eq!(gpu.allocated_bytes(), 0);
    }

    #[test]
    fn test_clones_share_ledger() {
        let gpu = MockGpu::new();
        let _buffer = gpu.allocate_buffer(1024, BufferUsage::Vertex).unwrap();
        assert_eq!(gpu.clone().allocated_bytes(), 1024);
    }
}
