//! Integration tests for GPU abstraction layer

use archetype_tier::optimize::{optimize, OptimizedAsset};
use archetype_tier::{BufferUsage, GpuAsset, GpuDevice, MockGpu, MockLoader};

fn triangle_asset(texture_side: u32) -> OptimizedAsset {
    optimize(MockLoader::textured_asset(texture_side), 1.0).unwrap()
}

#[test]
fn test_mock_gpu_integration() {
    let gpu = MockGpu::new();

    let buffer = gpu.allocate_buffer(1024, BufferUsage::Vertex).unwrap();
    let data = vec![1u8, 2, 3, 4];
    gpu.upload_buffer_data(&buffer, 0, &data).unwrap();

    assert!(buffer.size() >= 1024);
    assert_eq!(gpu.allocated_bytes(), 1024);

    gpu.destroy_buffer(buffer);
    assert_eq!(gpu.allocated_bytes(), 0);
}

#[test]
fn test_gpu_trait_bound() {
    fn upload_with<G: GpuDevice>(gpu: &G, asset: &OptimizedAsset) -> u64 {
        GpuAsset::upload(gpu, asset).map(|a| a.size_bytes()).unwrap_or(0)
    }

    let gpu = MockGpu::new();
    // 3 vertices of 32 bytes, 3 u32 indices and an 8x8 RGBA texture
    assert_eq!(upload_with(&gpu, &triangle_asset(8)), 96 + 12 + 256);
}

#[test]
fn test_asset_drop_releases_everything() {
    let gpu = MockGpu::new();
    let asset = GpuAsset::upload(&gpu, &triangle_asset(16)).unwrap();
    assert_eq!(gpu.allocated_bytes(), asset.size_bytes());
    assert_eq!(gpu.live_resources(), 3);

    drop(asset);
    assert_eq!(gpu.allocated_bytes(), 0);
    assert_eq!(gpu.live_resources(), 0);
}

#[test]
fn test_failed_upload_leaks_nothing() {
    let gpu = MockGpu::new();
    gpu.fail_textures(true);

    assert!(GpuAsset::upload(&gpu, &triangle_asset(16)).is_err());
    assert_eq!(gpu.allocated_bytes(), 0);
    assert_eq!(gpu.live_resources(), 0);
}
