//! Binary glTF (GLB) loading
//!
//! Only self-contained GLB files are supported: geometry and images must
//! live in the embedded binary chunk. Primitives that are not triangle
//! lists and images referenced by URI are skipped with a warning.

use gltf::Gltf;
use std::path::{Path, PathBuf};

use super::{AssetLoader, LoadFailure, RawAsset, RawMesh, RawTexture};

/// Loads `.glb` files relative to a root directory
#[derive(Debug, Clone)]
pub struct GlbFileLoader {
    root: PathBuf,
}

impl GlbFileLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, LoadFailure> {
        let full = self.root.join(path);

        #[cfg(feature = "runtime-tokio")]
        let bytes = tokio::fs::read(&full).await;
        #[cfg(not(feature = "runtime-tokio"))]
        let bytes = std::fs::read(&full);

        bytes.map_err(|e| LoadFailure::Transport(format!("{}: {e}", full.display())))
    }
}

#[async_trait::async_trait]
impl AssetLoader for GlbFileLoader {
    async fn fetch(&self, path: &str) -> Result<RawAsset, LoadFailure> {
        let bytes = self.read(path).await?;
        parse_glb(&bytes)
    }
}

/// Parse a GLB byte slice into raw meshes and textures
pub fn parse_glb(data: &[u8]) -> Result<RawAsset, LoadFailure> {
    let gltf = Gltf::from_slice(data)
        .map_err(|e| LoadFailure::Parse(format!("Failed to parse GLB: {e}")))?;

    let blob = gltf
        .blob
        .as_deref()
        .ok_or_else(|| LoadFailure::Parse("GLB file is missing binary data".to_string()))?;

    let mut meshes = Vec::new();
    for mesh in gltf.meshes() {
        for primitive in mesh.primitives() {
            if !matches!(primitive.mode(), gltf::mesh::Mode::Triangles) {
                log::warn!(
                    "Skipping non-triangle primitive in mesh {:?}",
                    mesh.name().unwrap_or("unnamed")
                );
                continue;
            }

            let reader = primitive.reader(|buffer| match buffer.source() {
                gltf::buffer::Source::Bin => Some(blob),
                gltf::buffer::Source::Uri(_) => None,
            });
            let Some(positions) = reader.read_positions() else {
                log::warn!("Skipping primitive without positions");
                continue;
            };

            meshes.push(RawMesh {
                positions: positions.collect(),
                normals: reader.read_normals().map(|n| n.collect()),
                uvs: reader.read_tex_coords(0).map(|t| t.into_f32().collect()),
                indices: reader.read_indices().map(|i| i.into_u32().collect()),
            });
        }
    }

    let mut textures = Vec::new();
    for image in gltf.images() {
        match image.source() {
            gltf::image::Source::View { view, .. } => {
                let start = view.offset();
                let end = start + view.length();
                if end > blob.len() {
                    return Err(LoadFailure::Parse(format!(
                        "Image view out of bounds: {end} > {}",
                        blob.len()
                    )));
                }
                let decoded = image::load_from_memory(&blob[start..end])
                    .map_err(|e| LoadFailure::Parse(format!("Image decoding error: {e}")))?
                    .into_rgba8();
                let (width, height) = decoded.dimensions();
                textures.push(RawTexture {
                    width,
                    height,
                    rgba: decoded.into_raw(),
                });
            }
            gltf::image::Source::Uri { uri, .. } => {
                log::warn!("Skipping external image {uri}");
            }
        }
    }

    log::debug!(
        "Parsed GLB with {} primitives and {} textures",
        meshes.len(),
        textures.len()
    );
    Ok(RawAsset { meshes, textures })
}
