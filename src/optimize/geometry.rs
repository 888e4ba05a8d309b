//! Geometry normalization and derived attributes

use glam::Vec3;

use super::{OptimizedMesh, Vertex};
use crate::loader::{LoadFailure, RawMesh};

/// Normalize every mesh of an asset into one shared unit bounding box.
///
/// All meshes share the transform so their relative placement survives.
pub fn build_meshes(meshes: Vec<RawMesh>) -> Result<Vec<OptimizedMesh>, LoadFailure> {
    let (min, max) = bounds(&meshes);
    let center = (min + max) * 0.5;
    let extent = (max - min).max_element();
    let scale = if extent > f32::EPSILON { 1.0 / extent } else { 1.0 };

    meshes
        .into_iter()
        .filter(|mesh| !mesh.positions.is_empty())
        .map(|mesh| build_mesh(mesh, center, scale))
        .collect()
}

fn bounds(meshes: &[RawMesh]) -> (Vec3, Vec3) {
    let mut points = meshes
        .iter()
        .flat_map(|m| m.positions.iter())
        .map(|p| Vec3::from_array(*p));

    let Some(first) = points.next() else {
        return (Vec3::ZERO, Vec3::ZERO);
    };
    points.fold((first, first), |(min, max), p| (min.min(p), max.max(p)))
}

fn build_mesh(mesh: RawMesh, center: Vec3, scale: f32) -> Result<OptimizedMesh, LoadFailure> {
    let vertex_count = mesh.positions.len();

    let indices = match mesh.indices {
        Some(indices) => {
            if let Some(bad) = indices.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(LoadFailure::Parse(format!(
                    "index {bad} out of range for {vertex_count} vertices"
                )));
            }
            indices
        }
        // Unindexed: treat as a triangle list, dropping a trailing partial triangle
        None => (0..(vertex_count - vertex_count % 3) as u32).collect(),
    };

    let positions: Vec<Vec3> = mesh
        .positions
        .iter()
        .map(|p| (Vec3::from_array(*p) - center) * scale)
        .collect();

    let normals = match mesh.normals {
        Some(normals) if normals.len() == vertex_count => normals,
        _ => compute_normals(&positions, &indices),
    };
    let uvs = match mesh.uvs {
        Some(uvs) if uvs.len() == vertex_count => uvs,
        _ => vec![[0.0, 0.0]; vertex_count],
    };

    let vertices = positions
        .iter()
        .zip(normals)
        .zip(uvs)
        .map(|((position, normal), uv)| Vertex {
            position: position.to_array(),
            normal,
            uv,
        })
        .collect();

    Ok(OptimizedMesh { vertices, indices })
}

/// Area-weighted smooth normals from a triangle list
pub fn compute_normals(positions: &[Vec3], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut accumulated = vec![Vec3::ZERO; positions.len()];

    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [
            triangle[0] as usize,
            triangle[1] as usize,
            triangle[2] as usize,
        ];
        let face = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
        accumulated[a] += face;
        accumulated[b] += face;
        accumulated[c] += face;
    }

    accumulated
        .into_iter()
        .map(|n| n.try_normalize().unwrap_or(Vec3::Z).to_array())
        .collect()
}
