//! Noise filtering for raw depth captures.
//!
//! Depth sensors produce stray vertices that float away from the surface.
//! Such vertices are connected to their neighbors by unusually long edges,
//! so a vertex is kept only while the mean length of its edges stays below
//! ten times the configured threshold. Isolated vertices are dropped.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Mesh;
use crate::adjacency::MeshTopology;
use crate::tracing_ext::{OperationTimer, log_stage_result};

/// Parameters for noise removal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseFilterParams {
    /// Base distance in meters. A vertex is kept when the mean distance to
    /// its neighbors is below `threshold * 10`.
    pub threshold: f32,

    /// Vertex count above which neighbor distances are scored in parallel.
    /// The result is identical either way.
    pub parallel_threshold: usize,
}

impl Default for NoiseFilterParams {
    fn default() -> Self {
        Self {
            threshold: 0.002,
            parallel_threshold: 10_000,
        }
    }
}

impl NoiseFilterParams {
    /// Use the given base threshold in meters.
    pub fn with_threshold(threshold: f32) -> Self {
        Self {
            threshold,
            ..Self::default()
        }
    }
}

/// Result of noise removal.
#[derive(Debug, Clone)]
pub struct NoiseFilterResult {
    /// The filtered mesh.
    pub mesh: Mesh,

    /// Vertices dropped as noise or isolated.
    pub vertices_removed: usize,

    /// Faces dropped because they touched a removed vertex.
    pub faces_removed: usize,
}

/// Remove outlier vertices and every face that touches one.
///
/// Surviving vertices keep their relative order. Normals and texture
/// coordinates are compacted through the same index map when they are
/// aligned with the vertices, and cleared otherwise.
pub fn remove_noise(mesh: &Mesh, params: &NoiseFilterParams) -> NoiseFilterResult {
    let _timer = OperationTimer::start("remove_noise", mesh);

    let topology = MeshTopology::from_mesh(mesh);
    let limit = f64::from(params.threshold) * 10.0;

    let score = |v: usize| vertex_is_valid(mesh, &topology, v, limit);
    let keep: Vec<bool> = if mesh.vertex_count() > params.parallel_threshold {
        (0..mesh.vertex_count()).into_par_iter().map(score).collect()
    } else {
        (0..mesh.vertex_count()).map(score).collect()
    };

    let (filtered, faces_removed) = compact_vertices(mesh, &keep);
    let vertices_removed = mesh.vertex_count() - filtered.vertex_count();

    debug!(
        vertices_removed,
        faces_removed,
        limit,
        "Noise filter scored vertices"
    );
    log_stage_result("remove_noise", vertices_removed, mesh, &filtered);

    NoiseFilterResult {
        mesh: filtered,
        vertices_removed,
        faces_removed,
    }
}

/// Mean neighbor distance test for one vertex.
fn vertex_is_valid(mesh: &Mesh, topology: &MeshTopology, v: usize, limit: f64) -> bool {
    let neighbors = topology.neighbors(v as u32);
    if neighbors.is_empty() {
        return false;
    }

    let p = mesh.vertices[v].cast::<f64>();
    let total: f64 = neighbors
        .iter()
        .map(|&n| (mesh.vertices[n as usize].cast::<f64>() - p).norm())
        .sum();

    total / (neighbors.len() as f64) < limit
}

/// Keep the vertices flagged in `keep`, remapping faces and attributes.
///
/// Faces with any dropped or out-of-range endpoint are removed. Returns the
/// compacted mesh and the number of faces removed.
pub(crate) fn compact_vertices(mesh: &Mesh, keep: &[bool]) -> (Mesh, usize) {
    let mut remap: Vec<Option<u32>> = vec![None; mesh.vertex_count()];
    let mut next = 0u32;
    for (slot, &kept) in remap.iter_mut().zip(keep) {
        if kept {
            *slot = Some(next);
            next += 1;
        }
    }

    let select = |i: usize| remap[i].is_some();

    let vertices: Vec<_> = mesh
        .vertices
        .iter()
        .enumerate()
        .filter(|(i, _)| select(*i))
        .map(|(_, p)| *p)
        .collect();

    let normals = if mesh.has_normals() {
        mesh.normals
            .iter()
            .enumerate()
            .filter(|(i, _)| select(*i))
            .map(|(_, n)| *n)
            .collect()
    } else {
        Vec::new()
    };

    let texture_coordinates = mesh.aligned_texture_coordinates().map(|uvs| {
        uvs.iter()
            .enumerate()
            .filter(|(i, _)| select(*i))
            .map(|(_, uv)| *uv)
            .collect()
    });

    let lookup = |i: u32| remap.get(i as usize).copied().flatten();
    let faces: Vec<[u32; 3]> = mesh
        .faces
        .iter()
        .filter_map(|f| Some([lookup(f[0])?, lookup(f[1])?, lookup(f[2])?]))
        .collect();
    let faces_removed = mesh.face_count() - faces.len();

    let compacted = Mesh {
        vertices,
        normals,
        faces,
        texture_coordinates,
        texture: mesh.texture.clone(),
    };
    (compacted, faces_removed)
}

impl Mesh {
    /// Remove noisy vertices with default parameters.
    pub fn remove_noise(&self) -> NoiseFilterResult {
        remove_noise(self, &NoiseFilterParams::default())
    }

    /// Remove noisy vertices with custom parameters.
    pub fn remove_noise_with_params(&self, params: &NoiseFilterParams) -> NoiseFilterResult {
        remove_noise(self, params)
    }
}
