//! Mesh decimation by vertex clustering.
//!
//! Vertices are bucketed into a uniform grid over the bounding box and each
//! occupied cell collapses to the centroid of its members. Faces whose
//! corners land in fewer than three distinct cells are dropped.

use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Mesh;
use crate::error::{MeshError, MeshResult};
use crate::tracing_ext::{OperationTimer, log_stage_result};

/// Parameters for mesh decimation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecimateParams {
    /// Target fraction of the original vertex count, in (0, 1].
    /// A ratio of 1 or more leaves the mesh untouched.
    pub ratio: f32,
}

impl Default for DecimateParams {
    fn default() -> Self {
        Self { ratio: 0.5 }
    }
}

impl DecimateParams {
    /// Create params targeting a fraction of the original vertices.
    pub fn with_ratio(ratio: f32) -> Self {
        Self { ratio }
    }
}

/// Result of mesh decimation.
#[derive(Debug, Clone)]
pub struct DecimateResult {
    /// The decimated mesh.
    pub mesh: Mesh,
    /// Number of vertices in the original mesh.
    pub original_vertices: usize,
    /// Number of vertices in the decimated mesh.
    pub final_vertices: usize,
    /// Number of triangles in the original mesh.
    pub original_triangles: usize,
    /// Number of triangles in the decimated mesh.
    pub final_triangles: usize,
    /// Grid cells per axis, or 0 when the mesh was left untouched.
    pub cells_per_axis: usize,
}

/// Reduce the vertex count by clustering vertices on a uniform grid.
///
/// The grid has `round(target^(1/3))` cells along the longest box axis and
/// the same cell size on the others. Representative normals are the
/// normalized sum of member normals when the input has aligned normals.
/// Texture coordinates are cleared because clustering breaks their
/// correspondence with the image; regenerate them afterwards.
///
/// # Errors
///
/// Returns [`MeshError::InvalidParameter`] when the ratio is not positive.
pub fn decimate(mesh: &Mesh, params: &DecimateParams) -> MeshResult<DecimateResult> {
    let ratio = params.ratio;
    if ratio.is_nan() || ratio <= 0.0 {
        return Err(MeshError::invalid_parameter(
            "ratio",
            ratio,
            "decimation ratio must be greater than zero",
        ));
    }

    let original_vertices = mesh.vertex_count();
    let target = ((original_vertices as f64) * f64::from(ratio)).floor() as usize;

    let untouched = |mesh: &Mesh| DecimateResult {
        mesh: mesh.clone(),
        original_vertices,
        final_vertices: original_vertices,
        original_triangles: mesh.face_count(),
        final_triangles: mesh.face_count(),
        cells_per_axis: 0,
    };

    let Some((min, max)) = mesh.bounds() else {
        return Ok(untouched(mesh));
    };
    if ratio >= 1.0 || target >= original_vertices {
        return Ok(untouched(mesh));
    }

    let _timer = OperationTimer::start("decimate", mesh);

    let cells_per_axis = ((target.max(1) as f64).cbrt().round() as usize).max(1);
    let dims = (max - min).cast::<f64>();
    let max_dim = dims.x.max(dims.y).max(dims.z);
    let cell_size = if max_dim > 0.0 {
        max_dim / cells_per_axis as f64
    } else {
        1.0
    };

    let min = min.cast::<f64>();
    let use_normals = mesh.has_normals();

    // Cells are numbered in order of first occupancy
    let mut cell_index: HashMap<(i64, i64, i64), u32> = HashMap::new();
    let mut position_sums: Vec<Vector3<f64>> = Vec::new();
    let mut normal_sums: Vec<Vector3<f32>> = Vec::new();
    let mut counts: Vec<u32> = Vec::new();
    let mut remap: Vec<u32> = Vec::with_capacity(original_vertices);

    for (i, p) in mesh.vertices.iter().enumerate() {
        let local = (p.cast::<f64>() - min) / cell_size;
        let key = (
            local.x.floor() as i64,
            local.y.floor() as i64,
            local.z.floor() as i64,
        );
        let cell = *cell_index.entry(key).or_insert_with(|| {
            position_sums.push(Vector3::zeros());
            normal_sums.push(Vector3::zeros());
            counts.push(0);
            (counts.len() - 1) as u32
        });

        let slot = cell as usize;
        position_sums[slot] += p.cast::<f64>().coords;
        counts[slot] += 1;
        if use_normals {
            normal_sums[slot] += mesh.normals[i];
        }
        remap.push(cell);
    }

    let vertices: Vec<Point3<f32>> = position_sums
        .iter()
        .zip(&counts)
        .map(|(sum, &count)| Point3::from(sum / f64::from(count)).cast::<f32>())
        .collect();

    let normals: Vec<Vector3<f32>> = if use_normals {
        normal_sums
            .into_iter()
            .map(|n| {
                let len = n.norm();
                if len > 0.0 {
                    n / len
                } else {
                    n
                }
            })
            .collect()
    } else {
        Vec::new()
    };

    let faces: Vec<[u32; 3]> = mesh
        .faces
        .iter()
        .filter(|f| mesh.face_in_range(f))
        .map(|f| [remap[f[0] as usize], remap[f[1] as usize], remap[f[2] as usize]])
        .filter(|[a, b, c]| a != b && b != c && a != c)
        .collect();

    debug!(
        cells_per_axis,
        cell_size,
        occupied_cells = vertices.len(),
        "Clustered vertices"
    );

    let decimated = Mesh {
        vertices,
        normals,
        faces,
        texture_coordinates: None,
        texture: mesh.texture.clone(),
    };

    log_stage_result(
        "decimate",
        original_vertices - decimated.vertex_count(),
        mesh,
        &decimated,
    );

    Ok(DecimateResult {
        final_vertices: decimated.vertex_count(),
        original_triangles: mesh.face_count(),
        final_triangles: decimated.face_count(),
        mesh: decimated,
        original_vertices,
        cells_per_axis,
    })
}

impl Mesh {
    /// Decimate to a fraction of the original vertex count.
    pub fn decimate_to_ratio(&self, ratio: f32) -> MeshResult<DecimateResult> {
        decimate(self, &DecimateParams::with_ratio(ratio))
    }
}
