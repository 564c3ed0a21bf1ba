//! Laplacian surface smoothing.

use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Mesh;
use crate::adjacency::MeshTopology;
use crate::error::{MeshError, MeshResult};
use crate::tracing_ext::{OperationTimer, log_stage_result};

/// Parameters for Laplacian smoothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothParams {
    /// Number of relaxation passes.
    pub iterations: usize,

    /// Blend toward the neighbor centroid per pass, in [0, 1].
    /// 0 leaves the surface untouched, 1 moves each vertex onto the centroid.
    pub factor: f32,

    /// Vertex count above which passes run in parallel.
    pub parallel_threshold: usize,
}

impl Default for SmoothParams {
    fn default() -> Self {
        Self {
            iterations: 3,
            factor: 0.5,
            parallel_threshold: 10_000,
        }
    }
}

impl SmoothParams {
    /// Check that `factor` lies in [0, 1].
    pub fn validate(&self) -> MeshResult<()> {
        if !(0.0..=1.0).contains(&self.factor) {
            return Err(MeshError::invalid_parameter(
                "factor",
                self.factor,
                "smoothing factor must be within [0, 1]",
            ));
        }
        Ok(())
    }
}

/// Result of smoothing.
#[derive(Debug, Clone)]
pub struct SmoothResult {
    /// The smoothed mesh.
    pub mesh: Mesh,

    /// Passes that were applied.
    pub iterations: usize,

    /// Largest distance any vertex moved from its input position.
    pub max_displacement: f32,
}

/// Relax vertex positions toward their neighbor centroids.
///
/// Every pass reads only the previous pass's positions, so the result does
/// not depend on vertex order or on whether the pass ran in parallel.
/// Vertices without neighbors keep their positions. Faces, normals and
/// texture coordinates are carried over unchanged.
pub fn smooth(mesh: &Mesh, params: &SmoothParams) -> MeshResult<SmoothResult> {
    params.validate()?;
    let _timer = OperationTimer::start("smooth", mesh);

    let mut result = mesh.clone();
    if params.iterations == 0 || mesh.vertices.is_empty() {
        return Ok(SmoothResult {
            mesh: result,
            iterations: 0,
            max_displacement: 0.0,
        });
    }

    let topology = MeshTopology::from_mesh(mesh);
    let parallel = mesh.vertex_count() > params.parallel_threshold;

    let mut current = mesh.vertices.clone();
    for pass in 0..params.iterations {
        let previous = &current;
        let relax = |v: usize| relax_vertex(previous, &topology, v, params.factor);
        let next: Vec<Point3<f32>> = if parallel {
            (0..previous.len()).into_par_iter().map(relax).collect()
        } else {
            (0..previous.len()).map(relax).collect()
        };
        current = next;
        debug!(pass, "Smoothing pass complete");
    }

    let max_displacement = mesh
        .vertices
        .iter()
        .zip(&current)
        .map(|(a, b)| (b - a).norm())
        .fold(0.0_f32, f32::max);

    result.vertices = current;
    log_stage_result("smooth", params.iterations, mesh, &result);

    Ok(SmoothResult {
        mesh: result,
        iterations: params.iterations,
        max_displacement,
    })
}

fn relax_vertex(
    positions: &[Point3<f32>],
    topology: &MeshTopology,
    v: usize,
    factor: f32,
) -> Point3<f32> {
    let p = positions[v];
    let neighbors = topology.neighbors(v as u32);
    if neighbors.is_empty() {
        return p;
    }

    let sum = neighbors
        .iter()
        .fold(Vector3::<f32>::zeros(), |acc, &n| acc + positions[n as usize].coords);
    let centroid = sum / neighbors.len() as f32;

    Point3::from(p.coords * (1.0 - factor) + centroid * factor)
}

impl Mesh {
    /// Smooth with default parameters.
    pub fn smooth(&self) -> MeshResult<SmoothResult> {
        smooth(self, &SmoothParams::default())
    }

    /// Smooth with custom parameters.
    pub fn smooth_with_params(&self, params: &SmoothParams) -> MeshResult<SmoothResult> {
        smooth(self, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::grid;

    fn bumpy_grid() -> Mesh {
        let mut mesh = grid(4, 1.0);
        mesh.vertices[12].z = 0.5;
        mesh
    }

    #[test]
    fn test_zero_iterations_is_identity() {
        let mesh = bumpy_grid();
        let params = SmoothParams {
            iterations: 0,
            ..SmoothParams::default()
        };
        let result = smooth(&mesh, &params).unwrap();
        assert_eq!(result.mesh.vertices, mesh.vertices);
        assert_eq!(result.max_displacement, 0.0);
    }

    #[test]
    fn test_bump_is_flattened() {
        let mesh = bumpy_grid();
        let result = mesh.smooth().unwrap();
        assert!(result.mesh.vertices[12].z < 0.5);
        assert!(result.max_displacement > 0.0);
        assert_eq!(result.mesh.faces, mesh.faces);
    }

    #[test]
    fn test_factor_one_moves_onto_centroid() {
        let mesh = bumpy_grid();
        let params = SmoothParams {
            iterations: 1,
            factor: 1.0,
            ..SmoothParams::default()
        };
        let result = smooth(&mesh, &params).unwrap();
        // All six neighbors of the center vertex lie at z = 0
        assert!(result.mesh.vertices[12].z.abs() < 1e-6);
    }

    #[test]
    fn test_isolated_vertex_unchanged() {
        let mut mesh = bumpy_grid();
        mesh.vertices.push(Point3::new(9.0, 9.0, 9.0));
        let result = mesh.smooth().unwrap();
        assert_eq!(result.mesh.vertices[25], Point3::new(9.0, 9.0, 9.0));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mesh = bumpy_grid();
        let sequential = mesh.smooth().unwrap();
        let parallel = smooth(
            &mesh,
            &SmoothParams {
                parallel_threshold: 0,
                ..SmoothParams::default()
            },
        )
        .unwrap();
        assert_eq!(sequential.mesh.vertices, parallel.mesh.vertices);
    }

    #[test]
    fn test_factor_out_of_range_is_rejected() {
        let params = SmoothParams {
            factor: 1.5,
            ..SmoothParams::default()
        };
        let err = smooth(&bumpy_grid(), &params).unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::InvalidParameter);
    }
}
