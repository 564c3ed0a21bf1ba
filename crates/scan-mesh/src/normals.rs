//! Per-vertex normal estimation.
//!
//! Each vertex normal is the normalized sum of the unnormalized normals of
//! its incident faces. The cross product length is twice the face area, so
//! larger faces weigh more without an explicit weighting term.

use nalgebra::Vector3;
use rayon::prelude::*;

use crate::Mesh;
use crate::tracing_ext::OperationTimer;

/// Vertex count above which the normalize pass runs in parallel.
const PARALLEL_NORMALIZE_THRESHOLD: usize = 10_000;

/// Compute area-weighted vertex normals.
///
/// Faces that are out of range or repeat an index are ignored. Vertices
/// without an incident face, or whose accumulated normal cancels out, get a
/// zero vector.
pub fn compute_vertex_normals(mesh: &Mesh) -> Vec<Vector3<f32>> {
    let _timer = OperationTimer::start("compute_vertex_normals", mesh);

    // Scatter-add into shared slots: this loop stays sequential
    let mut accum = vec![Vector3::<f32>::zeros(); mesh.vertex_count()];
    for face in &mesh.faces {
        let [a, b, c] = *face;
        if !mesh.face_in_range(face) || a == b || b == c || a == c {
            continue;
        }
        let p0 = mesh.vertices[a as usize];
        let n = (mesh.vertices[b as usize] - p0).cross(&(mesh.vertices[c as usize] - p0));
        accum[a as usize] += n;
        accum[b as usize] += n;
        accum[c as usize] += n;
    }

    if accum.len() > PARALLEL_NORMALIZE_THRESHOLD {
        accum.into_par_iter().map(normalize_or_zero).collect()
    } else {
        accum.into_iter().map(normalize_or_zero).collect()
    }
}

fn normalize_or_zero(n: Vector3<f32>) -> Vector3<f32> {
    let len = n.norm();
    if len > 0.0 {
        n / len
    } else {
        Vector3::zeros()
    }
}

impl Mesh {
    /// Replace the normals with freshly estimated ones.
    pub fn recompute_normals(&mut self) {
        self.normals = compute_vertex_normals(self);
    }

    /// Copy of the mesh with freshly estimated normals.
    pub fn with_estimated_normals(&self) -> Mesh {
        let mut mesh = self.clone();
        mesh.recompute_normals();
        mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::{grid, unit_cube};
    use nalgebra::Point3;

    #[test]
    fn test_flat_grid_normals_point_up() {
        let normals = compute_vertex_normals(&grid(3, 1.0));
        for n in normals {
            assert!((n - Vector3::z()).norm() < 1e-6, "got {:?}", n);
        }
    }

    #[test]
    fn test_cube_corner_normals_point_outward() {
        let cube = unit_cube();
        let normals = compute_vertex_normals(&cube);
        let center = Point3::new(0.5_f32, 0.5, 0.5);
        for (p, n) in cube.vertices.iter().zip(&normals) {
            assert!((n.norm() - 1.0).abs() < 1e-5);
            assert!(n.dot(&(p - center)) > 0.0);
        }
    }

    #[test]
    fn test_unreferenced_vertex_gets_zero() {
        let mut mesh = grid(1, 1.0);
        mesh.vertices.push(Point3::new(5.0, 5.0, 5.0));
        mesh.faces.push([0, 1, 99]);
        let normals = compute_vertex_normals(&mesh);
        assert_eq!(normals.len(), 5);
        assert_eq!(normals[4], Vector3::zeros());
    }

    #[test]
    fn test_recompute_aligns_normals() {
        let mut mesh = unit_cube();
        assert!(!mesh.has_normals());
        mesh.recompute_normals();
        assert!(mesh.has_normals());
    }
}
