//! Core mesh data types.
//!
//! Captured geometry is stored in single precision, matching what depth
//! sensors deliver. Geometric measurements (areas, volumes, aspect ratios)
//! are evaluated in double precision through [`Triangle`].

use image::DynamicImage;
use nalgebra::{Point3, Vector2, Vector3};
use tracing::debug;

/// A triangle mesh with parallel, index-aligned vertex attributes.
///
/// Coordinates are in meters. `normals` and `texture_coordinates` are aligned
/// with `vertices` when present; stages that resize the vertex array resize
/// or recompute both in lockstep.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    /// Vertex positions. Insertion order is the vertex index.
    pub vertices: Vec<Point3<f32>>,

    /// Per-vertex normals. May be shorter than `vertices` (or empty) before
    /// normal estimation has run.
    pub normals: Vec<Vector3<f32>>,

    /// Triangle faces as indices into the vertex array.
    pub faces: Vec<[u32; 3]>,

    /// Per-vertex texture coordinates in [0, 1].
    pub texture_coordinates: Option<Vec<Vector2<f32>>>,

    /// Captured color image used as the diffuse map.
    pub texture: Option<DynamicImage>,
}

impl Mesh {
    /// Create a new empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mesh with pre-allocated capacity.
    pub fn with_capacity(vertex_count: usize, face_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            normals: Vec::with_capacity(vertex_count),
            faces: Vec::with_capacity(face_count),
            texture_coordinates: None,
            texture: None,
        }
    }

    /// Create a mesh from positions and faces without any attributes.
    pub fn from_parts(vertices: Vec<Point3<f32>>, faces: Vec<[u32; 3]>) -> Self {
        Self {
            vertices,
            faces,
            ..Self::default()
        }
    }

    /// Number of vertices in the mesh.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of faces (triangles) in the mesh.
    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Check if mesh is empty (no vertices or faces).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// True when there is exactly one normal per vertex.
    #[inline]
    pub fn has_normals(&self) -> bool {
        !self.vertices.is_empty() && self.normals.len() == self.vertices.len()
    }

    /// Texture coordinates, if present and aligned with the vertices.
    #[inline]
    pub fn aligned_texture_coordinates(&self) -> Option<&[Vector2<f32>]> {
        self.texture_coordinates
            .as_deref()
            .filter(|uvs| uvs.len() == self.vertices.len())
    }

    /// True when every index of `face` addresses an existing vertex.
    #[inline]
    pub fn face_in_range(&self, face: &[u32; 3]) -> bool {
        let n = self.vertices.len();
        face.iter().all(|&i| (i as usize) < n)
    }

    /// Compute the axis-aligned bounding box.
    /// Returns (min_corner, max_corner) or None if the mesh has no vertices.
    pub fn bounds(&self) -> Option<(Point3<f32>, Point3<f32>)> {
        let first = *self.vertices.first()?;
        let mut min = first;
        let mut max = first;

        for p in &self.vertices[1..] {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
        }

        Some((min, max))
    }

    /// Mean of all vertex positions, accumulated in double precision.
    pub fn centroid(&self) -> Option<Point3<f64>> {
        if self.vertices.is_empty() {
            return None;
        }
        let sum = self
            .vertices
            .iter()
            .fold(Vector3::<f64>::zeros(), |acc, p| acc + p.cast::<f64>().coords);
        Some(Point3::from(sum / self.vertices.len() as f64))
    }

    /// Get a specific triangle by face index.
    ///
    /// Returns None if the face does not exist or references a vertex
    /// outside the mesh.
    pub fn triangle(&self, face_idx: usize) -> Option<Triangle> {
        let face = self.faces.get(face_idx)?;
        self.face_triangle(face)
    }

    /// Build the triangle for a face, if all of its indices are in range.
    pub fn face_triangle(&self, face: &[u32; 3]) -> Option<Triangle> {
        let v0 = self.vertices.get(face[0] as usize)?;
        let v1 = self.vertices.get(face[1] as usize)?;
        let v2 = self.vertices.get(face[2] as usize)?;
        Some(Triangle::new(v0.cast(), v1.cast(), v2.cast()))
    }

    /// Iterate over the triangles of all in-range faces.
    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        self.faces.iter().filter_map(|face| self.face_triangle(face))
    }

    /// Translate mesh by the given vector.
    pub fn translate(&mut self, offset: Vector3<f32>) {
        for p in &mut self.vertices {
            *p += offset;
        }
    }

    /// Scale mesh uniformly around the origin.
    pub fn scale(&mut self, factor: f32) {
        for p in &mut self.vertices {
            p.coords *= factor;
        }
    }

    /// Compute the signed volume of the mesh.
    ///
    /// Sums the signed tetrahedra formed by each face and the origin
    /// (divergence theorem). Positive for a closed mesh with outward-facing
    /// counter-clockwise winding. Meaningless for open meshes.
    pub fn signed_volume(&self) -> f64 {
        let volume: f64 = self
            .triangles()
            .map(|tri| tri.v0.coords.dot(&tri.v1.coords.cross(&tri.v2.coords)))
            .sum();
        volume / 6.0
    }

    /// Compute the total surface area of the mesh.
    pub fn surface_area(&self) -> f64 {
        self.triangles().map(|tri| tri.area()).sum()
    }
}

/// Mesh as delivered by the capture front end, before triangulation.
///
/// Faces are arbitrary polygons. Use [`RawMesh::into_mesh`] to obtain a
/// triangle [`Mesh`].
#[derive(Debug, Clone, Default)]
pub struct RawMesh {
    pub vertices: Vec<Point3<f32>>,
    pub normals: Vec<Vector3<f32>>,
    pub faces: Vec<Vec<u32>>,
    pub texture_coordinates: Option<Vec<Vector2<f32>>>,
    pub texture: Option<DynamicImage>,
}

impl RawMesh {
    /// Triangulate polygon faces and drop unusable ones.
    ///
    /// Polygons are fanned around their first index. Faces with fewer than
    /// three indices, or with any index outside the vertex array, are
    /// dropped. Texture coordinates that are not one per vertex are
    /// discarded.
    pub fn into_mesh(self) -> Mesh {
        let vertex_count = self.vertices.len();
        let mut faces = Vec::with_capacity(self.faces.len());
        let mut dropped = 0usize;

        for polygon in &self.faces {
            if polygon.len() < 3 || polygon.iter().any(|&i| i as usize >= vertex_count) {
                dropped += 1;
                continue;
            }
            let anchor = polygon[0];
            for pair in polygon[1..].windows(2) {
                faces.push([anchor, pair[0], pair[1]]);
            }
        }

        let texture_coordinates = self
            .texture_coordinates
            .filter(|uvs| uvs.len() == vertex_count);

        if dropped > 0 {
            debug!(dropped, "Dropped unusable faces during triangulation");
        }

        Mesh {
            vertices: self.vertices,
            normals: self.normals,
            faces,
            texture_coordinates,
            texture: self.texture,
        }
    }
}

impl From<Mesh> for RawMesh {
    fn from(mesh: Mesh) -> Self {
        Self {
            vertices: mesh.vertices,
            normals: mesh.normals,
            faces: mesh.faces.into_iter().map(|f| f.to_vec()).collect(),
            texture_coordinates: mesh.texture_coordinates,
            texture: mesh.texture,
        }
    }
}

/// Corner positions of one face, promoted to double precision for
/// area, volume and quality sums.
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub v0: Point3<f64>,
    pub v1: Point3<f64>,
    pub v2: Point3<f64>,
}

impl Triangle {
    #[inline]
    pub fn new(v0: Point3<f64>, v1: Point3<f64>, v2: Point3<f64>) -> Self {
        Self { v0, v1, v2 }
    }

    /// Cross product of the two edges leaving `v0`.
    ///
    /// Points along the counter-clockwise normal; its length is twice the area.
    #[inline]
    pub fn area_vector(&self) -> Vector3<f64> {
        (self.v1 - self.v0).cross(&(self.v2 - self.v0))
    }

    /// Unit normal, or `None` when the corners are collinear.
    pub fn normal(&self) -> Option<Vector3<f64>> {
        let n = self.area_vector();
        let len = n.norm();
        (len > f64::EPSILON).then(|| n / len)
    }

    #[inline]
    pub fn area(&self) -> f64 {
        0.5 * self.area_vector().norm()
    }

    #[inline]
    pub fn centroid(&self) -> Point3<f64> {
        Point3::from((self.v0.coords + self.v1.coords + self.v2.coords) / 3.0)
    }

    /// Longest edge over the altitude onto it.
    ///
    /// About 1.15 for an equilateral triangle, and growing without bound as
    /// the triangle becomes a sliver. Collinear corners give infinity.
    pub fn aspect_ratio(&self) -> f64 {
        let twice_area = self.area_vector().norm();
        if twice_area < 2.0 * f64::EPSILON {
            return f64::INFINITY;
        }
        let longest_sq = [
            (self.v1 - self.v0).norm_squared(),
            (self.v2 - self.v1).norm_squared(),
            (self.v0 - self.v2).norm_squared(),
        ]
        .into_iter()
        .fold(0.0, f64::max);

        // longest / (twice_area / longest)
        longest_sq / twice_area
    }
}
