//! Fallback texture coordinates by cylindrical projection.
//!
//! Used when the capture front end supplied no coordinates, or when an
//! earlier stage invalidated them. The projection wraps around the vertical
//! (Y) axis through the center of the bounding box: `u` follows the angle
//! around that axis and `v` the height. It covers the unit square and wraps
//! seamlessly in `u`, but makes no attempt to minimize distortion.

use nalgebra::Vector2;
use std::f32::consts::PI;

use crate::Mesh;

/// Project every vertex onto a cylinder around the box's vertical axis.
///
/// Returns one coordinate per vertex. A mesh with no vertices yields an
/// empty vector; a flat box (zero height) maps every `v` to 0.
pub fn generate_cylindrical_uvs(mesh: &Mesh) -> Vec<Vector2<f32>> {
    let Some((min, max)) = mesh.bounds() else {
        return Vec::new();
    };
    let dims = max - min;

    mesh.vertices
        .iter()
        .map(|p| {
            let local = p - min;
            let angle = (local.x - dims.x / 2.0).atan2(local.z - dims.z / 2.0);
            let u = (angle + PI) / (2.0 * PI);
            let v = if dims.y > 0.0 { local.y / dims.y } else { 0.0 };
            Vector2::new(u, v)
        })
        .collect()
}

impl Mesh {
    /// Fill in cylindrical texture coordinates when none are aligned with
    /// the vertices. Returns true if coordinates were generated.
    pub fn ensure_texture_coordinates(&mut self) -> bool {
        if self.vertices.is_empty() || self.aligned_texture_coordinates().is_some() {
            return false;
        }
        self.texture_coordinates = Some(generate_cylindrical_uvs(self));
        true
    }
}
