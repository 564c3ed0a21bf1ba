//! STL reading and writing.
//!
//! Binary output uses an 80-byte space-padded header, a little-endian
//! triangle count, then 50 bytes per triangle: face normal, three corners,
//! and a zero attribute word. Face normals are recomputed from the corners
//! rather than taken from the vertex normals.

use std::io::Write;
use std::path::Path;

use nalgebra::{Point3, Vector3};
use tracing::debug;

use super::open_for_read;
use crate::Mesh;
use crate::error::{MeshError, MeshResult};

/// Size of the binary STL header in bytes.
pub const STL_HEADER_LEN: usize = 80;

const HEADER_TEXT: &[u8] = b"scan-mesh binary STL";

/// Load a binary or ASCII STL file.
///
/// Corners are merged by exact position. Triangles that collapse onto a
/// repeated index are skipped.
pub fn load_stl(path: &Path) -> MeshResult<Mesh> {
    let mut reader = open_for_read(path)?;
    let stl =
        stl_io::read_stl(&mut reader).map_err(|e| MeshError::parse_error(path, e.to_string()))?;

    debug!(
        vertices = stl.vertices.len(),
        triangles = stl.faces.len(),
        "Read STL"
    );

    let mut mesh = Mesh::with_capacity(stl.vertices.len(), stl.faces.len());
    mesh.vertices
        .extend(stl.vertices.iter().map(|v| Point3::new(v.0[0], v.0[1], v.0[2])));

    for face in &stl.faces {
        let [a, b, c] = face.vertices.map(|i| i as u32);
        if a != b && b != c && a != c {
            mesh.faces.push([a, b, c]);
        }
    }

    Ok(mesh)
}

/// Write a binary STL.
///
/// Faces referencing missing vertices are left out of both the count and
/// the body.
pub fn write_stl_binary<W: Write + ?Sized>(mesh: &Mesh, out: &mut W) -> std::io::Result<()> {
    let mut header = [b' '; STL_HEADER_LEN];
    header[..HEADER_TEXT.len()].copy_from_slice(HEADER_TEXT);
    out.write_all(&header)?;

    let count = mesh.faces.iter().filter(|f| mesh.face_in_range(f)).count() as u32;
    out.write_all(&count.to_le_bytes())?;

    for (corners, normal) in facets(mesh) {
        write_vec3(out, &normal)?;
        for p in &corners {
            write_vec3(out, &p.coords)?;
        }
        out.write_all(&0u16.to_le_bytes())?;
    }
    Ok(())
}

/// Write an ASCII STL named `mesh`.
pub fn write_stl_ascii<W: Write + ?Sized>(mesh: &Mesh, out: &mut W) -> std::io::Result<()> {
    writeln!(out, "solid mesh")?;
    for (corners, n) in facets(mesh) {
        writeln!(out, "  facet normal {} {} {}", n.x, n.y, n.z)?;
        writeln!(out, "    outer loop")?;
        for p in &corners {
            writeln!(out, "      vertex {} {} {}", p.x, p.y, p.z)?;
        }
        writeln!(out, "    endloop")?;
        writeln!(out, "  endfacet")?;
    }
    writeln!(out, "endsolid mesh")?;
    Ok(())
}

fn facets(mesh: &Mesh) -> impl Iterator<Item = ([Point3<f32>; 3], Vector3<f32>)> + '_ {
    mesh.faces
        .iter()
        .filter(|f| mesh.face_in_range(f))
        .map(|f| {
            let corners = f.map(|i| mesh.vertices[i as usize]);
            (corners, facet_normal(&corners))
        })
}

fn facet_normal([a, b, c]: &[Point3<f32>; 3]) -> Vector3<f32> {
    let n = (b - a).cross(&(c - a));
    let len = n.norm();
    if len > 0.0 {
        n / len
    } else {
        Vector3::zeros()
    }
}

fn write_vec3<W: Write + ?Sized>(out: &mut W, v: &Vector3<f32>) -> std::io::Result<()> {
    out.write_all(&v.x.to_le_bytes())?;
    out.write_all(&v.y.to_le_bytes())?;
    out.write_all(&v.z.to_le_bytes())
}
