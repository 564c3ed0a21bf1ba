//! Wavefront OBJ and MTL.
//!
//! Positions, texture coordinates and normals are index-aligned, so every
//! face corner repeats one index three times (`f 1/1/1 2/2/2 3/3/3`).

use std::io::Write;
use std::path::Path;

use nalgebra::{Point3, Vector2, Vector3};
use tracing::debug;

use crate::Mesh;
use crate::error::{MeshError, MeshResult};
use crate::normals::compute_vertex_normals;

/// Name of the single material written to companion MTL files.
pub const MATERIAL_NAME: &str = "material0";

/// Load an OBJ file, merging all of its objects into one mesh.
///
/// Polygons are triangulated by the reader. Normals and texture
/// coordinates are kept when every vertex has one.
pub fn load_obj(path: &Path) -> MeshResult<Mesh> {
    let (models, _materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
    )
    .map_err(|e| match e {
        tobj::LoadError::OpenFileFailed => MeshError::io_read(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "could not open OBJ file"),
        ),
        other => MeshError::parse_error(path, other.to_string()),
    })?;

    if models.is_empty() {
        return Err(MeshError::empty_mesh("OBJ file contains no objects"));
    }

    let mut mesh = Mesh::new();
    let mut normals = Vec::new();
    let mut uvs = Vec::new();
    let mut vertex_offset = 0u32;

    for model in &models {
        let m = &model.mesh;
        debug!(name = %model.name, positions = m.positions.len() / 3, "Reading OBJ object");

        mesh.vertices.extend(
            m.positions
                .chunks_exact(3)
                .map(|c| Point3::new(c[0], c[1], c[2])),
        );
        normals.extend(m.normals.chunks_exact(3).map(|c| Vector3::new(c[0], c[1], c[2])));
        uvs.extend(m.texcoords.chunks_exact(2).map(|c| Vector2::new(c[0], c[1])));

        mesh.faces.extend(m.indices.chunks_exact(3).map(|c| {
            [
                c[0] + vertex_offset,
                c[1] + vertex_offset,
                c[2] + vertex_offset,
            ]
        }));
        vertex_offset = mesh.vertices.len() as u32;
    }

    if normals.len() == mesh.vertices.len() {
        mesh.normals = normals;
    }
    if !uvs.is_empty() && uvs.len() == mesh.vertices.len() {
        mesh.texture_coordinates = Some(uvs);
    }

    Ok(mesh)
}

/// Write an OBJ body.
///
/// When `material_library` is given the file references it with `mtllib`
/// and selects [`MATERIAL_NAME`] before the faces. Normals are estimated if
/// the mesh carries none.
pub fn write_obj<W: Write + ?Sized>(
    mesh: &Mesh,
    material_library: Option<&str>,
    out: &mut W,
) -> std::io::Result<()> {
    let estimated;
    let normals: &[Vector3<f32>] = if mesh.has_normals() {
        &mesh.normals
    } else {
        estimated = compute_vertex_normals(mesh);
        &estimated
    };
    let uvs = mesh.aligned_texture_coordinates();
    let faces: Vec<&[u32; 3]> = mesh.faces.iter().filter(|f| mesh.face_in_range(f)).collect();

    writeln!(out, "# scan-mesh OBJ export")?;
    writeln!(out, "# Vertices: {}", mesh.vertex_count())?;
    writeln!(out, "# Faces: {}", faces.len())?;
    writeln!(out)?;

    if let Some(library) = material_library {
        writeln!(out, "mtllib {}", library)?;
        writeln!(out)?;
    }

    for p in &mesh.vertices {
        writeln!(out, "v {} {} {}", p.x, p.y, p.z)?;
    }
    if let Some(uvs) = uvs {
        for uv in uvs {
            writeln!(out, "vt {} {}", uv.x, uv.y)?;
        }
    }
    for n in normals {
        writeln!(out, "vn {} {} {}", n.x, n.y, n.z)?;
    }
    writeln!(out)?;

    if material_library.is_some() {
        writeln!(out, "usemtl {}", MATERIAL_NAME)?;
    }

    // OBJ indices are 1-based
    for face in faces {
        let [a, b, c] = face.map(|i| i + 1);
        if uvs.is_some() {
            writeln!(out, "f {a}/{a}/{a} {b}/{b}/{b} {c}/{c}/{c}")?;
        } else {
            writeln!(out, "f {a}//{a} {b}//{b} {c}//{c}")?;
        }
    }
    Ok(())
}

/// Write the companion MTL with a single white diffuse material.
pub fn write_mtl<W: Write + ?Sized>(
    texture_file: Option<&str>,
    out: &mut W,
) -> std::io::Result<()> {
    writeln!(out, "# scan-mesh material")?;
    writeln!(out, "newmtl {}", MATERIAL_NAME)?;
    writeln!(out, "Ka 1.000 1.000 1.000")?;
    writeln!(out, "Kd 1.000 1.000 1.000")?;
    writeln!(out, "Ks 0.000 0.000 0.000")?;
    writeln!(out, "Ns 0.0")?;
    writeln!(out, "d 1.0")?;
    writeln!(out, "illum 1")?;
    if let Some(texture) = texture_file {
        writeln!(out, "map_Kd {}", texture)?;
    }
    Ok(())
}
