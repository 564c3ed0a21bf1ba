//! Stanford PLY reading and writing.
//!
//! Output declares `element vertex` with `x y z` (plus `nx ny nz` when the
//! mesh has aligned normals) and `element face` with a
//! `list uchar int vertex_indices` property.

use std::io::Write;
use std::path::Path;

use nalgebra::{Point3, Vector3};
use ply_rs::parser::Parser;
use ply_rs::ply::{
    Addable, DefaultElement, ElementDef, Encoding, Ply, Property, PropertyDef, PropertyType,
    ScalarType,
};
use ply_rs::writer::Writer;
use tracing::debug;

use super::open_for_read;
use crate::{Mesh, RawMesh};
use crate::error::{MeshError, MeshResult};

/// Load an ASCII or binary PLY file.
///
/// Polygon faces are fan-triangulated. Normals are kept when every vertex
/// declares `nx ny nz`.
pub fn load_ply(path: &Path) -> MeshResult<Mesh> {
    let mut reader = open_for_read(path)?;
    let ply = Parser::<DefaultElement>::new()
        .read_ply(&mut reader)
        .map_err(|e| MeshError::parse_error(path, format!("PLY parse error: {}", e)))?;

    let mut raw = RawMesh::default();

    if let Some(vertices) = ply.payload.get("vertex") {
        raw.vertices.reserve(vertices.len());
        for element in vertices {
            let x = scalar(element, "x", path)?;
            let y = scalar(element, "y", path)?;
            let z = scalar(element, "z", path)?;
            raw.vertices.push(Point3::new(x, y, z));

            if let (Ok(nx), Ok(ny), Ok(nz)) = (
                scalar(element, "nx", path),
                scalar(element, "ny", path),
                scalar(element, "nz", path),
            ) {
                raw.normals.push(Vector3::new(nx, ny, nz));
            }
        }
    }

    if let Some(faces) = ply.payload.get("face") {
        raw.faces.reserve(faces.len());
        for element in faces {
            let indices = element
                .get("vertex_indices")
                .or_else(|| element.get("vertex_index"));
            if let Some(polygon) = indices.and_then(index_list) {
                raw.faces.push(polygon);
            }
        }
    }

    if raw.normals.len() != raw.vertices.len() {
        raw.normals.clear();
    }

    debug!(
        vertices = raw.vertices.len(),
        polygons = raw.faces.len(),
        "Read PLY"
    );
    Ok(raw.into_mesh())
}

fn scalar(element: &DefaultElement, name: &str, path: &Path) -> MeshResult<f32> {
    match element.get(name) {
        Some(Property::Float(v)) => Ok(*v),
        Some(Property::Double(v)) => Ok(*v as f32),
        Some(Property::Int(v)) => Ok(*v as f32),
        Some(Property::UInt(v)) => Ok(*v as f32),
        Some(Property::Short(v)) => Ok(f32::from(*v)),
        Some(Property::UShort(v)) => Ok(f32::from(*v)),
        Some(Property::Char(v)) => Ok(f32::from(*v)),
        Some(Property::UChar(v)) => Ok(f32::from(*v)),
        _ => Err(MeshError::parse_error(
            path,
            format!("missing or invalid PLY property: {}", name),
        )),
    }
}

fn index_list(property: &Property) -> Option<Vec<u32>> {
    match property {
        Property::ListInt(v) => v.iter().map(|&i| u32::try_from(i).ok()).collect(),
        Property::ListUInt(v) => Some(v.clone()),
        Property::ListShort(v) => v.iter().map(|&i| u32::try_from(i).ok()).collect(),
        Property::ListUShort(v) => Some(v.iter().map(|&i| u32::from(i)).collect()),
        Property::ListUChar(v) => Some(v.iter().map(|&i| u32::from(i)).collect()),
        _ => None,
    }
}

/// Write an ASCII PLY.
pub fn write_ply_ascii<W: Write + ?Sized>(mesh: &Mesh, out: &mut W) -> std::io::Result<()> {
    write_ply(mesh, Encoding::Ascii, out)
}

/// Write a binary little-endian PLY.
pub fn write_ply_binary<W: Write + ?Sized>(mesh: &Mesh, out: &mut W) -> std::io::Result<()> {
    write_ply(mesh, Encoding::BinaryLittleEndian, out)
}

fn write_ply<W: Write + ?Sized>(
    mesh: &Mesh,
    encoding: Encoding,
    out: &mut W,
) -> std::io::Result<()> {
    let mut ply = build_ply(mesh, encoding);
    ply.make_consistent().map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("PLY consistency error: {:?}", e),
        )
    })?;

    // The writer needs a sized target
    let mut out = out;
    Writer::new().write_ply(&mut out, &mut ply)?;
    Ok(())
}

fn build_ply(mesh: &Mesh, encoding: Encoding) -> Ply<DefaultElement> {
    let float = || PropertyType::Scalar(ScalarType::Float);
    let with_normals = mesh.has_normals();

    let mut ply = Ply::<DefaultElement>::new();
    ply.header.encoding = encoding;

    let mut vertex_def = ElementDef::new("vertex".to_string());
    let mut names = vec!["x", "y", "z"];
    if with_normals {
        names.extend(["nx", "ny", "nz"]);
    }
    for name in &names {
        vertex_def.properties.add(PropertyDef::new(name.to_string(), float()));
    }
    ply.header.elements.add(vertex_def);

    let mut face_def = ElementDef::new("face".to_string());
    face_def.properties.add(PropertyDef::new(
        "vertex_indices".to_string(),
        PropertyType::List(ScalarType::UChar, ScalarType::Int),
    ));
    ply.header.elements.add(face_def);

    let vertices: Vec<DefaultElement> = mesh
        .vertices
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let mut element = DefaultElement::new();
            element.insert("x".to_string(), Property::Float(p.x));
            element.insert("y".to_string(), Property::Float(p.y));
            element.insert("z".to_string(), Property::Float(p.z));
            if with_normals {
                let n = mesh.normals[i];
                element.insert("nx".to_string(), Property::Float(n.x));
                element.insert("ny".to_string(), Property::Float(n.y));
                element.insert("nz".to_string(), Property::Float(n.z));
            }
            element
        })
        .collect();
    ply.payload.insert("vertex".to_string(), vertices);

    let faces: Vec<DefaultElement> = mesh
        .faces
        .iter()
        .filter(|f| mesh.face_in_range(f))
        .map(|f| {
            let mut element = DefaultElement::new();
            element.insert(
                "vertex_indices".to_string(),
                Property::ListInt(f.iter().map(|&i| i as i32).collect()),
            );
            element
        })
        .collect();
    ply.payload.insert("face".to_string(), faces);

    ply
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::unit_cube;

    fn header_of(bytes: &[u8]) -> String {
        let end = bytes
            .windows(b"end_header\n".len())
            .position(|w| w == b"end_header\n")
            .unwrap();
        String::from_utf8(bytes[..end].to_vec()).unwrap()
    }

    #[test]
    fn test_ascii_header_and_body() {
        let mut out = Vec::new();
        write_ply_ascii(&unit_cube(), &mut out).unwrap();
        let header = header_of(&out);

        assert!(header.starts_with("ply\nformat ascii 1.0\n"));
        assert!(header.contains("element vertex 8\n"));
        assert!(header.contains("property float x\n"));
        assert!(header.contains("element face 12\n"));
        assert!(header.contains("property list uchar int vertex_indices\n"));
        assert!(!header.contains("nx"));

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\n3 0 2 1\n"));
    }

    #[test]
    fn test_binary_body_size() {
        let mut out = Vec::new();
        write_ply_binary(&unit_cube(), &mut out).unwrap();
        let header_len = header_of(&out).len() + "end_header\n".len();

        assert!(header_of(&out).contains("format binary_little_endian 1.0"));
        // 8 vertices of 3 floats, 12 faces of a count byte and 3 ints
        assert_eq!(out.len() - header_len, 8 * 12 + 12 * (1 + 12));
    }

    #[test]
    fn test_normals_declared_when_aligned() {
        let mut cube = unit_cube();
        cube.recompute_normals();
        let mut out = Vec::new();
        write_ply_binary(&cube, &mut out).unwrap();
        let header = header_of(&out);
        assert!(header.contains("property float nx\n"));
        assert!(header.contains("property float nz\n"));
    }

    #[test]
    fn test_index_list_rejects_negative() {
        assert_eq!(index_list(&Property::ListInt(vec![0, -1, 2])), None);
        assert_eq!(
            index_list(&Property::ListUChar(vec![0, 1, 2])),
            Some(vec![0, 1, 2])
        );
    }
}
