//! Internal snapshot format for persisting a mesh between runs.
//!
//! Layout, all little-endian:
//!
//! | Bytes | Content |
//! |-------|---------|
//! | 4 | vertex count `V` (`u32`) |
//! | 4 | normal count `N` (`u32`) |
//! | 4 | face count `F` (`u32`) |
//! | 1 | 1 if texture coordinates follow, else 0 |
//! | `12 V` | vertex positions, three `f32` each |
//! | `12 N` | normals, three `f32` each |
//! | per face | `u8` index count `k`, then `k` `u32` indices |
//! | `8 V` | texture coordinates, two `f32` each (if flagged) |
//!
//! The texture image is not part of the snapshot.

use std::io::Write;
use std::path::Path;

use nalgebra::{Point3, Vector2, Vector3};
use tracing::debug;

use super::write_atomic;
use crate::{Mesh, RawMesh};
use crate::error::{MeshError, MeshResult};

/// File extension used for snapshots.
pub const SNAPSHOT_EXTENSION: &str = "scanmesh";

/// Size of the fixed header in bytes.
pub const SNAPSHOT_HEADER_LEN: usize = 13;

/// Largest vertex, normal or face count accepted when reading.
pub const SNAPSHOT_MAX_COUNT: usize = 10_000_000;

/// Serialize a mesh into snapshot bytes.
///
/// Faces referencing missing vertices are kept as-is; the reader drops
/// them. Texture coordinates are stored only when there is one per vertex.
pub fn encode_snapshot(mesh: &Mesh) -> Vec<u8> {
    let uvs = mesh.aligned_texture_coordinates();
    let size = SNAPSHOT_HEADER_LEN
        + 12 * mesh.vertices.len()
        + 12 * mesh.normals.len()
        + 13 * mesh.faces.len()
        + uvs.map_or(0, |uvs| 8 * uvs.len());
    let mut out = Vec::with_capacity(size);

    out.extend_from_slice(&(mesh.vertices.len() as u32).to_le_bytes());
    out.extend_from_slice(&(mesh.normals.len() as u32).to_le_bytes());
    out.extend_from_slice(&(mesh.faces.len() as u32).to_le_bytes());
    out.push(u8::from(uvs.is_some()));

    for p in &mesh.vertices {
        push_floats(&mut out, &[p.x, p.y, p.z]);
    }
    for n in &mesh.normals {
        push_floats(&mut out, &[n.x, n.y, n.z]);
    }
    for face in &mesh.faces {
        out.push(3);
        for index in face {
            out.extend_from_slice(&index.to_le_bytes());
        }
    }
    if let Some(uvs) = uvs {
        for uv in uvs {
            push_floats(&mut out, &[uv.x, uv.y]);
        }
    }

    out
}

fn push_floats(out: &mut Vec<u8>, values: &[f32]) {
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

/// Write snapshot bytes to any writer.
pub fn write_snapshot<W: Write + ?Sized>(mesh: &Mesh, out: &mut W) -> std::io::Result<()> {
    out.write_all(&encode_snapshot(mesh))
}

/// Deserialize snapshot bytes.
///
/// Every section's size is checked against the remaining data before it is
/// read, so truncated input fails with [`MeshError::MalformedData`] instead
/// of reading past the end. Counts above [`SNAPSHOT_MAX_COUNT`] are
/// rejected before any allocation.
pub fn decode_snapshot(data: &[u8]) -> MeshResult<Mesh> {
    let mut reader = SectionReader { data, pos: 0 };

    let header = reader.take("header", SNAPSHOT_HEADER_LEN)?;
    let vertex_count = checked_count("vertex", read_u32(&header[0..4]))?;
    let normal_count = checked_count("normal", read_u32(&header[4..8]))?;
    let face_count = checked_count("face", read_u32(&header[8..12]))?;
    let has_uvs = header[12] != 0;

    let mut raw = RawMesh::default();

    let bytes = reader.take("vertex section", 12 * vertex_count)?;
    raw.vertices = bytes
        .chunks_exact(12)
        .map(|c| Point3::new(read_f32(&c[0..4]), read_f32(&c[4..8]), read_f32(&c[8..12])))
        .collect();

    let bytes = reader.take("normal section", 12 * normal_count)?;
    raw.normals = bytes
        .chunks_exact(12)
        .map(|c| Vector3::new(read_f32(&c[0..4]), read_f32(&c[4..8]), read_f32(&c[8..12])))
        .collect();

    // Every face needs at least its count byte
    reader.ensure("face section", face_count)?;
    raw.faces.reserve(face_count);
    for _ in 0..face_count {
        let k = reader.take("face index count", 1)?[0] as usize;
        let bytes = reader.take("face indices", 4 * k)?;
        raw.faces.push(bytes.chunks_exact(4).map(read_u32).collect());
    }

    if has_uvs {
        let bytes = reader.take("texture coordinate section", 8 * vertex_count)?;
        raw.texture_coordinates = Some(
            bytes
                .chunks_exact(8)
                .map(|c| Vector2::new(read_f32(&c[0..4]), read_f32(&c[4..8])))
                .collect(),
        );
    }

    if reader.remaining() > 0 {
        debug!(trailing = reader.remaining(), "Ignoring trailing snapshot bytes");
    }

    Ok(raw.into_mesh())
}

/// Save a snapshot file atomically, returning the bytes written.
pub fn save_snapshot(mesh: &Mesh, path: &Path) -> MeshResult<u64> {
    let bytes = encode_snapshot(mesh);
    write_atomic(path, |out| out.write_all(&bytes))
}

/// Load a snapshot file.
pub fn load_snapshot(path: &Path) -> MeshResult<Mesh> {
    let data = std::fs::read(path).map_err(|e| MeshError::io_read(path, e))?;
    decode_snapshot(&data)
}

impl Mesh {
    /// Serialize into the snapshot format.
    pub fn to_snapshot(&self) -> Vec<u8> {
        encode_snapshot(self)
    }

    /// Restore a mesh from snapshot bytes.
    pub fn from_snapshot(data: &[u8]) -> MeshResult<Mesh> {
        decode_snapshot(data)
    }
}

struct SectionReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SectionReader<'a> {
    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn ensure(&self, section: &str, needed: usize) -> MeshResult<()> {
        let available = self.remaining();
        if needed > available {
            return Err(MeshError::malformed(section, needed, available));
        }
        Ok(())
    }

    fn take(&mut self, section: &str, len: usize) -> MeshResult<&'a [u8]> {
        self.ensure(section, len)?;
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }
}

fn checked_count(section: &'static str, count: u32) -> MeshResult<usize> {
    let count = count as usize;
    if count > SNAPSHOT_MAX_COUNT {
        return Err(MeshError::count_limit(section, count, SNAPSHOT_MAX_COUNT));
    }
    Ok(count)
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn read_f32(bytes: &[u8]) -> f32 {
    f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCode;
    use crate::types::fixtures::unit_cube;

    fn textured_cube() -> Mesh {
        let mut cube = unit_cube();
        cube.recompute_normals();
        cube.ensure_texture_coordinates();
        cube
    }

    #[test]
    fn test_round_trip_is_exact() {
        let cube = textured_cube();
        let restored = Mesh::from_snapshot(&cube.to_snapshot()).unwrap();
        assert_eq!(restored.vertices, cube.vertices);
        assert_eq!(restored.normals, cube.normals);
        assert_eq!(restored.faces, cube.faces);
        assert_eq!(restored.texture_coordinates, cube.texture_coordinates);
    }

    #[test]
    fn test_header_layout() {
        let bytes = textured_cube().to_snapshot();
        assert_eq!(read_u32(&bytes[0..4]), 8);
        assert_eq!(read_u32(&bytes[4..8]), 8);
        assert_eq!(read_u32(&bytes[8..12]), 12);
        assert_eq!(bytes[12], 1);
        assert_eq!(bytes.len(), 13 + 96 + 96 + 12 * 13 + 64);
    }

    #[test]
    fn test_truncation_is_rejected_everywhere() {
        let bytes = textured_cube().to_snapshot();
        for len in 0..bytes.len() {
            let err = decode_snapshot(&bytes[..len]).unwrap_err();
            assert_eq!(err.code(), ErrorCode::MalformedData, "length {}", len);
        }
    }

    #[test]
    fn test_count_ceiling() {
        let mut bytes = vec![0u8; SNAPSHOT_HEADER_LEN];
        bytes[0..4].copy_from_slice(&(SNAPSHOT_MAX_COUNT as u32 + 1).to_le_bytes());
        let err = decode_snapshot(&bytes).unwrap_err();
        assert!(matches!(err, MeshError::CountLimit { section: "vertex", .. }));
    }

    #[test]
    fn test_polygon_faces_are_triangulated() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&4u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.push(0);
        for p in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]] {
            push_floats(&mut bytes, &p);
        }
        bytes.push(4);
        for i in 0u32..4 {
            bytes.extend_from_slice(&i.to_le_bytes());
        }

        let mesh = decode_snapshot(&bytes).unwrap();
        assert_eq!(mesh.faces, vec![[0, 1, 2], [0, 2, 3]]);
    }

    #[test]
    fn test_misaligned_uvs_not_stored() {
        let mut cube = unit_cube();
        cube.texture_coordinates = Some(vec![Vector2::new(0.0, 0.0); 3]);
        let bytes = cube.to_snapshot();
        assert_eq!(bytes[12], 0);
        assert!(decode_snapshot(&bytes).unwrap().texture_coordinates.is_none());
    }
}
