//! Property-based tests for the processing stages.
//!
//! These tests use proptest to generate random meshes and verify invariants.
//!
//! Run with: cargo test -p scan-mesh -- proptest

use nalgebra::{Point3, Vector2};
use proptest::prelude::*;
use scan_mesh::{
    DecimateParams, HoleFillParams, Mesh, MeshTopology, NoiseFilterParams, SmoothParams,
    analyze_print_readiness, compute_vertex_normals, decimate, decode_snapshot, encode_snapshot,
    fill_holes, remove_noise, smooth,
};

// =============================================================================
// Strategies for generating random meshes
// =============================================================================

/// Generate a random vertex position within a 2 m box.
fn arb_position() -> impl Strategy<Value = Point3<f32>> {
    prop::array::uniform3(-1.0..1.0f32).prop_map(|[x, y, z]| Point3::new(x, y, z))
}

/// Generate a mesh whose face indices are all in range.
///
/// Faces may repeat an index, which every stage must tolerate.
fn arb_mesh(
    min_vertices: usize,
    max_vertices: usize,
    min_faces: usize,
    max_faces: usize,
) -> impl Strategy<Value = Mesh> {
    (min_vertices..=max_vertices).prop_flat_map(move |num_vertices| {
        let vertices = prop::collection::vec(arb_position(), num_vertices);

        vertices.prop_flat_map(move |verts| {
            let n = verts.len() as u32;
            if n < 3 {
                return Just(Mesh::from_parts(verts, Vec::new())).boxed();
            }

            let face = prop::array::uniform3(0..n);
            let faces = prop::collection::vec(face, min_faces..=max_faces);

            faces
                .prop_map(move |f| Mesh::from_parts(verts.clone(), f))
                .boxed()
        })
    })
}

/// A mesh with aligned normals and texture coordinates.
fn arb_attributed_mesh() -> impl Strategy<Value = Mesh> {
    arb_mesh(3, 60, 1, 80).prop_flat_map(|mesh| {
        let n = mesh.vertex_count();
        prop::collection::vec(prop::array::uniform2(0.0..1.0f32), n).prop_map(move |uvs| {
            let mut m = mesh.clone();
            m.recompute_normals();
            let uvs = uvs.into_iter().map(|[u, v]| Vector2::new(u, v)).collect();
            m.texture_coordinates = Some(uvs);
            m
        })
    })
}

/// Closed octahedron, scaled and shifted.
fn octahedron(scale: f32, offset: [f32; 3]) -> Mesh {
    let [ox, oy, oz] = offset;
    let p = |x: f32, y: f32, z: f32| Point3::new(x * scale + ox, y * scale + oy, z * scale + oz);
    let vertices = vec![
        p(1.0, 0.0, 0.0),
        p(-1.0, 0.0, 0.0),
        p(0.0, 1.0, 0.0),
        p(0.0, -1.0, 0.0),
        p(0.0, 0.0, 1.0),
        p(0.0, 0.0, -1.0),
    ];
    let faces = vec![
        [0, 2, 4],
        [2, 1, 4],
        [1, 3, 4],
        [3, 0, 4],
        [2, 0, 5],
        [1, 2, 5],
        [3, 1, 5],
        [0, 3, 5],
    ];
    Mesh::from_parts(vertices, faces)
}

fn assert_faces_in_range(mesh: &Mesh) -> Result<(), TestCaseError> {
    let n = mesh.vertex_count() as u32;
    for face in &mesh.faces {
        prop_assert!(
            face.iter().all(|&i| i < n),
            "face {:?} out of range for {} vertices",
            face,
            n
        );
    }
    Ok(())
}

// =============================================================================
// Noise filter
// =============================================================================

proptest! {
    /// Filtering never adds faces and never leaves a dangling index.
    #[test]
    fn proptest_noise_filter_shrinks_and_stays_in_range(
        mesh in arb_attributed_mesh(),
        threshold in 0.001..0.2f32,
    ) {
        let result = remove_noise(&mesh, &NoiseFilterParams::with_threshold(threshold));

        prop_assert!(result.mesh.face_count() <= mesh.face_count());
        prop_assert_eq!(result.mesh.vertex_count() + result.vertices_removed, mesh.vertex_count());
        prop_assert_eq!(result.mesh.face_count() + result.faces_removed, mesh.face_count());
        assert_faces_in_range(&result.mesh)?;

        // Attributes stay aligned with the surviving vertices
        prop_assert_eq!(result.mesh.normals.len(), result.mesh.vertex_count());
        prop_assert!(result.mesh.aligned_texture_coordinates().is_some());
    }
}

// =============================================================================
// Hole repair
// =============================================================================

proptest! {
    /// A closed surface comes back unchanged.
    #[test]
    fn proptest_fill_holes_noop_on_watertight(
        scale in 0.001..10.0f32,
        offset in prop::array::uniform3(-5.0..5.0f32),
    ) {
        let mesh = octahedron(scale, offset);
        prop_assume!(MeshTopology::from_mesh(&mesh).is_watertight());

        let result = fill_holes(&mesh, &HoleFillParams::default());
        prop_assert_eq!(result.holes_filled, 0);
        prop_assert_eq!(&result.mesh.vertices, &mesh.vertices);
        prop_assert_eq!(&result.mesh.faces, &mesh.faces);
    }

    /// Removing one face of a closed surface leaves a hole that repair closes.
    #[test]
    fn proptest_fill_holes_closes_single_gap(removed in 0usize..8, scale in 0.01..10.0f32) {
        let mut mesh = octahedron(scale, [0.0; 3]);
        mesh.faces.remove(removed);

        let result = fill_holes(&mesh, &HoleFillParams::default());
        prop_assert_eq!(result.holes_filled, 1);
        prop_assert!(MeshTopology::from_mesh(&result.mesh).is_watertight());
        prop_assert!(analyze_print_readiness(&result.mesh).is_manifold);
    }

    /// Repair never panics and never produces dangling indices.
    #[test]
    fn proptest_fill_holes_handles_any_mesh(mesh in arb_mesh(3, 40, 1, 40)) {
        let result = fill_holes(&mesh, &HoleFillParams::default());
        prop_assert!(result.mesh.face_count() >= mesh.face_count());
        prop_assert_eq!(result.mesh.face_count(), mesh.face_count() + result.faces_added);
        prop_assert_eq!(result.mesh.vertex_count(), mesh.vertex_count() + result.vertices_added);
        assert_faces_in_range(&result.mesh)?;
    }
}

// =============================================================================
// Smoothing
// =============================================================================

proptest! {
    /// Zero iterations is the identity.
    #[test]
    fn proptest_smooth_zero_iterations_is_identity(
        mesh in arb_mesh(3, 60, 1, 60),
        factor in 0.0..=1.0f32,
    ) {
        let params = SmoothParams { iterations: 0, factor, ..SmoothParams::default() };
        let result = smooth(&mesh, &params).unwrap();
        prop_assert_eq!(&result.mesh.vertices, &mesh.vertices);
        prop_assert_eq!(result.max_displacement, 0.0);
    }

    /// One pass never moves a vertex away from its neighbor centroid.
    #[test]
    fn proptest_smooth_moves_toward_centroid(
        mesh in arb_mesh(3, 60, 1, 60),
        factor in 0.01..=1.0f32,
    ) {
        let params = SmoothParams { iterations: 1, factor, ..SmoothParams::default() };
        let result = smooth(&mesh, &params).unwrap();
        let topology = MeshTopology::from_mesh(&mesh);

        for (v, (before, after)) in mesh.vertices.iter().zip(&result.mesh.vertices).enumerate() {
            let neighbors = topology.neighbors(v as u32);
            if neighbors.is_empty() {
                prop_assert_eq!(before, after);
                continue;
            }
            let centroid = neighbors
                .iter()
                .fold(nalgebra::Vector3::zeros(), |acc, &n| acc + mesh.vertices[n as usize].coords)
                / neighbors.len() as f32;
            let d_before = (before.coords - centroid).norm();
            let d_after = (after.coords - centroid).norm();
            prop_assert!(d_after <= d_before + 1e-5, "{} > {}", d_after, d_before);
        }

        prop_assert_eq!(&result.mesh.faces, &mesh.faces);
    }

    /// Factors outside [0, 1] are rejected.
    #[test]
    fn proptest_smooth_rejects_bad_factor(factor in prop_oneof![-10.0..-0.001f32, 1.001..10.0f32]) {
        let params = SmoothParams { factor, ..SmoothParams::default() };
        prop_assert!(smooth(&octahedron(1.0, [0.0; 3]), &params).is_err());
    }
}

// =============================================================================
// Normal estimation
// =============================================================================

proptest! {
    /// One normal per vertex, each unit length or zero.
    #[test]
    fn proptest_normals_unit_or_zero(mesh in arb_mesh(3, 80, 0, 100)) {
        let normals = compute_vertex_normals(&mesh);
        prop_assert_eq!(normals.len(), mesh.vertex_count());

        let topology = MeshTopology::from_mesh(&mesh);
        for (v, n) in normals.iter().enumerate() {
            let len = n.norm();
            prop_assert!(len == 0.0 || (len - 1.0).abs() < 1e-5, "normal length {}", len);
            if topology.neighbors(v as u32).is_empty() {
                prop_assert_eq!(len, 0.0);
            }
        }
    }
}

// =============================================================================
// Decimation
// =============================================================================

proptest! {
    /// A ratio of one or more leaves the mesh untouched.
    #[test]
    fn proptest_decimate_full_ratio_is_noop(mesh in arb_mesh(3, 60, 1, 60), ratio in 1.0..4.0f32) {
        let result = decimate(&mesh, &DecimateParams::with_ratio(ratio)).unwrap();
        prop_assert_eq!(&result.mesh.vertices, &mesh.vertices);
        prop_assert_eq!(&result.mesh.faces, &mesh.faces);
    }

    /// Clustering never adds vertices and never emits collapsed faces.
    #[test]
    fn proptest_decimate_reduces(mesh in arb_attributed_mesh(), ratio in 0.05..0.95f32) {
        let result = decimate(&mesh, &DecimateParams::with_ratio(ratio)).unwrap();

        prop_assert!(result.mesh.vertex_count() <= mesh.vertex_count());
        prop_assert!(result.mesh.face_count() <= mesh.face_count());
        assert_faces_in_range(&result.mesh)?;
        for [a, b, c] in &result.mesh.faces {
            prop_assert!(a != b && b != c && a != c);
        }
        prop_assert!(result.mesh.texture_coordinates.is_none());
    }

    /// Non-positive ratios are rejected.
    #[test]
    fn proptest_decimate_rejects_non_positive(ratio in -1.0..=0.0f32) {
        let params = DecimateParams::with_ratio(ratio);
        prop_assert!(decimate(&octahedron(1.0, [0.0; 3]), &params).is_err());
    }
}

// =============================================================================
// Snapshot format
// =============================================================================

proptest! {
    /// Encoding then decoding reproduces every stored attribute exactly.
    #[test]
    fn proptest_snapshot_round_trip(mesh in arb_attributed_mesh()) {
        let decoded = decode_snapshot(&encode_snapshot(&mesh)).unwrap();
        prop_assert_eq!(&decoded.vertices, &mesh.vertices);
        prop_assert_eq!(&decoded.normals, &mesh.normals);
        prop_assert_eq!(&decoded.faces, &mesh.faces);
        prop_assert_eq!(&decoded.texture_coordinates, &mesh.texture_coordinates);
    }

    /// Arbitrary bytes decode to a mesh or an error, never a panic.
    #[test]
    fn proptest_snapshot_decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        if let Ok(mesh) = decode_snapshot(&bytes) {
            assert_faces_in_range(&mesh)?;
        }
    }
}

// =============================================================================
// Analysis
// =============================================================================

proptest! {
    /// The score stays within 0..=100 for any input.
    #[test]
    fn proptest_score_bounded(mesh in arb_mesh(3, 60, 0, 60)) {
        let report = analyze_print_readiness(&mesh);
        prop_assert!((0.0..=100.0).contains(&report.score));
        prop_assert_eq!(report.volume.is_some(), report.is_watertight);
    }
}
