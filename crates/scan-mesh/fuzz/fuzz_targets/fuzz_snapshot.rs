#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(mesh) = scan_mesh::decode_snapshot(data) {
        let n = mesh.vertex_count() as u32;
        assert!(mesh.faces.iter().flatten().all(|&i| i < n));

        // Whatever decodes must re-encode to something that decodes the same
        let again = scan_mesh::decode_snapshot(&scan_mesh::encode_snapshot(&mesh))
            .expect("re-encoded snapshot decodes");
        assert_eq!(again.faces, mesh.faces);
    }
});
