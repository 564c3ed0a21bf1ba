#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Write;
use tempfile::NamedTempFile;

fuzz_target!(|data: &[u8]| {
    let mut file = match NamedTempFile::with_suffix(".obj") {
        Ok(f) => f,
        Err(_) => return,
    };
    if file.write_all(data).is_err() {
        return;
    }

    // Malformed input must surface as an error, and any mesh that loads
    // must only reference existing vertices
    if let Ok(mesh) = scan_mesh::load_mesh(file.path()) {
        let n = mesh.vertex_count() as u32;
        assert!(mesh.faces.iter().flatten().all(|&i| i < n));
    }
});
