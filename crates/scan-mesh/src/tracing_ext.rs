//! Tracing helpers for scan processing.
//!
//! The library emits `tracing` events but never installs a subscriber.
//! Applications opt in:
//!
//! ```rust,ignore
//! use tracing_subscriber::{fmt, prelude::*, EnvFilter};
//!
//! tracing_subscriber::registry()
//!     .with(fmt::layer())
//!     .with(EnvFilter::from_default_env())
//!     .init();
//!
//! // RUST_LOG=scan_mesh=debug for per-stage detail
//! ```
//!
//! # Targets
//!
//! | Target | Level | Content |
//! |--------|-------|---------|
//! | `scan_mesh::timing` | INFO | Wall time of every stage, analysis and export |
//! | `scan_mesh::stage` | INFO | Vertex and face counts before and after a stage |
//! | `scan_mesh::io` | INFO / WARN | File loads and exports, with the error on failure |
//! | `scan_mesh::mesh_state` | DEBUG | Attribute presence and extent at pipeline boundaries |
//!
//! Skipped holes, forced ear clips and slow quadratic scans are logged at
//! WARN under the module's own target.

use std::fmt::Display;
use std::path::Path;
use std::time::Instant;

use tracing::{Span, debug, info, warn};

use crate::Mesh;

/// Logs the wall time of a stage when dropped.
///
/// The timer also enters an `info` span carrying the input size, so events
/// emitted by the stage are attributed to it.
///
/// ```rust,ignore
/// pub fn smooth(mesh: &Mesh, params: &SmoothParams) -> MeshResult<SmoothResult> {
///     let _timer = OperationTimer::start("smooth", mesh);
///     // ...
/// }
/// ```
pub struct OperationTimer {
    name: &'static str,
    start: Instant,
    _entered: tracing::span::EnteredSpan,
}

impl OperationTimer {
    /// Start timing `name` on `mesh`.
    pub fn start(name: &'static str, mesh: &Mesh) -> Self {
        let span: Span = tracing::info_span!(
            "scan_stage",
            stage = name,
            vertices = mesh.vertex_count(),
            faces = mesh.face_count()
        );
        Self {
            name,
            start: Instant::now(),
            _entered: span.entered(),
        }
    }

    /// Elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        info!(
            target: "scan_mesh::timing",
            stage = self.name,
            elapsed_ms = format!("{:.2}", self.elapsed_ms()),
            "Stage timing"
        );
    }
}

/// Log attribute presence and extent of `mesh` at debug level.
pub fn log_mesh_stats(mesh: &Mesh, context: &str) {
    let extent = mesh
        .bounds()
        .map(|(min, max)| max - min)
        .unwrap_or_else(nalgebra::Vector3::zeros);

    debug!(
        target: "scan_mesh::mesh_state",
        context,
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        has_normals = mesh.has_normals(),
        has_uvs = mesh.aligned_texture_coordinates().is_some(),
        has_texture = mesh.texture.is_some(),
        extent_m = format!("{:.4} x {:.4} x {:.4}", extent.x, extent.y, extent.z),
        "Mesh state"
    );
}

/// Log how a stage changed the mesh.
///
/// `changed` is the stage's own headline count: vertices removed, holes
/// filled, passes run.
pub fn log_stage_result(stage: &str, changed: usize, before: &Mesh, after: &Mesh) {
    info!(
        target: "scan_mesh::stage",
        stage,
        changed,
        vertices_before = before.vertex_count(),
        vertices_after = after.vertex_count(),
        faces_before = before.face_count(),
        faces_after = after.face_count(),
        "Stage completed"
    );
}

/// Log the outcome of a load or export, including the error on failure.
pub fn log_io_result<T, E: Display>(
    operation: &str,
    path: &Path,
    format: &str,
    result: &Result<T, E>,
) {
    match result {
        Ok(_) => info!(
            target: "scan_mesh::io",
            operation,
            path = %path.display(),
            format,
            "I/O completed"
        ),
        Err(e) => warn!(
            target: "scan_mesh::io",
            operation,
            path = %path.display(),
            format,
            error = %e,
            "I/O failed"
        ),
    }
}
