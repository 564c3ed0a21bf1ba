//! Processing and export pipeline for depth-sensor scans.
//!
//! This crate takes the raw triangle mesh produced by a depth-capture front
//! end and turns it into something printable and shareable: it removes
//! outlier vertices, closes holes, smooths the surface, estimates normals,
//! optionally decimates, and generates texture coordinates. A read-only
//! print-readiness analysis scores the result, and the serializers write
//! STL, OBJ (with MTL and texture), PLY and a compact snapshot format.
//!
//! # Features
//!
//! - **Processing**: Noise filtering, hole repair, Laplacian smoothing,
//!   normal estimation, vertex-clustering decimation, cylindrical UVs
//! - **Analysis**: Watertightness, manifoldness, duplicate/degenerate/inverted
//!   faces, volume, surface area, triangle quality and a composite score
//! - **Export**: STL (binary & ASCII), OBJ + MTL + JPEG (optionally zipped),
//!   PLY (binary & ASCII), and the internal `.scanmesh` snapshot
//! - **Import**: STL, OBJ, PLY and `.scanmesh`, for round-tripping exports
//!
//! # Units and Scale
//!
//! **This library assumes meter units**, as delivered by depth sensors.
//!
//! - The noise filter's default threshold is 2 mm (`0.002`)
//! - Holes with more than 500 boundary vertices are left open by default
//! - The wall-thickness hint in the readiness report triggers below 2 mm
//!
//! # Coordinate System
//!
//! Right-handed, with **Y up**: the UV generator wraps texture coordinates
//! around the vertical Y axis, and the base-plate hint compares height (Y)
//! against the horizontal footprint (X, Z). Faces wind counter-clockwise
//! when viewed from outside.
//!
//! # Quick Start
//!
//! ```no_run
//! use scan_mesh::{
//!     ExportFormat, ExportOptions, PipelineConfig, export_mesh, load_mesh, process_scan,
//! };
//! use std::path::Path;
//!
//! let raw = load_mesh(Path::new("capture.scanmesh")).unwrap();
//!
//! let processed = process_scan(raw, &PipelineConfig::for_scans()).unwrap();
//! if let Some(report) = &processed.report {
//!     println!("{}", report);
//! }
//!
//! export_mesh(
//!     &processed.mesh,
//!     Path::new("scan.stl"),
//!     ExportFormat::StlBinary,
//!     &ExportOptions::default(),
//! )
//! .unwrap();
//! ```
//!
//! # Common Workflows
//!
//! ## Step by step
//!
//! ```
//! use scan_mesh::{Mesh, NoiseFilterParams};
//! use nalgebra::Point3;
//!
//! let mesh = Mesh::from_parts(
//!     vec![
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(0.01, 0.0, 0.0),
//!         Point3::new(0.0, 0.01, 0.0),
//!     ],
//!     vec![[0, 1, 2]],
//! );
//!
//! let cleaned = mesh.remove_noise_with_params(&NoiseFilterParams::with_threshold(0.002));
//! let repaired = cleaned.mesh.fill_holes();
//! let smoothed = repaired.mesh.smooth().unwrap();
//! let mut result = smoothed.mesh;
//! result.recompute_normals();
//! result.ensure_texture_coordinates();
//!
//! assert!(result.has_normals());
//! ```
//!
//! ## Shareable textured export
//!
//! ```no_run
//! use scan_mesh::{export_mesh, ExportFormat, ExportOptions, Mesh};
//! use std::path::Path;
//!
//! # let mesh = Mesh::new();
//! let options = ExportOptions {
//!     scale: 1000.0,                     // meters to millimeters
//!     center: true,
//!     texture_max_dimension: Some(2048),
//!     bundle: true,                      // scan.obj + scan.mtl + scan.jpg in scan.zip
//!     ..ExportOptions::default()
//! };
//! let path = Path::new("out/scan.obj");
//! let summary = export_mesh(&mesh, path, ExportFormat::Obj, &options).unwrap();
//! println!("Wrote {} bytes", summary.bytes_written);
//! ```
//!
//! # Error Handling
//!
//! Fallible operations return `MeshResult<T>`, which is `Result<T, MeshError>`.
//! Degenerate geometry is never an error: stages filter or skip it and the
//! analysis reports it.
//!
//! ```
//! use scan_mesh::{decode_snapshot, ErrorCode, MeshError};
//!
//! match decode_snapshot(&[1, 0, 0]) {
//!     Ok(_) => unreachable!(),
//!     Err(MeshError::MalformedData { section, needed, available }) => {
//!         assert_eq!(section, "header");
//!         assert_eq!((needed, available), (13, 3));
//!     }
//!     Err(e) => panic!("unexpected error: {}", e),
//! }
//! ```
//!
//! # Supported Formats
//!
//! | Format | Extension | Load | Save | Notes |
//! |--------|-----------|------|------|-------|
//! | STL    | `.stl`      | ✓ | ✓ | Binary & ASCII; vertices merged on load |
//! | OBJ    | `.obj`      | ✓ | ✓ | Optional MTL, JPEG texture and ZIP bundle |
//! | PLY    | `.ply`      | ✓ | ✓ | Binary little-endian & ASCII, optional normals |
//! | Snapshot | `.scanmesh` | ✓ | ✓ | Exact round trip of positions, normals, faces, UVs |
//! | USDZ   | `.usdz`     | ✗ | ✗ | Reported as [`MeshError::UnsupportedFormat`] |

mod error;
mod pipeline;
pub mod tracing_ext;
mod types;

pub mod adjacency;
pub mod analysis;
pub mod decimate;
pub mod holes;
pub mod io;
pub mod noise;
pub mod normals;
pub mod progress;
pub mod smooth;
pub mod uv;

// Re-export core types at crate root
pub use error::{ErrorCode, MeshError, MeshResult, RecoverySuggestion};
pub use types::{Mesh, RawMesh, Triangle};

pub use adjacency::{Edge, MeshTopology};

// Processing stages
pub use decimate::{DecimateParams, DecimateResult, decimate};
pub use holes::{BoundaryLoop, HoleFillParams, HoleFillResult, detect_boundary_loops, fill_holes};
pub use noise::{NoiseFilterParams, NoiseFilterResult, remove_noise};
pub use normals::compute_vertex_normals;
pub use smooth::{SmoothParams, SmoothResult, smooth};
pub use uv::generate_cylindrical_uvs;

// Analysis
pub use analysis::{
    PrintReadinessReport, Recommendation, RecommendationSeverity, analyze_print_readiness,
};

// File I/O
pub use io::{
    ExportFormat, ExportOptions, ExportSummary, MeshFormat, decode_snapshot, encode_snapshot,
    export_mesh, load_mesh, load_snapshot, save_snapshot,
};

// Pipeline
pub use pipeline::{PipelineConfig, PipelineConfigError, ProcessedScan, ScanPipeline, process_scan};
pub use progress::{Progress, ProgressCallback, ProgressTracker};
