//! Example: clean up a raw capture and export it for printing and sharing.
//!
//! Loads a mesh (STL, OBJ, PLY or `.scanmesh`), runs the scan pipeline,
//! prints the print-readiness report and writes a millimeter-scaled STL plus
//! a textured OBJ bundle next to the input.
//!
//! Run with: `cargo run --example process_capture -- path/to/capture.scanmesh [pipeline.toml]`
//!
//! Set `RUST_LOG=scan_mesh=debug` to see per-stage detail.

use scan_mesh::{
    ExportFormat, ExportOptions, MeshResult, PipelineConfig, RecommendationSeverity, export_mesh,
    load_mesh, process_scan,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let Some(input) = args.next().map(PathBuf::from) else {
        eprintln!("usage: process_capture <mesh> [pipeline.toml]");
        std::process::exit(2);
    };

    let config = match args.next() {
        Some(path) => match PipelineConfig::from_toml_file(Path::new(&path)) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("invalid pipeline config: {}", e);
                std::process::exit(2);
            }
        },
        None => PipelineConfig::for_scans(),
    };

    if let Err(e) = run(&input, &config) {
        eprintln!("[{}] {}", e.code(), e);
        eprintln!("suggestion: {}", e.recovery_suggestion());
        std::process::exit(1);
    }
}

fn run(input: &Path, config: &PipelineConfig) -> MeshResult<()> {
    let raw = load_mesh(input)?;
    println!(
        "Loaded {} vertices, {} faces",
        raw.vertex_count(),
        raw.face_count()
    );

    let processed = process_scan(raw, config)?;
    for line in &processed.operation_log {
        println!("  {}", line);
    }

    if let Some(report) = &processed.report {
        println!("\n{}", report);
        for rec in report.recommendations_with(RecommendationSeverity::Critical) {
            println!("!! {}: {}", rec.title, rec.detail);
        }
    }

    // Printers expect millimeters
    let stl_path = input.with_file_name(output_name(input, "print", "stl"));
    let print_options = ExportOptions {
        scale: 1000.0,
        center: true,
        ..ExportOptions::default()
    };
    let summary = export_mesh(&processed.mesh, &stl_path, ExportFormat::StlBinary, &print_options)?;
    println!("Wrote {} ({} bytes)", stl_path.display(), summary.bytes_written);

    let obj_path = input.with_file_name(output_name(input, "share", "obj"));
    let share_options = ExportOptions {
        texture_max_dimension: Some(2048),
        bundle: true,
        ..ExportOptions::default()
    };
    let summary = export_mesh(&processed.mesh, &obj_path, ExportFormat::Obj, &share_options)?;
    for file in &summary.files {
        println!("Wrote {}", file.display());
    }

    Ok(())
}

fn output_name(input: &Path, suffix: &str, extension: &str) -> String {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("scan");
    format!("{}_{}.{}", stem, suffix, extension)
}
