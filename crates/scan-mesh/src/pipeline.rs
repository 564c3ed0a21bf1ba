//! Scan processing pipeline.
//!
//! Runs the stages in their fixed order:
//!
//! noise filter → hole repair → smoothing → normal estimation →
//! (optional) decimation → texture coordinates (if missing)
//!
//! Stages can be chained by hand with [`ScanPipeline`], or driven by a
//! [`PipelineConfig`] loaded from TOML or JSON.
//!
//! # Example
//!
//! ```no_run
//! use scan_mesh::{load_mesh, process_scan, PipelineConfig};
//! use std::path::Path;
//!
//! let raw = load_mesh(Path::new("capture.scanmesh")).unwrap();
//! let processed = process_scan(raw, &PipelineConfig::for_scans()).unwrap();
//!
//! if let Some(report) = &processed.report {
//!     println!("{}", report);
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::Mesh;
use crate::analysis::{PrintReadinessReport, analyze_print_readiness};
use crate::decimate::{DecimateParams, decimate};
use crate::error::{MeshError, MeshResult};
use crate::holes::{HoleFillParams, fill_holes};
use crate::noise::{NoiseFilterParams, remove_noise};
use crate::progress::{ProgressCallback, ProgressTracker};
use crate::smooth::{SmoothParams, smooth};
use crate::tracing_ext::log_mesh_stats;

// =========================================================================
// Pipeline Configuration
// =========================================================================

/// Which stages run, and with which parameters.
///
/// Normal estimation always runs; every other stage can be switched off.
///
/// # Example
///
/// ```
/// use scan_mesh::PipelineConfig;
///
/// let config = PipelineConfig::from_toml(r#"
///     decimate = 0.25
///
///     [smoothing]
///     iterations = 5
/// "#).unwrap();
///
/// assert_eq!(config.decimate, Some(0.25));
/// assert_eq!(config.smoothing.iterations, 5);
/// assert!(config.fill_holes);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Optional name for this workflow.
    pub name: Option<String>,

    /// Drop outlier vertices.
    pub remove_noise: bool,
    pub noise: NoiseFilterParams,

    /// Close boundary loops.
    pub fill_holes: bool,
    pub holes: HoleFillParams,

    /// Laplacian relaxation.
    pub smooth: bool,
    pub smoothing: SmoothParams,

    /// Decimate to this fraction of the vertex count.
    pub decimate: Option<f32>,

    /// Generate cylindrical texture coordinates when none are aligned.
    pub generate_uvs: bool,

    /// Attach a print-readiness report for the processed mesh.
    pub analyze: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: None,
            remove_noise: true,
            noise: NoiseFilterParams::default(),
            fill_holes: true,
            holes: HoleFillParams::default(),
            smooth: true,
            smoothing: SmoothParams::default(),
            decimate: None,
            generate_uvs: true,
            analyze: false,
        }
    }
}

impl PipelineConfig {
    /// Full processing of a fresh capture, with a readiness report.
    pub fn for_scans() -> Self {
        Self {
            name: Some("scan".to_string()),
            analyze: true,
            ..Self::default()
        }
    }

    /// Full processing followed by decimation, for lightweight previews.
    pub fn for_preview(ratio: f32) -> Self {
        Self {
            name: Some("preview".to_string()),
            decimate: Some(ratio),
            ..Self::default()
        }
    }

    /// Only hole repair and normal estimation; positions are left alone.
    pub fn minimal() -> Self {
        Self {
            name: Some("minimal".to_string()),
            remove_noise: false,
            smooth: false,
            generate_uvs: false,
            ..Self::default()
        }
    }

    /// Check enabled stages' parameters.
    pub fn validate(&self) -> MeshResult<()> {
        if self.smooth {
            self.smoothing.validate()?;
        }
        if let Some(ratio) = self.decimate {
            if ratio.is_nan() || ratio <= 0.0 {
                return Err(MeshError::invalid_parameter(
                    "decimate",
                    ratio,
                    "decimation ratio must be greater than zero",
                ));
            }
        }
        Ok(())
    }

    /// Number of stages this configuration runs.
    pub fn stage_count(&self) -> usize {
        // Normal estimation always runs
        1 + usize::from(self.remove_noise)
            + usize::from(self.fill_holes)
            + usize::from(self.smooth)
            + usize::from(self.decimate.is_some())
            + usize::from(self.generate_uvs)
            + usize::from(self.analyze)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> Result<Self, PipelineConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Ok(toml::from_str(&contents)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Load configuration from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Errors that can occur when loading pipeline configurations.
#[derive(Debug, Error)]
pub enum PipelineConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =========================================================================
// Pipeline
// =========================================================================

/// Result of a pipeline run.
#[derive(Debug, Clone)]
pub struct ProcessedScan {
    /// The processed mesh.
    pub mesh: Mesh,
    /// Print-readiness report, if analysis ran.
    pub report: Option<PrintReadinessReport>,
    /// Number of stages executed.
    pub stages_executed: usize,
    /// Log of operations performed.
    pub operation_log: Vec<String>,
}

/// A scan processing pipeline with a fluent API.
///
/// Each stage consumes the current mesh and replaces it with the stage's
/// output. A stage that rejects its parameters leaves the mesh untouched
/// and records a warning in the operation log.
///
/// # Example
///
/// ```
/// use scan_mesh::{Mesh, ScanPipeline};
/// use nalgebra::Point3;
///
/// let mesh = Mesh::from_parts(
///     vec![
///         Point3::new(0.0, 0.0, 0.0),
///         Point3::new(1.0, 0.0, 0.0),
///         Point3::new(0.0, 1.0, 0.0),
///         Point3::new(0.0, 0.0, 1.0),
///     ],
///     vec![[0, 2, 1], [0, 1, 3], [0, 3, 2]],
/// );
///
/// let result = ScanPipeline::new(mesh)
///     .fill_holes()
///     .compute_normals()
///     .analyze()
///     .finish();
///
/// assert_eq!(result.stages_executed, 3);
/// assert!(result.report.unwrap().is_watertight);
/// ```
pub struct ScanPipeline {
    mesh: Mesh,
    report: Option<PrintReadinessReport>,
    stages_executed: usize,
    operation_log: Vec<String>,
    progress_callback: Option<ProgressCallback>,
}

impl ScanPipeline {
    /// Start a pipeline with a captured mesh.
    pub fn new(mesh: Mesh) -> Self {
        Self {
            mesh,
            report: None,
            stages_executed: 0,
            operation_log: Vec::new(),
            progress_callback: None,
        }
    }

    /// Set a callback invoked between stages by [`ScanPipeline::run`].
    /// Returning `false` cancels the run before the next stage.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    // =========================================================================
    // Stages
    // =========================================================================

    /// Remove outlier vertices with default parameters.
    pub fn remove_noise(self) -> Self {
        self.remove_noise_with_params(&NoiseFilterParams::default())
    }

    /// Remove outlier vertices.
    pub fn remove_noise_with_params(mut self, params: &NoiseFilterParams) -> Self {
        let result = remove_noise(&self.mesh, params);
        self.log(format!(
            "Removed noise: {} vertices, {} faces dropped",
            result.vertices_removed, result.faces_removed
        ));
        self.mesh = result.mesh;
        self.stages_executed += 1;
        self
    }

    /// Fill holes with default parameters.
    pub fn fill_holes(self) -> Self {
        self.fill_holes_with_params(&HoleFillParams::default())
    }

    /// Fill holes up to `params.max_hole_size` boundary vertices.
    pub fn fill_holes_with_params(mut self, params: &HoleFillParams) -> Self {
        let result = fill_holes(&self.mesh, params);
        if result.skipped_hole_sizes.is_empty() {
            self.log(format!(
                "Filled holes: {} filled, {} faces added",
                result.holes_filled, result.faces_added
            ));
        } else {
            self.log(format!(
                "Filled holes: {} filled, {} faces added, {} left open (sizes {:?})",
                result.holes_filled,
                result.faces_added,
                result.skipped_hole_sizes.len(),
                result.skipped_hole_sizes
            ));
        }
        self.mesh = result.mesh;
        self.stages_executed += 1;
        self
    }

    /// Smooth with default parameters.
    pub fn smooth(self) -> Self {
        self.smooth_with_params(&SmoothParams::default())
    }

    /// Laplacian smoothing.
    pub fn smooth_with_params(mut self, params: &SmoothParams) -> Self {
        match smooth(&self.mesh, params) {
            Ok(result) => {
                self.log(format!(
                    "Smoothed: {} iterations, max displacement {:.6}",
                    result.iterations, result.max_displacement
                ));
                self.mesh = result.mesh;
            }
            Err(e) => {
                warn!(error = %e, "Smoothing skipped");
                self.log(format!("Smoothing warning: {}", e));
            }
        }
        self.stages_executed += 1;
        self
    }

    /// Recompute vertex normals.
    pub fn compute_normals(mut self) -> Self {
        self.mesh.recompute_normals();
        self.log("Computed vertex normals".to_string());
        self.stages_executed += 1;
        self
    }

    /// Decimate to a fraction of the vertex count.
    pub fn decimate_to_ratio(self, ratio: f32) -> Self {
        self.decimate_with_params(&DecimateParams::with_ratio(ratio))
    }

    /// Decimate with custom parameters.
    pub fn decimate_with_params(mut self, params: &DecimateParams) -> Self {
        match decimate(&self.mesh, params) {
            Ok(result) => {
                self.log(format!(
                    "Decimated: {} -> {} vertices, {} -> {} faces",
                    result.original_vertices,
                    result.final_vertices,
                    result.original_triangles,
                    result.final_triangles
                ));
                self.mesh = result.mesh;
            }
            Err(e) => {
                warn!(error = %e, "Decimation skipped");
                self.log(format!("Decimation warning: {}", e));
            }
        }
        self.stages_executed += 1;
        self
    }

    /// Generate texture coordinates if the mesh has none.
    pub fn generate_uvs(mut self) -> Self {
        if self.mesh.ensure_texture_coordinates() {
            self.log("Generated cylindrical texture coordinates".to_string());
        } else {
            self.log("Kept existing texture coordinates".to_string());
        }
        self.stages_executed += 1;
        self
    }

    /// Analyze print readiness and store the report.
    pub fn analyze(mut self) -> Self {
        let report = analyze_print_readiness(&self.mesh);
        self.log(format!(
            "Analyzed: score {:.1}, watertight={}, manifold={}",
            report.score, report.is_watertight, report.is_manifold
        ));
        self.report = Some(report);
        self.stages_executed += 1;
        self
    }

    // =========================================================================
    // Configuration-Based Execution
    // =========================================================================

    /// Run every stage enabled in `config`, in pipeline order.
    ///
    /// # Errors
    ///
    /// - [`MeshError::EmptyMesh`] if the mesh has no vertices or no faces
    /// - [`MeshError::InvalidParameter`] if an enabled stage's parameters
    ///   are out of range; nothing has run at that point
    /// - [`MeshError::Cancelled`] if the progress callback returned `false`
    pub fn run(mut self, config: &PipelineConfig) -> MeshResult<ProcessedScan> {
        if self.mesh.vertices.is_empty() {
            return Err(MeshError::empty_mesh("mesh has no vertices"));
        }
        if self.mesh.faces.is_empty() {
            return Err(MeshError::empty_mesh("mesh has no faces"));
        }
        config.validate()?;

        if let Some(name) = &config.name {
            self.log(format!("Running pipeline: {}", name));
        }
        info!(
            stages = config.stage_count(),
            vertices = self.mesh.vertex_count(),
            faces = self.mesh.face_count(),
            "Processing scan"
        );
        log_mesh_stats(&self.mesh, "input");

        let tracker = ProgressTracker::new(config.stage_count(), self.progress_callback.take());

        if config.remove_noise {
            tracker.begin("noise filter")?;
            self = self.remove_noise_with_params(&config.noise);
            tracker.stage_finished();
        }
        if config.fill_holes {
            tracker.begin("hole repair")?;
            self = self.fill_holes_with_params(&config.holes);
            tracker.stage_finished();
        }
        if config.smooth {
            tracker.begin("smoothing")?;
            self = self.smooth_with_params(&config.smoothing);
            tracker.stage_finished();
        }
        tracker.begin("normal estimation")?;
        self = self.compute_normals();
        tracker.stage_finished();
        if let Some(ratio) = config.decimate {
            tracker.begin("decimation")?;
            self = self.decimate_to_ratio(ratio);
            tracker.stage_finished();
        }
        if config.generate_uvs {
            tracker.begin("texture coordinates")?;
            self = self.generate_uvs();
            tracker.stage_finished();
        }
        if config.analyze {
            tracker.begin("analysis")?;
            self = self.analyze();
            tracker.stage_finished();
        }
        tracker.finish();

        log_mesh_stats(&self.mesh, "output");
        Ok(self.finish())
    }

    // =========================================================================
    // Output
    // =========================================================================

    /// Finish the pipeline and return the result.
    pub fn finish(self) -> ProcessedScan {
        ProcessedScan {
            mesh: self.mesh,
            report: self.report,
            stages_executed: self.stages_executed,
            operation_log: self.operation_log,
        }
    }

    /// Get a reference to the current mesh state.
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Get the operation log.
    pub fn log_entries(&self) -> &[String] {
        &self.operation_log
    }

    /// Get the number of stages executed.
    pub fn stages_executed(&self) -> usize {
        self.stages_executed
    }

    fn log(&mut self, message: String) {
        self.operation_log.push(message);
    }
}

/// Process a captured mesh with the given configuration.
pub fn process_scan(mesh: Mesh, config: &PipelineConfig) -> MeshResult<ProcessedScan> {
    ScanPipeline::new(mesh).run(config)
}
