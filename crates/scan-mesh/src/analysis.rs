//! Print-readiness analysis.
//!
//! A read-only diagnostic pass over a mesh: topology (watertight, manifold,
//! holes), defects (duplicate vertices, degenerate faces, inverted faces),
//! measurements (volume, surface area, dimensions) and triangle quality are
//! folded into a 0-100 printability score with ranked recommendations.
//! Nothing in the report is applied to the mesh.
//!
//! # Example
//!
//! ```
//! use scan_mesh::{analyze_print_readiness, Mesh};
//! use nalgebra::Point3;
//!
//! let mesh = Mesh::from_parts(
//!     vec![
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(1.0, 0.0, 0.0),
//!         Point3::new(0.0, 1.0, 0.0),
//!     ],
//!     vec![[0, 1, 2]],
//! );
//! let report = analyze_print_readiness(&mesh);
//! assert!(!report.is_watertight);
//! assert!(!report.is_printable());
//! ```

use nalgebra::Vector3;
use tracing::{debug, warn};

use crate::Mesh;
use crate::adjacency::MeshTopology;
use crate::holes::detect_boundary_loops;
use crate::tracing_ext::OperationTimer;

/// Squared distance below which two vertices count as duplicates.
pub const DUPLICATE_DISTANCE_SQUARED: f64 = 1e-6;

/// Cross product length below which a face counts as degenerate.
pub const DEGENERATE_CROSS_LENGTH: f64 = 1e-10;

/// Aspect ratio above which a triangle is poorly shaped.
pub const POOR_ASPECT_RATIO: f64 = 10.0;

/// Aspect ratio above which a triangle is very poorly shaped.
pub const VERY_POOR_ASPECT_RATIO: f64 = 20.0;

/// Minimum score for a mesh to be considered printable.
pub const PRINTABLE_SCORE: f64 = 70.0;

/// Vertex count above which the quadratic duplicate scan logs a warning.
const DUPLICATE_SCAN_WARN_VERTICES: usize = 20_000;

/// Face count above which simplification is suggested.
const COMPLEX_MESH_FACES: usize = 500_000;

/// Smallest printable feature size in meters.
const MIN_WALL_THICKNESS: f64 = 0.002;

/// Hole count above which a rescan is suggested.
const RESCAN_HOLE_COUNT: usize = 10;

/// How urgent a recommendation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecommendationSeverity {
    /// The mesh will not print correctly until this is fixed.
    Critical,
    /// Likely to cause defects.
    Warning,
    /// Optional improvement.
    Suggestion,
}

impl std::fmt::Display for RecommendationSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RecommendationSeverity::Critical => "critical",
            RecommendationSeverity::Warning => "warning",
            RecommendationSeverity::Suggestion => "suggestion",
        };
        f.write_str(label)
    }
}

/// Advisory repair step. Recommendations are never applied automatically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recommendation {
    pub severity: RecommendationSeverity,
    pub title: String,
    pub detail: String,
}

impl Recommendation {
    fn new(
        severity: RecommendationSeverity,
        title: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            title: title.into(),
            detail: detail.into(),
        }
    }
}

/// Result of print-readiness analysis.
#[derive(Debug, Clone)]
pub struct PrintReadinessReport {
    /// Number of vertices.
    pub vertex_count: usize,

    /// Number of faces.
    pub face_count: usize,

    /// Has faces and no boundary edges.
    pub is_watertight: bool,

    /// No edge is shared by more than two faces.
    pub is_manifold: bool,

    /// Edges with exactly one incident face.
    pub boundary_edge_count: usize,

    /// Edges with more than two incident faces.
    pub non_manifold_edge_count: usize,

    /// Number of boundary loops.
    pub hole_count: usize,

    /// Vertex count of each boundary loop.
    pub hole_sizes: Vec<usize>,

    /// Vertex pairs closer than [`DUPLICATE_DISTANCE_SQUARED`].
    pub duplicate_vertex_count: usize,

    /// Faces with a repeated index, an out-of-range index, or near-zero area.
    pub degenerate_face_count: usize,

    /// Faces whose normal points toward the mesh centroid.
    pub inverted_normal_count: usize,

    /// Self-intersection detection is not implemented. Always zero; a zero
    /// here does not mean the mesh is free of self-intersections.
    pub self_intersection_count: usize,

    /// Signed volume in cubic meters. Only computed for watertight meshes.
    pub volume: Option<f64>,

    /// Total surface area in square meters.
    pub surface_area: f64,

    /// Bounding box size in meters (x, y, z).
    pub dimensions: Option<Vector3<f64>>,

    /// Triangles with aspect ratio above 10 and up to 20.
    pub poor_quality_triangle_count: usize,

    /// Triangles with aspect ratio above 20.
    pub very_poor_quality_triangle_count: usize,

    /// Composite score from 0 (unprintable) to 100.
    pub score: f64,

    /// Recommendations ordered from most to least severe.
    pub recommendations: Vec<Recommendation>,
}

impl PrintReadinessReport {
    /// Score of at least 70 on a watertight, manifold mesh.
    pub fn is_printable(&self) -> bool {
        self.score >= PRINTABLE_SCORE && self.is_watertight && self.is_manifold
    }

    /// Recommendations of the given severity.
    pub fn recommendations_with(&self, severity: RecommendationSeverity) -> Vec<&Recommendation> {
        self.recommendations
            .iter()
            .filter(|r| r.severity == severity)
            .collect()
    }
}

impl std::fmt::Display for PrintReadinessReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Print Readiness Report:")?;
        writeln!(f, "  Vertices: {}", self.vertex_count)?;
        writeln!(f, "  Faces: {}", self.face_count)?;

        if let Some(d) = &self.dimensions {
            writeln!(f, "  Dimensions: {:.4} x {:.4} x {:.4} m", d.x, d.y, d.z)?;
        }

        writeln!(f, "  Surface Area: {:.6} m^2", self.surface_area)?;
        match self.volume {
            Some(v) => writeln!(f, "  Volume: {:.6} m^3", v)?,
            None => writeln!(f, "  Volume: n/a (not watertight)")?,
        }

        writeln!(
            f,
            "  Watertight: {} (holes: {}, boundary edges: {})",
            if self.is_watertight { "yes" } else { "NO" },
            self.hole_count,
            self.boundary_edge_count
        )?;
        writeln!(
            f,
            "  Manifold: {} (non-manifold edges: {})",
            if self.is_manifold { "yes" } else { "NO" },
            self.non_manifold_edge_count
        )?;
        writeln!(f, "  Duplicate vertices: {}", self.duplicate_vertex_count)?;
        writeln!(f, "  Degenerate faces: {}", self.degenerate_face_count)?;
        writeln!(f, "  Inverted normals: {}", self.inverted_normal_count)?;
        writeln!(f, "  Self-intersections: not checked")?;
        writeln!(
            f,
            "  Triangle quality: {} poor, {} very poor",
            self.poor_quality_triangle_count, self.very_poor_quality_triangle_count
        )?;
        writeln!(
            f,
            "  Score: {:.1} ({})",
            self.score,
            if self.is_printable() { "printable" } else { "NOT printable" }
        )?;

        for rec in &self.recommendations {
            writeln!(f, "  [{}] {}: {}", rec.severity, rec.title, rec.detail)?;
        }

        Ok(())
    }
}

/// Analyze a mesh for 3D printing.
pub fn analyze_print_readiness(mesh: &Mesh) -> PrintReadinessReport {
    let _timer = OperationTimer::start("analyze_print_readiness", mesh);

    let topology = MeshTopology::from_mesh(mesh);
    let boundary_edge_count = topology.boundary_edge_count();
    let non_manifold_edge_count = topology.non_manifold_edge_count();
    let is_watertight = mesh.face_count() > 0 && boundary_edge_count == 0;
    let is_manifold = topology.is_manifold();

    let hole_sizes: Vec<usize> = detect_boundary_loops(&topology)
        .iter()
        .map(|l| l.edge_count())
        .collect();

    let faces = face_survey(mesh);
    let duplicate_vertex_count = count_duplicate_vertices(mesh);

    let dimensions = mesh
        .bounds()
        .map(|(min, max)| (max - min).cast::<f64>());

    let mut report = PrintReadinessReport {
        vertex_count: mesh.vertex_count(),
        face_count: mesh.face_count(),
        is_watertight,
        is_manifold,
        boundary_edge_count,
        non_manifold_edge_count,
        hole_count: hole_sizes.len(),
        hole_sizes,
        duplicate_vertex_count,
        degenerate_face_count: faces.degenerate,
        inverted_normal_count: faces.inverted,
        self_intersection_count: 0,
        volume: is_watertight.then(|| mesh.signed_volume()),
        surface_area: faces.surface_area,
        dimensions,
        poor_quality_triangle_count: faces.poor,
        very_poor_quality_triangle_count: faces.very_poor,
        score: 0.0,
        recommendations: Vec::new(),
    };

    report.score = printability_score(&report);
    report.recommendations = recommendations(&report);

    if !report.is_watertight {
        warn!(
            "Mesh is not watertight: {} holes, {} boundary edges",
            report.hole_count, boundary_edge_count
        );
    }
    if !report.is_manifold {
        warn!(
            "Mesh is not manifold: {} non-manifold edges",
            non_manifold_edge_count
        );
    }
    debug!("{}", report);

    report
}

/// Per-face counts gathered in one pass.
#[derive(Debug, Default)]
struct FaceSurvey {
    degenerate: usize,
    inverted: usize,
    poor: usize,
    very_poor: usize,
    surface_area: f64,
}

fn face_survey(mesh: &Mesh) -> FaceSurvey {
    let mut survey = FaceSurvey::default();
    let Some(center) = mesh.centroid() else {
        survey.degenerate = mesh.face_count();
        return survey;
    };

    for face in &mesh.faces {
        let [a, b, c] = *face;
        let Some(tri) = mesh.face_triangle(face) else {
            survey.degenerate += 1;
            continue;
        };
        let cross = tri.area_vector();
        if a == b || b == c || a == c || cross.norm() < DEGENERATE_CROSS_LENGTH {
            survey.degenerate += 1;
            continue;
        }

        survey.surface_area += cross.norm() * 0.5;

        let outward = tri.centroid() - center;
        if outward.dot(&cross) < 0.0 {
            survey.inverted += 1;
        }

        let aspect = tri.aspect_ratio();
        if aspect > VERY_POOR_ASPECT_RATIO {
            survey.very_poor += 1;
        } else if aspect > POOR_ASPECT_RATIO {
            survey.poor += 1;
        }
    }

    survey
}

/// Count vertex pairs closer than the duplicate threshold.
///
/// Compares every pair, so cost grows quadratically with vertex count.
fn count_duplicate_vertices(mesh: &Mesh) -> usize {
    let n = mesh.vertex_count();
    if n > DUPLICATE_SCAN_WARN_VERTICES {
        warn!(
            vertices = n,
            "Duplicate vertex scan is quadratic and may be slow on this mesh"
        );
    }

    let points: Vec<_> = mesh.vertices.iter().map(|p| p.cast::<f64>()).collect();
    let mut count = 0;
    for i in 0..n {
        for j in (i + 1)..n {
            if (points[i] - points[j]).norm_squared() < DUPLICATE_DISTANCE_SQUARED {
                count += 1;
            }
        }
    }
    count
}

/// Start from 100 and subtract capped penalties per defect category.
fn printability_score(report: &PrintReadinessReport) -> f64 {
    let mut score = 100.0;

    if !report.is_watertight {
        score -= 30.0 + (report.hole_count as f64 * 2.0).min(20.0);
    }
    if !report.is_manifold {
        score -= 25.0 + (report.non_manifold_edge_count as f64 * 0.5).min(15.0);
    }

    score -= (report.duplicate_vertex_count as f64 * 0.1).min(10.0);
    score -= (report.degenerate_face_count as f64 * 0.5).min(10.0);
    score -= (report.inverted_normal_count as f64 * 0.5).min(10.0);
    score -= (report.poor_quality_triangle_count as f64 * 0.1).min(5.0);
    score -= (report.very_poor_quality_triangle_count as f64 * 0.2).min(5.0);

    score.max(0.0)
}

fn recommendations(report: &PrintReadinessReport) -> Vec<Recommendation> {
    use RecommendationSeverity::*;

    let mut recs = Vec::new();

    if report.face_count == 0 {
        recs.push(Recommendation::new(
            Critical,
            "No geometry",
            "The mesh has no faces. Capture the object again.",
        ));
    } else if !report.is_watertight {
        recs.push(Recommendation::new(
            Critical,
            "Fill holes",
            format!(
                "{} hole(s) with {} open edges must be closed before printing",
                report.hole_count, report.boundary_edge_count
            ),
        ));
    }
    if !report.is_manifold {
        recs.push(Recommendation::new(
            Critical,
            "Repair non-manifold edges",
            format!(
                "{} edge(s) are shared by more than two faces",
                report.non_manifold_edge_count
            ),
        ));
    }

    if report.duplicate_vertex_count > 0 {
        recs.push(Recommendation::new(
            Warning,
            "Remove duplicate vertices",
            format!(
                "{} vertex pair(s) are closer than 1 mm and should be merged",
                report.duplicate_vertex_count
            ),
        ));
    }
    if report.degenerate_face_count > 0 {
        recs.push(Recommendation::new(
            Warning,
            "Remove degenerate faces",
            format!(
                "{} face(s) have zero area or invalid indices",
                report.degenerate_face_count
            ),
        ));
    }
    if report.inverted_normal_count > 0 {
        recs.push(Recommendation::new(
            Warning,
            "Fix inverted normals",
            format!(
                "{} face(s) point toward the inside of the mesh",
                report.inverted_normal_count
            ),
        ));
    }

    if report.hole_count > RESCAN_HOLE_COUNT {
        recs.push(Recommendation::new(
            Suggestion,
            "Rescan the object",
            "Many holes usually mean parts of the object were not captured. \
             Scan again from more angles.",
        ));
    }
    if let Some(d) = &report.dimensions {
        let footprint = d.x.min(d.z);
        if d.y > 2.0 * footprint {
            recs.push(Recommendation::new(
                Suggestion,
                "Add a base plate",
                "The model is tall relative to its footprint and may tip over while printing",
            ));
        }
        if d.x.min(d.y).min(d.z) < MIN_WALL_THICKNESS {
            recs.push(Recommendation::new(
                Suggestion,
                "Check wall thickness",
                "At least one dimension is under 2 mm and may be too thin to print",
            ));
        }
    }
    if report.face_count > COMPLEX_MESH_FACES {
        recs.push(Recommendation::new(
            Suggestion,
            "Reduce complexity",
            format!(
                "{} faces is more than most slicers handle comfortably; decimate the mesh",
                report.face_count
            ),
        ));
    }

    recs.sort_by_key(|r| r.severity);
    recs
}

impl Mesh {
    /// Analyze the mesh for 3D printing.
    pub fn print_readiness(&self) -> PrintReadinessReport {
        analyze_print_readiness(self)
    }
}
