//! Hole detection and filling.
//!
//! Holes are found as closed loops of boundary edges. Small loops are closed
//! with a fan around a new centroid vertex, larger loops with ear clipping,
//! and loops above the configured size are left open and reported.

use hashbrown::{HashMap, HashSet};
use nalgebra::{Point3, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::Mesh;
use crate::adjacency::MeshTopology;
use crate::tracing_ext::{OperationTimer, log_stage_result};

/// A boundary loop representing a hole in the mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryLoop {
    /// Ordered list of vertex indices forming the loop.
    pub vertices: Vec<u32>,
}

impl BoundaryLoop {
    /// Number of edges (and vertices) in the loop.
    pub fn edge_count(&self) -> usize {
        self.vertices.len()
    }
}

/// Parameters for hole filling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoleFillParams {
    /// Loops with more vertices than this are left open.
    pub max_hole_size: usize,

    /// Loops up to this size are fan-filled around a centroid vertex.
    /// Larger loops are ear clipped.
    pub fan_max_size: usize,
}

impl Default for HoleFillParams {
    fn default() -> Self {
        Self {
            max_hole_size: 500,
            fan_max_size: 20,
        }
    }
}

/// Result of hole filling.
#[derive(Debug, Clone)]
pub struct HoleFillResult {
    /// The repaired mesh.
    pub mesh: Mesh,

    /// Number of loops that were closed.
    pub holes_filled: usize,

    /// Sizes of loops that exceeded `max_hole_size` and remain open.
    pub skipped_hole_sizes: Vec<usize>,

    /// Triangles added across all filled holes.
    pub faces_added: usize,

    /// Centroid vertices appended by fan filling.
    pub vertices_added: usize,
}

/// Detect all boundary loops (holes) in the mesh.
///
/// Loops are traced from boundary vertices in ascending index order, so the
/// result is deterministic. Walks that do not close (malformed boundaries)
/// keep what they traced; walks shorter than three vertices are discarded.
pub fn detect_boundary_loops(topology: &MeshTopology) -> Vec<BoundaryLoop> {
    let boundary_edges = topology.boundary_edges();
    if boundary_edges.is_empty() {
        return Vec::new();
    }

    debug!("Found {} boundary edges", boundary_edges.len());

    // Edges arrive sorted, so every neighbor list is sorted as well
    let mut edge_neighbors: HashMap<u32, Vec<u32>> = HashMap::new();
    for edge in &boundary_edges {
        edge_neighbors.entry(edge.0).or_default().push(edge.1);
        edge_neighbors.entry(edge.1).or_default().push(edge.0);
    }

    let mut starts: Vec<u32> = edge_neighbors.keys().copied().collect();
    starts.sort_unstable();

    let max_walk = 2 * boundary_edges.len();
    let mut visited: HashSet<u32> = HashSet::new();
    let mut loops = Vec::new();

    for start in starts {
        if visited.contains(&start) {
            continue;
        }

        let mut loop_vertices = Vec::new();
        let mut current = start;
        let mut prev: Option<u32> = None;

        while loop_vertices.len() < max_walk {
            visited.insert(current);
            loop_vertices.push(current);

            let neighbors = edge_neighbors
                .get(&current)
                .map(Vec::as_slice)
                .unwrap_or(&[]);

            let next = neighbors
                .iter()
                .find(|&&n| Some(n) != prev && !visited.contains(&n));

            match next {
                Some(&n) => {
                    prev = Some(current);
                    current = n;
                }
                None => {
                    let closes = loop_vertices.len() > 2 && neighbors.contains(&start);
                    if !closes {
                        warn!("Boundary loop starting at vertex {} is not closed", start);
                    }
                    break;
                }
            }
        }

        if loop_vertices.len() >= 3 {
            loops.push(BoundaryLoop {
                vertices: loop_vertices,
            });
        }
    }

    info!(
        "Detected {} holes (boundary loops), sizes: {:?}",
        loops.len(),
        loops.iter().map(|l| l.edge_count()).collect::<Vec<_>>()
    );

    loops
}

/// Fill every hole up to `params.max_hole_size` vertices.
///
/// The original vertices and faces are kept in place. Centroid vertices are
/// appended after them and new triangles after the original faces. New
/// triangles are wound to agree with the faces surrounding each hole.
/// A mesh without boundary edges is returned unchanged.
pub fn fill_holes(mesh: &Mesh, params: &HoleFillParams) -> HoleFillResult {
    let _timer = OperationTimer::start("fill_holes", mesh);

    let topology = MeshTopology::from_mesh(mesh);
    let loops = detect_boundary_loops(&topology);

    let mut result = HoleFillResult {
        mesh: mesh.clone(),
        holes_filled: 0,
        skipped_hole_sizes: Vec::new(),
        faces_added: 0,
        vertices_added: 0,
    };
    if loops.is_empty() {
        return result;
    }

    let directed = directed_edges(mesh);
    let filled = &mut result.mesh;

    for hole in loops {
        let size = hole.edge_count();
        if size > params.max_hole_size {
            warn!(
                "Skipping large hole with {} edges (max: {})",
                size, params.max_hole_size
            );
            result.skipped_hole_sizes.push(size);
            continue;
        }

        let ring = oriented_ring(hole, &directed);
        let triangles = if size == 3 {
            vec![[ring[0], ring[1], ring[2]]]
        } else if size <= params.fan_max_size {
            result.vertices_added += 1;
            fan_fill(filled, &ring)
        } else {
            ear_clip(filled, &ring)
        };

        result.faces_added += triangles.len();
        result.holes_filled += 1;
        filled.faces.extend(triangles);
    }

    log_stage_result("fill_holes", result.holes_filled, mesh, &result.mesh);
    result
}

/// Directed edges of all in-range faces.
fn directed_edges(mesh: &Mesh) -> HashSet<(u32, u32)> {
    let mut edges = HashSet::with_capacity(mesh.face_count() * 3);
    for face in mesh.faces.iter().filter(|f| mesh.face_in_range(f)) {
        let [a, b, c] = *face;
        edges.insert((a, b));
        edges.insert((b, c));
        edges.insert((c, a));
    }
    edges
}

/// Order the loop so its edges run opposite to the faces that border it.
///
/// Triangles built by walking the ring in this order then share each
/// boundary edge with its neighbor face in the reverse direction.
fn oriented_ring(hole: BoundaryLoop, directed: &HashSet<(u32, u32)>) -> Vec<u32> {
    let mut ring = hole.vertices;
    if directed.contains(&(ring[0], ring[1])) {
        ring.reverse();
    }
    ring
}

/// Close a loop with a fan around its centroid.
///
/// Appends the centroid as a new vertex, with the averaged normal and texture
/// coordinate of the loop when those attributes are present.
fn fan_fill(mesh: &mut Mesh, ring: &[u32]) -> Vec<[u32; 3]> {
    let n = ring.len() as f32;
    let has_normals = mesh.has_normals();
    let has_uvs = mesh.aligned_texture_coordinates().is_some();

    let centroid = ring
        .iter()
        .fold(Vector3::<f32>::zeros(), |acc, &i| acc + mesh.vertices[i as usize].coords)
        / n;

    let center = mesh.vertices.len() as u32;
    mesh.vertices.push(Point3::from(centroid));

    if has_normals {
        let sum = ring
            .iter()
            .fold(Vector3::<f32>::zeros(), |acc, &i| acc + mesh.normals[i as usize]);
        let len = sum.norm();
        mesh.normals.push(if len > 1e-10 { sum / len } else { sum });
    }

    if has_uvs {
        if let Some(uvs) = mesh.texture_coordinates.as_mut() {
            let sum = ring
                .iter()
                .fold(Vector2::<f32>::zeros(), |acc, &i| acc + uvs[i as usize]);
            uvs.push(sum / n);
        }
    }

    (0..ring.len())
        .map(|i| [ring[i], ring[(i + 1) % ring.len()], center])
        .collect()
}

/// Triangulate a loop by ear clipping.
///
/// An ear is a vertex whose turn agrees with the loop normal and whose
/// triangle contains no other remaining loop vertex. Containment is tested
/// in the XY plane, which assumes holes are roughly planar and facing Z;
/// other orientations may clip poorly but always terminate. When a full pass
/// finds no ear, the first three remaining vertices are clipped.
fn ear_clip(mesh: &Mesh, ring: &[u32]) -> Vec<[u32; 3]> {
    let positions: Vec<Point3<f64>> = ring
        .iter()
        .map(|&i| mesh.vertices[i as usize].cast::<f64>())
        .collect();
    let normal = loop_normal(&positions);

    let mut remaining: Vec<usize> = (0..ring.len()).collect();
    let mut triangles = Vec::with_capacity(ring.len() - 2);

    while remaining.len() > 3 {
        let count = remaining.len();
        let ear = (0..count).find(|&i| {
            let prev = remaining[(i + count - 1) % count];
            let next = remaining[(i + 1) % count];
            is_ear(&positions, &remaining, prev, remaining[i], next, &normal)
        });

        let clip_at = match ear {
            Some(i) => i,
            None => {
                warn!(
                    "Ear clipping stuck with {} vertices remaining, forcing a clip",
                    count
                );
                1
            }
        };

        let prev = remaining[(clip_at + count - 1) % count];
        let next = remaining[(clip_at + 1) % count];
        triangles.push([ring[prev], ring[remaining[clip_at]], ring[next]]);
        remaining.remove(clip_at);
    }

    triangles.push([ring[remaining[0]], ring[remaining[1]], ring[remaining[2]]]);

    debug!(
        "Filled hole with {} edges using {} triangles",
        ring.len(),
        triangles.len()
    );
    triangles
}

/// Averaged normal of a loop from cross products around its centroid.
fn loop_normal(positions: &[Point3<f64>]) -> Vector3<f64> {
    let n = positions.len();
    let centroid = positions
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords)
        / n as f64;

    let mut normal = Vector3::zeros();
    for i in 0..n {
        let v0 = positions[i].coords - centroid;
        let v1 = positions[(i + 1) % n].coords - centroid;
        normal += v0.cross(&v1);
    }

    let len = normal.norm();
    if len > f64::EPSILON {
        normal / len
    } else {
        Vector3::z()
    }
}

fn is_ear(
    positions: &[Point3<f64>],
    remaining: &[usize],
    prev: usize,
    curr: usize,
    next: usize,
    normal: &Vector3<f64>,
) -> bool {
    let a = positions[prev];
    let b = positions[curr];
    let c = positions[next];

    // Convex corner: the turn at `b` agrees with the loop normal
    if (b - a).cross(&(c - b)).dot(normal) <= 0.0 {
        return false;
    }

    remaining
        .iter()
        .filter(|&&idx| idx != prev && idx != curr && idx != next)
        .all(|&idx| !point_in_triangle_xy(&positions[idx], &a, &b, &c))
}

fn point_in_triangle_xy(
    p: &Point3<f64>,
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
) -> bool {
    let sign = |p1: &Point3<f64>, p2: &Point3<f64>, p3: &Point3<f64>| -> f64 {
        (p1.x - p3.x) * (p2.y - p3.y) - (p2.x - p3.x) * (p1.y - p3.y)
    };

    let d1 = sign(p, a, b);
    let d2 = sign(p, b, c);
    let d3 = sign(p, c, a);

    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;

    !(has_neg && has_pos)
}

impl Mesh {
    /// Detect boundary loops (holes).
    pub fn boundary_loops(&self) -> Vec<BoundaryLoop> {
        detect_boundary_loops(&MeshTopology::from_mesh(self))
    }

    /// Fill holes with default parameters.
    pub fn fill_holes(&self) -> HoleFillResult {
        fill_holes(self, &HoleFillParams::default())
    }

    /// Fill holes with custom parameters.
    pub fn fill_holes_with_params(&self, params: &HoleFillParams) -> HoleFillResult {
        fill_holes(self, params)
    }
}
