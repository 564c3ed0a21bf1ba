//! Mesh topology index.
//!
//! Provides the vertex adjacency graph and per-edge face counts that the
//! processing stages and the analyzer are built on. The index is cheap to
//! build (one pass over the faces) and is rebuilt whenever a stage needs it.

use hashbrown::HashMap;

/// An undirected edge, stored with the smaller vertex index first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge(pub u32, pub u32);

impl Edge {
    /// Canonicalize an edge so that `Edge::new(a, b) == Edge::new(b, a)`.
    #[inline]
    pub fn new(a: u32, b: u32) -> Self {
        if a < b {
            Edge(a, b)
        } else {
            Edge(b, a)
        }
    }
}

/// Vertex adjacency and edge incidence for a triangle mesh.
///
/// - An edge with incidence 1 is a boundary edge (it borders a hole).
/// - An edge with incidence greater than 2 is non-manifold. It is reported,
///   never repaired.
///
/// Faces that reference a vertex outside the mesh, or repeat an index, do not
/// contribute edges. They are counted in [`MeshTopology::skipped_face_count`].
#[derive(Debug, Clone)]
pub struct MeshTopology {
    /// Sorted, deduplicated neighbor list per vertex.
    adjacency: Vec<Vec<u32>>,
    /// Number of faces using each undirected edge.
    edge_incidence: HashMap<Edge, u32>,
    skipped_faces: usize,
}

impl MeshTopology {
    /// Build the index for `vertex_count` vertices and the given faces.
    ///
    /// # Example
    ///
    /// ```
    /// use scan_mesh::MeshTopology;
    ///
    /// let faces = vec![[0, 1, 2], [1, 3, 2]];
    /// let topo = MeshTopology::build(4, &faces);
    ///
    /// assert_eq!(topo.boundary_edge_count(), 4);
    /// assert_eq!(topo.neighbors(1), &[0, 2, 3]);
    /// ```
    #[must_use]
    pub fn build(vertex_count: usize, faces: &[[u32; 3]]) -> Self {
        let mut adjacency: Vec<Vec<u32>> = vec![Vec::new(); vertex_count];
        let mut edge_incidence: HashMap<Edge, u32> = HashMap::with_capacity(faces.len() * 2);
        let mut skipped_faces = 0usize;

        for face in faces {
            let [a, b, c] = *face;
            if face.iter().any(|&i| i as usize >= vertex_count) || a == b || b == c || a == c {
                skipped_faces += 1;
                continue;
            }

            for (u, v) in [(a, b), (b, c), (c, a)] {
                *edge_incidence.entry(Edge::new(u, v)).or_insert(0) += 1;
                adjacency[u as usize].push(v);
                adjacency[v as usize].push(u);
            }
        }

        for neighbors in &mut adjacency {
            neighbors.sort_unstable();
            neighbors.dedup();
        }

        Self {
            adjacency,
            edge_incidence,
            skipped_faces,
        }
    }

    /// Build the index for a mesh.
    #[must_use]
    pub fn from_mesh(mesh: &crate::Mesh) -> Self {
        Self::build(mesh.vertex_count(), &mesh.faces)
    }

    /// Number of vertices the index was built for.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Neighbors of a vertex in ascending order.
    ///
    /// Returns an empty slice for isolated or out-of-range vertices.
    #[inline]
    pub fn neighbors(&self, v: u32) -> &[u32] {
        self.adjacency.get(v as usize).map_or(&[], Vec::as_slice)
    }

    /// Number of faces incident to an edge (0 if the edge does not exist).
    #[inline]
    pub fn incidence(&self, a: u32, b: u32) -> u32 {
        self.edge_incidence
            .get(&Edge::new(a, b))
            .copied()
            .unwrap_or(0)
    }

    /// Boundary edges in ascending order.
    pub fn boundary_edges(&self) -> Vec<Edge> {
        let mut edges: Vec<Edge> = self
            .edge_incidence
            .iter()
            .filter(|(_, &count)| count == 1)
            .map(|(&edge, _)| edge)
            .collect();
        edges.sort_unstable();
        edges
    }

    /// Count the number of boundary edges.
    #[must_use]
    pub fn boundary_edge_count(&self) -> usize {
        self.edge_incidence.values().filter(|&&c| c == 1).count()
    }

    /// Non-manifold edges in ascending order.
    pub fn non_manifold_edges(&self) -> Vec<Edge> {
        let mut edges: Vec<Edge> = self
            .edge_incidence
            .iter()
            .filter(|(_, &count)| count > 2)
            .map(|(&edge, _)| edge)
            .collect();
        edges.sort_unstable();
        edges
    }

    /// Count the number of non-manifold edges.
    #[must_use]
    pub fn non_manifold_edge_count(&self) -> usize {
        self.edge_incidence.values().filter(|&&c| c > 2).count()
    }

    /// True when no edge is shared by more than two faces.
    #[must_use]
    pub fn is_manifold(&self) -> bool {
        self.edge_incidence.values().all(|&c| c <= 2)
    }

    /// True when no edge borders a hole.
    #[must_use]
    pub fn is_watertight(&self) -> bool {
        self.edge_incidence.values().all(|&c| c >= 2)
    }

    /// Total number of distinct edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edge_incidence.len()
    }

    /// Faces that were ignored because they were out of range or repeated
    /// an index.
    #[must_use]
    pub fn skipped_face_count(&self) -> usize {
        self.skipped_faces
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::{cube_missing_triangle, unit_cube};

    #[test]
    fn test_edge_canonical() {
        assert_eq!(Edge::new(5, 2), Edge(2, 5));
        assert_eq!(Edge::new(2, 5), Edge::new(5, 2));
    }

    #[test]
    fn test_single_triangle() {
        let topo = MeshTopology::build(3, &[[0, 1, 2]]);
        assert_eq!(topo.edge_count(), 3);
        assert_eq!(topo.boundary_edge_count(), 3);
        assert!(topo.is_manifold());
        assert!(!topo.is_watertight());
        assert_eq!(topo.neighbors(0), &[1, 2]);
    }

    #[test]
    fn test_shared_edge_counts_twice() {
        let topo = MeshTopology::build(4, &[[0, 1, 2], [1, 3, 2]]);
        assert_eq!(topo.incidence(1, 2), 2);
        assert_eq!(topo.incidence(2, 1), 2);
        assert_eq!(topo.incidence(0, 3), 0);
        assert_eq!(topo.edge_count(), 5);
        assert_eq!(
            topo.boundary_edges(),
            vec![Edge(0, 1), Edge(0, 2), Edge(1, 3), Edge(2, 3)]
        );
    }

    #[test]
    fn test_cube_is_closed() {
        let cube = unit_cube();
        let topo = MeshTopology::from_mesh(&cube);
        assert_eq!(topo.edge_count(), 18);
        assert!(topo.is_watertight());
        assert!(topo.is_manifold());
        assert_eq!(topo.boundary_edge_count(), 0);
    }

    #[test]
    fn test_cube_missing_triangle_has_three_boundary_edges() {
        let topo = MeshTopology::from_mesh(&cube_missing_triangle());
        assert_eq!(topo.boundary_edges(), vec![Edge(0, 1), Edge(0, 2), Edge(1, 2)]);
        assert!(!topo.is_watertight());
        assert!(topo.is_manifold());
    }

    #[test]
    fn test_non_manifold_fan() {
        // Three triangles sharing edge (0, 1)
        let faces = [[0, 1, 2], [1, 0, 3], [0, 1, 4]];
        let topo = MeshTopology::build(5, &faces);
        assert_eq!(topo.non_manifold_edges(), vec![Edge(0, 1)]);
        assert!(!topo.is_manifold());
    }

    #[test]
    fn test_invalid_faces_are_skipped() {
        let faces = [[0, 1, 2], [0, 1, 9], [2, 2, 1]];
        let topo = MeshTopology::build(3, &faces);
        assert_eq!(topo.skipped_face_count(), 2);
        assert_eq!(topo.edge_count(), 3);
        assert!(topo.neighbors(9).is_empty());
    }
}
