//! Vertex/triangle adjacency graph mutated by edge collapses

use log::trace;
use smallvec::SmallVec;

use crate::error::Error;
use crate::index::IndexType;
use crate::util::try_with_capacity;
use crate::vertex::Position;
use crate::Vector3;

/// Adjacency lists live inline up to this many entries, which covers the valence of nearly every vertex of a typical mesh.
const INLINE_ADJACENCY: usize = 16;

pub(crate) type IdList = SmallVec<[u32; INLINE_ADJACENCY]>;

/// Cost of a vertex without neighbors; lower than any edge collapse so such vertices are removed first.
pub(crate) const ISOLATED_VERTEX_COST: f32 = -0.01;

pub(crate) struct MeshVertex {
    pub position: Vector3,
    /// Cleared once the vertex is collapsed; the slot itself stays allocated.
    pub live: bool,
    pub neighbors: IdList,
    pub faces: IdList,
    /// Cached cost of the cheapest collapse starting at this vertex
    pub cost: f32,
    /// Target of the cheapest collapse, `None` for isolated vertices
    pub collapse: Option<u32>,
}

pub(crate) struct MeshTriangle {
    pub vertices: [u32; 3],
    pub normal: Vector3,
}

impl MeshTriangle {
    #[inline]
    fn has_vertex(&self, id: u32) -> bool {
        self.vertices.contains(&id)
    }
}

fn remove_value(list: &mut IdList, value: u32) {
    if let Some(position) = list.iter().position(|v| *v == value) {
        list.swap_remove(position);
    }
}

pub(crate) struct Mesh {
    pub vertices: Vec<MeshVertex>,
    pub triangles: Vec<MeshTriangle>,
}

impl Mesh {
    /// Builds adjacency for `indices`, skipping triangles which reference the same vertex twice.
    ///
    /// Indices are expected to be validated against `vertices` by the caller.
    pub fn new<V, T>(vertices: &[V], indices: &[T]) -> Result<Self, Error>
    where
        V: Position,
        T: IndexType,
    {
        let mut mesh = Mesh {
            vertices: try_with_capacity(vertices.len())?,
            triangles: try_with_capacity(indices.len() / 3)?,
        };

        for vertex in vertices {
            mesh.vertices.push(MeshVertex {
                position: Vector3::from_position(vertex),
                live: true,
                neighbors: IdList::new(),
                faces: IdList::new(),
                cost: 0.0,
                collapse: None,
            });
        }

        let mut degenerate = 0;

        for abc in indices.chunks_exact(3) {
            if !mesh.add_triangle([abc[0].to_u32(), abc[1].to_u32(), abc[2].to_u32()]) {
                degenerate += 1;
            }
        }

        if degenerate > 0 {
            trace!("skipped {} degenerate triangles", degenerate);
        }

        Ok(mesh)
    }

    fn add_triangle(&mut self, vertices: [u32; 3]) -> bool {
        let [v0, v1, v2] = vertices;

        if v0 == v1 || v0 == v2 || v1 == v2 {
            return false;
        }

        let id = self.triangles.len() as u32;

        self.triangles.push(MeshTriangle {
            vertices,
            normal: Vector3::default(),
        });
        self.compute_normal(id);

        for v in vertices {
            self.vertices[v as usize].faces.push(id);
        }

        self.link_triangle(vertices);

        true
    }

    fn link_triangle(&mut self, [v0, v1, v2]: [u32; 3]) {
        self.add_neighbor(v0, v1);
        self.add_neighbor(v0, v2);
        self.add_neighbor(v1, v0);
        self.add_neighbor(v1, v2);
        self.add_neighbor(v2, v0);
        self.add_neighbor(v2, v1);
    }

    fn add_neighbor(&mut self, vertex: u32, id: u32) {
        let neighbors = &mut self.vertices[vertex as usize].neighbors;

        if !neighbors.contains(&id) {
            neighbors.push(id);
        }
    }

    fn compute_normal(&mut self, face: u32) {
        let [v0, v1, v2] = self.triangles[face as usize].vertices;

        let p0 = self.vertices[v0 as usize].position;
        let p1 = self.vertices[v1 as usize].position;
        let p2 = self.vertices[v2 as usize].position;

        let mut normal = (p1 - p0).cross(&(p2 - p1));
        normal.normalize();

        self.triangles[face as usize].normal = normal;
    }

    fn remove_vertex(&mut self, id: u32) {
        let vertex = &mut self.vertices[id as usize];

        debug_assert!(vertex.live);
        debug_assert!(vertex.faces.is_empty());

        vertex.live = false;
        vertex.neighbors.clear();
        vertex.faces.clear();
    }

    // drops `id` from the neighbors of `vertex` unless they still share a face
    fn remove_if_non_neighbor_one(&mut self, vertex: u32, id: u32) {
        let v = &self.vertices[vertex as usize];

        let Some(position) = v.neighbors.iter().position(|n| *n == id) else {
            return;
        };

        if v.faces.iter().any(|f| self.triangles[*f as usize].has_vertex(id)) {
            return;
        }

        self.vertices[vertex as usize].neighbors.swap_remove(position);
    }

    fn remove_if_non_neighbor(&mut self, v0: Option<u32>, v1: Option<u32>) {
        if let (Some(v0), Some(v1)) = (v0, v1) {
            self.remove_if_non_neighbor_one(v0, v1);
            self.remove_if_non_neighbor_one(v1, v0);
        }
    }

    fn remove_triangle(&mut self, face: u32) {
        let vertices = self.triangles[face as usize].vertices;
        let mut live = [None; 3];

        for (slot, id) in live.iter_mut().zip(vertices) {
            let vertex = &mut self.vertices[id as usize];

            if vertex.live {
                remove_value(&mut vertex.faces, face);
                *slot = Some(id);
            }
        }

        self.remove_if_non_neighbor(live[0], live[1]);
        self.remove_if_non_neighbor(live[1], live[2]);
        self.remove_if_non_neighbor(live[2], live[0]);
    }

    fn replace_vertex(&mut self, face: u32, old: u32, new: u32) {
        let triangle = &mut self.triangles[face as usize];

        debug_assert!(triangle.has_vertex(old));
        debug_assert!(!triangle.has_vertex(new));

        if let Some(slot) = triangle.vertices.iter_mut().find(|v| **v == old) {
            *slot = new;
        }

        let vertices = triangle.vertices;

        remove_value(&mut self.vertices[old as usize].faces, face);
        self.vertices[new as usize].faces.push(face);

        for v in vertices {
            self.remove_if_non_neighbor(Some(old), Some(v));
        }

        self.link_triangle(vertices);
        self.compute_normal(face);
    }

    /// Returns the cost of collapsing `u` onto `v`.
    ///
    /// The cost is directional: curvature is measured over the faces of `u` only, against the faces shared by `u` and `v`.
    /// Long edges and curved regions are expensive; small coplanar regions are cheap.
    pub fn edge_collapse_cost(&self, u: u32, v: u32) -> f32 {
        let uv = &self.vertices[u as usize];

        let edge_length = (self.vertices[v as usize].position - uv.position).length();

        // find the "sides" triangles that are on the edge uv
        let sides: IdList = uv
            .faces
            .iter()
            .copied()
            .filter(|f| self.triangles[*f as usize].has_vertex(v))
            .collect();

        // use the triangle facing most away from the sides to determine the curvature term
        let mut curvature = 0.0;

        for face in &uv.faces {
            let normal = &self.triangles[*face as usize].normal;

            // curvature for this face and the side closest to it
            let mut min_curvature = 1.0;

            for side in &sides {
                let dot = normal.dot(&self.triangles[*side as usize].normal);
                let t = (1.0 - dot) / 2.0;

                if t < min_curvature {
                    min_curvature = t;
                }
            }

            if min_curvature > curvature {
                curvature = min_curvature;
            }
        }

        edge_length * curvature
    }

    /// Caches the cheapest collapse starting at `vertex` (first neighbor wins ties).
    pub fn compute_edge_cost_at_vertex(&mut self, vertex: u32) {
        let neighbor_count = self.vertices[vertex as usize].neighbors.len();

        if neighbor_count == 0 {
            let v = &mut self.vertices[vertex as usize];
            v.collapse = None;
            v.cost = ISOLATED_VERTEX_COST;
            return;
        }

        let mut cost = f32::MAX;
        let mut collapse = None;

        for i in 0..neighbor_count {
            let neighbor = self.vertices[vertex as usize].neighbors[i];
            let distance = self.edge_collapse_cost(vertex, neighbor);

            if distance < cost {
                collapse = Some(neighbor);
                cost = distance;
            }
        }

        let v = &mut self.vertices[vertex as usize];

        // only reachable with non-finite positions; a connected vertex must still merge somewhere
        if collapse.is_none() {
            collapse = Some(v.neighbors[0]);
        }

        v.collapse = collapse;
        v.cost = cost;
    }

    pub fn compute_all_edge_collapse_costs(&mut self) {
        for vertex in 0..self.vertices.len() as u32 {
            self.compute_edge_cost_at_vertex(vertex);
        }
    }

    /// Collapses `u` onto `v`, or deletes `u` if it has no target.
    ///
    /// Triangles on the edge are removed, the remaining triangles of `u` are moved to `v` and `u` is deleted.
    /// Returns the former neighbors of `u`, whose cached costs have been recomputed.
    pub fn collapse(&mut self, u: u32, v: Option<u32>) -> IdList {
        let Some(v) = v else {
            // u is a vertex all by itself so just delete it
            self.remove_vertex(u);
            return IdList::new();
        };

        let neighbors = self.vertices[u as usize].neighbors.clone();

        // delete triangles on edge uv
        let mut i = self.vertices[u as usize].faces.len();

        while i > 0 {
            i -= 1;

            let face = self.vertices[u as usize].faces[i];

            if self.triangles[face as usize].has_vertex(v) {
                self.remove_triangle(face);
            }
        }

        // update remaining triangles to have v instead of u
        let mut i = self.vertices[u as usize].faces.len();

        while i > 0 {
            i -= 1;

            let face = self.vertices[u as usize].faces[i];
            self.replace_vertex(face, u, v);
        }

        self.remove_vertex(u);

        for neighbor in &neighbors {
            self.compute_edge_cost_at_vertex(*neighbor);
        }

        neighbors
    }

    /// Returns the live vertex with the smallest cached cost; the first one in storage order wins ties.
    pub fn minimum_cost_vertex(&self) -> Option<u32> {
        let mut result: Option<(u32, f32)> = None;

        for (id, vertex) in self.vertices.iter().enumerate() {
            if !vertex.live {
                continue;
            }

            match result {
                Some((_, cost)) if vertex.cost >= cost => {}
                _ => result = Some((id as u32, vertex.cost)),
            }
        }

        result.map(|(id, _)| id)
    }

    /// Checks that neighbor lists are exactly the symmetric closure of "shares a live triangle".
    #[cfg(test)]
    pub fn is_consistent(&self) -> bool {
        for (id, vertex) in self.vertices.iter().enumerate() {
            let id = id as u32;

            if !vertex.live {
                if !vertex.neighbors.is_empty() || !vertex.faces.is_empty() {
                    return false;
                }
                continue;
            }

            let mut expected: Vec<u32> = vertex
                .faces
                .iter()
                .flat_map(|f| self.triangles[*f as usize].vertices)
                .filter(|v| *v != id)
                .collect();
            expected.sort_unstable();
            expected.dedup();

            let mut actual: Vec<u32> = vertex.neighbors.to_vec();
            actual.sort_unstable();

            if expected != actual {
                return false;
            }

            if vertex
                .faces
                .iter()
                .any(|f| !self.triangles[*f as usize].has_vertex(id))
            {
                return false;
            }
        }

        true
    }
}
