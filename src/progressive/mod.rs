//! Progressive mesh reduction for continuous level of detail
//!
//! [progressive_mesh] collapses every vertex of a mesh, one edge at a time, always picking the collapse which changes the
//! surface the least. The collapse order becomes a vertex permutation: after reordering the vertex buffer with it, the
//! first `k` vertices form a valid simplified mesh for every `k`. See [lod] for turning the results into index buffers.

pub mod lod;
mod mesh;

use log::{debug, trace};

use crate::error::{Error, check_destination};
use crate::index::{IndexType, check_indices};
use crate::util::{try_filled_vec, try_with_capacity};
use crate::vertex::Position;

use self::mesh::Mesh;

/// Picks the next vertex to collapse.
trait CollapseSearch {
    /// Returns the live vertex with the lowest cached cost, first in storage order on ties.
    fn next(&mut self, mesh: &Mesh) -> Option<u32>;

    /// Called after the cached costs of `vertices` have been recomputed.
    fn update(&mut self, mesh: &Mesh, vertices: &[u32]) -> Result<(), Error>;
}

/// Scans every vertex on each step, O(n²) overall.
struct LinearSearch;

impl CollapseSearch for LinearSearch {
    fn next(&mut self, mesh: &Mesh) -> Option<u32> {
        mesh.minimum_cost_vertex()
    }

    fn update(&mut self, _mesh: &Mesh, _vertices: &[u32]) -> Result<(), Error> {
        Ok(())
    }
}

/// Computes the collapse order of all vertices of a mesh.
///
/// On return `permutation[v]` is the new position of vertex `v`, and `collapse_map[r]` is the (new) vertex which the
/// vertex at new position `r` is merged into once the mesh is rendered with `r` vertices or less. Vertices are ranked by
/// importance: the first vertex collapsed ends up last, so every prefix `0..k` of the permuted vertex buffer is a valid
/// mesh and `collapse_map[r] < r` holds for every `r > 0`. Vertices which are removed without being merged (isolated
/// vertices) map to 0.
///
/// Cost of collapsing `u` onto a neighbor `v` is the edge length scaled by the curvature around `u`, so small and
/// coplanar features go first. Ties are broken by vertex order.
///
/// Duplicate vertices split along attribute seams should be welded first (see [generate_vertex_remap](crate::index::generator::generate_vertex_remap)),
/// otherwise the mesh falls apart into disconnected pieces. Triangles referencing the same vertex twice are ignored.
///
/// The search for the cheapest collapse is linear, so reduction time grows quadratically with the vertex count.
///
/// # Arguments
///
/// * `collapse_map`: must contain enough space for `vertices.len()` elements
/// * `permutation`: must contain enough space for `vertices.len()` elements
pub fn progressive_mesh<V, T>(
    collapse_map: &mut [u32],
    permutation: &mut [u32],
    vertices: &[V],
    indices: &[T],
) -> Result<(), Error>
where
    V: Position,
    T: IndexType,
{
    reduce(collapse_map, permutation, vertices, indices, LinearSearch)
}

/// Same as [progressive_mesh], but keeps candidates in a binary heap instead of scanning all vertices on each step.
///
/// Results are identical to [progressive_mesh].
#[cfg(feature = "experimental")]
pub fn progressive_mesh_heap<V, T>(
    collapse_map: &mut [u32],
    permutation: &mut [u32],
    vertices: &[V],
    indices: &[T],
) -> Result<(), Error>
where
    V: Position,
    T: IndexType,
{
    reduce(collapse_map, permutation, vertices, indices, heap::HeapSearch::default())
}

fn reduce<V, T, S>(
    collapse_map: &mut [u32],
    permutation: &mut [u32],
    vertices: &[V],
    indices: &[T],
    mut search: S,
) -> Result<(), Error>
where
    V: Position,
    T: IndexType,
    S: CollapseSearch,
{
    let vertex_count = vertices.len();

    check_destination(collapse_map.len(), vertex_count)?;
    check_destination(permutation.len(), vertex_count)?;
    check_indices(indices, T::default(), vertex_count)?;

    let mut mesh = Mesh::new(vertices, indices)?;
    mesh.compute_all_edge_collapse_costs();

    let mut all: Vec<u32> = try_with_capacity(vertex_count)?;
    all.extend(0..vertex_count as u32);
    search.update(&mesh, &all)?;

    // collapse target of the vertex at each rank, in original vertex ids
    let mut targets = try_filled_vec(None, vertex_count)?;

    let mut rank = vertex_count;
    let mut merges = 0;

    while let Some(vertex) = search.next(&mesh) {
        debug_assert!(rank > 0);
        rank -= 1;

        let target = mesh.vertices[vertex as usize].collapse;

        trace!(
            "collapse {} -> {:?} (cost {}, rank {})",
            vertex,
            target,
            mesh.vertices[vertex as usize].cost,
            rank
        );

        permutation[vertex as usize] = rank as u32;
        targets[rank] = target;

        if target.is_some() {
            merges += 1;
        }

        let changed = mesh.collapse(vertex, target);
        search.update(&mesh, &changed)?;
    }

    debug_assert_eq!(rank, 0);

    for (map, target) in collapse_map[0..vertex_count].iter_mut().zip(&targets) {
        *map = match target {
            Some(t) => permutation[*t as usize],
            None => 0,
        };
    }

    debug!(
        "progressive mesh: {} vertices, {} triangles, {} merges",
        vertex_count,
        mesh.triangles.len(),
        merges
    );

    Ok(())
}

#[cfg(feature = "experimental")]
mod heap {
    use std::cmp::{Ordering, Reverse};
    use std::collections::BinaryHeap;

    use super::mesh::Mesh;
    use super::CollapseSearch;
    use crate::error::Error;

    struct Candidate {
        cost: f32,
        vertex: u32,
        stamp: u32,
    }

    impl PartialEq for Candidate {
        fn eq(&self, other: &Self) -> bool {
            self.cmp(other) == Ordering::Equal
        }
    }

    impl Eq for Candidate {}

    impl PartialOrd for Candidate {
        fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
            Some(self.cmp(other))
        }
    }

    impl Ord for Candidate {
        fn cmp(&self, other: &Self) -> Ordering {
            // vertex id as secondary key reproduces the scan order of the linear search
            self.cost
                .total_cmp(&other.cost)
                .then(self.vertex.cmp(&other.vertex))
                .then(self.stamp.cmp(&other.stamp))
        }
    }

    /// Min-heap of candidates; entries go stale when a vertex is collapsed or its cost is recomputed.
    #[derive(Default)]
    pub(super) struct HeapSearch {
        heap: BinaryHeap<Reverse<Candidate>>,
        stamps: Vec<u32>,
    }

    impl CollapseSearch for HeapSearch {
        fn next(&mut self, mesh: &Mesh) -> Option<u32> {
            while let Some(Reverse(candidate)) = self.heap.pop() {
                let vertex = &mesh.vertices[candidate.vertex as usize];

                if vertex.live && self.stamps[candidate.vertex as usize] == candidate.stamp {
                    return Some(candidate.vertex);
                }
            }

            None
        }

        fn update(&mut self, mesh: &Mesh, vertices: &[u32]) -> Result<(), Error> {
            if self.stamps.len() < mesh.vertices.len() {
                self.stamps.try_reserve_exact(mesh.vertices.len() - self.stamps.len())?;
                self.stamps.resize(mesh.vertices.len(), 0);
            }

            self.heap.try_reserve(vertices.len())?;

            for id in vertices {
                let vertex = &mesh.vertices[*id as usize];

                if !vertex.live {
                    continue;
                }

                let stamp = &mut self.stamps[*id as usize];
                *stamp = stamp.wrapping_add(1);

                self.heap.push(Reverse(Candidate {
                    cost: vertex.cost,
                    vertex: *id,
                    stamp: *stamp,
                }));
            }

            Ok(())
        }
    }
}
