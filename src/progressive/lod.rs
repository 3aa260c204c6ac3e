//! Index buffer extraction for a given level of detail

use log::debug;

use crate::error::{Error, InvalidInput, check_destination, check_triangles};
use crate::index::generator::{remap_index_buffer, remap_vertex_buffer};
use crate::index::{IndexType, check_indices};
use crate::util::try_with_capacity;

/// Reorders a vertex buffer and rewrites its index buffer according to a [progressive_mesh](super::progressive_mesh) permutation.
///
/// Both buffers are validated before either is modified.
///
/// # Arguments
///
/// * `permutation`: new position of every vertex, at least `vertices.len()` elements
pub fn permute_mesh<Vertex, T>(vertices: &mut [Vertex], indices: &mut [T], permutation: &[u32]) -> Result<(), Error>
where
    Vertex: Copy,
    T: IndexType,
{
    check_destination(permutation.len(), vertices.len())?;

    let permutation = &permutation[0..vertices.len()];

    if let Some(p) = permutation.iter().find(|p| **p as usize >= vertices.len()) {
        return Err(InvalidInput::VertexOutOfRange {
            index: *p,
            base: 0,
            vertex_count: vertices.len(),
        }
        .into());
    }

    let mut source: Vec<Vertex> = try_with_capacity(vertices.len())?;
    source.extend_from_slice(vertices);

    remap_index_buffer(indices, permutation)?;
    remap_vertex_buffer(vertices, &source, permutation)?;

    Ok(())
}

/// Generates the index buffer of a permuted mesh rendered with its first `vertex_count` vertices and returns the number of indices written.
///
/// Every index referencing a removed vertex is replaced by following `collapse_map` until a kept vertex is found;
/// triangles which end up with a repeated vertex are dropped. Triangle order and winding of the remaining triangles is kept.
/// Rendering with no vertices produces no triangles.
///
/// # Arguments
///
/// * `destination`: must contain enough space for the resulting index buffer (`indices.len()` elements)
/// * `indices`: index buffer already rewritten with [permute_mesh]
/// * `collapse_map`: as returned by [progressive_mesh](super::progressive_mesh)
/// * `vertex_count`: number of vertices to keep; values above the mesh vertex count keep all of them
pub fn generate_lod_index_buffer<T: IndexType>(
    destination: &mut [T],
    indices: &[T],
    collapse_map: &[u32],
    vertex_count: usize,
) -> Result<usize, Error> {
    check_triangles(indices)?;
    check_destination(destination.len(), indices.len())?;
    check_indices(indices, T::default(), collapse_map.len())?;

    // every chain has to end below the level it started from
    for (rank, target) in collapse_map.iter().enumerate().skip(1) {
        if *target as usize >= rank {
            return Err(InvalidInput::InvalidCollapseMap { rank, target: *target }.into());
        }
    }

    let level = vertex_count.min(collapse_map.len()) as u32;

    if level == 0 {
        return Ok(0);
    }

    let mut write = 0;

    for abc in indices.chunks_exact(3) {
        let mut triangle = [0u32; 3];

        for (resolved, index) in triangle.iter_mut().zip(abc) {
            let mut i = index.to_u32();

            while i >= level {
                i = collapse_map[i as usize];
            }

            *resolved = i;
        }

        let [a, b, c] = triangle;

        if a != b && a != c && b != c {
            destination[write + 0] = T::from_u32(a);
            destination[write + 1] = T::from_u32(b);
            destination[write + 2] = T::from_u32(c);
            write += 3;
        }
    }

    debug!(
        "lod: {} of {} vertices, {} of {} triangles",
        level,
        collapse_map.len(),
        write / 3,
        indices.len() / 3
    );

    Ok(write)
}

/// Maps a detail level in `[0, 1]` to the number of vertices to render.
///
/// Detail falls off quadratically, so the coarse end of the range gets finer control.
pub fn lod_vertex_count(total_vertices: usize, level: f32) -> usize {
    let t = level.clamp(0.0, 1.0) as f64;

    (t * t * total_vertices as f64) as usize
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::progressive::progressive_mesh;
    use crate::progressive::test::sphere;
    use crate::vertex::cache::{DEFAULT_CACHE_SIZE, analyze_vertex_cache, optimize_vertex_cache};

    // strip from the reducer tests, after permute_mesh
    const STRIP_INDICES: [u32; 12] = [5, 2, 4, 4, 2, 1, 4, 1, 3, 3, 1, 0];
    const STRIP_MAP: [u32; 6] = [0, 0, 1, 0, 3, 2];

    fn lod(vertex_count: usize) -> Vec<u32> {
        let mut destination = [0u32; 12];
        let count = generate_lod_index_buffer(&mut destination, &STRIP_INDICES, &STRIP_MAP, vertex_count).unwrap();

        destination[0..count].to_vec()
    }

    #[test]
    fn test_permute_mesh() {
        let mut vertices = [10, 11, 12, 13, 14, 15];
        let mut indices: [u16; 12] = [0, 3, 1, 1, 3, 4, 1, 4, 2, 2, 4, 5];

        permute_mesh(&mut vertices, &mut indices, &[5, 4, 3, 2, 1, 0]).unwrap();

        assert_eq!(vertices, [15, 14, 13, 12, 11, 10]);
        assert_eq!(indices, [5, 2, 4, 4, 2, 1, 4, 1, 3, 3, 1, 0]);
    }

    #[test]
    fn test_permute_mesh_invalid() {
        let mut vertices = [10, 11, 12];
        let mut indices = [0u32, 1, 2];

        assert!(permute_mesh(&mut vertices, &mut indices, &[0, 1]).is_err());
        assert!(permute_mesh(&mut vertices, &mut indices, &[0, 1, 3]).is_err());

        let mut indices = [0u32, 1, 5];
        assert!(permute_mesh(&mut vertices, &mut indices, &[2, 1, 0]).is_err());

        assert_eq!(vertices, [10, 11, 12]);
        assert_eq!(indices, [0, 1, 5]);
    }

    #[test]
    fn test_strip_levels() {
        assert!(lod(0).is_empty());
        assert!(lod(1).is_empty());
        assert!(lod(2).is_empty());
        assert_eq!(lod(3), [0, 2, 1]);
        assert_eq!(lod(4), [3, 2, 1, 3, 1, 0]);
        assert_eq!(lod(5), [4, 2, 1, 4, 1, 3, 3, 1, 0]);
        assert_eq!(lod(6), STRIP_INDICES);
        assert_eq!(lod(100), STRIP_INDICES);
    }

    #[test]
    fn test_invalid_collapse_map() {
        let mut destination = [0u32; 12];

        assert_eq!(
            generate_lod_index_buffer(&mut destination, &STRIP_INDICES, &[0, 0, 2, 0, 3, 2], 3),
            Err(Error::InvalidInput(InvalidInput::InvalidCollapseMap { rank: 2, target: 2 }))
        );
        assert!(matches!(
            generate_lod_index_buffer(&mut destination, &STRIP_INDICES, &STRIP_MAP[0..5], 3),
            Err(Error::InvalidInput(InvalidInput::VertexOutOfRange { index: 5, .. }))
        ));
        assert!(matches!(
            generate_lod_index_buffer(&mut destination[0..6], &STRIP_INDICES, &STRIP_MAP, 3),
            Err(Error::InvalidInput(InvalidInput::DestinationTooSmall { .. }))
        ));
    }

    #[test]
    fn test_lod_vertex_count() {
        assert_eq!(lod_vertex_count(100, 0.0), 0);
        assert_eq!(lod_vertex_count(100, 0.5), 25);
        assert_eq!(lod_vertex_count(100, 1.0), 100);
        assert_eq!(lod_vertex_count(100, 2.0), 100);
        assert_eq!(lod_vertex_count(100, -1.0), 0);
    }

    #[test]
    fn test_pipeline() {
        let _ = env_logger::builder().is_test(true).try_init();

        let (mut vertices, mut indices) = sphere(3);
        let triangle_count = indices.len() / 3;

        let mut collapse_map = vec![0; vertices.len()];
        let mut permutation = vec![0; vertices.len()];
        progressive_mesh(&mut collapse_map, &mut permutation, &vertices, &indices).unwrap();

        permute_mesh(&mut vertices, &mut indices, &permutation).unwrap();

        let mut lod_indices = vec![0; indices.len()];
        let mut optimized = vec![0; indices.len()];
        let mut previous = 0;

        for level in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let k = lod_vertex_count(vertices.len(), level);
            let count = generate_lod_index_buffer(&mut lod_indices, &indices, &collapse_map, k).unwrap();

            // every triangle kept at a coarser level is kept at a finer one
            assert!(count >= previous);
            previous = count;

            let lod_indices = &lod_indices[0..count];
            assert!(lod_indices.iter().all(|i| (*i as usize) < k));

            if count == 0 {
                continue;
            }

            let optimized = &mut optimized[0..count];
            optimize_vertex_cache(optimized, lod_indices, k, 0, DEFAULT_CACHE_SIZE).unwrap();

            let mut expected: Vec<&[u32]> = lod_indices.chunks_exact(3).collect();
            let mut actual: Vec<&[u32]> = optimized.chunks_exact(3).collect();
            expected.sort_unstable();
            actual.sort_unstable();
            assert_eq!(expected, actual);

            let statistics = analyze_vertex_cache(optimized, k, 16, 0, 0).unwrap();
            assert!(statistics.acmr < 1.0);
        }

        // the full level is the original mesh
        assert_eq!(previous / 3, triangle_count);
    }
}
