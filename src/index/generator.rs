//! Vertex welding and index/vertex buffer remapping

use crate::error::{Error, InvalidInput, check_destination, check_triangles};
use crate::util::try_filled_vec;
use crate::{INVALID_INDEX, Stream};

use super::IndexType;

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::hash::{BuildHasherDefault, Hasher};

#[derive(Default)]
struct VertexHasher {
    state: u32,
}

impl Hasher for VertexHasher {
    fn write(&mut self, bytes: &[u8]) {
        // MurmurHash2
        const M: u32 = 0x5bd1e995;
        const R: u32 = 24;

        let mut h = self.state;

        let mut chunks = bytes.chunks_exact(4);

        for k4 in chunks.by_ref() {
            let mut k = u32::from_ne_bytes([k4[0], k4[1], k4[2], k4[3]]);

            k = k.wrapping_mul(M);
            k ^= k >> R;
            k = k.wrapping_mul(M);

            h = h.wrapping_mul(M);
            h ^= k;
        }

        // tail bytes only show up for odd-sized subsets
        for b in chunks.remainder() {
            h ^= *b as u32;
            h = h.wrapping_mul(M);
        }

        self.state = h;
    }

    fn finish(&self) -> u64 {
        self.state as u64
    }
}

type BuildVertexHasher = BuildHasherDefault<VertexHasher>;

/// Generates a vertex remap table from the vertex buffer and an optional index buffer and returns number of unique vertices.
///
/// As a result, all vertices that are binary equivalent map to the same (new) location, with no gaps in the resulting sequence.
/// Vertices which are not referenced by `indices` map to [INVALID_INDEX].
/// Resulting remap table maps old vertices to new vertices and can be used in [remap_vertex_buffer]/[remap_index_buffer].
///
/// Welding positions this way (using [Stream::from_slice_with_subset]) is required before progressive reduction,
/// since vertices split along attribute seams would otherwise be reduced as disconnected pieces.
///
/// Note that binary equivalence considers all `Stream::subset` bytes, including padding which should be zero-initialized.
/// Floats are compared by their bits as well: `0.0` and `-0.0` stay separate vertices, so signed zeros
/// should be canonicalized first when they need to be welded.
///
/// # Arguments
///
/// * `destination`: must contain enough space for the resulting remap table (`vertex_count` elements defined by `vertices`)
/// * `indices`: can be `None` if the input is unindexed
pub fn generate_vertex_remap<T: IndexType>(
    destination: &mut [u32],
    indices: Option<&[T]>,
    vertices: &Stream,
) -> Result<usize, Error> {
    let vertex_count = vertices.len();

    check_destination(destination.len(), vertex_count)?;

    let index_count = match indices {
        Some(buffer) => {
            super::check_indices(buffer, T::default(), vertex_count)?;
            buffer.len()
        }
        None => {
            if !vertex_count.is_multiple_of(3) {
                return Err(InvalidInput::IndexCountNotMultipleOfThree(vertex_count).into());
            }
            vertex_count
        }
    };

    let mut table: HashMap<&[u8], u32, _> = HashMap::with_hasher(BuildVertexHasher::default());
    table.try_reserve(vertex_count)?;

    let destination = &mut destination[0..vertex_count];
    destination.fill(INVALID_INDEX);

    let mut next_vertex = 0;

    for i in 0..index_count {
        let index = match indices {
            Some(buffer) => buffer[i].to_usize(),
            None => i,
        };

        if destination[index] == INVALID_INDEX {
            match table.entry(vertices.get(index)) {
                Entry::Occupied(entry) => {
                    let value = *entry.get() as usize;
                    debug_assert!(destination[value] != INVALID_INDEX);
                    destination[index] = destination[value];
                }
                Entry::Vacant(entry) => {
                    entry.insert(index as u32);
                    destination[index] = next_vertex as u32;
                    next_vertex += 1;
                }
            }
        }
    }

    debug_assert!(next_vertex <= vertex_count);

    Ok(next_vertex)
}

/// Generates vertex buffer from the source vertex buffer and a remap table.
///
/// The remap table can come from [generate_vertex_remap] or be a progressive mesh permutation.
///
/// # Arguments
///
/// * `destination`: must contain enough space for the resulting vertex buffer (largest remapped index + 1 elements)
/// * `vertices`: should have the initial vertex count and not the value returned by [generate_vertex_remap]
pub fn remap_vertex_buffer<Vertex>(destination: &mut [Vertex], vertices: &[Vertex], remap: &[u32]) -> Result<(), Error>
where
    Vertex: Copy,
{
    check_destination(remap.len(), vertices.len())?;

    let required = remap[0..vertices.len()]
        .iter()
        .filter(|dst| **dst != INVALID_INDEX)
        .map(|dst| *dst as usize + 1)
        .max()
        .unwrap_or(0);
    check_destination(destination.len(), required)?;

    for (src, dst) in remap[0..vertices.len()].iter().enumerate() {
        if *dst != INVALID_INDEX {
            destination[*dst as usize] = vertices[src];
        }
    }

    Ok(())
}

/// Remaps indices in-place based on a remap table.
///
/// Fails without touching `indices` if any index has no entry in `remap` or maps to [INVALID_INDEX].
pub fn remap_index_buffer<T: IndexType>(indices: &mut [T], remap: &[u32]) -> Result<(), Error> {
    check_triangles(indices)?;

    for index in indices.iter() {
        let mapped = remap.get(index.to_usize()).copied().unwrap_or(INVALID_INDEX);

        if mapped == INVALID_INDEX || mapped > T::MAX.to_u32() {
            return Err(InvalidInput::VertexOutOfRange {
                index: index.to_u32(),
                base: 0,
                vertex_count: remap.len(),
            }
            .into());
        }
    }

    for v in indices {
        *v = T::from_u32(remap[v.to_usize()]);
    }

    Ok(())
}

/// Builds the inverse of a remap table: for each new vertex, the first old vertex mapping to it.
///
/// Returns a table of `unique_vertex_count` elements.
pub fn invert_remap(remap: &[u32], unique_vertex_count: usize) -> Result<Vec<u32>, Error> {
    let mut result = try_filled_vec(INVALID_INDEX, unique_vertex_count)?;

    for (old, new) in remap.iter().enumerate() {
        // INVALID_INDEX never passes the bounds check below
        let new = *new as usize;

        if new < unique_vertex_count && result[new] == INVALID_INDEX {
            result[new] = old as u32;
        }
    }

    Ok(result)
}
