//! Vertex transform cache analysis and optimization

// This work is based on:
// Tom Forsyth. Linear-Speed Vertex Cache Optimisation. 2006

use log::debug;

use crate::error::{Error, InvalidInput, check_destination};
use crate::index::{IndexType, check_indices};
use crate::util::{try_filled_vec, try_with_capacity};

/// Largest supported simulated cache size for [optimize_vertex_cache].
pub const MAX_CACHE_SIZE: usize = 64;

/// Reasonable cache size for [optimize_vertex_cache] on current GPUs.
pub const DEFAULT_CACHE_SIZE: u16 = 32;

#[derive(Default, Debug)]
pub struct VertexCacheStatistics {
    pub vertices_transformed: u32,
    pub warps_executed: u32,
    /// Transformed vertices / triangle count
    ///
    /// Best case 0.5, worst case 3.0, optimum depends on topology
    pub acmr: f32,
    /// Transformed vertices / vertex count
    ///
    /// Best case 1.0, worst case 6.0, optimum is 1.0 (each vertex is transformed once)
    pub atvr: f32,
}

/// Returns cache hit statistics using a simplified FIFO model.
///
/// Results may not match actual GPU performance.
///
/// # Arguments
///
/// * `cache_size`: FIFO size, at least 3
/// * `warp_size`: vertices per warp, `0` disables warp flushing
/// * `primgroup_size`: triangles per primitive group, `0` disables primitive group flushing
pub fn analyze_vertex_cache<T: IndexType>(
    indices: &[T],
    vertex_count: usize,
    cache_size: usize,
    warp_size: usize,
    primgroup_size: usize,
) -> Result<VertexCacheStatistics, Error> {
    check_indices(indices, T::default(), vertex_count)?;

    if cache_size < 3 || cache_size > u32::MAX as usize {
        return Err(InvalidInput::CacheSizeOutOfRange {
            size: cache_size,
            min: 3,
            max: u32::MAX as usize,
        }
        .into());
    }

    if warp_size != 0 && warp_size < 3 {
        return Err(InvalidInput::WarpSizeTooSmall(warp_size).into());
    }

    let mut result = VertexCacheStatistics::default();

    let mut warp_offset = 0;
    let mut primgroup_offset = 0;

    // nothing is ever evicted from a cache holding every vertex, so larger sizes behave the same
    let cache_size = cache_size.min(vertex_count.max(3));

    let mut cache_timestamps: Vec<usize> = try_filled_vec(0, vertex_count)?;

    let mut timestamp = cache_size + 1;

    for abc in indices.chunks_exact(3) {
        let (a, b, c) = (abc[0].to_usize(), abc[1].to_usize(), abc[2].to_usize());

        let ac = ((timestamp - cache_timestamps[a]) > cache_size) as usize;
        let bc = ((timestamp - cache_timestamps[b]) > cache_size) as usize;
        let cc = ((timestamp - cache_timestamps[c]) > cache_size) as usize;

        // flush cache if triangle doesn't fit into warp or into the primitive buffer
        if (primgroup_size > 0 && primgroup_offset == primgroup_size)
            || (warp_size > 0 && warp_offset + ac + bc + cc > warp_size)
        {
            result.warps_executed += (warp_offset > 0) as u32;

            warp_offset = 0;
            primgroup_offset = 0;

            // reset cache
            timestamp += cache_size + 1;
        }

        // update cache and add vertices to warp
        for index in [a, b, c] {
            if timestamp - cache_timestamps[index] > cache_size {
                cache_timestamps[index] = timestamp;
                timestamp += 1;
                result.vertices_transformed += 1;
                warp_offset += 1;
            }
        }

        primgroup_offset += 1;
    }

    let unique_vertex_count = cache_timestamps.iter().filter(|t| **t > 0).count();

    result.warps_executed += (warp_offset > 0) as u32;

    result.acmr = if indices.is_empty() {
        0.0
    } else {
        result.vertices_transformed as f32 / (indices.len() as f32 / 3.0)
    };
    result.atvr = if unique_vertex_count == 0 {
        0.0
    } else {
        result.vertices_transformed as f32 / unique_vertex_count as f32
    };

    Ok(result)
}

const MAX_PRECOMPUTED_VALENCE: usize = 64;

const CACHE_DECAY_POWER: f32 = 1.5;
const LAST_TRIANGLE_SCORE: f32 = 0.75;
const VALENCE_BOOST_SCALE: f32 = 2.0;
const VALENCE_BOOST_POWER: f32 = 0.5;

/// Cache position of a vertex which is not in the simulated cache.
const EVICTED_CACHE_INDEX: u16 = u16::MAX;

fn compute_cache_score(cache_position: usize, cache_size: usize) -> f32 {
    if cache_position < 3 {
        // the last triangle's vertices share one score, otherwise adding 1,2,3 or 3,1,2 would give different answers
        LAST_TRIANGLE_SCORE
    } else {
        debug_assert!(cache_position < cache_size);

        let scaler = 1.0 / (cache_size - 3) as f32;
        let score = 1.0 - (cache_position - 3) as f32 * scaler;

        score.powf(CACHE_DECAY_POWER)
    }
}

// bonus points for having few triangles left, so lone vertices get finished quickly
fn compute_valence_score(active_faces: u32) -> f32 {
    VALENCE_BOOST_SCALE * (active_faces as f32).powf(-VALENCE_BOOST_POWER)
}

/// Vertex scores for one cache size, computed once per optimization call.
struct VertexScoreTable {
    cache_size: usize,
    cache: [f32; MAX_CACHE_SIZE],
    valence: [f32; MAX_PRECOMPUTED_VALENCE],
}

impl VertexScoreTable {
    fn new(cache_size: usize) -> Self {
        debug_assert!(cache_size <= MAX_CACHE_SIZE);

        let mut cache = [0.0; MAX_CACHE_SIZE];
        for (position, score) in cache.iter_mut().enumerate().take(cache_size) {
            *score = compute_cache_score(position, cache_size);
        }

        let mut valence = [0.0; MAX_PRECOMPUTED_VALENCE];
        for (active_faces, score) in valence.iter_mut().enumerate() {
            *score = compute_valence_score(active_faces as u32);
        }

        Self {
            cache_size,
            cache,
            valence,
        }
    }

    fn score(&self, active_faces: u32, cache_position: u16) -> f32 {
        if active_faces == 0 {
            // no triangle needs this vertex
            return -1.0;
        }

        let mut score = 0.0;

        if (cache_position as usize) < self.cache_size {
            score += self.cache[cache_position as usize];
        }

        score += match self.valence.get(active_faces as usize) {
            Some(precomputed) => *precomputed,
            None => compute_valence_score(active_faces),
        };

        score
    }
}

#[derive(Clone)]
struct OptimizeVertexData {
    score: f32,
    active_face_list_start: u32,
    active_face_list_size: u32,
    cache_pos0: u16,
    cache_pos1: u16,
}

impl Default for OptimizeVertexData {
    fn default() -> Self {
        Self {
            score: 0.0,
            active_face_list_start: 0,
            active_face_list_size: 0,
            cache_pos0: EVICTED_CACHE_INDEX,
            cache_pos1: EVICTED_CACHE_INDEX,
        }
    }
}

fn face_score(vertex_data: &[OptimizeVertexData], abc: &[u32]) -> f32 {
    abc.iter().fold(0.0, |score, index| score + vertex_data[*index as usize].score)
}

/// Reorders triangles to reduce the number of GPU vertex shader invocations, using a simulated LRU cache.
///
/// The result is a permutation of the input triangles; the vertex order inside every triangle is kept as is,
/// so winding is preserved. Ties between equally scored triangles are resolved in favour of the earliest triangle
/// in input order, which makes the output fully deterministic.
///
/// If index buffer contains multiple ranges for multiple draw calls, this functions needs to be called on each range individually;
/// `vertex_base_index` is subtracted from every index of the range, so that `vertex_count` only needs to cover the vertices it uses.
///
/// # Arguments
///
/// * `destination`: must contain enough space for the resulting index buffer (`indices.len()` elements)
/// * `vertex_count`: number of vertices addressed by `indices`, starting at `vertex_base_index`
/// * `lru_cache_size`: size of the simulated post-transform cache, at most [MAX_CACHE_SIZE]
pub fn optimize_vertex_cache<T: IndexType>(
    destination: &mut [T],
    indices: &[T],
    vertex_count: usize,
    vertex_base_index: T,
    lru_cache_size: u16,
) -> Result<(), Error> {
    check_indices(indices, vertex_base_index, vertex_count)?;
    check_destination(destination.len(), indices.len())?;

    let cache_size = lru_cache_size as usize;

    if cache_size > MAX_CACHE_SIZE {
        return Err(InvalidInput::CacheSizeOutOfRange {
            size: cache_size,
            min: 0,
            max: MAX_CACHE_SIZE,
        }
        .into());
    }

    // guard for empty meshes
    if indices.is_empty() {
        return Ok(());
    }

    let face_count = indices.len() / 3;
    let table = VertexScoreTable::new(cache_size);

    let base = vertex_base_index.to_u32();
    let mut local_indices = try_with_capacity(indices.len())?;
    local_indices.extend(indices.iter().map(|index| index.to_u32() - base));

    let mut vertex_data = try_filled_vec(OptimizeVertexData::default(), vertex_count)?;

    // compute face count per vertex
    for index in &local_indices {
        vertex_data[*index as usize].active_face_list_size += 1;
    }

    // allocate face list per vertex
    let mut active_face_list_length = 0;

    for data in vertex_data.iter_mut() {
        data.active_face_list_start = active_face_list_length;
        active_face_list_length += data.active_face_list_size;
        data.score = table.score(data.active_face_list_size, EVICTED_CACHE_INDEX);
        data.active_face_list_size = 0;
    }

    let mut active_face_list = try_filled_vec(0u32, active_face_list_length as usize)?;

    // fill out face list per vertex
    for (face, abc) in local_indices.chunks_exact(3).enumerate() {
        for index in abc {
            let data = &mut vertex_data[*index as usize];
            active_face_list[(data.active_face_list_start + data.active_face_list_size) as usize] = face as u32;
            data.active_face_list_size += 1;
        }
    }

    let mut processed_faces = try_filled_vec(false, face_count)?;

    let mut cache_holder = [0u32; 2 * (MAX_CACHE_SIZE + 3)];
    let (mut cache0, mut cache1) = cache_holder.split_at_mut(MAX_CACHE_SIZE + 3);
    let mut entries_in_cache0 = 0;

    let mut best_face = 0;
    let mut best_score = -1.0;

    let max_valence_score = table.score(1, EVICTED_CACHE_INDEX) * 3.0;

    let mut full_scans = 0;

    for output in destination[0..indices.len()].chunks_exact_mut(3) {
        if best_score < 0.0 {
            // no vertex in the cache is used by an unprocessed face, so search all unprocessed faces for a new starting point
            full_scans += 1;

            for (face, abc) in local_indices.chunks_exact(3).enumerate() {
                if processed_faces[face] {
                    continue;
                }

                debug_assert!(abc.iter().all(|i| vertex_data[*i as usize].active_face_list_size > 0));

                let score = face_score(&vertex_data, abc);

                if score > best_score {
                    best_score = score;
                    best_face = face;

                    debug_assert!(best_score <= max_valence_score);

                    if best_score >= max_valence_score {
                        break;
                    }
                }
            }

            debug_assert!(best_score >= 0.0);
        }

        processed_faces[best_face] = true;
        let mut entries_in_cache1 = 0;

        // add best face to LRU cache and to the output
        output.copy_from_slice(&indices[best_face * 3..best_face * 3 + 3]);

        for index in &local_indices[best_face * 3..best_face * 3 + 3] {
            let data = &mut vertex_data[*index as usize];

            if data.cache_pos1 as usize >= entries_in_cache1 {
                data.cache_pos1 = entries_in_cache1 as u16;
                cache1[entries_in_cache1] = *index;
                entries_in_cache1 += 1;
            }

            // unordered removal of the face from the pending range
            debug_assert!(data.active_face_list_size > 0);

            let start = data.active_face_list_start as usize;
            let faces = &mut active_face_list[start..start + data.active_face_list_size as usize];

            if let Some(position) = faces.iter().position(|f| *f as usize == best_face) {
                let last = faces.len() - 1;
                faces.swap(position, last);
            } else {
                debug_assert!(false, "face {} missing from the active list of vertex {}", best_face, index);
            }

            data.active_face_list_size -= 1;
            data.score = table.score(data.active_face_list_size, data.cache_pos1);
        }

        // move the rest of the old vertices in the cache down and compute their new scores
        for index in &cache0[0..entries_in_cache0] {
            let data = &mut vertex_data[*index as usize];

            if data.cache_pos1 as usize >= entries_in_cache1 {
                data.cache_pos1 = entries_in_cache1 as u16;
                cache1[entries_in_cache1] = *index;
                entries_in_cache1 += 1;
                data.score = table.score(data.active_face_list_size, data.cache_pos1);
            }
        }

        // find the best scoring triangle in the current cache (including up to 3 that were just evicted)
        best_score = -1.0;

        for index in &cache1[0..entries_in_cache1] {
            let (start, size) = {
                let data = &mut vertex_data[*index as usize];
                data.cache_pos0 = data.cache_pos1;
                data.cache_pos1 = EVICTED_CACHE_INDEX;

                (data.active_face_list_start as usize, data.active_face_list_size as usize)
            };

            for face in &active_face_list[start..start + size] {
                let face = *face as usize;
                let score = face_score(&vertex_data, &local_indices[face * 3..face * 3 + 3]);

                if score > best_score {
                    best_score = score;
                    best_face = face;
                }
            }
        }

        std::mem::swap(&mut cache0, &mut cache1);
        entries_in_cache0 = entries_in_cache1.min(cache_size);
    }

    debug!(
        "vertex cache optimization: {} triangles, {} vertices, cache size {}, {} full rescans",
        face_count, vertex_count, cache_size, full_scans
    );

    Ok(())
}
