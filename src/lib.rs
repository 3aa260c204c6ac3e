//! meshlod-rs
//!
//! Triangle reordering for post-transform vertex cache efficiency and progressive mesh reduction for continuous LOD.
//!
//! # Features
//!
//! * `experimental`: Enables experimental APIs which have unstable interface and might have implementation that's not fully tested or optimized
//!   (currently the heap based `progressive::progressive_mesh_heap`)
//!
//! # Typical pipeline
//!
//! 1. weld vertices by position with [index::generator::generate_vertex_remap]
//! 2. compute the collapse order once with [progressive::progressive_mesh] and apply it with [progressive::lod::permute_mesh]
//! 3. per level, build an index buffer with [progressive::lod::generate_lod_index_buffer]
//!    and reorder it with [vertex::cache::optimize_vertex_cache]

#![allow(clippy::identity_op)]

pub mod error;
pub mod index;
pub mod progressive;
pub mod util;
pub mod vertex;

use std::ops::{Add, Range, Sub};

pub use crate::error::{Error, InvalidInput};

use crate::vertex::Position;

pub const INVALID_INDEX: u32 = u32::MAX;

/// A stream of value groups which are meant to be used together (e.g. 3 floats representing a vertex position).
pub struct Stream<'a> {
    data: &'a [u8],
    stride: usize,
    subset: Range<usize>,
}

impl<'a> Stream<'a> {
    /// Creates a stream from a slice.
    ///
    /// # Example
    ///
    /// ```
    /// use meshlod_rs::Stream;
    ///
    /// let positions = vec![[1.0, 2.0, 3.0], [2.0, 3.0, 4.0], [5.0, 6.0, 7.0]];
    /// let stream = Stream::from_slice(&positions);
    ///
    /// assert_eq!(stream.len(), positions.len());
    /// ```
    pub fn from_slice<T>(slice: &'a [T]) -> Self {
        let value_size = std::mem::size_of::<T>();

        Self::from_bytes(util::as_bytes(slice), value_size, 0..value_size)
    }

    /// Creates a stream from a slice, only looking at the given byte subset of each `T`.
    ///
    /// This is how positions are picked out of interleaved vertices before welding them for progressive reduction.
    ///
    /// # Example
    ///
    /// ```
    /// use meshlod_rs::Stream;
    ///
    /// #[derive(Clone, Default)]
    /// #[repr(C)]
    /// struct Vertex {
    ///     position: [f32; 3],
    ///     uv: [f32; 2],
    /// }
    ///
    /// let vertices = vec![Vertex::default(); 2];
    /// let positions = Stream::from_slice_with_subset(&vertices, 0..std::mem::size_of::<[f32; 3]>());
    ///
    /// assert_eq!(positions.len(), 2);
    /// ```
    pub fn from_slice_with_subset<T>(slice: &'a [T], subset: Range<usize>) -> Self {
        let value_size = std::mem::size_of::<T>();

        Self::from_bytes(util::as_bytes(slice), value_size, subset)
    }

    /// Creates a stream from raw data.
    ///
    /// # Arguments
    ///
    /// * `stride`: stride between value groups, in `T` units
    /// * `subset`: subset of data to use inside a value group, in `T` units
    pub fn from_bytes<T>(slice: &'a [T], stride: usize, subset: Range<usize>) -> Self {
        assert!(subset.end <= stride);

        let value_size = std::mem::size_of::<T>();

        let stride = stride * value_size;
        let subset = subset.start * value_size..subset.end * value_size;

        Self {
            data: util::as_bytes(slice),
            stride,
            subset,
        }
    }

    fn get(&self, index: usize) -> &'a [u8] {
        let i = index * self.stride;
        &self.data[i + self.subset.start..i + self.subset.end]
    }

    /// Returns length of the stream in value groups.
    pub fn len(&self) -> usize {
        self.data.len() / self.stride
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub(crate) struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub fn new(x: f32, y: f32, z: f32) -> Vector3 {
        Self { x, y, z }
    }

    pub fn from_position<P: Position + ?Sized>(p: &P) -> Vector3 {
        let [x, y, z] = p.pos();
        Self { x, y, z }
    }

    pub fn cross(&self, other: &Vector3) -> Vector3 {
        Vector3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn dot(&self, other: &Vector3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn length(&self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Normalizes in place and returns the original length.
    ///
    /// Zero vectors are left untouched, so degenerate triangles end up with a zero normal instead of NaNs.
    pub fn normalize(&mut self) -> f32 {
        let length = self.length();

        if length > 0.0 {
            let inv_length = 1.0 / length;

            self.x *= inv_length;
            self.y *= inv_length;
            self.z *= inv_length;
        }

        length
    }
}

impl Add for Vector3 {
    type Output = Vector3;

    fn add(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vector3 {
    type Output = Vector3;

    fn sub(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Position for Vector3 {
    fn pos(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_vector_ops() {
        let a = Vector3::new(1.0, 0.0, 0.0);
        let b = Vector3::new(0.0, 1.0, 0.0);

        assert_eq!(a.cross(&b), Vector3::new(0.0, 0.0, 1.0));
        assert_eq!(a.dot(&b), 0.0);
        assert_eq!(a + b - b, a);

        let mut c = Vector3::new(3.0, 0.0, 4.0);
        assert_eq!(c.normalize(), 5.0);
        assert_eq!(c, Vector3::new(0.6, 0.0, 0.8));
    }

    #[test]
    fn test_normalize_zero() {
        let mut v = Vector3::default();

        assert_eq!(v.normalize(), 0.0);
        assert_eq!(v, Vector3::default());
    }

    #[test]
    fn test_stream_subset() {
        let data = [[1.0f32, 2.0, 3.0, 4.0], [5.0, 6.0, 7.0, 8.0]];
        let stream = Stream::from_slice_with_subset(&data, 4..8);

        assert_eq!(stream.len(), 2);
        assert_eq!(stream.get(1), 6.0f32.to_ne_bytes());
    }
}
