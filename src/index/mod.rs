//! Index buffer element types and index buffer remapping

pub mod generator;

use std::fmt::Debug;
use std::hash::Hash;

use crate::error::InvalidInput;

/// Integer type usable as an index buffer element.
///
/// Implemented for `u16` and `u32`, so every function in this crate works directly on 16-bit and 32-bit index buffers.
pub trait IndexType: Copy + Default + Eq + Ord + Hash + Debug {
    /// Largest representable index.
    const MAX: Self;

    fn to_u32(self) -> u32;

    /// Converts back from the 32-bit working representation.
    ///
    /// Callers only pass values which originate from (or are bounded by) an index of the same width.
    fn from_u32(value: u32) -> Self;

    #[inline]
    fn to_usize(self) -> usize {
        self.to_u32() as usize
    }
}

impl IndexType for u16 {
    const MAX: Self = u16::MAX;

    #[inline]
    fn to_u32(self) -> u32 {
        self as u32
    }

    #[inline]
    fn from_u32(value: u32) -> Self {
        debug_assert!(value <= u16::MAX as u32);
        value as u16
    }
}

impl IndexType for u32 {
    const MAX: Self = u32::MAX;

    #[inline]
    fn to_u32(self) -> u32 {
        self
    }

    #[inline]
    fn from_u32(value: u32) -> Self {
        value
    }
}

/// Subtracts `base` from `index` and checks the result against `vertex_count`.
#[inline]
pub(crate) fn rebase<T: IndexType>(index: T, base: T, vertex_count: usize) -> Result<u32, InvalidInput> {
    let (index, base) = (index.to_u32(), base.to_u32());

    match index.checked_sub(base) {
        Some(local) if (local as usize) < vertex_count => Ok(local),
        _ => Err(InvalidInput::VertexOutOfRange {
            index,
            base,
            vertex_count,
        }),
    }
}

/// Validates a whole index buffer against `vertex_count` vertices starting at `base`.
pub(crate) fn check_indices<T: IndexType>(indices: &[T], base: T, vertex_count: usize) -> Result<(), InvalidInput> {
    crate::error::check_triangles(indices)?;

    for index in indices {
        rebase(*index, base, vertex_count)?;
    }

    Ok(())
}
