//! Error types shared by all mesh processing entry points

use std::collections::TryReserveError;

use thiserror::Error;

/// Errors returned by the optimization and reduction functions.
///
/// Every precondition is validated before any output is written, so an error never leaves a partially processed buffer behind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInput),

    #[error("out of memory while allocating scratch buffers")]
    OutOfMemory,
}

impl From<TryReserveError> for Error {
    fn from(_: TryReserveError) -> Self {
        Error::OutOfMemory
    }
}

/// Caller-side precondition violations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InvalidInput {
    #[error("index count {0} is not a multiple of 3")]
    IndexCountNotMultipleOfThree(usize),

    #[error("index {index} is out of range (base {base}, {vertex_count} vertices)")]
    VertexOutOfRange { index: u32, base: u32, vertex_count: usize },

    #[error("cache size {size} is outside of the supported range {min}..={max}")]
    CacheSizeOutOfRange { size: usize, min: usize, max: usize },

    #[error("warp size {0} can't hold a triangle")]
    WarpSizeTooSmall(usize),

    #[error("destination holds {actual} elements but {required} are required")]
    DestinationTooSmall { required: usize, actual: usize },

    #[error("collapse map entry {rank} points to {target}, which is not a lower rank")]
    InvalidCollapseMap { rank: usize, target: u32 },
}

/// Checks that an index buffer describes whole triangles.
pub(crate) fn check_triangles<T>(indices: &[T]) -> Result<(), InvalidInput> {
    if !indices.len().is_multiple_of(3) {
        return Err(InvalidInput::IndexCountNotMultipleOfThree(indices.len()));
    }

    Ok(())
}

pub(crate) fn check_destination(actual: usize, required: usize) -> Result<(), InvalidInput> {
    if actual < required {
        return Err(InvalidInput::DestinationTooSmall { required, actual });
    }

    Ok(())
}
