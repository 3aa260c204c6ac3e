#![doc(hidden)]

use crate::error::Error;

pub(crate) fn as_bytes<T>(data: &[T]) -> &[u8] {
    unsafe { std::slice::from_raw_parts(data.as_ptr() as *const u8, std::mem::size_of_val(data)) }
}

/// Allocates a `Vec` filled with `value`, reporting allocation failure instead of aborting.
pub(crate) fn try_filled_vec<T: Clone>(value: T, len: usize) -> Result<Vec<T>, Error> {
    let mut result = Vec::new();
    result.try_reserve_exact(len)?;
    result.resize(len, value);

    Ok(result)
}

/// Allocates an empty `Vec` with room for `capacity` elements, reporting allocation failure instead of aborting.
pub(crate) fn try_with_capacity<T>(capacity: usize) -> Result<Vec<T>, Error> {
    let mut result = Vec::new();
    result.try_reserve_exact(capacity)?;

    Ok(result)
}
