//! Vertex positions and vertex cache optimization

pub mod cache;

/// Gives the reducer access to the position of a vertex, whatever else the vertex carries.
///
/// The vertex stride is simply the size of the implementing type.
pub trait Position {
    fn pos(&self) -> [f32; 3];
}

impl Position for [f32; 3] {
    #[inline]
    fn pos(&self) -> [f32; 3] {
        *self
    }
}

/// Positions padded to 16 bytes, as commonly uploaded to GPU buffers; `w` is ignored.
impl Position for [f32; 4] {
    #[inline]
    fn pos(&self) -> [f32; 3] {
        [self[0], self[1], self[2]]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_padded_position() {
        assert_eq!([1.0f32, 2.0, 3.0, 1.0].pos(), [1.0, 2.0, 3.0]);
    }
}
