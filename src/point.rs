use glam::{U8Vec3, Vec3};

/// Byte size of one encoded point record: three big-endian `f32` and three color bytes.
pub const POINT_RECORD_SIZE: usize = 3 * 4 + 3;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub position: Vec3,
    pub color: U8Vec3,
}

impl Point {
    pub fn new(position: Vec3, color: U8Vec3) -> Self {
        Self { position, color }
    }
}
