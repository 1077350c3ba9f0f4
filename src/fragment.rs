//! Loading of the `points_m_n.bin` fragments a point cloud is split into.
//!
//! A fragment holds a compressed point count followed by that many records of three
//! big-endian `f32` coordinates and three color bytes.

use crate::codec::{
    read_big_endian_f32, read_compressed_int, read_u8, write_big_endian_f32,
    write_compressed_int, CodecError,
};
use crate::error::{ErrorCode, ImportError};
use crate::point::{Point, POINT_RECORD_SIZE};
use crate::resource::{request_with_timeout, Method, ResourceClient, ResourceError};
use glam::{U8Vec3, Vec3};
use std::io::Cursor;
use std::time::Duration;
use thiserror::Error;

/// Upper bound on the point count a single fragment may declare.
pub const MAX_POINTS_PER_FRAGMENT: u32 = 1 << 24;

/// Upper bound on the number of fragments a single point cloud may be split into.
pub const MAX_FRAGMENTS_PER_CLOUD: u32 = 1 << 16;

/// Whether a cloud declaring `bin_file_count` fragments and `number_of_points` points could
/// be loaded at all.
pub fn is_loadable_layout(bin_file_count: u32, number_of_points: u32) -> bool {
    bin_file_count <= MAX_FRAGMENTS_PER_CLOUD
        && u64::from(number_of_points)
            <= u64::from(bin_file_count) * u64::from(MAX_POINTS_PER_FRAGMENT)
}

#[derive(Error, Debug)]
pub enum FragmentError {
    #[error("Resource error: {0}")]
    Fetch(#[from] ResourceError),

    #[error("Invalid binary data: {0}")]
    Codec(#[from] CodecError),

    #[error("Fragment declares {count} points, more than the {limit} allowed")]
    TooManyPoints { count: u32, limit: u32 },

    #[error("{0} unexpected bytes after the last point")]
    TrailingBytes(usize),
}

impl FragmentError {
    pub fn code(&self) -> ErrorCode {
        match self {
            FragmentError::Fetch(_) => ErrorCode::ReadingBinData,
            FragmentError::Codec(error) if error.is_truncation() => ErrorCode::ReadingBinData,
            FragmentError::Codec(_)
            | FragmentError::TooManyPoints { .. }
            | FragmentError::TrailingBytes(_) => ErrorCode::BinDataFormat,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FragmentRequest {
    pub coordinate_system: i32,
    pub index: u32,
    pub url: String,
}

impl FragmentRequest {
    pub fn new(collection_root: &str, coordinate_system: i32, index: u32) -> Self {
        Self {
            coordinate_system,
            index,
            url: fragment_url(collection_root, coordinate_system, index),
        }
    }

    pub fn file_name(&self) -> String {
        fragment_file_name(self.coordinate_system, self.index)
    }
}

pub fn fragment_file_name(coordinate_system: i32, index: u32) -> String {
    format!("points_{coordinate_system}_{index}.bin")
}

pub fn fragment_url(collection_root: &str, coordinate_system: i32, index: u32) -> String {
    let separator = if collection_root.is_empty() || collection_root.ends_with('/') {
        ""
    } else {
        "/"
    };
    format!(
        "{collection_root}{separator}{}",
        fragment_file_name(coordinate_system, index)
    )
}

/// One request per fragment of a coordinate system's cloud.
pub fn fragment_requests(
    collection_root: &str,
    coordinate_system: i32,
    bin_file_count: u32,
) -> impl Iterator<Item = FragmentRequest> + '_ {
    (0..bin_file_count).map(move |index| FragmentRequest::new(collection_root, coordinate_system, index))
}

pub fn decode_fragment(bytes: &[u8]) -> Result<Vec<Point>, FragmentError> {
    let mut cursor = Cursor::new(bytes);
    let count = read_compressed_int(&mut cursor)?;
    if count > MAX_POINTS_PER_FRAGMENT {
        return Err(FragmentError::TooManyPoints {
            count,
            limit: MAX_POINTS_PER_FRAGMENT,
        });
    }

    let available = (bytes.len() - cursor.position() as usize) / POINT_RECORD_SIZE;
    let mut points = Vec::with_capacity((count as usize).min(available));

    for _ in 0..count {
        let x = read_big_endian_f32(&mut cursor)?;
        let y = read_big_endian_f32(&mut cursor)?;
        let z = read_big_endian_f32(&mut cursor)?;
        let r = read_u8(&mut cursor)?;
        let g = read_u8(&mut cursor)?;
        let b = read_u8(&mut cursor)?;
        points.push(Point::new(Vec3::new(x, y, z), U8Vec3::new(r, g, b)));
    }

    let trailing = bytes.len() - cursor.position() as usize;
    if trailing != 0 {
        return Err(FragmentError::TrailingBytes(trailing));
    }

    Ok(points)
}

/// Encodes points in the fragment format, e.g. to mirror a collection or build fixtures.
pub fn encode_fragment(points: &[Point]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(points.len() * POINT_RECORD_SIZE + 5);
    // writes into a Vec cannot fail
    let _ = write_compressed_int(&mut buf, points.len() as u32);
    for point in points {
        for coordinate in point.position.to_array() {
            let _ = write_big_endian_f32(&mut buf, coordinate);
        }
        buf.extend_from_slice(&point.color.to_array());
    }
    buf
}

/// Fetches and decodes one fragment.
pub async fn load_fragment<C: ResourceClient + ?Sized>(
    client: &C,
    request: &FragmentRequest,
    timeout: Option<Duration>,
) -> Result<Vec<Point>, ImportError> {
    let fragment_error = |source: FragmentError| ImportError::Fragment {
        url: request.url.clone(),
        source,
    };

    let bytes = request_with_timeout(client, &request.url, Method::Get, None, None, timeout)
        .await
        .map_err(|error| fragment_error(error.into()))?;

    decode_fragment(&bytes).map_err(fragment_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_points() -> Vec<Point> {
        vec![
            Point::new(Vec3::new(1.0, -2.5, 3.25), U8Vec3::new(255, 0, 12)),
            Point::new(Vec3::new(f32::MIN_POSITIVE, 0.0, -0.0), U8Vec3::new(1, 2, 3)),
            Point::new(Vec3::new(1e10, -1e-10, 42.0), U8Vec3::new(128, 64, 32)),
        ]
    }

    #[test]
    fn decodes_encoded_points_bit_exact() {
        let points = sample_points();
        let bytes = encode_fragment(&points);
        assert_eq!(bytes.len(), 1 + points.len() * POINT_RECORD_SIZE);

        let decoded = decode_fragment(&bytes).unwrap();
        assert_eq!(decoded.len(), points.len());
        for (a, b) in decoded.iter().zip(&points) {
            assert_eq!(a.position.to_array().map(f32::to_bits), b.position.to_array().map(f32::to_bits));
            assert_eq!(a.color, b.color);
        }

        assert_eq!(encode_fragment(&decoded), bytes);
    }

    #[test]
    fn decodes_handwritten_record() {
        let bytes = [0x01, 0x3f, 0x80, 0x00, 0x00, 0x40, 0x00, 0x00, 0x00, 0xc0, 0x40, 0x00, 0x00, 10, 20, 30];
        let points = decode_fragment(&bytes).unwrap();
        assert_eq!(points, vec![Point::new(Vec3::new(1.0, 2.0, -3.0), U8Vec3::new(10, 20, 30))]);
    }

    #[test]
    fn empty_fragment() {
        assert!(decode_fragment(&[0x00]).unwrap().is_empty());
    }

    #[test]
    fn truncated_fragment_is_a_read_error() {
        let mut bytes = encode_fragment(&sample_points());
        bytes.truncate(bytes.len() - 2);
        let err = decode_fragment(&bytes).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ReadingBinData);

        let err = decode_fragment(&[]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ReadingBinData);
    }

    #[test]
    fn malformed_fragments_are_format_errors() {
        let err = decode_fragment(&[0xff; 8]).unwrap_err();
        assert!(matches!(err, FragmentError::Codec(CodecError::Overflow)));
        assert_eq!(err.code(), ErrorCode::BinDataFormat);

        let mut huge = Vec::new();
        write_compressed_int(&mut huge, MAX_POINTS_PER_FRAGMENT + 1).unwrap();
        let err = decode_fragment(&huge).unwrap_err();
        assert!(matches!(err, FragmentError::TooManyPoints { .. }));
        assert_eq!(err.code(), ErrorCode::BinDataFormat);

        let mut trailing = encode_fragment(&sample_points());
        trailing.push(0);
        let err = decode_fragment(&trailing).unwrap_err();
        assert!(matches!(err, FragmentError::TrailingBytes(1)));
        assert_eq!(err.code(), ErrorCode::BinDataFormat);
    }

    #[test]
    fn loadable_layouts() {
        assert!(is_loadable_layout(0, 0));
        assert!(is_loadable_layout(3, 0));
        assert!(is_loadable_layout(1, MAX_POINTS_PER_FRAGMENT));
        assert!(is_loadable_layout(256, u32::MAX));

        assert!(!is_loadable_layout(0, 1));
        assert!(!is_loadable_layout(1, u32::MAX));
        assert!(!is_loadable_layout(MAX_FRAGMENTS_PER_CLOUD + 1, 10));
        assert!(!is_loadable_layout(u32::MAX, u32::MAX));
    }

    #[test]
    fn fragment_urls() {
        assert_eq!(fragment_url("http://x/root/", 2, 5), "http://x/root/points_2_5.bin");
        assert_eq!(fragment_url("http://x/root", 0, 0), "http://x/root/points_0_0.bin");

        let requests: Vec<_> = fragment_requests("http://x/", 1, 3).collect();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[2].url, "http://x/points_1_2.bin");
        assert_eq!(requests[2].file_name(), "points_1_2.bin");
    }
}
