//! Primitive readers (and matching writers) for the synth point fragment format.
//!
//! Compressed integers are stored most-significant group first, seven bits per byte. A byte
//! with its high bit set is followed by another byte; the first byte with a clear high bit
//! terminates the integer.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};
use thiserror::Error;

/// A compressed `u32` never needs more than five 7-bit groups.
pub const MAX_COMPRESSED_INT_BYTES: usize = 5;

const CONTINUATION_BIT: u8 = 0x80;
const PAYLOAD_MASK: u8 = 0x7f;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("unexpected end of stream")]
    Truncated,

    #[error("compressed integer does not fit in 32 bits")]
    Overflow,

    #[error("IO error: {0}")]
    Io(io::Error),
}

impl CodecError {
    /// Whether the stream ended early, as opposed to holding a malformed value.
    pub fn is_truncation(&self) -> bool {
        matches!(self, CodecError::Truncated | CodecError::Io(_))
    }
}

impl From<io::Error> for CodecError {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::UnexpectedEof => CodecError::Truncated,
            _ => CodecError::Io(error),
        }
    }
}

pub fn read_compressed_int<R: Read>(reader: &mut R) -> Result<u32, CodecError> {
    let mut value: u32 = 0;
    for _ in 0..MAX_COMPRESSED_INT_BYTES {
        let byte = reader.read_u8()?;
        if value > (u32::MAX >> 7) {
            return Err(CodecError::Overflow);
        }
        value = (value << 7) | u32::from(byte & PAYLOAD_MASK);
        if byte & CONTINUATION_BIT == 0 {
            return Ok(value);
        }
    }
    Err(CodecError::Overflow)
}

pub fn read_big_endian_f32<R: Read>(reader: &mut R) -> Result<f32, CodecError> {
    Ok(reader.read_f32::<BigEndian>()?)
}

pub fn read_big_endian_u16<R: Read>(reader: &mut R) -> Result<u16, CodecError> {
    Ok(reader.read_u16::<BigEndian>()?)
}

pub fn read_u8<R: Read>(reader: &mut R) -> Result<u8, CodecError> {
    Ok(reader.read_u8()?)
}

pub fn write_compressed_int<W: Write>(writer: &mut W, value: u32) -> io::Result<()> {
    let mut groups = [0u8; MAX_COMPRESSED_INT_BYTES];
    let mut len = 0;
    let mut rest = value;
    loop {
        groups[len] = (rest & u32::from(PAYLOAD_MASK)) as u8;
        len += 1;
        rest >>= 7;
        if rest == 0 {
            break;
        }
    }
    // groups were collected least significant first
    for i in (0..len).rev() {
        let byte = if i > 0 {
            groups[i] | CONTINUATION_BIT
        } else {
            groups[i]
        };
        writer.write_u8(byte)?;
    }
    Ok(())
}

pub fn write_big_endian_f32<W: Write>(writer: &mut W, value: f32) -> io::Result<()> {
    writer.write_f32::<BigEndian>(value)
}

pub fn write_big_endian_u16<W: Write>(writer: &mut W, value: u16) -> io::Result<()> {
    writer.write_u16::<BigEndian>(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode(value: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        write_compressed_int(&mut buf, value).unwrap();
        buf
    }

    #[test]
    fn compressed_int_boundaries() {
        let cases: [(u32, &[u8]); 5] = [
            (0, &[0x00]),
            (127, &[0x7f]),
            (128, &[0x81, 0x00]),
            (16383, &[0xff, 0x7f]),
            (16384, &[0x81, 0x80, 0x00]),
        ];
        for (value, bytes) in cases {
            assert_eq!(encode(value), bytes, "encoding {value}");
            let decoded = read_compressed_int(&mut Cursor::new(bytes)).unwrap();
            assert_eq!(decoded, value);
        }
    }

    #[test]
    fn compressed_int_max_value() {
        let bytes = encode(u32::MAX);
        assert_eq!(bytes.len(), MAX_COMPRESSED_INT_BYTES);
        assert_eq!(read_compressed_int(&mut Cursor::new(bytes)).unwrap(), u32::MAX);
    }

    #[test]
    fn compressed_int_stops_at_terminator() {
        let mut cursor = Cursor::new(vec![0x81, 0x00, 0x05]);
        assert_eq!(read_compressed_int(&mut cursor).unwrap(), 128);
        assert_eq!(read_compressed_int(&mut cursor).unwrap(), 5);
    }

    #[test]
    fn truncated_compressed_int_fails() {
        let err = read_compressed_int(&mut Cursor::new(vec![0x81, 0x80])).unwrap_err();
        assert!(matches!(err, CodecError::Truncated));
        assert!(err.is_truncation());

        let err = read_compressed_int(&mut Cursor::new(Vec::<u8>::new())).unwrap_err();
        assert!(matches!(err, CodecError::Truncated));
    }

    #[test]
    fn oversized_compressed_int_is_a_format_error() {
        let err = read_compressed_int(&mut Cursor::new(vec![0xff; 6])).unwrap_err();
        assert!(matches!(err, CodecError::Overflow));
        assert!(!err.is_truncation());

        // five groups whose leading group carries more than four bits
        let err = read_compressed_int(&mut Cursor::new(vec![0xbf, 0xff, 0xff, 0xff, 0x7f]))
            .unwrap_err();
        assert!(matches!(err, CodecError::Overflow));
    }

    #[test]
    fn big_endian_values() {
        let mut cursor = Cursor::new(vec![0x3f, 0x80, 0x00, 0x00, 0x00, 0x01]);
        assert_eq!(read_big_endian_f32(&mut cursor).unwrap(), 1.0);
        assert_eq!(read_big_endian_u16(&mut cursor).unwrap(), 1);
    }

    #[test]
    fn big_endian_short_reads_fail() {
        let err = read_big_endian_f32(&mut Cursor::new(vec![0x3f, 0x80, 0x00])).unwrap_err();
        assert!(matches!(err, CodecError::Truncated));

        let err = read_big_endian_u16(&mut Cursor::new(vec![0x01])).unwrap_err();
        assert!(matches!(err, CodecError::Truncated));
    }

    #[test]
    fn floats_are_bit_exact() {
        let values = [0.0f32, -0.0, 1.5e-38, f32::MAX, -123.456, f32::MIN_POSITIVE];
        let mut buf = Vec::new();
        for value in values {
            write_big_endian_f32(&mut buf, value).unwrap();
        }
        let mut cursor = Cursor::new(buf);
        for value in values {
            let decoded = read_big_endian_f32(&mut cursor).unwrap();
            assert_eq!(decoded.to_bits(), value.to_bits());
        }
    }
}
