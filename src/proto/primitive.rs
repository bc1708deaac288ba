//! Primitive field codecs for the fixed wire record.
//!
//! All helpers operate on synchronous [`Read`]/[`Write`] sources so they can be
//! unit-tested against [`std::io::Cursor`]; the async record transfer lives in
//! [`super::record`].

use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use num_traits::FromPrimitive;

use super::{Error, Result};

/// Parses a `u32` in big-endian order.
pub fn u32(src: &mut impl Read) -> Result<u32> {
    src.read_u32::<BigEndian>().map_err(Error::IO)
}

/// Parses an `i32` in big-endian order.
pub fn i32(src: &mut impl Read) -> Result<i32> {
    src.read_i32::<BigEndian>().map_err(Error::IO)
}

/// Serializes a `u32` in big-endian order.
pub fn write_u32(dest: &mut impl Write, n: u32) -> Result<()> {
    dest.write_u32::<BigEndian>(n).map_err(Error::IO)
}

/// Serializes an `i32` in big-endian order.
pub fn write_i32(dest: &mut impl Write, n: i32) -> Result<()> {
    dest.write_i32::<BigEndian>(n).map_err(Error::IO)
}

/// Parses an enum variant from a `u32` discriminant.
pub fn variant<T: FromPrimitive>(src: &mut impl Read) -> Result<T> {
    let disc = u32(src)?;
    FromPrimitive::from_u32(disc).ok_or(Error::EnumDiscMismatch(disc))
}

/// Parses a fixed NUL-padded string region of `len` bytes.
///
/// The string runs up to the first NUL byte; the remainder of the region is
/// discarded. The full region is always consumed from the source.
pub fn fixed_str(src: &mut impl Read, len: usize) -> Result<String> {
    let mut buf = vec![0u8; len];
    src.read_exact(&mut buf).map_err(Error::IO)?;
    let end = buf.iter().position(|&b| b == 0).unwrap_or(len);
    buf.truncate(end);
    String::from_utf8(buf).map_err(Error::IncorrectString)
}

/// Serializes a string into a fixed NUL-padded region of `len` bytes.
///
/// The content must leave room for at least one terminating NUL and must not
/// itself contain NUL bytes, which would silently alias distinct values on
/// decode.
pub fn write_fixed_str(
    dest: &mut impl Write,
    s: &str,
    len: usize,
    field: &'static str,
) -> Result<()> {
    if s.len() >= len || s.as_bytes().contains(&0) {
        return Err(Error::FieldOverflow(field));
    }
    dest.write_all(s.as_bytes()).map_err(Error::IO)?;
    let pad = vec![0u8; len - s.len()];
    dest.write_all(&pad).map_err(Error::IO)
}
