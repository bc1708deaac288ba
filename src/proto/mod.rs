//! Fixed-record wire protocol shared by the naming server, storage servers and clients.
//!
//! Every message on every socket is one [`Record`] of exactly [`Record::WIRE_LEN`]
//! bytes. There is no framing beyond the constant record size: peers read and
//! write whole records, and an early close surfaces as an I/O error. All
//! multibyte integers are serialized in big-endian (network) order and string
//! fields occupy fixed NUL-padded regions.

pub mod primitive;
mod record;

#[cfg(test)]
mod tests;

use std::io;
use std::string::FromUtf8Error;

pub use record::{
    recv, send, Kind, Record, Status, DATA_LEN, FILENAME_LEN, FOLDER_LEN, IP_LEN, USERNAME_LEN,
};

/// Payload of the Phase-1 write acknowledgement.
pub const LOCK_ACQUIRED: &str = "LOCK_ACQUIRED";

/// Payload of the acknowledgement that ends a word stream.
pub const STREAM_STOP: &str = "STOP";

/// Sentinel line closing a write payload.
pub const END_OF_WRITE: &str = "ETIRW";

/// Result of codec operations with error type [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Clips a payload to the data field capacity, on a char boundary.
pub fn clip(s: &str) -> String {
    let max = DATA_LEN - 1;
    if s.len() <= max {
        return s.to_owned();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_owned()
}

/// Wire codec errors.
#[derive(Debug)]
pub enum Error {
    /// Underlying transport failure, including early connection close.
    IO(io::Error),
    /// A type or error code on the wire is outside the closed set.
    EnumDiscMismatch(u32),
    /// A string field does not fit its fixed region or contains a NUL byte.
    FieldOverflow(&'static str),
    /// A string field holds invalid UTF-8.
    IncorrectString(FromUtf8Error),
}
