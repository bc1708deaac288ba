//! The fixed wire record and its whole-record transfer helpers.

use std::io::{Read, Write};

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::ToPrimitive;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::primitive::{fixed_str, i32, u32, variant, write_fixed_str, write_i32, write_u32};
use super::{Error, Result};

/// Size of the fixed `username` region, terminating NUL included.
pub const USERNAME_LEN: usize = 64;
/// Size of the fixed `filename` region.
pub const FILENAME_LEN: usize = 256;
/// Size of the fixed free-form `data` region.
pub const DATA_LEN: usize = 8192;
/// Size of the fixed dotted-quad `ss_ip` region.
pub const IP_LEN: usize = 16;
/// Size of the fixed `folder_path` region.
pub const FOLDER_LEN: usize = 512;

/// Message type codes. Requests are 100..=121, responses 200..=202.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
pub enum Kind {
    RegisterSs = 100,
    RegisterClient = 101,
    CreateFile = 102,
    DeleteFile = 103,
    ReadFile = 104,
    WriteFile = 105,
    InfoFile = 106,
    ListFiles = 107,
    StreamFile = 108,
    ExecFile = 109,
    ListUsers = 110,
    AddAccess = 111,
    RemAccess = 112,
    Undo = 113,
    GetOwner = 114,
    CreateFolder = 115,
    MoveFile = 116,
    ViewFolder = 117,
    Checkpoint = 118,
    ViewCheckpoint = 119,
    Revert = 120,
    ListCheckpoints = 121,
    Response = 200,
    Error = 201,
    Ack = 202,
}

/// In-band error taxonomy carried in the `error_code` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
pub enum Status {
    Success = 0,
    FileNotFound = 1,
    Unauthorized = 2,
    FileExists = 3,
    SentenceLocked = 4,
    InvalidIndex = 5,
    SsUnavailable = 6,
    InvalidCommand = 7,
    PermissionDenied = 8,
}

/// The single fixed-layout record exchanged on every socket I/O.
///
/// Field semantics are multiplexed by [`Kind`]; unused fields stay empty or
/// zero. `ss_ip`/`ss_port` double as the storage server's self-identification
/// at registration and as the redirect tuple in naming-server responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub kind: Kind,
    pub username: String,
    pub filename: String,
    pub data: String,
    pub sentence_num: i32,
    pub word_index: i32,
    pub status: Status,
    pub flags: i32,
    pub ss_ip: String,
    pub ss_port: u32,
    pub folder_path: String,
}

impl Record {
    /// Encoded size of every record, independent of message type.
    pub const WIRE_LEN: usize =
        4 + USERNAME_LEN + FILENAME_LEN + DATA_LEN + 4 * 4 + IP_LEN + 4 + FOLDER_LEN;

    /// Creates an empty record of the given kind.
    pub fn new(kind: Kind) -> Self {
        Self {
            kind,
            username: String::new(),
            filename: String::new(),
            data: String::new(),
            sentence_num: 0,
            word_index: 0,
            status: Status::Success,
            flags: 0,
            ss_ip: String::new(),
            ss_port: 0,
            folder_path: String::new(),
        }
    }

    /// Creates a bare acknowledgement.
    pub fn ack() -> Self {
        Self::new(Kind::Ack)
    }

    /// Creates an acknowledgement carrying a payload.
    pub fn ack_with(data: impl Into<String>) -> Self {
        let mut rec = Self::new(Kind::Ack);
        rec.data = data.into();
        rec
    }

    /// Creates a RESPONSE carrying a payload.
    pub fn response(data: impl Into<String>) -> Self {
        let mut rec = Self::new(Kind::Response);
        rec.data = data.into();
        rec
    }

    /// Creates a RESPONSE carrying a redirect tuple to a storage server.
    pub fn redirect(ip: impl Into<String>, port: u32) -> Self {
        let mut rec = Self::new(Kind::Response);
        rec.ss_ip = ip.into();
        rec.ss_port = port;
        rec
    }

    /// Creates an ERROR with the given status code.
    pub fn error(status: Status) -> Self {
        let mut rec = Self::new(Kind::Error);
        rec.status = status;
        rec
    }

    /// Creates an ERROR with a status code and a human-readable message.
    pub fn error_with(status: Status, msg: impl Into<String>) -> Self {
        let mut rec = Self::error(status);
        rec.data = msg.into();
        rec
    }

    /// Serializes the record. Exactly [`Record::WIRE_LEN`] bytes are written.
    pub fn encode(&self, dest: &mut impl Write) -> Result<()> {
        // Closed-set enums always fit in u32.
        write_u32(dest, self.kind.to_u32().unwrap_or(0))?;
        write_fixed_str(dest, &self.username, USERNAME_LEN, "username")?;
        write_fixed_str(dest, &self.filename, FILENAME_LEN, "filename")?;
        write_fixed_str(dest, &self.data, DATA_LEN, "data")?;
        write_i32(dest, self.sentence_num)?;
        write_i32(dest, self.word_index)?;
        write_u32(dest, self.status.to_u32().unwrap_or(0))?;
        write_i32(dest, self.flags)?;
        write_fixed_str(dest, &self.ss_ip, IP_LEN, "ss_ip")?;
        write_u32(dest, self.ss_port)?;
        write_fixed_str(dest, &self.folder_path, FOLDER_LEN, "folder_path")
    }

    /// Deserializes one record, consuming exactly [`Record::WIRE_LEN`] bytes.
    pub fn decode(src: &mut impl Read) -> Result<Self> {
        Ok(Self {
            kind: variant(src)?,
            username: fixed_str(src, USERNAME_LEN)?,
            filename: fixed_str(src, FILENAME_LEN)?,
            data: fixed_str(src, DATA_LEN)?,
            sentence_num: i32(src)?,
            word_index: i32(src)?,
            status: variant(src)?,
            flags: i32(src)?,
            ss_ip: fixed_str(src, IP_LEN)?,
            ss_port: u32(src)?,
            folder_path: fixed_str(src, FOLDER_LEN)?,
        })
    }
}

/// Sends one whole record, looping until all bytes are on the wire.
pub async fn send(stream: &mut (impl AsyncWrite + Unpin), rec: &Record) -> Result<()> {
    let mut buf = Vec::with_capacity(Record::WIRE_LEN);
    rec.encode(&mut buf)?;
    debug_assert_eq!(buf.len(), Record::WIRE_LEN);
    stream.write_all(&buf).await.map_err(Error::IO)
}

/// Receives one whole record; a peer close mid-record is an error.
pub async fn recv(stream: &mut (impl AsyncRead + Unpin)) -> Result<Record> {
    let mut buf = vec![0u8; Record::WIRE_LEN];
    stream.read_exact(&mut buf).await.map_err(Error::IO)?;
    Record::decode(&mut buf.as_slice())
}
