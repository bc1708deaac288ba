//! Typed client sessions for the naming and storage servers.
//!
//! This is the contract boundary an interactive front end builds on, and
//! what the integration tests drive. A [`NamingSession`] is a long-lived
//! connection to the naming server carrying one request/response pair at a
//! time; storage-server operations open a fresh connection per operation,
//! with WRITE keeping its connection across the two protocol phases.

use tokio::net::TcpStream;

use crate::naming::Level;
use crate::proto::{self, Kind, Record, END_OF_WRITE, LOCK_ACQUIRED, STREAM_STOP};

/// Long-lived session with the naming server.
pub struct NamingSession {
    stream: TcpStream,
    username: String,
}

impl NamingSession {
    /// Connects and registers `username`.
    pub async fn connect(addr: &str, username: &str) -> proto::Result<Self> {
        let stream = TcpStream::connect(addr).await.map_err(proto::Error::IO)?;
        let mut session = Self { stream, username: username.to_owned() };
        let hello = session.request(Kind::RegisterClient);
        session.roundtrip(hello).await?;
        Ok(session)
    }

    fn request(&self, kind: Kind) -> Record {
        let mut rec = Record::new(kind);
        rec.username = self.username.clone();
        rec
    }

    fn file_request(&self, kind: Kind, filename: &str) -> Record {
        let mut rec = self.request(kind);
        rec.filename = filename.to_owned();
        rec
    }

    /// Sends one record and waits for the single reply.
    pub async fn roundtrip(&mut self, rec: Record) -> proto::Result<Record> {
        proto::send(&mut self.stream, &rec).await?;
        proto::recv(&mut self.stream).await
    }

    pub async fn create(&mut self, filename: &str) -> proto::Result<Record> {
        let rec = self.file_request(Kind::CreateFile, filename);
        self.roundtrip(rec).await
    }

    pub async fn delete(&mut self, filename: &str) -> proto::Result<Record> {
        let rec = self.file_request(Kind::DeleteFile, filename);
        self.roundtrip(rec).await
    }

    /// Lists files readable by this user, or every file when `all`.
    pub async fn list_files(&mut self, all: bool) -> proto::Result<Record> {
        let mut rec = self.request(Kind::ListFiles);
        rec.flags = i32::from(all);
        self.roundtrip(rec).await
    }

    pub async fn list_users(&mut self) -> proto::Result<Record> {
        let rec = self.request(Kind::ListUsers);
        self.roundtrip(rec).await
    }

    pub async fn get_owner(&mut self, filename: &str) -> proto::Result<Record> {
        let rec = self.file_request(Kind::GetOwner, filename);
        self.roundtrip(rec).await
    }

    /// Asks where an operation on `filename` should go. On success the reply
    /// carries the owning storage server's client-facing address.
    pub async fn locate(&mut self, kind: Kind, filename: &str) -> proto::Result<Record> {
        let rec = self.file_request(kind, filename);
        self.roundtrip(rec).await
    }

    pub async fn add_access(
        &mut self,
        filename: &str,
        target: &str,
        level: Level,
    ) -> proto::Result<Record> {
        let mut rec = self.file_request(Kind::AddAccess, filename);
        rec.data = target.to_owned();
        rec.flags = i32::from(level == Level::Read);
        self.roundtrip(rec).await
    }

    pub async fn rem_access(&mut self, filename: &str, target: &str) -> proto::Result<Record> {
        let mut rec = self.file_request(Kind::RemAccess, filename);
        rec.data = target.to_owned();
        self.roundtrip(rec).await
    }

    pub async fn exec(&mut self, filename: &str) -> proto::Result<Record> {
        let rec = self.file_request(Kind::ExecFile, filename);
        self.roundtrip(rec).await
    }

    /// Checkpoint operations are forwarded by the naming server to the
    /// owning storage server; the tag rides in the data field.
    pub async fn checkpoint(&mut self, filename: &str, tag: &str) -> proto::Result<Record> {
        let mut rec = self.file_request(Kind::Checkpoint, filename);
        rec.data = tag.to_owned();
        self.roundtrip(rec).await
    }

    pub async fn view_checkpoint(&mut self, filename: &str, tag: &str) -> proto::Result<Record> {
        let mut rec = self.file_request(Kind::ViewCheckpoint, filename);
        rec.data = tag.to_owned();
        self.roundtrip(rec).await
    }

    pub async fn revert(&mut self, filename: &str, tag: &str) -> proto::Result<Record> {
        let mut rec = self.file_request(Kind::Revert, filename);
        rec.data = tag.to_owned();
        self.roundtrip(rec).await
    }

    pub async fn list_checkpoints(&mut self, filename: &str) -> proto::Result<Record> {
        let rec = self.file_request(Kind::ListCheckpoints, filename);
        self.roundtrip(rec).await
    }

    pub async fn create_folder(&mut self, folder: &str) -> proto::Result<Record> {
        let mut rec = self.request(Kind::CreateFolder);
        rec.folder_path = folder.to_owned();
        self.roundtrip(rec).await
    }

    pub async fn view_folder(&mut self, folder: &str) -> proto::Result<Record> {
        let mut rec = self.request(Kind::ViewFolder);
        rec.folder_path = folder.to_owned();
        self.roundtrip(rec).await
    }

    pub async fn move_file(&mut self, filename: &str, folder: &str) -> proto::Result<Record> {
        let mut rec = self.file_request(Kind::MoveFile, filename);
        rec.folder_path = folder.to_owned();
        self.roundtrip(rec).await
    }
}

/// Address of the storage server named in a redirect reply.
pub fn redirect_addr(reply: &Record) -> String {
    format!("{}:{}", reply.ss_ip, reply.ss_port)
}

/// Outcome of the write lock acquisition phase.
pub enum WriteBegin {
    /// Lock held; the connection stays open for the payload phase.
    Locked(WriteHandle),
    /// The server's refusal, typically SENTENCE_LOCKED.
    Refused(Record),
}

/// An open write dialogue holding the file's exclusive lock. Dropping the
/// handle closes the connection, which releases the lock server-side.
pub struct WriteHandle {
    stream: TcpStream,
    filename: String,
    sentence_num: i32,
}

/// Opens the two-phase write dialogue against a storage server.
pub async fn begin_write(
    addr: &str,
    username: &str,
    filename: &str,
    sentence_num: i32,
) -> proto::Result<WriteBegin> {
    let mut stream = TcpStream::connect(addr).await.map_err(proto::Error::IO)?;
    let mut rec = Record::new(Kind::WriteFile);
    rec.username = username.to_owned();
    rec.filename = filename.to_owned();
    rec.sentence_num = sentence_num;
    proto::send(&mut stream, &rec).await?;

    let reply = proto::recv(&mut stream).await?;
    if reply.kind == Kind::Ack && reply.data == LOCK_ACQUIRED {
        Ok(WriteBegin::Locked(WriteHandle {
            stream,
            filename: filename.to_owned(),
            sentence_num,
        }))
    } else {
        Ok(WriteBegin::Refused(reply))
    }
}

impl WriteHandle {
    /// Sends the payload lines followed by the sentinel and waits for the
    /// final acknowledgement. The lock is released either way.
    pub async fn commit(mut self, lines: &[&str]) -> proto::Result<Record> {
        let mut data = String::new();
        for line in lines {
            data.push_str(line);
            data.push('\n');
        }
        data.push_str(END_OF_WRITE);
        data.push('\n');

        let mut rec = Record::new(Kind::WriteFile);
        rec.filename = self.filename.clone();
        rec.sentence_num = self.sentence_num;
        rec.data = data;
        proto::send(&mut self.stream, &rec).await?;
        proto::recv(&mut self.stream).await
    }
}

async fn oneshot(addr: &str, rec: &Record) -> proto::Result<Record> {
    let mut stream = TcpStream::connect(addr).await.map_err(proto::Error::IO)?;
    proto::send(&mut stream, rec).await?;
    proto::recv(&mut stream).await
}

/// Reads a file directly from a storage server.
pub async fn read_file(addr: &str, username: &str, filename: &str) -> proto::Result<Record> {
    let mut rec = Record::new(Kind::ReadFile);
    rec.username = username.to_owned();
    rec.filename = filename.to_owned();
    oneshot(addr, &rec).await
}

/// Fetches the INFO report directly from a storage server.
pub async fn info_file(addr: &str, username: &str, filename: &str) -> proto::Result<Record> {
    let mut rec = Record::new(Kind::InfoFile);
    rec.username = username.to_owned();
    rec.filename = filename.to_owned();
    oneshot(addr, &rec).await
}

/// Restores the most recent pre-image of the file.
pub async fn undo_file(addr: &str, username: &str, filename: &str) -> proto::Result<Record> {
    let mut rec = Record::new(Kind::Undo);
    rec.username = username.to_owned();
    rec.filename = filename.to_owned();
    oneshot(addr, &rec).await
}

/// Outcome of a word stream.
pub enum StreamOutcome {
    /// The streamed words, in order.
    Words(Vec<String>),
    /// The server's refusal, typically SENTENCE_LOCKED.
    Refused(Record),
}

/// Streams a file word by word, collecting until the stop marker.
pub async fn stream_words(
    addr: &str,
    username: &str,
    filename: &str,
) -> proto::Result<StreamOutcome> {
    let mut stream = TcpStream::connect(addr).await.map_err(proto::Error::IO)?;
    let mut rec = Record::new(Kind::StreamFile);
    rec.username = username.to_owned();
    rec.filename = filename.to_owned();
    proto::send(&mut stream, &rec).await?;

    let mut words = Vec::new();
    loop {
        let reply = proto::recv(&mut stream).await?;
        match reply.kind {
            Kind::Response => words.push(reply.data),
            Kind::Ack if reply.data == STREAM_STOP => return Ok(StreamOutcome::Words(words)),
            _ => return Ok(StreamOutcome::Refused(reply)),
        }
    }
}
