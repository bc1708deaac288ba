//! Per-connection request handling for the storage server.
//!
//! The NM-facing listener answers one control request per connection
//! (create, delete, read-for-forwarding). The client-facing listener also
//! serves one operation per connection, but WRITE is a two-record dialogue
//! and STREAM emits many records before its closing acknowledgement.

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::proto::{self, clip, Kind, Record, Status, LOCK_ACQUIRED, STREAM_STOP};

use super::{editor, unix_now, StorageServer};

pub(super) async fn serve_control(
    server: Arc<StorageServer>,
    mut stream: TcpStream,
    peer: SocketAddr,
) {
    let Ok(req) = proto::recv(&mut stream).await else {
        return;
    };
    debug!(%peer, kind = ?req.kind, file = %req.filename, "control request");

    let reply = match req.kind {
        Kind::CreateFile => match server.store.create(&req.filename) {
            Ok(()) => Record::ack(),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                Record::error(Status::FileExists)
            }
            Err(err) if err.kind() == ErrorKind::InvalidInput => {
                Record::error(Status::InvalidCommand)
            }
            Err(err) => {
                warn!(?err, file = %req.filename, "create failed");
                Record::error(Status::SsUnavailable)
            }
        },
        Kind::DeleteFile => match server.store.remove(&req.filename) {
            Ok(()) => Record::ack(),
            Err(err) if err.kind() == ErrorKind::NotFound => Record::error(Status::FileNotFound),
            Err(err) => {
                warn!(?err, file = %req.filename, "delete failed");
                Record::error(Status::SsUnavailable)
            }
        },
        Kind::ReadFile => match server.store.read(&req.filename) {
            Ok(content) => Record::response(clip(&content)),
            Err(err) if err.kind() == ErrorKind::NotFound => Record::error(Status::FileNotFound),
            Err(_) => Record::error(Status::SsUnavailable),
        },
        _ => {
            warn!(%peer, kind = ?req.kind, "unexpected control request");
            return;
        }
    };
    let _ = proto::send(&mut stream, &reply).await;
}

pub(super) async fn serve_client(
    server: Arc<StorageServer>,
    mut stream: TcpStream,
    peer: SocketAddr,
) {
    let Ok(req) = proto::recv(&mut stream).await else {
        return;
    };
    debug!(%peer, kind = ?req.kind, file = %req.filename, "client request");

    match req.kind {
        Kind::WriteFile => handle_write(&server, &mut stream, req).await,
        Kind::StreamFile => handle_stream(&server, &mut stream, req).await,
        Kind::ReadFile
        | Kind::InfoFile
        | Kind::Undo
        | Kind::Checkpoint
        | Kind::ViewCheckpoint
        | Kind::Revert
        | Kind::ListCheckpoints
        | Kind::CreateFolder
        | Kind::ViewFolder
        | Kind::MoveFile => {
            let reply = handle_simple(&server, &req);
            let _ = proto::send(&mut stream, &reply).await;
        }
        _ => {
            warn!(%peer, kind = ?req.kind, "unexpected client request");
        }
    }
}

/// The two-phase exclusive-lock write dialogue.
///
/// Phase 1 carries an empty payload and acquires the lock; phase 2 carries
/// the edit lines on the same connection. The lock guard lives on this stack
/// frame, so the lock is released whichever way the dialogue ends, including
/// the client vanishing between the phases.
async fn handle_write(server: &StorageServer, stream: &mut TcpStream, req: Record) {
    let filename = req.filename;

    if !req.data.is_empty() {
        let reply =
            Record::error_with(Status::InvalidCommand, "write opens with an empty payload");
        let _ = proto::send(stream, &reply).await;
        return;
    }
    if !server.store.exists(&filename) {
        let _ = proto::send(stream, &Record::error(Status::FileNotFound)).await;
        return;
    }

    let Some(guard) = server.locks.try_acquire(&filename) else {
        let reply =
            Record::error_with(Status::SentenceLocked, "file is locked by another writer");
        let _ = proto::send(stream, &reply).await;
        return;
    };
    debug!(file = %filename, "write lock acquired");

    if proto::send(stream, &Record::ack_with(LOCK_ACQUIRED)).await.is_err() {
        return;
    }

    let payload = match proto::recv(stream).await {
        Ok(rec) if rec.kind == Kind::WriteFile => rec,
        _ => {
            debug!(file = %filename, "writer gone before payload, releasing lock");
            return;
        }
    };

    let reply = apply_payload(server, &filename, &payload);
    let _ = proto::send(stream, &reply).await;
    drop(guard);
}

fn apply_payload(server: &StorageServer, filename: &str, payload: &Record) -> Record {
    let current = match server.store.read(filename) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Record::error(Status::FileNotFound)
        }
        Err(_) => return Record::error(Status::SsUnavailable),
    };

    let lines = match editor::parse_payload(&payload.data) {
        Ok(lines) => lines,
        Err(err) => return Record::error_with(Status::InvalidIndex, err.0),
    };
    let updated = match editor::apply_write(&current, payload.sentence_num, &lines) {
        Ok(content) => content,
        Err(err) => return Record::error_with(Status::InvalidIndex, err.0),
    };

    server.undo.push(filename, current, unix_now());
    match server.store.write(filename, &updated) {
        Ok(()) => Record::ack(),
        Err(err) => {
            warn!(?err, file = %filename, "rewrite failed");
            Record::error(Status::SsUnavailable)
        }
    }
}

async fn handle_stream(server: &StorageServer, stream: &mut TcpStream, req: Record) {
    if server.locks.is_locked(&req.filename) {
        let _ = proto::send(stream, &Record::error(Status::SentenceLocked)).await;
        return;
    }
    let content = match server.store.read(&req.filename) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            let _ = proto::send(stream, &Record::error(Status::FileNotFound)).await;
            return;
        }
        Err(_) => {
            let _ = proto::send(stream, &Record::error(Status::SsUnavailable)).await;
            return;
        }
    };

    let delay = Duration::from_millis(server.cfg.stream_delay_ms);
    for word in content.split_whitespace() {
        if proto::send(stream, &Record::response(word)).await.is_err() {
            return;
        }
        tokio::time::sleep(delay).await;
    }
    let _ = proto::send(stream, &Record::ack_with(STREAM_STOP)).await;
}

fn handle_simple(server: &StorageServer, req: &Record) -> Record {
    match req.kind {
        Kind::ReadFile => {
            if server.locks.is_locked(&req.filename) {
                return Record::error(Status::SentenceLocked);
            }
            match server.store.read(&req.filename) {
                Ok(content) => Record::response(clip(&content)),
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    Record::error(Status::FileNotFound)
                }
                Err(_) => Record::error(Status::SsUnavailable),
            }
        }
        Kind::InfoFile => match server.store.info(&req.filename) {
            Ok(report) => Record::response(report.render(&req.filename)),
            Err(err) if err.kind() == ErrorKind::NotFound => Record::error(Status::FileNotFound),
            Err(_) => Record::error(Status::SsUnavailable),
        },
        Kind::Undo => {
            if server.locks.is_locked(&req.filename) {
                return Record::error(Status::SentenceLocked);
            }
            match server.undo.latest_for(&req.filename) {
                Some(content) => match server.store.write(&req.filename, &content) {
                    Ok(()) => Record::ack(),
                    Err(_) => Record::error(Status::SsUnavailable),
                },
                None => Record::error_with(Status::FileNotFound, "no undo history for file"),
            }
        }
        Kind::Checkpoint => {
            let content = match server.store.read(&req.filename) {
                Ok(content) => content,
                Err(_) => return Record::error(Status::FileNotFound),
            };
            match server.checkpoints.add(
                &req.filename,
                &req.data,
                content,
                &req.username,
                unix_now(),
            ) {
                Ok(()) => Record::ack(),
                Err((status, msg)) => Record::error_with(status, msg),
            }
        }
        Kind::ViewCheckpoint => match server.checkpoints.view(&req.filename, &req.data) {
            Some(content) => Record::response(clip(&content)),
            None => Record::error_with(Status::FileNotFound, "no such checkpoint"),
        },
        Kind::Revert => match server.checkpoints.view(&req.filename, &req.data) {
            Some(content) => match server.store.write(&req.filename, &content) {
                Ok(()) => Record::ack(),
                Err(_) => Record::error(Status::SsUnavailable),
            },
            None => Record::error_with(Status::FileNotFound, "no such checkpoint"),
        },
        Kind::ListCheckpoints => {
            let now = unix_now();
            let mut out = String::new();
            for (tag, timestamp, author) in server.checkpoints.list(&req.filename) {
                let age = now.saturating_sub(timestamp);
                out.push_str(&format!("{tag}  ({age}s ago)  by {author}\n"));
            }
            Record::response(out)
        }
        Kind::CreateFolder => match server.store.create_folder(&req.folder_path) {
            Ok(()) => Record::ack(),
            Err(_) => Record::error(Status::InvalidCommand),
        },
        Kind::ViewFolder => match server.store.list_folder(&req.folder_path) {
            Ok(listing) => Record::response(listing),
            Err(err) if err.kind() == ErrorKind::NotFound => Record::error(Status::FileNotFound),
            Err(_) => Record::error(Status::InvalidCommand),
        },
        Kind::MoveFile => {
            match server.store.move_into_folder(&req.filename, &req.folder_path) {
                Ok(()) => Record::ack(),
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    Record::error(Status::FileNotFound)
                }
                Err(_) => Record::error(Status::InvalidCommand),
            }
        }
        _ => Record::error(Status::InvalidCommand),
    }
}
