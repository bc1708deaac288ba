//! Per-connection request handling for the naming server.
//!
//! The first record of a connection classifies the session: REGISTER_SS runs
//! the single-shot registration handler, anything else opens a long-lived
//! client session that serves that record and then loops until the peer
//! closes. Shared state is locked per request only; no lock is ever held
//! across a forward to a storage server.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::proto::{self, clip, Kind, Record, Status};

use super::access::Level;
use super::NamingServer;

pub(super) async fn serve(server: Arc<NamingServer>, mut stream: TcpStream, peer: SocketAddr) {
    let first = match proto::recv(&mut stream).await {
        Ok(rec) => rec,
        Err(_) => return,
    };

    if first.kind == Kind::RegisterSs {
        register_ss(&server, &mut stream, first, peer).await;
        return;
    }

    debug!(%peer, "client session open");
    let mut req = first;
    loop {
        let Some(reply) = handle(&server, &req).await else {
            // unknown or out-of-place record: drop the connection
            warn!(%peer, kind = ?req.kind, "dropping request");
            break;
        };
        if proto::send(&mut stream, &reply).await.is_err() {
            break;
        }
        match proto::recv(&mut stream).await {
            Ok(next) => req = next,
            Err(_) => break,
        }
    }
    debug!(%peer, "client session closed");
}

async fn register_ss(server: &NamingServer, stream: &mut TcpStream, rec: Record, peer: SocketAddr) {
    let files: Vec<String> =
        rec.data.lines().filter(|l| !l.is_empty()).map(str::to_owned).collect();
    let count = files.len();
    let id = server.registry.register_ss(
        rec.ss_ip.clone(),
        rec.ss_port as u16,
        rec.flags as u16,
        files.clone(),
    );
    for file in &files {
        server.index.insert(file, id);
    }
    info!(%peer, ip = %rec.ss_ip, nm_port = rec.ss_port, files = count, "storage server registered");
    let _ = proto::send(stream, &Record::ack()).await;
}

async fn handle(server: &NamingServer, req: &Record) -> Option<Record> {
    let reply = match req.kind {
        Kind::RegisterClient => {
            server.registry.register_client(&req.username);
            info!(user = %req.username, "client registered");
            Record::ack()
        }
        Kind::ListFiles => list_files(server, req),
        Kind::ListUsers => list_users(server),
        Kind::GetOwner => {
            Record::response(server.access.owner(&req.filename).unwrap_or_default())
        }
        Kind::ReadFile | Kind::StreamFile | Kind::InfoFile => redirect(server, req, Level::Read),
        Kind::WriteFile => redirect(server, req, Level::Write),
        Kind::CreateFile => create_file(server, req).await,
        Kind::DeleteFile => delete_file(server, req).await,
        Kind::AddAccess => {
            let level = if req.flags == 1 { Level::Read } else { Level::Write };
            match server.access.grant(&req.filename, &req.username, &req.data, level) {
                Ok(()) => Record::ack(),
                Err(status) => Record::error(status),
            }
        }
        Kind::RemAccess => {
            match server.access.revoke(&req.filename, &req.username, &req.data) {
                Ok(()) => Record::ack(),
                Err(status) => Record::error(status),
            }
        }
        Kind::ExecFile => exec_file(server, req).await,
        Kind::CreateFolder | Kind::ViewFolder => forward_any_ss(server, req).await,
        Kind::MoveFile => move_file(server, req).await,
        Kind::Checkpoint | Kind::ViewCheckpoint | Kind::Revert | Kind::ListCheckpoints => {
            checkpoint_op(server, req).await
        }
        _ => return None,
    };
    Some(reply)
}

/// Resolves the file and answers with the owning server's client-facing
/// address, after the access check for the operation.
fn redirect(server: &NamingServer, req: &Record, required: Level) -> Record {
    let Some(id) = server.index.resolve(&req.filename, &server.registry) else {
        return Record::error(Status::FileNotFound);
    };
    if !server.access.check(&req.filename, &req.username, required) {
        return Record::error(Status::Unauthorized);
    }
    match server.registry.node(id) {
        Some(node) => Record::redirect(node.ip, node.client_port as u32),
        None => Record::error(Status::SsUnavailable),
    }
}

fn list_files(server: &NamingServer, req: &Record) -> Record {
    let mut seen = std::collections::HashSet::new();
    let mut out = String::new();
    for file in server.registry.all_files() {
        let visible = req.flags == 1 || server.access.check(&file, &req.username, Level::Read);
        if visible && seen.insert(file.clone()) {
            out.push_str(&file);
            out.push('\n');
        }
    }
    Record::response(out)
}

fn list_users(server: &NamingServer) -> Record {
    let mut seen = std::collections::HashSet::new();
    let mut out = String::new();
    let names = server.registry.client_names().into_iter().chain(server.access.users());
    for name in names {
        if seen.insert(name.clone()) {
            out.push_str(&name);
            out.push('\n');
        }
    }
    Record::response(out)
}

async fn create_file(server: &NamingServer, req: &Record) -> Record {
    let Some(id) = server.registry.first_active() else {
        return Record::error(Status::SsUnavailable);
    };
    let Some(node) = server.registry.node(id) else {
        return Record::error(Status::SsUnavailable);
    };

    let reply = forward(&node.ip, node.nm_port, req).await;
    if reply.kind == Kind::Ack {
        server.registry.add_file(id, &req.filename);
        server.index.insert(&req.filename, id);
        server.access.create_record(&req.filename, &req.username);
        info!(file = %req.filename, owner = %req.username, "file created");
    }
    reply
}

async fn delete_file(server: &NamingServer, req: &Record) -> Record {
    if !server.access.is_owner(&req.filename, &req.username) {
        return Record::error(Status::PermissionDenied);
    }
    let Some(id) = server.index.resolve(&req.filename, &server.registry) else {
        return Record::error(Status::FileNotFound);
    };
    let Some(node) = server.registry.node(id) else {
        return Record::error(Status::SsUnavailable);
    };

    let reply = forward(&node.ip, node.nm_port, req).await;
    if reply.kind == Kind::Ack {
        server.registry.remove_file(id, &req.filename);
        // the trie terminal stays behind; stale hits die on the access
        // check or at the storage server
        server.access.remove_record(&req.filename);
        info!(file = %req.filename, "file deleted");
    }
    reply
}

async fn move_file(server: &NamingServer, req: &Record) -> Record {
    let Some(id) = server.index.resolve(&req.filename, &server.registry) else {
        return Record::error(Status::FileNotFound);
    };
    if !server.access.check(&req.filename, &req.username, Level::Write) {
        return Record::error(Status::Unauthorized);
    }
    match server.registry.node(id) {
        Some(node) => forward(&node.ip, node.client_port, req).await,
        None => Record::error(Status::SsUnavailable),
    }
}

async fn forward_any_ss(server: &NamingServer, req: &Record) -> Record {
    let Some(id) = server.registry.first_active() else {
        return Record::error(Status::SsUnavailable);
    };
    match server.registry.node(id) {
        Some(node) => forward(&node.ip, node.client_port, req).await,
        None => Record::error(Status::SsUnavailable),
    }
}

async fn checkpoint_op(server: &NamingServer, req: &Record) -> Record {
    let Some(id) = server.index.resolve(&req.filename, &server.registry) else {
        return Record::error(Status::FileNotFound);
    };
    let required = if req.kind == Kind::Checkpoint { Level::Write } else { Level::Read };
    if !server.access.check(&req.filename, &req.username, required) {
        return Record::error(Status::Unauthorized);
    }
    match server.registry.node(id) {
        Some(node) => forward(&node.ip, node.client_port, req).await,
        None => Record::error(Status::SsUnavailable),
    }
}

async fn exec_file(server: &NamingServer, req: &Record) -> Record {
    if !server.exec_enabled() {
        return Record::error_with(Status::InvalidCommand, "EXEC is disabled on this server");
    }
    let Some(id) = server.index.resolve(&req.filename, &server.registry) else {
        return Record::error(Status::FileNotFound);
    };
    if !server.access.check(&req.filename, &req.username, Level::Read) {
        return Record::error(Status::Unauthorized);
    }
    let Some(node) = server.registry.node(id) else {
        return Record::error(Status::SsUnavailable);
    };

    let mut fetch = Record::new(Kind::ReadFile);
    fetch.filename = req.filename.clone();
    let content = forward(&node.ip, node.nm_port, &fetch).await;
    if content.kind != Kind::Response {
        return Record::error(Status::FileNotFound);
    }

    match tokio::process::Command::new("sh").arg("-c").arg(&content.data).output().await {
        Ok(output) => {
            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
            Record::response(clip(&stdout))
        }
        Err(err) => {
            warn!(?err, "exec failed to spawn");
            Record::error(Status::InvalidCommand)
        }
    }
}

/// Sends one record to a storage server and relays its reply. Any transport
/// failure on the hop is surfaced as SS_UNAVAILABLE.
async fn forward(ip: &str, port: u16, req: &Record) -> Record {
    match try_forward(ip, port, req).await {
        Ok(reply) => reply,
        Err(err) => {
            warn!(ip, port, ?err, "storage server unreachable");
            Record::error(Status::SsUnavailable)
        }
    }
}

async fn try_forward(ip: &str, port: u16, req: &Record) -> proto::Result<Record> {
    let mut stream =
        TcpStream::connect((ip, port)).await.map_err(proto::Error::IO)?;
    proto::send(&mut stream, req).await?;
    proto::recv(&mut stream).await
}
