//! Storage server: file bytes, the sentence write engine and checkpoints.
//!
//! Each storage server listens on two ports: the base port takes control
//! requests originating at the naming server, the port above it takes
//! client operations. It registers with the naming server once at startup,
//! reporting both ports and its hosted file list.

mod checkpoint;
pub mod editor;
mod handlers;
mod locks;
mod store;
mod undo;

pub use checkpoint::{Checkpoint, CheckpointStore, MAX_CHECKPOINTS};
pub use locks::{LockTable, WriteGuard};
pub use store::{ByteStore, FileReport};
pub use undo::{UndoRing, UNDO_CAPACITY};

use std::io;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::net::{TcpListener, TcpStream};
use tracing::info;

use crate::config::StorageConfig;
use crate::proto::{self, Kind, Record};

pub(crate) fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

pub struct StorageServer {
    cfg: StorageConfig,
    store: ByteStore,
    locks: LockTable,
    undo: UndoRing,
    checkpoints: CheckpointStore,
}

impl StorageServer {
    /// Creates the server state, opening the byte store.
    pub fn new(cfg: StorageConfig) -> io::Result<Arc<Self>> {
        let store = ByteStore::open(&cfg.storage_dir)?;
        Ok(Arc::new(Self {
            store,
            locks: LockTable::new(),
            undo: UndoRing::new(),
            checkpoints: CheckpointStore::new(),
            cfg,
        }))
    }

    /// Binds the configured port pair, registers with the naming server and
    /// serves until a listener fails.
    pub async fn run(self: Arc<Self>) -> io::Result<()> {
        let nm_listener = TcpListener::bind(("0.0.0.0", self.cfg.base_port)).await?;
        let client_listener = TcpListener::bind(("0.0.0.0", self.cfg.client_port())).await?;
        let nm_port = nm_listener.local_addr()?.port();
        let client_port = client_listener.local_addr()?.port();
        self.register_with_nm(nm_port, client_port)
            .await
            .map_err(|err| io::Error::other(format!("registration failed: {err:?}")))?;
        self.serve_registered(nm_listener, client_listener).await
    }

    /// Announces this server to the naming server, exactly once per process:
    /// both ports plus the newline-joined list of files already on disk.
    pub async fn register_with_nm(&self, nm_port: u16, client_port: u16) -> proto::Result<()> {
        let files = self.store.scan().map_err(proto::Error::IO)?;
        let mut rec = Record::new(Kind::RegisterSs);
        rec.ss_ip = self.cfg.advertise_ip.clone();
        rec.ss_port = nm_port as u32;
        rec.flags = client_port as i32;
        rec.data = files.join("\n");

        let mut stream =
            TcpStream::connect(&self.cfg.naming_addr).await.map_err(proto::Error::IO)?;
        proto::send(&mut stream, &rec).await?;
        let reply = proto::recv(&mut stream).await?;
        if reply.kind != Kind::Ack {
            return Err(proto::Error::IO(io::Error::other("naming server refused registration")));
        }
        info!(
            nm = %self.cfg.naming_addr,
            nm_port,
            client_port,
            files = files.len(),
            "registered with naming server"
        );
        Ok(())
    }

    /// Serves both listeners, one spawned task per accepted connection.
    /// Registration must already have happened.
    pub async fn serve_registered(
        self: Arc<Self>,
        nm_listener: TcpListener,
        client_listener: TcpListener,
    ) -> io::Result<()> {
        let control = accept_loop(Arc::clone(&self), nm_listener, false);
        let client = accept_loop(self, client_listener, true);
        tokio::try_join!(control, client)?;
        Ok(())
    }
}

async fn accept_loop(
    server: Arc<StorageServer>,
    listener: TcpListener,
    client_facing: bool,
) -> io::Result<()> {
    loop {
        let (socket, peer) = listener.accept().await?;
        socket.set_nodelay(true)?;
        let server = Arc::clone(&server);
        if client_facing {
            tokio::spawn(handlers::serve_client(server, socket, peer));
        } else {
            tokio::spawn(handlers::serve_control(server, socket, peer));
        }
    }
}
