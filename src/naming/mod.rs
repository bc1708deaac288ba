//! Naming server: metadata directory, access-control authority and router.
//!
//! Clients talk to the naming server first; payload-heavy operations are
//! redirected to the storage server that owns the file, control operations
//! (create, delete, folder and checkpoint management) are forwarded and their
//! replies relayed.

mod access;
mod index;
mod registry;
mod session;
mod trie;

pub use access::{AccessEntry, AccessRecord, AccessTable, Level, MAX_ACCESS_ENTRIES};
pub use index::{FileIndex, CACHE_CAPACITY};
pub use registry::{Registry, SsId, StorageNode};

use std::io;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::config::NamingConfig;

pub struct NamingServer {
    cfg: NamingConfig,
    registry: Registry,
    index: FileIndex,
    access: AccessTable,
}

impl NamingServer {
    /// Creates the server state, loading the access table from disk.
    pub fn new(cfg: NamingConfig) -> io::Result<Arc<Self>> {
        let access = AccessTable::load(&cfg.access_file)?;
        Ok(Arc::new(Self {
            registry: Registry::new(),
            index: FileIndex::new(),
            access,
            cfg,
        }))
    }

    fn exec_enabled(&self) -> bool {
        self.cfg.exec_enabled
    }

    /// Binds the configured address and serves until the listener fails.
    pub async fn run(self: Arc<Self>) -> io::Result<()> {
        let listener = TcpListener::bind(&self.cfg.bind).await?;
        info!(addr = %listener.local_addr()?, "naming server listening");
        self.handle_forever(listener).await
    }

    /// Accepts connections on an already-bound listener, one task each.
    pub async fn handle_forever(self: Arc<Self>, listener: TcpListener) -> io::Result<()> {
        loop {
            let (socket, peer) = listener.accept().await?;
            socket.set_nodelay(true)?;
            let server = Arc::clone(&self);
            tokio::spawn(session::serve(server, socket, peer));
        }
    }
}
