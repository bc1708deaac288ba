//! Storage-server and client bookkeeping.
//!
//! Both tables are append-only for the lifetime of the naming server:
//! storage servers are never unregistered (no failure detection) and client
//! usernames are retained after disconnect.

use std::sync::Mutex;

/// Index of a registered storage server. Stable for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SsId(pub usize);

/// One registered storage server.
#[derive(Debug, Clone)]
pub struct StorageNode {
    pub ip: String,
    pub nm_port: u16,
    pub client_port: u16,
    pub files: Vec<String>,
    pub active: bool,
}

pub struct Registry {
    nodes: Mutex<Vec<StorageNode>>,
    clients: Mutex<Vec<String>>,
}

impl Registry {
    pub fn new() -> Self {
        Self { nodes: Mutex::new(Vec::new()), clients: Mutex::new(Vec::new()) }
    }

    /// Records a storage server and its hosted file list, returning its id.
    pub fn register_ss(
        &self,
        ip: String,
        nm_port: u16,
        client_port: u16,
        files: Vec<String>,
    ) -> SsId {
        let mut nodes = self.nodes.lock().unwrap();
        nodes.push(StorageNode { ip, nm_port, client_port, files, active: true });
        SsId(nodes.len() - 1)
    }

    /// Records a client username. Duplicates are kept; LIST_USERS dedupes.
    pub fn register_client(&self, username: &str) {
        self.clients.lock().unwrap().push(username.to_owned());
    }

    pub fn client_names(&self) -> Vec<String> {
        self.clients.lock().unwrap().clone()
    }

    /// First active storage server, used for CREATE and folder placement.
    pub fn first_active(&self) -> Option<SsId> {
        let nodes = self.nodes.lock().unwrap();
        nodes.iter().position(|n| n.active).map(SsId)
    }

    /// Snapshot of one node's record.
    pub fn node(&self, id: SsId) -> Option<StorageNode> {
        self.nodes.lock().unwrap().get(id.0).cloned()
    }

    /// All files hosted by active servers, in registration order. May contain
    /// duplicates across servers; callers dedupe.
    pub fn all_files(&self) -> Vec<String> {
        let nodes = self.nodes.lock().unwrap();
        nodes.iter().filter(|n| n.active).flat_map(|n| n.files.iter().cloned()).collect()
    }

    /// Authoritative linear scan over per-server file lists.
    pub fn scan_for(&self, name: &str) -> Option<SsId> {
        let nodes = self.nodes.lock().unwrap();
        nodes
            .iter()
            .position(|n| n.active && n.files.iter().any(|f| f == name))
            .map(SsId)
    }

    pub fn add_file(&self, id: SsId, name: &str) {
        let mut nodes = self.nodes.lock().unwrap();
        if let Some(node) = nodes.get_mut(id.0) {
            node.files.push(name.to_owned());
        }
    }

    pub fn remove_file(&self, id: SsId, name: &str) {
        let mut nodes = self.nodes.lock().unwrap();
        if let Some(node) = nodes.get_mut(id.0) {
            node.files.retain(|f| f != name);
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
