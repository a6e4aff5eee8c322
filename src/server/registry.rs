use std::{
    collections::HashMap,
    fmt::Display,
    net::SocketAddr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
};
use tokio_util::sync::CancellationToken;

/// Identity of one accepted connection: remote address plus accept sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId {
    peer_addr: SocketAddr,
    seq: u64,
}

impl Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.peer_addr, self.seq)
    }
}

/// Registry of live inbound connections.
///
/// Every entry holds a handle capable of forcing the connection closed.
/// Entries are inserted on accept and garbage-collected on session exit;
/// on server stop all remaining entries are closed to unblock pending reads.
pub struct ConnectionRegistry {
    entries: Mutex<HashMap<ConnectionId, CancellationToken>>,
    accept_seq: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> ConnectionRegistry {
        ConnectionRegistry {
            entries: Mutex::new(HashMap::new()),
            accept_seq: AtomicU64::new(0),
        }
    }

    /// Registers accepted connection and returns its identity together
    /// with the token its session task must watch.
    pub fn register(&self, peer_addr: SocketAddr, token: CancellationToken) -> (ConnectionId, CancellationToken) {
        let id = ConnectionId {
            peer_addr,
            seq: self.accept_seq.fetch_add(1, Ordering::Relaxed),
        };

        let mut entries = self.entries.lock().expect("connection registry lock poisoned");
        entries.insert(id, token.clone());

        (id, token)
    }

    /// Removes connection entry once its session has finished.
    pub fn unregister(&self, id: ConnectionId) {
        let mut entries = self.entries.lock().expect("connection registry lock poisoned");
        entries.remove(&id);
    }

    /// Forces single connection closed. Returns false for unknown ids.
    pub fn close(&self, id: ConnectionId) -> bool {
        let entries = self.entries.lock().expect("connection registry lock poisoned");
        match entries.get(&id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Forces every live connection closed.
    pub fn close_all(&self) {
        let entries = self.entries.lock().expect("connection registry lock poisoned");
        for token in entries.values() {
            token.cancel();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("connection registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
