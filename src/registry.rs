//! Live connection bookkeeping and broadcast fan-out
//!
//! Every upgraded connection registers an outbound channel here; its writer
//! task drains that channel onto the socket. Broadcasting is therefore a
//! non-blocking fan-out of one shared frame to every channel: a slow or dead
//! peer fails `try_send` (queue full, or receiver gone) and is removed after
//! the fan-out instead of stalling delivery to the rest.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::debug;

use crate::frame;

/// Unique identifier for a registered connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Thread-safe set of live connections.
///
/// Membership changes and broadcast iteration are mutually exclusive with
/// respect to the map, but the sends themselves are channel pushes and never
/// block the lock on peer I/O.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, mpsc::Sender<Bytes>>>,
    next_id: AtomicU64,
    member_count: AtomicUsize,
    send_queue_capacity: usize,
}

impl ConnectionRegistry {
    /// Create a registry whose per-connection outbound queues hold up to
    /// `send_queue_capacity` frames.
    pub fn new(send_queue_capacity: usize) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            member_count: AtomicUsize::new(0),
            send_queue_capacity,
        }
    }

    /// Register a new connection.
    ///
    /// Returns its id and the receiving end of its outbound queue; the
    /// caller's writer task drains the receiver onto the socket.
    pub fn add(&self) -> (ConnectionId, mpsc::Receiver<Bytes>) {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.send_queue_capacity);

        self.connections.write().insert(id, tx);
        self.member_count.fetch_add(1, Ordering::Relaxed);

        (id, rx)
    }

    /// Remove a connection; no-op if it is not registered.
    ///
    /// Dropping the stored sender ends the connection's writer task.
    pub fn remove(&self, id: ConnectionId) -> bool {
        let removed = self.connections.write().remove(&id).is_some();
        if removed {
            self.member_count.fetch_sub(1, Ordering::Relaxed);
        }
        removed
    }

    /// Encode `message` once and queue it to every registered connection,
    /// the originator included.
    ///
    /// Returns the number of connections the frame was queued to. A failed
    /// queue push removes that connection but never aborts delivery to the
    /// others.
    pub fn broadcast(&self, message: &str) -> usize {
        let frame = frame::encode(message);

        let mut delivered = 0;
        let mut stale: Vec<ConnectionId> = Vec::new();
        {
            let connections = self.connections.read();
            for (&id, tx) in connections.iter() {
                match tx.try_send(frame.clone()) {
                    Ok(()) => delivered += 1,
                    Err(_) => stale.push(id),
                }
            }
        }

        for id in stale {
            debug!(connection = %id, "dropping unreachable broadcast target");
            self.remove(id);
        }

        delivered
    }

    /// Current number of registered connections.
    pub fn count(&self) -> usize {
        self.member_count.load(Ordering::Relaxed)
    }

    /// Drop every registered connection (server shutdown).
    pub fn clear(&self) {
        let mut connections = self.connections.write();
        let dropped = connections.len();
        connections.clear();
        self.member_count.fetch_sub(dropped, Ordering::Relaxed);
    }
}
