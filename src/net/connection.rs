//! Connection identity and lifecycle tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Count open connections (and upgraded RPC channels) for graceful shutdown
//! - Describe the client side of a connection to request handlers

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use crate::observability::metrics;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// The client side of a connection, attached to every request's extensions.
#[derive(Debug, Clone, Copy)]
pub struct ClientConnection {
    pub id: ConnectionId,
    pub peer: SocketAddr,
    /// Whether the connection arrived over TLS.
    pub tls: bool,
}

/// Tracks open connections for graceful shutdown.
///
/// The count lives in a watch channel so the drain phase can wait for zero
/// without polling.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    active: Arc<watch::Sender<u64>>,
    metered: bool,
}

impl ConnectionTracker {
    /// Tracker whose count is published as the active connections gauge.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            active: Arc::new(tx),
            metered: true,
        }
    }

    /// Tracker for auxiliary listeners; not reflected in metrics.
    pub fn unmetered() -> Self {
        Self {
            metered: false,
            ..Self::new()
        }
    }

    /// Record a new open connection. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        let id = ConnectionId::new();
        self.active.send_modify(|n| *n += 1);
        if self.metered {
            metrics::set_active_connections(self.active_count());
        }
        tracing::trace!(connection_id = %id, "Connection tracked");
        ConnectionGuard {
            active: Arc::clone(&self.active),
            metered: self.metered,
            id,
        }
    }

    pub fn active_count(&self) -> u64 {
        *self.active.borrow()
    }

    /// Wait until no tracked connection remains.
    pub async fn wait_idle(&self) {
        let mut rx = self.active.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that tracks a connection's lifetime.
/// Decrements the active count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    active: Arc<watch::Sender<u64>>,
    metered: bool,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active.send_modify(|n| *n = n.saturating_sub(1));
        if self.metered {
            metrics::set_active_connections(*self.active.borrow());
        }
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}
