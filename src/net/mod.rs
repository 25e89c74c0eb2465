//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept, connection limits)
//!     → tls.rs (optional TLS handshake, SNI certificate lookup)
//!     → connection.rs (lifecycle tracking)
//!     → serve.rs (hyper connection, graceful close on drain)
//!     → Hand off to the host router
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - TLS is optional and handled transparently

pub mod connection;
pub mod listener;
pub mod serve;
pub mod tls;

pub use connection::{ClientConnection, ConnectionTracker};
pub use listener::Listener;
pub use serve::Server;
pub use tls::TlsTerminator;
