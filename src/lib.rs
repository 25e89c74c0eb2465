//! Virtual-host edge server library.
//!
//! Terminates client connections (optionally TLS with per-host certificates),
//! routes each request by host to the local application or a reverse proxy,
//! and serves RPC over HTTP and WebSocket.

// Core subsystems
pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod net;
pub mod routing;

// Destinations
pub mod proxy;
pub mod rpc;

// Cross-cutting concerns
pub mod certs;
pub mod diag;
pub mod lifecycle;
pub mod observability;

pub use config::EdgeConfig;
pub use context::AppContext;
pub use error::EdgeError;
pub use http::EdgeServer;
pub use lifecycle::{Shutdown, Termination};
