//! HTTP application layer.
//!
//! # Data Flow
//! ```text
//! Connection (net)
//!     → server.rs (host router in front of the local app)
//!     → middleware/ (init → logging → errors → recovery → request_id)
//!     → rpc routes, or static_files.rs as fallback
//!
//! Redirector listener
//!     → redirect.rs (301 to the TLS listener)
//! ```

pub mod middleware;
pub mod redirect;
pub mod request;
pub mod server;
pub mod static_files;

pub use request::{RequestId, RequestIdPolicy, X_REQUEST_ID};
pub use server::EdgeServer;
