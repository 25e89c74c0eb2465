//! Reverse proxy subsystem.
//!
//! # Data Flow
//! ```text
//! Request for a proxied host
//!     → headers.rs (strip hop-by-hop, add X-Forwarded-*)
//!     → upstream.rs (rewrite URI and Host, pooled client, timeouts)
//!     → body.rs (idle timeout on streamed bodies, both directions)
//!     → sink.rs (failure reporting)
//!     → Response streamed back to the client
//! ```

pub mod body;
pub mod headers;
pub mod sink;
pub mod upstream;

pub use sink::{LogSink, UpstreamErrorSink};
pub use upstream::{ReverseProxy, UpstreamTimeouts};
