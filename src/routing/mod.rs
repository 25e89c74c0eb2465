//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (Host header or URI authority)
//!     → matcher.rs (extract and normalize the host)
//!     → router.rs (host table lookup)
//!     → Return: local application, upstream proxy, or not-found
//!
//! Table Compilation (at startup):
//!     VirtualHostConfig[]
//!     → Normalize host names
//!     → Reject duplicates
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Table compiled at startup, immutable at runtime
//! - Exact host match only, then the default entry
//! - Deterministic: same host always reaches the same target

pub mod matcher;
pub mod router;

pub use router::{HostRouter, NotFoundDocument, RouteTable, Target};
