//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Build registry and app → Bind listeners → Serve
//!
//! Shutdown (shutdown.rs):
//!     Running → Draining (stop accepting, finish in-flight work) → Stopped
//!
//! Signals (signals.rs):
//!     First SIGTERM/SIGINT → drain
//!     Second signal while draining → force
//! ```
//!
//! # Design Decisions
//! - Listeners bind last, after every subsystem is built
//! - Draining is bounded by the grace period; exit code reports how it ended

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Phase, Shutdown, ShutdownSignal, Termination};
pub use startup::RunningServer;
