//! RPC dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! POST|GET /rpc/{procedure}   → handler.rs ─┐
//! GET /rpc/ws (WebSocket)     → channel.rs ─┤
//!                                           → registry.rs (decode, run, encode)
//!                                           → api.rs procedures
//! ```
//!
//! # Design Decisions
//! - One registry serves both transports
//! - Procedure bodies never see transport details

pub mod api;
pub mod channel;
pub mod frame;
pub mod handler;
pub mod registry;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;

use crate::config::schema::RpcConfig;
use crate::lifecycle::Shutdown;
use crate::net::connection::ConnectionTracker;

pub use registry::{ProcedureError, Registry};

/// Shared state for RPC handlers.
#[derive(Clone)]
pub struct RpcState {
    pub registry: Arc<Registry>,
    pub config: RpcConfig,
    pub shutdown: Shutdown,
    pub connections: ConnectionTracker,
}

/// Routes for both transports, mounted at `/rpc`.
pub fn routes(state: RpcState) -> Router {
    Router::new()
        .route("/rpc/ws", get(channel::upgrade))
        .route("/rpc/{procedure}", get(handler::call).post(handler::call))
        .with_state(state)
}
