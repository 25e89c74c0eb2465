//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the procedure registry and the primary application
//! - Bind the primary, diagnostics and redirector listeners
//! - Run every listener under the shared shutdown coordinator
//!
//! # Design Decisions
//! - Fail fast: any bind or construction error is fatal
//! - All listeners bind before any of them serves traffic
//! - Only the primary listener decides the termination outcome

use std::net::SocketAddr;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::shutdown::{Shutdown, Termination};
use super::signals;
use crate::context::AppContext;
use crate::diag::{self, DiagState};
use crate::error::EdgeError;
use crate::http::{redirect, EdgeServer};
use crate::net::{ConnectionTracker, Listener, Server};
use crate::rpc::{api, Registry};

/// Connection limit for the diagnostics listener.
const DIAGNOSTICS_MAX_CONNECTIONS: usize = 64;

/// A started server and its bound addresses.
pub struct RunningServer {
    pub address: SocketAddr,
    pub diagnostics_address: Option<SocketAddr>,
    pub redirector_address: Option<SocketAddr>,
    shutdown: Shutdown,
    primary: JoinHandle<Termination>,
}

impl RunningServer {
    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Wait for the primary listener to finish draining, then mark the process stopped.
    pub async fn wait(self) -> Termination {
        let termination = match self.primary.await {
            Ok(termination) => termination,
            Err(e) => {
                tracing::error!(error = %e, "Primary listener task failed");
                Termination::GraceExpired
            }
        };
        self.shutdown.finish();
        termination
    }
}

/// Bind and serve with the built-in procedures.
pub async fn start(ctx: AppContext) -> Result<RunningServer, EdgeError> {
    start_with(ctx, api::registry()?).await
}

pub async fn start_with(ctx: AppContext, registry: Registry) -> Result<RunningServer, EdgeError> {
    let config = &ctx.config;
    let server = EdgeServer::new(ctx.clone(), registry)?;

    let primary = bind(&config.listener.address, config.listener.max_connections).await?;
    let address = primary.local_addr()?;
    tracing::info!(
        address = %address,
        tls = server.is_tls(),
        hosts = server.hosts().len(),
        "Edge server listening"
    );

    let diagnostics_address = match &config.listener.diagnostics_address {
        Some(bind_address) => {
            let listener = bind(bind_address, DIAGNOSTICS_MAX_CONNECTIONS).await?;
            let local = listener.local_addr()?;
            let state = DiagState::new(
                ctx.clone(),
                server.hosts().to_vec(),
                server.registry().names().into_iter().map(str::to_string).collect(),
            );
            spawn_auxiliary(diag::router(state), &ctx, listener);
            tracing::info!(address = %local, "Diagnostics listening");
            Some(local)
        }
        None => None,
    };

    let redirector_address = match &config.listener.redirector_address {
        Some(bind_address) => {
            let listener = bind(bind_address, config.listener.max_connections).await?;
            let local = listener.local_addr()?;
            spawn_auxiliary(redirect::router(address.port()), &ctx, listener);
            tracing::info!(address = %local, primary_port = address.port(), "Redirector listening");
            Some(local)
        }
        None => None,
    };

    let primary = tokio::spawn(server.run(primary));

    Ok(RunningServer {
        address,
        diagnostics_address,
        redirector_address,
        shutdown: ctx.shutdown.clone(),
        primary,
    })
}

/// Start, watch OS signals, and serve until shutdown completes.
pub async fn run(ctx: AppContext) -> Result<Termination, EdgeError> {
    let running = start(ctx).await?;

    let shutdown = running.shutdown().clone();
    tokio::spawn(async move {
        if let Err(e) = signals::watch_signals(shutdown).await {
            tracing::error!(error = %e, "Signal handling failed");
        }
    });

    let termination = running.wait().await;
    tracing::info!(?termination, exit_code = termination.exit_code(), "Shutdown complete");
    Ok(termination)
}

async fn bind(address: &str, max_connections: usize) -> Result<Listener, EdgeError> {
    Listener::bind(address, max_connections)
        .await
        .map_err(|e| EdgeError::Configuration(e.to_string()))
}

/// Diagnostics and redirector listeners stop accepting on drain and close
/// their connections without a grace period of their own.
fn spawn_auxiliary(app: axum::Router, ctx: &AppContext, listener: Listener) {
    let server = Server::new(
        app,
        None,
        ctx.shutdown.clone(),
        ConnectionTracker::unmetered(),
        Duration::ZERO,
    );
    tokio::spawn(server.run(listener));
}
