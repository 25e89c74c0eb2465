//! Accept loop and per-connection serving.
//!
//! # Responsibilities
//! - Accept under the listener's connection limit
//! - Optionally terminate TLS, then hand the stream to hyper (HTTP/1.1, HTTP/2, upgrades)
//! - On drain: stop accepting, ask every connection to finish and close,
//!   then wait for idle, the grace period, or a forced stop
//!
//! # Design Decisions
//! - One task per connection; a failed handshake or connection never touches the loop
//! - The application is an axum `Router`; each request is a `oneshot` on a clone

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use hyper::body::Incoming;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tower::ServiceExt;

use super::connection::{ClientConnection, ConnectionTracker};
use super::listener::{ConnectionPermit, Listener, ListenerError};
use super::tls::TlsTerminator;
use crate::lifecycle::shutdown::{Shutdown, ShutdownSignal, Termination};

/// Back-off after a failed accept (e.g. out of file descriptors).
const ACCEPT_ERROR_DELAY: Duration = Duration::from_millis(50);

pub struct Server {
    app: axum::Router,
    tls: Option<Arc<TlsTerminator>>,
    shutdown: Shutdown,
    connections: ConnectionTracker,
    grace: Duration,
}

impl Server {
    pub fn new(
        app: axum::Router,
        tls: Option<Arc<TlsTerminator>>,
        shutdown: Shutdown,
        connections: ConnectionTracker,
        grace: Duration,
    ) -> Self {
        Self {
            app,
            tls,
            shutdown,
            connections,
            grace,
        }
    }

    /// Serve until drained. Returns how the drain ended.
    pub async fn run(self, listener: Listener) -> Termination {
        let mut signal = self.shutdown.subscribe();
        let address = listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_default();

        loop {
            tokio::select! {
                _ = signal.draining() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => self.spawn_connection(stream, peer, permit),
                    Err(ListenerError::Accept(e)) => {
                        tracing::warn!(address = %address, error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_ERROR_DELAY).await;
                    }
                    Err(e) => {
                        tracing::error!(address = %address, error = %e, "Listener stopped");
                        break;
                    }
                },
            }
        }

        drop(listener);
        tracing::info!(
            address = %address,
            active_connections = self.connections.active_count(),
            grace = ?self.grace,
            "Stopped accepting, draining connections"
        );

        tokio::select! {
            _ = self.connections.wait_idle() => Termination::Clean,
            _ = tokio::time::sleep(self.grace) => {
                tracing::warn!(
                    active_connections = self.connections.active_count(),
                    "Grace period expired"
                );
                Termination::GraceExpired
            }
            _ = signal.forced() => Termination::Forced,
        }
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr, permit: ConnectionPermit) {
        let guard = self.connections.track();
        let app = self.app.clone();
        let tls = self.tls.clone();
        let mut signal = self.shutdown.subscribe();

        tokio::spawn(async move {
            let _permit = permit;
            let client = ClientConnection {
                id: guard.id(),
                peer,
                tls: tls.is_some(),
            };
            let _ = stream.set_nodelay(true);

            match tls {
                Some(tls) => match tls.accept(stream).await {
                    Ok(stream) => serve_io(stream, app, client, &mut signal).await,
                    Err(e) => tracing::warn!(
                        connection_id = %client.id,
                        peer_addr = %peer,
                        error = %e,
                        "TLS handshake failed"
                    ),
                },
                None => serve_io(stream, app, client, &mut signal).await,
            }

            drop(guard);
        });
    }
}

async fn serve_io<I>(io: I, app: axum::Router, client: ClientConnection, signal: &mut ShutdownSignal)
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = hyper::service::service_fn(move |mut req: Request<Incoming>| {
        req.extensions_mut().insert(client);
        app.clone().oneshot(req.map(Body::new))
    });

    let builder = auto::Builder::new(TokioExecutor::new());
    let conn = builder.serve_connection_with_upgrades(TokioIo::new(io), service);
    let mut conn = std::pin::pin!(conn);

    tokio::select! {
        result = conn.as_mut() => {
            if let Err(e) = result {
                tracing::debug!(connection_id = %client.id, error = %e, "Connection ended with error");
            }
            return;
        }
        _ = signal.draining() => {}
    }

    conn.as_mut().graceful_shutdown();
    if let Err(e) = conn.await {
        tracing::debug!(connection_id = %client.id, error = %e, "Connection ended with error while draining");
    }
}
