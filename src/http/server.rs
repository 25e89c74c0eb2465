//! Primary listener application.
//!
//! # Responsibilities
//! - Build the local app: RPC routes with the static tree as fallback,
//!   wrapped in the standard middleware chain
//! - Build the route table, one reverse proxy per upstream host
//! - Put the host router in front of both
//! - Terminate TLS when a certificate provider is configured

use std::sync::Arc;

use axum::Router;

use crate::certs::CertificateProvider;
use crate::context::AppContext;
use crate::error::EdgeError;
use crate::http::middleware::MiddlewareChain;
use crate::http::static_files;
use crate::lifecycle::Termination;
use crate::net::{Listener, Server, TlsTerminator};
use crate::proxy::{LogSink, ReverseProxy, UpstreamErrorSink, UpstreamTimeouts};
use crate::routing::{HostRouter, NotFoundDocument, RouteTable};
use crate::rpc::{self, Registry, RpcState};

pub struct EdgeServer {
    ctx: AppContext,
    registry: Arc<Registry>,
    hosts: Vec<String>,
    router: Router,
    tls: Option<Arc<TlsTerminator>>,
}

impl EdgeServer {
    pub fn new(ctx: AppContext, registry: Registry) -> Result<Self, EdgeError> {
        let provider = CertificateProvider::from_config(&ctx.config.tls, &ctx.config.hosts);
        Self::with_provider(ctx, registry, provider)
    }

    /// Build with an explicit certificate provider (`None` serves plaintext).
    pub fn with_provider(
        ctx: AppContext,
        registry: Registry,
        provider: Option<CertificateProvider>,
    ) -> Result<Self, EdgeError> {
        let config = Arc::clone(&ctx.config);
        let registry = Arc::new(registry);
        let local = local_app(&ctx, Arc::clone(&registry));

        let sink: Arc<dyn UpstreamErrorSink> = Arc::new(LogSink);
        let timeouts = UpstreamTimeouts::from(&config.timeouts);
        let table = RouteTable::build(&config.hosts, &local, |upstream| {
            ReverseProxy::new(upstream, timeouts, config.request_id, Arc::clone(&sink)).map(Arc::new)
        })?;

        let mut hosts: Vec<String> = table.hosts().map(str::to_string).collect();
        hosts.sort();

        let not_found = NotFoundDocument::load(&config.static_files.not_found_path());
        let router = HostRouter::new(table, not_found, config.request_id).into_router();

        let tls = provider.map(|provider| {
            tracing::info!(mode = ?provider.mode(), "TLS enabled");
            Arc::new(TlsTerminator::new(
                Arc::new(provider),
                config.timeouts.handshake(),
                config.tls.default_server_name.clone(),
            ))
        });

        Ok(Self {
            ctx,
            registry,
            hosts,
            router,
            tls,
        })
    }

    /// The host router, without connection handling.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Configured host names, sorted, excluding the default entry.
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn is_tls(&self) -> bool {
        self.tls.is_some()
    }

    /// Serve until the shutdown coordinator drains this listener.
    pub async fn run(self, listener: Listener) -> Termination {
        Server::new(
            self.router,
            self.tls,
            self.ctx.shutdown.clone(),
            self.ctx.connections.clone(),
            self.ctx.config.timeouts.drain(),
        )
        .run(listener)
        .await
    }
}

/// RPC routes over the static tree, inside the standard chain.
pub fn local_app(ctx: &AppContext, registry: Arc<Registry>) -> Router {
    let rpc = rpc::routes(RpcState {
        registry,
        config: ctx.config.rpc.clone(),
        shutdown: ctx.shutdown.clone(),
        connections: ctx.connections.clone(),
    });
    let app = rpc.fallback_service(static_files::service(&ctx.config.static_files));
    MiddlewareChain::standard(ctx.config.request_id).apply(app)
}
