//! Host lookup and dispatch.
//!
//! # Responsibilities
//! - Compile the virtual host list into an immutable table
//! - Resolve a request's host to the local application or an upstream
//! - Answer unknown hosts with the not-found document
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(1) host lookup via HashMap
//! - The empty key is the default entry; an empty host list makes everything local
//! - Explicit miss rather than silent fallthrough to some arbitrary host

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use tower::ServiceExt;

use super::matcher::{normalize_host, request_host};
use crate::config::VirtualHostConfig;
use crate::error::EdgeError;
use crate::http::request::{RequestId, RequestIdPolicy, X_REQUEST_ID};
use crate::observability::metrics;
use crate::proxy::ReverseProxy;

/// Where a host's traffic goes.
#[derive(Clone)]
pub enum Target {
    /// The in-process application (static files and RPC).
    Local(axum::Router),
    /// A reverse proxy to an upstream.
    Proxy(Arc<ReverseProxy>),
}

impl Target {
    pub fn describe(&self) -> String {
        match self {
            Target::Local(_) => "local".to_string(),
            Target::Proxy(proxy) => format!("proxy → {}", proxy.upstream()),
        }
    }
}

/// Compiled host table.
pub struct RouteTable {
    routes: HashMap<String, Target>,
}

impl RouteTable {
    /// Build the table. `proxy_for` creates the proxy for each upstream entry.
    pub fn build<F>(
        hosts: &[VirtualHostConfig],
        local: &axum::Router,
        mut proxy_for: F,
    ) -> Result<Self, EdgeError>
    where
        F: FnMut(&str) -> Result<Arc<ReverseProxy>, EdgeError>,
    {
        let mut routes = HashMap::with_capacity(hosts.len().max(1));

        if hosts.is_empty() {
            routes.insert(String::new(), Target::Local(local.clone()));
        }

        for vhost in hosts {
            let key = normalize_host(&vhost.host);
            let target = match &vhost.upstream {
                Some(upstream) => Target::Proxy(proxy_for(upstream)?),
                None => Target::Local(local.clone()),
            };
            tracing::info!(
                host = if key.is_empty() { "<default>" } else { key.as_str() },
                target = %target.describe(),
                "Virtual host configured"
            );
            if routes.insert(key.clone(), target).is_some() {
                return Err(EdgeError::Configuration(format!(
                    "duplicate virtual host {key:?}"
                )));
            }
        }

        Ok(Self { routes })
    }

    /// Exact match on the normalized host, then the default entry.
    pub fn resolve(&self, host: Option<&str>) -> Option<&Target> {
        host.and_then(|h| self.routes.get(h))
            .or_else(|| self.routes.get(""))
    }

    /// Named hosts, excluding the default entry.
    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str).filter(|h| !h.is_empty())
    }
}

/// Body served for unknown hosts and missing files.
#[derive(Debug, Clone)]
pub struct NotFoundDocument {
    body: Bytes,
    content_type: HeaderValue,
}

impl NotFoundDocument {
    /// Load the document, falling back to a plain-text message when unreadable.
    pub fn load(path: &Path) -> Self {
        match std::fs::read(path) {
            Ok(bytes) => Self {
                body: Bytes::from(bytes),
                content_type: HeaderValue::from_static("text/html; charset=utf-8"),
            },
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "No custom not-found document");
                Self::default()
            }
        }
    }

    pub fn response(&self, request_id: &RequestId) -> Response {
        let mut response = Response::new(Body::from(self.body.clone()));
        *response.status_mut() = StatusCode::NOT_FOUND;
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, self.content_type.clone());
        headers.insert(X_REQUEST_ID, request_id.header_value());
        response
    }
}

impl Default for NotFoundDocument {
    fn default() -> Self {
        Self {
            body: Bytes::from_static(b"404 page not found\n"),
            content_type: HeaderValue::from_static("text/plain; charset=utf-8"),
        }
    }
}

/// Dispatches every request on the primary listener by host.
pub struct HostRouter {
    table: RouteTable,
    not_found: NotFoundDocument,
    request_ids: RequestIdPolicy,
}

impl HostRouter {
    pub fn new(table: RouteTable, not_found: NotFoundDocument, request_ids: RequestIdPolicy) -> Self {
        Self {
            table,
            not_found,
            request_ids,
        }
    }

    pub fn into_router(self) -> axum::Router {
        axum::Router::new()
            .fallback(dispatch)
            .with_state(Arc::new(self))
    }
}

async fn dispatch(State(router): State<Arc<HostRouter>>, req: Request) -> Response {
    let host = request_host(&req);
    match router.table.resolve(host.as_deref()) {
        Some(Target::Local(app)) => match app.clone().oneshot(req).await {
            Ok(response) => response,
            Err(never) => match never {},
        },
        Some(Target::Proxy(proxy)) => proxy.forward(req).await,
        None => {
            let request_id = router.request_ids.resolve(req.headers());
            tracing::warn!(
                request_id = %request_id,
                host = host.as_deref().unwrap_or(""),
                path = %req.uri().path(),
                "No route for host"
            );
            metrics::record_routing_miss();
            router.not_found.response(&request_id)
        }
    }
}
