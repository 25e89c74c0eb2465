//! Forwarding to a single upstream.
//!
//! # Responsibilities
//! - Rewrite the request for the upstream (URI, Host, forwarded headers, id)
//! - Enforce connect, response and idle timeouts
//! - Classify failures and hand them to the error sink
//! - Stream the response back without buffering
//!
//! # Design Decisions
//! - No retries: a failed exchange is reported, never replayed
//! - One pooled client per upstream

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::uri::{Authority, Scheme};
use axum::http::{header, HeaderValue, Method, Request, Response, Uri, Version};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::{TokioExecutor, TokioTimer};

use super::body::{IdleTimeout, IdleTimeoutBody};
use super::headers;
use super::sink::UpstreamErrorSink;
use crate::config::TimeoutConfig;
use crate::error::EdgeError;
use crate::http::request::{RequestId, RequestIdPolicy, X_REQUEST_ID};
use crate::net::connection::ClientConnection;
use crate::observability::metrics;

/// Timeouts applied to one proxied exchange.
#[derive(Debug, Clone, Copy)]
pub struct UpstreamTimeouts {
    pub connect: Duration,
    pub response: Duration,
    pub idle: Duration,
}

impl From<&TimeoutConfig> for UpstreamTimeouts {
    fn from(config: &TimeoutConfig) -> Self {
        Self {
            connect: config.connect(),
            response: config.response(),
            idle: config.idle(),
        }
    }
}

/// Reverse proxy to one `host:port` upstream over plain HTTP.
pub struct ReverseProxy {
    upstream: String,
    authority: Authority,
    host_header: HeaderValue,
    client: Client<HttpConnector, Body>,
    timeouts: UpstreamTimeouts,
    request_ids: RequestIdPolicy,
    sink: Arc<dyn UpstreamErrorSink>,
}

impl ReverseProxy {
    pub fn new(
        upstream: &str,
        timeouts: UpstreamTimeouts,
        request_ids: RequestIdPolicy,
        sink: Arc<dyn UpstreamErrorSink>,
    ) -> Result<Self, EdgeError> {
        let authority: Authority = upstream.parse().map_err(|e| {
            EdgeError::Configuration(format!("invalid upstream {upstream:?}: {e}"))
        })?;
        let host_header = HeaderValue::from_str(authority.as_str()).map_err(|e| {
            EdgeError::Configuration(format!("invalid upstream {upstream:?}: {e}"))
        })?;

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(timeouts.connect));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(timeouts.idle)
            .build(connector);

        Ok(Self {
            upstream: upstream.to_string(),
            authority,
            host_header,
            client,
            timeouts,
            request_ids,
            sink,
        })
    }

    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    /// Forward one request. Failures become canonical error responses.
    pub async fn forward(&self, req: Request<Body>) -> Response<Body> {
        let started = Instant::now();
        let request_id = self.request_ids.resolve(req.headers());
        let method = req.method().clone();
        let (mut parts, body) = req.into_parts();

        let connection = parts.extensions.get::<ClientConnection>().copied();
        let original_host = parts
            .headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .or_else(|| parts.uri.authority().map(|a| a.to_string()));
        let proto = match connection {
            Some(c) if c.tls => "https",
            _ => "http",
        };

        headers::strip_hop_by_hop(&mut parts.headers);
        headers::set_forwarded(
            &mut parts.headers,
            connection.map(|c| c.peer.ip()),
            original_host.as_deref(),
            proto,
        );
        parts.headers.insert(header::HOST, self.host_header.clone());
        parts.headers.insert(X_REQUEST_ID, request_id.header_value());
        parts.version = Version::HTTP_11;
        parts.uri = match self.upstream_uri(&parts.uri) {
            Ok(uri) => uri,
            Err(e) => return self.fail(e, &request_id, &method, started),
        };

        tracing::debug!(
            request_id = %request_id,
            upstream = %self.upstream,
            method = %method,
            path = %parts.uri.path(),
            "Proxying request"
        );

        let mut upload = IdleTimeoutBody::new(body, self.timeouts.idle);
        let uploaded = upload.watch_end();
        let outbound = Request::from_parts(parts, Body::new(upload));

        // The response deadline starts once the request body is fully sent;
        // a slow upload is bounded by the idle timeout instead.
        let exchange = self.client.request(outbound);
        tokio::pin!(exchange);
        let early = tokio::select! {
            result = &mut exchange => Some(result),
            _ = uploaded => None,
        };
        let result = match early {
            Some(result) => Ok(result),
            None => tokio::time::timeout(self.timeouts.response, &mut exchange).await,
        };

        let response = match result {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                let error = self.classify(&e);
                return self.fail(error, &request_id, &method, started);
            }
            Err(_) => {
                let error = EdgeError::UpstreamTimeout {
                    upstream: self.upstream.clone(),
                    stage: "response",
                };
                return self.fail(error, &request_id, &method, started);
            }
        };

        let (mut parts, body) = response.into_parts();
        headers::strip_hop_by_hop(&mut parts.headers);
        parts
            .headers
            .entry(X_REQUEST_ID)
            .or_insert_with(|| request_id.header_value());
        parts.extensions.insert(request_id);

        metrics::record_request("proxy", method.as_str(), parts.status.as_u16(), started);

        Response::from_parts(
            parts,
            Body::new(IdleTimeoutBody::new(body, self.timeouts.idle)),
        )
    }

    fn upstream_uri(&self, original: &Uri) -> Result<Uri, EdgeError> {
        let path_and_query = original
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
            .map_err(|e| EdgeError::UpstreamUnavailable {
                upstream: self.upstream.clone(),
                reason: e.to_string(),
            })
    }

    /// Idle stalls are timeouts (504). Everything else, including a connect
    /// deadline, means the upstream could not be reached (502).
    fn classify(&self, error: &hyper_util::client::legacy::Error) -> EdgeError {
        let upstream = self.upstream.clone();
        if stalled(error) {
            return EdgeError::UpstreamTimeout {
                upstream,
                stage: "idle",
            };
        }
        let reason = if error.is_connect() && connect_timed_out(error) {
            format!("connect timed out after {:?}", self.timeouts.connect)
        } else {
            describe(error)
        };
        EdgeError::UpstreamUnavailable { upstream, reason }
    }

    fn fail(
        &self,
        error: EdgeError,
        request_id: &RequestId,
        method: &Method,
        started: Instant,
    ) -> Response<Body> {
        self.sink.report(&self.upstream, request_id, &error);
        metrics::record_upstream_failure(&self.upstream, error.code());
        metrics::record_request("proxy", method.as_str(), error.status().as_u16(), started);

        let mut response = error.report().render(Some(request_id));
        response.extensions_mut().insert(request_id.clone());
        response
    }
}

fn sources<'a>(
    error: &'a hyper_util::client::legacy::Error,
) -> impl Iterator<Item = &'a (dyn std::error::Error + 'static)> {
    std::iter::successors(
        Some(error as &(dyn std::error::Error + 'static)),
        |err| <dyn std::error::Error>::source(*err),
    )
}

/// Whether a body on either side went idle for too long.
fn stalled(error: &hyper_util::client::legacy::Error) -> bool {
    sources(error).any(|err| err.downcast_ref::<IdleTimeout>().is_some())
}

fn connect_timed_out(error: &hyper_util::client::legacy::Error) -> bool {
    let io_timeout = sources(error).any(|err| {
        err.downcast_ref::<std::io::Error>()
            .is_some_and(|io| io.kind() == std::io::ErrorKind::TimedOut)
    });
    // The connector reports its own deadline as a bare message, not an io::Error.
    io_timeout || describe(error).contains("timed out")
}

fn describe(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(err) = source {
        message.push_str(": ");
        message.push_str(&err.to_string());
        source = err.source();
    }
    message
}
