//! Access logging and request metrics.

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;

use super::Interceptor;
use crate::http::request::RequestContext;
use crate::observability::metrics;

pub struct RequestLogging;

impl Interceptor for RequestLogging {
    fn name(&self) -> &'static str {
        "logging"
    }

    fn wrap(&self, inner: Router) -> Router {
        inner.layer(middleware::from_fn(log_request))
    }
}

async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let ctx = req.extensions().get::<RequestContext>().cloned();
    let started = ctx
        .as_ref()
        .map(RequestContext::started)
        .unwrap_or_else(Instant::now);

    let response = next.run(req).await;

    let status = response.status();
    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
    let request_id = ctx
        .as_ref()
        .and_then(RequestContext::request_id)
        .map(|id| id.to_string())
        .unwrap_or_default();

    if status.is_server_error() {
        tracing::warn!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status = status.as_u16(),
            latency_ms,
            "Request failed"
        );
    } else {
        tracing::info!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status = status.as_u16(),
            latency_ms,
            "Request completed"
        );
    }
    metrics::record_request("local", method.as_str(), status.as_u16(), started);

    response
}
