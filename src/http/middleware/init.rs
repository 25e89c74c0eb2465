//! Per-request context.

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use tracing::Instrument;

use super::Interceptor;
use crate::http::request::RequestContext;

/// Opens the request span and attaches the [`RequestContext`].
pub struct Init;

impl Interceptor for Init {
    fn name(&self) -> &'static str {
        "init"
    }

    fn wrap(&self, inner: Router) -> Router {
        inner.layer(middleware::from_fn(init))
    }
}

async fn init(mut req: Request, next: Next) -> Response {
    let span = tracing::info_span!(
        "request",
        method = %req.method(),
        path = %req.uri().path(),
        request_id = tracing::field::Empty,
    );
    req.extensions_mut().insert(RequestContext::new(span.clone()));
    next.run(req).instrument(span).await
}
