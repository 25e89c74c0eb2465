//! Error normalization.
//!
//! Handlers fail by returning an [`EdgeError`](crate::error::EdgeError); its
//! response carries an [`ErrorReport`] extension. This stage re-renders that
//! report with the request's correlation id so every failure has one shape.

use axum::extract::Request;
use axum::http::header;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;

use super::Interceptor;
use crate::error::ErrorReport;
use crate::http::request::RequestContext;

pub struct ErrorNormalization;

impl Interceptor for ErrorNormalization {
    fn name(&self) -> &'static str {
        "errors"
    }

    fn wrap(&self, inner: Router) -> Router {
        inner.layer(middleware::from_fn(normalize_errors))
    }
}

async fn normalize_errors(req: Request, next: Next) -> Response {
    let ctx = req.extensions().get::<RequestContext>().cloned();
    let mut response = next.run(req).await;

    let Some(report) = response.extensions_mut().remove::<ErrorReport>() else {
        return response;
    };

    let request_id = ctx.as_ref().and_then(RequestContext::request_id);
    let (mut parts, _) = response.into_parts();
    let (rendered, body) = report.render(request_id).into_parts();

    parts.headers.remove(header::CONTENT_TYPE);
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.extend(rendered.headers);
    parts.status = rendered.status;
    Response::from_parts(parts, body)
}
