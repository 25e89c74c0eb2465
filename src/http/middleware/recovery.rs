//! Panic recovery.
//!
//! The only place a panic is caught. Everything inside this stage runs under
//! `catch_unwind`; a fault becomes a 500 for that request and the connection
//! and listener carry on.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use futures_util::FutureExt;

use super::Interceptor;
use crate::error::EdgeError;
use crate::http::request::{RequestContext, RequestId, X_REQUEST_ID};

pub struct PanicRecovery;

impl Interceptor for PanicRecovery {
    fn name(&self) -> &'static str {
        "recovery"
    }

    fn wrap(&self, inner: Router) -> Router {
        inner.layer(middleware::from_fn(recover))
    }
}

async fn recover(req: Request, next: Next) -> Response {
    let ctx = req.extensions().get::<RequestContext>().cloned();

    match AssertUnwindSafe(next.run(req)).catch_unwind().await {
        Ok(response) => response,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            let request_id = ctx.as_ref().and_then(RequestContext::request_id);
            let id = request_id.map(RequestId::as_str).unwrap_or_default();
            tracing::error!(
                request_id = %id,
                panic = %message,
                "Handler panicked"
            );

            let error = EdgeError::HandlerFault(message);
            let report = error.report();
            let mut response = report.render(request_id);
            if let Some(id) = request_id {
                response.headers_mut().insert(X_REQUEST_ID, id.header_value());
            }
            response.extensions_mut().insert(report);
            response
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
