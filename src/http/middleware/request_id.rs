//! Correlation id tagging.

use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;

use super::Interceptor;
use crate::http::request::{RequestContext, RequestIdPolicy, X_REQUEST_ID};

/// Assigns the request id and mirrors it on the request and response.
pub struct RequestIdTagging {
    policy: RequestIdPolicy,
}

impl RequestIdTagging {
    pub fn new(policy: RequestIdPolicy) -> Self {
        Self { policy }
    }
}

impl Interceptor for RequestIdTagging {
    fn name(&self) -> &'static str {
        "request_id"
    }

    fn wrap(&self, inner: Router) -> Router {
        inner.layer(middleware::from_fn_with_state(self.policy, tag_request))
    }
}

async fn tag_request(
    State(policy): State<RequestIdPolicy>,
    mut req: Request,
    next: Next,
) -> Response {
    let id = policy.resolve(req.headers());
    let id = match req.extensions().get::<RequestContext>() {
        Some(ctx) => ctx.assign_request_id(id).clone(),
        None => id,
    };

    req.headers_mut().insert(X_REQUEST_ID, id.header_value());
    req.extensions_mut().insert(id.clone());

    let mut response = next.run(req).await;
    response.headers_mut().insert(X_REQUEST_ID, id.header_value());
    response.extensions_mut().insert(id);
    response
}
