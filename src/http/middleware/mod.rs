//! Middleware chain for the local application.
//!
//! # Data Flow
//! ```text
//! Request path (outermost first):
//!     init → logging → errors → recovery → request_id → handler
//! Response path runs in reverse.
//! ```
//!
//! # Design Decisions
//! - Stages are trait objects so the order is data, fixed at startup
//! - Each stage is an axum `from_fn` layer; no per-request allocation for the chain itself
//! - The request id is assigned innermost but stored in the shared context,
//!   so every outer stage sees it, even after a panic

pub mod errors;
pub mod init;
pub mod logging;
pub mod recovery;
pub mod request_id;

use axum::Router;

use crate::http::request::RequestIdPolicy;

pub use errors::ErrorNormalization;
pub use init::Init;
pub use logging::RequestLogging;
pub use recovery::PanicRecovery;
pub use request_id::RequestIdTagging;

/// One stage of the chain.
pub trait Interceptor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Wrap everything inside this stage.
    fn wrap(&self, inner: Router) -> Router;
}

/// Ordered stages. Construction order is request-path execution order.
#[derive(Default)]
pub struct MiddlewareChain {
    stages: Vec<Box<dyn Interceptor>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage inside all stages added so far.
    pub fn with(mut self, stage: impl Interceptor + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// The chain every local request passes through.
    pub fn standard(request_ids: RequestIdPolicy) -> Self {
        Self::new()
            .with(Init)
            .with(RequestLogging)
            .with(ErrorNormalization)
            .with(PanicRecovery)
            .with(RequestIdTagging::new(request_ids))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Wrap `app`; the first stage ends up outermost.
    pub fn apply(&self, app: Router) -> Router {
        self.stages
            .iter()
            .rev()
            .fold(app, |inner, stage| stage.wrap(inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EdgeError;
    use crate::http::request::X_REQUEST_ID;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use http_body_util::BodyExt;
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    struct Recorder {
        name: &'static str,
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl Interceptor for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn wrap(&self, inner: Router) -> Router {
            let name = self.name;
            let seen = Arc::clone(&self.seen);
            inner.layer(axum::middleware::from_fn(
                move |req: axum::extract::Request, next: axum::middleware::Next| {
                    let seen = Arc::clone(&seen);
                    async move {
                        seen.lock().unwrap().push(format!("{name}:req"));
                        let response = next.run(req).await;
                        seen.lock().unwrap().push(format!("{name}:res"));
                        response
                    }
                },
            ))
        }
    }

    async fn panics() -> &'static str {
        panic!("handler exploded")
    }

    async fn fails() -> Result<&'static str, EdgeError> {
        Err(EdgeError::InvalidInput {
            procedure: "echo".into(),
            reason: "expected a string".into(),
        })
    }

    fn app() -> Router {
        let routes = Router::new()
            .route("/ok", get(|| async { "ok" }))
            .route("/panic", get(panics))
            .route("/fail", get(fails));
        MiddlewareChain::standard(RequestIdPolicy::default()).apply(routes)
    }

    #[tokio::test]
    async fn construction_order_is_request_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let chain = MiddlewareChain::new()
            .with(Recorder { name: "a", seen: Arc::clone(&seen) })
            .with(Recorder { name: "b", seen: Arc::clone(&seen) });
        assert_eq!(chain.names(), vec!["a", "b"]);

        let app = chain.apply(Router::new().route("/", get(|| async { "ok" })));
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        app.oneshot(req).await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["a:req", "b:req", "b:res", "a:res"]
        );
    }

    #[tokio::test]
    async fn standard_order() {
        let chain = MiddlewareChain::standard(RequestIdPolicy::default());
        assert_eq!(
            chain.names(),
            vec!["init", "logging", "errors", "recovery", "request_id"]
        );
    }

    #[tokio::test]
    async fn every_response_carries_request_id() {
        let req = Request::builder().uri("/ok").body(Body::empty()).unwrap();
        let response = app().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(X_REQUEST_ID));
    }

    #[tokio::test]
    async fn panic_becomes_500_with_request_id() {
        let req = Request::builder().uri("/panic").body(Body::empty()).unwrap();
        let response = app().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let header_id = response.headers()[X_REQUEST_ID].to_str().unwrap().to_string();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "internal_error");
        assert_eq!(json["error"]["request_id"], header_id.as_str());
        assert!(!json["error"]["message"].as_str().unwrap().contains("exploded"));
    }

    #[tokio::test]
    async fn handler_errors_are_normalized() {
        let req = Request::builder().uri("/fail").body(Body::empty()).unwrap();
        let response = app().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let header_id = response.headers()[X_REQUEST_ID].to_str().unwrap().to_string();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "invalid_input");
        assert_eq!(json["error"]["request_id"], header_id.as_str());
    }

    #[tokio::test]
    async fn trusted_incoming_id_is_echoed() {
        let routes = Router::new().route("/ok", get(|| async { "ok" }));
        let app = MiddlewareChain::standard(RequestIdPolicy { trust_incoming: true }).apply(routes);
        let req = Request::builder()
            .uri("/ok")
            .header(X_REQUEST_ID, "trace-42")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.headers()[X_REQUEST_ID], "trace-42");
    }
}
