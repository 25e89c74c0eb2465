//! Diagnostics endpoints, served on their own listener.
//!
//! ```text
//! GET /status      version, shutdown phase, connections, hosts, procedures
//! GET /log-level   active filter directive
//! PUT /log-level   replace the filter (body = directive)
//! GET /metrics     Prometheus text exposition
//! ```

pub mod handlers;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;

use crate::context::AppContext;
use handlers::*;

#[derive(Clone)]
pub struct DiagState {
    pub ctx: AppContext,
    pub hosts: Arc<[String]>,
    pub procedures: Arc<[String]>,
}

impl DiagState {
    pub fn new(ctx: AppContext, hosts: Vec<String>, procedures: Vec<String>) -> Self {
        Self {
            ctx,
            hosts: hosts.into(),
            procedures: procedures.into(),
        }
    }
}

pub fn router(state: DiagState) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/log-level", get(get_log_level).put(put_log_level))
        .route("/metrics", get(get_metrics))
        .fallback(not_found)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EdgeConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    fn state() -> DiagState {
        DiagState::new(
            AppContext::new(EdgeConfig::default()),
            vec!["example.com".to_string()],
            vec!["echo".to_string(), "hello".to_string()],
        )
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn status_reports_phase_and_inventory() {
        let state = state();
        let _guard = state.ctx.connections.track();
        state.ctx.shutdown.begin_drain();

        let (status, body) =
            send(router(state), Request::get("/status").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);

        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["phase"], "draining");
        assert_eq!(json["active_connections"], 1);
        assert_eq!(json["hosts"][0], "example.com");
        assert_eq!(json["procedures"][1], "hello");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn log_level_without_subscriber_is_unavailable() {
        let (status, _) = send(
            router(state()),
            Request::put("/log-level").body(Body::from("debug")).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        let (status, body) =
            send(router(state()), Request::get("/admin").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, b"404 page not found\n");
    }
}
