use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use super::DiagState;
use crate::lifecycle::shutdown::Phase;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub phase: Phase,
    pub active_connections: u64,
    pub hosts: Vec<String>,
    pub procedures: Vec<String>,
}

pub async fn get_status(State(state): State<DiagState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        phase: state.ctx.shutdown.phase(),
        active_connections: state.ctx.connections.active_count(),
        hosts: state.hosts.to_vec(),
        procedures: state.procedures.to_vec(),
    })
}

pub async fn get_log_level(State(state): State<DiagState>) -> Response {
    match &state.ctx.log_control {
        Some(control) => format!("{}\n", control.current()).into_response(),
        None => logging_disabled(),
    }
}

/// The body is a filter directive, e.g. `debug` or `edge_gateway=trace,hyper=info`.
pub async fn put_log_level(State(state): State<DiagState>, body: String) -> Response {
    let Some(control) = &state.ctx.log_control else {
        return logging_disabled();
    };

    let directive = body.trim();
    match control.set(directive) {
        Ok(()) => format!("{directive}\n").into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, format!("{e}\n")).into_response(),
    }
}

pub async fn get_metrics(State(state): State<DiagState>) -> Response {
    match &state.ctx.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics disabled\n").into_response(),
    }
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "404 page not found\n")
}

fn logging_disabled() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, "logging disabled\n").into_response()
}
