//! Error taxonomy for the edge server.
//!
//! Every per-request failure maps to a status, a stable machine-readable
//! code and a public message. Internal detail stays in the logs.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use crate::http::request::{RequestId, X_REQUEST_ID};

#[derive(Debug, thiserror::Error)]
pub enum EdgeError {
    /// Startup-time problem; fatal to the process.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no route for host {host:?}")]
    RoutingMiss { host: String },

    #[error("upstream {upstream} unavailable: {reason}")]
    UpstreamUnavailable { upstream: String, reason: String },

    #[error("upstream {upstream} timed out waiting for {stage}")]
    UpstreamTimeout { upstream: String, stage: &'static str },

    #[error("procedure {procedure:?} failed: {message}")]
    ProcedureFailure { procedure: String, message: String },

    #[error("unknown procedure {0:?}")]
    UnknownProcedure(String),

    #[error("invalid input for {procedure:?}: {reason}")]
    InvalidInput { procedure: String, reason: String },

    /// A request to the channel endpoint that is not a valid WebSocket upgrade.
    #[error("websocket upgrade rejected: {reason}")]
    UpgradeRejected { status: StatusCode, reason: String },

    /// A panic recovered by the middleware chain.
    #[error("handler fault: {0}")]
    HandlerFault(String),

    #[error("certificate for {host:?} unavailable: {reason}")]
    CertificateIssuance { host: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EdgeError {
    pub fn status(&self) -> StatusCode {
        match self {
            EdgeError::RoutingMiss { .. } => StatusCode::NOT_FOUND,
            EdgeError::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
            EdgeError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            EdgeError::ProcedureFailure { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            EdgeError::UnknownProcedure(_) => StatusCode::NOT_FOUND,
            EdgeError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            EdgeError::UpgradeRejected { status, .. } => *status,
            EdgeError::Configuration(_)
            | EdgeError::HandlerFault(_)
            | EdgeError::CertificateIssuance { .. }
            | EdgeError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            EdgeError::Configuration(_) => "configuration_error",
            EdgeError::RoutingMiss { .. } => "not_found",
            EdgeError::UpstreamUnavailable { .. } => "bad_gateway",
            EdgeError::UpstreamTimeout { .. } => "gateway_timeout",
            EdgeError::ProcedureFailure { .. } => "procedure_failed",
            EdgeError::UnknownProcedure(_) => "method_not_found",
            EdgeError::InvalidInput { .. } => "invalid_input",
            EdgeError::UpgradeRejected { .. } => "upgrade_required",
            EdgeError::HandlerFault(_) | EdgeError::Io(_) => "internal_error",
            EdgeError::CertificateIssuance { .. } => "certificate_unavailable",
        }
    }

    /// Message safe to show a client.
    pub fn public_message(&self) -> String {
        match self {
            EdgeError::RoutingMiss { .. } => "no site is configured for this host".to_string(),
            EdgeError::UpstreamUnavailable { .. } => "upstream unavailable".to_string(),
            EdgeError::UpstreamTimeout { .. } => "upstream timed out".to_string(),
            EdgeError::ProcedureFailure { message, .. } => message.clone(),
            EdgeError::UnknownProcedure(name) => format!("unknown procedure {name:?}"),
            EdgeError::InvalidInput { procedure, reason } => {
                format!("invalid input for {procedure:?}: {reason}")
            }
            EdgeError::UpgradeRejected { reason, .. } => reason.clone(),
            EdgeError::Configuration(_)
            | EdgeError::HandlerFault(_)
            | EdgeError::CertificateIssuance { .. }
            | EdgeError::Io(_) => "internal server error".to_string(),
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            status: self.status(),
            code: self.code(),
            message: self.public_message(),
        }
    }
}

/// The canonical client-facing shape of a failure.
///
/// Attached to error responses as an extension so the normalization stage
/// can re-render it with the request's correlation id.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

#[derive(Serialize)]
struct Envelope<'a> {
    error: ErrorBody<'a>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<&'a str>,
}

impl ErrorReport {
    pub fn render(&self, request_id: Option<&RequestId>) -> Response {
        let body = Envelope {
            error: ErrorBody {
                code: self.code,
                message: &self.message,
                request_id: request_id.map(RequestId::as_str),
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        if let Some(id) = request_id {
            response.headers_mut().insert(X_REQUEST_ID, id.header_value());
        }
        response
    }
}

impl IntoResponse for EdgeError {
    fn into_response(self) -> Response {
        let report = self.report();
        let mut response = report.render(None);
        response.extensions_mut().insert(report);
        response
    }
}
