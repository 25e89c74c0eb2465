//! Reporting of upstream failures.

use crate::error::EdgeError;
use crate::http::request::RequestId;

/// Receives every proxy failure before the client sees its response.
pub trait UpstreamErrorSink: Send + Sync {
    fn report(&self, upstream: &str, request_id: &RequestId, error: &EdgeError);
}

/// Default sink: one structured error event per failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl UpstreamErrorSink for LogSink {
    fn report(&self, upstream: &str, request_id: &RequestId, error: &EdgeError) {
        tracing::error!(
            upstream,
            request_id = %request_id,
            code = error.code(),
            error = %error,
            "Upstream request failed"
        );
    }
}
