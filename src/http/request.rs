//! Request identity and per-request context.
//!
//! # Responsibilities
//! - Generate or propagate the correlation id (`x-request-id`)
//! - Carry per-request values (span, start time, id slot) from the init stage inward
//!
//! # Design Decisions
//! - The id slot is shared by reference, so outer stages can read the id
//!   even when an inner stage unwinds before returning a response
//! - Incoming ids are only propagated when explicitly trusted

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

/// Correlation header carried on requests, responses and upstream calls.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

const MAX_REQUEST_ID_LEN: usize = 128;

/// A validated correlation identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(HeaderValue);

impl RequestId {
    /// Generate a fresh UUID v4 identifier.
    pub fn generate() -> Self {
        let mut buf = uuid::Uuid::encode_buffer();
        let id = uuid::Uuid::new_v4().hyphenated().encode_lower(&mut buf);
        Self(HeaderValue::from_str(id).unwrap_or_else(|_| HeaderValue::from_static("unassigned")))
    }

    /// Accept an incoming header value if it is short, visible ASCII.
    pub fn from_header(value: &HeaderValue) -> Option<Self> {
        let bytes = value.as_bytes();
        if bytes.is_empty() || bytes.len() > MAX_REQUEST_ID_LEN {
            return None;
        }
        if !bytes.iter().all(|b| (0x21..=0x7e).contains(b)) {
            return None;
        }
        Some(Self(value.clone()))
    }

    pub fn as_str(&self) -> &str {
        self.0.to_str().unwrap_or_default()
    }

    pub fn header_value(&self) -> HeaderValue {
        self.0.clone()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides whether an incoming `x-request-id` is reused or replaced.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RequestIdPolicy {
    /// Reuse a valid incoming id instead of generating one.
    pub trust_incoming: bool,
}

impl RequestIdPolicy {
    pub fn resolve(&self, headers: &HeaderMap) -> RequestId {
        if self.trust_incoming {
            if let Some(id) = headers.get(X_REQUEST_ID).and_then(RequestId::from_header) {
                return id;
            }
        }
        RequestId::generate()
    }
}

/// Values attached to every locally handled request by the init stage.
#[derive(Debug, Clone)]
pub struct RequestContext {
    inner: Arc<ContextInner>,
}

#[derive(Debug)]
struct ContextInner {
    started: Instant,
    span: tracing::Span,
    request_id: OnceLock<RequestId>,
}

impl RequestContext {
    pub fn new(span: tracing::Span) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                started: Instant::now(),
                span,
                request_id: OnceLock::new(),
            }),
        }
    }

    pub fn started(&self) -> Instant {
        self.inner.started
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.inner.request_id.get()
    }

    /// Store the id for this request. The first assignment wins.
    pub fn assign_request_id(&self, id: RequestId) -> &RequestId {
        let id = self.inner.request_id.get_or_init(|| id);
        self.inner.span.record("request_id", id.as_str());
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(RequestId::generate(), RequestId::generate());
    }

    #[test]
    fn incoming_id_only_used_when_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("abc-123"));

        let trusted = RequestIdPolicy { trust_incoming: true }.resolve(&headers);
        assert_eq!(trusted.as_str(), "abc-123");

        let untrusted = RequestIdPolicy::default().resolve(&headers);
        assert_ne!(untrusted.as_str(), "abc-123");
    }

    #[test]
    fn rejects_unreasonable_ids() {
        assert!(RequestId::from_header(&HeaderValue::from_static("has space")).is_none());
        let long = "a".repeat(MAX_REQUEST_ID_LEN + 1);
        assert!(RequestId::from_header(&HeaderValue::from_str(&long).unwrap()).is_none());
    }

    #[test]
    fn first_assignment_wins() {
        let ctx = RequestContext::new(tracing::Span::none());
        let first = RequestId::generate();
        ctx.assign_request_id(first.clone());
        ctx.assign_request_id(RequestId::generate());
        assert_eq!(ctx.request_id(), Some(&first));
    }
}
