//! Host extraction and normalization.
//!
//! # Responsibilities
//! - Pull the host from the `Host` header, or the URI authority (HTTP/2)
//! - Strip the port, including from bracketed IPv6 literals
//! - Normalize case so lookups are case-insensitive
//!
//! # Design Decisions
//! - Exact match only; no glob or suffix patterns
//! - The empty string is reserved for the default route

use axum::http::{header, Request};

/// Reduce a raw host (optionally with port) to its lookup key.
pub fn normalize_host(raw: &str) -> String {
    let raw = raw.trim();
    let host = if let Some(rest) = raw.strip_prefix('[') {
        rest.split(']').next().unwrap_or(rest)
    } else if raw.matches(':').count() == 1 {
        raw.split(':').next().unwrap_or(raw)
    } else {
        raw
    };
    host.trim_end_matches('.').to_ascii_lowercase()
}

/// The normalized host a request is addressed to, if it names one.
pub fn request_host<B>(req: &Request<B>) -> Option<String> {
    let raw = req
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| req.uri().authority().map(|a| a.as_str()))?;
    let host = normalize_host(raw);
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}
