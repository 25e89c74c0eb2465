//! Plaintext redirector to the primary encrypted listener.
//!
//! Every request is answered with `301 Moved Permanently` to
//! `https://<host>[:<primary port>]<path and query>`. The port is omitted when
//! the primary listener is on 443.

use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;

const HTTPS_PORT: u16 = 443;

pub fn router(primary_port: u16) -> Router {
    Router::new().fallback(redirect).with_state(primary_port)
}

async fn redirect(State(primary_port): State<u16>, headers: HeaderMap, uri: Uri) -> Response {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| uri.host());

    let Some(host) = host.filter(|h| !h.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "missing host\n").into_response();
    };

    let target = location(host, primary_port, &uri);
    match HeaderValue::from_str(&target) {
        Ok(value) => {
            tracing::debug!(location = %target, "Redirecting to TLS listener");
            (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, value)]).into_response()
        }
        Err(_) => (StatusCode::BAD_REQUEST, "invalid host\n").into_response(),
    }
}

/// Redirect target for a request that arrived with `host` (port optional).
pub fn location(host: &str, primary_port: u16, uri: &Uri) -> String {
    let name = strip_port(host);
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    if primary_port == HTTPS_PORT {
        format!("https://{name}{path}")
    } else {
        format!("https://{name}:{primary_port}{path}")
    }
}

/// Host without its port; IPv6 literals keep their brackets.
fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}
