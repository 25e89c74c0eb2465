//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the edge server.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::http::request::RequestIdPolicy;

/// Root configuration for the edge server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EdgeConfig {
    /// Listener configuration (primary, redirector, diagnostics).
    pub listener: ListenerConfig,

    /// TLS termination and certificate management.
    pub tls: TlsConfig,

    /// Virtual hosts, in configuration order.
    pub hosts: Vec<VirtualHostConfig>,

    /// Static file serving for the local application.
    pub static_files: StaticFilesConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// RPC surface limits.
    pub rpc: RpcConfig,

    /// Correlation id handling.
    pub request_id: RequestIdPolicy,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Primary `host:port` for application traffic.
    pub address: String,

    /// Optional plaintext `host:port` that redirects to the primary listener.
    pub redirector_address: Option<String>,

    /// Optional `host:port` for the diagnostics endpoints.
    pub diagnostics_address: Option<String>,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            address: "localhost:8000".to_string(),
            redirector_address: None,
            diagnostics_address: None,
            max_connections: 10_000,
        }
    }
}

/// How the primary listener obtains certificates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TlsMode {
    /// Plaintext HTTP.
    Off,
    /// One lazily generated certificate for every handshake.
    SelfSigned,
    /// Per-host certificates from the on-disk cache or the issuer.
    Managed,
}

/// TLS configuration for the primary listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsConfig {
    pub mode: TlsMode,

    /// Certificate cache directory used in managed mode.
    pub cert_dir: PathBuf,

    /// Server name used when a client sends no SNI.
    pub default_server_name: Option<String>,

    /// Validity of issued and self-signed certificates, in days.
    pub validity_days: u32,

    /// Cached certificates are replaced this many days before they expire.
    pub renew_before_days: u32,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            mode: TlsMode::Managed,
            cert_dir: PathBuf::from("certs"),
            default_server_name: None,
            validity_days: 90,
            renew_before_days: 30,
        }
    }
}

/// A virtual host and where its traffic goes.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct VirtualHostConfig {
    /// Host name to match (case-insensitive). Empty string is the default entry.
    pub host: String,

    /// Upstream `host:port`. When absent the host is served locally.
    #[serde(default)]
    pub upstream: Option<String>,
}

impl VirtualHostConfig {
    pub fn local(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            upstream: None,
        }
    }

    pub fn proxy(host: impl Into<String>, upstream: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            upstream: Some(upstream.into()),
        }
    }

    /// Parse the CLI form `name` or `name=upstream`.
    pub fn parse_flag(value: &str) -> Self {
        match value.split_once('=') {
            Some((host, upstream)) => Self::proxy(host.trim(), upstream.trim()),
            None => Self::local(value.trim()),
        }
    }
}

/// Static file configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    /// Web root directory.
    pub root: PathBuf,

    /// Document served for missing paths, relative to `root`.
    pub not_found: PathBuf,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            not_found: PathBuf::from("404.html"),
        }
    }
}

impl StaticFilesConfig {
    pub fn not_found_path(&self) -> PathBuf {
        self.root.join(&self.not_found)
    }
}

/// Timeout configuration for various operations, in milliseconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment.
    pub connect_ms: u64,

    /// Upstream response headers after the request is sent.
    pub response_ms: u64,

    /// Maximum gap between body frames in either direction of a proxied exchange.
    pub idle_ms: u64,

    /// TLS handshake on the primary listener.
    pub handshake_ms: u64,

    /// Grace period for in-flight work once draining starts.
    pub drain_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 5_000,
            response_ms: 30_000,
            idle_ms: 60_000,
            handshake_ms: 10_000,
            drain_ms: 10_000,
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn response(&self) -> Duration {
        Duration::from_millis(self.response_ms)
    }

    pub fn idle(&self) -> Duration {
        Duration::from_millis(self.idle_ms)
    }

    pub fn handshake(&self) -> Duration {
        Duration::from_millis(self.handshake_ms)
    }

    pub fn drain(&self) -> Duration {
        Duration::from_millis(self.drain_ms)
    }
}

/// Limits for the RPC surface.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Maximum request body for HTTP calls, in bytes.
    pub max_body_bytes: usize,

    /// Maximum size of a single channel frame, in bytes.
    pub max_frame_bytes: usize,

    /// Calls allowed in flight on one channel.
    pub max_inflight_calls: usize,

    /// A channel with no inbound frame for this long is closed.
    pub channel_idle_secs: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 1024 * 1024,
            max_frame_bytes: 1024 * 1024,
            max_inflight_calls: 64,
            channel_idle_secs: 300,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Human,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Install a log subscriber at all.
    pub log_enabled: bool,

    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    pub log_format: LogFormat,

    /// Append logs to this file instead of stdout.
    pub log_file: Option<PathBuf>,

    /// ANSI colors for human output on a terminal.
    pub log_color: bool,

    /// Install the Prometheus recorder.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_enabled: true,
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            log_file: None,
            log_color: true,
            metrics_enabled: true,
        }
    }
}
