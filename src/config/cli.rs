//! Command-line flags layered over the configuration file.

use std::path::PathBuf;

use clap::Parser;

use crate::config::schema::{EdgeConfig, LogFormat, TlsMode, VirtualHostConfig};

#[derive(Debug, Parser)]
#[command(name = "edge-gateway", version, about = "Virtual-host edge server with reverse proxy and RPC")]
pub struct Cli {
    /// TOML configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// The 'host:port' for the service to listen on.
    #[arg(short = 'a', long)]
    pub address: Option<String>,

    /// The 'host:port' for the diagnostics api.
    #[arg(long = "dapi-address")]
    pub diagnostics_address: Option<String>,

    /// A plaintext redirector 'host:port' to enable.
    #[arg(long)]
    pub redirector: Option<String>,

    /// Disable TLS.
    #[arg(long, conflicts_with = "self_signed")]
    pub insecure: bool,

    /// Use a generated self-signed certificate for TLS.
    #[arg(long)]
    pub self_signed: bool,

    /// Host names, as `name` (served locally) or `name=host:port` (proxied). Repeatable.
    #[arg(long = "hosts")]
    pub hosts: Vec<String>,

    /// Web root path.
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Certificate cache directory for managed TLS.
    #[arg(long = "cert-dir")]
    pub cert_dir: Option<PathBuf>,

    /// Verbosity level (-v debug, -vv trace).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Log file destination.
    #[arg(long = "log")]
    pub log_file: Option<PathBuf>,

    /// Disable the logger.
    #[arg(long)]
    pub no_log: bool,

    /// Human-readable log lines instead of JSON.
    #[arg(long)]
    pub log_humanize: bool,

    /// Disable colored log output.
    #[arg(long)]
    pub no_color: bool,
}

impl Cli {
    /// Apply every flag that was given on top of `config`.
    pub fn apply(&self, config: &mut EdgeConfig) {
        if let Some(address) = &self.address {
            config.listener.address = address.clone();
        }
        if let Some(address) = &self.diagnostics_address {
            config.listener.diagnostics_address = Some(address.clone());
        }
        if let Some(address) = &self.redirector {
            config.listener.redirector_address = Some(address.clone());
        }
        if self.insecure {
            config.tls.mode = TlsMode::Off;
        } else if self.self_signed {
            config.tls.mode = TlsMode::SelfSigned;
        }
        if !self.hosts.is_empty() {
            config.hosts = self
                .hosts
                .iter()
                .map(|flag| VirtualHostConfig::parse_flag(flag))
                .collect();
        }
        if let Some(root) = &self.root {
            config.static_files.root = root.clone();
        }
        if let Some(dir) = &self.cert_dir {
            config.tls.cert_dir = dir.clone();
        }
        if let Some(file) = &self.log_file {
            config.observability.log_file = Some(file.clone());
        }
        if self.no_log {
            config.observability.log_enabled = false;
        }
        if self.log_humanize {
            config.observability.log_format = LogFormat::Human;
        }
        if self.no_color {
            config.observability.log_color = false;
        }
    }
}
