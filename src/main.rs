//! edge-gateway
//!
//! Virtual-host edge server built with Tokio, hyper and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ net (listener, TLS/SNI) ──▶ routing (host router)
//!                                               │
//!                      ┌────────────────────────┴──────────────┐
//!                      ▼                                       ▼
//!             http::middleware chain                      proxy (upstream)
//!                      │
//!            ┌─────────┴─────────┐
//!            ▼                   ▼
//!       rpc (HTTP, WS)     static files
//!
//!     Cross-cutting: config, certs, lifecycle, observability, diag
//! ```

use std::process::ExitCode;

use clap::Parser;

use edge_gateway::config::cli::Cli;
use edge_gateway::config::loader::read_config;
use edge_gateway::config::validation::validate_config;
use edge_gateway::config::EdgeConfig;
use edge_gateway::lifecycle::startup;
use edge_gateway::observability::{logging, metrics};
use edge_gateway::AppContext;

/// Exit status for configuration and startup failures (EX_CONFIG).
const EXIT_CONFIG: u8 = 78;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match read_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("edge-gateway: {}: {e}", path.display());
                return ExitCode::from(EXIT_CONFIG);
            }
        },
        None => EdgeConfig::default(),
    };
    cli.apply(&mut config);

    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            eprintln!("edge-gateway: {error}");
        }
        return ExitCode::from(EXIT_CONFIG);
    }

    let log_control = match logging::init_logging(&config.observability, cli.verbosity) {
        Ok(control) => control,
        Err(e) => {
            eprintln!("edge-gateway: {e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    logging::install_panic_hook();

    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        tracing::debug!("Crypto provider already installed");
    }

    let metrics = if config.observability.metrics_enabled {
        metrics::init_metrics()
    } else {
        None
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        address = %config.listener.address,
        tls = ?config.tls.mode,
        hosts = config.hosts.len(),
        "edge-gateway starting"
    );

    let ctx = AppContext::new(config)
        .with_log_control(log_control)
        .with_metrics(metrics);

    match startup::run(ctx).await {
        Ok(termination) => ExitCode::from(termination.exit_code()),
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            eprintln!("edge-gateway: {e}");
            ExitCode::from(EXIT_CONFIG)
        }
    }
}
