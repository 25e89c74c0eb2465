//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Configure log level at runtime through a reload handle
//!
//! # Design Decisions
//! - JSON format by default, human format on request
//! - `RUST_LOG` wins over the configured level
//! - The reload handle is passed explicitly to whoever may change the level

use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter, Layer, Registry};

use crate::config::schema::{LogFormat, ObservabilityConfig};
use crate::error::EdgeError;

type FilteredRegistry = Layered<reload::Layer<EnvFilter, Registry>, Registry>;

/// Runtime control over the active log filter.
#[derive(Clone)]
pub struct LogControl {
    handle: reload::Handle<EnvFilter, Registry>,
    // reload::Handle has no cheap way to read back the original directive text
    directive: Arc<Mutex<String>>,
}

impl LogControl {
    pub fn current(&self) -> String {
        self.directive
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }

    /// Replace the active filter. Invalid directives leave the old one in place.
    pub fn set(&self, directive: &str) -> Result<(), String> {
        let filter = EnvFilter::try_new(directive).map_err(|e| e.to_string())?;
        self.handle.reload(filter).map_err(|e| e.to_string())?;
        if let Ok(mut current) = self.directive.lock() {
            *current = directive.to_string();
        }
        tracing::info!(directive, "Log filter changed");
        Ok(())
    }
}

/// Build the filter directive from config and `-v` count.
pub fn filter_directive(config: &ObservabilityConfig, verbosity: u8) -> String {
    let level = match verbosity {
        0 => config.log_level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    format!("{level},hyper=warn,h2=warn,rustls=warn")
}

/// Install the global subscriber. Returns `None` when logging is disabled.
pub fn init_logging(
    config: &ObservabilityConfig,
    verbosity: u8,
) -> Result<Option<LogControl>, EdgeError> {
    if !config.log_enabled {
        return Ok(None);
    }

    let directive =
        std::env::var("RUST_LOG").unwrap_or_else(|_| filter_directive(config, verbosity));
    let filter = EnvFilter::try_new(&directive)
        .map_err(|e| EdgeError::Configuration(format!("invalid log filter {directive:?}: {e}")))?;
    let (filter, handle) = reload::Layer::new(filter);

    let (writer, ansi) = match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stdout), config.log_color),
    };

    let fmt = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi);
    let fmt: Box<dyn Layer<FilteredRegistry> + Send + Sync> = match config.log_format {
        LogFormat::Json => fmt.json().boxed(),
        LogFormat::Human => fmt.boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt)
        .try_init()
        .map_err(|e| EdgeError::Configuration(format!("failed to install logger: {e}")))?;

    Ok(Some(LogControl {
        handle,
        directive: Arc::new(Mutex::new(directive)),
    }))
}

/// Route panic messages through the logger, with location and backtrace.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_default();
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(location, backtrace = %backtrace, "{info}");
    }));
}
