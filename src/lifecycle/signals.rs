//! OS signal handling.
//!
//! # Responsibilities
//! - Register SIGINT and SIGTERM (Ctrl-C on non-unix targets)
//! - First signal starts draining
//! - A second signal while draining forces termination
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - The watcher only drives the coordinator; it never exits the process itself

use super::shutdown::{Phase, Shutdown};

/// Watch for termination signals until the coordinator stops.
pub async fn watch_signals(shutdown: Shutdown) -> std::io::Result<()> {
    let mut signals = Signals::register()?;

    loop {
        let name = signals.next().await?;
        if shutdown.phase() == Phase::Stopped {
            return Ok(());
        }
        if shutdown.begin_drain() {
            tracing::info!(signal = name, "Shutdown requested, draining");
        } else if shutdown.force() {
            tracing::warn!(signal = name, "Second signal received, forcing shutdown");
            return Ok(());
        }
    }
}

#[cfg(unix)]
struct Signals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    fn register() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    async fn next(&mut self) -> std::io::Result<&'static str> {
        tokio::select! {
            received = self.interrupt.recv() => received.map(|_| "SIGINT"),
            received = self.terminate.recv() => received.map(|_| "SIGTERM"),
        }
        .ok_or_else(|| std::io::Error::other("signal stream closed"))
    }
}

#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
impl Signals {
    fn register() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn next(&mut self) -> std::io::Result<&'static str> {
        tokio::signal::ctrl_c().await.map(|_| "ctrl-c")
    }
}
