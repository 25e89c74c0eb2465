//! Shutdown coordination for the edge server.
//!
//! # Responsibilities
//! - Hold the process phase (`Running → Draining → Stopped`)
//! - Hold the one-shot `forced` flag
//! - Let any task wait for draining or forcing to begin
//!
//! # Design Decisions
//! - Watch channels, not broadcast: late subscribers still see the current phase
//! - `send_if_modified` makes every transition exactly-once under concurrent callers

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

/// Process phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Running,
    Draining,
    Stopped,
}

/// How the server stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// All in-flight work finished within the grace period.
    Clean,
    /// The grace period ran out with work still in flight.
    GraceExpired,
    /// A second signal arrived while draining.
    Forced,
}

impl Termination {
    pub fn exit_code(self) -> u8 {
        match self {
            Termination::Clean => 0,
            Termination::GraceExpired => 1,
            Termination::Forced => 2,
        }
    }
}

/// Coordinator for graceful shutdown.
///
/// Cheap to clone; every clone drives the same state.
#[derive(Debug, Clone)]
pub struct Shutdown {
    phase: Arc<watch::Sender<Phase>>,
    forced: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    /// Create a new coordinator in the `Running` phase.
    pub fn new() -> Self {
        let (phase, _) = watch::channel(Phase::Running);
        let (forced, _) = watch::channel(false);
        Self {
            phase: Arc::new(phase),
            forced: Arc::new(forced),
        }
    }

    /// `Running → Draining`. Returns `true` only for the caller that made the transition.
    pub fn begin_drain(&self) -> bool {
        let changed = self.phase.send_if_modified(|phase| {
            if *phase == Phase::Running {
                *phase = Phase::Draining;
                true
            } else {
                false
            }
        });
        if changed {
            tracing::info!("Draining started");
        }
        changed
    }

    /// Set the forced flag. Returns `true` only for the first caller.
    pub fn force(&self) -> bool {
        let changed = self.forced.send_if_modified(|forced| {
            if *forced {
                false
            } else {
                *forced = true;
                true
            }
        });
        if changed {
            tracing::warn!("Forced shutdown requested");
        }
        changed
    }

    /// Move to `Stopped`. Returns `true` only for the first caller.
    pub fn finish(&self) -> bool {
        self.phase.send_if_modified(|phase| {
            if *phase == Phase::Stopped {
                false
            } else {
                *phase = Phase::Stopped;
                true
            }
        })
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Subscribe to phase changes.
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            phase: self.phase.subscribe(),
            forced: self.forced.subscribe(),
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// A task's view of the coordinator. The wait methods are cancel-safe and
/// return immediately once the condition already holds.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    phase: watch::Receiver<Phase>,
    forced: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolves once the phase has left `Running`.
    pub async fn draining(&mut self) {
        if self.phase.wait_for(|p| *p != Phase::Running).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Resolves once a forced shutdown has been requested.
    pub async fn forced(&mut self) {
        if self.forced.wait_for(|f| *f).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn transitions_happen_once() {
        let shutdown = Shutdown::new();
        assert_eq!(shutdown.phase(), Phase::Running);

        assert!(shutdown.begin_drain());
        assert!(!shutdown.begin_drain());
        assert_eq!(shutdown.phase(), Phase::Draining);

        assert!(shutdown.force());
        assert!(!shutdown.force());

        assert!(shutdown.finish());
        assert!(!shutdown.finish());
        assert_eq!(shutdown.phase(), Phase::Stopped);
        assert!(!shutdown.begin_drain());
    }

    #[tokio::test]
    async fn concurrent_drain_requests_transition_once() {
        let shutdown = Shutdown::new();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move { shutdown.begin_drain() }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn subscribers_wake_and_late_subscribers_see_state() {
        let shutdown = Shutdown::new();
        let mut early = shutdown.subscribe();
        let waiter = tokio::spawn(async move { early.draining().await });

        shutdown.begin_drain();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();

        let mut late = shutdown.subscribe();
        tokio::time::timeout(Duration::from_millis(100), late.draining())
            .await
            .unwrap();
    }

    #[test]
    fn exit_codes() {
        assert_eq!(Termination::Clean.exit_code(), 0);
        assert_eq!(Termination::GraceExpired.exit_code(), 1);
        assert_eq!(Termination::Forced.exit_code(), 2);
    }
}
