//! Process-wide handles passed explicitly at construction.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::EdgeConfig;
use crate::lifecycle::Shutdown;
use crate::net::ConnectionTracker;
use crate::observability::logging::LogControl;

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<EdgeConfig>,
    pub shutdown: Shutdown,
    pub connections: ConnectionTracker,
    /// Present when a log subscriber was installed.
    pub log_control: Option<LogControl>,
    /// Present when the Prometheus recorder was installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppContext {
    pub fn new(config: EdgeConfig) -> Self {
        Self {
            config: Arc::new(config),
            shutdown: Shutdown::new(),
            connections: ConnectionTracker::new(),
            log_control: None,
            metrics: None,
        }
    }

    pub fn with_log_control(mut self, log_control: Option<LogControl>) -> Self {
        self.log_control = log_control;
        self
    }

    pub fn with_metrics(mut self, metrics: Option<PrometheusHandle>) -> Self {
        self.metrics = metrics;
        self
    }
}
