//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate listener and upstream addresses
//! - Detect duplicate virtual hosts
//! - Validate value ranges (timeouts > 0, certificate lifetimes)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EdgeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use crate::config::schema::{EdgeConfig, TlsMode};
use crate::routing::matcher::normalize_host;

/// Longest certificate lifetime accepted, in days.
pub const MAX_VALIDITY_DAYS: u32 = 825;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: invalid address {value:?} (expected host:port)")]
    InvalidAddress { field: &'static str, value: String },

    #[error("hosts: {0:?} is listed more than once")]
    DuplicateHost(String),

    #[error("hosts: {0:?} is not a valid host name")]
    InvalidHost(String),

    #[error("tls: managed certificates need at least one named host")]
    ManagedWithoutHosts,

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("tls.validity_days: {0} exceeds the maximum of {MAX_VALIDITY_DAYS}")]
    ValidityTooLong(u32),

    #[error("tls.renew_before_days ({renew_before}) must be less than tls.validity_days ({validity})")]
    RenewalWindowTooWide { renew_before: u32, validity: u32 },
}

pub fn validate_config(config: &EdgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address("listener.address", &config.listener.address, &mut errors);
    if let Some(addr) = &config.listener.redirector_address {
        check_address("listener.redirector_address", addr, &mut errors);
    }
    if let Some(addr) = &config.listener.diagnostics_address {
        check_address("listener.diagnostics_address", addr, &mut errors);
    }

    let mut seen = HashSet::new();
    for vhost in &config.hosts {
        let key = normalize_host(&vhost.host);
        if !key.is_empty() && !is_host_name(&key) {
            errors.push(ValidationError::InvalidHost(vhost.host.clone()));
        }
        if !seen.insert(key) {
            errors.push(ValidationError::DuplicateHost(vhost.host.clone()));
        }
        if let Some(upstream) = &vhost.upstream {
            check_address("hosts.upstream", upstream, &mut errors);
        }
    }

    if config.tls.mode == TlsMode::Managed && !config.hosts.iter().any(|h| !h.host.is_empty()) {
        errors.push(ValidationError::ManagedWithoutHosts);
    }

    let nonzero = [
        ("listener.max_connections", config.listener.max_connections as u64),
        ("timeouts.connect_ms", config.timeouts.connect_ms),
        ("timeouts.response_ms", config.timeouts.response_ms),
        ("timeouts.idle_ms", config.timeouts.idle_ms),
        ("timeouts.handshake_ms", config.timeouts.handshake_ms),
        ("rpc.max_inflight_calls", config.rpc.max_inflight_calls as u64),
        ("rpc.channel_idle_secs", config.rpc.channel_idle_secs),
        ("tls.validity_days", config.tls.validity_days as u64),
    ];
    for (field, value) in nonzero {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }

    let tls = &config.tls;
    if tls.validity_days > MAX_VALIDITY_DAYS {
        errors.push(ValidationError::ValidityTooLong(tls.validity_days));
    }
    if tls.validity_days > 0 && tls.renew_before_days >= tls.validity_days {
        errors.push(ValidationError::RenewalWindowTooWide {
            renew_before: tls.renew_before_days,
            validity: tls.validity_days,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    if !is_host_port(value) {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

fn is_host_port(value: &str) -> bool {
    match value.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}

/// Host names end up as cache file names, so keep them to DNS characters.
fn is_host_name(value: &str) -> bool {
    value
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'.')
        && !value.starts_with('.')
        && !value.contains("..")
}
