//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, URLs and path keys
//! - Validate value ranges (timeouts > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::{IpAddr, SocketAddr};

use thiserror::Error;
use url::Url;

use crate::config::schema::ServiceConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),

    #[error("TLS certificate and key paths must both be set")]
    TlsPaths,

    #[error("{field} must be greater than zero")]
    ZeroTimeout { field: &'static str },

    #[error("static prefix '{0}' must start with '/' and not be the root")]
    StaticPrefix(String),

    #[error("access rule path '{0}' must start with '/'")]
    AccessPath(String),

    #[error("access rule for '{path}' lists invalid IP '{ip}'")]
    AccessIp { path: String, ip: String },

    #[error("forward path '{0}' must start with '/'")]
    ForwardPath(String),

    #[error("forward target '{target}' for '{path}' is not an absolute http(s) URL")]
    ForwardTarget { path: String, target: String },
}

/// Validate a configuration, collecting every problem.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.trim().is_empty() || tls.key_path.trim().is_empty() {
            errors.push(ValidationError::TlsPaths);
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout { field: "timeouts.request_secs" });
    }
    if config.timeouts.shutdown_grace_secs == 0 {
        errors.push(ValidationError::ZeroTimeout { field: "timeouts.shutdown_grace_secs" });
    }

    for prefix in config.statics.keys() {
        if !prefix.starts_with('/') || prefix.trim_end_matches('/').is_empty() {
            errors.push(ValidationError::StaticPrefix(prefix.clone()));
        }
    }

    for (path, ips) in &config.access {
        if !path.starts_with('/') {
            errors.push(ValidationError::AccessPath(path.clone()));
        }
        for ip in ips.keys() {
            if ip.parse::<IpAddr>().is_err() {
                errors.push(ValidationError::AccessIp {
                    path: path.clone(),
                    ip: ip.clone(),
                });
            }
        }
    }

    for (path, target) in &config.forwards {
        if !path.starts_with('/') {
            errors.push(ValidationError::ForwardPath(path.clone()));
        }
        let valid = Url::parse(target)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
            .unwrap_or(false);
        if !valid {
            errors.push(ValidationError::ForwardTarget {
                path: path.clone(),
                target: target.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
