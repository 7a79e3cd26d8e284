//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the web service.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the web service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Page and widget template locations.
    pub templates: TemplatesConfig,

    /// Static directories keyed by URL prefix.
    pub statics: HashMap<String, String>,

    /// Per-path IP whitelist. Only the inner keys matter.
    pub access: HashMap<String, HashMap<String, i64>>,

    /// Paths whose requests are forwarded verbatim to an upstream URL.
    pub forwards: HashMap<String, String>,

    /// File served for `/favicon.ico`.
    pub favicon: PathBuf,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            timeouts: TimeoutConfig::default(),
            templates: TemplatesConfig::default(),
            statics: HashMap::new(),
            access: HashMap::new(),
            forwards: HashMap::new(),
            favicon: PathBuf::from("favicon.ico"),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:80").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:80".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Grace window given to in-flight requests on shutdown, in seconds.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 600,
            shutdown_grace_secs: 15,
        }
    }
}

/// Template source locations and reload behaviour.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct TemplatesConfig {
    /// Directory holding page templates.
    pub pages_dir: PathBuf,

    /// Glob pattern selecting page files inside `pages_dir`.
    pub page_pattern: String,

    /// Directory holding widget templates shared by every page.
    pub widgets_dir: PathBuf,

    /// Glob pattern selecting widget files inside `widgets_dir`.
    pub widget_pattern: String,

    /// Rebuild templates when the directories change.
    pub watch: bool,

    /// Periodic rebuild interval in seconds (0 disables).
    pub refresh_interval_secs: u64,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            pages_dir: PathBuf::from("templates/pages"),
            page_pattern: "*.*".to_string(),
            widgets_dir: PathBuf::from("templates/widgets"),
            widget_pattern: "*.*".to_string(),
            watch: true,
            refresh_interval_secs: 60,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format: "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
