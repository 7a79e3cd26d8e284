//! Service lifecycle: startup, accessors and graceful shutdown.
//!
//! # Startup order
//! ```text
//! validate config
//!     → load templates (initial snapshot)
//!     → start template watcher (failure aborts startup)
//!     → register config forward routes
//!     → bind listener, load TLS material
//!     → spawn server task
//! ```
//!
//! # Shutdown
//! `close` gives in-flight requests the configured grace window, then tears
//! the listener down; the template watcher is closed explicitly alongside.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum_server::{tls_rustls::RustlsConfig, Handle};
use thiserror::Error;
use tokio::task::JoinHandle;
use url::Url;

use crate::config::loader::join_errors;
use crate::config::{validate_config, ServiceConfig, ValidationError};
use crate::http::{Dispatcher, ForwardHandler, HttpServer, ServiceContext};
use crate::proxy::{ForwardError, ReverseForwarder};
use crate::routing::Routes;
use crate::security::AccessGate;
use crate::templates::{TemplateSources, TemplateStore, TemplateWatcher};

/// Errors that abort startup or shutdown.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid configuration: {}", join_errors(.0))]
    Config(Vec<ValidationError>),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load TLS certificate/key: {0}")]
    Tls(#[source] std::io::Error),

    #[error("failed to watch template directories: {0}")]
    Watch(#[from] notify::Error),

    #[error(transparent)]
    Forwarder(#[from] ForwardError),

    #[error("server terminated with error: {0}")]
    Serve(#[source] std::io::Error),
}

/// A running web service.
pub struct WebService {
    addr: SocketAddr,
    config: ServiceConfig,
    templates: Arc<TemplateStore>,
    watcher: Option<TemplateWatcher>,
    handle: Handle,
    server: JoinHandle<std::io::Result<()>>,
}

impl WebService {
    /// Start serving `routes` with `config`.
    ///
    /// Routes declared under `[forwards]` are added to `routes`; a
    /// code-registered handler for the same path takes precedence.
    pub async fn start(config: ServiceConfig, routes: Routes) -> Result<Self, ServiceError> {
        validate_config(&config).map_err(ServiceError::Config)?;

        let sources = TemplateSources::from(&config.templates);
        let templates = Arc::new(TemplateStore::new());
        {
            let templates = templates.clone();
            let sources = sources.clone();
            if let Err(e) =
                tokio::task::spawn_blocking(move || templates.refresh_from(&sources)).await
            {
                tracing::error!(error = %e, "Initial template load failed");
            }
        }

        let watcher = if config.templates.watch {
            let interval = Some(Duration::from_secs(config.templates.refresh_interval_secs));
            Some(TemplateWatcher::spawn(templates.clone(), sources, interval)?)
        } else {
            None
        };

        let mut routes = routes;
        for (path, target) in &config.forwards {
            if routes.contains(path) {
                tracing::warn!(path = %path, "Forward route shadowed by registered handler");
                continue;
            }
            // validated above
            if let Ok(url) = Url::parse(target) {
                tracing::info!(path = %path, target = %url, "Registering forward route");
                routes.insert(path.clone(), Arc::new(ForwardHandler::new(url)));
            }
        }

        let listener = std::net::TcpListener::bind(&config.listener.bind_address).map_err(|e| {
            ServiceError::Bind {
                addr: config.listener.bind_address.clone(),
                source: e,
            }
        })?;
        listener.set_nonblocking(true).map_err(|e| ServiceError::Bind {
            addr: config.listener.bind_address.clone(),
            source: e,
        })?;
        let addr = listener.local_addr().map_err(|e| ServiceError::Bind {
            addr: config.listener.bind_address.clone(),
            source: e,
        })?;

        let ctx = ServiceContext::new(
            addr,
            config.templates.pages_dir.clone(),
            config.templates.widgets_dir.clone(),
            templates.clone(),
            ReverseForwarder::new()?,
        );
        let gate = AccessGate::from_config(&config.access);
        let dispatcher = Arc::new(
            Dispatcher::new(routes, gate, ctx).with_favicon(config.favicon.clone()),
        );
        tracing::info!(routes = ?dispatcher.routes(), "Routes registered");

        let server = HttpServer::new(&config, dispatcher);
        let handle = Handle::new();
        let server = match &config.listener.tls {
            Some(tls) => {
                let tls = RustlsConfig::from_pem_file(tls.cert_path.trim(), tls.key_path.trim())
                    .await
                    .map_err(ServiceError::Tls)?;
                tokio::spawn(server.serve_tls(listener, tls, handle.clone()))
            }
            None => tokio::spawn(server.serve(listener, handle.clone())),
        };

        tracing::info!(address = %addr, "Web service started");
        Ok(Self {
            addr,
            config,
            templates,
            watcher,
            handle,
            server,
        })
    }

    /// Address the listener is bound to.
    pub fn service_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn pages_dir(&self) -> &Path {
        &self.config.templates.pages_dir
    }

    pub fn widgets_dir(&self) -> &Path {
        &self.config.templates.widgets_dir
    }

    pub fn templates(&self) -> &Arc<TemplateStore> {
        &self.templates
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Stop accepting, drain in-flight requests within the grace window and
    /// release the template watch.
    pub async fn close(self) -> Result<(), ServiceError> {
        let grace = Duration::from_secs(self.config.timeouts.shutdown_grace_secs);
        tracing::info!(address = %self.addr, grace_secs = grace.as_secs(), "Shutting down web service");

        self.handle.graceful_shutdown(Some(grace));
        if let Some(watcher) = self.watcher {
            watcher.close().await;
        }

        match self.server.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "HTTP server shutdown with error");
                Err(ServiceError::Serve(e))
            }
            Err(e) => {
                tracing::error!(error = %e, "HTTP server task failed");
                Err(ServiceError::Serve(std::io::Error::other(e)))
            }
        }
    }
}
