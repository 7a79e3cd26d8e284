//! Embedded web service demo binary.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request        ┌──────────────────────────────────────────────┐
//!     ──────────────────────┼─▶ static mounts ──▶ files on disk            │
//!                           │        │miss                                 │
//!                           │        ▼                                     │
//!                           │   dispatcher: favicon → access gate → routes │
//!                           │        │                                     │
//!                           │        ▼                                     │
//!                           │   handler ──▶ templates (hot reloaded)       │
//!                           │           └─▶ forwarder ──▶ upstream ────────┼──▶ Backend
//!     Client Response       │        │                                     │
//!     ◀─────────────────────┼── envelope / handler-written body            │
//!                           └──────────────────────────────────────────────┘
//! ```
//!
//! Serves `/status` as a JSON envelope and `/` from the `index.html` page
//! template; everything else comes from the config file.

use std::path::PathBuf;

use clap::Parser;
use serde_json::json;

use embedded_webservice::config::{load_config, ServiceConfig};
use embedded_webservice::http::{handler_fn, ServiceResponse};
use embedded_webservice::lifecycle::shutdown_signal;
use embedded_webservice::observability::{logging::init_logging, metrics::init_metrics};
use embedded_webservice::{Routes, WebService};

#[derive(Parser)]
#[command(name = "embedded-webservice")]
#[command(about = "Template-rendering web service with IP whitelists and forwarding", long_about = None)]
struct Cli {
    /// TOML config file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    init_logging(&config.observability)?;
    tracing::info!("embedded-webservice v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        tls = config.listener.tls.is_some(),
        pages_dir = %config.templates.pages_dir.display(),
        widgets_dir = %config.templates.widgets_dir.display(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let routes = Routes::new()
        .route(
            "/status",
            handler_fn(|_, _, ctx| {
                Some(ServiceResponse::success(json!({
                    "address": ctx.service_addr().to_string(),
                    "templates": ctx.templates().snapshot().names(),
                })))
            }),
        )
        .route(
            "/",
            handler_fn(|sink, _, ctx| {
                let data = json!({ "address": ctx.service_addr().to_string() });
                match ctx.render(sink, "index.html", data) {
                    Ok(()) => None,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to render index page");
                        Some(ServiceResponse::error(
                            axum::http::StatusCode::NOT_FOUND,
                            e.to_string(),
                        ))
                    }
                }
            }),
        );

    let service = WebService::start(config, routes).await?;
    tracing::info!(address = %service.service_addr(), "Listening for connections");

    shutdown_signal().await;
    service.close().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
