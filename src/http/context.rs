//! Capabilities the service exposes to handlers.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{body::Body, http::Request};
use serde::Serialize;
use url::Url;

use crate::http::sink::ResponseSink;
use crate::proxy::{ForwardError, ReverseForwarder};
use crate::templates::{TemplateError, TemplateStore};

/// Shared, cheaply cloneable view of the running service.
#[derive(Clone)]
pub struct ServiceContext {
    inner: Arc<Inner>,
}

struct Inner {
    service_addr: SocketAddr,
    pages_dir: PathBuf,
    widgets_dir: PathBuf,
    templates: Arc<TemplateStore>,
    forwarder: ReverseForwarder,
}

impl ServiceContext {
    pub fn new(
        service_addr: SocketAddr,
        pages_dir: impl Into<PathBuf>,
        widgets_dir: impl Into<PathBuf>,
        templates: Arc<TemplateStore>,
        forwarder: ReverseForwarder,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                service_addr,
                pages_dir: pages_dir.into(),
                widgets_dir: widgets_dir.into(),
                templates,
                forwarder,
            }),
        }
    }

    pub fn service_addr(&self) -> SocketAddr {
        self.inner.service_addr
    }

    pub fn pages_dir(&self) -> &Path {
        &self.inner.pages_dir
    }

    pub fn widgets_dir(&self) -> &Path {
        &self.inner.widgets_dir
    }

    pub fn templates(&self) -> &Arc<TemplateStore> {
        &self.inner.templates
    }

    pub fn forwarder(&self) -> &ReverseForwarder {
        &self.inner.forwarder
    }

    /// Render a page template into `sink`.
    pub fn render<S: Serialize>(
        &self,
        sink: &mut ResponseSink,
        name: &str,
        data: S,
    ) -> Result<(), TemplateError> {
        self.inner.templates.render(sink, name, data)
    }

    /// Forward `request` to `target`, streaming the answer into `sink`.
    pub async fn forward(
        &self,
        sink: &mut ResponseSink,
        request: Request<Body>,
        target: &Url,
    ) -> Result<(), ForwardError> {
        self.inner
            .forwarder
            .forward(sink, Some(request), Some(target))
            .await
    }
}
