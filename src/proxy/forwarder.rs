//! Reverse forwarding of a single request to an upstream URL.
//!
//! # Responsibilities
//! - Relay method, headers and body stream to the target
//! - Copy upstream status and headers, then stream the body back
//! - Report transport failures as values; never retry
//!
//! # Design Decisions
//! - One pooled client per forwarder with fixed connection knobs
//! - Upstream certificates are NOT verified; every upstream is trusted
//! - Bodies are streamed in both directions, never fully buffered
//! - `Host` and `Transfer-Encoding` belong to the outbound transport

use std::time::Duration;

use axum::{
    body::{Body, HttpBody},
    http::{header, HeaderMap, HeaderName, Request, StatusCode},
};
use thiserror::Error;
use url::Url;

use crate::http::response::ServiceResponse;
use crate::http::sink::ResponseSink;
use crate::observability::metrics;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const TCP_KEEPALIVE: Duration = Duration::from_secs(30 * 60);
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const POOL_MAX_IDLE_PER_HOST: usize = 100;

/// Errors returned by [`ReverseForwarder`].
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("invalid argument")]
    InvalidArgument,

    #[error("failed to build upstream client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("{0}")]
    Upstream(#[from] reqwest::Error),
}

impl ForwardError {
    /// Internal-error envelope carrying the failure description.
    pub fn into_envelope(self) -> ServiceResponse {
        ServiceResponse::error(StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
    }
}

/// Relays requests to upstream origins.
#[derive(Clone)]
pub struct ReverseForwarder {
    client: reqwest::Client,
}

impl ReverseForwarder {
    pub fn new() -> Result<Self, ForwardError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .tcp_keepalive(TCP_KEEPALIVE)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            // TODO: make upstream certificate verification opt-out instead of always off
            .danger_accept_invalid_certs(true)
            .no_gzip()
            .no_proxy()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(ForwardError::Client)?;
        Ok(Self { client })
    }

    /// Forward `request` to `target` and write the upstream answer into `sink`.
    ///
    /// On error nothing has been written to `sink`.
    pub async fn forward(
        &self,
        sink: &mut ResponseSink,
        request: Option<Request<Body>>,
        target: Option<&Url>,
    ) -> Result<(), ForwardError> {
        let upstream = match self.agent_request(request, target).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::debug!(error = %e, "Forwarding failed");
                return Err(e);
            }
        };

        sink.set_status(upstream.status());
        copy_headers(upstream.headers(), sink.headers_mut(), &[header::TRANSFER_ENCODING]);
        sink.stream(Body::from_stream(upstream.bytes_stream()));
        Ok(())
    }

    /// Send `request` to `target` and hand back the raw upstream response.
    pub async fn agent_request(
        &self,
        request: Option<Request<Body>>,
        target: Option<&Url>,
    ) -> Result<reqwest::Response, ForwardError> {
        let (Some(request), Some(target)) = (request, target) else {
            tracing::warn!("Forward called without a request or target");
            return Err(ForwardError::InvalidArgument);
        };

        let (parts, body) = request.into_parts();
        let mut builder = self.client.request(parts.method.clone(), target.clone());
        // an empty body must not turn into a chunked upload
        if body.size_hint().exact() != Some(0) {
            builder = builder.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }
        let mut outbound = builder.build()?;
        copy_headers(
            &parts.headers,
            outbound.headers_mut(),
            &[header::HOST, header::TRANSFER_ENCODING],
        );

        tracing::trace!(method = %parts.method, target = %target, "Forwarding request");
        match self.client.execute(outbound).await {
            Ok(resp) => {
                metrics::record_forward("ok");
                tracing::trace!(target = %target, status = %resp.status(), "Upstream responded");
                Ok(resp)
            }
            Err(e) => {
                metrics::record_forward("error");
                tracing::warn!(target = %target, error = %e, "Upstream request failed");
                Err(ForwardError::Upstream(e))
            }
        }
    }
}

/// Append every header of `from` onto `to`, preserving duplicates.
fn copy_headers(from: &HeaderMap, to: &mut HeaderMap, skip: &[HeaderName]) {
    for (name, value) in from {
        if skip.contains(name) {
            continue;
        }
        to.append(name.clone(), value.clone());
    }
}
