//! Per-request dispatch.
//!
//! # States
//! ```text
//! Start → favicon? ──yes──▶ serve file ─────────────────────▶ Done
//!           │no
//!           ▼
//!       AccessCheck ──deny/malformed──▶ encode envelope ─────▶ Done
//!           │allow
//!           ▼
//!         Route ──miss──▶ encode "bad request" ──────────────▶ Done
//!           │hit (case-folded hit re-checks the registered path)
//!           ▼
//!         Invoke ──None──▶ sink as written by the handler ───▶ Done
//!           │Some(envelope)
//!           ▼
//!         Encode ────────────────────────────────────────────▶ Done
//! ```
//!
//! Every path ends in exactly one response; nothing is retried.

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::{
    body::Body,
    http::Request,
    response::Response,
};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::http::context::ServiceContext;
use crate::http::request::{describe_remote, request_id};
use crate::http::response::ServiceResponse;
use crate::http::sink::ResponseSink;
use crate::observability::metrics;
use crate::routing::Routes;
use crate::security::AccessGate;

/// Path answered straight from disk, ahead of auth and routing.
pub const FAVICON_PATH: &str = "/favicon.ico";

/// Composes access control, routing, handler invocation and encoding.
pub struct Dispatcher {
    routes: Routes,
    gate: AccessGate,
    ctx: ServiceContext,
    favicon: PathBuf,
}

impl Dispatcher {
    pub fn new(routes: Routes, gate: AccessGate, ctx: ServiceContext) -> Self {
        Self {
            routes,
            gate,
            ctx,
            favicon: PathBuf::from("favicon.ico"),
        }
    }

    /// File served for [`FAVICON_PATH`].
    pub fn with_favicon(mut self, favicon: impl Into<PathBuf>) -> Self {
        self.favicon = favicon.into();
        self
    }

    pub fn routes(&self) -> &Routes {
        &self.routes
    }

    pub fn context(&self) -> &ServiceContext {
        &self.ctx
    }

    /// Run one request through the pipeline. `remote` is the raw transport
    /// endpoint and the only input to access control.
    pub async fn dispatch(&self, remote: SocketAddr, request: Request<Body>) -> Response {
        let path = request.uri().path().to_string();
        let caller = describe_remote(&remote, request.headers());
        let request_id = request_id(request.headers()).to_string();

        tracing::trace!(
            request_id = %request_id,
            remote = %caller,
            method = %request.method(),
            path = %path,
            "Dispatching request"
        );

        if path == FAVICON_PATH {
            metrics::record_request("favicon");
            return self.serve_favicon(request).await;
        }

        if let Some(refusal) = self.gate.check(&path, &remote.to_string()).into_envelope() {
            tracing::warn!(
                request_id = %request_id,
                remote = %caller,
                path = %path,
                response = %refusal,
                "Access check refused request"
            );
            metrics::record_request("refused");
            return refusal.encode();
        }

        let Some((registered, handler)) = self.routes.resolve(&path) else {
            tracing::warn!(request_id = %request_id, remote = %caller, path = %path, "No handler for path");
            metrics::record_request("no_route");
            return ServiceResponse::bad_request().encode();
        };

        // a case-folded match must also pass the rule of the path it landed on
        if registered != path {
            if let Some(refusal) = self.gate.check(registered, &remote.to_string()).into_envelope() {
                tracing::warn!(
                    request_id = %request_id,
                    remote = %caller,
                    path = %path,
                    route = %registered,
                    response = %refusal,
                    "Access check refused case-folded route"
                );
                metrics::record_request("refused");
                return refusal.encode();
            }
        }

        let mut sink = ResponseSink::new();
        match handler.call(&mut sink, request, &self.ctx).await {
            Some(envelope) => {
                tracing::trace!(
                    request_id = %request_id,
                    path = %path,
                    status = %envelope.http_status(),
                    response = %envelope,
                    "Encoding handler envelope"
                );
                metrics::record_request("envelope");
                envelope.encode()
            }
            None => {
                tracing::trace!(request_id = %request_id, path = %path, "Handler responded by itself");
                metrics::record_request("handler");
                sink.into_response()
            }
        }
    }

    async fn serve_favicon(&self, request: Request<Body>) -> Response {
        match ServeFile::new(&self.favicon).oneshot(request).await {
            Ok(response) => response.map(Body::new),
            Err(never) => match never {},
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.routes)
            .field("favicon", &self.favicon)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::handler::handler_fn;
    use crate::proxy::ReverseForwarder;
    use crate::templates::TemplateStore;
    use axum::http::{header, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn context() -> ServiceContext {
        ServiceContext::new(
            "127.0.0.1:0".parse().unwrap(),
            "pages",
            "widgets",
            Arc::new(TemplateStore::new()),
            ReverseForwarder::new().unwrap(),
        )
    }

    fn echo_routes() -> Routes {
        Routes::new()
            .route(
                "/admin",
                handler_fn(|_, _, _| Some(ServiceResponse::success(json!("admin")))),
            )
            .route(
                "/Widgets",
                handler_fn(|_, _, _| Some(ServiceResponse::success(json!("widgets")))),
            )
            .route(
                "/raw",
                handler_fn(|sink, _, _| {
                    sink.set_status(StatusCode::ACCEPTED);
                    sink.write_bytes(b"raw body");
                    None
                }),
            )
            .route(
                "/teapot",
                handler_fn(|_, _, _| {
                    Some(
                        ServiceResponse::new(418, "short and stout", json!({}))
                            .with_status(StatusCode::IM_A_TEAPOT),
                    )
                }),
            )
    }

    fn get(path: &str) -> Request<Body> {
        Request::builder().uri(path).body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_forbidden_and_allowed_callers() {
        let gate = AccessGate::default().with_rule("/admin", ["10.0.0.1"]);
        let dispatcher = Dispatcher::new(echo_routes(), gate, context());

        let denied = dispatcher
            .dispatch("10.0.0.2:5000".parse().unwrap(), get("/admin"))
            .await;
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            denied.headers()[header::CONTENT_TYPE],
            "application/json;charset=utf-8"
        );
        assert_eq!(body_json(denied).await["status"], 403);

        let allowed = dispatcher
            .dispatch("10.0.0.1:5000".parse().unwrap(), get("/admin"))
            .await;
        assert_eq!(allowed.status(), StatusCode::OK);
        assert_eq!(body_json(allowed).await["data"], "admin");
    }

    #[tokio::test]
    async fn test_ipv6_endpoint_is_malformed() {
        let dispatcher = Dispatcher::new(echo_routes(), AccessGate::default(), context());
        let response = dispatcher
            .dispatch("[::1]:5000".parse().unwrap(), get("/admin"))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["message"], "invalid remoteaddr");
    }

    #[tokio::test]
    async fn test_forwarded_for_is_not_used_for_auth() {
        let gate = AccessGate::default().with_rule("/admin", ["10.0.0.1"]);
        let dispatcher = Dispatcher::new(echo_routes(), gate, context());
        let request = Request::builder()
            .uri("/admin")
            .header("x-forwarded-for", "10.0.0.1")
            .body(Body::empty())
            .unwrap();
        let response = dispatcher
            .dispatch("10.0.0.9:5000".parse().unwrap(), request)
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_case_folded_path_keeps_whitelist() {
        let gate = AccessGate::default().with_rule("/admin", ["10.0.0.1"]);
        let dispatcher = Dispatcher::new(echo_routes(), gate, context());

        for path in ["/ADMIN", "/Admin"] {
            let denied = dispatcher
                .dispatch("10.0.0.2:5000".parse().unwrap(), get(path))
                .await;
            assert_eq!(denied.status(), StatusCode::FORBIDDEN);
            assert_eq!(body_json(denied).await["status"], 403);
        }

        let allowed = dispatcher
            .dispatch("10.0.0.1:5000".parse().unwrap(), get("/ADMIN"))
            .await;
        assert_eq!(allowed.status(), StatusCode::OK);
        assert_eq!(body_json(allowed).await["data"], "admin");
    }

    #[tokio::test]
    async fn test_case_insensitive_route() {
        let dispatcher = Dispatcher::new(echo_routes(), AccessGate::default(), context());
        let response = dispatcher
            .dispatch("10.0.0.1:5000".parse().unwrap(), get("/widgets"))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["data"], "widgets");
    }

    #[tokio::test]
    async fn test_unknown_path_is_bad_request() {
        let dispatcher = Dispatcher::new(echo_routes(), AccessGate::default(), context());
        let response = dispatcher
            .dispatch("10.0.0.1:5000".parse().unwrap(), get("/nowhere"))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({"status": 400, "message": "bad request", "data": {}})
        );
    }

    #[tokio::test]
    async fn test_handler_written_response_passes_through() {
        let dispatcher = Dispatcher::new(echo_routes(), AccessGate::default(), context());
        let response = dispatcher
            .dispatch("10.0.0.1:5000".parse().unwrap(), get("/raw"))
            .await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(response.headers().get(header::CONTENT_TYPE).is_none());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"raw body");
    }

    #[tokio::test]
    async fn test_override_status_is_used() {
        let dispatcher = Dispatcher::new(echo_routes(), AccessGate::default(), context());
        let response = dispatcher
            .dispatch("10.0.0.1:5000".parse().unwrap(), get("/teapot"))
            .await;
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(body_json(response).await["status"], 418);
    }

    #[tokio::test]
    async fn test_favicon_bypasses_access_check() {
        let dir = tempfile::TempDir::new().unwrap();
        let icon = dir.path().join("favicon.ico");
        std::fs::write(&icon, b"ICON").unwrap();

        let gate = AccessGate::default().with_rule("/", Vec::<String>::new());
        let dispatcher = Dispatcher::new(Routes::new(), gate, context()).with_favicon(&icon);

        let response = dispatcher
            .dispatch("10.0.0.1:5000".parse().unwrap(), get(FAVICON_PATH))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"ICON");

        let root = dispatcher
            .dispatch("10.0.0.1:5000".parse().unwrap(), get("/"))
            .await;
        assert_eq!(root.status(), StatusCode::FORBIDDEN);
    }
}
