//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, static mounts, middleware)
//!     → request.rs (request ID, caller description)
//!     → dispatcher.rs (favicon, access check, route lookup)
//!     → handler.rs (user code, forwarding)
//!     → sink.rs / response.rs (handler-written body or encoded envelope)
//!     → Send to client
//! ```

pub mod context;
pub mod dispatcher;
pub mod handler;
pub mod request;
pub mod response;
pub mod server;
pub mod sink;

pub use context::ServiceContext;
pub use dispatcher::{Dispatcher, FAVICON_PATH};
pub use handler::{handler_fn, ForwardHandler, Handler, HandlerFn};
pub use request::{X_FORWARDED_FOR, X_REQUEST_ID};
pub use response::{ServiceResponse, ServiceResponseData, CODE_SUCCESS, JSON_CONTENT_TYPE};
pub use server::HttpServer;
pub use sink::ResponseSink;
