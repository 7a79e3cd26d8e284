//! Embeddable HTTP web service library.
//!
//! Path-keyed handlers behind per-path IP whitelists, hot-reloaded page
//! templates and a streaming reverse forwarder.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod proxy;
pub mod routing;
pub mod security;
pub mod service;
pub mod templates;

pub use config::schema::ServiceConfig;
pub use http::{handler_fn, Handler, ResponseSink, ServiceContext, ServiceResponse};
pub use routing::Routes;
pub use service::{ServiceError, WebService};
