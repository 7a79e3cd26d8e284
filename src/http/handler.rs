//! Handler contract.
//!
//! A handler receives the response sink, the request and the service
//! context. Returning `Some(envelope)` lets the dispatcher encode it;
//! returning `None` means the handler answered through the sink itself.

use std::future::ready;

use axum::{body::Body, http::Request};
use futures_util::future::BoxFuture;
use url::Url;

use crate::http::context::ServiceContext;
use crate::http::response::ServiceResponse;
use crate::http::sink::ResponseSink;

/// A request handler registered under a path.
pub trait Handler: Send + Sync + 'static {
    fn call<'a>(
        &'a self,
        sink: &'a mut ResponseSink,
        request: Request<Body>,
        ctx: &'a ServiceContext,
    ) -> BoxFuture<'a, Option<ServiceResponse>>;
}

/// Adapter turning a synchronous closure into a [`Handler`].
pub struct HandlerFn<F> {
    f: F,
}

/// Wrap a synchronous closure as a handler.
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: Fn(&mut ResponseSink, Request<Body>, &ServiceContext) -> Option<ServiceResponse>
        + Send
        + Sync
        + 'static,
{
    HandlerFn { f }
}

impl<F> Handler for HandlerFn<F>
where
    F: Fn(&mut ResponseSink, Request<Body>, &ServiceContext) -> Option<ServiceResponse>
        + Send
        + Sync
        + 'static,
{
    fn call<'a>(
        &'a self,
        sink: &'a mut ResponseSink,
        request: Request<Body>,
        ctx: &'a ServiceContext,
    ) -> BoxFuture<'a, Option<ServiceResponse>> {
        Box::pin(ready((self.f)(sink, request, ctx)))
    }
}

/// Forwards every request it receives to a fixed upstream URL.
#[derive(Debug, Clone)]
pub struct ForwardHandler {
    target: Url,
}

impl ForwardHandler {
    pub fn new(target: Url) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &Url {
        &self.target
    }
}

impl Handler for ForwardHandler {
    fn call<'a>(
        &'a self,
        sink: &'a mut ResponseSink,
        request: Request<Body>,
        ctx: &'a ServiceContext,
    ) -> BoxFuture<'a, Option<ServiceResponse>> {
        Box::pin(async move {
            match ctx.forward(sink, request, &self.target).await {
                Ok(()) => None,
                Err(e) => Some(e.into_envelope()),
            }
        })
    }
}
