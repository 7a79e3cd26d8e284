//! Response sink handed to handlers.
//!
//! A handler that answers on its own (rendered page, proxied response, raw
//! bytes) writes status, headers and body here and returns `None`; the
//! dispatcher then turns the sink into the response as-is.

use std::io;

use axum::{
    body::Body,
    http::{HeaderMap, StatusCode},
    response::Response,
};

enum SinkBody {
    Buffered(Vec<u8>),
    Stream(Body),
}

/// Accumulates a response written directly by a handler.
pub struct ResponseSink {
    status: StatusCode,
    headers: HeaderMap,
    body: SinkBody,
    written: bool,
}

impl ResponseSink {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: SinkBody::Buffered(Vec::new()),
            written: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Whether any body bytes or a body stream have been written.
    pub fn is_written(&self) -> bool {
        self.written
    }

    /// Bytes buffered so far; empty once a stream body is installed.
    pub fn buffered(&self) -> &[u8] {
        match &self.body {
            SinkBody::Buffered(buf) => buf,
            SinkBody::Stream(_) => &[],
        }
    }

    /// Append bytes to the body.
    ///
    /// Writing after [`stream`](Self::stream) discards the stream and starts
    /// a fresh buffered body.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        match &mut self.body {
            SinkBody::Buffered(buf) => buf.extend_from_slice(bytes),
            SinkBody::Stream(_) => self.body = SinkBody::Buffered(bytes.to_vec()),
        }
        self.written = true;
    }

    /// Replace the body with a stream that is relayed without buffering.
    pub fn stream(&mut self, body: Body) {
        self.body = SinkBody::Stream(body);
        self.written = true;
    }

    pub fn into_response(self) -> Response {
        let body = match self.body {
            SinkBody::Buffered(buf) => Body::from(buf),
            SinkBody::Stream(body) => body,
        };
        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

impl Default for ResponseSink {
    fn default() -> Self {
        Self::new()
    }
}

impl io::Write for ResponseSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
