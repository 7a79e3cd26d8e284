//! Response envelope and its wire encoding.
//!
//! # Responsibilities
//! - Define the `{status, message, data}` envelope shared by every
//!   non-template, non-proxied response
//! - Encode envelopes as JSON with the right transport status
//!
//! # Design Decisions
//! - `pretty` and the transport status override are construction-time only
//!   and never serialized
//! - Encoding never fails: a serialization error degrades to one fixed payload

use std::fmt;

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, value::RawValue, Value};

/// Envelope status used for successful handler results.
pub const CODE_SUCCESS: i64 = 1;

/// Content type of every encoded envelope.
pub const JSON_CONTENT_TYPE: &str = "application/json;charset=utf-8";

/// Payload written when an envelope cannot be serialized.
pub const FALLBACK_PAYLOAD: &str = r#"{"status":500,"message":"internal error","data":{}}"#;

/// Unified service response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceResponse {
    pub status: i64,
    pub message: Value,
    pub data: Value,
    /// Indent the encoded JSON.
    #[serde(skip)]
    pub pretty: bool,
    /// Transport status to use instead of 200.
    #[serde(skip)]
    pub override_status: Option<StatusCode>,
}

impl ServiceResponse {
    pub fn new(status: i64, message: impl Into<Value>, data: impl Into<Value>) -> Self {
        Self {
            status,
            message: message.into(),
            data: data.into(),
            pretty: false,
            override_status: None,
        }
    }

    /// A success envelope carrying `data`.
    pub fn success(data: impl Into<Value>) -> Self {
        Self::new(CODE_SUCCESS, "success", data)
    }

    /// An error envelope whose status mirrors an HTTP status, with empty data.
    pub fn error(status: StatusCode, message: impl Into<Value>) -> Self {
        Self::new(i64::from(status.as_u16()), message, json!({}))
    }

    /// The envelope returned when no handler matches a path.
    pub fn bad_request() -> Self {
        Self::error(StatusCode::BAD_REQUEST, "bad request").with_status(StatusCode::BAD_REQUEST)
    }

    /// Force the transport status used when this envelope is written.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.override_status = Some(status);
        self
    }

    /// Indent the encoded JSON.
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    /// The status line this envelope is delivered with.
    pub fn http_status(&self) -> StatusCode {
        match self.override_status {
            Some(status) if status != StatusCode::OK => status,
            _ => StatusCode::OK,
        }
    }

    /// Serialize to the wire payload, compact or indented per `pretty`.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        if self.pretty {
            let mut out = Vec::with_capacity(128);
            let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
            let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
            self.serialize(&mut ser)?;
            Ok(out)
        } else {
            serde_json::to_vec(self)
        }
    }

    /// Encode into an HTTP response.
    pub fn encode(&self) -> Response {
        let status = self.http_status();
        let body = match self.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, "Envelope serialization failed, sending fallback payload");
                FALLBACK_PAYLOAD.as_bytes().to_vec()
            }
        };

        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(JSON_CONTENT_TYPE),
        );
        response
    }
}

impl fmt::Display for ServiceResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => f.write_str(&s),
            Err(_) => f.write_str(FALLBACK_PAYLOAD),
        }
    }
}

impl IntoResponse for ServiceResponse {
    fn into_response(self) -> Response {
        self.encode()
    }
}

/// Envelope as seen by clients that parse responses of this service.
///
/// `data` is kept raw so callers can decode it into their own types.
#[derive(Debug, Deserialize, Serialize)]
pub struct ServiceResponseData {
    pub status: i64,
    pub message: String,
    pub data: Box<RawValue>,
}

impl ServiceResponseData {
    pub fn parse(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Decode `data` into a concrete type.
    pub fn data<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(self.data.get())
    }
}
