//! Reverse proxy subsystem.
//!
//! # Data Flow
//! ```text
//! Handler
//!     → forwarder.rs (build outbound request: method, headers, body stream)
//!     → upstream origin
//!     → forwarder.rs (copy status + headers, stream body)
//!     → ResponseSink
//! ```
//!
//! # Design Decisions
//! - At-most-once: a failed exchange is reported, never retried
//! - Failures are values handed to the calling handler

pub mod forwarder;

pub use forwarder::{ForwardError, ReverseForwarder};
