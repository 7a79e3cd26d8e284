//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (path, raw transport endpoint)
//!     → access_control.rs (per-path IP whitelist)
//!     → Decision (Allow / DenyForbidden / RejectMalformed)
//! ```
//!
//! # Design Decisions
//! - The raw socket endpoint is the only source of truth; forwarded-for
//!   headers are never trusted for authorization
//! - Rules are immutable after startup and read without locking

pub mod access_control;

pub use access_control::{AccessGate, Decision};
