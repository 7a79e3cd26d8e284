//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Request path
//!     → router.rs (exact lookup)
//!     → router.rs (case-insensitive scan on miss)
//!     → Return: handler or NoMatch
//!
//! Route table (at startup):
//!     code-registered handlers + config forward routes
//!     → Freeze as immutable Routes
//! ```
//!
//! # Design Decisions
//! - Routes built at startup, immutable at runtime
//! - Deterministic: same input always resolves to the same handler

pub mod router;

pub use router::Routes;
