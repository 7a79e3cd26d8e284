//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (service.rs):
//!     Load config → Validate → Load templates → Watch → Bind → Serve
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → WebService::close → Drain within grace → Exit
//! ```

pub mod signals;

pub use signals::shutdown_signal;
