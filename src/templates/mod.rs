//! Template subsystem.
//!
//! # Data Flow
//! ```text
//! pages_dir/*  +  widgets_dir/*
//!     → store.rs (compile each page with every widget)
//!     → TemplateSnapshot (immutable)
//!     → atomic swap into TemplateStore
//!
//! On directory change:
//!     watcher.rs receives notify event
//!     → structural? rebuild snapshot on the blocking pool
//!     → readers keep whichever snapshot they already hold
//! ```

pub mod store;
pub mod watcher;

pub use store::{TemplateError, TemplateSnapshot, TemplateSources, TemplateStore, HTML_CONTENT_TYPE};
pub use watcher::{is_structural, TemplateWatcher};
