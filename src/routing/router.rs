//! Route lookup.
//!
//! # Responsibilities
//! - Store handlers keyed by path
//! - Resolve a path: exact match first, then a case-insensitive scan
//! - Return an explicit miss rather than a silent default
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Ordered map so the case-insensitive scan is deterministic

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::http::handler::Handler;

/// Registry of handlers keyed by request path.
#[derive(Clone, Default)]
pub struct Routes {
    handlers: BTreeMap<String, Arc<dyn Handler>>,
}

impl Routes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `path`, replacing any previous one.
    pub fn route<H: Handler>(mut self, path: impl Into<String>, handler: H) -> Self {
        self.insert(path, Arc::new(handler));
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, handler: Arc<dyn Handler>) {
        let path = path.into();
        if self.handlers.insert(path.clone(), handler).is_some() {
            tracing::warn!(path = %path, "Handler replaced");
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.handlers.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Registered path and handler for `path`, trying an exact match before
    /// ignoring ASCII case.
    pub fn resolve(&self, path: &str) -> Option<(&str, &Arc<dyn Handler>)> {
        if let Some((registered, handler)) = self.handlers.get_key_value(path) {
            return Some((registered.as_str(), handler));
        }
        self.handlers
            .iter()
            .find(|(registered, _)| registered.eq_ignore_ascii_case(path))
            .map(|(registered, handler)| (registered.as_str(), handler))
    }
}

impl fmt::Debug for Routes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.handlers.keys()).finish()
    }
}
