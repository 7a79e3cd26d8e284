//! Compiled template store with snapshot-swap refresh.
//!
//! # Responsibilities
//! - Compile every page together with all widgets into one named entry
//! - Publish a complete new snapshot on each refresh
//! - Render by name into a [`ResponseSink`]
//!
//! # Design Decisions
//! - Snapshots are immutable; refresh builds off to the side and swaps the
//!   handle atomically, so readers see either the old or the new generation
//! - Renders clone the handle and never hold a lock while executing
//! - A page that fails to compile is logged and left out; it never aborts
//!   the refresh

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::http::{header, HeaderValue};
use minijinja::{AutoEscape, Environment};
use serde::Serialize;
use thiserror::Error;

use crate::config::TemplatesConfig;
use crate::http::sink::ResponseSink;
use crate::observability::metrics;

/// Content type set on every rendered page.
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Errors returned to handlers that render templates.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template {0} not found")]
    NotFound(String),

    #[error("failed to render template {name}: {source}")]
    Render {
        name: String,
        #[source]
        source: minijinja::Error,
    },
}

/// Where pages and widgets are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSources {
    pub pages_dir: PathBuf,
    pub page_pattern: String,
    pub widgets_dir: PathBuf,
    pub widget_pattern: String,
}

impl TemplateSources {
    pub fn new(
        pages_dir: impl Into<PathBuf>,
        page_pattern: impl Into<String>,
        widgets_dir: impl Into<PathBuf>,
        widget_pattern: impl Into<String>,
    ) -> Self {
        Self {
            pages_dir: pages_dir.into(),
            page_pattern: page_pattern.into(),
            widgets_dir: widgets_dir.into(),
            widget_pattern: widget_pattern.into(),
        }
    }
}

impl From<&TemplatesConfig> for TemplateSources {
    fn from(config: &TemplatesConfig) -> Self {
        Self::new(
            config.pages_dir.clone(),
            config.page_pattern.clone(),
            config.widgets_dir.clone(),
            config.widget_pattern.clone(),
        )
    }
}

/// One complete, immutable generation of compiled templates.
pub struct TemplateSnapshot {
    generation: u64,
    entries: HashMap<String, Environment<'static>>,
}

impl TemplateSnapshot {
    fn empty() -> Self {
        Self {
            generation: 0,
            entries: HashMap::new(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Entry names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    /// Render `name` into `sink`.
    ///
    /// The page is rendered fully before anything touches the sink, so a
    /// failure leaves the sink exactly as it was.
    pub fn render<S: Serialize>(
        &self,
        sink: &mut ResponseSink,
        name: &str,
        data: S,
    ) -> Result<(), TemplateError> {
        let env = self
            .entries
            .get(name)
            .ok_or_else(|| TemplateError::NotFound(name.to_string()))?;

        let html = env
            .get_template(name)
            .and_then(|tpl| tpl.render(data))
            .map_err(|source| TemplateError::Render {
                name: name.to_string(),
                source,
            })?;

        sink.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(HTML_CONTENT_TYPE),
        );
        sink.write_bytes(html.as_bytes());
        Ok(())
    }
}

/// Concurrency-safe holder of the current [`TemplateSnapshot`].
pub struct TemplateStore {
    current: ArcSwap<TemplateSnapshot>,
    generations: AtomicU64,
}

impl TemplateStore {
    /// An empty store; every render misses until the first refresh.
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(TemplateSnapshot::empty()),
            generations: AtomicU64::new(0),
        }
    }

    /// A store populated from `sources`.
    pub fn load(sources: &TemplateSources) -> Self {
        let store = Self::new();
        store.refresh_from(sources);
        store
    }

    /// The current snapshot handle.
    pub fn snapshot(&self) -> Arc<TemplateSnapshot> {
        self.current.load_full()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.current.load().contains(name)
    }

    /// Render `name` from the current snapshot into `sink`.
    pub fn render<S: Serialize>(
        &self,
        sink: &mut ResponseSink,
        name: &str,
        data: S,
    ) -> Result<(), TemplateError> {
        let snapshot = self.snapshot();
        snapshot.render(sink, name, data)
    }

    pub fn refresh_from(&self, sources: &TemplateSources) -> usize {
        self.refresh(
            &sources.pages_dir,
            &sources.page_pattern,
            &sources.widgets_dir,
            &sources.widget_pattern,
        )
    }

    /// Rebuild every page and publish the result. Returns the entry count.
    pub fn refresh(
        &self,
        pages_dir: &Path,
        page_pattern: &str,
        widgets_dir: &Path,
        widget_pattern: &str,
    ) -> usize {
        let pages = scan(pages_dir, page_pattern);
        let widgets = if pages.is_empty() {
            Vec::new()
        } else {
            scan(widgets_dir, widget_pattern)
        };
        tracing::debug!(
            pages_dir = %pages_dir.display(),
            widgets_dir = %widgets_dir.display(),
            pages = pages.len(),
            widgets = widgets.len(),
            "Scanned template sources"
        );

        let widget_sources: Vec<(String, String)> = widgets
            .iter()
            .filter_map(|path| match read_source(path) {
                Ok(source) => Some(source),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable widget");
                    None
                }
            })
            .collect();

        let mut entries = HashMap::with_capacity(pages.len());
        for page in &pages {
            match compile_page(page, &widget_sources) {
                Ok((name, env)) => {
                    tracing::debug!(template = %name, "Compiled template");
                    entries.insert(name, env);
                }
                Err(e) => {
                    tracing::warn!(page = %page.display(), error = %e, "Template compilation failed, page omitted");
                }
            }
        }

        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let count = entries.len();
        self.current
            .store(Arc::new(TemplateSnapshot { generation, entries }));

        metrics::record_template_refresh(count);
        tracing::info!(generation, templates = count, "Template snapshot published");
        count
    }
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Files in `dir` matching `pattern`, sorted. Missing directory or empty
/// pattern yields nothing.
fn scan(dir: &Path, pattern: &str) -> Vec<PathBuf> {
    let pattern = pattern.trim();
    let dir_str = dir.to_string_lossy();
    if pattern.is_empty() || dir_str.trim().is_empty() {
        return Vec::new();
    }
    let dir = Path::new(dir_str.trim());
    if !dir.is_dir() {
        return Vec::new();
    }

    let full = dir.join(pattern);
    let Some(full) = full.to_str() else {
        tracing::warn!(dir = %dir.display(), "Template directory is not valid UTF-8");
        return Vec::new();
    };

    match glob::glob(full) {
        Ok(paths) => {
            let mut files: Vec<PathBuf> = paths
                .filter_map(Result::ok)
                .filter(|p| p.is_file())
                .collect();
            files.sort();
            files
        }
        Err(e) => {
            tracing::error!(pattern = %full, error = %e, "Invalid template pattern");
            Vec::new()
        }
    }
}

fn base_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

fn read_source(path: &Path) -> std::io::Result<(String, String)> {
    let name = base_name(path).ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name")
    })?;
    let source = fs::read_to_string(path)?;
    Ok((name, source))
}

fn compile_page(
    page: &Path,
    widgets: &[(String, String)],
) -> Result<(String, Environment<'static>), Box<dyn std::error::Error + Send + Sync>> {
    let (name, source) = read_source(page)?;

    let mut env = Environment::new();
    // every entry is served as HTML whatever its file extension
    env.set_auto_escape_callback(|_| AutoEscape::Html);
    for (widget_name, widget_source) in widgets {
        env.add_template_owned(widget_name.clone(), widget_source.clone())?;
    }
    // the page wins over a widget sharing its file name
    env.add_template_owned(name.clone(), source)?;
    Ok((name, env))
}
