//! Template directory watcher for hot reload.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use notify::event::{MetadataKind, ModifyKind};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval};

use crate::templates::store::{TemplateSources, TemplateStore};

/// How long `close` waits for the watch loop before aborting it.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Whether an event changes the set of template files.
///
/// Creates, removes, renames and permission/ownership changes count.
/// Content writes and accesses do not.
pub fn is_structural(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) | EventKind::Remove(_) => true,
        EventKind::Modify(ModifyKind::Name(_)) => true,
        EventKind::Modify(ModifyKind::Metadata(meta)) => matches!(
            meta,
            MetadataKind::Permissions | MetadataKind::Ownership | MetadataKind::Any
        ),
        _ => false,
    }
}

/// Background task rebuilding a [`TemplateStore`] when its sources change.
pub struct TemplateWatcher {
    watcher: Option<RecommendedWatcher>,
    task: JoinHandle<()>,
    watched: Vec<PathBuf>,
}

impl TemplateWatcher {
    /// Watch the page and widget directories that exist and spawn the loop.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(
        store: Arc<TemplateStore>,
        sources: TemplateSources,
        refresh_interval: Option<Duration>,
    ) -> notify::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                // receiver gone means the loop already stopped
                let _ = tx.send(res);
            },
            Config::default(),
        )?;

        let mut watched = Vec::new();
        for dir in [&sources.pages_dir, &sources.widgets_dir] {
            if watched.contains(dir) {
                continue;
            }
            if !dir.is_dir() {
                tracing::warn!(dir = %dir.display(), "Template directory missing, not watched");
                continue;
            }
            watcher.watch(dir, RecursiveMode::NonRecursive)?;
            watched.push(dir.clone());
        }

        tracing::info!(dirs = ?watched, "Template watcher started");

        let task = tokio::spawn(watch_loop(rx, store, sources, refresh_interval));
        Ok(Self {
            watcher: Some(watcher),
            task,
            watched,
        })
    }

    /// Directories under watch.
    pub fn watched(&self) -> &[PathBuf] {
        &self.watched
    }

    /// Release the OS watch and wait for the loop to finish.
    pub async fn close(mut self) {
        // dropping the watcher drops the sender, closing the channel
        drop(self.watcher.take());
        match tokio::time::timeout(CLOSE_TIMEOUT, &mut self.task).await {
            Ok(_) => tracing::info!("Template watcher stopped"),
            Err(_) => {
                tracing::warn!("Template watcher did not stop in time, aborting");
                self.task.abort();
            }
        }
    }
}

async fn watch_loop(
    mut rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    store: Arc<TemplateStore>,
    sources: TemplateSources,
    refresh_interval: Option<Duration>,
) {
    let mut ticker = refresh_interval
        .filter(|d| !d.is_zero())
        .map(|period| tokio::time::interval_at(Instant::now() + period, period));

    loop {
        let reason = tokio::select! {
            msg = rx.recv() => match msg {
                None => break,
                Some(Ok(event)) if is_structural(&event.kind) => {
                    tracing::debug!(kind = ?event.kind, paths = ?event.paths, "Template sources changed");
                    "notification"
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Template watch error");
                    continue;
                }
            },
            _ = tick(&mut ticker) => "interval",
        };

        let store = store.clone();
        let sources = sources.clone();
        match tokio::task::spawn_blocking(move || store.refresh_from(&sources)).await {
            Ok(count) => tracing::debug!(reason, templates = count, "Templates refreshed"),
            Err(e) => tracing::error!(reason, error = %e, "Template refresh task failed"),
        }
    }

    tracing::debug!("Template watch channel closed");
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, RemoveKind, RenameMode};

    #[test]
    fn test_structural_events() {
        assert!(is_structural(&EventKind::Create(CreateKind::File)));
        assert!(is_structural(&EventKind::Remove(RemoveKind::Any)));
        assert!(is_structural(&EventKind::Modify(ModifyKind::Name(RenameMode::Both))));
        assert!(is_structural(&EventKind::Modify(ModifyKind::Metadata(
            MetadataKind::Permissions
        ))));
    }

    #[test]
    fn test_content_and_access_events_ignored() {
        assert!(!is_structural(&EventKind::Modify(ModifyKind::Data(DataChange::Content))));
        assert!(!is_structural(&EventKind::Modify(ModifyKind::Metadata(
            MetadataKind::AccessTime
        ))));
        assert!(!is_structural(&EventKind::Access(AccessKind::Any)));
        assert!(!is_structural(&EventKind::Any));
    }

    #[tokio::test]
    async fn test_loop_refreshes_on_structural_event_and_stops_on_close() {
        let root = tempfile::TempDir::new().unwrap();
        std::fs::write(root.path().join("a.html"), "a").unwrap();
        let sources = TemplateSources::new(root.path(), "*.html", root.path(), "none");
        let store = Arc::new(TemplateStore::new());

        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(watch_loop(rx, store.clone(), sources, None));

        // ignored: plain content write
        tx.send(Ok(Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))))
            .unwrap();
        // ignored: watch error
        tx.send(Err(notify::Error::generic("boom"))).unwrap();
        tx.send(Ok(Event::new(EventKind::Create(CreateKind::File)))).unwrap();
        drop(tx);

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("loop should stop when the channel closes")
            .unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.generation(), 1);
        assert!(snapshot.contains("a.html"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_refresh() {
        let store = Arc::new(TemplateStore::new());
        let sources = TemplateSources::new("/no/pages", "*", "/no/widgets", "*");
        let (tx, rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let task = tokio::spawn(watch_loop(
            rx,
            store.clone(),
            sources,
            Some(Duration::from_secs(60)),
        ));

        tokio::time::sleep(Duration::from_secs(61)).await;
        // let the blocking refresh land
        for _ in 0..50 {
            if store.snapshot().generation() >= 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(store.snapshot().generation() >= 1);

        drop(tx);
        task.await.unwrap();
    }
}
