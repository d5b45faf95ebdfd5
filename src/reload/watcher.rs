//! File watcher for pack directories.
//!
//! Watches every pack root recursively and emits change events through a
//! tokio watch channel when fragment files are added, modified or removed.
//! Uses debouncing to coalesce rapid file changes.

use notify_debouncer_mini::{DebouncedEventKind, new_debouncer};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::DICT_FOLDER;

/// Event types emitted when pack files change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackChangeEvent {
    /// One fragment file changed.
    FragmentChanged(PathBuf),
    /// Several fragment files changed in quick succession.
    BatchChange(Vec<PathBuf>),
    /// Watcher encountered an error.
    Error(String),
}

impl PackChangeEvent {
    /// Returns true if this event requires a reload.
    pub fn requires_reload(&self) -> bool {
        !matches!(self, PackChangeEvent::Error(_))
    }

    pub fn affected_paths(&self) -> Vec<&Path> {
        match self {
            PackChangeEvent::FragmentChanged(p) => vec![p.as_path()],
            PackChangeEvent::BatchChange(paths) => paths.iter().map(|p| p.as_path()).collect(),
            PackChangeEvent::Error(_) => vec![],
        }
    }
}

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Debounce duration for coalescing rapid changes.
    pub debounce_duration: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_duration: Duration::from_millis(500),
        }
    }
}

impl WatcherConfig {
    pub fn with_debounce_ms(debounce_ms: u64) -> Self {
        Self {
            debounce_duration: Duration::from_millis(debounce_ms),
        }
    }
}

/// Handle to control the pack watcher. Dropping it stops watching.
pub struct PackWatcherHandle {
    pub events: watch::Receiver<Option<PackChangeEvent>>,
    _task_handle: tokio::task::JoinHandle<()>,
}

impl PackWatcherHandle {
    /// Wait for the next change event. `None` once the watcher stopped.
    pub async fn wait_for_change(&mut self) -> Option<PackChangeEvent> {
        // Skip the initial None value
        loop {
            if self.events.changed().await.is_err() {
                return None;
            }
            let event = self.events.borrow().clone();
            if event.is_some() {
                return event;
            }
        }
    }
}

/// Start watching `roots` for changes to files ending in `.<extension>`.
pub fn start_pack_watcher(
    roots: Vec<PathBuf>,
    config: WatcherConfig,
    extension: &str,
) -> Result<PackWatcherHandle, notify::Error> {
    let (event_tx, event_rx) = watch::channel(None);
    let (notify_tx, notify_rx) = mpsc::channel();

    let mut debouncer = new_debouncer(config.debounce_duration, notify_tx)?;
    let watcher = debouncer.watcher();

    for root in &roots {
        if root.exists() {
            info!("Watching pack directory: {}", root.display());
            watcher.watch(root, notify::RecursiveMode::Recursive)?;
        } else {
            warn!(
                "Pack directory does not exist, skipping watch: {}",
                root.display()
            );
        }
    }

    let extension = extension.to_string();
    let task_handle = tokio::task::spawn_blocking(move || {
        // Keep the debouncer alive
        let _debouncer = debouncer;
        process_notify_events(notify_rx, event_tx, &roots, &extension);
    });

    Ok(PackWatcherHandle {
        events: event_rx,
        _task_handle: task_handle,
    })
}

fn process_notify_events(
    rx: mpsc::Receiver<Result<Vec<notify_debouncer_mini::DebouncedEvent>, notify::Error>>,
    tx: watch::Sender<Option<PackChangeEvent>>,
    roots: &[PathBuf],
    extension: &str,
) {
    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let paths = events
                    .into_iter()
                    .filter(|event| {
                        matches!(
                            event.kind,
                            DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous
                        )
                    })
                    .map(|event| event.path)
                    .collect();
                if let Some(event) = classify_paths(paths, roots, extension) {
                    debug!("Pack change detected: {:?}", event);
                    if tx.send(Some(event)).is_err() {
                        info!("Pack watcher receiver dropped, stopping");
                        return;
                    }
                }
            }
            Ok(Err(e)) => {
                error!("File watcher error: {}", e);
                let _ = tx.send(Some(PackChangeEvent::Error(e.to_string())));
            }
            Err(_) => {
                info!("Pack watcher channel closed, stopping");
                return;
            }
        }
    }
}

/// Collapse a debounced batch into at most one event.
fn classify_paths(
    paths: Vec<PathBuf>,
    roots: &[PathBuf],
    extension: &str,
) -> Option<PackChangeEvent> {
    let mut changed: Vec<PathBuf> = paths
        .into_iter()
        .filter(|path| is_fragment_path(path, roots, extension))
        .collect();
    changed.sort();
    changed.dedup();

    match changed.len() {
        0 => None,
        1 => changed.pop().map(PackChangeEvent::FragmentChanged),
        _ => Some(PackChangeEvent::BatchChange(changed)),
    }
}

/// A fragment file lives under a root, inside a `dicts` folder, and carries
/// the fragment extension.
fn is_fragment_path(path: &Path, roots: &[PathBuf], extension: &str) -> bool {
    if path.extension().and_then(|e| e.to_str()) != Some(extension) {
        return false;
    }
    roots.iter().any(|root| {
        path.strip_prefix(root).is_ok_and(|relative| {
            relative
                .components()
                .any(|c| c.as_os_str() == DICT_FOLDER)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roots() -> Vec<PathBuf> {
        vec![PathBuf::from("packs/base"), PathBuf::from("packs/extra")]
    }

    #[test]
    fn test_classify_single_fragment() {
        let result = classify_paths(
            vec![PathBuf::from("packs/base/mymod/dicts/block/hardness.json")],
            &roots(),
            "json",
        );
        assert!(matches!(result, Some(PackChangeEvent::FragmentChanged(_))));
    }

    #[test]
    fn test_classify_batch_dedups() {
        let result = classify_paths(
            vec![
                PathBuf::from("packs/base/a/dicts/block/x.json"),
                PathBuf::from("packs/extra/b/dicts/item/y.json"),
                PathBuf::from("packs/base/a/dicts/block/x.json"),
            ],
            &roots(),
            "json",
        );
        match result {
            Some(PackChangeEvent::BatchChange(paths)) => assert_eq!(paths.len(), 2),
            other => panic!("expected batch, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_ignores_unrelated_files() {
        for path in [
            "packs/base/mymod/dicts/block/hardness.yaml",
            "packs/base/mymod/readme.json",
            "elsewhere/mymod/dicts/block/hardness.json",
        ] {
            assert!(classify_paths(vec![PathBuf::from(path)], &roots(), "json").is_none());
        }
    }

    #[test]
    fn test_event_requires_reload() {
        assert!(PackChangeEvent::FragmentChanged(PathBuf::new()).requires_reload());
        assert!(PackChangeEvent::BatchChange(vec![]).requires_reload());
        assert!(!PackChangeEvent::Error("test".to_string()).requires_reload());
    }
}
