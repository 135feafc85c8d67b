//! File system watcher with debouncing for development mode.
//!
//! Watches the project directory recursively and reports changed paths in
//! batches: events are collected until the debounce window passes without
//! a new one, then delivered as a single deduplicated list.

use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexSet;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::error::{CliError, Result};

/// Batches queued for the rebuild loop before the debouncer waits.
const BATCH_QUEUE: usize = 16;

/// File watcher with debouncing and filtering.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FileWatcher {
    /// Start watching `root`. Must be called inside a tokio runtime; the
    /// returned receiver yields one batch of changed paths per quiet period.
    pub fn new(
        root: PathBuf,
        ignore_patterns: Vec<String>,
        debounce: Duration,
    ) -> Result<(Self, mpsc::Receiver<Vec<PathBuf>>)> {
        if !root.is_dir() {
            return Err(CliError::FileNotFound(root));
        }

        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let filter_root = root.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(error = %e, "watch error");
                    return;
                }
            };
            if !matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            ) {
                return;
            }
            for path in event.paths {
                if !should_ignore(&path, &filter_root, &ignore_patterns) {
                    let _ = raw_tx.send(path);
                }
            }
        })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        let batches = debounce_paths(raw_rx, debounce);
        Ok((
            Self {
                _watcher: watcher,
                root,
            },
            batches,
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Coalesce single paths into batches separated by `window` of silence.
fn debounce_paths(
    mut raw: mpsc::UnboundedReceiver<PathBuf>,
    window: Duration,
) -> mpsc::Receiver<Vec<PathBuf>> {
    let (tx, rx) = mpsc::channel(BATCH_QUEUE);
    tokio::spawn(async move {
        while let Some(first) = raw.recv().await {
            let mut batch = IndexSet::new();
            batch.insert(first);
            loop {
                match tokio::time::timeout(window, raw.recv()).await {
                    Ok(Some(path)) => {
                        batch.insert(path);
                    }
                    Ok(None) | Err(_) => break,
                }
            }
            tracing::debug!(paths = batch.len(), "file changes settled");
            if tx.send(batch.into_iter().collect()).await.is_err() {
                break;
            }
        }
    });
    rx
}

/// Paths outside `root`, matching an ignore pattern, or with a hidden
/// component are ignored. Patterns are either `*suffix` or a path prefix
/// relative to `root`.
fn should_ignore(path: &Path, root: &Path, ignore_patterns: &[String]) -> bool {
    let Ok(rel_path) = path.strip_prefix(root) else {
        return true;
    };
    let path_str = rel_path.to_string_lossy().replace('\\', "/");

    for pattern in ignore_patterns {
        if let Some(suffix) = pattern.strip_prefix('*') {
            if path_str.ends_with(suffix) {
                return true;
            }
        } else {
            let pattern = pattern.trim_matches('/');
            if path_str == pattern
                || path_str.starts_with(&format!("{pattern}/"))
                || path_str.contains(&format!("/{pattern}/"))
            {
                return true;
            }
        }
    }

    rel_path.components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .is_some_and(|name| name.starts_with('.') && name != "." && name != "..")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_ignore_node_modules() {
        let root = PathBuf::from("/project");
        let patterns = vec!["node_modules".to_string()];

        let path = PathBuf::from("/project/node_modules/package/index.js");
        assert!(should_ignore(&path, &root, &patterns));

        let path = PathBuf::from("/project/packages/a/node_modules/b/index.js");
        assert!(should_ignore(&path, &root, &patterns));

        let path = PathBuf::from("/project/src/index.js");
        assert!(!should_ignore(&path, &root, &patterns));
    }

    #[test]
    fn test_should_ignore_output_directory() {
        let root = PathBuf::from("/project");
        let patterns = vec!["build/web".to_string()];

        assert!(should_ignore(Path::new("/project/build/web/main.js"), &root, &patterns));
        assert!(!should_ignore(Path::new("/project/build/script.js"), &root, &patterns));
        assert!(!should_ignore(Path::new("/project/build-web.js"), &root, &patterns));
    }

    #[test]
    fn test_should_ignore_extension() {
        let root = PathBuf::from("/project");
        let patterns = vec!["*.log".to_string()];

        assert!(should_ignore(Path::new("/project/debug.log"), &root, &patterns));
        assert!(!should_ignore(Path::new("/project/src/index.js"), &root, &patterns));
    }

    #[test]
    fn test_should_ignore_hidden_files() {
        let root = PathBuf::from("/project");

        assert!(should_ignore(Path::new("/project/.git/config"), &root, &[]));
        assert!(should_ignore(Path::new("/project/.env"), &root, &[]));
        assert!(should_ignore(Path::new("/project/src/.hidden/file.js"), &root, &[]));
    }

    #[test]
    fn test_should_ignore_outside_root() {
        let root = PathBuf::from("/project");
        assert!(should_ignore(Path::new("/other/file.js"), &root, &[]));
    }

    #[tokio::test]
    async fn test_bursts_are_coalesced() {
        let (tx, raw) = mpsc::unbounded_channel();
        let mut batches = debounce_paths(raw, Duration::from_millis(50));

        for name in ["a.js", "b.js", "a.js"] {
            tx.send(PathBuf::from(name)).unwrap();
        }
        let batch = batches.recv().await.unwrap();
        assert_eq!(batch, [PathBuf::from("a.js"), PathBuf::from("b.js")]);

        tx.send(PathBuf::from("c.js")).unwrap();
        drop(tx);
        assert_eq!(batches.recv().await.unwrap(), [PathBuf::from("c.js")]);
        assert!(batches.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_missing_root_is_rejected() {
        let result = FileWatcher::new(
            PathBuf::from("/definitely/not/here"),
            Vec::new(),
            Duration::from_millis(10),
        );
        assert!(matches!(result, Err(CliError::FileNotFound(_))));
    }
}
