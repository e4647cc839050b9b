//! Real-time watching of the documents directory.

use std::path::{Path, PathBuf};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::config::{FileMatcher, WatchConfig};
use crate::error::{Result, WatcherError};
use crate::event::{Debouncer, FileEvent, FileEventKind};

/// Capacity of the raw and debounced event channels.
const CHANNEL_CAPACITY: usize = 1000;

/// Watches one directory and reports debounced changes to ingestible files.
///
/// Dropping the watcher stops it; events still inside their quiet window are
/// flushed before the event stream ends.
pub struct DirectoryWatcher {
    root: PathBuf,

    /// Internal notify watcher. Held only to keep it alive.
    _watcher: RecommendedWatcher,

    /// Debounced events.
    events: mpsc::Receiver<FileEvent>,
}

impl DirectoryWatcher {
    /// Start watching `config.path`. Must be called inside a tokio runtime.
    pub fn start(config: &WatchConfig) -> Result<Self> {
        let root = config.path.clone();
        if !root.exists() {
            return Err(WatcherError::DirectoryNotFound(root.display().to_string()));
        }
        if !root.is_dir() {
            return Err(WatcherError::NotADirectory(root.display().to_string()));
        }

        let matcher = config.matcher()?;
        let (raw_tx, raw_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => forward(&matcher, &raw_tx, event),
                Err(e) => error!("Watch error: {e}"),
            },
        )?;

        let mode = if config.max_depth == Some(1) {
            RecursiveMode::NonRecursive
        } else {
            RecursiveMode::Recursive
        };
        watcher.watch(&root, mode)?;

        tokio::spawn(debounce(raw_rx, event_tx, config.debounce()));
        info!("Watching {} for changes", root.display());

        Ok(Self {
            root,
            _watcher: watcher,
            events: event_rx,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Next debounced event. `None` once the watcher has shut down.
    pub async fn next_event(&mut self) -> Option<FileEvent> {
        self.events.recv().await
    }
}

/// Runs on the notify thread: keep matching paths and hand them to the runtime.
fn forward(matcher: &FileMatcher, raw_tx: &mpsc::Sender<FileEvent>, event: notify::Event) {
    let Some(kind) = FileEventKind::from_notify(&event.kind) else {
        return;
    };

    for path in event.paths {
        if !matcher.matches(&path) {
            continue;
        }
        // A file that vanished before the event was handled is a removal.
        let kind = if kind == FileEventKind::Changed && !path.is_file() {
            FileEventKind::Removed
        } else {
            kind
        };
        if let Err(e) = raw_tx.blocking_send(FileEvent::new(kind, path)) {
            error!("Failed to send file event: {e}");
        }
    }
}

async fn debounce(
    mut raw_rx: mpsc::Receiver<FileEvent>,
    event_tx: mpsc::Sender<FileEvent>,
    window: std::time::Duration,
) {
    let mut debouncer = Debouncer::new(window);

    loop {
        let deadline = debouncer.next_deadline();
        let ready = tokio::select! {
            received = raw_rx.recv() => match received {
                Some(event) => {
                    debug!("Saw {:?} on {}", event.kind, event.path.display());
                    debouncer.push(event, Instant::now());
                    continue;
                }
                None => {
                    let rest = debouncer.take_all();
                    emit(&event_tx, rest).await;
                    break;
                }
            },
            () = sleep_until(deadline) => debouncer.take_ready(Instant::now()),
        };

        if !emit(&event_tx, ready).await {
            break;
        }
    }

    debug!("Debounce loop finished");
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Send events downstream; false once the receiver is gone.
async fn emit(event_tx: &mpsc::Sender<FileEvent>, events: Vec<FileEvent>) -> bool {
    for event in events {
        if event_tx.send(event).await.is_err() {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn next_for(watcher: &mut DirectoryWatcher, path: &Path) -> Option<FileEvent> {
        let deadline = Duration::from_secs(10);
        tokio::time::timeout(deadline, async {
            loop {
                match watcher.next_event().await {
                    Some(event) if event.path.ends_with(path.file_name()?) => return Some(event),
                    Some(_) => continue,
                    None => return None,
                }
            }
        })
        .await
        .ok()
        .flatten()
    }

    #[tokio::test]
    async fn test_start_on_missing_directory_fails() {
        let result = DirectoryWatcher::start(&WatchConfig::new("/nonexistent/path/12345"));
        assert!(matches!(result, Err(WatcherError::DirectoryNotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_reports_new_and_removed_files() {
        let temp_dir = TempDir::new().unwrap();
        let config = WatchConfig::new(temp_dir.path()).with_debounce(Duration::from_millis(100));
        let mut watcher = tokio_test::assert_ok!(DirectoryWatcher::start(&config));

        let path = temp_dir.path().join("new.md");
        std::fs::write(&path, "# New").unwrap();
        std::fs::write(temp_dir.path().join("ignored.png"), [0u8]).unwrap();

        let event = next_for(&mut watcher, &path).await.unwrap();
        assert_eq!(event.kind, FileEventKind::Changed);

        std::fs::remove_file(&path).unwrap();
        let event = next_for(&mut watcher, &path).await.unwrap();
        assert_eq!(event.kind, FileEventKind::Removed);
    }
}
