//! File events and debouncing.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// A change to an ingestible file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEvent {
    /// The kind of event.
    pub kind: FileEventKind,

    /// Path to the affected file.
    pub path: PathBuf,

    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
}

impl FileEvent {
    pub fn new(kind: FileEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn changed(path: impl Into<PathBuf>) -> Self {
        Self::new(FileEventKind::Changed, path)
    }

    pub fn removed(path: impl Into<PathBuf>) -> Self {
        Self::new(FileEventKind::Removed, path)
    }
}

/// What happened to the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileEventKind {
    /// Created, written, or renamed into place: (re-)ingest it.
    Changed,

    /// Deleted or renamed away: drop its records.
    Removed,
}

impl FileEventKind {
    /// Map a notify event kind. Access and metadata-only events map to `None`.
    pub fn from_notify(kind: &notify::EventKind) -> Option<Self> {
        use notify::EventKind;
        use notify::event::{ModifyKind, RenameMode};

        match kind {
            EventKind::Create(_) => Some(Self::Changed),
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(Self::Removed),
            EventKind::Modify(ModifyKind::Metadata(_)) => None,
            EventKind::Modify(_) => Some(Self::Changed),
            EventKind::Remove(_) => Some(Self::Removed),
            _ => None,
        }
    }
}

/// Coalesces bursts of events per path.
///
/// A path is released once no event arrived for it during the quiet window,
/// carrying the kind of its latest event.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: HashMap<PathBuf, (FileEvent, Instant)>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    /// Record an event seen at `now`, restarting the path's quiet window.
    pub fn push(&mut self, event: FileEvent, now: Instant) {
        self.pending
            .insert(event.path.clone(), (event, now + self.window));
    }

    /// Earliest moment a pending path becomes ready.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|(_, deadline)| *deadline).min()
    }

    /// Take every event whose quiet window has passed, oldest first.
    pub fn take_ready(&mut self, now: Instant) -> Vec<FileEvent> {
        let ready: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, (_, deadline))| *deadline <= now)
            .map(|(path, _)| path.clone())
            .collect();
        self.take(ready)
    }

    /// Take every pending event regardless of its window.
    pub fn take_all(&mut self) -> Vec<FileEvent> {
        let all: Vec<PathBuf> = self.pending.keys().cloned().collect();
        self.take(all)
    }

    fn take(&mut self, paths: Vec<PathBuf>) -> Vec<FileEvent> {
        let mut events: Vec<(FileEvent, Instant)> = paths
            .into_iter()
            .filter_map(|path| self.pending.remove(&path))
            .collect();
        events.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.path.cmp(&b.0.path)));
        events.into_iter().map(|(event, _)| event).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    #[test]
    fn test_notify_kinds_are_mapped() {
        use notify::EventKind;
        use notify::event::{AccessKind, CreateKind, DataChange, ModifyKind, RemoveKind, RenameMode};

        assert_eq!(
            FileEventKind::from_notify(&EventKind::Create(CreateKind::File)),
            Some(FileEventKind::Changed)
        );
        assert_eq!(
            FileEventKind::from_notify(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            Some(FileEventKind::Changed)
        );
        assert_eq!(
            FileEventKind::from_notify(&EventKind::Modify(ModifyKind::Name(RenameMode::To))),
            Some(FileEventKind::Changed)
        );
        assert_eq!(
            FileEventKind::from_notify(&EventKind::Modify(ModifyKind::Name(RenameMode::From))),
            Some(FileEventKind::Removed)
        );
        assert_eq!(
            FileEventKind::from_notify(&EventKind::Remove(RemoveKind::File)),
            Some(FileEventKind::Removed)
        );
        assert_eq!(
            FileEventKind::from_notify(&EventKind::Access(AccessKind::Any)),
            None
        );
    }

    #[test]
    fn test_bursts_collapse_to_latest_event() {
        let start = Instant::now();
        let window = Duration::from_secs(1);
        let mut debouncer = Debouncer::new(window);

        debouncer.push(FileEvent::changed("/docs/a.pdf"), start);
        debouncer.push(FileEvent::changed("/docs/b.md"), start + Duration::from_millis(100));
        debouncer.push(FileEvent::removed("/docs/a.pdf"), start + Duration::from_millis(500));
        assert_eq!(debouncer.len(), 2);

        // b.md went quiet first; a.pdf was touched again later.
        assert_eq!(debouncer.next_deadline(), Some(start + Duration::from_millis(1_100)));
        let ready = debouncer.take_ready(start + Duration::from_millis(1_200));
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].path, Path::new("/docs/b.md"));

        let ready = debouncer.take_ready(start + Duration::from_millis(1_500));
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].kind, FileEventKind::Removed);
        assert!(debouncer.is_empty());
        assert_eq!(debouncer.next_deadline(), None);
    }

    #[test]
    fn test_take_all_flushes_in_order() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_secs(5));
        debouncer.push(FileEvent::changed("/docs/z.txt"), start);
        debouncer.push(FileEvent::changed("/docs/a.txt"), start + Duration::from_millis(1));

        let paths: Vec<PathBuf> = debouncer.take_all().into_iter().map(|e| e.path).collect();
        assert_eq!(
            paths,
            vec![PathBuf::from("/docs/z.txt"), PathBuf::from("/docs/a.txt")]
        );
    }
}
