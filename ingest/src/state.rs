//! Record of which sources have been ingested, and at which content.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use crate::error::IngestFailure;

/// File name of the state file inside the data directory.
pub const STATE_FILE_NAME: &str = "ingest_state.json";

/// What was last ingested for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileState {
    pub content_hash: String,
    pub chunks: usize,
    pub ingested_at: DateTime<Utc>,
}

/// Ingested documents by id.
///
/// A document whose current content hash matches the recorded one does not
/// need to be ingested again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestState {
    #[serde(default)]
    files: BTreeMap<String, FileState>,
}

impl IngestState {
    /// Load the state at `path`. A missing file is an empty state.
    pub async fn load(path: &Path) -> Result<Self, IngestFailure> {
        match fs::read_to_string(path).await {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No ingest state at {}", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write the state to `path` through a temporary file.
    pub async fn save(&self, path: &Path) -> Result<(), IngestFailure> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        let temp = path.with_extension("json.tmp");
        fs::write(&temp, contents).await?;
        fs::rename(&temp, path).await?;
        Ok(())
    }

    /// Whether `document_id` was last ingested with exactly this content.
    pub fn is_current(&self, document_id: &str, content_hash: &str) -> bool {
        self.files
            .get(document_id)
            .is_some_and(|state| state.content_hash == content_hash)
    }

    pub fn record(&mut self, document_id: impl Into<String>, content_hash: impl Into<String>, chunks: usize) {
        self.files.insert(
            document_id.into(),
            FileState {
                content_hash: content_hash.into(),
                chunks,
                ingested_at: Utc::now(),
            },
        );
    }

    pub fn forget(&mut self, document_id: &str) -> Option<FileState> {
        self.files.remove(document_id)
    }

    pub fn get(&self, document_id: &str) -> Option<&FileState> {
        self.files.get(document_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FileState)> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_is_empty_state() {
        let dir = TempDir::new().unwrap();
        let state = IngestState::load(&dir.path().join(STATE_FILE_NAME)).await.unwrap();
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn test_state_survives_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join(STATE_FILE_NAME);

        let mut state = IngestState::default();
        state.record("a.pdf", "hash-a", 3);
        state.record("b.md", "hash-b", 1);
        state.forget("b.md");
        state.save(&path).await.unwrap();

        let loaded = IngestState::load(&path).await.unwrap();
        assert_eq!(loaded, state);
        assert!(loaded.is_current("a.pdf", "hash-a"));
        assert!(!loaded.is_current("a.pdf", "hash-changed"));
        assert!(!loaded.is_current("b.md", "hash-b"));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_state_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(STATE_FILE_NAME);
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            IngestState::load(&path).await,
            Err(IngestFailure::Serialization(_))
        ));
    }
}
