//! Local, file-backed vector store.
//!
//! Each collection lives in memory and is persisted as one JSON file,
//! `<root>/<collection>.json`, rewritten atomically through a temporary file
//! after every successful write.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::index::CollectionIndex;
use crate::record::{DocumentSummary, EmbeddingRecord, QueryMatch};
use crate::vector_store::VectorStore;

/// Vector store kept in memory and persisted to a directory.
///
/// Reads take a shared lock and run concurrently; writes take an exclusive
/// lock and are applied one at a time, so concurrent writers are safe.
pub struct LocalVectorStore {
    /// Directory holding collection files; `None` for a purely in-memory store.
    root: Option<PathBuf>,

    /// Loaded collections by name.
    collections: RwLock<HashMap<String, CollectionIndex>>,
}

impl LocalVectorStore {
    /// Open the store rooted at `root`, loading every persisted collection.
    ///
    /// The directory is created if it doesn't exist.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;

        let mut collections = HashMap::new();
        let mut entries = fs::read_dir(&root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let index = Self::load_collection(&path).await?;
            debug!("Loaded collection {name} with {} records", index.len());
            collections.insert(name.to_string(), index);
        }

        info!(
            "Opened vector store at {} with {} collections",
            root.display(),
            collections.len()
        );

        Ok(Self {
            root: Some(root),
            collections: RwLock::new(collections),
        })
    }

    /// Create a store that never touches the disk.
    pub fn in_memory() -> Self {
        Self {
            root: None,
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Directory the store persists to, if any.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Flush every collection and release the store.
    pub async fn close(self) -> Result<()> {
        self.flush().await?;
        info!("Closed vector store");
        Ok(())
    }

    /// Names of all collections holding records.
    pub async fn collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .collections
            .read()
            .await
            .iter()
            .filter(|(_, index)| !index.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    fn validate_name(collection: &str) -> Result<()> {
        let valid = !collection.is_empty()
            && collection
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !collection.starts_with('.');
        if valid {
            Ok(())
        } else {
            Err(StoreError::InvalidCollection(collection.to_string()))
        }
    }

    async fn load_collection(path: &Path) -> Result<CollectionIndex> {
        let content = fs::read_to_string(path).await?;
        let records: Vec<EmbeddingRecord> =
            serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        CollectionIndex::from_records(records).map_err(|e| StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Write a collection to disk atomically using a temp file.
    async fn save_collection(&self, collection: &str, index: &CollectionIndex) -> Result<()> {
        let Some(root) = &self.root else {
            return Ok(());
        };

        let path = root.join(format!("{collection}.json"));
        let content = serde_json::to_string(&index.records())?;

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &content).await?;
        fs::rename(&temp_path, &path).await?;

        debug!("Saved collection {collection} ({} records)", index.len());
        Ok(())
    }

    /// Apply `change` to a collection and persist it, restoring the previous
    /// state if persisting fails.
    async fn write<T>(
        &self,
        collection: &str,
        change: impl FnOnce(&mut CollectionIndex) -> Result<T>,
    ) -> Result<T> {
        Self::validate_name(collection)?;
        let mut collections = self.collections.write().await;
        let index = collections.entry(collection.to_string()).or_default();

        let previous = self.root.is_some().then(|| index.clone());
        let outcome = change(index)?;

        if let Err(err) = self.save_collection(collection, index).await {
            warn!("Failed to persist collection {collection}: {err}");
            if let Some(previous) = previous {
                *index = previous;
            }
            return Err(err);
        }

        Ok(outcome)
    }

    async fn read<T>(&self, collection: &str, view: impl FnOnce(&CollectionIndex) -> T) -> T {
        let collections = self.collections.read().await;
        match collections.get(collection) {
            Some(index) => view(index),
            None => view(&CollectionIndex::new()),
        }
    }
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn upsert_batch(&self, collection: &str, records: Vec<EmbeddingRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let count = records.len();
        self.write(collection, |index| index.insert_all(records))
            .await?;
        debug!("Upserted {count} records into {collection}");
        Ok(())
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.write(collection, |index| Ok(index.remove(ids))).await
    }

    async fn delete_document(&self, collection: &str, document_id: &str) -> Result<usize> {
        let removed = self
            .write(collection, |index| Ok(index.remove_document(document_id)))
            .await?;
        if removed > 0 {
            info!("Deleted {removed} records of {document_id} from {collection}");
        }
        Ok(removed)
    }

    async fn ids_for_document(&self, collection: &str, document_id: &str) -> Result<Vec<String>> {
        Ok(self
            .read(collection, |index| index.ids_for_document(document_id))
            .await)
    }

    async fn query(&self, collection: &str, vector: &[f32], k: usize) -> Result<Vec<QueryMatch>> {
        self.read(collection, |index| index.search(vector, k)).await
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        Ok(self.read(collection, CollectionIndex::len).await)
    }

    async fn documents(&self, collection: &str) -> Result<Vec<DocumentSummary>> {
        Ok(self.read(collection, CollectionIndex::documents).await)
    }

    fn supports_concurrent_writes(&self) -> bool {
        true
    }

    async fn flush(&self) -> Result<()> {
        let collections = self.collections.read().await;
        for (name, index) in collections.iter() {
            self.save_collection(name, index).await?;
        }
        Ok(())
    }
}
