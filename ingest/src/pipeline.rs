//! Files on disk to stored records: load, skip unchanged, index, remember.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{ExtractionError, IngestionError, Result};
use crate::extract::DocumentLoader;
use crate::indexer::{Indexer, IngestionReport};
use crate::state::IngestState;

/// Ingests files, skipping those whose content was already ingested.
pub struct IngestPipeline {
    loader: DocumentLoader,
    indexer: Indexer,
    state: Mutex<IngestState>,
    state_path: Option<PathBuf>,
    force: bool,
}

impl IngestPipeline {
    /// Pipeline with an empty, unpersisted state.
    pub fn new(loader: DocumentLoader, indexer: Indexer) -> Self {
        Self {
            loader,
            indexer,
            state: Mutex::new(IngestState::default()),
            state_path: None,
            force: false,
        }
    }

    /// Pipeline whose state is loaded from, and saved to, `state_path`.
    pub async fn with_state_file(
        loader: DocumentLoader,
        indexer: Indexer,
        state_path: PathBuf,
    ) -> std::result::Result<Self, crate::error::IngestFailure> {
        let state = IngestState::load(&state_path).await?;
        Ok(Self {
            loader,
            indexer,
            state: Mutex::new(state),
            state_path: Some(state_path),
            force: false,
        })
    }

    /// Re-ingest files even when their content is unchanged.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn loader(&self) -> &DocumentLoader {
        &self.loader
    }

    pub fn indexer(&self) -> &Indexer {
        &self.indexer
    }

    /// Snapshot of the current state.
    pub async fn state(&self) -> IngestState {
        self.state.lock().await.clone()
    }

    /// Ingest the files at `paths`.
    ///
    /// Unsupported, unreadable and corrupt files are reported as failures;
    /// files without any text and unchanged files are reported as skipped.
    pub async fn ingest_paths(&self, paths: &[PathBuf]) -> IngestionReport {
        let mut report = IngestionReport::default();
        let mut documents = Vec::new();
        let mut hashes = HashMap::new();

        for path in paths {
            let document = match self.loader.load(path).await {
                Ok(document) => document,
                Err(ExtractionError::NoText(id)) => {
                    warn!("Skipping {id}: no readable text");
                    self.drop_stale_version(&id).await;
                    report.skipped.push(id);
                    continue;
                }
                Err(e) => {
                    let failure = IngestionError::new(self.loader.document_id(path), e);
                    warn!("{failure}");
                    report.failed.push(failure);
                    continue;
                }
            };

            let unchanged = self
                .state
                .lock()
                .await
                .is_current(document.id(), document.content_hash());
            if unchanged && !self.force {
                info!("{} is up to date, skipping", document.id());
                report.skipped.push(document.id().to_string());
                continue;
            }

            hashes.insert(document.id().to_string(), document.content_hash().to_string());
            documents.push(document);
        }

        if !documents.is_empty() {
            report.merge(self.indexer.ingest_batch(documents).await);
        }

        if !report.succeeded.is_empty() || !report.failed.is_empty() {
            let mut state = self.state.lock().await;
            let mut changed = false;
            for result in &report.succeeded {
                if let Some(hash) = hashes.get(&result.document_id) {
                    state.record(result.document_id.clone(), hash.clone(), result.chunks);
                    changed = true;
                }
            }
            // A failed document may have lost its stored records, so the
            // next scan must not consider it up to date.
            for failure in &report.failed {
                changed |= state.forget(&failure.document_id).is_some();
            }
            if changed {
                self.persist(&state).await;
            }
        }

        report
    }

    /// Remove the document that was ingested from `path`.
    pub async fn remove_path(&self, path: &Path) -> Result<usize> {
        let id = self.loader.document_id(path);
        self.remove_document(&id).await
    }

    /// Remove a document by id.
    pub async fn remove_document(&self, document_id: &str) -> Result<usize> {
        let removed = self.indexer.remove(document_id).await?;
        let mut state = self.state.lock().await;
        if state.forget(document_id).is_some() {
            self.persist(&state).await;
        }
        Ok(removed)
    }

    /// Remove the stored records of a document whose new version has no
    /// text, so the old version stops answering questions.
    async fn drop_stale_version(&self, document_id: &str) {
        if self.state.lock().await.get(document_id).is_none() {
            return;
        }
        match self.remove_document(document_id).await {
            Ok(removed) => info!("Removed {removed} stale chunks of {document_id}"),
            Err(e) => warn!("{e}"),
        }
    }

    async fn persist(&self, state: &IngestState) {
        let Some(path) = &self.state_path else {
            return;
        };
        // Losing the state only costs a re-ingest on the next scan.
        if let Err(e) = state.save(path).await {
            warn!("Failed to save ingest state to {}: {e}", path.display());
        }
    }
}
