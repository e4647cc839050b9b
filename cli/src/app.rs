//! Wiring: one store, one set of providers, shared by every command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use askdocs_chat::{Session, SessionConfig};
use askdocs_ingest::{DocumentLoader, IngestPipeline, Indexer};
use askdocs_providers::{
    CachedEmbedder, EmbeddingProvider, GenerationProvider, OllamaEmbedder, OllamaGenerator,
    ProviderError,
};
use askdocs_retrieval::Retriever;
use askdocs_store::{LocalVectorStore, VectorStore};
use tracing::{info, warn};

use crate::config::AppConfig;

pub struct App {
    pub config: AppConfig,
    store: Arc<LocalVectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn GenerationProvider>,
}

impl App {
    /// Open the store under the configured data directory and connect the
    /// Ollama providers.
    pub async fn open(config: AppConfig) -> Result<Self> {
        let store_dir = config.store_dir();
        let store = LocalVectorStore::open(&store_dir)
            .await
            .with_context(|| format!("failed to open vector store at {}", store_dir.display()))?;

        let ollama = OllamaEmbedder::new(config.ollama.clone())
            .context("failed to create the Ollama embedding client")?;
        let embedder: Arc<dyn EmbeddingProvider> = if config.embedding_cache_entries > 0 {
            Arc::new(CachedEmbedder::new(
                Arc::new(ollama),
                config.embedding_cache_entries,
            ))
        } else {
            Arc::new(ollama)
        };
        let generator: Arc<dyn GenerationProvider> = Arc::new(
            OllamaGenerator::new(config.ollama.clone())
                .context("failed to create the Ollama chat client")?,
        );

        Ok(Self {
            config,
            store: Arc::new(store),
            embedder,
            generator,
        })
    }

    pub fn store(&self) -> Arc<dyn VectorStore> {
        self.store.clone()
    }

    /// Warn about an unreachable server or missing models. Never fatal: the
    /// command itself reports the failure if it needs the model.
    pub async fn check_providers(&self, need_generator: bool) {
        if let Err(e) = self.embedder.health_check().await {
            warn_unhealthy("embedding", &e);
        }
        if need_generator {
            if let Err(e) = self.generator.health_check().await {
                warn_unhealthy("chat", &e);
            }
        }
    }

    /// Directory document ids are relative to, when it exists.
    pub fn documents_root(&self) -> Option<PathBuf> {
        std::fs::canonicalize(&self.config.documents.path).ok()
    }

    pub async fn pipeline(&self, force: bool) -> Result<IngestPipeline> {
        let loader = DocumentLoader::new(self.documents_root()).with_ocr(self.config.ocr.clone());
        let indexer = Indexer::new(
            self.config.indexer_config(),
            Arc::clone(&self.embedder),
            self.store(),
        )
        .context("invalid indexer configuration")?;

        let state_file = self.config.state_file();
        let pipeline = IngestPipeline::with_state_file(loader, indexer, state_file.clone())
            .await
            .with_context(|| format!("failed to load ingest state {}", state_file.display()))?;
        Ok(pipeline.with_force(force))
    }

    pub fn retriever(&self, top_k: Option<usize>) -> Arc<Retriever> {
        let mut config = self.config.retrieval_config();
        if let Some(top_k) = top_k {
            config = config.with_top_k(top_k);
        }
        Arc::new(Retriever::new(config, Arc::clone(&self.embedder), self.store()))
    }

    pub fn session(&self, config: SessionConfig, top_k: Option<usize>) -> Session {
        Session::new(config, self.retriever(top_k), Arc::clone(&self.generator))
    }

    /// Flush the store. Closes it when nothing else holds it.
    pub async fn shutdown(self) -> Result<()> {
        match Arc::try_unwrap(self.store) {
            Ok(store) => store.close().await,
            Err(store) => store.flush().await,
        }
        .context("failed to flush the vector store")?;
        info!("Shut down");
        Ok(())
    }
}

fn warn_unhealthy(role: &str, error: &ProviderError) {
    match error {
        ProviderError::ModelNotFound(model) => {
            warn!("The {role} model {model} is not installed; run `ollama pull {model}`");
        }
        other => warn!("The {role} model is not available: {other}"),
    }
}

/// Resolve a command-line path so document ids match those from the watcher.
pub fn absolute(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
