//! Configuration file handling.
//!
//! Settings come from, in order of precedence:
//! 1. Command-line flags
//! 2. The file given with `--config`, or `<config dir>/askdocs/config.toml`
//! 3. Built-in defaults

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use askdocs_chat::SessionConfig;
use askdocs_ingest::{IndexerConfig, OcrConfig, STATE_FILE_NAME};
use askdocs_providers::OllamaConfig;
use askdocs_retrieval::RetrievalConfig;
use askdocs_watcher::WatchConfig;
use serde::{Deserialize, Serialize};

/// Everything the `askdocs` binary can be configured with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where the vector store and ingest state live. Defaults to
    /// `<data dir>/askdocs`.
    pub data_dir: Option<PathBuf>,

    /// Collection documents are indexed into and answered from.
    pub collection: String,

    /// Query embeddings kept in memory; 0 disables the cache.
    pub embedding_cache_entries: usize,

    pub documents: WatchConfig,
    pub ollama: OllamaConfig,
    pub indexer: IndexerConfig,
    pub retrieval: RetrievalConfig,
    pub session: SessionConfig,
    pub ocr: OcrConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            collection: "documents".to_string(),
            embedding_cache_entries: 1_024,
            documents: WatchConfig::default(),
            ollama: OllamaConfig::default(),
            indexer: IndexerConfig::default(),
            retrieval: RetrievalConfig::default(),
            session: SessionConfig::default(),
            ocr: OcrConfig::default(),
        }
    }
}

impl AppConfig {
    /// Default location of the config file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("askdocs")
            .join("config.toml")
    }

    /// Load the config at `path`, or the default file when `path` is `None`.
    ///
    /// A missing default file means defaults; a missing explicit file is an
    /// error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (Self::default_path(), false),
        };

        if !explicit && !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("askdocs")
        })
    }

    pub fn store_dir(&self) -> PathBuf {
        self.data_dir().join("store")
    }

    pub fn state_file(&self) -> PathBuf {
        self.data_dir().join(STATE_FILE_NAME)
    }

    /// Indexer settings writing into [`collection`](Self::collection).
    pub fn indexer_config(&self) -> IndexerConfig {
        self.indexer.clone().with_collection(self.collection.clone())
    }

    /// Retrieval settings reading from [`collection`](Self::collection).
    pub fn retrieval_config(&self) -> RetrievalConfig {
        self.retrieval.clone().with_collection(self.collection.clone())
    }
}
