//! Text extraction from source files.
//!
//! Extractors are synchronous and CPU bound; [`DocumentLoader`] runs them on
//! the blocking pool.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::document::{Document, document_id_for};
use crate::error::ExtractionError;

/// Page break emitted by `pdf-extract` between pages.
const FORM_FEED: char = '\x0C';

/// Turns the bytes of one file into page texts.
pub trait TextExtractor: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Lowercase file extensions this extractor handles, without the dot.
    fn extensions(&self) -> &[&str];

    /// Extract the page texts of `file_name`.
    fn extract(&self, file_name: &str, bytes: &[u8]) -> Result<Vec<String>, ExtractionError>;
}

/// Plain text and markdown.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn name(&self) -> &str {
        "plain-text"
    }

    fn extensions(&self) -> &[&str] {
        &["txt", "text", "md", "markdown"]
    }

    fn extract(&self, _file_name: &str, bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
        let decoded = String::from_utf8_lossy(bytes);
        let text = decoded.strip_prefix('\u{feff}').unwrap_or(decoded.as_ref());
        Ok(vec![text.to_string()])
    }
}

/// PDF text, one entry per page.
///
/// Pages come from `lopdf`. When that yields nothing, the whole document is
/// run through `pdf-extract` and split on form feeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

impl PdfExtractor {
    fn lopdf_pages(bytes: &[u8]) -> Result<Vec<String>, String> {
        let document = lopdf::Document::load_mem(bytes).map_err(|e| e.to_string())?;
        let pages = document
            .get_pages()
            .keys()
            .map(|number| document.extract_text(&[*number]).unwrap_or_default())
            .collect();
        Ok(pages)
    }

    fn pdf_extract_pages(bytes: &[u8]) -> Result<Vec<String>, String> {
        // pdf-extract panics on some malformed inputs.
        let text = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
            .map_err(|_| "pdf-extract panicked".to_string())?
            .map_err(|e| e.to_string())?;
        Ok(text.split(FORM_FEED).map(str::to_string).collect())
    }
}

fn has_text(pages: &[String]) -> bool {
    pages.iter().any(|page| !page.trim().is_empty())
}

impl TextExtractor for PdfExtractor {
    fn name(&self) -> &str {
        "pdf"
    }

    fn extensions(&self) -> &[&str] {
        &["pdf"]
    }

    fn extract(&self, file_name: &str, bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
        let lopdf_error = match Self::lopdf_pages(bytes) {
            Ok(pages) if has_text(&pages) => return Ok(pages),
            Ok(_) => None,
            Err(e) => {
                debug!("lopdf could not read {file_name}: {e}");
                Some(e)
            }
        };

        match Self::pdf_extract_pages(bytes) {
            Ok(pages) if has_text(&pages) => Ok(pages),
            Ok(_) => Err(ExtractionError::NoText(file_name.to_string())),
            // A file lopdf could open but with no text layer is a scan, not corruption.
            Err(_) if lopdf_error.is_none() => Err(ExtractionError::NoText(file_name.to_string())),
            Err(e) => Err(ExtractionError::Parse {
                file: file_name.to_string(),
                reason: e,
            }),
        }
    }
}

/// Extractors by file extension.
#[derive(Clone)]
pub struct ExtractorRegistry {
    by_extension: HashMap<String, Arc<dyn TextExtractor>>,
}

impl ExtractorRegistry {
    /// A registry with no extractors.
    pub fn empty() -> Self {
        Self {
            by_extension: HashMap::new(),
        }
    }

    /// Register `extractor` for each of its extensions, replacing earlier ones.
    pub fn register(&mut self, extractor: Arc<dyn TextExtractor>) {
        for extension in extractor.extensions() {
            self.by_extension
                .insert(extension.to_ascii_lowercase(), Arc::clone(&extractor));
        }
    }

    /// Extractor for `path`, chosen by its extension.
    pub fn for_path(&self, path: &Path) -> Option<Arc<dyn TextExtractor>> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        self.by_extension.get(&extension).cloned()
    }

    pub fn supports(&self, path: &Path) -> bool {
        self.for_path(path).is_some()
    }

    /// Every registered extension, sorted.
    pub fn extensions(&self) -> Vec<String> {
        let mut extensions: Vec<String> = self.by_extension.keys().cloned().collect();
        extensions.sort();
        extensions
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(PlainTextExtractor));
        registry.register(Arc::new(PdfExtractor));
        registry
    }
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorRegistry")
            .field("extensions", &self.extensions())
            .finish()
    }
}

/// Settings for running `ocrmypdf` on PDFs without a text layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Whether the fallback runs at all.
    pub enabled: bool,

    /// Program to invoke.
    pub command: String,

    /// Straighten skewed scans.
    pub deskew: bool,

    /// Upper bound for one OCR run.
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            command: "ocrmypdf".to_string(),
            deskew: true,
            timeout_secs: 600,
        }
    }
}

impl OcrConfig {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }
}

/// Runs an external OCR program over a PDF and returns the OCR'd PDF.
#[derive(Debug, Clone)]
pub struct OcrFallback {
    config: OcrConfig,
}

impl OcrFallback {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }

    pub async fn run(&self, file_name: &str, bytes: &[u8]) -> Result<Vec<u8>, ExtractionError> {
        let ocr_error = |reason: String| ExtractionError::Ocr {
            file: file_name.to_string(),
            reason,
        };

        let scratch = tempfile::tempdir().map_err(|e| ocr_error(e.to_string()))?;
        let input = scratch.path().join("input.pdf");
        let output = scratch.path().join("output.pdf");
        tokio::fs::write(&input, bytes)
            .await
            .map_err(|e| ocr_error(e.to_string()))?;

        let mut command = Command::new(&self.config.command);
        command.arg("--skip-text").arg("--quiet");
        if self.config.deskew {
            command.arg("--deskew");
        }
        command.arg(&input).arg(&output).kill_on_drop(true);

        info!("Running OCR on {file_name}");
        let started = std::time::Instant::now();
        let status = tokio::time::timeout(
            Duration::from_secs(self.config.timeout_secs),
            command.status(),
        )
        .await
        .map_err(|_| ocr_error(format!("timed out after {}s", self.config.timeout_secs)))?
        .map_err(|e| ocr_error(format!("could not run {}: {e}", self.config.command)))?;

        if !status.success() {
            return Err(ocr_error(format!("{} exited with {status}", self.config.command)));
        }

        let ocr_bytes = tokio::fs::read(&output)
            .await
            .map_err(|e| ocr_error(e.to_string()))?;
        info!(
            "OCR complete for {file_name} in {:.1}s",
            started.elapsed().as_secs_f64()
        );
        Ok(ocr_bytes)
    }
}

/// Reads files from disk and extracts them into [`Document`]s.
#[derive(Debug, Clone)]
pub struct DocumentLoader {
    registry: ExtractorRegistry,
    root: Option<PathBuf>,
    ocr: Option<OcrFallback>,
}

impl DocumentLoader {
    /// Loader using the default extractors. Document ids are taken relative
    /// to `root` when given.
    pub fn new(root: Option<PathBuf>) -> Self {
        Self {
            registry: ExtractorRegistry::default(),
            root,
            ocr: None,
        }
    }

    pub fn with_registry(mut self, registry: ExtractorRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Enable the OCR fallback if `config.enabled`.
    pub fn with_ocr(mut self, config: OcrConfig) -> Self {
        self.ocr = config.enabled.then(|| OcrFallback::new(config));
        self
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn supports(&self, path: &Path) -> bool {
        self.registry.supports(path)
    }

    pub fn registry(&self) -> &ExtractorRegistry {
        &self.registry
    }

    /// Identity the document at `path` gets.
    pub fn document_id(&self, path: &Path) -> String {
        document_id_for(self.root.as_deref(), path)
    }

    /// Read and extract the file at `path`.
    pub async fn load(&self, path: &Path) -> Result<Document, ExtractionError> {
        let extractor = self
            .registry
            .for_path(path)
            .ok_or_else(|| ExtractionError::Unsupported(path.display().to_string()))?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ExtractionError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let id = self.document_id(path);
        let pages = match Self::extract_blocking(Arc::clone(&extractor), &id, bytes.clone()).await
        {
            Err(ExtractionError::NoText(_)) if extractor.extensions().contains(&"pdf") => {
                let Some(ocr) = &self.ocr else {
                    return Err(ExtractionError::NoText(id));
                };
                warn!("{id} has no text layer, trying OCR");
                let ocr_bytes = ocr.run(&id, &bytes).await?;
                Self::extract_blocking(extractor, &id, ocr_bytes).await?
            }
            other => other?,
        };

        debug!("Extracted {} page(s) from {id}", pages.len());
        Ok(Document::new(id, path.display().to_string(), pages))
    }

    async fn extract_blocking(
        extractor: Arc<dyn TextExtractor>,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Vec<String>, ExtractionError> {
        let name = file_name.to_string();
        tokio::task::spawn_blocking(move || extractor.extract(&name, &bytes))
            .await
            .map_err(|e| ExtractionError::Parse {
                file: file_name.to_string(),
                reason: format!("extraction task failed: {e}"),
            })?
    }
}
