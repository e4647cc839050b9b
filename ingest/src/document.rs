//! Source documents.

use std::path::{Component, Path};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Extracted text of one source file.
///
/// A document is immutable once built. Its identity is stable across
/// re-ingestion, and its full text is the page texts joined with `\n`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    id: String,
    source: String,
    pages: Vec<String>,
    text: String,
    content_hash: String,
}

impl Document {
    /// Build a document from its page texts.
    pub fn new(id: impl Into<String>, source: impl Into<String>, pages: Vec<String>) -> Self {
        let text = pages.join("\n");
        let content_hash = content_hash(&text);
        Self {
            id: id.into(),
            source: source.into(),
            pages,
            text,
            content_hash,
        }
    }

    /// Build a single-page document.
    pub fn from_text(id: impl Into<String>, source: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(id, source, vec![text.into()])
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Label shown in citations, usually the file path.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn pages(&self) -> &[String] {
        &self.pages
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Hex SHA-256 of the full text.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Length of the full text in characters.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Hex SHA-256 digest of `text`.
pub fn content_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

/// Stable identity for the file at `path`.
///
/// Inside `root` the identity is the `/`-separated relative path, so equally
/// named files in different folders stay distinct. Outside of it, the file
/// name is used.
pub fn document_id_for(root: Option<&Path>, path: &Path) -> String {
    let relative = root.and_then(|root| path.strip_prefix(root).ok());
    match relative {
        Some(relative) => relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/"),
        None => path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    #[test]
    fn test_pages_are_joined_with_newline() {
        let doc = Document::new(
            "report.pdf",
            "docs/report.pdf",
            vec!["page one".to_string(), "page two".to_string()],
        );
        assert_eq!(doc.text(), "page one\npage two");
        assert_eq!(doc.char_count(), 17);
    }

    #[test]
    fn test_content_hash_tracks_text() {
        let a = Document::from_text("a.txt", "a.txt", "same");
        let b = Document::from_text("b.txt", "b.txt", "same");
        let c = Document::from_text("a.txt", "a.txt", "changed");
        assert_eq!(a.content_hash(), b.content_hash());
        assert_ne!(a.content_hash(), c.content_hash());
        assert_eq!(a.content_hash().len(), 64);
    }

    #[test]
    fn test_document_id_is_relative_to_root() {
        let root = PathBuf::from("/data/docs");
        assert_eq!(
            document_id_for(Some(&root), &root.join("contracts").join("lease.pdf")),
            "contracts/lease.pdf"
        );
        assert_eq!(
            document_id_for(Some(&root), Path::new("/elsewhere/notes.md")),
            "notes.md"
        );
        assert_eq!(document_id_for(None, Path::new("/tmp/x/readme.txt")), "readme.txt");
    }
}
