//! Overlapping character-window chunking.
//!
//! Text is cut into windows of at most `chunk_size` characters. Each window
//! after the first starts exactly `chunk_overlap` characters before the end of
//! the previous one, so dropping that prefix from every later chunk and
//! concatenating rebuilds the original text.
//!
//! Offsets and sizes count Unicode scalar values, never bytes, so multi-byte
//! text is never split inside a character.

use std::iter::FusedIterator;

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::ConfigurationError;

/// Chunk size and overlap, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk.
    pub chunk_size: usize,

    /// Characters shared between consecutive chunks.
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
        }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// Check that chunking with these parameters always makes progress.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.chunk_size == 0 {
            return Err(ConfigurationError::ZeroChunkSize);
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigurationError::OverlapTooLarge {
                overlap: self.chunk_overlap,
                size: self.chunk_size,
            });
        }
        Ok(())
    }
}

/// A contiguous window of a document's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Document the chunk was cut from.
    pub document_id: String,

    /// Position in the document's chunk sequence, starting at zero.
    pub index: usize,

    /// Character offset of the first character.
    pub start: usize,

    /// Character offset one past the last character.
    pub end: usize,

    /// Exact text between `start` and `end`.
    pub text: String,

    /// Leading characters shared with the previous chunk.
    pub overlap: usize,
}

impl Chunk {
    /// Length in characters.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The text this chunk adds beyond the previous chunk.
    pub fn fresh_text(&self) -> &str {
        match self.text.char_indices().nth(self.overlap) {
            Some((byte, _)) => &self.text[byte..],
            None => "",
        }
    }
}

/// Splits text into overlapping chunks.
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    /// Create a chunker, rejecting sizes that could not make progress.
    pub fn new(config: ChunkingConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> ChunkingConfig {
        self.config
    }

    /// Lazily chunk `text`. Empty text yields no chunks.
    ///
    /// The iterator is cheap to clone, and a clone restarts from wherever the
    /// original stood.
    pub fn chunks<'a>(&self, document_id: &'a str, text: &'a str) -> Chunks<'a> {
        Chunks {
            document_id,
            text,
            chunk_size: self.config.chunk_size,
            chunk_overlap: self.config.chunk_overlap,
            index: 0,
            start_char: 0,
            start_byte: 0,
            done: text.is_empty(),
        }
    }

    /// Lazily chunk a document's full text.
    pub fn chunk_document<'a>(&self, document: &'a Document) -> Chunks<'a> {
        self.chunks(document.id(), document.text())
    }
}

/// Iterator over the chunks of one text.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    document_id: &'a str,
    text: &'a str,
    chunk_size: usize,
    chunk_overlap: usize,
    index: usize,
    start_char: usize,
    start_byte: usize,
    done: bool,
}

impl Chunks<'_> {
    /// Pick the cut point, in characters from the window start.
    ///
    /// Only the last fifth of the window is searched, and never at or before
    /// the overlap, so the next window always starts further on. A sentence
    /// end wins over plain whitespace; without either the window is cut hard.
    fn find_cut(&self, window: &[(usize, char)], size: usize) -> usize {
        let earliest = (self.chunk_overlap + 1).max(size - size / 5);

        let is_sentence_end = |cut: usize| {
            let last = window[cut - 1].1;
            last == '\n'
                || (last.is_whitespace()
                    && cut >= 2
                    && matches!(window[cut - 2].1, '.' | '!' | '?'))
        };
        if let Some(cut) = (earliest..=size).rev().find(|&cut| is_sentence_end(cut)) {
            return cut;
        }

        (earliest..=size)
            .rev()
            .find(|&cut| window[cut - 1].1.is_whitespace())
            .unwrap_or(size)
    }
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.done {
            return None;
        }

        let rest = &self.text[self.start_byte..];
        // One character past the window tells whether the text ends inside it.
        let window: Vec<(usize, char)> = rest.char_indices().take(self.chunk_size + 1).collect();
        let reaches_end = window.len() <= self.chunk_size;

        let cut = if reaches_end {
            window.len()
        } else {
            self.find_cut(&window, self.chunk_size)
        };
        let end_byte = window.get(cut).map_or(rest.len(), |(byte, _)| *byte);

        let chunk = Chunk {
            document_id: self.document_id.to_string(),
            index: self.index,
            start: self.start_char,
            end: self.start_char + cut,
            text: rest[..end_byte].to_string(),
            overlap: if self.index == 0 { 0 } else { self.chunk_overlap },
        };

        if reaches_end {
            self.done = true;
        } else {
            let advance = cut - self.chunk_overlap;
            self.start_byte += window[advance].0;
            self.start_char += advance;
            self.index += 1;
        }

        Some(chunk)
    }
}

impl FusedIterator for Chunks<'_> {}
