//! Bounded context assembly with provenance.

use askdocs_store::QueryMatch;
use serde::{Deserialize, Serialize};

/// Separator between rendered chunks.
const SEPARATOR: &str = "\n\n";

/// Where one piece of the context came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSource {
    /// Citation number used in the rendered context, starting at 1.
    pub rank: usize,

    pub record_id: String,
    pub document_id: String,
    pub source: String,
    pub chunk_index: usize,
    pub start_offset: usize,
    pub end_offset: usize,
    pub score: f32,

    /// Whether only a prefix of the chunk text made it into the context.
    pub truncated: bool,
}

impl ContextSource {
    fn from_match(rank: usize, matched: &QueryMatch, truncated: bool) -> Self {
        Self {
            rank,
            record_id: matched.id.clone(),
            document_id: matched.metadata.document_id.clone(),
            source: matched.metadata.source.clone(),
            chunk_index: matched.metadata.chunk_index,
            start_offset: matched.metadata.start_offset,
            end_offset: matched.metadata.end_offset,
            score: matched.score,
            truncated,
        }
    }

    /// The citation header that precedes the chunk in the context.
    pub fn header(&self) -> String {
        format!(
            "[{}] {} (chars {}-{})",
            self.rank, self.source, self.start_offset, self.end_offset
        )
    }
}

/// Retrieved chunks rendered into one prompt-ready string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssembledContext {
    /// Rendered context: one citation header and text per included chunk,
    /// separated by blank lines.
    pub text: String,

    /// Provenance of every included chunk, in rank order.
    pub sources: Vec<ContextSource>,

    /// Retrieved chunks left out for lack of room.
    pub dropped: usize,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Length of the rendered text in characters.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Render `results`, best first, into at most `max_chars` characters.
///
/// Chunks are taken in rank order until the next one no longer fits; it and
/// everything ranked below it are dropped. A top-ranked chunk too large on its
/// own is cut to fit and marked truncated. If not even its citation header
/// fits, the context is empty.
pub fn assemble_context(results: &[QueryMatch], max_chars: usize) -> AssembledContext {
    let mut context = AssembledContext::default();
    let mut used = 0;

    for (position, matched) in results.iter().enumerate() {
        let rank = position + 1;
        let separator = if position == 0 { 0 } else { SEPARATOR.len() };
        let full = ContextSource::from_match(rank, matched, false);
        let header = full.header();
        let header_chars = header.chars().count() + 1;
        let text_chars = matched.metadata.text.chars().count();

        if used + separator + header_chars + text_chars <= max_chars {
            if separator > 0 {
                context.text.push_str(SEPARATOR);
            }
            context.text.push_str(&header);
            context.text.push('\n');
            context.text.push_str(&matched.metadata.text);
            context.sources.push(full);
            used += separator + header_chars + text_chars;
            continue;
        }

        if position == 0 && header_chars < max_chars {
            let room = max_chars - header_chars;
            let cut: String = matched.metadata.text.chars().take(room).collect();
            context.text = format!("{header}\n{cut}");
            context.sources.push(ContextSource::from_match(rank, matched, true));
        }
        context.dropped = results.len() - context.sources.len();
        break;
    }

    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use askdocs_store::RecordMetadata;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn matched(document_id: &str, chunk_index: usize, text: &str, score: f32) -> QueryMatch {
        let start = chunk_index * 100;
        QueryMatch {
            id: format!("{document_id}::chunk_{chunk_index}"),
            score,
            metadata: RecordMetadata {
                document_id: document_id.to_string(),
                source: format!("docs/{document_id}"),
                chunk_index,
                start_offset: start,
                end_offset: start + text.chars().count(),
                text: text.to_string(),
                content_hash: "hash".to_string(),
                ingested_at: Utc::now(),
            },
        }
    }

    #[test]
    fn test_renders_headers_and_blank_lines() {
        let results = vec![
            matched("a.pdf", 0, "Alpha text.", 0.9),
            matched("b.md", 3, "Beta text.", 0.8),
        ];
        let context = assemble_context(&results, 4_000);

        assert_eq!(
            context.text,
            "[1] docs/a.pdf (chars 0-11)\nAlpha text.\n\n[2] docs/b.md (chars 300-310)\nBeta text."
        );
        assert_eq!(context.sources.len(), 2);
        assert_eq!(context.sources[1].rank, 2);
        assert_eq!(context.sources[1].document_id, "b.md");
        assert_eq!(context.sources[1].chunk_index, 3);
        assert!(!context.sources[0].truncated);
        assert_eq!(context.dropped, 0);
    }

    #[test]
    fn test_stops_at_first_chunk_that_does_not_fit() {
        let results = vec![
            matched("a.txt", 0, &"a".repeat(100), 0.9),
            matched("b.txt", 0, &"b".repeat(100), 0.8),
            matched("c.txt", 0, "c", 0.7),
        ];
        let context = assemble_context(&results, 200);

        assert_eq!(context.sources.len(), 1);
        assert_eq!(context.dropped, 2);
        assert!(context.char_count() <= 200);
    }

    #[test]
    fn test_oversized_top_chunk_is_truncated() {
        let results = vec![
            matched("big.txt", 0, &"x".repeat(5_000), 0.9),
            matched("small.txt", 0, "tiny", 0.5),
        ];
        let context = assemble_context(&results, 500);

        assert_eq!(context.char_count(), 500);
        assert!(context.text.starts_with("[1] docs/big.txt (chars 0-5000)\nxxx"));
        assert_eq!(context.sources.len(), 1);
        assert!(context.sources[0].truncated);
        assert_eq!(context.dropped, 1);
    }

    #[test]
    fn test_budget_smaller_than_header_gives_empty_context() {
        let results = vec![matched("a.txt", 0, "text", 0.9)];
        let context = assemble_context(&results, 5);
        assert!(context.is_empty());
        assert_eq!(context.text, "");
        assert_eq!(context.dropped, 1);
    }

    #[test]
    fn test_no_results_is_empty() {
        let context = assemble_context(&[], 4_000);
        assert!(context.is_empty());
        assert_eq!(context.dropped, 0);
    }
}
