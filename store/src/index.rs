//! In-memory index for one collection.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{Result, StoreError};
use crate::record::{DocumentSummary, EmbeddingRecord, QueryMatch};
use crate::similarity::find_top_k;

/// All records of one collection, searchable by cosine similarity.
///
/// The dimension is fixed by the first record inserted and released again
/// once the collection is empty.
#[derive(Debug, Clone, Default)]
pub struct CollectionIndex {
    records: HashMap<String, EmbeddingRecord>,
}

impl CollectionIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from records, checking that their dimensions agree.
    pub fn from_records(records: Vec<EmbeddingRecord>) -> Result<Self> {
        let mut index = Self::new();
        index.insert_all(records)?;
        Ok(index)
    }

    /// Dimension of the stored vectors, if any are stored.
    pub fn dimension(&self) -> Option<usize> {
        self.records.values().next().map(|r| r.vector.len())
    }

    fn check_dimension(expected: Option<usize>, actual: usize) -> Result<()> {
        match expected {
            Some(expected) if expected != actual => {
                Err(StoreError::DimensionMismatch { expected, actual })
            }
            _ => Ok(()),
        }
    }

    /// Insert or replace records. Either all records are inserted or none.
    pub fn insert_all(&mut self, records: Vec<EmbeddingRecord>) -> Result<()> {
        let mut dimension = self.dimension();
        for record in &records {
            if record.vector.is_empty() {
                return Err(StoreError::DimensionMismatch {
                    expected: dimension.unwrap_or(1),
                    actual: 0,
                });
            }
            Self::check_dimension(dimension, record.vector.len())?;
            dimension = Some(record.vector.len());
        }

        for record in records {
            debug!("Indexed record {}", record.id);
            self.records.insert(record.id.clone(), record);
        }
        Ok(())
    }

    /// Remove records by id, returning how many existed.
    pub fn remove(&mut self, ids: &[String]) -> usize {
        let mut removed = 0;
        for id in ids {
            if self.records.remove(id).is_some() {
                removed += 1;
            }
        }
        removed
    }

    /// Ids of every record belonging to a document, in chunk order.
    pub fn ids_for_document(&self, document_id: &str) -> Vec<String> {
        let mut records: Vec<&EmbeddingRecord> = self
            .records
            .values()
            .filter(|r| r.metadata.document_id == document_id)
            .collect();
        records.sort_by_key(|r| r.metadata.chunk_index);
        records.into_iter().map(|r| r.id.clone()).collect()
    }

    /// Remove every record of a document, returning how many were removed.
    pub fn remove_document(&mut self, document_id: &str) -> usize {
        let before = self.records.len();
        self.records
            .retain(|_, r| r.metadata.document_id != document_id);
        before - self.records.len()
    }

    /// Find the `k` records closest to `query`.
    ///
    /// Equal scores are ordered by ascending chunk index, then document id.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<QueryMatch>> {
        let Some(dimension) = self.dimension() else {
            return Ok(Vec::new());
        };
        Self::check_dimension(Some(dimension), query.len())?;

        let candidates = self.records.values().map(|r| {
            (
                (
                    r.metadata.chunk_index,
                    r.metadata.document_id.as_str(),
                    r.id.as_str(),
                ),
                r.vector.as_slice(),
            )
        });

        let top = find_top_k(query, candidates, k)?;
        let matches = top
            .into_iter()
            .filter_map(|((_, _, id), score)| {
                self.records.get(id).map(|r| QueryMatch {
                    id: r.id.clone(),
                    score,
                    metadata: r.metadata.clone(),
                })
            })
            .collect();
        Ok(matches)
    }

    /// Per-document summaries, ordered by document id.
    pub fn documents(&self) -> Vec<DocumentSummary> {
        let mut documents: HashMap<&str, DocumentSummary> = HashMap::new();
        for record in self.records.values() {
            let meta = &record.metadata;
            documents
                .entry(meta.document_id.as_str())
                .and_modify(|d| d.chunks += 1)
                .or_insert_with(|| DocumentSummary {
                    document_id: meta.document_id.clone(),
                    source: meta.source.clone(),
                    chunks: 1,
                    content_hash: meta.content_hash.clone(),
                    ingested_at: meta.ingested_at,
                });
        }

        let mut documents: Vec<DocumentSummary> = documents.into_values().collect();
        documents.sort_by(|a, b| a.document_id.cmp(&b.document_id));
        documents
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records, ordered by id for stable serialization.
    pub fn records(&self) -> Vec<&EmbeddingRecord> {
        let mut records: Vec<&EmbeddingRecord> = self.records.values().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordMetadata;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn record(document_id: &str, chunk_index: usize, vector: Vec<f32>) -> EmbeddingRecord {
        EmbeddingRecord::new(
            vector,
            RecordMetadata {
                document_id: document_id.to_string(),
                source: format!("docs/{document_id}"),
                chunk_index,
                start_offset: chunk_index * 10,
                end_offset: chunk_index * 10 + 10,
                text: format!("chunk {chunk_index}"),
                content_hash: "abc".to_string(),
                ingested_at: Utc::now(),
            },
        )
    }

    #[test]
    fn test_search_orders_ties_by_chunk_index() {
        let index = CollectionIndex::from_records(vec![
            record("b.txt", 2, vec![1.0, 0.0]),
            record("a.txt", 5, vec![1.0, 0.0]),
            record("a.txt", 0, vec![1.0, 0.0]),
            record("c.txt", 1, vec![0.0, 1.0]),
        ])
        .unwrap();

        let matches = index.search(&[1.0, 0.0], 3).unwrap();
        let ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a.txt::chunk_0", "b.txt::chunk_2", "a.txt::chunk_5"]);
    }

    #[test]
    fn test_empty_index_search_is_empty() {
        let index = CollectionIndex::new();
        assert!(index.search(&[1.0, 0.0, 0.0], 4).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_mismatch_rejects_whole_batch() {
        let mut index = CollectionIndex::from_records(vec![record("a.txt", 0, vec![1.0, 0.0])])
            .unwrap();

        let result = index.insert_all(vec![
            record("b.txt", 0, vec![1.0, 0.0]),
            record("b.txt", 1, vec![1.0, 0.0, 0.0]),
        ]);

        assert!(matches!(result, Err(StoreError::DimensionMismatch { .. })));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_remove_document() {
        let mut index = CollectionIndex::from_records(vec![
            record("a.txt", 0, vec![1.0]),
            record("a.txt", 1, vec![1.0]),
            record("b.txt", 0, vec![1.0]),
        ])
        .unwrap();

        assert_eq!(index.ids_for_document("a.txt"), vec!["a.txt::chunk_0", "a.txt::chunk_1"]);
        assert_eq!(index.remove_document("a.txt"), 2);
        assert_eq!(index.len(), 1);
        assert_eq!(index.documents()[0].document_id, "b.txt");
    }
}
