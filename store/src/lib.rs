//! # Vector Store
//!
//! Persistent storage and similarity search for chunk embeddings.
//!
//! ## Features
//!
//! - **Collections**: Records are grouped under a collection name
//! - **Cosine Search**: Top-k lookup with deterministic tie-breaking
//! - **Document Identity**: Every record carries its document id, so a
//!   document's records can be listed, replaced and removed together
//! - **Atomic Persistence**: Collections are rewritten through a temp file
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Vector Store                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  VectorStore (trait) ◄── LocalVectorStore                       │
//! │                               │                                 │
//! │                               ▼                                 │
//! │              CollectionIndex ──► cosine_similarity              │
//! │                               │                                 │
//! │                               ▼                                 │
//! │                     <root>/<collection>.json                    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod index;
pub mod local;
pub mod record;
pub mod similarity;
pub mod vector_store;

pub use error::{Result, StoreError};
pub use index::CollectionIndex;
pub use local::LocalVectorStore;
pub use record::{DocumentSummary, EmbeddingRecord, QueryMatch, RecordMetadata};
pub use similarity::cosine_similarity;
pub use vector_store::VectorStore;
