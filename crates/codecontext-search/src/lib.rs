//! CodeContext Search - hybrid retrieval over a vector store
//!
//! This crate wires the core building blocks into the two entry points of
//! the system:
//!
//! - **Indexing**: [`ProjectIndexer`] walks a project, parses code and
//!   documents, extracts the relationship graph, embeds and BM25F-encodes
//!   every entity and upserts points, committing an [`codecontext_core::IndexState`]
//!   at the end of each run. Full and incremental (checksum-based) modes.
//! - **Searching**: [`Retriever`] runs the five-stage pipeline of query
//!   encoding, hybrid RRF search, 1-hop graph expansion, type/name
//!   boosting with score weights, and per-file diversity.
//!
//! Projects are isolated one-collection-per-project via the
//! [`ProjectRegistry`]; backends (Qdrant, in-memory) and embedding
//! providers (OpenAI-compatible, hashing) are closed sets behind static
//! factory tables.

pub mod embeddings;
pub mod error;
pub mod format;
pub mod indexer;
pub mod registry;
pub mod retriever;
pub mod retry;
pub mod schema;
pub mod store;

// Re-exports for convenience
pub use embeddings::{create_provider, EmbeddingProvider, HashProvider, InstructionType, OpenAIProvider};
pub use error::{Result, SearchError};
pub use format::{build_records, render_json, render_text, ExpandOptions, ResultRecord};
pub use indexer::{IndexFileError, IndexReport, ProjectIndexer};
pub use registry::{detect_project_id, normalize_project_id, ProjectInfo, ProjectRegistry, ProjectStatus};
pub use retriever::{RankedResult, Retriever, RetrieverConfig};
pub use schema::{
    collection_name, Fusion, IndexPoint, PointPayload, RelationSummary, SearchFilters, SearchHit,
    STATE_POINT_ID,
};
pub use store::{create_store, MemoryStore, QdrantStore, VectorStore};
