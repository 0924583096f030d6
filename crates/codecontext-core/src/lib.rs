//! CodeContext Core - code-aware retrieval building blocks
//!
//! This crate provides the language-level machinery behind CodeContext:
//! - Code-aware tokenization with bounded memoization
//! - BM25F sparse encoding keyed by stable 64-bit token hashes
//! - Tree-sitter AST parsing for multiple languages
//! - Markdown and config-file chunking
//! - Cross-file relationship extraction over a bidirectional graph
//! - Deterministic entity ids and checksums for incremental indexing

pub mod bm25f;
pub mod discovery;
pub mod extractor;
pub mod model;
pub mod parser;
pub mod relations;
pub mod score;
pub mod tokenizer;

// Re-exports for convenience
pub use bm25f::{Bm25fConfig, Bm25fEncoder, Field, FieldWeights, SparseVector};
pub use discovery::{
    DiscoveredFile, DiscoveryConfig, DiscoveryError, FileDiscovery, FileKind, SkipCounts,
};
pub use extractor::{extract_relationships, ObjectIndex};
pub use model::{
    content_checksum, normalize_path, object_id, point_id, token_index, CodeObject, DocumentNode,
    DocumentNodeType, FileChecksum, IndexState, ObjectType,
};
pub use parser::config_file::{parse_config, ConfigFormat};
pub use parser::document::{parse_markdown, ChunkConfig};
pub use parser::{
    complexity_metrics, ComplexityMetrics, Language, ParseError, ParsedFile, ReferenceKind,
    SourceParser, SymbolReference,
};
pub use relations::{Endpoint, RelationType, Relationship, RelationshipGraph};
pub use score::score_weight;
pub use tokenizer::Tokenizer;
