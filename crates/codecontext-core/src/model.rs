//! Entity model for indexed code and documentation.
//!
//! Defines the two atomic indexed units, [`CodeObject`] and [`DocumentNode`],
//! together with the per-file checksum record and the per-project
//! [`IndexState`] summary that incremental sync relies on.
//!
//! All ids are deterministic truncated SHA-256 digests so that re-parsing
//! unchanged input yields identical ids across processes and platforms.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::relations::Relationship;

/// Semantic kind of an extracted code fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Class,
    Interface,
    Enum,
    Method,
    Function,
    Field,
    Variable,
    Constant,
    Property,
    Type,
    Import,
}

impl ObjectType {
    /// Stable lowercase name used in ids, payloads and CLI filters.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Class => "class",
            ObjectType::Interface => "interface",
            ObjectType::Enum => "enum",
            ObjectType::Method => "method",
            ObjectType::Function => "function",
            ObjectType::Field => "field",
            ObjectType::Variable => "variable",
            ObjectType::Constant => "constant",
            ObjectType::Property => "property",
            ObjectType::Type => "type",
            ObjectType::Import => "import",
        }
    }

    /// Parse a CLI/payload string back into an object type.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "class" => Some(ObjectType::Class),
            "interface" => Some(ObjectType::Interface),
            "enum" => Some(ObjectType::Enum),
            "method" => Some(ObjectType::Method),
            "function" => Some(ObjectType::Function),
            "field" => Some(ObjectType::Field),
            "variable" => Some(ObjectType::Variable),
            "constant" => Some(ObjectType::Constant),
            "property" => Some(ObjectType::Property),
            "type" => Some(ObjectType::Type),
            "import" => Some(ObjectType::Import),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of a documentation or configuration chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentNodeType {
    Heading,
    Paragraph,
    CodeBlock,
    ConfigKey,
}

impl DocumentNodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentNodeType::Heading => "heading",
            DocumentNodeType::Paragraph => "paragraph",
            DocumentNodeType::CodeBlock => "code_block",
            DocumentNodeType::ConfigKey => "config_key",
        }
    }
}

impl fmt::Display for DocumentNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A semantic code fragment extracted by an AST parser.
///
/// `file_path` is project-relative with forward slashes; lines are 1-based
/// and inclusive. `metadata` carries complexity metrics and the pre-computed
/// `score_weight` once the indexer has attached it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeObject {
    /// Deterministic id: see [`object_id`].
    pub id: String,
    pub name: String,
    /// Dot-separated path through containing scopes (module.Class.method).
    pub qualified_name: String,
    pub object_type: ObjectType,
    pub language: String,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    /// Raw source slice for this object.
    pub content: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub signature: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub docstring: String,
    /// Truncated SHA-256 of `content`; drives incremental change detection.
    pub checksum: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl CodeObject {
    /// Build an object with its deterministic id and checksum filled in.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        qualified_name: impl Into<String>,
        object_type: ObjectType,
        language: impl Into<String>,
        file_path: impl Into<String>,
        start_line: u32,
        end_line: u32,
        content: impl Into<String>,
    ) -> Self {
        let file_path = normalize_path(&file_path.into());
        let qualified_name = qualified_name.into();
        let content = content.into();
        let id = object_id(&file_path, &qualified_name, start_line, object_type.as_str());
        let checksum = content_checksum(content.as_bytes());
        Self {
            id,
            name: name.into(),
            qualified_name,
            object_type,
            language: language.into(),
            file_path,
            start_line,
            end_line,
            content,
            signature: String::new(),
            docstring: String::new(),
            checksum,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = signature.into();
        self
    }

    pub fn with_docstring(mut self, docstring: impl Into<String>) -> Self {
        self.docstring = docstring.into();
        self
    }

    /// Name of the file without its directory part.
    pub fn file_name(&self) -> &str {
        self.file_path.rsplit('/').next().unwrap_or(&self.file_path)
    }
}

/// A chunk of documentation or configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentNode {
    /// Deterministic id: see [`object_id`] (node type stands in for object type).
    pub id: String,
    pub node_type: DocumentNodeType,
    pub content: String,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    /// Heading depth, when `node_type` is a heading or a chunk under one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    /// Enclosing heading chunk, when any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl DocumentNode {
    pub fn new(
        node_type: DocumentNodeType,
        content: impl Into<String>,
        file_path: impl Into<String>,
        start_line: u32,
        end_line: u32,
    ) -> Self {
        let file_path = normalize_path(&file_path.into());
        let content = content.into();
        // Anchor on the content checksum so same-line siblings stay distinct.
        let anchor = format!("{}#{}", content_checksum(content.as_bytes()), start_line);
        let id = object_id(&file_path, &anchor, start_line, node_type.as_str());
        Self {
            id,
            node_type,
            content,
            file_path,
            start_line,
            end_line,
            level: None,
            parent_id: None,
            metadata: BTreeMap::new(),
        }
    }
}

/// Checksum record for one indexed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChecksum {
    pub file_path: String,
    pub checksum: String,
    /// Unix epoch seconds of the run that last indexed this file.
    pub last_indexed: u64,
}

/// Per-project index summary persisted alongside the points.
///
/// Searches never read this; it exists for incremental sync and `status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexState {
    pub project_id: String,
    pub project_path: String,
    pub total_files: usize,
    pub total_objects: usize,
    pub total_documents: usize,
    /// Unix epoch seconds of the last completed run.
    pub last_indexed: u64,
    /// Keyed by project-relative file path.
    pub file_checksums: BTreeMap<String, FileChecksum>,
    /// Forward edges only; reverse edges are rebuilt on load.
    pub relationships: Vec<Relationship>,
}

// ---------------------------------------------------------------------------
// Deterministic hashing
// ---------------------------------------------------------------------------

/// Deterministic entity id: first 16 hex chars of
/// `SHA-256("{file_path}:{qualified_name}:{start_line}:{kind}")`.
pub fn object_id(file_path: &str, qualified_name: &str, start_line: u32, kind: &str) -> String {
    let digest = Sha256::digest(
        format!("{}:{}:{}:{}", file_path, qualified_name, start_line, kind).as_bytes(),
    );
    hex_prefix(&digest, 16)
}

/// Content checksum: first 16 hex chars of SHA-256 over the raw bytes.
pub fn content_checksum(bytes: &[u8]) -> String {
    hex_prefix(&Sha256::digest(bytes), 16)
}

/// Numeric point id for the vector store: the 16-hex id parsed as u64.
pub fn point_id(id: &str) -> u64 {
    u64::from_str_radix(&id[..id.len().min(16)], 16).unwrap_or(0)
}

/// Sparse-vector index for a token: first 8 hex chars of SHA-256, as u64.
///
/// Collisions are accepted; they couple scores of unrelated terms without
/// breaking correctness.
pub fn token_index(token: &str) -> u64 {
    let digest = Sha256::digest(token.as_bytes());
    let hex = hex_prefix(&digest, 8);
    u64::from_str_radix(&hex, 16).unwrap_or(0)
}

/// Normalize a path to project-relative, forward-slash form.
pub fn normalize_path(path: &str) -> String {
    let forward = path.replace('\\', "/");
    forward
        .trim_start_matches("./")
        .trim_start_matches('/')
        .to_string()
}

fn hex_prefix(digest: &[u8], chars: usize) -> String {
    let mut out = String::with_capacity(chars);
    for byte in digest {
        if out.len() >= chars {
            break;
        }
        out.push_str(&format!("{:02x}", byte));
    }
    out.truncate(chars);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_deterministic() {
        let a = object_id("src/main.py", "main.OrderService", 10, "class");
        let b = object_id("src/main.py", "main.OrderService", 10, "class");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_object_id_varies_by_component() {
        let base = object_id("a.py", "q", 1, "class");
        assert_ne!(base, object_id("b.py", "q", 1, "class"));
        assert_ne!(base, object_id("a.py", "r", 1, "class"));
        assert_ne!(base, object_id("a.py", "q", 2, "class"));
        assert_ne!(base, object_id("a.py", "q", 1, "method"));
    }

    #[test]
    fn test_token_index_stable() {
        // Pinned values guard the bit-exact hash contract.
        assert_eq!(token_index("order"), token_index("order"));
        assert_ne!(token_index("order"), token_index("orders"));
        // 8 hex chars fit in 32 bits.
        assert!(token_index("payment") <= u32::MAX as u64);
    }

    #[test]
    fn test_point_id_parses_hex() {
        let id = object_id("src/x.rs", "x::f", 1, "function");
        assert!(point_id(&id) > 0);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("./src\\lib.rs"), "src/lib.rs");
        assert_eq!(normalize_path("/abs/path.py"), "abs/path.py");
    }

    #[test]
    fn test_code_object_checksum_tracks_content() {
        let a = CodeObject::new("f", "m.f", ObjectType::Function, "python", "m.py", 1, 3, "def f(): pass");
        let b = CodeObject::new("f", "m.f", ObjectType::Function, "python", "m.py", 1, 3, "def f(): return 1");
        assert_eq!(a.id, b.id);
        assert_ne!(a.checksum, b.checksum);
    }

    #[test]
    fn test_object_type_roundtrip() {
        for t in [
            ObjectType::Class,
            ObjectType::Interface,
            ObjectType::Enum,
            ObjectType::Method,
            ObjectType::Function,
            ObjectType::Field,
            ObjectType::Variable,
            ObjectType::Constant,
            ObjectType::Property,
            ObjectType::Type,
            ObjectType::Import,
        ] {
            assert_eq!(ObjectType::parse(t.as_str()), Some(t));
        }
        assert_eq!(ObjectType::parse("bogus"), None);
    }
}
