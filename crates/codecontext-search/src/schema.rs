//! Point schema shared by all vector store backends.
//!
//! Every indexed entity becomes one point with named `dense` and `sparse`
//! vectors plus a payload carrying the entity's fields, its pre-computed
//! `score_weight` and compact relationship summaries. A distinguished point
//! (id [`STATE_POINT_ID`]) holds the project's [`IndexState`].

use codecontext_core::{
    point_id, score_weight, CodeObject, DocumentNode, IndexState, Relationship, SparseVector,
    Tokenizer,
};
use serde::{Deserialize, Serialize};

/// Reserved point id for the per-project index state record.
pub const STATE_POINT_ID: u64 = 1;

/// Payload discriminator values.
pub mod kinds {
    /// A code object point.
    pub const CODE: &str = "code";
    /// A document node point.
    pub const DOCUMENT: &str = "document";
    /// The index-state point; excluded from every search.
    pub const INDEX_STATE: &str = "index_state";
}

/// Payload field names used for store-side filtering.
pub mod fields {
    pub const PROJECT_ID: &str = "project_id";
    pub const KIND: &str = "kind";
    pub const ENTITY_ID: &str = "entity_id";
    pub const NAME: &str = "name";
    pub const OBJECT_TYPE: &str = "object_type";
    pub const LANGUAGE: &str = "language";
    pub const FILE_PATH: &str = "file_path";
}

/// Collection name for a project: `<prefix>_<project_id>`.
pub fn collection_name(prefix: &str, project_id: &str) -> String {
    format!("{}_{}", prefix, project_id)
}

/// Compact relationship rendering stored on each point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationSummary {
    pub relation: String,
    pub name: String,
    pub kind: String,
    pub file: String,
    pub line: u32,
    pub target_id: String,
}

impl RelationSummary {
    fn from_relationship(edge: &Relationship) -> Self {
        Self {
            relation: edge.relation_type.as_str().to_string(),
            name: edge.target.name.clone(),
            kind: edge.target.kind.clone(),
            file: edge.target.file_path.clone(),
            line: edge.target.line,
            target_id: edge.target_id.clone(),
        }
    }
}

/// Unified payload for code and document points.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PointPayload {
    pub project_id: String,
    /// Payload discriminator; see [`kinds`].
    pub kind: String,
    /// Deterministic 16-hex entity id.
    pub entity_id: String,
    pub name: String,
    pub object_type: String,
    pub language: String,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub qualified_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub signature: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub docstring: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub checksum: String,
    pub score_weight: f32,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outgoing_relationships: Vec<RelationSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub incoming_relationships: Vec<RelationSummary>,
}

impl PointPayload {
    /// Build a payload for a code object, attaching its graph neighborhood.
    pub fn from_code_object(
        object: &CodeObject,
        project_id: &str,
        outgoing: &[Relationship],
        incoming: &[Relationship],
        tokenizer: &Tokenizer,
    ) -> Self {
        Self {
            project_id: project_id.to_string(),
            kind: kinds::CODE.to_string(),
            entity_id: object.id.clone(),
            name: object.name.clone(),
            object_type: object.object_type.as_str().to_string(),
            language: object.language.clone(),
            file_path: object.file_path.clone(),
            start_line: object.start_line,
            end_line: object.end_line,
            qualified_name: object.qualified_name.clone(),
            signature: object.signature.clone(),
            docstring: object.docstring.clone(),
            content: object.content.clone(),
            checksum: object.checksum.clone(),
            score_weight: score_weight(tokenizer.token_count(&object.content)),
            metadata: serde_json::json!(object.metadata),
            outgoing_relationships: outgoing.iter().map(RelationSummary::from_relationship).collect(),
            incoming_relationships: incoming.iter().map(RelationSummary::from_relationship).collect(),
        }
    }

    /// Build a payload for a document node.
    pub fn from_document_node(
        node: &DocumentNode,
        project_id: &str,
        language: &str,
        outgoing: &[Relationship],
        incoming: &[Relationship],
        tokenizer: &Tokenizer,
    ) -> Self {
        Self {
            project_id: project_id.to_string(),
            kind: kinds::DOCUMENT.to_string(),
            entity_id: node.id.clone(),
            name: document_title(node),
            object_type: node.node_type.as_str().to_string(),
            language: language.to_string(),
            file_path: node.file_path.clone(),
            start_line: node.start_line,
            end_line: node.end_line,
            qualified_name: String::new(),
            signature: String::new(),
            docstring: String::new(),
            content: node.content.clone(),
            checksum: String::new(),
            score_weight: score_weight(tokenizer.token_count(&node.content)),
            metadata: serde_json::json!(node.metadata),
            outgoing_relationships: outgoing.iter().map(RelationSummary::from_relationship).collect(),
            incoming_relationships: incoming.iter().map(RelationSummary::from_relationship).collect(),
        }
    }

    /// Both directions, outgoing first.
    pub fn relationships(&self) -> impl Iterator<Item = &RelationSummary> {
        self.outgoing_relationships
            .iter()
            .chain(self.incoming_relationships.iter())
    }
}

/// First line of a document chunk serves as its display name.
fn document_title(node: &DocumentNode) -> String {
    let first_line = node.content.lines().next().unwrap_or("");
    let mut title = first_line.trim().to_string();
    if title.len() > 80 {
        title.truncate(80);
    }
    title
}

/// A point ready to upsert.
#[derive(Debug, Clone)]
pub struct IndexPoint {
    pub id: u64,
    pub dense: Vec<f32>,
    pub sparse: SparseVector,
    pub payload: PointPayload,
}

impl IndexPoint {
    pub fn new(dense: Vec<f32>, sparse: SparseVector, payload: PointPayload) -> Self {
        Self {
            id: point_id(&payload.entity_id),
            dense,
            sparse,
            payload,
        }
    }
}

/// A scored hit returned by a store query.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: u64,
    pub score: f32,
    pub payload: PointPayload,
}

/// Post-fusion filters. `language` and `object_type` match exactly;
/// `file_path` matches as a substring of the stored path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilters {
    pub language: Option<String>,
    pub object_type: Option<String>,
    pub file_path: Option<String>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.language.is_none() && self.object_type.is_none() && self.file_path.is_none()
    }

    /// Whether a payload passes every set filter.
    pub fn accepts(&self, payload: &PointPayload) -> bool {
        if let Some(language) = &self.language {
            if !payload.language.eq_ignore_ascii_case(language) {
                return false;
            }
        }
        if let Some(object_type) = &self.object_type {
            if !payload.object_type.eq_ignore_ascii_case(object_type) {
                return false;
            }
        }
        if let Some(pattern) = &self.file_path {
            if !payload.file_path.contains(pattern.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Fusion algorithm requested from the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Fusion {
    /// Reciprocal rank fusion (k = 60, the default).
    #[default]
    Rrf,
    /// Distribution-based score fusion (Qdrant only).
    Dbsf,
}

/// Serialized index-state wrapper stored on the state point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatePayload {
    pub kind: String,
    pub project_id: String,
    pub state: IndexState,
}

impl StatePayload {
    pub fn new(state: IndexState) -> Self {
        Self {
            kind: kinds::INDEX_STATE.to_string(),
            project_id: state.project_id.clone(),
            state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codecontext_core::ObjectType;

    #[test]
    fn test_collection_name() {
        assert_eq!(collection_name("codecontext", "shop-api"), "codecontext_shop-api");
    }

    #[test]
    fn test_payload_from_code_object() {
        let object = CodeObject::new(
            "processOrder",
            "OrderService.processOrder",
            ObjectType::Method,
            "java",
            "src/OrderService.java",
            10,
            30,
            "public Order processOrder(Cart cart) { return new Order(cart); }",
        );
        let tokenizer = Tokenizer::new();
        let payload = PointPayload::from_code_object(&object, "shop", &[], &[], &tokenizer);
        assert_eq!(payload.kind, kinds::CODE);
        assert_eq!(payload.object_type, "method");
        assert!(payload.score_weight >= 0.1 && payload.score_weight <= 1.2);
        let point = IndexPoint::new(vec![0.0; 4], SparseVector::default(), payload);
        assert_eq!(point.id, point_id(&object.id));
    }

    #[test]
    fn test_filters() {
        let payload = PointPayload {
            language: "java".into(),
            object_type: "class".into(),
            file_path: "src/OrderService.java".into(),
            ..Default::default()
        };
        assert!(SearchFilters::default().accepts(&payload));
        assert!(SearchFilters {
            language: Some("Java".into()),
            ..Default::default()
        }
        .accepts(&payload));
        assert!(!SearchFilters {
            object_type: Some("method".into()),
            ..Default::default()
        }
        .accepts(&payload));
        assert!(SearchFilters {
            file_path: Some("OrderService".into()),
            ..Default::default()
        }
        .accepts(&payload));
    }

    #[test]
    fn test_document_title_truncation() {
        let node = DocumentNode::new(
            codecontext_core::DocumentNodeType::Paragraph,
            "word ".repeat(40),
            "doc.md",
            1,
            1,
        );
        let payload = PointPayload::from_document_node(&node, "p", "markdown", &[], &[], &Tokenizer::new());
        assert!(payload.name.len() <= 80);
    }
}
