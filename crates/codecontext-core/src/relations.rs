//! Relationship model and bidirectional graph.
//!
//! Every stored forward edge has a mirrored reverse edge; the graph is kept
//! as twin adjacency maps (`outgoing`, `incoming`) keyed by entity id so that
//! cross-object references stay ids, never pointers.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Directed relationship kind: 11 forward/reverse pairs, 22 types total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    Calls,
    CalledBy,
    References,
    ReferencedBy,
    Extends,
    ExtendedBy,
    Implements,
    ImplementedBy,
    Contains,
    ContainedBy,
    Imports,
    ImportedBy,
    DependsOn,
    DependedBy,
    Annotates,
    AnnotatedBy,
    Documents,
    DocumentedBy,
    Mentions,
    MentionedIn,
    ImplementsSpec,
    ImplementedIn,
}

impl RelationType {
    /// The paired reverse type. Involutive: `t.reverse().reverse() == t`.
    pub fn reverse(&self) -> RelationType {
        match self {
            RelationType::Calls => RelationType::CalledBy,
            RelationType::CalledBy => RelationType::Calls,
            RelationType::References => RelationType::ReferencedBy,
            RelationType::ReferencedBy => RelationType::References,
            RelationType::Extends => RelationType::ExtendedBy,
            RelationType::ExtendedBy => RelationType::Extends,
            RelationType::Implements => RelationType::ImplementedBy,
            RelationType::ImplementedBy => RelationType::Implements,
            RelationType::Contains => RelationType::ContainedBy,
            RelationType::ContainedBy => RelationType::Contains,
            RelationType::Imports => RelationType::ImportedBy,
            RelationType::ImportedBy => RelationType::Imports,
            RelationType::DependsOn => RelationType::DependedBy,
            RelationType::DependedBy => RelationType::DependsOn,
            RelationType::Annotates => RelationType::AnnotatedBy,
            RelationType::AnnotatedBy => RelationType::Annotates,
            RelationType::Documents => RelationType::DocumentedBy,
            RelationType::DocumentedBy => RelationType::Documents,
            RelationType::Mentions => RelationType::MentionedIn,
            RelationType::MentionedIn => RelationType::Mentions,
            RelationType::ImplementsSpec => RelationType::ImplementedIn,
            RelationType::ImplementedIn => RelationType::ImplementsSpec,
        }
    }

    /// True for the canonical direction of each pair (the one extractors emit).
    pub fn is_forward(&self) -> bool {
        matches!(
            self,
            RelationType::Calls
                | RelationType::References
                | RelationType::Extends
                | RelationType::Implements
                | RelationType::Contains
                | RelationType::Imports
                | RelationType::DependsOn
                | RelationType::Annotates
                | RelationType::Documents
                | RelationType::Mentions
                | RelationType::ImplementsSpec
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Calls => "CALLS",
            RelationType::CalledBy => "CALLED_BY",
            RelationType::References => "REFERENCES",
            RelationType::ReferencedBy => "REFERENCED_BY",
            RelationType::Extends => "EXTENDS",
            RelationType::ExtendedBy => "EXTENDED_BY",
            RelationType::Implements => "IMPLEMENTS",
            RelationType::ImplementedBy => "IMPLEMENTED_BY",
            RelationType::Contains => "CONTAINS",
            RelationType::ContainedBy => "CONTAINED_BY",
            RelationType::Imports => "IMPORTS",
            RelationType::ImportedBy => "IMPORTED_BY",
            RelationType::DependsOn => "DEPENDS_ON",
            RelationType::DependedBy => "DEPENDED_BY",
            RelationType::Annotates => "ANNOTATES",
            RelationType::AnnotatedBy => "ANNOTATED_BY",
            RelationType::Documents => "DOCUMENTS",
            RelationType::DocumentedBy => "DOCUMENTED_BY",
            RelationType::Mentions => "MENTIONS",
            RelationType::MentionedIn => "MENTIONED_IN",
            RelationType::ImplementsSpec => "IMPLEMENTS_SPEC",
            RelationType::ImplementedIn => "IMPLEMENTED_IN",
        }
    }

    /// All 22 types, forward pairs first within each pair.
    pub fn all() -> &'static [RelationType] {
        &[
            RelationType::Calls,
            RelationType::CalledBy,
            RelationType::References,
            RelationType::ReferencedBy,
            RelationType::Extends,
            RelationType::ExtendedBy,
            RelationType::Implements,
            RelationType::ImplementedBy,
            RelationType::Contains,
            RelationType::ContainedBy,
            RelationType::Imports,
            RelationType::ImportedBy,
            RelationType::DependsOn,
            RelationType::DependedBy,
            RelationType::Annotates,
            RelationType::AnnotatedBy,
            RelationType::Documents,
            RelationType::DocumentedBy,
            RelationType::Mentions,
            RelationType::MentionedIn,
            RelationType::ImplementsSpec,
            RelationType::ImplementedIn,
        ]
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Denormalized identity of one endpoint of a relationship.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub name: String,
    /// Entity kind string (object type or document node type).
    pub kind: String,
    pub file_path: String,
    pub line: u32,
}

impl Endpoint {
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        file_path: impl Into<String>,
        line: u32,
    ) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            file_path: file_path.into(),
            line,
        }
    }
}

/// A directed edge between two indexed entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub source_id: String,
    pub target_id: String,
    pub relation_type: RelationType,
    pub source: Endpoint,
    pub target: Endpoint,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Relationship {
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        relation_type: RelationType,
        source: Endpoint,
        target: Endpoint,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            relation_type,
            source,
            target,
            metadata: BTreeMap::new(),
        }
    }

    /// Record resolution confidence; informational only, never filtered on.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.metadata.insert(
            "confidence".to_string(),
            serde_json::json!(confidence),
        );
        self
    }

    /// The mirrored reverse edge.
    pub fn reversed(&self) -> Relationship {
        Relationship {
            source_id: self.target_id.clone(),
            target_id: self.source_id.clone(),
            relation_type: self.relation_type.reverse(),
            source: self.target.clone(),
            target: self.source.clone(),
            metadata: self.metadata.clone(),
        }
    }

    /// Dedup key within an adjacency bucket.
    fn key(&self) -> (String, String, RelationType) {
        (
            self.source_id.clone(),
            self.target_id.clone(),
            self.relation_type,
        )
    }
}

/// Bidirectional relationship graph as twin adjacency maps.
///
/// Inserting a forward edge also inserts its reverse, so the reverse-edge
/// law holds by construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelationshipGraph {
    outgoing: HashMap<String, Vec<Relationship>>,
    incoming: HashMap<String, Vec<Relationship>>,
}

impl RelationshipGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a graph from forward edges only (as persisted in `IndexState`).
    pub fn from_forward_edges(edges: impl IntoIterator<Item = Relationship>) -> Self {
        let mut graph = Self::new();
        for edge in edges {
            graph.add(edge);
        }
        graph
    }

    /// Insert `edge` and its reverse, skipping exact duplicates.
    pub fn add(&mut self, edge: Relationship) {
        let reverse = edge.reversed();
        Self::push_unique(self.outgoing.entry(edge.source_id.clone()).or_default(), edge.clone());
        Self::push_unique(self.incoming.entry(edge.target_id.clone()).or_default(), edge);
        Self::push_unique(
            self.outgoing.entry(reverse.source_id.clone()).or_default(),
            reverse.clone(),
        );
        Self::push_unique(self.incoming.entry(reverse.target_id.clone()).or_default(), reverse);
    }

    fn push_unique(bucket: &mut Vec<Relationship>, edge: Relationship) {
        if !bucket.iter().any(|e| e.key() == edge.key()) {
            bucket.push(edge);
        }
    }

    /// Outgoing edges of `id`.
    pub fn outgoing(&self, id: &str) -> &[Relationship] {
        self.outgoing.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Incoming edges of `id`.
    pub fn incoming(&self, id: &str) -> &[Relationship] {
        self.incoming.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Union of outgoing and incoming edges touching `id`, de-duplicated by
    /// `(source_id, target_id, relation_type)`.
    pub fn relationships(&self, id: &str) -> Vec<Relationship> {
        let mut seen = HashSet::new();
        let mut all = Vec::new();
        for edge in self.outgoing(id).iter().chain(self.incoming(id)) {
            if seen.insert(edge.key()) {
                all.push(edge.clone());
            }
        }
        all
    }

    /// Forward edges only, for compact persistence.
    pub fn forward_edges(&self) -> Vec<Relationship> {
        let mut seen = HashSet::new();
        let mut edges = Vec::new();
        for bucket in self.outgoing.values() {
            for edge in bucket {
                if edge.relation_type.is_forward() && seen.insert(edge.key()) {
                    edges.push(edge.clone());
                }
            }
        }
        edges.sort_by(|a, b| a.key().cmp(&b.key()));
        edges
    }

    /// Total number of stored directed edges (forward + reverse).
    pub fn edge_count(&self) -> usize {
        self.outgoing.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.outgoing.is_empty()
    }

    /// Drop every edge whose source or target lives in `file_path`.
    ///
    /// Used by incremental sync before re-extracting a changed file.
    pub fn remove_file(&mut self, file_path: &str) {
        let prune = |map: &mut HashMap<String, Vec<Relationship>>| {
            for bucket in map.values_mut() {
                bucket.retain(|e| e.source.file_path != file_path && e.target.file_path != file_path);
            }
            map.retain(|_, bucket| !bucket.is_empty());
        };
        prune(&mut self.outgoing);
        prune(&mut self.incoming);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(src: &str, dst: &str, t: RelationType) -> Relationship {
        Relationship::new(
            src,
            dst,
            t,
            Endpoint::new(src, "function", "a.py", 1),
            Endpoint::new(dst, "function", "b.py", 2),
        )
    }

    #[test]
    fn test_reverse_is_involutive() {
        for t in RelationType::all() {
            assert_eq!(t.reverse().reverse(), *t);
            assert_ne!(t.reverse(), *t);
        }
    }

    #[test]
    fn test_exactly_eleven_forward_pairs() {
        let forward = RelationType::all().iter().filter(|t| t.is_forward()).count();
        assert_eq!(forward, 11);
        assert_eq!(RelationType::all().len(), 22);
    }

    #[test]
    fn test_add_writes_reverse_edge() {
        let mut graph = RelationshipGraph::new();
        graph.add(edge("a", "b", RelationType::Calls));

        let from_b = graph.outgoing("b");
        assert_eq!(from_b.len(), 1);
        assert_eq!(from_b[0].relation_type, RelationType::CalledBy);
        assert_eq!(from_b[0].target_id, "a");
    }

    #[test]
    fn test_relationships_union_deduplicates() {
        let mut graph = RelationshipGraph::new();
        graph.add(edge("a", "b", RelationType::Calls));
        graph.add(edge("a", "b", RelationType::Calls)); // duplicate insert

        let rels = graph.relationships("a");
        // CALLS a->b plus CALLED_BY b->a, each stored once.
        assert_eq!(rels.len(), 2);
    }

    #[test]
    fn test_forward_edges_roundtrip() {
        let mut graph = RelationshipGraph::new();
        graph.add(edge("a", "b", RelationType::Calls));
        graph.add(edge("b", "c", RelationType::Extends));

        let rebuilt = RelationshipGraph::from_forward_edges(graph.forward_edges());
        assert_eq!(rebuilt.edge_count(), graph.edge_count());
        assert_eq!(rebuilt.relationships("b").len(), graph.relationships("b").len());
    }

    #[test]
    fn test_remove_file_prunes_both_directions() {
        let mut graph = RelationshipGraph::new();
        graph.add(edge("a", "b", RelationType::Calls));
        graph.remove_file("b.py");
        assert!(graph.relationships("a").is_empty());
        assert!(graph.relationships("b").is_empty());
    }
}
