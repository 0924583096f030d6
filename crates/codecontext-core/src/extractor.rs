//! Cross-file relationship extraction.
//!
//! Runs after all code objects in a batch are known. Resolves the symbol
//! references collected by the parsers against a project-wide name index:
//! exact qualified-name match first, then unique simple-name match, else the
//! reference is dropped. Resolution never fails a run.
//!
//! Every resolved forward edge is inserted into a [`RelationshipGraph`],
//! which mirrors the reverse edge automatically.

use std::collections::HashMap;

use tracing::debug;

use crate::model::{CodeObject, DocumentNode, DocumentNodeType, ObjectType};
use crate::parser::{ReferenceKind, SymbolReference};
use crate::relations::{Endpoint, RelationType, Relationship, RelationshipGraph};

/// Name index over a batch of code objects.
pub struct ObjectIndex<'a> {
    by_qualified: HashMap<&'a str, &'a CodeObject>,
    by_simple: HashMap<&'a str, Vec<&'a CodeObject>>,
}

impl<'a> ObjectIndex<'a> {
    pub fn build(objects: &'a [CodeObject]) -> Self {
        let mut by_qualified = HashMap::new();
        let mut by_simple: HashMap<&str, Vec<&CodeObject>> = HashMap::new();
        for object in objects {
            by_qualified.insert(object.qualified_name.as_str(), object);
            by_simple.entry(object.name.as_str()).or_default().push(object);
        }
        Self { by_qualified, by_simple }
    }

    /// Exact qualified-name match, then unique simple-name match among
    /// objects accepted by `filter`. Returns the target and a confidence.
    fn resolve(
        &self,
        name: &str,
        filter: impl Fn(&CodeObject) -> bool,
    ) -> Option<(&'a CodeObject, f64)> {
        if let Some(&object) = self.by_qualified.get(name) {
            if filter(object) {
                return Some((object, 1.0));
            }
        }
        let simple = name.rsplit('.').next().unwrap_or(name);
        let candidates: Vec<&'a CodeObject> = self
            .by_simple
            .get(simple)?
            .iter()
            .copied()
            .filter(|o| filter(o))
            .collect();
        if candidates.len() == 1 {
            Some((candidates[0], 0.8))
        } else {
            None
        }
    }
}

/// Resolve `references` against `objects`, fold in the parsers' intra-file
/// edges and link documents to the code they mention.
pub fn extract_relationships(
    objects: &[CodeObject],
    documents: &[DocumentNode],
    intra_file: Vec<Relationship>,
    references: &[SymbolReference],
) -> RelationshipGraph {
    let index = ObjectIndex::build(objects);
    let mut graph = RelationshipGraph::new();

    for edge in intra_file {
        graph.add(edge);
    }

    let mut dropped = 0usize;
    for reference in references {
        match resolve_reference(&index, reference) {
            Some(edge) => graph.add(edge),
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        debug!(dropped, "unresolved symbol references dropped");
    }

    link_documents(&index, documents, &mut graph);
    graph
}

fn resolve_reference(index: &ObjectIndex<'_>, reference: &SymbolReference) -> Option<Relationship> {
    let language = reference.language.as_str();
    let (target, confidence, relation_type) = match reference.kind {
        ReferenceKind::Call => {
            let (target, confidence) = index.resolve(&reference.name, |o| {
                matches!(o.object_type, ObjectType::Function | ObjectType::Method)
            })?;
            (target, confidence, RelationType::Calls)
        }
        ReferenceKind::Extend => {
            // Inheritance stays within one language; a base resolving to an
            // interface is an implementation, not an extension.
            let (target, confidence) = index.resolve(&reference.name, |o| {
                o.language == language
                    && matches!(
                        o.object_type,
                        ObjectType::Class | ObjectType::Interface | ObjectType::Enum
                    )
            })?;
            let relation = if target.object_type == ObjectType::Interface {
                RelationType::Implements
            } else {
                RelationType::Extends
            };
            (target, confidence, relation)
        }
        ReferenceKind::Implement => {
            let (target, confidence) = index.resolve(&reference.name, |o| {
                o.language == language && o.object_type == ObjectType::Interface
            })?;
            (target, confidence, RelationType::Implements)
        }
        ReferenceKind::Import => {
            let (target, confidence) = index.resolve(&reference.name, |o| {
                o.object_type != ObjectType::Import && o.file_path != reference.source.file_path
            })?;
            (target, confidence, RelationType::Imports)
        }
        ReferenceKind::Annotate => {
            let (target, confidence) = index.resolve(&reference.name, |o| {
                matches!(
                    o.object_type,
                    ObjectType::Class | ObjectType::Interface | ObjectType::Function | ObjectType::Method
                )
            })?;
            // Forward direction: the annotation type annotates the object.
            return Some(
                Relationship::new(
                    target.id.clone(),
                    reference.source_id.clone(),
                    RelationType::Annotates,
                    endpoint_of(target),
                    reference.source.clone(),
                )
                .with_confidence(confidence),
            );
        }
        ReferenceKind::Use => {
            let (target, confidence) = index.resolve(&reference.name, |_| true)?;
            (target, confidence.min(0.6), RelationType::References)
        }
    };

    if target.id == reference.source_id {
        return None;
    }
    Some(
        Relationship::new(
            reference.source_id.clone(),
            target.id.clone(),
            relation_type,
            reference.source.clone(),
            endpoint_of(target),
        )
        .with_confidence(confidence),
    )
}

/// MENTIONS edges from chunks to the objects their prose names; heading
/// chunks use DOCUMENTS since they title the section describing the code.
fn link_documents(
    index: &ObjectIndex<'_>,
    documents: &[DocumentNode],
    graph: &mut RelationshipGraph,
) {
    for node in documents {
        let Some(refs) = node
            .metadata
            .get("code_references")
            .and_then(|v| v.as_array())
        else {
            continue;
        };
        let relation_type = if node.node_type == DocumentNodeType::Heading {
            RelationType::Documents
        } else {
            RelationType::Mentions
        };
        for name in refs.iter().filter_map(|v| v.as_str()) {
            if let Some((target, confidence)) = index.resolve(name, |_| true) {
                let source = Endpoint::new(
                    node.node_type.as_str(),
                    node.node_type.as_str(),
                    node.file_path.clone(),
                    node.start_line,
                );
                graph.add(
                    Relationship::new(
                        node.id.clone(),
                        target.id.clone(),
                        relation_type,
                        source,
                        endpoint_of(target),
                    )
                    .with_confidence(confidence),
                );
            }
        }
    }
}

fn endpoint_of(object: &CodeObject) -> Endpoint {
    Endpoint::new(
        object.name.clone(),
        object.object_type.as_str(),
        object.file_path.clone(),
        object.start_line,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CodeObject;

    fn object(name: &str, qualified: &str, object_type: ObjectType, language: &str, file: &str) -> CodeObject {
        CodeObject::new(name, qualified, object_type, language, file, 1, 10, format!("{} body", name))
    }

    fn call_ref(source: &CodeObject, name: &str) -> SymbolReference {
        SymbolReference {
            source_id: source.id.clone(),
            source: Endpoint::new(
                source.name.clone(),
                source.object_type.as_str(),
                source.file_path.clone(),
                2,
            ),
            name: name.to_string(),
            kind: ReferenceKind::Call,
            line: 2,
            language: source.language.clone(),
        }
    }

    #[test]
    fn test_unique_simple_name_call_resolution() {
        let caller = object("processOrder", "OrderService.processOrder", ObjectType::Method, "java", "OrderService.java");
        let callee = object("chargeCard", "PaymentGateway.chargeCard", ObjectType::Method, "java", "PaymentGateway.java");
        let objects = vec![caller.clone(), callee.clone()];
        let refs = vec![call_ref(&caller, "chargeCard")];

        let graph = extract_relationships(&objects, &[], Vec::new(), &refs);
        let out = graph.outgoing(&caller.id);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].relation_type, RelationType::Calls);
        assert_eq!(out[0].target_id, callee.id);
        // Reverse edge present.
        assert_eq!(graph.outgoing(&callee.id)[0].relation_type, RelationType::CalledBy);
    }

    #[test]
    fn test_ambiguous_simple_name_dropped() {
        let caller = object("main", "main", ObjectType::Function, "python", "main.py");
        let a = object("helper", "a.helper", ObjectType::Function, "python", "a.py");
        let b = object("helper", "b.helper", ObjectType::Function, "python", "b.py");
        let objects = vec![caller.clone(), a, b];
        let refs = vec![call_ref(&caller, "helper")];

        let graph = extract_relationships(&objects, &[], Vec::new(), &refs);
        assert!(graph.outgoing(&caller.id).is_empty());
    }

    #[test]
    fn test_qualified_name_beats_ambiguity() {
        let caller = object("main", "main", ObjectType::Function, "python", "main.py");
        let a = object("helper", "a.helper", ObjectType::Function, "python", "a.py");
        let b = object("helper", "b.helper", ObjectType::Function, "python", "b.py");
        let objects = vec![caller.clone(), a.clone(), b];
        let refs = vec![SymbolReference {
            name: "a.helper".to_string(),
            ..call_ref(&caller, "a.helper")
        }];

        let graph = extract_relationships(&objects, &[], Vec::new(), &refs);
        let out = graph.outgoing(&caller.id);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].target_id, a.id);
        assert_eq!(out[0].metadata.get("confidence").and_then(|v| v.as_f64()), Some(1.0));
    }

    #[test]
    fn test_extend_to_interface_becomes_implements() {
        let class = object("TierDiscount", "TierDiscount", ObjectType::Class, "typescript", "tier.ts");
        let iface = object("PricingRule", "PricingRule", ObjectType::Interface, "typescript", "pricing.ts");
        let objects = vec![class.clone(), iface.clone()];
        let refs = vec![SymbolReference {
            kind: ReferenceKind::Extend,
            name: "PricingRule".to_string(),
            ..call_ref(&class, "PricingRule")
        }];

        let graph = extract_relationships(&objects, &[], Vec::new(), &refs);
        assert_eq!(graph.outgoing(&class.id)[0].relation_type, RelationType::Implements);
    }

    #[test]
    fn test_cross_language_inheritance_dropped() {
        let class = object("StripeGateway", "StripeGateway", ObjectType::Class, "python", "stripe.py");
        let base = object("PaymentGateway", "PaymentGateway", ObjectType::Class, "java", "PaymentGateway.java");
        let objects = vec![class.clone(), base];
        let refs = vec![SymbolReference {
            kind: ReferenceKind::Extend,
            name: "PaymentGateway".to_string(),
            ..call_ref(&class, "PaymentGateway")
        }];

        let graph = extract_relationships(&objects, &[], Vec::new(), &refs);
        assert!(graph.outgoing(&class.id).is_empty());
    }

    #[test]
    fn test_document_mentions() {
        let service = object("OrderService", "OrderService", ObjectType::Class, "java", "OrderService.java");
        let mut doc = DocumentNode::new(
            DocumentNodeType::Paragraph,
            "OrderService validates the cart.",
            "docs/order-flow.md",
            3,
            4,
        );
        doc.metadata.insert(
            "code_references".into(),
            serde_json::json!(["OrderService"]),
        );

        let graph = extract_relationships(&[service.clone()], &[doc.clone()], Vec::new(), &[]);
        let out = graph.outgoing(&doc.id);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].relation_type, RelationType::Mentions);
        // Reverse edge discoverable from the code side.
        assert!(graph
            .relationships(&service.id)
            .iter()
            .any(|r| r.relation_type == RelationType::MentionedIn));
    }
}
