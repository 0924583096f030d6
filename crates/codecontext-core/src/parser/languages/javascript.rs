//! JavaScript extraction.
//!
//! Classes, functions (declarations and arrow/function-valued bindings),
//! methods, fields, imports, `extends` clauses and call sites.

use tree_sitter::Node;

use crate::model::ObjectType;
use crate::parser::{FileExtraction, ReferenceKind};

const CALL_KINDS: &[&str] = &["call_expression", "new_expression"];

pub(crate) fn extract(root: Node<'_>, ex: &mut FileExtraction<'_>) {
    walk(root, ex, false);
}

fn walk(node: Node<'_>, ex: &mut FileExtraction<'_>, in_class: bool) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "class_declaration" => handle_class(child, ex),
            "function_declaration" | "generator_function_declaration" => {
                handle_function(child, ex, in_class)
            }
            "method_definition" => handle_function(child, ex, true),
            "field_definition" | "public_field_definition" => handle_field(child, ex),
            "lexical_declaration" | "variable_declaration" => handle_variable(child, ex),
            "import_statement" => handle_import(child, ex),
            "export_statement" => {
                // Unwrap `export default class ...` / `export function ...`.
                walk(child, ex, in_class);
            }
            _ => {
                if child.child_count() > 0 {
                    walk(child, ex, in_class);
                }
            }
        }
    }
}

fn handle_class(node: Node<'_>, ex: &mut FileExtraction<'_>) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = ex.text(name_node).to_string();
    let line = node.start_position().row as u32 + 1;
    let doc = super::doc_comment_before(node, ex.source());
    let id = ex.push_object(&name, ObjectType::Class, node, None, doc);

    // `class X extends Y`: heritage holds the base expression.
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "class_heritage" {
            let text = ex.text(child);
            let base = text.trim_start_matches("extends").trim();
            let base = base.split(['(', '.', ' ']).next().unwrap_or(base);
            if !base.is_empty() {
                ex.push_reference(&id, &name, "class", base, ReferenceKind::Extend, line);
            }
        }
    }

    if let Some(body) = node.child_by_field_name("body") {
        ex.enter_scope(&name, &id);
        walk(body, ex, true);
        ex.exit_scope();
    }
}

fn handle_function(node: Node<'_>, ex: &mut FileExtraction<'_>, in_class: bool) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = ex.text(name_node).to_string();
    let object_type = if in_class { ObjectType::Method } else { ObjectType::Function };
    let signature = node
        .child_by_field_name("parameters")
        .map(|p| ex.text(p).to_string());
    let doc = super::doc_comment_before(node, ex.source());
    let kind_str = object_type.as_str().to_string();
    let id = ex.push_object(&name, object_type, node, signature, doc);
    if let Some(body) = node.child_by_field_name("body") {
        ex.collect_calls(body, &id, &name, &kind_str, CALL_KINDS);
    }
}

fn handle_field(node: Node<'_>, ex: &mut FileExtraction<'_>) {
    if let Some(name_node) = node.child_by_field_name("property").or_else(|| node.child_by_field_name("name")) {
        let name = ex.text(name_node).to_string();
        ex.push_object(&name, ObjectType::Field, node, None, None);
    }
}

/// `const f = () => {}` and `const NAME = ...` bindings.
fn handle_variable(node: Node<'_>, ex: &mut FileExtraction<'_>) {
    let mut cursor = node.walk();
    for declarator in node.named_children(&mut cursor) {
        if declarator.kind() != "variable_declarator" {
            continue;
        }
        let Some(name_node) = declarator.child_by_field_name("name") else {
            continue;
        };
        if name_node.kind() != "identifier" {
            continue;
        }
        let name = ex.text(name_node).to_string();
        let value = declarator.child_by_field_name("value");
        let is_function = value
            .map(|v| matches!(v.kind(), "arrow_function" | "function_expression" | "function"))
            .unwrap_or(false);

        if is_function {
            let value = value.unwrap_or(declarator);
            let signature = value
                .child_by_field_name("parameters")
                .map(|p| ex.text(p).to_string());
            let doc = super::doc_comment_before(node, ex.source());
            let id = ex.push_object(&name, ObjectType::Function, node, signature, doc);
            if let Some(body) = value.child_by_field_name("body") {
                ex.collect_calls(body, &id, &name, "function", CALL_KINDS);
            }
        } else {
            let object_type = if name.chars().all(|c| c.is_uppercase() || c == '_' || c.is_ascii_digit()) {
                ObjectType::Constant
            } else {
                ObjectType::Variable
            };
            ex.push_object(&name, object_type, node, None, None);
        }
    }
}

fn handle_import(node: Node<'_>, ex: &mut FileExtraction<'_>) {
    if let Some(source) = node.child_by_field_name("source") {
        let path = ex.text(source).trim_matches(|c| c == '"' || c == '\'' || c == '`');
        if !path.is_empty() {
            ex.push_import(path, node);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::ObjectType;
    use crate::parser::{Language, ReferenceKind, SourceParser};

    fn parse(source: &str) -> crate::parser::ParsedFile {
        SourceParser::parse(Language::JavaScript, "calculateShipping.js", source).expect("parse")
    }

    #[test]
    fn test_function_declaration() {
        let parsed = parse(
            r#"
/**
 * Computes shipping cost from weight and zone.
 */
function calculateShipping(weight, zone) {
    return baseRate(zone) * weight;
}
"#,
        );
        let func = parsed.objects.iter().find(|o| o.name == "calculateShipping").unwrap();
        assert_eq!(func.object_type, ObjectType::Function);
        assert!(func.docstring.contains("shipping cost"));
        assert_eq!(func.signature, "(weight, zone)");
        assert!(parsed
            .references
            .iter()
            .any(|r| r.kind == ReferenceKind::Call && r.name == "baseRate"));
    }

    #[test]
    fn test_arrow_function_binding() {
        let parsed = parse("const applyDiscount = (total, tier) => total * tier.rate;\n");
        let func = parsed.objects.iter().find(|o| o.name == "applyDiscount").unwrap();
        assert_eq!(func.object_type, ObjectType::Function);
    }

    #[test]
    fn test_class_extends_and_methods() {
        let parsed = parse(
            r#"
class ExpressShipping extends ShippingStrategy {
    estimate(order) {
        return this.base(order) * 2;
    }
}
"#,
        );
        let class = parsed.objects.iter().find(|o| o.name == "ExpressShipping").unwrap();
        assert_eq!(class.object_type, ObjectType::Class);
        let method = parsed.objects.iter().find(|o| o.name == "estimate").unwrap();
        assert_eq!(method.qualified_name, "ExpressShipping.estimate");
        assert!(parsed
            .references
            .iter()
            .any(|r| r.kind == ReferenceKind::Extend && r.name == "ShippingStrategy"));
    }

    #[test]
    fn test_import_and_constant() {
        let parsed = parse("import { rates } from './rates.js';\nconst FREE_LIMIT = 50;\n");
        assert!(parsed
            .objects
            .iter()
            .any(|o| o.object_type == ObjectType::Import));
        let constant = parsed.objects.iter().find(|o| o.name == "FREE_LIMIT").unwrap();
        assert_eq!(constant.object_type, ObjectType::Constant);
    }
}
