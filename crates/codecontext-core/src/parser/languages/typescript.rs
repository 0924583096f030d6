//! TypeScript / TSX extraction.
//!
//! Everything the JavaScript walker handles plus interfaces, enums, type
//! aliases, `implements` clauses and typed signatures.

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
            "class_declaration" | "abstract_class_declaration" => handle_class(child, ex),
            "interface_declaration" => handle_interface(child, ex),
            "enum_declaration" => handle_enum(child, ex),
            "type_alias_declaration" => handle_type_alias(child, ex),
            "function_declaration" | "generator_function_declaration" => {
                handle_function(child, ex, in_class)
            }
            "method_definition" | "method_signature" => handle_function(child, ex, true),
            "public_field_definition" | "property_signature" => handle_field(child, ex),
            "lexical_declaration" | "variable_declaration" => handle_variable(child, ex),
            "import_statement" => handle_import(child, ex),
            "export_statement" => walk(child, ex, in_class),
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

    // `extends Base implements A, B` live under class_heritage.
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "class_heritage" {
            continue;
        }
        let mut heritage_cursor = child.walk();
        for clause in child.children(&mut heritage_cursor) {
            let kind = match clause.kind() {
                "extends_clause" => ReferenceKind::Extend,
                "implements_clause" => ReferenceKind::Implement,
                _ => continue,
            };
            let mut names_cursor = clause.walk();
            for base in clause.named_children(&mut names_cursor) {
                if matches!(base.kind(), "identifier" | "type_identifier" | "member_expression") {
                    let base_name = ex.text(base);
                    let base_name = base_name.rsplit('.').next().unwrap_or(base_name);
                    ex.push_reference(&id, &name, "class", base_name, kind, line);
                }
            }
        }
    }

    if let Some(body) = node.child_by_field_name("body") {
        ex.enter_scope(&name, &id);
        walk(body, ex, true);
        ex.exit_scope();
    }
}

fn handle_interface(node: Node<'_>, ex: &mut FileExtraction<'_>) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = ex.text(name_node).to_string();
    let line = node.start_position().row as u32 + 1;
    let doc = super::doc_comment_before(node, ex.source());
    let id = ex.push_object(&name, ObjectType::Interface, node, None, doc);

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "extends_type_clause" || child.kind() == "extends_clause" {
            let mut names_cursor = child.walk();
            for base in child.named_children(&mut names_cursor) {
                if matches!(base.kind(), "type_identifier" | "identifier") {
                    ex.push_reference(
                        &id,
                        &name,
                        "interface",
                        ex.text(base),
                        ReferenceKind::Extend,
                        line,
                    );
                }
            }
        }
    }

    if let Some(body) = node.child_by_field_name("body") {
        ex.enter_scope(&name, &id);
        walk(body, ex, true);
        ex.exit_scope();
    }
}

fn handle_enum(node: Node<'_>, ex: &mut FileExtraction<'_>) {
    if let Some(name_node) = node.child_by_field_name("name") {
        let name = ex.text(name_node).to_string();
        let doc = super::doc_comment_before(node, ex.source());
        ex.push_object(&name, ObjectType::Enum, node, None, doc);
    }
}

fn handle_type_alias(node: Node<'_>, ex: &mut FileExtraction<'_>) {
    if let Some(name_node) = node.child_by_field_name("name") {
        let name = ex.text(name_node).to_string();
        ex.push_object(&name, ObjectType::Type, node, None, None);
    }
}

fn handle_function(node: Node<'_>, ex: &mut FileExtraction<'_>, in_class: bool) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = ex.text(name_node).to_string();
    let object_type = if in_class { ObjectType::Method } else { ObjectType::Function };
    let signature = typed_signature(node, ex);
    let doc = super::doc_comment_before(node, ex.source());
    let kind_str = object_type.as_str().to_string();
    let id = ex.push_object(&name, object_type, node, signature, doc);
    if let Some(body) = node.child_by_field_name("body") {
        ex.collect_calls(body, &id, &name, &kind_str, CALL_KINDS);
    }
}

fn handle_field(node: Node<'_>, ex: &mut FileExtraction<'_>) {
    if let Some(name_node) = node
        .child_by_field_name("name")
        .or_else(|| node.child_by_field_name("property"))
    {
        let name = ex.text(name_node).to_string();
        ex.push_object(&name, ObjectType::Property, node, None, None);
    }
}

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
            let signature = typed_signature(value, ex);
            let id = ex.push_object(&name, ObjectType::Function, node, signature, None);
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

/// Parameters plus declared return type, when present.
fn typed_signature(node: Node<'_>, ex: &FileExtraction<'_>) -> Option<String> {
    let params = node.child_by_field_name("parameters").map(|p| ex.text(p))?;
    match node.child_by_field_name("return_type") {
        Some(ret) => Some(format!("{}{}", params, ex.text(ret))),
        None => Some(params.to_string()),
    }
}
