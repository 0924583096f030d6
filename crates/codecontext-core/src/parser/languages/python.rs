//! Python extraction.
//!
//! Classes, functions/methods, module- and class-level assignments,
//! imports, decorators, base classes and call sites.

use tree_sitter::Node;

use crate::model::ObjectType;
use crate::parser::{FileExtraction, ReferenceKind};

const CALL_KINDS: &[&str] = &["call"];

pub(crate) fn extract(root: Node<'_>, ex: &mut FileExtraction<'_>) {
    walk(root, ex, false);
}

fn walk(node: Node<'_>, ex: &mut FileExtraction<'_>, in_class: bool) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "decorated_definition" => {
                if let Some(def) = child.child_by_field_name("definition") {
                    let decorators = decorator_names(child, ex);
                    handle_definition(def, ex, in_class, &decorators);
                }
            }
            "class_definition" | "function_definition" => {
                handle_definition(child, ex, in_class, &[]);
            }
            "import_statement" | "import_from_statement" => handle_import(child, ex),
            "expression_statement" => handle_assignment(child, ex, in_class),
            _ => {
                if child.child_count() > 0 {
                    walk(child, ex, in_class);
                }
            }
        }
    }
}

fn handle_definition(node: Node<'_>, ex: &mut FileExtraction<'_>, in_class: bool, decorators: &[String]) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = ex.text(name_node).to_string();
    let line = node.start_position().row as u32 + 1;

    match node.kind() {
        "class_definition" => {
            let docstring = body_docstring(node, ex);
            let id = ex.push_object(&name, ObjectType::Class, node, None, docstring);
            for decorator in decorators {
                ex.push_reference(&id, &name, "class", decorator, ReferenceKind::Annotate, line);
            }
            if let Some(bases) = node.child_by_field_name("superclasses") {
                let mut cursor = bases.walk();
                for base in bases.named_children(&mut cursor) {
                    if matches!(base.kind(), "identifier" | "attribute") {
                        let base_name = last_segment(ex.text(base));
                        ex.push_reference(&id, &name, "class", &base_name, ReferenceKind::Extend, line);
                    }
                }
            }
            if let Some(body) = node.child_by_field_name("body") {
                ex.enter_scope(&name, &id);
                walk(body, ex, true);
                ex.exit_scope();
            }
        }
        "function_definition" => {
            let object_type = if in_class { ObjectType::Method } else { ObjectType::Function };
            let signature = signature_of(node, ex);
            let docstring = body_docstring(node, ex);
            let kind_str = object_type.as_str().to_string();
            let id = ex.push_object(&name, object_type, node, Some(signature), docstring);
            for decorator in decorators {
                ex.push_reference(&id, &name, &kind_str, decorator, ReferenceKind::Annotate, line);
            }
            if let Some(body) = node.child_by_field_name("body") {
                ex.collect_calls(body, &id, &name, &kind_str, CALL_KINDS);
            }
        }
        _ => {}
    }
}

fn handle_import(node: Node<'_>, ex: &mut FileExtraction<'_>) {
    match node.kind() {
        "import_statement" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                match child.kind() {
                    "dotted_name" => ex.push_import(ex.text(child), node),
                    "aliased_import" => {
                        if let Some(name) = child.child_by_field_name("name") {
                            ex.push_import(ex.text(name), node);
                        }
                    }
                    _ => {}
                }
            }
        }
        "import_from_statement" => {
            // `from pkg import a, b` records each imported name.
            let module = node
                .child_by_field_name("module_name")
                .map(|m| ex.text(m).to_string())
                .unwrap_or_default();
            let mut cursor = node.walk();
            let mut found_name = false;
            for child in node.named_children(&mut cursor) {
                if child.kind() == "dotted_name" && ex.text(child) != module {
                    ex.push_import(ex.text(child), node);
                    found_name = true;
                } else if child.kind() == "aliased_import" {
                    if let Some(name) = child.child_by_field_name("name") {
                        ex.push_import(ex.text(name), node);
                        found_name = true;
                    }
                }
            }
            if !found_name && !module.is_empty() {
                ex.push_import(&module, node);
            }
        }
        _ => {}
    }
}

/// Module- or class-level `NAME = value` assignments.
fn handle_assignment(stmt: Node<'_>, ex: &mut FileExtraction<'_>, in_class: bool) {
    let Some(expr) = stmt.child(0) else { return };
    if expr.kind() != "assignment" {
        return;
    }
    let Some(left) = expr.child_by_field_name("left") else {
        return;
    };
    if left.kind() != "identifier" {
        return;
    }
    let name = ex.text(left).to_string();
    let object_type = if name.chars().all(|c| c.is_uppercase() || c == '_' || c.is_ascii_digit()) {
        ObjectType::Constant
    } else if in_class {
        ObjectType::Field
    } else {
        ObjectType::Variable
    };
    ex.push_object(&name, object_type, stmt, None, None);
}

/// First string expression of a body is the docstring.
fn body_docstring(node: Node<'_>, ex: &FileExtraction<'_>) -> Option<String> {
    let body = node.child_by_field_name("body")?;
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let inner = first.named_child(0)?;
    if inner.kind() != "string" {
        return None;
    }
    let raw = ex.text(inner);
    let trimmed = raw
        .trim_start_matches(['r', 'b', 'f', 'u', 'R', 'B', 'F', 'U'])
        .trim_matches(|c| c == '"' || c == '\'')
        .trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn signature_of(node: Node<'_>, ex: &FileExtraction<'_>) -> String {
    let params = node
        .child_by_field_name("parameters")
        .map(|p| ex.text(p))
        .unwrap_or("()");
    match node.child_by_field_name("return_type") {
        Some(ret) => format!("{} -> {}", params, ex.text(ret)),
        None => params.to_string(),
    }
}

fn decorator_names(decorated: Node<'_>, ex: &FileExtraction<'_>) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = decorated.walk();
    for child in decorated.children(&mut cursor) {
        if child.kind() == "decorator" {
            let text = ex.text(child).trim_start_matches('@');
            let head = text.split('(').next().unwrap_or(text);
            names.push(last_segment(head));
        }
    }
    names
}

fn last_segment(dotted: &str) -> String {
    dotted.rsplit('.').next().unwrap_or(dotted).trim().to_string()
}
