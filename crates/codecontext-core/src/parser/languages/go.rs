//! Go extraction.
//!
//! Structs, interfaces, functions, methods (qualified by receiver type),
//! consts, vars, imports and call sites.

use tree_sitter::Node;

use crate::model::ObjectType;
use crate::parser::{FileExtraction, ReferenceKind};

const CALL_KINDS: &[&str] = &["call_expression"];

pub(crate) fn extract(root: Node<'_>, ex: &mut FileExtraction<'_>) {
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        match child.kind() {
            "type_declaration" => handle_type_declaration(child, ex),
            "function_declaration" => handle_function(child, ex),
            "method_declaration" => handle_method(child, ex),
            "const_declaration" => handle_value_declaration(child, ex, ObjectType::Constant),
            "var_declaration" => handle_value_declaration(child, ex, ObjectType::Variable),
            "import_declaration" => handle_import(child, ex),
            _ => {}
        }
    }
}

fn handle_type_declaration(node: Node<'_>, ex: &mut FileExtraction<'_>) {
    let mut cursor = node.walk();
    for spec in node.named_children(&mut cursor) {
        if spec.kind() != "type_spec" {
            continue;
        }
        let Some(name_node) = spec.child_by_field_name("name") else {
            continue;
        };
        let name = ex.text(name_node).to_string();
        let object_type = match spec.child_by_field_name("type").map(|t| t.kind()) {
            Some("interface_type") => ObjectType::Interface,
            Some("struct_type") => ObjectType::Class,
            _ => ObjectType::Type,
        };
        let doc = super::doc_comment_before(node, ex.source());
        let id = ex.push_object(&name, object_type, spec, None, doc);

        // Embedded struct fields behave as extension.
        if let Some(struct_type) = spec.child_by_field_name("type").filter(|t| t.kind() == "struct_type") {
            for embedded in embedded_types(struct_type, ex) {
                ex.push_reference(
                    &id,
                    &name,
                    object_type.as_str(),
                    &embedded,
                    ReferenceKind::Extend,
                    spec.start_position().row as u32 + 1,
                );
            }
        }
    }
}

fn handle_function(node: Node<'_>, ex: &mut FileExtraction<'_>) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = ex.text(name_node).to_string();
    let signature = signature_of(node, ex);
    let doc = super::doc_comment_before(node, ex.source());
    let id = ex.push_object(&name, ObjectType::Function, node, Some(signature), doc);
    if let Some(body) = node.child_by_field_name("body") {
        ex.collect_calls(body, &id, &name, "function", CALL_KINDS);
    }
}

fn handle_method(node: Node<'_>, ex: &mut FileExtraction<'_>) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = ex.text(name_node).to_string();
    let receiver = node
        .child_by_field_name("receiver")
        .map(|r| receiver_type(ex.text(r)))
        .unwrap_or_default();
    let signature = signature_of(node, ex);
    let doc = super::doc_comment_before(node, ex.source());

    if receiver.is_empty() {
        let id = ex.push_object(&name, ObjectType::Method, node, Some(signature), doc);
        if let Some(body) = node.child_by_field_name("body") {
            ex.collect_calls(body, &id, &name, "method", CALL_KINDS);
        }
        return;
    }

    // Receiver qualifies the name but carries no object of its own here.
    ex.enter_scope(&receiver, "");
    let id = ex.push_object(&name, ObjectType::Method, node, Some(signature), doc);
    ex.exit_scope();
    if let Some(body) = node.child_by_field_name("body") {
        ex.collect_calls(body, &id, &name, "method", CALL_KINDS);
    }
}

fn handle_value_declaration(node: Node<'_>, ex: &mut FileExtraction<'_>, object_type: ObjectType) {
    let mut cursor = node.walk();
    for spec in node.named_children(&mut cursor) {
        if !matches!(spec.kind(), "const_spec" | "var_spec") {
            continue;
        }
        let Some(name_node) = spec.child_by_field_name("name") else {
            continue;
        };
        let name = ex.text(name_node).to_string();
        ex.push_object(&name, object_type, spec, None, None);
    }
}

fn handle_import(node: Node<'_>, ex: &mut FileExtraction<'_>) {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current.kind() == "import_spec" {
            if let Some(path) = current.child_by_field_name("path") {
                let cleaned = ex.text(path).trim_matches('"');
                if !cleaned.is_empty() {
                    ex.push_import(cleaned, current);
                }
            }
            continue;
        }
        let mut cursor = current.walk();
        for child in current.children(&mut cursor) {
            stack.push(child);
        }
    }
}

/// Embedded (anonymous) field type names inside a struct body.
fn embedded_types(struct_type: Node<'_>, ex: &FileExtraction<'_>) -> Vec<String> {
    let mut names = Vec::new();
    let mut stack = vec![struct_type];
    while let Some(current) = stack.pop() {
        if current.kind() == "field_declaration" && current.child_by_field_name("name").is_none() {
            if let Some(type_node) = current.child_by_field_name("type") {
                let raw = ex.text(type_node);
                let name = raw.trim_start_matches('*');
                let name = name.rsplit('.').next().unwrap_or(name);
                if !name.is_empty() {
                    names.push(name.to_string());
                }
            }
            continue;
        }
        let mut cursor = current.walk();
        for child in current.children(&mut cursor) {
            stack.push(child);
        }
    }
    names
}

/// `(w *Warehouse)` → `Warehouse`.
fn receiver_type(raw: &str) -> String {
    raw.trim_matches(['(', ')'])
        .split_whitespace()
        .last()
        .unwrap_or("")
        .trim_start_matches('*')
        .to_string()
}

fn signature_of(node: Node<'_>, ex: &FileExtraction<'_>) -> String {
    let params = node
        .child_by_field_name("parameters")
        .map(|p| ex.text(p))
        .unwrap_or("()");
    match node.child_by_field_name("result") {
        Some(result) => format!("{} {}", params, ex.text(result)),
        None => params.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use crate::model::ObjectType;
    use crate::parser::{Language, ReferenceKind, SourceParser};

    fn parse(source: &str) -> crate::parser::ParsedFile {
        SourceParser::parse(Language::Go, "inventory.go", source).expect("parse")
    }

    #[test]
    fn test_struct_and_method() {
        let parsed = parse(
            r#"
package inventory

// Warehouse tracks stock levels per SKU.
type Warehouse struct {
    stock map[string]int
}

func (w *Warehouse) Reserve(sku string, qty int) error {
    return w.decrement(sku, qty)
}
"#,
        );
        let warehouse = parsed.objects.iter().find(|o| o.name == "Warehouse").unwrap();
        assert_eq!(warehouse.object_type, ObjectType::Class);
        assert!(warehouse.docstring.contains("stock levels"));

        let reserve = parsed.objects.iter().find(|o| o.name == "Reserve").unwrap();
        assert_eq!(reserve.object_type, ObjectType::Method);
        assert_eq!(reserve.qualified_name, "Warehouse.Reserve");
        assert!(parsed
            .references
            .iter()
            .any(|r| r.kind == ReferenceKind::Call && r.name == "decrement"));
    }

    #[test]
    fn test_interface_and_imports() {
        let parsed = parse(
            "package shipping\n\nimport (\n\t\"fmt\"\n\t\"net/http\"\n)\n\ntype RateSource interface {\n\tRate(zone string) int\n}\n",
        );
        assert!(parsed
            .objects
            .iter()
            .any(|o| o.name == "RateSource" && o.object_type == ObjectType::Interface));
        let imports: Vec<_> = parsed
            .objects
            .iter()
            .filter(|o| o.object_type == ObjectType::Import)
            .map(|o| o.name.as_str())
            .collect();
        assert!(imports.contains(&"fmt"));
        assert!(imports.contains(&"http"));
    }

    #[test]
    fn test_consts() {
        let parsed = parse("package x\n\nconst MaxRetries = 3\n");
        assert!(parsed
            .objects
            .iter()
            .any(|o| o.name == "MaxRetries" && o.object_type == ObjectType::Constant));
    }
}
