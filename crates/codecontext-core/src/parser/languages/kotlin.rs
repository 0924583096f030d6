//! Kotlin extraction.
//!
//! Classes (including enum classes and interfaces, which the grammar folds
//! into `class_declaration`), objects, functions, properties, imports,
//! supertype lists and call sites.

use tree_sitter::Node;

use crate::model::ObjectType;
use crate::parser::{FileExtraction, ReferenceKind};

const CALL_KINDS: &[&str] = &["call_expression"];

pub(crate) fn extract(root: Node<'_>, ex: &mut FileExtraction<'_>) {
    walk(root, ex, false);
}

fn walk(node: Node<'_>, ex: &mut FileExtraction<'_>, in_type: bool) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "class_declaration" => handle_class(child, ex),
            "object_declaration" => handle_object(child, ex),
            "function_declaration" => handle_function(child, ex, in_type),
            "property_declaration" => handle_property(child, ex, in_type),
            "import_header" => handle_import(child, ex),
            _ => {
                if child.child_count() > 0 {
                    walk(child, ex, in_type);
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

    // Interfaces and enum classes share the class_declaration kind; the
    // distinguishing keyword appears as a token child.
    let object_type = classify_declaration(node);
    let kind_str = object_type.as_str().to_string();
    let doc = super::doc_comment_before(node, ex.source());
    let id = ex.push_object(&name, object_type, node, None, doc);

    for supertype in supertype_names(node, ex) {
        ex.push_reference(&id, &name, &kind_str, &supertype, ReferenceKind::Extend, line);
    }

    if let Some(body) = node.child_by_field_name("body") {
        ex.enter_scope(&name, &id);
        walk(body, ex, true);
        ex.exit_scope();
    }
}

fn handle_object(node: Node<'_>, ex: &mut FileExtraction<'_>) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = ex.text(name_node).to_string();
    let doc = super::doc_comment_before(node, ex.source());
    let id = ex.push_object(&name, ObjectType::Class, node, None, doc);
    if let Some(body) = node.child_by_field_name("body") {
        ex.enter_scope(&name, &id);
        walk(body, ex, true);
        ex.exit_scope();
    }
}

fn handle_function(node: Node<'_>, ex: &mut FileExtraction<'_>, in_type: bool) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = ex.text(name_node).to_string();
    let object_type = if in_type { ObjectType::Method } else { ObjectType::Function };
    let kind_str = object_type.as_str().to_string();
    let signature = function_signature(node, ex);
    let doc = super::doc_comment_before(node, ex.source());
    let id = ex.push_object(&name, object_type, node, signature, doc);
    if let Some(body) = node.child_by_field_name("body") {
        ex.collect_calls(body, &id, &name, &kind_str, CALL_KINDS);
    } else {
        // Expression-bodied functions keep the body outside a `body` field.
        ex.collect_calls(node, &id, &name, &kind_str, CALL_KINDS);
    }
}

fn handle_property(node: Node<'_>, ex: &mut FileExtraction<'_>, in_type: bool) {
    // `val NAME = ...` / `var name = ...`; the binding is a variable_declaration
    // or pattern under the property node.
    let mut stack = vec![node];
    let mut name = None;
    while let Some(current) = stack.pop() {
        if matches!(current.kind(), "variable_declaration" | "multi_variable_declaration") {
            let mut cursor = current.walk();
            for child in current.named_children(&mut cursor) {
                if child.kind() == "identifier" || child.kind() == "simple_identifier" {
                    name = Some(ex.text(child).to_string());
                    break;
                }
            }
            break;
        }
        let mut cursor = current.walk();
        for child in current.children(&mut cursor) {
            stack.push(child);
        }
    }
    let Some(name) = name else { return };
    let text = ex.text(node);
    let object_type = if text.trim_start().starts_with("val")
        && name.chars().all(|c| c.is_uppercase() || c == '_' || c.is_ascii_digit())
    {
        ObjectType::Constant
    } else if in_type {
        ObjectType::Property
    } else {
        ObjectType::Variable
    };
    ex.push_object(&name, object_type, node, None, None);
}

fn handle_import(node: Node<'_>, ex: &mut FileExtraction<'_>) {
    let path = match node.child_by_field_name("identifier") {
        Some(identifier) => ex.text(identifier).to_string(),
        None => ex
            .text(node)
            .trim_start_matches("import")
            .trim()
            .trim_end_matches(".*")
            .to_string(),
    };
    let path = path.trim();
    if !path.is_empty() && !path.ends_with('*') {
        ex.push_import(path, node);
    }
}

/// class / interface / enum class, decided by keyword tokens.
///
/// The keywords can sit at the top level or nested under modifier nodes,
/// so the whole header (everything before the body) is scanned.
fn classify_declaration(node: Node<'_>) -> ObjectType {
    let mut is_enum = false;
    let mut stack: Vec<Node<'_>> = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind().ends_with("_body") || child.kind() == "class_body" {
            continue;
        }
        stack.push(child);
    }
    while let Some(current) = stack.pop() {
        match current.kind() {
            "interface" => return ObjectType::Interface,
            "enum" => is_enum = true,
            _ => {
                let mut inner = current.walk();
                for child in current.children(&mut inner) {
                    stack.push(child);
                }
            }
        }
    }
    if is_enum {
        ObjectType::Enum
    } else {
        ObjectType::Class
    }
}

/// Supertype names from the header text between `:` and the body.
///
/// The grammar's delegation-specifier shapes vary across versions, so the
/// header is parsed textually: `class A : B(), C by impl` → `B`, `C`.
fn supertype_names(node: Node<'_>, ex: &FileExtraction<'_>) -> Vec<String> {
    let text = ex.text(node);
    let header = text.split('{').next().unwrap_or(text);
    let Some(colon_pos) = header.find(':') else {
        return Vec::new();
    };
    header[colon_pos + 1..]
        .split(',')
        .filter_map(|part| {
            let name = part
                .trim()
                .split(['(', '<', ' '])
                .next()
                .unwrap_or("")
                .trim();
            if !name.is_empty() && name.chars().next().is_some_and(|c| c.is_alphabetic()) {
                Some(name.to_string())
            } else {
                None
            }
        })
        .collect()
}

fn function_signature(node: Node<'_>, ex: &FileExtraction<'_>) -> Option<String> {
    let params = node.child_by_field_name("parameters").map(|p| ex.text(p))?;
    match node.child_by_field_name("type") {
        Some(ret) => Some(format!("{}: {}", params, ex.text(ret))),
        None => Some(params.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use crate::model::ObjectType;
    use crate::parser::{Language, ReferenceKind, SourceParser};

    fn parse(source: &str) -> crate::parser::ParsedFile {
        SourceParser::parse(Language::Kotlin, "CustomerTier.kt", source).expect("parse")
    }

    #[test]
    fn test_enum_class() {
        let parsed = parse(
            r#"
enum class CustomerTier(val discount: Double) {
    BRONZE(0.0), SILVER(0.05), GOLD(0.1)
}
"#,
        );
        let tier = parsed.objects.iter().find(|o| o.name == "CustomerTier").unwrap();
        assert_eq!(tier.object_type, ObjectType::Enum);
    }

    #[test]
    fn test_class_with_supertype() {
        let parsed = parse(
            r#"
class CustomerService(private val repo: CustomerRepo) : BaseService() {
    fun tierFor(customer: Customer): CustomerTier {
        return lookupTier(customer.spend)
    }
}
"#,
        );
        let service = parsed.objects.iter().find(|o| o.name == "CustomerService").unwrap();
        assert_eq!(service.object_type, ObjectType::Class);
        assert!(parsed
            .references
            .iter()
            .any(|r| r.kind == ReferenceKind::Extend && r.name == "BaseService"));
        let method = parsed.objects.iter().find(|o| o.name == "tierFor").unwrap();
        assert_eq!(method.object_type, ObjectType::Method);
        assert!(parsed
            .references
            .iter()
            .any(|r| r.kind == ReferenceKind::Call && r.name == "lookupTier"));
    }

    #[test]
    fn test_top_level_function_and_import() {
        let parsed = parse("import java.math.BigDecimal\n\nfun discountFor(tier: CustomerTier): Double = tier.discount\n");
        assert!(parsed
            .objects
            .iter()
            .any(|o| o.name == "discountFor" && o.object_type == ObjectType::Function));
        assert!(parsed
            .objects
            .iter()
            .any(|o| o.name == "BigDecimal" && o.object_type == ObjectType::Import));
    }
}
