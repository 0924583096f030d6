//! Rust extraction.
//!
//! Structs, enums, traits, impl blocks (methods qualified by their self
//! type), free functions, consts/statics, type aliases, use declarations
//! and call sites. Trait impls resolve to IMPLEMENTS when the self type is
//! declared in the same file.

use std::collections::HashMap;

use tree_sitter::Node;

use crate::model::ObjectType;
use crate::parser::{FileExtraction, ReferenceKind};

const CALL_KINDS: &[&str] = &["call_expression", "macro_invocation"];

pub(crate) fn extract(root: Node<'_>, ex: &mut FileExtraction<'_>) {
    let mut types_in_file: HashMap<String, String> = HashMap::new();
    walk(root, ex, &mut types_in_file, false);
}

fn walk(
    node: Node<'_>,
    ex: &mut FileExtraction<'_>,
    types_in_file: &mut HashMap<String, String>,
    in_impl: bool,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "struct_item" => handle_type(child, ex, types_in_file, ObjectType::Class),
            "enum_item" => handle_type(child, ex, types_in_file, ObjectType::Enum),
            "trait_item" => handle_trait(child, ex, types_in_file),
            "impl_item" => handle_impl(child, ex, types_in_file),
            "function_item" => handle_function(child, ex, in_impl),
            "const_item" | "static_item" => handle_const(child, ex),
            "type_item" => handle_type_alias(child, ex),
            "use_declaration" => handle_use(child, ex),
            "mod_item" => {
                if let Some(body) = child.child_by_field_name("body") {
                    walk(body, ex, types_in_file, false);
                }
            }
            _ => {
                if child.child_count() > 0 {
                    walk(child, ex, types_in_file, in_impl);
                }
            }
        }
    }
}

fn handle_type(
    node: Node<'_>,
    ex: &mut FileExtraction<'_>,
    types_in_file: &mut HashMap<String, String>,
    object_type: ObjectType,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = ex.text(name_node).to_string();
    let doc = super::doc_comment_before(node, ex.source());
    let id = ex.push_object(&name, object_type, node, None, doc);
    types_in_file.insert(name, id);
}

fn handle_trait(
    node: Node<'_>,
    ex: &mut FileExtraction<'_>,
    types_in_file: &mut HashMap<String, String>,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = ex.text(name_node).to_string();
    let doc = super::doc_comment_before(node, ex.source());
    let id = ex.push_object(&name, ObjectType::Interface, node, None, doc);
    types_in_file.insert(name.clone(), id.clone());

    if let Some(body) = node.child_by_field_name("body") {
        ex.enter_scope(&name, &id);
        let mut inner = HashMap::new();
        walk(body, ex, &mut inner, true);
        ex.exit_scope();
    }
}

fn handle_impl(
    node: Node<'_>,
    ex: &mut FileExtraction<'_>,
    types_in_file: &mut HashMap<String, String>,
) {
    let Some(type_node) = node.child_by_field_name("type") else {
        return;
    };
    let self_type = simple_type(ex.text(type_node));
    let self_id = types_in_file.get(&self_type).cloned();

    // `impl Trait for Type`: attribute the IMPLEMENTS reference to the
    // self type when it is declared in this file.
    if let Some(trait_node) = node.child_by_field_name("trait") {
        if let Some(self_id) = &self_id {
            let trait_name = simple_type(ex.text(trait_node));
            ex.push_reference(
                self_id,
                &self_type,
                "class",
                &trait_name,
                ReferenceKind::Implement,
                node.start_position().row as u32 + 1,
            );
        }
    }

    if let Some(body) = node.child_by_field_name("body") {
        ex.enter_scope(&self_type, self_id.as_deref().unwrap_or(""));
        let mut inner = HashMap::new();
        walk(body, ex, &mut inner, true);
        ex.exit_scope();
    }
}

fn handle_function(node: Node<'_>, ex: &mut FileExtraction<'_>, in_impl: bool) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = ex.text(name_node).to_string();
    let object_type = if in_impl { ObjectType::Method } else { ObjectType::Function };
    let kind_str = object_type.as_str().to_string();
    let params = node
        .child_by_field_name("parameters")
        .map(|p| ex.text(p))
        .unwrap_or("()");
    let signature = match node.child_by_field_name("return_type") {
        Some(ret) => format!("{} -> {}", params, ex.text(ret)),
        None => params.to_string(),
    };
    let doc = super::doc_comment_before(node, ex.source());
    let id = ex.push_object(&name, object_type, node, Some(signature), doc);
    if let Some(body) = node.child_by_field_name("body") {
        ex.collect_calls(body, &id, &name, &kind_str, CALL_KINDS);
    }
}

fn handle_const(node: Node<'_>, ex: &mut FileExtraction<'_>) {
    if let Some(name_node) = node.child_by_field_name("name") {
        let name = ex.text(name_node).to_string();
        ex.push_object(&name, ObjectType::Constant, node, None, None);
    }
}

fn handle_type_alias(node: Node<'_>, ex: &mut FileExtraction<'_>) {
    if let Some(name_node) = node.child_by_field_name("name") {
        let name = ex.text(name_node).to_string();
        ex.push_object(&name, ObjectType::Type, node, None, None);
    }
}

fn handle_use(node: Node<'_>, ex: &mut FileExtraction<'_>) {
    let text = ex.text(node);
    let path = text
        .trim_start_matches("pub")
        .trim()
        .trim_start_matches("use")
        .trim()
        .trim_end_matches(';')
        .trim();
    // Grouped or glob imports are not individually resolvable.
    if path.is_empty() || path.contains('{') || path.ends_with('*') {
        return;
    }
    let path = path.split(" as ").next().unwrap_or(path);
    ex.push_import(path, node);
}

/// `Vec<Order>` → `Vec`, `shop::Order` → `Order`, `&mut Order` → `Order`.
fn simple_type(raw: &str) -> String {
    let cleaned = raw.trim().trim_start_matches('&').trim_start_matches("mut ").trim();
    let no_generics = cleaned.split('<').next().unwrap_or(cleaned);
    no_generics
        .rsplit("::")
        .next()
        .unwrap_or(no_generics)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use crate::model::ObjectType;
    use crate::parser::{Language, ReferenceKind, SourceParser};

    fn parse(source: &str) -> crate::parser::ParsedFile {
        SourceParser::parse(Language::Rust, "src/orders.rs", source).expect("parse")
    }

    #[test]
    fn test_struct_impl_methods() {
        let parsed = parse(
            r#"
/// In-memory order book.
pub struct OrderBook {
    orders: Vec<Order>,
}

impl OrderBook {
    pub fn place(&mut self, order: Order) -> OrderId {
        self.validate(&order);
        self.orders.push(order);
        next_id()
    }
}
"#,
        );
        let book = parsed.objects.iter().find(|o| o.name == "OrderBook").unwrap();
        assert_eq!(book.object_type, ObjectType::Class);
        assert!(book.docstring.contains("order book"));

        let place = parsed.objects.iter().find(|o| o.name == "place").unwrap();
        assert_eq!(place.object_type, ObjectType::Method);
        assert_eq!(place.qualified_name, "OrderBook.place");
        assert!(parsed
            .references
            .iter()
            .any(|r| r.kind == ReferenceKind::Call && r.name == "next_id"));
    }

    #[test]
    fn test_trait_impl_reference() {
        let parsed = parse(
            r#"
pub trait Pricer {
    fn price(&self) -> u64;
}

pub struct FlatPricer;

impl Pricer for FlatPricer {
    fn price(&self) -> u64 {
        100
    }
}
"#,
        );
        assert!(parsed
            .objects
            .iter()
            .any(|o| o.name == "Pricer" && o.object_type == ObjectType::Interface));
        assert!(parsed
            .references
            .iter()
            .any(|r| r.kind == ReferenceKind::Implement && r.name == "Pricer"));
    }

    #[test]
    fn test_use_and_const() {
        let parsed = parse("use std::collections::HashMap;\n\npub const MAX_BATCH: usize = 64;\n");
        assert!(parsed
            .objects
            .iter()
            .any(|o| o.name == "HashMap" && o.object_type == ObjectType::Import));
        assert!(parsed
            .objects
            .iter()
            .any(|o| o.name == "MAX_BATCH" && o.object_type == ObjectType::Constant));
    }
}
