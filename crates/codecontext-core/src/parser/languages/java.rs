//! Java extraction.
//!
//! Classes, interfaces, enums, methods/constructors, fields, imports,
//! `extends`/`implements` clauses, annotations and call sites.

use tree_sitter::Node;

use crate::model::ObjectType;
use crate::parser::{FileExtraction, ReferenceKind};

const CALL_KINDS: &[&str] = &["method_invocation", "object_creation_expression"];

pub(crate) fn extract(root: Node<'_>, ex: &mut FileExtraction<'_>) {
    walk(root, ex, false);
}

fn walk(node: Node<'_>, ex: &mut FileExtraction<'_>, in_type: bool) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "class_declaration" => handle_type(child, ex, ObjectType::Class),
            "interface_declaration" => handle_type(child, ex, ObjectType::Interface),
            "enum_declaration" => handle_type(child, ex, ObjectType::Enum),
            "method_declaration" | "constructor_declaration" => handle_method(child, ex, in_type),
            "field_declaration" => handle_field(child, ex),
            "import_declaration" => handle_import(child, ex),
            _ => {
                if child.child_count() > 0 {
                    walk(child, ex, in_type);
                }
            }
        }
    }
}

fn handle_type(node: Node<'_>, ex: &mut FileExtraction<'_>, object_type: ObjectType) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = ex.text(name_node).to_string();
    let line = node.start_position().row as u32 + 1;
    let doc = super::doc_comment_before(node, ex.source());
    let kind_str = object_type.as_str().to_string();
    let id = ex.push_object(&name, object_type, node, None, doc);

    for annotation in annotation_names(node, ex) {
        ex.push_reference(&id, &name, &kind_str, &annotation, ReferenceKind::Annotate, line);
    }

    // `extends Base`
    if let Some(superclass) = node.child_by_field_name("superclass") {
        let mut cursor = superclass.walk();
        for base in superclass.named_children(&mut cursor) {
            if matches!(base.kind(), "type_identifier" | "generic_type" | "scoped_type_identifier") {
                ex.push_reference(
                    &id,
                    &name,
                    &kind_str,
                    &simple_type_name(ex.text(base)),
                    ReferenceKind::Extend,
                    line,
                );
            }
        }
    }

    // `implements A, B` (classes) / `extends A, B` (interfaces). Matched by
    // node kind because the grammar names these clauses differently.
    let mut clause_cursor = node.walk();
    let clauses: Vec<Node<'_>> = node
        .children(&mut clause_cursor)
        .filter(|c| matches!(c.kind(), "super_interfaces" | "extends_interfaces"))
        .collect();
    for clause in clauses {
        let kind = if clause.kind() == "extends_interfaces" || object_type == ObjectType::Interface
        {
            ReferenceKind::Extend
        } else {
            ReferenceKind::Implement
        };
        collect_type_list(clause, ex, &id, &name, &kind_str, kind, line);
    }

    if let Some(body) = node.child_by_field_name("body") {
        ex.enter_scope(&name, &id);
        walk(body, ex, true);
        ex.exit_scope();
    }
}

fn handle_method(node: Node<'_>, ex: &mut FileExtraction<'_>, in_type: bool) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = ex.text(name_node).to_string();
    let line = node.start_position().row as u32 + 1;
    let object_type = if in_type { ObjectType::Method } else { ObjectType::Function };
    let kind_str = object_type.as_str().to_string();

    let params = node
        .child_by_field_name("parameters")
        .map(|p| ex.text(p))
        .unwrap_or("()");
    let signature = match node.child_by_field_name("type") {
        Some(ret) => format!("{} -> {}", params, ex.text(ret)),
        None => params.to_string(),
    };
    let doc = super::doc_comment_before(node, ex.source());
    let id = ex.push_object(&name, object_type, node, Some(signature), doc);

    for annotation in annotation_names(node, ex) {
        ex.push_reference(&id, &name, &kind_str, &annotation, ReferenceKind::Annotate, line);
    }
    if let Some(body) = node.child_by_field_name("body") {
        ex.collect_calls(body, &id, &name, &kind_str, CALL_KINDS);
    }
}

fn handle_field(node: Node<'_>, ex: &mut FileExtraction<'_>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() != "variable_declarator" {
            continue;
        }
        let Some(name_node) = child.child_by_field_name("name") else {
            continue;
        };
        let name = ex.text(name_node).to_string();
        let modifiers = modifier_text(node, ex);
        let object_type = if modifiers.contains("static") && modifiers.contains("final") {
            ObjectType::Constant
        } else {
            ObjectType::Field
        };
        ex.push_object(&name, object_type, node, None, None);
    }
}

fn handle_import(node: Node<'_>, ex: &mut FileExtraction<'_>) {
    let text = ex.text(node);
    let path = text
        .trim_start_matches("import")
        .trim_start_matches(" static")
        .trim()
        .trim_end_matches(';')
        .trim();
    if !path.is_empty() && !path.ends_with('*') {
        ex.push_import(path, node);
    }
}

fn collect_type_list(
    node: Node<'_>,
    ex: &mut FileExtraction<'_>,
    id: &str,
    name: &str,
    kind_str: &str,
    kind: ReferenceKind,
    line: u32,
) {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if matches!(current.kind(), "type_identifier" | "scoped_type_identifier") {
            ex.push_reference(id, name, kind_str, &simple_type_name(ex.text(current)), kind, line);
            continue;
        }
        let mut cursor = current.walk();
        for child in current.children(&mut cursor) {
            stack.push(child);
        }
    }
}

/// Annotation names from a declaration's `modifiers` child.
fn annotation_names(node: Node<'_>, ex: &FileExtraction<'_>) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "modifiers" {
            continue;
        }
        let mut modifier_cursor = child.walk();
        for modifier in child.children(&mut modifier_cursor) {
            if matches!(modifier.kind(), "marker_annotation" | "annotation") {
                if let Some(name) = modifier.child_by_field_name("name") {
                    names.push(simple_type_name(ex.text(name)));
                }
            }
        }
    }
    names
}

fn modifier_text(node: Node<'_>, ex: &FileExtraction<'_>) -> String {
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .filter(|c| c.kind() == "modifiers")
        .map(|c| ex.text(c).to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip package qualifiers and generics: `com.shop.Order<T>` → `Order`.
fn simple_type_name(raw: &str) -> String {
    let no_generics = raw.split('<').next().unwrap_or(raw);
    no_generics.rsplit('.').next().unwrap_or(no_generics).trim().to_string()
}

#[cfg(test)]
mod tests {
    use crate::model::ObjectType;
    use crate::parser::{Language, ReferenceKind, SourceParser};

    fn parse(source: &str) -> crate::parser::ParsedFile {
        SourceParser::parse(Language::Java, "OrderService.java", source).expect("parse")
    }

    #[test]
    fn test_class_extends_implements() {
        let parsed = parse(
            r#"
/** Coordinates order lifecycle. */
public class OrderService extends BaseService implements OrderHandler {
    private OrderRepository repository;
    public static final int MAX_ITEMS = 100;

    public Order processOrder(Cart cart) {
        validateCart(cart);
        return repository.save(new Order(cart));
    }
}
"#,
        );
        let class = parsed.objects.iter().find(|o| o.name == "OrderService").unwrap();
        assert_eq!(class.object_type, ObjectType::Class);
        assert!(class.docstring.contains("order lifecycle"));

        assert!(parsed
            .references
            .iter()
            .any(|r| r.kind == ReferenceKind::Extend && r.name == "BaseService"));
        assert!(parsed
            .references
            .iter()
            .any(|r| r.kind == ReferenceKind::Implement && r.name == "OrderHandler"));

        let method = parsed.objects.iter().find(|o| o.name == "processOrder").unwrap();
        assert_eq!(method.object_type, ObjectType::Method);
        assert_eq!(method.qualified_name, "OrderService.processOrder");
        assert!(method.signature.contains("Cart cart"));

        let field = parsed.objects.iter().find(|o| o.name == "repository").unwrap();
        assert_eq!(field.object_type, ObjectType::Field);
        let constant = parsed.objects.iter().find(|o| o.name == "MAX_ITEMS").unwrap();
        assert_eq!(constant.object_type, ObjectType::Constant);

        let calls: Vec<_> = parsed
            .references
            .iter()
            .filter(|r| r.kind == ReferenceKind::Call)
            .map(|r| r.name.as_str())
            .collect();
        assert!(calls.contains(&"validateCart"));
        assert!(calls.contains(&"save"));
    }

    #[test]
    fn test_interface_and_enum() {
        let parsed = parse(
            r#"
public interface PaymentProcessor {
    Receipt charge(Money amount);
}

public enum OrderStatus { PENDING, SHIPPED, DELIVERED }
"#,
        );
        assert!(parsed
            .objects
            .iter()
            .any(|o| o.name == "PaymentProcessor" && o.object_type == ObjectType::Interface));
        assert!(parsed
            .objects
            .iter()
            .any(|o| o.name == "OrderStatus" && o.object_type == ObjectType::Enum));
    }

    #[test]
    fn test_import_and_annotation() {
        let parsed = parse(
            "import java.util.List;\n\npublic class Svc {\n    @Override\n    public String toString() { return \"\"; }\n}\n",
        );
        assert!(parsed
            .objects
            .iter()
            .any(|o| o.object_type == ObjectType::Import && o.name == "List"));
        assert!(parsed
            .references
            .iter()
            .any(|r| r.kind == ReferenceKind::Annotate && r.name == "Override"));
    }

    #[test]
    fn test_contains_relationship() {
        let parsed = parse("public class A {\n    public void b() {}\n}\n");
        assert!(parsed
            .relationships
            .iter()
            .any(|r| r.relation_type == crate::relations::RelationType::Contains));
    }
}
