//! Per-language AST walkers feeding the shared extraction builder.

pub(crate) mod go;
pub(crate) mod java;
pub(crate) mod javascript;
pub(crate) mod kotlin;
pub(crate) mod python;
pub(crate) mod rust;
pub(crate) mod typescript;

use tree_sitter::Node;

/// Doc comment immediately preceding `node`, if any.
///
/// Recognizes `/** ... */` blocks (JS/TS/Java/Kotlin), runs of `///` lines
/// (Rust) and runs of `//` lines (Go). Returns the cleaned text.
pub(crate) fn doc_comment_before(node: Node<'_>, source: &str) -> Option<String> {
    let first = node.prev_sibling()?;
    if !first.kind().contains("comment") {
        return None;
    }

    let text_of = |n: Node<'_>| n.utf8_text(source.as_bytes()).unwrap_or("").to_string();
    let raw = text_of(first);

    if raw.starts_with("/**") {
        return Some(clean_block_comment(&raw));
    }

    if raw.starts_with("///") || raw.starts_with("//") {
        // Collect the contiguous run of line comments above.
        let mut lines = vec![clean_line_comment(&raw)];
        let mut cursor = first;
        while let Some(prev) = cursor.prev_sibling() {
            if !prev.kind().contains("comment") {
                break;
            }
            // Contiguity: the comments must be on adjacent lines.
            if prev.end_position().row + 1 != cursor.start_position().row {
                break;
            }
            let prev_text = text_of(prev);
            if !prev_text.starts_with("//") {
                break;
            }
            lines.push(clean_line_comment(&prev_text));
            cursor = prev;
        }
        lines.reverse();
        let doc = lines.join("\n").trim().to_string();
        return if doc.is_empty() { None } else { Some(doc) };
    }

    None
}

fn clean_block_comment(raw: &str) -> String {
    raw.trim_start_matches("/**")
        .trim_end_matches("*/")
        .lines()
        .map(|line| line.trim().trim_start_matches('*').trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn clean_line_comment(raw: &str) -> String {
    raw.trim_start_matches('/').trim_start_matches('!').trim().to_string()
}
