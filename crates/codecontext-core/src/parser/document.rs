//! Markdown document parser.
//!
//! Splits a document into hierarchical chunks (headings, paragraphs, code
//! blocks) with line numbers, a parent chain following heading depth, and
//! size post-processing: oversized chunks are split at sentence boundaries
//! with word overlap, undersized neighbors of the same type are merged.
//! Inline code spans and identifier-shaped words are recorded as code
//! references so documentation can be linked back to code objects.

use std::sync::OnceLock;

use pulldown_cmark::{Event, HeadingLevel, Options, Parser as MarkdownParser, Tag, TagEnd};
use regex::Regex;

use crate::model::{DocumentNode, DocumentNodeType};

/// Chunk sizing; sizes are in characters, overlap in words.
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    pub max_chunk_size: usize,
    pub min_chunk_size: usize,
    pub overlap_words: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 1200,
            min_chunk_size: 60,
            overlap_words: 12,
        }
    }
}

/// Parse a markdown document into chunks.
pub fn parse_markdown(file_path: &str, source: &str, config: &ChunkConfig) -> Vec<DocumentNode> {
    let blocks = collect_blocks(source);
    let mut nodes = Vec::new();
    // Heading stack: (level, node id).
    let mut heading_stack: Vec<(u8, String)> = Vec::new();

    for block in blocks {
        match block.kind {
            BlockKind::Heading(level) => {
                while heading_stack.last().is_some_and(|(l, _)| *l >= level) {
                    heading_stack.pop();
                }
                let mut node = DocumentNode::new(
                    DocumentNodeType::Heading,
                    block.text.clone(),
                    file_path,
                    block.start_line,
                    block.end_line,
                );
                node.level = Some(level);
                node.parent_id = heading_stack.last().map(|(_, id)| id.clone());
                attach_code_refs(&mut node);
                heading_stack.push((level, node.id.clone()));
                nodes.push(node);
            }
            BlockKind::Paragraph | BlockKind::CodeBlock => {
                let node_type = if block.kind == BlockKind::CodeBlock {
                    DocumentNodeType::CodeBlock
                } else {
                    DocumentNodeType::Paragraph
                };
                let parent = heading_stack.last().map(|(_, id)| id.clone());
                let level = heading_stack.last().map(|(l, _)| *l);
                for piece in split_oversized(&block.text, config) {
                    let mut node = DocumentNode::new(
                        node_type,
                        piece,
                        file_path,
                        block.start_line,
                        block.end_line,
                    );
                    node.parent_id = parent.clone();
                    node.level = level;
                    attach_code_refs(&mut node);
                    nodes.push(node);
                }
            }
        }
    }

    merge_undersized(nodes, config)
}

// ---------------------------------------------------------------------------
// Block collection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Heading(u8),
    Paragraph,
    CodeBlock,
}

struct Block {
    kind: BlockKind,
    text: String,
    start_line: u32,
    end_line: u32,
}

fn collect_blocks(source: &str) -> Vec<Block> {
    let line_starts: Vec<usize> = std::iter::once(0)
        .chain(source.match_indices('\n').map(|(i, _)| i + 1))
        .collect();
    let line_of = |byte: usize| -> u32 {
        (line_starts.partition_point(|&start| start <= byte)) as u32
    };

    let mut blocks = Vec::new();
    let mut current: Option<(BlockKind, String, usize)> = None;

    let parser = MarkdownParser::new_ext(source, Options::empty());
    for (event, range) in parser.into_offset_iter() {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                current = Some((BlockKind::Heading(heading_depth(level)), String::new(), range.start));
            }
            Event::Start(Tag::Paragraph) => {
                current = Some((BlockKind::Paragraph, String::new(), range.start));
            }
            Event::Start(Tag::CodeBlock(_)) => {
                current = Some((BlockKind::CodeBlock, String::new(), range.start));
            }
            Event::End(TagEnd::Heading(_)) | Event::End(TagEnd::Paragraph) | Event::End(TagEnd::CodeBlock) => {
                if let Some((kind, text, start)) = current.take() {
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        blocks.push(Block {
                            kind,
                            text: trimmed.to_string(),
                            start_line: line_of(start),
                            end_line: line_of(range.end.saturating_sub(1).max(range.start)),
                        });
                    }
                }
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some((_, buffer, _)) = current.as_mut() {
                    buffer.push_str(&text);
                    buffer.push(' ');
                }
            }
            Event::SoftBreak | Event::HardBreak => {
                if let Some((_, buffer, _)) = current.as_mut() {
                    buffer.push(' ');
                }
            }
            _ => {}
        }
    }
    blocks
}

fn heading_depth(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

// ---------------------------------------------------------------------------
// Size post-processing
// ---------------------------------------------------------------------------

/// Split text over `max_chunk_size` at sentence boundaries, repeating the
/// trailing `overlap_words` words of each piece at the head of the next.
fn split_oversized(text: &str, config: &ChunkConfig) -> Vec<String> {
    if text.len() <= config.max_chunk_size {
        return vec![text.to_string()];
    }

    let sentences: Vec<&str> = text
        .split_inclusive(['.', '!', '?'])
        .filter(|s| !s.trim().is_empty())
        .collect();

    let mut pieces = Vec::new();
    let mut buffer = String::new();
    for sentence in sentences {
        if !buffer.is_empty() && buffer.len() + sentence.len() > config.max_chunk_size {
            let overlap = tail_words(&buffer, config.overlap_words);
            pieces.push(std::mem::take(&mut buffer).trim().to_string());
            buffer = overlap;
        }
        buffer.push_str(sentence);
    }
    if !buffer.trim().is_empty() {
        pieces.push(buffer.trim().to_string());
    }
    if pieces.is_empty() {
        vec![text.to_string()]
    } else {
        pieces
    }
}

fn tail_words(text: &str, count: usize) -> String {
    if count == 0 {
        return String::new();
    }
    let words: Vec<&str> = text.split_whitespace().collect();
    let start = words.len().saturating_sub(count);
    let mut tail = words[start..].join(" ");
    if !tail.is_empty() {
        tail.push(' ');
    }
    tail
}

/// Merge adjacent undersized chunks of the same type under the same parent.
fn merge_undersized(nodes: Vec<DocumentNode>, config: &ChunkConfig) -> Vec<DocumentNode> {
    let mut merged: Vec<DocumentNode> = Vec::with_capacity(nodes.len());
    for node in nodes {
        let mergeable = merged.last().is_some_and(|prev: &DocumentNode| {
            prev.node_type == node.node_type
                && prev.node_type != DocumentNodeType::Heading
                && prev.parent_id == node.parent_id
                && prev.content.len() < config.min_chunk_size
                && prev.content.len() + node.content.len() <= config.max_chunk_size
        });
        if let Some(prev) = merged.last_mut().filter(|_| mergeable) {
            let end_line = node.end_line.max(prev.end_line);
            let content = format!("{}\n{}", prev.content, node.content);
            let mut replacement = DocumentNode::new(
                prev.node_type,
                content,
                prev.file_path.clone(),
                prev.start_line,
                end_line,
            );
            replacement.parent_id = prev.parent_id.clone();
            replacement.level = prev.level;
            attach_code_refs(&mut replacement);
            *prev = replacement;
        } else {
            merged.push(node);
        }
    }
    merged
}

// ---------------------------------------------------------------------------
// Code references
// ---------------------------------------------------------------------------

fn identifier_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Dotted paths, camelCase, PascalCase with internal capital,
        // snake_case. Dotted first: alternation is leftmost-first.
        Regex::new(r"\b(?:[A-Za-z][A-Za-z0-9]*\.[A-Za-z][A-Za-z0-9_.]*|[a-z]+[A-Z][A-Za-z0-9]*|[A-Z][a-z0-9]+[A-Z][A-Za-z0-9]*|[a-z0-9]+_[a-z0-9_]+)\b")
            .expect("identifier regex")
    })
}

/// Record identifier-shaped words from prose into `metadata.code_references`.
fn attach_code_refs(node: &mut DocumentNode) {
    let mut refs: Vec<String> = identifier_regex()
        .find_iter(&node.content)
        .map(|m| m.as_str().to_string())
        .collect();
    refs.sort();
    refs.dedup();
    if !refs.is_empty() {
        node.metadata
            .insert("code_references".into(), serde_json::json!(refs));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"# Order Flow

How an order moves through the system.

## Placement

The `OrderService.processOrder` method validates the cart and
persists the order via order_repository.

```java
orderService.processOrder(cart);
```

## Fulfillment

Shipping costs come from calculateShipping.
"#;

    #[test]
    fn test_heading_hierarchy() {
        let nodes = parse_markdown("docs/order-flow.md", SAMPLE, &ChunkConfig::default());
        let top = nodes
            .iter()
            .find(|n| n.content.contains("Order Flow"))
            .expect("top heading");
        assert_eq!(top.node_type, DocumentNodeType::Heading);
        assert_eq!(top.level, Some(1));
        assert!(top.parent_id.is_none());

        let placement = nodes
            .iter()
            .find(|n| n.node_type == DocumentNodeType::Heading && n.content.contains("Placement"))
            .expect("sub heading");
        assert_eq!(placement.parent_id.as_deref(), Some(top.id.as_str()));
    }

    #[test]
    fn test_paragraph_parents_and_code_block() {
        let nodes = parse_markdown("docs/order-flow.md", SAMPLE, &ChunkConfig::default());
        let placement_id = nodes
            .iter()
            .find(|n| n.node_type == DocumentNodeType::Heading && n.content.contains("Placement"))
            .map(|n| n.id.clone())
            .unwrap();
        let para = nodes
            .iter()
            .find(|n| n.content.contains("validates the cart"))
            .expect("paragraph");
        assert_eq!(para.parent_id.as_deref(), Some(placement_id.as_str()));

        assert!(nodes.iter().any(|n| n.node_type == DocumentNodeType::CodeBlock));
    }

    #[test]
    fn test_code_references_extracted() {
        let nodes = parse_markdown("docs/order-flow.md", SAMPLE, &ChunkConfig::default());
        let para = nodes
            .iter()
            .find(|n| n.content.contains("validates the cart"))
            .unwrap();
        let refs = para
            .metadata
            .get("code_references")
            .and_then(|v| v.as_array())
            .expect("code refs recorded");
        let refs: Vec<&str> = refs.iter().filter_map(|v| v.as_str()).collect();
        assert!(refs.contains(&"OrderService.processOrder"));
        assert!(refs.contains(&"order_repository"));
    }

    #[test]
    fn test_line_numbers_monotone() {
        let nodes = parse_markdown("doc.md", SAMPLE, &ChunkConfig::default());
        assert!(nodes.iter().all(|n| n.start_line >= 1 && n.end_line >= n.start_line));
        let headings: Vec<u32> = nodes
            .iter()
            .filter(|n| n.node_type == DocumentNodeType::Heading)
            .map(|n| n.start_line)
            .collect();
        assert!(headings.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_oversized_paragraph_splits_with_overlap() {
        let long: String = (0..120)
            .map(|i| format!("Sentence number {} describes the checkout pipeline. ", i))
            .collect();
        let source = format!("# Doc\n\n{}\n", long);
        let config = ChunkConfig { max_chunk_size: 400, min_chunk_size: 40, overlap_words: 4 };
        let nodes = parse_markdown("doc.md", &source, &config);
        let paragraphs: Vec<_> = nodes
            .iter()
            .filter(|n| n.node_type == DocumentNodeType::Paragraph)
            .collect();
        assert!(paragraphs.len() > 1);
        // Overlap: the second piece begins with words from the first's tail.
        let first_tail = paragraphs[0]
            .content
            .split_whitespace()
            .rev()
            .take(4)
            .collect::<Vec<_>>();
        assert!(first_tail.iter().all(|w| paragraphs[1].content.contains(*w)));
    }

    #[test]
    fn test_undersized_merge() {
        let source = "# T\n\nOne.\n\nTwo.\n\nThree.\n";
        let config = ChunkConfig { max_chunk_size: 500, min_chunk_size: 50, overlap_words: 0 };
        let nodes = parse_markdown("doc.md", source, &config);
        let paragraphs: Vec<_> = nodes
            .iter()
            .filter(|n| n.node_type == DocumentNodeType::Paragraph)
            .collect();
        assert_eq!(paragraphs.len(), 1);
        assert!(paragraphs[0].content.contains("One") && paragraphs[0].content.contains("Three"));
    }
}
