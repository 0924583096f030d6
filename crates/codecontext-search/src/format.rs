//! Result formatting: the public output boundary.
//!
//! Search results are rendered at two densities from a single record type:
//! a minimal form (name, type, file, lines, language, score) and an
//! expanded form adding any of signature, snippet, content, parent,
//! relationships, complexity and caller impact. The text and JSON
//! renderers share the same records.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::{Result, SearchError};
use crate::retriever::RankedResult;
use crate::schema::RelationSummary;

/// Number of relationship items sampled into expanded output.
const RELATION_SAMPLE: usize = 5;

/// Number of content lines in a snippet.
const SNIPPET_LINES: usize = 5;

/// Which expanded fields to emit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpandOptions {
    pub signature: bool,
    pub snippet: bool,
    pub content: bool,
    pub parent: bool,
    pub relationships: bool,
    pub complexity: bool,
    pub impact: bool,
}

impl ExpandOptions {
    /// Parse a comma-separated field list (`signature,snippet,...`).
    pub fn parse(fields: &str) -> Result<Self> {
        let mut options = Self::default();
        for field in fields.split(',').map(str::trim).filter(|f| !f.is_empty()) {
            match field {
                "signature" => options.signature = true,
                "snippet" => options.snippet = true,
                "content" => options.content = true,
                "parent" => options.parent = true,
                "relationships" => options.relationships = true,
                "complexity" => options.complexity = true,
                "impact" => options.impact = true,
                "all" => {
                    options = Self {
                        signature: true,
                        snippet: true,
                        content: true,
                        parent: true,
                        relationships: true,
                        complexity: true,
                        impact: true,
                    }
                }
                other => {
                    return Err(SearchError::Unsupported(format!(
                        "unknown expand field '{}'; valid: signature, snippet, content, parent, relationships, complexity, impact, all",
                        other
                    )))
                }
            }
        }
        Ok(options)
    }

    pub fn any(&self) -> bool {
        *self != Self::default()
    }
}

/// A rendered relationship item.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RelationItem {
    pub relation: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub file: String,
    pub line: u32,
}

/// Sampled relationships plus the full count.
#[derive(Debug, Clone, Serialize)]
pub struct RelationBlock {
    pub items: Vec<RelationItem>,
    pub total_count: usize,
}

/// Complexity summary lifted from object metadata.
#[derive(Debug, Clone, Serialize)]
pub struct ComplexityBlock {
    pub cyclomatic: u64,
    pub cognitive: u64,
    pub nesting_depth: u64,
    pub rating: String,
}

/// Caller impact summary.
#[derive(Debug, Clone, Serialize)]
pub struct ImpactBlock {
    pub direct_callers: usize,
}

/// One search result at minimal or expanded density.
#[derive(Debug, Clone, Serialize)]
pub struct ResultRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: String,
    pub file: String,
    /// `"start-end"`, 1-based inclusive.
    pub lines: String,
    pub language: String,
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationships: Option<RelationBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complexity: Option<ComplexityBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact: Option<ImpactBlock>,
}

/// Build records from ranked results.
pub fn build_records(results: &[RankedResult], expand: &ExpandOptions) -> Vec<ResultRecord> {
    results.iter().map(|r| build_record(r, expand)).collect()
}

fn build_record(result: &RankedResult, expand: &ExpandOptions) -> ResultRecord {
    let payload = &result.payload;
    let mut record = ResultRecord {
        name: payload.name.clone(),
        object_type: payload.object_type.clone(),
        file: payload.file_path.clone(),
        lines: format!("{}-{}", payload.start_line, payload.end_line),
        language: payload.language.clone(),
        score: result.score,
        signature: None,
        snippet: None,
        content: None,
        parent: None,
        relationships: None,
        complexity: None,
        impact: None,
    };

    if expand.signature && !payload.signature.is_empty() {
        record.signature = Some(payload.signature.clone());
    }
    if expand.snippet {
        let snippet: Vec<&str> = payload.content.lines().take(SNIPPET_LINES).collect();
        record.snippet = Some(snippet.join("\n"));
    }
    if expand.content {
        record.content = Some(payload.content.clone());
    }
    if expand.parent {
        record.parent = parent_of(payload);
    }
    if expand.relationships {
        let all: Vec<&RelationSummary> = payload.relationships().collect();
        record.relationships = Some(RelationBlock {
            items: all
                .iter()
                .take(RELATION_SAMPLE)
                .map(|r| RelationItem {
                    relation: r.relation.clone(),
                    name: r.name.clone(),
                    kind: r.kind.clone(),
                    file: r.file.clone(),
                    line: r.line,
                })
                .collect(),
            total_count: all.len(),
        });
    }
    if expand.complexity {
        record.complexity = complexity_of(payload);
    }
    if expand.impact {
        record.impact = Some(ImpactBlock {
            direct_callers: direct_callers(payload),
        });
    }
    record
}

/// Enclosing scope from the qualified name (`A.B.c` → `A.B`).
fn parent_of(payload: &crate::schema::PointPayload) -> Option<String> {
    let qualified = &payload.qualified_name;
    let (parent, _) = qualified.rsplit_once('.')?;
    if parent.is_empty() {
        None
    } else {
        Some(parent.to_string())
    }
}

fn complexity_of(payload: &crate::schema::PointPayload) -> Option<ComplexityBlock> {
    let metadata = payload.metadata.as_object()?;
    Some(ComplexityBlock {
        cyclomatic: metadata.get("cyclomatic_complexity")?.as_u64()?,
        cognitive: metadata.get("cognitive_complexity").and_then(|v| v.as_u64()).unwrap_or(0),
        nesting_depth: metadata.get("nesting_depth").and_then(|v| v.as_u64()).unwrap_or(0),
        rating: metadata
            .get("complexity_rating")
            .and_then(|v| v.as_str())
            .unwrap_or("A")
            .to_string(),
    })
}

/// Distinct objects that call this one.
fn direct_callers(payload: &crate::schema::PointPayload) -> usize {
    let mut callers: HashSet<&str> = HashSet::new();
    for relation in &payload.outgoing_relationships {
        if relation.relation == "CALLED_BY" {
            callers.insert(relation.target_id.as_str());
        }
    }
    for relation in &payload.incoming_relationships {
        if relation.relation == "CALLS" {
            callers.insert(relation.target_id.as_str());
        }
    }
    callers.len()
}

/// Human-readable rendering, one block per result.
pub fn render_text(records: &[ResultRecord]) -> String {
    if records.is_empty() {
        return "No results.\n".to_string();
    }
    let mut out = String::new();
    for (rank, record) in records.iter().enumerate() {
        out.push_str(&format!(
            "{:2}. {} [{}] {}:{} ({}, score {:.3})\n",
            rank + 1,
            record.name,
            record.object_type,
            record.file,
            record.lines,
            record.language,
            record.score,
        ));
        if let Some(signature) = &record.signature {
            out.push_str(&format!("    signature: {}\n", signature));
        }
        if let Some(parent) = &record.parent {
            out.push_str(&format!("    parent: {}\n", parent));
        }
        if let Some(complexity) = &record.complexity {
            out.push_str(&format!(
                "    complexity: cyclomatic {} / cognitive {} / nesting {} (rating {})\n",
                complexity.cyclomatic,
                complexity.cognitive,
                complexity.nesting_depth,
                complexity.rating,
            ));
        }
        if let Some(impact) = &record.impact {
            out.push_str(&format!("    direct callers: {}\n", impact.direct_callers));
        }
        if let Some(relations) = &record.relationships {
            out.push_str(&format!("    relationships ({} total):\n", relations.total_count));
            for item in &relations.items {
                out.push_str(&format!(
                    "      {} {} [{}] {}:{}\n",
                    item.relation, item.name, item.kind, item.file, item.line,
                ));
            }
        }
        if let Some(snippet) = &record.snippet {
            for line in snippet.lines() {
                out.push_str(&format!("    | {}\n", line));
            }
        }
        if let Some(content) = &record.content {
            for line in content.lines() {
                out.push_str(&format!("    | {}\n", line));
            }
        }
    }
    out
}

/// Machine-readable rendering of the same records.
pub fn render_json(records: &[ResultRecord]) -> Result<String> {
    serde_json::to_string_pretty(records)
        .map_err(|e| SearchError::Search(format!("result serialization: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PointPayload;

    fn ranked(name: &str, content: &str) -> RankedResult {
        RankedResult {
            payload: PointPayload {
                name: name.into(),
                object_type: "method".into(),
                qualified_name: format!("OrderService.{}", name),
                language: "java".into(),
                file_path: "src/OrderService.java".into(),
                start_line: 10,
                end_line: 20,
                content: content.into(),
                signature: "(Cart cart) -> Order".into(),
                metadata: serde_json::json!({
                    "cyclomatic_complexity": 7,
                    "cognitive_complexity": 9,
                    "nesting_depth": 2,
                    "complexity_rating": "B",
                }),
                score_weight: 1.0,
                ..Default::default()
            },
            base_score: 0.03,
            score: 0.045,
        }
    }

    #[test]
    fn test_minimal_record() {
        let records = build_records(&[ranked("processOrder", "body")], &ExpandOptions::default());
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.name, "processOrder");
        assert_eq!(record.lines, "10-20");
        assert!(record.signature.is_none());
        assert!(record.content.is_none());
    }

    #[test]
    fn test_expand_parse() {
        let options = ExpandOptions::parse("signature, snippet").unwrap();
        assert!(options.signature && options.snippet);
        assert!(!options.content);
        assert!(ExpandOptions::parse("bogus").is_err());
        assert!(ExpandOptions::parse("all").unwrap().impact);
    }

    #[test]
    fn test_expanded_fields() {
        let expand = ExpandOptions::parse("signature,parent,complexity,snippet").unwrap();
        let content = (1..=10).map(|i| format!("line {}", i)).collect::<Vec<_>>().join("\n");
        let records = build_records(&[ranked("processOrder", &content)], &expand);
        let record = &records[0];
        assert_eq!(record.signature.as_deref(), Some("(Cart cart) -> Order"));
        assert_eq!(record.parent.as_deref(), Some("OrderService"));
        assert_eq!(record.complexity.as_ref().unwrap().rating, "B");
        assert_eq!(record.snippet.as_ref().unwrap().lines().count(), 5);
    }

    #[test]
    fn test_text_and_json_share_records() {
        let records = build_records(&[ranked("processOrder", "body")], &ExpandOptions::default());
        let text = render_text(&records);
        assert!(text.contains("processOrder"));
        assert!(text.contains("src/OrderService.java:10-20"));

        let json = render_json(&records).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0]["name"], "processOrder");
        assert_eq!(parsed[0]["type"], "method");
    }

    #[test]
    fn test_empty_results_text() {
        assert_eq!(render_text(&[]), "No results.\n");
    }
}
