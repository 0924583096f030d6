//! Tree-sitter parsers for code, plus document and config parsers.
//!
//! Each language module walks the AST and feeds a shared [`FileExtraction`]
//! builder, which assigns qualified names from the scope stack, emits
//! structural CONTAINS edges, computes complexity metadata and collects
//! unresolved symbol references for the cross-file extractor.
//!
//! ## Supported source languages
//!
//! Python, JavaScript, TypeScript (+TSX), Rust, Go, Java, Kotlin.
//! Markdown is handled by [`document`], JSON/YAML/TOML by [`config_file`].

pub mod config_file;
pub mod document;
mod languages;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::OnceLock;

use thiserror::Error;
use tree_sitter::Node;

use crate::model::{normalize_path, CodeObject, ObjectType};
use crate::relations::{Endpoint, RelationType, Relationship};

// ============================================================================
// Supported languages
// ============================================================================

/// Source languages with an AST parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    Rust,
    Go,
    Java,
    Kotlin,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript | Language::Tsx => "typescript",
            Language::Rust => "rust",
            Language::Go => "go",
            Language::Java => "java",
            Language::Kotlin => "kotlin",
        }
    }

    /// Tree-sitter grammar for this language.
    pub fn tree_sitter_language(&self) -> tree_sitter::Language {
        match self {
            Language::Python => tree_sitter_python::LANGUAGE.into(),
            Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Language::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Language::Rust => tree_sitter_rust::LANGUAGE.into(),
            Language::Go => tree_sitter_go::LANGUAGE.into(),
            Language::Java => tree_sitter_java::LANGUAGE.into(),
            Language::Kotlin => tree_sitter_kotlin_ng::LANGUAGE.into(),
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        extension_map().get(ext.to_lowercase().as_str()).copied()
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn all_extensions() -> &'static [&'static str] {
        &["py", "js", "mjs", "cjs", "ts", "tsx", "rs", "go", "java", "kt", "kts"]
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

static EXTENSION_MAP: OnceLock<HashMap<&'static str, Language>> = OnceLock::new();

fn extension_map() -> &'static HashMap<&'static str, Language> {
    EXTENSION_MAP.get_or_init(|| {
        let mut map = HashMap::new();
        map.insert("py", Language::Python);
        map.insert("js", Language::JavaScript);
        map.insert("mjs", Language::JavaScript);
        map.insert("cjs", Language::JavaScript);
        map.insert("ts", Language::TypeScript);
        map.insert("tsx", Language::Tsx);
        map.insert("rs", Language::Rust);
        map.insert("go", Language::Go);
        map.insert("java", Language::Java);
        map.insert("kt", Language::Kotlin);
        map.insert("kts", Language::Kotlin);
        map
    })
}

// ============================================================================
// Errors
// ============================================================================

/// Errors during parsing of a single file. Never aborts a whole run.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to set language: {0}")]
    LanguageSet(String),

    #[error("failed to parse source of {0}")]
    ParseFailed(String),

    #[error("unsupported language for file: {0}")]
    UnsupportedLanguage(String),

    #[error("invalid {format} in {path}: {message}")]
    InvalidConfig {
        format: &'static str,
        path: String,
        message: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Parse output
// ============================================================================

/// Kind of an unresolved symbol reference collected during extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// A call site; resolves to CALLS.
    Call,
    /// A base class; resolves to EXTENDS.
    Extend,
    /// An implemented interface; resolves to IMPLEMENTS.
    Implement,
    /// A declared import; resolves to IMPORTS.
    Import,
    /// A decorator or annotation; resolves to ANNOTATES.
    Annotate,
    /// Any other symbol use; resolves to REFERENCES.
    Use,
}

/// A name seen in a file, to be resolved against the project index later.
#[derive(Debug, Clone)]
pub struct SymbolReference {
    /// Id of the object the reference occurs in.
    pub source_id: String,
    pub source: Endpoint,
    /// Referenced name, possibly dotted (`orders.OrderService`).
    pub name: String,
    pub kind: ReferenceKind,
    pub line: u32,
    pub language: String,
}

/// Everything extracted from one source file.
#[derive(Debug, Default)]
pub struct ParsedFile {
    pub objects: Vec<CodeObject>,
    /// Intra-file edges (CONTAINS plus their reverses come later).
    pub relationships: Vec<Relationship>,
    /// Unresolved references for the cross-file extractor.
    pub references: Vec<SymbolReference>,
}

// ============================================================================
// Source parser
// ============================================================================

/// Parses a source file into code objects and intra-file relationships.
pub struct SourceParser;

impl SourceParser {
    /// Parse `source` as `language`, producing objects, CONTAINS edges and
    /// unresolved references. `file_path` should be project-relative.
    pub fn parse(
        language: Language,
        file_path: &str,
        source: &str,
    ) -> Result<ParsedFile, ParseError> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&language.tree_sitter_language())
            .map_err(|e| ParseError::LanguageSet(e.to_string()))?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| ParseError::ParseFailed(file_path.to_string()))?;

        let mut extraction = FileExtraction::new(file_path, language, source);
        match language {
            Language::Python => languages::python::extract(tree.root_node(), &mut extraction),
            Language::JavaScript => {
                languages::javascript::extract(tree.root_node(), &mut extraction)
            }
            Language::TypeScript | Language::Tsx => {
                languages::typescript::extract(tree.root_node(), &mut extraction)
            }
            Language::Rust => languages::rust::extract(tree.root_node(), &mut extraction),
            Language::Go => languages::go::extract(tree.root_node(), &mut extraction),
            Language::Java => languages::java::extract(tree.root_node(), &mut extraction),
            Language::Kotlin => languages::kotlin::extract(tree.root_node(), &mut extraction),
        }
        Ok(extraction.finish())
    }
}

// ============================================================================
// Shared extraction builder
// ============================================================================

/// Accumulates one file's extraction; language modules only decide *what*
/// is an object, the builder handles naming, edges and metadata uniformly.
pub(crate) struct FileExtraction<'a> {
    file_path: String,
    language: Language,
    source: &'a str,
    scope: Vec<(String, String)>,
    out: ParsedFile,
}

impl<'a> FileExtraction<'a> {
    fn new(file_path: &str, language: Language, source: &'a str) -> Self {
        Self {
            file_path: normalize_path(file_path),
            language,
            source,
            scope: Vec::new(),
            out: ParsedFile::default(),
        }
    }

    pub(crate) fn source(&self) -> &'a str {
        self.source
    }

    pub(crate) fn text(&self, node: Node<'_>) -> &'a str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    fn qualified(&self, name: &str) -> String {
        if self.scope.is_empty() {
            name.to_string()
        } else {
            let mut parts: Vec<&str> = self.scope.iter().map(|(n, _)| n.as_str()).collect();
            parts.push(name);
            parts.join(".")
        }
    }

    /// Add an object spanning `node`; returns its id for scoping/references.
    pub(crate) fn push_object(
        &mut self,
        name: &str,
        object_type: ObjectType,
        node: Node<'_>,
        signature: Option<String>,
        docstring: Option<String>,
    ) -> String {
        let start_line = node.start_position().row as u32 + 1;
        let end_line = node.end_position().row as u32 + 1;
        let mut object = CodeObject::new(
            name,
            self.qualified(name),
            object_type,
            self.language.as_str(),
            self.file_path.clone(),
            start_line,
            end_line,
            self.text(node),
        );
        if let Some(sig) = signature {
            object.signature = sig;
        }
        if let Some(doc) = docstring {
            object.docstring = doc;
        }

        if matches!(
            object_type,
            ObjectType::Class
                | ObjectType::Interface
                | ObjectType::Enum
                | ObjectType::Method
                | ObjectType::Function
        ) {
            let metrics = complexity_metrics(node, self.language);
            object.metadata = metrics.into_metadata();
        }
        object
            .metadata
            .insert("lines_of_code".into(), serde_json::json!(end_line - start_line + 1));

        // Structural containment from the enclosing scope. Scopes with no
        // object of their own (Rust impl blocks, Go receivers) only qualify
        // names and emit no edge.
        if let Some((parent_name, parent_id)) = self.scope.last().filter(|(_, id)| !id.is_empty()) {
            self.out.relationships.push(Relationship::new(
                parent_id.clone(),
                object.id.clone(),
                RelationType::Contains,
                Endpoint::new(parent_name.clone(), "scope", self.file_path.clone(), 0),
                Endpoint::new(
                    name,
                    object_type.as_str(),
                    self.file_path.clone(),
                    start_line,
                ),
            ));
        }

        let id = object.id.clone();
        self.out.objects.push(object);
        id
    }

    /// Enter a named scope (class, interface, enum) for nested objects.
    pub(crate) fn enter_scope(&mut self, name: &str, id: &str) {
        self.scope.push((name.to_string(), id.to_string()));
    }

    pub(crate) fn exit_scope(&mut self) {
        self.scope.pop();
    }

    /// Record an import declaration as an object plus a resolvable reference.
    pub(crate) fn push_import(&mut self, path: &str, node: Node<'_>) {
        let name = path
            .rsplit(|c| c == '.' || c == '/' || c == ':')
            .next()
            .unwrap_or(path)
            .to_string();
        if name.is_empty() {
            return;
        }
        let id = self.push_object(&name, ObjectType::Import, node, Some(path.to_string()), None);
        let line = node.start_position().row as u32 + 1;
        self.out.references.push(SymbolReference {
            source_id: id,
            source: Endpoint::new(name.clone(), "import", self.file_path.clone(), line),
            name,
            kind: ReferenceKind::Import,
            line,
            language: self.language.as_str().to_string(),
        });
    }

    /// Record an unresolved reference from the object `source_id`.
    pub(crate) fn push_reference(
        &mut self,
        source_id: &str,
        source_name: &str,
        source_kind: &str,
        name: &str,
        kind: ReferenceKind,
        line: u32,
    ) {
        if name.is_empty() {
            return;
        }
        self.out.references.push(SymbolReference {
            source_id: source_id.to_string(),
            source: Endpoint::new(source_name, source_kind, self.file_path.clone(), line),
            name: name.to_string(),
            kind,
            line,
            language: self.language.as_str().to_string(),
        });
    }

    /// Collect call sites inside `body` and attribute them to `owner_id`.
    pub(crate) fn collect_calls(
        &mut self,
        body: Node<'_>,
        owner_id: &str,
        owner_name: &str,
        owner_kind: &str,
        call_kinds: &[&str],
    ) {
        let mut stack = vec![body];
        while let Some(node) = stack.pop() {
            if call_kinds.contains(&node.kind()) {
                if let Some(callee) = callee_name(node, self.source) {
                    let line = node.start_position().row as u32 + 1;
                    self.push_reference(
                        owner_id,
                        owner_name,
                        owner_kind,
                        &callee,
                        ReferenceKind::Call,
                        line,
                    );
                }
            }
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                stack.push(child);
            }
        }
    }

    fn finish(self) -> ParsedFile {
        self.out
    }
}

/// Extract the called name from a call-like node.
///
/// Handles `f(...)`, `obj.method(...)` and `pkg.mod.f(...)`; the dotted
/// form keeps the final two segments so `self.helper()` resolves as
/// `helper` with its receiver hint intact.
fn callee_name(node: Node<'_>, source: &str) -> Option<String> {
    let function = node
        .child_by_field_name("function")
        .or_else(|| node.child_by_field_name("name"))
        .or_else(|| node.child_by_field_name("constructor"))
        .or_else(|| node.child_by_field_name("type"))
        .or_else(|| node.child(0))?;
    let text = function.utf8_text(source.as_bytes()).ok()?;
    let cleaned = text.trim();
    if cleaned.is_empty() || cleaned.len() > 200 {
        return None;
    }
    let segments: Vec<&str> = cleaned
        .split(['.', ':'])
        .filter(|s| !s.is_empty())
        .collect();
    let name = match segments.len() {
        0 => return None,
        1 => segments[0].to_string(),
        _ => segments[segments.len() - 1].to_string(),
    };
    // Only identifier-shaped callees are resolvable.
    if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') && !name.is_empty() {
        Some(name)
    } else {
        None
    }
}

// ============================================================================
// Complexity metrics
// ============================================================================

/// Complexity metadata attached to classes and callables.
#[derive(Debug, Clone, Copy)]
pub struct ComplexityMetrics {
    pub cyclomatic: u32,
    pub cognitive: u32,
    pub nesting_depth: u32,
}

impl ComplexityMetrics {
    fn into_metadata(self) -> BTreeMap<String, serde_json::Value> {
        let mut map = BTreeMap::new();
        map.insert("cyclomatic_complexity".into(), serde_json::json!(self.cyclomatic));
        map.insert("cognitive_complexity".into(), serde_json::json!(self.cognitive));
        map.insert("nesting_depth".into(), serde_json::json!(self.nesting_depth));
        map.insert("complexity_rating".into(), serde_json::json!(self.rating()));
        map
    }

    /// A-F rating over cyclomatic complexity: thresholds 5/10/20/30/40.
    pub fn rating(&self) -> &'static str {
        match self.cyclomatic {
            0..=5 => "A",
            6..=10 => "B",
            11..=20 => "C",
            21..=30 => "D",
            31..=40 => "E",
            _ => "F",
        }
    }
}

/// Branch-point node kinds per language (if/loop/case/catch/ternary).
fn branch_kinds(language: Language) -> &'static [&'static str] {
    match language {
        Language::Python => &[
            "if_statement",
            "elif_clause",
            "for_statement",
            "while_statement",
            "except_clause",
            "conditional_expression",
            "boolean_operator",
        ],
        Language::JavaScript | Language::TypeScript | Language::Tsx => &[
            "if_statement",
            "for_statement",
            "for_in_statement",
            "while_statement",
            "do_statement",
            "switch_case",
            "catch_clause",
            "ternary_expression",
        ],
        Language::Rust => &[
            "if_expression",
            "while_expression",
            "for_expression",
            "loop_expression",
            "match_arm",
        ],
        Language::Go => &[
            "if_statement",
            "for_statement",
            "expression_case",
            "type_case",
            "select_statement",
        ],
        Language::Java => &[
            "if_statement",
            "for_statement",
            "enhanced_for_statement",
            "while_statement",
            "do_statement",
            "switch_block_statement_group",
            "catch_clause",
            "ternary_expression",
        ],
        Language::Kotlin => &[
            "if_expression",
            "for_statement",
            "while_statement",
            "do_while_statement",
            "when_entry",
            "catch_block",
        ],
    }
}

/// Boolean operator node kinds that add cyclomatic branch points.
fn boolean_kinds(language: Language) -> &'static [&'static str] {
    match language {
        Language::Python => &[], // covered by boolean_operator in branch kinds
        _ => &["binary_expression", "binary_operator"],
    }
}

/// Walk a subtree counting branch points (cyclomatic), nesting-weighted
/// branch points (cognitive) and maximum branch nesting depth.
pub fn complexity_metrics(node: Node<'_>, language: Language) -> ComplexityMetrics {
    let branches = branch_kinds(language);
    let booleans = boolean_kinds(language);
    let mut cyclomatic = 1u32;
    let mut cognitive = 0u32;
    let mut max_depth = 0u32;

    fn walk(
        node: Node<'_>,
        depth: u32,
        branches: &[&str],
        booleans: &[&str],
        cyclomatic: &mut u32,
        cognitive: &mut u32,
        max_depth: &mut u32,
    ) {
        let kind = node.kind();
        let mut next_depth = depth;
        if branches.contains(&kind) {
            *cyclomatic += 1;
            *cognitive += 1 + depth;
            next_depth = depth + 1;
            *max_depth = (*max_depth).max(next_depth);
        } else if booleans.contains(&kind) {
            // Count only logical operators, not arithmetic.
            if let Some(op) = node.child_by_field_name("operator") {
                let op_kind = op.kind();
                if op_kind == "&&" || op_kind == "||" || op_kind == "and" || op_kind == "or" {
                    *cyclomatic += 1;
                }
            }
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            walk(child, next_depth, branches, booleans, cyclomatic, cognitive, max_depth);
        }
    }

    walk(
        node,
        0,
        branches,
        booleans,
        &mut cyclomatic,
        &mut cognitive,
        &mut max_depth,
    );
    ComplexityMetrics {
        cyclomatic,
        cognitive,
        nesting_depth: max_depth,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_detection() {
        assert_eq!(Language::from_extension("py"), Some(Language::Python));
        assert_eq!(Language::from_extension("KT"), Some(Language::Kotlin));
        assert_eq!(Language::from_extension("tsx"), Some(Language::Tsx));
        assert_eq!(Language::from_extension("md"), None);
        assert_eq!(
            Language::from_path(Path::new("src/OrderService.java")),
            Some(Language::Java)
        );
    }

    #[test]
    fn test_complexity_rating_thresholds() {
        let m = |cyclomatic| ComplexityMetrics {
            cyclomatic,
            cognitive: 0,
            nesting_depth: 0,
        };
        assert_eq!(m(1).rating(), "A");
        assert_eq!(m(6).rating(), "B");
        assert_eq!(m(15).rating(), "C");
        assert_eq!(m(25).rating(), "D");
        assert_eq!(m(35).rating(), "E");
        assert_eq!(m(99).rating(), "F");
    }

    #[test]
    fn test_python_complexity_counts_branches() {
        let source = r#"
def route(order):
    if order.total > 100:
        for item in order.items:
            if item.fragile:
                return "special"
    elif order.express:
        return "express"
    return "standard"
"#;
        let parsed = SourceParser::parse(Language::Python, "route.py", source).unwrap();
        let func = parsed
            .objects
            .iter()
            .find(|o| o.name == "route")
            .expect("route extracted");
        let cyclomatic = func
            .metadata
            .get("cyclomatic_complexity")
            .and_then(|v| v.as_u64())
            .unwrap();
        // base 1 + if + for + nested if + elif = 5
        assert_eq!(cyclomatic, 5);
        let nesting = func
            .metadata
            .get("nesting_depth")
            .and_then(|v| v.as_u64())
            .unwrap();
        assert!(nesting >= 3);
    }
}
