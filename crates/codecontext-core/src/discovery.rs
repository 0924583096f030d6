//! Project file discovery.
//!
//! Walks a project tree applying gitignore-style include/exclude patterns
//! (with negation), skips binaries and oversized files, and routes each
//! candidate to the parser that will handle it.

use std::fs;
use std::path::{Path, PathBuf};

use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::normalize_path;
use crate::parser::config_file::ConfigFormat;
use crate::parser::Language;

/// Errors during discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("project path does not exist: {0}")]
    RootNotFound(PathBuf),

    #[error("invalid glob pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// How a discovered file will be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Source(Language),
    Markdown,
    Config(ConfigFormat),
}

/// A file selected for indexing.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    /// Project-relative, forward-slash path.
    pub relative_path: String,
    pub kind: FileKind,
    pub size: u64,
}

/// Discovery settings; patterns are gitignore-style, `!` negates.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Extra include patterns; empty means everything routable.
    pub include_patterns: Vec<String>,
    /// Exclude patterns applied after includes.
    pub exclude_patterns: Vec<String>,
    /// Files larger than this are skipped.
    pub max_file_size: u64,
    pub follow_links: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            include_patterns: Vec::new(),
            exclude_patterns: vec![
                "**/node_modules/**".to_string(),
                "**/target/**".to_string(),
                "**/.git/**".to_string(),
                "**/dist/**".to_string(),
                "**/build/**".to_string(),
                "**/__pycache__/**".to_string(),
                "**/vendor/**".to_string(),
                "**/.venv/**".to_string(),
            ],
            max_file_size: 1024 * 1024,
            follow_links: false,
        }
    }
}

/// Summary of skipped files, reported alongside the run.
#[derive(Debug, Clone, Default)]
pub struct SkipCounts {
    pub unknown_type: usize,
    pub too_large: usize,
    pub binary: usize,
    pub unreadable: usize,
}

/// Walks a project root and yields the files to index.
pub struct FileDiscovery {
    config: DiscoveryConfig,
}

impl FileDiscovery {
    pub fn new(config: DiscoveryConfig) -> Self {
        Self { config }
    }

    /// Discover candidate files under `root`, sorted by relative path for
    /// deterministic downstream processing.
    pub fn discover(&self, root: &Path) -> Result<(Vec<DiscoveredFile>, SkipCounts), DiscoveryError> {
        let root = root
            .canonicalize()
            .map_err(|_| DiscoveryError::RootNotFound(root.to_path_buf()))?;

        let mut override_builder = OverrideBuilder::new(&root);
        for pattern in &self.config.include_patterns {
            override_builder
                .add(pattern)
                .map_err(|e| DiscoveryError::InvalidPattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
        }
        for pattern in &self.config.exclude_patterns {
            // Overrides are whitelists; a leading `!` turns one into an
            // exclusion, and a double negation re-includes.
            let negated = if let Some(stripped) = pattern.strip_prefix('!') {
                stripped.to_string()
            } else {
                format!("!{}", pattern)
            };
            override_builder
                .add(&negated)
                .map_err(|e| DiscoveryError::InvalidPattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
        }
        let overrides = override_builder
            .build()
            .map_err(|e| DiscoveryError::InvalidPattern {
                pattern: String::new(),
                message: e.to_string(),
            })?;

        let mut files = Vec::new();
        let mut skips = SkipCounts::default();

        let walker = WalkBuilder::new(&root)
            .follow_links(self.config.follow_links)
            .hidden(true)
            .git_ignore(true)
            .overrides(overrides)
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("discovery error: {}", e);
                    skips.unreadable += 1;
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let path = entry.path();
            let Some(kind) = route(path) else {
                skips.unknown_type += 1;
                continue;
            };
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            if size > self.config.max_file_size {
                debug!("skipping oversized file {:?} ({} bytes)", path, size);
                skips.too_large += 1;
                continue;
            }
            if is_binary(path) {
                skips.binary += 1;
                continue;
            }
            let relative = path
                .strip_prefix(&root)
                .unwrap_or(path)
                .to_string_lossy()
                .to_string();
            files.push(DiscoveredFile {
                path: path.to_path_buf(),
                relative_path: normalize_path(&relative),
                kind,
                size,
            });
        }

        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok((files, skips))
    }
}

/// Route a path to its parser by extension.
fn route(path: &Path) -> Option<FileKind> {
    if let Some(language) = Language::from_path(path) {
        return Some(FileKind::Source(language));
    }
    match path.extension().and_then(|e| e.to_str())?.to_lowercase().as_str() {
        "md" | "markdown" => Some(FileKind::Markdown),
        _ => ConfigFormat::from_path(path).map(FileKind::Config),
    }
}

/// Null byte in the head of the file marks it binary.
fn is_binary(path: &Path) -> bool {
    let Ok(bytes) = fs::read(path) else {
        return true;
    };
    bytes.iter().take(8192).any(|&b| b == 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_discover_routes_by_extension() {
        let temp = tempfile::TempDir::new().unwrap();
        write(temp.path(), "src/OrderService.java", "class OrderService {}");
        write(temp.path(), "docs/order-flow.md", "# Order Flow");
        write(temp.path(), "config/app.yaml", "a: 1");
        write(temp.path(), "LICENSE", "MIT");

        let discovery = FileDiscovery::new(DiscoveryConfig::default());
        let (files, skips) = discovery.discover(temp.path()).unwrap();

        assert_eq!(files.len(), 3);
        assert!(files
            .iter()
            .any(|f| f.relative_path == "src/OrderService.java"
                && f.kind == FileKind::Source(Language::Java)));
        assert!(files
            .iter()
            .any(|f| f.relative_path == "docs/order-flow.md" && f.kind == FileKind::Markdown));
        assert_eq!(skips.unknown_type, 1);
    }

    #[test]
    fn test_exclude_patterns() {
        let temp = tempfile::TempDir::new().unwrap();
        write(temp.path(), "src/main.py", "x = 1");
        write(temp.path(), "node_modules/pkg/index.js", "module.exports = 1;");

        let discovery = FileDiscovery::new(DiscoveryConfig::default());
        let (files, _) = discovery.discover(temp.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, "src/main.py");
    }

    #[test]
    fn test_include_patterns_narrow_the_set() {
        let temp = tempfile::TempDir::new().unwrap();
        write(temp.path(), "src/a.py", "a = 1");
        write(temp.path(), "scripts/b.py", "b = 2");

        let config = DiscoveryConfig {
            include_patterns: vec!["src/**".to_string()],
            ..DiscoveryConfig::default()
        };
        let (files, _) = FileDiscovery::new(config).discover(temp.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, "src/a.py");
    }

    #[test]
    fn test_size_cap_and_binary_skip() {
        let temp = tempfile::TempDir::new().unwrap();
        write(temp.path(), "big.py", &"x = 1\n".repeat(100));
        fs::write(temp.path().join("blob.py"), [0u8, 159, 146, 150]).unwrap();

        let config = DiscoveryConfig {
            max_file_size: 100,
            ..DiscoveryConfig::default()
        };
        let (files, skips) = FileDiscovery::new(config).discover(temp.path()).unwrap();
        assert!(files.is_empty());
        assert_eq!(skips.too_large, 1);
        assert_eq!(skips.binary, 1);
    }

    #[test]
    fn test_missing_root() {
        let discovery = FileDiscovery::new(DiscoveryConfig::default());
        assert!(matches!(
            discovery.discover(Path::new("/definitely/not/here")),
            Err(DiscoveryError::RootNotFound(_))
        ));
    }

    #[test]
    fn test_deterministic_ordering() {
        let temp = tempfile::TempDir::new().unwrap();
        write(temp.path(), "b.py", "b = 1");
        write(temp.path(), "a.py", "a = 1");
        let (files, _) = FileDiscovery::new(DiscoveryConfig::default())
            .discover(temp.path())
            .unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["a.py", "b.py"]);
    }
}
