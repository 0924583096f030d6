//! Project registry.
//!
//! Maps project directories to stable project ids and manages the
//! per-project collections behind them. Id detection priority: explicit
//! flag, git `remote.origin.url` last path segment, directory name, then a
//! hash of the absolute path. Ids are normalized to `[a-z0-9-]`, at most
//! 63 characters.

use std::path::Path;
use std::sync::Arc;
use std::sync::OnceLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::debug;

use codecontext_core::IndexState;

use crate::error::{Result, SearchError};
use crate::schema::collection_name;
use crate::store::VectorStore;

/// Maximum suggestions attached to a ProjectNotFound error.
const MAX_SUGGESTIONS: usize = 5;

/// A known project and its collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInfo {
    pub project_id: String,
    pub collection: String,
}

/// Status summary for one project.
#[derive(Debug, Clone)]
pub struct ProjectStatus {
    pub project_id: String,
    pub points: usize,
    pub state: Option<IndexState>,
}

/// Registry over the store's collections.
pub struct ProjectRegistry {
    store: Arc<dyn VectorStore>,
    prefix: String,
}

impl ProjectRegistry {
    pub fn new(store: Arc<dyn VectorStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    /// Collection name for a project id.
    pub fn collection(&self, project_id: &str) -> String {
        collection_name(&self.prefix, project_id)
    }

    /// All projects backed by a collection with our prefix.
    pub async fn list(&self) -> Result<Vec<ProjectInfo>> {
        let marker = format!("{}_", self.prefix);
        let mut projects: Vec<ProjectInfo> = self
            .store
            .list_collections()
            .await?
            .into_iter()
            .filter_map(|collection| {
                collection.strip_prefix(&marker).map(|id| ProjectInfo {
                    project_id: id.to_string(),
                    collection: collection.clone(),
                })
            })
            .collect();
        projects.sort_by(|a, b| a.project_id.cmp(&b.project_id));
        Ok(projects)
    }

    /// Verify a project exists; on miss, fail with closest-name suggestions.
    pub async fn resolve(&self, project_id: &str) -> Result<ProjectInfo> {
        let projects = self.list().await?;
        if let Some(project) = projects.iter().find(|p| p.project_id == project_id) {
            return Ok(project.clone());
        }
        let mut scored: Vec<(usize, String)> = projects
            .into_iter()
            .map(|p| (levenshtein(project_id, &p.project_id), p.project_id))
            .collect();
        scored.sort();
        Err(SearchError::ProjectNotFound {
            name: project_id.to_string(),
            suggestions: scored
                .into_iter()
                .take(MAX_SUGGESTIONS)
                .map(|(_, name)| name)
                .collect(),
        })
    }

    /// Point count and committed state for a project.
    pub async fn status(&self, project_id: &str) -> Result<ProjectStatus> {
        let project = self.resolve(project_id).await?;
        let points = self.store.count(&project.collection).await?;
        let state = self.store.get_state(&project.collection).await?;
        Ok(ProjectStatus {
            project_id: project.project_id,
            points,
            state,
        })
    }

    /// Drop the project's collection and everything in it.
    pub async fn delete(&self, project_id: &str) -> Result<()> {
        let project = self.resolve(project_id).await?;
        self.store.drop_collection(&project.collection).await
    }
}

/// Detect the project id for a directory.
pub fn detect_project_id(project_root: &Path, explicit: Option<&str>) -> String {
    if let Some(name) = explicit {
        return normalize_project_id(name);
    }
    if let Some(remote) = git_remote_name(project_root) {
        debug!("project id from git remote: {}", remote);
        return normalize_project_id(&remote);
    }
    if let Some(name) = project_root.file_name().and_then(|n| n.to_str()) {
        let normalized = normalize_project_id(name);
        if !normalized.is_empty() {
            return normalized;
        }
    }
    let absolute = project_root
        .canonicalize()
        .unwrap_or_else(|_| project_root.to_path_buf());
    let digest = Sha256::digest(absolute.to_string_lossy().as_bytes());
    let hex: String = digest.iter().take(8).map(|b| format!("{:02x}", b)).collect();
    format!("project-{}", hex)
}

/// Lowercase, non-alphanumeric to `-`, trimmed, max 63 chars.
pub fn normalize_project_id(raw: &str) -> String {
    let mut normalized: String = raw
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    while normalized.contains("--") {
        normalized = normalized.replace("--", "-");
    }
    let trimmed = normalized.trim_matches('-');
    trimmed.chars().take(63).collect()
}

/// Last path segment of `remote.origin.url` from `.git/config`.
fn git_remote_name(project_root: &Path) -> Option<String> {
    static ORIGIN: OnceLock<Regex> = OnceLock::new();
    let origin = ORIGIN.get_or_init(|| {
        Regex::new(r#"(?s)\[remote "origin"\].*?url\s*=\s*(\S+)"#).expect("origin regex")
    });

    let config = std::fs::read_to_string(project_root.join(".git").join("config")).ok()?;
    let url = origin.captures(&config)?.get(1)?.as_str();
    let last = url
        .trim_end_matches('/')
        .rsplit(['/', ':'])
        .next()?
        .trim_end_matches(".git");
    if last.is_empty() {
        None
    } else {
        Some(last.to_string())
    }
}

/// Classic dynamic-programming edit distance.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_project_id("My Shop/API"), "my-shop-api");
        assert_eq!(normalize_project_id("--weird__name--"), "weird-name");
        let long = "x".repeat(100);
        assert_eq!(normalize_project_id(&long).len(), 63);
    }

    #[test]
    fn test_detect_explicit_wins() {
        let temp = tempfile::TempDir::new().unwrap();
        assert_eq!(detect_project_id(temp.path(), Some("My Shop")), "my-shop");
    }

    #[test]
    fn test_detect_from_git_remote() {
        let temp = tempfile::TempDir::new().unwrap();
        let git_dir = temp.path().join(".git");
        std::fs::create_dir_all(&git_dir).unwrap();
        std::fs::write(
            git_dir.join("config"),
            "[core]\n\trepositoryformatversion = 0\n[remote \"origin\"]\n\turl = git@github.com:acme/Shop-API.git\n\tfetch = +refs/heads/*\n",
        )
        .unwrap();
        assert_eq!(detect_project_id(temp.path(), None), "shop-api");
    }

    #[test]
    fn test_detect_from_directory_name() {
        let temp = tempfile::TempDir::new().unwrap();
        let project = temp.path().join("Checkout_Service");
        std::fs::create_dir_all(&project).unwrap();
        assert_eq!(detect_project_id(&project, None), "checkout-service");
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("shop", "shop"), 0);
        assert_eq!(levenshtein("shop", "shpo"), 2);
        assert_eq!(levenshtein("", "abc"), 3);
    }

    #[tokio::test]
    async fn test_resolve_suggestions() {
        let store = Arc::new(MemoryStore::new());
        store.ensure_collection("codecontext_shop", 4).await.unwrap();
        store.ensure_collection("codecontext_shop-api", 4).await.unwrap();
        store.ensure_collection("other_thing", 4).await.unwrap();

        let registry = ProjectRegistry::new(store, "codecontext");
        let projects = registry.list().await.unwrap();
        assert_eq!(projects.len(), 2);

        let err = registry.resolve("shpo").await.unwrap_err();
        match err {
            SearchError::ProjectNotFound { suggestions, .. } => {
                assert_eq!(suggestions[0], "shop");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete_drops_collection() {
        let store = Arc::new(MemoryStore::new());
        store.ensure_collection("codecontext_shop", 4).await.unwrap();
        let registry = ProjectRegistry::new(store.clone(), "codecontext");
        registry.delete("shop").await.unwrap();
        assert!(!store.collection_exists("codecontext_shop").await.unwrap());
    }
}
