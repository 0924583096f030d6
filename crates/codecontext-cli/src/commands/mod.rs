//! CLI command implementations.

pub mod index;
pub mod projects;
pub mod search;
pub mod status;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use codecontext_config::{ConfigLoader, ContextConfig};
use codecontext_search::{
    create_provider, create_store, detect_project_id, EmbeddingProvider, ProjectRegistry,
    Result, SearchError, VectorStore,
};

use crate::GlobalOptions;

/// Everything a command needs, built once from the merged configuration.
pub struct AppContext {
    pub config: ContextConfig,
    pub store: Arc<dyn VectorStore>,
    pub provider: Arc<dyn EmbeddingProvider>,
}

impl AppContext {
    /// Load config for `project_root` and build the store and provider.
    pub fn build(global: &GlobalOptions, project_root: &Path) -> Result<Self> {
        let loader = ConfigLoader::new();
        let config = loader
            .load(project_root, Some(&global.to_config_overrides()))
            .map_err(|e| SearchError::Configuration(e.to_string()))?;
        config
            .validate()
            .map_err(|e| SearchError::Configuration(e.to_string()))?;

        let store = create_store(&config.storage)?;
        let provider = create_provider(&config.embedding)?;
        Ok(Self {
            config,
            store,
            provider,
        })
    }

    pub fn registry(&self) -> ProjectRegistry {
        ProjectRegistry::new(self.store.clone(), self.config.storage.collection_prefix.clone())
    }

    /// Collection name for a project id.
    pub fn collection(&self, project_id: &str) -> String {
        codecontext_search::collection_name(&self.config.storage.collection_prefix, project_id)
    }
}

/// Project id from the explicit flag or detection on `project_root`.
pub fn project_id(global: &GlobalOptions, project_root: &Path) -> String {
    detect_project_id(project_root, global.project.as_deref())
}

/// Canonicalized project root from an optional positional path.
pub fn resolve_root(path: Option<PathBuf>) -> Result<PathBuf> {
    let root = path.unwrap_or_else(crate::default_path);
    root.canonicalize()
        .map_err(|_| SearchError::Configuration(format!("path does not exist: {}", root.display())))
}
