//! CodeContext configuration management.
//!
//! Configuration is resolved in layers, later layers overriding earlier:
//! 1. Built-in defaults
//! 2. User global config: `~/.codecontext/config.toml`
//! 3. Project config: `<project>/.codecontext.toml` or `.codecontext.yaml`
//! 4. Environment variables: `CODECONTEXT_<SECTION>__<KEY>` (double
//!    underscores nest, e.g. `CODECONTEXT_EMBEDDING__OPENAI__BASE_URL`)
//! 5. CLI overrides via [`ConfigOverrides`]

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration, fully merged from all sources.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ContextConfig {
    /// Vector store connection
    pub storage: StorageConfig,

    /// Embedding provider selection and settings
    pub embedding: EmbeddingConfig,

    /// Indexing pipeline settings
    pub indexing: IndexingConfig,

    /// Retrieval settings
    pub search: SearchConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Vector store backend selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackendKind {
    /// Qdrant server (default)
    #[default]
    Qdrant,
    /// In-process store; data lives only for the process lifetime
    Memory,
}

impl std::fmt::Display for StoreBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Qdrant => write!(f, "qdrant"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// Vector store (Qdrant) configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Which backend to use
    pub backend: StoreBackendKind,

    /// Qdrant server URL
    pub url: String,

    /// API key for authentication (optional)
    pub api_key: Option<String>,

    /// Collection name prefix; collections are `<prefix>_<project_id>`
    pub collection_prefix: String,

    /// Per-call timeout in seconds
    pub timeout_secs: u64,

    /// Retry attempts for transient store failures
    pub max_retries: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackendKind::default(),
            url: "http://localhost:6334".to_string(),
            api_key: None,
            collection_prefix: "codecontext".to_string(),
            timeout_secs: 10,
            max_retries: 3,
        }
    }
}

/// Embedding provider selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingProviderKind {
    /// OpenAI-compatible HTTP endpoint
    Openai,
    /// Deterministic offline feature-hashing provider (default; no network)
    #[default]
    Hash,
}

impl std::fmt::Display for EmbeddingProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Openai => write!(f, "openai"),
            Self::Hash => write!(f, "hash"),
        }
    }
}

impl std::str::FromStr for EmbeddingProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::Openai),
            "hash" => Ok(Self::Hash),
            _ => Err(ConfigError::Validation(format!(
                "unknown embedding provider: '{}'. Valid values: openai, hash",
                s
            ))),
        }
    }
}

/// Embedding configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Which provider generates dense vectors
    pub provider: EmbeddingProviderKind,

    /// Texts per embedding request
    pub batch_size: usize,

    /// Per-call timeout in seconds
    pub timeout_secs: u64,

    /// Retry attempts for transient embedding failures
    pub max_retries: u32,

    /// OpenAI-compatible settings (required when provider = "openai")
    pub openai: Option<OpenAISettings>,

    /// Hash provider settings
    pub hash: HashSettings,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::default(),
            batch_size: 32,
            timeout_secs: 30,
            max_retries: 3,
            openai: None,
            hash: HashSettings::default(),
        }
    }
}

impl EmbeddingConfig {
    /// Validate that the selected provider has the settings it needs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.provider {
            EmbeddingProviderKind::Hash => Ok(()),
            EmbeddingProviderKind::Openai => {
                let Some(settings) = &self.openai else {
                    return Err(ConfigError::Validation(
                        "embedding.provider is 'openai' but [embedding.openai] section is missing"
                            .to_string(),
                    ));
                };
                if settings.base_url.is_empty() {
                    return Err(ConfigError::Validation(
                        "embedding.openai.base_url is required".to_string(),
                    ));
                }
                if settings.model.is_empty() {
                    return Err(ConfigError::Validation(
                        "embedding.openai.model is required".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// OpenAI-compatible provider settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpenAISettings {
    /// API base URL (e.g. "https://api.openai.com/v1")
    pub base_url: String,

    /// Environment variable holding the API key
    pub api_key_env: Option<String>,

    /// Embedding model name
    pub model: String,
}

impl Default for OpenAISettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: Some("CODECONTEXT_OPENAI_API_KEY".to_string()),
            model: "text-embedding-3-small".to_string(),
        }
    }
}

/// Hash provider settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HashSettings {
    /// Output dimension of the hashed embedding
    pub dimension: usize,
}

impl Default for HashSettings {
    fn default() -> Self {
        Self { dimension: 384 }
    }
}

/// Indexing pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexingConfig {
    /// Extra include patterns (gitignore-style)
    pub include_patterns: Vec<String>,

    /// Exclude patterns (gitignore-style, `!` negates)
    pub exclude_patterns: Vec<String>,

    /// Maximum file size to index, in KB
    pub max_file_size_kb: u64,

    /// Parser worker count (0 = number of cores)
    pub parallel_workers: usize,

    /// Document chunk sizing
    pub max_chunk_size: usize,
    pub min_chunk_size: usize,
    pub chunk_overlap_words: usize,
}

impl Default for IndexingConfig {
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
            max_file_size_kb: 1024,
            parallel_workers: 0,
            max_chunk_size: 1200,
            min_chunk_size: 60,
            chunk_overlap_words: 12,
        }
    }
}

/// Retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    /// Default result count
    pub limit: usize,

    /// Enable 1-hop graph expansion
    pub graph_expansion: bool,

    /// Fraction of a seed's score propagated to neighbors
    pub graph_score_weight: f32,

    /// Expanded candidates below this normalized score are discarded
    pub graph_ppr_threshold: f32,

    /// Per-file cap in the final ranking
    pub max_chunks_per_file: usize,

    /// Head of the ranking exempt from the per-file cap
    pub diversity_preserve_top_n: usize,

    /// Dense prefetch multiplier for RRF
    pub prefetch_dense: f32,

    /// Sparse prefetch multiplier for RRF
    pub prefetch_sparse: f32,

    /// RRF rank constant
    pub rrf_k: u32,

    /// BM25F term-frequency saturation
    pub bm25_k1: f32,

    /// BM25F length normalization strength
    pub bm25_b: f32,

    /// BM25F fixed corpus-average document length
    pub bm25_avg_dl: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            graph_expansion: true,
            graph_score_weight: 0.3,
            graph_ppr_threshold: 0.4,
            max_chunks_per_file: 2,
            diversity_preserve_top_n: 1,
            prefetch_dense: 7.0,
            prefetch_sparse: 3.0,
            rrf_k: 60,
            bm25_k1: 1.2,
            bm25_b: 0.75,
            bm25_avg_dl: 100.0,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::default() }
    }
}

/// Log output format.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// CLI overrides applied on top of every file/env layer.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override vector store URL
    pub store_url: Option<String>,

    /// Override embedding provider
    pub embedding_provider: Option<EmbeddingProviderKind>,

    /// Override log level
    pub log_level: Option<String>,

    /// Override parser worker count
    pub parallel_workers: Option<usize>,
}

impl ContextConfig {
    /// Apply CLI overrides to this configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref url) = overrides.store_url {
            self.storage.url = url.clone();
        }
        if let Some(provider) = overrides.embedding_provider {
            self.embedding.provider = provider;
        }
        if let Some(ref level) = overrides.log_level {
            self.logging.level = level.clone();
        }
        if let Some(workers) = overrides.parallel_workers {
            self.indexing.parallel_workers = workers;
        }
    }

    /// Validate the merged configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.embedding.validate()?;
        if self.search.max_chunks_per_file == 0 {
            return Err(ConfigError::Validation(
                "search.max_chunks_per_file must be at least 1".to_string(),
            ));
        }
        if self.search.prefetch_dense <= 0.0 || self.search.prefetch_sparse <= 0.0 {
            return Err(ConfigError::Validation(
                "search prefetch multipliers must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Maximum file size in bytes for discovery.
    pub fn max_file_size(&self) -> u64 {
        self.indexing.max_file_size_kb * 1024
    }
}

/// Project config file candidates, in priority order.
pub fn project_config_candidates(project_root: &std::path::Path) -> Vec<PathBuf> {
    vec![
        project_root.join(".codecontext.toml"),
        project_root.join(".codecontext.yaml"),
    ]
}
