//! Embedding providers.
//!
//! The provider set is closed and registered in a static factory table; no
//! runtime plugin loading. `openai` talks to any OpenAI-compatible HTTP
//! endpoint, `hash` is a deterministic offline fallback.

mod hash;
mod openai;
mod provider;

pub use hash::HashProvider;
pub use openai::OpenAIProvider;
pub use provider::{EmbeddingProvider, InstructionType};

use std::sync::Arc;

use codecontext_config::{EmbeddingConfig, EmbeddingProviderKind};

use crate::error::{Result, SearchError};

type ProviderCtor = fn(&EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>>;

/// Static registry of provider constructors, checked at composition time.
static PROVIDERS: &[(EmbeddingProviderKind, ProviderCtor)] = &[
    (EmbeddingProviderKind::Hash, build_hash),
    (EmbeddingProviderKind::Openai, build_openai),
];

fn build_hash(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    Ok(Arc::new(HashProvider::new(config.hash.dimension)))
}

fn build_openai(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let settings = config.openai.clone().ok_or_else(|| {
        SearchError::Configuration(
            "embedding.provider is 'openai' but [embedding.openai] is missing".to_string(),
        )
    })?;
    Ok(Arc::new(OpenAIProvider::new(
        settings,
        config.batch_size,
        config.timeout_secs,
        config.max_retries,
    )?))
}

/// Build the configured embedding provider.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    PROVIDERS
        .iter()
        .find(|(kind, _)| *kind == config.provider)
        .map(|(_, ctor)| ctor(config))
        .unwrap_or_else(|| {
            Err(SearchError::Configuration(format!(
                "no embedding provider registered for '{}'",
                config.provider
            )))
        })
}
