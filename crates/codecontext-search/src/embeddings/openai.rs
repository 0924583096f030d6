//! OpenAI-compatible embedding provider.
//!
//! Talks to any `/v1/embeddings` endpoint (OpenAI, Azure OpenAI, Ollama,
//! vLLM). Texts are sorted by length before batching so similar-size
//! requests pack efficiently, and results are restored to input order
//! before they leave the provider. Instruction prefixes implement
//! asymmetric encoding.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use codecontext_config::OpenAISettings;

use super::provider::{EmbeddingProvider, InstructionType};
use crate::error::{Result, SearchError};
use crate::retry::{with_retry, RetryPolicy};

/// Request body for the `/v1/embeddings` endpoint.
#[derive(Debug, Serialize)]
struct EmbeddingsRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

/// OpenAI-compatible provider.
pub struct OpenAIProvider {
    client: Client,
    settings: OpenAISettings,
    api_key: Option<String>,
    batch_size: usize,
    retry: RetryPolicy,
    /// Detected from the first response.
    dimension: AtomicUsize,
}

impl OpenAIProvider {
    pub fn new(
        settings: OpenAISettings,
        batch_size: usize,
        timeout_secs: u64,
        max_retries: u32,
    ) -> Result<Self> {
        let api_key = settings
            .api_key_env
            .as_deref()
            .and_then(|variable| std::env::var(variable).ok());
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SearchError::Embedding(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            settings,
            api_key,
            batch_size: batch_size.max(1),
            retry: RetryPolicy::embedding(max_retries, timeout_secs),
            dimension: AtomicUsize::new(0),
        })
    }

    async fn request_batch(&self, input: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.settings.base_url.trim_end_matches('/'));
        let body = EmbeddingsRequest {
            model: self.settings.model.clone(),
            input,
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SearchError::Embedding(format!("request failed: {}", e)))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SearchError::Embedding(format!(
                "endpoint returned {}: {}",
                status,
                text.chars().take(200).collect::<String>()
            )));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Embedding(format!("invalid response: {}", e)))?;

        // The API echoes an index per item; honor it rather than assuming
        // response order.
        let mut vectors = vec![Vec::new(); body.input.len()];
        for item in parsed.data {
            if item.index < vectors.len() {
                vectors[item.index] = item.embedding;
            }
        }
        if vectors.iter().any(Vec::is_empty) {
            return Err(SearchError::Embedding(
                "endpoint returned fewer embeddings than inputs".to_string(),
            ));
        }
        Ok(vectors)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    async fn embed(&self, texts: Vec<String>, instruction: InstructionType) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let prefixed: Vec<String> = texts
            .iter()
            .map(|t| format!("{}{}", instruction.prefix(), t))
            .collect();

        // Sort by length for throughput; remember where each text came from.
        let mut order: Vec<usize> = (0..prefixed.len()).collect();
        order.sort_by_key(|&i| prefixed[i].len());

        let mut results: Vec<Vec<f32>> = vec![Vec::new(); prefixed.len()];
        for chunk in order.chunks(self.batch_size) {
            let input: Vec<String> = chunk.iter().map(|&i| prefixed[i].clone()).collect();
            debug!(batch = input.len(), "embedding batch");
            let vectors = with_retry(self.retry, "embed", || {
                self.request_batch(input.clone())
            })
            .await?;
            for (&original_index, vector) in chunk.iter().zip(vectors) {
                results[original_index] = vector;
            }
        }

        if let Some(first) = results.first() {
            self.dimension.store(first.len(), Ordering::Relaxed);
        }
        Ok(results)
    }

    fn dimension(&self) -> usize {
        match self.dimension.load(Ordering::Relaxed) {
            0 => 1536, // text-embedding-3-small, until detected
            n => n,
        }
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructs_without_key() {
        let settings = OpenAISettings {
            api_key_env: None,
            ..Default::default()
        };
        let provider = OpenAIProvider::new(settings, 32, 30, 3).unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.dimension(), 1536);
        assert_eq!(provider.batch_size(), 32);
    }

    #[test]
    fn test_length_sort_preserves_mapping() {
        // The order vector sorted by length must be a permutation.
        let texts = ["long long long text", "a", "medium text"];
        let mut order: Vec<usize> = (0..texts.len()).collect();
        order.sort_by_key(|&i| texts[i].len());
        assert_eq!(order, vec![1, 2, 0]);
        let mut restored = order.clone();
        restored.sort_unstable();
        assert_eq!(restored, vec![0, 1, 2]);
    }
}
