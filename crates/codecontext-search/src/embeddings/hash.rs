//! Deterministic feature-hashing embedding provider.
//!
//! Buckets code-aware tokens into a fixed-dimension vector by stable token
//! hash and L2-normalizes. No network, no model weights: identical text
//! yields identical vectors on every machine, which makes this the default
//! for air-gapped runs and the test suite. Lexically close texts land close
//! in the space, so hybrid ranking still behaves sensibly.

use async_trait::async_trait;

use codecontext_core::{token_index, Tokenizer};

use super::provider::{EmbeddingProvider, InstructionType};
use crate::error::Result;

/// Feature-hashing provider.
pub struct HashProvider {
    dimension: usize,
    batch_size: usize,
    tokenizer: Tokenizer,
}

impl HashProvider {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(8),
            batch_size: 256,
            tokenizer: Tokenizer::new(),
        }
    }

    fn encode(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let tokens = self.tokenizer.tokenize(text);
        for token in tokens.iter() {
            let index = (token_index(token) as usize) % self.dimension;
            // Sign from a second hash bit decorrelates colliding tokens.
            let sign = if token_index(token).count_ones() % 2 == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashProvider {
    async fn embed(&self, texts: Vec<String>, _instruction: InstructionType) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.encode(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "hash"
    }
}
