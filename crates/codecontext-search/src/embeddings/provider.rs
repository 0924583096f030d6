//! Embedding provider contract.
//!
//! Providers turn batches of text into dense vectors. Queries and passages
//! are encoded asymmetrically via a closed set of instruction types;
//! providers must preserve input order even when they batch or sort by
//! length internally.

use async_trait::async_trait;

use crate::error::Result;

/// Closed set of instruction types for asymmetric encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum InstructionType {
    NL2CODE_QUERY,
    NL2CODE_PASSAGE,
    CODE2CODE_QUERY,
    CODE2CODE_PASSAGE,
    QA_QUERY,
    QA_PASSAGE,
    DOCUMENT_PASSAGE,
}

impl InstructionType {
    /// Instruction prefix prepended by instruction-conditioned providers.
    pub fn prefix(&self) -> &'static str {
        match self {
            InstructionType::NL2CODE_QUERY => {
                "Instruct: Given a natural language query, retrieve relevant code.\nQuery: "
            }
            InstructionType::NL2CODE_PASSAGE => "Passage: ",
            InstructionType::CODE2CODE_QUERY => {
                "Instruct: Given a code snippet, retrieve similar code.\nQuery: "
            }
            InstructionType::CODE2CODE_PASSAGE => "Passage: ",
            InstructionType::QA_QUERY => {
                "Instruct: Given a question, retrieve passages that answer it.\nQuery: "
            }
            InstructionType::QA_PASSAGE => "Passage: ",
            InstructionType::DOCUMENT_PASSAGE => "Document: ",
        }
    }

    /// Whether this instruction encodes a query (vs a stored passage).
    pub fn is_query(&self) -> bool {
        matches!(
            self,
            InstructionType::NL2CODE_QUERY
                | InstructionType::CODE2CODE_QUERY
                | InstructionType::QA_QUERY
        )
    }
}

/// Batch text-to-vector contract.
///
/// # Guarantees required from implementations
///
/// - `embed` output order matches input order.
/// - Every vector has exactly `dimension()` components.
/// - `embed` on an empty batch returns an empty vec without I/O.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed `texts` under `instruction`, preserving order.
    async fn embed(&self, texts: Vec<String>, instruction: InstructionType) -> Result<Vec<Vec<f32>>>;

    /// Output dimensionality.
    fn dimension(&self) -> usize;

    /// Optimal batch size for this provider.
    fn batch_size(&self) -> usize;

    /// Release any held resources. Idempotent.
    async fn close(&self) -> Result<()>;

    /// Short provider name for logs and status output.
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_passage_asymmetry() {
        assert!(InstructionType::NL2CODE_QUERY.is_query());
        assert!(!InstructionType::NL2CODE_PASSAGE.is_query());
        assert_ne!(
            InstructionType::NL2CODE_QUERY.prefix(),
            InstructionType::NL2CODE_PASSAGE.prefix()
        );
    }

    #[test]
    fn test_object_safety() {
        fn _assert(_: &dyn EmbeddingProvider) {}
    }
}
