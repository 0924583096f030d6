//! Error types for search and indexing.
//!
//! Each variant is a stable error kind with a one-sentence message; the CLI
//! maps kinds to exit codes (1 for user errors, 2 for operational
//! failures). Transient embedding/storage errors are retryable.

use thiserror::Error;

/// Errors across retrieval, indexing and store operations.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Invalid or incomplete configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A file failed to parse (indexing continues without it)
    #[error("parse error in {path}: {message}")]
    Parsing { path: String, message: String },

    /// Embedding provider failure
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Vector store failure
    #[error("storage error: {0}")]
    Storage(String),

    /// Unknown project, with closest known names
    #[error("project not found: '{name}'{}", format_suggestions(.suggestions))]
    ProjectNotFound {
        name: String,
        suggestions: Vec<String>,
    },

    /// The query was empty; never reaches the store
    #[error("empty query: provide at least one search term")]
    EmptyQuery,

    /// Search pipeline failure not attributable to a collaborator
    #[error("search failed: {0}")]
    Search(String),

    /// Indexing pipeline failure
    #[error("indexing failed: {0}")]
    Indexing(String),

    /// The operation was cancelled; no partial results
    #[error("operation cancelled")]
    Cancelled,

    /// A collaborator call exceeded its deadline after retries
    #[error("timeout after {attempts} attempts: {operation}")]
    Timeout { operation: String, attempts: u32 },

    /// Unsupported input (language, format, filter)
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl SearchError {
    /// User errors exit 1; operational failures exit 2.
    pub fn exit_code(&self) -> i32 {
        match self {
            SearchError::Configuration(_)
            | SearchError::ProjectNotFound { .. }
            | SearchError::EmptyQuery
            | SearchError::Unsupported(_) => 1,
            SearchError::Parsing { .. }
            | SearchError::Embedding(_)
            | SearchError::Storage(_)
            | SearchError::Search(_)
            | SearchError::Indexing(_)
            | SearchError::Cancelled
            | SearchError::Timeout { .. } => 2,
        }
    }

    /// Whether a retry with backoff may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SearchError::Embedding(_) | SearchError::Storage(_) | SearchError::Timeout { .. }
        )
    }

    /// Stable kind name for logs and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            SearchError::Configuration(_) => "Configuration",
            SearchError::Parsing { .. } => "Parsing",
            SearchError::Embedding(_) => "Embedding",
            SearchError::Storage(_) => "Storage",
            SearchError::ProjectNotFound { .. } => "ProjectNotFound",
            SearchError::EmptyQuery => "EmptyQuery",
            SearchError::Search(_) => "Search",
            SearchError::Indexing(_) => "Indexing",
            SearchError::Cancelled => "Cancelled",
            SearchError::Timeout { .. } => "Timeout",
            SearchError::Unsupported(_) => "Unsupported",
        }
    }
}

fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!("; did you mean: {}?", suggestions.join(", "))
    }
}

/// Result type for search operations.
pub type Result<T> = std::result::Result<T, SearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(SearchError::EmptyQuery.exit_code(), 1);
        assert_eq!(
            SearchError::ProjectNotFound { name: "x".into(), suggestions: vec![] }.exit_code(),
            1
        );
        assert_eq!(SearchError::Storage("down".into()).exit_code(), 2);
        assert_eq!(SearchError::Cancelled.exit_code(), 2);
    }

    #[test]
    fn test_retryable() {
        assert!(SearchError::Embedding("503".into()).is_retryable());
        assert!(SearchError::Storage("conn reset".into()).is_retryable());
        assert!(!SearchError::EmptyQuery.is_retryable());
        assert!(!SearchError::Cancelled.is_retryable());
    }

    #[test]
    fn test_suggestions_in_message() {
        let err = SearchError::ProjectNotFound {
            name: "shpo".into(),
            suggestions: vec!["shop".into(), "shop-api".into()],
        };
        let message = err.to_string();
        assert!(message.contains("shpo"));
        assert!(message.contains("did you mean: shop, shop-api?"));
    }
}
