//! Code-aware tokenizer.
//!
//! Splits identifiers and prose into lowercase tokens, handling camelCase,
//! PascalCase, snake_case and kebab-case boundaries plus acronym runs
//! (`HTTPServer` → `http`, `server`). Results are memoized in a bounded LRU
//! keyed by the input string; identical inputs yield byte-identical token
//! sequences across processes.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;

/// Minimum token length kept after splitting.
const MIN_TOKEN_LEN: usize = 2;

/// Default memo capacity (entries, not bytes).
const DEFAULT_CACHE_CAPACITY: usize = 4096;

/// English + language-agnostic code stopwords dropped from every token stream.
const DEFAULT_STOPWORDS: &[&str] = &[
    "the", "is", "a", "an", "and", "or", "not", "of", "to", "in", "for", "on",
    "with", "as", "at", "by", "from", "this", "that", "these", "those", "it",
    "its", "be", "been", "are", "was", "were", "will", "would", "can", "could",
    "should", "do", "does", "did", "has", "have", "had", "but", "into", "than",
    "then", "also", "such", "via", "per", "each", "any", "all", "some", "our",
];

/// Tokenizer with memoization; cheap to clone (shared cache).
#[derive(Clone)]
pub struct Tokenizer {
    stopwords: Arc<HashSet<String>>,
    cache: Arc<Mutex<LruCache<String, Arc<Vec<String>>>>>,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            stopwords: Arc::new(DEFAULT_STOPWORDS.iter().map(|s| s.to_string()).collect()),
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Replace the stopword set.
    pub fn with_stopwords(mut self, stopwords: impl IntoIterator<Item = String>) -> Self {
        self.stopwords = Arc::new(stopwords.into_iter().map(|s| s.to_lowercase()).collect());
        self
    }

    /// Tokenize `text` into ordered lowercase tokens of length >= 2.
    pub fn tokenize(&self, text: &str) -> Arc<Vec<String>> {
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(tokens) = cache.get(text) {
                return Arc::clone(tokens);
            }
        }

        let tokens = Arc::new(self.split(text));

        if let Ok(mut cache) = self.cache.lock() {
            cache.put(text.to_string(), Arc::clone(&tokens));
        }
        tokens
    }

    /// Number of tokens `text` produces; used by the score-weight calculator.
    pub fn token_count(&self, text: &str) -> usize {
        self.tokenize(text).len()
    }

    fn split(&self, text: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        for fragment in text.split(|c: char| !c.is_ascii_alphanumeric()) {
            if fragment.is_empty() {
                continue;
            }
            for word in split_case_boundaries(fragment) {
                let lower = word.to_lowercase();
                if lower.len() >= MIN_TOKEN_LEN && !self.stopwords.contains(&lower) {
                    tokens.push(lower);
                }
            }
        }
        tokens
    }
}

/// Split one alphanumeric fragment at case and letter/digit boundaries.
///
/// `parseHTTPResponse` → `parse`, `HTTP`, `Response`; `sha256` → `sha`, `256`.
/// An acronym run directly followed by a digit splits into single letters
/// (which the length filter then drops), keeping versioned acronyms like
/// `V2` from polluting the vocabulary.
fn split_case_boundaries(fragment: &str) -> Vec<String> {
    let chars: Vec<char> = fragment.chars().collect();
    let mut words = Vec::new();
    let mut start = 0;

    for i in 1..chars.len() {
        let prev = chars[i - 1];
        let cur = chars[i];

        let boundary = (prev.is_lowercase() && cur.is_uppercase())
            || (prev.is_ascii_digit() != cur.is_ascii_digit())
            // End of an uppercase run entering a capitalized word: HTTPServer.
            || (prev.is_uppercase()
                && cur.is_lowercase()
                && i >= 2
                && chars[i - 2].is_uppercase());

        if boundary {
            let split_at = if prev.is_uppercase() && cur.is_lowercase() && i >= 2 {
                i - 1
            } else {
                i
            };
            if split_at > start {
                words.push(chars[start..split_at].iter().collect::<String>());
                start = split_at;
            }
        }
    }
    if start < chars.len() {
        words.push(chars[start..].iter().collect::<String>());
    }

    // Acronym run immediately followed by a digit word decomposes to letters.
    let mut out = Vec::with_capacity(words.len());
    for (i, word) in words.iter().enumerate() {
        let is_acronym = word.len() > 1 && word.chars().all(|c| c.is_uppercase());
        let next_is_digit = words
            .get(i + 1)
            .map(|w| w.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(false);
        if is_acronym && next_is_digit {
            out.extend(word.chars().map(|c| c.to_string()));
        } else {
            out.push(word.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(input: &str) -> Vec<String> {
        Tokenizer::new().tokenize(input).as_ref().clone()
    }

    #[test]
    fn test_snake_and_kebab_case() {
        assert_eq!(toks("payment_gateway"), vec!["payment", "gateway"]);
        assert_eq!(toks("order-flow"), vec!["order", "flow"]);
    }

    #[test]
    fn test_camel_and_pascal_case() {
        assert_eq!(toks("calculateShipping"), vec!["calculate", "shipping"]);
        assert_eq!(toks("OrderService"), vec!["order", "service"]);
    }

    #[test]
    fn test_acronym_boundary() {
        assert_eq!(toks("HTTPServer"), vec!["http", "server"]);
        assert_eq!(toks("parseHTTPResponse"), vec!["parse", "http", "response"]);
    }

    #[test]
    fn test_acronym_before_digit_decomposes() {
        // Letters fall below the length floor; the digits survive.
        assert_eq!(toks("SHA256"), vec!["256"]);
        assert_eq!(toks("sha256sum"), vec!["sha", "256", "sum"]);
    }

    #[test]
    fn test_stopwords_and_short_tokens_dropped() {
        assert_eq!(toks("the cost of a shipment"), vec!["cost", "shipment"]);
        assert_eq!(toks("x y z id"), vec!["id"]);
    }

    #[test]
    fn test_determinism_across_instances() {
        let a = Tokenizer::new();
        let b = Tokenizer::new();
        let input = "CustomerTier.calculateDiscount(order_total)";
        assert_eq!(a.tokenize(input), b.tokenize(input));
        // Cached and uncached paths agree.
        assert_eq!(a.tokenize(input), a.tokenize(input));
    }

    #[test]
    fn test_cache_bounded() {
        let t = Tokenizer::with_capacity(2);
        t.tokenize("one_token");
        t.tokenize("two_token");
        t.tokenize("three_token"); // evicts the oldest
        assert_eq!(t.tokenize("one_token").as_ref().clone(), vec!["one", "token"]);
    }

    #[test]
    fn test_custom_stopwords() {
        let t = Tokenizer::new().with_stopwords(vec!["order".to_string()]);
        assert_eq!(t.tokenize("order service").as_ref().clone(), vec!["service"]);
    }
}
