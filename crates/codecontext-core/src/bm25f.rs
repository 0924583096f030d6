//! BM25F sparse encoder.
//!
//! Encodes field-weighted documents and queries into sparse vectors whose
//! indices are stable 64-bit token hashes ([`crate::model::token_index`]),
//! so encoder and vector store agree without sharing a vocabulary.
//!
//! Documents get the full BM25F term-frequency saturation and length
//! normalization; queries are encoded binary (weight 1.0 per unique token).
//! IDF-like behavior comes from the store's inner product against the
//! weighted document vectors and from RRF rank bucketing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::token_index;
use crate::tokenizer::Tokenizer;

/// A document field with its own match weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    QualifiedName,
    Signature,
    Docstring,
    Content,
    Filename,
    FilePath,
}

/// Per-field weights; higher raises that field's contribution to matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldWeights {
    pub name: f32,
    pub qualified_name: f32,
    pub signature: f32,
    pub docstring: f32,
    pub content: f32,
    pub filename: f32,
    pub file_path: f32,
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self {
            name: 15.0,
            qualified_name: 12.0,
            signature: 10.0,
            docstring: 8.0,
            content: 6.0,
            filename: 4.0,
            file_path: 2.0,
        }
    }
}

impl FieldWeights {
    fn weight(&self, field: Field) -> f32 {
        match field {
            Field::Name => self.name,
            Field::QualifiedName => self.qualified_name,
            Field::Signature => self.signature,
            Field::Docstring => self.docstring,
            Field::Content => self.content,
            Field::Filename => self.filename,
            Field::FilePath => self.file_path,
        }
    }
}

/// BM25F parameters. `avg_dl` is a fixed scalar, not re-estimated per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bm25fConfig {
    /// Term-frequency saturation.
    pub k1: f32,
    /// Document-length normalization strength.
    pub b: f32,
    /// Corpus-average document length.
    pub avg_dl: f32,
    pub weights: FieldWeights,
}

impl Default for Bm25fConfig {
    fn default() -> Self {
        Self {
            k1: 1.2,
            b: 0.75,
            avg_dl: 100.0,
            weights: FieldWeights::default(),
        }
    }
}

/// Sparse vector: parallel index/value arrays, indices strictly ascending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u64>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Inner product with another sparse vector (merge join on indices).
    pub fn dot(&self, other: &SparseVector) -> f32 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0;
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += self.values[i] * other.values[j];
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }

    fn from_map(map: BTreeMap<u64, f32>) -> Self {
        let mut indices = Vec::with_capacity(map.len());
        let mut values = Vec::with_capacity(map.len());
        for (idx, value) in map {
            indices.push(idx);
            values.push(value);
        }
        Self { indices, values }
    }
}

/// Field-weighted BM25F encoder over the code-aware tokenizer.
#[derive(Clone)]
pub struct Bm25fEncoder {
    config: Bm25fConfig,
    tokenizer: Tokenizer,
}

impl Default for Bm25fEncoder {
    fn default() -> Self {
        Self::new(Bm25fConfig::default(), Tokenizer::new())
    }
}

impl Bm25fEncoder {
    pub fn new(config: Bm25fConfig, tokenizer: Tokenizer) -> Self {
        Self { config, tokenizer }
    }

    pub fn config(&self) -> &Bm25fConfig {
        &self.config
    }

    /// Encode a document given its populated fields.
    ///
    /// For token `t` in field `F` with weight `w`:
    /// `w * tf * (k1 + 1) / (tf + k1 * (1 - b + b * |F| / avg_dl))`,
    /// summed across fields per hashed index.
    pub fn encode_document(&self, fields: &[(Field, &str)]) -> SparseVector {
        let Bm25fConfig { k1, b, avg_dl, ref weights } = self.config;
        let mut accum: BTreeMap<u64, f32> = BTreeMap::new();

        for &(field, text) in fields {
            if text.is_empty() {
                continue;
            }
            let tokens = self.tokenizer.tokenize(text);
            if tokens.is_empty() {
                continue;
            }
            let field_len = tokens.len() as f32;
            let norm = k1 * (1.0 - b + b * field_len / avg_dl);
            let weight = weights.weight(field);

            let mut tf: BTreeMap<&str, f32> = BTreeMap::new();
            for token in tokens.iter() {
                *tf.entry(token.as_str()).or_insert(0.0) += 1.0;
            }
            for (token, freq) in tf {
                let contribution = weight * (freq * (k1 + 1.0)) / (freq + norm);
                *accum.entry(token_index(token)).or_insert(0.0) += contribution;
            }
        }
        SparseVector::from_map(accum)
    }

    /// Encode a query: weight 1.0 per unique token, no IDF.
    pub fn encode_query(&self, query: &str) -> SparseVector {
        let mut map = BTreeMap::new();
        for token in self.tokenizer.tokenize(query).iter() {
            map.insert(token_index(token), 1.0);
        }
        SparseVector::from_map(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_encoding_is_binary() {
        let enc = Bm25fEncoder::default();
        let v = enc.encode_query("payment payment gateway");
        assert_eq!(v.len(), 2);
        assert!(v.values.iter().all(|&w| (w - 1.0).abs() < f32::EPSILON));
    }

    #[test]
    fn test_document_field_weighting() {
        let enc = Bm25fEncoder::default();
        let in_name = enc.encode_document(&[(Field::Name, "shipping")]);
        let in_content = enc.encode_document(&[(Field::Content, "shipping")]);
        assert_eq!(in_name.indices, in_content.indices);
        // name weight (15) dominates content weight (6) at equal tf.
        assert!(in_name.values[0] > in_content.values[0]);
    }

    #[test]
    fn test_term_frequency_saturates() {
        let enc = Bm25fEncoder::default();
        let cfg = enc.config().clone();
        // Repeating a term raises its value with diminishing returns,
        // bounded by w * (k1 + 1).
        let once = enc.encode_document(&[(Field::Content, "retry")]);
        let five = enc.encode_document(&[(Field::Content, "retry retry retry retry retry")]);
        assert!(five.values[0] > once.values[0]);
        assert!(five.values[0] < cfg.weights.content * (cfg.k1 + 1.0));
    }

    #[test]
    fn test_prefix_values_dominate_full_document() {
        // Saturation law: adding tokens to a field never raises the
        // per-dimension value of tokens already present exactly once.
        let enc = Bm25fEncoder::default();
        let prefix = enc.encode_document(&[(Field::Content, "order service handles payment")]);
        let full = enc.encode_document(&[(
            Field::Content,
            "order service handles payment using gateway retries and timeout logic",
        )]);
        let idx = crate::model::token_index("order");
        let at = |v: &SparseVector| {
            v.indices
                .iter()
                .position(|&i| i == idx)
                .map(|p| v.values[p])
                .unwrap_or(0.0)
        };
        assert!(at(&full) <= at(&prefix));
    }

    #[test]
    fn test_fields_accumulate() {
        let enc = Bm25fEncoder::default();
        let both = enc.encode_document(&[
            (Field::Name, "discount"),
            (Field::Content, "discount"),
        ]);
        let name_only = enc.encode_document(&[(Field::Name, "discount")]);
        assert!(both.values[0] > name_only.values[0]);
    }

    #[test]
    fn test_dot_product_merge_join() {
        let a = SparseVector { indices: vec![1, 3, 7], values: vec![1.0, 2.0, 3.0] };
        let b = SparseVector { indices: vec![3, 7, 9], values: vec![5.0, 1.0, 4.0] };
        assert!((a.dot(&b) - 13.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_indices_strictly_ascending() {
        let enc = Bm25fEncoder::default();
        let v = enc.encode_document(&[(Field::Content, "alpha beta gamma delta epsilon")]);
        assert!(v.indices.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_empty_input() {
        let enc = Bm25fEncoder::default();
        assert!(enc.encode_query("").is_empty());
        assert!(enc.encode_document(&[(Field::Content, "")]).is_empty());
    }
}
