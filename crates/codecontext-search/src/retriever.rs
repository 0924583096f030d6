//! Five-stage retrieval pipeline.
//!
//! 1. Encode the query (dense via the embedding provider, sparse via BM25F).
//! 2. Hybrid RRF query against the store.
//! 3. One-hop personalized-PageRank expansion over stored relationships.
//! 4. Additive type/name boosts scaled by the pre-computed score weight.
//! 5. Per-file diversity filter with a protected head.
//!
//! An empty query fails with [`SearchError::EmptyQuery`] before any store
//! or embedder call. Cancellation is checked between stages and surfaces
//! as [`SearchError::Cancelled`] with no partial results.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use codecontext_config::SearchConfig;
use codecontext_core::{Bm25fConfig, Bm25fEncoder, Tokenizer};

use crate::embeddings::{EmbeddingProvider, InstructionType};
use crate::error::{Result, SearchError};
use crate::schema::{kinds, Fusion, PointPayload, SearchFilters, SearchHit};
use crate::store::VectorStore;

/// Per-relation-type expansion weights: structural and call edges carry
/// full weight, looser textual edges less.
fn relation_weight(relation: &str) -> f32 {
    match relation {
        "REFERENCES" | "REFERENCED_BY" | "MENTIONS" | "MENTIONED_IN" => 0.6,
        _ => 1.0,
    }
}

/// Additive boost per object type.
fn type_boost(payload: &PointPayload) -> f32 {
    if payload.kind == kinds::DOCUMENT {
        return if payload.object_type == "config_key" { 0.05 } else { 0.07 };
    }
    match payload.object_type.as_str() {
        "class" => 0.12,
        "method" | "function" => 0.10,
        "enum" => 0.08,
        "interface" => 0.06,
        "type" => 0.04,
        "field" => 0.02,
        _ => 0.0,
    }
}

/// Pipeline tuning; defaults mirror the shipped configuration.
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    pub graph_expansion: bool,
    /// Fraction of a seed's score propagated to each neighbor.
    pub graph_score_weight: f32,
    /// Expansion-added candidates below this normalized score are dropped.
    pub graph_ppr_threshold: f32,
    pub max_chunks_per_file: usize,
    pub diversity_preserve_top_n: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            graph_expansion: true,
            graph_score_weight: 0.3,
            graph_ppr_threshold: 0.4,
            max_chunks_per_file: 2,
            diversity_preserve_top_n: 1,
        }
    }
}

impl From<&SearchConfig> for RetrieverConfig {
    fn from(config: &SearchConfig) -> Self {
        Self {
            graph_expansion: config.graph_expansion,
            graph_score_weight: config.graph_score_weight,
            graph_ppr_threshold: config.graph_ppr_threshold,
            max_chunks_per_file: config.max_chunks_per_file,
            diversity_preserve_top_n: config.diversity_preserve_top_n,
        }
    }
}

/// A result with its pipeline scores.
#[derive(Debug, Clone)]
pub struct RankedResult {
    pub payload: PointPayload,
    /// Stage 2/3 score before boosting.
    pub base_score: f32,
    /// Final score after boosts and weight.
    pub score: f32,
}

/// Hybrid retriever over one project collection.
pub struct Retriever {
    store: Arc<dyn VectorStore>,
    provider: Arc<dyn EmbeddingProvider>,
    encoder: Bm25fEncoder,
    tokenizer: Tokenizer,
    config: RetrieverConfig,
}

impl Retriever {
    pub fn new(
        store: Arc<dyn VectorStore>,
        provider: Arc<dyn EmbeddingProvider>,
        bm25f: Bm25fConfig,
        config: RetrieverConfig,
    ) -> Self {
        let tokenizer = Tokenizer::new();
        Self {
            store,
            provider,
            encoder: Bm25fEncoder::new(bm25f, tokenizer.clone()),
            tokenizer,
            config,
        }
    }

    /// Run the full pipeline. Returns at most `limit` ranked results.
    pub async fn search(
        &self,
        collection: &str,
        query: &str,
        limit: usize,
        filters: &SearchFilters,
        cancel: &CancellationToken,
    ) -> Result<Vec<RankedResult>> {
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        let limit = limit.max(1);

        // Stage 1: query encoding.
        let dense = self
            .provider
            .embed(vec![query.to_string()], InstructionType::NL2CODE_QUERY)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SearchError::Embedding("provider returned no query vector".into()))?;
        let sparse = self.encoder.encode_query(query);
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        // Stage 2: hybrid RRF search.
        let hits = self
            .store
            .query_hybrid(collection, &dense, &sparse, limit, filters, Fusion::Rrf)
            .await?;
        debug!(candidates = hits.len(), "hybrid search complete");
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        // Stage 3: one-hop graph expansion.
        let candidates = if self.config.graph_expansion {
            self.expand(collection, hits, filters).await?
        } else {
            hits.into_iter()
                .map(|h| Candidate { payload: h.payload, score: h.score, expanded: false })
                .collect()
        };
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        // Stage 4: boosts and score weight.
        let query_tokens = self.tokenizer.tokenize(query);
        let mut ranked: Vec<RankedResult> = candidates
            .into_iter()
            .map(|c| {
                let boost = type_boost(&c.payload) + self.name_boost(&query_tokens, &c.payload);
                let weight = if c.payload.score_weight > 0.0 { c.payload.score_weight } else { 1.0 };
                RankedResult {
                    base_score: c.score,
                    score: c.score * (1.0 + boost) * weight,
                    payload: c.payload,
                }
            })
            .collect();

        // Stage 5: diversity filter.
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.payload.entity_id.cmp(&b.payload.entity_id)));
        let diversified = self.diversify(ranked);
        Ok(diversified.into_iter().take(limit).collect())
    }

    /// Propagate a fraction of each seed's score to its stored neighbors.
    ///
    /// Neighbors enter the candidate set once, accumulate contributions
    /// from every seed that touches them, and are pruned when their
    /// max-normalized score stays under the PPR threshold. Seeds are never
    /// pruned.
    async fn expand(
        &self,
        collection: &str,
        hits: Vec<SearchHit>,
        filters: &SearchFilters,
    ) -> Result<Vec<Candidate>> {
        let alpha = self.config.graph_score_weight;
        let seeds: std::collections::HashSet<String> =
            hits.iter().map(|h| h.payload.entity_id.clone()).collect();

        // Aggregate neighbor contributions (1 hop, deterministic order).
        let mut neighbor_scores: HashMap<String, f32> = HashMap::new();
        for hit in &hits {
            for relation in hit.payload.relationships() {
                if relation.target_id.is_empty() || seeds.contains(&relation.target_id) {
                    continue;
                }
                let contribution = hit.score * alpha * relation_weight(&relation.relation);
                *neighbor_scores.entry(relation.target_id.clone()).or_insert(0.0) += contribution;
            }
        }

        // Fetch neighbor payloads and prune below the normalized threshold.
        let ids: Vec<u64> = neighbor_scores
            .keys()
            .map(|id| codecontext_core::point_id(id))
            .collect();
        let neighbor_hits = self.store.get_points(collection, &ids).await?;
        debug!(neighbors = neighbor_hits.len(), "graph expansion fetched");

        // Threshold is applied to expansion-added candidates, normalized
        // against the strongest neighbor contribution; seeds are never
        // pruned.
        let max_score = neighbor_scores
            .values()
            .fold(0.0f32, |acc, &s| acc.max(s));

        let mut candidates: Vec<Candidate> = hits
            .into_iter()
            .map(|h| Candidate { payload: h.payload, score: h.score, expanded: false })
            .collect();

        if max_score > 0.0 {
            for hit in neighbor_hits {
                if !filters.accepts(&hit.payload) || hit.payload.kind == kinds::INDEX_STATE {
                    continue;
                }
                let Some(&score) = neighbor_scores.get(&hit.payload.entity_id) else {
                    continue;
                };
                if score / max_score < self.config.graph_ppr_threshold {
                    continue;
                }
                candidates.push(Candidate { payload: hit.payload, score, expanded: true });
            }
        }
        Ok(candidates)
    }

    /// 0.25 for an exact name-token match, 0.15 when the name tokens are a
    /// non-empty subset of the query tokens.
    fn name_boost(&self, query_tokens: &Arc<Vec<String>>, payload: &PointPayload) -> f32 {
        let name_tokens = self.tokenizer.tokenize(&payload.name);
        if name_tokens.is_empty() {
            return 0.0;
        }
        let query_set: std::collections::HashSet<&str> =
            query_tokens.iter().map(String::as_str).collect();
        let name_set: std::collections::HashSet<&str> =
            name_tokens.iter().map(String::as_str).collect();
        if name_set == query_set {
            0.25
        } else if name_set.is_subset(&query_set) {
            0.15
        } else {
            0.0
        }
    }

    /// Keep at most `max_chunks_per_file` results per file, preserving the
    /// protected head of the ranking.
    fn diversify(&self, ranked: Vec<RankedResult>) -> Vec<RankedResult> {
        let mut per_file: HashMap<String, usize> = HashMap::new();
        let mut kept = Vec::with_capacity(ranked.len());
        for (position, result) in ranked.into_iter().enumerate() {
            let count = per_file.entry(result.payload.file_path.clone()).or_insert(0);
            if position < self.config.diversity_preserve_top_n
                || *count < self.config.max_chunks_per_file
            {
                *count += 1;
                kept.push(result);
            }
        }
        kept
    }
}

/// Internal stage-3 candidate.
struct Candidate {
    payload: PointPayload,
    score: f32,
    #[allow(dead_code)]
    expanded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashProvider;
    use crate::schema::{IndexPoint, RelationSummary};
    use crate::store::MemoryStore;
    use codecontext_core::SparseVector;

    fn payload(entity_id: &str, name: &str, object_type: &str, file: &str) -> PointPayload {
        PointPayload {
            project_id: "test".into(),
            kind: kinds::CODE.into(),
            entity_id: entity_id.into(),
            name: name.into(),
            object_type: object_type.into(),
            language: "java".into(),
            file_path: file.into(),
            score_weight: 1.0,
            ..Default::default()
        }
    }

    async fn retriever_with_points(points: Vec<IndexPoint>) -> Retriever {
        let store = Arc::new(MemoryStore::new());
        store.ensure_collection("c", 64).await.unwrap();
        store.upsert("c", points).await.unwrap();
        let provider = Arc::new(HashProvider::new(64));
        Retriever::new(store, provider, Bm25fConfig::default(), RetrieverConfig::default())
    }

    fn encode(text: &str) -> (Vec<f32>, SparseVector) {
        let encoder = Bm25fEncoder::default();
        let sparse = encoder.encode_document(&[(codecontext_core::Field::Content, text)]);
        // Dense side via the same hashing scheme the provider uses.
        (vec![0.0; 64], sparse)
    }

    fn point(id: u64, entity_id: &str, name: &str, object_type: &str, file: &str, content: &str) -> IndexPoint {
        let (mut dense, sparse) = encode(content);
        // Give each point a distinguishable dense vector.
        dense[(id % 64) as usize] = 1.0;
        IndexPoint {
            id,
            dense,
            sparse,
            payload: PointPayload {
                content: content.into(),
                ..payload(entity_id, name, object_type, file)
            },
        }
    }

    #[tokio::test]
    async fn test_empty_query_rejected_before_store() {
        let retriever = retriever_with_points(Vec::new()).await;
        let err = retriever
            .search("missing-collection", "   ", 5, &SearchFilters::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        // Collection does not exist: a store call would have failed with
        // Storage, so EmptyQuery proves no store call happened.
        assert!(matches!(err, SearchError::EmptyQuery));
    }

    #[tokio::test]
    async fn test_lexical_match_ranks_first() {
        let retriever = retriever_with_points(vec![
            point(10, "a1", "calculateShipping", "function", "calculateShipping.js", "function calculateShipping(weight, zone) { return zone * weight; }"),
            point(11, "b2", "loginForm", "function", "login.js", "function loginForm(user) { return render(user); }"),
        ])
        .await;
        let results = retriever
            .search("c", "shipping cost calculation logic", 5, &SearchFilters::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].payload.name, "calculateShipping");
    }

    #[tokio::test]
    async fn test_boost_monotonicity() {
        // For fixed boosts and weight, final score is monotone in base.
        let p = payload("x", "OrderService", "class", "a.java");
        let score = |base: f32| base * (1.0 + type_boost(&p)) * p.score_weight;
        assert!(score(0.03) > score(0.02));
        assert!(score(0.02) > score(0.01));
    }

    #[tokio::test]
    async fn test_diversity_bound() {
        let mut points = Vec::new();
        for i in 0..6u64 {
            points.push(point(
                20 + i,
                &format!("e{}", i),
                "chunk",
                "paragraph",
                "docs/big.md",
                "payment gateway integration details and retries",
            ));
        }
        points.push(point(40, "other", "PaymentGateway", "class", "gateway.py", "class PaymentGateway handles payment gateway calls"));
        let retriever = retriever_with_points(points).await;

        let results = retriever
            .search("c", "payment gateway", 10, &SearchFilters::default(), &CancellationToken::new())
            .await
            .unwrap();
        let from_big: usize = results
            .iter()
            .filter(|r| r.payload.file_path == "docs/big.md")
            .count();
        // Cap of 2 beyond the protected head of 1.
        assert!(from_big <= 3, "diversity bound violated: {}", from_big);
    }

    #[tokio::test]
    async fn test_graph_expansion_pulls_neighbor() {
        // Seed strongly matches; neighbor shares no query tokens but is
        // linked via CALLS and should enter the candidate set.
        let neighbor = point(
            31,
            "00000000000000b7",
            "applyDiscount",
            "function",
            "discount.js",
            "function applyDiscount(total) { return total; }",
        );
        let mut seed = point(
            30,
            "00000000000000a5",
            "checkout",
            "function",
            "checkout.js",
            "function checkout(cart) { return applyDiscount(total(cart)); }",
        );
        seed.payload.outgoing_relationships = vec![RelationSummary {
            relation: "CALLS".into(),
            name: "applyDiscount".into(),
            kind: "function".into(),
            file: "discount.js".into(),
            line: 1,
            target_id: neighbor.payload.entity_id.clone(),
        }];
        // Point ids must match entity ids for get_points to find them.
        let seed_id = codecontext_core::point_id(&seed.payload.entity_id);
        let neighbor_id = codecontext_core::point_id(&neighbor.payload.entity_id);
        let mut seed = seed;
        let mut neighbor = neighbor;
        seed.id = seed_id;
        neighbor.id = neighbor_id;

        let retriever = retriever_with_points(vec![seed, neighbor]).await;
        let results = retriever
            .search("c", "checkout cart", 5, &SearchFilters::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(results.iter().any(|r| r.payload.name == "applyDiscount"));
    }

    #[tokio::test]
    async fn test_cancellation_surfaces() {
        let retriever = retriever_with_points(Vec::new()).await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = retriever
            .search("c", "anything", 5, &SearchFilters::default(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Cancelled | SearchError::Storage(_)));
    }

    #[tokio::test]
    async fn test_name_boost_exact_match_outranks() {
        let retriever = retriever_with_points(vec![
            point(50, "n1", "PaymentGateway", "class", "gateway.py", "gateway logic for charges"),
            point(51, "n2", "GatewayConfig", "class", "config.py", "payment gateway configuration data"),
        ])
        .await;
        let results = retriever
            .search("c", "payment gateway", 5, &SearchFilters::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(results[0].payload.name, "PaymentGateway");
    }
}
