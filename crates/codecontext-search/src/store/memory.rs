//! In-process vector store.
//!
//! Implements the full [`VectorStore`] contract (named dense/sparse
//! vectors, RRF fusion with the standard prefetch multipliers, payload
//! filters and the distinguished state point) against process-local maps.
//! Backs the test suite and throwaway local runs; data does not survive
//! the process.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use codecontext_core::{IndexState, SparseVector};

use super::{VectorStore, PREFETCH_DENSE, PREFETCH_SPARSE, RRF_K};
use crate::error::{Result, SearchError};
use crate::schema::{Fusion, IndexPoint, SearchFilters, SearchHit};

#[derive(Default)]
struct Collection {
    dimension: usize,
    points: BTreeMap<u64, IndexPoint>,
    state: Option<IndexState>,
}

/// Process-local store.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn ensure_collection(&self, collection: &str, dimension: usize) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_insert_with(|| Collection {
                dimension,
                ..Default::default()
            });
        Ok(())
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        Ok(self.collections.read().await.contains_key(collection))
    }

    async fn drop_collection(&self, collection: &str) -> Result<()> {
        self.collections.write().await.remove(collection);
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn upsert(&self, collection: &str, points: Vec<IndexPoint>) -> Result<()> {
        let mut collections = self.collections.write().await;
        let data = collections
            .get_mut(collection)
            .ok_or_else(|| SearchError::Storage(format!("collection '{}' not found", collection)))?;
        for point in points {
            if data.dimension != 0 && point.dense.len() != data.dimension {
                return Err(SearchError::Storage(format!(
                    "dense dimension mismatch: collection {} expects {}, got {}",
                    collection,
                    data.dimension,
                    point.dense.len()
                )));
            }
            data.points.insert(point.id, point);
        }
        Ok(())
    }

    async fn delete_by_file(&self, collection: &str, file_path: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        if let Some(data) = collections.get_mut(collection) {
            data.points.retain(|_, p| p.payload.file_path != file_path);
        }
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map(|c| c.points.len())
            .unwrap_or(0))
    }

    async fn query_hybrid(
        &self,
        collection: &str,
        dense: &[f32],
        sparse: &SparseVector,
        limit: usize,
        filters: &SearchFilters,
        fusion: Fusion,
    ) -> Result<Vec<SearchHit>> {
        if fusion != Fusion::Rrf {
            return Err(SearchError::Unsupported(
                "memory store implements RRF fusion only".to_string(),
            ));
        }
        let collections = self.collections.read().await;
        let data = collections
            .get(collection)
            .ok_or_else(|| SearchError::Storage(format!("collection '{}' not found", collection)))?;

        let candidates: Vec<&IndexPoint> = data
            .points
            .values()
            .filter(|p| filters.accepts(&p.payload))
            .collect();

        // Independent prefetch lists, ranked per channel.
        let dense_limit = (limit as f32 * PREFETCH_DENSE).ceil() as usize;
        let sparse_limit = (limit as f32 * PREFETCH_SPARSE).ceil() as usize;

        let mut dense_ranked: Vec<(u64, f32)> = candidates
            .iter()
            .map(|p| (p.id, cosine(dense, &p.dense)))
            .collect();
        dense_ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        dense_ranked.truncate(dense_limit);

        let mut sparse_ranked: Vec<(u64, f32)> = candidates
            .iter()
            .map(|p| (p.id, sparse.dot(&p.sparse)))
            .filter(|(_, score)| *score > 0.0)
            .collect();
        sparse_ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        sparse_ranked.truncate(sparse_limit);

        // RRF: score = sum over channels of 1 / (k + rank), rank 1-based.
        let mut fused: HashMap<u64, f32> = HashMap::new();
        for (rank, (id, _)) in dense_ranked.iter().enumerate() {
            *fused.entry(*id).or_insert(0.0) += 1.0 / (RRF_K + rank as f32 + 1.0);
        }
        for (rank, (id, _)) in sparse_ranked.iter().enumerate() {
            *fused.entry(*id).or_insert(0.0) += 1.0 / (RRF_K + rank as f32 + 1.0);
        }

        let mut hits: Vec<SearchHit> = fused
            .into_iter()
            .filter_map(|(id, score)| {
                data.points.get(&id).map(|p| SearchHit {
                    id,
                    score,
                    payload: p.payload.clone(),
                })
            })
            .collect();
        // Ties broken by id for deterministic output.
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn get_points(&self, collection: &str, ids: &[u64]) -> Result<Vec<SearchHit>> {
        let collections = self.collections.read().await;
        let Some(data) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| {
                data.points.get(id).map(|p| SearchHit {
                    id: *id,
                    score: 0.0,
                    payload: p.payload.clone(),
                })
            })
            .collect())
    }

    async fn put_state(&self, collection: &str, state: IndexState) -> Result<()> {
        let mut collections = self.collections.write().await;
        let data = collections
            .get_mut(collection)
            .ok_or_else(|| SearchError::Storage(format!("collection '{}' not found", collection)))?;
        data.state = Some(state);
        Ok(())
    }

    async fn get_state(&self, collection: &str) -> Result<Option<IndexState>> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .and_then(|c| c.state.clone()))
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PointPayload;

    fn point(id: u64, dense: Vec<f32>, sparse_indices: Vec<u64>, file: &str) -> IndexPoint {
        IndexPoint {
            id,
            dense,
            sparse: SparseVector {
                values: vec![1.0; sparse_indices.len()],
                indices: sparse_indices,
            },
            payload: PointPayload {
                entity_id: format!("{:016x}", id),
                file_path: file.to_string(),
                language: "python".into(),
                object_type: "function".into(),
                score_weight: 1.0,
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_upsert_query_roundtrip() {
        let store = MemoryStore::new();
        store.ensure_collection("c", 2).await.unwrap();
        store
            .upsert(
                "c",
                vec![
                    point(10, vec![1.0, 0.0], vec![7], "a.py"),
                    point(11, vec![0.0, 1.0], vec![9], "b.py"),
                ],
            )
            .await
            .unwrap();

        let query_sparse = SparseVector { indices: vec![7], values: vec![1.0] };
        let hits = store
            .query_hybrid("c", &[1.0, 0.0], &query_sparse, 2, &SearchFilters::default(), Fusion::Rrf)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        // Point 10 wins both channels.
        assert_eq!(hits[0].id, 10);
        assert!(hits[0].score > hits[1].score);
        // RRF scores live in the (0, 2/(k+1)] band.
        assert!(hits[0].score <= 2.0 / (RRF_K + 1.0) + f32::EPSILON);
    }

    #[tokio::test]
    async fn test_rrf_monotonicity_in_dense_rank() {
        // Improving the dense rank with sparse rank unchanged never lowers
        // the fused score.
        let rrf = |dense_rank: usize, sparse_rank: usize| {
            1.0 / (RRF_K + dense_rank as f32) + 1.0 / (RRF_K + sparse_rank as f32)
        };
        assert!(rrf(1, 5) > rrf(2, 5));
        assert!(rrf(3, 2) >= rrf(4, 2));
    }

    #[tokio::test]
    async fn test_filters_applied_before_fusion() {
        let store = MemoryStore::new();
        store.ensure_collection("c", 2).await.unwrap();
        store
            .upsert(
                "c",
                vec![
                    point(1, vec![1.0, 0.0], vec![7], "a.py"),
                    point(2, vec![1.0, 0.0], vec![7], "b.py"),
                ],
            )
            .await
            .unwrap();
        let filters = SearchFilters {
            file_path: Some("a.py".into()),
            ..Default::default()
        };
        let hits = store
            .query_hybrid("c", &[1.0, 0.0], &SparseVector::default(), 10, &filters, Fusion::Rrf)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 1);
    }

    #[tokio::test]
    async fn test_delete_by_file() {
        let store = MemoryStore::new();
        store.ensure_collection("c", 2).await.unwrap();
        store
            .upsert(
                "c",
                vec![
                    point(1, vec![1.0, 0.0], vec![], "a.py"),
                    point(2, vec![1.0, 0.0], vec![], "b.py"),
                ],
            )
            .await
            .unwrap();
        store.delete_by_file("c", "a.py").await.unwrap();
        assert_eq!(store.count("c").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_state_roundtrip() {
        let store = MemoryStore::new();
        store.ensure_collection("c", 2).await.unwrap();
        assert!(store.get_state("c").await.unwrap().is_none());
        let state = IndexState {
            project_id: "p".into(),
            total_files: 3,
            ..Default::default()
        };
        store.put_state("c", state).await.unwrap();
        assert_eq!(store.get_state("c").await.unwrap().unwrap().total_files, 3);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let store = MemoryStore::new();
        store.ensure_collection("c", 4).await.unwrap();
        let result = store.upsert("c", vec![point(1, vec![1.0, 0.0], vec![], "a.py")]).await;
        assert!(matches!(result, Err(SearchError::Storage(_))));
    }

    #[tokio::test]
    async fn test_dbsf_unsupported() {
        let store = MemoryStore::new();
        store.ensure_collection("c", 2).await.unwrap();
        let result = store
            .query_hybrid("c", &[1.0, 0.0], &SparseVector::default(), 5, &SearchFilters::default(), Fusion::Dbsf)
            .await;
        assert!(matches!(result, Err(SearchError::Unsupported(_))));
    }
}
