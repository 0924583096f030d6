//! Vector store contract and backends.
//!
//! A store holds one collection per project with named `dense` and `sparse`
//! vectors and a JSON-like payload per point. The backend set is closed
//! (Qdrant, in-memory) and registered in a static table.

mod memory;
mod qdrant;

pub use memory::MemoryStore;
pub use qdrant::QdrantStore;

use std::sync::Arc;

use async_trait::async_trait;

use codecontext_config::{StorageConfig, StoreBackendKind};
use codecontext_core::{IndexState, SparseVector};

use crate::error::{Result, SearchError};
use crate::schema::{Fusion, IndexPoint, SearchFilters, SearchHit};

/// Named-vector collection contract.
///
/// Hybrid queries prefetch `ceil(limit * 7.0)` candidates by dense
/// similarity and `ceil(limit * 3.0)` by sparse inner product, then fuse
/// with RRF (`k = 60`). Implementations must exclude the index-state point
/// from every query.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection when missing; `dimension` sizes the dense vector.
    async fn ensure_collection(&self, collection: &str, dimension: usize) -> Result<()>;

    async fn collection_exists(&self, collection: &str) -> Result<bool>;

    /// Drop a collection and everything in it. All-or-nothing.
    async fn drop_collection(&self, collection: &str) -> Result<()>;

    /// Collection names currently present.
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Insert or replace points.
    async fn upsert(&self, collection: &str, points: Vec<IndexPoint>) -> Result<()>;

    /// Delete every point whose payload `file_path` matches exactly.
    async fn delete_by_file(&self, collection: &str, file_path: &str) -> Result<()>;

    /// Number of entity points (excludes the state point).
    async fn count(&self, collection: &str) -> Result<usize>;

    /// Hybrid dense+sparse query with fusion; returns at most `limit` hits.
    async fn query_hybrid(
        &self,
        collection: &str,
        dense: &[f32],
        sparse: &SparseVector,
        limit: usize,
        filters: &SearchFilters,
        fusion: Fusion,
    ) -> Result<Vec<SearchHit>>;

    /// Fetch points by numeric id (hydration and graph expansion).
    async fn get_points(&self, collection: &str, ids: &[u64]) -> Result<Vec<SearchHit>>;

    /// Persist the project index state on its distinguished point.
    async fn put_state(&self, collection: &str, state: IndexState) -> Result<()>;

    /// Load the project index state, when one was committed.
    async fn get_state(&self, collection: &str) -> Result<Option<IndexState>>;
}

/// Dense prefetch multiplier for RRF.
pub const PREFETCH_DENSE: f32 = 7.0;

/// Sparse prefetch multiplier for RRF.
pub const PREFETCH_SPARSE: f32 = 3.0;

/// RRF rank constant.
pub const RRF_K: f32 = 60.0;

type StoreCtor = fn(&StorageConfig) -> Result<Arc<dyn VectorStore>>;

/// Static registry of store constructors, checked at composition time.
static BACKENDS: &[(StoreBackendKind, StoreCtor)] = &[
    (StoreBackendKind::Qdrant, build_qdrant),
    (StoreBackendKind::Memory, build_memory),
];

fn build_qdrant(config: &StorageConfig) -> Result<Arc<dyn VectorStore>> {
    Ok(Arc::new(QdrantStore::new(config)?))
}

fn build_memory(_config: &StorageConfig) -> Result<Arc<dyn VectorStore>> {
    Ok(Arc::new(MemoryStore::new()))
}

/// Build the configured vector store backend.
pub fn create_store(config: &StorageConfig) -> Result<Arc<dyn VectorStore>> {
    BACKENDS
        .iter()
        .find(|(kind, _)| *kind == config.backend)
        .map(|(_, ctor)| ctor(config))
        .unwrap_or_else(|| {
            Err(SearchError::Configuration(format!(
                "no vector store backend registered for '{}'",
                config.backend
            )))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_builds_memory_backend() {
        let config = StorageConfig {
            backend: StoreBackendKind::Memory,
            ..Default::default()
        };
        assert!(create_store(&config).is_ok());
    }

    #[test]
    fn test_object_safety() {
        fn _assert(_: &dyn VectorStore) {}
    }
}
