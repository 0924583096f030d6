//! Qdrant vector store backend.
//!
//! One collection per project with named vectors `dense` (cosine, HNSW) and
//! `sparse` (inverted index keyed by token hash). Hybrid queries run two
//! prefetches (dense ×7.0, sparse ×3.0) fused server-side with RRF. The
//! project's `IndexState` lives on the reserved point id 1 and is excluded
//! from every query by a `must_not` condition on the payload kind.
//!
//! `language` and `object_type` filters are pushed down as keyword
//! conditions; the substring `file_path` filter is applied client-side on
//! the prefetched hits.

use async_trait::async_trait;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance,
    Filter, GetPointsBuilder, NamedVectors, PointStruct, PrefetchQueryBuilder, Query,
    QueryPointsBuilder, SparseVectorParamsBuilder, SparseVectorsConfigBuilder, UpsertPointsBuilder,
    Vector, VectorParamsBuilder, VectorsConfigBuilder,
};
use qdrant_client::{Payload, Qdrant};
use tracing::{debug, info};

use codecontext_config::StorageConfig;
use codecontext_core::{IndexState, SparseVector};

use super::{VectorStore, PREFETCH_DENSE, PREFETCH_SPARSE};
use crate::error::{Result, SearchError};
use crate::retry::{with_retry, RetryPolicy};
use crate::schema::{
    fields, kinds, Fusion, IndexPoint, PointPayload, SearchFilters, SearchHit, StatePayload,
    STATE_POINT_ID,
};

/// Named vector identifiers.
const DENSE_VECTOR: &str = "dense";
const SPARSE_VECTOR: &str = "sparse";

/// Qdrant-backed store.
pub struct QdrantStore {
    client: Qdrant,
    retry: RetryPolicy,
}

impl QdrantStore {
    /// Build a client; connectivity is verified lazily on first call.
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let mut builder = Qdrant::from_url(&config.url);
        if let Some(api_key) = &config.api_key {
            builder = builder.api_key(api_key.clone());
        }
        let client = builder
            .build()
            .map_err(|e| SearchError::Storage(format!("failed to build Qdrant client: {}", e)))?;
        Ok(Self {
            client,
            retry: RetryPolicy::storage(config.max_retries, config.timeout_secs),
        })
    }

    /// Base filter excluding the state point, plus pushed-down conditions.
    fn build_filter(filters: &SearchFilters) -> Filter {
        let mut must: Vec<Condition> = Vec::new();
        if let Some(language) = &filters.language {
            must.push(Condition::matches(fields::LANGUAGE, language.to_lowercase()));
        }
        if let Some(object_type) = &filters.object_type {
            must.push(Condition::matches(
                fields::OBJECT_TYPE,
                object_type.to_lowercase(),
            ));
        }
        let mut filter = Filter::must(must);
        filter.must_not = vec![Condition::matches(
            fields::KIND,
            kinds::INDEX_STATE.to_string(),
        )];
        filter
    }

    fn to_point_struct(point: IndexPoint) -> Result<PointStruct> {
        let payload_json = serde_json::to_value(&point.payload)
            .map_err(|e| SearchError::Storage(format!("payload serialization: {}", e)))?;
        let payload = Payload::try_from(payload_json)
            .map_err(|e| SearchError::Storage(format!("payload conversion: {}", e)))?;

        let sparse_indices: Vec<u32> = point.sparse.indices.iter().map(|&i| i as u32).collect();
        let vectors = NamedVectors::default()
            .add_vector(DENSE_VECTOR, Vector::new_dense(point.dense))
            .add_vector(
                SPARSE_VECTOR,
                Vector::new_sparse(sparse_indices, point.sparse.values),
            );
        Ok(PointStruct::new(point.id, vectors, payload))
    }

    fn hit_from_payload(
        id: u64,
        score: f32,
        payload: std::collections::HashMap<String, qdrant_client::qdrant::Value>,
    ) -> Option<SearchHit> {
        let json = payload_to_json(payload);
        let payload: PointPayload = serde_json::from_value(json).ok()?;
        Some(SearchHit { id, score, payload })
    }

    fn numeric_id(point_id: Option<qdrant_client::qdrant::PointId>) -> Option<u64> {
        use qdrant_client::qdrant::point_id::PointIdOptions;
        match point_id?.point_id_options? {
            PointIdOptions::Num(n) => Some(n),
            PointIdOptions::Uuid(_) => None,
        }
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(&self, collection: &str, dimension: usize) -> Result<()> {
        if self.client.collection_exists(collection).await.map_err(storage_err)? {
            debug!("collection '{}' already exists", collection);
            return Ok(());
        }
        info!("creating collection '{}' (dense dim = {})", collection, dimension);

        let mut vectors = VectorsConfigBuilder::default();
        vectors.add_named_vector_params(
            DENSE_VECTOR,
            VectorParamsBuilder::new(dimension as u64, Distance::Cosine),
        );
        let mut sparse_vectors = SparseVectorsConfigBuilder::default();
        sparse_vectors.add_named_vector_params(SPARSE_VECTOR, SparseVectorParamsBuilder::default());

        self.client
            .create_collection(
                CreateCollectionBuilder::new(collection)
                    .vectors_config(vectors)
                    .sparse_vectors_config(sparse_vectors),
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        self.client.collection_exists(collection).await.map_err(storage_err)
    }

    async fn drop_collection(&self, collection: &str) -> Result<()> {
        info!("dropping collection '{}'", collection);
        self.client.delete_collection(collection).await.map_err(storage_err)?;
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let response = self.client.list_collections().await.map_err(storage_err)?;
        Ok(response
            .collections
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    async fn upsert(&self, collection: &str, points: Vec<IndexPoint>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        debug!("upserting {} points to '{}'", points.len(), collection);
        let structs: Vec<PointStruct> = points
            .into_iter()
            .map(Self::to_point_struct)
            .collect::<Result<_>>()?;

        with_retry(self.retry, "store upsert", || {
            let structs = structs.clone();
            async move {
                self.client
                    .upsert_points(UpsertPointsBuilder::new(collection, structs).wait(true))
                    .await
                    .map_err(storage_err)?;
                Ok(())
            }
        })
        .await
    }

    async fn delete_by_file(&self, collection: &str, file_path: &str) -> Result<()> {
        debug!("deleting points for '{}' from '{}'", file_path, collection);
        let filter = Filter::must([Condition::matches(
            fields::FILE_PATH,
            file_path.to_string(),
        )]);
        self.client
            .delete_points(
                DeletePointsBuilder::new(collection)
                    .points(filter)
                    .wait(true),
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let mut filter = Filter::default();
        filter.must_not = vec![Condition::matches(
            fields::KIND,
            kinds::INDEX_STATE.to_string(),
        )];
        let response = self
            .client
            .count(
                CountPointsBuilder::new(collection)
                    .filter(filter)
                    .exact(true),
            )
            .await
            .map_err(storage_err)?;
        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
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
        let filter = Self::build_filter(filters);
        let dense_limit = (limit as f32 * PREFETCH_DENSE).ceil() as u64;
        let sparse_limit = (limit as f32 * PREFETCH_SPARSE).ceil() as u64;

        let mut builder = QueryPointsBuilder::new(collection).add_prefetch(
            PrefetchQueryBuilder::default()
                .query(Query::new_nearest(dense.to_vec()))
                .using(DENSE_VECTOR)
                .filter(filter.clone())
                .limit(dense_limit),
        );
        if !sparse.is_empty() {
            let pairs: Vec<(u32, f32)> = sparse
                .indices
                .iter()
                .zip(&sparse.values)
                .map(|(&i, &v)| (i as u32, v))
                .collect();
            builder = builder.add_prefetch(
                PrefetchQueryBuilder::default()
                    .query(Query::new_nearest(pairs.as_slice()))
                    .using(SPARSE_VECTOR)
                    .filter(filter.clone())
                    .limit(sparse_limit),
            );
        }

        let qdrant_fusion = match fusion {
            Fusion::Rrf => qdrant_client::qdrant::Fusion::Rrf,
            Fusion::Dbsf => qdrant_client::qdrant::Fusion::Dbsf,
        };
        // Over-fetch so the client-side file_path filter cannot starve the
        // requested limit.
        let fetch_limit = if filters.file_path.is_some() {
            (limit * 4) as u64
        } else {
            limit as u64
        };
        let builder = builder
            .query(Query::new_fusion(qdrant_fusion))
            .filter(filter)
            .limit(fetch_limit)
            .with_payload(true);

        let response = with_retry(self.retry, "store query", || {
            let builder = builder.clone();
            async move { self.client.query(builder).await.map_err(storage_err) }
        })
        .await?;

        let mut hits: Vec<SearchHit> = response
            .result
            .into_iter()
            .filter_map(|point| {
                let id = Self::numeric_id(point.id)?;
                Self::hit_from_payload(id, point.score, point.payload)
            })
            .filter(|hit| filters.accepts(&hit.payload))
            .collect();
        hits.truncate(limit);
        Ok(hits)
    }

    async fn get_points(&self, collection: &str, ids: &[u64]) -> Result<Vec<SearchHit>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let point_ids: Vec<qdrant_client::qdrant::PointId> =
            ids.iter().map(|&id| id.into()).collect();
        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(collection, point_ids)
                    .with_payload(true),
            )
            .await
            .map_err(storage_err)?;
        Ok(response
            .result
            .into_iter()
            .filter_map(|point| {
                let id = Self::numeric_id(point.id)?;
                Self::hit_from_payload(id, 0.0, point.payload)
            })
            .collect())
    }

    async fn put_state(&self, collection: &str, state: IndexState) -> Result<()> {
        let dimension = self.dense_dimension(collection).await?;
        let payload_json = serde_json::to_value(StatePayload::new(state))
            .map_err(|e| SearchError::Storage(format!("state serialization: {}", e)))?;
        let payload = Payload::try_from(payload_json)
            .map_err(|e| SearchError::Storage(format!("state conversion: {}", e)))?;

        // The state point carries a zero dense vector; the kind filter keeps
        // it out of every query.
        let vectors = NamedVectors::default()
            .add_vector(DENSE_VECTOR, Vector::new_dense(vec![0.0; dimension]));
        let point = PointStruct::new(STATE_POINT_ID, vectors, payload);
        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, vec![point]).wait(true))
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn get_state(&self, collection: &str) -> Result<Option<IndexState>> {
        if !self.collection_exists(collection).await? {
            return Ok(None);
        }
        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(
                    collection,
                    vec![qdrant_client::qdrant::PointId::from(STATE_POINT_ID)],
                )
                .with_payload(true),
            )
            .await
            .map_err(storage_err)?;
        let Some(point) = response.result.into_iter().next() else {
            return Ok(None);
        };
        let json = payload_to_json(point.payload);
        let parsed: StatePayload = serde_json::from_value(json)
            .map_err(|e| SearchError::Storage(format!("corrupt state payload: {}", e)))?;
        Ok(Some(parsed.state))
    }
}

/// Convert a wire payload map to plain JSON, field by field.
fn payload_to_json(
    payload: std::collections::HashMap<String, qdrant_client::qdrant::Value>,
) -> serde_json::Value {
    serde_json::Value::Object(
        payload
            .into_iter()
            .map(|(key, value)| (key, value_to_json(value)))
            .collect(),
    )
}

fn value_to_json(value: qdrant_client::qdrant::Value) -> serde_json::Value {
    use qdrant_client::qdrant::value::Kind;
    match value.kind {
        Some(Kind::NullValue(_)) | None => serde_json::Value::Null,
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(b),
        Some(Kind::IntegerValue(i)) => serde_json::Value::from(i),
        Some(Kind::DoubleValue(d)) => {
            serde_json::Number::from_f64(d).map(serde_json::Value::Number).unwrap_or(serde_json::Value::Null)
        }
        Some(Kind::StringValue(s)) => serde_json::Value::String(s),
        Some(Kind::ListValue(list)) => {
            serde_json::Value::Array(list.values.into_iter().map(value_to_json).collect())
        }
        Some(Kind::StructValue(structure)) => serde_json::Value::Object(
            structure
                .fields
                .into_iter()
                .map(|(key, value)| (key, value_to_json(value)))
                .collect(),
        ),
    }
}

impl QdrantStore {
    /// Dense vector size of an existing collection.
    async fn dense_dimension(&self, collection: &str) -> Result<usize> {
        use qdrant_client::qdrant::vectors_config::Config;
        let info = self
            .client
            .collection_info(collection)
            .await
            .map_err(storage_err)?;
        let params = info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config);
        match params {
            Some(Config::ParamsMap(map)) => map
                .map
                .get(DENSE_VECTOR)
                .map(|p| p.size as usize)
                .ok_or_else(|| SearchError::Storage("missing dense vector params".to_string())),
            Some(Config::Params(params)) => Ok(params.size as usize),
            None => Err(SearchError::Storage("missing vector config".to_string())),
        }
    }
}

fn storage_err(error: qdrant_client::QdrantError) -> SearchError {
    SearchError::Storage(error.to_string())
}
