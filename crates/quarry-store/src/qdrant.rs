//! Qdrant gRPC implementation of [`VectorBackend`].

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, Distance, Filter, PointId, PointStruct,
    ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
    point_id::PointIdOptions, value::Kind, vectors_config,
};

use crate::backend::{
    CollectionInfo, FieldFilter, FilterValue, ScoredVectorPoint, VectorBackend, VectorPoint,
};
use crate::error::{Result, StoreError};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Vector backend speaking the Qdrant gRPC API.
#[derive(Clone)]
pub struct QdrantBackend {
    client: std::sync::Arc<Qdrant>,
}

impl std::fmt::Debug for QdrantBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantBackend").finish_non_exhaustive()
    }
}

impl QdrantBackend {
    /// Connect to a Qdrant instance at `url` (e.g. `http://127.0.0.1:6334`).
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be constructed; no network
    /// traffic happens until the first operation.
    pub fn new(url: &str) -> Result<Self> {
        let client = Qdrant::from_url(url).build().map_err(Box::new)?;
        Ok(Self {
            client: std::sync::Arc::new(client),
        })
    }
}

fn to_qdrant_payload(
    payload: HashMap<String, serde_json::Value>,
) -> Result<HashMap<String, qdrant_client::qdrant::Value>> {
    let value = serde_json::Value::Object(payload.into_iter().collect());
    Ok(serde_json::from_value(value)?)
}

fn json_from_value(value: qdrant_client::qdrant::Value) -> serde_json::Value {
    match value.kind {
        Some(Kind::StringValue(s)) => serde_json::Value::String(s),
        Some(Kind::IntegerValue(i)) => serde_json::Value::from(i),
        Some(Kind::DoubleValue(d)) => serde_json::Value::from(d),
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(b),
        Some(Kind::ListValue(list)) => {
            serde_json::Value::Array(list.values.into_iter().map(json_from_value).collect())
        }
        Some(Kind::StructValue(s)) => serde_json::Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, json_from_value(v)))
                .collect(),
        ),
        Some(Kind::NullValue(_)) | None => serde_json::Value::Null,
    }
}

fn point_id_string(id: Option<PointId>) -> String {
    match id.and_then(|p| p.point_id_options) {
        Some(PointIdOptions::Uuid(s)) => s,
        Some(PointIdOptions::Num(n)) => n.to_string(),
        None => String::new(),
    }
}

fn to_qdrant_filter(filter: FieldFilter) -> Filter {
    let conditions: Vec<Condition> = filter
        .must
        .into_iter()
        .map(|c| match c.value {
            FilterValue::Text(s) => Condition::matches(c.field, s),
            FilterValue::Integer(i) => Condition::matches(c.field, i),
        })
        .collect();
    Filter::must(conditions)
}

impl VectorBackend for QdrantBackend {
    fn health(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async {
            self.client
                .health_check()
                .await
                .map_err(|e| StoreError::Connection(e.to_string()))?;
            Ok(())
        })
    }

    fn ensure_collection(&self, collection: &str, vector_size: u64) -> BoxFuture<'_, Result<()>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let exists = self
                .client
                .collection_exists(&collection)
                .await
                .map_err(|e| StoreError::Collection(e.to_string()))?;
            if exists {
                return Ok(());
            }
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&collection)
                        .vectors_config(VectorParamsBuilder::new(vector_size, Distance::Cosine)),
                )
                .await
                .map_err(|e| StoreError::Collection(e.to_string()))?;
            Ok(())
        })
    }

    fn list_collections(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        Box::pin(async {
            let response = self
                .client
                .list_collections()
                .await
                .map_err(|e| StoreError::Connection(e.to_string()))?;
            Ok(response.collections.into_iter().map(|c| c.name).collect())
        })
    }

    fn collection_info(&self, collection: &str) -> BoxFuture<'_, Result<Option<CollectionInfo>>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let exists = self
                .client
                .collection_exists(&collection)
                .await
                .map_err(|e| StoreError::Collection(e.to_string()))?;
            if !exists {
                return Ok(None);
            }

            let response = self
                .client
                .collection_info(&collection)
                .await
                .map_err(|e| StoreError::Collection(e.to_string()))?;
            let info = response.result.ok_or_else(|| {
                StoreError::Collection(format!("{collection}: empty collection info"))
            })?;

            let vector_size = info
                .config
                .as_ref()
                .and_then(|c| c.params.as_ref())
                .and_then(|p| p.vectors_config.as_ref())
                .and_then(|v| v.config.as_ref())
                .and_then(|c| match c {
                    vectors_config::Config::Params(p) => Some(p.size),
                    vectors_config::Config::ParamsMap(_) => None,
                });

            Ok(Some(CollectionInfo {
                name: collection,
                points_count: info.points_count.unwrap_or(0),
                vector_size,
            }))
        })
    }

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<()>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.client
                .delete_collection(&collection)
                .await
                .map_err(|e| StoreError::Delete(e.to_string()))?;
            Ok(())
        })
    }

    fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> BoxFuture<'_, Result<()>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let points = points
                .into_iter()
                .map(|p| Ok(PointStruct::new(p.id, p.vector, to_qdrant_payload(p.payload)?)))
                .collect::<Result<Vec<_>>>()?;

            self.client
                .upsert_points(UpsertPointsBuilder::new(&collection, points))
                .await
                .map_err(|e| StoreError::Upsert(e.to_string()))?;
            Ok(())
        })
    }

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
        filter: Option<FieldFilter>,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            // search_points rejects an empty vector; a filter-only request
            // goes through scroll instead, with no similarity ordering.
            if vector.is_empty() {
                let mut builder = ScrollPointsBuilder::new(&collection)
                    .limit(u32::try_from(limit).unwrap_or(u32::MAX))
                    .with_payload(true);
                if let Some(f) = filter {
                    builder = builder.filter(to_qdrant_filter(f));
                }

                let response = self
                    .client
                    .scroll(builder)
                    .await
                    .map_err(|e| StoreError::Search(e.to_string()))?;
                return Ok(response
                    .result
                    .into_iter()
                    .map(|point| ScoredVectorPoint {
                        id: point_id_string(point.id),
                        score: 0.0,
                        payload: point
                            .payload
                            .into_iter()
                            .map(|(k, v)| (k, json_from_value(v)))
                            .collect(),
                    })
                    .collect());
            }

            let mut builder =
                SearchPointsBuilder::new(&collection, vector, limit).with_payload(true);
            if let Some(f) = filter {
                builder = builder.filter(to_qdrant_filter(f));
            }

            let response = self
                .client
                .search_points(builder)
                .await
                .map_err(|e| StoreError::Search(e.to_string()))?;

            Ok(response
                .result
                .into_iter()
                .map(|point| ScoredVectorPoint {
                    id: point_id_string(point.id),
                    score: point.score,
                    payload: point
                        .payload
                        .into_iter()
                        .map(|(k, v)| (k, json_from_value(v)))
                        .collect(),
                })
                .collect())
        })
    }
}
