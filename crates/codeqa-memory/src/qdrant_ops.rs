//! Qdrant-backed [`VectorStore`].
//!
//! Qdrant only accepts unsigned integers or UUIDs as point ids, so record ids are mapped to
//! UUID v5 under a fixed namespace and the original id is kept in the `record_id` payload field.

use std::collections::{HashMap, HashSet};

use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, Distance, GetPointsBuilder, PointId,
    PointStruct, ScoredPoint, SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
    point_id::PointIdOptions, value::Kind,
};
use uuid::Uuid;

use crate::vector_store::{
    BoxFuture, ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError,
};

type QdrantResult<T> = Result<T, Box<qdrant_client::QdrantError>>;

/// Payload field carrying the caller's string id.
pub const RECORD_ID_FIELD: &str = "record_id";

const RECORD_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2d0e_8b4a_4c3e_9a57_3e21_c0de_0a11);

/// Deterministic Qdrant point UUID for a record id.
#[must_use]
pub fn point_uuid(record_id: &str) -> String {
    Uuid::new_v5(&RECORD_ID_NAMESPACE, record_id.as_bytes()).to_string()
}

/// Thin wrapper over [`Qdrant`] client encapsulating collection operations.
#[derive(Clone)]
pub struct QdrantOps {
    client: Qdrant,
}

impl std::fmt::Debug for QdrantOps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantOps").finish_non_exhaustive()
    }
}

impl QdrantOps {
    /// Create a new `QdrantOps` connected to the given URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the Qdrant client cannot be created.
    pub fn new(url: &str) -> QdrantResult<Self> {
        let client = Qdrant::from_url(url).build().map_err(Box::new)?;
        Ok(Self { client })
    }

    /// Ensure a collection exists with cosine distance vectors.
    ///
    /// # Errors
    ///
    /// Returns an error if Qdrant cannot be reached or collection creation fails.
    pub async fn ensure_collection(&self, collection: &str, vector_size: u64) -> QdrantResult<()> {
        if self
            .client
            .collection_exists(collection)
            .await
            .map_err(Box::new)?
        {
            return Ok(());
        }
        self.client
            .create_collection(
                CreateCollectionBuilder::new(collection)
                    .vectors_config(VectorParamsBuilder::new(vector_size, Distance::Cosine)),
            )
            .await
            .map_err(Box::new)?;
        tracing::info!(collection, vector_size, "created qdrant collection");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if Qdrant cannot be reached.
    pub async fn collection_exists(&self, collection: &str) -> QdrantResult<bool> {
        self.client
            .collection_exists(collection)
            .await
            .map_err(Box::new)
    }

    /// Delete a collection. Missing collections are not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be deleted.
    pub async fn delete_collection(&self, collection: &str) -> QdrantResult<()> {
        if !self.collection_exists(collection).await? {
            return Ok(());
        }
        self.client
            .delete_collection(collection)
            .await
            .map_err(Box::new)?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the upsert fails.
    pub async fn upsert(&self, collection: &str, points: Vec<PointStruct>) -> QdrantResult<()> {
        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await
            .map_err(Box::new)?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the search fails.
    pub async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> QdrantResult<Vec<ScoredPoint>> {
        let builder = SearchPointsBuilder::new(collection, vector, limit).with_payload(true);
        let results = self.client.search_points(builder).await.map_err(Box::new)?;
        Ok(results.result)
    }

    /// Exact point count.
    ///
    /// # Errors
    ///
    /// Returns an error if the count request fails.
    pub async fn count(&self, collection: &str) -> QdrantResult<u64> {
        let response = self
            .client
            .count(CountPointsBuilder::new(collection).exact(true))
            .await
            .map_err(Box::new)?;
        Ok(response.result.map_or(0, |r| r.count))
    }

    /// Fetch which of the given point UUIDs exist, without payloads or vectors.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub async fn existing_point_ids(
        &self,
        collection: &str,
        uuids: Vec<String>,
    ) -> QdrantResult<HashSet<String>> {
        if uuids.is_empty() {
            return Ok(HashSet::new());
        }
        let ids: Vec<PointId> = uuids.into_iter().map(PointId::from).collect();
        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(collection, ids)
                    .with_payload(false)
                    .with_vectors(false),
            )
            .await
            .map_err(Box::new)?;
        Ok(response
            .result
            .into_iter()
            .filter_map(|p| point_id_to_string(p.id))
            .collect())
    }
}

fn point_id_to_string(id: Option<PointId>) -> Option<String> {
    match id.and_then(|pid| pid.point_id_options)? {
        PointIdOptions::Uuid(u) => Some(u),
        PointIdOptions::Num(n) => Some(n.to_string()),
    }
}

fn vector_point_to_qdrant(point: VectorPoint) -> Result<PointStruct, VectorStoreError> {
    let uuid = point_uuid(&point.id);
    let mut object: serde_json::Map<String, serde_json::Value> =
        point.payload.into_iter().collect();
    object.insert(RECORD_ID_FIELD.into(), serde_json::Value::String(point.id));
    let payload: HashMap<String, qdrant_client::qdrant::Value> =
        serde_json::from_value(serde_json::Value::Object(object))
            .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;
    Ok(PointStruct::new(uuid, point.vector, payload))
}

fn scored_point_to_vector(point: ScoredPoint) -> ScoredVectorPoint {
    let mut payload: HashMap<String, serde_json::Value> = point
        .payload
        .into_iter()
        .filter_map(|(k, v)| {
            let json_val = match v.kind? {
                Kind::StringValue(s) => serde_json::Value::String(s),
                Kind::IntegerValue(i) => serde_json::Value::Number(i.into()),
                Kind::DoubleValue(d) => {
                    serde_json::Number::from_f64(d).map(serde_json::Value::Number)?
                }
                Kind::BoolValue(b) => serde_json::Value::Bool(b),
                _ => return None,
            };
            Some((k, json_val))
        })
        .collect();

    let id = match payload.remove(RECORD_ID_FIELD) {
        Some(serde_json::Value::String(s)) => s,
        _ => point_id_to_string(point.id).unwrap_or_default(),
    };

    ScoredVectorPoint {
        id,
        score: point.score,
        payload,
    }
}

impl VectorStore for QdrantOps {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.ensure_collection(&collection, vector_size)
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))
        })
    }

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.collection_exists(&collection)
                .await
                .map_err(|e| VectorStoreError::Connection(e.to_string()))
        })
    }

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.delete_collection(&collection)
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let qdrant_points = points
                .into_iter()
                .map(vector_point_to_qdrant)
                .collect::<Result<Vec<_>, _>>()?;
            self.upsert(&collection, qdrant_points)
                .await
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))
        })
    }

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let results = self
                .search(&collection, vector, limit)
                .await
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;
            Ok(results.into_iter().map(scored_point_to_vector).collect())
        })
    }

    fn count(&self, collection: &str) -> BoxFuture<'_, Result<u64, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.count(&collection)
                .await
                .map_err(|e| VectorStoreError::Count(e.to_string()))
        })
    }

    fn existing_ids(
        &self,
        collection: &str,
        ids: Vec<String>,
    ) -> BoxFuture<'_, Result<HashSet<String>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let by_uuid: HashMap<String, String> =
                ids.into_iter().map(|id| (point_uuid(&id), id)).collect();
            let found = self
                .existing_point_ids(&collection, by_uuid.keys().cloned().collect())
                .await
                .map_err(|e| VectorStoreError::Lookup(e.to_string()))?;
            Ok(found
                .into_iter()
                .filter_map(|uuid| by_uuid.get(&uuid).cloned())
                .collect())
        })
    }
}
