use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::vector_store::{
    BoxFuture, ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError,
};

struct StoredPoint {
    vector: Vec<f32>,
    payload: HashMap<String, serde_json::Value>,
}

struct InMemoryCollection {
    vector_size: usize,
    points: HashMap<String, StoredPoint>,
}

/// Process-local [`VectorStore`] with exact cosine search. Nothing is persisted.
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, InMemoryCollection>>,
}

impl InMemoryVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryVectorStore")
            .finish_non_exhaustive()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn missing(collection: &str) -> String {
    format!("collection {collection} not found")
}

impl VectorStore for InMemoryVectorStore {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let vector_size = usize::try_from(vector_size)
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            cols.entry(collection)
                .or_insert_with(|| InMemoryCollection {
                    vector_size,
                    points: HashMap::new(),
                });
            Ok(())
        })
    }

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            Ok(cols.contains_key(&collection))
        })
    }

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            cols.remove(&collection);
            Ok(())
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
            let col = cols
                .get_mut(&collection)
                .ok_or_else(|| VectorStoreError::Upsert(missing(&collection)))?;
            if let Some(bad) = points.iter().find(|p| p.vector.len() != col.vector_size) {
                return Err(VectorStoreError::Upsert(format!(
                    "point {} has dimension {}, collection expects {}",
                    bad.id,
                    bad.vector.len(),
                    col.vector_size
                )));
            }
            for p in points {
                col.points.insert(
                    p.id,
                    StoredPoint {
                        vector: p.vector,
                        payload: p.payload,
                    },
                );
            }
            Ok(())
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
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;
            let col = cols
                .get(&collection)
                .ok_or_else(|| VectorStoreError::Search(missing(&collection)))?;
            if vector.len() != col.vector_size {
                return Err(VectorStoreError::Search(format!(
                    "query has dimension {}, collection expects {}",
                    vector.len(),
                    col.vector_size
                )));
            }

            let mut scored: Vec<ScoredVectorPoint> = col
                .points
                .iter()
                .map(|(id, sp)| ScoredVectorPoint {
                    id: id.clone(),
                    score: cosine_similarity(&vector, &sp.vector),
                    payload: sp.payload.clone(),
                })
                .collect();

            scored.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.id.cmp(&b.id))
            });
            scored.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
            Ok(scored)
        })
    }

    fn count(&self, collection: &str) -> BoxFuture<'_, Result<u64, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Count(e.to_string()))?;
            let col = cols
                .get(&collection)
                .ok_or_else(|| VectorStoreError::Count(missing(&collection)))?;
            u64::try_from(col.points.len()).map_err(|e| VectorStoreError::Count(e.to_string()))
        })
    }

    fn existing_ids(
        &self,
        collection: &str,
        ids: Vec<String>,
    ) -> BoxFuture<'_, Result<HashSet<String>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Lookup(e.to_string()))?;
            let col = cols
                .get(&collection)
                .ok_or_else(|| VectorStoreError::Lookup(missing(&collection)))?;
            Ok(ids
                .into_iter()
                .filter(|id| col.points.contains_key(id))
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: &str, vector: Vec<f32>, name: &str) -> VectorPoint {
        VectorPoint {
            id: id.into(),
            vector,
            payload: HashMap::from([("name".into(), serde_json::json!(name))]),
        }
    }

    #[tokio::test]
    async fn ensure_collection_and_exists() {
        let store = InMemoryVectorStore::new();
        assert!(!store.collection_exists("test").await.unwrap());
        store.ensure_collection("test", 3).await.unwrap();
        assert!(store.collection_exists("test").await.unwrap());
    }

    #[tokio::test]
    async fn ensure_collection_keeps_points() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("test", 3).await.unwrap();
        store
            .upsert("test", vec![point("a", vec![1.0, 0.0, 0.0], "alpha")])
            .await
            .unwrap();
        store.ensure_collection("test", 3).await.unwrap();
        assert_eq!(store.count("test").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_collection_removes() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("test", 3).await.unwrap();
        store.delete_collection("test").await.unwrap();
        assert!(!store.collection_exists("test").await.unwrap());
    }

    #[tokio::test]
    async fn delete_missing_collection_is_ok() {
        let store = InMemoryVectorStore::new();
        store.delete_collection("never").await.unwrap();
    }

    #[tokio::test]
    async fn upsert_and_search_nearest_first() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("test", 3).await.unwrap();

        let points = vec![
            point("a", vec![1.0, 0.0, 0.0], "alpha"),
            point("b", vec![0.0, 1.0, 0.0], "beta"),
            point("c", vec![0.7, 0.7, 0.0], "gamma"),
        ];
        store.upsert("test", points).await.unwrap();

        let results = store
            .search("test", vec![1.0, 0.0, 0.0], 2)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "a");
        assert_eq!(results[1].id, "c");
        assert!((results[0].score - 1.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn upsert_rejects_wrong_dimension() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("test", 3).await.unwrap();
        let err = store
            .upsert("test", vec![point("a", vec![1.0, 0.0], "alpha")])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::Upsert(_)));
        assert_eq!(store.count("test").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn search_rejects_wrong_dimension() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("test", 3).await.unwrap();
        let err = store.search("test", vec![1.0], 1).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::Search(_)));
    }

    #[tokio::test]
    async fn upsert_into_missing_collection_fails() {
        let store = InMemoryVectorStore::new();
        let err = store
            .upsert("nope", vec![point("a", vec![1.0], "alpha")])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::Upsert(_)));
    }

    #[tokio::test]
    async fn existing_ids_returns_present_subset() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("test", 1).await.unwrap();
        store
            .upsert("test", vec![point("a", vec![1.0], "alpha")])
            .await
            .unwrap();
        let found = store
            .existing_ids("test", vec!["a".into(), "b".into()])
            .await
            .unwrap();
        assert_eq!(found, HashSet::from(["a".to_owned()]));
    }

    #[tokio::test]
    async fn count_missing_collection_is_error() {
        let store = InMemoryVectorStore::new();
        assert!(store.count("nope").await.is_err());
    }

    #[test]
    fn cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &b)).abs() < f32::EPSILON);
    }

    #[test]
    fn cosine_similarity_zero_vector() {
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).abs() < f32::EPSILON);
    }

    #[test]
    fn debug_format() {
        let store = InMemoryVectorStore::new();
        let dbg = format!("{store:?}");
        assert!(dbg.contains("InMemoryVectorStore"));
    }
}
