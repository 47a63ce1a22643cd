//! Record store: one vector collection holding chunk records under stable ids.

use std::collections::HashSet;
use std::sync::Arc;

use codeqa_memory::{VectorPoint, VectorStore};

use crate::chunk::ChunkRecord;
use crate::error::{IndexError, Result};

/// Dedup-aware facade over a [`VectorStore`] collection.
///
/// A record is written at most once per stable id; re-adding an id already present is
/// skipped, never overwritten.
#[derive(Clone)]
pub struct RecordStore {
    ops: Arc<dyn VectorStore>,
    collection: String,
    vector_size: u64,
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("collection", &self.collection)
            .field("vector_size", &self.vector_size)
            .finish_non_exhaustive()
    }
}

impl RecordStore {
    #[must_use]
    pub fn new(ops: Arc<dyn VectorStore>, collection: impl Into<String>, vector_size: u64) -> Self {
        Self {
            ops,
            collection: collection.into(),
            vector_size,
        }
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Create the collection if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot create the collection.
    pub async fn ensure_collection(&self) -> Result<()> {
        self.ops
            .ensure_collection(&self.collection, self.vector_size)
            .await?;
        Ok(())
    }

    /// Write records whose stable id is not yet stored. Returns how many were written.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Validation`] if `vectors` and `records` differ in length or a
    /// vector has the wrong dimension, and a store error if lookup or write fails.
    pub async fn add(&self, vectors: Vec<Vec<f32>>, records: Vec<ChunkRecord>) -> Result<usize> {
        if vectors.len() != records.len() {
            return Err(IndexError::Validation(format!(
                "{} vectors for {} records",
                vectors.len(),
                records.len()
            )));
        }
        if records.is_empty() {
            return Ok(0);
        }
        let expected = usize::try_from(self.vector_size).unwrap_or(usize::MAX);
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            return Err(IndexError::Validation(format!(
                "vector dimension {} does not match collection dimension {expected}",
                bad.len()
            )));
        }

        let ids: Vec<String> = records.iter().map(|r| r.chunk.stable_id()).collect();
        let mut skip: HashSet<String> = self
            .ops
            .existing_ids(&self.collection, ids.clone())
            .await?;

        let mut points = Vec::with_capacity(records.len());
        for ((id, vector), record) in ids.into_iter().zip(vectors).zip(records) {
            if !skip.insert(id.clone()) {
                tracing::debug!(id = %id, "record already stored, skipping");
                continue;
            }
            points.push(VectorPoint {
                id,
                vector,
                payload: record.to_payload()?,
            });
        }

        let added = points.len();
        if added > 0 {
            self.ops.upsert(&self.collection, points).await?;
        }
        Ok(added)
    }

    /// Up to `k` records nearest to `query`, nearest first. `k` is clamped to the store size.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend search fails.
    pub async fn search(&self, query: Vec<f32>, k: usize) -> Result<Vec<ChunkRecord>> {
        let size = self.size().await?;
        let limit = u64::try_from(k).unwrap_or(u64::MAX).min(size);
        if limit == 0 {
            return Ok(Vec::new());
        }

        let hits = self.ops.search(&self.collection, query, limit).await?;
        Ok(hits
            .into_iter()
            .filter_map(|hit| match ChunkRecord::from_payload(hit.payload) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(id = %hit.id, "unreadable record payload: {e}");
                    None
                }
            })
            .collect())
    }

    /// Number of stored records; zero when the collection does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be queried.
    pub async fn size(&self) -> Result<u64> {
        if !self.ops.collection_exists(&self.collection).await? {
            return Ok(0);
        }
        Ok(self.ops.count(&self.collection).await?)
    }

    /// Drop every record by deleting and recreating the collection.
    ///
    /// # Errors
    ///
    /// Returns an error if an empty collection cannot be re-established.
    pub async fn reset(&self) -> Result<()> {
        if let Err(e) = self.ops.delete_collection(&self.collection).await {
            tracing::warn!(collection = %self.collection, "delete failed during reset: {e}");
        }
        if let Err(e) = self.ensure_collection().await {
            tracing::warn!(
                collection = %self.collection,
                "recreate failed during reset, retrying: {e}"
            );
            self.ensure_collection().await?;
        }
        tracing::info!(collection = %self.collection, "collection reset");
        Ok(())
    }

    /// True iff at least one record is stored. Backend errors count as not initialized.
    pub async fn is_initialized(&self) -> bool {
        match self.size().await {
            Ok(n) => n > 0,
            Err(e) => {
                tracing::warn!(collection = %self.collection, "size check failed: {e}");
                false
            }
        }
    }
}
