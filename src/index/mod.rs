//! Vector index service abstraction.
//!
//! The [`VectorIndex`] trait is the boundary to whatever stores embeddings:
//! named collections of [`IndexedEntry`] records, idempotent upsert keyed by
//! id, and k-nearest-neighbour queries returning ascending distances.
//!
//! | Backend | Type | Notes |
//! |---------|------|-------|
//! | `local` | [`LocalIndex`] | in-process, brute-force cosine distance, JSON snapshots on disk |
//! | `chroma` | [`ChromaIndex`] | Chroma REST API (v1) |
//!
//! Implementations provide their own concurrency control; callers do not
//! add locking around them.

pub mod chroma;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::config::IndexConfig;
use crate::models::IndexedEntry;

pub use chroma::ChromaIndex;
pub use memory::LocalIndex;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Index HTTP error: {0}")]
    Http(String),
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Deserialization error: {0}")]
    Deserialize(String),
    #[error("Index persistence error: {0}")]
    Persist(String),
    #[error("Index lock poisoned")]
    LockPoisoned,
    #[error("Embedding dimension mismatch for {id}: stored {stored}, query {query}; re-ingest after changing the embedding model")]
    DimensionMismatch {
        id: String,
        stored: usize,
        query: usize,
    },
}

impl From<reqwest::Error> for IndexError {
    fn from(e: reqwest::Error) -> Self {
        IndexError::Http(e.to_string())
    }
}

/// Reference to a collection inside a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionHandle {
    pub id: String,
    pub name: String,
}

/// Raw query result in the nested per-query-batch shape. Only single-query
/// batches are ever issued, so every outer list has at most one element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexQueryResult {
    pub ids: Vec<Vec<String>>,
    #[serde(default)]
    pub documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    pub metadatas: Option<Vec<Vec<Option<serde_json::Value>>>>,
    #[serde(default)]
    pub distances: Option<Vec<Vec<f32>>>,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Short backend label for logs (e.g. `"local"`).
    fn backend(&self) -> &str;

    /// Creates a new collection. Fails if the name is already taken.
    async fn create_collection(&self, name: &str) -> Result<CollectionHandle, IndexError>;

    async fn list_collections(&self) -> Result<Vec<String>, IndexError>;

    async fn get_collection(&self, name: &str) -> Result<CollectionHandle, IndexError>;

    /// Inserts or replaces entries by id.
    async fn upsert(
        &self,
        collection: &CollectionHandle,
        entries: &[IndexedEntry],
    ) -> Result<(), IndexError>;

    /// Removes every entry whose metadata `source` equals `source`.
    async fn delete_by_source(
        &self,
        collection: &CollectionHandle,
        source: &str,
    ) -> Result<(), IndexError>;

    /// Swaps a document's entries for `entries`.
    ///
    /// The default runs [`delete_by_source`](Self::delete_by_source) then
    /// [`upsert`](Self::upsert); if the upsert fails the document has no
    /// entries until it is ingested again. Backends that can apply both in
    /// one step override this.
    async fn replace_source(
        &self,
        collection: &CollectionHandle,
        source: &str,
        entries: &[IndexedEntry],
    ) -> Result<(), IndexError> {
        self.delete_by_source(collection, source).await?;
        self.upsert(collection, entries).await
    }

    /// Returns up to `k` nearest entries, documents, metadatas and
    /// distances included, in ascending distance order.
    async fn query(
        &self,
        collection: &CollectionHandle,
        embedding: &[f32],
        k: usize,
    ) -> Result<IndexQueryResult, IndexError>;

    async fn count(&self, collection: &CollectionHandle) -> Result<usize, IndexError>;
}

/// Reuses `name` if the backend lists it, otherwise creates it.
///
/// Returns the handle and whether it was newly created.
pub async fn get_or_create_collection(
    index: &dyn VectorIndex,
    name: &str,
) -> Result<(CollectionHandle, bool), IndexError> {
    let existing = index.list_collections().await?;
    if existing.iter().any(|c| c == name) {
        let handle = index.get_collection(name).await?;
        info!(backend = index.backend(), collection = %name, "Reusing collection");
        return Ok((handle, false));
    }

    let handle = index.create_collection(name).await?;
    info!(backend = index.backend(), collection = %name, "Created collection");
    Ok((handle, true))
}

/// Opens the backend named in `[index]`.
pub fn open_index(config: &IndexConfig) -> anyhow::Result<Arc<dyn VectorIndex>> {
    match config.backend.as_str() {
        "local" => Ok(Arc::new(LocalIndex::open(config.path.clone())?)),
        "chroma" => Ok(Arc::new(ChromaIndex::new(&config.url)?)),
        other => anyhow::bail!("Unknown index backend: {}", other),
    }
}
