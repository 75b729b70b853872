//! In-process [`VectorIndex`] implementation.
//!
//! Collections live in a `HashMap` behind `std::sync::RwLock`; entries are
//! keyed by id so upsert replaces. Queries are brute-force cosine distance
//! (`1 - cos`) over every entry in the collection, ties broken by id.
//!
//! With a persistence directory, each collection is snapshotted to
//! `<dir>/<collection>.json` after every mutation and reloaded on open.
//! A mutation is applied to a copy, written out, and only then swapped in,
//! so a failed snapshot leaves both memory and disk at the previous state.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::embedding::cosine_similarity;
use crate::models::IndexedEntry;

use super::{CollectionHandle, IndexError, IndexQueryResult, VectorIndex};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct StoredCollection {
    name: String,
    entries: BTreeMap<String, IndexedEntry>,
}

pub struct LocalIndex {
    path: Option<PathBuf>,
    collections: RwLock<HashMap<String, StoredCollection>>,
}

impl LocalIndex {
    /// Purely in-memory index; nothing touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Opens (or initializes) an index persisted under `path`.
    pub fn open(path: Option<PathBuf>) -> Result<Self, IndexError> {
        let dir = match path {
            Some(dir) => dir,
            None => return Ok(Self::in_memory()),
        };

        std::fs::create_dir_all(&dir).map_err(|e| persist_err(&dir, e))?;

        let mut collections = HashMap::new();
        let listing = std::fs::read_dir(&dir).map_err(|e| persist_err(&dir, e))?;
        for entry in listing {
            let file = entry.map_err(|e| persist_err(&dir, e))?.path();
            if file.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let raw = std::fs::read(&file).map_err(|e| persist_err(&file, e))?;
            let stored: StoredCollection = serde_json::from_slice(&raw)
                .map_err(|e| IndexError::Deserialize(format!("{}: {}", file.display(), e)))?;
            debug!(collection = %stored.name, entries = stored.entries.len(), "Loaded collection snapshot");
            collections.insert(stored.name.clone(), stored);
        }

        Ok(Self {
            path: Some(dir),
            collections: RwLock::new(collections),
        })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, StoredCollection>>, IndexError> {
        self.collections.read().map_err(|_| IndexError::LockPoisoned)
    }

    fn write(
        &self,
    ) -> Result<RwLockWriteGuard<'_, HashMap<String, StoredCollection>>, IndexError> {
        self.collections.write().map_err(|_| IndexError::LockPoisoned)
    }

    /// Writes a collection snapshot. Called with the write lock held, so
    /// snapshots of one collection never interleave.
    fn persist(&self, collection: &StoredCollection) -> Result<(), IndexError> {
        let dir = match &self.path {
            Some(dir) => dir,
            None => return Ok(()),
        };

        let file = dir.join(format!("{}.json", snapshot_name(&collection.name)));
        let tmp = file.with_extension("json.tmp");
        let bytes = serde_json::to_vec(collection)
            .map_err(|e| IndexError::Persist(e.to_string()))?;
        std::fs::write(&tmp, bytes).map_err(|e| persist_err(&tmp, e))?;
        std::fs::rename(&tmp, &file).map_err(|e| persist_err(&file, e))?;
        Ok(())
    }

    /// Applies `change` to a copy of the collection. When it reports a
    /// change, the copy is persisted and then replaces the live collection.
    fn commit<F>(&self, collection: &CollectionHandle, change: F) -> Result<(), IndexError>
    where
        F: FnOnce(&mut StoredCollection) -> bool,
    {
        let mut collections = self.write()?;
        let live = collections
            .get_mut(&collection.name)
            .ok_or_else(|| IndexError::CollectionNotFound(collection.name.clone()))?;
        let mut next = live.clone();
        if !change(&mut next) {
            return Ok(());
        }
        self.persist(&next)?;
        *live = next;
        Ok(())
    }
}

impl Default for LocalIndex {
    fn default() -> Self {
        Self::in_memory()
    }
}

fn persist_err(path: &Path, e: std::io::Error) -> IndexError {
    IndexError::Persist(format!("{}: {}", path.display(), e))
}

/// Collection names become file names; anything unusual is replaced.
fn snapshot_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn handle(name: &str) -> CollectionHandle {
    CollectionHandle {
        id: name.to_string(),
        name: name.to_string(),
    }
}

#[async_trait]
impl VectorIndex for LocalIndex {
    fn backend(&self) -> &str {
        "local"
    }

    async fn create_collection(&self, name: &str) -> Result<CollectionHandle, IndexError> {
        if name.trim().is_empty() {
            return Err(IndexError::InvalidInput(
                "collection name must not be empty".to_string(),
            ));
        }
        let mut collections = self.write()?;
        if collections.contains_key(name) {
            return Err(IndexError::InvalidInput(format!(
                "collection already exists: {}",
                name
            )));
        }
        let stored = StoredCollection {
            name: name.to_string(),
            entries: BTreeMap::new(),
        };
        self.persist(&stored)?;
        collections.insert(name.to_string(), stored);
        Ok(handle(name))
    }

    async fn list_collections(&self) -> Result<Vec<String>, IndexError> {
        let mut names: Vec<String> = self.read()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn get_collection(&self, name: &str) -> Result<CollectionHandle, IndexError> {
        if self.read()?.contains_key(name) {
            Ok(handle(name))
        } else {
            Err(IndexError::CollectionNotFound(name.to_string()))
        }
    }

    async fn upsert(
        &self,
        collection: &CollectionHandle,
        entries: &[IndexedEntry],
    ) -> Result<(), IndexError> {
        self.commit(collection, |stored| {
            for entry in entries {
                stored.entries.insert(entry.id.clone(), entry.clone());
            }
            true
        })
    }

    async fn delete_by_source(
        &self,
        collection: &CollectionHandle,
        source: &str,
    ) -> Result<(), IndexError> {
        self.commit(collection, |stored| {
            let before = stored.entries.len();
            stored.entries.retain(|_, e| e.metadata.source != source);
            stored.entries.len() != before
        })
    }

    async fn replace_source(
        &self,
        collection: &CollectionHandle,
        source: &str,
        entries: &[IndexedEntry],
    ) -> Result<(), IndexError> {
        self.commit(collection, |stored| {
            stored.entries.retain(|_, e| e.metadata.source != source);
            for entry in entries {
                stored.entries.insert(entry.id.clone(), entry.clone());
            }
            true
        })
    }

    async fn query(
        &self,
        collection: &CollectionHandle,
        embedding: &[f32],
        k: usize,
    ) -> Result<IndexQueryResult, IndexError> {
        let collections = self.read()?;
        let stored = collections
            .get(&collection.name)
            .ok_or_else(|| IndexError::CollectionNotFound(collection.name.clone()))?;

        if let Some(e) = stored
            .entries
            .values()
            .find(|e| e.embedding.len() != embedding.len())
        {
            warn!(
                collection = %collection.name,
                id = %e.id,
                stored = e.embedding.len(),
                query = embedding.len(),
                "Stored embedding dimension differs from query"
            );
            return Err(IndexError::DimensionMismatch {
                id: e.id.clone(),
                stored: e.embedding.len(),
                query: embedding.len(),
            });
        }

        let mut scored: Vec<(f32, &IndexedEntry)> = stored
            .entries
            .values()
            .map(|e| (1.0 - cosine_similarity(embedding, &e.embedding), e))
            .collect();
        scored.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.id.cmp(&b.1.id))
        });
        scored.truncate(k);

        let mut ids = Vec::with_capacity(scored.len());
        let mut documents = Vec::with_capacity(scored.len());
        let mut metadatas = Vec::with_capacity(scored.len());
        let mut distances = Vec::with_capacity(scored.len());
        for (distance, entry) in scored {
            ids.push(entry.id.clone());
            documents.push(Some(entry.text.clone()));
            metadatas.push(Some(serde_json::to_value(&entry.metadata).map_err(|e| {
                IndexError::Deserialize(e.to_string())
            })?));
            distances.push(distance);
        }

        Ok(IndexQueryResult {
            ids: vec![ids],
            documents: Some(vec![documents]),
            metadatas: Some(vec![metadatas]),
            distances: Some(vec![distances]),
        })
    }

    async fn count(&self, collection: &CollectionHandle) -> Result<usize, IndexError> {
        self.read()?
            .get(&collection.name)
            .map(|c| c.entries.len())
            .ok_or_else(|| IndexError::CollectionNotFound(collection.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::get_or_create_collection;
    use crate::models::ChunkMetadata;
    use tempfile::TempDir;

    fn entry(id: &str, source: &str, embedding: Vec<f32>) -> IndexedEntry {
        IndexedEntry {
            id: id.to_string(),
            embedding,
            text: format!("text of {}", id),
            metadata: ChunkMetadata {
                source: source.to_string(),
            },
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent_by_id() {
        let index = LocalIndex::in_memory();
        let coll = index.create_collection("docs").await.unwrap();
        let batch = vec![entry("a#0", "a", vec![1.0, 0.0]), entry("a#1", "a", vec![0.0, 1.0])];
        index.upsert(&coll, &batch).await.unwrap();
        index.upsert(&coll, &batch).await.unwrap();
        assert_eq!(index.count(&coll).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn duplicate_collection_is_rejected_and_reused() {
        let index = LocalIndex::in_memory();
        let (_, created) = get_or_create_collection(&index, "docs").await.unwrap();
        assert!(created);
        let (_, created_again) = get_or_create_collection(&index, "docs").await.unwrap();
        assert!(!created_again);
        assert!(index.create_collection("docs").await.is_err());
        assert_eq!(index.list_collections().await.unwrap(), vec!["docs".to_string()]);
    }

    #[tokio::test]
    async fn query_orders_by_ascending_distance_and_limits_k() {
        let index = LocalIndex::in_memory();
        let coll = index.create_collection("docs").await.unwrap();
        index
            .upsert(
                &coll,
                &[
                    entry("far", "x", vec![-1.0, 0.0]),
                    entry("near", "x", vec![1.0, 0.1]),
                    entry("mid", "x", vec![0.0, 1.0]),
                ],
            )
            .await
            .unwrap();

        let res = index.query(&coll, &[1.0, 0.0], 2).await.unwrap();
        assert_eq!(res.ids[0], vec!["near".to_string(), "mid".to_string()]);
        let d = &res.distances.unwrap()[0];
        assert!(d[0] <= d[1]);
    }

    #[tokio::test]
    async fn delete_by_source_removes_only_that_document() {
        let index = LocalIndex::in_memory();
        let coll = index.create_collection("docs").await.unwrap();
        index
            .upsert(
                &coll,
                &[entry("a#0", "a", vec![1.0]), entry("b#0", "b", vec![1.0])],
            )
            .await
            .unwrap();
        index.delete_by_source(&coll, "a").await.unwrap();
        let res = index.query(&coll, &[1.0], 10).await.unwrap();
        assert_eq!(res.ids[0], vec!["b#0".to_string()]);
    }

    #[tokio::test]
    async fn unknown_collection_is_not_found() {
        let index = LocalIndex::in_memory();
        let err = index.get_collection("missing").await.unwrap_err();
        assert!(matches!(err, IndexError::CollectionNotFound(_)));
    }

    #[tokio::test]
    async fn mismatched_dimensions_fail_the_query() {
        let index = LocalIndex::in_memory();
        let coll = index.create_collection("docs").await.unwrap();
        index
            .upsert(&coll, &[entry("old#0", "old", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap();
        let err = index.query(&coll, &[1.0, 0.0], 3).await.unwrap_err();
        assert!(matches!(
            err,
            IndexError::DimensionMismatch { stored: 3, query: 2, .. }
        ));
    }

    #[tokio::test]
    async fn replace_source_swaps_only_that_document() {
        let index = LocalIndex::in_memory();
        let coll = index.create_collection("docs").await.unwrap();
        index
            .upsert(
                &coll,
                &[
                    entry("a#0", "a", vec![1.0]),
                    entry("a#1", "a", vec![1.0]),
                    entry("b#0", "b", vec![1.0]),
                ],
            )
            .await
            .unwrap();
        index
            .replace_source(&coll, "a", &[entry("a#0", "a", vec![1.0])])
            .await
            .unwrap();
        let res = index.query(&coll, &[1.0], 10).await.unwrap();
        assert_eq!(res.ids[0], vec!["a#0".to_string(), "b#0".to_string()]);
    }

    #[tokio::test]
    async fn failed_snapshot_leaves_collection_unchanged() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("index");
        let index = LocalIndex::open(Some(dir.clone())).unwrap();
        let coll = index.create_collection("docs").await.unwrap();
        index
            .upsert(&coll, &[entry("a#0", "a", vec![1.0]), entry("a#1", "a", vec![1.0])])
            .await
            .unwrap();

        std::fs::remove_dir_all(&dir).unwrap();

        let err = index
            .replace_source(&coll, "a", &[entry("a#0", "a", vec![1.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Persist(_)));
        assert!(index.delete_by_source(&coll, "a").await.is_err());
        assert!(index.upsert(&coll, &[entry("b#0", "b", vec![1.0])]).await.is_err());
        assert_eq!(index.count(&coll).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn snapshots_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        {
            let index = LocalIndex::open(Some(tmp.path().to_path_buf())).unwrap();
            let coll = index.create_collection("enterprise_docs").await.unwrap();
            index
                .upsert(&coll, &[entry("a#0", "a", vec![0.5, 0.5])])
                .await
                .unwrap();
        }
        let reopened = LocalIndex::open(Some(tmp.path().to_path_buf())).unwrap();
        let coll = reopened.get_collection("enterprise_docs").await.unwrap();
        assert_eq!(reopened.count(&coll).await.unwrap(), 1);
    }
}
