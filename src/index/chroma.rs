//! Chroma-backed [`VectorIndex`] over its REST API.
//!
//! Collection-level calls go through the tenant/database path; record calls
//! address the collection by id. Chroma computes distances itself, so the
//! distance metric follows the collection's configuration.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::models::IndexedEntry;

use super::{CollectionHandle, IndexError, IndexQueryResult, VectorIndex};

#[derive(Debug, Clone, Deserialize)]
struct CollectionInfo {
    id: String,
    name: String,
}

#[derive(Clone)]
pub struct ChromaIndex {
    http: Client,
    base_url: String,
    tenant: String,
    database: String,
}

impl ChromaIndex {
    pub fn new(base_url: &str) -> Result<Self, IndexError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            tenant: "default_tenant".to_string(),
            database: "default_database".to_string(),
        })
    }

    fn collections_url(&self) -> String {
        format!(
            "{}/api/v1/tenants/{}/databases/{}/collections",
            self.base_url, self.tenant, self.database
        )
    }

    fn record_url(&self, collection: &CollectionHandle, op: &str) -> String {
        format!("{}/api/v1/collections/{}/{}", self.base_url, collection.id, op)
    }

    async fn collections(&self) -> Result<Vec<CollectionInfo>, IndexError> {
        let resp = self.http.get(self.collections_url()).send().await?;
        let resp = check(resp, "List collections").await?;
        resp.json()
            .await
            .map_err(|e| IndexError::Deserialize(e.to_string()))
    }
}

/// Turns a non-success response into `IndexError::Http` with its body.
async fn check(resp: Response, what: &str) -> Result<Response, IndexError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    error!(status = %status, body = %text, "Chroma HTTP error");
    Err(IndexError::Http(format!(
        "{} failed ({}): {}",
        what, status, text
    )))
}

#[async_trait]
impl VectorIndex for ChromaIndex {
    fn backend(&self) -> &str {
        "chroma"
    }

    async fn create_collection(&self, name: &str) -> Result<CollectionHandle, IndexError> {
        if name.trim().is_empty() {
            return Err(IndexError::InvalidInput(
                "collection name must not be empty".to_string(),
            ));
        }
        let body = json!({
            "name": name,
            "get_or_create": false,
            "metadata": { "hnsw:space": "cosine" },
        });
        let resp = self
            .http
            .post(self.collections_url())
            .json(&body)
            .send()
            .await?;
        let resp = check(resp, "Create collection").await?;
        let text = resp.text().await?;
        let info: CollectionInfo = serde_json::from_str(&text)
            .map_err(|e| IndexError::Deserialize(format!("{}: {}", e, text)))?;
        info!(name = %info.name, id = %info.id, "Created Chroma collection");
        Ok(CollectionHandle {
            id: info.id,
            name: info.name,
        })
    }

    async fn list_collections(&self) -> Result<Vec<String>, IndexError> {
        Ok(self.collections().await?.into_iter().map(|c| c.name).collect())
    }

    async fn get_collection(&self, name: &str) -> Result<CollectionHandle, IndexError> {
        self.collections()
            .await?
            .into_iter()
            .find(|c| c.name == name)
            .map(|c| CollectionHandle {
                id: c.id,
                name: c.name,
            })
            .ok_or_else(|| IndexError::CollectionNotFound(name.to_string()))
    }

    async fn upsert(
        &self,
        collection: &CollectionHandle,
        entries: &[IndexedEntry],
    ) -> Result<(), IndexError> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut ids = Vec::with_capacity(entries.len());
        let mut documents = Vec::with_capacity(entries.len());
        let mut embeddings = Vec::with_capacity(entries.len());
        let mut metadatas = Vec::with_capacity(entries.len());
        for e in entries {
            ids.push(e.id.as_str());
            documents.push(e.text.as_str());
            embeddings.push(&e.embedding);
            metadatas.push(
                serde_json::to_value(&e.metadata)
                    .map_err(|err| IndexError::InvalidInput(err.to_string()))?,
            );
        }

        let body = json!({
            "ids": ids,
            "documents": documents,
            "embeddings": embeddings,
            "metadatas": metadatas,
        });
        let resp = self
            .http
            .post(self.record_url(collection, "upsert"))
            .json(&body)
            .send()
            .await?;
        check(resp, "Upsert").await?;

        info!(collection = %collection.name, count = entries.len(), "Upserted chunks");
        Ok(())
    }

    async fn delete_by_source(
        &self,
        collection: &CollectionHandle,
        source: &str,
    ) -> Result<(), IndexError> {
        let body = json!({ "where": { "source": source } });
        let resp = self
            .http
            .post(self.record_url(collection, "delete"))
            .json(&body)
            .send()
            .await?;
        check(resp, "Delete").await?;
        debug!(collection = %collection.name, source, "Deleted chunks for source");
        Ok(())
    }

    async fn query(
        &self,
        collection: &CollectionHandle,
        embedding: &[f32],
        k: usize,
    ) -> Result<IndexQueryResult, IndexError> {
        let body = json!({
            "query_embeddings": [embedding],
            "n_results": k,
            "include": ["documents", "metadatas", "distances"],
        });
        debug!(collection = %collection.name, n_results = k, "Querying collection");
        let resp = self
            .http
            .post(self.record_url(collection, "query"))
            .json(&body)
            .send()
            .await?;
        let resp = check(resp, "Query").await?;
        let raw: Value = resp.json().await?;
        serde_json::from_value(raw).map_err(|e| IndexError::Deserialize(e.to_string()))
    }

    async fn count(&self, collection: &CollectionHandle) -> Result<usize, IndexError> {
        let resp = self
            .http
            .get(self.record_url(collection, "count"))
            .send()
            .await?;
        let resp = check(resp, "Count").await?;
        resp.json()
            .await
            .map_err(|e| IndexError::Deserialize(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_follow_tenant_and_collection_layout() {
        let index = ChromaIndex::new("http://localhost:8000/").unwrap();
        assert_eq!(
            index.collections_url(),
            "http://localhost:8000/api/v1/tenants/default_tenant/databases/default_database/collections"
        );
        let handle = CollectionHandle {
            id: "abc".to_string(),
            name: "enterprise_docs".to_string(),
        };
        assert_eq!(
            index.record_url(&handle, "query"),
            "http://localhost:8000/api/v1/collections/abc/query"
        );
    }

    #[test]
    fn query_result_tolerates_missing_sections() {
        let raw = json!({ "ids": [["a"]], "distances": [[0.25]] });
        let parsed: IndexQueryResult = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.ids, vec![vec!["a".to_string()]]);
        assert!(parsed.documents.is_none());
        assert_eq!(parsed.distances, Some(vec![vec![0.25]]));
    }
}
