//! Ingestion into the vector index.
//!
//! For every document: chunk, embed (in `embedding.batch_size` batches),
//! then replace the document's previous entries with the new ones keyed by
//! `"{document_id}#{index}"`. Running it twice over the same documents
//! leaves the collection unchanged, so a run that failed part way is
//! repaired by running it again.

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::chunk::chunk_document;
use crate::config::Config;
use crate::embedding::{embed_batched, EmbeddingProvider};
use crate::index::{get_or_create_collection, CollectionHandle, VectorIndex};
use crate::models::{ChunkMetadata, IndexedEntry, RawDocument};

/// Summary of one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub collection: CollectionHandle,
    pub documents: usize,
    pub chunks: usize,
}

/// Indexes `docs` into the configured collection, creating it on first use.
pub async fn ingest_documents(
    config: &Config,
    embedder: &dyn EmbeddingProvider,
    index: &dyn VectorIndex,
    docs: &[RawDocument],
) -> Result<IngestReport> {
    let (collection, _) = get_or_create_collection(index, &config.index.collection)
        .await
        .with_context(|| format!("Failed to open collection '{}'", config.index.collection))?;

    let mut chunks_written = 0usize;
    for doc in docs {
        chunks_written += index_document(config, embedder, index, &collection, doc).await?;
    }

    info!(
        collection = %collection.name,
        documents = docs.len(),
        chunks = chunks_written,
        "Ingestion complete"
    );

    Ok(IngestReport {
        collection,
        documents: docs.len(),
        chunks: chunks_written,
    })
}

async fn index_document(
    config: &Config,
    embedder: &dyn EmbeddingProvider,
    index: &dyn VectorIndex,
    collection: &CollectionHandle,
    doc: &RawDocument,
) -> Result<usize> {
    let chunks = chunk_document(doc, &config.chunking);
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embed_batched(embedder, &texts, config.embedding.batch_size)
        .await
        .with_context(|| format!("Failed to embed {}", doc.id))?;

    let entries: Vec<IndexedEntry> = chunks
        .into_iter()
        .zip(vectors)
        .map(|(chunk, embedding)| IndexedEntry {
            id: chunk.id,
            embedding,
            text: chunk.text,
            metadata: ChunkMetadata {
                source: chunk.source_document_id,
            },
        })
        .collect();

    index
        .replace_source(collection, &doc.id, &entries)
        .await
        .with_context(|| format!("Failed to write chunks for {}", doc.id))?;

    debug!(document = %doc.id, chunks = entries.len(), "Indexed document");
    Ok(entries.len())
}
