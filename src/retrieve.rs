//! Query-time retrieval and context assembly.
//!
//! [`retrieve`] asks the index for the `k` nearest chunks and validates the
//! nested response into a [`RetrievalResult`]. Ordering is whatever
//! ascending-distance order the index returns; nothing is re-ranked here.
//!
//! [`assemble_context`] joins the chunk texts with [`CONTEXT_SEPARATOR`],
//! keeps a left-anchored prefix of at most `max_chars` characters, and
//! reports the metadata of every retrieved chunk, including chunks whose
//! text was cut by truncation.

use anyhow::{bail, Context, Result};

use crate::index::{CollectionHandle, IndexQueryResult, VectorIndex};
use crate::models::{AssembledContext, ChunkMetadata, RetrievalResult, RetrievedChunk};

pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

pub async fn retrieve(
    index: &dyn VectorIndex,
    collection: &CollectionHandle,
    query_embedding: &[f32],
    k: usize,
) -> Result<RetrievalResult> {
    let raw = index
        .query(collection, query_embedding, k)
        .await
        .with_context(|| format!("Query against '{}' failed", collection.name))?;
    RetrievalResult::from_query_response(raw, k)
}

impl RetrievalResult {
    /// Validates a single-batch index response.
    ///
    /// A response with no batch at all is an empty result. Every section
    /// that is present must have one element per id; extra results beyond
    /// `k` are dropped.
    pub fn from_query_response(raw: IndexQueryResult, k: usize) -> Result<Self> {
        let ids = match raw.ids.into_iter().next() {
            Some(ids) if !ids.is_empty() => ids,
            _ => return Ok(Self { chunks: Vec::new(), k }),
        };
        let n = ids.len();

        let documents = first_batch(raw.documents, n, "documents")?;
        let metadatas = first_batch(raw.metadatas, n, "metadatas")?;
        let distances = first_batch(raw.distances, n, "distances")?;

        let mut chunks = Vec::with_capacity(n.min(k));
        for (((id, text), metadata), distance) in ids
            .into_iter()
            .zip(documents)
            .zip(metadatas)
            .zip(distances)
            .take(k)
        {
            let metadata: ChunkMetadata = match metadata {
                Some(value) => serde_json::from_value(value)
                    .with_context(|| format!("Invalid metadata for {}", id))?,
                None => bail!("Index returned no metadata for {}", id),
            };
            chunks.push(RetrievedChunk {
                text: text.unwrap_or_default(),
                metadata,
                distance,
            });
        }

        Ok(Self { chunks, k })
    }

    /// Drops chunks farther than `max_distance`, keeping order.
    pub fn within_distance(mut self, max_distance: Option<f32>) -> Self {
        if let Some(max) = max_distance {
            self.chunks.retain(|c| c.distance <= max);
        }
        self
    }
}

fn first_batch<T>(section: Option<Vec<Vec<T>>>, expected: usize, name: &str) -> Result<Vec<T>> {
    let batch = section
        .with_context(|| format!("Index response is missing {}", name))?
        .into_iter()
        .next()
        .unwrap_or_default();
    if batch.len() != expected {
        bail!(
            "Index response has {} {} for {} ids",
            batch.len(),
            name,
            expected
        );
    }
    Ok(batch)
}

/// Builds the bounded context, or `None` when there is nothing to ground
/// an answer on.
pub fn assemble_context(result: &RetrievalResult, max_chars: usize) -> Option<AssembledContext> {
    let joined = result
        .chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR);

    if joined.trim().is_empty() {
        return None;
    }

    Some(AssembledContext {
        text: truncate_chars(&joined, max_chars).to_string(),
        sources: result.chunks.iter().map(|c| c.metadata.clone()).collect(),
    })
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}
