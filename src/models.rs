//! Core data models used throughout the pipeline.
//!
//! These types represent the documents, chunks, index entries, and
//! query-time results that flow through ingestion and retrieval.

use serde::{Deserialize, Serialize};

/// File formats the loader recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Text,
    Markdown,
    Pdf,
    Csv,
}

impl SourceType {
    /// Maps a file extension (without the dot, any case) to a source type.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "txt" => Some(SourceType::Text),
            "md" => Some(SourceType::Markdown),
            "pdf" => Some(SourceType::Pdf),
            "csv" => Some(SourceType::Csv),
            _ => None,
        }
    }
}

/// A loaded file, normalized to plain text. `id` is the file path.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub id: String,
    pub text: String,
    pub source_type: SourceType,
}

/// A window of a document's text. Offsets are character positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub source_document_id: String,
    pub offset_start: usize,
    pub offset_end: usize,
}

/// Metadata stored alongside every indexed chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
}

/// One record in the vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedEntry {
    pub id: String,
    pub embedding: Vec<f32>,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A single hit from the index, ready for context assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub text: String,
    pub metadata: ChunkMetadata,
    pub distance: f32,
}

/// Nearest chunks for one query, most similar first.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub chunks: Vec<RetrievedChunk>,
    pub k: usize,
}

/// Bounded context text plus the sources of every retrieved chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledContext {
    pub text: String,
    pub sources: Vec<ChunkMetadata>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestStatus {
    Success,
    Failed,
}

/// Result of an upload ingestion, as returned to API callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResponse {
    pub status: IngestStatus,
    pub message: String,
}

/// Answer to a question, as returned to API callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<ChunkMetadata>,
}

/// A file received through the upload surface.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}
