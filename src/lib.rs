//! # ragflow
//!
//! Retrieval-augmented question answering over a directory of documents.
//!
//! Files are normalized to text, split into overlapping fixed-size windows,
//! embedded, and upserted into a vector index. At query time the question is
//! embedded, the nearest chunks are joined into a bounded context, and an
//! external generator answers from that context.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Loader  │──▶│ Chunker │──▶│   Indexer    │──▶│ Vector index │
//! │ txt/md/  │   │ windows │   │ embed+upsert │   │ local/chroma │
//! │ pdf/csv  │   └─────────┘   └──────────────┘   └──────┬───────┘
//! └──────────┘                                           │
//!                      ┌─────────────────────────────────┤
//!                      ▼                                 ▼
//!                ┌───────────┐   context    ┌──────────────────┐
//!                │ Retriever │─────────────▶│    Generator     │
//!                └───────────┘              └──────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`observability`] | Logging setup |
//! | [`models`] | Core data types |
//! | [`extract`] | Per-format text extraction |
//! | [`loader`] | Directory scanning and document normalization |
//! | [`chunk`] | Overlapping character windows |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Vector index abstraction and backends |
//! | [`indexer`] | Chunk, embed and upsert documents |
//! | [`retrieve`] | Nearest-chunk retrieval and context assembly |
//! | [`generation`] | Answer generation providers and prompt |
//! | [`pipeline`] | Ingestion and query flows |
//! | [`server`] | HTTP API |

pub mod chunk;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod generation;
pub mod index;
pub mod indexer;
pub mod loader;
pub mod models;
pub mod observability;
pub mod pipeline;
pub(crate) mod retry;
pub mod retrieve;
pub mod server;
