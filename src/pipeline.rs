//! Pipeline orchestration.
//!
//! [`Pipeline`] is built once per process and owns the embedder, the index
//! client and (when answering queries) the generator. It drives the two
//! flows:
//!
//! ```text
//! bulk ingestion:  load data dir → chunk → embed → upsert
//! query:           embed question → retrieve top-k → assemble context
//!                    ├─ empty context ───────────→ fixed no-context answer
//!                    └─ prompt → generate ─┬─ ok → answer + sources
//!                                          └─ err → error answer, no sources
//! ```
//!
//! Query answers are fail-soft: generation errors become an answer string,
//! never an `Err`. Ingestions are serialized so uploads racing each other
//! cannot interleave their writes to the data directory.

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::embedding::{create_provider, embed_query, EmbeddingProvider};
use crate::generation::{build_prompt, create_generator, Generator};
use crate::index::{open_index, CollectionHandle, IndexError, VectorIndex};
use crate::indexer::{ingest_documents, IngestReport};
use crate::loader::load_documents;
use crate::models::{IngestResponse, IngestStatus, QueryResponse, UploadedFile};
use crate::retrieve::{assemble_context, retrieve};

pub const NO_CONTEXT_ANSWER: &str = "No relevant context found in the ingested documents.";
pub const NO_DOCUMENTS_MESSAGE: &str = "No readable documents found.";

/// How a query was resolved. Logged once per query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    Answered,
    NoContext,
    GenerationFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStatus {
    pub collection: String,
    pub entries: usize,
}

pub struct Pipeline {
    config: Config,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    generator: Option<Arc<dyn Generator>>,
    collection: String,
    ingest_lock: Mutex<()>,
}

impl Pipeline {
    pub fn new(
        config: Config,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        generator: Option<Arc<dyn Generator>>,
    ) -> Self {
        let collection = config.index.collection.clone();
        Self {
            config,
            embedder,
            index,
            generator,
            collection,
            ingest_lock: Mutex::new(()),
        }
    }

    /// Builds every collaborator from configuration. Errors here mean a
    /// backing model is unavailable and the process should exit.
    pub fn from_config(config: Config, needs_generator: bool) -> Result<Self> {
        let embedder =
            create_provider(&config.embedding).context("Failed to initialize embedding model")?;
        let index = open_index(&config.index).context("Failed to open vector index")?;
        let generator = if needs_generator {
            Some(create_generator(&config.generation).context("Failed to initialize generator")?)
        } else {
            None
        };

        info!(
            embedding = embedder.model_name(),
            index = index.backend(),
            generator = generator.as_ref().map(|g| g.model_name()).unwrap_or("none"),
            "Pipeline ready"
        );

        Ok(Self::new(config, embedder, index, generator))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Process-start ingestion. An empty data directory still leaves an
    /// (empty) collection behind.
    pub async fn startup(&self) -> Result<IngestReport> {
        info!(dir = %self.config.data.dir.display(), "Running startup ingestion");
        self.ingest_directory().await
    }

    /// Re-ingests everything currently in the data directory.
    pub async fn ingest_directory(&self) -> Result<IngestReport> {
        let _guard = self.ingest_lock.lock().await;
        let dir = &self.config.data.dir;
        ensure_dir(dir)?;
        let docs = load_documents(dir)?;
        ingest_documents(&self.config, self.embedder.as_ref(), self.index.as_ref(), &docs).await
    }

    /// Stores uploaded files in the data directory and re-ingests it.
    ///
    /// Only the final path component of each upload name is used. When the
    /// directory then holds no loadable documents the index is left alone
    /// and a failed status is returned.
    pub async fn ingest_uploads(&self, files: Vec<UploadedFile>) -> Result<IngestResponse> {
        let _guard = self.ingest_lock.lock().await;
        let dir = &self.config.data.dir;
        ensure_dir(dir)?;

        for file in &files {
            let name = match upload_file_name(&file.name) {
                Some(name) => name,
                None => {
                    warn!(name = %file.name, "Rejecting upload with unusable file name");
                    continue;
                }
            };
            let target = dir.join(name);
            std::fs::write(&target, &file.bytes)
                .with_context(|| format!("Failed to write upload {}", target.display()))?;
            info!(file = %name, bytes = file.bytes.len(), "Stored upload");
        }

        let docs = load_documents(dir)?;
        if docs.is_empty() {
            warn!(uploads = files.len(), "Upload produced no readable documents");
            return Ok(IngestResponse {
                status: IngestStatus::Failed,
                message: NO_DOCUMENTS_MESSAGE.to_string(),
            });
        }

        let report =
            ingest_documents(&self.config, self.embedder.as_ref(), self.index.as_ref(), &docs)
                .await?;
        Ok(IngestResponse {
            status: IngestStatus::Success,
            message: format!("{} documents ingested successfully.", report.documents),
        })
    }

    /// Answers `question` from the indexed documents.
    ///
    /// Embedding and retrieval failures are returned as errors; generation
    /// failures are folded into the answer.
    pub async fn query(&self, question: &str) -> Result<QueryResponse> {
        let (response, outcome) = self.answer(question).await?;
        info!(
            outcome = ?outcome,
            sources = response.sources.len(),
            "Query resolved"
        );
        Ok(response)
    }

    async fn answer(&self, question: &str) -> Result<(QueryResponse, QueryOutcome)> {
        if question.trim().is_empty() {
            return Ok(no_context());
        }

        let collection = match self.find_collection().await? {
            Some(c) => c,
            None => return Ok(no_context()),
        };

        let query_embedding = embed_query(self.embedder.as_ref(), question)
            .await
            .context("Failed to embed question")?;
        let result = retrieve(
            self.index.as_ref(),
            &collection,
            &query_embedding,
            self.config.retrieval.top_k,
        )
        .await?
        .within_distance(self.config.retrieval.max_distance);

        let context = match assemble_context(&result, self.config.retrieval.max_context_chars) {
            Some(ctx) => ctx,
            None => return Ok(no_context()),
        };

        let generator = match &self.generator {
            Some(g) => g,
            None => bail!("No generator configured; cannot answer queries"),
        };

        let prompt = build_prompt(&context.text, question);
        match generator
            .generate(&prompt, self.config.generation.max_tokens)
            .await
        {
            Ok(answer) => Ok((
                QueryResponse {
                    answer,
                    sources: context.sources,
                },
                QueryOutcome::Answered,
            )),
            Err(e) => {
                let message = format!("{:#}", e);
                error!(model = generator.model_name(), error = %message, "Generation failed");
                Ok((
                    QueryResponse {
                        answer: format!("⚠️ Error generating response: {}", message),
                        sources: Vec::new(),
                    },
                    QueryOutcome::GenerationFailed,
                ))
            }
        }
    }

    pub async fn status(&self) -> Result<PipelineStatus> {
        let entries = match self.find_collection().await? {
            Some(c) => self.index.count(&c).await?,
            None => 0,
        };
        Ok(PipelineStatus {
            collection: self.collection.clone(),
            entries,
        })
    }

    async fn find_collection(&self) -> Result<Option<CollectionHandle>> {
        match self.index.get_collection(&self.collection).await {
            Ok(handle) => Ok(Some(handle)),
            Err(IndexError::CollectionNotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn no_context() -> (QueryResponse, QueryOutcome) {
    (
        QueryResponse {
            answer: NO_CONTEXT_ANSWER.to_string(),
            sources: Vec::new(),
        },
        QueryOutcome::NoContext,
    )
}

fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create data directory {}", dir.display()))
}

/// Final path component of an upload name, if it names a regular file.
fn upload_file_name(name: &str) -> Option<&str> {
    let base = name.rsplit(|c| c == '/' || c == '\\').next()?.trim();
    match base {
        "" | "." | ".." => None,
        _ => Some(base),
    }
}
