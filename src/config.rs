//! TOML configuration for the pipeline.
//!
//! Every section has defaults, so an empty file (or [`Config::minimal`])
//! yields a working local setup: files under `./data`, the in-process
//! vector index under `./index`, fastembed embeddings and an Ollama
//! generator.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    /// Directory scanned by bulk ingestion and written to by uploads.
    #[serde(default = "default_data_dir")]
    pub dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

/// Window sizes are measured in characters, not bytes.
#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    800
}
fn default_overlap() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
    /// Results farther than this are dropped before context assembly.
    #[serde(default)]
    pub max_distance: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_context_chars: default_max_context_chars(),
            max_distance: None,
        }
    }
}

fn default_top_k() -> usize {
    3
}
fn default_max_context_chars() -> usize {
    6000
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// `"local"` (in-process, JSON-persisted) or `"chroma"` (REST).
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Persistence directory for the local backend. `None` keeps it in memory.
    #[serde(default = "default_index_path")]
    pub path: Option<PathBuf>,
    #[serde(default = "default_chroma_url")]
    pub url: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            collection: default_collection(),
            path: default_index_path(),
            url: default_chroma_url(),
        }
    }
}

fn default_backend() -> String {
    "local".to_string()
}
fn default_collection() -> String {
    "enterprise_docs".to_string()
}
fn default_index_path() -> Option<PathBuf> {
    Some(PathBuf::from("index"))
}
fn default_chroma_url() -> String {
    "http://localhost:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: None,
            url: None,
            max_tokens: default_max_tokens(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

fn default_generation_provider() -> String {
    "ollama".to_string()
}
fn default_max_tokens() -> u32 {
    512
}
fn default_generation_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Largest accepted request body in bytes. Uploads are base64 inside
    /// JSON, so the usable file size is about three quarters of this.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_max_upload_bytes() -> usize {
    256 * 1024 * 1024
}

impl Config {
    /// All-defaults configuration, used when no config file is present.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Validate chunking (overlap >= chunk_size is guarded by the chunker)
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }

    // Validate retrieval
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.max_context_chars == 0 {
        anyhow::bail!("retrieval.max_context_chars must be > 0");
    }

    match config.index.backend.as_str() {
        "local" | "chroma" => {}
        other => anyhow::bail!(
            "Unknown index backend: '{}'. Must be local or chroma.",
            other
        ),
    }
    if config.index.collection.trim().is_empty() {
        anyhow::bail!("index.collection must not be empty");
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "local" | "ollama" | "openai" | "hash" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be local, ollama, openai, or hash.",
            other
        ),
    }
    if config.embedding.dims == Some(0) {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    if config.server.max_upload_bytes == 0 {
        anyhow::bail!("server.max_upload_bytes must be > 0");
    }

    match config.generation.provider.as_str() {
        "ollama" | "openai" | "disabled" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be ollama, openai, or disabled.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.chunking.chunk_size, 800);
        assert_eq!(cfg.chunking.overlap, 100);
        assert_eq!(cfg.retrieval.top_k, 3);
        assert_eq!(cfg.retrieval.max_context_chars, 6000);
        assert_eq!(cfg.index.collection, "enterprise_docs");
        assert_eq!(cfg.generation.max_tokens, 512);
        assert_eq!(cfg.server.bind, "127.0.0.1:8000");
        assert_eq!(cfg.server.max_upload_bytes, 256 * 1024 * 1024);
    }

    #[test]
    fn sections_override_defaults() {
        let cfg = parse_config(
            r#"
[data]
dir = "/srv/docs"

[chunking]
chunk_size = 200
overlap = 20

[embedding]
provider = "hash"
dims = 64

[generation]
provider = "disabled"
"#,
        )
        .unwrap();
        assert_eq!(cfg.data.dir, PathBuf::from("/srv/docs"));
        assert_eq!(cfg.chunking.chunk_size, 200);
        assert_eq!(cfg.embedding.dims, Some(64));
        assert_eq!(cfg.generation.provider, "disabled");
    }

    #[test]
    fn example_config_parses() {
        let cfg = parse_config(include_str!("../config/ragflow.example.toml")).unwrap();
        assert_eq!(cfg.index.backend, "local");
        assert_eq!(cfg.generation.model.as_deref(), Some("llama3.2"));
        assert_eq!(cfg.server.max_upload_bytes, 268_435_456);
    }

    #[test]
    fn overlap_larger_than_chunk_size_is_accepted() {
        let cfg = parse_config("[chunking]\nchunk_size = 10\noverlap = 50\n").unwrap();
        assert_eq!(cfg.chunking.overlap, 50);
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let err = parse_config("[chunking]\nchunk_size = 0\n").unwrap_err();
        assert!(err.to_string().contains("chunk_size"));
    }

    #[test]
    fn rejects_unknown_providers() {
        assert!(parse_config("[embedding]\nprovider = \"magic\"\n").is_err());
        assert!(parse_config("[generation]\nprovider = \"magic\"\n").is_err());
        assert!(parse_config("[index]\nbackend = \"magic\"\n").is_err());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }
}
