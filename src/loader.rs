//! Document loader.
//!
//! Scans the top level of a directory and normalizes every recognized file
//! (`.txt`, `.md`, `.pdf`, `.csv`) into a [`RawDocument`] whose id is the
//! file path. Unsupported files are skipped, extraction failures degrade to
//! empty text, and documents with no non-whitespace content are dropped, so
//! every returned document has something to embed.

use anyhow::{bail, Result};
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::extract;
use crate::models::{RawDocument, SourceType};

/// What happened to a single file.
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(RawDocument),
    /// Extension not recognized.
    Unsupported,
    /// Recognized, but no usable text after extraction.
    Empty,
}

pub fn load_documents(dir: &Path) -> Result<Vec<RawDocument>> {
    if !dir.is_dir() {
        bail!("Data directory does not exist: {}", dir.display());
    }

    let mut docs = Vec::new();

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        if let LoadOutcome::Loaded(doc) = load_file(entry.path()) {
            docs.push(doc);
        }
    }

    debug!(dir = %dir.display(), documents = docs.len(), "Loaded documents");
    Ok(docs)
}

pub fn load_file(path: &Path) -> LoadOutcome {
    let name = file_name(path);

    let source_type = match path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(SourceType::from_extension)
    {
        Some(t) => t,
        None => {
            info!(file = %name, "Skipping unsupported file type");
            return LoadOutcome::Unsupported;
        }
    };

    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            warn!(file = %name, error = %e, "Failed to read file");
            return LoadOutcome::Empty;
        }
    };

    let text = match extract::extract_text(&bytes, source_type) {
        Ok(text) => text,
        Err(e) => {
            warn!(file = %name, error = %e, "Extraction failed");
            String::new()
        }
    };

    if text.trim().is_empty() {
        warn!(file = %name, "Skipping empty file");
        return LoadOutcome::Empty;
    }

    LoadOutcome::Loaded(RawDocument {
        id: path.to_string_lossy().to_string(),
        text,
        source_type,
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
