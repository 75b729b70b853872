//! Fixed-window text chunker.
//!
//! Splits text into windows of `chunk_size` characters where consecutive
//! windows share `overlap` characters. Offsets are character positions, so
//! multi-byte text never gets split inside a code point.
//!
//! The final window ends exactly at the end of the text and is the only one
//! that may be shorter than `chunk_size`. When `overlap >= chunk_size` the
//! start still advances by at least one character per window, so iteration
//! always terminates.

use crate::config::ChunkingConfig;
use crate::models::{Chunk, RawDocument};

/// One window of the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkWindow<'a> {
    pub offset_start: usize,
    pub offset_end: usize,
    pub text: &'a str,
}

/// Lazy iterator over chunk windows. Clone it to restart from the same point.
#[derive(Debug, Clone)]
pub struct ChunkWindows<'a> {
    text: &'a str,
    char_len: usize,
    chunk_size: usize,
    overlap: usize,
    start: usize,
    start_byte: usize,
}

impl<'a> ChunkWindows<'a> {
    pub fn new(text: &'a str, chunk_size: usize, overlap: usize) -> Self {
        Self {
            text,
            char_len: text.chars().count(),
            chunk_size: chunk_size.max(1),
            overlap,
            start: 0,
            start_byte: 0,
        }
    }
}

impl<'a> Iterator for ChunkWindows<'a> {
    type Item = ChunkWindow<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.start >= self.char_len {
            return None;
        }

        let end = (self.start + self.chunk_size).min(self.char_len);
        let end_byte = advance(self.text, self.start_byte, end - self.start);
        let window = ChunkWindow {
            offset_start: self.start,
            offset_end: end,
            text: &self.text[self.start_byte..end_byte],
        };

        if end >= self.char_len {
            self.start = self.char_len;
            self.start_byte = self.text.len();
        } else {
            let mut next = end.saturating_sub(self.overlap);
            if next <= self.start {
                next = self.start + self.chunk_size.saturating_sub(self.overlap).max(1);
            }
            self.start_byte = advance(self.text, self.start_byte, next - self.start);
            self.start = next;
        }

        Some(window)
    }
}

/// Byte offset reached by moving `chars` characters forward from byte `from`.
fn advance(text: &str, from: usize, chars: usize) -> usize {
    text[from..]
        .char_indices()
        .nth(chars)
        .map(|(i, _)| from + i)
        .unwrap_or(text.len())
}

pub fn chunk_windows(text: &str, chunk_size: usize, overlap: usize) -> ChunkWindows<'_> {
    ChunkWindows::new(text, chunk_size, overlap)
}

/// Splits `text` into owned chunk strings.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    chunk_windows(text, chunk_size, overlap)
        .map(|w| w.text.to_string())
        .collect()
}

/// Chunks a document. Ids are `"{document_id}#{index}"`, so re-chunking
/// identical text yields identical ids.
pub fn chunk_document(doc: &RawDocument, config: &ChunkingConfig) -> Vec<Chunk> {
    chunk_windows(&doc.text, config.chunk_size, config.overlap)
        .enumerate()
        .map(|(index, w)| Chunk {
            id: chunk_id(&doc.id, index),
            text: w.text.to_string(),
            source_document_id: doc.id.clone(),
            offset_start: w.offset_start,
            offset_end: w.offset_end,
        })
        .collect()
}

pub fn chunk_id(document_id: &str, index: usize) -> String {
    format!("{}#{}", document_id, index)
}
