//! Per-format text extraction.
//!
//! Each extractor turns raw file bytes into plain UTF-8 text. Failures are
//! returned as [`ExtractError`] so the loader can decide how to degrade;
//! nothing in here panics on malformed input.

use thiserror::Error;
use tracing::warn;

use crate::models::SourceType;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("PDF page {page} extraction failed: {message}")]
    PdfPage { page: u32, message: String },
    #[error("CSV parse failed: {0}")]
    Csv(#[from] csv::Error),
}

/// Extracts text from `bytes` according to `source_type`.
pub fn extract_text(bytes: &[u8], source_type: SourceType) -> Result<String, ExtractError> {
    match source_type {
        SourceType::Text | SourceType::Markdown => Ok(decode_lenient(bytes)),
        SourceType::Pdf => extract_pdf(bytes),
        SourceType::Csv => extract_csv(bytes),
    }
}

/// Decodes UTF-8, replacing malformed sequences instead of failing.
pub fn decode_lenient(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Extracts a PDF page by page, joining pages with `\n`.
///
/// A page that fails contributes empty text. If the document structure
/// cannot be parsed at all, a whole-document extraction is attempted before
/// giving up.
pub fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    let doc = match lopdf::Document::load_mem(bytes) {
        Ok(doc) => doc,
        Err(load_err) => {
            return pdf_extract::extract_text_from_mem(bytes)
                .map(|text| text.trim().to_string())
                .map_err(|e| ExtractError::Pdf(format!("{}; {}", load_err, e)));
        }
    };

    let pages = doc.get_pages();
    let mut texts = Vec::with_capacity(pages.len());
    for &page in pages.keys() {
        let text = match extract_pdf_page(&doc, page) {
            Ok(text) => text,
            Err(e) => {
                warn!(page, error = %e, "Skipping unreadable PDF page");
                String::new()
            }
        };
        texts.push(text);
    }

    Ok(texts.join("\n").trim().to_string())
}

/// Extracts a single 1-based page.
pub fn extract_pdf_page(doc: &lopdf::Document, page: u32) -> Result<String, ExtractError> {
    doc.extract_text(&[page])
        .map_err(|e| ExtractError::PdfPage {
            page,
            message: e.to_string(),
        })
}

/// Renders a CSV file as an aligned plain-text table.
///
/// The first row is treated as the header and rendered like any other row.
/// Rows with a different number of fields than the header are a parse error.
pub fn extract_csv(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(false)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(|cell| cell.to_string()).collect());
    }

    Ok(render_table(&rows))
}

fn render_table(rows: &[Vec<String>]) -> String {
    let columns = rows.iter().map(|r| r.len()).max().unwrap_or(0);
    let mut widths = vec![0usize; columns];
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let line = row
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
            .collect::<Vec<_>>()
            .join("  ");
        out.push(line.trim_end().to_string());
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_decoding_replaces_invalid_bytes() {
        let text = decode_lenient(b"hello \xff\xfe world");
        assert!(text.starts_with("hello "));
        assert!(text.ends_with(" world"));
    }

    #[test]
    fn markdown_is_passed_through() {
        let text = extract_text(b"# Title\n\nBody", SourceType::Markdown).unwrap();
        assert_eq!(text, "# Title\n\nBody");
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_text(b"not a pdf", SourceType::Pdf).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn csv_renders_all_cells_aligned() {
        let text = extract_csv(b"name,role\nAda,engineer\nGrace Hopper,admiral\n").unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "name          role");
        assert_eq!(lines[1], "Ada           engineer");
        assert_eq!(lines[2], "Grace Hopper  admiral");
    }

    #[test]
    fn ragged_csv_is_an_error() {
        let err = extract_csv(b"a,b\n1,2,3\n").unwrap_err();
        assert!(matches!(err, ExtractError::Csv(_)));
    }

    #[test]
    fn empty_csv_yields_empty_text() {
        assert_eq!(extract_csv(b"").unwrap(), "");
    }
}
