//! PDF text extraction using pdf_oxide.

use pdf_oxide::converters::ConversionOptions;
use std::path::Path;

use super::limit_words;
use crate::config::LimitsConfig;
use crate::error::{Error, Result};

/// Bounds applied while reading a PDF
#[derive(Debug, Clone, Copy)]
pub struct PdfLimits {
    pub max_pages: usize,
    pub max_words: usize,
}

impl PdfLimits {
    pub fn from_config(limits: &LimitsConfig) -> Self {
        Self {
            max_pages: limits.pdf_max_pages,
            max_words: limits.pdf_max_words,
        }
    }
}

impl Default for PdfLimits {
    fn default() -> Self {
        Self::from_config(&LimitsConfig::default())
    }
}

/// Extract whitespace-collapsed text from PDF bytes.
/// Blocking; call from `spawn_blocking` in async code.
pub fn extract_text_from_pdf_bytes(bytes: &[u8], limits: PdfLimits) -> Result<String> {
    // pdf_oxide opens from a path
    let temp = tempfile::Builder::new()
        .prefix("cognify_pdf_")
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| Error::extraction(format!("Failed to create temp PDF: {}", e)))?;
    std::fs::write(temp.path(), bytes)
        .map_err(|e| Error::extraction(format!("Failed to write temp PDF: {}", e)))?;

    extract_text_from_pdf(temp.path(), limits)
}

/// Extract text from a PDF file, page by page
pub fn extract_text_from_pdf(pdf_path: &Path, limits: PdfLimits) -> Result<String> {
    let mut doc = pdf_oxide::PdfDocument::open(pdf_path)
        .map_err(|e| Error::extraction(format!("Failed to open PDF: {}", e)))?;

    let page_count = doc
        .page_count()
        .map_err(|e| Error::extraction(format!("Failed to get page count: {}", e)))?;

    if page_count > limits.max_pages {
        tracing::info!(page_count, max_pages = limits.max_pages, "reading first pages only");
    }

    let options = ConversionOptions::default();
    let mut all_text = String::new();

    for page_idx in 0..page_count.min(limits.max_pages) {
        match doc.to_markdown(page_idx, &options) {
            Ok(page) => {
                all_text.push_str(&page);
                all_text.push('\n');
            }
            Err(e) => {
                tracing::warn!(page = page_idx + 1, error = %e, "failed to extract page");
            }
        }

        // Stop reading once the word budget is filled
        if all_text.split_whitespace().nth(limits.max_words).is_some() {
            break;
        }
    }

    Ok(limit_words(&all_text, limits.max_words))
}
