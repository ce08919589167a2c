//! Text extraction
//!
//! - PDF: page text via pdf_oxide, word-limited
//! - HTML: readability-style main content detection via scraper

pub mod html;
pub mod pdf;

pub use html::{extract_web_page, WebPage};
pub use pdf::{extract_text_from_pdf_bytes, PdfLimits};

/// Collapse all runs of whitespace into single spaces and trim
pub fn clean_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keep at most `max_words` whitespace-separated words
pub fn limit_words(text: &str, max_words: usize) -> String {
    text.split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}
