//! Remote source fetching: PDFs and HTML pages by URL
//!
//! Errors returned here are user-facing (`Error::Fetch`, HTTP 400).

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, ACCEPT, ACCEPT_LANGUAGE, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT};
use reqwest::Url;
use std::time::Duration;

use crate::error::{Error, Result};

const PDF_USER_AGENT: &str = "Cognify/1.0 (PDF Study Tool)";
const HTML_USER_AGENT: &str = "Mozilla/5.0 (compatible; Cognify/1.0; +https://cognify.app)";
const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Fallback name for PDFs without a usable name
pub const DEFAULT_PDF_NAME: &str = "Document.pdf";

/// A downloaded PDF
#[derive(Debug, Clone)]
pub struct FetchedPdf {
    pub bytes: Vec<u8>,
    pub file_name: String,
}

/// True when the URL looks like a PDF link
pub fn is_pdf_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    lower.ends_with(".pdf") || lower.contains(".pdf?")
}

/// Parse and validate a user-submitted URL (http/https only)
pub fn parse_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).map_err(|_| Error::bad_request("Invalid URL format"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(Error::bad_request("Invalid URL format")),
    }
}

/// Friendly page name built from a URL, e.g. "rust ownership - example.com"
pub fn page_name_from_url(url: &str) -> String {
    let parsed = match Url::parse(url) {
        Ok(u) => u,
        Err(_) => return "Web Page".to_string(),
    };
    let host = parsed.host_str().unwrap_or_default().replacen("www.", "", 1);

    if let Some(last) = parsed.path().split('/').filter(|s| !s.is_empty()).last() {
        let spaced = last.replace(['-', '_'], " ");
        let name = strip_extension(&spaced).trim().to_string();
        if name.chars().count() > 3 {
            return format!("{} - {}", name, host);
        }
    }

    host
}

/// Remove a trailing `.ext` made of word characters
fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx)
            if idx + 1 < name.len()
                && name[idx + 1..].chars().all(|c| c.is_ascii_alphanumeric() || c == '_') =>
        {
            &name[..idx]
        }
        _ => name,
    }
}

/// File name from a `Content-Disposition` header value
pub fn filename_from_content_disposition(header: &str) -> Option<String> {
    let mut plain = None;

    for part in header.split(';') {
        let part = part.trim();
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();

        if key == "filename*" {
            // RFC 5987: charset'lang'value
            let encoded = value.splitn(3, '\'').nth(2).unwrap_or(value);
            let decoded = urlencoding::decode_binary(encoded.trim_matches('"').as_bytes());
            let decoded = String::from_utf8_lossy(&decoded).into_owned();
            if !decoded.is_empty() {
                return Some(decoded);
            }
        } else if key == "filename" {
            let name = value.replace(['"', '\''], "");
            if !name.is_empty() {
                plain = Some(name);
            }
        }
    }

    plain
}

/// Last URL path segment when it names a PDF
pub fn filename_from_url(url: &Url) -> Option<String> {
    url.path_segments()
        .and_then(|mut segments| segments.next_back().map(str::to_string))
        .filter(|name| name.ends_with(".pdf"))
}

/// Document title from a file name: first ".pdf" removed
pub fn title_from_file_name(file_name: &str) -> String {
    file_name.replacen(".pdf", "", 1)
}

fn content_type(headers: &HeaderMap) -> String {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

fn too_large(max_bytes: u64, suffix: &str) -> Error {
    Error::fetch(format!(
        "PDF file is too large. Maximum size is {}MB{}.",
        max_bytes / (1024 * 1024),
        suffix
    ))
}

/// HTTP client for user-submitted URLs
#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self { client })
    }

    /// Download a PDF, enforcing `max_bytes` before and during transfer.
    /// `limit_note` is appended to the size error (e.g. " for free trial").
    pub async fn fetch_pdf(&self, url: &Url, max_bytes: u64, limit_note: &str) -> Result<FetchedPdf> {
        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, PDF_USER_AGENT)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(url = %url, error = %e, "PDF request failed");
                Error::fetch("Failed to fetch PDF from URL")
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch(format!(
                "Failed to fetch PDF: {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or_default()
            )));
        }

        let headers = response.headers().clone();
        if !content_type(&headers).contains("application/pdf")
            && !url.as_str().to_lowercase().ends_with(".pdf")
        {
            return Err(Error::fetch("URL does not point to a PDF file"));
        }

        let declared = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        if declared.is_some_and(|len| len > max_bytes) {
            return Err(too_large(max_bytes, limit_note));
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                tracing::warn!(url = %url, error = %e, "PDF download interrupted");
                Error::fetch("Failed to fetch PDF from URL")
            })?;
            if (bytes.len() + chunk.len()) as u64 > max_bytes {
                return Err(too_large(max_bytes, limit_note));
            }
            bytes.extend_from_slice(&chunk);
        }

        let file_name = match headers.get(CONTENT_DISPOSITION).and_then(|v| v.to_str().ok()) {
            Some(disposition) => filename_from_content_disposition(disposition),
            None => filename_from_url(url),
        }
        .unwrap_or_else(|| DEFAULT_PDF_NAME.to_string());

        Ok(FetchedPdf { bytes, file_name })
    }

    /// Download an HTML page as text
    pub async fn fetch_html(&self, url: &Url) -> Result<String> {
        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, HTML_USER_AGENT)
            .header(ACCEPT, HTML_ACCEPT)
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.5")
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(url = %url, error = %e, "page request failed");
                Error::fetch("Failed to fetch content from URL")
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch(format!(
                "Failed to fetch page: {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or_default()
            )));
        }

        let content_type = content_type(response.headers());
        if !content_type.contains("text/html") && !content_type.contains("application/xhtml") {
            return Err(Error::fetch("URL does not point to a web page"));
        }

        response.text().await.map_err(|e| {
            tracing::warn!(url = %url, error = %e, "page body unreadable");
            Error::fetch("Failed to fetch content from URL")
        })
    }
}
