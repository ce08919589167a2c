//! Study pack ingestion
//!
//! A source (uploaded PDF, PDF link or web page) goes through:
//! 1. Acquisition: fetch, size/type checks, HTML extraction
//! 2. For signed-in users: original PDF to object storage, document record
//! 3. Text extraction, summary, quiz, flashcards, narration
//! 4. Persistence and the final `completed`/`failed` status
//!
//! The guest trial stops after the quiz and persists nothing.

use crate::error::{Error, Result};
use crate::extract::{extract_text_from_pdf_bytes, extract_web_page, PdfLimits};
use crate::fetch::{is_pdf_url, page_name_from_url, parse_url, title_from_file_name, Fetcher};
use crate::generate::{narration_script, sanitize_flashcards, sanitize_questions, StudyGenerator};
use crate::storage::{audio_key, document_key, BlobStore, Bucket, StudyStore};
use crate::types::{
    Document, DocumentStatus, NewDocument, QuizQuestion, SourceType, SummaryContent, TrialResponse,
};

const TRIAL_MESSAGE: &str = "Create an account to save this study pack and unlock audio playback!";
const TRIAL_FAILED: &str = "Failed to process content. Please try again.";
const PROCESSING_FAILED: &str = "Failed to process document";

/// Source material after acquisition
#[derive(Debug, Clone)]
pub enum Source {
    /// Raw PDF bytes; text is extracted later
    Pdf { bytes: Vec<u8>, file_name: String },
    /// Readable text already pulled out of a page
    WebPage { text: String, title: String, url: String },
}

impl Source {
    pub fn source_type(&self) -> SourceType {
        match self {
            Source::Pdf { .. } => SourceType::Pdf,
            Source::WebPage { .. } => SourceType::Webpage,
        }
    }

    /// Document title: file name without `.pdf`, or the page title
    pub fn title(&self) -> String {
        match self {
            Source::Pdf { file_name, .. } => title_from_file_name(file_name),
            Source::WebPage { title, .. } => title.clone(),
        }
    }

    /// Byte size for PDFs, text length for pages
    pub fn file_size(&self) -> i64 {
        match self {
            Source::Pdf { bytes, .. } => bytes.len() as i64,
            Source::WebPage { text, .. } => text.chars().count() as i64,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Acquisition
// ─────────────────────────────────────────────────────────────────────────────

/// Check an uploaded file before it is accepted.
/// `too_large` is the message shown when the file exceeds `max_bytes`.
pub fn accept_upload(
    file_name: &str,
    content_type: Option<&str>,
    bytes: Vec<u8>,
    max_bytes: u64,
    too_large: &str,
) -> Result<Source> {
    if content_type != Some("application/pdf") {
        return Err(Error::bad_request("File must be a PDF"));
    }
    if bytes.len() as u64 > max_bytes {
        return Err(Error::bad_request(too_large));
    }

    let file_name = if file_name.trim().is_empty() {
        crate::fetch::DEFAULT_PDF_NAME.to_string()
    } else {
        file_name.to_string()
    };
    Ok(Source::Pdf { bytes, file_name })
}

/// Fetch a submitted URL as a PDF or a web page
pub async fn acquire_url(
    fetcher: &Fetcher,
    raw_url: &str,
    max_pdf_bytes: u64,
    limit_note: &str,
) -> Result<Source> {
    let url = parse_url(raw_url)?;

    if is_pdf_url(url.as_str()) {
        let pdf = fetcher.fetch_pdf(&url, max_pdf_bytes, limit_note).await?;
        tracing::info!(url = %url, size = pdf.bytes.len(), "fetched PDF");
        return Ok(Source::Pdf {
            bytes: pdf.bytes,
            file_name: pdf.file_name,
        });
    }

    let html = fetcher.fetch_html(&url).await?;
    let page = extract_web_page(&html)?;
    let title = if page.title.trim().is_empty() || page.title == "Untitled" {
        page_name_from_url(url.as_str())
    } else {
        page.title
    };
    tracing::info!(url = %url, chars = page.content.len(), "extracted web page");

    Ok(Source::WebPage {
        text: page.content,
        title,
        url: raw_url.trim().to_string(),
    })
}

async fn extract_pdf(bytes: Vec<u8>, limits: PdfLimits) -> Result<String> {
    tokio::task::spawn_blocking(move || extract_text_from_pdf_bytes(&bytes, limits))
        .await
        .map_err(|e| Error::internal(format!("PDF extraction task failed: {}", e)))?
}

// ─────────────────────────────────────────────────────────────────────────────
// Signed-in pipeline
// ─────────────────────────────────────────────────────────────────────────────

/// Generated material for one document, before persistence
struct GeneratedPack {
    summary: SummaryContent,
    questions: Vec<QuizQuestion>,
    audio_url: Option<String>,
}

pub struct StudyPackPipeline<'a> {
    store: &'a StudyStore,
    blobs: &'a BlobStore,
    generator: &'a dyn StudyGenerator,
    pdf_limits: PdfLimits,
}

impl<'a> StudyPackPipeline<'a> {
    pub fn new(
        store: &'a StudyStore,
        blobs: &'a BlobStore,
        generator: &'a dyn StudyGenerator,
        pdf_limits: PdfLimits,
    ) -> Self {
        Self {
            store,
            blobs,
            generator,
            pdf_limits,
        }
    }

    /// Build and store a study pack. Returns the document in its final state.
    pub async fn run(&self, user_id: &str, source: Source) -> Result<Document> {
        let file_url = match &source {
            Source::Pdf { bytes, file_name } => {
                let key = document_key(user_id, file_name);
                self.blobs
                    .upload(Bucket::Documents, &key, bytes)
                    .await
                    .map_err(|e| {
                        tracing::error!(user_id, error = %e, "storage upload failed");
                        Error::Processing("Failed to upload file".to_string())
                    })?
            }
            Source::WebPage { url, .. } => url.clone(),
        };

        let document = self
            .store
            .create_document(&NewDocument {
                user_id: user_id.to_string(),
                title: source.title(),
                file_url,
                file_size: source.file_size(),
            })
            .map_err(|e| {
                tracing::error!(user_id, error = %e, "document insert failed");
                Error::Processing("Failed to create document record".to_string())
            })?;

        let result = match self.process(&document, source).await {
            Ok(()) => self
                .store
                .transition_document(&document.id, DocumentStatus::Completed),
            Err(e) => Err(e),
        };

        match result {
            Ok(true) => tracing::info!(document_id = %document.id, "document completed"),
            Ok(false) => {
                tracing::warn!(document_id = %document.id, "document already final, completion skipped")
            }
            Err(e) => {
                tracing::error!(document_id = %document.id, error = %e, "processing failed");
                if let Err(e) = self
                    .store
                    .transition_document(&document.id, DocumentStatus::Failed)
                {
                    tracing::error!(document_id = %document.id, error = %e, "could not mark document failed");
                }
                return Err(Error::Processing(PROCESSING_FAILED.to_string()));
            }
        }

        self.store
            .get_document(&document.id)?
            .ok_or_else(|| Error::not_found("Document"))
    }

    async fn process(&self, document: &Document, source: Source) -> Result<()> {
        let text = match source {
            Source::Pdf { bytes, .. } => extract_pdf(bytes, self.pdf_limits).await?,
            Source::WebPage { text, .. } => text,
        };
        if text.trim().is_empty() {
            return Err(Error::extraction("no text found"));
        }
        tracing::info!(document_id = %document.id, chars = text.len(), "text extracted");

        let pack = self.generate(document, &text).await?;

        self.store
            .insert_summary(&document.id, &pack.summary, pack.audio_url.as_deref())?;

        if let Err(e) = self.store.insert_quiz(&document.id, &pack.questions) {
            tracing::error!(document_id = %document.id, error = %e, "quiz insert failed");
        } else {
            tracing::info!(document_id = %document.id, "quiz saved");
        }

        let cards = self
            .generator
            .flashcards(&text, &pack.summary.definitions, &pack.summary.key_concepts)
            .await?;
        let cards = sanitize_flashcards(cards);
        tracing::info!(document_id = %document.id, count = cards.len(), "flashcards generated");

        match self
            .store
            .insert_flashcards(&document.id, &document.user_id, &cards)
        {
            Ok(saved) => tracing::info!(document_id = %document.id, saved, "flashcards saved"),
            Err(e) => {
                tracing::error!(document_id = %document.id, error = %e, "flashcard insert failed")
            }
        }

        Ok(())
    }

    async fn generate(&self, document: &Document, text: &str) -> Result<GeneratedPack> {
        let summary = self.generator.summarize(text).await?;
        tracing::info!(
            document_id = %document.id,
            provider = self.generator.name(),
            key_concepts = summary.key_concepts.len(),
            definitions = summary.definitions.len(),
            "summary generated"
        );

        let questions = sanitize_questions(self.generator.quiz(text, &summary.tldr).await?);
        tracing::info!(document_id = %document.id, count = questions.len(), "quiz generated");

        let audio_url = self.narrate(document, &summary).await;

        Ok(GeneratedPack {
            summary,
            questions,
            audio_url,
        })
    }

    /// Narration is optional: failures leave the summary without audio
    async fn narrate(&self, document: &Document, summary: &SummaryContent) -> Option<String> {
        let audio = match self.generator.narrate(&narration_script(summary)).await {
            Ok(audio) => audio,
            Err(e) => {
                tracing::warn!(document_id = %document.id, error = %e, "narration failed");
                return None;
            }
        };
        tracing::info!(document_id = %document.id, size = audio.len(), "audio generated");

        let key = audio_key(&document.user_id, &document.id);
        match self.blobs.upload(Bucket::Audio, &key, &audio).await {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(document_id = %document.id, error = %e, "audio upload failed");
                None
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Guest trial
// ─────────────────────────────────────────────────────────────────────────────

/// Summary and quiz for an anonymous visitor. Nothing is stored.
pub async fn run_trial(
    generator: &dyn StudyGenerator,
    source: Source,
    pdf_limits: PdfLimits,
    min_text_chars: usize,
) -> Result<TrialResponse> {
    let source_type = source.source_type();
    let file_name = source.title();

    let text = match source {
        Source::Pdf { bytes, .. } => {
            let text = extract_pdf(bytes, pdf_limits).await.map_err(|e| {
                tracing::error!(error = %e, "trial PDF extraction failed");
                Error::Processing(TRIAL_FAILED.to_string())
            })?;
            if text.chars().count() < min_text_chars {
                return Err(Error::bad_request(
                    "Could not extract enough text from the PDF. Please try a different file.",
                ));
            }
            text
        }
        Source::WebPage { text, .. } => {
            if text.chars().count() < min_text_chars {
                return Err(Error::bad_request(
                    "Could not extract enough content from this page. Try a different URL.",
                ));
            }
            text
        }
    };

    let generated = async {
        let summary = generator.summarize(&text).await?;
        let quiz = sanitize_questions(generator.quiz(&text, &summary.tldr).await?);
        Ok::<_, Error>((summary, quiz))
    }
    .await;

    let (summary, quiz) = generated.map_err(|e| {
        tracing::error!(error = %e, "trial generation failed");
        Error::Processing(TRIAL_FAILED.to_string())
    })?;

    Ok(TrialResponse {
        success: true,
        file_name,
        source_type,
        summary,
        quiz,
        message: TRIAL_MESSAGE.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_upload_checks_type_and_size() {
        let err = accept_upload("a.pdf", Some("text/plain"), vec![0; 10], 100, "too big")
            .unwrap_err();
        assert_eq!(err.to_string(), "File must be a PDF");

        let err = accept_upload("a.pdf", Some("application/pdf"), vec![0; 101], 100, "too big")
            .unwrap_err();
        assert_eq!(err.to_string(), "too big");

        let source = accept_upload("notes.pdf", Some("application/pdf"), vec![0; 100], 100, "too big")
            .unwrap();
        assert_eq!(source.title(), "notes");
        assert_eq!(source.file_size(), 100);
        assert_eq!(source.source_type(), SourceType::Pdf);
    }

    #[test]
    fn test_upload_without_name_gets_default() {
        let source = accept_upload("  ", Some("application/pdf"), vec![1], 10, "x").unwrap();
        assert_eq!(source.title(), "Document");
    }

    #[test]
    fn test_web_page_source() {
        let source = Source::WebPage {
            text: "héllo".to_string(),
            title: "Page".to_string(),
            url: "https://example.com/page".to_string(),
        };
        assert_eq!(source.file_size(), 5);
        assert_eq!(source.title(), "Page");
        assert_eq!(source.source_type(), SourceType::Webpage);
    }

    #[tokio::test]
    async fn test_acquire_rejects_bad_url() {
        let fetcher = Fetcher::new().unwrap();
        let err = acquire_url(&fetcher, "not a url", 1024, "").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid URL format");

        let err = acquire_url(&fetcher, "ftp://example.com/a.pdf", 1024, "")
            .await
            .unwrap_err();
        assert!(err.is_client_error());
    }
}
