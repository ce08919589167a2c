//! Signed-in upload: file or URL to a stored study pack

use axum::{
    extract::{FromRequest, Multipart, Request, State},
    http::header::{CONTENT_LENGTH, CONTENT_TYPE},
    Json,
};
use serde_json::Value;
use std::sync::Arc;

use super::MULTIPART_OVERHEAD;
use crate::error::{Error, Result};
use crate::ingest::{accept_upload, acquire_url, Source, StudyPackPipeline};
use crate::server::{AppState, CurrentUser};
use crate::types::UploadResponse;

/// Size rules for one entry point
pub(super) struct SourceRules<'a> {
    pub max_bytes: u64,
    /// Shown when an uploaded file is over `max_bytes`
    pub file_too_large: &'a str,
    /// Appended to the size error for PDF links
    pub limit_note: &'a str,
}

/// Read the request as a JSON `{ "url": … }` body or a multipart `file` field
pub(super) async fn read_source(
    state: &Arc<AppState>,
    request: Request,
    rules: &SourceRules<'_>,
) -> Result<Source> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if content_type.contains("application/json") {
        let Json(body) = Json::<Value>::from_request(request, state)
            .await
            .map_err(|_| Error::bad_request("Invalid JSON body"))?;
        let url = body
            .get("url")
            .and_then(Value::as_str)
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| Error::bad_request("No URL provided"))?;
        return acquire_url(&state.fetcher, url, rules.max_bytes, rules.limit_note).await;
    }

    let declared = request
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.is_some_and(|len| len > rules.max_bytes + MULTIPART_OVERHEAD) {
        return Err(Error::bad_request(rules.file_too_large));
    }

    let mut multipart = Multipart::from_request(request, state)
        .await
        .map_err(|_| Error::bad_request("No file provided"))?;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::bad_request(format!("Invalid form data: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let file_type = field.content_type().map(str::to_string);
        if file_type.as_deref() != Some("application/pdf") {
            return Err(Error::bad_request("File must be a PDF"));
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| Error::bad_request(format!("Invalid form data: {}", e)))?
        {
            if (bytes.len() + chunk.len()) as u64 > rules.max_bytes {
                return Err(Error::bad_request(rules.file_too_large));
            }
            bytes.extend_from_slice(&chunk);
        }

        return accept_upload(
            &file_name,
            file_type.as_deref(),
            bytes,
            rules.max_bytes,
            rules.file_too_large,
        );
    }

    Err(Error::bad_request("No file provided"))
}

pub async fn handle_upload(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    request: Request,
) -> Result<Json<UploadResponse>> {
    let max_bytes = state.config.limits.upload_max_bytes;
    let too_large = format!("File size must be less than {}MB", max_bytes / (1024 * 1024));
    let rules = SourceRules {
        max_bytes,
        file_too_large: &too_large,
        limit_note: "",
    };
    let source = read_source(&state, request, &rules).await?;
    tracing::info!(user_id = %user.id, source = ?source.source_type(), "upload accepted");

    let pipeline = StudyPackPipeline::new(
        &state.store,
        &state.blobs,
        state.generator.as_ref(),
        state.pdf_limits(),
    );
    let document = pipeline.run(&user.id, source).await?;

    Ok(Json(UploadResponse {
        success: true,
        document_id: document.id,
        message: "Document processed successfully".to_string(),
    }))
}
