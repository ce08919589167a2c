//! Anonymous trial: summary and quiz, nothing stored

use axum::{
    extract::{Request, State},
    Json,
};
use std::sync::Arc;

use super::upload::{read_source, SourceRules};
use crate::error::{Error, Result};
use crate::ingest::run_trial;
use crate::ratelimit::client_ip;
use crate::server::AppState;
use crate::types::TrialResponse;

pub async fn handle_trial(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<TrialResponse>> {
    let ip = client_ip(request.headers());
    if !state.guest_limiter.check(&ip) {
        tracing::info!(%ip, "trial rate limit hit");
        return Err(Error::RateLimited(
            "Rate limit exceeded. Please create an account for more uploads.".to_string(),
        ));
    }

    let limits = &state.config.limits;
    let too_large = format!(
        "File size must be less than {}MB. Create an account for {}MB uploads.",
        limits.trial_max_bytes / (1024 * 1024),
        limits.upload_max_bytes / (1024 * 1024)
    );
    let rules = SourceRules {
        max_bytes: limits.trial_max_bytes,
        file_too_large: &too_large,
        limit_note: " for free trial",
    };

    let source = read_source(&state, request, &rules).await?;
    let response = run_trial(
        state.generator.as_ref(),
        source,
        state.pdf_limits(),
        limits.trial_min_text_chars,
    )
    .await?;

    Ok(Json(response))
}
