//! HTTP API routes

mod billing;
mod library;
mod trial;
mod upload;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::server::AppState;
use crate::storage::STORAGE_ROUTE;

/// Room for multipart boundaries and headers around the file itself
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = (state.config.limits.upload_max_bytes + MULTIPART_OVERHEAD) as usize;
    let storage = ServeDir::new(state.blobs.root());
    let api = create_api_routes(state);

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .nest("/api", api)
        .nest_service(STORAGE_ROUTE, storage)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(body_limit))
}

/// Create API routes
fn create_api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/documents/upload", post(upload::handle_upload))
        .route("/try", post(trial::handle_trial))
        .route("/stripe/checkout", post(billing::handle_checkout))
        .route("/stripe/portal", post(billing::handle_portal))
        .route("/stripe/webhook", post(billing::handle_webhook))
        .route("/documents", get(library::handle_list_documents))
        .route("/documents/:document_id", get(library::handle_get_document))
        .route("/documents/:document_id/folder", patch(library::handle_move_document))
        .route("/quizzes/:quiz_id/attempts", post(library::handle_quiz_attempt))
        .route("/flashcards/:card_id/review", post(library::handle_flashcard_review))
        .route(
            "/folders",
            get(library::handle_list_folders).post(library::handle_create_folder),
        )
        .route("/profile", get(library::handle_get_profile))
        .route("/profile/streak", post(library::handle_record_streak))
        .with_state(state)
}
