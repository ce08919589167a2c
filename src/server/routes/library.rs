//! Documents, quizzes, flashcards, folders and profile

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::server::{ApiJson, AppState, CurrentUser};
use crate::study::{apply_review, grade_quiz, normalize_folder};
use crate::types::{
    CreateFolderRequest, Document, DocumentListQuery, Flashcard, FlashcardReviewRequest, Folder,
    MoveDocumentRequest, Profile, QuizAttempt, QuizAttemptRequest, StudyPack,
};

// ─────────────────────────────────────────────────────────────────────────────
// Documents
// ─────────────────────────────────────────────────────────────────────────────

pub async fn handle_list_documents(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(query): Query<DocumentListQuery>,
) -> Result<Json<Value>> {
    let documents = state
        .store
        .list_documents(&user.id, query.folder_id.as_deref())?;
    let count = documents.len();
    Ok(Json(json!({ "documents": documents, "count": count })))
}

pub async fn handle_get_document(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(document_id): Path<String>,
) -> Result<Json<StudyPack>> {
    state
        .store
        .get_study_pack(&document_id, &user.id)?
        .map(Json)
        .ok_or_else(|| Error::not_found("Document"))
}

pub async fn handle_move_document(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(document_id): Path<String>,
    ApiJson(payload): ApiJson<MoveDocumentRequest>,
) -> Result<Json<Document>> {
    if let Some(folder_id) = payload.folder_id.as_deref() {
        let owned = state
            .store
            .get_folder(folder_id)?
            .is_some_and(|f| f.user_id == user.id);
        if !owned {
            return Err(Error::not_found("Folder"));
        }
    }

    if !state
        .store
        .move_document(&document_id, &user.id, payload.folder_id.as_deref())?
    {
        return Err(Error::not_found("Document"));
    }

    state
        .store
        .get_document_for_user(&document_id, &user.id)?
        .map(Json)
        .ok_or_else(|| Error::not_found("Document"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Quizzes & flashcards
// ─────────────────────────────────────────────────────────────────────────────

pub async fn handle_quiz_attempt(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(quiz_id): Path<String>,
    ApiJson(payload): ApiJson<QuizAttemptRequest>,
) -> Result<(StatusCode, Json<QuizAttempt>)> {
    let quiz = state
        .store
        .get_quiz(&quiz_id)?
        .ok_or_else(|| Error::not_found("Quiz"))?;

    // The quiz is visible only through a document the caller owns
    if state
        .store
        .get_document_for_user(&quiz.document_id, &user.id)?
        .is_none()
    {
        return Err(Error::not_found("Quiz"));
    }

    let score = grade_quiz(&quiz.questions, &payload.answers)?;
    let attempt = state.store.insert_quiz_attempt(
        &quiz.id,
        &user.id,
        score,
        quiz.questions.len() as u32,
        &payload.answers,
    )?;

    tracing::info!(user_id = %user.id, quiz_id = %quiz.id, score, total = attempt.total_questions, "quiz attempt recorded");
    Ok((StatusCode::CREATED, Json(attempt)))
}

pub async fn handle_flashcard_review(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(card_id): Path<String>,
    ApiJson(payload): ApiJson<FlashcardReviewRequest>,
) -> Result<Json<Flashcard>> {
    let mut card = state
        .store
        .get_flashcard(&card_id)?
        .filter(|c| c.user_id == user.id)
        .ok_or_else(|| Error::not_found("Flashcard"))?;

    apply_review(&mut card, payload.outcome, Utc::now());
    state.store.save_flashcard_review(&card)?;
    Ok(Json(card))
}

// ─────────────────────────────────────────────────────────────────────────────
// Folders
// ─────────────────────────────────────────────────────────────────────────────

pub async fn handle_list_folders(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<Value>> {
    let folders = state.store.list_folders(&user.id)?;
    Ok(Json(json!({ "folders": folders })))
}

pub async fn handle_create_folder(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    ApiJson(payload): ApiJson<CreateFolderRequest>,
) -> Result<(StatusCode, Json<Folder>)> {
    let (name, color) = normalize_folder(&payload.name, payload.color.as_deref())?;
    let folder = state.store.create_folder(&user.id, &name, &color)?;
    Ok((StatusCode::CREATED, Json(folder)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Profile
// ─────────────────────────────────────────────────────────────────────────────

pub async fn handle_get_profile(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<Profile>> {
    state
        .store
        .get_profile(&user.id)?
        .map(Json)
        .ok_or_else(|| Error::not_found("Profile"))
}

pub async fn handle_record_streak(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<Profile>> {
    let profile = state
        .store
        .record_study_session(&user.id, Utc::now().date_naive())?;
    Ok(Json(profile))
}
