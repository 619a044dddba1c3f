//! Run endpoint: answer questions about a remote document.

use crate::{
    app_state::AppState,
    error::{AppError, AppResult},
    extract::{bearer::Authorized, json::Json},
    pipeline::QuestionOutcome,
    setups::{EventPublisher, Notifier, ServerSetup},
};
use axum::{self, extract::State, http::StatusCode};
use hackrx_core::{
    common::{RunRequest, RunResponse},
    events::HackrxEvent,
};
use std::time::Instant;
use validator::Validate;

/// POST handler answering questions about the document at `documents`.
#[utoipa::path(
    post,
    path = "/api/v1/hackrx/run",
    request_body = RunRequest,
    security(
        ("bearer" = []),
    ),
    responses(
        (status = 200, description = "Questions answered", body = RunResponse),
        (status = 400, description = "Bad Request, e.g. the document could not be downloaded", body = AppError),
        (status = 401, description = "Missing or invalid bearer token", body = AppError),
        (status = 500, description = "Internal error", body = AppError),
    )
)]
pub async fn run<S: ServerSetup>(
    State(state): State<AppState<S>>,
    _: Authorized,
    Json(request): Json<RunRequest>,
) -> AppResult<(StatusCode, Json<RunResponse>)> {
    tracing::info!(
        documents = %request.documents,
        questions = request.questions.len(),
        "Received run request"
    );

    let start = Instant::now();
    match answer_document(&state, &request).await {
        Ok(answers) => {
            tracing::info!(
                documents = %request.documents,
                elapsed_ms = start.elapsed().as_millis(),
                "Answered all questions"
            );

            if let Err(err) = state
                .notifier
                .notify_answers(&request.documents, &answers)
                .await
            {
                tracing::warn!(%err, "Failed to send answers notification");
            }

            Ok((StatusCode::OK, Json(RunResponse { answers })))
        }
        Err(err) => {
            tracing::error!(documents = %request.documents, %err, "Run failed");

            let message = err.detail().unwrap_or("Unknown error");
            if let Err(notify_err) = state
                .notifier
                .notify_error(&request.documents, message)
                .await
            {
                tracing::warn!(err = %notify_err, "Failed to send error notification");
            }

            Err(err)
        }
    }
}

async fn answer_document<S: ServerSetup>(
    state: &AppState<S>,
    request: &RunRequest,
) -> AppResult<Vec<String>> {
    request.validate().map_err(AppError::download_failed)?;

    let document = state.store.fetch(&request.documents).await?;

    if document.is_new {
        let event = HackrxEvent::NewFile {
            filehash: document.hash.clone(),
            filepath: document.path.display().to_string(),
        };

        if let Err(err) = state.event_publisher.publish(&event).await {
            tracing::warn!(%err, "Failed to publish new file event");
        }
    }

    let corpus = state.pipeline.load_corpus(&document.path).await?;
    tracing::debug!(hash = %document.hash, chunks = corpus.len(), "Document loaded");

    let outcomes = state
        .pipeline
        .answer_all(&request.questions, &corpus)
        .await;

    Ok(outcomes.iter().map(QuestionOutcome::answer_text).collect())
}
