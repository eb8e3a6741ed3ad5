use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, post},
    Json, Router,
};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::validation::validate_payload;
use crate::core::state::AppState;
use crate::core::time::now_unix;
use crate::schemas::voice::{
    InterpretRequest, InterpretResponse, TranscriptRequest, TranscriptResponse,
    VoiceSessionCreate, VoiceSessionCreated,
};
use crate::services::voice::{interpret, VoiceSession};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/interpret", post(interpret_transcript))
        .route("/sessions", post(open_session))
        .route("/sessions/:session_id", delete(close_session))
        .route("/sessions/:session_id/transcripts", post(dispatch_transcript))
}

async fn interpret_transcript(
    State(state): State<AppState>,
    Json(payload): Json<InterpretRequest>,
) -> Json<InterpretResponse> {
    let command = interpret(&payload.transcript);
    let announce = command.should_announce(state.settings().voice().min_feedback_chars);
    Json(InterpretResponse { command, announce })
}

async fn open_session(
    State(state): State<AppState>,
    Json(payload): Json<VoiceSessionCreate>,
) -> Result<(StatusCode, Json<VoiceSessionCreated>), ApiError> {
    validate_payload(&payload)?;

    let session = VoiceSession::new(
        payload.question_count,
        payload.ends_at,
        state.settings().voice().min_feedback_chars,
    );
    let session_id = state.voice().open(session).await;
    tracing::debug!(%session_id, questions = payload.question_count, "Voice session opened");

    Ok((StatusCode::CREATED, Json(VoiceSessionCreated { session_id })))
}

async fn dispatch_transcript(
    Path(session_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<TranscriptRequest>,
) -> Result<Json<TranscriptResponse>, ApiError> {
    let session = state
        .voice()
        .get(&session_id)
        .await
        .ok_or_else(|| ApiError::NotFound("Voice session not found".to_string()))?;

    let mut session = session.lock().await;
    let outcome = session.handle(&payload.transcript, &payload.viewport, now_unix());

    Ok(Json(TranscriptResponse {
        duplicate: outcome.is_none(),
        outcome,
        answers: session.answers().clone(),
        submitted: session.is_submitted(),
    }))
}

async fn close_session(
    Path(session_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    if state.voice().close(&session_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Voice session not found".to_string()))
    }
}
