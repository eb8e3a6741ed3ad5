use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards;
use crate::api::validation::validate_payload;
use crate::core::state::AppState;
use crate::core::time::{format_unix, now_unix};
use crate::models::blobs::ExamBlob;
use crate::models::{ExamDetail, ExamId};
use crate::schemas::exam::{
    ExamCreate, ExamCreatedResponse, ExamDetailResponse, ExamListQuery, ExamListResponse,
    ExamStatusUpdate, ExamSubmissionResponse,
};
use crate::schemas::TransactionResponse;
use crate::services::exam_status::{group_by_status, time_remaining, ClassifiedExam};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_exams).post(create_exam))
        .route("/:exam_id", get(get_exam))
        .route("/:exam_id/status", patch(update_exam_status))
        .route("/:exam_id/submissions", get(list_exam_submissions))
}

async fn list_exams(
    Query(query): Query<ExamListQuery>,
    State(state): State<AppState>,
) -> Result<Json<ExamListResponse>, ApiError> {
    let ledger = guards::ledger(&state)?;
    let exams =
        ledger.get_all_exams().await.map_err(|e| ApiError::upstream(e, "Failed to fetch exams"))?;

    let now = now_unix();
    let mut groups = group_by_status(exams, now);
    if query.sort_by_start {
        groups.sort_by_start_time();
    }

    Ok(Json(ExamListResponse { now, groups }))
}

async fn create_exam(
    State(state): State<AppState>,
    Json(payload): Json<ExamCreate>,
) -> Result<(StatusCode, Json<ExamCreatedResponse>), ApiError> {
    validate_payload(&payload)?;
    let ledger = guards::ledger(&state)?;

    let blob = ExamBlob {
        exam_title: payload.title.trim().to_string(),
        start_time: payload.start_time,
        duration: payload.duration,
        questions: payload.questions.into_iter().map(|question| question.into_question()).collect(),
    };
    if blob.exam_title.is_empty() {
        return Err(ApiError::BadRequest("title must not be blank".to_string()));
    }
    if blob.start_time <= now_unix() {
        return Err(ApiError::BadRequest("start_time must be in the future".to_string()));
    }
    if blob.start_time.checked_add(blob.duration).is_none() {
        return Err(ApiError::BadRequest("start_time + duration overflows".to_string()));
    }

    let value =
        serde_json::to_value(&blob).map_err(|e| ApiError::internal(e, "Failed to encode exam"))?;
    let questions_ref = state
        .content()
        .upload_json(&blob.file_name(), &value)
        .await
        .map_err(|e| ApiError::upstream(e, "Failed to upload exam questions"))?;

    let receipt = ledger
        .create_exam_with_questions(&blob.exam_title, blob.start_time, blob.duration, &questions_ref)
        .await
        .map_err(|e| ApiError::upstream(e, "Failed to create exam on the ledger"))?;

    tracing::info!(
        title = %blob.exam_title,
        questions = blob.questions.len(),
        questions_ref = %questions_ref,
        "Exam created"
    );

    Ok((
        StatusCode::CREATED,
        Json(ExamCreatedResponse {
            questions_url: state.content().resolve(&questions_ref),
            questions_ref,
            transaction_hash: receipt.transaction_hash,
        }),
    ))
}

/// Reads an exam, mapping the contract's zero-valued struct to 404.
pub(crate) async fn fetch_exam(state: &AppState, exam_id: ExamId) -> Result<ExamDetail, ApiError> {
    let detail = guards::ledger(state)?
        .get_exam_by_id(exam_id)
        .await
        .map_err(|e| ApiError::upstream(e, "Failed to fetch exam"))?;

    if detail.exam.duration == 0 && detail.exam.title.is_empty() {
        return Err(ApiError::NotFound("Exam not found".to_string()));
    }
    Ok(detail)
}

async fn get_exam(
    Path(exam_id): Path<ExamId>,
    State(state): State<AppState>,
) -> Result<Json<ExamDetailResponse>, ApiError> {
    let ExamDetail { exam, questions_ref } = fetch_exam(&state, exam_id).await?;

    let now = now_unix();
    let remaining = time_remaining(&exam, now)?;
    let exam = ClassifiedExam::classify(exam, now)?;

    Ok(Json(ExamDetailResponse {
        starts_at: format_unix(exam.exam.start_time),
        ends_at: format_unix(exam.end_time),
        exam,
        time_remaining: remaining,
        questions_url: state.content().resolve(&questions_ref),
        questions_ref,
    }))
}

async fn update_exam_status(
    Path(exam_id): Path<ExamId>,
    State(state): State<AppState>,
    Json(payload): Json<ExamStatusUpdate>,
) -> Result<Json<TransactionResponse>, ApiError> {
    fetch_exam(&state, exam_id).await?;

    let receipt = guards::ledger(&state)?
        .update_exam_status(exam_id, payload.is_active)
        .await
        .map_err(|e| ApiError::upstream(e, "Failed to update exam status"))?;

    tracing::info!(exam_id, is_active = payload.is_active, "Exam status updated");
    Ok(Json(receipt.into()))
}

async fn list_exam_submissions(
    Path(exam_id): Path<ExamId>,
    State(state): State<AppState>,
) -> Result<Json<Vec<ExamSubmissionResponse>>, ApiError> {
    let entries = guards::ledger(&state)?
        .get_all_submissions(exam_id)
        .await
        .map_err(|e| ApiError::upstream(e, "Failed to fetch submissions"))?;

    Ok(Json(
        entries
            .into_iter()
            .map(|entry| ExamSubmissionResponse {
                student: entry.student.to_string(),
                url: state.content().resolve(&entry.submission_ref),
                submission_ref: entry.submission_ref,
            })
            .collect(),
    ))
}
