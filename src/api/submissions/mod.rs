use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::exams::fetch_exam;
use crate::api::guards;
use crate::api::validation::{parse_address, parse_answers};
use crate::core::state::AppState;
use crate::core::time::now_unix;
use crate::models::blobs::{ExamBlob, ResultBlob};
use crate::models::{Address, ExamId, ExamStatus, SubmissionRecord};
use crate::schemas::submission::{
    ReconcileRequest, ReconcileResponse, SubmissionCreate, SubmissionCreatedResponse,
    SubmissionQuery, SubmissionRecordResponse,
};
use crate::services::exam_status::classify_exam;
use crate::services::scoring::score_attempt;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_submission).post(submit_answers))
        .route("/reconcile", post(reconcile))
}

async fn get_submission(
    Query(query): Query<SubmissionQuery>,
    State(state): State<AppState>,
) -> Result<Json<SubmissionRecordResponse>, ApiError> {
    let student = parse_address(&query.student_address)?;

    let submission_ref = guards::ledger(&state)?
        .get_student_submission(query.exam_id, &student)
        .await
        .map_err(|e| ApiError::upstream(e, "Failed to fetch submission"))?;

    let record = SubmissionRecord::from_ref(query.exam_id, student, submission_ref);
    let url =
        record.submission_ref.as_deref().map(|content_ref| state.content().resolve(content_ref));
    Ok(Json(SubmissionRecordResponse { record, url }))
}

async fn submit_answers(
    State(state): State<AppState>,
    Json(payload): Json<SubmissionCreate>,
) -> Result<(StatusCode, Json<SubmissionCreatedResponse>), ApiError> {
    let student = parse_address(&payload.student_address)?;
    let ledger = guards::ledger(&state)?;

    let verified = ledger
        .is_student_verified(&student)
        .await
        .map_err(|e| ApiError::upstream(e, "Failed to check verification status"))?;
    if !verified {
        return Err(ApiError::Forbidden("Student is not verified".to_string()));
    }

    let detail = fetch_exam(&state, payload.exam_id).await?;
    let now = now_unix();
    let status = classify_exam(&detail.exam, now)?;
    if status != ExamStatus::Active {
        return Err(ApiError::BadRequest(format!(
            "Exam is not active (status: {})",
            status.as_str()
        )));
    }

    ensure_not_submitted(&state, payload.exam_id, &student).await?;

    let blob = state
        .content()
        .fetch_json(&detail.questions_ref)
        .await
        .map_err(|e| ApiError::upstream(e, "Failed to fetch exam questions"))?;
    let blob: ExamBlob = serde_json::from_value(blob)
        .map_err(|e| ApiError::upstream(e, "Exam questions are malformed"))?;

    let answers = parse_answers(&payload.answers, blob.questions.len())?;
    let result = score_attempt(payload.exam_id, &detail.exam.title, &blob.questions, &answers, now);

    let value = serde_json::to_value(&result)
        .map_err(|e| ApiError::internal(e, "Failed to encode result"))?;
    let result_ref = state
        .content()
        .upload_json(&ResultBlob::file_name(payload.exam_id, student.as_str()), &value)
        .await
        .map_err(|e| ApiError::upstream(e, "Failed to upload result"))?;

    let receipt = ledger
        .submit_answers(payload.exam_id, &student, &result_ref)
        .await
        .map_err(|e| ApiError::upstream(e, "Failed to record submission on the ledger"))?;

    state.dashboards().invalidate(&student).await;
    tracing::info!(
        exam_id = payload.exam_id,
        student = %student,
        score = result.score,
        result_ref = %result_ref,
        "Answers submitted"
    );

    Ok((
        StatusCode::CREATED,
        Json(SubmissionCreatedResponse {
            result_url: state.content().resolve(&result_ref),
            result_ref,
            transaction_hash: receipt.transaction_hash,
            score: result.score,
            correct_answers: result.correct_answers,
            total_questions: result.total_questions,
        }),
    ))
}

/// Direct check before writing. Unlike reconciliation, a failed lookup here
/// refuses the submission instead of assuming "not submitted".
async fn ensure_not_submitted(
    state: &AppState,
    exam_id: ExamId,
    student: &Address,
) -> Result<(), ApiError> {
    let submitted = guards::ledger(state)?
        .has_submitted(exam_id, student)
        .await
        .map_err(|e| ApiError::upstream(e, "Could not confirm submission status; try again"))?;

    if submitted {
        return Err(ApiError::Conflict("Answers already submitted for this exam".to_string()));
    }
    Ok(())
}

async fn reconcile(
    State(state): State<AppState>,
    Json(payload): Json<ReconcileRequest>,
) -> Result<Json<ReconcileResponse>, ApiError> {
    let engine = guards::reconciler(&state)?;
    let submissions = engine.reconcile(&payload.exam_ids, &payload.student_address).await?;

    let student_address = match payload.student_address.trim() {
        "" => String::new(),
        raw => raw.to_lowercase(),
    };
    Ok(Json(ReconcileResponse { student_address, submissions }))
}

#[cfg(test)]
mod tests;
