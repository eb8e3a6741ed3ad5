use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::errors::ApiError;
use crate::api::guards;
use crate::api::validation::{parse_address, validate_payload};
use crate::core::state::AppState;
use crate::core::time::now_unix;
use crate::models::{ExamStatus, SubmissionMap};
use crate::schemas::student::{
    DashboardExam, DashboardGroups, DashboardResponse, ExamAction, StudentRegister,
    StudentResponse, StudentVerify,
};
use crate::schemas::TransactionResponse;
use crate::services::exam_status::{group_by_status, ClassifiedExam, StatusGroups};
use crate::services::reconciliation::{DashboardInputs, Recompute};

#[derive(Debug, Deserialize)]
pub(crate) struct DashboardQuery {
    /// `false` reuses the last map computed for the same exams, if any.
    #[serde(default = "default_refresh")]
    refresh: bool,
}

fn default_refresh() -> bool {
    true
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_students))
        .route("/register", post(register_student))
        .route("/verify", post(verify_student))
        .route("/:address/dashboard", get(dashboard))
}

async fn list_students(
    State(state): State<AppState>,
) -> Result<Json<Vec<StudentResponse>>, ApiError> {
    let students = guards::ledger(&state)?
        .get_all_students()
        .await
        .map_err(|e| ApiError::upstream(e, "Failed to fetch students"))?;

    Ok(Json(students.into_iter().map(StudentResponse::from).collect()))
}

async fn register_student(
    State(state): State<AppState>,
    Json(payload): Json<StudentRegister>,
) -> Result<(StatusCode, Json<TransactionResponse>), ApiError> {
    validate_payload(&payload)?;
    let student = parse_address(&payload.address)?;
    let student_id = payload.student_id.trim();
    if student_id.is_empty() {
        return Err(ApiError::BadRequest("student_id must not be blank".to_string()));
    }

    let receipt = guards::ledger(&state)?
        .register_student(&student, student_id)
        .await
        .map_err(|e| ApiError::upstream(e, "Failed to register student"))?;

    tracing::info!(student = %student, "Student registered");
    Ok((StatusCode::CREATED, Json(receipt.into())))
}

async fn verify_student(
    State(state): State<AppState>,
    Json(payload): Json<StudentVerify>,
) -> Result<Json<TransactionResponse>, ApiError> {
    let student = parse_address(&payload.address)?;

    let receipt = guards::ledger(&state)?
        .verify_student(&student)
        .await
        .map_err(|e| ApiError::upstream(e, "Failed to verify student"))?;

    state.dashboards().invalidate(&student).await;
    tracing::info!(student = %student, "Student verified");
    Ok(Json(receipt.into()))
}

async fn dashboard(
    Path(address): Path<String>,
    Query(query): Query<DashboardQuery>,
    State(state): State<AppState>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let student = parse_address(&address)?;
    let ledger = guards::ledger(&state)?;
    let engine = guards::reconciler(&state)?;

    let is_verified = ledger
        .is_student_verified(&student)
        .await
        .map_err(|e| ApiError::upstream(e, "Failed to check verification status"))?;
    let exams =
        ledger.get_all_exams().await.map_err(|e| ApiError::upstream(e, "Failed to fetch exams"))?;

    let now = now_unix();
    let groups = group_by_status(exams, now);

    // Unverified students are treated like a disconnected wallet.
    let inputs = DashboardInputs {
        exam_ids: groups.iter().map(|item| item.exam.id).collect(),
        student: is_verified.then(|| student.clone()),
    };

    let session = state.dashboards().session(&student).await;
    let cached = if query.refresh { None } else { session.snapshot(&inputs).await };
    let submissions = match cached {
        Some(map) => map,
        None => match session.recompute(engine, inputs).await {
            Recompute::Fresh(map) => map,
            Recompute::Superseded => {
                return Err(ApiError::Conflict(
                    "Dashboard inputs changed while loading; retry".to_string(),
                ))
            }
        },
    };

    Ok(Json(DashboardResponse {
        address: student.to_string(),
        is_verified,
        now,
        exams: dashboard_groups(groups, &submissions, is_verified),
        submissions: (*submissions).clone(),
    }))
}

pub(crate) fn exam_action(status: ExamStatus, submitted: bool) -> ExamAction {
    if submitted {
        return ExamAction::ViewResults;
    }
    match status {
        ExamStatus::Active => ExamAction::TakeExam,
        ExamStatus::Expired => ExamAction::Expired,
        ExamStatus::Upcoming => ExamAction::NotStarted,
        ExamStatus::Inactive => ExamAction::Inactive,
    }
}

fn dashboard_groups(
    groups: StatusGroups,
    submissions: &SubmissionMap,
    is_verified: bool,
) -> DashboardGroups {
    let annotate = |items: Vec<ClassifiedExam>| -> Vec<DashboardExam> {
        items
            .into_iter()
            .map(|exam| {
                let submitted = submissions.get(&exam.exam.id).copied().unwrap_or(false);
                let action = exam_action(exam.status, submitted);
                let action_enabled = is_verified
                    && matches!(action, ExamAction::ViewResults | ExamAction::TakeExam);
                DashboardExam { exam, submitted, action, action_enabled }
            })
            .collect()
    };

    DashboardGroups {
        active: annotate(groups.active),
        upcoming: annotate(groups.upcoming),
        expired: annotate(groups.expired),
        inactive: annotate(groups.inactive),
    }
}
