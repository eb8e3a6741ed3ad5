use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::blobs::ExamQuestion;
use crate::models::{Letter, Timestamp};
use crate::services::exam_status::{ClassifiedExam, StatusGroups};

#[derive(Debug, Deserialize, Serialize, Validate)]
pub(crate) struct QuestionCreate {
    #[validate(length(min = 1, message = "question must not be empty"))]
    pub(crate) question: String,
    #[validate(length(equal = 4, message = "each question needs exactly four options"))]
    pub(crate) options: Vec<String>,
    #[serde(alias = "correctAnswer")]
    pub(crate) correct_answer: Letter,
}

impl QuestionCreate {
    pub(crate) fn into_question(self) -> ExamQuestion {
        ExamQuestion {
            question: self.question.trim().to_string(),
            options: self.options,
            correct_answer: self.correct_answer,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExamCreate {
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub(crate) title: String,
    #[serde(alias = "startTime")]
    #[validate(range(min = 0, message = "start_time must be a unix timestamp"))]
    pub(crate) start_time: Timestamp,
    #[validate(range(min = 1, message = "duration must be positive"))]
    pub(crate) duration: i64,
    #[validate(length(min = 1, message = "at least one question is required"), nested)]
    pub(crate) questions: Vec<QuestionCreate>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ExamListQuery {
    /// Order each status group by start time instead of ledger order.
    #[serde(default)]
    pub(crate) sort_by_start: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExamStatusUpdate {
    #[serde(alias = "isActive")]
    pub(crate) is_active: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamCreatedResponse {
    pub(crate) questions_ref: String,
    pub(crate) questions_url: String,
    pub(crate) transaction_hash: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamListResponse {
    pub(crate) now: Timestamp,
    pub(crate) groups: StatusGroups,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamDetailResponse {
    #[serde(flatten)]
    pub(crate) exam: ClassifiedExam,
    pub(crate) starts_at: Option<String>,
    pub(crate) ends_at: Option<String>,
    pub(crate) time_remaining: Option<i64>,
    pub(crate) questions_ref: String,
    pub(crate) questions_url: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamSubmissionResponse {
    pub(crate) student: String,
    pub(crate) submission_ref: String,
    pub(crate) url: String,
}
