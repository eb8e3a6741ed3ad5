use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{ExamId, SubmissionMap, SubmissionRecord};

#[derive(Debug, Deserialize)]
pub(crate) struct SubmissionCreate {
    #[serde(alias = "examId")]
    pub(crate) exam_id: ExamId,
    #[serde(alias = "studentAddress")]
    pub(crate) student_address: String,
    /// Question index to the chosen letter.
    #[serde(default)]
    pub(crate) answers: BTreeMap<usize, String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionCreatedResponse {
    pub(crate) result_ref: String,
    pub(crate) result_url: String,
    pub(crate) transaction_hash: String,
    pub(crate) score: f64,
    pub(crate) correct_answers: usize,
    pub(crate) total_questions: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmissionQuery {
    #[serde(alias = "examId")]
    pub(crate) exam_id: ExamId,
    #[serde(alias = "studentAddress")]
    pub(crate) student_address: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionRecordResponse {
    #[serde(flatten)]
    pub(crate) record: SubmissionRecord,
    pub(crate) url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReconcileRequest {
    #[serde(alias = "examIds")]
    pub(crate) exam_ids: Vec<ExamId>,
    #[serde(default, alias = "studentAddress")]
    pub(crate) student_address: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReconcileResponse {
    pub(crate) student_address: String,
    pub(crate) submissions: SubmissionMap,
}
