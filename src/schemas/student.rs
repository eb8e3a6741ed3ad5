use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{StudentRecord, SubmissionMap, Timestamp};
use crate::services::exam_status::ClassifiedExam;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct StudentRegister {
    pub(crate) address: String,
    #[serde(alias = "studentId")]
    #[validate(length(min = 1, max = 64, message = "student_id must be 1-64 characters"))]
    pub(crate) student_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StudentVerify {
    pub(crate) address: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct StudentResponse {
    pub(crate) address: String,
    pub(crate) student_id: String,
    pub(crate) is_verified: bool,
}

impl From<StudentRecord> for StudentResponse {
    fn from(record: StudentRecord) -> Self {
        Self {
            address: record.address.to_string(),
            student_id: record.student_id,
            is_verified: record.is_verified,
        }
    }
}

/// What the dashboard offers for one exam card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ExamAction {
    ViewResults,
    TakeExam,
    Expired,
    NotStarted,
    Inactive,
}

#[derive(Debug, Serialize)]
pub(crate) struct DashboardExam {
    #[serde(flatten)]
    pub(crate) exam: ClassifiedExam,
    pub(crate) submitted: bool,
    pub(crate) action: ExamAction,
    pub(crate) action_enabled: bool,
}

#[derive(Debug, Default, Serialize)]
pub(crate) struct DashboardGroups {
    pub(crate) active: Vec<DashboardExam>,
    pub(crate) upcoming: Vec<DashboardExam>,
    pub(crate) expired: Vec<DashboardExam>,
    pub(crate) inactive: Vec<DashboardExam>,
}

#[derive(Debug, Serialize)]
pub(crate) struct DashboardResponse {
    pub(crate) address: String,
    pub(crate) is_verified: bool,
    pub(crate) now: Timestamp,
    pub(crate) submissions: SubmissionMap,
    pub(crate) exams: DashboardGroups,
}
