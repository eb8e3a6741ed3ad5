use serde::{Deserialize, Serialize};

use crate::models::blobs::ExamQuestion;
use crate::services::question_extraction::ExtractedQuestion;

#[derive(Debug, Deserialize)]
pub(crate) struct ExtractTextRequest {
    #[serde(default)]
    pub(crate) text: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExtractResponse {
    /// Model output as returned, after shape validation.
    pub(crate) extracted: Vec<ExtractedQuestion>,
    /// Same questions normalised for the exam form.
    pub(crate) questions: Vec<ExamQuestion>,
}
