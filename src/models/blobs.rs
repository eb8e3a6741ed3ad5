//! JSON documents kept in content storage. Field names are camelCase because
//! the browser client reads and writes the same blobs.

use serde::{Deserialize, Serialize};

use super::{ExamId, Letter, Timestamp};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExamQuestion {
    pub(crate) question: String,
    pub(crate) options: Vec<String>,
    pub(crate) correct_answer: Letter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExamBlob {
    pub(crate) exam_title: String,
    pub(crate) start_time: Timestamp,
    pub(crate) duration: i64,
    pub(crate) questions: Vec<ExamQuestion>,
}

impl ExamBlob {
    pub(crate) fn file_name(&self) -> String {
        let slug = self
            .exam_title
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-")
            .to_lowercase();
        format!("exam-{slug}.json")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QuestionResult {
    pub(crate) question_index: usize,
    pub(crate) question: String,
    pub(crate) options: Vec<String>,
    pub(crate) correct_answer: Letter,
    pub(crate) selected_answer: Option<Letter>,
    pub(crate) is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct GraceMarks {
    pub(crate) enabled: bool,
    pub(crate) questions: String,
    pub(crate) points: u32,
}

impl Default for GraceMarks {
    fn default() -> Self {
        Self { enabled: false, questions: String::new(), points: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResultBlob {
    pub(crate) exam_id: String,
    pub(crate) exam_title: String,
    pub(crate) student_answers: Vec<QuestionResult>,
    pub(crate) score: f64,
    pub(crate) total_questions: usize,
    pub(crate) correct_answers: usize,
    pub(crate) submitted_at: Timestamp,
    #[serde(default)]
    pub(crate) grace_marks: GraceMarks,
}

impl ResultBlob {
    pub(crate) fn file_name(exam_id: ExamId, student: &str) -> String {
        format!("result-{exam_id}-{student}.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exam_blob_uses_browser_field_names() {
        let blob = ExamBlob {
            exam_title: "Organic  Chemistry Final".to_string(),
            start_time: 1_000,
            duration: 600,
            questions: vec![ExamQuestion {
                question: "2+2?".to_string(),
                options: vec!["1".into(), "2".into(), "3".into(), "4".into()],
                correct_answer: Letter::D,
            }],
        };

        let value = serde_json::to_value(&blob).unwrap();
        assert_eq!(value["examTitle"], "Organic  Chemistry Final");
        assert_eq!(value["questions"][0]["correctAnswer"], "D");
        assert_eq!(blob.file_name(), "exam-organic-chemistry-final.json");
    }

    #[test]
    fn result_blob_defaults_missing_grace_marks() {
        let raw = serde_json::json!({
            "examId": "1",
            "examTitle": "Quiz",
            "studentAnswers": [],
            "score": 0.0,
            "totalQuestions": 0,
            "correctAnswers": 0,
            "submittedAt": 10
        });

        let blob: ResultBlob = serde_json::from_value(raw).unwrap();
        assert!(!blob.grace_marks.enabled);
    }
}
