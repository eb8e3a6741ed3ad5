use std::collections::BTreeMap;

use crate::models::blobs::{ExamQuestion, GraceMarks, QuestionResult, ResultBlob};
use crate::models::{ExamId, Letter, Timestamp};

/// Grades a multiple-choice attempt. Unanswered questions count as wrong.
pub(crate) fn score_attempt(
    exam_id: ExamId,
    exam_title: &str,
    questions: &[ExamQuestion],
    answers: &BTreeMap<usize, Letter>,
    submitted_at: Timestamp,
) -> ResultBlob {
    let student_answers: Vec<QuestionResult> = questions
        .iter()
        .enumerate()
        .map(|(index, question)| {
            let selected_answer = answers.get(&index).copied();
            QuestionResult {
                question_index: index,
                question: question.question.clone(),
                options: question.options.clone(),
                correct_answer: question.correct_answer,
                selected_answer,
                is_correct: selected_answer == Some(question.correct_answer),
            }
        })
        .collect();

    let total_questions = questions.len();
    let correct_answers = student_answers.iter().filter(|result| result.is_correct).count();
    let score = if total_questions == 0 {
        0.0
    } else {
        correct_answers as f64 / total_questions as f64 * 100.0
    };

    ResultBlob {
        exam_id: exam_id.to_string(),
        exam_title: exam_title.to_string(),
        student_answers,
        score,
        total_questions,
        correct_answers,
        submitted_at,
        grace_marks: GraceMarks::default(),
    }
}
