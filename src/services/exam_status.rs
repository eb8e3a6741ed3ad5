use serde::Serialize;
use thiserror::Error;

use crate::models::{Exam, ExamId, ExamStatus, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub(crate) enum StatusError {
    #[error("duration must be positive, got {0}")]
    NonPositiveDuration(i64),
    #[error("exam end time overflows (start {start_time}, duration {duration})")]
    EndTimeOverflow { start_time: Timestamp, duration: i64 },
}

/// Lifecycle phase of an exam at `now`.
///
/// The window is `[start_time, start_time + duration)`: the start instant is
/// already active and the end instant is already expired. A disabled exam is
/// `Inactive` regardless of timing.
pub(crate) fn classify(
    start_time: Timestamp,
    duration: i64,
    is_active: bool,
    now: Timestamp,
) -> Result<ExamStatus, StatusError> {
    let end_time = window_end(start_time, duration)?;
    Ok(status_at(start_time, end_time, is_active, now))
}

fn window_end(start_time: Timestamp, duration: i64) -> Result<Timestamp, StatusError> {
    if duration <= 0 {
        return Err(StatusError::NonPositiveDuration(duration));
    }
    start_time.checked_add(duration).ok_or(StatusError::EndTimeOverflow { start_time, duration })
}

fn status_at(
    start_time: Timestamp,
    end_time: Timestamp,
    is_active: bool,
    now: Timestamp,
) -> ExamStatus {
    if !is_active {
        ExamStatus::Inactive
    } else if now < start_time {
        ExamStatus::Upcoming
    } else if now >= end_time {
        ExamStatus::Expired
    } else {
        ExamStatus::Active
    }
}

pub(crate) fn classify_exam(exam: &Exam, now: Timestamp) -> Result<ExamStatus, StatusError> {
    classify(exam.start_time, exam.duration, exam.is_active, now)
}

/// Seconds left before an active exam closes; `None` outside the window.
pub(crate) fn time_remaining(exam: &Exam, now: Timestamp) -> Result<Option<i64>, StatusError> {
    let end_time = window_end(exam.start_time, exam.duration)?;
    match status_at(exam.start_time, end_time, exam.is_active, now) {
        ExamStatus::Active => Ok(Some(end_time - now)),
        _ => Ok(None),
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ClassifiedExam {
    #[serde(flatten)]
    pub(crate) exam: Exam,
    pub(crate) end_time: Timestamp,
    pub(crate) status: ExamStatus,
}

impl ClassifiedExam {
    pub(crate) fn classify(exam: Exam, now: Timestamp) -> Result<Self, StatusError> {
        let end_time = window_end(exam.start_time, exam.duration)?;
        let status = status_at(exam.start_time, end_time, exam.is_active, now);
        Ok(Self { exam, end_time, status })
    }
}

/// An exam whose on-chain schedule cannot be classified.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct InvalidExam {
    pub(crate) id: ExamId,
    pub(crate) title: String,
    pub(crate) error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub(crate) struct StatusGroups {
    pub(crate) active: Vec<ClassifiedExam>,
    pub(crate) upcoming: Vec<ClassifiedExam>,
    pub(crate) expired: Vec<ClassifiedExam>,
    pub(crate) inactive: Vec<ClassifiedExam>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) invalid: Vec<InvalidExam>,
}

impl StatusGroups {
    pub(crate) fn group(&self, status: ExamStatus) -> &[ClassifiedExam] {
        match status {
            ExamStatus::Active => &self.active,
            ExamStatus::Upcoming => &self.upcoming,
            ExamStatus::Expired => &self.expired,
            ExamStatus::Inactive => &self.inactive,
        }
    }

    fn group_mut(&mut self, status: ExamStatus) -> &mut Vec<ClassifiedExam> {
        match status {
            ExamStatus::Active => &mut self.active,
            ExamStatus::Upcoming => &mut self.upcoming,
            ExamStatus::Expired => &mut self.expired,
            ExamStatus::Inactive => &mut self.inactive,
        }
    }

    /// All exams in display order: active, upcoming, expired, inactive.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &ClassifiedExam> {
        ExamStatus::ORDER.into_iter().flat_map(move |status| self.group(status).iter())
    }

    /// Reorders each group by start time; stable, so equal starts keep
    /// source order.
    pub(crate) fn sort_by_start_time(&mut self) {
        for status in ExamStatus::ORDER {
            self.group_mut(status).sort_by_key(|item| item.exam.start_time);
        }
    }
}

/// Classifies every exam and buckets it by status, keeping source order
/// within each bucket. Exams with an invalid schedule land in `invalid`
/// and never hide the rest.
pub(crate) fn group_by_status(
    exams: impl IntoIterator<Item = Exam>,
    now: Timestamp,
) -> StatusGroups {
    let mut groups = StatusGroups::default();
    for exam in exams {
        let (id, title) = (exam.id, exam.title.clone());
        match ClassifiedExam::classify(exam, now) {
            Ok(classified) => groups.group_mut(classified.status).push(classified),
            Err(err) => {
                tracing::warn!(exam_id = id, error = %err, "Skipping exam with invalid schedule");
                groups.invalid.push(InvalidExam { id, title, error: err.to_string() });
            }
        }
    }
    groups
}
