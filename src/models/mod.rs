use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub(crate) mod blobs;

pub(crate) type ExamId = u64;

/// Unix timestamp in seconds.
pub(crate) type Timestamp = i64;

/// Per-exam submission flags for one student, ordered by exam id.
pub(crate) type SubmissionMap = BTreeMap<ExamId, bool>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid address: {0}")]
pub(crate) struct InvalidAddress(pub(crate) String);

/// EVM account address, normalised to lower case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub(crate) struct Address(String);

impl Address {
    pub(crate) fn parse(raw: &str) -> Result<Self, InvalidAddress> {
        let trimmed = raw.trim();
        let Some(hex_part) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X"))
        else {
            return Err(InvalidAddress(raw.to_string()));
        };

        if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(InvalidAddress(raw.to_string()));
        }

        Ok(Self(format!("0x{}", hex_part.to_ascii_lowercase())))
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Address::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Read-only projection of an exam as stored by the contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct Exam {
    pub(crate) id: ExamId,
    pub(crate) title: String,
    pub(crate) start_time: Timestamp,
    pub(crate) duration: i64,
    pub(crate) is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExamDetail {
    pub(crate) exam: Exam,
    pub(crate) questions_ref: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ExamStatus {
    Active,
    Upcoming,
    Expired,
    Inactive,
}

impl ExamStatus {
    /// Display order used when exams are grouped.
    pub(crate) const ORDER: [ExamStatus; 4] =
        [ExamStatus::Active, ExamStatus::Upcoming, ExamStatus::Expired, ExamStatus::Inactive];

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Upcoming => "upcoming",
            Self::Expired => "expired",
            Self::Inactive => "inactive",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub(crate) enum Letter {
    A,
    B,
    C,
    D,
}

impl Letter {
    pub(crate) const ALL: [Letter; 4] = [Letter::A, Letter::B, Letter::C, Letter::D];

    pub(crate) fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub(crate) fn from_char(value: char) -> Option<Self> {
        match value.to_ascii_uppercase() {
            'A' => Some(Self::A),
            'B' => Some(Self::B),
            'C' => Some(Self::C),
            'D' => Some(Self::D),
            _ => None,
        }
    }

    pub(crate) fn parse(value: &str) -> Option<Self> {
        let mut chars = value.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::from_char(c),
            _ => None,
        }
    }
}

impl fmt::Display for Letter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        };
        f.write_str(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct StudentRecord {
    pub(crate) address: Address,
    pub(crate) student_id: String,
    pub(crate) is_verified: bool,
}

/// Whether one student has submitted one exam, with the stored answer blob
/// when there is one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct SubmissionRecord {
    pub(crate) exam_id: ExamId,
    pub(crate) student: Address,
    pub(crate) has_submitted: bool,
    pub(crate) submission_ref: Option<String>,
}

impl SubmissionRecord {
    /// The contract answers an empty string for a missing submission.
    pub(crate) fn from_ref(exam_id: ExamId, student: Address, submission_ref: String) -> Self {
        let submission_ref = (!submission_ref.is_empty()).then_some(submission_ref);
        Self { exam_id, student, has_submitted: submission_ref.is_some(), submission_ref }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct SubmissionEntry {
    pub(crate) student: Address,
    pub(crate) submission_ref: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_parse_normalises_case() {
        let address = Address::parse(" 0xC33FDB55D1812578560421613c6D58cEf8C4e801 ").unwrap();
        assert_eq!(address.as_str(), "0xc33fdb55d1812578560421613c6d58cef8c4e801");
    }

    #[test]
    fn address_parse_rejects_malformed() {
        assert!(Address::parse("").is_err());
        assert!(Address::parse("c33fdb55d1812578560421613c6d58cef8c4e801").is_err());
        assert!(Address::parse("0x1234").is_err());
        assert!(Address::parse("0xz33fdb55d1812578560421613c6d58cef8c4e801").is_err());
    }

    #[test]
    fn empty_submission_ref_means_not_submitted() {
        let student = Address::parse("0x00000000000000000000000000000000000000aa").unwrap();

        let missing = SubmissionRecord::from_ref(1, student.clone(), String::new());
        let present = SubmissionRecord::from_ref(1, student, "bafyresult".to_string());

        assert!(!missing.has_submitted && missing.submission_ref.is_none());
        assert!(present.has_submitted);
        assert_eq!(present.submission_ref.as_deref(), Some("bafyresult"));
    }

    #[test]
    fn letter_round_trips_index() {
        assert_eq!(Letter::from_index(2), Some(Letter::C));
        assert_eq!(Letter::from_index(4), None);
        assert_eq!(Letter::parse("b"), Some(Letter::B));
        assert_eq!(Letter::parse("AB"), None);
    }
}
