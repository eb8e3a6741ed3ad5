use std::collections::BTreeMap;

use crate::api::errors::ApiError;
use crate::models::{Address, Letter};

pub(crate) fn parse_address(raw: &str) -> Result<Address, ApiError> {
    Address::parse(raw).map_err(|err| ApiError::BadRequest(err.to_string()))
}

pub(crate) fn validate_payload(payload: &impl validator::Validate) -> Result<(), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// Every answer must be a letter A-D for a question that exists.
pub(crate) fn parse_answers(
    raw: &BTreeMap<usize, String>,
    question_count: usize,
) -> Result<BTreeMap<usize, Letter>, ApiError> {
    raw.iter()
        .map(|(index, value)| {
            if *index >= question_count {
                return Err(ApiError::BadRequest(format!(
                    "Answer for question {index} but the exam has {question_count} questions"
                )));
            }
            let letter = Letter::parse(value).ok_or_else(|| {
                ApiError::BadRequest(format!(
                    "Answer for question {index} must be one of A, B, C, D (got '{value}')"
                ))
            })?;
            Ok((*index, letter))
        })
        .collect()
}
