use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{Letter, Timestamp};
use crate::services::voice::{TranscriptOutcome, Viewport, VoiceCommand};

#[derive(Debug, Deserialize)]
pub(crate) struct InterpretRequest {
    pub(crate) transcript: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct InterpretResponse {
    pub(crate) command: VoiceCommand,
    pub(crate) announce: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct VoiceSessionCreate {
    #[serde(alias = "questionCount")]
    #[validate(range(min = 1, max = 500, message = "question_count must be 1-500"))]
    pub(crate) question_count: usize,
    #[serde(default, alias = "endsAt")]
    pub(crate) ends_at: Option<Timestamp>,
}

#[derive(Debug, Serialize)]
pub(crate) struct VoiceSessionCreated {
    pub(crate) session_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TranscriptRequest {
    pub(crate) transcript: String,
    pub(crate) viewport: Viewport,
}

#[derive(Debug, Serialize)]
pub(crate) struct TranscriptResponse {
    /// `true` when the transcript repeated the previous one and was skipped.
    pub(crate) duplicate: bool,
    pub(crate) outcome: Option<TranscriptOutcome>,
    pub(crate) answers: BTreeMap<usize, Letter>,
    pub(crate) submitted: bool,
}
