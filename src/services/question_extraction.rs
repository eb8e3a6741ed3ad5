use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::core::config::Settings;
use crate::models::blobs::ExamQuestion;
use crate::models::Letter;

const OPTIONS_PER_QUESTION: usize = 4;

fn extraction_prompt(input_kind: &str) -> String {
    format!(
        "Extract only the questions, their options, and the correct answer from this {input_kind}.\n\
         Return the output strictly as a JSON list like this:\n\n\
         [\n  {{\n    \"question\": \"What is 2+2?\",\n    \"options\": [\"2\", \"3\", \"4\", \"5\"],\n    \
         \"answer_index\": 2\n  }}\n]\n\n\
         answer_index is the 0-based index of the correct option, or null if it is unknown.\n\
         Do not include any explanation, code block markers, or any other text outside of the JSON array.\n"
    )
}

#[derive(Debug, Error)]
pub(crate) enum ExtractionError {
    #[error("no file or text provided")]
    EmptyInput,
    #[error("model reply is not a valid question list: {0}")]
    MalformedResponse(String),
    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub(crate) enum ExtractionInput {
    Text(String),
    File { mime_type: String, bytes: Vec<u8> },
}

impl ExtractionInput {
    fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::File { .. } => "image",
        }
    }
}

/// One question as the model returned it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ExtractedQuestion {
    pub(crate) question: String,
    pub(crate) options: Vec<String>,
    #[serde(default)]
    pub(crate) answer_index: Option<i64>,
}

impl ExtractedQuestion {
    /// Normalises to exactly four options. A missing or out-of-range answer
    /// index becomes `A` so the question stays usable in the exam form.
    pub(crate) fn into_exam_question(self) -> ExamQuestion {
        let mut options = self.options;
        options.resize(OPTIONS_PER_QUESTION, String::new());

        let correct_answer = self
            .answer_index
            .and_then(|index| usize::try_from(index).ok())
            .and_then(Letter::from_index)
            .unwrap_or(Letter::A);

        ExamQuestion { question: self.question, options, correct_answer }
    }
}

#[async_trait]
pub(crate) trait QuestionExtractor: Send + Sync {
    async fn extract(
        &self,
        input: ExtractionInput,
    ) -> Result<Vec<ExtractedQuestion>, ExtractionError>;
}

/// Gemini `generateContent` over plain REST.
#[derive(Debug, Clone)]
pub(crate) struct GeminiExtractor {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiExtractor {
    pub(crate) fn from_settings(settings: &Settings) -> anyhow::Result<Option<Self>> {
        let ai = settings.ai();
        if ai.genai_key.is_empty() {
            return Ok(None);
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(ai.request_timeout))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Some(Self {
            client,
            api_key: ai.genai_key.clone(),
            base_url: ai.genai_base_url.trim_end_matches('/').to_string(),
            model: ai.genai_model.clone(),
        }))
    }

    async fn generate(&self, input: &ExtractionInput) -> anyhow::Result<String> {
        let mut parts = match input {
            ExtractionInput::Text(text) => vec![json!({"text": text})],
            ExtractionInput::File { mime_type, bytes } => vec![json!({
                "inlineData": {
                    "mimeType": mime_type,
                    "data": base64::engine::general_purpose::STANDARD.encode(bytes),
                }
            })],
        };
        parts.push(json!({"text": extraction_prompt(input.kind())}));

        let payload = json!({
            "contents": [{"role": "user", "parts": parts}],
        });

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .await
            .context("Failed to call Gemini API")?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            anyhow::bail!("Gemini API error (status {status}): {body}");
        }

        reply_text(&body).context("Missing Gemini response content")
    }
}

#[async_trait]
impl QuestionExtractor for GeminiExtractor {
    async fn extract(
        &self,
        input: ExtractionInput,
    ) -> Result<Vec<ExtractedQuestion>, ExtractionError> {
        match &input {
            ExtractionInput::Text(text) if text.trim().is_empty() => {
                return Err(ExtractionError::EmptyInput)
            }
            ExtractionInput::File { bytes, .. } if bytes.is_empty() => {
                return Err(ExtractionError::EmptyInput)
            }
            _ => {}
        }

        tracing::info!(model = %self.model, input = input.kind(), "Sending question extraction request");
        let outcome = match self.generate(&input).await {
            Ok(reply) => parse_reply(&reply),
            Err(err) => Err(ExtractionError::Upstream(err)),
        };

        let label = match &outcome {
            Ok(_) => "ok",
            Err(ExtractionError::MalformedResponse(_)) => "malformed",
            Err(_) => "error",
        };
        metrics::counter!("question_extractions_total", "outcome" => label).increment(1);

        if let Ok(questions) = &outcome {
            tracing::info!(count = questions.len(), "Questions extracted");
        }
        outcome
    }
}

fn reply_text(body: &Value) -> Option<String> {
    let parts = body
        .get("candidates")
        .and_then(|candidates| candidates.get(0))
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)?;

    let text: String = parts.iter().filter_map(|part| part.get("text")).filter_map(Value::as_str).collect();
    (!text.is_empty()).then_some(text)
}

/// Pulls the question array out of free-form model output. Either the whole
/// list is well-formed or the reply is rejected.
pub(crate) fn parse_reply(reply: &str) -> Result<Vec<ExtractedQuestion>, ExtractionError> {
    let stripped = strip_code_fences(reply);
    let (Some(start), Some(end)) = (stripped.find('['), stripped.rfind(']')) else {
        tracing::warn!(reply = %reply, "No JSON array in model reply");
        return Err(ExtractionError::MalformedResponse("no JSON array found".to_string()));
    };
    if end < start {
        return Err(ExtractionError::MalformedResponse("no JSON array found".to_string()));
    }

    serde_json::from_str::<Vec<ExtractedQuestion>>(&stripped[start..=end])
        .map_err(|err| ExtractionError::MalformedResponse(err.to_string()))
}

fn strip_code_fences(reply: &str) -> String {
    reply
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_reply_with_surrounding_text() {
        let reply = "Here you go:\n```json\n[\n  {\"question\": \"2+2?\", \"options\": [\"3\", \"4\"], \"answer_index\": 1}\n]\n```\nDone.";

        let questions = parse_reply(reply).expect("questions");

        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].question, "2+2?");
        assert_eq!(questions[0].answer_index, Some(1));
    }

    #[test]
    fn null_answer_index_is_accepted() {
        let reply = r#"[{"question": "Q", "options": ["a", "b", "c", "d"], "answer_index": null}]"#;
        assert_eq!(parse_reply(reply).unwrap()[0].answer_index, None);
    }

    #[test]
    fn wrong_shapes_are_rejected() {
        let cases = [
            "no array here",
            r#"{"question": "Q"}"#,
            r#"[{"question": 5, "options": ["a"], "answer_index": 0}]"#,
            r#"[{"question": "Q", "options": "a,b", "answer_index": 0}]"#,
            r#"[{"question": "Q", "options": ["a", 2], "answer_index": 0}]"#,
            r#"[{"question": "Q", "options": ["a"], "answer_index": "1"}]"#,
            r#"[{"question": "Q", "options": ["a"], "answer_index": 1.5}]"#,
            "[1, 2, 3]",
        ];

        for reply in cases {
            assert!(
                matches!(parse_reply(reply), Err(ExtractionError::MalformedResponse(_))),
                "accepted: {reply}"
            );
        }
    }

    #[test]
    fn conversion_pads_options_and_maps_answer() {
        let question = ExtractedQuestion {
            question: "Pick".to_string(),
            options: vec!["x".to_string(), "y".to_string()],
            answer_index: Some(1),
        }
        .into_exam_question();

        assert_eq!(question.options, vec!["x", "y", "", ""]);
        assert_eq!(question.correct_answer, Letter::B);
    }

    #[test]
    fn conversion_truncates_and_defaults_answer() {
        let options: Vec<String> = (0..6).map(|n| n.to_string()).collect();
        let out_of_range =
            ExtractedQuestion { question: "Q".to_string(), options: options.clone(), answer_index: Some(7) }
                .into_exam_question();
        let negative =
            ExtractedQuestion { question: "Q".to_string(), options, answer_index: Some(-1) }
                .into_exam_question();

        assert_eq!(out_of_range.options.len(), 4);
        assert_eq!(out_of_range.correct_answer, Letter::A);
        assert_eq!(negative.correct_answer, Letter::A);
    }

    #[test]
    fn reply_text_joins_candidate_parts() {
        let body = json!({
            "candidates": [{"content": {"parts": [{"text": "[{\"question\""}, {"text": ": \"Q\"}]"}]}}]
        });
        assert_eq!(reply_text(&body).as_deref(), Some("[{\"question\": \"Q\"}]"));
        assert!(reply_text(&json!({"candidates": []})).is_none());
    }
}
