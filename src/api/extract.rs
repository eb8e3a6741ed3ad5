use axum::{
    extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State},
    http::header::CONTENT_TYPE,
    routing::post,
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards;
use crate::core::state::AppState;
use crate::schemas::extract::{ExtractResponse, ExtractTextRequest};
use crate::services::question_extraction::{ExtractedQuestion, ExtractionInput};

pub(crate) fn router(max_upload_size_mb: u64) -> Router<AppState> {
    // Multipart framing needs some headroom over the file itself.
    let limit = usize::try_from(max_upload_size_mb.saturating_mul(1024 * 1024))
        .unwrap_or(usize::MAX)
        .saturating_add(64 * 1024);

    Router::new().route("/", post(extract_questions)).layer(DefaultBodyLimit::max(limit))
}

async fn extract_questions(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<ExtractResponse>, ApiError> {
    let extractor = guards::extractor(&state)?;

    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let input = if content_type.starts_with("application/json") {
        let Json(payload) = Json::<ExtractTextRequest>::from_request(request, &state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        payload.text.map(ExtractionInput::Text)
    } else if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|_| ApiError::BadRequest("Invalid multipart data".to_string()))?;
        read_multipart(multipart, state.settings().ai().max_upload_size_mb).await?
    } else {
        return Err(ApiError::BadRequest("Unsupported Content-Type".to_string()));
    };

    let input = input
        .ok_or_else(|| ApiError::BadRequest("No file or text provided in the request".to_string()))?;
    let extracted = extractor.extract(input).await?;
    let questions = extracted.iter().cloned().map(ExtractedQuestion::into_exam_question).collect();

    Ok(Json(ExtractResponse { extracted, questions }))
}

/// A `file` part wins over a `text` part when both are sent.
async fn read_multipart(
    mut multipart: Multipart,
    max_upload_size_mb: u64,
) -> Result<Option<ExtractionInput>, ApiError> {
    let max_bytes = max_upload_size_mb * 1024 * 1024;
    let mut file: Option<ExtractionInput> = None;
    let mut text: Option<String> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::BadRequest("Invalid multipart data".to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let mime_type =
                    field.content_type().unwrap_or("application/octet-stream").to_string();
                let mut bytes = Vec::new();
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|_| ApiError::BadRequest("Failed to read file".to_string()))?
                {
                    if bytes.len() as u64 + chunk.len() as u64 > max_bytes {
                        return Err(ApiError::PayloadTooLarge(format!(
                            "File size exceeds {max_upload_size_mb}MB limit"
                        )));
                    }
                    bytes.extend_from_slice(&chunk);
                }
                if !bytes.is_empty() {
                    file = Some(ExtractionInput::File { mime_type, bytes });
                }
            }
            "text" => {
                let value = field
                    .text()
                    .await
                    .map_err(|_| ApiError::BadRequest("Invalid text field".to_string()))?;
                if !value.trim().is_empty() {
                    text = Some(value);
                }
            }
            _ => {}
        }
    }

    Ok(file.or(text.map(ExtractionInput::Text)))
}
