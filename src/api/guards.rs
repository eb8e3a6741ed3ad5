//! Accessors for optional backends; a missing one answers 503.

use std::sync::Arc;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::services::ledger::LedgerClient;
use crate::services::question_extraction::QuestionExtractor;
use crate::services::reconciliation::ReconciliationEngine;

pub(crate) fn ledger(state: &AppState) -> Result<&Arc<dyn LedgerClient>, ApiError> {
    state.ledger().ok_or_else(|| {
        ApiError::ServiceUnavailable(
            "Ledger gateway is not configured. Set LEDGER_GATEWAY_URL and LEDGER_CONTRACT_ADDRESS."
                .to_string(),
        )
    })
}

pub(crate) fn reconciler(state: &AppState) -> Result<&ReconciliationEngine, ApiError> {
    state.reconciler().ok_or_else(|| {
        ApiError::ServiceUnavailable("Ledger gateway is not configured".to_string())
    })
}

pub(crate) fn extractor(state: &AppState) -> Result<&Arc<dyn QuestionExtractor>, ApiError> {
    state.extractor().ok_or_else(|| {
        ApiError::ServiceUnavailable("Google AI API key not configured".to_string())
    })
}
