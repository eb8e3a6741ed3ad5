pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod models;
pub(crate) mod services;
pub(crate) mod schemas;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use crate::core::{config::Settings, state::AppState, telemetry};
use crate::services::content_store;
use crate::services::ledger::{HttpLedgerClient, LedgerClient};
use crate::services::question_extraction::{GeminiExtractor, QuestionExtractor};

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let ledger = HttpLedgerClient::from_settings(&settings)?
        .map(|client| Arc::new(client) as Arc<dyn LedgerClient>);
    if ledger.is_none() {
        tracing::warn!("Ledger gateway not configured; exam, student and submission routes answer 503");
    }

    let content = content_store::from_settings(&settings)?;

    let extractor = GeminiExtractor::from_settings(&settings)?
        .map(|extractor| Arc::new(extractor) as Arc<dyn QuestionExtractor>);
    if extractor.is_none() {
        tracing::warn!("GENAI_KEY not set; question extraction is disabled");
    }

    let state = AppState::new(settings, ledger, content, extractor);
    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        "Examchain API listening"
    );

    axum::serve(listener, app).with_graceful_shutdown(core::shutdown::shutdown_signal()).await?;

    Ok(())
}
