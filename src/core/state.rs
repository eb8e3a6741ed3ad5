use std::sync::Arc;
use std::time::Duration;

use crate::core::config::Settings;
use crate::services::content_store::ContentStore;
use crate::services::ledger::LedgerClient;
use crate::services::question_extraction::QuestionExtractor;
use crate::services::reconciliation::{DashboardRegistry, ReconciliationEngine};
use crate::services::voice::VoiceSessions;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    ledger: Option<Arc<dyn LedgerClient>>,
    reconciler: Option<ReconciliationEngine>,
    content: Arc<dyn ContentStore>,
    extractor: Option<Arc<dyn QuestionExtractor>>,
    dashboards: DashboardRegistry,
    voice: VoiceSessions,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        ledger: Option<Arc<dyn LedgerClient>>,
        content: Arc<dyn ContentStore>,
        extractor: Option<Arc<dyn QuestionExtractor>>,
    ) -> Self {
        let reconciler = ledger
            .as_ref()
            .map(|ledger| ReconciliationEngine::from_settings(Arc::clone(ledger), &settings));
        let dashboards = DashboardRegistry::new(Duration::from_secs(
            settings.reconcile().dashboard_idle_ttl_seconds,
        ));
        let voice =
            VoiceSessions::new(Duration::from_secs(settings.voice().session_idle_ttl_seconds));

        Self {
            inner: Arc::new(InnerState {
                settings,
                ledger,
                reconciler,
                content,
                extractor,
                dashboards,
                voice,
            }),
        }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn ledger(&self) -> Option<&Arc<dyn LedgerClient>> {
        self.inner.ledger.as_ref()
    }

    pub(crate) fn reconciler(&self) -> Option<&ReconciliationEngine> {
        self.inner.reconciler.as_ref()
    }

    pub(crate) fn content(&self) -> &Arc<dyn ContentStore> {
        &self.inner.content
    }

    pub(crate) fn extractor(&self) -> Option<&Arc<dyn QuestionExtractor>> {
        self.inner.extractor.as_ref()
    }

    pub(crate) fn dashboards(&self) -> &DashboardRegistry {
        &self.inner.dashboards
    }

    pub(crate) fn voice(&self) -> &VoiceSessions {
        &self.inner.voice
    }
}
