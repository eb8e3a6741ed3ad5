//! Determines which exams a student has already submitted.
//!
//! Lookups go to the ledger in fixed-size batches: every lookup of a batch is
//! in flight at once, and the next batch starts only after the whole batch has
//! settled. A lookup that fails, panics or times out counts as "not
//! submitted" and never affects the other entries.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::core::config::Settings;
use crate::models::{Address, ExamId, InvalidAddress, SubmissionMap};
use crate::services::ledger::LedgerClient;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum ReconcileError {
    #[error(transparent)]
    InvalidAddress(#[from] InvalidAddress),
}

#[derive(Clone)]
pub(crate) struct ReconciliationEngine {
    ledger: Arc<dyn LedgerClient>,
    batch_size: usize,
    lookup_timeout: Option<Duration>,
}

impl ReconciliationEngine {
    pub(crate) fn new(
        ledger: Arc<dyn LedgerClient>,
        batch_size: usize,
        lookup_timeout: Option<Duration>,
    ) -> Self {
        Self { ledger, batch_size: batch_size.max(1), lookup_timeout }
    }

    pub(crate) fn from_settings(ledger: Arc<dyn LedgerClient>, settings: &Settings) -> Self {
        let reconcile = settings.reconcile();
        let timeout = (reconcile.lookup_timeout_seconds > 0)
            .then(|| Duration::from_secs(reconcile.lookup_timeout_seconds));
        Self::new(ledger, reconcile.batch_size, timeout)
    }

    /// Returns one entry per distinct exam id. A blank address means "not
    /// connected" and yields an empty map without touching the ledger.
    pub(crate) async fn reconcile(
        &self,
        exam_ids: &[ExamId],
        student: &str,
    ) -> Result<SubmissionMap, ReconcileError> {
        if student.trim().is_empty() {
            return Ok(SubmissionMap::new());
        }
        let student = Address::parse(student)?;
        Ok(self.reconcile_for(exam_ids, &student).await)
    }

    pub(crate) async fn reconcile_for(
        &self,
        exam_ids: &[ExamId],
        student: &Address,
    ) -> SubmissionMap {
        let mut seen = BTreeSet::new();
        let unique: Vec<ExamId> = exam_ids.iter().copied().filter(|id| seen.insert(*id)).collect();

        let mut statuses = SubmissionMap::new();
        for (index, batch) in unique.chunks(self.batch_size).enumerate() {
            tracing::debug!(
                student = %student,
                batch = index,
                size = batch.len(),
                "Reconciling submission batch"
            );
            let settled = self.run_batch(batch, student).await;
            statuses.extend(settled);
        }

        statuses
    }

    async fn run_batch(&self, batch: &[ExamId], student: &Address) -> SubmissionMap {
        // Seeded with `false` so an entry whose task is lost still appears.
        let mut settled: SubmissionMap = batch.iter().map(|id| (*id, false)).collect();
        let mut tasks = JoinSet::new();

        for &exam_id in batch {
            let ledger = Arc::clone(&self.ledger);
            let student = student.clone();
            let timeout = self.lookup_timeout;
            tasks.spawn(async move {
                let lookup = ledger.has_submitted(exam_id, &student);
                let outcome = match timeout {
                    Some(limit) => match tokio::time::timeout(limit, lookup).await {
                        Ok(result) => result,
                        Err(_) => Err(anyhow::anyhow!("lookup timed out after {limit:?}")),
                    },
                    None => lookup.await,
                };
                (exam_id, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((exam_id, Ok(submitted))) => {
                    metrics::counter!("submission_lookups_total", "outcome" => "ok").increment(1);
                    settled.insert(exam_id, submitted);
                }
                Ok((exam_id, Err(err))) => {
                    metrics::counter!("submission_lookups_total", "outcome" => "failed")
                        .increment(1);
                    tracing::warn!(
                        exam_id,
                        student = %student,
                        error = %err,
                        "Submission lookup failed; treating as not submitted"
                    );
                }
                Err(err) => {
                    metrics::counter!("submission_lookups_total", "outcome" => "panicked")
                        .increment(1);
                    tracing::error!(error = %err, "Submission lookup task aborted");
                }
            }
        }

        settled
    }
}

/// Inputs a dashboard's submission map was computed for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DashboardInputs {
    pub(crate) exam_ids: Vec<ExamId>,
    pub(crate) student: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Recompute {
    Fresh(Arc<SubmissionMap>),
    /// Inputs changed, or the session was invalidated, while this
    /// computation was in flight; its result was dropped.
    Superseded,
}

#[derive(Debug, Default)]
struct SessionState {
    next_generation: u64,
    /// Computations started at or before this generation may not commit.
    invalidated_through: u64,
    requested: Option<DashboardInputs>,
    committed: Option<Committed>,
}

#[derive(Debug)]
struct Committed {
    generation: u64,
    inputs: DashboardInputs,
    statuses: Arc<SubmissionMap>,
}

/// Submission map owned by one dashboard, recomputed on explicit request.
#[derive(Default)]
pub(crate) struct DashboardSession {
    state: Mutex<SessionState>,
}

impl DashboardSession {
    pub(crate) async fn recompute(
        &self,
        engine: &ReconciliationEngine,
        inputs: DashboardInputs,
    ) -> Recompute {
        let generation = {
            let mut state = self.state.lock().await;
            state.next_generation += 1;
            state.requested = Some(inputs.clone());
            state.next_generation
        };

        let statuses = match &inputs.student {
            Some(student) => engine.reconcile_for(&inputs.exam_ids, student).await,
            None => SubmissionMap::new(),
        };

        let mut state = self.state.lock().await;
        if generation <= state.invalidated_through {
            tracing::debug!(generation, "Dropping submission map computed before invalidation");
            return Recompute::Superseded;
        }
        if state.requested.as_ref() != Some(&inputs) {
            tracing::debug!(generation, "Dropping submission map for outdated inputs");
            return Recompute::Superseded;
        }
        if let Some(committed) = &state.committed {
            if committed.inputs == inputs && committed.generation > generation {
                return Recompute::Fresh(Arc::clone(&committed.statuses));
            }
        }

        let statuses = Arc::new(statuses);
        state.committed =
            Some(Committed { generation, inputs, statuses: Arc::clone(&statuses) });
        Recompute::Fresh(statuses)
    }

    /// Last committed map, if it was computed for `inputs`.
    pub(crate) async fn snapshot(&self, inputs: &DashboardInputs) -> Option<Arc<SubmissionMap>> {
        let state = self.state.lock().await;
        state
            .committed
            .as_ref()
            .filter(|committed| &committed.inputs == inputs)
            .map(|committed| Arc::clone(&committed.statuses))
    }

    /// Drops the committed map and fences off every computation already in
    /// flight, so none of them can commit a map read before the change.
    pub(crate) async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        state.invalidated_through = state.next_generation;
        state.requested = None;
        state.committed = None;
    }
}

struct RegistryEntry {
    session: Arc<DashboardSession>,
    last_used: Instant,
}

/// One dashboard session per student address. Sessions idle for longer than
/// `idle_ttl` are evicted on the next access.
pub(crate) struct DashboardRegistry {
    idle_ttl: Duration,
    sessions: Mutex<HashMap<Address, RegistryEntry>>,
}

impl DashboardRegistry {
    pub(crate) fn new(idle_ttl: Duration) -> Self {
        Self { idle_ttl, sessions: Mutex::new(HashMap::new()) }
    }

    pub(crate) async fn session(&self, student: &Address) -> Arc<DashboardSession> {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;
        self.evict_idle(&mut sessions, now);

        let entry = sessions.entry(student.clone()).or_insert_with(|| RegistryEntry {
            session: Arc::new(DashboardSession::default()),
            last_used: now,
        });
        entry.last_used = now;
        Arc::clone(&entry.session)
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        self.evict_idle(&mut sessions, Instant::now());
        sessions.len()
    }

    fn evict_idle(&self, sessions: &mut HashMap<Address, RegistryEntry>, now: Instant) {
        let before = sessions.len();
        sessions.retain(|_, entry| now.duration_since(entry.last_used) < self.idle_ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted idle dashboard sessions");
        }
    }

    pub(crate) async fn invalidate(&self, student: &Address) {
        let session =
            self.sessions.lock().await.get(student).map(|entry| Arc::clone(&entry.session));
        if let Some(session) = session {
            session.invalidate().await;
        }
    }
}
