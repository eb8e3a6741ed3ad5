use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    Router,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::api;
use crate::core::{config::Settings, state::AppState};
use crate::models::{Address, Exam, ExamDetail, ExamId, StudentRecord, SubmissionEntry};
use crate::services::content_store::{ContentStore, MemoryContentStore};
use crate::services::ledger::{LedgerClient, TxReceipt};
use crate::services::question_extraction::{
    parse_reply, ExtractedQuestion, ExtractionError, ExtractionInput, QuestionExtractor,
};

const CLEARED_VARS: &[&str] = &[
    "EXAMCHAIN_HOST",
    "EXAMCHAIN_PORT",
    "EXAMCHAIN_LOG_JSON",
    "BACKEND_CORS_ORIGINS",
    "LEDGER_GATEWAY_URL",
    "LEDGER_API_KEY",
    "LEDGER_CHAIN_ID",
    "LEDGER_CONTRACT_ADDRESS",
    "CONTENT_BACKEND",
    "PINATA_JWT",
    "PINATA_GATEWAY",
    "PINATA_GATEWAY_TOKEN",
    "GENAI_KEY",
    "RECONCILE_BATCH_SIZE",
    "RECONCILE_LOOKUP_TIMEOUT_SECONDS",
    "VOICE_MIN_FEEDBACK_CHARS",
    "VOICE_SESSION_IDLE_TTL_SECONDS",
    "DASHBOARD_IDLE_TTL_SECONDS",
];

pub(crate) struct TestContext {
    pub(crate) state: AppState,
    pub(crate) app: Router,
    pub(crate) ledger: Arc<MockLedger>,
    pub(crate) content: Arc<MemoryContentStore>,
    _guard: OwnedMutexGuard<()>,
}

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env() {
    std::env::set_var("EXAMCHAIN_ENV", "test");
    std::env::set_var("EXAMCHAIN_STRICT_CONFIG", "0");
    std::env::set_var("PROMETHEUS_ENABLED", "0");
    for name in CLEARED_VARS {
        std::env::remove_var(name);
    }
}

/// Router over a scripted ledger, an in-memory content store and, when
/// `extractor_reply` is set, an extractor that always answers with it.
pub(crate) async fn setup_test_context_with(extractor_reply: Option<&str>) -> TestContext {
    let guard = env_lock().await;
    set_test_env();

    let settings = Settings::load().expect("settings");
    let ledger = Arc::new(MockLedger::default());
    let content = Arc::new(MemoryContentStore::new("memory://"));
    let extractor = extractor_reply.map(|reply| {
        Arc::new(CannedExtractor { reply: reply.to_string() }) as Arc<dyn QuestionExtractor>
    });

    let state = AppState::new(
        settings,
        Some(ledger.clone() as Arc<dyn LedgerClient>),
        content.clone() as Arc<dyn ContentStore>,
        extractor,
    );
    let app = api::router::router(state.clone());

    TestContext { state, app, ledger, content, _guard: guard }
}

pub(crate) async fn setup_test_context() -> TestContext {
    setup_test_context_with(None).await
}

/// Deterministic test address `0x000..0<n in hex>`.
pub(crate) fn address(n: u64) -> Address {
    Address::parse(&format!("0x{n:040x}")).expect("address")
}

pub(crate) fn exam(id: ExamId, start_time: i64, duration: i64, is_active: bool) -> Exam {
    Exam { id, title: format!("Exam {id}"), start_time, duration, is_active }
}

#[derive(Default)]
struct LedgerState {
    exams: Vec<ExamDetail>,
    students: Vec<StudentRecord>,
    submissions: BTreeMap<(ExamId, Address), String>,
    failing_lookups: HashSet<ExamId>,
    hanging_lookups: HashSet<ExamId>,
    reads_fail: bool,
    writes: Vec<String>,
}

/// In-process stand-in for the exam contract.
#[derive(Default)]
pub(crate) struct MockLedger {
    state: Mutex<LedgerState>,
    lookup_delay: Option<Duration>,
    in_flight: AtomicUsize,
    pub(crate) lookup_calls: AtomicUsize,
    pub(crate) max_in_flight: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockLedger {
    pub(crate) fn with_lookup_delay(mut self, delay: Duration) -> Self {
        self.lookup_delay = Some(delay);
        self
    }

    pub(crate) async fn add_exam(&self, exam: Exam, questions_ref: &str) {
        self.state
            .lock()
            .await
            .exams
            .push(ExamDetail { exam, questions_ref: questions_ref.to_string() });
    }

    pub(crate) async fn add_student(&self, student: &Address, student_id: &str, verified: bool) {
        self.state.lock().await.students.push(StudentRecord {
            address: student.clone(),
            student_id: student_id.to_string(),
            is_verified: verified,
        });
    }

    pub(crate) async fn mark_submitted(&self, exam_id: ExamId, student: &Address) {
        self.state
            .lock()
            .await
            .submissions
            .insert((exam_id, student.clone()), format!("bafy-result-{exam_id}"));
    }

    pub(crate) async fn fail_lookup(&self, exam_id: ExamId) {
        self.state.lock().await.failing_lookups.insert(exam_id);
    }

    pub(crate) async fn hang_lookup(&self, exam_id: ExamId) {
        self.state.lock().await.hanging_lookups.insert(exam_id);
    }

    pub(crate) async fn fail_reads(&self) {
        self.state.lock().await.reads_fail = true;
    }

    /// Method names of confirmed writes, oldest first.
    pub(crate) async fn writes(&self) -> Vec<String> {
        self.state.lock().await.writes.clone()
    }

    pub(crate) async fn exam_detail(&self, exam_id: ExamId) -> Option<ExamDetail> {
        self.state.lock().await.exams.iter().find(|detail| detail.exam.id == exam_id).cloned()
    }

    pub(crate) async fn submission_ref(&self, exam_id: ExamId, student: &Address) -> Option<String> {
        self.state.lock().await.submissions.get(&(exam_id, student.clone())).cloned()
    }

    async fn check_reads(&self) -> Result<()> {
        if self.state.lock().await.reads_fail {
            bail!("mock ledger unreachable");
        }
        Ok(())
    }

    async fn record_write(&self, method: &str) -> TxReceipt {
        let mut state = self.state.lock().await;
        state.writes.push(method.to_string());
        TxReceipt {
            transaction_hash: format!("0x{:064x}", state.writes.len()),
            status: Some("success".to_string()),
        }
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn get_all_exams(&self) -> Result<Vec<Exam>> {
        self.check_reads().await?;
        Ok(self.state.lock().await.exams.iter().map(|detail| detail.exam.clone()).collect())
    }

    async fn get_exam_by_id(&self, exam_id: ExamId) -> Result<ExamDetail> {
        self.check_reads().await?;
        // Unknown ids read as the zero-valued struct, as on chain.
        Ok(self.exam_detail(exam_id).await.unwrap_or(ExamDetail {
            exam: Exam {
                id: exam_id,
                title: String::new(),
                start_time: 0,
                duration: 0,
                is_active: false,
            },
            questions_ref: String::new(),
        }))
    }

    async fn has_submitted(&self, exam_id: ExamId, student: &Address) -> Result<bool> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let _in_flight = InFlight(&self.in_flight);

        if let Some(delay) = self.lookup_delay {
            tokio::time::sleep(delay).await;
        }

        let (failing, hanging, submitted) = {
            let state = self.state.lock().await;
            (
                state.failing_lookups.contains(&exam_id) || state.reads_fail,
                state.hanging_lookups.contains(&exam_id),
                state.submissions.contains_key(&(exam_id, student.clone())),
            )
        };

        if hanging {
            std::future::pending::<()>().await;
        }
        if failing {
            bail!("mock lookup failure for exam {exam_id}");
        }
        Ok(submitted)
    }

    async fn get_student_submission(&self, exam_id: ExamId, student: &Address) -> Result<String> {
        self.check_reads().await?;
        Ok(self.submission_ref(exam_id, student).await.unwrap_or_default())
    }

    async fn is_student_verified(&self, student: &Address) -> Result<bool> {
        self.check_reads().await?;
        let state = self.state.lock().await;
        Ok(state.students.iter().any(|record| &record.address == student && record.is_verified))
    }

    async fn get_all_students(&self) -> Result<Vec<StudentRecord>> {
        self.check_reads().await?;
        Ok(self.state.lock().await.students.clone())
    }

    async fn get_all_submissions(&self, exam_id: ExamId) -> Result<Vec<SubmissionEntry>> {
        self.check_reads().await?;
        let state = self.state.lock().await;
        Ok(state
            .submissions
            .iter()
            .filter(|((id, _), _)| *id == exam_id)
            .map(|((_, student), submission_ref)| SubmissionEntry {
                student: student.clone(),
                submission_ref: submission_ref.clone(),
            })
            .collect())
    }

    async fn create_exam_with_questions(
        &self,
        title: &str,
        start_time: i64,
        duration: i64,
        questions_ref: &str,
    ) -> Result<TxReceipt> {
        {
            let mut state = self.state.lock().await;
            let id = state.exams.len() as ExamId + 1;
            state.exams.push(ExamDetail {
                exam: Exam { id, title: title.to_string(), start_time, duration, is_active: true },
                questions_ref: questions_ref.to_string(),
            });
        }
        Ok(self.record_write("createExamWithQuestions").await)
    }

    async fn update_exam_status(&self, exam_id: ExamId, is_active: bool) -> Result<TxReceipt> {
        {
            let mut state = self.state.lock().await;
            let detail = state
                .exams
                .iter_mut()
                .find(|detail| detail.exam.id == exam_id)
                .ok_or_else(|| anyhow!("Exam does not exist"))?;
            detail.exam.is_active = is_active;
        }
        Ok(self.record_write("updateExamStatus").await)
    }

    async fn verify_student(&self, student: &Address) -> Result<TxReceipt> {
        {
            let mut state = self.state.lock().await;
            let record = state
                .students
                .iter_mut()
                .find(|record| &record.address == student)
                .ok_or_else(|| anyhow!("Student not registered"))?;
            record.is_verified = true;
        }
        Ok(self.record_write("verifyStudent").await)
    }

    async fn submit_answers(
        &self,
        exam_id: ExamId,
        student: &Address,
        answers_ref: &str,
    ) -> Result<TxReceipt> {
        {
            let mut state = self.state.lock().await;
            let key = (exam_id, student.clone());
            if state.submissions.contains_key(&key) {
                bail!("Already submitted");
            }
            state.submissions.insert(key, answers_ref.to_string());
        }
        Ok(self.record_write("submitAnswers").await)
    }

    async fn register_student(&self, student: &Address, student_id: &str) -> Result<TxReceipt> {
        {
            let mut state = self.state.lock().await;
            if state.students.iter().any(|record| &record.address == student) {
                bail!("Student already registered");
            }
            state.students.push(StudentRecord {
                address: student.clone(),
                student_id: student_id.to_string(),
                is_verified: false,
            });
        }
        Ok(self.record_write("registerStudent").await)
    }
}

/// Extractor that skips the model call and parses a fixed reply.
struct CannedExtractor {
    reply: String,
}

#[async_trait]
impl QuestionExtractor for CannedExtractor {
    async fn extract(
        &self,
        input: ExtractionInput,
    ) -> Result<Vec<ExtractedQuestion>, ExtractionError> {
        match input {
            ExtractionInput::Text(text) if text.trim().is_empty() => Err(ExtractionError::EmptyInput),
            _ => parse_reply(&self.reply),
        }
    }
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}
