use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::config::Settings;
use crate::models::{Address, Exam, ExamDetail, ExamId, StudentRecord, SubmissionEntry};

pub(crate) const GET_ALL_EXAMS: &str = "function getAllExams() view returns (uint256[] examIds, string[] titles, uint256[] startTimes, uint256[] durations, bool[] activeStatus)";
pub(crate) const GET_EXAM_BY_ID: &str = "function getExamById(uint256 examId) view returns (string title, uint256 startTime, uint256 duration, bool isActive, string questionsHash)";
pub(crate) const HAS_SUBMITTED: &str =
    "function hasSubmitted(uint256 examId, address student) view returns (bool)";
pub(crate) const GET_STUDENT_SUBMISSION: &str =
    "function getStudentSubmission(uint256 examId, address student) view returns (string)";
pub(crate) const IS_STUDENT_VERIFIED: &str =
    "function isStudentVerified(address student) view returns (bool)";
pub(crate) const GET_ALL_STUDENTS: &str = "function getAllStudents() view returns (address[] studentAddresses, string[] studentIdList, bool[] verificationStatus)";
pub(crate) const GET_ALL_SUBMISSIONS: &str = "function getAllSubmissions(uint256 examId) view returns (address[] students, string[] submissions)";

pub(crate) const CREATE_EXAM_WITH_QUESTIONS: &str = "function createExamWithQuestions(string title, uint256 startTime, uint256 duration, string questionsHash)";
pub(crate) const UPDATE_EXAM_STATUS: &str =
    "function updateExamStatus(uint256 examId, bool isActive)";
pub(crate) const VERIFY_STUDENT: &str = "function verifyStudent(address student)";
pub(crate) const SUBMIT_ANSWERS: &str = "function submitAnswers(uint256 examId, string answerHash)";
pub(crate) const REGISTER_STUDENT: &str = "function registerStudent(string studentId)";

/// Confirmation returned by the gateway once a write is mined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TxReceipt {
    pub(crate) transaction_hash: String,
    #[serde(default)]
    pub(crate) status: Option<String>,
}

/// Typed surface of the exam contract.
#[async_trait]
pub(crate) trait LedgerClient: Send + Sync {
    async fn get_all_exams(&self) -> Result<Vec<Exam>>;
    async fn get_exam_by_id(&self, exam_id: ExamId) -> Result<ExamDetail>;
    async fn has_submitted(&self, exam_id: ExamId, student: &Address) -> Result<bool>;
    async fn get_student_submission(&self, exam_id: ExamId, student: &Address) -> Result<String>;
    async fn is_student_verified(&self, student: &Address) -> Result<bool>;
    async fn get_all_students(&self) -> Result<Vec<StudentRecord>>;
    async fn get_all_submissions(&self, exam_id: ExamId) -> Result<Vec<SubmissionEntry>>;

    async fn create_exam_with_questions(
        &self,
        title: &str,
        start_time: i64,
        duration: i64,
        questions_ref: &str,
    ) -> Result<TxReceipt>;
    async fn update_exam_status(&self, exam_id: ExamId, is_active: bool) -> Result<TxReceipt>;
    async fn verify_student(&self, student: &Address) -> Result<TxReceipt>;
    /// Student-originated writes carry the student as `from`; the gateway
    /// relays them on the student's behalf.
    async fn submit_answers(
        &self,
        exam_id: ExamId,
        student: &Address,
        answers_ref: &str,
    ) -> Result<TxReceipt>;
    async fn register_student(&self, student: &Address, student_id: &str) -> Result<TxReceipt>;
}

/// Talks to a contract gateway that signs writes with its own backend wallet.
#[derive(Debug, Clone)]
pub(crate) struct HttpLedgerClient {
    client: Client,
    base_url: String,
    api_key: String,
    chain_id: u64,
    contract_address: String,
}

impl HttpLedgerClient {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Option<Self>> {
        let ledger = settings.ledger();
        if !ledger.is_configured() {
            return Ok(None);
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(20))
            .timeout(Duration::from_secs(ledger.request_timeout))
            .build()
            .context("Failed to build ledger HTTP client")?;

        Ok(Some(Self {
            client,
            base_url: ledger.gateway_url.clone(),
            api_key: ledger.api_key.clone(),
            chain_id: ledger.chain_id,
            contract_address: ledger.contract_address.clone(),
        }))
    }

    async fn call(
        &self,
        kind: &str,
        method: &'static str,
        params: Vec<Value>,
        from: Option<&Address>,
    ) -> Result<Value> {
        let mut payload = json!({
            "chainId": self.chain_id,
            "contractAddress": self.contract_address,
            "method": method,
            "params": params,
        });
        if let Some(from) = from {
            payload["from"] = json!(from.as_str());
        }

        let outcome = self.send(kind, &payload).await;

        let label = method_name(method);
        let outcome_label = if outcome.is_ok() { "ok" } else { "error" };
        metrics::counter!("ledger_calls_total", "method" => label, "outcome" => outcome_label)
            .increment(1);

        outcome.with_context(|| format!("ledger {kind} {label} failed"))
    }

    async fn send(&self, kind: &str, payload: &Value) -> Result<Value> {
        let mut request = self.client.post(format!("{}/{kind}", self.base_url)).json(payload);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().await.context("Failed to call ledger gateway")?;
        let status = response.status();
        let raw_body = response.text().await.context("Failed to read ledger gateway response")?;
        parse_gateway_body(status, &raw_body)
    }

    async fn read(&self, method: &'static str, params: Vec<Value>) -> Result<Value> {
        let body = self.call("read", method, params, None).await?;
        body.get("result")
            .cloned()
            .ok_or_else(|| anyhow!("Ledger read {} missing result", method_name(method)))
    }

    async fn write(
        &self,
        method: &'static str,
        params: Vec<Value>,
        from: Option<&Address>,
    ) -> Result<TxReceipt> {
        let body = self.call("write", method, params, from).await?;
        let receipt: TxReceipt = serde_json::from_value(body)
            .with_context(|| format!("Malformed receipt for {}", method_name(method)))?;

        if receipt.status.as_deref().is_some_and(|status| status.eq_ignore_ascii_case("reverted")) {
            bail!("Transaction {} reverted", receipt.transaction_hash);
        }

        tracing::info!(
            method = method_name(method),
            transaction_hash = %receipt.transaction_hash,
            "Ledger write confirmed"
        );
        Ok(receipt)
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn get_all_exams(&self) -> Result<Vec<Exam>> {
        let result = self.read(GET_ALL_EXAMS, vec![]).await?;
        decode_exam_table(&result)
    }

    async fn get_exam_by_id(&self, exam_id: ExamId) -> Result<ExamDetail> {
        let result = self.read(GET_EXAM_BY_ID, vec![uint(exam_id)]).await?;
        decode_exam_detail(exam_id, &result)
    }

    async fn has_submitted(&self, exam_id: ExamId, student: &Address) -> Result<bool> {
        let result =
            self.read(HAS_SUBMITTED, vec![uint(exam_id), json!(student.as_str())]).await?;
        result.as_bool().ok_or_else(|| anyhow!("hasSubmitted returned non-bool: {result}"))
    }

    async fn get_student_submission(&self, exam_id: ExamId, student: &Address) -> Result<String> {
        let result = self
            .read(GET_STUDENT_SUBMISSION, vec![uint(exam_id), json!(student.as_str())])
            .await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("getStudentSubmission returned non-string: {result}"))
    }

    async fn is_student_verified(&self, student: &Address) -> Result<bool> {
        let result = self.read(IS_STUDENT_VERIFIED, vec![json!(student.as_str())]).await?;
        result.as_bool().ok_or_else(|| anyhow!("isStudentVerified returned non-bool: {result}"))
    }

    async fn get_all_students(&self) -> Result<Vec<StudentRecord>> {
        let result = self.read(GET_ALL_STUDENTS, vec![]).await?;
        decode_students(&result)
    }

    async fn get_all_submissions(&self, exam_id: ExamId) -> Result<Vec<SubmissionEntry>> {
        let result = self.read(GET_ALL_SUBMISSIONS, vec![uint(exam_id)]).await?;
        decode_submissions(&result)
    }

    async fn create_exam_with_questions(
        &self,
        title: &str,
        start_time: i64,
        duration: i64,
        questions_ref: &str,
    ) -> Result<TxReceipt> {
        self.write(
            CREATE_EXAM_WITH_QUESTIONS,
            vec![
                json!(title),
                json!(start_time.to_string()),
                json!(duration.to_string()),
                json!(questions_ref),
            ],
            None,
        )
        .await
    }

    async fn update_exam_status(&self, exam_id: ExamId, is_active: bool) -> Result<TxReceipt> {
        self.write(UPDATE_EXAM_STATUS, vec![uint(exam_id), json!(is_active)], None).await
    }

    async fn verify_student(&self, student: &Address) -> Result<TxReceipt> {
        self.write(VERIFY_STUDENT, vec![json!(student.as_str())], None).await
    }

    async fn submit_answers(
        &self,
        exam_id: ExamId,
        student: &Address,
        answers_ref: &str,
    ) -> Result<TxReceipt> {
        self.write(SUBMIT_ANSWERS, vec![uint(exam_id), json!(answers_ref)], Some(student)).await
    }

    async fn register_student(&self, student: &Address, student_id: &str) -> Result<TxReceipt> {
        self.write(REGISTER_STUDENT, vec![json!(student_id)], Some(student)).await
    }
}

/// `uint256` arguments travel as decimal strings so large values survive JSON.
fn uint(value: u64) -> Value {
    Value::String(value.to_string())
}

/// Short function name from a full ABI signature, used as a metric label.
pub(crate) fn method_name(signature: &'static str) -> &'static str {
    let without_prefix = signature.strip_prefix("function ").unwrap_or(signature);
    without_prefix.split('(').next().unwrap_or(without_prefix)
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    as_u64(value).and_then(|raw| i64::try_from(raw).ok())
}

/// Reads a tuple result that the gateway may send either as a positional
/// array or as an object keyed by the ABI output names.
fn tuple_field<'a>(result: &'a Value, index: usize, name: &str) -> Option<&'a Value> {
    match result {
        Value::Array(items) => items.get(index),
        Value::Object(map) => map.get(name),
        _ => None,
    }
}

fn array_field<'a>(result: &'a Value, index: usize, name: &str) -> Result<&'a Vec<Value>> {
    tuple_field(result, index, name)
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("Malformed ledger response: missing array {name}"))
}

pub(crate) fn decode_exam_table(result: &Value) -> Result<Vec<Exam>> {
    let ids = array_field(result, 0, "examIds")?;
    let titles = array_field(result, 1, "titles")?;
    let start_times = array_field(result, 2, "startTimes")?;
    let durations = array_field(result, 3, "durations")?;
    let active = array_field(result, 4, "activeStatus")?;

    let len = ids.len();
    if [titles.len(), start_times.len(), durations.len(), active.len()]
        .iter()
        .any(|other| *other != len)
    {
        bail!("Malformed ledger response: getAllExams arrays differ in length");
    }

    (0..len)
        .map(|index| {
            Ok(Exam {
                id: as_u64(&ids[index])
                    .ok_or_else(|| anyhow!("Malformed exam id at index {index}"))?,
                title: titles[index]
                    .as_str()
                    .ok_or_else(|| anyhow!("Malformed exam title at index {index}"))?
                    .to_string(),
                start_time: as_i64(&start_times[index])
                    .ok_or_else(|| anyhow!("Malformed start time at index {index}"))?,
                duration: as_i64(&durations[index])
                    .ok_or_else(|| anyhow!("Malformed duration at index {index}"))?,
                is_active: active[index]
                    .as_bool()
                    .ok_or_else(|| anyhow!("Malformed active flag at index {index}"))?,
            })
        })
        .collect()
}

fn required_field<'a>(result: &'a Value, index: usize, name: &str) -> Result<&'a Value> {
    tuple_field(result, index, name)
        .ok_or_else(|| anyhow!("Malformed ledger response: missing {name}"))
}

fn decode_exam_detail(exam_id: ExamId, result: &Value) -> Result<ExamDetail> {
    let exam = Exam {
        id: exam_id,
        title: required_field(result, 0, "title")?
            .as_str()
            .context("title is not a string")?
            .to_string(),
        start_time: as_i64(required_field(result, 1, "startTime")?)
            .context("startTime is not a uint")?,
        duration: as_i64(required_field(result, 2, "duration")?)
            .context("duration is not a uint")?,
        is_active: required_field(result, 3, "isActive")?
            .as_bool()
            .context("isActive is not a bool")?,
    };
    let questions_ref = required_field(result, 4, "questionsHash")?
        .as_str()
        .context("questionsHash is not a string")?
        .to_string();

    Ok(ExamDetail { exam, questions_ref })
}

fn decode_students(result: &Value) -> Result<Vec<StudentRecord>> {
    let addresses = array_field(result, 0, "studentAddresses")?;
    let ids = array_field(result, 1, "studentIdList")?;
    let verified = array_field(result, 2, "verificationStatus")?;
    if ids.len() != addresses.len() || verified.len() != addresses.len() {
        bail!("Malformed ledger response: getAllStudents arrays differ in length");
    }

    addresses
        .iter()
        .zip(ids)
        .zip(verified)
        .map(|((address, student_id), is_verified)| {
            Ok(StudentRecord {
                address: Address::parse(address.as_str().unwrap_or_default())?,
                student_id: student_id.as_str().unwrap_or_default().to_string(),
                is_verified: is_verified.as_bool().context("verification flag is not a bool")?,
            })
        })
        .collect()
}

fn decode_submissions(result: &Value) -> Result<Vec<SubmissionEntry>> {
    let students = array_field(result, 0, "students")?;
    let refs = array_field(result, 1, "submissions")?;
    if students.len() != refs.len() {
        bail!("Malformed ledger response: getAllSubmissions arrays differ in length");
    }

    students
        .iter()
        .zip(refs)
        .map(|(student, submission_ref)| {
            Ok(SubmissionEntry {
                student: Address::parse(student.as_str().unwrap_or_default())?,
                submission_ref: submission_ref
                    .as_str()
                    .context("submission reference is not a string")?
                    .to_string(),
            })
        })
        .collect()
}

fn parse_gateway_body(status: StatusCode, raw_body: &str) -> Result<Value> {
    let parsed = serde_json::from_str::<Value>(raw_body);
    if !status.is_success() {
        let message = match &parsed {
            Ok(body) => extract_error_message(body),
            Err(_) => raw_body.trim().to_string(),
        };
        bail!("Ledger gateway error (status {status}): {message}");
    }
    parsed.with_context(|| {
        format!("Ledger gateway returned non-JSON body (status {status}): {raw_body}")
    })
}

fn extract_error_message(payload: &Value) -> String {
    payload
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| payload.get("error").and_then(Value::as_str))
        .or_else(|| {
            payload.get("error").and_then(|error| error.get("message")).and_then(Value::as_str)
        })
        .unwrap_or("unknown_error")
        .to_string()
}
