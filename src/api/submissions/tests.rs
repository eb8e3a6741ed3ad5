use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use crate::core::time::now_unix;
use crate::models::Address;
use crate::services::content_store::ContentStore;
use crate::test_support::{self, TestContext};

async fn seed_active_exam(ctx: &TestContext, student: &Address) {
    let blob = json!({
        "examTitle": "Exam 1",
        "startTime": 0,
        "duration": 0,
        "questions": [
            {"question": "Q1", "options": ["a", "b", "c", "d"], "correctAnswer": "A"},
            {"question": "Q2", "options": ["a", "b", "c", "d"], "correctAnswer": "C"},
            {"question": "Q3", "options": ["a", "b", "c", "d"], "correctAnswer": "D"},
            {"question": "Q4", "options": ["a", "b", "c", "d"], "correctAnswer": "B"}
        ]
    });
    let questions_ref = ctx.content.upload_json("exam-1.json", &blob).await.expect("upload");
    ctx.ledger
        .add_exam(test_support::exam(1, now_unix() - 60, 3_600, true), &questions_ref)
        .await;
    ctx.ledger.add_student(student, "S-1", true).await;
}

fn submission(student: &Address, answers: serde_json::Value) -> serde_json::Value {
    json!({"examId": 1, "studentAddress": student.as_str(), "answers": answers})
}

#[tokio::test]
async fn submit_scores_uploads_and_records_result() {
    let ctx = test_support::setup_test_context().await;
    let student = test_support::address(1);
    seed_active_exam(&ctx, &student).await;

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/submissions",
            Some(submission(&student, json!({"0": "A", "1": "b", "3": "B"}))),
        ))
        .await
        .expect("submit");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CREATED, "response: {body}");
    assert_eq!(body["correct_answers"], 2);
    assert_eq!(body["total_questions"], 4);
    assert_eq!(body["score"], 50.0);

    let result_ref = body["result_ref"].as_str().expect("result ref");
    assert_eq!(ctx.ledger.submission_ref(1, &student).await.as_deref(), Some(result_ref));
    let stored = ctx.content.fetch_json(result_ref).await.expect("result blob");
    assert_eq!(stored["examId"], "1");
    assert_eq!(stored["studentAnswers"][2]["selectedAnswer"], serde_json::Value::Null);

    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/submissions?exam_id=1&student_address={student}"),
            None,
        ))
        .await
        .expect("get submission");
    let fetched = test_support::read_json(response).await;
    assert_eq!(fetched["has_submitted"], true);
    assert_eq!(fetched["submission_ref"], result_ref);
    assert_eq!(fetched["url"], format!("memory://{result_ref}"));
}

#[tokio::test]
async fn missing_submission_reads_as_not_submitted() {
    let ctx = test_support::setup_test_context().await;
    let student = test_support::address(7);

    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/submissions?exam_id=4&student_address={student}"),
            None,
        ))
        .await
        .expect("get submission");

    assert_eq!(response.status(), StatusCode::OK);
    let body = test_support::read_json(response).await;
    assert_eq!(body["has_submitted"], false);
    assert!(body["submission_ref"].is_null());
    assert!(body["url"].is_null());
}

#[tokio::test]
async fn second_submission_is_a_conflict() {
    let ctx = test_support::setup_test_context().await;
    let student = test_support::address(2);
    seed_active_exam(&ctx, &student).await;
    ctx.ledger.mark_submitted(1, &student).await;

    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/submissions",
            Some(submission(&student, json!({"0": "A"}))),
        ))
        .await
        .expect("submit");

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn failed_submission_check_refuses_to_submit() {
    let ctx = test_support::setup_test_context().await;
    let student = test_support::address(3);
    seed_active_exam(&ctx, &student).await;
    ctx.ledger.fail_lookup(1).await;

    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/submissions",
            Some(submission(&student, json!({"0": "A"}))),
        ))
        .await
        .expect("submit");

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(!ctx.ledger.writes().await.contains(&"submitAnswers".to_string()));
}

#[tokio::test]
async fn submit_rejects_unverified_students_and_bad_answers() {
    let ctx = test_support::setup_test_context().await;
    let verified = test_support::address(4);
    let stranger = test_support::address(5);
    seed_active_exam(&ctx, &verified).await;

    let cases = [
        (submission(&stranger, json!({"0": "A"})), StatusCode::FORBIDDEN),
        (submission(&verified, json!({"0": "E"})), StatusCode::BAD_REQUEST),
        (submission(&verified, json!({"9": "A"})), StatusCode::BAD_REQUEST),
        (
            json!({"examId": 1, "studentAddress": "0xnope", "answers": {}}),
            StatusCode::BAD_REQUEST,
        ),
    ];

    for (payload, expected) in cases {
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(Method::POST, "/api/v1/submissions", Some(payload)))
            .await
            .expect("submit");
        assert_eq!(response.status(), expected);
    }
    assert!(ctx.ledger.writes().await.is_empty());
}

#[tokio::test]
async fn reconcile_endpoint_returns_one_entry_per_exam() {
    let ctx = test_support::setup_test_context().await;
    let student = test_support::address(6);
    ctx.ledger.mark_submitted(2, &student).await;

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/submissions/reconcile",
            Some(json!({"examIds": [1, 2, 3, 2], "studentAddress": student.as_str()})),
        ))
        .await
        .expect("reconcile");

    let body = test_support::read_json(response).await;
    assert_eq!(body["submissions"], json!({"1": false, "2": true, "3": false}));

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/submissions/reconcile",
            Some(json!({"examIds": [1, 2], "studentAddress": ""})),
        ))
        .await
        .expect("reconcile");
    let body = test_support::read_json(response).await;
    assert_eq!(body["submissions"], json!({}));

    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/submissions/reconcile",
            Some(json!({"examIds": [1], "studentAddress": "0x12"})),
        ))
        .await
        .expect("reconcile");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
