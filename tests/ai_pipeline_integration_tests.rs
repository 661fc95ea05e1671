/*!
 * AI Pipeline Integration Tests
 *
 * The full pipeline with no LLM key configured: jobs run through the queue
 * and worker pool, the deterministic fallback renders the summary, quota
 * exhaustion rejects with the limit echoed, and the push stream recovers
 * terminal state for late subscribers.
 */

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;

mod test_utils;
use test_utils::{create_patient, register_clinic, request, teardown_test_db, TestApp};

/// Poll the job endpoint until it reaches a terminal state
async fn wait_for_terminal(app: &axum::Router, token: &str, job_id: &str) -> serde_json::Value {
    for _ in 0..100 {
        let (status, body) =
            request(app, "GET", &format!("/ai/jobs/{}", job_id), Some(token), None).await;
        assert_eq!(status, StatusCode::OK);
        let state = body["state"].as_str().unwrap_or_default().to_string();
        if state == "completed" || state == "failed" {
            return body;
        }
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    }
    panic!("job {} never reached a terminal state", job_id);
}

#[tokio::test]
#[ignore] // Requires Postgres and Redis to be running
async fn test_pipeline_with_fallback_renderer() {
    let (app, pool) = TestApp::with_workers().await;
    teardown_test_db(&pool).await;

    let (token, _, _) = register_clinic(&app, "pipeline").await;
    let patient_id = create_patient(&app, &token, "Pipe", "Line").await;

    // Some clinical data for the summary
    for value in [120, 122, 121, 123, 165] {
        request(
            &app,
            "POST",
            "/vitals",
            Some(&token),
            Some(json!({ "patientId": patient_id, "type": "BP", "value": value.to_string() })),
        )
        .await;
    }
    request(
        &app,
        "POST",
        "/labs",
        Some(&token),
        Some(json!({
            "patientId": patient_id,
            "testName": "Glucose",
            "value": "150",
            "referenceRange": "70-100"
        })),
    )
    .await;

    // Submit
    let (status, submitted) = request(
        &app,
        "POST",
        &format!("/ai/generate-summary/{}", patient_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(submitted["status"], "queued");
    let job_id = submitted["jobId"].as_str().unwrap().to_string();

    // Wait for the worker
    let terminal = wait_for_terminal(&app, &token, &job_id).await;
    assert_eq!(terminal["state"], "completed");
    let summary_id = terminal["summaryId"].as_str().unwrap().to_string();

    // The persisted summary carries the disclaimer and section headers
    let (status, summary) = request(
        &app,
        "GET",
        &format!("/ai/summaries/{}", summary_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let text = summary["summaryText"].as_str().unwrap();
    assert!(text.contains("not a diagnosis"));
    assert!(text.contains("Clinical Overview"));
    assert!(text.contains("Vital Sign Trends"));
    assert_eq!(summary["riskFlags"]["highBloodPressureTrend"], true);

    // The generation wrote an audit record
    let (_, audit) = request(&app, "GET", "/audit?limit=100", Some(&token), None).await;
    assert!(audit["data"]
        .as_array()
        .unwrap()
        .iter()
        .any(|l| l["action"] == "AI_SUMMARY_GENERATE"));
}

#[tokio::test]
#[ignore] // Requires Postgres and Redis to be running
async fn test_stream_recovers_terminal_state() {
    let (app, pool) = TestApp::with_workers().await;
    teardown_test_db(&pool).await;

    let (token, _, _) = register_clinic(&app, "stream").await;
    let patient_id = create_patient(&app, &token, "Late", "Subscriber").await;

    let (_, submitted) = request(
        &app,
        "POST",
        &format!("/ai/generate-summary/{}", patient_id),
        Some(&token),
        None,
    )
    .await;
    let job_id = submitted["jobId"].as_str().unwrap().to_string();
    wait_for_terminal(&app, &token, &job_id).await;

    // Connect after completion, with the token in the query string; the
    // stream emits exactly one terminal frame and closes
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/ai/stream/{}?token={}", job_id, token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let frames = String::from_utf8_lossy(&body);
    assert!(frames.contains("data: "));
    assert!(frames.contains("\"state\":\"completed\""));
}

#[tokio::test]
#[ignore] // Requires Postgres and Redis to be running
async fn test_stream_rejects_missing_token_before_start() {
    let (app, pool) = TestApp::new().await;
    teardown_test_db(&pool).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/ai/stream/{}", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore] // Requires Postgres and Redis to be running
async fn test_quota_exhaustion_and_monthly_reset() {
    let (app, pool) = TestApp::new().await;
    teardown_test_db(&pool).await;

    let (token, clinic, _) = register_clinic(&app, "quota").await;
    let clinic_id = clinic["id"].as_str().unwrap().to_string();
    let patient_id = create_patient(&app, &token, "Quota", "Bound").await;

    // Exhaust the free-tier quota (10/month in the test config)
    sqlx::query("UPDATE clinics SET ai_call_count = 10 WHERE id = $1::uuid")
        .bind(&clinic_id)
        .execute(&pool)
        .await
        .unwrap();

    let (status, body) = request(
        &app,
        "POST",
        &format!("/ai/generate-summary/{}", patient_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["monthlyLimit"], 10);

    // Roll the billing anchor into the previous month; the next call resets
    // the counter and succeeds
    sqlx::query(
        "UPDATE clinics SET billing_period_start = billing_period_start - interval '40 days' \
         WHERE id = $1::uuid",
    )
    .bind(&clinic_id)
    .execute(&pool)
    .await
    .unwrap();

    let (status, _) = request(
        &app,
        "POST",
        &format!("/ai/generate-summary/{}", patient_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (count,): (i32,) = sqlx::query_as("SELECT ai_call_count FROM clinics WHERE id = $1::uuid")
        .bind(&clinic_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
#[ignore] // Requires Postgres and Redis to be running
async fn test_chat_fallback_and_validation() {
    let (app, pool) = TestApp::new().await;
    teardown_test_db(&pool).await;

    let (token, _, _) = register_clinic(&app, "chat").await;
    let patient_id = create_patient(&app, &token, "Chat", "Bot").await;

    let (status, body) = request(
        &app,
        "POST",
        &format!("/ai/chat/{}", patient_id),
        Some(&token),
        Some(json!({ "message": "How is the blood pressure trending?" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["answer"].as_str().unwrap().contains("not a diagnosis"));

    // Over-length message is rejected
    let (status, _) = request(
        &app,
        "POST",
        &format!("/ai/chat/{}", patient_id),
        Some(&token),
        Some(json!({ "message": "x".repeat(2001) })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore] // Requires Postgres and Redis to be running
async fn test_cache_invalidation_feeds_new_vitals_to_next_job() {
    let (app, pool) = TestApp::with_workers().await;
    teardown_test_db(&pool).await;

    let (token, _, _) = register_clinic(&app, "cache").await;
    let patient_id = create_patient(&app, &token, "Fresh", "Data").await;

    // Chat warms the structured-input cache
    request(
        &app,
        "POST",
        &format!("/ai/chat/{}", patient_id),
        Some(&token),
        Some(json!({ "message": "anything" })),
    )
    .await;

    // New vital evicts it
    for value in [120, 121, 122, 123, 180] {
        request(
            &app,
            "POST",
            "/vitals",
            Some(&token),
            Some(json!({ "patientId": patient_id, "type": "BP", "value": value.to_string() })),
        )
        .await;
    }

    let (_, submitted) = request(
        &app,
        "POST",
        &format!("/ai/generate-summary/{}", patient_id),
        Some(&token),
        None,
    )
    .await;
    let job_id = submitted["jobId"].as_str().unwrap().to_string();
    let terminal = wait_for_terminal(&app, &token, &job_id).await;

    let summary_id = terminal["summaryId"].as_str().unwrap();
    let (_, summary) = request(
        &app,
        "GET",
        &format!("/ai/summaries/{}", summary_id),
        Some(&token),
        None,
    )
    .await;

    // The summary saw the post-eviction vitals, not the cached empty input
    assert!(summary["summaryText"].as_str().unwrap().contains("latest 180.0"));
}
