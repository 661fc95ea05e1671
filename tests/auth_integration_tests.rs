/*!
 * Authentication Integration Tests
 *
 * Clinic registration, staff login, invite-based patient onboarding, and
 * the failure modes around each: duplicate emails, expired invites,
 * generic login errors.
 */

use axum::http::StatusCode;
use serde_json::json;

mod test_utils;
use test_utils::{register_clinic, request, teardown_test_db, unique_suffix, TestApp};

#[tokio::test]
#[ignore] // Requires Postgres and Redis to be running
async fn test_register_clinic_returns_token_and_admin() {
    let (app, pool) = TestApp::new().await;
    teardown_test_db(&pool).await;

    let (token, clinic, user) = register_clinic(&app, "reg").await;
    assert!(!token.is_empty());
    assert_eq!(clinic["subscriptionPlan"], "free");
    assert_eq!(user["role"], "ADMIN");

    // Registration wrote an audit record
    let (status, body) = request(&app, "GET", "/audit", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]
        .as_array()
        .unwrap()
        .iter()
        .any(|log| log["action"] == "CLINIC_REGISTER"));
}

#[tokio::test]
#[ignore] // Requires Postgres and Redis to be running
async fn test_register_duplicate_clinic_email_conflicts() {
    let (app, pool) = TestApp::new().await;
    teardown_test_db(&pool).await;

    let suffix = unique_suffix();
    let body = json!({
        "clinicName": "Twin Clinic",
        "clinicEmail": format!("twin-{}@test.example", suffix),
        "adminName": "Ana",
        "adminEmail": format!("ana-{}@test.example", suffix),
        "password": "pw12345!"
    });

    let (status, _) = request(&app, "POST", "/auth/register-clinic", None, Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let mut second = body.clone();
    second["adminEmail"] = json!(format!("other-{}@test.example", suffix));
    let (status, _) = request(&app, "POST", "/auth/register-clinic", None, Some(second)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore] // Requires Postgres and Redis to be running
async fn test_login_round_trip() {
    let (app, pool) = TestApp::new().await;
    teardown_test_db(&pool).await;

    let suffix = unique_suffix();
    let admin_email = format!("login-{}@test.example", suffix);
    let (status, _) = request(
        &app,
        "POST",
        "/auth/register-clinic",
        None,
        Some(json!({
            "clinicName": "Login Clinic",
            "clinicEmail": format!("clinic-login-{}@test.example", suffix),
            "adminName": "Ana",
            "adminEmail": admin_email,
            "password": "pw12345!"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = request(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": admin_email, "password": "pw12345!" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].as_str().is_some());
    assert_eq!(body["user"]["email"], json!(admin_email));
}

#[tokio::test]
#[ignore] // Requires Postgres and Redis to be running
async fn test_login_failures_are_generic() {
    let (app, pool) = TestApp::new().await;
    teardown_test_db(&pool).await;

    let suffix = unique_suffix();
    let admin_email = format!("generic-{}@test.example", suffix);
    request(
        &app,
        "POST",
        "/auth/register-clinic",
        None,
        Some(json!({
            "clinicName": "Generic Clinic",
            "clinicEmail": format!("clinic-generic-{}@test.example", suffix),
            "adminName": "Ana",
            "adminEmail": admin_email,
            "password": "pw12345!"
        })),
    )
    .await;

    // Wrong password and unknown email produce the same status and message
    let (status_a, body_a) = request(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": admin_email, "password": "wrong-password" })),
    )
    .await;
    let (status_b, body_b) = request(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "nobody@test.example", "password": "wrong-password" })),
    )
    .await;

    assert_eq!(status_a, StatusCode::UNAUTHORIZED);
    assert_eq!(status_b, StatusCode::UNAUTHORIZED);
    assert_eq!(body_a["message"], body_b["message"]);
}

#[tokio::test]
#[ignore] // Requires Postgres and Redis to be running
async fn test_patient_invite_setup_and_login() {
    let (app, pool) = TestApp::new().await;
    teardown_test_db(&pool).await;

    let (token, _, _) = register_clinic(&app, "invite").await;
    let patient_id = test_utils::create_patient(&app, &token, "Jane", "Doe").await;

    // Invite
    let (status, invite) = request(
        &app,
        "POST",
        &format!("/patients/{}/invite", patient_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let invite_token = invite["inviteToken"].as_str().unwrap();
    assert_eq!(invite["patientName"], "Jane Doe");

    // Setup
    let portal_email = format!("jane-{}@test.example", unique_suffix());
    let (status, setup) = request(
        &app,
        "POST",
        "/auth/patient-setup",
        None,
        Some(json!({
            "inviteToken": invite_token,
            "email": portal_email,
            "password": "pw12345!"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(setup["token"].as_str().is_some());
    assert_eq!(setup["patient"]["hasPortalAccess"], true);

    // Second setup with the same invite is gone or not found
    let (status, _) = request(
        &app,
        "POST",
        "/auth/patient-setup",
        None,
        Some(json!({
            "inviteToken": invite_token,
            "email": portal_email,
            "password": "pw12345!"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Login with the new credentials
    let (status, login) = request(
        &app,
        "POST",
        "/auth/patient-login",
        None,
        Some(json!({ "email": portal_email, "password": "pw12345!" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(login["token"].as_str().is_some());

    // Inviting again now conflicts: credentials exist
    let (status, _) = request(
        &app,
        "POST",
        &format!("/patients/{}/invite", patient_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore] // Requires Postgres and Redis to be running
async fn test_expired_invite_is_gone() {
    let (app, pool) = TestApp::new().await;
    teardown_test_db(&pool).await;

    let (token, _, _) = register_clinic(&app, "expired").await;
    let patient_id = test_utils::create_patient(&app, &token, "Old", "Invite").await;

    let (_, invite) = request(
        &app,
        "POST",
        &format!("/patients/{}/invite", patient_id),
        Some(&token),
        None,
    )
    .await;
    let invite_token = invite["inviteToken"].as_str().unwrap().to_string();

    // Force the invite into the past
    sqlx::query("UPDATE patients SET invite_expires_at = now() - interval '1 second' WHERE id = $1::uuid")
        .bind(&patient_id)
        .execute(&pool)
        .await
        .unwrap();

    let (status, _) = request(
        &app,
        "POST",
        "/auth/patient-setup",
        None,
        Some(json!({
            "inviteToken": invite_token,
            "email": "late@test.example",
            "password": "pw12345!"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::GONE);
}

#[tokio::test]
#[ignore] // Requires Postgres and Redis to be running
async fn test_protected_route_rejects_missing_and_bad_tokens() {
    let (app, pool) = TestApp::new().await;
    teardown_test_db(&pool).await;

    let (status, _) = request(&app, "GET", "/patients", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = request(&app, "GET", "/patients", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
