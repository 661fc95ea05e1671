/*!
 * Authentication HTTP Handlers
 *
 * Clinic registration, staff login, and the invite-based patient portal
 * flows. All four endpoints are public and sit behind the auth rate-limit
 * tier.
 */

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use sqlx::PgPool;

use crate::services::{
    AiJobQueue, AuthService, JobEventBus, LlmService, LoginRequest, PatientSetupRequest,
    QuotaService, RegisterClinicRequest, StructuredInputService,
};
use crate::utils::Result;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub auth_service: AuthService,
    /// Durable AI job queue
    pub queue: AiJobQueue,
    /// Job lifecycle event bus (publish side)
    pub event_bus: JobEventBus,
    /// Redis client for dedicated pub/sub subscriber connections
    pub redis_client: redis::Client,
    pub structured_input: StructuredInputService,
    pub llm: LlmService,
    pub quota: QuotaService,
    /// Server start time for uptime reporting
    pub start_time: std::time::SystemTime,
    pub environment: String,
}

/// Register a clinic with its first administrator
///
/// POST /auth/register-clinic
///
/// Creates the clinic, the ADMIN user, and the audit record atomically and
/// returns a token for the new administrator.
pub async fn register_clinic_handler(
    State(state): State<AppState>,
    Json(req): Json<RegisterClinicRequest>,
) -> Result<impl IntoResponse> {
    let response = state.auth_service.register_clinic(&state.pool, req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Staff login
///
/// POST /auth/login
///
/// Returns `{token, user}`. Unknown email and wrong password are
/// indistinguishable in both message and timing.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    let response = state.auth_service.staff_login(&state.pool, req).await?;
    Ok(Json(response))
}

/// Patient portal setup from an invite
///
/// POST /auth/patient-setup
pub async fn patient_setup_handler(
    State(state): State<AppState>,
    Json(req): Json<PatientSetupRequest>,
) -> Result<impl IntoResponse> {
    let response = state.auth_service.patient_setup(&state.pool, req).await?;
    Ok(Json(response))
}

/// Patient portal login
///
/// POST /auth/patient-login
pub async fn patient_login_handler(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    let response = state.auth_service.patient_login(&state.pool, req).await?;
    Ok(Json(response))
}
