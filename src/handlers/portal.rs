/*!
 * Patient Portal HTTP Handlers
 *
 * Read-only projections of the authenticated patient's own records plus
 * profile phone and password rotation. Every query is pinned to the token's
 * patient id and clinic; no cross-patient visibility exists even inside the
 * same clinic.
 */

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::{
    db::bind_clinic,
    handlers::auth::AppState,
    handlers::patients::{resolve_limit, CursorQuery},
    models::{
        AiSummary, AuthPrincipal, Consultation, EntityType, LabResult, Patient, PatientDto,
        VitalRecord,
    },
    services::analytics::{compute_trends, flag_labs, DEFAULT_Z_THRESHOLD},
    services::{AuditService, ChangePasswordRequest},
    utils::{AppError, PhoneValidator, Result},
};

/// Load the portal patient behind the token
async fn load_self(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    principal: &AuthPrincipal,
) -> Result<Patient> {
    Patient::find_by_id(&mut **tx, principal.id, principal.clinic_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Patient not found".to_string()))
}

/// Own profile
///
/// GET /portal/me
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
) -> Result<impl IntoResponse> {
    let mut tx = state.pool.begin().await?;
    bind_clinic(&mut tx, principal.clinic_id).await?;
    let patient = load_self(&mut tx, &principal).await?;
    tx.commit().await?;

    Ok(Json(PatientDto::from(patient)))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub phone: String,
}

/// Update own contact phone
///
/// PUT /portal/me
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse> {
    if !PhoneValidator::validate(&req.phone) {
        return Err(AppError::validation("Phone must be 6-30 characters"));
    }

    let mut tx = state.pool.begin().await?;
    bind_clinic(&mut tx, principal.clinic_id).await?;

    load_self(&mut tx, &principal).await?;
    Patient::update_phone(&mut *tx, principal.id, &req.phone).await?;

    AuditService::record(
        &mut *tx,
        principal.id,
        "PORTAL_PROFILE_UPDATE",
        EntityType::Patient,
        Some(principal.id),
    )
    .await?;

    tx.commit().await?;

    state.structured_input.invalidate(principal.id).await;

    Ok(Json(json!({ "message": "Profile updated" })))
}

/// Rotate own password
///
/// PUT /portal/security
pub async fn update_security(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse> {
    let mut tx = state.pool.begin().await?;
    bind_clinic(&mut tx, principal.clinic_id).await?;

    state
        .auth_service
        .patient_change_password(&mut tx, principal.id, principal.clinic_id, req)
        .await?;

    tx.commit().await?;

    Ok(Json(json!({ "message": "Password updated" })))
}

/// Own vitals, newest first
///
/// GET /portal/vitals
pub async fn list_vitals(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
) -> Result<impl IntoResponse> {
    let mut tx = state.pool.begin().await?;
    bind_clinic(&mut tx, principal.clinic_id).await?;

    load_self(&mut tx, &principal).await?;
    let vitals = VitalRecord::list_for_patient(&mut *tx, principal.id).await?;
    tx.commit().await?;

    Ok(Json(vitals))
}

/// Own labs with flagging applied
///
/// GET /portal/labs
pub async fn list_labs(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
) -> Result<impl IntoResponse> {
    let mut tx = state.pool.begin().await?;
    bind_clinic(&mut tx, principal.clinic_id).await?;

    load_self(&mut tx, &principal).await?;
    let labs = LabResult::list_for_patient(&mut *tx, principal.id).await?;
    tx.commit().await?;

    Ok(Json(flag_labs(&labs)))
}

/// Own vitals analytics
///
/// GET /portal/analytics
pub async fn vitals_analytics(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
) -> Result<impl IntoResponse> {
    let mut tx = state.pool.begin().await?;
    bind_clinic(&mut tx, principal.clinic_id).await?;

    load_self(&mut tx, &principal).await?;
    let vitals = VitalRecord::list_for_patient(&mut *tx, principal.id).await?;
    tx.commit().await?;

    let trends = compute_trends(&vitals, DEFAULT_Z_THRESHOLD);
    let trends_by_metric: serde_json::Map<String, serde_json::Value> = trends
        .into_iter()
        .map(|t| (t.metric.to_string(), json!(t)))
        .collect();

    Ok(Json(json!({ "trends": trends_by_metric })))
}

/// Own consultations presented as appointments, doctor name projected
///
/// GET /portal/appointments?cursor&limit
pub async fn list_appointments(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
    Query(query): Query<CursorQuery>,
) -> Result<impl IntoResponse> {
    let limit = resolve_limit(query.limit)?;

    let mut tx = state.pool.begin().await?;
    bind_clinic(&mut tx, principal.clinic_id).await?;

    load_self(&mut tx, &principal).await?;
    let page = Consultation::list_page(&mut *tx, principal.id, query.cursor, limit).await?;
    tx.commit().await?;

    Ok(Json(page))
}

/// Own AI summaries, newest first
///
/// GET /portal/summaries
pub async fn list_summaries(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
) -> Result<impl IntoResponse> {
    let mut tx = state.pool.begin().await?;
    bind_clinic(&mut tx, principal.clinic_id).await?;

    load_self(&mut tx, &principal).await?;
    let summaries = AiSummary::list_for_patient(&mut *tx, principal.id).await?;
    tx.commit().await?;

    Ok(Json(summaries))
}
