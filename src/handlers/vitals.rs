/*!
 * Vital Record HTTP Handlers
 */

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::bind_clinic,
    handlers::auth::AppState,
    models::{AuthPrincipal, CreateVitalRequest, EntityType, Patient, VitalRecord},
    services::AuditService,
    utils::{parse_numeric_value, AppError, Result},
};

/// Record a vital sign measurement
///
/// POST /vitals
///
/// The patient must belong to the caller's clinic. On success the AI
/// structured-input cache for that patient is evicted.
pub async fn create_vital(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
    Json(data): Json<CreateVitalRequest>,
) -> Result<impl IntoResponse> {
    data.validate().map_err(AppError::from_validation_errors)?;

    let mut tx = state.pool.begin().await?;
    bind_clinic(&mut tx, principal.clinic_id).await?;

    Patient::find_by_id(&mut *tx, data.patient_id, principal.clinic_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Patient not found".to_string()))?;

    let numeric_value = parse_numeric_value(&data.value);
    let vital = VitalRecord::create(&mut *tx, &data, numeric_value).await?;

    AuditService::record(
        &mut *tx,
        principal.id,
        "VITAL_CREATE",
        EntityType::VitalRecord,
        Some(vital.id),
    )
    .await?;

    tx.commit().await?;

    // Invalidation follows the committed write; a lost eviction is bounded
    // by the cache TTL
    state.structured_input.invalidate(data.patient_id).await;

    Ok((StatusCode::CREATED, Json(vital)))
}

/// List a patient's vitals, newest first
///
/// GET /vitals/:patientId
pub async fn list_vitals(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
    Path(patient_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let mut tx = state.pool.begin().await?;
    bind_clinic(&mut tx, principal.clinic_id).await?;

    Patient::find_by_id(&mut *tx, patient_id, principal.clinic_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Patient not found".to_string()))?;

    let vitals = VitalRecord::list_for_patient(&mut *tx, patient_id).await?;
    tx.commit().await?;

    Ok(Json(vitals))
}
