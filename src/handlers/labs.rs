/*!
 * Lab Result HTTP Handlers
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
    models::{AuthPrincipal, CreateLabRequest, EntityType, LabResult, Patient},
    services::AuditService,
    utils::{parse_numeric_value, AppError, Result},
};

/// Record a lab result
///
/// POST /labs
pub async fn create_lab(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
    Json(data): Json<CreateLabRequest>,
) -> Result<impl IntoResponse> {
    data.validate().map_err(AppError::from_validation_errors)?;

    let mut tx = state.pool.begin().await?;
    bind_clinic(&mut tx, principal.clinic_id).await?;

    Patient::find_by_id(&mut *tx, data.patient_id, principal.clinic_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Patient not found".to_string()))?;

    let numeric_value = parse_numeric_value(&data.value);
    let lab = LabResult::create(&mut *tx, &data, numeric_value).await?;

    AuditService::record(
        &mut *tx,
        principal.id,
        "LAB_CREATE",
        EntityType::LabResult,
        Some(lab.id),
    )
    .await?;

    tx.commit().await?;

    state.structured_input.invalidate(data.patient_id).await;

    Ok((StatusCode::CREATED, Json(lab)))
}

/// List a patient's lab results, newest first
///
/// GET /labs/:patientId
pub async fn list_labs(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
    Path(patient_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let mut tx = state.pool.begin().await?;
    bind_clinic(&mut tx, principal.clinic_id).await?;

    Patient::find_by_id(&mut *tx, patient_id, principal.clinic_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Patient not found".to_string()))?;

    let labs = LabResult::list_for_patient(&mut *tx, patient_id).await?;
    tx.commit().await?;

    Ok(Json(labs))
}
