/*!
 * Consultation HTTP Handlers
 */

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::bind_clinic,
    handlers::auth::AppState,
    handlers::patients::{resolve_limit, CursorQuery},
    models::{AuthPrincipal, Consultation, CreateConsultationRequest, EntityType, Patient},
    services::AuditService,
    utils::{AppError, Result},
};

/// Record a consultation
///
/// POST /consultations
///
/// The doctor on the record is always the authenticated caller.
pub async fn create_consultation(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
    Json(data): Json<CreateConsultationRequest>,
) -> Result<impl IntoResponse> {
    data.validate().map_err(AppError::from_validation_errors)?;

    let mut tx = state.pool.begin().await?;
    bind_clinic(&mut tx, principal.clinic_id).await?;

    Patient::find_by_id(&mut *tx, data.patient_id, principal.clinic_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Patient not found".to_string()))?;

    let consultation = Consultation::create(&mut *tx, &data, principal.id).await?;

    AuditService::record(
        &mut *tx,
        principal.id,
        "CONSULTATION_CREATE",
        EntityType::Consultation,
        Some(consultation.id),
    )
    .await?;

    tx.commit().await?;

    state.structured_input.invalidate(data.patient_id).await;

    Ok((StatusCode::CREATED, Json(consultation)))
}

/// List a patient's consultations with cursor pagination
///
/// GET /consultations/:patientId?cursor&limit
pub async fn list_consultations(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
    Path(patient_id): Path<Uuid>,
    Query(query): Query<CursorQuery>,
) -> Result<impl IntoResponse> {
    let limit = resolve_limit(query.limit)?;

    let mut tx = state.pool.begin().await?;
    bind_clinic(&mut tx, principal.clinic_id).await?;

    Patient::find_by_id(&mut *tx, patient_id, principal.clinic_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Patient not found".to_string()))?;

    let page = Consultation::list_page(&mut *tx, patient_id, query.cursor, limit).await?;
    tx.commit().await?;

    Ok(Json(page))
}
