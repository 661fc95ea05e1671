/*!
 * Patient Management HTTP Handlers
 *
 * CRUD over clinic patients plus portal invite creation. Every handler
 * binds the caller's clinic into the transaction before touching rows, and
 * every query filters by clinic id as well; the row-level policies are the
 * backstop, not the only line.
 */

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::bind_clinic,
    handlers::auth::AppState,
    models::{
        AuthPrincipal, CreatePatientRequest, EntityType, Patient, PatientDto, Role,
        UpdatePatientRequest,
    },
    services::AuditService,
    utils::{AppError, Result},
};

/// Cursor pagination query parameters
#[derive(Debug, Deserialize)]
pub struct CursorQuery {
    pub cursor: Option<Uuid>,
    pub limit: Option<i64>,
}

/// Resolve and validate a page limit (1..=100, default 20)
pub fn resolve_limit(limit: Option<i64>) -> Result<i64> {
    match limit {
        None => Ok(20),
        Some(limit) if (1..=100).contains(&limit) => Ok(limit),
        Some(_) => Err(AppError::validation("limit must be between 1 and 100")),
    }
}

/// List patients with cursor pagination
///
/// GET /patients?cursor&limit
pub async fn list_patients(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
    Query(query): Query<CursorQuery>,
) -> Result<impl IntoResponse> {
    let limit = resolve_limit(query.limit)?;

    let mut tx = state.pool.begin().await?;
    bind_clinic(&mut tx, principal.clinic_id).await?;

    let page = Patient::list_page(&mut *tx, principal.clinic_id, query.cursor, limit).await?;
    tx.commit().await?;

    Ok(Json(page))
}

/// Create a patient
///
/// POST /patients
pub async fn create_patient(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
    Json(data): Json<CreatePatientRequest>,
) -> Result<impl IntoResponse> {
    data.validate().map_err(AppError::from_validation_errors)?;

    let mut tx = state.pool.begin().await?;
    bind_clinic(&mut tx, principal.clinic_id).await?;

    let patient = Patient::create(&mut *tx, principal.clinic_id, &data)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .map(|db| db.is_unique_violation())
                .unwrap_or(false)
            {
                AppError::Conflict("A patient with this email already exists".to_string())
            } else {
                AppError::from(e)
            }
        })?;

    AuditService::record(
        &mut *tx,
        principal.id,
        "PATIENT_CREATE",
        EntityType::Patient,
        Some(patient.id),
    )
    .await?;

    tx.commit().await?;

    tracing::info!("Patient {} created in clinic {}", patient.id, principal.clinic_id);

    Ok((StatusCode::CREATED, Json(PatientDto::from(patient))))
}

/// Get a patient by id
///
/// GET /patients/:id
pub async fn get_patient(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
    Path(patient_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let mut tx = state.pool.begin().await?;
    bind_clinic(&mut tx, principal.clinic_id).await?;

    let patient = Patient::find_by_id(&mut *tx, patient_id, principal.clinic_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Patient not found".to_string()))?;

    tx.commit().await?;

    Ok(Json(PatientDto::from(patient)))
}

/// Update a patient
///
/// PUT /patients/:id
pub async fn update_patient(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
    Path(patient_id): Path<Uuid>,
    Json(data): Json<UpdatePatientRequest>,
) -> Result<impl IntoResponse> {
    data.validate().map_err(AppError::from_validation_errors)?;

    let mut tx = state.pool.begin().await?;
    bind_clinic(&mut tx, principal.clinic_id).await?;

    let patient = Patient::update(&mut *tx, patient_id, principal.clinic_id, &data)
        .await?
        .ok_or_else(|| AppError::NotFound("Patient not found".to_string()))?;

    AuditService::record(
        &mut *tx,
        principal.id,
        "PATIENT_UPDATE",
        EntityType::Patient,
        Some(patient.id),
    )
    .await?;

    tx.commit().await?;

    // The AI input projection includes age and demographics
    state.structured_input.invalidate(patient_id).await;

    Ok(Json(PatientDto::from(patient)))
}

/// Soft-archive a patient (ADMIN only)
///
/// DELETE /patients/:id
///
/// A missing or cross-tenant patient returns `not-found`; existence is
/// never leaked across clinics.
pub async fn delete_patient(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
    Path(patient_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    if principal.role != Role::Admin {
        return Err(AppError::Forbidden(
            "Only administrators can archive patients".to_string(),
        ));
    }

    let mut tx = state.pool.begin().await?;
    bind_clinic(&mut tx, principal.clinic_id).await?;

    let archived = Patient::soft_delete(&mut *tx, patient_id, principal.clinic_id).await?;
    if !archived {
        return Err(AppError::NotFound("Patient not found".to_string()));
    }

    AuditService::record(
        &mut *tx,
        principal.id,
        "PATIENT_ARCHIVE",
        EntityType::Patient,
        Some(patient_id),
    )
    .await?;

    tx.commit().await?;

    state.structured_input.invalidate(patient_id).await;

    Ok(StatusCode::NO_CONTENT)
}

/// Create a portal invite for a patient
///
/// POST /patients/:id/invite
pub async fn create_patient_invite(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
    Path(patient_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let mut tx = state.pool.begin().await?;
    bind_clinic(&mut tx, principal.clinic_id).await?;

    let invite = state
        .auth_service
        .create_patient_invite(&mut tx, principal.id, principal.clinic_id, patient_id)
        .await?;

    tx.commit().await?;

    Ok(Json(invite))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_default() {
        assert_eq!(resolve_limit(None).unwrap(), 20);
    }

    #[test]
    fn test_limit_bounds() {
        assert!(resolve_limit(Some(0)).is_err());
        assert!(resolve_limit(Some(101)).is_err());
        assert!(resolve_limit(Some(-5)).is_err());
        assert_eq!(resolve_limit(Some(1)).unwrap(), 1);
        assert_eq!(resolve_limit(Some(100)).unwrap(), 100);
    }
}
