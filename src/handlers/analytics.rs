/*!
 * Analytics HTTP Handlers
 *
 * Read-only views over the pure analytics engine: per-patient trends,
 * anomalies, lab flags, and the composite risk score, plus the clinic-wide
 * high-risk roll-up over latest summaries.
 */

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    db::bind_clinic,
    handlers::auth::AppState,
    models::{AiSummary, AuthPrincipal, Consultation, LabResult, Patient, RiskFlags, VitalRecord},
    services::analytics::{composite_risk, compute_trends, flag_labs, DEFAULT_Z_THRESHOLD},
    services::build_risk_flags,
    services::structured_input::project,
    utils::{AppError, Result},
};

/// Per-patient analytics
///
/// GET /analytics/patient/:patientId
pub async fn patient_analytics(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
    Path(patient_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let mut tx = state.pool.begin().await?;
    bind_clinic(&mut tx, principal.clinic_id).await?;

    let patient = Patient::find_by_id(&mut *tx, patient_id, principal.clinic_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Patient not found".to_string()))?;

    let vitals = VitalRecord::list_for_patient(&mut *tx, patient_id).await?;
    let labs = LabResult::list_for_patient(&mut *tx, patient_id).await?;
    let consultations = Consultation::list_recent(&mut *tx, patient_id, 10).await?;

    tx.commit().await?;

    let trends = compute_trends(&vitals, DEFAULT_Z_THRESHOLD);
    let anomaly_count: usize = trends.iter().map(|t| t.anomalies.len()).sum();
    let flagged_labs = flag_labs(&labs);

    // Risk flags run over the same compact projection the AI pipeline sees
    let recent_vitals: Vec<VitalRecord> = vitals.iter().take(20).cloned().collect();
    let recent_labs: Vec<LabResult> = labs.iter().take(20).cloned().collect();
    let input = project(&patient, &recent_vitals, &recent_labs, &consultations);
    let risk_flags = build_risk_flags(&input);

    let risk = composite_risk(anomaly_count, &risk_flags, &flagged_labs, &input.recent_symptoms);

    let trends_by_metric: serde_json::Map<String, serde_json::Value> = trends
        .into_iter()
        .map(|t| (t.metric.to_string(), json!(t)))
        .collect();

    Ok(Json(json!({
        "patientId": patient_id,
        "trends": trends_by_metric,
        "labFlags": flagged_labs,
        "riskFlags": risk_flags,
        "risk": risk,
    })))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClinicRiskEntry {
    patient_id: Uuid,
    patient_name: String,
    summary_id: Uuid,
    generated_at: chrono::DateTime<chrono::Utc>,
    active_flags: usize,
    risk_flags: RiskFlags,
}

/// Clinic-wide high-risk roll-up across latest summaries
///
/// GET /analytics/clinic-risk
///
/// One entry per patient with at least one persisted summary, ordered by
/// active flag count descending. Patients without summaries are omitted;
/// the roll-up reads persisted flags rather than recomputing every series.
pub async fn clinic_risk(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
) -> Result<impl IntoResponse> {
    let mut tx = state.pool.begin().await?;
    bind_clinic(&mut tx, principal.clinic_id).await?;

    let rows = AiSummary::latest_per_patient(&mut *tx, principal.clinic_id).await?;
    tx.commit().await?;

    let mut entries: Vec<ClinicRiskEntry> = rows
        .into_iter()
        .map(|row| {
            let flags = row.risk_flags.0;
            ClinicRiskEntry {
                patient_id: row.patient_id,
                patient_name: format!("{} {}", row.first_name, row.last_name),
                summary_id: row.summary_id,
                generated_at: row.created_at,
                active_flags: flags.active_count(),
                risk_flags: flags,
            }
        })
        .collect();

    entries.sort_by(|a, b| b.active_flags.cmp(&a.active_flags));

    let high_risk_count = entries.iter().filter(|e| e.active_flags >= 2).count();

    Ok(Json(json!({
        "patients": entries,
        "highRiskCount": high_risk_count,
    })))
}
