/*!
 * AI Summary Model
 *
 * Persisted output of the AI summary pipeline: the rendered summary text and
 * the deterministic risk flags it was built from. Summaries are advisory and
 * always carry the disclaimer inside both fields.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Fixed advisory disclaimer attached to every summary
pub const AI_DISCLAIMER: &str =
    "This summary is AI-assisted, advisory only, and not a diagnosis. \
     All findings must be reviewed by a qualified clinician.";

/// Deterministic risk flags derived from vital-sign statistics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RiskFlags {
    pub high_blood_pressure_trend: bool,
    pub rising_glucose_trend: bool,
    pub tachycardia_trend: bool,
    pub rapid_weight_change: bool,
    pub concerning_symptoms: Vec<String>,
    pub disclaimer: String,
}

impl Default for RiskFlags {
    fn default() -> Self {
        Self {
            high_blood_pressure_trend: false,
            rising_glucose_trend: false,
            tachycardia_trend: false,
            rapid_weight_change: false,
            concerning_symptoms: Vec::new(),
            disclaimer: AI_DISCLAIMER.to_string(),
        }
    }
}

impl RiskFlags {
    /// Number of active trend flags (symptom matches are not trend flags)
    pub fn active_count(&self) -> usize {
        [
            self.high_blood_pressure_trend,
            self.rising_glucose_trend,
            self.tachycardia_trend,
            self.rapid_weight_change,
        ]
        .iter()
        .filter(|f| **f)
        .count()
    }
}

/// AI summary model
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiSummary {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub summary_text: String,
    pub risk_flags: sqlx::types::Json<RiskFlags>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A patient's latest summary flags, for the clinic-wide risk roll-up
#[derive(Debug, Clone, FromRow)]
pub struct LatestSummaryRow {
    pub patient_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub summary_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub risk_flags: sqlx::types::Json<RiskFlags>,
}

impl AiSummary {
    /// Persist a generated summary
    pub async fn create(
        executor: impl sqlx::PgExecutor<'_>,
        patient_id: Uuid,
        summary_text: &str,
        risk_flags: &RiskFlags,
    ) -> sqlx::Result<Self> {
        sqlx::query_as::<_, AiSummary>(
            r#"
            INSERT INTO ai_summaries (patient_id, summary_text, risk_flags)
            VALUES ($1, $2, $3)
            RETURNING id, patient_id, summary_text, risk_flags, created_at, deleted_at
            "#,
        )
        .bind(patient_id)
        .bind(summary_text)
        .bind(sqlx::types::Json(risk_flags))
        .fetch_one(executor)
        .await
    }

    /// Find a live summary by id within the bound clinic
    pub async fn find_by_id(
        executor: impl sqlx::PgExecutor<'_>,
        id: Uuid,
        clinic_id: Uuid,
    ) -> sqlx::Result<Option<Self>> {
        sqlx::query_as::<_, AiSummary>(
            r#"
            SELECT s.id, s.patient_id, s.summary_text, s.risk_flags, s.created_at, s.deleted_at
            FROM ai_summaries s
            JOIN patients p ON p.id = s.patient_id
            WHERE s.id = $1 AND p.clinic_id = $2 AND s.deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(clinic_id)
        .fetch_optional(executor)
        .await
    }

    /// All live summaries for a patient, newest first
    pub async fn list_for_patient(
        executor: impl sqlx::PgExecutor<'_>,
        patient_id: Uuid,
    ) -> sqlx::Result<Vec<Self>> {
        sqlx::query_as::<_, AiSummary>(
            r#"
            SELECT id, patient_id, summary_text, risk_flags, created_at, deleted_at
            FROM ai_summaries
            WHERE patient_id = $1 AND deleted_at IS NULL
            ORDER BY created_at DESC
            "#,
        )
        .bind(patient_id)
        .fetch_all(executor)
        .await
    }

    /// The latest summary per active patient in a clinic
    pub async fn latest_per_patient(
        executor: impl sqlx::PgExecutor<'_>,
        clinic_id: Uuid,
    ) -> sqlx::Result<Vec<LatestSummaryRow>> {
        sqlx::query_as::<_, LatestSummaryRow>(
            r#"
            SELECT DISTINCT ON (s.patient_id)
                   s.patient_id, p.first_name, p.last_name,
                   s.id AS summary_id, s.created_at, s.risk_flags
            FROM ai_summaries s
            JOIN patients p ON p.id = s.patient_id
            WHERE p.clinic_id = $1 AND p.is_archived = FALSE AND s.deleted_at IS NULL
            ORDER BY s.patient_id, s.created_at DESC
            "#,
        )
        .bind(clinic_id)
        .fetch_all(executor)
        .await
    }
}
