/*!
 * Structured-Input Builder & Cache
 *
 * Aggregates a patient's recent vitals, labs, and consultations into the
 * compact projection consumed by the AI pipeline, with a short-TTL Redis
 * cache keyed by patient. Cache failures are never fatal: a miss or a Redis
 * error just means recomputation, and the TTL bounds staleness when an
 * eviction is lost.
 */

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::models::{Consultation, LabResult, Patient, VitalRecord, VitalType};
use crate::utils::Result;

/// Fetch caps for the underlying queries
const RECENT_VITALS: i64 = 20;
const RECENT_LABS: i64 = 20;
const RECENT_CONSULTATIONS: i64 = 10;

/// Output caps for the projection
const TREND_LEN: usize = 10;
const SYMPTOM_LEN: usize = 5;
const LAB_LEN: usize = 8;

/// Compact lab row carried into the model input (no identifiers)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabValue {
    pub test_name: String,
    pub value: String,
    pub unit: Option<String>,
    pub reference_range: Option<String>,
}

/// Compact, numerically oriented projection of a patient's recent records
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredInput {
    /// Age in whole years; None when the birth date is implausible
    pub age: Option<i32>,
    /// Numeric trends, most recent first, at most ten points each
    pub bp_trend: Vec<f64>,
    pub glucose_trend: Vec<f64>,
    pub heart_rate_trend: Vec<f64>,
    pub weight_trend: Vec<f64>,
    pub recent_symptoms: Vec<String>,
    pub recent_lab_values: Vec<LabValue>,
}

/// Cache key for a patient's structured input
pub fn cache_key(patient_id: Uuid) -> String {
    format!("ai:structured-input:{}", patient_id)
}

/// Structured-input service: builder plus cache
#[derive(Clone)]
pub struct StructuredInputService {
    redis: ConnectionManager,
    ttl_secs: u64,
}

impl StructuredInputService {
    pub fn new(redis: ConnectionManager, ttl_secs: u64) -> Self {
        Self { redis, ttl_secs }
    }

    /// Resolve the structured input for a patient, consulting the cache
    ///
    /// The transaction must already carry the patient's clinic binding; the
    /// row fetches run inside it so row-level policies stay in force.
    pub async fn get_or_build(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        patient: &Patient,
    ) -> Result<StructuredInput> {
        if let Some(cached) = self.cache_get(patient.id).await {
            return Ok(cached);
        }

        let input = build_structured_input(tx, patient).await?;
        self.cache_put(patient.id, &input).await;
        Ok(input)
    }

    /// Drop the cached projection after a mutation; failures are swallowed
    pub async fn invalidate(&self, patient_id: Uuid) {
        let mut conn = self.redis.clone();
        if let Err(e) = conn.del::<_, ()>(cache_key(patient_id)).await {
            tracing::warn!(
                "Failed to invalidate structured-input cache for patient {}: {}",
                patient_id,
                e
            );
        }
    }

    async fn cache_get(&self, patient_id: Uuid) -> Option<StructuredInput> {
        let mut conn = self.redis.clone();
        match conn.get::<_, Option<String>>(cache_key(patient_id)).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(input) => Some(input),
                Err(e) => {
                    tracing::warn!("Discarding unparsable structured-input cache entry: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Structured-input cache read failed: {}", e);
                None
            }
        }
    }

    async fn cache_put(&self, patient_id: Uuid, input: &StructuredInput) {
        let raw = match serde_json::to_string(input) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Failed to serialize structured input for cache: {}", e);
                return;
            }
        };

        let mut conn = self.redis.clone();
        if let Err(e) = conn
            .set_ex::<_, _, ()>(cache_key(patient_id), raw, self.ttl_secs)
            .await
        {
            tracing::warn!("Structured-input cache write failed: {}", e);
        }
    }
}

/// Fetch a patient's recent records and shape them into the projection
pub async fn build_structured_input(
    tx: &mut Transaction<'_, Postgres>,
    patient: &Patient,
) -> Result<StructuredInput> {
    let vitals = VitalRecord::list_recent(&mut **tx, patient.id, RECENT_VITALS).await?;
    let labs = LabResult::list_recent(&mut **tx, patient.id, RECENT_LABS).await?;
    let consultations =
        Consultation::list_recent(&mut **tx, patient.id, RECENT_CONSULTATIONS).await?;

    Ok(project(patient, &vitals, &labs, &consultations))
}

/// Pure projection step, separated from the fetches for testability
pub fn project(
    patient: &Patient,
    vitals: &[VitalRecord],
    labs: &[LabResult],
    consultations: &[Consultation],
) -> StructuredInput {
    let trend = |metric: VitalType| -> Vec<f64> {
        vitals
            .iter()
            .filter(|v| v.vital_type == metric)
            .filter_map(|v| v.numeric_value)
            .filter(|v| v.is_finite())
            .take(TREND_LEN)
            .collect()
    };

    StructuredInput {
        age: patient.age_at(chrono::Utc::now().date_naive()),
        bp_trend: trend(VitalType::Bp),
        glucose_trend: trend(VitalType::Glucose),
        heart_rate_trend: trend(VitalType::HeartRate),
        weight_trend: trend(VitalType::Weight),
        recent_symptoms: consultations
            .iter()
            .map(|c| c.symptoms.clone())
            .take(SYMPTOM_LEN)
            .collect(),
        recent_lab_values: labs
            .iter()
            .map(|l| LabValue {
                test_name: l.test_name.clone(),
                value: l.value.clone(),
                unit: l.unit.clone(),
                reference_range: l.reference_range.clone(),
            })
            .take(LAB_LEN)
            .collect(),
    }
}
