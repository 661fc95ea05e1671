/*!
 * Vital Record Model
 *
 * Time-series vital sign measurements. The display string is preserved
 * verbatim; `numeric_value` is a best-effort parse captured at write time so
 * the analytics engine never re-parses stored values.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Vital sign type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VitalType {
    Bp,
    Glucose,
    HeartRate,
    Weight,
}

impl VitalType {
    /// All tracked metrics, in presentation order
    pub const ALL: [VitalType; 4] = [
        VitalType::Bp,
        VitalType::Glucose,
        VitalType::HeartRate,
        VitalType::Weight,
    ];
}

impl std::fmt::Display for VitalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VitalType::Bp => write!(f, "BP"),
            VitalType::Glucose => write!(f, "GLUCOSE"),
            VitalType::HeartRate => write!(f, "HEART_RATE"),
            VitalType::Weight => write!(f, "WEIGHT"),
        }
    }
}

/// Vital record model
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub vital_type: VitalType,
    pub value: String,
    pub numeric_value: Option<f64>,
    pub unit: Option<String>,
    pub recorded_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Request body for recording a vital
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateVitalRequest {
    pub patient_id: Uuid,
    #[serde(rename = "type")]
    pub vital_type: VitalType,
    #[validate(length(min = 1, max = 100, message = "Value must be 1-100 characters"))]
    pub value: String,
    #[validate(length(max = 30, message = "Unit must be at most 30 characters"))]
    pub unit: Option<String>,
    pub recorded_at: Option<DateTime<Utc>>,
}

impl VitalRecord {
    /// Insert a vital record; `numeric_value` was parsed by the caller
    pub async fn create(
        executor: impl sqlx::PgExecutor<'_>,
        data: &CreateVitalRequest,
        numeric_value: Option<f64>,
    ) -> sqlx::Result<Self> {
        sqlx::query_as::<_, VitalRecord>(
            r#"
            INSERT INTO vital_records (patient_id, type, value, numeric_value, unit, recorded_at)
            VALUES ($1, $2, $3, $4, $5, COALESCE($6, now()))
            RETURNING id, patient_id, type, value, numeric_value, unit, recorded_at, deleted_at
            "#,
        )
        .bind(data.patient_id)
        .bind(data.vital_type)
        .bind(&data.value)
        .bind(numeric_value)
        .bind(&data.unit)
        .bind(data.recorded_at)
        .fetch_one(executor)
        .await
    }

    /// All live vitals for a patient, newest first
    pub async fn list_for_patient(
        executor: impl sqlx::PgExecutor<'_>,
        patient_id: Uuid,
    ) -> sqlx::Result<Vec<Self>> {
        sqlx::query_as::<_, VitalRecord>(
            r#"
            SELECT id, patient_id, type, value, numeric_value, unit, recorded_at, deleted_at
            FROM vital_records
            WHERE patient_id = $1 AND deleted_at IS NULL
            ORDER BY recorded_at DESC
            "#,
        )
        .bind(patient_id)
        .fetch_all(executor)
        .await
    }

    /// The most recent live vitals for a patient, newest first, capped
    pub async fn list_recent(
        executor: impl sqlx::PgExecutor<'_>,
        patient_id: Uuid,
        limit: i64,
    ) -> sqlx::Result<Vec<Self>> {
        sqlx::query_as::<_, VitalRecord>(
            r#"
            SELECT id, patient_id, type, value, numeric_value, unit, recorded_at, deleted_at
            FROM vital_records
            WHERE patient_id = $1 AND deleted_at IS NULL
            ORDER BY recorded_at DESC
            LIMIT $2
            "#,
        )
        .bind(patient_id)
        .bind(limit)
        .fetch_all(executor)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vital_type_display() {
        assert_eq!(VitalType::Bp.to_string(), "BP");
        assert_eq!(VitalType::HeartRate.to_string(), "HEART_RATE");
    }

    #[test]
    fn test_vital_type_wire_format() {
        assert_eq!(
            serde_json::from_str::<VitalType>("\"HEART_RATE\"").unwrap(),
            VitalType::HeartRate
        );
        assert_eq!(serde_json::to_string(&VitalType::Bp).unwrap(), "\"BP\"");
    }

    #[test]
    fn test_serialized_record_uses_type_field() {
        let record = VitalRecord {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            vital_type: VitalType::Glucose,
            value: "110".to_string(),
            numeric_value: Some(110.0),
            unit: Some("mg/dL".to_string()),
            recorded_at: Utc::now(),
            deleted_at: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "GLUCOSE");
        assert!(json.get("deletedAt").is_none());
    }
}
