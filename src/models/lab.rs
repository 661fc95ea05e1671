/*!
 * Lab Result Model
 *
 * Laboratory results with free-form reference ranges. Flagging against the
 * parsed range happens in the analytics engine; this model only persists
 * what the lab reported.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Lab result model
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabResult {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub test_name: String,
    pub value: String,
    pub numeric_value: Option<f64>,
    pub unit: Option<String>,
    pub reference_range: Option<String>,
    pub recorded_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Request body for recording a lab result
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateLabRequest {
    pub patient_id: Uuid,
    #[validate(length(min = 1, max = 200, message = "Test name must be 1-200 characters"))]
    pub test_name: String,
    #[validate(length(min = 1, max = 200, message = "Value must be 1-200 characters"))]
    pub value: String,
    #[validate(length(max = 30, message = "Unit must be at most 30 characters"))]
    pub unit: Option<String>,
    #[validate(length(max = 100, message = "Reference range must be at most 100 characters"))]
    pub reference_range: Option<String>,
    pub recorded_at: Option<DateTime<Utc>>,
}

impl LabResult {
    /// Insert a lab result; `numeric_value` was parsed by the caller
    pub async fn create(
        executor: impl sqlx::PgExecutor<'_>,
        data: &CreateLabRequest,
        numeric_value: Option<f64>,
    ) -> sqlx::Result<Self> {
        sqlx::query_as::<_, LabResult>(
            r#"
            INSERT INTO lab_results
                (patient_id, test_name, value, numeric_value, unit, reference_range, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, now()))
            RETURNING id, patient_id, test_name, value, numeric_value, unit,
                      reference_range, recorded_at, deleted_at
            "#,
        )
        .bind(data.patient_id)
        .bind(&data.test_name)
        .bind(&data.value)
        .bind(numeric_value)
        .bind(&data.unit)
        .bind(&data.reference_range)
        .bind(data.recorded_at)
        .fetch_one(executor)
        .await
    }

    /// All live lab results for a patient, newest first
    pub async fn list_for_patient(
        executor: impl sqlx::PgExecutor<'_>,
        patient_id: Uuid,
    ) -> sqlx::Result<Vec<Self>> {
        sqlx::query_as::<_, LabResult>(
            r#"
            SELECT id, patient_id, test_name, value, numeric_value, unit,
                   reference_range, recorded_at, deleted_at
            FROM lab_results
            WHERE patient_id = $1 AND deleted_at IS NULL
            ORDER BY recorded_at DESC
            "#,
        )
        .bind(patient_id)
        .fetch_all(executor)
        .await
    }

    /// The most recent live lab results for a patient, newest first, capped
    pub async fn list_recent(
        executor: impl sqlx::PgExecutor<'_>,
        patient_id: Uuid,
        limit: i64,
    ) -> sqlx::Result<Vec<Self>> {
        sqlx::query_as::<_, LabResult>(
            r#"
            SELECT id, patient_id, test_name, value, numeric_value, unit,
                   reference_range, recorded_at, deleted_at
            FROM lab_results
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
    fn test_serialization_omits_deleted_at() {
        let lab = LabResult {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            test_name: "Glucose".to_string(),
            value: "150".to_string(),
            numeric_value: Some(150.0),
            unit: Some("mg/dL".to_string()),
            reference_range: Some("70-100".to_string()),
            recorded_at: Utc::now(),
            deleted_at: None,
        };
        let json = serde_json::to_value(&lab).unwrap();
        assert_eq!(json["testName"], "Glucose");
        assert_eq!(json["referenceRange"], "70-100");
        assert!(json.get("deletedAt").is_none());
    }

    #[test]
    fn test_create_request_validation() {
        let request = CreateLabRequest {
            patient_id: Uuid::new_v4(),
            test_name: String::new(),
            value: "150".to_string(),
            unit: None,
            reference_range: None,
            recorded_at: None,
        };
        assert!(request.validate().is_err());
    }
}
