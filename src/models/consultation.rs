/*!
 * Consultation Model
 *
 * Doctor-patient consultation notes. The writing doctor is always the
 * authenticated caller; reads join a compact doctor projection for display.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::models::Role;

/// Consultation model
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Consultation {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: DateTime<Utc>,
    pub symptoms: String,
    pub notes: String,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Compact staff projection joined onto consultation reads
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorRef {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Consultation joined with its doctor, for list responses
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationWithDoctor {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub date: DateTime<Utc>,
    pub symptoms: String,
    pub notes: String,
    pub doctor: DoctorRef,
}

#[derive(Debug, Clone, FromRow)]
struct ConsultationDoctorRow {
    id: Uuid,
    patient_id: Uuid,
    date: DateTime<Utc>,
    symptoms: String,
    notes: String,
    doctor_id: Uuid,
    doctor_name: String,
    doctor_email: String,
    doctor_role: Role,
}

impl From<ConsultationDoctorRow> for ConsultationWithDoctor {
    fn from(row: ConsultationDoctorRow) -> Self {
        Self {
            id: row.id,
            patient_id: row.patient_id,
            date: row.date,
            symptoms: row.symptoms,
            notes: row.notes,
            doctor: DoctorRef {
                id: row.doctor_id,
                name: row.doctor_name,
                email: row.doctor_email,
                role: row.doctor_role,
            },
        }
    }
}

/// One page of a cursor-paginated consultation listing
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationPage {
    pub data: Vec<ConsultationWithDoctor>,
    pub next_cursor: Option<Uuid>,
}

/// Request body for recording a consultation
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateConsultationRequest {
    pub patient_id: Uuid,
    pub date: Option<DateTime<Utc>>,
    #[validate(length(min = 1, max = 5000, message = "Symptoms must be 1-5000 characters"))]
    pub symptoms: String,
    #[validate(length(max = 10000, message = "Notes must be at most 10000 characters"))]
    pub notes: Option<String>,
}

impl Consultation {
    /// Insert a consultation; the doctor is the authenticated caller
    pub async fn create(
        executor: impl sqlx::PgExecutor<'_>,
        data: &CreateConsultationRequest,
        doctor_id: Uuid,
    ) -> sqlx::Result<Self> {
        sqlx::query_as::<_, Consultation>(
            r#"
            INSERT INTO consultations (patient_id, doctor_id, date, symptoms, notes)
            VALUES ($1, $2, COALESCE($3, now()), $4, $5)
            RETURNING id, patient_id, doctor_id, date, symptoms, notes, deleted_at
            "#,
        )
        .bind(data.patient_id)
        .bind(doctor_id)
        .bind(data.date)
        .bind(&data.symptoms)
        .bind(data.notes.as_deref().unwrap_or(""))
        .fetch_one(executor)
        .await
    }

    /// Cursor-paginated listing by date descending, doctor joined
    pub async fn list_page(
        executor: impl sqlx::PgExecutor<'_>,
        patient_id: Uuid,
        cursor: Option<Uuid>,
        limit: i64,
    ) -> sqlx::Result<ConsultationPage> {
        let mut rows = sqlx::query_as::<_, ConsultationDoctorRow>(
            r#"
            SELECT c.id, c.patient_id, c.date, c.symptoms, c.notes,
                   u.id AS doctor_id, u.name AS doctor_name,
                   u.email AS doctor_email, u.role AS doctor_role
            FROM consultations c
            JOIN users u ON u.id = c.doctor_id
            WHERE c.patient_id = $1 AND c.deleted_at IS NULL
              AND ($2::uuid IS NULL OR (c.date, c.id) < (
                    SELECT date, id FROM consultations WHERE id = $2
              ))
            ORDER BY c.date DESC, c.id DESC
            LIMIT $3
            "#,
        )
        .bind(patient_id)
        .bind(cursor)
        .bind(limit + 1)
        .fetch_all(executor)
        .await?;

        let next_cursor = if rows.len() as i64 > limit {
            rows.truncate(limit as usize);
            rows.last().map(|c| c.id)
        } else {
            None
        };

        Ok(ConsultationPage {
            data: rows.into_iter().map(ConsultationWithDoctor::from).collect(),
            next_cursor,
        })
    }

    /// The most recent live consultations, newest first, capped
    pub async fn list_recent(
        executor: impl sqlx::PgExecutor<'_>,
        patient_id: Uuid,
        limit: i64,
    ) -> sqlx::Result<Vec<Self>> {
        sqlx::query_as::<_, Consultation>(
            r#"
            SELECT id, patient_id, doctor_id, date, symptoms, notes, deleted_at
            FROM consultations
            WHERE patient_id = $1 AND deleted_at IS NULL
            ORDER BY date DESC
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
    fn test_create_request_requires_symptoms() {
        let request = CreateConsultationRequest {
            patient_id: Uuid::new_v4(),
            date: None,
            symptoms: String::new(),
            notes: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_doctor_projection_shape() {
        let row = ConsultationDoctorRow {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            date: Utc::now(),
            symptoms: "chest pain".to_string(),
            notes: String::new(),
            doctor_id: Uuid::new_v4(),
            doctor_name: "Dr. Grey".to_string(),
            doctor_email: "grey@clinic.example".to_string(),
            doctor_role: Role::Doctor,
        };
        let joined: ConsultationWithDoctor = row.into();
        let json = serde_json::to_value(&joined).unwrap();
        assert_eq!(json["doctor"]["name"], "Dr. Grey");
        assert_eq!(json["doctor"]["role"], "DOCTOR");
    }
}
