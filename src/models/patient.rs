// Patient model: demographics, portal credentials, and invite lifecycle.
// Every query here filters by clinic_id explicitly; the row-level policies
// enforce the same boundary a second time.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::utils::PhoneValidator;

/// Gender enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// Patient model - database representation
#[derive(Debug, Clone, FromRow)]
pub struct Patient {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub invite_token: Option<Uuid>,
    pub invite_expires_at: Option<DateTime<Utc>>,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
}

impl Patient {
    /// Whether the patient has portal credentials
    pub fn has_portal_access(&self) -> bool {
        self.password_hash.is_some()
    }

    /// Age in whole years at `today`, None if the birth date is in the future
    pub fn age_at(&self, today: NaiveDate) -> Option<i32> {
        let years = today.years_since(self.date_of_birth)?;
        Some(years as i32)
    }
}

/// Patient DTO for API responses (no credential or invite material)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientDto {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub has_portal_access: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Patient> for PatientDto {
    fn from(p: Patient) -> Self {
        Self {
            id: p.id,
            clinic_id: p.clinic_id,
            first_name: p.first_name.clone(),
            last_name: p.last_name.clone(),
            date_of_birth: p.date_of_birth,
            gender: p.gender,
            phone: p.phone.clone(),
            email: p.email.clone(),
            has_portal_access: p.password_hash.is_some(),
            created_at: p.created_at,
        }
    }
}

fn validate_phone(phone: &str) -> Result<(), validator::ValidationError> {
    if !PhoneValidator::validate(phone) {
        let mut error = validator::ValidationError::new("invalid_phone");
        error.message = Some(std::borrow::Cow::Borrowed("Phone must be 6-30 characters"));
        return Err(error);
    }
    Ok(())
}

/// Request body for creating a patient
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePatientRequest {
    #[validate(length(min = 1, max = 100, message = "First name must be 1-100 characters"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "Last name must be 1-100 characters"))]
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    #[validate(custom(function = "validate_phone"))]
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
}

/// Request body for updating a patient; absent fields are left unchanged
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePatientRequest {
    #[validate(length(min = 1, max = 100, message = "First name must be 1-100 characters"))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Last name must be 1-100 characters"))]
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    #[validate(custom(function = "validate_phone"))]
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
}

/// One page of a cursor-paginated patient listing
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientPage {
    pub data: Vec<PatientDto>,
    pub next_cursor: Option<Uuid>,
}

const SELECT_COLUMNS: &str = r#"
    id, clinic_id, first_name, last_name, date_of_birth, gender, phone,
    email, password_hash, invite_token, invite_expires_at, is_archived, created_at
"#;

impl Patient {
    /// Insert a patient row
    pub async fn create(
        executor: impl sqlx::PgExecutor<'_>,
        clinic_id: Uuid,
        data: &CreatePatientRequest,
    ) -> sqlx::Result<Self> {
        sqlx::query_as::<_, Patient>(&format!(
            r#"
            INSERT INTO patients (clinic_id, first_name, last_name, date_of_birth, gender, phone, email)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(clinic_id)
        .bind(&data.first_name)
        .bind(&data.last_name)
        .bind(data.date_of_birth)
        .bind(data.gender)
        .bind(&data.phone)
        .bind(&data.email)
        .fetch_one(executor)
        .await
    }

    /// Find an active patient by id within the bound clinic
    pub async fn find_by_id(
        executor: impl sqlx::PgExecutor<'_>,
        id: Uuid,
        clinic_id: Uuid,
    ) -> sqlx::Result<Option<Self>> {
        sqlx::query_as::<_, Patient>(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM patients
            WHERE id = $1 AND clinic_id = $2 AND is_archived = FALSE
            "#
        ))
        .bind(id)
        .bind(clinic_id)
        .fetch_optional(executor)
        .await
    }

    /// Cursor-paginated listing, newest first with id as the tiebreak
    ///
    /// Fetches limit+1 rows; the extra row only signals that another page
    /// exists, in which case `next_cursor` is the id of the last row
    /// returned.
    pub async fn list_page(
        executor: impl sqlx::PgExecutor<'_>,
        clinic_id: Uuid,
        cursor: Option<Uuid>,
        limit: i64,
    ) -> sqlx::Result<PatientPage> {
        let mut rows = sqlx::query_as::<_, Patient>(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM patients
            WHERE clinic_id = $1 AND is_archived = FALSE
              AND ($2::uuid IS NULL OR (created_at, id) < (
                    SELECT created_at, id FROM patients
                    WHERE id = $2 AND clinic_id = $1
              ))
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            "#
        ))
        .bind(clinic_id)
        .bind(cursor)
        .bind(limit + 1)
        .fetch_all(executor)
        .await?;

        let next_cursor = if rows.len() as i64 > limit {
            rows.truncate(limit as usize);
            rows.last().map(|p| p.id)
        } else {
            None
        };

        Ok(PatientPage {
            data: rows.into_iter().map(PatientDto::from).collect(),
            next_cursor,
        })
    }

    /// Apply a partial update, returning the updated row
    pub async fn update(
        executor: impl sqlx::PgExecutor<'_>,
        id: Uuid,
        clinic_id: Uuid,
        data: &UpdatePatientRequest,
    ) -> sqlx::Result<Option<Self>> {
        sqlx::query_as::<_, Patient>(&format!(
            r#"
            UPDATE patients
            SET first_name = COALESCE($3, first_name),
                last_name = COALESCE($4, last_name),
                date_of_birth = COALESCE($5, date_of_birth),
                gender = COALESCE($6, gender),
                phone = COALESCE($7, phone),
                email = COALESCE($8, email)
            WHERE id = $1 AND clinic_id = $2 AND is_archived = FALSE
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(clinic_id)
        .bind(&data.first_name)
        .bind(&data.last_name)
        .bind(data.date_of_birth)
        .bind(data.gender)
        .bind(&data.phone)
        .bind(&data.email)
        .fetch_optional(executor)
        .await
    }

    /// Soft-archive a patient; returns false when no active row matched
    pub async fn soft_delete(
        executor: impl sqlx::PgExecutor<'_>,
        id: Uuid,
        clinic_id: Uuid,
    ) -> sqlx::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE patients
            SET is_archived = TRUE
            WHERE id = $1 AND clinic_id = $2 AND is_archived = FALSE
            "#,
        )
        .bind(id)
        .bind(clinic_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Store a fresh portal invite token
    pub async fn set_invite(
        executor: impl sqlx::PgExecutor<'_>,
        id: Uuid,
        clinic_id: Uuid,
        token: Uuid,
        expires_at: DateTime<Utc>,
    ) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            UPDATE patients
            SET invite_token = $3, invite_expires_at = $4
            WHERE id = $1 AND clinic_id = $2
            "#,
        )
        .bind(id)
        .bind(clinic_id)
        .bind(token)
        .bind(expires_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Look up a patient by invite token (identity flow)
    pub async fn find_by_invite_token(
        executor: impl sqlx::PgExecutor<'_>,
        token: Uuid,
    ) -> sqlx::Result<Option<Self>> {
        sqlx::query_as::<_, Patient>(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM patients
            WHERE invite_token = $1 AND is_archived = FALSE
            "#
        ))
        .bind(token)
        .fetch_optional(executor)
        .await
    }

    /// Look up a portal patient by login email (identity flow)
    pub async fn find_by_email(
        executor: impl sqlx::PgExecutor<'_>,
        email: &str,
    ) -> sqlx::Result<Option<Self>> {
        sqlx::query_as::<_, Patient>(&format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM patients
            WHERE email = $1 AND is_archived = FALSE
            "#
        ))
        .bind(email)
        .fetch_optional(executor)
        .await
    }

    /// Complete invite-based portal setup: set credentials, clear the invite
    pub async fn complete_portal_setup(
        executor: impl sqlx::PgExecutor<'_>,
        id: Uuid,
        email: &str,
        password_hash: &str,
    ) -> sqlx::Result<Self> {
        sqlx::query_as::<_, Patient>(&format!(
            r#"
            UPDATE patients
            SET email = $2, password_hash = $3, invite_token = NULL, invite_expires_at = NULL
            WHERE id = $1
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(email)
        .bind(password_hash)
        .fetch_one(executor)
        .await
    }

    /// Rotate the portal password
    pub async fn update_password(
        executor: impl sqlx::PgExecutor<'_>,
        id: Uuid,
        password_hash: &str,
    ) -> sqlx::Result<()> {
        sqlx::query("UPDATE patients SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Update the patient's own contact phone
    pub async fn update_phone(
        executor: impl sqlx::PgExecutor<'_>,
        id: Uuid,
        phone: &str,
    ) -> sqlx::Result<()> {
        sqlx::query("UPDATE patients SET phone = $2 WHERE id = $1")
            .bind(id)
            .bind(phone)
            .execute(executor)
            .await?;
        Ok(())
    }
}
