/*!
 * Staff User Model
 *
 * Represents clinic staff (administrators and doctors). Patients become
 * authentication principals through the patient model instead; the `Role`
 * enum covers all three so token claims share one type.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Principal role enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Clinic administrator with full tenant access
    Admin,
    /// Doctor with clinical record access
    Doctor,
    /// Portal patient, restricted to their own records
    Patient,
}

impl Role {
    /// Staff roles may operate on clinic-wide clinical data
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Admin | Role::Doctor)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ADMIN" => Some(Role::Admin),
            "DOCTOR" => Some(Role::Doctor),
            "PATIENT" => Some(Role::Patient),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "ADMIN"),
            Role::Doctor => write!(f, "DOCTOR"),
            Role::Patient => write!(f, "PATIENT"),
        }
    }
}

/// Staff user model
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
}

/// Staff user DTO for API responses (no credential material)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            clinic_id: user.clinic_id,
            name: user.name,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

impl User {
    /// Find an active staff user by email (identity flows only)
    pub async fn find_by_email(
        executor: impl sqlx::PgExecutor<'_>,
        email: &str,
    ) -> sqlx::Result<Option<Self>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, clinic_id, name, email, password_hash, role, is_archived, created_at
            FROM users
            WHERE email = $1 AND is_archived = FALSE
            "#,
        )
        .bind(email)
        .fetch_optional(executor)
        .await
    }

    /// Find an active staff user by id within the bound clinic
    pub async fn find_by_id(
        executor: impl sqlx::PgExecutor<'_>,
        id: Uuid,
        clinic_id: Uuid,
    ) -> sqlx::Result<Option<Self>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, clinic_id, name, email, password_hash, role, is_archived, created_at
            FROM users
            WHERE id = $1 AND clinic_id = $2 AND is_archived = FALSE
            "#,
        )
        .bind(id)
        .bind(clinic_id)
        .fetch_optional(executor)
        .await
    }

    /// Insert a staff user row
    pub async fn create(
        executor: impl sqlx::PgExecutor<'_>,
        clinic_id: Uuid,
        name: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> sqlx::Result<Self> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (clinic_id, name, email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, clinic_id, name, email, password_hash, role, is_archived, created_at
            "#,
        )
        .bind(clinic_id)
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .fetch_one(executor)
        .await
    }
}
