/*!
 * Audit Log Model
 *
 * Immutable audit trail for every write path. Action text is scrubbed of
 * PHI before it reaches this model; entity references are stored only as
 * opaque identifiers. Mutation of existing rows is rejected by a database
 * trigger.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Entity types that can be audited
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Clinic,
    User,
    Patient,
    VitalRecord,
    LabResult,
    Consultation,
    AiSummary,
}

impl EntityType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "CLINIC" => Some(Self::Clinic),
            "USER" => Some(Self::User),
            "PATIENT" => Some(Self::Patient),
            "VITAL_RECORD" => Some(Self::VitalRecord),
            "LAB_RESULT" => Some(Self::LabResult),
            "CONSULTATION" => Some(Self::Consultation),
            "AI_SUMMARY" => Some(Self::AiSummary),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clinic => write!(f, "CLINIC"),
            Self::User => write!(f, "USER"),
            Self::Patient => write!(f, "PATIENT"),
            Self::VitalRecord => write!(f, "VITAL_RECORD"),
            Self::LabResult => write!(f, "LAB_RESULT"),
            Self::Consultation => write!(f, "CONSULTATION"),
            Self::AiSummary => write!(f, "AI_SUMMARY"),
        }
    }
}

/// Audit log entry
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub action: String,
    pub entity_type: EntityType,
    pub entity_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Filters for the ADMIN audit listing
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogFilter {
    pub action: Option<String>,
    pub entity_type: Option<String>,
    pub user_id: Option<Uuid>,
}

/// Paginated audit listing response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogPage {
    pub data: Vec<AuditLog>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

impl AuditLog {
    /// Append an audit row. The caller passes scrubbed action text.
    pub async fn append(
        executor: impl sqlx::PgExecutor<'_>,
        user_id: Uuid,
        action: &str,
        entity_type: EntityType,
        entity_id: Option<&str>,
    ) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (user_id, action, entity_type, entity_id)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(user_id)
        .bind(action)
        .bind(entity_type)
        .bind(entity_id)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Page through the clinic's audit trail, newest first
    ///
    /// The acting-principal subquery scopes visibility to the caller's
    /// clinic on top of the row-level policy; both checks are intentional.
    pub async fn list_page(
        executor: impl sqlx::PgExecutor<'_>,
        clinic_id: Uuid,
        filter: &AuditLogFilter,
        page: i64,
        limit: i64,
    ) -> sqlx::Result<Vec<Self>> {
        sqlx::query_as::<_, AuditLog>(
            r#"
            SELECT id, user_id, action, entity_type, entity_id, timestamp
            FROM audit_logs
            WHERE user_id IN (
                    SELECT id FROM users WHERE clinic_id = $1
                    UNION
                    SELECT id FROM patients WHERE clinic_id = $1
              )
              AND ($2::text IS NULL OR action ILIKE '%' || $2 || '%')
              AND ($3::varchar IS NULL OR entity_type = $3)
              AND ($4::uuid IS NULL OR user_id = $4)
            ORDER BY timestamp DESC
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(clinic_id)
        .bind(&filter.action)
        .bind(&filter.entity_type)
        .bind(filter.user_id)
        .bind(limit)
        .bind((page - 1) * limit)
        .fetch_all(executor)
        .await
    }

    /// Total rows matching the filter, for pagination metadata
    pub async fn count(
        executor: impl sqlx::PgExecutor<'_>,
        clinic_id: Uuid,
        filter: &AuditLogFilter,
    ) -> sqlx::Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM audit_logs
            WHERE user_id IN (
                    SELECT id FROM users WHERE clinic_id = $1
                    UNION
                    SELECT id FROM patients WHERE clinic_id = $1
              )
              AND ($2::text IS NULL OR action ILIKE '%' || $2 || '%')
              AND ($3::varchar IS NULL OR entity_type = $3)
              AND ($4::uuid IS NULL OR user_id = $4)
            "#,
        )
        .bind(clinic_id)
        .bind(&filter.action)
        .bind(&filter.entity_type)
        .bind(filter.user_id)
        .fetch_one(executor)
        .await?;
        Ok(count)
    }
}
