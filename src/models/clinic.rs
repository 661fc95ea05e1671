/*!
 * Clinic Model
 *
 * The clinic is the tenant root: every domain entity belongs to exactly one.
 * Carries the subscription plan and the monthly AI call counter used by the
 * quota check.
 */

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Clinic (tenant) model
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Clinic {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub subscription_plan: String,
    pub ai_call_count: i32,
    pub billing_period_start: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Clinic DTO for registration responses
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicDto {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub subscription_plan: String,
}

impl From<Clinic> for ClinicDto {
    fn from(clinic: Clinic) -> Self {
        Self {
            id: clinic.id,
            name: clinic.name,
            email: clinic.email,
            subscription_plan: clinic.subscription_plan,
        }
    }
}

impl Clinic {
    /// Insert a clinic row (identity flow)
    pub async fn create(
        executor: impl sqlx::PgExecutor<'_>,
        name: &str,
        email: &str,
        subscription_plan: &str,
    ) -> sqlx::Result<Self> {
        sqlx::query_as::<_, Clinic>(
            r#"
            INSERT INTO clinics (name, email, subscription_plan)
            VALUES ($1, $2, $3)
            RETURNING id, name, email, subscription_plan, ai_call_count,
                      billing_period_start, created_at
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(subscription_plan)
        .fetch_one(executor)
        .await
    }

    /// Fetch a clinic row with an update lock, for the quota precheck
    pub async fn find_for_update(
        executor: impl sqlx::PgExecutor<'_>,
        id: Uuid,
    ) -> sqlx::Result<Option<Self>> {
        sqlx::query_as::<_, Clinic>(
            r#"
            SELECT id, name, email, subscription_plan, ai_call_count,
                   billing_period_start, created_at
            FROM clinics
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Reset the AI counter at the start of a new billing month
    pub async fn reset_billing_period(
        executor: impl sqlx::PgExecutor<'_>,
        id: Uuid,
        period_start: DateTime<Utc>,
    ) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            UPDATE clinics
            SET ai_call_count = 0, billing_period_start = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(period_start)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Atomically bump the AI call counter
    ///
    /// At-least-once: a retried submission may increment twice. Over-counting
    /// is tolerated, under-counting is not.
    pub async fn increment_ai_calls(
        executor: impl sqlx::PgExecutor<'_>,
        id: Uuid,
    ) -> sqlx::Result<i32> {
        let (count,): (i32,) = sqlx::query_as(
            r#"
            UPDATE clinics
            SET ai_call_count = ai_call_count + 1
            WHERE id = $1
            RETURNING ai_call_count
            "#,
        )
        .bind(id)
        .fetch_one(executor)
        .await?;
        Ok(count)
    }
}

/// Truncate a timestamp to the start of its UTC month
pub fn utc_month_anchor(at: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(at.year(), at.month(), 1, 0, 0, 0)
        .single()
        .expect("first day of month is always valid")
}

/// Whether two timestamps fall in different UTC months
pub fn is_new_utc_month(billing_period_start: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    (billing_period_start.year(), billing_period_start.month()) != (now.year(), now.month())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utc_month_anchor() {
        let at = Utc.with_ymd_and_hms(2026, 7, 19, 15, 42, 9).unwrap();
        let anchor = utc_month_anchor(at);
        assert_eq!(anchor, Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_same_month_is_not_new() {
        let start = Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 7, 31, 23, 59, 59).unwrap();
        assert!(!is_new_utc_month(start, now));
    }

    #[test]
    fn test_next_month_is_new() {
        let start = Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 1).unwrap();
        assert!(is_new_utc_month(start, now));
    }

    #[test]
    fn test_year_rollover_is_new_month() {
        let start = Utc.with_ymd_and_hms(2025, 12, 15, 12, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
        assert!(is_new_utc_month(start, now));
    }

    #[test]
    fn test_same_month_different_year_is_new() {
        let start = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap();
        assert!(is_new_utc_month(start, now));
    }
}
