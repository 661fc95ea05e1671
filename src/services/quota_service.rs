/*!
 * AI Quota Service
 *
 * Enforces the per-clinic monthly AI summary quota. The limit is resolved
 * from the subscription plan by substring ("enterprise" wins over "pro",
 * anything else is the free tier), and the counter resets on the first call
 * in a new UTC month before the precheck runs.
 */

use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::config::AiConfig;
use crate::models::{is_new_utc_month, utc_month_anchor, Clinic};
use crate::utils::{AppError, Result};

#[derive(Debug, Clone)]
pub struct QuotaService {
    quota_free: i32,
    quota_pro: i32,
    quota_enterprise: i32,
}

impl QuotaService {
    pub fn new(config: &AiConfig) -> Self {
        Self {
            quota_free: config.quota_free,
            quota_pro: config.quota_pro,
            quota_enterprise: config.quota_enterprise,
        }
    }

    /// Resolve the monthly limit for a plan name
    ///
    /// Plan names are free-form strings; matching is by substring so
    /// "pro-annual" and "Enterprise 2026" land on the right tier.
    pub fn monthly_limit(&self, plan: &str) -> i32 {
        let plan = plan.to_lowercase();
        if plan.contains("enterprise") {
            self.quota_enterprise
        } else if plan.contains("pro") {
            self.quota_pro
        } else {
            self.quota_free
        }
    }

    /// Check the clinic's quota before accepting a new AI call
    ///
    /// Locks the clinic row, rolls the billing period forward when a new UTC
    /// month has started, and rejects with `QuotaExceeded` when the counter
    /// has reached the plan limit. Returns the resolved limit on success.
    pub async fn precheck(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        clinic_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<i32> {
        let clinic = Clinic::find_for_update(&mut **tx, clinic_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Clinic not found".to_string()))?;

        let limit = self.monthly_limit(&clinic.subscription_plan);

        let current_count = if is_new_utc_month(clinic.billing_period_start, now) {
            Clinic::reset_billing_period(&mut **tx, clinic_id, utc_month_anchor(now)).await?;
            0
        } else {
            clinic.ai_call_count
        };

        if current_count >= limit {
            return Err(AppError::QuotaExceeded {
                monthly_limit: limit,
            });
        }

        Ok(limit)
    }
}
