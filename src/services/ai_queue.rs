/*!
 * AI Summary Queue & Worker Pool
 *
 * Redis-backed durable queue for summary generation jobs. Jobs carry only
 * `{clinicId, patientId, userId}`; workers re-read fresh patient data under
 * the job's clinic binding. Each job gets two attempts; terminal job records
 * are kept for a retention window so late stream subscribers can still
 * recover the outcome.
 */

use std::collections::HashMap;
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::bind_clinic;
use crate::models::{AiSummary, EntityType, Patient, RiskFlags};
use crate::services::analytics::{latest_z_against_baseline, CONCERNING_SYMPTOM_RE};
use crate::services::anonymizer::anonymize;
use crate::services::structured_input::{StructuredInput, StructuredInputService};
use crate::services::{AuditService, JobEvent, JobEventBus, JobState, LlmService};
use crate::utils::{AppError, Result};

/// Queue name, kept stable so operators can inspect it
pub const QUEUE_NAME: &str = "ai-summary-generation";

const PENDING_LIST: &str = "ai:queue:ai-summary-generation";
/// Submissions that cannot reach the queue within this window fail `unavailable`
const ENQUEUE_TIMEOUT_MS: u64 = 2500;
/// Worker blocking-pop patience; bounds shutdown latency, not throughput
const POP_TIMEOUT_SECS: f64 = 5.0;
/// Attempts per job (initial + one retry)
const MAX_ATTEMPTS: u32 = 2;
/// Terminal job records survive this long for late subscribers
const TERMINAL_RETENTION_SECS: i64 = 24 * 3600;
/// Z-score threshold for deterministic risk flags
const FLAG_Z_THRESHOLD: f64 = 2.0;

fn job_key(job_id: Uuid) -> String {
    format!("ai:job:{}", job_id)
}

/// Payload submitted to the queue
#[derive(Debug, Clone, Copy)]
pub struct AiJobPayload {
    pub clinic_id: Uuid,
    pub patient_id: Uuid,
    pub user_id: Uuid,
}

/// Stored job record
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub patient_id: Uuid,
    pub user_id: Uuid,
    pub state: JobState,
    pub attempts: u32,
    pub summary_id: Option<Uuid>,
    pub failed_reason: Option<String>,
}

impl JobRecord {
    /// Current state as a stream event
    pub fn to_event(&self) -> JobEvent {
        JobEvent {
            state: self.state,
            summary_id: self.summary_id,
            failed_reason: self.failed_reason.clone(),
        }
    }

    fn from_hash(id: Uuid, hash: HashMap<String, String>) -> Option<Self> {
        Some(Self {
            id,
            clinic_id: hash.get("clinic_id")?.parse().ok()?,
            patient_id: hash.get("patient_id")?.parse().ok()?,
            user_id: hash.get("user_id")?.parse().ok()?,
            state: JobState::parse(hash.get("state")?)?,
            attempts: hash.get("attempts")?.parse().ok()?,
            summary_id: hash.get("summary_id").and_then(|s| s.parse().ok()),
            failed_reason: hash.get("failed_reason").cloned().filter(|s| !s.is_empty()),
        })
    }
}

/// Durable job queue handle
#[derive(Clone)]
pub struct AiJobQueue {
    redis: ConnectionManager,
}

impl AiJobQueue {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    /// Enqueue a summary job
    ///
    /// The job record and the queue push are bounded together by a short
    /// timeout; a Redis outage surfaces as `unavailable` rather than a
    /// hanging request.
    pub async fn enqueue(&self, payload: AiJobPayload) -> Result<Uuid> {
        let job_id = Uuid::new_v4();
        let mut conn = self.redis.clone();

        let write = async {
            let fields = [
                ("clinic_id", payload.clinic_id.to_string()),
                ("patient_id", payload.patient_id.to_string()),
                ("user_id", payload.user_id.to_string()),
                ("state", JobState::Queued.to_string()),
                ("attempts", "0".to_string()),
                ("created_at", chrono::Utc::now().to_rfc3339()),
            ];
            conn.hset_multiple::<_, _, _, ()>(job_key(job_id), &fields)
                .await?;
            conn.lpush::<_, _, ()>(PENDING_LIST, job_id.to_string()).await?;
            Ok::<_, redis::RedisError>(())
        };

        match tokio::time::timeout(Duration::from_millis(ENQUEUE_TIMEOUT_MS), write).await {
            Ok(Ok(())) => Ok(job_id),
            Ok(Err(e)) => {
                tracing::error!("Failed to enqueue AI job: {}", e);
                Err(AppError::Unavailable("Job queue is unavailable".to_string()))
            }
            Err(_) => {
                tracing::error!("AI job enqueue timed out after {}ms", ENQUEUE_TIMEOUT_MS);
                Err(AppError::Unavailable("Job queue is unavailable".to_string()))
            }
        }
    }

    /// Load a job record
    pub async fn get_job(&self, job_id: Uuid) -> Result<Option<JobRecord>> {
        let mut conn = self.redis.clone();
        let hash: HashMap<String, String> = conn.hgetall(job_key(job_id)).await.map_err(|e| {
            tracing::error!("Failed to read AI job {}: {}", job_id, e);
            AppError::Unavailable("Job queue is unavailable".to_string())
        })?;

        if hash.is_empty() {
            return Ok(None);
        }

        Ok(JobRecord::from_hash(job_id, hash))
    }

    async fn set_state(&self, job_id: Uuid, state: JobState) -> Result<()> {
        let mut conn = self.redis.clone();
        conn.hset::<_, _, _, ()>(job_key(job_id), "state", state.to_string())
            .await
            .map_err(|e| {
                tracing::error!("Failed to update AI job {} state: {}", job_id, e);
                AppError::Unavailable("Job queue is unavailable".to_string())
            })?;
        Ok(())
    }

    async fn mark_completed(&self, job_id: Uuid, summary_id: Uuid) -> Result<()> {
        let mut conn = self.redis.clone();
        let fields = [
            ("state", JobState::Completed.to_string()),
            ("summary_id", summary_id.to_string()),
        ];
        conn.hset_multiple::<_, _, _, ()>(job_key(job_id), &fields)
            .await
            .map_err(|e| {
                tracing::error!("Failed to complete AI job {}: {}", job_id, e);
                AppError::Unavailable("Job queue is unavailable".to_string())
            })?;
        let _ = conn
            .expire::<_, ()>(job_key(job_id), TERMINAL_RETENTION_SECS)
            .await;
        Ok(())
    }

    async fn mark_failed(&self, job_id: Uuid, reason: &str) -> Result<()> {
        let mut conn = self.redis.clone();
        let fields = [
            ("state", JobState::Failed.to_string()),
            ("failed_reason", reason.to_string()),
        ];
        conn.hset_multiple::<_, _, _, ()>(job_key(job_id), &fields)
            .await
            .map_err(|e| {
                tracing::error!("Failed to fail AI job {}: {}", job_id, e);
                AppError::Unavailable("Job queue is unavailable".to_string())
            })?;
        let _ = conn
            .expire::<_, ()>(job_key(job_id), TERMINAL_RETENTION_SECS)
            .await;
        Ok(())
    }

    async fn requeue(&self, job_id: Uuid, attempts: u32) -> Result<()> {
        let mut conn = self.redis.clone();
        let fields = [
            ("state", JobState::Waiting.to_string()),
            ("attempts", attempts.to_string()),
        ];
        conn.hset_multiple::<_, _, _, ()>(job_key(job_id), &fields)
            .await
            .map_err(|e| {
                tracing::error!("Failed to requeue AI job {}: {}", job_id, e);
                AppError::Unavailable("Job queue is unavailable".to_string())
            })?;
        conn.lpush::<_, _, ()>(PENDING_LIST, job_id.to_string())
            .await
            .map_err(|e| {
                tracing::error!("Failed to push requeued AI job {}: {}", job_id, e);
                AppError::Unavailable("Job queue is unavailable".to_string())
            })?;
        Ok(())
    }

    /// Blocking-pop the next job id, or None on timeout
    async fn pop_next(&self) -> Option<Uuid> {
        let mut conn = self.redis.clone();
        let popped: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(PENDING_LIST)
            .arg(POP_TIMEOUT_SECS)
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                tracing::warn!("AI queue pop failed: {}", e);
                e
            })
            .ok()
            .flatten();

        popped.and_then(|(_, raw)| raw.parse().ok())
    }
}

/// Build deterministic risk flags from the structured input
///
/// Each trend flag is raised when the latest value deviates from the
/// patient's prior baseline by at least two standard deviations (either
/// direction for weight, upward for the rest). Trends arrive most-recent
/// first and are reversed into chronological order for the baseline.
pub fn build_risk_flags(input: &StructuredInput) -> RiskFlags {
    let chronological = |trend: &[f64]| -> Vec<f64> {
        let mut t: Vec<f64> = trend.to_vec();
        t.reverse();
        t
    };

    let rising = |trend: &[f64]| -> bool {
        latest_z_against_baseline(&chronological(trend))
            .map(|z| z >= FLAG_Z_THRESHOLD)
            .unwrap_or(false)
    };

    let shifted = |trend: &[f64]| -> bool {
        latest_z_against_baseline(&chronological(trend))
            .map(|z| z.abs() >= FLAG_Z_THRESHOLD)
            .unwrap_or(false)
    };

    let concerning_symptoms: Vec<String> = input
        .recent_symptoms
        .iter()
        .filter(|s| CONCERNING_SYMPTOM_RE.is_match(s))
        .cloned()
        .collect();

    RiskFlags {
        high_blood_pressure_trend: rising(&input.bp_trend),
        rising_glucose_trend: rising(&input.glucose_trend),
        tachycardia_trend: rising(&input.heart_rate_trend),
        rapid_weight_change: shifted(&input.weight_trend),
        concerning_symptoms,
        ..RiskFlags::default()
    }
}

/// Everything a worker needs to process jobs
#[derive(Clone)]
pub struct AiWorkerContext {
    pub pool: PgPool,
    pub queue: AiJobQueue,
    pub events: JobEventBus,
    pub structured_input: StructuredInputService,
    pub llm: LlmService,
}

/// Spawn the AI worker pool as background tasks
pub fn spawn_ai_workers(ctx: AiWorkerContext, concurrency: usize) {
    for worker_id in 0..concurrency {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            tracing::info!("AI worker {} started", worker_id);
            loop {
                let Some(job_id) = ctx.queue.pop_next().await else {
                    continue;
                };
                process_job(&ctx, job_id).await;
            }
        });
    }
}

/// Run one job to a terminal or retry state
async fn process_job(ctx: &AiWorkerContext, job_id: Uuid) {
    let job = match ctx.queue.get_job(job_id).await {
        Ok(Some(job)) => job,
        Ok(None) => {
            tracing::warn!("Popped unknown AI job {}", job_id);
            return;
        }
        Err(e) => {
            tracing::error!("Failed to load AI job {}: {}", job_id, e);
            return;
        }
    };

    if ctx.queue.set_state(job_id, JobState::Active).await.is_ok() {
        ctx.events
            .publish(job_id, &JobEvent::state_only(JobState::Active))
            .await;
    }

    match generate_summary(ctx, &job).await {
        Ok(summary_id) => {
            if let Err(e) = ctx.queue.mark_completed(job_id, summary_id).await {
                tracing::error!("Failed to persist completion of AI job {}: {}", job_id, e);
            }
            ctx.events.publish(job_id, &JobEvent::completed(summary_id)).await;
            tracing::info!("AI job {} completed with summary {}", job_id, summary_id);
        }
        Err(e) => {
            let attempts = job.attempts + 1;
            let reason = e.to_string();
            tracing::warn!(
                "AI job {} attempt {}/{} failed: {}",
                job_id,
                attempts,
                MAX_ATTEMPTS,
                reason
            );

            if attempts < MAX_ATTEMPTS {
                if ctx.queue.requeue(job_id, attempts).await.is_ok() {
                    ctx.events
                        .publish(job_id, &JobEvent::state_only(JobState::Waiting))
                        .await;
                }
            } else {
                if let Err(e) = ctx.queue.mark_failed(job_id, &reason).await {
                    tracing::error!("Failed to persist failure of AI job {}: {}", job_id, e);
                }
                ctx.events.publish(job_id, &JobEvent::failed(reason)).await;
            }
        }
    }
}

/// The generation step: structured input, risk flags, summary text,
/// persistence, audit. Runs under the job's clinic binding so row-level
/// policies hold in the worker exactly as they do in request handlers.
async fn generate_summary(ctx: &AiWorkerContext, job: &JobRecord) -> Result<Uuid> {
    let mut tx = ctx.pool.begin().await?;
    bind_clinic(&mut tx, job.clinic_id).await?;

    let patient = Patient::find_by_id(&mut *tx, job.patient_id, job.clinic_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Patient not found".to_string()))?;

    let input = ctx.structured_input.get_or_build(&mut tx, &patient).await?;
    let flags = build_risk_flags(&input);

    // Anonymize before anything leaves the process; the fallback path uses
    // the same de-identified input for symmetry.
    let anonymized = anonymize(&input);
    let summary_text = ctx.llm.generate_summary(&anonymized, &flags).await;

    let summary = AiSummary::create(&mut *tx, patient.id, &summary_text, &flags).await?;

    AuditService::record(
        &mut *tx,
        job.user_id,
        "AI_SUMMARY_GENERATE",
        EntityType::AiSummary,
        Some(summary.id),
    )
    .await?;

    tx.commit().await?;

    Ok(summary.id)
}
