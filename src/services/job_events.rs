/*!
 * Job Event Bus
 *
 * Publishes AI job lifecycle events on a per-job Redis channel. Events are
 * plain JSON; subscribers (the push stream) forward them verbatim. At most
 * one terminal event is published per lifecycle, and publish failures are
 * logged and swallowed because the stream endpoint recovers terminal state
 * from the job store on connect.
 */

use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of an AI summary job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Waiting,
    Active,
    Delayed,
    Completed,
    Failed,
    Timeout,
}

impl JobState {
    /// Terminal states end the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed | JobState::Timeout)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "waiting" => Some(Self::Waiting),
            "active" => Some(Self::Active),
            "delayed" => Some(Self::Delayed),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "timeout" => Some(Self::Timeout),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Delayed => "delayed",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
        };
        write!(f, "{}", s)
    }
}

/// One job lifecycle event as sent to stream clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub state: JobState,
    pub summary_id: Option<Uuid>,
    pub failed_reason: Option<String>,
}

impl JobEvent {
    pub fn state_only(state: JobState) -> Self {
        Self {
            state,
            summary_id: None,
            failed_reason: None,
        }
    }

    pub fn completed(summary_id: Uuid) -> Self {
        Self {
            state: JobState::Completed,
            summary_id: Some(summary_id),
            failed_reason: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            state: JobState::Failed,
            summary_id: None,
            failed_reason: Some(reason.into()),
        }
    }
}

/// Channel name for one job's events
pub fn job_channel(job_id: Uuid) -> String {
    format!("ai:job-events:{}", job_id)
}

/// Event bus handle
#[derive(Clone)]
pub struct JobEventBus {
    redis: ConnectionManager,
}

impl JobEventBus {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    /// Publish an event for a job; failures are logged and swallowed
    pub async fn publish(&self, job_id: Uuid, event: &JobEvent) {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Failed to serialize job event for {}: {}", job_id, e);
                return;
            }
        };

        let mut conn = self.redis.clone();
        if let Err(e) = redis::cmd("PUBLISH")
            .arg(job_channel(job_id))
            .arg(&payload)
            .query_async::<i64>(&mut conn)
            .await
        {
            tracing::warn!("Failed to publish job event for {}: {}", job_id, e);
        }
    }
}
