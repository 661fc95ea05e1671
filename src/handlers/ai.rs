/*!
 * AI Pipeline HTTP Handlers
 *
 * Summary job submission, job status, the SSE push stream, persisted
 * summary reads, and the synchronous RAG chat. The stream endpoint is the
 * only place a query-string token is accepted, because browser
 * EventSource clients cannot set headers.
 */

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Extension, Json,
};
use futures::stream::Stream;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    db::bind_clinic,
    handlers::auth::AppState,
    models::{AiSummary, AuthPrincipal, Patient},
    services::{
        anonymizer::anonymize, job_channel, AiJobPayload, JobEvent, JobRecord, JobState,
    },
    utils::{AppError, Result},
};

/// Hard wall clock for one push-stream connection
const STREAM_MAX_SECS: u64 = 120;
/// Heartbeat cadence; keeps intermediaries from idle-closing the socket
const HEARTBEAT_SECS: u64 = 15;

/// Submit a summary generation job
///
/// POST /ai/generate-summary/:patientId
///
/// Quota precheck and counter increment happen before the enqueue; a failed
/// enqueue can leave the counter over-counted, which the accounting model
/// tolerates (the reverse would not be).
pub async fn generate_summary(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
    Path(patient_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let mut tx = state.pool.begin().await?;
    bind_clinic(&mut tx, principal.clinic_id).await?;

    Patient::find_by_id(&mut *tx, patient_id, principal.clinic_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Patient not found".to_string()))?;

    state
        .quota
        .precheck(&mut tx, principal.clinic_id, chrono::Utc::now())
        .await?;

    crate::models::Clinic::increment_ai_calls(&mut *tx, principal.clinic_id).await?;
    tx.commit().await?;

    let job_id = state
        .queue
        .enqueue(AiJobPayload {
            clinic_id: principal.clinic_id,
            patient_id,
            user_id: principal.id,
        })
        .await?;

    tracing::info!(
        "AI summary job {} queued for patient {} by {}",
        job_id,
        patient_id,
        principal.id
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "jobId": job_id, "status": "queued" })),
    ))
}

/// Load a job and hide jobs belonging to other clinics
async fn load_clinic_job(
    state: &AppState,
    principal: &AuthPrincipal,
    job_id: Uuid,
) -> Result<JobRecord> {
    let job = state
        .queue
        .get_job(job_id)
        .await?
        .filter(|job| job.clinic_id == principal.clinic_id)
        .ok_or_else(|| AppError::NotFound("Job not found".to_string()))?;
    Ok(job)
}

/// Poll a job's state
///
/// GET /ai/jobs/:jobId
pub async fn get_job_status(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let job = load_clinic_job(&state, &principal, job_id).await?;

    Ok(Json(json!({
        "state": job.state,
        "summaryId": job.summary_id,
        "failedReason": job.failed_reason,
    })))
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    token: Option<String>,
}

/// Resolve the stream principal from header or query token
fn stream_principal(
    state: &AppState,
    headers: &HeaderMap,
    query: &StreamQuery,
) -> Result<AuthPrincipal> {
    let header_token = headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    let token = header_token
        .or(query.token.as_deref())
        .ok_or_else(|| AppError::Unauthorized("Missing token".to_string()))?;

    let principal = state.auth_service.jwt().validate_token(token)?;
    if !principal.is_staff() {
        return Err(AppError::Forbidden("Staff access required".to_string()));
    }
    Ok(principal)
}

fn sse_event(event: &JobEvent) -> Event {
    Event::default().data(serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string()))
}

/// Live job progress as a server-sent event stream
///
/// GET /ai/stream/:jobId?token=
///
/// Emits the current state immediately. If the job is already terminal that
/// single event is all the client gets; otherwise events are forwarded from
/// the job channel until a terminal event, client disconnect, or the
/// two-minute cap, which emits `{"state":"timeout"}`. After the stream has
/// started, errors never become HTTP error frames; the stream just ends
/// with a terminal JSON event.
pub async fn stream_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let principal = stream_principal(&state, &headers, &query)?;
    let job = load_clinic_job(&state, &principal, job_id).await?;

    let (sender, receiver) = mpsc::channel::<Event>(16);

    tokio::spawn(async move {
        // Current state first; a terminal state ends the stream immediately
        let initial = job.to_event();
        let initial_terminal = initial.state.is_terminal();
        if sender.send(sse_event(&initial)).await.is_err() || initial_terminal {
            return;
        }

        let mut pubsub = match state.redis_client.get_async_pubsub().await {
            Ok(pubsub) => pubsub,
            Err(e) => {
                tracing::error!("Stream subscription failed for job {}: {}", job_id, e);
                let _ = sender
                    .send(sse_event(&JobEvent::failed("event stream unavailable")))
                    .await;
                return;
            }
        };
        if let Err(e) = pubsub.subscribe(job_channel(job_id)).await {
            tracing::error!("Stream subscribe failed for job {}: {}", job_id, e);
            let _ = sender
                .send(sse_event(&JobEvent::failed("event stream unavailable")))
                .await;
            return;
        }

        let deadline = tokio::time::Instant::now() + Duration::from_secs(STREAM_MAX_SECS);
        let mut messages = pubsub.on_message();

        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    let _ = sender
                        .send(sse_event(&JobEvent::state_only(JobState::Timeout)))
                        .await;
                    break;
                }
                maybe_msg = messages.next() => {
                    let Some(msg) = maybe_msg else { break };
                    let Ok(payload) = msg.get_payload::<String>() else { continue };

                    let terminal = serde_json::from_str::<JobEvent>(&payload)
                        .map(|e| e.state.is_terminal())
                        .unwrap_or(false);

                    if sender.send(Event::default().data(payload)).await.is_err() {
                        // Client went away; dropping the subscriber cleans up
                        break;
                    }
                    if terminal {
                        break;
                    }
                }
            }
        }
    });

    let stream = futures::stream::unfold(receiver, |mut receiver| async move {
        receiver
            .recv()
            .await
            .map(|event| (Ok::<_, Infallible>(event), receiver))
    });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(HEARTBEAT_SECS))
            .text("heartbeat"),
    ))
}

/// List a patient's summaries, newest first
///
/// GET /ai/summaries/patient/:patientId
pub async fn list_summaries(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
    Path(patient_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let mut tx = state.pool.begin().await?;
    bind_clinic(&mut tx, principal.clinic_id).await?;

    Patient::find_by_id(&mut *tx, patient_id, principal.clinic_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Patient not found".to_string()))?;

    let summaries = AiSummary::list_for_patient(&mut *tx, patient_id).await?;
    tx.commit().await?;

    Ok(Json(summaries))
}

/// Fetch one summary
///
/// GET /ai/summaries/:summaryId
pub async fn get_summary(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
    Path(summary_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let mut tx = state.pool.begin().await?;
    bind_clinic(&mut tx, principal.clinic_id).await?;

    let summary = AiSummary::find_by_id(&mut *tx, summary_id, principal.clinic_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Summary not found".to_string()))?;

    tx.commit().await?;

    Ok(Json(summary))
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// Context-grounded chat about one patient
///
/// POST /ai/chat/:patientId
///
/// Synchronous variant of the pipeline: same anonymized context, same quota
/// rules, no queue. Provider failures produce the deterministic context
/// answer rather than an error.
pub async fn chat(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthPrincipal>,
    Path(patient_id): Path<Uuid>,
    Json(req): Json<ChatRequest>,
) -> Result<impl IntoResponse> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(AppError::validation("message must not be empty"));
    }
    if message.len() > 2000 {
        return Err(AppError::validation("message must be at most 2000 characters"));
    }

    let mut tx = state.pool.begin().await?;
    bind_clinic(&mut tx, principal.clinic_id).await?;

    let patient = Patient::find_by_id(&mut *tx, patient_id, principal.clinic_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Patient not found".to_string()))?;

    state
        .quota
        .precheck(&mut tx, principal.clinic_id, chrono::Utc::now())
        .await?;
    crate::models::Clinic::increment_ai_calls(&mut *tx, principal.clinic_id).await?;

    let input = state.structured_input.get_or_build(&mut tx, &patient).await?;
    tx.commit().await?;

    let anonymized = anonymize(&input);
    let answer = state.llm.answer_question(&anonymized, message).await;

    Ok(Json(json!({ "answer": answer })))
}
