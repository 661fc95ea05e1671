/*!
 * Services Module
 *
 * Contains business logic and service layer implementations.
 */

pub mod ai_queue;
pub mod analytics;
pub mod anonymizer;
pub mod audit_service;
pub mod auth_service;
pub mod job_events;
pub mod jwt_service;
pub mod llm_service;
pub mod quota_service;
pub mod structured_input;

pub use ai_queue::{
    build_risk_flags, spawn_ai_workers, AiJobPayload, AiJobQueue, AiWorkerContext, JobRecord,
    QUEUE_NAME,
};
pub use audit_service::AuditService;
pub use auth_service::{
    AuthService, ChangePasswordRequest, InviteResponse, LoginRequest, PatientLoginResponse,
    PatientSetupRequest, RegisterClinicRequest, RegisterClinicResponse, StaffLoginResponse,
};
pub use job_events::{job_channel, JobEvent, JobEventBus, JobState};
pub use jwt_service::{Claims, JwtService};
pub use llm_service::{render_fallback_summary, LlmService, SUMMARY_SECTIONS};
pub use quota_service::QuotaService;
pub use structured_input::{StructuredInput, StructuredInputService};
