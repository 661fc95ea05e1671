/*!
 * Data Models Module
 *
 * Contains database models and their associated operations.
 */

pub mod ai_summary;
pub mod audit_log;
pub mod clinic;
pub mod consultation;
pub mod lab;
pub mod patient;
pub mod user;
pub mod vital;

pub use ai_summary::{AiSummary, LatestSummaryRow, RiskFlags, AI_DISCLAIMER};
pub use audit_log::{AuditLog, AuditLogFilter, AuditLogPage, EntityType};
pub use clinic::{is_new_utc_month, utc_month_anchor, Clinic, ClinicDto};
pub use consultation::{
    Consultation, ConsultationPage, ConsultationWithDoctor, CreateConsultationRequest, DoctorRef,
};
pub use lab::{CreateLabRequest, LabResult};
pub use patient::{
    CreatePatientRequest, Gender, Patient, PatientDto, PatientPage, UpdatePatientRequest,
};
pub use user::{Role, User, UserDto};
pub use vital::{CreateVitalRequest, VitalRecord, VitalType};

/// Authenticated principal extracted from the bearer token.
/// Added as a request extension by the auth middleware.
#[derive(Debug, Clone, Copy)]
pub struct AuthPrincipal {
    pub id: uuid::Uuid,
    pub clinic_id: uuid::Uuid,
    pub role: Role,
}

impl AuthPrincipal {
    /// Staff principals (ADMIN or DOCTOR) may operate on clinic-wide data
    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }
}
