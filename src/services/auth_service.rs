/*!
 * Authentication Service
 *
 * Clinic registration, staff and patient login, invite-based patient
 * onboarding, and password rotation. Login failures are uniform: unknown
 * email and wrong password produce the same message, and a dummy bcrypt
 * verification runs when the lookup misses so the two cases cannot be
 * distinguished by timing.
 */

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::config::JwtConfig;
use crate::db::bind_auth_flow;
use crate::models::{
    Clinic, ClinicDto, EntityType, Patient, PatientDto, Role, User, UserDto,
};
use crate::services::{AuditService, JwtService};
use crate::utils::{AppError, PasswordHasherUtil, Result};

/// Invite validity window
const INVITE_TTL_HOURS: i64 = 72;

/// Clinic registration request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterClinicRequest {
    #[validate(length(min = 1, max = 200, message = "Clinic name must be 1-200 characters"))]
    pub clinic_name: String,
    #[validate(email(message = "Invalid clinic email address"))]
    pub clinic_email: String,
    #[validate(length(max = 50, message = "Subscription plan must be at most 50 characters"))]
    pub subscription_plan: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Admin name must be 1-100 characters"))]
    pub admin_name: String,
    #[validate(email(message = "Invalid admin email address"))]
    pub admin_email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

/// Staff or patient login request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Invite-based patient portal setup request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PatientSetupRequest {
    pub invite_token: Uuid,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

/// Password rotation request (staff or portal)
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(length(min = 8, message = "New password must be at least 8 characters"))]
    pub new_password: String,
}

/// Registration response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterClinicResponse {
    pub token: String,
    pub user: UserDto,
    pub clinic: ClinicDto,
}

/// Staff login response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffLoginResponse {
    pub token: String,
    pub user: UserDto,
}

/// Patient login/setup response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientLoginResponse {
    pub token: String,
    pub patient: PatientDto,
}

/// Invite creation response; the token is returned once and never listed
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteResponse {
    pub invite_token: Uuid,
    pub invite_expires_at: chrono::DateTime<Utc>,
    pub patient_name: String,
}

const GENERIC_LOGIN_ERROR: &str = "Invalid email or password";

fn conflict_on_unique(err: sqlx::Error, message: &str) -> AppError {
    if err
        .as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
    {
        AppError::Conflict(message.to_string())
    } else {
        AppError::from(err)
    }
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    jwt_service: JwtService,
}

impl AuthService {
    pub fn new(jwt_config: JwtConfig) -> Self {
        Self {
            jwt_service: JwtService::new(jwt_config),
        }
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt_service
    }

    /// Register a clinic with its first administrator
    ///
    /// Clinic, admin user, and the audit record are created in a single
    /// transaction, so a half-registered clinic can never exist.
    pub async fn register_clinic(
        &self,
        pool: &PgPool,
        req: RegisterClinicRequest,
    ) -> Result<RegisterClinicResponse> {
        req.validate().map_err(AppError::from_validation_errors)?;

        let password_hash = PasswordHasherUtil::hash_password(&req.password)?;
        let plan = req.subscription_plan.as_deref().unwrap_or("free");

        let mut tx = pool.begin().await?;
        bind_auth_flow(&mut tx).await?;

        let clinic = Clinic::create(&mut *tx, &req.clinic_name, &req.clinic_email, plan)
            .await
            .map_err(|e| conflict_on_unique(e, "A clinic with this email already exists"))?;

        let admin = User::create(
            &mut *tx,
            clinic.id,
            &req.admin_name,
            &req.admin_email,
            &password_hash,
            Role::Admin,
        )
        .await
        .map_err(|e| conflict_on_unique(e, "A user with this email already exists"))?;

        AuditService::record(
            &mut *tx,
            admin.id,
            "CLINIC_REGISTER",
            EntityType::Clinic,
            Some(clinic.id),
        )
        .await?;

        tx.commit().await?;

        let token = self
            .jwt_service
            .generate_token(&admin.id, &clinic.id, Role::Admin)?;

        tracing::info!("Registered clinic {} with admin {}", clinic.id, admin.id);

        Ok(RegisterClinicResponse {
            token,
            user: admin.into(),
            clinic: clinic.into(),
        })
    }

    /// Authenticate a staff user
    pub async fn staff_login(&self, pool: &PgPool, req: LoginRequest) -> Result<StaffLoginResponse> {
        req.validate().map_err(AppError::from_validation_errors)?;

        let mut tx = pool.begin().await?;
        bind_auth_flow(&mut tx).await?;

        let user = match User::find_by_email(&mut *tx, &req.email).await? {
            Some(user) => user,
            None => {
                // Same cost as a real verification
                PasswordHasherUtil::verify_dummy(&req.password);
                return Err(AppError::Unauthorized(GENERIC_LOGIN_ERROR.to_string()));
            }
        };

        if !PasswordHasherUtil::verify_password(&req.password, &user.password_hash) {
            return Err(AppError::Unauthorized(GENERIC_LOGIN_ERROR.to_string()));
        }

        AuditService::record(&mut *tx, user.id, "STAFF_LOGIN", EntityType::User, Some(user.id))
            .await?;
        tx.commit().await?;

        let token = self
            .jwt_service
            .generate_token(&user.id, &user.clinic_id, user.role)?;

        tracing::info!("Staff user {} logged in", user.id);

        Ok(StaffLoginResponse {
            token,
            user: user.into(),
        })
    }

    /// Create a portal invite for a patient
    ///
    /// Runs inside the caller's clinic-bound transaction. Fails with
    /// `conflict` when the patient already has portal credentials.
    pub async fn create_patient_invite(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        caller_id: Uuid,
        clinic_id: Uuid,
        patient_id: Uuid,
    ) -> Result<InviteResponse> {
        let patient = Patient::find_by_id(&mut **tx, patient_id, clinic_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Patient not found".to_string()))?;

        if patient.has_portal_access() {
            return Err(AppError::Conflict(
                "Patient already has portal credentials".to_string(),
            ));
        }

        let token = Uuid::new_v4();
        let expires_at = Utc::now() + Duration::hours(INVITE_TTL_HOURS);
        Patient::set_invite(&mut **tx, patient_id, clinic_id, token, expires_at).await?;

        AuditService::record(
            &mut **tx,
            caller_id,
            "PATIENT_INVITE_CREATE",
            EntityType::Patient,
            Some(patient_id),
        )
        .await?;

        Ok(InviteResponse {
            invite_token: token,
            invite_expires_at: expires_at,
            patient_name: format!("{} {}", patient.first_name, patient.last_name),
        })
    }

    /// Complete patient portal setup from an invite
    pub async fn patient_setup(
        &self,
        pool: &PgPool,
        req: PatientSetupRequest,
    ) -> Result<PatientLoginResponse> {
        req.validate().map_err(AppError::from_validation_errors)?;

        let password_hash = PasswordHasherUtil::hash_password(&req.password)?;

        let mut tx = pool.begin().await?;
        bind_auth_flow(&mut tx).await?;

        let patient = Patient::find_by_invite_token(&mut *tx, req.invite_token)
            .await?
            .ok_or_else(|| AppError::NotFound("Invite not found".to_string()))?;

        if patient.has_portal_access() {
            return Err(AppError::Conflict(
                "Portal access has already been set up".to_string(),
            ));
        }

        match patient.invite_expires_at {
            Some(expires_at) if expires_at > Utc::now() => {}
            _ => return Err(AppError::Gone("Invite has expired".to_string())),
        }

        let patient =
            Patient::complete_portal_setup(&mut *tx, patient.id, &req.email, &password_hash)
                .await
                .map_err(|e| conflict_on_unique(e, "A patient with this email already exists"))?;

        AuditService::record(
            &mut *tx,
            patient.id,
            "PATIENT_PORTAL_SETUP",
            EntityType::Patient,
            Some(patient.id),
        )
        .await?;

        tx.commit().await?;

        let token =
            self.jwt_service
                .generate_token(&patient.id, &patient.clinic_id, Role::Patient)?;

        tracing::info!("Patient {} completed portal setup", patient.id);

        Ok(PatientLoginResponse {
            token,
            patient: patient.into(),
        })
    }

    /// Authenticate a portal patient
    pub async fn patient_login(
        &self,
        pool: &PgPool,
        req: LoginRequest,
    ) -> Result<PatientLoginResponse> {
        req.validate().map_err(AppError::from_validation_errors)?;

        let mut tx = pool.begin().await?;
        bind_auth_flow(&mut tx).await?;

        let patient = match Patient::find_by_email(&mut *tx, &req.email).await? {
            Some(patient) => patient,
            None => {
                PasswordHasherUtil::verify_dummy(&req.password);
                return Err(AppError::Unauthorized(GENERIC_LOGIN_ERROR.to_string()));
            }
        };

        let Some(password_hash) = patient.password_hash.clone() else {
            PasswordHasherUtil::verify_dummy(&req.password);
            return Err(AppError::Unauthorized(GENERIC_LOGIN_ERROR.to_string()));
        };

        if !PasswordHasherUtil::verify_password(&req.password, &password_hash) {
            return Err(AppError::Unauthorized(GENERIC_LOGIN_ERROR.to_string()));
        }

        AuditService::record(
            &mut *tx,
            patient.id,
            "PATIENT_LOGIN",
            EntityType::Patient,
            Some(patient.id),
        )
        .await?;
        tx.commit().await?;

        let token =
            self.jwt_service
                .generate_token(&patient.id, &patient.clinic_id, Role::Patient)?;

        tracing::info!("Patient {} logged in", patient.id);

        Ok(PatientLoginResponse {
            token,
            patient: patient.into(),
        })
    }

    /// Rotate a portal patient's password, requiring the current one
    ///
    /// Runs inside the caller's clinic-bound transaction.
    pub async fn patient_change_password(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        patient_id: Uuid,
        clinic_id: Uuid,
        req: ChangePasswordRequest,
    ) -> Result<()> {
        req.validate().map_err(AppError::from_validation_errors)?;

        let patient = Patient::find_by_id(&mut **tx, patient_id, clinic_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Patient not found".to_string()))?;

        let Some(password_hash) = patient.password_hash else {
            return Err(AppError::Forbidden(
                "Portal access has not been set up".to_string(),
            ));
        };

        if !PasswordHasherUtil::verify_password(&req.current_password, &password_hash) {
            return Err(AppError::Unauthorized(
                "Current password is incorrect".to_string(),
            ));
        }

        let new_hash = PasswordHasherUtil::hash_password(&req.new_password)?;
        Patient::update_password(&mut **tx, patient_id, &new_hash).await?;

        AuditService::record(
            &mut **tx,
            patient_id,
            "PASSWORD_CHANGE",
            EntityType::Patient,
            Some(patient_id),
        )
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_validation() {
        let req = RegisterClinicRequest {
            clinic_name: "Aurora Health".to_string(),
            clinic_email: "not-an-email".to_string(),
            subscription_plan: None,
            admin_name: "Ana".to_string(),
            admin_email: "ana@aurora.example".to_string(),
            password: "pw12345!".to_string(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_register_request_short_password() {
        let req = RegisterClinicRequest {
            clinic_name: "Aurora Health".to_string(),
            clinic_email: "clinic@aurora.example".to_string(),
            subscription_plan: Some("pro".to_string()),
            admin_name: "Ana".to_string(),
            admin_email: "ana@aurora.example".to_string(),
            password: "short".to_string(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_login_request_validation() {
        let req = LoginRequest {
            email: "doctor@clinic.example".to_string(),
            password: "pw12345!".to_string(),
        };
        assert!(req.validate().is_ok());

        let req = LoginRequest {
            email: "doctor@clinic.example".to_string(),
            password: String::new(),
        };
        assert!(req.validate().is_err());
    }
}
