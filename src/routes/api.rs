/*!
 * API Routes
 *
 * Defines all API routes and their handlers. Route groups get their
 * middleware stacks here: bearer auth plus the staff or patient guard, with
 * per-IP rate limiting wrapped around everything.
 */

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::handlers::auth::AppState;
use crate::handlers::{ai, analytics, audit_logs, auth, consultations, labs, patients, portal, users, vitals};
use crate::middleware::auth::{jwt_auth_middleware, require_patient, require_staff};
use crate::middleware::rate_limit::{rate_limit_middleware, RateLimitLayer};

/// Request body cap
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Create the API router
///
/// # Arguments
///
/// * `state` - Application state containing pools and services
/// * `rate_limit` - Pre-built per-IP rate limiter tiers
pub fn create_routes(state: AppState, rate_limit: RateLimitLayer) -> Router {
    // Public identity routes (rate limited on the auth tier by path)
    let auth_routes = Router::new()
        .route("/register-clinic", post(auth::register_clinic_handler))
        .route("/login", post(auth::login_handler))
        .route("/patient-setup", post(auth::patient_setup_handler))
        .route("/patient-login", post(auth::patient_login_handler));

    // Staff routes - authenticated, ADMIN or DOCTOR
    let staff_routes = Router::new()
        .route("/users/me", get(users::me_handler))
        .route("/patients", post(patients::create_patient).get(patients::list_patients))
        .route(
            "/patients/{id}",
            get(patients::get_patient)
                .put(patients::update_patient)
                .delete(patients::delete_patient),
        )
        .route("/patients/{id}/invite", post(patients::create_patient_invite))
        .route("/vitals", post(vitals::create_vital))
        .route("/vitals/{patient_id}", get(vitals::list_vitals))
        .route("/labs", post(labs::create_lab))
        .route("/labs/{patient_id}", get(labs::list_labs))
        .route("/consultations", post(consultations::create_consultation))
        .route(
            "/consultations/{patient_id}",
            get(consultations::list_consultations),
        )
        .route("/analytics/patient/{patient_id}", get(analytics::patient_analytics))
        .route("/analytics/clinic-risk", get(analytics::clinic_risk))
        .route("/ai/generate-summary/{patient_id}", post(ai::generate_summary))
        .route("/ai/jobs/{job_id}", get(ai::get_job_status))
        .route("/ai/summaries/patient/{patient_id}", get(ai::list_summaries))
        .route("/ai/summaries/{summary_id}", get(ai::get_summary))
        .route("/ai/chat/{patient_id}", post(ai::chat))
        .route("/audit", get(audit_logs::list_audit_logs))
        .layer(middleware::from_fn(require_staff))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_middleware,
        ));

    // The push stream verifies its own token (query string permitted there
    // only), so it sits outside the bearer middleware
    let stream_routes = Router::new().route("/ai/stream/{job_id}", get(ai::stream_job));

    // Patient portal routes - authenticated, PATIENT role
    let portal_routes = Router::new()
        .route("/me", get(portal::get_profile).put(portal::update_profile))
        .route("/security", put(portal::update_security))
        .route("/vitals", get(portal::list_vitals))
        .route("/labs", get(portal::list_labs))
        .route("/analytics", get(portal::vitals_analytics))
        .route("/appointments", get(portal::list_appointments))
        .route("/summaries", get(portal::list_summaries))
        .layer(middleware::from_fn(require_patient))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_middleware,
        ));

    Router::new()
        .nest("/auth", auth_routes)
        .merge(staff_routes)
        .merge(stream_routes)
        .nest("/portal", portal_routes)
        .layer(middleware::from_fn_with_state(
            rate_limit,
            rate_limit_middleware,
        ))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}
