/*!
 * JWT Authentication Middleware
 *
 * Validates bearer tokens and adds the authenticated principal to request
 * extensions. Role guards layer on top for staff-, admin-, and
 * patient-scoped route groups. Query-string tokens are accepted only by the
 * push-stream endpoint, which performs its own verification.
 */

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::{
    handlers::auth::AppState,
    models::{AuthPrincipal, Role},
    utils::AppError,
};

/// Extract and validate the bearer token, then attach the principal
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(header) if header.starts_with("Bearer ") => &header[7..],
        _ => {
            return Err(AppError::Unauthorized(
                "Missing or invalid authorization header".to_string(),
            ));
        }
    };

    let principal = state.auth_service.jwt().validate_token(token)?;

    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}

/// Reject principals that are not clinic staff
pub async fn require_staff(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    let principal = req
        .extensions()
        .get::<AuthPrincipal>()
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

    if !principal.is_staff() {
        return Err(AppError::Forbidden(
            "Staff access required".to_string(),
        ));
    }

    Ok(next.run(req).await)
}

/// Reject principals that are not portal patients
pub async fn require_patient(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    let principal = req
        .extensions()
        .get::<AuthPrincipal>()
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

    if principal.role != Role::Patient {
        return Err(AppError::Forbidden(
            "Patient portal access required".to_string(),
        ));
    }

    Ok(next.run(req).await)
}
