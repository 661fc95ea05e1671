/*!
 * Error Handling
 *
 * Defines application-wide error types and conversion implementations
 * for proper error handling and HTTP response mapping.
 *
 * Error bodies are `{message}` or, for validation failures, `{message,
 * errors}` with field-level details. Authentication and authorization
 * messages stay generic so responses cannot be used for user enumeration.
 */

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Debug)]
pub enum AppError {
    /// Database error
    Database(sqlx::Error),
    /// Schema validation error with optional field-level details
    Validation {
        message: String,
        errors: Option<serde_json::Value>,
    },
    /// Missing, invalid, or expired token
    Unauthorized(String),
    /// Role or tenant mismatch
    Forbidden(String),
    /// Entity absent or out of tenant
    NotFound(String),
    /// Uniqueness or state violation
    Conflict(String),
    /// Expired invite
    Gone(String),
    /// Per-IP limiter tripped
    RateLimited { retry_after_secs: u64 },
    /// Monthly AI quota exhausted; the limit is echoed to the caller
    QuotaExceeded { monthly_limit: i32 },
    /// Queue or LLM prerequisite down
    Unavailable(String),
    /// Unexpected failure
    Internal(String),
}

impl AppError {
    /// Shorthand for a validation error without field details
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            errors: None,
        }
    }

    /// Build a validation error from `validator` field errors
    pub fn from_validation_errors(errors: validator::ValidationErrors) -> Self {
        let fields: serde_json::Map<String, serde_json::Value> = errors
            .field_errors()
            .iter()
            .map(|(field, errs)| {
                let messages: Vec<String> = errs
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                (field.to_string(), json!(messages))
            })
            .collect();

        Self::Validation {
            message: "Validation failed".to_string(),
            errors: Some(serde_json::Value::Object(fields)),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database(err) => write!(f, "Database error: {}", err),
            Self::Validation { message, .. } => write!(f, "Validation error: {}", message),
            Self::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            Self::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            Self::NotFound(msg) => write!(f, "Not found: {}", msg),
            Self::Conflict(msg) => write!(f, "Conflict: {}", msg),
            Self::Gone(msg) => write!(f, "Gone: {}", msg),
            Self::RateLimited { .. } => write!(f, "Rate limit exceeded"),
            Self::QuotaExceeded { monthly_limit } => {
                write!(f, "Monthly AI quota of {} exceeded", monthly_limit)
            }
            Self::Unavailable(msg) => write!(f, "Service unavailable: {}", msg),
            Self::Internal(msg) => write!(f, "Internal server error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

/// Convert SQLx errors to AppError
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        Self::Database(err)
    }
}

/// Convert JWT errors to AppError
impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        tracing::warn!("JWT error: {:?}", err);
        Self::Unauthorized("Invalid or expired token".to_string())
    }
}

/// Convert bcrypt errors to AppError
impl From<bcrypt::BcryptError> for AppError {
    fn from(err: bcrypt::BcryptError) -> Self {
        tracing::error!("Password hash error: {:?}", err);
        Self::Internal("Password hashing error".to_string())
    }
}

/// Convert AppError to HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Database(ref err) => {
                // Internal database errors are never exposed to clients
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "message": "An internal error occurred" }),
                )
            }
            Self::Validation { message, errors } => {
                let body = match errors {
                    Some(errors) => json!({ "message": message, "errors": errors }),
                    None => json!({ "message": message }),
                };
                (StatusCode::BAD_REQUEST, body)
            }
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, json!({ "message": msg })),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "message": msg })),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "message": msg })),
            Self::Conflict(msg) => (StatusCode::CONFLICT, json!({ "message": msg })),
            Self::Gone(msg) => (StatusCode::GONE, json!({ "message": msg })),
            Self::RateLimited { retry_after_secs } => {
                let mut response = (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({ "message": "Too many requests, please try again later" })),
                )
                    .into_response();
                if let Ok(value) = retry_after_secs.to_string().parse() {
                    response.headers_mut().insert("Retry-After", value);
                }
                return response;
            }
            Self::QuotaExceeded { monthly_limit } => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({
                    "message": "Monthly AI summary quota exceeded for this subscription plan",
                    "monthlyLimit": monthly_limit,
                }),
            ),
            Self::Unavailable(msg) => {
                tracing::error!("Service unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    json!({ "message": "Service temporarily unavailable" }),
                )
            }
            Self::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "message": "An internal error occurred" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
