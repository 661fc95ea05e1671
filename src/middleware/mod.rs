/*!
 * Middleware Module
 *
 * Authentication, rate limiting, CORS, and scheme enforcement.
 */

pub mod auth;
pub mod cors;
pub mod rate_limit;
pub mod scheme;

pub use auth::{jwt_auth_middleware, require_patient, require_staff};
pub use cors::cors_layer;
pub use rate_limit::{rate_limit_middleware, RateLimitLayer};
pub use scheme::enforce_https;
