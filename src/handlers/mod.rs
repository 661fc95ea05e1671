/*!
 * HTTP Handlers Module
 *
 * Contains HTTP request handlers for all endpoints.
 */

pub mod ai;
pub mod analytics;
pub mod audit_logs;
pub mod auth;
pub mod consultations;
pub mod labs;
pub mod patients;
pub mod portal;
pub mod users;
pub mod vitals;

pub use auth::AppState;
