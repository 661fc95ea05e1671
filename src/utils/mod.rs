/*!
 * Utilities Module
 *
 * Contains utility functions for error handling, password hashing,
 * PHI scrubbing, and validation.
 */

pub mod errors;
pub mod password;
pub mod scrub;
pub mod validators;

pub use errors::{AppError, Result};
pub use password::PasswordHasherUtil;
pub use scrub::scrub_phi;
pub use validators::{parse_numeric_value, PhoneValidator};
