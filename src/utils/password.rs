/*!
 * Password Hashing Utilities
 *
 * Provides secure password hashing and verification using bcrypt at a work
 * factor of 12. Verification is constant-time within bcrypt itself, and the
 * login paths use `verify_dummy` when the account lookup misses so unknown
 * accounts and wrong passwords are indistinguishable in timing.
 */

use crate::utils::{AppError, Result};

/// bcrypt work factor for all stored credentials
pub const BCRYPT_COST: u32 = 12;

/// A valid bcrypt hash of an unguessable string, used to equalize timing on
/// failed account lookups. Never matches a real password.
const DUMMY_HASH: &str = "$2b$12$8S0EhgEzN9x8ZmNpuSgTmuOtRsMAhPmK1AZEeLq3Rt7vZ9a02J3La";

/// Password hasher for secure password operations
pub struct PasswordHasherUtil;

impl PasswordHasherUtil {
    /// Validate minimum password strength
    ///
    /// The API accepts any password of at least 8 characters; clinics set
    /// their own policy beyond that.
    pub fn validate_password(password: &str) -> Result<()> {
        if password.len() < 8 {
            return Err(AppError::validation(
                "Password must be at least 8 characters long",
            ));
        }
        if password.len() > 128 {
            return Err(AppError::validation(
                "Password must be at most 128 characters long",
            ));
        }
        Ok(())
    }

    /// Hash a password with bcrypt at cost 12
    ///
    /// # Errors
    ///
    /// Returns an error if hashing fails
    pub fn hash_password(password: &str) -> Result<String> {
        Ok(bcrypt::hash(password, BCRYPT_COST)?)
    }

    /// Verify a password against a stored hash
    ///
    /// Returns `false` on mismatch or on an unparsable hash; never errors to
    /// the caller so the failure mode is uniform.
    pub fn verify_password(password: &str, hash: &str) -> bool {
        match bcrypt::verify(password, hash) {
            Ok(matches) => matches,
            Err(e) => {
                tracing::error!("Failed to verify password hash: {:?}", e);
                false
            }
        }
    }

    /// Burn one bcrypt verification against a fixed dummy hash
    ///
    /// Called when a login lookup finds no account, so the request spends the
    /// same time as a real verification would.
    pub fn verify_dummy(password: &str) {
        let _ = bcrypt::verify(password, DUMMY_HASH);
    }
}
