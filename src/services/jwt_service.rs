/*!
 * JWT Service
 *
 * Handles bearer token generation and validation. Uses HS256 with a pinned
 * algorithm list; tokens carry the principal id, clinic id, and role so the
 * tenant binder never touches the database to establish context.
 */

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::models::{AuthPrincipal, Role};
use crate::utils::{AppError, Result};

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (staff user id or patient id)
    pub sub: String,
    /// Tenant the principal belongs to
    #[serde(rename = "clinicId")]
    pub clinic_id: String,
    /// Principal role
    pub role: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// JWT ID - unique identifier for this token
    pub jti: String,
}

/// JWT service for token operations
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
}

impl JwtService {
    /// Create a new JWT service instance
    pub fn new(config: JwtConfig) -> Self {
        Self { config }
    }

    /// Generate a bearer token for a principal
    ///
    /// # Errors
    ///
    /// Returns an error if token generation fails
    pub fn generate_token(&self, id: &Uuid, clinic_id: &Uuid, role: Role) -> Result<String> {
        let now = Utc::now();
        let expiry = now + Duration::seconds(self.config.expires_in);

        let claims = Claims {
            sub: id.to_string(),
            clinic_id: clinic_id.to_string(),
            role: role.to_string(),
            iat: now.timestamp(),
            exp: expiry.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.secret().as_bytes()),
        )?;

        Ok(token)
    }

    /// Validate a bearer token and resolve the principal
    ///
    /// Only HS256 is accepted; a token signed with any other algorithm is
    /// rejected before signature verification.
    ///
    /// # Errors
    ///
    /// Returns Unauthorized if the token is invalid, expired, or malformed
    pub fn validate_token(&self, token: &str) -> Result<AuthPrincipal> {
        let validation = Validation::new(Algorithm::HS256);

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.secret().as_bytes()),
            &validation,
        )
        .map_err(|e| {
            tracing::warn!("Invalid bearer token: {:?}", e);
            AppError::Unauthorized("Invalid or expired token".to_string())
        })?;

        let claims = token_data.claims;

        let id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;
        let clinic_id = Uuid::parse_str(&claims.clinic_id)
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;
        let role = Role::parse(&claims.role)
            .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".to_string()))?;

        Ok(AuthPrincipal {
            id,
            clinic_id,
            role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_jwt_service() -> JwtService {
        JwtService::new(crate::config::JwtConfig::new(
            "test_secret_key_minimum_32_characters_long",
            3600,
        ))
    }

    #[test]
    fn test_generate_and_validate_token() {
        let service = test_jwt_service();
        let id = Uuid::new_v4();
        let clinic_id = Uuid::new_v4();

        let token = service.generate_token(&id, &clinic_id, Role::Doctor).unwrap();
        let principal = service.validate_token(&token).unwrap();

        assert_eq!(principal.id, id);
        assert_eq!(principal.clinic_id, clinic_id);
        assert_eq!(principal.role, Role::Doctor);
    }

    #[test]
    fn test_patient_role_round_trip() {
        let service = test_jwt_service();
        let token = service
            .generate_token(&Uuid::new_v4(), &Uuid::new_v4(), Role::Patient)
            .unwrap();
        let principal = service.validate_token(&token).unwrap();
        assert_eq!(principal.role, Role::Patient);
        assert!(!principal.is_staff());
    }

    #[test]
    fn test_validate_garbage_token() {
        let service = test_jwt_service();
        assert!(service.validate_token("invalid_token").is_err());
    }

    #[test]
    fn test_wrong_key_rejected() {
        let service = test_jwt_service();
        let other = JwtService::new(crate::config::JwtConfig::new(
            "a_completely_different_32_byte_secret_key",
            3600,
        ));

        let token = service
            .generate_token(&Uuid::new_v4(), &Uuid::new_v4(), Role::Admin)
            .unwrap();
        assert!(other.validate_token(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let service = JwtService::new(crate::config::JwtConfig::new(
            "test_secret_key_minimum_32_characters_long",
            -3600,
        ));
        let token = service
            .generate_token(&Uuid::new_v4(), &Uuid::new_v4(), Role::Admin)
            .unwrap();
        assert!(service.validate_token(&token).is_err());
    }

    #[test]
    fn test_unknown_algorithm_rejected() {
        // A token signed with HS384 must not validate even with the right key
        let secret = "test_secret_key_minimum_32_characters_long";
        let service = JwtService::new(crate::config::JwtConfig::new(secret, 3600));

        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            clinic_id: Uuid::new_v4().to_string(),
            role: "ADMIN".to_string(),
            iat: Utc::now().timestamp(),
            exp: Utc::now().timestamp() + 3600,
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(
            &Header::new(Algorithm::HS384),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();

        assert!(service.validate_token(&token).is_err());
    }
}
