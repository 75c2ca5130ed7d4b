//! Authentication primitives: password hashing and JWT handling
//!
//! Provides:
//! - Password hashing and verification with bcrypt
//! - Access token generation and validation
//! - Password reset token generation and validation

use anyhow::{Result, anyhow};
use bcrypt::{BcryptError, hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;

const ACCESS_TOKEN_TYPE: &str = "access";
const RESET_TOKEN_TYPE: &str = "password_reset";

// ============================================================================
// Passwords
// ============================================================================

/// Hash a password with bcrypt
pub fn hash_password(password: &str, cost: u32) -> std::result::Result<String, BcryptError> {
    hash(password, cost)
}

/// Verify a password against a stored hash. A malformed hash never matches.
pub fn verify_password(password: &str, hashed: &str) -> bool {
    verify(password, hashed).unwrap_or(false)
}

/// Burn one bcrypt verification so an unknown account costs as much as a
/// wrong password.
pub fn verify_against_dummy(password: &str, cost: u32) {
    static DUMMY_HASH: OnceCell<String> = OnceCell::new();
    if let Ok(dummy) = DUMMY_HASH.get_or_try_init(|| hash("itemvault-dummy-password", cost)) {
        let _ = verify(password, dummy);
    }
}

// ============================================================================
// JWT Claims
// ============================================================================

/// Claims structure for access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// User ID (subject)
    pub sub: String,
    pub token_type: String,
    pub exp: i64,
    pub iat: i64,
}

/// Claims structure for password reset tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordResetClaims {
    /// Email the reset was requested for
    pub sub: String,
    pub token_type: String,
    pub exp: i64,
    pub nbf: i64,
}

/// Token returned by the login endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
}

// ============================================================================
// Configuration
// ============================================================================

/// Auth configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// JWT signing secret
    pub jwt_secret: String,
    /// Access token lifetime in seconds
    pub access_token_lifetime: i64,
    /// Password reset token lifetime in seconds
    pub reset_token_lifetime: i64,
}

impl AuthConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            jwt_secret: config.jwt_secret.clone(),
            access_token_lifetime: config.access_token_expire_minutes * 60,
            reset_token_lifetime: config.email_reset_token_expire_hours * 60 * 60,
        }
    }
}

// ============================================================================
// Auth Service
// ============================================================================

#[derive(Debug, Clone)]
pub struct AuthService {
    config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Issue a bearer token for a user
    pub fn create_access_token(&self, user_id: Uuid) -> Result<Token> {
        let now = Utc::now();
        let claims = AccessTokenClaims {
            sub: user_id.to_string(),
            token_type: ACCESS_TOKEN_TYPE.to_string(),
            exp: (now + Duration::seconds(self.config.access_token_lifetime)).timestamp(),
            iat: now.timestamp(),
        };

        let access_token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| anyhow!("Failed to create access token: {}", e))?;

        Ok(Token {
            access_token,
            token_type: "bearer".to_string(),
        })
    }

    /// Decode and validate an access token, returning the user id it names
    pub fn decode_access_token(&self, token: &str) -> Result<Uuid> {
        let claims = decode::<AccessTokenClaims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|e| anyhow!("Invalid access token: {}", e))?
        .claims;

        if claims.token_type != ACCESS_TOKEN_TYPE {
            return Err(anyhow!("Invalid token type"));
        }

        Uuid::parse_str(&claims.sub).map_err(|e| anyhow!("Invalid token subject: {}", e))
    }

    /// Issue a password reset token for an email
    pub fn generate_password_reset_token(&self, email: &str) -> Result<String> {
        let now = Utc::now();
        let claims = PasswordResetClaims {
            sub: email.to_string(),
            token_type: RESET_TOKEN_TYPE.to_string(),
            exp: (now + Duration::seconds(self.config.reset_token_lifetime)).timestamp(),
            nbf: now.timestamp(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| anyhow!("Failed to create reset token: {}", e))
    }

    /// Validate a password reset token, returning its email on success
    pub fn verify_password_reset_token(&self, token: &str) -> Option<String> {
        let claims = decode::<PasswordResetClaims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .ok()?
        .claims;

        (claims.token_type == RESET_TOKEN_TYPE).then_some(claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(lifetime: i64) -> AuthService {
        AuthService::new(AuthConfig {
            jwt_secret: "test-secret".to_string(),
            access_token_lifetime: lifetime,
            reset_token_lifetime: lifetime,
        })
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let hashed = hash_password("hunter22", 4).unwrap();
        assert_ne!(hashed, "hunter22");
        assert!(verify_password("hunter22", &hashed));
        assert!(!verify_password("hunter23", &hashed));
        assert!(!verify_password("hunter22", "not-a-bcrypt-hash"));
    }

    #[test]
    fn test_access_token_roundtrip() {
        let auth = service(60);
        let id = Uuid::new_v4();
        let token = auth.create_access_token(id).unwrap();
        assert_eq!(token.token_type, "bearer");
        assert_eq!(auth.decode_access_token(&token.access_token).unwrap(), id);
    }

    #[test]
    fn test_expired_access_token_is_rejected() {
        let auth = service(-600);
        let token = auth.create_access_token(Uuid::new_v4()).unwrap();
        assert!(auth.decode_access_token(&token.access_token).is_err());
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let token = service(60).create_access_token(Uuid::new_v4()).unwrap();
        let other = AuthService::new(AuthConfig {
            jwt_secret: "other".to_string(),
            access_token_lifetime: 60,
            reset_token_lifetime: 60,
        });
        assert!(other.decode_access_token(&token.access_token).is_err());
    }

    #[test]
    fn test_reset_token_is_not_an_access_token() {
        let auth = service(60);
        let reset = auth.generate_password_reset_token("a@example.com").unwrap();
        assert_eq!(
            auth.verify_password_reset_token(&reset).as_deref(),
            Some("a@example.com")
        );
        assert!(auth.decode_access_token(&reset).is_err());

        let access = auth.create_access_token(Uuid::new_v4()).unwrap();
        assert_eq!(auth.verify_password_reset_token(&access.access_token), None);
    }
}
