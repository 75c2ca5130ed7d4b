//! Application configuration management

use std::env;

use anyhow::{Context, Result};
use base64::Engine;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Display name used in logs
    pub project_name: String,

    /// Prefix every API route is mounted under
    pub api_v1_str: String,

    /// Interface to bind
    pub host: String,

    /// Server port
    pub port: u16,

    /// SQLite URL, e.g. `sqlite:./data/itemvault.db`
    pub database_url: String,

    pub database_max_connections: u32,

    /// JWT signing secret
    pub jwt_secret: String,

    pub access_token_expire_minutes: i64,

    pub email_reset_token_expire_hours: i64,

    /// bcrypt work factor for new hashes
    pub bcrypt_cost: u32,

    /// Account created on startup if no user has its email
    pub first_superuser: String,
    pub first_superuser_password: String,

    /// Allow anonymous sign-up through POST /users/open
    pub users_open_registration: bool,

    /// Allowed CORS origins; empty means any
    pub cors_origins: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // A random secret invalidates every token on restart; set JWT_SECRET in production
        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| generate_jwt_secret());

        Ok(Self {
            project_name: env::var("PROJECT_NAME").unwrap_or_else(|_| "itemvault".to_string()),

            api_v1_str: env::var("API_V1_STR").unwrap_or_else(|_| "/api/v1".to_string()),

            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),

            port: env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .context("Invalid PORT")?,

            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./data/itemvault.db".to_string()),

            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid DATABASE_MAX_CONNECTIONS")?,

            jwt_secret,

            access_token_expire_minutes: env::var("ACCESS_TOKEN_EXPIRE_MINUTES")
                .unwrap_or_else(|_| (60 * 24 * 8).to_string())
                .parse()
                .context("Invalid ACCESS_TOKEN_EXPIRE_MINUTES")?,

            email_reset_token_expire_hours: env::var("EMAIL_RESET_TOKEN_EXPIRE_HOURS")
                .unwrap_or_else(|_| "48".to_string())
                .parse()
                .context("Invalid EMAIL_RESET_TOKEN_EXPIRE_HOURS")?,

            bcrypt_cost: env::var("BCRYPT_COST")
                .map(|v| v.parse().context("Invalid BCRYPT_COST"))
                .unwrap_or(Ok(bcrypt::DEFAULT_COST))?,

            first_superuser: env::var("FIRST_SUPERUSER")
                .unwrap_or_else(|_| "admin@example.com".to_string()),

            first_superuser_password: env::var("FIRST_SUPERUSER_PASSWORD")
                .unwrap_or_else(|_| "changethis".to_string()),

            users_open_registration: env::var("USERS_OPEN_REGISTRATION")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),

            cors_origins: env::var("BACKEND_CORS_ORIGINS")
                .map(|v| parse_origins(&v))
                .unwrap_or_default(),
        })
    }
}

/// Split a comma separated origin list, dropping blanks
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_end_matches('/').to_string())
        .collect()
}

fn generate_jwt_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[cfg(test)]
impl Config {
    /// Fixed configuration for router tests
    pub fn for_tests() -> Self {
        Self {
            project_name: "itemvault".to_string(),
            api_v1_str: "/api/v1".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            database_url: "sqlite::memory:".to_string(),
            database_max_connections: 1,
            jwt_secret: "test-secret".to_string(),
            access_token_expire_minutes: 60,
            email_reset_token_expire_hours: 1,
            bcrypt_cost: 4,
            first_superuser: "admin@example.com".to_string(),
            first_superuser_password: "changethis".to_string(),
            users_open_registration: false,
            cors_origins: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins("http://localhost:3000/, https://app.example.com,,"),
            vec!["http://localhost:3000", "https://app.example.com"]
        );
        assert!(parse_origins("").is_empty());
    }

    #[test]
    fn test_generated_secrets_differ() {
        let a = generate_jwt_secret();
        assert_eq!(a.len(), 44);
        assert_ne!(a, generate_jwt_secret());
    }
}
