//! User model, credentials and JWT claims

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Staff user allowed to operate the ledger
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// Hashed password (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Consecutive failed logins since the last success
    pub failed_attempts: i32,
    pub locked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create or replace user request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UserInput {
    #[validate(length(min = 10, message = "Name must be at least 10 characters"))]
    pub name: String,
    #[validate(
        email(message = "Invalid email format"),
        length(min = 10, message = "Email must be at least 10 characters")
    )]
    pub email: String,
    pub password: String,
}

/// Login request
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Successful login
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub token: String,
}

/// User fields written by the store
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Collect every rule a password breaks
pub fn password_policy_violations(password: &str) -> Vec<&'static str> {
    let mut errors = Vec::new();

    if password.chars().count() < 8 {
        errors.push("Password must be at least 8 characters");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        errors.push("Password must contain a lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push("Password must contain an uppercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push("Password must contain a digit");
    }
    if !password.chars().any(|c| !c.is_ascii_alphanumeric()) {
        errors.push("Password must contain a symbol");
    }

    errors
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: Uuid,
    /// Display name of the logged-in user
    pub name: String,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_policy_lists_every_violation() {
        assert_eq!(password_policy_violations("abc").len(), 4);
        assert!(password_policy_violations("Str0ng!pass").is_empty());
        assert_eq!(
            password_policy_violations("NoSymbols123"),
            vec!["Password must contain a symbol"]
        );
    }

    #[test]
    fn token_round_trips_with_same_secret() {
        let now = Utc::now().timestamp();
        let claims = UserClaims {
            sub: "42".into(),
            user_id: Uuid::new_v4(),
            name: "Maria Aparecida".into(),
            exp: now + 3600,
            iat: now,
        };
        let token = claims.create_token("secret").unwrap();
        let parsed = UserClaims::from_token(&token, "secret").unwrap();
        assert_eq!(parsed.user_id, claims.user_id);
        assert!(UserClaims::from_token(&token, "other").is_err());
    }
}
