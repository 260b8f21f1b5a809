//! Password recovery codes

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Outstanding one-time code; only its digest is stored
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RecoveryCode {
    pub id: i32,
    pub email: String,
    pub code_hash: String,
    pub created_at: DateTime<Utc>,
}

impl RecoveryCode {
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.created_at > ttl
    }
}

/// SHA-256 hex digest used to store and look up codes
pub fn hash_code(code: &str) -> String {
    hex::encode(Sha256::digest(code.trim().to_uppercase().as_bytes()))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RecoveryRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_ignores_case_and_whitespace() {
        assert_eq!(hash_code("ab12cd"), hash_code(" AB12CD "));
        assert_ne!(hash_code("AB12CD"), hash_code("AB12CE"));
    }

    #[test]
    fn expiry_is_strictly_after_ttl() {
        let created = Utc::now();
        let code = RecoveryCode {
            id: 1,
            email: "someone@school.example".into(),
            code_hash: hash_code("X"),
            created_at: created,
        };
        let ttl = Duration::minutes(15);
        assert!(!code.is_expired(created + ttl, ttl));
        assert!(code.is_expired(created + ttl + Duration::seconds(1), ttl));
    }
}
