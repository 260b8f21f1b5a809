//! Login with lockout after repeated failures

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::{
        log_entry::NewLogEntry,
        user::{LoginResponse, User, UserClaims},
    },
    repository::{AuditRepository, Store, UsersRepository},
};

const LOCKED_MESSAGE: &str = "Account is locked. Contact an administrator.";

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Check a password against a stored PHC string
pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(hash).map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>, config: AuthConfig) -> Self {
        Self { store, config }
    }

    /// Authenticate by e-mail and password and issue a JWT.
    ///
    /// A locked account is rejected before the password is looked at. Each
    /// wrong password bumps the failure counter; reaching
    /// `max_failed_attempts` locks the account on that same attempt.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<LoginResponse> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AppError::InvalidCredentials);
        }

        let user = self
            .store
            .users_get_by_email(email.trim())
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if user.locked {
            tracing::warn!(user_id = %user.id, "Login attempt on locked account");
            return Err(AppError::AccountLocked(LOCKED_MESSAGE.to_string()));
        }

        if !verify_password(password, &user.password_hash)? {
            return self.reject(&user).await;
        }

        if user.failed_attempts > 0 {
            self.store.users_reset_login_state(user.id).await?;
        }

        let token = self.create_token(&user)?;
        tracing::info!(user_id = %user.id, "User logged in");

        Ok(LoginResponse {
            id: user.id,
            name: user.name,
            email: user.email,
            token,
        })
    }

    async fn reject(&self, user: &User) -> AppResult<LoginResponse> {
        let updated = self
            .store
            .users_record_failed_login(user.id, self.config.max_failed_attempts)
            .await?
            .ok_or_else(|| AppError::AccountLocked(LOCKED_MESSAGE.to_string()))?;

        self.store
            .logs_append(&NewLogEntry::new(
                "Invalid login attempt",
                format!("User: {} - {} ({}x)", updated.id, updated.name, updated.failed_attempts),
                Some(updated.id),
            ))
            .await?;

        if updated.locked {
            tracing::warn!(
                user_id = %updated.id,
                failed_attempts = updated.failed_attempts,
                "Account locked after repeated login failures"
            );
            return Err(AppError::AccountLocked(format!(
                "Account locked after {} invalid attempts.",
                self.config.max_failed_attempts
            )));
        }

        Err(AppError::InvalidCredentials)
    }

    /// Clear the failure counter and the lock flag
    pub async fn unlock(&self, user_id: Uuid, actor: Option<Uuid>) -> AppResult<User> {
        let user = self
            .store
            .users_reset_login_state(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", user_id)))?;

        self.store
            .logs_append(&NewLogEntry::new(
                "User unlocked",
                format!("User: {} - {}", user.id, user.name),
                actor,
            ))
            .await?;

        tracing::info!(user_id = %user.id, "User unlocked");
        Ok(user)
    }

    /// Validate a bearer token
    pub fn validate_token(&self, token: &str) -> AppResult<UserClaims> {
        UserClaims::from_token(token, &self.config.jwt_secret)
            .map_err(|e| AppError::Authentication(format!("Invalid token: {}", e)))
    }

    fn create_token(&self, user: &User) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let exp = now + (self.config.jwt_expiration_hours as i64 * 3600);

        let claims = UserClaims {
            sub: user.id.to_string(),
            user_id: user.id,
            name: user.name.clone(),
            exp,
            iat: now,
        };

        claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::user::UserRecord, repository::MemoryRepository};

    const PASSWORD: &str = "Str0ng!pass";

    async fn setup() -> (AuthService, Arc<MemoryRepository>, User) {
        let store = Arc::new(MemoryRepository::new());
        let user = store
            .users_create(&UserRecord {
                name: "Maria Aparecida".into(),
                email: "maria@school.example".into(),
                password_hash: hash_password(PASSWORD).unwrap(),
            })
            .await
            .unwrap();
        (AuthService::new(store.clone(), AuthConfig::default()), store, user)
    }

    #[tokio::test]
    async fn login_issues_token_for_user() {
        let (auth, _, user) = setup().await;

        let response = auth.login("MARIA@school.example", PASSWORD).await.unwrap();
        assert_eq!(response.id, user.id);
        let claims = auth.validate_token(&response.token).unwrap();
        assert_eq!(claims.user_id, user.id);
        assert_eq!(claims.name, "Maria Aparecida");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[tokio::test]
    async fn unknown_email_is_invalid_credentials() {
        let (auth, store, _) = setup().await;

        let err = auth.login("nobody@school.example", PASSWORD).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
        assert!(store.logs_list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stale_read_cannot_push_counter_past_lock() {
        let (auth, store, user) = setup().await;

        for _ in 0..3 {
            let _ = auth.login(&user.email, "wrong").await;
        }

        // `user` was read before the lock, like a request racing the third failure
        let err = auth.reject(&user).await.unwrap_err();
        assert!(matches!(err, AppError::AccountLocked(_)));

        let stored = store.users_get(user.id).await.unwrap().unwrap();
        assert!(stored.locked);
        assert_eq!(stored.failed_attempts, 3);
        assert_eq!(store.logs_list().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn third_failure_locks_and_fourth_is_rejected() {
        let (auth, store, user) = setup().await;

        for _ in 0..2 {
            let err = auth.login(&user.email, "wrong").await.unwrap_err();
            assert!(matches!(err, AppError::InvalidCredentials));
        }
        let err = auth.login(&user.email, "wrong").await.unwrap_err();
        assert!(matches!(err, AppError::AccountLocked(_)));

        // Correct password no longer helps
        let err = auth.login(&user.email, PASSWORD).await.unwrap_err();
        assert!(matches!(err, AppError::AccountLocked(_)));

        let stored = store.users_get(user.id).await.unwrap().unwrap();
        assert!(stored.locked);
        assert_eq!(stored.failed_attempts, 3);
        assert_eq!(store.logs_list().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn success_resets_failure_counter() {
        let (auth, store, user) = setup().await;

        auth.login(&user.email, "wrong").await.unwrap_err();
        auth.login(&user.email, "wrong").await.unwrap_err();
        auth.login(&user.email, PASSWORD).await.unwrap();

        let stored = store.users_get(user.id).await.unwrap().unwrap();
        assert_eq!(stored.failed_attempts, 0);

        // Two more failures are again below the threshold
        auth.login(&user.email, "wrong").await.unwrap_err();
        let err = auth.login(&user.email, "wrong").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
    }

    #[tokio::test]
    async fn unlock_restores_access() {
        let (auth, store, user) = setup().await;
        for _ in 0..3 {
            auth.login(&user.email, "wrong").await.unwrap_err();
        }

        let unlocked = auth.unlock(user.id, None).await.unwrap();
        assert!(!unlocked.locked);
        assert_eq!(unlocked.failed_attempts, 0);
        auth.login(&user.email, PASSWORD).await.unwrap();

        let logs = store.logs_list().await.unwrap();
        assert_eq!(logs.last().unwrap().description, "User unlocked");

        let err = auth.unlock(Uuid::new_v4(), None).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hash = hash_password(PASSWORD).unwrap();
        assert!(verify_password(PASSWORD, &hash).unwrap());
        assert!(!verify_password("other", &hash).unwrap());
        assert!(verify_password(PASSWORD, "not-a-phc-string").is_err());
    }
}
