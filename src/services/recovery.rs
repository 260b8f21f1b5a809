//! Password recovery through one-time codes sent by e-mail

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};

use crate::{
    config::RecoveryConfig,
    error::{AppError, AppResult},
    models::recovery::{hash_code, MessageResponse},
    repository::{RecoveryRepository, Store, UsersRepository},
    services::{
        auth::hash_password,
        email::{Mailer, OutgoingEmail},
    },
};

/// Same answer whether or not the address belongs to a user
pub const REQUEST_MESSAGE: &str = "If the e-mail is registered, a recovery code has been sent";

const MIN_PASSWORD_LENGTH: usize = 6;

fn generate_code(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(|b| (b as char).to_ascii_uppercase())
        .collect()
}

#[derive(Clone)]
pub struct RecoveryService {
    store: Arc<dyn Store>,
    mailer: Arc<dyn Mailer>,
    config: RecoveryConfig,
}

impl RecoveryService {
    pub fn new(store: Arc<dyn Store>, mailer: Arc<dyn Mailer>, config: RecoveryConfig) -> Self {
        Self { store, mailer, config }
    }

    /// Issue a new code for `email`, replacing any earlier one
    pub async fn request(&self, email: &str) -> AppResult<MessageResponse> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AppError::Validation("email: E-mail is required".to_string()));
        }

        let Some(user) = self.store.users_get_by_email(email).await? else {
            tracing::info!("Recovery requested for unknown e-mail");
            return Ok(MessageResponse::new(REQUEST_MESSAGE));
        };

        let code = generate_code(self.config.code_length);
        self.store.recovery_replace(&user.email, &hash_code(&code)).await?;

        let text = format!(
            "Your password recovery code is: {code}\n\n\
             The code expires in {ttl} minutes and can only be used once.\n\n\
             If you didn't request it, you can ignore this e-mail.\n",
            code = code,
            ttl = self.config.code_ttl_minutes
        );
        // Same answer as for an unknown address, whatever the mailer says
        match self
            .mailer
            .send(OutgoingEmail::plain(&user.email, "Password recovery code", text))
            .await
        {
            Ok(()) => tracing::info!(user_id = %user.id, "Recovery code issued"),
            Err(e) => tracing::error!(user_id = %user.id, error = %e, "Failed to send recovery code"),
        }
        Ok(MessageResponse::new(REQUEST_MESSAGE))
    }

    /// Set a new password using a previously issued code
    pub async fn confirm(&self, email: &str, code: &str, new_password: &str) -> AppResult<MessageResponse> {
        self.confirm_at(email, code, new_password, Utc::now()).await
    }

    pub(crate) async fn confirm_at(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> AppResult<MessageResponse> {
        let email = email.trim();
        if email.is_empty() || code.trim().is_empty() {
            return Err(AppError::Validation("E-mail, code and new password are required".to_string()));
        }
        if new_password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AppError::Validation(format!(
                "new_password: Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        let record = self
            .store
            .recovery_find_latest(email, &hash_code(code))
            .await?
            .ok_or(AppError::InvalidCode)?;

        if record.is_expired(now, Duration::minutes(self.config.code_ttl_minutes)) {
            tracing::warn!(code_id = record.id, "Expired recovery code presented");
            return Err(AppError::InvalidCode);
        }

        let password_hash = hash_password(new_password)?;
        if !self.store.recovery_consume(record.id, email, &password_hash).await? {
            return Err(AppError::InvalidCode);
        }

        self.mailer
            .send(OutgoingEmail::plain(
                email,
                "Password changed",
                "Your password was changed using a recovery code.\n\n\
                 If this wasn't you, contact an administrator right away.\n",
            ))
            .await?;

        tracing::info!(code_id = record.id, "Password reset through recovery code");
        Ok(MessageResponse::new("Password updated successfully"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{
        models::user::UserRecord,
        repository::MemoryRepository,
        services::{auth::verify_password, email::MockMailer},
    };

    const EMAIL: &str = "maria@school.example";

    /// Mailer that records every message it is asked to send
    fn capturing_mailer(outbox: Arc<Mutex<Vec<OutgoingEmail>>>) -> MockMailer {
        let mut mailer = MockMailer::new();
        mailer.expect_send().returning(move |email| {
            outbox.lock().unwrap().push(email);
            Ok(())
        });
        mailer
    }

    fn code_in(email: &OutgoingEmail) -> String {
        email
            .text
            .lines()
            .find_map(|l| l.strip_prefix("Your password recovery code is: "))
            .unwrap()
            .to_string()
    }

    async fn setup() -> (RecoveryService, Arc<MemoryRepository>, Arc<Mutex<Vec<OutgoingEmail>>>) {
        let store = Arc::new(MemoryRepository::new());
        store
            .users_create(&UserRecord {
                name: "Maria Aparecida".into(),
                email: EMAIL.into(),
                password_hash: hash_password("Old!pass1").unwrap(),
            })
            .await
            .unwrap();
        let outbox = Arc::new(Mutex::new(Vec::new()));
        let service = RecoveryService::new(
            store.clone(),
            Arc::new(capturing_mailer(outbox.clone())),
            RecoveryConfig::default(),
        );
        (service, store, outbox)
    }

    #[tokio::test]
    async fn mailer_failure_still_answers_generic_message() {
        let store = Arc::new(MemoryRepository::new());
        store
            .users_create(&UserRecord {
                name: "Maria Aparecida".into(),
                email: EMAIL.into(),
                password_hash: hash_password("Old!pass1").unwrap(),
            })
            .await
            .unwrap();
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .times(1)
            .returning(|_| Err(AppError::Internal("SMTP relay unreachable".into())));
        let service = RecoveryService::new(store, Arc::new(mailer), RecoveryConfig::default());

        let known = service.request(EMAIL).await.unwrap();
        assert_eq!(known.message, REQUEST_MESSAGE);
    }

    #[test]
    fn codes_are_uppercase_alphanumeric() {
        let code = generate_code(6);
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[tokio::test]
    async fn unknown_email_gets_generic_answer_and_nothing_stored() {
        let store = Arc::new(MemoryRepository::new());
        let mut mailer = MockMailer::new();
        mailer.expect_send().never();
        let service = RecoveryService::new(store.clone(), Arc::new(mailer), RecoveryConfig::default());

        let response = service.request("ghost@school.example").await.unwrap();
        assert_eq!(response.message, REQUEST_MESSAGE);
        assert!(store.recovery_list("ghost@school.example").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn code_resets_password_once() {
        let (service, store, outbox) = setup().await;

        let response = service.request(EMAIL).await.unwrap();
        assert_eq!(response.message, REQUEST_MESSAGE);
        let code = code_in(&outbox.lock().unwrap()[0]);

        service.confirm(EMAIL, &code.to_lowercase(), "New!pass2").await.unwrap();
        let user = store.users_get_by_email(EMAIL).await.unwrap().unwrap();
        assert!(verify_password("New!pass2", &user.password_hash).unwrap());
        assert_eq!(outbox.lock().unwrap().len(), 2);

        let err = service.confirm(EMAIL, &code, "Another!3").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCode));
    }

    #[tokio::test]
    async fn expired_code_is_rejected() {
        let (service, store, outbox) = setup().await;
        service.request(EMAIL).await.unwrap();
        let code = code_in(&outbox.lock().unwrap()[0]);

        let later = Utc::now() + Duration::minutes(16);
        let err = service.confirm_at(EMAIL, &code, "New!pass2", later).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCode));

        let user = store.users_get_by_email(EMAIL).await.unwrap().unwrap();
        assert!(verify_password("Old!pass1", &user.password_hash).unwrap());
    }

    #[tokio::test]
    async fn new_request_invalidates_previous_code() {
        let (service, store, outbox) = setup().await;
        service.request(EMAIL).await.unwrap();
        service.request(EMAIL).await.unwrap();
        assert_eq!(store.recovery_list(EMAIL).await.unwrap().len(), 1);

        let (first, second) = {
            let sent = outbox.lock().unwrap();
            (code_in(&sent[0]), code_in(&sent[1]))
        };
        if first != second {
            let err = service.confirm(EMAIL, &first, "New!pass2").await.unwrap_err();
            assert!(matches!(err, AppError::InvalidCode));
        }
        service.confirm(EMAIL, &second, "New!pass2").await.unwrap();
    }

    #[tokio::test]
    async fn short_password_is_a_validation_error() {
        let (service, store, outbox) = setup().await;
        service.request(EMAIL).await.unwrap();
        let code = code_in(&outbox.lock().unwrap()[0]);

        let err = service.confirm(EMAIL, &code, "abc").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        // The code survives a rejected attempt
        assert_eq!(store.recovery_list(EMAIL).await.unwrap().len(), 1);
    }
}
