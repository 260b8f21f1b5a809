//! Staff user management

use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::user::{password_policy_violations, User, UserInput, UserRecord},
    repository::{Store, UsersRepository},
    services::auth::hash_password,
};

#[derive(Clone)]
pub struct UsersService {
    store: Arc<dyn Store>,
}

impl UsersService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> AppResult<Vec<User>> {
        self.store.users_list().await
    }

    pub async fn get(&self, id: Uuid) -> AppResult<User> {
        self.store.users_get(id).await?.ok_or_else(|| not_found(id))
    }

    /// Create a user with a strong password
    pub async fn create(&self, input: UserInput) -> AppResult<User> {
        let record = self.record(input)?;
        let user = self.store.users_create(&record).await?;
        tracing::info!(user_id = %user.id, "User created");
        Ok(user)
    }

    /// Replace name, e-mail and password
    pub async fn update(&self, id: Uuid, input: UserInput) -> AppResult<User> {
        let record = self.record(input)?;
        self.store.users_update(id, &record).await?.ok_or_else(|| not_found(id))
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<User> {
        let user = self.store.users_delete(id).await?.ok_or_else(|| not_found(id))?;
        tracing::info!(user_id = %id, "User deleted");
        Ok(user)
    }

    fn record(&self, input: UserInput) -> AppResult<UserRecord> {
        input.validate()?;

        let violations = password_policy_violations(&input.password);
        if !violations.is_empty() {
            return Err(AppError::Validation(
                violations
                    .iter()
                    .map(|v| format!("password: {}", v))
                    .collect::<Vec<_>>()
                    .join("; "),
            ));
        }

        Ok(UserRecord {
            name: input.name,
            email: input.email.trim().to_string(),
            password_hash: hash_password(&input.password)?,
        })
    }
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("User with id {} not found", id))
}
