//! Users repository for database operations

use async_trait::async_trait;
use uuid::Uuid;

use super::PgRepository;
use crate::{
    error::AppResult,
    models::user::{User, UserRecord},
};

#[async_trait]
pub trait UsersRepository: Send + Sync {
    async fn users_list(&self) -> AppResult<Vec<User>>;

    async fn users_get(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Case-insensitive lookup by email
    async fn users_get_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Fails with `Conflict` when the email is taken
    async fn users_create(&self, record: &UserRecord) -> AppResult<User>;

    async fn users_update(&self, id: Uuid, record: &UserRecord) -> AppResult<Option<User>>;

    async fn users_delete(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Increment the failed-login counter and lock once it reaches `max_attempts`.
    ///
    /// Returns `None` when the user is gone or already locked.
    async fn users_record_failed_login(&self, id: Uuid, max_attempts: i32) -> AppResult<Option<User>>;

    /// Clear the failed-login counter and the lock
    async fn users_reset_login_state(&self, id: Uuid) -> AppResult<Option<User>>;
}

#[async_trait]
impl UsersRepository for PgRepository {
    async fn users_list(&self) -> AppResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn users_get(&self, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn users_get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn users_create(&self, record: &UserRecord) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&record.name)
        .bind(&record.email)
        .bind(&record.password_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn users_update(&self, id: Uuid, record: &UserRecord) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = $1, email = $2, password_hash = $3, updated_at = NOW()
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(&record.name)
        .bind(&record.email)
        .bind(&record.password_hash)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn users_delete(&self, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("DELETE FROM users WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn users_record_failed_login(&self, id: Uuid, max_attempts: i32) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET failed_attempts = failed_attempts + 1,
                locked = (failed_attempts + 1) >= $2,
                updated_at = NOW()
            WHERE id = $1 AND locked = FALSE
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(max_attempts)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn users_reset_login_state(&self, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET failed_attempts = 0, locked = FALSE, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}
