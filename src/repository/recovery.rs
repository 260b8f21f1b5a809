//! Password recovery codes persistence

use async_trait::async_trait;

use super::PgRepository;
use crate::{error::AppResult, models::recovery::RecoveryCode};

#[async_trait]
pub trait RecoveryRepository: Send + Sync {
    /// Drop every outstanding code for the email and store the new one
    async fn recovery_replace(&self, email: &str, code_hash: &str) -> AppResult<RecoveryCode>;

    /// Most recent code matching the pair
    async fn recovery_find_latest(&self, email: &str, code_hash: &str) -> AppResult<Option<RecoveryCode>>;

    async fn recovery_list(&self, email: &str) -> AppResult<Vec<RecoveryCode>>;

    /// Delete the code and store the new password hash in one transaction.
    ///
    /// Returns `false` without touching the user when the code is already gone.
    async fn recovery_consume(&self, code_id: i32, email: &str, password_hash: &str) -> AppResult<bool>;
}

#[async_trait]
impl RecoveryRepository for PgRepository {
    async fn recovery_replace(&self, email: &str, code_hash: &str) -> AppResult<RecoveryCode> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM recovery_codes WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .execute(&mut *tx)
            .await?;

        let code = sqlx::query_as::<_, RecoveryCode>(
            "INSERT INTO recovery_codes (email, code_hash) VALUES ($1, $2) RETURNING *",
        )
        .bind(email)
        .bind(code_hash)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(code)
    }

    async fn recovery_find_latest(&self, email: &str, code_hash: &str) -> AppResult<Option<RecoveryCode>> {
        let code = sqlx::query_as::<_, RecoveryCode>(
            r#"
            SELECT * FROM recovery_codes
            WHERE LOWER(email) = LOWER($1) AND code_hash = $2
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(email)
        .bind(code_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(code)
    }

    async fn recovery_list(&self, email: &str) -> AppResult<Vec<RecoveryCode>> {
        let codes = sqlx::query_as::<_, RecoveryCode>(
            "SELECT * FROM recovery_codes WHERE LOWER(email) = LOWER($1) ORDER BY created_at DESC, id DESC",
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?;
        Ok(codes)
    }

    async fn recovery_consume(&self, code_id: i32, email: &str, password_hash: &str) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM recovery_codes WHERE id = $1")
            .bind(code_id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query(
            "UPDATE users SET password_hash = $1, updated_at = NOW() WHERE LOWER(email) = LOWER($2)",
        )
        .bind(password_hash)
        .bind(email)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }
}
