//! Audit log persistence

use async_trait::async_trait;

use super::PgRepository;
use crate::{
    error::AppResult,
    models::log_entry::{LogEntry, NewLogEntry},
};

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn logs_append(&self, entry: &NewLogEntry) -> AppResult<LogEntry>;

    async fn logs_list(&self) -> AppResult<Vec<LogEntry>>;
}

#[async_trait]
impl AuditRepository for PgRepository {
    async fn logs_append(&self, entry: &NewLogEntry) -> AppResult<LogEntry> {
        let row = sqlx::query_as::<_, LogEntry>(
            "INSERT INTO logs (description, details, user_id) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(&entry.description)
        .bind(&entry.details)
        .bind(entry.user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn logs_list(&self) -> AppResult<Vec<LogEntry>> {
        let rows = sqlx::query_as::<_, LogEntry>("SELECT * FROM logs ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
