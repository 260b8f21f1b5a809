//! Audit log entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Append-only audit record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LogEntry {
    pub id: i32,
    pub description: String,
    pub details: String,
    /// Acting user, if known
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub description: String,
    pub details: String,
    pub user_id: Option<Uuid>,
}

impl NewLogEntry {
    pub fn new(description: impl Into<String>, details: impl Into<String>, user_id: Option<Uuid>) -> Self {
        Self {
            description: description.into(),
            details: details.into(),
            user_id,
        }
    }
}
