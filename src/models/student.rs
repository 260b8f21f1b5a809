//! Student model and related types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Student holding a running balance
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Student {
    pub id: i32,
    pub name: String,
    /// Class / course the student attends
    pub class_name: String,
    /// Name of the parent or guardian
    pub guardian: String,
    pub email: String,
    pub notes: Option<String>,
    /// Running balance, only changed through the ledger
    pub balance: Decimal,
    /// User that registered the student
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create or replace student request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct StudentInput {
    #[validate(length(min = 10, message = "Name must be at least 10 characters"))]
    pub name: String,
    #[validate(length(min = 2, message = "Class must be at least 2 characters"))]
    pub class_name: String,
    #[validate(length(min = 10, message = "Guardian name must be at least 10 characters"))]
    pub guardian: String,
    #[validate(
        email(message = "Invalid email format"),
        length(min = 10, message = "Email must be at least 10 characters")
    )]
    pub email: String,
    pub notes: Option<String>,
}

/// Direct deposit on a student (`PATCH /students/{id}/deposit`)
#[derive(Debug, Deserialize, ToSchema)]
pub struct BalanceDeposit {
    pub amount: Decimal,
}
