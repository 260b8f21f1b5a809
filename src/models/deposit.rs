//! Deposit model and related types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::student::Student;

/// How the money was paid in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "deposit_kind", rename_all = "lowercase")]
pub enum DepositKind {
    Cash,
    Pix,
    Card,
    Transfer,
}

impl DepositKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DepositKind::Cash => "cash",
            DepositKind::Pix => "pix",
            DepositKind::Card => "card",
            DepositKind::Transfer => "transfer",
        }
    }
}

impl std::fmt::Display for DepositKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Deposit credited to a student balance (immutable once created)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Deposit {
    pub id: i32,
    pub student_id: i32,
    pub kind: DepositKind,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Create deposit request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateDeposit {
    pub student_id: i32,
    pub kind: DepositKind,
    pub amount: Decimal,
}

/// Deposit listed together with its student
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DepositDetails {
    #[serde(flatten)]
    pub deposit: Deposit,
    pub student: Student,
}

/// Result of a ledger operation on a deposit
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DepositReceipt {
    pub deposit: Deposit,
    /// Student with the updated balance
    pub student: Student,
}
