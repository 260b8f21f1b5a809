//! Loan model and related types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::{book::Book, student::Student};

/// Loan model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i32,
    pub student_id: i32,
    pub book_id: i32,
    /// Book price captured when the loan was opened
    pub amount: Decimal,
    pub loaned_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
}

impl Loan {
    pub fn is_active(&self) -> bool {
        self.returned_at.is_none()
    }
}

/// Loan to be written by the store
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub student_id: i32,
    pub book_id: i32,
    pub amount: Decimal,
    /// Debit `amount` from the student balance in the same transaction
    pub charge_balance: bool,
}

/// Create loan request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateLoan {
    pub student_id: i32,
    pub book_id: i32,
}

/// Return-by-pair request body
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReturnBook {
    pub book_id: i32,
}

/// Loan with its student and book for display
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoanDetails {
    #[serde(flatten)]
    pub loan: Loan,
    pub student: Student,
    pub book: Book,
}

/// Result of a ledger operation on a loan
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoanReceipt {
    pub loan: Loan,
    /// Book with the updated stock
    pub book: Book,
}
