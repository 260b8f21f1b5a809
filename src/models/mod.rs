//! Data models for the school ledger

pub mod backup;
pub mod book;
pub mod deposit;
pub mod loan;
pub mod log_entry;
pub mod recovery;
pub mod statement;
pub mod student;
pub mod user;

use rust_decimal::{Decimal, RoundingStrategy};

// Re-export commonly used types
pub use book::Book;
pub use deposit::{Deposit, DepositKind};
pub use loan::Loan;
pub use log_entry::{LogEntry, NewLogEntry};
pub use recovery::RecoveryCode;
pub use statement::Statement;
pub use student::Student;
pub use user::User;

/// Round a monetary amount to cents
pub fn to_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Largest amount a `NUMERIC(12,2)` column holds
pub fn max_amount() -> Decimal {
    Decimal::new(9_999_999_999_99, 2)
}

/// Balance arithmetic that stays inside the column range
pub fn add_amounts(balance: Decimal, delta: Decimal) -> Option<Decimal> {
    balance
        .checked_add(delta)
        .map(to_cents)
        .filter(|sum| sum.abs() <= max_amount())
}
