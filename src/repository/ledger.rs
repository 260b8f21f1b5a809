//! Deposit and loan persistence
//!
//! Every mutating operation here touches two tables and runs inside a single
//! transaction, so balances and stock never diverge from the records that
//! explain them.

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::PgRepository;
use crate::{
    error::{AppError, AppResult},
    models::{
        book::Book,
        deposit::{Deposit, DepositKind, DepositReceipt},
        loan::{Loan, LoanReceipt, NewLoan},
        student::Student,
    },
};

#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// Deposits, optionally restricted to one student, oldest first
    async fn deposits_list(&self, student_id: Option<i32>) -> AppResult<Vec<Deposit>>;

    async fn deposits_get(&self, id: i32) -> AppResult<Option<Deposit>>;

    /// Insert a deposit and credit the student balance atomically
    async fn deposit_apply(&self, student_id: i32, kind: DepositKind, amount: Decimal) -> AppResult<DepositReceipt>;

    /// Delete a deposit and debit its amount from the student balance atomically
    async fn deposit_revert(&self, id: i32) -> AppResult<DepositReceipt>;

    /// Loans, optionally restricted to one student, oldest first
    async fn loans_list(&self, student_id: Option<i32>) -> AppResult<Vec<Loan>>;

    async fn loans_get(&self, id: i32) -> AppResult<Option<Loan>>;

    /// First active loan of the pair, by ascending id
    async fn loans_find_active(&self, student_id: i32, book_id: i32) -> AppResult<Option<Loan>>;

    /// Insert a loan and take one copy off the shelf atomically.
    ///
    /// Fails with `Unavailable` when the book has no copy left at commit time.
    async fn loan_open(&self, loan: &NewLoan) -> AppResult<LoanReceipt>;

    /// Delete a loan and put its copy back atomically, refunding the charge if asked
    async fn loan_close(&self, id: i32, refund_balance: bool) -> AppResult<LoanReceipt>;
}

fn student_not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Student with id {} not found", id))
}

fn book_not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Book with id {} not found", id))
}

#[async_trait]
impl LedgerRepository for PgRepository {
    async fn deposits_list(&self, student_id: Option<i32>) -> AppResult<Vec<Deposit>> {
        let rows = sqlx::query_as::<_, Deposit>(
            "SELECT * FROM deposits WHERE ($1::INTEGER IS NULL OR student_id = $1) ORDER BY created_at, id",
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn deposits_get(&self, id: i32) -> AppResult<Option<Deposit>> {
        let row = sqlx::query_as::<_, Deposit>("SELECT * FROM deposits WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn deposit_apply(&self, student_id: i32, kind: DepositKind, amount: Decimal) -> AppResult<DepositReceipt> {
        let mut tx = self.pool.begin().await?;

        let student = sqlx::query_as::<_, Student>(
            "UPDATE students SET balance = balance + $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(amount)
        .bind(student_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| student_not_found(student_id))?;

        let deposit = sqlx::query_as::<_, Deposit>(
            "INSERT INTO deposits (student_id, kind, amount) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(student_id)
        .bind(kind)
        .bind(amount)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(DepositReceipt { deposit, student })
    }

    async fn deposit_revert(&self, id: i32) -> AppResult<DepositReceipt> {
        let mut tx = self.pool.begin().await?;

        let deposit = sqlx::query_as::<_, Deposit>("DELETE FROM deposits WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Deposit with id {} not found", id)))?;

        let student = sqlx::query_as::<_, Student>(
            "UPDATE students SET balance = balance - $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(deposit.amount)
        .bind(deposit.student_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(DepositReceipt { deposit, student })
    }

    async fn loans_list(&self, student_id: Option<i32>) -> AppResult<Vec<Loan>> {
        let rows = sqlx::query_as::<_, Loan>(
            "SELECT * FROM loans WHERE ($1::INTEGER IS NULL OR student_id = $1) ORDER BY loaned_at, id",
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn loans_get(&self, id: i32) -> AppResult<Option<Loan>> {
        let row = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn loans_find_active(&self, student_id: i32, book_id: i32) -> AppResult<Option<Loan>> {
        let row = sqlx::query_as::<_, Loan>(
            r#"
            SELECT * FROM loans
            WHERE student_id = $1 AND book_id = $2 AND returned_at IS NULL
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(student_id)
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn loan_open(&self, loan: &NewLoan) -> AppResult<LoanReceipt> {
        let mut tx = self.pool.begin().await?;

        let student_id: Option<i32> = if loan.charge_balance {
            sqlx::query_scalar(
                "UPDATE students SET balance = balance - $1, updated_at = NOW() WHERE id = $2 RETURNING id",
            )
            .bind(loan.amount)
            .bind(loan.student_id)
            .fetch_optional(&mut *tx)
            .await?
        } else {
            sqlx::query_scalar("SELECT id FROM students WHERE id = $1")
                .bind(loan.student_id)
                .fetch_optional(&mut *tx)
                .await?
        };
        if student_id.is_none() {
            return Err(student_not_found(loan.student_id));
        }

        // The guard makes the stock check and the decrement one statement
        let book = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET available_copies = available_copies - 1, updated_at = NOW()
            WHERE id = $1 AND available_copies > 0
            RETURNING *
            "#,
        )
        .bind(loan.book_id)
        .fetch_optional(&mut *tx)
        .await?;

        let book = match book {
            Some(book) => book,
            None => {
                let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE id = $1)")
                    .bind(loan.book_id)
                    .fetch_one(&mut *tx)
                    .await?;
                return Err(if exists {
                    AppError::Unavailable("Book is not available for loan".to_string())
                } else {
                    book_not_found(loan.book_id)
                });
            }
        };

        let created = sqlx::query_as::<_, Loan>(
            "INSERT INTO loans (student_id, book_id, amount) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(loan.student_id)
        .bind(loan.book_id)
        .bind(loan.amount)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(LoanReceipt { loan: created, book })
    }

    async fn loan_close(&self, id: i32, refund_balance: bool) -> AppResult<LoanReceipt> {
        let mut tx = self.pool.begin().await?;

        let loan = sqlx::query_as::<_, Loan>("DELETE FROM loans WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))?;

        let book = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET available_copies = available_copies + 1, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(loan.book_id)
        .fetch_one(&mut *tx)
        .await?;

        if refund_balance {
            sqlx::query("UPDATE students SET balance = balance + $1, updated_at = NOW() WHERE id = $2")
                .bind(loan.amount)
                .bind(loan.student_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(LoanReceipt { loan, book })
    }
}
