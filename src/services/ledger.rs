//! Ledger engine: deposits, loans and the balance/stock they move

use std::{collections::HashMap, sync::Arc};

use rust_decimal::Decimal;

use crate::{
    config::LedgerMode,
    error::{AppError, AppResult},
    models::{
        deposit::{DepositDetails, DepositKind, DepositReceipt},
        loan::{LoanDetails, LoanReceipt, NewLoan},
        statement::{Statement, StatementLine, StatementLineKind},
        max_amount, to_cents, Book, Student,
    },
    repository::{BooksRepository, LedgerRepository, Store, StudentsRepository},
    services::email::{Mailer, OutgoingEmail},
};

#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn Store>,
    mailer: Arc<dyn Mailer>,
    mode: LedgerMode,
}

impl LedgerService {
    pub fn new(store: Arc<dyn Store>, mailer: Arc<dyn Mailer>, mode: LedgerMode) -> Self {
        Self { store, mailer, mode }
    }

    pub fn mode(&self) -> LedgerMode {
        self.mode
    }

    /// Credit a student; the deposit and the balance change commit together
    pub async fn create_deposit(&self, student_id: i32, kind: DepositKind, amount: Decimal) -> AppResult<DepositReceipt> {
        let amount = to_cents(amount);
        if amount <= Decimal::ZERO {
            return Err(AppError::Validation("amount: Amount must be greater than zero".to_string()));
        }
        if amount > max_amount() {
            return Err(AppError::Validation(format!("amount: Amount must not exceed {}", max_amount())));
        }

        let receipt = self.store.deposit_apply(student_id, kind, amount).await?;
        tracing::info!(
            deposit_id = receipt.deposit.id,
            student_id,
            %amount,
            balance = %receipt.student.balance,
            "Deposit created"
        );
        Ok(receipt)
    }

    /// Cash deposit made through `PATCH /students/{id}/deposit`
    pub async fn deposit_to_balance(&self, student_id: i32, amount: Decimal) -> AppResult<DepositReceipt> {
        self.create_deposit(student_id, DepositKind::Cash, amount).await
    }

    /// Remove a deposit and take its amount back off the balance
    pub async fn delete_deposit(&self, id: i32) -> AppResult<DepositReceipt> {
        let receipt = self.store.deposit_revert(id).await?;
        tracing::info!(
            deposit_id = id,
            student_id = receipt.student.id,
            balance = %receipt.student.balance,
            "Deposit deleted"
        );
        Ok(receipt)
    }

    /// Lend one copy of a book, charging its current price
    pub async fn create_loan(&self, student_id: i32, book_id: i32) -> AppResult<LoanReceipt> {
        self.store
            .students_get(student_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Student with id {} not found", student_id)))?;
        let book = self
            .store
            .books_get(book_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))?;

        if book.available_copies <= 0 {
            tracing::warn!(book_id, student_id, "Loan rejected, no copies available");
            return Err(AppError::Unavailable("Book is not available for loan".to_string()));
        }

        // The store re-checks stock inside its own transaction
        let receipt = self
            .store
            .loan_open(&NewLoan {
                student_id,
                book_id,
                amount: book.price,
                charge_balance: self.mode.charges_balance(),
            })
            .await?;

        tracing::info!(
            loan_id = receipt.loan.id,
            student_id,
            book_id,
            available_copies = receipt.book.available_copies,
            "Loan created"
        );
        Ok(receipt)
    }

    /// Delete a loan and put the copy back on the shelf
    pub async fn delete_loan(&self, id: i32) -> AppResult<LoanReceipt> {
        let receipt = self.store.loan_close(id, self.mode.charges_balance()).await?;
        tracing::info!(
            loan_id = id,
            book_id = receipt.book.id,
            available_copies = receipt.book.available_copies,
            "Loan deleted"
        );
        Ok(receipt)
    }

    /// Return a book by (student, book) pair.
    ///
    /// When the student holds several copies of the same book the oldest
    /// loan (lowest id) is the one closed.
    pub async fn return_loan(&self, student_id: i32, book_id: i32) -> AppResult<LoanReceipt> {
        let loan = self
            .store
            .loans_find_active(student_id, book_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "No active loan of book {} for student {}",
                    book_id, student_id
                ))
            })?;

        self.delete_loan(loan.id).await
    }

    pub async fn list_deposits(&self, student_id: Option<i32>) -> AppResult<Vec<DepositDetails>> {
        let deposits = self.store.deposits_list(student_id).await?;
        let students = self.students_by_id().await?;

        deposits
            .into_iter()
            .map(|deposit| {
                let student = lookup(&students, deposit.student_id, "student")?;
                Ok(DepositDetails { deposit, student })
            })
            .collect()
    }

    pub async fn list_loans(&self, student_id: Option<i32>) -> AppResult<Vec<LoanDetails>> {
        let loans = self.store.loans_list(student_id).await?;
        let students = self.students_by_id().await?;
        let books = self.books_by_id().await?;

        loans
            .into_iter()
            .map(|loan| {
                let student = lookup(&students, loan.student_id, "student")?;
                let book = lookup(&books, loan.book_id, "book")?;
                Ok(LoanDetails { loan, student, book })
            })
            .collect()
    }

    pub async fn get_loan(&self, id: i32) -> AppResult<LoanDetails> {
        let loan = self
            .store
            .loans_get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))?;
        let student = self
            .store
            .students_get(loan.student_id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Loan {} points to a missing student", id)))?;
        let book = self
            .store
            .books_get(loan.book_id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("Loan {} points to a missing book", id)))?;

        Ok(LoanDetails { loan, student, book })
    }

    /// Deposits as credits and loans as debits, oldest first
    pub async fn statement(&self, student_id: i32) -> AppResult<Statement> {
        let student = self
            .store
            .students_get(student_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Student with id {} not found", student_id)))?;

        let deposits = self.store.deposits_list(Some(student_id)).await?;
        let loans = self.list_loans(Some(student_id)).await?;

        let mut lines: Vec<StatementLine> = deposits
            .into_iter()
            .map(|d| StatementLine {
                date: d.created_at,
                kind: StatementLineKind::Deposit,
                description: d.kind.to_string(),
                debit: None,
                credit: Some(d.amount),
            })
            .chain(loans.into_iter().map(|l| StatementLine {
                date: l.loan.loaned_at,
                kind: StatementLineKind::Loan,
                description: format!("{} - {}", l.book.title, l.book.author),
                debit: Some(l.loan.amount),
                credit: None,
            }))
            .collect();
        lines.sort_by_key(|line| line.date);

        let total_debits = lines.iter().filter_map(|l| l.debit).sum();
        let total_credits = lines.iter().filter_map(|l| l.credit).sum();

        Ok(Statement {
            student,
            lines,
            total_debits,
            total_credits,
        })
    }

    /// E-mail the statement to the student's address
    pub async fn send_statement(&self, student_id: i32) -> AppResult<Statement> {
        let statement = self.statement(student_id).await?;
        let title = self.mode.title();

        self.mailer
            .send(OutgoingEmail {
                to: statement.student.email.clone(),
                subject: format!("{} - Loans and deposits statement", title),
                text: statement.to_text(),
                html: statement.to_html(title),
            })
            .await?;

        tracing::info!(student_id, "Statement e-mailed");
        Ok(statement)
    }

    async fn students_by_id(&self) -> AppResult<HashMap<i32, Student>> {
        Ok(self
            .store
            .students_list()
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect())
    }

    async fn books_by_id(&self) -> AppResult<HashMap<i32, Book>> {
        Ok(self
            .store
            .books_list()
            .await?
            .into_iter()
            .map(|b| (b.id, b))
            .collect())
    }
}

fn lookup<T: Clone>(rows: &HashMap<i32, T>, id: i32, what: &str) -> AppResult<T> {
    rows.get(&id)
        .cloned()
        .ok_or_else(|| AppError::Internal(format!("Dangling reference to {} {}", what, id)))
}
