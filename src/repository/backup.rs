//! Full-dataset snapshot and restore

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{remap, PgRepository};
use crate::{
    error::AppResult,
    models::{
        backup::{BackupDocument, BackupUser, RecordCounts},
        Book, Deposit, Loan, LogEntry, Student, User,
    },
};

#[async_trait]
pub trait BackupRepository: Send + Sync {
    /// Read every user, student, book, deposit, loan and log entry
    async fn snapshot(&self) -> AppResult<BackupDocument>;

    /// Replace the whole dataset with the document's records.
    ///
    /// Records get fresh ids; references are rewritten to follow them.
    async fn restore(&self, document: &BackupDocument) -> AppResult<RecordCounts>;
}

#[async_trait]
impl BackupRepository for PgRepository {
    async fn snapshot(&self) -> AppResult<BackupDocument> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await?;
        let students = sqlx::query_as::<_, Student>("SELECT * FROM students ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        let books = sqlx::query_as::<_, Book>("SELECT * FROM books ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        let deposits = sqlx::query_as::<_, Deposit>("SELECT * FROM deposits ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        let loans = sqlx::query_as::<_, Loan>("SELECT * FROM loans ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        let logs = sqlx::query_as::<_, LogEntry>("SELECT * FROM logs ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(BackupDocument {
            users: users.into_iter().map(BackupUser::from).collect(),
            students,
            books,
            deposits,
            loans,
            logs,
            backup_date: Utc::now(),
        })
    }

    async fn restore(&self, document: &BackupDocument) -> AppResult<RecordCounts> {
        let mut tx = self.pool.begin().await?;

        // Children before parents
        for table in ["loans", "deposits", "students", "books", "logs", "users"] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await?;
        }

        let mut user_ids: HashMap<Uuid, Uuid> = HashMap::new();
        for user in &document.users {
            let id = Uuid::new_v4();
            sqlx::query(
                r#"
                INSERT INTO users (id, name, email, password_hash, failed_attempts, locked)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.failed_attempts)
            .bind(user.locked)
            .execute(&mut *tx)
            .await?;
            user_ids.insert(user.id, id);
        }

        let mut book_ids: HashMap<i32, i32> = HashMap::new();
        for book in &document.books {
            let id: i32 = sqlx::query_scalar(
                "INSERT INTO books (title, author, price, available_copies) VALUES ($1, $2, $3, $4) RETURNING id",
            )
            .bind(&book.title)
            .bind(&book.author)
            .bind(book.price)
            .bind(book.available_copies)
            .fetch_one(&mut *tx)
            .await?;
            book_ids.insert(book.id, id);
        }

        let mut student_ids: HashMap<i32, i32> = HashMap::new();
        for student in &document.students {
            let created_by = student.created_by.and_then(|u| user_ids.get(&u).copied());
            let id: i32 = sqlx::query_scalar(
                r#"
                INSERT INTO students (name, class_name, guardian, email, notes, balance, created_by)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id
                "#,
            )
            .bind(&student.name)
            .bind(&student.class_name)
            .bind(&student.guardian)
            .bind(&student.email)
            .bind(&student.notes)
            .bind(student.balance)
            .bind(created_by)
            .fetch_one(&mut *tx)
            .await?;
            student_ids.insert(student.id, id);
        }

        for deposit in &document.deposits {
            let student_id = remap(&student_ids, deposit.student_id, "deposit", "student")?;
            sqlx::query(
                "INSERT INTO deposits (student_id, kind, amount, created_at) VALUES ($1, $2, $3, $4)",
            )
            .bind(student_id)
            .bind(deposit.kind)
            .bind(deposit.amount)
            .bind(deposit.created_at)
            .execute(&mut *tx)
            .await?;
        }

        for loan in &document.loans {
            let student_id = remap(&student_ids, loan.student_id, "loan", "student")?;
            let book_id = remap(&book_ids, loan.book_id, "loan", "book")?;
            sqlx::query(
                r#"
                INSERT INTO loans (student_id, book_id, amount, loaned_at, returned_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(student_id)
            .bind(book_id)
            .bind(loan.amount)
            .bind(loan.loaned_at)
            .bind(loan.returned_at)
            .execute(&mut *tx)
            .await?;
        }

        for entry in &document.logs {
            let user_id = entry.user_id.and_then(|u| user_ids.get(&u).copied());
            sqlx::query(
                "INSERT INTO logs (description, details, user_id, created_at) VALUES ($1, $2, $3, $4)",
            )
            .bind(&entry.description)
            .bind(&entry.details)
            .bind(user_id)
            .bind(entry.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(document.counts())
    }
}
