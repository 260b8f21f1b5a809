//! In-process store
//!
//! The whole dataset sits behind one async mutex, so each trait method is
//! atomic with respect to every other call. Used for `memory://` database
//! URLs and throughout the test suites.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    remap, AuditRepository, BackupRepository, BooksRepository, LedgerRepository, RecoveryRepository, Store,
    StudentsRepository, UsersRepository,
};
use crate::{
    error::{AppError, AppResult},
    models::{
        add_amounts,
        backup::{BackupDocument, BackupUser, RecordCounts},
        book::{Book, BookInput},
        deposit::{Deposit, DepositKind, DepositReceipt},
        loan::{Loan, LoanReceipt, NewLoan},
        log_entry::{LogEntry, NewLogEntry},
        recovery::RecoveryCode,
        student::{Student, StudentInput},
        to_cents,
        user::{User, UserRecord},
    },
};

/// Rows keyed by a serial id, iterated in insertion order
#[derive(Debug)]
struct Table<T> {
    rows: BTreeMap<i32, T>,
    last_id: i32,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            last_id: 0,
        }
    }
}

impl<T: Clone> Table<T> {
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn get(&self, id: i32) -> Option<T> {
        self.rows.get(&id).cloned()
    }

    fn values(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }
}

#[derive(Debug, Default)]
struct Dataset {
    users: HashMap<Uuid, User>,
    students: Table<Student>,
    books: Table<Book>,
    deposits: Table<Deposit>,
    loans: Table<Loan>,
    recovery_codes: Table<RecoveryCode>,
    logs: Table<LogEntry>,
}

impl Dataset {
    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(email) && Some(u.id) != except)
    }

    fn student_mut(&mut self, id: i32) -> AppResult<&mut Student> {
        self.students
            .rows
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Student with id {} not found", id)))
    }
}

fn balance_out_of_range() -> AppError {
    AppError::Validation("amount: Balance would exceed the supported range".to_string())
}

#[derive(Clone, Default)]
pub struct MemoryRepository {
    data: Arc<Mutex<Dataset>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryRepository {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
impl StudentsRepository for MemoryRepository {
    async fn students_list(&self) -> AppResult<Vec<Student>> {
        let data = self.data.lock().await;
        let mut students: Vec<Student> = data.students.values().cloned().collect();
        students.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(students)
    }

    async fn students_get(&self, id: i32) -> AppResult<Option<Student>> {
        Ok(self.data.lock().await.students.get(id))
    }

    async fn students_create(&self, input: &StudentInput, created_by: Option<Uuid>) -> AppResult<Student> {
        let mut data = self.data.lock().await;
        let now = Utc::now();
        let student = Student {
            id: data.students.next_id(),
            name: input.name.clone(),
            class_name: input.class_name.clone(),
            guardian: input.guardian.clone(),
            email: input.email.clone(),
            notes: input.notes.clone(),
            balance: to_cents(Decimal::ZERO),
            created_by,
            created_at: now,
            updated_at: now,
        };
        data.students.rows.insert(student.id, student.clone());
        Ok(student)
    }

    async fn students_update(&self, id: i32, input: &StudentInput) -> AppResult<Option<Student>> {
        let mut data = self.data.lock().await;
        let Some(student) = data.students.rows.get_mut(&id) else {
            return Ok(None);
        };
        student.name = input.name.clone();
        student.class_name = input.class_name.clone();
        student.guardian = input.guardian.clone();
        student.email = input.email.clone();
        student.notes = input.notes.clone();
        student.updated_at = Utc::now();
        Ok(Some(student.clone()))
    }

    async fn students_delete(&self, id: i32) -> AppResult<Option<Student>> {
        let mut data = self.data.lock().await;
        let referenced = data.deposits.values().any(|d| d.student_id == id)
            || data.loans.values().any(|l| l.student_id == id);
        if referenced {
            return Err(AppError::Conflict("Record is referenced by other records".to_string()));
        }
        Ok(data.students.rows.remove(&id))
    }
}

#[async_trait]
impl BooksRepository for MemoryRepository {
    async fn books_list(&self) -> AppResult<Vec<Book>> {
        let data = self.data.lock().await;
        let mut books: Vec<Book> = data.books.values().cloned().collect();
        books.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(books)
    }

    async fn books_get(&self, id: i32) -> AppResult<Option<Book>> {
        Ok(self.data.lock().await.books.get(id))
    }

    async fn books_create(&self, input: &BookInput) -> AppResult<Book> {
        let mut data = self.data.lock().await;
        let now = Utc::now();
        let book = Book {
            id: data.books.next_id(),
            title: input.title.clone(),
            author: input.author.clone(),
            price: to_cents(input.price),
            available_copies: input.available_copies,
            created_at: now,
            updated_at: now,
        };
        data.books.rows.insert(book.id, book.clone());
        Ok(book)
    }

    async fn books_update(&self, id: i32, input: &BookInput) -> AppResult<Option<Book>> {
        let mut data = self.data.lock().await;
        let Some(book) = data.books.rows.get_mut(&id) else {
            return Ok(None);
        };
        book.title = input.title.clone();
        book.author = input.author.clone();
        book.price = to_cents(input.price);
        book.available_copies = input.available_copies;
        book.updated_at = Utc::now();
        Ok(Some(book.clone()))
    }

    async fn books_delete(&self, id: i32) -> AppResult<Option<Book>> {
        let mut data = self.data.lock().await;
        if data.loans.values().any(|l| l.book_id == id) {
            return Err(AppError::Conflict("Record is referenced by other records".to_string()));
        }
        Ok(data.books.rows.remove(&id))
    }
}

#[async_trait]
impl LedgerRepository for MemoryRepository {
    async fn deposits_list(&self, student_id: Option<i32>) -> AppResult<Vec<Deposit>> {
        let data = self.data.lock().await;
        Ok(data
            .deposits
            .values()
            .filter(|d| student_id.map_or(true, |id| d.student_id == id))
            .cloned()
            .collect())
    }

    async fn deposits_get(&self, id: i32) -> AppResult<Option<Deposit>> {
        Ok(self.data.lock().await.deposits.get(id))
    }

    async fn deposit_apply(&self, student_id: i32, kind: DepositKind, amount: Decimal) -> AppResult<DepositReceipt> {
        let mut data = self.data.lock().await;
        let now = Utc::now();

        let student = data.student_mut(student_id)?;
        student.balance = add_amounts(student.balance, amount).ok_or_else(balance_out_of_range)?;
        student.updated_at = now;
        let student = student.clone();

        let deposit = Deposit {
            id: data.deposits.next_id(),
            student_id,
            kind,
            amount: to_cents(amount),
            created_at: now,
        };
        data.deposits.rows.insert(deposit.id, deposit.clone());

        Ok(DepositReceipt { deposit, student })
    }

    async fn deposit_revert(&self, id: i32) -> AppResult<DepositReceipt> {
        let mut data = self.data.lock().await;

        let deposit = data
            .deposits
            .get(id)
            .ok_or_else(|| AppError::NotFound(format!("Deposit with id {} not found", id)))?;

        let student = data.student_mut(deposit.student_id)?;
        student.balance = add_amounts(student.balance, -deposit.amount).ok_or_else(balance_out_of_range)?;
        student.updated_at = Utc::now();
        let student = student.clone();

        data.deposits.rows.remove(&id);
        Ok(DepositReceipt { deposit, student })
    }

    async fn loans_list(&self, student_id: Option<i32>) -> AppResult<Vec<Loan>> {
        let data = self.data.lock().await;
        Ok(data
            .loans
            .values()
            .filter(|l| student_id.map_or(true, |id| l.student_id == id))
            .cloned()
            .collect())
    }

    async fn loans_get(&self, id: i32) -> AppResult<Option<Loan>> {
        Ok(self.data.lock().await.loans.get(id))
    }

    async fn loans_find_active(&self, student_id: i32, book_id: i32) -> AppResult<Option<Loan>> {
        let data = self.data.lock().await;
        let found = data
            .loans
            .values()
            .find(|l| l.student_id == student_id && l.book_id == book_id && l.is_active())
            .cloned();
        Ok(found)
    }

    async fn loan_open(&self, loan: &NewLoan) -> AppResult<LoanReceipt> {
        let mut data = self.data.lock().await;
        let now = Utc::now();

        // Validate everything before the first write
        data.student_mut(loan.student_id)?;
        let book = data
            .books
            .get(loan.book_id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", loan.book_id)))?;
        if book.available_copies <= 0 {
            return Err(AppError::Unavailable("Book is not available for loan".to_string()));
        }

        if loan.charge_balance {
            let student = data.student_mut(loan.student_id)?;
            student.balance = add_amounts(student.balance, -loan.amount).ok_or_else(balance_out_of_range)?;
            student.updated_at = now;
        }

        let book = data
            .books
            .rows
            .get_mut(&loan.book_id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", loan.book_id)))?;
        book.available_copies -= 1;
        book.updated_at = now;
        let book = book.clone();

        let created = Loan {
            id: data.loans.next_id(),
            student_id: loan.student_id,
            book_id: loan.book_id,
            amount: to_cents(loan.amount),
            loaned_at: now,
            returned_at: None,
        };
        data.loans.rows.insert(created.id, created.clone());

        Ok(LoanReceipt { loan: created, book })
    }

    async fn loan_close(&self, id: i32, refund_balance: bool) -> AppResult<LoanReceipt> {
        let mut data = self.data.lock().await;
        let now = Utc::now();

        let loan = data
            .loans
            .get(id)
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))?;
        if !data.books.rows.contains_key(&loan.book_id) {
            return Err(AppError::Internal(format!("Loan {} points to a missing book", id)));
        }

        if refund_balance {
            if let Some(student) = data.students.rows.get_mut(&loan.student_id) {
                student.balance = add_amounts(student.balance, loan.amount).ok_or_else(balance_out_of_range)?;
                student.updated_at = now;
            }
        }

        data.loans.rows.remove(&id);
        let book = data
            .books
            .rows
            .get_mut(&loan.book_id)
            .ok_or_else(|| AppError::Internal(format!("Loan {} points to a missing book", id)))?;
        book.available_copies += 1;
        book.updated_at = now;
        let book = book.clone();

        Ok(LoanReceipt { loan, book })
    }
}

#[async_trait]
impl UsersRepository for MemoryRepository {
    async fn users_list(&self) -> AppResult<Vec<User>> {
        let data = self.data.lock().await;
        let mut users: Vec<User> = data.users.values().cloned().collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    async fn users_get(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.data.lock().await.users.get(&id).cloned())
    }

    async fn users_get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let data = self.data.lock().await;
        Ok(data
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn users_create(&self, record: &UserRecord) -> AppResult<User> {
        let mut data = self.data.lock().await;
        if data.email_taken(&record.email, None) {
            return Err(AppError::Conflict("A record with the same unique value already exists".to_string()));
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: record.name.clone(),
            email: record.email.clone(),
            password_hash: record.password_hash.clone(),
            failed_attempts: 0,
            locked: false,
            created_at: now,
            updated_at: now,
        };
        data.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn users_update(&self, id: Uuid, record: &UserRecord) -> AppResult<Option<User>> {
        let mut data = self.data.lock().await;
        if data.email_taken(&record.email, Some(id)) {
            return Err(AppError::Conflict("A record with the same unique value already exists".to_string()));
        }
        let Some(user) = data.users.get_mut(&id) else {
            return Ok(None);
        };
        user.name = record.name.clone();
        user.email = record.email.clone();
        user.password_hash = record.password_hash.clone();
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn users_delete(&self, id: Uuid) -> AppResult<Option<User>> {
        let mut data = self.data.lock().await;
        let removed = data.users.remove(&id);
        if removed.is_some() {
            for student in data.students.rows.values_mut() {
                if student.created_by == Some(id) {
                    student.created_by = None;
                }
            }
            for entry in data.logs.rows.values_mut() {
                if entry.user_id == Some(id) {
                    entry.user_id = None;
                }
            }
        }
        Ok(removed)
    }

    async fn users_record_failed_login(&self, id: Uuid, max_attempts: i32) -> AppResult<Option<User>> {
        let mut data = self.data.lock().await;
        let Some(user) = data.users.get_mut(&id).filter(|u| !u.locked) else {
            return Ok(None);
        };
        user.failed_attempts += 1;
        user.locked = user.failed_attempts >= max_attempts;
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn users_reset_login_state(&self, id: Uuid) -> AppResult<Option<User>> {
        let mut data = self.data.lock().await;
        let Some(user) = data.users.get_mut(&id) else {
            return Ok(None);
        };
        user.failed_attempts = 0;
        user.locked = false;
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }
}

#[async_trait]
impl RecoveryRepository for MemoryRepository {
    async fn recovery_replace(&self, email: &str, code_hash: &str) -> AppResult<RecoveryCode> {
        let mut data = self.data.lock().await;
        data.recovery_codes
            .rows
            .retain(|_, c| !c.email.eq_ignore_ascii_case(email));

        let code = RecoveryCode {
            id: data.recovery_codes.next_id(),
            email: email.to_string(),
            code_hash: code_hash.to_string(),
            created_at: Utc::now(),
        };
        data.recovery_codes.rows.insert(code.id, code.clone());
        Ok(code)
    }

    async fn recovery_find_latest(&self, email: &str, code_hash: &str) -> AppResult<Option<RecoveryCode>> {
        let data = self.data.lock().await;
        Ok(data
            .recovery_codes
            .values()
            .filter(|c| c.email.eq_ignore_ascii_case(email) && c.code_hash == code_hash)
            .max_by_key(|c| (c.created_at, c.id))
            .cloned())
    }

    async fn recovery_list(&self, email: &str) -> AppResult<Vec<RecoveryCode>> {
        let data = self.data.lock().await;
        let mut codes: Vec<RecoveryCode> = data
            .recovery_codes
            .values()
            .filter(|c| c.email.eq_ignore_ascii_case(email))
            .cloned()
            .collect();
        codes.sort_by_key(|c| std::cmp::Reverse((c.created_at, c.id)));
        Ok(codes)
    }

    async fn recovery_consume(&self, code_id: i32, email: &str, password_hash: &str) -> AppResult<bool> {
        let mut data = self.data.lock().await;
        if data.recovery_codes.rows.remove(&code_id).is_none() {
            return Ok(false);
        }
        let now = Utc::now();
        for user in data.users.values_mut() {
            if user.email.eq_ignore_ascii_case(email) {
                user.password_hash = password_hash.to_string();
                user.updated_at = now;
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl AuditRepository for MemoryRepository {
    async fn logs_append(&self, entry: &NewLogEntry) -> AppResult<LogEntry> {
        let mut data = self.data.lock().await;
        let row = LogEntry {
            id: data.logs.next_id(),
            description: entry.description.clone(),
            details: entry.details.clone(),
            user_id: entry.user_id,
            created_at: Utc::now(),
        };
        data.logs.rows.insert(row.id, row.clone());
        Ok(row)
    }

    async fn logs_list(&self) -> AppResult<Vec<LogEntry>> {
        Ok(self.data.lock().await.logs.values().cloned().collect())
    }
}

#[async_trait]
impl BackupRepository for MemoryRepository {
    async fn snapshot(&self) -> AppResult<BackupDocument> {
        let data = self.data.lock().await;
        let mut users: Vec<User> = data.users.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);

        Ok(BackupDocument {
            users: users.into_iter().map(BackupUser::from).collect(),
            students: data.students.values().cloned().collect(),
            books: data.books.values().cloned().collect(),
            deposits: data.deposits.values().cloned().collect(),
            loans: data.loans.values().cloned().collect(),
            logs: data.logs.values().cloned().collect(),
            backup_date: Utc::now(),
        })
    }

    async fn restore(&self, document: &BackupDocument) -> AppResult<RecordCounts> {
        let now = Utc::now();
        let mut fresh = Dataset::default();

        let mut user_ids: HashMap<Uuid, Uuid> = HashMap::new();
        for user in &document.users {
            if fresh.email_taken(&user.email, None) {
                return Err(AppError::Conflict("A record with the same unique value already exists".to_string()));
            }
            let id = Uuid::new_v4();
            fresh.users.insert(
                id,
                User {
                    id,
                    name: user.name.clone(),
                    email: user.email.clone(),
                    password_hash: user.password_hash.clone(),
                    failed_attempts: user.failed_attempts,
                    locked: user.locked,
                    created_at: now,
                    updated_at: now,
                },
            );
            user_ids.insert(user.id, id);
        }

        let mut book_ids: HashMap<i32, i32> = HashMap::new();
        for book in &document.books {
            let id = fresh.books.next_id();
            fresh.books.rows.insert(
                id,
                Book {
                    id,
                    created_at: now,
                    updated_at: now,
                    ..book.clone()
                },
            );
            book_ids.insert(book.id, id);
        }

        let mut student_ids: HashMap<i32, i32> = HashMap::new();
        for student in &document.students {
            let id = fresh.students.next_id();
            fresh.students.rows.insert(
                id,
                Student {
                    id,
                    created_by: student.created_by.and_then(|u| user_ids.get(&u).copied()),
                    created_at: now,
                    updated_at: now,
                    ..student.clone()
                },
            );
            student_ids.insert(student.id, id);
        }

        for deposit in &document.deposits {
            let student_id = remap(&student_ids, deposit.student_id, "deposit", "student")?;
            let id = fresh.deposits.next_id();
            fresh.deposits.rows.insert(
                id,
                Deposit {
                    id,
                    student_id,
                    ..deposit.clone()
                },
            );
        }

        for loan in &document.loans {
            let student_id = remap(&student_ids, loan.student_id, "loan", "student")?;
            let book_id = remap(&book_ids, loan.book_id, "loan", "book")?;
            let id = fresh.loans.next_id();
            fresh.loans.rows.insert(
                id,
                Loan {
                    id,
                    student_id,
                    book_id,
                    ..loan.clone()
                },
            );
        }

        for entry in &document.logs {
            let id = fresh.logs.next_id();
            fresh.logs.rows.insert(
                id,
                LogEntry {
                    id,
                    user_id: entry.user_id.and_then(|u| user_ids.get(&u).copied()),
                    ..entry.clone()
                },
            );
        }

        let mut data = self.data.lock().await;
        fresh.recovery_codes = std::mem::take(&mut data.recovery_codes);
        *data = fresh;

        Ok(document.counts())
    }
}
