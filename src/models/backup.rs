//! Backup document exchanged with the maintenance endpoints

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    book::Book, deposit::Deposit, loan::Loan, log_entry::LogEntry, student::Student, user::User,
};

/// User as written to a backup, credentials included
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    #[serde(default)]
    pub failed_attempts: i32,
    #[serde(default)]
    pub locked: bool,
}

impl From<User> for BackupUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            failed_attempts: user.failed_attempts,
            locked: user.locked,
        }
    }
}

/// Full dataset snapshot
///
/// Ids in the document are only used to link records together; a restore
/// assigns fresh ids and remaps every reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupDocument {
    pub users: Vec<BackupUser>,
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub books: Vec<Book>,
    #[serde(default)]
    pub deposits: Vec<Deposit>,
    #[serde(default)]
    pub loans: Vec<Loan>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    #[serde(default = "Utc::now")]
    pub backup_date: DateTime<Utc>,
}

impl BackupDocument {
    pub fn counts(&self) -> RecordCounts {
        RecordCounts {
            users: self.users.len(),
            students: self.students.len(),
            books: self.books.len(),
            deposits: self.deposits.len(),
            loans: self.loans.len(),
            logs: self.logs.len(),
        }
    }
}

/// Number of records per entity in a backup or restore
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct RecordCounts {
    pub users: usize,
    pub students: usize,
    pub books: usize,
    pub deposits: usize,
    pub loans: usize,
    pub logs: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BackupSummary {
    pub message: String,
    pub file: String,
    pub backup_date: DateTime<Utc>,
    pub records: RecordCounts,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RestoreSummary {
    pub message: String,
    pub records: RecordCounts,
}
