//! Persistence port and its adapters
//!
//! Services only see [`Store`], the union of the per-entity repository
//! traits. [`PgRepository`] backs it with Postgres; [`MemoryRepository`]
//! keeps everything in process for development and tests.

pub mod audit;
pub mod backup;
pub mod books;
pub mod ledger;
pub mod memory;
pub mod recovery;
pub mod students;
pub mod users;

use std::{collections::HashMap, fmt::Display, hash::Hash};

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

pub use audit::AuditRepository;
pub use backup::BackupRepository;
pub use books::BooksRepository;
pub use ledger::LedgerRepository;
pub use memory::MemoryRepository;
pub use recovery::RecoveryRepository;
pub use students::StudentsRepository;
pub use users::UsersRepository;

use crate::error::{AppError, AppResult};

/// Everything the services need from persistence
#[async_trait]
pub trait Store:
    StudentsRepository
    + BooksRepository
    + LedgerRepository
    + UsersRepository
    + RecoveryRepository
    + AuditRepository
    + BackupRepository
{
    /// Check that the backing store answers
    async fn ping(&self) -> AppResult<()>;
}

/// Postgres adapter holding the connection pool
#[derive(Clone)]
pub struct PgRepository {
    pool: Pool<Postgres>,
}

impl PgRepository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgRepository {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Translate a backup id through the map built while restoring parents
pub(crate) fn remap<K, V>(ids: &HashMap<K, V>, old: K, record: &str, parent: &str) -> AppResult<V>
where
    K: Eq + Hash + Display,
    V: Copy,
{
    ids.get(&old).copied().ok_or_else(|| {
        AppError::Validation(format!(
            "Backup {} references unknown {} {}",
            record, parent, old
        ))
    })
}
