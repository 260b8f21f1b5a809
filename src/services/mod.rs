//! Business logic services

pub mod auth;
pub mod backup;
pub mod books;
pub mod email;
pub mod ledger;
pub mod recovery;
pub mod students;
pub mod users;

use std::sync::Arc;

use crate::{config::AppConfig, repository::Store};

use email::Mailer;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn Store>,
    pub auth: auth::AuthService,
    pub ledger: ledger::LedgerService,
    pub recovery: recovery::RecoveryService,
    pub backup: backup::BackupService,
    pub students: students::StudentsService,
    pub books: books::BooksService,
    pub users: users::UsersService,
}

impl Services {
    /// Create all services over one store and one mailer
    pub fn new(store: Arc<dyn Store>, config: &AppConfig, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            auth: auth::AuthService::new(store.clone(), config.auth.clone()),
            ledger: ledger::LedgerService::new(store.clone(), mailer.clone(), config.ledger.mode),
            recovery: recovery::RecoveryService::new(store.clone(), mailer, config.recovery.clone()),
            backup: backup::BackupService::new(store.clone(), config.backup.clone()),
            students: students::StudentsService::new(store.clone()),
            books: books::BooksService::new(store.clone()),
            users: users::UsersService::new(store.clone()),
            store,
        }
    }
}
