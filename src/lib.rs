//! School Ledger Server
//!
//! REST JSON backend for a school canteen or library: students with a
//! running balance, deposits, book loans against limited stock, staff
//! accounts with lockout, password recovery and full backup/restore.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}

impl AppState {
    /// Wire services over an already opened store
    pub fn new(
        config: AppConfig,
        store: Arc<dyn repository::Store>,
        mailer: Arc<dyn services::email::Mailer>,
    ) -> Self {
        let services = services::Services::new(store, &config, mailer);
        Self {
            config: Arc::new(config),
            services: Arc::new(services),
        }
    }
}
