//! JSON backup file and full restore

use std::{path::PathBuf, sync::Arc};

use crate::{
    config::BackupConfig,
    error::{AppError, AppResult},
    models::{
        backup::{BackupDocument, BackupSummary, RestoreSummary},
        log_entry::NewLogEntry,
    },
    repository::{AuditRepository, BackupRepository, Store},
};

#[derive(Clone)]
pub struct BackupService {
    store: Arc<dyn Store>,
    path: PathBuf,
}

impl BackupService {
    pub fn new(store: Arc<dyn Store>, config: BackupConfig) -> Self {
        Self {
            store,
            path: PathBuf::from(config.path),
        }
    }

    /// Snapshot the dataset and write it to the backup file
    pub async fn backup(&self) -> AppResult<BackupSummary> {
        let document = self.store.snapshot().await?;
        let json = serde_json::to_vec_pretty(&document)
            .map_err(|e| AppError::Internal(format!("Failed to serialize backup: {}", e)))?;

        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to write {}: {}", self.path.display(), e)))?;

        let records = document.counts();
        tracing::info!(file = %self.path.display(), ?records, "Backup written");

        Ok(BackupSummary {
            message: "Backup created successfully".to_string(),
            file: self.file_name(),
            backup_date: document.backup_date,
            records,
        })
    }

    /// Replace the dataset with the content of the backup file
    pub async fn restore(&self, actor: Option<uuid::Uuid>) -> AppResult<RestoreSummary> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::NotFound(format!("Backup file {} not found", self.file_name())));
            }
            Err(e) => {
                return Err(AppError::Internal(format!("Failed to read {}: {}", self.path.display(), e)));
            }
        };

        let value: serde_json::Value = serde_json::from_slice(&content)
            .map_err(|_| AppError::Validation("Backup file is not valid JSON".to_string()))?;

        self.restore_document(value, actor).await
    }

    /// Validate and restore a document already parsed as JSON
    pub async fn restore_document(&self, value: serde_json::Value, actor: Option<uuid::Uuid>) -> AppResult<RestoreSummary> {
        if !value.get("users").map_or(false, |u| u.is_array()) {
            return Err(AppError::Validation("Invalid or corrupted backup format".to_string()));
        }

        let document: BackupDocument = serde_json::from_value(value)
            .map_err(|e| AppError::Validation(format!("Invalid or corrupted backup format: {}", e)))?;

        let records = self.store.restore(&document).await?;

        // Ids were regenerated, so the actor is recorded by its old id only
        let details = match actor {
            Some(actor) => format!("Backup of {} restored by {}", document.backup_date.to_rfc3339(), actor),
            None => format!("Backup of {} restored", document.backup_date.to_rfc3339()),
        };
        self.store
            .logs_append(&NewLogEntry::new("Backup restored", details, None))
            .await?;

        tracing::info!(?records, "Backup restored");
        Ok(RestoreSummary {
            message: "Data restored successfully".to_string(),
            records,
        })
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;
    use crate::{
        models::{
            backup::RecordCounts, book::BookInput, deposit::DepositKind, loan::NewLoan, student::StudentInput,
            user::UserRecord,
        },
        repository::{BooksRepository, LedgerRepository, MemoryRepository, StudentsRepository, UsersRepository},
    };

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("ledger-{}-{}.json", name, uuid::Uuid::new_v4()))
    }

    async fn seeded_store() -> Arc<MemoryRepository> {
        let store = Arc::new(MemoryRepository::new());
        let user = store
            .users_create(&UserRecord {
                name: "Maria Aparecida".into(),
                email: "maria@school.example".into(),
                password_hash: "$argon2id$placeholder".into(),
            })
            .await
            .unwrap();
        let student = store
            .students_create(
                &StudentInput {
                    name: "Joana Silva Souza".into(),
                    class_name: "7A".into(),
                    guardian: "Carlos Silva Souza".into(),
                    email: "joana@school.example".into(),
                    notes: None,
                },
                Some(user.id),
            )
            .await
            .unwrap();
        let book = store
            .books_create(&BookInput {
                title: "Dom Casmurro".into(),
                author: "Machado de Assis".into(),
                price: Decimal::new(1500, 2),
                available_copies: 2,
            })
            .await
            .unwrap();
        store
            .deposit_apply(student.id, DepositKind::Pix, Decimal::new(5000, 2))
            .await
            .unwrap();
        store
            .loan_open(&NewLoan {
                student_id: student.id,
                book_id: book.id,
                amount: book.price,
                charge_balance: false,
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn backup_then_restore_round_trips_dataset() {
        let store = seeded_store().await;
        let path = temp_path("roundtrip");
        let service = BackupService::new(
            store.clone(),
            BackupConfig {
                path: path.display().to_string(),
            },
        );

        let summary = service.backup().await.unwrap();
        assert_eq!(
            summary.records,
            RecordCounts {
                users: 1,
                students: 1,
                books: 1,
                deposits: 1,
                loans: 1,
                logs: 0,
            }
        );

        // Changes made after the backup are rolled back by the restore
        let students = store.students_list().await.unwrap();
        store
            .deposit_apply(students[0].id, DepositKind::Cash, Decimal::new(100, 0))
            .await
            .unwrap();

        let restored = service.restore(None).await.unwrap();
        assert_eq!(restored.records, summary.records);

        let students = store.students_list().await.unwrap();
        assert_eq!(students[0].balance, Decimal::new(5000, 2));
        let user = store.users_get_by_email("maria@school.example").await.unwrap().unwrap();
        assert_eq!(students[0].created_by, Some(user.id));
        let loans = store.loans_list(Some(students[0].id)).await.unwrap();
        assert_eq!(loans.len(), 1);
        assert_eq!(store.books_get(loans[0].book_id).await.unwrap().unwrap().available_copies, 1);

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn missing_users_array_is_rejected() {
        let store = seeded_store().await;
        let service = BackupService::new(store.clone(), BackupConfig::default());

        let err = service.restore_document(json!({ "students": [] }), None).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let err = service.restore_document(json!({ "users": {} }), None).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        // Nothing was touched
        assert_eq!(store.students_list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dangling_reference_aborts_restore() {
        let store = seeded_store().await;
        let service = BackupService::new(store.clone(), BackupConfig::default());

        let document = json!({
            "users": [],
            "deposits": [{
                "id": 1,
                "student_id": 42,
                "kind": "cash",
                "amount": "10.00",
                "created_at": "2025-03-01T10:00:00Z"
            }]
        });
        let err = service.restore_document(document, None).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(store.students_list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_user_emails_abort_restore() {
        let store = seeded_store().await;
        let service = BackupService::new(store.clone(), BackupConfig::default());

        let user = |email: &str| {
            json!({
                "id": uuid::Uuid::new_v4(),
                "name": "Maria Aparecida",
                "email": email,
                "password_hash": "$argon2id$placeholder"
            })
        };
        let document = json!({
            "users": [user("ana@school.example"), user("ANA@school.example")]
        });
        let err = service.restore_document(document, None).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // The previous dataset is kept
        assert!(store.users_get_by_email("maria@school.example").await.unwrap().is_some());
        assert_eq!(store.students_list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let service = BackupService::new(
            Arc::new(MemoryRepository::new()),
            BackupConfig {
                path: temp_path("missing").display().to_string(),
            },
        );
        let err = service.restore(None).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
