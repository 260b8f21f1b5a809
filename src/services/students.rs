//! Student records

use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        log_entry::NewLogEntry,
        student::{Student, StudentInput},
    },
    repository::{AuditRepository, Store, StudentsRepository},
};

#[derive(Clone)]
pub struct StudentsService {
    store: Arc<dyn Store>,
}

impl StudentsService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> AppResult<Vec<Student>> {
        self.store.students_list().await
    }

    pub async fn get(&self, id: i32) -> AppResult<Student> {
        self.store.students_get(id).await?.ok_or_else(|| not_found(id))
    }

    /// Register a student with a zero balance
    pub async fn create(&self, input: StudentInput, created_by: Option<Uuid>) -> AppResult<Student> {
        input.validate()?;
        let student = self.store.students_create(&input, created_by).await?;
        tracing::info!(student_id = student.id, "Student created");
        Ok(student)
    }

    /// Replace the descriptive fields; the balance is left alone
    pub async fn update(&self, id: i32, input: StudentInput) -> AppResult<Student> {
        input.validate()?;
        self.store.students_update(id, &input).await?.ok_or_else(|| not_found(id))
    }

    /// Delete a student without ledger history and record who did it
    pub async fn delete(&self, id: i32, actor: &str, actor_id: Option<Uuid>) -> AppResult<Student> {
        let student = self.store.students_delete(id).await?.ok_or_else(|| not_found(id))?;

        self.store
            .logs_append(&NewLogEntry::new(
                format!("Student deleted: {}", student.name),
                format!("User: {}", actor),
                actor_id,
            ))
            .await?;

        tracing::info!(student_id = id, "Student deleted");
        Ok(student)
    }
}

fn not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Student with id {} not found", id))
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::{models::deposit::DepositKind, repository::{LedgerRepository, MemoryRepository}};

    fn input(name: &str) -> StudentInput {
        StudentInput {
            name: name.into(),
            class_name: "7A".into(),
            guardian: "Carlos Silva Souza".into(),
            email: "joana@school.example".into(),
            notes: Some("Allergic to peanuts".into()),
        }
    }

    #[tokio::test]
    async fn create_validates_fields() {
        let service = StudentsService::new(Arc::new(MemoryRepository::new()));

        let err = service.create(input("Jo"), None).await.unwrap_err();
        match err {
            AppError::Validation(msg) => assert!(msg.starts_with("name:")),
            other => panic!("unexpected error: {:?}", other),
        }

        let student = service.create(input("Joana Silva Souza"), None).await.unwrap();
        assert_eq!(student.balance, Decimal::ZERO);
    }

    #[tokio::test]
    async fn update_keeps_balance() {
        let store = Arc::new(MemoryRepository::new());
        let service = StudentsService::new(store.clone());
        let student = service.create(input("Joana Silva Souza"), None).await.unwrap();
        store
            .deposit_apply(student.id, DepositKind::Pix, Decimal::new(1000, 2))
            .await
            .unwrap();

        let updated = service.update(student.id, input("Joana Souza Lima")).await.unwrap();
        assert_eq!(updated.name, "Joana Souza Lima");
        assert_eq!(updated.balance, Decimal::new(1000, 2));

        let err = service.update(999, input("Joana Souza Lima")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_is_audited_and_blocked_by_history() {
        let store = Arc::new(MemoryRepository::new());
        let service = StudentsService::new(store.clone());

        let plain = service.create(input("Pedro Henrique Alves"), None).await.unwrap();
        service.delete(plain.id, "Maria Aparecida", None).await.unwrap();
        let logs = store.logs_list().await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].description, "Student deleted: Pedro Henrique Alves");
        assert_eq!(logs[0].details, "User: Maria Aparecida");

        let with_history = service.create(input("Joana Silva Souza"), None).await.unwrap();
        store
            .deposit_apply(with_history.id, DepositKind::Cash, Decimal::ONE)
            .await
            .unwrap();
        let err = service.delete(with_history.id, "Maria Aparecida", None).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let err = service.delete(999, "Maria Aparecida", None).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
