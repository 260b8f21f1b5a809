//! Students persistence

use async_trait::async_trait;
use uuid::Uuid;

use super::PgRepository;
use crate::{
    error::AppResult,
    models::student::{Student, StudentInput},
};

#[async_trait]
pub trait StudentsRepository: Send + Sync {
    async fn students_list(&self) -> AppResult<Vec<Student>>;

    async fn students_get(&self, id: i32) -> AppResult<Option<Student>>;

    /// Insert a student with a zero balance
    async fn students_create(&self, input: &StudentInput, created_by: Option<Uuid>) -> AppResult<Student>;

    /// Replace the descriptive fields; the balance is left untouched
    async fn students_update(&self, id: i32, input: &StudentInput) -> AppResult<Option<Student>>;

    /// Delete a student; fails with `Conflict` while deposits or loans reference it
    async fn students_delete(&self, id: i32) -> AppResult<Option<Student>>;
}

#[async_trait]
impl StudentsRepository for PgRepository {
    async fn students_list(&self) -> AppResult<Vec<Student>> {
        let rows = sqlx::query_as::<_, Student>("SELECT * FROM students ORDER BY name, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn students_get(&self, id: i32) -> AppResult<Option<Student>> {
        let row = sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn students_create(&self, input: &StudentInput, created_by: Option<Uuid>) -> AppResult<Student> {
        let row = sqlx::query_as::<_, Student>(
            r#"
            INSERT INTO students (name, class_name, guardian, email, notes, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&input.name)
        .bind(&input.class_name)
        .bind(&input.guardian)
        .bind(&input.email)
        .bind(&input.notes)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn students_update(&self, id: i32, input: &StudentInput) -> AppResult<Option<Student>> {
        let row = sqlx::query_as::<_, Student>(
            r#"
            UPDATE students
            SET name = $1, class_name = $2, guardian = $3, email = $4, notes = $5, updated_at = NOW()
            WHERE id = $6
            RETURNING *
            "#,
        )
        .bind(&input.name)
        .bind(&input.class_name)
        .bind(&input.guardian)
        .bind(&input.email)
        .bind(&input.notes)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn students_delete(&self, id: i32) -> AppResult<Option<Student>> {
        let row = sqlx::query_as::<_, Student>("DELETE FROM students WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}
