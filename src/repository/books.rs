//! Books persistence

use async_trait::async_trait;

use super::PgRepository;
use crate::{
    error::AppResult,
    models::book::{Book, BookInput},
};

#[async_trait]
pub trait BooksRepository: Send + Sync {
    async fn books_list(&self) -> AppResult<Vec<Book>>;

    async fn books_get(&self, id: i32) -> AppResult<Option<Book>>;

    async fn books_create(&self, input: &BookInput) -> AppResult<Book>;

    async fn books_update(&self, id: i32, input: &BookInput) -> AppResult<Option<Book>>;

    async fn books_delete(&self, id: i32) -> AppResult<Option<Book>>;
}

#[async_trait]
impl BooksRepository for PgRepository {
    async fn books_list(&self) -> AppResult<Vec<Book>> {
        let rows = sqlx::query_as::<_, Book>("SELECT * FROM books ORDER BY title, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn books_get(&self, id: i32) -> AppResult<Option<Book>> {
        let row = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn books_create(&self, input: &BookInput) -> AppResult<Book> {
        let row = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, author, price, available_copies)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&input.title)
        .bind(&input.author)
        .bind(input.price)
        .bind(input.available_copies)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn books_update(&self, id: i32, input: &BookInput) -> AppResult<Option<Book>> {
        let row = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET title = $1, author = $2, price = $3, available_copies = $4, updated_at = NOW()
            WHERE id = $5
            RETURNING *
            "#,
        )
        .bind(&input.title)
        .bind(&input.author)
        .bind(input.price)
        .bind(input.available_copies)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn books_delete(&self, id: i32) -> AppResult<Option<Book>> {
        let row = sqlx::query_as::<_, Book>("DELETE FROM books WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}
