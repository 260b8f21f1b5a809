//! Book catalogue and stock

use std::sync::Arc;

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookInput},
    repository::{BooksRepository, Store},
};

#[derive(Clone)]
pub struct BooksService {
    store: Arc<dyn Store>,
}

impl BooksService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> AppResult<Vec<Book>> {
        self.store.books_list().await
    }

    pub async fn get(&self, id: i32) -> AppResult<Book> {
        self.store.books_get(id).await?.ok_or_else(|| not_found(id))
    }

    pub async fn create(&self, input: BookInput) -> AppResult<Book> {
        input.validate()?;
        let book = self.store.books_create(&input).await?;
        tracing::info!(book_id = book.id, "Book created");
        Ok(book)
    }

    /// Replace a book; `available_copies` is taken as the new shelf count
    pub async fn update(&self, id: i32, input: BookInput) -> AppResult<Book> {
        input.validate()?;
        self.store.books_update(id, &input).await?.ok_or_else(|| not_found(id))
    }

    pub async fn delete(&self, id: i32) -> AppResult<Book> {
        let book = self.store.books_delete(id).await?.ok_or_else(|| not_found(id))?;
        tracing::info!(book_id = id, "Book deleted");
        Ok(book)
    }
}

fn not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Book with id {} not found", id))
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::repository::MemoryRepository;

    #[tokio::test]
    async fn crud_cycle() {
        let service = BooksService::new(Arc::new(MemoryRepository::new()));

        let book = service
            .create(BookInput {
                title: "Vidas Secas".into(),
                author: "Graciliano Ramos".into(),
                price: Decimal::new(12345, 3),
                available_copies: 3,
            })
            .await
            .unwrap();
        // Stored with two decimal places
        assert_eq!(book.price.to_string(), "12.35");

        let err = service
            .create(BookInput {
                title: "X".into(),
                author: "Graciliano Ramos".into(),
                price: Decimal::ONE,
                available_copies: 1,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        service.delete(book.id).await.unwrap();
        let err = service.get(book.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
