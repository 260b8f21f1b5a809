//! Book endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::book::{Book, BookInput},
};

use super::AuthenticatedUser;

/// List books ordered by title
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    responses(
        (status = 200, description = "All books", body = Vec<Book>)
    )
)]
pub async fn list_books(State(state): State<crate::AppState>) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.books.list().await?;
    Ok(Json(books))
}

/// Get book by ID
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(State(state): State<crate::AppState>, Path(id): Path<i32>) -> AppResult<Json<Book>> {
    let book = state.services.books.get(id).await?;
    Ok(Json(book))
}

/// Add a book to the catalogue
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = BookInput,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Invalid fields", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Json(input): Json<BookInput>,
) -> AppResult<(StatusCode, Json<Book>)> {
    let book = state.services.books.create(input).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// Replace a book
#[utoipa::path(
    put,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    request_body = BookInput,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 400, description = "Invalid fields", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(input): Json<BookInput>,
) -> AppResult<Json<Book>> {
    let book = state.services.books.update(id, input).await?;
    Ok(Json(book))
}

/// Delete a book that was never loaned
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Deleted book", body = Book),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Book has loans", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Book>> {
    let book = state.services.books.delete(id).await?;
    Ok(Json(book))
}
