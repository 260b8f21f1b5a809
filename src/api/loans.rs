//! Loan endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::loan::{CreateLoan, LoanDetails, LoanReceipt, ReturnBook},
};

use super::{deposits::StudentFilter, AuthenticatedUser};

/// List loans with their students and books
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    params(StudentFilter),
    responses(
        (status = 200, description = "Loans, oldest first", body = Vec<LoanDetails>)
    )
)]
pub async fn list_loans(
    State(state): State<crate::AppState>,
    Query(filter): Query<StudentFilter>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state.services.ledger.list_loans(filter.student_id).await?;
    Ok(Json(loans))
}

/// Get loan by ID
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan details", body = LoanDetails),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_loan(State(state): State<crate::AppState>, Path(id): Path<i32>) -> AppResult<Json<LoanDetails>> {
    let loan = state.services.ledger.get_loan(id).await?;
    Ok(Json(loan))
}

/// Lend a book to a student
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = CreateLoan,
    responses(
        (status = 201, description = "Loan created", body = LoanReceipt),
        (status = 400, description = "No copies available", body = crate::error::ErrorResponse),
        (status = 404, description = "Student or book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Json(request): Json<CreateLoan>,
) -> AppResult<(StatusCode, Json<LoanReceipt>)> {
    let receipt = state
        .services
        .ledger
        .create_loan(request.student_id, request.book_id)
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// Delete a loan and restock its book
#[utoipa::path(
    delete,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Deleted loan and restocked book", body = LoanReceipt),
        (status = 404, description = "Loan not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<LoanReceipt>> {
    let receipt = state.services.ledger.delete_loan(id).await?;
    Ok(Json(receipt))
}

/// Return a book a student holds
#[utoipa::path(
    patch,
    path = "/loans/return/{student_id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("student_id" = i32, Path, description = "Student ID")),
    request_body = ReturnBook,
    responses(
        (status = 200, description = "Loan closed and book restocked", body = LoanReceipt),
        (status = 404, description = "No active loan for this pair", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(student_id): Path<i32>,
    Json(request): Json<ReturnBook>,
) -> AppResult<Json<LoanReceipt>> {
    let receipt = state.services.ledger.return_loan(student_id, request.book_id).await?;
    Ok(Json(receipt))
}
