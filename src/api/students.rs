//! Student endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        deposit::DepositReceipt,
        statement::Statement,
        student::{BalanceDeposit, Student, StudentInput},
    },
};

use super::AuthenticatedUser;

/// List students ordered by name
#[utoipa::path(
    get,
    path = "/students",
    tag = "students",
    responses(
        (status = 200, description = "All students", body = Vec<Student>)
    )
)]
pub async fn list_students(State(state): State<crate::AppState>) -> AppResult<Json<Vec<Student>>> {
    let students = state.services.students.list().await?;
    Ok(Json(students))
}

/// Get student by ID
#[utoipa::path(
    get,
    path = "/students/{id}",
    tag = "students",
    params(("id" = i32, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Student details", body = Student),
        (status = 404, description = "Student not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_student(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Student>> {
    let student = state.services.students.get(id).await?;
    Ok(Json(student))
}

/// Register a student
#[utoipa::path(
    post,
    path = "/students",
    tag = "students",
    security(("bearer_auth" = [])),
    request_body = StudentInput,
    responses(
        (status = 201, description = "Student created", body = Student),
        (status = 400, description = "Invalid fields", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_student(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(input): Json<StudentInput>,
) -> AppResult<(StatusCode, Json<Student>)> {
    let student = state.services.students.create(input, Some(claims.user_id)).await?;
    Ok((StatusCode::CREATED, Json(student)))
}

/// Replace a student's descriptive fields
#[utoipa::path(
    put,
    path = "/students/{id}",
    tag = "students",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Student ID")),
    request_body = StudentInput,
    responses(
        (status = 200, description = "Student updated", body = Student),
        (status = 400, description = "Invalid fields", body = crate::error::ErrorResponse),
        (status = 404, description = "Student not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_student(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(input): Json<StudentInput>,
) -> AppResult<Json<Student>> {
    let student = state.services.students.update(id, input).await?;
    Ok(Json(student))
}

/// Delete a student without deposits or loans
#[utoipa::path(
    delete,
    path = "/students/{id}",
    tag = "students",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Deleted student", body = Student),
        (status = 404, description = "Student not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Student has deposits or loans", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_student(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Student>> {
    let student = state
        .services
        .students
        .delete(id, &claims.name, Some(claims.user_id))
        .await?;
    Ok(Json(student))
}

/// Cash deposit straight onto a student's balance
#[utoipa::path(
    patch,
    path = "/students/{id}/deposit",
    tag = "students",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Student ID")),
    request_body = BalanceDeposit,
    responses(
        (status = 200, description = "Deposit recorded", body = DepositReceipt),
        (status = 400, description = "Amount not positive", body = crate::error::ErrorResponse),
        (status = 404, description = "Student not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn deposit_to_balance(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<BalanceDeposit>,
) -> AppResult<Json<DepositReceipt>> {
    let receipt = state.services.ledger.deposit_to_balance(id, request.amount).await?;
    Ok(Json(receipt))
}

/// E-mail the student's statement of loans and deposits
#[utoipa::path(
    post,
    path = "/students/{id}/statement",
    tag = "students",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Statement sent", body = Statement),
        (status = 404, description = "Student not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn send_statement(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Statement>> {
    let statement = state.services.ledger.send_statement(id).await?;
    Ok(Json(statement))
}
