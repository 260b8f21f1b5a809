//! Deposit endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    error::AppResult,
    models::deposit::{CreateDeposit, DepositDetails, DepositReceipt},
};

use super::AuthenticatedUser;

/// Optional filter on list endpoints
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StudentFilter {
    /// Only records of this student
    pub student_id: Option<i32>,
}

/// List deposits with their students
#[utoipa::path(
    get,
    path = "/deposits",
    tag = "deposits",
    params(StudentFilter),
    responses(
        (status = 200, description = "Deposits, oldest first", body = Vec<DepositDetails>)
    )
)]
pub async fn list_deposits(
    State(state): State<crate::AppState>,
    Query(filter): Query<StudentFilter>,
) -> AppResult<Json<Vec<DepositDetails>>> {
    let deposits = state.services.ledger.list_deposits(filter.student_id).await?;
    Ok(Json(deposits))
}

/// Credit a student's balance
#[utoipa::path(
    post,
    path = "/deposits",
    tag = "deposits",
    security(("bearer_auth" = [])),
    request_body = CreateDeposit,
    responses(
        (status = 201, description = "Deposit created", body = DepositReceipt),
        (status = 400, description = "Amount not positive", body = crate::error::ErrorResponse),
        (status = 404, description = "Student not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_deposit(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Json(request): Json<CreateDeposit>,
) -> AppResult<(StatusCode, Json<DepositReceipt>)> {
    let receipt = state
        .services
        .ledger
        .create_deposit(request.student_id, request.kind, request.amount)
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// Delete a deposit and debit its amount back
#[utoipa::path(
    delete,
    path = "/deposits/{id}",
    tag = "deposits",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Deposit ID")),
    responses(
        (status = 200, description = "Deleted deposit and updated student", body = DepositReceipt),
        (status = 404, description = "Deposit not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_deposit(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<DepositReceipt>> {
    let receipt = state.services.ledger.delete_deposit(id).await?;
    Ok(Json(receipt))
}
