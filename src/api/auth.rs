//! Login and password recovery endpoints

use axum::{extract::State, Json};

use crate::{
    error::AppResult,
    models::{
        recovery::{MessageResponse, RecoveryRequest, ResetPasswordRequest},
        user::{LoginRequest, LoginResponse},
    },
};

/// Login with e-mail and password
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Invalid e-mail or password", body = crate::error::ErrorResponse),
        (status = 403, description = "Account locked", body = crate::error::ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<crate::AppState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let response = state.services.auth.login(&request.email, &request.password).await?;
    Ok(Json(response))
}

/// Request a password recovery code
///
/// The answer is the same whether or not the e-mail is registered.
#[utoipa::path(
    post,
    path = "/auth/recover",
    tag = "auth",
    request_body = RecoveryRequest,
    responses(
        (status = 200, description = "Request accepted", body = MessageResponse),
        (status = 400, description = "E-mail missing", body = crate::error::ErrorResponse)
    )
)]
pub async fn request_recovery(
    State(state): State<crate::AppState>,
    Json(request): Json<RecoveryRequest>,
) -> AppResult<Json<MessageResponse>> {
    let response = state.services.recovery.request(&request.email).await?;
    Ok(Json(response))
}

/// Set a new password with a recovery code
#[utoipa::path(
    post,
    path = "/auth/reset",
    tag = "auth",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "Invalid or expired code, or password too short", body = crate::error::ErrorResponse)
    )
)]
pub async fn reset_password(
    State(state): State<crate::AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    let response = state
        .services
        .recovery
        .confirm(&request.email, &request.code, &request.new_password)
        .await?;
    Ok(Json(response))
}
