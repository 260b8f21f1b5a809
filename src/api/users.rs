//! Staff user endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::user::{User, UserInput},
};

use super::AuthenticatedUser;

/// List users
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All users", body = Vec<User>),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_users(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Vec<User>>> {
    let users = state.services.users.list().await?;
    Ok(Json(users))
}

/// Get user by ID
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User details", body = User),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<User>> {
    let user = state.services.users.get(id).await?;
    Ok(Json(user))
}

/// Create a user
///
/// Open so the first account can be created on an empty database.
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    request_body = UserInput,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid fields or weak password", body = crate::error::ErrorResponse),
        (status = 409, description = "E-mail already registered", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_user(
    State(state): State<crate::AppState>,
    Json(input): Json<UserInput>,
) -> AppResult<(StatusCode, Json<User>)> {
    let user = state.services.users.create(input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Replace a user's name, e-mail and password
#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UserInput,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 400, description = "Invalid fields or weak password", body = crate::error::ErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(input): Json<UserInput>,
) -> AppResult<Json<User>> {
    let user = state.services.users.update(id, input).await?;
    Ok(Json(user))
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.services.users.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Clear a user's lockout
#[utoipa::path(
    put,
    path = "/users/{id}/unlock",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User unlocked", body = User),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn unlock_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<User>> {
    let user = state.services.auth.unlock(id, Some(claims.user_id)).await?;
    Ok(Json(user))
}
