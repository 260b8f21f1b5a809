//! Backup and restore endpoints

use axum::{extract::State, Json};

use crate::{
    error::AppResult,
    models::backup::{BackupSummary, RestoreSummary},
};

use super::AuthenticatedUser;

/// Write a full backup file
#[utoipa::path(
    get,
    path = "/maintenance/backup",
    tag = "maintenance",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Backup written", body = BackupSummary)
    )
)]
pub async fn backup(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<BackupSummary>> {
    let summary = state.services.backup.backup().await?;
    Ok(Json(summary))
}

/// Replace all data with the backup file's content
#[utoipa::path(
    post,
    path = "/maintenance/restore",
    tag = "maintenance",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Data restored", body = RestoreSummary),
        (status = 400, description = "Backup file invalid", body = crate::error::ErrorResponse),
        (status = 404, description = "Backup file not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn restore(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<RestoreSummary>> {
    let summary = state.services.backup.restore(Some(claims.user_id)).await?;
    Ok(Json(summary))
}
