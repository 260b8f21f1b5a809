//! API handlers for the school ledger REST endpoints

pub mod auth;
pub mod books;
pub mod deposits;
pub mod health;
pub mod loans;
pub mod maintenance;
pub mod openapi;
pub mod students;
pub mod users;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    routing::{delete, get, patch, post, put},
    Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, models::user::UserClaims, AppState};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::Authentication("Missing or malformed bearer token".to_string()))?;

        let claims = state.services.auth.validate_token(bearer.token())?;
        Ok(AuthenticatedUser(claims))
    }
}

/// Build the application router with all routes
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Authentication
        .route("/auth/login", post(auth::login))
        .route("/auth/recover", post(auth::request_recovery))
        .route("/auth/reset", post(auth::reset_password))
        // Students
        .route("/students", get(students::list_students).post(students::create_student))
        .route(
            "/students/:id",
            get(students::get_student)
                .put(students::update_student)
                .delete(students::delete_student),
        )
        .route("/students/:id/deposit", patch(students::deposit_to_balance))
        .route("/students/:id/statement", post(students::send_statement))
        // Books
        .route("/books", get(books::list_books).post(books::create_book))
        .route(
            "/books/:id",
            get(books::get_book).put(books::update_book).delete(books::delete_book),
        )
        // Deposits
        .route("/deposits", get(deposits::list_deposits).post(deposits::create_deposit))
        .route("/deposits/:id", delete(deposits::delete_deposit))
        // Loans
        .route("/loans", get(loans::list_loans).post(loans::create_loan))
        .route("/loans/:id", get(loans::get_loan).delete(loans::delete_loan))
        .route("/loans/return/:student_id", patch(loans::return_loan))
        // Users
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/:id",
            get(users::get_user).put(users::update_user).delete(users::delete_user),
        )
        .route("/users/:id/unlock", put(users::unlock_user))
        // Maintenance
        .route("/maintenance/backup", get(maintenance::backup))
        .route("/maintenance/restore", post(maintenance::restore))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
