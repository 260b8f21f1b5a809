//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, books, deposits, health, loans, maintenance, students, users};
use crate::models;

/// Registers the bearer scheme referenced by protected paths
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "School Ledger API",
        version = "1.0.0",
        description = "Students, deposits, book loans and staff accounts for a school canteen or library",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::login,
        auth::request_recovery,
        auth::reset_password,
        // Students
        students::list_students,
        students::get_student,
        students::create_student,
        students::update_student,
        students::delete_student,
        students::deposit_to_balance,
        students::send_statement,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Deposits
        deposits::list_deposits,
        deposits::create_deposit,
        deposits::delete_deposit,
        // Loans
        loans::list_loans,
        loans::get_loan,
        loans::create_loan,
        loans::delete_loan,
        loans::return_loan,
        // Users
        users::list_users,
        users::get_user,
        users::create_user,
        users::update_user,
        users::delete_user,
        users::unlock_user,
        // Maintenance
        maintenance::backup,
        maintenance::restore,
    ),
    components(
        schemas(
            // Students
            models::student::Student,
            models::student::StudentInput,
            models::student::BalanceDeposit,
            models::statement::Statement,
            models::statement::StatementLine,
            models::statement::StatementLineKind,
            // Books
            models::book::Book,
            models::book::BookInput,
            // Deposits
            models::deposit::Deposit,
            models::deposit::DepositKind,
            models::deposit::CreateDeposit,
            models::deposit::DepositDetails,
            models::deposit::DepositReceipt,
            // Loans
            models::loan::Loan,
            models::loan::CreateLoan,
            models::loan::ReturnBook,
            models::loan::LoanDetails,
            models::loan::LoanReceipt,
            // Users and auth
            models::user::User,
            models::user::UserInput,
            models::user::LoginRequest,
            models::user::LoginResponse,
            models::recovery::RecoveryRequest,
            models::recovery::ResetPasswordRequest,
            models::recovery::MessageResponse,
            // Maintenance
            models::backup::BackupSummary,
            models::backup::RestoreSummary,
            models::backup::RecordCounts,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Login and password recovery"),
        (name = "students", description = "Student records and balances"),
        (name = "books", description = "Book catalogue and stock"),
        (name = "deposits", description = "Deposits credited to students"),
        (name = "loans", description = "Book loans"),
        (name = "users", description = "Staff user management"),
        (name = "maintenance", description = "Backup and restore")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new().merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_ledger_paths_and_bearer_scheme() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/loans/return/{student_id}"));
        assert!(doc.paths.paths.contains_key("/students/{id}/deposit"));
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
