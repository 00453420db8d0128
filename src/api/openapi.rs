//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{admin, auth, health, loans, stats, titles, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Lutrin API",
        version = "0.3.0",
        description = "Library lending and reservation REST API",
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
        auth::me,
        // Titles
        titles::list_titles,
        titles::create_title,
        titles::get_title,
        titles::delete_title,
        titles::create_exemplar,
        titles::set_exemplar_state,
        titles::status_counts,
        titles::create_review,
        // Users
        users::list_users,
        users::create_user,
        users::get_user,
        users::delete_user,
        users::get_user_loans,
        users::renew_subscription,
        users::pay_penalties,
        // Loans
        loans::create_loan,
        loans::return_loan,
        loans::create_reservation,
        loans::cancel_reservation,
        // Stats
        stats::get_stats,
        stats::get_recommendations,
        // Admin
        admin::save_snapshots,
        admin::export_csv,
    ),
    components(
        schemas(
            // Auth
            auth::LoginRequest,
            auth::LoginResponse,
            // Titles
            crate::models::title::Title,
            crate::models::title::Exemplar,
            crate::models::title::ExemplarState,
            crate::models::title::Review,
            crate::models::title::HistoryEntry,
            crate::models::title::StatusCounts,
            titles::CreateTitleRequest,
            titles::CreateExemplarRequest,
            titles::SetExemplarStateRequest,
            titles::CreateReviewRequest,
            titles::ExemplarResponse,
            // Users
            crate::models::user::UserView,
            crate::models::user::CreateUser,
            crate::models::user::Subscription,
            crate::models::user::Loan,
            crate::models::user::Reservation,
            crate::policy::SubscriptionTier,
            users::RenewSubscriptionRequest,
            users::RenewSubscriptionResponse,
            users::PayPenaltiesResponse,
            // Loans
            loans::BorrowRequest,
            loans::ReturnRequest,
            loans::ReservationRequest,
            crate::services::lending::ReturnReceipt,
            // Stats
            crate::services::stats::StatsResponse,
            crate::services::stats::TitleStats,
            // Admin
            admin::ExportCsvRequest,
            admin::ExportCsvResponse,
            admin::SaveResponse,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Authentication endpoints"),
        (name = "titles", description = "Catalog management"),
        (name = "users", description = "Member management"),
        (name = "loans", description = "Lending and reservations"),
        (name = "stats", description = "Statistics and recommendations"),
        (name = "admin", description = "Persistence and exports")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
