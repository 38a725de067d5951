//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, books, borrows, health, reviews, stats, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Libris API",
        version = "1.0.0",
        description = "Library borrow management REST API",
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
        auth::register,
        auth::me,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Reviews
        reviews::list_book_reviews,
        reviews::my_review,
        reviews::create_review,
        reviews::update_review,
        reviews::delete_review,
        // Borrows
        borrows::request_borrow,
        borrows::approve_borrow,
        borrows::reject_borrow,
        borrows::return_borrow,
        borrows::renew_borrow,
        borrows::pay_fine,
        borrows::my_borrows,
        borrows::current_borrows,
        borrows::my_fines,
        borrows::list_borrows,
        borrows::pending_borrows,
        borrows::overdue_borrows,
        // Users
        users::list_users,
        users::get_user,
        users::set_user_active,
        // Stats
        stats::dashboard,
    ),
    components(
        schemas(
            // Books
            crate::models::book::Book,
            crate::models::book::BookShort,
            crate::models::book::BookQuery,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            crate::models::book::BookPage,
            // Reviews
            crate::models::review::Review,
            crate::models::review::ReviewDetails,
            crate::models::review::CreateReview,
            crate::models::review::UpdateReview,
            crate::models::review::ReviewQuery,
            crate::models::review::ReviewPage,
            // Borrows
            crate::models::borrow::BorrowStatus,
            crate::models::borrow::BorrowRecord,
            crate::models::borrow::BorrowDetails,
            crate::models::borrow::CreateBorrowRequest,
            crate::models::borrow::RejectBorrowRequest,
            crate::models::borrow::BorrowQuery,
            crate::models::borrow::BorrowPage,
            crate::models::borrow::FinesSummary,
            // Users
            crate::models::user::User,
            crate::models::user::UserShort,
            crate::models::user::UserQuery,
            crate::models::user::LoginRequest,
            crate::models::user::LoginResponse,
            crate::models::user::CreateUser,
            crate::models::user::SetUserActive,
            crate::models::user::UserPage,
            // Stats
            stats::DashboardStats,
            stats::GenreCount,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Authentication endpoints"),
        (name = "books", description = "Catalog management"),
        (name = "reviews", description = "Book reviews"),
        (name = "borrows", description = "Borrow lifecycle"),
        (name = "users", description = "User management"),
        (name = "stats", description = "Statistics")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
