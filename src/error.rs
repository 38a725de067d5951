//! Error types for Libris server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Stable numeric error codes exposed to API clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Success = 0,
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NoSuchUser = 4,
    NoSuchBook = 5,
    NoSuchRecord = 6,
    UserInactive = 7,
    BorrowLimitExceeded = 8,
    DuplicateActiveBorrow = 9,
    RecordNotPending = 10,
    NoCopiesAvailable = 11,
    AlreadyReturned = 12,
    InvalidStatusForReturn = 13,
    RecordReturned = 14,
    RenewalLimitReached = 15,
    NoFineDue = 16,
    FineAlreadyPaid = 17,
    BadValue = 18,
    BookHasActiveCopies = 19,
    DuplicateValue = 20,
    NoSuchReview = 21,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("User with id {0} not found")]
    UserNotFound(i32),

    #[error("Book with id {0} not found")]
    BookNotFound(i32),

    #[error("Borrow record with id {0} not found")]
    RecordNotFound(i32),

    #[error("Review with id {0} not found")]
    ReviewNotFound(i32),

    #[error("User account is inactive")]
    UserInactive,

    #[error("Maximum of {0} active borrow requests/books reached")]
    BorrowLimitExceeded(i64),

    #[error("User already has a pending request or active borrow for this book")]
    DuplicateActiveBorrow,

    #[error("Cannot decide a request with status: {0}")]
    RecordNotPending(String),

    #[error("No copies available")]
    NoCopiesAvailable,

    #[error("Book already returned")]
    AlreadyReturned,

    #[error("Cannot return book with status: {0}")]
    InvalidStatusForReturn(String),

    #[error("Cannot renew a returned book")]
    RecordReturned,

    #[error("Maximum renewal limit reached ({0} renewals)")]
    RenewalLimitReached(i32),

    #[error("No fine to pay")]
    NoFineDue,

    #[error("Fine already paid")]
    FineAlreadyPaid,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Book still has borrowed copies")]
    BookHasActiveCopies,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl AppError {
    /// Status code and machine-readable code for each outcome.
    /// Every domain error is a recoverable 4xx; failed lifecycle
    /// preconditions are conflicts with the record's current state, so they
    /// map to 409. Only infrastructure failures surface as 5xx.
    fn classify(&self) -> (StatusCode, ErrorCode) {
        match self {
            AppError::Authentication(_) => (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized),
            AppError::NotAuthorized(_) => (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized),
            AppError::UserNotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchUser),
            AppError::BookNotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchBook),
            AppError::RecordNotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchRecord),
            AppError::ReviewNotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchReview),
            AppError::UserInactive => (StatusCode::FORBIDDEN, ErrorCode::UserInactive),
            AppError::BorrowLimitExceeded(_) => {
                (StatusCode::CONFLICT, ErrorCode::BorrowLimitExceeded)
            }
            AppError::DuplicateActiveBorrow => {
                (StatusCode::CONFLICT, ErrorCode::DuplicateActiveBorrow)
            }
            AppError::RecordNotPending(_) => (StatusCode::CONFLICT, ErrorCode::RecordNotPending),
            AppError::NoCopiesAvailable => (StatusCode::CONFLICT, ErrorCode::NoCopiesAvailable),
            AppError::AlreadyReturned => (StatusCode::CONFLICT, ErrorCode::AlreadyReturned),
            AppError::InvalidStatusForReturn(_) => {
                (StatusCode::CONFLICT, ErrorCode::InvalidStatusForReturn)
            }
            AppError::RecordReturned => (StatusCode::CONFLICT, ErrorCode::RecordReturned),
            AppError::RenewalLimitReached(_) => {
                (StatusCode::CONFLICT, ErrorCode::RenewalLimitReached)
            }
            AppError::NoFineDue => (StatusCode::CONFLICT, ErrorCode::NoFineDue),
            AppError::FineAlreadyPaid => (StatusCode::CONFLICT, ErrorCode::FineAlreadyPaid),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, ErrorCode::BadValue),
            AppError::Conflict(_) => (StatusCode::CONFLICT, ErrorCode::DuplicateValue),
            AppError::BookHasActiveCopies => {
                (StatusCode::CONFLICT, ErrorCode::BookHasActiveCopies)
            }
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DbFailure),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Failure),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.classify();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_preconditions_map_to_conflict() {
        let conflicts = [
            AppError::DuplicateActiveBorrow,
            AppError::BorrowLimitExceeded(5),
            AppError::RecordNotPending("rejected".to_string()),
            AppError::NoCopiesAvailable,
            AppError::AlreadyReturned,
            AppError::InvalidStatusForReturn("pending".to_string()),
            AppError::RecordReturned,
            AppError::RenewalLimitReached(2),
            AppError::NoFineDue,
            AppError::FineAlreadyPaid,
            AppError::Conflict("duplicate".to_string()),
            AppError::BookHasActiveCopies,
        ];
        for err in conflicts {
            assert_eq!(err.classify().0, StatusCode::CONFLICT, "{err}");
        }
    }

    #[test]
    fn malformed_input_is_a_bad_request_not_a_conflict() {
        let (status, code) = AppError::Validation("rating out of range".to_string()).classify();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code as u32, ErrorCode::BadValue as u32);
    }

    #[test]
    fn auth_and_lookup_failures_keep_their_statuses() {
        assert_eq!(
            AppError::Authentication("bad token".to_string()).classify().0,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::NotAuthorized("admin only".to_string()).classify().0,
            StatusCode::FORBIDDEN
        );
        assert_eq!(AppError::UserInactive.classify().0, StatusCode::FORBIDDEN);
        assert_eq!(AppError::UserNotFound(1).classify().0, StatusCode::NOT_FOUND);
        assert_eq!(AppError::BookNotFound(1).classify().0, StatusCode::NOT_FOUND);
        assert_eq!(AppError::RecordNotFound(1).classify().0, StatusCode::NOT_FOUND);
        assert_eq!(AppError::ReviewNotFound(1).classify().0, StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Internal("boom".to_string()).classify().0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
