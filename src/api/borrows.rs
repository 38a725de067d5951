//! Borrow lifecycle endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::borrow::{
        BorrowDetails, BorrowPage, BorrowQuery, BorrowRecord, CreateBorrowRequest, FinesSummary,
        RejectBorrowRequest,
    },
    AppState,
};

use super::AuthenticatedUser;

/// Request to borrow a book
#[utoipa::path(
    post,
    path = "/borrows",
    tag = "borrows",
    security(("bearer_auth" = [])),
    request_body = CreateBorrowRequest,
    responses(
        (status = 201, description = "Borrow request created", body = BorrowRecord),
        (status = 403, description = "Account deactivated"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Borrow limit reached or duplicate request")
    )
)]
pub async fn request_borrow(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateBorrowRequest>,
) -> AppResult<(StatusCode, Json<BorrowRecord>)> {
    let record = state
        .services
        .borrows
        .request_borrow(claims.user_id, request.book_id)
        .await?;

    Ok((StatusCode::CREATED, Json(record)))
}

/// Approve a pending borrow request (admin)
#[utoipa::path(
    post,
    path = "/borrows/{id}/approve",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrow record ID")
    ),
    responses(
        (status = 200, description = "Request approved, loan issued", body = BorrowRecord),
        (status = 403, description = "Administrator privileges required"),
        (status = 404, description = "Record not found"),
        (status = 409, description = "Not pending, no copies, or borrower over limit")
    )
)]
pub async fn approve_borrow(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<BorrowRecord>> {
    claims.require_admin()?;

    let record = state
        .services
        .borrows
        .approve_request(id, claims.user_id)
        .await?;

    Ok(Json(record))
}

/// Reject a pending borrow request (admin)
#[utoipa::path(
    post,
    path = "/borrows/{id}/reject",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrow record ID")
    ),
    request_body = RejectBorrowRequest,
    responses(
        (status = 200, description = "Request rejected", body = BorrowRecord),
        (status = 403, description = "Administrator privileges required"),
        (status = 404, description = "Record not found"),
        (status = 409, description = "Record is not pending")
    )
)]
pub async fn reject_borrow(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<RejectBorrowRequest>,
) -> AppResult<Json<BorrowRecord>> {
    claims.require_admin()?;

    let record = state
        .services
        .borrows
        .reject_request(id, claims.user_id, request.reason)
        .await?;

    Ok(Json(record))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/borrows/{id}/return",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrow record ID")
    ),
    responses(
        (status = 200, description = "Book returned, fine fixed", body = BorrowRecord),
        (status = 403, description = "Not the borrower"),
        (status = 404, description = "Record not found"),
        (status = 409, description = "Already returned or not an issued loan")
    )
)]
pub async fn return_borrow(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<BorrowRecord>> {
    let record = state
        .services
        .borrows
        .return_book(id, claims.user_id, claims.is_admin())
        .await?;

    Ok(Json(record))
}

/// Renew a loan, extending the due date by 14 days
#[utoipa::path(
    post,
    path = "/borrows/{id}/renew",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrow record ID")
    ),
    responses(
        (status = 200, description = "Loan renewed", body = BorrowRecord),
        (status = 403, description = "Not the borrower"),
        (status = 404, description = "Record not found"),
        (status = 409, description = "Renewal limit reached or already returned")
    )
)]
pub async fn renew_borrow(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<BorrowRecord>> {
    let record = state
        .services
        .borrows
        .renew_book(id, claims.user_id)
        .await?;

    Ok(Json(record))
}

/// Pay the fine on a returned record
#[utoipa::path(
    post,
    path = "/borrows/{id}/pay-fine",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrow record ID")
    ),
    responses(
        (status = 200, description = "Fine settled", body = BorrowRecord),
        (status = 403, description = "Not the borrower"),
        (status = 404, description = "Record not found"),
        (status = 409, description = "No fine due or already paid")
    )
)]
pub async fn pay_fine(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<BorrowRecord>> {
    let record = state
        .services
        .borrows
        .pay_fine(id, claims.user_id)
        .await?;

    Ok(Json(record))
}

/// The authenticated user's borrow history
#[utoipa::path(
    get,
    path = "/borrows/my",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(BorrowQuery),
    responses(
        (status = 200, description = "Paginated borrow history", body = BorrowPage)
    )
)]
pub async fn my_borrows(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<BorrowQuery>,
) -> AppResult<Json<BorrowPage>> {
    let page = state
        .services
        .borrows
        .my_borrows(claims.user_id, &query)
        .await?;

    Ok(Json(page))
}

/// The authenticated user's currently held loans
#[utoipa::path(
    get,
    path = "/borrows/current",
    tag = "borrows",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Currently borrowed books", body = Vec<BorrowDetails>)
    )
)]
pub async fn current_borrows(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<BorrowDetails>>> {
    let items = state.services.borrows.current_borrows(claims.user_id).await?;
    Ok(Json(items))
}

/// The authenticated user's fines
#[utoipa::path(
    get,
    path = "/borrows/my-fines",
    tag = "borrows",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Fined records and unpaid total", body = FinesSummary)
    )
)]
pub async fn my_fines(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<FinesSummary>> {
    let summary = state.services.borrows.my_fines(claims.user_id).await?;
    Ok(Json(summary))
}

/// List all borrow records (admin)
#[utoipa::path(
    get,
    path = "/borrows",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(BorrowQuery),
    responses(
        (status = 200, description = "Paginated borrow records", body = BorrowPage),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn list_borrows(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<BorrowQuery>,
) -> AppResult<Json<BorrowPage>> {
    claims.require_admin()?;

    let page = state.services.borrows.all_borrows(&query).await?;
    Ok(Json(page))
}

/// List pending borrow requests (admin)
#[utoipa::path(
    get,
    path = "/borrows/pending",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(BorrowQuery),
    responses(
        (status = 200, description = "Pending requests", body = BorrowPage),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn pending_borrows(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<BorrowQuery>,
) -> AppResult<Json<BorrowPage>> {
    claims.require_admin()?;

    let page = state.services.borrows.pending_requests(&query).await?;
    Ok(Json(page))
}

/// List overdue loans with live fines (admin)
#[utoipa::path(
    get,
    path = "/borrows/overdue",
    tag = "borrows",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Overdue loans", body = Vec<BorrowDetails>),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn overdue_borrows(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<BorrowDetails>>> {
    claims.require_admin()?;

    let items = state.services.borrows.overdue_borrows().await?;
    Ok(Json(items))
}
