//! Review endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::review::{CreateReview, Review, ReviewDetails, ReviewPage, ReviewQuery, UpdateReview},
    AppState,
};

use super::AuthenticatedUser;

/// List a book's reviews
#[utoipa::path(
    get,
    path = "/books/{id}/reviews",
    tag = "reviews",
    params(
        ("id" = i32, Path, description = "Book ID"),
        ReviewQuery
    ),
    responses(
        (status = 200, description = "Paginated reviews, newest first", body = ReviewPage),
        (status = 404, description = "Book not found")
    )
)]
pub async fn list_book_reviews(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Query(query): Query<ReviewQuery>,
) -> AppResult<Json<ReviewPage>> {
    let page = state.services.reviews.book_reviews(id, &query).await?;
    Ok(Json(page))
}

/// Get own review of a book
#[utoipa::path(
    get,
    path = "/books/{id}/reviews/my",
    tag = "reviews",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "The caller's review, or null when none", body = Option<Review>),
        (status = 404, description = "Book not found")
    )
)]
pub async fn my_review(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Option<Review>>> {
    let review = state.services.reviews.my_review(claims.user_id, id).await?;
    Ok(Json(review))
}

/// Post a review for a borrowed book
#[utoipa::path(
    post,
    path = "/books/{id}/reviews",
    tag = "reviews",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    request_body = CreateReview,
    responses(
        (status = 201, description = "Review posted", body = ReviewDetails),
        (status = 400, description = "Invalid rating, or book never borrowed"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Already reviewed")
    )
)]
pub async fn create_review(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<CreateReview>,
) -> AppResult<(StatusCode, Json<ReviewDetails>)> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let review = state
        .services
        .reviews
        .add_review(claims.user_id, id, &request)
        .await?;
    let details = state.services.reviews.find_details(&review).await?;
    Ok((StatusCode::CREATED, Json(details)))
}

/// Edit own review
#[utoipa::path(
    put,
    path = "/reviews/{id}",
    tag = "reviews",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Review ID")
    ),
    request_body = UpdateReview,
    responses(
        (status = 200, description = "Review updated", body = Review),
        (status = 403, description = "Not the review's author"),
        (status = 404, description = "Review not found")
    )
)]
pub async fn update_review(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<UpdateReview>,
) -> AppResult<Json<Review>> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let review = state
        .services
        .reviews
        .update_review(id, claims.user_id, &request)
        .await?;
    Ok(Json(review))
}

/// Delete a review (author or admin)
#[utoipa::path(
    delete,
    path = "/reviews/{id}",
    tag = "reviews",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Review ID")
    ),
    responses(
        (status = 204, description = "Review deleted"),
        (status = 403, description = "Not the author nor an admin"),
        (status = 404, description = "Review not found")
    )
)]
pub async fn delete_review(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state
        .services
        .reviews
        .delete_review(id, claims.user_id, claims.is_admin())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
