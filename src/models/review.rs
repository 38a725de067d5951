//! Review model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Review model from database. One review per (user, book) pair.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Review {
    pub id: i32,
    pub book_id: i32,
    pub user_id: i32,
    /// 1 to 5 stars
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Review joined with its reviewer, for public book listings
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReviewDetails {
    #[serde(flatten)]
    pub review: Review,
    pub reviewer: crate::models::user::UserShort,
}

/// Create review request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateReview {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,
    #[validate(length(max = 1000, message = "Comment cannot exceed 1000 characters"))]
    pub comment: Option<String>,
}

/// Update review request. Absent fields keep their current value.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateReview {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: Option<i32>,
    #[validate(length(max = 1000, message = "Comment cannot exceed 1000 characters"))]
    pub comment: Option<String>,
}

/// Review query parameters
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ReviewQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Paginated review list response
#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewPage {
    pub items: Vec<ReviewDetails>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
}
