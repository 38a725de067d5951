//! Reviews service.
//!
//! A user may review a book only after actually holding it (a loan that
//! reached borrowed, overdue or returned), and only once per book. Every
//! mutation refreshes the book's denormalized rating aggregates.

use crate::{
    error::{AppError, AppResult},
    models::review::{CreateReview, Review, ReviewDetails, ReviewPage, ReviewQuery, UpdateReview},
    repository::Repository,
};

#[derive(Clone)]
pub struct ReviewsService {
    repository: Repository,
}

impl ReviewsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Public: a book's reviews, newest first
    pub async fn book_reviews(&self, book_id: i32, query: &ReviewQuery) -> AppResult<ReviewPage> {
        self.repository.books.require_by_id(book_id).await?;

        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(10).clamp(1, 100);

        let (items, total) = self
            .repository
            .reviews
            .list_for_book(book_id, page, per_page)
            .await?;

        Ok(ReviewPage {
            items,
            page,
            per_page,
            total,
        })
    }

    /// The caller's own review of a book, if any
    pub async fn my_review(&self, user_id: i32, book_id: i32) -> AppResult<Option<Review>> {
        self.repository.books.require_by_id(book_id).await?;
        self.repository.reviews.get_for_pair(user_id, book_id).await
    }

    /// Post a review for a book the caller has borrowed
    pub async fn add_review(
        &self,
        user_id: i32,
        book_id: i32,
        review: &CreateReview,
    ) -> AppResult<Review> {
        self.repository.books.require_by_id(book_id).await?;

        if !self.repository.reviews.has_borrowed(user_id, book_id).await? {
            return Err(AppError::Validation(
                "You can only review books you have borrowed".to_string(),
            ));
        }

        if self
            .repository
            .reviews
            .get_for_pair(user_id, book_id)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "You have already reviewed this book".to_string(),
            ));
        }

        let created = self
            .repository
            .reviews
            .create(user_id, book_id, review.rating, review.comment.as_deref())
            .await?;
        self.repository.reviews.refresh_book_rating(book_id).await?;

        tracing::info!(
            review_id = created.id,
            book_id,
            user_id,
            rating = created.rating,
            "review posted"
        );
        Ok(created)
    }

    /// Edit own review
    pub async fn update_review(
        &self,
        review_id: i32,
        user_id: i32,
        update: &UpdateReview,
    ) -> AppResult<Review> {
        let existing = self.require_review(review_id).await?;

        if existing.user_id != user_id {
            return Err(AppError::NotAuthorized(
                "You can only edit your own reviews".to_string(),
            ));
        }

        let updated = self
            .repository
            .reviews
            .update(review_id, update.rating, update.comment.as_deref())
            .await?;
        self.repository
            .reviews
            .refresh_book_rating(existing.book_id)
            .await?;

        Ok(updated)
    }

    /// Delete a review: its author, or any admin
    pub async fn delete_review(
        &self,
        review_id: i32,
        user_id: i32,
        is_admin: bool,
    ) -> AppResult<()> {
        let existing = self.require_review(review_id).await?;

        if existing.user_id != user_id && !is_admin {
            return Err(AppError::NotAuthorized(
                "You can only delete your own reviews".to_string(),
            ));
        }

        self.repository.reviews.delete(review_id).await?;
        self.repository
            .reviews
            .refresh_book_rating(existing.book_id)
            .await?;

        tracing::info!(review_id, book_id = existing.book_id, "review deleted");
        Ok(())
    }

    async fn require_review(&self, id: i32) -> AppResult<Review> {
        self.repository
            .reviews
            .get_by_id(id)
            .await?
            .ok_or(AppError::ReviewNotFound(id))
    }

    /// Helper for handlers that embed review details after a mutation
    pub async fn find_details(&self, review: &Review) -> AppResult<ReviewDetails> {
        let user = self
            .repository
            .users
            .require_by_id(review.user_id)
            .await?;
        Ok(ReviewDetails {
            review: review.clone(),
            reviewer: crate::models::user::UserShort {
                id: user.id,
                firstname: user.firstname,
                lastname: user.lastname,
                email: user.email,
            },
        })
    }
}
