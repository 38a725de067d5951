//! Reviews repository for database operations.
//!
//! The books table carries denormalized `average_rating` / `total_reviews`
//! columns; `refresh_book_rating` recomputes both from the reviews table
//! after every mutation.

use sqlx::{postgres::PgRow, Pool, Postgres, Row};

use crate::{
    error::{AppError, AppResult},
    models::{
        review::{Review, ReviewDetails},
        user::UserShort,
    },
};

#[derive(Clone)]
pub struct ReviewsRepository {
    pool: Pool<Postgres>,
}

/// Columns of reviews joined with the reviewer's short profile
const DETAILS_SELECT: &str = r#"
    SELECT r.id, r.book_id, r.user_id, r.rating, r.comment,
           r.created_at, r.updated_at,
           u.firstname AS reviewer_firstname, u.lastname AS reviewer_lastname,
           u.email AS reviewer_email
    FROM reviews r
    JOIN users u ON r.user_id = u.id
"#;

fn details_from_row(row: &PgRow) -> Result<ReviewDetails, sqlx::Error> {
    let review = Review {
        id: row.try_get("id")?,
        book_id: row.try_get("book_id")?,
        user_id: row.try_get("user_id")?,
        rating: row.try_get("rating")?,
        comment: row.try_get("comment")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    };

    let reviewer = UserShort {
        id: review.user_id,
        firstname: row.try_get("reviewer_firstname")?,
        lastname: row.try_get("reviewer_lastname")?,
        email: row.try_get("reviewer_email")?,
    };

    Ok(ReviewDetails { review, reviewer })
}

impl ReviewsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Option<Review>> {
        let review = sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(review)
    }

    /// The caller's own review of a book, if any
    pub async fn get_for_pair(&self, user_id: i32, book_id: i32) -> AppResult<Option<Review>> {
        let review = sqlx::query_as::<_, Review>(
            "SELECT * FROM reviews WHERE user_id = $1 AND book_id = $2",
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(review)
    }

    /// Reviews of a book, newest first, with reviewer names
    pub async fn list_for_book(
        &self,
        book_id: i32,
        page: i64,
        per_page: i64,
    ) -> AppResult<(Vec<ReviewDetails>, i64)> {
        let query = format!(
            "{DETAILS_SELECT} WHERE r.book_id = $1
             ORDER BY r.created_at DESC
             LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query(&query)
            .bind(book_id)
            .bind(per_page)
            .bind((page - 1) * per_page)
            .fetch_all(&self.pool)
            .await?;

        let items = rows
            .iter()
            .map(details_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE book_id = $1")
            .bind(book_id)
            .fetch_one(&self.pool)
            .await?;

        Ok((items, total))
    }

    /// Insert a review. The unique (user, book) index rejects duplicates.
    pub async fn create(
        &self,
        user_id: i32,
        book_id: i32,
        rating: i32,
        comment: Option<&str>,
    ) -> AppResult<Review> {
        let review = sqlx::query_as::<_, Review>(
            r#"
            INSERT INTO reviews (book_id, user_id, rating, comment)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(book_id)
        .bind(user_id)
        .bind(rating)
        .bind(comment)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict("You have already reviewed this book".to_string())
            }
            _ => AppError::from(e),
        })?;

        Ok(review)
    }

    pub async fn update(
        &self,
        id: i32,
        rating: Option<i32>,
        comment: Option<&str>,
    ) -> AppResult<Review> {
        let review = sqlx::query_as::<_, Review>(
            r#"
            UPDATE reviews SET
                rating = COALESCE($2, rating),
                comment = COALESCE($3, comment),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(rating)
        .bind(comment)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::ReviewNotFound(id))?;

        Ok(review)
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Recompute the book's rating aggregates from its reviews. Average is
    /// kept to one decimal place; both fall back to zero with no reviews.
    pub async fn refresh_book_rating(&self, book_id: i32) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE books SET
                average_rating = COALESCE(
                    (SELECT ROUND(AVG(rating)::numeric, 1)::double precision
                     FROM reviews WHERE book_id = $1),
                    0),
                total_reviews = (SELECT COUNT(*) FROM reviews WHERE book_id = $1),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(book_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Whether the user has ever held this book (an issued loan, current or
    /// past). Pending and rejected requests do not qualify.
    pub async fn has_borrowed(&self, user_id: i32, book_id: i32) -> AppResult<bool> {
        let held: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM borrow_records
                WHERE user_id = $1 AND book_id = $2
                  AND status IN ('borrowed', 'returned', 'overdue')
            )
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(held)
    }
}
