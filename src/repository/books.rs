//! Books repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookQuery, CreateBook, UpdateBook},
    repository::BookStore,
};

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID, erroring when absent
    pub async fn require_by_id(&self, id: i32) -> AppResult<Book> {
        self.get_by_id(id)
            .await?
            .ok_or(AppError::BookNotFound(id))
    }

    /// List books with optional search/genre filter and pagination
    pub async fn list(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(10).clamp(1, 100);
        let search = query
            .search
            .as_ref()
            .map(|s| format!("%{}%", s.trim()));

        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT * FROM books
            WHERE ($1::text IS NULL OR title ILIKE $1 OR author ILIKE $1)
              AND ($2::text IS NULL OR genre = $2)
            ORDER BY title
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(&search)
        .bind(&query.genre)
        .bind(per_page)
        .bind((page - 1) * per_page)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM books
            WHERE ($1::text IS NULL OR title ILIKE $1 OR author ILIKE $1)
              AND ($2::text IS NULL OR genre = $2)
            "#,
        )
        .bind(&search)
        .bind(&query.genre)
        .fetch_one(&self.pool)
        .await?;

        Ok((books, total))
    }

    /// Create a new book; all copies start available
    pub async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let created = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (isbn, title, author, description, genre, total_copies, available_copies)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING *
            "#,
        )
        .bind(&book.isbn)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.description)
        .bind(&book.genre)
        .bind(book.total_copies)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict(format!("ISBN already exists: {:?}", book.isbn))
            }
            _ => AppError::from(e),
        })?;

        Ok(created)
    }

    /// Update book fields. Changing total_copies shifts available_copies by
    /// the same delta so borrowed copies stay accounted for.
    pub async fn update(&self, id: i32, update: &UpdateBook) -> AppResult<Book> {
        let updated = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                isbn = COALESCE($2, isbn),
                title = COALESCE($3, title),
                author = COALESCE($4, author),
                description = COALESCE($5, description),
                genre = COALESCE($6, genre),
                available_copies = available_copies + (COALESCE($7, total_copies) - total_copies),
                total_copies = COALESCE($7, total_copies),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&update.isbn)
        .bind(&update.title)
        .bind(&update.author)
        .bind(&update.description)
        .bind(&update.genre)
        .bind(update.total_copies)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::BookNotFound(id))?;

        Ok(updated)
    }

    /// Delete a book. Fails while any copy is out.
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let book = self.require_by_id(id).await?;

        if book.available_copies < book.total_copies {
            return Err(AppError::BookHasActiveCopies);
        }

        sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl BookStore for BooksRepository {
    async fn get_by_id(&self, id: i32) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(book)
    }

    async fn reserve_copy(&self, id: i32) -> AppResult<bool> {
        // The availability guard makes concurrent approvals race on this
        // single UPDATE instead of on a read-then-write sequence.
        let result = sqlx::query(
            "UPDATE books SET available_copies = available_copies - 1, updated_at = NOW()
             WHERE id = $1 AND available_copies > 0",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_copy(&self, id: i32) -> AppResult<()> {
        sqlx::query(
            "UPDATE books SET available_copies = LEAST(available_copies + 1, total_copies),
                              updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
