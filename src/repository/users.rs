//! Users repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::user::{User, UserQuery},
    repository::UserStore,
};

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get user by ID, erroring when absent
    pub async fn require_by_id(&self, id: i32) -> AppResult<User> {
        self.get_by_id(id)
            .await?
            .ok_or(AppError::UserNotFound(id))
    }

    /// Get user by email (login lookup)
    pub async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// List users with optional name/email search and pagination
    pub async fn list(&self, query: &UserQuery) -> AppResult<(Vec<User>, i64)> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
        let search = query.search.as_ref().map(|s| format!("%{}%", s.trim()));

        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE ($1::text IS NULL
                   OR firstname ILIKE $1 OR lastname ILIKE $1 OR email ILIKE $1)
            ORDER BY lastname, firstname
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(&search)
        .bind(per_page)
        .bind((page - 1) * per_page)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM users
            WHERE ($1::text IS NULL
                   OR firstname ILIKE $1 OR lastname ILIKE $1 OR email ILIKE $1)
            "#,
        )
        .bind(&search)
        .fetch_one(&self.pool)
        .await?;

        Ok((users, total))
    }

    /// Create a new user account with an already-hashed password
    pub async fn create(
        &self,
        email: &str,
        password_hash: &str,
        firstname: &str,
        lastname: &str,
        phone: Option<&str>,
    ) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password, firstname, lastname, phone)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(firstname)
        .bind(lastname)
        .bind(phone)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict(format!("Email already registered: {}", email))
            }
            _ => AppError::from(e),
        })?;

        Ok(user)
    }

    /// Toggle the is_active flag. Existing borrow records are untouched;
    /// deactivation only blocks new requests and approvals.
    pub async fn set_active(&self, id: i32, is_active: bool) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET is_active = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(is_active)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::UserNotFound(id))
    }
}

#[async_trait]
impl UserStore for UsersRepository {
    async fn get_by_id(&self, id: i32) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn increment_borrowed(&self, id: i32) -> AppResult<()> {
        sqlx::query("UPDATE users SET currently_borrowed = currently_borrowed + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn decrement_borrowed(&self, id: i32) -> AppResult<()> {
        sqlx::query(
            "UPDATE users SET currently_borrowed = GREATEST(currently_borrowed - 1, 0)
             WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
