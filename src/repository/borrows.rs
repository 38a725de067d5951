//! Borrow records repository for database operations.
//!
//! Every lifecycle transition is a single UPDATE guarded by the expected
//! current status (plus the availability/renewal guards where relevant), so
//! two requests racing on the same record resolve at the database: one
//! matches, the other sees rows_affected == 0.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, Pool, Postgres, Row};

use crate::{
    error::AppResult,
    models::{
        book::BookShort,
        borrow::{BorrowDetails, BorrowRecord, BorrowStatus, MAX_RENEWALS},
        user::UserShort,
    },
    repository::BorrowStore,
};

#[derive(Clone)]
pub struct BorrowsRepository {
    pool: Pool<Postgres>,
}

/// Columns of borrow_records joined with book (and user) shorts
const DETAILS_SELECT: &str = r#"
    SELECT br.id, br.user_id, br.book_id, br.request_date, br.borrow_date,
           br.due_date, br.return_date, br.status, br.approved_by,
           br.rejection_reason, br.fine_amount, br.fine_paid, br.renewal_count,
           b.title AS book_title, b.author AS book_author, b.genre AS book_genre,
           u.firstname AS user_firstname, u.lastname AS user_lastname,
           u.email AS user_email
    FROM borrow_records br
    JOIN books b ON br.book_id = b.id
    JOIN users u ON br.user_id = u.id
"#;

fn details_from_row(row: &PgRow, with_user: bool) -> Result<BorrowDetails, sqlx::Error> {
    let record = BorrowRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        book_id: row.try_get("book_id")?,
        request_date: row.try_get("request_date")?,
        borrow_date: row.try_get("borrow_date")?,
        due_date: row.try_get("due_date")?,
        return_date: row.try_get("return_date")?,
        status: row.try_get("status")?,
        approved_by: row.try_get("approved_by")?,
        rejection_reason: row.try_get("rejection_reason")?,
        fine_amount: row.try_get("fine_amount")?,
        fine_paid: row.try_get("fine_paid")?,
        renewal_count: row.try_get("renewal_count")?,
    };

    let book = BookShort {
        id: record.book_id,
        title: row.try_get("book_title")?,
        author: row.try_get("book_author")?,
        genre: row.try_get("book_genre")?,
    };

    let user = if with_user {
        Some(UserShort {
            id: record.user_id,
            firstname: row.try_get("user_firstname")?,
            lastname: row.try_get("user_lastname")?,
            email: row.try_get("user_email")?,
        })
    } else {
        None
    };

    Ok(BorrowDetails {
        record,
        book,
        user,
        current_fine: None,
    })
}

impl BorrowsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BorrowStore for BorrowsRepository {
    async fn create(&self, user_id: i32, book_id: i32) -> AppResult<BorrowRecord> {
        let record = sqlx::query_as::<_, BorrowRecord>(
            r#"
            INSERT INTO borrow_records (user_id, book_id, status, request_date)
            VALUES ($1, $2, 'pending', NOW())
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Option<BorrowRecord>> {
        let record =
            sqlx::query_as::<_, BorrowRecord>("SELECT * FROM borrow_records WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(record)
    }

    async fn count_active_for_user(&self, user_id: i32, include_pending: bool) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM borrow_records
            WHERE user_id = $1
              AND (status IN ('borrowed', 'overdue', 'approved')
                   OR ($2 AND status = 'pending'))
            "#,
        )
        .bind(user_id)
        .bind(include_pending)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn has_active_for_pair(&self, user_id: i32, book_id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM borrow_records
                WHERE user_id = $1 AND book_id = $2
                  AND status IN ('pending', 'approved', 'borrowed', 'overdue')
            )
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn approve_pending(
        &self,
        id: i32,
        admin_id: i32,
        borrow_date: DateTime<Utc>,
        due_date: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE borrow_records
            SET status = 'borrowed', borrow_date = $2, due_date = $3, approved_by = $4
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(borrow_date)
        .bind(due_date)
        .bind(admin_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn reject_pending(
        &self,
        id: i32,
        admin_id: i32,
        reason: Option<String>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE borrow_records
            SET status = 'rejected', approved_by = $2, rejection_reason = $3
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(admin_id)
        .bind(reason)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn complete_return(
        &self,
        id: i32,
        return_date: DateTime<Utc>,
        fine_amount: i64,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE borrow_records
            SET status = 'returned', return_date = $2, fine_amount = $3
            WHERE id = $1 AND status IN ('borrowed', 'overdue')
            "#,
        )
        .bind(id)
        .bind(return_date)
        .bind(fine_amount)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn renew(&self, id: i32, new_due_date: DateTime<Utc>) -> AppResult<bool> {
        // Renewal clears an overdue flag: the loan gets a fresh window until
        // the next sweep re-evaluates the extended due date.
        let result = sqlx::query(
            r#"
            UPDATE borrow_records
            SET status = 'borrowed', due_date = $2, renewal_count = renewal_count + 1
            WHERE id = $1 AND status IN ('borrowed', 'overdue') AND renewal_count < $3
            "#,
        )
        .bind(id)
        .bind(new_due_date)
        .bind(MAX_RENEWALS)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn mark_fine_paid(&self, id: i32) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE borrow_records
            SET fine_paid = TRUE
            WHERE id = $1 AND fine_amount > 0 AND fine_paid = FALSE
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn sweep_overdue(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE borrow_records SET status = 'overdue'
             WHERE status = 'borrowed' AND due_date < $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn list_for_user(
        &self,
        user_id: i32,
        status: Option<BorrowStatus>,
        page: i64,
        per_page: i64,
    ) -> AppResult<(Vec<BorrowDetails>, i64)> {
        let query = format!(
            "{DETAILS_SELECT}
             WHERE br.user_id = $1 AND ($2::text IS NULL OR br.status = $2)
             ORDER BY br.request_date DESC, br.borrow_date DESC
             LIMIT $3 OFFSET $4"
        );

        let rows = sqlx::query(&query)
            .bind(user_id)
            .bind(status.map(|s| s.as_str()))
            .bind(per_page)
            .bind((page - 1) * per_page)
            .fetch_all(&self.pool)
            .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            items.push(details_from_row(row, false)?);
        }

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM borrow_records
             WHERE user_id = $1 AND ($2::text IS NULL OR status = $2)",
        )
        .bind(user_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_one(&self.pool)
        .await?;

        Ok((items, total))
    }

    async fn list_current_for_user(&self, user_id: i32) -> AppResult<Vec<BorrowDetails>> {
        let query = format!(
            "{DETAILS_SELECT}
             WHERE br.user_id = $1 AND br.status IN ('borrowed', 'overdue')
             ORDER BY br.due_date"
        );

        let rows = sqlx::query(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            items.push(details_from_row(row, false)?);
        }

        Ok(items)
    }

    async fn list_fines_for_user(&self, user_id: i32) -> AppResult<Vec<BorrowDetails>> {
        let query = format!(
            "{DETAILS_SELECT}
             WHERE br.user_id = $1 AND br.fine_amount > 0
             ORDER BY br.return_date DESC"
        );

        let rows = sqlx::query(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            items.push(details_from_row(row, false)?);
        }

        Ok(items)
    }

    async fn list_all(
        &self,
        status: Option<BorrowStatus>,
        page: i64,
        per_page: i64,
    ) -> AppResult<(Vec<BorrowDetails>, i64)> {
        let query = format!(
            "{DETAILS_SELECT}
             WHERE ($1::text IS NULL OR br.status = $1)
             ORDER BY br.request_date DESC, br.borrow_date DESC
             LIMIT $2 OFFSET $3"
        );

        let rows = sqlx::query(&query)
            .bind(status.map(|s| s.as_str()))
            .bind(per_page)
            .bind((page - 1) * per_page)
            .fetch_all(&self.pool)
            .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            items.push(details_from_row(row, true)?);
        }

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM borrow_records WHERE ($1::text IS NULL OR status = $1)",
        )
        .bind(status.map(|s| s.as_str()))
        .fetch_one(&self.pool)
        .await?;

        Ok((items, total))
    }

    async fn list_overdue(&self) -> AppResult<Vec<BorrowDetails>> {
        let query = format!(
            "{DETAILS_SELECT}
             WHERE br.status = 'overdue'
             ORDER BY br.due_date"
        );

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            items.push(details_from_row(row, true)?);
        }

        Ok(items)
    }
}
