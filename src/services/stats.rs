//! Statistics service

use sqlx::Row;

use crate::{
    api::stats::{DashboardStats, GenreCount},
    error::AppResult,
    repository::Repository,
};

#[derive(Clone)]
pub struct StatsService {
    repository: Repository,
}

impl StatsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Library dashboard counters. The caller is expected to have swept
    /// overdue records first so the overdue count is current.
    pub async fn dashboard(&self) -> AppResult<DashboardStats> {
        let pool = &self.repository.pool;

        let total_books: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(pool)
            .await?;

        let total_copies: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(total_copies), 0) FROM books")
                .fetch_one(pool)
                .await?;

        let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await?;

        let active_users: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT user_id) FROM borrow_records
             WHERE status IN ('borrowed', 'overdue')",
        )
        .fetch_one(pool)
        .await?;

        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'borrowed') AS borrowed,
                COUNT(*) FILTER (WHERE status = 'overdue') AS overdue,
                COUNT(*) FILTER (WHERE status = 'pending') AS pending
            FROM borrow_records
            "#,
        )
        .fetch_one(pool)
        .await?;

        let total_borrows: i64 = row.get("total");
        let borrowed: i64 = row.get("borrowed");
        let overdue: i64 = row.get("overdue");
        let pending_requests: i64 = row.get("pending");

        let unpaid_fines: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(fine_amount), 0) FROM borrow_records
             WHERE fine_amount > 0 AND fine_paid = FALSE",
        )
        .fetch_one(pool)
        .await?;

        let popular_genres = sqlx::query(
            r#"
            SELECT b.genre AS genre, COUNT(*) AS borrows
            FROM borrow_records br
            JOIN books b ON br.book_id = b.id
            WHERE br.status != 'rejected'
            GROUP BY b.genre
            ORDER BY borrows DESC
            LIMIT 5
            "#,
        )
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|row| GenreCount {
            genre: row.get("genre"),
            borrows: row.get("borrows"),
        })
        .collect();

        Ok(DashboardStats {
            total_books,
            total_copies,
            total_users,
            active_users,
            total_borrows,
            borrowed,
            overdue,
            pending_requests,
            unpaid_fines,
            popular_genres,
        })
    }
}
