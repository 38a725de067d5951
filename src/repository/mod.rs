//! Repository layer for database operations.
//!
//! The borrow lifecycle controller depends on the three store traits below
//! rather than on raw tables: books expose reserve/release of a copy, users
//! expose their borrow counter, and borrow records expose status-guarded
//! transitions. Each Postgres implementation performs a transition as a
//! single conditional UPDATE so concurrent callers race on the guard, not
//! on read-modify-write sequences.

pub mod books;
pub mod borrows;
pub mod reviews;
pub mod users;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{
        book::Book,
        borrow::{BorrowDetails, BorrowRecord, BorrowStatus},
        user::User,
    },
};

/// Book collaborator contract consumed by the lifecycle controller
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookStore: Send + Sync {
    async fn get_by_id(&self, id: i32) -> AppResult<Option<Book>>;

    /// Atomically take one available copy. Returns false when none is left.
    async fn reserve_copy(&self, id: i32) -> AppResult<bool>;

    /// Put one copy back on the shelf.
    async fn release_copy(&self, id: i32) -> AppResult<()>;
}

/// User collaborator contract consumed by the lifecycle controller
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_by_id(&self, id: i32) -> AppResult<Option<User>>;

    async fn increment_borrowed(&self, id: i32) -> AppResult<()>;

    async fn decrement_borrowed(&self, id: i32) -> AppResult<()>;
}

/// Borrow record persistence contract.
///
/// Transition methods return whether the status guard matched; a false
/// result means another request won the race and the caller reports the
/// corresponding precondition error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BorrowStore: Send + Sync {
    async fn create(&self, user_id: i32, book_id: i32) -> AppResult<BorrowRecord>;

    async fn get_by_id(&self, id: i32) -> AppResult<Option<BorrowRecord>>;

    /// Count of the user's records in {borrowed, overdue, approved} and,
    /// when `include_pending` is set, pending as well. Request time counts
    /// pending requests against the limit; approval time does not.
    async fn count_active_for_user(&self, user_id: i32, include_pending: bool) -> AppResult<i64>;

    /// Whether the user already holds a non-terminal record for this book.
    async fn has_active_for_pair(&self, user_id: i32, book_id: i32) -> AppResult<bool>;

    /// pending -> borrowed, stamping borrow/due dates and the approving admin.
    async fn approve_pending(
        &self,
        id: i32,
        admin_id: i32,
        borrow_date: DateTime<Utc>,
        due_date: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// pending -> rejected, stamping the deciding admin and optional reason.
    async fn reject_pending(
        &self,
        id: i32,
        admin_id: i32,
        reason: Option<String>,
    ) -> AppResult<bool>;

    /// borrowed/overdue -> returned, fixing the fine permanently.
    async fn complete_return(
        &self,
        id: i32,
        return_date: DateTime<Utc>,
        fine_amount: i64,
    ) -> AppResult<bool>;

    /// borrowed/overdue -> borrowed with the extended due date, guarded by
    /// the renewal cap.
    async fn renew(&self, id: i32, new_due_date: DateTime<Utc>) -> AppResult<bool>;

    /// Settle a pending fine. Guarded by fine_amount > 0 and not yet paid.
    async fn mark_fine_paid(&self, id: i32) -> AppResult<bool>;

    /// Bulk-mark borrowed records past their due date as overdue.
    /// Idempotent; returns the number of records flipped.
    async fn sweep_overdue(&self, now: DateTime<Utc>) -> AppResult<u64>;

    async fn list_for_user(
        &self,
        user_id: i32,
        status: Option<BorrowStatus>,
        page: i64,
        per_page: i64,
    ) -> AppResult<(Vec<BorrowDetails>, i64)>;

    async fn list_current_for_user(&self, user_id: i32) -> AppResult<Vec<BorrowDetails>>;

    async fn list_fines_for_user(&self, user_id: i32) -> AppResult<Vec<BorrowDetails>>;

    async fn list_all(
        &self,
        status: Option<BorrowStatus>,
        page: i64,
        per_page: i64,
    ) -> AppResult<(Vec<BorrowDetails>, i64)>;

    async fn list_overdue(&self) -> AppResult<Vec<BorrowDetails>>;
}

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub books: books::BooksRepository,
    pub users: users::UsersRepository,
    pub borrows: borrows::BorrowsRepository,
    pub reviews: reviews::ReviewsRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: books::BooksRepository::new(pool.clone()),
            users: users::UsersRepository::new(pool.clone()),
            borrows: borrows::BorrowsRepository::new(pool.clone()),
            reviews: reviews::ReviewsRepository::new(pool.clone()),
            pool,
        }
    }
}
