//! Borrow record model: one row per borrow attempt, kept forever as history

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::{IntoParams, ToSchema};

use super::book::BookShort;
use super::user::UserShort;

/// Loan period granted on approval and added per renewal
pub const LOAN_PERIOD_DAYS: i64 = 14;
/// Maximum simultaneous records per user in a non-terminal status
pub const MAX_ACTIVE_BORROWS: i64 = 5;
/// Maximum renewals per loan
pub const MAX_RENEWALS: i32 = 2;

/// Borrow lifecycle status.
///
/// `Approved` exists in the stored enum and counts against the active-borrow
/// limits, but no transition currently produces it: approval moves a pending
/// request straight to `Borrowed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BorrowStatus {
    Pending,
    Approved,
    Rejected,
    Borrowed,
    Returned,
    Overdue,
}

impl BorrowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BorrowStatus::Pending => "pending",
            BorrowStatus::Approved => "approved",
            BorrowStatus::Rejected => "rejected",
            BorrowStatus::Borrowed => "borrowed",
            BorrowStatus::Returned => "returned",
            BorrowStatus::Overdue => "overdue",
        }
    }

    /// Statuses that count against the 5-record and one-per-pair limits
    pub const ACTIVE: [BorrowStatus; 4] = [
        BorrowStatus::Pending,
        BorrowStatus::Approved,
        BorrowStatus::Borrowed,
        BorrowStatus::Overdue,
    ];

    /// No transition leaves a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, BorrowStatus::Returned | BorrowStatus::Rejected)
    }

    /// Only an issued loan can be returned
    pub fn is_returnable(&self) -> bool {
        matches!(self, BorrowStatus::Borrowed | BorrowStatus::Overdue)
    }
}

impl std::fmt::Display for BorrowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BorrowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(BorrowStatus::Pending),
            "approved" => Ok(BorrowStatus::Approved),
            "rejected" => Ok(BorrowStatus::Rejected),
            "borrowed" => Ok(BorrowStatus::Borrowed),
            "returned" => Ok(BorrowStatus::Returned),
            "overdue" => Ok(BorrowStatus::Overdue),
            _ => Err(format!("Invalid borrow status: {}", s)),
        }
    }
}

// SQLx conversion: statuses are stored as TEXT
impl sqlx::Type<Postgres> for BorrowStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for BorrowStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for BorrowStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <String as Encode<Postgres>>::encode(self.as_str().to_string(), buf)
    }
}

/// Borrow record from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BorrowRecord {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub request_date: DateTime<Utc>,
    pub borrow_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: BorrowStatus,
    pub approved_by: Option<i32>,
    pub rejection_reason: Option<String>,
    pub fine_amount: i64,
    pub fine_paid: bool,
    pub renewal_count: i32,
}

impl BorrowRecord {
    /// Due date a renewal would extend to (from the current due date, not now)
    pub fn renewed_due_date(&self) -> Option<DateTime<Utc>> {
        self.due_date.map(|d| d + Duration::days(LOAN_PERIOD_DAYS))
    }
}

/// Borrow record with book (and optionally user) details plus the live fine
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BorrowDetails {
    #[serde(flatten)]
    pub record: BorrowRecord,
    pub book: BookShort,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserShort>,
    /// Unrealized fine for unreturned records, recomputed on every read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_fine: Option<i64>,
}

/// Create borrow request body
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateBorrowRequest {
    pub book_id: i32,
}

/// Reject borrow request body
#[derive(Debug, Deserialize, ToSchema)]
pub struct RejectBorrowRequest {
    pub reason: Option<String>,
}

/// Borrow list query parameters
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct BorrowQuery {
    pub status: Option<BorrowStatus>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Paginated borrow list response
#[derive(Debug, Serialize, ToSchema)]
pub struct BorrowPage {
    pub items: Vec<BorrowDetails>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
}

/// Fines summary for a user
#[derive(Debug, Serialize, ToSchema)]
pub struct FinesSummary {
    pub fines: Vec<BorrowDetails>,
    pub total_unpaid: i64,
}
