//! Fine calculation.
//!
//! Pure date arithmetic over a borrow record's due date and status. The rate
//! is 1 currency unit per late day, any partial day counts as a whole day,
//! and nothing here touches storage: fines on unreturned records are
//! recomputed on every read and only persisted at return time.

use chrono::{DateTime, Utc};

use crate::models::borrow::{BorrowRecord, BorrowStatus};

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Whole days between `due` and `at`, rounding any partial day up.
/// Zero when `at` is on or before `due`.
pub fn days_late(due: DateTime<Utc>, at: DateTime<Utc>) -> i64 {
    let late_ms = (at - due).num_milliseconds();
    if late_ms <= 0 {
        0
    } else {
        (late_ms + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY
    }
}

/// Fine owed for a record as of `now`.
///
/// Returned records use their fixed return date; borrowed/overdue records
/// yield a live fine against `now`; every other status owes nothing.
pub fn fine_for(record: &BorrowRecord, now: DateTime<Utc>) -> i64 {
    let Some(due) = record.due_date else {
        return 0;
    };
    match record.status {
        BorrowStatus::Returned => record
            .return_date
            .map(|returned| days_late(due, returned))
            .unwrap_or(0),
        BorrowStatus::Borrowed | BorrowStatus::Overdue => days_late(due, now),
        _ => 0,
    }
}
