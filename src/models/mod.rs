//! Data models for Libris

pub mod book;
pub mod borrow;
pub mod review;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookShort};
pub use borrow::{BorrowDetails, BorrowRecord, BorrowStatus};
pub use review::{Review, ReviewDetails};
pub use user::{User, UserShort};
