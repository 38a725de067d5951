//! Libris Library Server
//!
//! A Rust REST API server for managing a library's catalog, members and the
//! full borrow lifecycle: requests, approvals, returns, renewals and fines.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod fines;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
    pub pool: sqlx::PgPool,
}
