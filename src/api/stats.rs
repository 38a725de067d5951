//! Statistics endpoints

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{error::AppResult, AppState};

use super::AuthenticatedUser;

/// Borrows per genre
#[derive(Debug, Serialize, ToSchema)]
pub struct GenreCount {
    pub genre: String,
    pub borrows: i64,
}

/// Library dashboard counters
#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardStats {
    pub total_books: i64,
    pub total_copies: i64,
    pub total_users: i64,
    /// Users currently holding at least one loan
    pub active_users: i64,
    pub total_borrows: i64,
    pub borrowed: i64,
    pub overdue: i64,
    pub pending_requests: i64,
    /// Sum of fixed, unpaid fines
    pub unpaid_fines: i64,
    pub popular_genres: Vec<GenreCount>,
}

/// Library dashboard (admin). Sweeps overdue loans first so the counters
/// reflect the current clock.
#[utoipa::path(
    get,
    path = "/stats/dashboard",
    tag = "stats",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Dashboard counters", body = DashboardStats),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn dashboard(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<DashboardStats>> {
    claims.require_admin()?;

    state.services.borrows.sweep_overdue().await?;
    let stats = state.services.stats.dashboard().await?;
    Ok(Json(stats))
}
