//! Statistics and dashboard routes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde::Serialize;
use tracing::debug;

use super::auth::AuthUser;
use super::{ApiError, ApiResult};
use crate::realtime::machine::Phase;
use crate::services::access::Permission;
use crate::services::dashboard::{self, DashboardSnapshot};
use crate::services::stats::{self, StatsError, StatsReport};
use crate::state::AppState;

pub(crate) fn stats_error_to_status(err: &StatsError) -> StatusCode {
    match err {
        StatsError::Denied => StatusCode::FORBIDDEN,
        StatsError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn stats_error(err: StatsError) -> ApiError {
    ApiError::new(stats_error_to_status(&err), &err)
}

/// `GET /api/stats`: totals and per-client balance reconciliation.
pub async fn get_stats(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<StatsReport>> {
    auth.principal.require(Permission::StatsRead)?;
    let report = stats::load_report(&state.pool).await.map_err(stats_error)?;
    Ok(Json(report))
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub snapshot: DashboardSnapshot,
    pub realtime: Phase,
}

/// `GET /api/dashboard`: latest snapshot. Read from the database whenever
/// the realtime subscription is not live.
pub async fn get_dashboard(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<DashboardResponse>> {
    auth.principal.require(Permission::OperationsRead)?;
    let snapshot = current_snapshot(&state).await.map_err(stats_error)?;
    Ok(Json(DashboardResponse { snapshot, realtime: state.phase() }))
}

/// Cached snapshot while subscribed, otherwise a direct database read.
///
/// The cache is only kept current by change notifications, so it is never
/// served while the subscription is retrying, cooling down or stopped.
pub(crate) async fn current_snapshot(state: &AppState) -> Result<DashboardSnapshot, StatsError> {
    let phase = state.phase();
    if phase != Phase::Subscribed {
        debug!(?phase, "realtime degraded; dashboard read from database");
        return dashboard::load_snapshot(&state.pool).await;
    }
    if let Some(snapshot) = state.snapshot.read().await.clone() {
        return Ok(snapshot);
    }
    let snapshot = dashboard::load_snapshot(&state.pool).await?;
    *state.snapshot.write().await = Some(snapshot.clone());
    Ok(snapshot)
}

#[cfg(test)]
#[path = "stats_test.rs"]
mod tests;
