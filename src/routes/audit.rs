//! Deleted-row trail routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;

use super::auth::AuthUser;
use super::{ApiError, ApiResult};
use crate::services::access::Permission;
use crate::services::audit::{self, ArchiveTable, AuditError, DeletedRow};
use crate::state::AppState;

pub(crate) fn audit_error_to_status(err: &AuditError) -> StatusCode {
    match err {
        AuditError::UnknownTable(_) => StatusCode::NOT_FOUND,
        AuditError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn audit_error(err: AuditError) -> ApiError {
    ApiError::new(audit_error_to_status(&err), &err)
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<i64>,
}

/// `GET /api/audit/:kind?limit=`: most recent archived rows of one table.
pub async fn list_deleted(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(kind): Path<String>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<Vec<DeletedRow>>> {
    auth.principal.require(Permission::OperationsDelete)?;
    let table: ArchiveTable = kind.parse().map_err(audit_error)?;
    let rows = audit::list_deleted(&state.pool, table, query.limit)
        .await
        .map_err(audit_error)?;
    Ok(Json(rows))
}

#[cfg(test)]
#[path = "audit_test.rs"]
mod tests;
