//! Money-movement routes: deposits, withdrawals, transfers, direct
//! operations, the unified operations list and its CSV export.
//!
//! Deposits and withdrawals share one set of helpers keyed by [`CashKind`];
//! the public handlers are thin wrappers so the router stays flat.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use uuid::Uuid;

use super::auth::AuthUser;
use super::{ApiError, ApiResult};
use crate::services::access::Permission;
use crate::services::cash::{self, CashKind, CashPatch, CashRow, NewCash};
use crate::services::direct::{self, DirectPatch, DirectRow, NewDirect};
use crate::services::export::{self, ExportError};
use crate::services::filter::OperationFilter;
use crate::services::operation::{self, OperationError, OperationRow};
use crate::services::transfer::{self, NewTransfer, TransferPatch, TransferRow};
use crate::state::AppState;

pub(crate) fn operation_error_to_status(err: &OperationError) -> StatusCode {
    match err {
        OperationError::NotFound(..) => StatusCode::NOT_FOUND,
        OperationError::ClientNotFound(_) | OperationError::UnknownKind(_) | OperationError::Invalid(_) => {
            StatusCode::BAD_REQUEST
        }
        OperationError::Denied => StatusCode::FORBIDDEN,
        OperationError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn operation_error(err: OperationError) -> ApiError {
    ApiError::new(operation_error_to_status(&err), &err)
}

fn export_error(err: ExportError) -> ApiError {
    ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, &err)
}

#[derive(Debug, Default, Deserialize)]
pub struct ClientQuery {
    pub client_id: Option<Uuid>,
}

// =============================================================================
// DEPOSITS & WITHDRAWALS
// =============================================================================

async fn cash_list(state: &AppState, auth: &AuthUser, kind: CashKind, query: &ClientQuery) -> ApiResult<Json<Vec<CashRow>>> {
    auth.principal.require(Permission::OperationsRead)?;
    let rows = cash::list(&state.pool, kind, query.client_id).await.map_err(operation_error)?;
    Ok(Json(rows))
}

async fn cash_create(
    state: &AppState,
    auth: &AuthUser,
    kind: CashKind,
    body: &NewCash,
) -> ApiResult<(StatusCode, Json<CashRow>)> {
    auth.principal.require(Permission::OperationsWrite)?;
    let row = cash::create(&state.pool, kind, body, auth.principal.id)
        .await
        .map_err(operation_error)?;
    Ok((StatusCode::CREATED, Json(row)))
}

async fn cash_get(state: &AppState, auth: &AuthUser, kind: CashKind, id: Uuid) -> ApiResult<Json<CashRow>> {
    auth.principal.require(Permission::OperationsRead)?;
    let row = cash::get(&state.pool, kind, id).await.map_err(operation_error)?;
    Ok(Json(row))
}

async fn cash_update(state: &AppState, auth: &AuthUser, kind: CashKind, id: Uuid, body: &CashPatch) -> ApiResult<Json<CashRow>> {
    auth.principal.require(Permission::OperationsWrite)?;
    let row = cash::update(&state.pool, kind, id, body, auth.principal.id)
        .await
        .map_err(operation_error)?;
    Ok(Json(row))
}

async fn cash_delete(state: &AppState, auth: &AuthUser, kind: CashKind, id: Uuid) -> ApiResult<StatusCode> {
    auth.principal.require(Permission::OperationsDelete)?;
    cash::delete(&state.pool, kind, id, auth.principal.id)
        .await
        .map_err(operation_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/deposits?client_id=`
pub async fn list_deposits(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ClientQuery>,
) -> ApiResult<Json<Vec<CashRow>>> {
    cash_list(&state, &auth, CashKind::Deposit, &query).await
}

/// `POST /api/deposits`
pub async fn create_deposit(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<NewCash>,
) -> ApiResult<(StatusCode, Json<CashRow>)> {
    cash_create(&state, &auth, CashKind::Deposit, &body).await
}

/// `GET /api/deposits/:id`
pub async fn get_deposit(State(state): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>) -> ApiResult<Json<CashRow>> {
    cash_get(&state, &auth, CashKind::Deposit, id).await
}

/// `PATCH /api/deposits/:id`
pub async fn update_deposit(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<CashPatch>,
) -> ApiResult<Json<CashRow>> {
    cash_update(&state, &auth, CashKind::Deposit, id, &body).await
}

/// `DELETE /api/deposits/:id`: archive to `deleted_deposits`, then delete.
pub async fn delete_deposit(State(state): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    cash_delete(&state, &auth, CashKind::Deposit, id).await
}

/// `GET /api/withdrawals?client_id=`
pub async fn list_withdrawals(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ClientQuery>,
) -> ApiResult<Json<Vec<CashRow>>> {
    cash_list(&state, &auth, CashKind::Withdrawal, &query).await
}

/// `POST /api/withdrawals`
pub async fn create_withdrawal(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<NewCash>,
) -> ApiResult<(StatusCode, Json<CashRow>)> {
    cash_create(&state, &auth, CashKind::Withdrawal, &body).await
}

/// `GET /api/withdrawals/:id`
pub async fn get_withdrawal(State(state): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>) -> ApiResult<Json<CashRow>> {
    cash_get(&state, &auth, CashKind::Withdrawal, id).await
}

/// `PATCH /api/withdrawals/:id`
pub async fn update_withdrawal(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<CashPatch>,
) -> ApiResult<Json<CashRow>> {
    cash_update(&state, &auth, CashKind::Withdrawal, id, &body).await
}

/// `DELETE /api/withdrawals/:id`: archive to `deleted_withdrawals`, then delete.
pub async fn delete_withdrawal(State(state): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    cash_delete(&state, &auth, CashKind::Withdrawal, id).await
}

// =============================================================================
// TRANSFERS
// =============================================================================

/// `GET /api/transfers`
pub async fn list_transfers(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<Vec<TransferRow>>> {
    auth.principal.require(Permission::OperationsRead)?;
    let rows = transfer::list(&state.pool).await.map_err(operation_error)?;
    Ok(Json(rows))
}

/// `POST /api/transfers`
pub async fn create_transfer(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<NewTransfer>,
) -> ApiResult<(StatusCode, Json<TransferRow>)> {
    auth.principal.require(Permission::OperationsWrite)?;
    let row = transfer::create(&state.pool, &body, auth.principal.id)
        .await
        .map_err(operation_error)?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// `GET /api/transfers/:id`
pub async fn get_transfer(State(state): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>) -> ApiResult<Json<TransferRow>> {
    auth.principal.require(Permission::OperationsRead)?;
    let row = transfer::get(&state.pool, id).await.map_err(operation_error)?;
    Ok(Json(row))
}

/// `PATCH /api/transfers/:id`
pub async fn update_transfer(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<TransferPatch>,
) -> ApiResult<Json<TransferRow>> {
    auth.principal.require(Permission::OperationsWrite)?;
    let row = transfer::update(&state.pool, id, &body).await.map_err(operation_error)?;
    Ok(Json(row))
}

/// `DELETE /api/transfers/:id`
pub async fn delete_transfer(State(state): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    auth.principal.require(Permission::OperationsDelete)?;
    transfer::delete(&state.pool, id, auth.principal.id)
        .await
        .map_err(operation_error)?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// DIRECT OPERATIONS
// =============================================================================

/// `GET /api/direct-operations?client_id=`: either side matches.
pub async fn list_direct(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ClientQuery>,
) -> ApiResult<Json<Vec<DirectRow>>> {
    auth.principal.require(Permission::OperationsRead)?;
    let rows = direct::list(&state.pool, query.client_id).await.map_err(operation_error)?;
    Ok(Json(rows))
}

/// `POST /api/direct-operations`
pub async fn create_direct(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<NewDirect>,
) -> ApiResult<(StatusCode, Json<DirectRow>)> {
    auth.principal.require(Permission::OperationsWrite)?;
    let row = direct::create(&state.pool, &body, auth.principal.id)
        .await
        .map_err(operation_error)?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// `GET /api/direct-operations/:id`
pub async fn get_direct(State(state): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>) -> ApiResult<Json<DirectRow>> {
    auth.principal.require(Permission::OperationsRead)?;
    let row = direct::get(&state.pool, id).await.map_err(operation_error)?;
    Ok(Json(row))
}

/// `PATCH /api/direct-operations/:id`
pub async fn update_direct(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<DirectPatch>,
) -> ApiResult<Json<DirectRow>> {
    auth.principal.require(Permission::OperationsWrite)?;
    let row = direct::update(&state.pool, id, &body).await.map_err(operation_error)?;
    Ok(Json(row))
}

/// `DELETE /api/direct-operations/:id`
pub async fn delete_direct(State(state): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    auth.principal.require(Permission::OperationsDelete)?;
    direct::delete(&state.pool, id, auth.principal.id)
        .await
        .map_err(operation_error)?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// UNIFIED LIST & EXPORT
// =============================================================================

/// `GET /api/operations?kind=&client=&from=&to=`
pub async fn list_operations(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(filter): Query<OperationFilter>,
) -> ApiResult<Json<Vec<OperationRow>>> {
    auth.principal.require(Permission::OperationsRead)?;
    let rows = operation::list_operations(&state.pool, &filter)
        .await
        .map_err(operation_error)?;
    Ok(Json(rows))
}

/// `GET /api/operations/export.csv`: same filters as the list, as a CSV attachment.
pub async fn export_operations(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(filter): Query<OperationFilter>,
) -> ApiResult<Response> {
    auth.principal.require(Permission::OperationsRead)?;
    let rows = operation::list_operations(&state.pool, &filter)
        .await
        .map_err(operation_error)?;
    let body = export::operations_to_csv(&rows).map_err(export_error)?;
    let filename = export::export_filename(chrono::Utc::now().date_naive());
    tracing::info!(user_id = %auth.principal.id, rows = rows.len(), "operations exported");

    Ok((
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8".to_owned()),
            (CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        body,
    )
        .into_response())
}

#[cfg(test)]
#[path = "operations_test.rs"]
mod tests;
