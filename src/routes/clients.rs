//! Client routes: CRUD, search and status.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use uuid::Uuid;

use super::auth::AuthUser;
use super::{ApiError, ApiResult};
use crate::services::access::Permission;
use crate::services::client::{self, ClientError, ClientPatch, ClientRow, NewClient};
use crate::services::filter::ClientFilter;
use crate::state::AppState;

pub(crate) fn client_error_to_status(err: &ClientError) -> StatusCode {
    match err {
        ClientError::NotFound(_) => StatusCode::NOT_FOUND,
        ClientError::Invalid(_) => StatusCode::BAD_REQUEST,
        ClientError::Denied => StatusCode::FORBIDDEN,
        ClientError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn client_error(err: ClientError) -> ApiError {
    ApiError::new(client_error_to_status(&err), &err)
}

/// `GET /api/clients?search=&status=`: clients matching name, email or phone.
pub async fn list_clients(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(filter): Query<ClientFilter>,
) -> ApiResult<Json<Vec<ClientRow>>> {
    auth.principal.require(Permission::ClientsRead)?;
    let rows = client::list_clients(&state.pool, &filter).await.map_err(client_error)?;
    Ok(Json(rows))
}

/// `POST /api/clients`: create a client with a zero balance.
pub async fn create_client(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<NewClient>,
) -> ApiResult<(StatusCode, Json<ClientRow>)> {
    auth.principal.require(Permission::ClientsWrite)?;
    let row = client::create_client(&state.pool, &body).await.map_err(client_error)?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// `GET /api/clients/:id`
pub async fn get_client(State(state): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>) -> ApiResult<Json<ClientRow>> {
    auth.principal.require(Permission::ClientsRead)?;
    let row = client::get_client(&state.pool, id).await.map_err(client_error)?;
    Ok(Json(row))
}

/// `PATCH /api/clients/:id`: edit contact details or toggle status.
pub async fn update_client(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<ClientPatch>,
) -> ApiResult<Json<ClientRow>> {
    auth.principal.require(Permission::ClientsWrite)?;
    let row = client::update_client(&state.pool, id, &body).await.map_err(client_error)?;
    Ok(Json(row))
}

/// `DELETE /api/clients/:id`: archive to `deleted_clients`, then delete.
pub async fn delete_client(State(state): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    auth.principal.require(Permission::ClientsWrite)?;
    client::delete_client(&state.pool, id, auth.principal.id)
        .await
        .map_err(client_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "clients_test.rs"]
mod tests;
