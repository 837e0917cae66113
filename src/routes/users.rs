//! User administration routes. Every handler requires `users:manage`.
//!
//! Any change to an existing account drops that user's websocket
//! connections; a reconnect needs a fresh ticket and reloads the grants.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::ApiResult;
use super::auth::{AuthUser, auth_error};
use crate::services::access::Permission;
use crate::services::profile::{self, NewProfile, ProfilePatch, ProfileRow};
use crate::state::AppState;

/// `GET /api/users`: every profile with its grants.
pub async fn list_users(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<Vec<ProfileRow>>> {
    auth.principal.require(Permission::UsersManage)?;
    let rows = profile::list_profiles(&state.pool).await.map_err(auth_error)?;
    Ok(Json(rows))
}

/// `POST /api/users`: create a profile.
pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<NewProfile>,
) -> ApiResult<(StatusCode, Json<ProfileRow>)> {
    auth.principal.require(Permission::UsersManage)?;
    let row = profile::create_profile(&state.pool, &body).await.map_err(auth_error)?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// `PATCH /api/users/:id`: update name, email, role, active flag or password.
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<ProfilePatch>,
) -> ApiResult<Json<ProfileRow>> {
    auth.principal.require(Permission::UsersManage)?;
    let row = profile::update_profile(&state.pool, id, &body, auth.principal.id)
        .await
        .map_err(auth_error)?;
    revoke_realtime(&state, id).await;
    Ok(Json(row))
}

/// `DELETE /api/users/:id`: delete a profile other than the caller's.
pub async fn delete_user(State(state): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    auth.principal.require(Permission::UsersManage)?;
    profile::delete_profile(&state.pool, id, auth.principal.id)
        .await
        .map_err(auth_error)?;
    revoke_realtime(&state, id).await;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct PermissionsBody {
    pub permissions: Vec<Permission>,
}

/// `PUT /api/users/:id/permissions`: replace the granted permissions.
pub async fn set_user_permissions(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<PermissionsBody>,
) -> ApiResult<Json<ProfileRow>> {
    auth.principal.require(Permission::UsersManage)?;
    let row = profile::set_permissions(&state.pool, id, &body.permissions)
        .await
        .map_err(auth_error)?;
    revoke_realtime(&state, id).await;
    Ok(Json(row))
}

async fn revoke_realtime(state: &AppState, user_id: Uuid) {
    let dropped = state.hub.drop_user(user_id).await;
    if dropped > 0 {
        info!(%user_id, dropped, "realtime connections revoked");
    }
}

#[cfg(test)]
#[path = "users_test.rs"]
mod tests;
