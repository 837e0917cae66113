//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every endpoint lives under `/api` except `/healthz`. HTTP handlers
//! authenticate with the session cookie through [`auth::AuthUser`]; the
//! realtime websocket authenticates with a one-time ticket.
//!
//! ERROR HANDLING
//! ==============
//! Each route module maps its service error to a status code in one
//! `*_error_to_status` function. [`ApiError`] pairs that status with the
//! error's grepable code so forms can show what failed.

pub mod audit;
pub mod auth;
pub mod clients;
pub mod operations;
pub mod realtime;
pub mod stats;
pub mod users;

use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, patch, post, put};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::frame::ErrorCode;
use crate::services::access::AccessError;
use crate::state::AppState;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
}

/// Status code plus a JSON body describing the failure.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ApiErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, err: &(impl ErrorCode + ?Sized)) -> Self {
        if status.is_server_error() {
            tracing::error!(code = err.error_code(), error = %err, "request failed");
        }
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "internal error".to_owned()
        } else {
            err.to_string()
        };
        Self { status, body: ApiErrorBody { code: err.error_code(), message, retryable: err.retryable() } }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        let status = match err {
            AccessError::Denied(_) => StatusCode::FORBIDDEN,
            AccessError::UnknownPermission(_) => StatusCode::BAD_REQUEST,
        };
        ApiError::new(status, &err)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// ROUTER
// =============================================================================

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/auth/ws-ticket", post(auth::ws_ticket))
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/{id}", patch(users::update_user).delete(users::delete_user))
        .route("/users/{id}/permissions", put(users::set_user_permissions))
        .route("/clients", get(clients::list_clients).post(clients::create_client))
        .route(
            "/clients/{id}",
            get(clients::get_client).patch(clients::update_client).delete(clients::delete_client),
        )
        .route("/deposits", get(operations::list_deposits).post(operations::create_deposit))
        .route(
            "/deposits/{id}",
            get(operations::get_deposit)
                .patch(operations::update_deposit)
                .delete(operations::delete_deposit),
        )
        .route("/withdrawals", get(operations::list_withdrawals).post(operations::create_withdrawal))
        .route(
            "/withdrawals/{id}",
            get(operations::get_withdrawal)
                .patch(operations::update_withdrawal)
                .delete(operations::delete_withdrawal),
        )
        .route("/transfers", get(operations::list_transfers).post(operations::create_transfer))
        .route(
            "/transfers/{id}",
            get(operations::get_transfer)
                .patch(operations::update_transfer)
                .delete(operations::delete_transfer),
        )
        .route("/direct-operations", get(operations::list_direct).post(operations::create_direct))
        .route(
            "/direct-operations/{id}",
            get(operations::get_direct)
                .patch(operations::update_direct)
                .delete(operations::delete_direct),
        )
        .route("/operations", get(operations::list_operations))
        .route("/operations/export.csv", get(operations::export_operations))
        .route("/stats", get(stats::get_stats))
        .route("/dashboard", get(stats::get_dashboard))
        .route("/audit/{kind}", get(audit::list_deleted))
        .route("/realtime", get(realtime::handle_ws))
}

/// Full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .nest("/api", api_routes())
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
