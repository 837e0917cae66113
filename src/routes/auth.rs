//! Auth routes: sign-in, session management, WS tickets.

use std::time::Duration as StdDuration;

use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use time::Duration;
use uuid::Uuid;

use super::{ApiError, ApiResult};
use crate::services::access::{Permission, Principal, Role};
use crate::services::profile::{self, AuthError};
use crate::services::session;
use crate::state::AppState;

pub(crate) const COOKIE_NAME: &str = "session_token";

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Authenticated caller extracted from the session cookie.
/// Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub principal: Principal,
    pub token: String,
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar.get(COOKIE_NAME).map(Cookie::value).unwrap_or_default();
        if token.is_empty() {
            return Err(StatusCode::UNAUTHORIZED);
        }

        let app_state = AppState::from_ref(state);
        let principal = session::validate_session(&app_state.pool, token)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "session lookup failed");
                StatusCode::INTERNAL_SERVER_ERROR
            })?
            .ok_or(StatusCode::UNAUTHORIZED)?;

        Ok(Self { principal, token: token.to_owned() })
    }
}

// =============================================================================
// RESPONSES
// =============================================================================

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub permissions: Vec<Permission>,
}

impl From<&Principal> for MeResponse {
    fn from(p: &Principal) -> Self {
        Self {
            id: p.id,
            username: p.username.clone(),
            full_name: p.full_name.clone(),
            role: p.role,
            permissions: p.effective_permissions(),
        }
    }
}

pub(crate) fn auth_error_to_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        AuthError::Inactive | AuthError::Denied => StatusCode::FORBIDDEN,
        AuthError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        AuthError::Invalid(_) => StatusCode::BAD_REQUEST,
        AuthError::NotFound(_) => StatusCode::NOT_FOUND,
        AuthError::UsernameTaken(_) | AuthError::SelfTarget => StatusCode::CONFLICT,
        AuthError::Hash(_) | AuthError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn auth_error(err: AuthError) -> ApiError {
    ApiError::new(auth_error_to_status(&err), &err)
}

fn session_cookie(value: String, secure: bool, max_age: Duration) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(max_age)
        .build()
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Deserialize)]
pub struct LoginBody {
    pub username: String,
    pub password: String,
}

/// `POST /api/auth/login`: verify credentials, create a session, set the cookie.
pub async fn login(State(state): State<AppState>, Json(body): Json<LoginBody>) -> ApiResult<impl IntoResponse> {
    let timeout = StdDuration::from_millis(state.config.login_timeout_ms);
    let principal = profile::login(&state.pool, &body.username, &body.password, timeout)
        .await
        .map_err(auth_error)?;

    let token = session::create_session(&state.pool, principal.id, state.config.session_ttl_hours)
        .await
        .map_err(|e| auth_error(e.into()))?;

    let cookie = session_cookie(token, state.config.cookie_secure, Duration::hours(state.config.session_ttl_hours));
    let jar = CookieJar::new().add(cookie);
    Ok((jar, Json(MeResponse::from(&principal))))
}

/// `GET /api/auth/me`: return the current caller.
pub async fn me(auth: AuthUser) -> Json<MeResponse> {
    Json(MeResponse::from(&auth.principal))
}

/// `POST /api/auth/logout`: delete session, clear cookie.
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    if let Err(e) = session::delete_session(&state.pool, &auth.token).await {
        tracing::warn!(error = %e, user_id = %auth.principal.id, "session delete failed on logout");
    }

    let cookie = session_cookie(String::new(), state.config.cookie_secure, Duration::ZERO);
    let jar = CookieJar::new().add(cookie);
    (jar, StatusCode::NO_CONTENT)
}

/// `POST /api/auth/ws-ticket`: create a one-time WS ticket.
pub async fn ws_ticket(State(state): State<AppState>, auth: AuthUser) -> Result<Json<serde_json::Value>, StatusCode> {
    let ticket = session::create_ws_ticket(&state.pool, auth.principal.id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(serde_json::json!({ "ticket": ticket })))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
