use super::*;
use crate::services::validation::ValidationError;

#[test]
fn api_error_keeps_client_error_message() {
    let err = ApiError::new(StatusCode::BAD_REQUEST, &ValidationError::Required { field: "first_name" });
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
    assert_eq!(err.body.code, "E_REQUIRED");
    assert_eq!(err.body.message, "first_name is required");
    assert!(!err.body.retryable);
}

#[test]
fn api_error_hides_internal_message() {
    let err = ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, &crate::services::stats::StatsError::Database(sqlx::Error::PoolTimedOut));
    assert_eq!(err.body.code, "E_DATABASE");
    assert_eq!(err.body.message, "internal error");
}

#[test]
fn access_denied_maps_to_forbidden() {
    let err = ApiError::from(AccessError::Denied(crate::services::access::Permission::ClientsWrite));
    assert_eq!(err.status, StatusCode::FORBIDDEN);
    assert_eq!(err.body.code, "E_PERMISSION_DENIED");
}

#[test]
fn unknown_permission_maps_to_bad_request() {
    let err = ApiError::from(AccessError::UnknownPermission("stats:write".into()));
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
}

#[test]
fn api_error_response_uses_status() {
    let response = ApiError::new(StatusCode::NOT_FOUND, &crate::services::audit::AuditError::UnknownTable("x".into()))
        .into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn healthz_is_ok() {
    assert_eq!(healthz().await, StatusCode::OK);
}

#[tokio::test]
async fn app_builds_with_lazy_state() {
    let _router = app(crate::state::test_helpers::test_app_state());
}
