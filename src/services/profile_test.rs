use super::*;
use crate::frame::ErrorCode;
#[cfg(feature = "live-db-tests")]
use crate::state::test_helpers::integration_pool;

fn profile(role: Role) -> ProfileRow {
    ProfileRow {
        id: Uuid::new_v4(),
        username: "m.diallo".into(),
        full_name: "Mariam Diallo".into(),
        email: Some("mariam@example.com".into()),
        role,
        active: true,
        permissions: vec![Permission::ClientsRead],
        created_at: Utc::now(),
    }
}

fn new_profile() -> NewProfile {
    NewProfile {
        username: "  J.Dupont ".into(),
        full_name: "Jean Dupont".into(),
        email: Some("Jean@Example.com".into()),
        role: None,
        password: "correct horse".into(),
        permissions: vec![Permission::OperationsRead],
    }
}

// =============================================================================
// passwords
// =============================================================================

#[test]
fn hash_then_verify() {
    let hash = hash_password("s3cret-pass").unwrap();
    assert!(hash.starts_with("$argon2"));
    assert!(verify_password("s3cret-pass", &hash));
    assert!(!verify_password("wrong-pass", &hash));
}

#[test]
fn hashes_are_salted() {
    assert_ne!(hash_password("same-password").unwrap(), hash_password("same-password").unwrap());
}

#[test]
fn malformed_hash_never_verifies() {
    assert!(!verify_password("anything", "not-a-phc-string"));
    assert!(!verify_password("", ""));
}

// =============================================================================
// validation
// =============================================================================

#[test]
fn new_profile_normalizes_username_and_email() {
    let fields = new_profile().validate().unwrap();
    assert_eq!(fields.username, "j.dupont");
    assert_eq!(fields.email.as_deref(), Some("jean@example.com"));
    assert_eq!(fields.role, Role::Agent);
}

#[test]
fn new_profile_rejects_short_password() {
    let input = NewProfile { password: "short".into(), ..new_profile() };
    assert_eq!(input.validate(), Err(ValidationError::TooShort { field: "password", min: 8 }));
}

#[test]
fn new_profile_rejects_bad_username() {
    let input = NewProfile { username: "a b".into(), ..new_profile() };
    assert!(input.validate().is_err());
}

#[test]
fn patch_keeps_unset_fields() {
    let current = profile(Role::Agent);
    let fields = ProfilePatch::default().apply(&current).unwrap();
    assert_eq!(fields.full_name, "Mariam Diallo");
    assert_eq!(fields.email.as_deref(), Some("mariam@example.com"));
    assert_eq!(fields.role, Role::Agent);
    assert_eq!(fields.username, "m.diallo");
}

#[test]
fn patch_blank_email_clears_it() {
    let patch = ProfilePatch { email: Some("  ".into()), role: Some(Role::Admin), ..ProfilePatch::default() };
    let fields = patch.apply(&profile(Role::Agent)).unwrap();
    assert_eq!(fields.email, None);
    assert_eq!(fields.role, Role::Admin);
}

#[test]
fn patch_checks_new_password_length() {
    let patch = ProfilePatch { password: Some("tiny".into()), ..ProfilePatch::default() };
    assert!(patch.apply(&profile(Role::Agent)).is_err());
}

#[test]
fn parse_permissions_skips_unknown_and_dedups() {
    let parsed = parse_permissions(vec![
        "stats:read".into(),
        "clients:read".into(),
        "bogus:perm".into(),
        "stats:read".into(),
    ]);
    assert_eq!(parsed, vec![Permission::ClientsRead, Permission::StatsRead]);
}

#[test]
fn error_codes() {
    assert_eq!(AuthError::InvalidCredentials.error_code(), "E_INVALID_CREDENTIALS");
    assert_eq!(AuthError::SelfTarget.error_code(), "E_SELF_TARGET");
    assert!(AuthError::Timeout.retryable());
    assert!(!AuthError::Inactive.retryable());
}

// =============================================================================
// LIVE DB
// =============================================================================

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn create_login_and_deactivate() {
    let pool = integration_pool().await;
    let admin = bootstrap_admin(&pool, "root.admin", "admin-password").await.unwrap().expect("first admin");
    assert!(bootstrap_admin(&pool, "second", "admin-password").await.unwrap().is_none());

    let created = create_profile(&pool, &new_profile()).await.expect("create");
    assert_eq!(created.permissions, vec![Permission::OperationsRead]);

    let principal = login(&pool, "J.DUPONT", "correct horse", Duration::from_secs(5)).await.expect("login");
    assert_eq!(principal.id, created.id);
    assert!(principal.can(Permission::OperationsRead));
    assert!(!principal.can(Permission::UsersManage));

    assert!(matches!(
        login(&pool, "j.dupont", "nope nope", Duration::from_secs(5)).await,
        Err(AuthError::InvalidCredentials)
    ));

    let patch = ProfilePatch { active: Some(false), ..ProfilePatch::default() };
    update_profile(&pool, created.id, &patch, admin).await.expect("deactivate");
    assert!(matches!(
        login(&pool, "j.dupont", "correct horse", Duration::from_secs(5)).await,
        Err(AuthError::Inactive)
    ));
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn duplicate_username_is_reported() {
    let pool = integration_pool().await;
    create_profile(&pool, &new_profile()).await.expect("create");
    assert!(matches!(create_profile(&pool, &new_profile()).await, Err(AuthError::UsernameTaken(_))));
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn set_permissions_replaces_grants() {
    let pool = integration_pool().await;
    let created = create_profile(&pool, &new_profile()).await.expect("create");
    let updated = set_permissions(&pool, created.id, &[Permission::StatsRead, Permission::ClientsWrite])
        .await
        .expect("set");
    assert_eq!(updated.permissions, vec![Permission::ClientsWrite, Permission::StatsRead]);
    assert!(matches!(delete_profile(&pool, created.id, created.id).await, Err(AuthError::SelfTarget)));
}
