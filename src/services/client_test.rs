use super::*;
#[cfg(feature = "live-db-tests")]
use crate::state::test_helpers::integration_pool;
use rust_decimal_macros::dec;

fn dummy_client(first: &str, last: &str) -> ClientRow {
    ClientRow {
        id: Uuid::new_v4(),
        first_name: first.into(),
        last_name: last.into(),
        phone: Some("+33 6 12 34 56 78".into()),
        email: Some(format!("{}@example.com", first.to_lowercase())),
        balance: dec!(0),
        status: ClientStatus::Active,
        created_at: Utc::now(),
    }
}

fn new_client() -> NewClient {
    NewClient {
        first_name: " Jean ".into(),
        last_name: "Dupont".into(),
        phone: Some("".into()),
        email: Some("Jean@Example.com".into()),
    }
}

// =============================================================================
// NewClient::validate
// =============================================================================

#[test]
fn validate_trims_and_normalizes() {
    let fields = new_client().validate().unwrap();
    assert_eq!(fields.first_name, "Jean");
    assert_eq!(fields.phone, None);
    assert_eq!(fields.email.as_deref(), Some("jean@example.com"));
    assert_eq!(fields.status, ClientStatus::Active);
}

#[test]
fn validate_requires_names() {
    let mut input = new_client();
    input.last_name = "  ".into();
    assert_eq!(input.validate(), Err(ValidationError::Required { field: "last_name" }));
}

#[test]
fn validate_rejects_bad_email() {
    let mut input = new_client();
    input.email = Some("nope".into());
    assert_eq!(input.validate(), Err(ValidationError::Format { field: "email" }));
}

// =============================================================================
// ClientPatch::apply
// =============================================================================

#[test]
fn empty_patch_keeps_current_values() {
    let current = dummy_client("Jean", "Dupont");
    let fields = ClientPatch::default().apply(&current).unwrap();
    assert_eq!(fields.first_name, "Jean");
    assert_eq!(fields.phone, current.phone);
    assert_eq!(fields.email, current.email);
    assert_eq!(fields.status, ClientStatus::Active);
}

#[test]
fn patch_overrides_and_clears() {
    let current = dummy_client("Jean", "Dupont");
    let patch = ClientPatch {
        last_name: Some("Martin".into()),
        phone: Some(String::new()),
        status: Some(ClientStatus::Inactive),
        ..ClientPatch::default()
    };
    let fields = patch.apply(&current).unwrap();
    assert_eq!(fields.last_name, "Martin");
    assert_eq!(fields.phone, None);
    assert_eq!(fields.status, ClientStatus::Inactive);
}

#[test]
fn patch_cannot_blank_required_name() {
    let current = dummy_client("Jean", "Dupont");
    let patch = ClientPatch { first_name: Some(" ".into()), ..ClientPatch::default() };
    assert!(matches!(patch.apply(&current), Err(ValidationError::Required { field: "first_name" })));
}

#[test]
fn status_round_trips_through_db_text() {
    assert_eq!(ClientStatus::from_db("inactive"), ClientStatus::Inactive);
    assert_eq!(ClientStatus::from_db("ACTIVE"), ClientStatus::Active);
    assert_eq!(ClientStatus::from_db("unknown"), ClientStatus::Active);
    assert_eq!(ClientStatus::Inactive.to_string(), "inactive");
}

#[test]
fn error_codes_are_stable() {
    use crate::frame::ErrorCode;
    assert_eq!(ClientError::NotFound(Uuid::nil()).error_code(), "E_CLIENT_NOT_FOUND");
    assert_eq!(ClientError::from(sqlx::Error::RowNotFound).error_code(), "E_DATABASE");
    assert_eq!(ClientError::Invalid(ValidationError::NonPositive).error_code(), "E_AMOUNT_NON_POSITIVE");
}

// =============================================================================
// LIVE DB
// =============================================================================

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn client_crud_round_trip() {
    let pool = integration_pool().await;
    let created = create_client(&pool, &new_client()).await.expect("create");
    assert_eq!(created.balance, dec!(0));

    let patch = ClientPatch { status: Some(ClientStatus::Inactive), ..ClientPatch::default() };
    let updated = update_client(&pool, created.id, &patch).await.expect("update");
    assert_eq!(updated.status, ClientStatus::Inactive);

    let inactive = ClientFilter { search: Some("dupont jean".into()), status: Some(ClientStatus::Inactive) };
    let listed = list_clients(&pool, &inactive).await.expect("list");
    assert_eq!(listed.len(), 1);

    let admin = Uuid::new_v4();
    delete_client(&pool, created.id, admin).await.expect("delete");
    assert!(matches!(get_client(&pool, created.id).await, Err(ClientError::NotFound(_))));
    assert!(matches!(delete_client(&pool, created.id, admin).await, Err(ClientError::NotFound(_))));
}
