use super::*;
use rust_decimal_macros::dec;

fn new_transfer() -> NewTransfer {
    NewTransfer {
        from_client: " Ana Lopes ".into(),
        to_client: "Jean Dupont".into(),
        amount: AmountInput::Text("1.250,00".into()),
        reason: Some("rent".into()),
    }
}

fn existing() -> TransferRow {
    TransferRow {
        id: Uuid::new_v4(),
        from_client: "Ana Lopes".into(),
        to_client: "Jean Dupont".into(),
        amount: dec!(1250),
        reason: Some("rent".into()),
        created_by: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[test]
fn validate_trims_names_and_parses_amount() {
    let fields = new_transfer().validate().unwrap();
    assert_eq!(fields.from_client, "Ana Lopes");
    assert_eq!(fields.amount, dec!(1250.00));
    assert_eq!(fields.reason.as_deref(), Some("rent"));
}

#[test]
fn validate_rejects_self_transfer() {
    let mut input = new_transfer();
    input.to_client = "ana lopes".into();
    assert_eq!(input.validate(), Err(ValidationError::SameClient));
}

#[test]
fn validate_requires_both_parties() {
    let mut input = new_transfer();
    input.from_client = String::new();
    assert_eq!(input.validate(), Err(ValidationError::Required { field: "from_client" }));
}

#[test]
fn patch_merges_onto_current() {
    let patch = TransferPatch { to_client: Some("Marie Curie".into()), ..TransferPatch::default() };
    let fields = patch.apply(&existing()).unwrap();
    assert_eq!(fields.from_client, "Ana Lopes");
    assert_eq!(fields.to_client, "Marie Curie");
    assert_eq!(fields.amount, dec!(1250));
}

#[test]
fn patch_cannot_make_self_transfer() {
    let patch = TransferPatch { to_client: Some("ANA LOPES".into()), ..TransferPatch::default() };
    assert_eq!(patch.apply(&existing()), Err(ValidationError::SameClient));
}
