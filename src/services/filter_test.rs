use super::*;
use chrono::Utc;
use rust_decimal_macros::dec;
use uuid::Uuid;

fn op(kind: OperationKind, client: &str, counterparty: Option<&str>, date: &str) -> OperationRow {
    OperationRow {
        id: Uuid::new_v4(),
        kind,
        client_name: client.into(),
        counterparty: counterparty.map(Into::into),
        amount: dec!(100),
        operation_date: date.parse().expect("valid date"),
        notes: None,
        status: "completed".into(),
        created_at: Utc::now(),
    }
}

fn client(first: &str, last: &str, status: ClientStatus) -> ClientRow {
    ClientRow {
        id: Uuid::new_v4(),
        first_name: first.into(),
        last_name: last.into(),
        phone: Some("514-555-0199".into()),
        email: Some(format!("{}.{}@example.com", first.to_lowercase(), last.to_lowercase())),
        balance: dec!(0),
        status,
        created_at: Utc::now(),
    }
}

fn sample_ops() -> Vec<OperationRow> {
    vec![
        op(OperationKind::Deposit, "Jean Dupont", None, "2024-01-15"),
        op(OperationKind::Withdrawal, "Marie Curie", None, "2024-02-01"),
        op(OperationKind::Transfer, "Ana Lopes", Some("Jean Dupont"), "2024-02-10"),
        op(OperationKind::Direct, "Marie Curie", Some("Ana Lopes"), "2024-03-05"),
    ]
}

// =============================================================================
// name_matches
// =============================================================================

#[test]
fn name_match_is_case_insensitive_either_order() {
    assert!(name_matches("jean dupont", "Jean", "Dupont"));
    assert!(name_matches("DUPONT JEAN", "Jean", "Dupont"));
    assert!(name_matches("  dupont   jean ", "Jean", "Dupont"));
    assert!(name_matches("pont", "Jean", "Dupont"));
    assert!(!name_matches("jean martin", "Jean", "Dupont"));
}

#[test]
fn empty_query_matches_everyone() {
    assert!(name_matches("", "Jean", "Dupont"));
    assert!(name_matches("   ", "Jean", "Dupont"));
}

#[test]
fn full_name_splits_on_first_space() {
    assert!(full_name_matches("de la cruz maria", "Maria De La Cruz"));
    assert!(full_name_matches("maria de la", "Maria De La Cruz"));
    assert!(full_name_matches("cher", "Cher"));
}

// =============================================================================
// OperationFilter
// =============================================================================

#[test]
fn default_filter_keeps_everything_in_order() {
    let ops = sample_ops();
    let ids: Vec<Uuid> = ops.iter().map(|o| o.id).collect();
    let kept = filter_operations(ops, &OperationFilter::default());
    assert_eq!(kept.iter().map(|o| o.id).collect::<Vec<_>>(), ids);
}

#[test]
fn client_filter_matches_either_side() {
    let filter = OperationFilter { client: Some("dupont jean".into()), ..OperationFilter::default() };
    let kept = filter_operations(sample_ops(), &filter);
    assert_eq!(kept.len(), 2);
    assert_eq!(kept[0].kind, OperationKind::Deposit);
    assert_eq!(kept[1].kind, OperationKind::Transfer);
}

#[test]
fn kind_filter() {
    let filter = OperationFilter { kind: Some(OperationKind::Direct), ..OperationFilter::default() };
    let kept = filter_operations(sample_ops(), &filter);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].counterparty.as_deref(), Some("Ana Lopes"));
}

#[test]
fn date_range_is_inclusive() {
    let filter = OperationFilter {
        from: "2024-02-01".parse().ok(),
        to: "2024-02-10".parse().ok(),
        ..OperationFilter::default()
    };
    let kept = filter_operations(sample_ops(), &filter);
    assert_eq!(kept.iter().map(|o| o.kind).collect::<Vec<_>>(), vec![OperationKind::Withdrawal, OperationKind::Transfer]);
}

#[test]
fn combined_filters_intersect() {
    let filter = OperationFilter {
        kind: Some(OperationKind::Withdrawal),
        client: Some("curie".into()),
        from: "2024-03-01".parse().ok(),
        to: None,
    };
    assert!(filter_operations(sample_ops(), &filter).is_empty());
}

// =============================================================================
// ClientFilter
// =============================================================================

#[test]
fn client_search_by_name_email_or_phone() {
    let clients = vec![
        client("Jean", "Dupont", ClientStatus::Active),
        client("Marie", "Curie", ClientStatus::Inactive),
    ];

    let by_name = ClientFilter { search: Some("Curie Marie".into()), status: None };
    assert_eq!(filter_clients(clients.clone(), &by_name).len(), 1);

    let by_email = ClientFilter { search: Some("JEAN.DUPONT@".into()), status: None };
    assert_eq!(filter_clients(clients.clone(), &by_email)[0].first_name, "Jean");

    let by_phone = ClientFilter { search: Some("555-0199".into()), status: None };
    assert_eq!(filter_clients(clients, &by_phone).len(), 2);
}

#[test]
fn client_status_filter() {
    let clients = vec![
        client("Jean", "Dupont", ClientStatus::Active),
        client("Marie", "Curie", ClientStatus::Inactive),
    ];
    let inactive = ClientFilter { search: None, status: Some(ClientStatus::Inactive) };
    let kept = filter_clients(clients, &inactive);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].last_name, "Curie");
}

#[test]
fn operation_filter_deserializes_from_query() {
    let filter: OperationFilter =
        serde_json::from_value(serde_json::json!({"kind": "deposit", "client": "jean", "from": "2024-01-01"})).unwrap();
    assert_eq!(filter.kind, Some(OperationKind::Deposit));
    assert_eq!(filter.from, "2024-01-01".parse().ok());
    assert_eq!(filter.to, None);
}
