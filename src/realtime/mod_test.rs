use super::*;

#[test]
fn table_names_round_trip_through_from_str() {
    for table in Table::ALL {
        assert_eq!(table.as_str().parse::<Table>(), Ok(table));
    }
}

#[test]
fn table_from_str_accepts_dashes_and_case() {
    assert_eq!("Direct-Operations".parse::<Table>(), Ok(Table::DirectOperations));
    assert!("ledger".parse::<Table>().is_err());
}

#[test]
fn change_event_parses_trigger_payload() {
    let id = Uuid::new_v4();
    let payload = format!(r#"{{"table":"deposits","event":"INSERT","id":"{id}"}}"#);
    let event = ChangeEvent::from_payload(&payload).expect("payload should parse");
    assert_eq!(event.table, Table::Deposits);
    assert_eq!(event.kind, ChangeKind::Insert);
    assert_eq!(event.id, Some(id));
}

#[test]
fn change_event_without_id() {
    let event = ChangeEvent::from_payload(r#"{"table":"direct_operations","event":"DELETE"}"#)
        .expect("payload should parse");
    assert_eq!(event.table, Table::DirectOperations);
    assert_eq!(event.kind, ChangeKind::Delete);
    assert!(event.id.is_none());
}

#[test]
fn change_event_rejects_unknown_table() {
    assert!(ChangeEvent::from_payload(r#"{"table":"frames","event":"INSERT"}"#).is_err());
}

#[test]
fn change_kind_parse_is_case_insensitive() {
    assert_eq!(ChangeKind::parse("Update"), Some(ChangeKind::Update));
    assert_eq!(ChangeKind::parse("truncate"), None);
}

#[test]
fn parse_table_list_skips_unknown_and_duplicates() {
    let tables = parse_table_list("clients, deposits,bogus,,clients");
    assert_eq!(tables, vec![Table::Clients, Table::Deposits]);
}

#[test]
fn default_config_watches_ledger_tables() {
    let config = RealtimeConfig::default();
    assert_eq!(config.tables, Table::LEDGER.to_vec());
    assert!(config.refresh_delay < config.quiet_period);
}
