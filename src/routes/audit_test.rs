use super::*;

#[test]
fn audit_error_to_status_maps_unknown_table() {
    assert_eq!(audit_error_to_status(&AuditError::UnknownTable("ledgers".into())), StatusCode::NOT_FOUND);
}

#[test]
fn audit_error_to_status_maps_database() {
    assert_eq!(
        audit_error_to_status(&AuditError::Database(sqlx::Error::PoolTimedOut)),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn path_kind_parses_to_archive_table() {
    let table: ArchiveTable = "deposits".parse().unwrap();
    assert_eq!(table, ArchiveTable::Deposits);
    let err = "ledgers".parse::<ArchiveTable>().unwrap_err();
    assert_eq!(audit_error(err).status, StatusCode::NOT_FOUND);
}

#[test]
fn audit_query_limit_is_optional() {
    let uri: axum::http::Uri = "/api/audit/clients?limit=25".parse().unwrap();
    let Query(query) = Query::<AuditQuery>::try_from_uri(&uri).unwrap();
    assert_eq!(query.limit, Some(25));
}
