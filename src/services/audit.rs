//! Deleted-row trail.
//!
//! DESIGN
//! ======
//! Nothing is deleted without a trace. Before a client or operation row is
//! removed, a JSONB copy of it is written to the matching `deleted_*` table
//! together with who deleted it. Both statements run on the same
//! connection inside the caller's transaction: either the copy and the
//! delete both commit, or the original row stays where it was.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool, Row};
use tracing::info;
use uuid::Uuid;

pub const DEFAULT_AUDIT_LIMIT: i64 = 100;
pub const MAX_AUDIT_LIMIT: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveTable {
    Clients,
    Deposits,
    Withdrawals,
    Transfers,
    DirectOperations,
}

impl ArchiveTable {
    pub const ALL: [ArchiveTable; 5] = [
        ArchiveTable::Clients,
        ArchiveTable::Deposits,
        ArchiveTable::Withdrawals,
        ArchiveTable::Transfers,
        ArchiveTable::DirectOperations,
    ];

    /// Live table the rows come from.
    #[must_use]
    pub fn source(self) -> &'static str {
        match self {
            ArchiveTable::Clients => "clients",
            ArchiveTable::Deposits => "deposits",
            ArchiveTable::Withdrawals => "withdrawals",
            ArchiveTable::Transfers => "transfers",
            ArchiveTable::DirectOperations => "direct_operations",
        }
    }

    /// Shadow table the copies go to.
    #[must_use]
    pub fn shadow(self) -> &'static str {
        match self {
            ArchiveTable::Clients => "deleted_clients",
            ArchiveTable::Deposits => "deleted_deposits",
            ArchiveTable::Withdrawals => "deleted_withdrawals",
            ArchiveTable::Transfers => "deleted_transfers",
            ArchiveTable::DirectOperations => "deleted_direct_operations",
        }
    }
}

impl fmt::Display for ArchiveTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.source())
    }
}

impl FromStr for ArchiveTable {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        ArchiveTable::ALL
            .into_iter()
            .find(|t| t.source() == normalized)
            .ok_or_else(|| AuditError::UnknownTable(s.to_owned()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("unknown audit table: {0}")]
    UnknownTable(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for AuditError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownTable(_) => "E_UNKNOWN_TABLE",
            Self::Database(_) => "E_DATABASE",
        }
    }
}

/// One archived row.
#[derive(Debug, Clone, Serialize)]
pub struct DeletedRow {
    pub id: Uuid,
    pub original_id: Uuid,
    pub row_data: serde_json::Value,
    pub deleted_by: Option<Uuid>,
    pub deleted_at: DateTime<Utc>,
}

// =============================================================================
// ARCHIVE
// =============================================================================

/// Copy row `id` into the shadow table, then delete it. Runs on the caller's
/// connection so it joins the caller's transaction.
///
/// Returns `false` when no such row exists; nothing is written in that case.
///
/// # Errors
///
/// Returns a database error if either statement fails.
pub async fn archive_and_delete(
    conn: &mut PgConnection,
    table: ArchiveTable,
    id: Uuid,
    deleted_by: Option<Uuid>,
) -> Result<bool, sqlx::Error> {
    let copy = format!(
        "INSERT INTO {shadow} (original_id, row_data, deleted_by)
         SELECT t.id, to_jsonb(t), $2 FROM {source} t WHERE t.id = $1",
        shadow = table.shadow(),
        source = table.source(),
    );
    let copied = sqlx::query(&copy)
        .bind(id)
        .bind(deleted_by)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    if copied == 0 {
        return Ok(false);
    }

    let delete = format!("DELETE FROM {source} WHERE id = $1", source = table.source());
    sqlx::query(&delete).bind(id).execute(&mut *conn).await?;

    info!(%table, %id, ?deleted_by, "row archived and deleted");
    Ok(true)
}

/// [`archive_and_delete`] in its own transaction.
///
/// # Errors
///
/// Returns a database error; the transaction is rolled back on drop.
pub async fn delete_archived(
    pool: &PgPool,
    table: ArchiveTable,
    id: Uuid,
    deleted_by: Option<Uuid>,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let deleted = archive_and_delete(&mut *tx, table, id, deleted_by).await?;
    if deleted {
        tx.commit().await?;
    }
    Ok(deleted)
}

// =============================================================================
// LIST
// =============================================================================

/// Clamp a caller-supplied page size.
#[must_use]
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_AUDIT_LIMIT).clamp(1, MAX_AUDIT_LIMIT)
}

/// Most recent deletions from `table`, newest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_deleted(pool: &PgPool, table: ArchiveTable, limit: Option<i64>) -> Result<Vec<DeletedRow>, AuditError> {
    let sql = format!(
        "SELECT id, original_id, row_data, deleted_by, deleted_at FROM {shadow}
         ORDER BY deleted_at DESC LIMIT $1",
        shadow = table.shadow(),
    );
    let rows = sqlx::query(&sql).bind(clamp_limit(limit)).fetch_all(pool).await?;

    Ok(rows
        .into_iter()
        .map(|r| DeletedRow {
            id: r.get("id"),
            original_id: r.get("original_id"),
            row_data: r.get("row_data"),
            deleted_by: r.get("deleted_by"),
            deleted_at: r.get("deleted_at"),
        })
        .collect())
}

#[cfg(test)]
#[path = "audit_test.rs"]
mod tests;
