//! Shared types for money movements and the unified operations list.
//!
//! DESIGN
//! ======
//! Deposits, withdrawals, transfers and direct operations live in separate
//! tables with slightly different shapes. Each kind has its own service
//! (`cash`, `transfer`, `direct`); this module owns what they share: the
//! kind enum, the error type, and [`OperationRow`], the flattened view used
//! by the operations list, filters and CSV export.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::access::{DbErrorClass, classify_db_error};
use super::audit::ArchiveTable;
use super::filter::{self, OperationFilter};
use super::validation::ValidationError;
use crate::realtime::Table;

// =============================================================================
// KIND
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Deposit,
    Withdrawal,
    Transfer,
    Direct,
}

impl OperationKind {
    pub const ALL: [OperationKind; 4] =
        [OperationKind::Deposit, OperationKind::Withdrawal, OperationKind::Transfer, OperationKind::Direct];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Deposit => "deposit",
            OperationKind::Withdrawal => "withdrawal",
            OperationKind::Transfer => "transfer",
            OperationKind::Direct => "direct",
        }
    }

    #[must_use]
    pub fn table(self) -> Table {
        match self {
            OperationKind::Deposit => Table::Deposits,
            OperationKind::Withdrawal => Table::Withdrawals,
            OperationKind::Transfer => Table::Transfers,
            OperationKind::Direct => Table::DirectOperations,
        }
    }

    #[must_use]
    pub fn archive(self) -> ArchiveTable {
        match self {
            OperationKind::Deposit => ArchiveTable::Deposits,
            OperationKind::Withdrawal => ArchiveTable::Withdrawals,
            OperationKind::Transfer => ArchiveTable::Transfers,
            OperationKind::Direct => ArchiveTable::DirectOperations,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = OperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deposit" | "deposits" => Ok(OperationKind::Deposit),
            "withdrawal" | "withdrawals" => Ok(OperationKind::Withdrawal),
            "transfer" | "transfers" => Ok(OperationKind::Transfer),
            "direct" | "direct_operation" | "direct_operations" | "direct-operations" => Ok(OperationKind::Direct),
            _ => Err(OperationError::UnknownKind(s.to_owned())),
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error("{0} not found: {1}")]
    NotFound(OperationKind, Uuid),
    #[error("client not found: {0}")]
    ClientNotFound(Uuid),
    #[error("unknown operation kind: {0}")]
    UnknownKind(String),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("permission denied by database policy")]
    Denied,
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for OperationError {
    fn from(err: sqlx::Error) -> Self {
        match classify_db_error(&err) {
            DbErrorClass::PermissionDenied => Self::Denied,
            _ => Self::Database(err),
        }
    }
}

impl crate::frame::ErrorCode for OperationError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(..) => "E_OPERATION_NOT_FOUND",
            Self::ClientNotFound(_) => "E_CLIENT_NOT_FOUND",
            Self::UnknownKind(_) => "E_UNKNOWN_KIND",
            Self::Invalid(inner) => inner.error_code(),
            Self::Denied => "E_PERMISSION_DENIED",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(err) if classify_db_error(err) == DbErrorClass::Unavailable)
    }
}

// =============================================================================
// UNIFIED ROW
// =============================================================================

/// One movement of any kind, flattened for listing and export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationRow {
    pub id: Uuid,
    pub kind: OperationKind,
    /// Client the money is credited to or debited from; the sender for transfers.
    pub client_name: String,
    /// Receiving side for transfers and direct operations.
    pub counterparty: Option<String>,
    pub amount: Decimal,
    pub operation_date: NaiveDate,
    pub notes: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Resolve a client's display name, used to denormalize names onto operations.
pub(crate) async fn client_display_name(pool: &PgPool, client_id: Uuid) -> Result<String, OperationError> {
    let row = sqlx::query("SELECT first_name, last_name FROM clients WHERE id = $1")
        .bind(client_id)
        .fetch_optional(pool)
        .await?
        .ok_or(OperationError::ClientNotFound(client_id))?;
    let first: String = row.get("first_name");
    let last: String = row.get("last_name");
    Ok(format!("{first} {last}"))
}

/// Every operation across the four tables, newest first, narrowed by `filter`.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_operations(pool: &PgPool, filter: &OperationFilter) -> Result<Vec<OperationRow>, OperationError> {
    let rows = sqlx::query(
        r"SELECT id, 'deposit' AS kind, client_name, NULL::text AS counterparty, amount,
                 operation_date, notes, status, created_at
            FROM deposits
          UNION ALL
          SELECT id, 'withdrawal', client_name, NULL, amount, operation_date, notes, status, created_at
            FROM withdrawals
          UNION ALL
          SELECT id, 'transfer', from_client, to_client, amount, created_at::date, reason, 'completed', created_at
            FROM transfers
          UNION ALL
          SELECT id, 'direct', from_client_name, to_client_name, amount, operation_date, notes, status, created_at
            FROM direct_operations
          ORDER BY operation_date DESC, created_at DESC",
    )
    .fetch_all(pool)
    .await?;

    let all = rows
        .into_iter()
        .filter_map(|r| {
            let kind: String = r.get("kind");
            let kind = kind.parse().ok()?;
            Some(OperationRow {
                id: r.get("id"),
                kind,
                client_name: r.get("client_name"),
                counterparty: r.get("counterparty"),
                amount: r.get("amount"),
                operation_date: r.get("operation_date"),
                notes: r.get("notes"),
                status: r.get("status"),
                created_at: r.get("created_at"),
            })
        })
        .collect();

    Ok(filter::filter_operations(all, filter))
}

#[cfg(test)]
#[path = "operation_test.rs"]
mod tests;
