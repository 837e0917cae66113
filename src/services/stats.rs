//! Statistics and balance reconciliation.
//!
//! DESIGN
//! ======
//! Client balances are maintained by triggers, and anything that bypasses
//! them (manual SQL, restored rows) makes the stored balance drift from the
//! movements on record. This module recomputes each client's expected
//! balance from the movement tables:
//!
//! ```text
//! expected = deposits - withdrawals + direct_in - direct_out
//! ```
//!
//! and reports the difference from the recorded `balance`. Transfers are
//! recorded by name only and never touch balances, so they are counted in
//! the totals but not in reconciliation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::access::{DbErrorClass, classify_db_error};

#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    #[error("permission denied by database policy")]
    Denied,
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StatsError {
    fn from(err: sqlx::Error) -> Self {
        match classify_db_error(&err) {
            DbErrorClass::PermissionDenied => Self::Denied,
            _ => Self::Database(err),
        }
    }
}

impl crate::frame::ErrorCode for StatsError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Denied => "E_PERMISSION_DENIED",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(err) if classify_db_error(err) == DbErrorClass::Unavailable)
    }
}

// =============================================================================
// RECONCILIATION
// =============================================================================

/// Sums of every movement touching one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientFlows {
    pub client_id: Uuid,
    pub client_name: String,
    pub recorded: Decimal,
    pub deposits: Decimal,
    pub withdrawals: Decimal,
    pub direct_in: Decimal,
    pub direct_out: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientReconciliation {
    pub client_id: Uuid,
    pub client_name: String,
    pub expected: Decimal,
    pub recorded: Decimal,
    /// `recorded - expected`; zero when the balance is consistent.
    pub drift: Decimal,
}

impl ClientReconciliation {
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.drift.is_zero()
    }
}

#[must_use]
pub fn reconcile(flows: &ClientFlows) -> ClientReconciliation {
    let expected = flows.deposits - flows.withdrawals + flows.direct_in - flows.direct_out;
    ClientReconciliation {
        client_id: flows.client_id,
        client_name: flows.client_name.clone(),
        expected,
        recorded: flows.recorded,
        drift: flows.recorded - expected,
    }
}

// =============================================================================
// TOTALS
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KindTotal {
    pub count: i64,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub clients: i64,
    pub active_clients: i64,
    pub total_balance: Decimal,
    pub deposits: KindTotal,
    pub withdrawals: KindTotal,
    pub transfers: KindTotal,
    pub direct_operations: KindTotal,
}

impl Totals {
    /// Deposits minus withdrawals: cash that came in through the desk.
    #[must_use]
    pub fn net_cash(&self) -> Decimal {
        self.deposits.amount - self.withdrawals.amount
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub totals: Totals,
    pub net_cash: Decimal,
    pub clients: Vec<ClientReconciliation>,
    /// Clients whose recorded balance differs from their movements.
    pub drifted: usize,
    pub total_drift: Decimal,
    pub generated_at: DateTime<Utc>,
}

/// Assemble a report from loaded totals and per-client flows.
#[must_use]
pub fn build_report(totals: Totals, flows: &[ClientFlows]) -> StatsReport {
    let clients: Vec<ClientReconciliation> = flows.iter().map(reconcile).collect();
    let drifted = clients.iter().filter(|c| !c.is_consistent()).count();
    let total_drift = clients.iter().map(|c| c.drift).sum();
    StatsReport {
        net_cash: totals.net_cash(),
        totals,
        clients,
        drifted,
        total_drift,
        generated_at: Utc::now(),
    }
}

// =============================================================================
// QUERIES
// =============================================================================

/// Counts and sums across clients and the four movement tables.
///
/// # Errors
///
/// Returns [`StatsError`] if the query fails.
pub async fn load_totals(pool: &PgPool) -> Result<Totals, StatsError> {
    let r = sqlx::query(
        "SELECT
            (SELECT COUNT(*) FROM clients) AS clients,
            (SELECT COUNT(*) FROM clients WHERE status = 'active') AS active_clients,
            (SELECT COALESCE(SUM(balance), 0) FROM clients) AS total_balance,
            (SELECT COUNT(*) FROM deposits) AS deposit_count,
            (SELECT COALESCE(SUM(amount), 0) FROM deposits) AS deposit_amount,
            (SELECT COUNT(*) FROM withdrawals) AS withdrawal_count,
            (SELECT COALESCE(SUM(amount), 0) FROM withdrawals) AS withdrawal_amount,
            (SELECT COUNT(*) FROM transfers) AS transfer_count,
            (SELECT COALESCE(SUM(amount), 0) FROM transfers) AS transfer_amount,
            (SELECT COUNT(*) FROM direct_operations) AS direct_count,
            (SELECT COALESCE(SUM(amount), 0) FROM direct_operations) AS direct_amount",
    )
    .fetch_one(pool)
    .await?;

    Ok(Totals {
        clients: r.get("clients"),
        active_clients: r.get("active_clients"),
        total_balance: r.get("total_balance"),
        deposits: KindTotal { count: r.get("deposit_count"), amount: r.get("deposit_amount") },
        withdrawals: KindTotal { count: r.get("withdrawal_count"), amount: r.get("withdrawal_amount") },
        transfers: KindTotal { count: r.get("transfer_count"), amount: r.get("transfer_amount") },
        direct_operations: KindTotal { count: r.get("direct_count"), amount: r.get("direct_amount") },
    })
}

/// Per-client movement sums.
///
/// # Errors
///
/// Returns [`StatsError`] if the query fails.
pub async fn load_flows(pool: &PgPool) -> Result<Vec<ClientFlows>, StatsError> {
    let rows = sqlx::query(
        "SELECT c.id, c.first_name, c.last_name, c.balance,
                COALESCE((SELECT SUM(amount) FROM deposits WHERE client_id = c.id), 0) AS deposits,
                COALESCE((SELECT SUM(amount) FROM withdrawals WHERE client_id = c.id), 0) AS withdrawals,
                COALESCE((SELECT SUM(amount) FROM direct_operations WHERE to_client_id = c.id), 0) AS direct_in,
                COALESCE((SELECT SUM(amount) FROM direct_operations WHERE from_client_id = c.id), 0) AS direct_out
           FROM clients c
          ORDER BY c.last_name, c.first_name",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|r| {
            let first: String = r.get("first_name");
            let last: String = r.get("last_name");
            ClientFlows {
                client_id: r.get("id"),
                client_name: format!("{first} {last}"),
                recorded: r.get("balance"),
                deposits: r.get("deposits"),
                withdrawals: r.get("withdrawals"),
                direct_in: r.get("direct_in"),
                direct_out: r.get("direct_out"),
            }
        })
        .collect())
}

/// Totals plus reconciliation for every client.
///
/// # Errors
///
/// Returns [`StatsError`] if a query fails.
pub async fn load_report(pool: &PgPool) -> Result<StatsReport, StatsError> {
    let totals = load_totals(pool).await?;
    let flows = load_flows(pool).await?;
    let report = build_report(totals, &flows);
    if report.drifted > 0 {
        tracing::warn!(drifted = report.drifted, total_drift = %report.total_drift, "client balances drifted");
    }
    Ok(report)
}

#[cfg(test)]
#[path = "stats_test.rs"]
mod tests;
