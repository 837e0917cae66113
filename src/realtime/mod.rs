//! Realtime change feed: subscription, reconnect, coalesced refresh, fan-out.
//!
//! ARCHITECTURE
//! ============
//! Row triggers publish `{table, event, id}` on the Postgres `row_changes`
//! channel. One background [`subscription`] task listens through a
//! [`feed::ChangeFeed`], forwards every event to the [`hub`] (websocket
//! subscribers), and asks its sink for a coalesced refresh of derived state.
//!
//! The reconnect logic is a pure state machine ([`machine`]) fed by the
//! async driver; timing rules live in [`policy`] (backoff) and
//! [`coalesce`] (burst collapsing) so they can be tested without a runtime.

pub mod coalesce;
pub mod feed;
pub mod hub;
pub mod machine;
pub mod policy;
pub mod subscription;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::env_parse;

const DEFAULT_SUBSCRIBE_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_QUIET_MS: u64 = 1000;
const DEFAULT_REFRESH_DELAY_MS: u64 = 300;

// =============================================================================
// TABLES & EVENTS
// =============================================================================

/// Tables that publish row changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Clients,
    Deposits,
    Withdrawals,
    Transfers,
    DirectOperations,
    Profiles,
    UserPermissions,
}

impl Table {
    pub const ALL: [Table; 7] = [
        Table::Clients,
        Table::Deposits,
        Table::Withdrawals,
        Table::Transfers,
        Table::DirectOperations,
        Table::Profiles,
        Table::UserPermissions,
    ];

    /// Tables the back-office dashboard watches by default.
    pub const LEDGER: [Table; 5] =
        [Table::Clients, Table::Deposits, Table::Withdrawals, Table::Transfers, Table::DirectOperations];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Table::Clients => "clients",
            Table::Deposits => "deposits",
            Table::Withdrawals => "withdrawals",
            Table::Transfers => "transfers",
            Table::DirectOperations => "direct_operations",
            Table::Profiles => "profiles",
            Table::UserPermissions => "user_permissions",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown table: {0}")]
pub struct UnknownTable(pub String);

impl FromStr for Table {
    type Err = UnknownTable;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Table::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| UnknownTable(s.to_owned()))
    }
}

/// Row-level change type, as reported by `TG_OP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub const ALL: [ChangeKind; 3] = [ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete];

    /// Lowercase name used in websocket syscalls (`change:insert`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Insert => "insert",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "insert" => Some(ChangeKind::Insert),
            "update" => Some(ChangeKind::Update),
            "delete" => Some(ChangeKind::Delete),
            _ => None,
        }
    }
}

/// One row change as delivered on the `row_changes` channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    #[serde(rename = "event")]
    pub kind: ChangeKind,
    #[serde(default)]
    pub id: Option<Uuid>,
}

impl ChangeEvent {
    /// Parse a `pg_notify` payload.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if the payload is not a change event.
    pub fn from_payload(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

// =============================================================================
// CONFIG
// =============================================================================

/// Everything the subscription driver needs besides its feed and sink.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    pub tables: Vec<Table>,
    pub policy: policy::ReconnectPolicy,
    /// How long a subscribe attempt may take before it counts as a timeout.
    pub subscribe_timeout: Duration,
    /// Minimum gap since the previous event before a new refresh is scheduled.
    pub quiet_period: Duration,
    /// Delay between scheduling a refresh and running it.
    pub refresh_delay: Duration,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            tables: Table::LEDGER.to_vec(),
            policy: policy::ReconnectPolicy::default(),
            subscribe_timeout: Duration::from_millis(DEFAULT_SUBSCRIBE_TIMEOUT_MS),
            quiet_period: Duration::from_millis(DEFAULT_QUIET_MS),
            refresh_delay: Duration::from_millis(DEFAULT_REFRESH_DELAY_MS),
        }
    }
}

impl RealtimeConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let tables = std::env::var("REALTIME_TABLES")
            .ok()
            .map(|raw| parse_table_list(&raw))
            .filter(|tables| !tables.is_empty())
            .unwrap_or_else(|| Table::LEDGER.to_vec());

        Self {
            tables,
            policy: policy::ReconnectPolicy::from_env(),
            subscribe_timeout: Duration::from_millis(env_parse(
                "REALTIME_SUBSCRIBE_TIMEOUT_MS",
                DEFAULT_SUBSCRIBE_TIMEOUT_MS,
            )),
            quiet_period: Duration::from_millis(env_parse("REALTIME_QUIET_MS", DEFAULT_QUIET_MS)),
            refresh_delay: Duration::from_millis(env_parse("REALTIME_REFRESH_DELAY_MS", DEFAULT_REFRESH_DELAY_MS)),
        }
    }
}

/// Parse a comma-separated table list, skipping unknown names with a warning.
pub(crate) fn parse_table_list(raw: &str) -> Vec<Table> {
    let mut tables = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match name.parse::<Table>() {
            Ok(table) if !tables.contains(&table) => tables.push(table),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "ignoring realtime table"),
        }
    }
    tables
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
