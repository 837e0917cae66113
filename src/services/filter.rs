//! Pure filters over client and operation lists.
//!
//! Name matching is case-insensitive and order-insensitive: "jean dupont",
//! "Dupont Jean" and "dupont" all match the client Jean Dupont. Whitespace
//! runs collapse before comparison.

use chrono::NaiveDate;
use serde::Deserialize;

use super::client::{ClientRow, ClientStatus};
use super::operation::{OperationKind, OperationRow};

// =============================================================================
// NAME MATCHING
// =============================================================================

fn normalize(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Does `query` match the person `first last`, in either order?
#[must_use]
pub fn name_matches(query: &str, first: &str, last: &str) -> bool {
    let query = normalize(query);
    if query.is_empty() {
        return true;
    }
    let forward = normalize(&format!("{first} {last}"));
    let reverse = normalize(&format!("{last} {first}"));
    forward.contains(&query) || reverse.contains(&query)
}

/// Match against a denormalized "First Last" string. The first word is the
/// first name; everything after it is the last name.
#[must_use]
pub fn full_name_matches(query: &str, full_name: &str) -> bool {
    let trimmed = full_name.trim();
    let (first, last) = trimmed.split_once(char::is_whitespace).unwrap_or((trimmed, ""));
    name_matches(query, first, last)
}

// =============================================================================
// OPERATIONS
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OperationFilter {
    pub kind: Option<OperationKind>,
    /// Matches either side of the operation.
    pub client: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl OperationFilter {
    #[must_use]
    pub fn matches(&self, op: &OperationRow) -> bool {
        if self.kind.is_some_and(|kind| kind != op.kind) {
            return false;
        }
        if self.from.is_some_and(|from| op.operation_date < from) {
            return false;
        }
        if self.to.is_some_and(|to| op.operation_date > to) {
            return false;
        }
        match self.client.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            None => true,
            Some(query) => {
                full_name_matches(query, &op.client_name)
                    || op.counterparty.as_deref().is_some_and(|name| full_name_matches(query, name))
            }
        }
    }
}

/// Keep the operations that pass `filter`, preserving order.
#[must_use]
pub fn filter_operations(ops: Vec<OperationRow>, filter: &OperationFilter) -> Vec<OperationRow> {
    ops.into_iter().filter(|op| filter.matches(op)).collect()
}

// =============================================================================
// CLIENTS
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientFilter {
    pub search: Option<String>,
    pub status: Option<ClientStatus>,
}

impl ClientFilter {
    /// Name, email or phone contains the search text; status matches if set.
    #[must_use]
    pub fn matches(&self, client: &ClientRow) -> bool {
        if self.status.is_some_and(|status| status != client.status) {
            return false;
        }
        let Some(query) = self.search.as_deref().map(str::trim).filter(|q| !q.is_empty()) else {
            return true;
        };
        let needle = query.to_lowercase();
        name_matches(query, &client.first_name, &client.last_name)
            || client.email.as_deref().is_some_and(|e| e.to_lowercase().contains(&needle))
            || client.phone.as_deref().is_some_and(|p| p.contains(query))
    }
}

#[must_use]
pub fn filter_clients(clients: Vec<ClientRow>, filter: &ClientFilter) -> Vec<ClientRow> {
    clients.into_iter().filter(|c| filter.matches(c)).collect()
}

#[cfg(test)]
#[path = "filter_test.rs"]
mod tests;
