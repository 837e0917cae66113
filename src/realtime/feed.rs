//! Change-feed transport.
//!
//! [`ChangeFeed`] is the seam between the subscription driver and the
//! thing that actually delivers row changes. Production uses
//! [`PgChangeFeed`], a `LISTEN row_changes` session on Postgres; tests use an
//! in-memory script.

use std::collections::HashSet;

use sqlx::PgPool;
use sqlx::postgres::PgListener;
use tracing::{debug, warn};

use super::machine::Failure;
use super::{ChangeEvent, Table};

/// Postgres notification channel written by the row-change triggers.
pub const CHANGE_CHANNEL: &str = "row_changes";

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("change feed database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("change feed closed")]
    Closed,
    #[error("change feed not subscribed")]
    NotSubscribed,
}

impl FeedError {
    /// Map a transport error onto the failure signal the state machine expects.
    #[must_use]
    pub fn failure(&self) -> Failure {
        match self {
            Self::Closed => Failure::Closed,
            Self::Database(_) | Self::NotSubscribed => Failure::Error,
        }
    }
}

impl crate::frame::ErrorCode for FeedError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Database(_) => "E_FEED_DATABASE",
            Self::Closed => "E_FEED_CLOSED",
            Self::NotSubscribed => "E_FEED_NOT_SUBSCRIBED",
        }
    }

    fn retryable(&self) -> bool {
        true
    }
}

#[async_trait::async_trait]
pub trait ChangeFeed: Send {
    /// Open a subscription delivering changes for `tables`.
    async fn subscribe(&mut self, tables: &[Table]) -> Result<(), FeedError>;

    /// Wait for the next change. An error means the subscription is gone.
    async fn next_event(&mut self) -> Result<ChangeEvent, FeedError>;

    /// Drop the subscription. Safe to call when nothing is open.
    async fn release(&mut self);
}

// =============================================================================
// POSTGRES
// =============================================================================

pub struct PgChangeFeed {
    pool: PgPool,
    listener: Option<PgListener>,
    tables: HashSet<Table>,
}

impl PgChangeFeed {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool, listener: None, tables: HashSet::new() }
    }
}

#[async_trait::async_trait]
impl ChangeFeed for PgChangeFeed {
    async fn subscribe(&mut self, tables: &[Table]) -> Result<(), FeedError> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(CHANGE_CHANNEL).await?;
        self.listener = Some(listener);
        self.tables = tables.iter().copied().collect();
        Ok(())
    }

    async fn next_event(&mut self) -> Result<ChangeEvent, FeedError> {
        loop {
            let listener = self.listener.as_mut().ok_or(FeedError::NotSubscribed)?;
            // `None` means the connection dropped; surface it so the driver
            // runs its backoff instead of relying on the listener's silent reconnect.
            let Some(notification) = listener.try_recv().await? else {
                return Err(FeedError::Closed);
            };
            if let Some(event) = accept_payload(&self.tables, notification.payload()) {
                return Ok(event);
            }
        }
    }

    async fn release(&mut self) {
        if self.listener.take().is_some() {
            debug!("released change feed listener");
        }
    }
}

/// Parse a notification payload and keep it only if its table is watched.
pub(crate) fn accept_payload(tables: &HashSet<Table>, payload: &str) -> Option<ChangeEvent> {
    match ChangeEvent::from_payload(payload) {
        Ok(event) if tables.contains(&event.table) => Some(event),
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, payload, "discarding malformed change notification");
            None
        }
    }
}

#[cfg(test)]
#[path = "feed_test.rs"]
mod tests;
