//! Dashboard snapshot kept fresh by the realtime feed.
//!
//! ARCHITECTURE
//! ============
//! [`DashboardSink`] is the [`RefreshSink`] wired into the realtime
//! subscription at startup:
//!
//! - every change event is fanned out to websocket subscribers as-is;
//! - a coalesced refresh reloads the totals once per burst of writes and
//!   pushes a `dashboard:refresh` frame to connections that may read it;
//! - availability notices become `realtime:status` frames.
//!
//! The latest snapshot lives in a shared [`SnapshotStore`] so HTTP handlers
//! and `dashboard:get` can answer without hitting the database while the
//! subscription is live. A failed reload empties the store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::stats::{self, StatsError, Totals};
use crate::frame::{Data, Frame};
use crate::realtime::ChangeEvent;
use crate::realtime::hub::RealtimeHub;
use crate::realtime::subscription::{Notice, RefreshSink};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub totals: Totals,
    pub refreshed_at: DateTime<Utc>,
}

pub type SnapshotStore = Arc<RwLock<Option<DashboardSnapshot>>>;

/// # Errors
///
/// Returns [`StatsError`] if the totals query fails.
pub async fn load_snapshot(pool: &PgPool) -> Result<DashboardSnapshot, StatsError> {
    let totals = stats::load_totals(pool).await?;
    Ok(DashboardSnapshot { totals, refreshed_at: Utc::now() })
}

/// `dashboard:refresh` frame carrying a snapshot.
#[must_use]
pub fn dashboard_frame(snapshot: &DashboardSnapshot) -> Frame {
    let mut data = Data::new();
    data.insert("snapshot".into(), serde_json::json!(snapshot));
    Frame::request("dashboard:refresh", data)
}

/// `realtime:status` frame for an availability notice.
#[must_use]
pub fn status_frame(notice: Notice) -> Frame {
    let mut data = Data::new();
    data.insert("status".into(), serde_json::json!(notice));
    data.insert("message".into(), serde_json::json!(notice.message()));
    Frame::request("realtime:status", data)
}

pub struct DashboardSink {
    pool: PgPool,
    hub: RealtimeHub,
    store: SnapshotStore,
}

impl DashboardSink {
    #[must_use]
    pub fn new(pool: PgPool, hub: RealtimeHub, store: SnapshotStore) -> Self {
        Self { pool, hub, store }
    }
}

#[async_trait::async_trait]
impl RefreshSink for DashboardSink {
    async fn on_change(&self, event: &ChangeEvent) {
        let delivered = self.hub.publish(event).await;
        tracing::debug!(table = event.table.as_str(), kind = event.kind.as_str(), delivered, "change fanned out");
    }

    async fn refresh(&self) {
        match load_snapshot(&self.pool).await {
            Ok(snapshot) => {
                let frame = dashboard_frame(&snapshot);
                *self.store.write().await = Some(snapshot);
                self.hub.broadcast_dashboard(&frame).await;
            }
            Err(e) => {
                warn!(error = %e, "dashboard refresh failed; cached snapshot dropped");
                *self.store.write().await = None;
            }
        }
    }

    async fn on_notice(&self, notice: Notice) {
        match notice {
            Notice::Unavailable => warn!("{}", notice.message()),
            Notice::Available => info!("{}", notice.message()),
        }
        self.hub.broadcast(&status_frame(notice)).await;
    }
}

#[cfg(test)]
#[path = "dashboard_test.rs"]
mod tests;
