//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the database pool, the websocket fan-out hub, the latest
//! dashboard snapshot and a watch on the realtime subscription phase.
//! Everything is `Arc`-backed or `Clone`, so cloning per request is cheap.

use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::watch;

use crate::config::ServerConfig;
use crate::realtime::hub::RealtimeHub;
use crate::realtime::machine::Phase;
use crate::realtime::subscription::RealtimeHandle;
use crate::services::dashboard::SnapshotStore;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<ServerConfig>,
    pub hub: RealtimeHub,
    pub snapshot: SnapshotStore,
    /// Phase of the realtime subscription; stays `Idle` when none is running.
    pub realtime_phase: watch::Receiver<Phase>,
}

impl AppState {
    #[must_use]
    pub fn new(pool: PgPool, config: ServerConfig) -> Self {
        let (_tx, realtime_phase) = watch::channel(Phase::Idle);
        Self {
            pool,
            config: Arc::new(config),
            hub: RealtimeHub::new(),
            snapshot: SnapshotStore::default(),
            realtime_phase,
        }
    }

    /// Observe the phase of a running subscription.
    #[must_use]
    pub fn with_realtime(mut self, handle: &RealtimeHandle) -> Self {
        self.realtime_phase = handle.watch_phase();
        self
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        *self.realtime_phase.borrow()
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
#[path = "state_helpers_test.rs"]
pub mod test_helpers;

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
