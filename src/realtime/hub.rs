//! Websocket fan-out for row changes.
//!
//! DESIGN
//! ======
//! Each connected websocket registers an outbound `mpsc` sender. A client
//! receives `change:*` frames only for the tables and event kinds it asked
//! for. Status frames go to every registered client; dashboard frames only
//! to clients registered as dashboard readers.
//! Delivery is best-effort: a full client channel skips that client.
//!
//! Dropping a user's entries drops their senders, which closes the
//! connection loop on the other end.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use super::{ChangeEvent, ChangeKind, Table};
use crate::frame::{Data, Frame};

struct Subscriber {
    user_id: Uuid,
    dashboard: bool,
    tables: HashSet<Table>,
    kinds: HashSet<ChangeKind>,
    tx: mpsc::Sender<Frame>,
}

impl Subscriber {
    fn wants(&self, event: &ChangeEvent) -> bool {
        self.tables.contains(&event.table) && self.kinds.contains(&event.kind)
    }
}

#[derive(Clone, Default)]
pub struct RealtimeHub {
    subscribers: Arc<RwLock<HashMap<Uuid, Subscriber>>>,
}

impl RealtimeHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection with no subscriptions yet. `dashboard` marks
    /// connections allowed to receive dashboard snapshots.
    pub async fn register(&self, client_id: Uuid, user_id: Uuid, dashboard: bool, tx: mpsc::Sender<Frame>) {
        let mut subscribers = self.subscribers.write().await;
        subscribers.insert(
            client_id,
            Subscriber { user_id, dashboard, tables: HashSet::new(), kinds: HashSet::new(), tx },
        );
    }

    /// Add tables and kinds to a connection's filter. Empty `kinds` means all.
    /// Returns `false` if the client is not registered.
    pub async fn subscribe(&self, client_id: Uuid, tables: &[Table], kinds: &[ChangeKind]) -> bool {
        let mut subscribers = self.subscribers.write().await;
        let Some(sub) = subscribers.get_mut(&client_id) else {
            return false;
        };
        sub.tables.extend(tables.iter().copied());
        if kinds.is_empty() {
            sub.kinds.extend(ChangeKind::ALL);
        } else {
            sub.kinds.extend(kinds.iter().copied());
        }
        true
    }

    /// Clear a connection's filters; it stays registered for status frames.
    pub async fn unsubscribe(&self, client_id: Uuid) {
        let mut subscribers = self.subscribers.write().await;
        if let Some(sub) = subscribers.get_mut(&client_id) {
            sub.tables.clear();
            sub.kinds.clear();
        }
    }

    pub async fn remove(&self, client_id: Uuid) {
        self.subscribers.write().await.remove(&client_id);
    }

    /// Drop every connection of a user. Returns how many were dropped.
    pub async fn drop_user(&self, user_id: Uuid) -> usize {
        let mut subscribers = self.subscribers.write().await;
        let before = subscribers.len();
        subscribers.retain(|_, sub| sub.user_id != user_id);
        before - subscribers.len()
    }

    /// Tables a connection currently receives, sorted.
    pub async fn tables_for(&self, client_id: Uuid) -> Vec<Table> {
        let subscribers = self.subscribers.read().await;
        let mut tables: Vec<Table> = subscribers
            .get(&client_id)
            .map(|sub| sub.tables.iter().copied().collect())
            .unwrap_or_default();
        tables.sort();
        tables
    }

    pub async fn len(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Deliver a change to every matching subscriber. Returns the number reached.
    pub async fn publish(&self, event: &ChangeEvent) -> usize {
        let frame = change_frame(event);
        let subscribers = self.subscribers.read().await;
        let mut delivered = 0;
        for sub in subscribers.values().filter(|sub| sub.wants(event)) {
            if sub.tx.try_send(frame.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Deliver a frame to every registered connection.
    pub async fn broadcast(&self, frame: &Frame) {
        let subscribers = self.subscribers.read().await;
        for sub in subscribers.values() {
            let _ = sub.tx.try_send(frame.clone());
        }
    }

    /// Deliver a frame to dashboard readers only.
    pub async fn broadcast_dashboard(&self, frame: &Frame) {
        let subscribers = self.subscribers.read().await;
        for sub in subscribers.values().filter(|sub| sub.dashboard) {
            let _ = sub.tx.try_send(frame.clone());
        }
    }
}

/// `change:<kind>` frame for a row change.
#[must_use]
pub fn change_frame(event: &ChangeEvent) -> Frame {
    let mut data = Data::new();
    data.insert("table".into(), serde_json::json!(event.table));
    data.insert("id".into(), serde_json::json!(event.id));
    Frame::request(format!("change:{}", event.kind.as_str()), data)
}

#[cfg(test)]
#[path = "hub_test.rs"]
mod tests;
