use super::*;
use crate::realtime::policy::ReconnectPolicy;
use crate::realtime::{ChangeKind, Table};
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

// =============================================================================
// MOCKS
// =============================================================================

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Ok,
    Fail,
    Hang,
}

#[derive(Default)]
struct FeedLog {
    subscribes: usize,
    releases: usize,
}

struct MockFeed {
    script: Arc<StdMutex<VecDeque<Outcome>>>,
    events: mpsc::UnboundedReceiver<Result<ChangeEvent, FeedError>>,
    log: Arc<StdMutex<FeedLog>>,
}

#[async_trait::async_trait]
impl ChangeFeed for MockFeed {
    async fn subscribe(&mut self, _tables: &[Table]) -> Result<(), FeedError> {
        self.log.lock().expect("log lock").subscribes += 1;
        let outcome = self.script.lock().expect("script lock").pop_front().unwrap_or(Outcome::Ok);
        match outcome {
            Outcome::Ok => Ok(()),
            Outcome::Fail => Err(FeedError::Database(sqlx::Error::PoolTimedOut)),
            Outcome::Hang => std::future::pending().await,
        }
    }

    async fn next_event(&mut self) -> Result<ChangeEvent, FeedError> {
        self.events.recv().await.unwrap_or(Err(FeedError::Closed))
    }

    async fn release(&mut self) {
        self.log.lock().expect("log lock").releases += 1;
    }
}

#[derive(Default)]
struct RecordingSink {
    changes: AtomicUsize,
    refreshes: AtomicUsize,
    notices: StdMutex<Vec<Notice>>,
}

#[async_trait::async_trait]
impl RefreshSink for RecordingSink {
    async fn on_change(&self, _event: &ChangeEvent) {
        self.changes.fetch_add(1, Ordering::SeqCst);
    }

    async fn refresh(&self) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
    }

    async fn on_notice(&self, notice: Notice) {
        self.notices.lock().expect("notices lock").push(notice);
    }
}

struct Harness {
    handle: RealtimeHandle,
    sink: Arc<RecordingSink>,
    events_tx: mpsc::UnboundedSender<Result<ChangeEvent, FeedError>>,
    log: Arc<StdMutex<FeedLog>>,
}

impl Harness {
    fn refreshes(&self) -> usize {
        self.sink.refreshes.load(Ordering::SeqCst)
    }

    fn subscribes(&self) -> usize {
        self.log.lock().expect("log lock").subscribes
    }

    fn releases(&self) -> usize {
        self.log.lock().expect("log lock").releases
    }

    fn notices(&self) -> Vec<Notice> {
        self.sink.notices.lock().expect("notices lock").clone()
    }

    fn emit(&self, table: Table) {
        let event = ChangeEvent { table, kind: ChangeKind::Insert, id: None };
        self.events_tx.send(Ok(event)).expect("driver should hold the receiver");
    }
}

fn config(max_attempts: u32) -> RealtimeConfig {
    RealtimeConfig {
        tables: Table::LEDGER.to_vec(),
        policy: ReconnectPolicy {
            base_delay: Duration::from_millis(100),
            max_attempts,
            penalty: Duration::from_millis(50),
            penalty_threshold: 0.7,
            cooldown: Duration::from_secs(60),
        },
        subscribe_timeout: Duration::from_secs(5),
        quiet_period: Duration::from_millis(1000),
        refresh_delay: Duration::from_millis(300),
    }
}

fn start(script: &[Outcome], config: RealtimeConfig) -> Harness {
    let (events_tx, events) = mpsc::unbounded_channel();
    let log = Arc::new(StdMutex::new(FeedLog::default()));
    let feed = MockFeed {
        script: Arc::new(StdMutex::new(script.iter().copied().collect())),
        events,
        log: log.clone(),
    };
    let sink = Arc::new(RecordingSink::default());
    let handle = spawn(feed, sink.clone(), config);
    Harness { handle, sink, events_tx, log }
}

async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

// =============================================================================
// SUBSCRIBE + REFRESH
// =============================================================================

#[tokio::test(start_paused = true)]
async fn subscribe_triggers_one_immediate_refresh() {
    let h = start(&[], config(5));
    sleep_ms(10).await;

    assert_eq!(h.handle.phase(), Phase::Subscribed);
    assert_eq!(h.subscribes(), 1);
    assert_eq!(h.refreshes(), 1);
    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn burst_of_events_collapses_into_one_refresh() {
    let h = start(&[], config(5));
    sleep_ms(10).await;

    for _ in 0..5 {
        h.emit(Table::Deposits);
    }
    sleep_ms(100).await;
    assert_eq!(h.sink.changes.load(Ordering::SeqCst), 5);
    assert_eq!(h.refreshes(), 1, "refresh waits for the refresh delay");

    sleep_ms(300).await;
    assert_eq!(h.refreshes(), 2);

    sleep_ms(2000).await;
    assert_eq!(h.refreshes(), 2, "no further refresh without events");
    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn burst_tail_is_flushed_after_quiet_period() {
    let h = start(&[], config(5));
    sleep_ms(10).await;

    h.emit(Table::Withdrawals);
    sleep_ms(400).await;
    assert_eq!(h.refreshes(), 2);

    // Inside the quiet window, nothing pending: deferred, not dropped.
    h.emit(Table::Withdrawals);
    sleep_ms(500).await;
    assert_eq!(h.refreshes(), 2);

    sleep_ms(1000).await;
    assert_eq!(h.refreshes(), 3);
    h.handle.shutdown().await;
}

// =============================================================================
// BACKOFF
// =============================================================================

#[tokio::test(start_paused = true)]
async fn failed_subscribes_retry_with_backoff() {
    let h = start(&[Outcome::Fail, Outcome::Fail], config(5));
    sleep_ms(10).await;
    assert_eq!(h.subscribes(), 1);
    assert_eq!(h.handle.phase(), Phase::Retrying { attempt: 1 });

    // First retry after 100ms.
    sleep_ms(100).await;
    assert_eq!(h.subscribes(), 2);
    assert_eq!(h.handle.phase(), Phase::Retrying { attempt: 2 });

    // Second retry after 200ms more.
    sleep_ms(150).await;
    assert_eq!(h.subscribes(), 2);
    sleep_ms(60).await;
    assert_eq!(h.subscribes(), 3);
    assert_eq!(h.handle.phase(), Phase::Subscribed);
    assert_eq!(h.refreshes(), 1);
    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn subscribe_timeout_counts_as_failure() {
    let h = start(&[Outcome::Hang], config(5));
    sleep_ms(4000).await;
    assert_eq!(h.handle.phase(), Phase::Connecting);

    sleep_ms(1010).await;
    assert_eq!(h.handle.phase(), Phase::Retrying { attempt: 1 });

    sleep_ms(100).await;
    assert_eq!(h.handle.phase(), Phase::Subscribed);
    h.handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn closed_feed_resubscribes_and_refreshes() {
    let h = start(&[], config(5));
    sleep_ms(10).await;
    assert_eq!(h.refreshes(), 1);

    h.events_tx.send(Err(FeedError::Closed)).expect("send close");
    sleep_ms(10).await;
    assert_eq!(h.handle.phase(), Phase::Retrying { attempt: 1 });
    assert_eq!(h.releases(), 1);

    sleep_ms(100).await;
    assert_eq!(h.handle.phase(), Phase::Subscribed);
    assert_eq!(h.subscribes(), 2);
    assert_eq!(h.refreshes(), 2);
    h.handle.shutdown().await;
}

// =============================================================================
// COOLDOWN
// =============================================================================

#[tokio::test(start_paused = true)]
async fn exhausted_retries_notify_and_cool_down() {
    // Initial attempt + 2 retries all fail; the third failure enters cooldown.
    let h = start(&[Outcome::Fail, Outcome::Fail, Outcome::Fail], config(2));
    sleep_ms(1000).await;

    assert_eq!(h.subscribes(), 3);
    assert_eq!(h.handle.phase(), Phase::Cooldown);
    assert_eq!(h.notices(), vec![Notice::Unavailable]);

    // Nothing happens during cooldown.
    sleep_ms(30_000).await;
    assert_eq!(h.subscribes(), 3);

    sleep_ms(31_000).await;
    assert_eq!(h.subscribes(), 4);
    assert_eq!(h.handle.phase(), Phase::Subscribed);
    assert_eq!(h.notices(), vec![Notice::Unavailable, Notice::Available]);
    assert_eq!(h.refreshes(), 1);
    h.handle.shutdown().await;
}

// =============================================================================
// SHUTDOWN
// =============================================================================

#[tokio::test(start_paused = true)]
async fn shutdown_releases_feed_and_is_idempotent() {
    let h = start(&[], config(5));
    sleep_ms(10).await;

    h.emit(Table::Clients);
    sleep_ms(10).await;
    h.handle.shutdown().await;
    h.handle.shutdown().await;

    assert_eq!(h.handle.phase(), Phase::Idle);
    assert_eq!(h.releases(), 1);

    // The pending refresh was cancelled with the task.
    sleep_ms(1000).await;
    assert_eq!(h.refreshes(), 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_during_backoff_cancels_retry() {
    let h = start(&[Outcome::Fail], config(5));
    sleep_ms(10).await;
    assert_eq!(h.handle.phase(), Phase::Retrying { attempt: 1 });

    h.handle.shutdown().await;
    sleep_ms(1000).await;
    assert_eq!(h.subscribes(), 1);
    assert_eq!(h.handle.phase(), Phase::Idle);
}

#[tokio::test(start_paused = true)]
async fn shutdown_during_subscribe_does_not_wait_for_timeout() {
    let h = start(&[Outcome::Hang], config(5));
    sleep_ms(10).await;
    assert_eq!(h.handle.phase(), Phase::Connecting);

    let started = tokio::time::Instant::now();
    tokio::time::timeout(Duration::from_millis(100), h.handle.shutdown())
        .await
        .expect("shutdown waited on the hung subscribe");
    assert!(started.elapsed() < Duration::from_millis(100));

    assert_eq!(h.handle.phase(), Phase::Idle);
    assert_eq!(h.releases(), 1);
    assert_eq!(h.refreshes(), 0);

    sleep_ms(10_000).await;
    assert_eq!(h.subscribes(), 1);
}
