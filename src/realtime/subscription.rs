//! Subscription driver: runs the reconnect machine against a live feed.
//!
//! LIFECYCLE
//! =========
//! 1. `spawn` starts one task and sends `Start` to the machine.
//! 2. Each effect is performed in order; `Connect` resolves to `Subscribed`
//!    or `Failed` (error, close, or subscribe timeout).
//! 3. While subscribed, every change goes to [`RefreshSink::on_change`] and
//!    through the coalescer, which arms at most one refresh timer.
//! 4. `RealtimeHandle::shutdown` stops the task; every timer is a deadline
//!    owned by the task, so stopping it cancels them all.

use std::collections::VecDeque;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::coalesce::{Decision, RefreshCoalescer};
use super::feed::{ChangeFeed, FeedError};
use super::machine::{Effect, Failure, Phase, ReconnectMachine, Signal};
use super::{ChangeEvent, RealtimeConfig};

/// User-facing availability notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    Unavailable,
    Available,
}

impl Notice {
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Notice::Unavailable => "Realtime updates are temporarily unavailable; data refreshes on reload.",
            Notice::Available => "Realtime updates restored.",
        }
    }
}

/// Consumer of the change feed. Enables mocking in tests.
#[async_trait::async_trait]
pub trait RefreshSink: Send + Sync {
    /// Called for every change event as it arrives.
    async fn on_change(&self, event: &ChangeEvent);

    /// Coalesced refresh of derived state.
    async fn refresh(&self);

    /// Availability changed.
    async fn on_notice(&self, notice: Notice);
}

// =============================================================================
// HANDLE
// =============================================================================

pub struct RealtimeHandle {
    stop_tx: watch::Sender<bool>,
    phase_rx: watch::Receiver<Phase>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RealtimeHandle {
    #[must_use]
    pub fn phase(&self) -> Phase {
        *self.phase_rx.borrow()
    }

    #[must_use]
    pub fn watch_phase(&self) -> watch::Receiver<Phase> {
        self.phase_rx.clone()
    }

    /// Stop the driver, cancel its timers and release the feed. Idempotent.
    pub async fn shutdown(&self) {
        let _ = self.stop_tx.send(true);
        let task = self.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "realtime task ended abnormally");
            }
        }
    }
}

/// Start a subscription task for `config.tables`.
pub fn spawn<F>(feed: F, sink: Arc<dyn RefreshSink>, config: RealtimeConfig) -> RealtimeHandle
where
    F: ChangeFeed + 'static,
{
    let (stop_tx, stop_rx) = watch::channel(false);
    let (phase_tx, phase_rx) = watch::channel(Phase::Idle);

    info!(
        tables = ?config.tables,
        base_delay_ms = config.policy.base_delay.as_millis(),
        max_attempts = config.policy.max_attempts,
        "realtime subscription configured"
    );

    let driver = Driver {
        stop_rx: stop_rx.clone(),
        machine: ReconnectMachine::new(config.policy),
        coalescer: RefreshCoalescer::new(config.quiet_period, config.refresh_delay),
        feed,
        sink,
        config,
        phase_tx,
        subscribed: false,
        retry_at: None,
        cooldown_at: None,
        refresh_at: None,
        quiet_at: None,
    };
    let task = tokio::spawn(driver.run(stop_rx));

    RealtimeHandle { stop_tx, phase_rx, task: Mutex::new(Some(task)) }
}

// =============================================================================
// DRIVER
// =============================================================================

struct Driver<F> {
    /// Watched while a subscribe is in flight so shutdown never waits on it.
    stop_rx: watch::Receiver<bool>,
    machine: ReconnectMachine,
    coalescer: RefreshCoalescer,
    feed: F,
    sink: Arc<dyn RefreshSink>,
    config: RealtimeConfig,
    phase_tx: watch::Sender<Phase>,
    subscribed: bool,
    retry_at: Option<Instant>,
    cooldown_at: Option<Instant>,
    refresh_at: Option<Instant>,
    quiet_at: Option<Instant>,
}

impl<F: ChangeFeed> Driver<F> {
    async fn run(mut self, mut stop_rx: watch::Receiver<bool>) {
        self.apply(Signal::Start).await;

        loop {
            if *stop_rx.borrow() {
                break;
            }
            tokio::select! {
                biased;
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
                () = sleep_until_opt(self.retry_at) => {
                    self.retry_at = None;
                    self.apply(Signal::RetryDue).await;
                }
                () = sleep_until_opt(self.cooldown_at) => {
                    self.cooldown_at = None;
                    info!("realtime cooldown elapsed; resubscribing");
                    self.apply(Signal::CooldownElapsed).await;
                }
                () = sleep_until_opt(self.refresh_at) => {
                    self.refresh_at = None;
                    self.coalescer.fired();
                    self.sink.refresh().await;
                }
                () = sleep_until_opt(self.quiet_at) => {
                    self.quiet_at = None;
                    let now = Instant::now();
                    if let Some(delay) = self.coalescer.on_quiet(now) {
                        self.refresh_at = Some(now + delay);
                    }
                }
                event = next_event_opt(&mut self.feed, self.subscribed) => match event {
                    Ok(event) => self.on_event(event).await,
                    Err(e) => {
                        warn!(error = %e, "realtime subscription lost");
                        self.subscribed = false;
                        self.apply(Signal::Failed(e.failure())).await;
                    }
                },
            }
        }

        self.apply(Signal::Stop).await;
        info!("realtime subscription stopped");
    }

    async fn on_event(&mut self, event: ChangeEvent) {
        self.sink.on_change(&event).await;

        let now = Instant::now();
        match self.coalescer.on_event(now) {
            Decision::Schedule(delay) => self.refresh_at = Some(now + delay),
            Decision::Coalesced => {}
            Decision::Deferred(delay) => self.quiet_at = Some(now + delay),
        }
        debug!(
            table = event.table.as_str(),
            pending = self.coalescer.is_pending(),
            deferred = self.coalescer.is_deferred(),
            "realtime change observed"
        );
    }

    /// Feed a signal through the machine, performing effects until no
    /// follow-up signal remains.
    async fn apply(&mut self, signal: Signal) {
        let mut queue = VecDeque::from([signal]);
        while let Some(signal) = queue.pop_front() {
            let effects = self.machine.handle(signal);
            self.phase_tx.send_replace(self.machine.phase());
            for effect in effects {
                if let Some(next) = self.perform(effect).await {
                    queue.push_back(next);
                }
            }
        }
    }

    async fn perform(&mut self, effect: Effect) -> Option<Signal> {
        match effect {
            Effect::Connect => Some(self.connect().await),
            Effect::Release => {
                self.subscribed = false;
                self.refresh_at = None;
                self.quiet_at = None;
                self.coalescer.reset();
                self.feed.release().await;
                None
            }
            Effect::ScheduleRetry(delay) => {
                info!(
                    attempt = self.machine.attempts(),
                    max_attempts = self.machine.policy().max_attempts,
                    delay_ms = delay.as_millis(),
                    "realtime retry scheduled"
                );
                self.retry_at = Some(Instant::now() + delay);
                None
            }
            Effect::ScheduleCooldown(delay) => {
                self.cooldown_at = Some(Instant::now() + delay);
                None
            }
            Effect::CancelTimers => {
                self.retry_at = None;
                self.cooldown_at = None;
                self.refresh_at = None;
                self.quiet_at = None;
                self.coalescer.reset();
                None
            }
            Effect::Refresh => {
                self.sink.refresh().await;
                None
            }
            Effect::NotifyUnavailable => {
                error!(
                    attempts = self.machine.attempts(),
                    cooldown_ms = self.machine.policy().cooldown.as_millis(),
                    "realtime retries exhausted; entering cooldown"
                );
                self.sink.on_notice(Notice::Unavailable).await;
                None
            }
            Effect::NotifyAvailable => {
                info!("realtime updates restored");
                self.sink.on_notice(Notice::Available).await;
                None
            }
        }
    }

    async fn connect(&mut self) -> Signal {
        let attempt = self.machine.attempts();
        let subscribe = tokio::time::timeout(self.config.subscribe_timeout, self.feed.subscribe(&self.config.tables));
        let result = tokio::select! {
            biased;
            () = stop_requested(&mut self.stop_rx) => {
                info!(attempt, "realtime subscribe abandoned for shutdown");
                return Signal::Stop;
            }
            result = subscribe => result,
        };
        match result {
            Ok(Ok(())) => {
                self.subscribed = true;
                info!(attempt, "realtime subscribed");
                Signal::Subscribed
            }
            Ok(Err(e)) => {
                warn!(error = %e, attempt, "realtime subscribe failed");
                Signal::Failed(e.failure())
            }
            Err(_) => {
                warn!(attempt, timeout_ms = self.config.subscribe_timeout.as_millis(), "realtime subscribe timed out");
                Signal::Failed(Failure::TimedOut)
            }
        }
    }
}

/// Resolves once a stop was requested or the handle is gone.
async fn stop_requested(stop_rx: &mut watch::Receiver<bool>) {
    while !*stop_rx.borrow_and_update() {
        if stop_rx.changed().await.is_err() {
            return;
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn next_event_opt<F: ChangeFeed>(feed: &mut F, subscribed: bool) -> Result<ChangeEvent, FeedError> {
    if subscribed { feed.next_event().await } else { std::future::pending().await }
}

#[cfg(test)]
#[path = "subscription_test.rs"]
mod tests;
