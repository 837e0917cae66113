//! Burst coalescing for refresh callbacks.
//!
//! A refresh is scheduled only when none is pending and the previous event
//! is older than `quiet_period`; it runs `refresh_delay` later, so a burst of
//! writes lands in a single refresh. Events that arrive inside the quiet
//! period while nothing is pending are remembered as deferred and flushed by
//! [`RefreshCoalescer::on_quiet`] once the burst settles, so the tail of a
//! burst is never lost.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Arm the refresh timer for this delay.
    Schedule(Duration),
    /// A refresh is already pending and will cover this event.
    Coalesced,
    /// Too soon after the previous event; check again after this delay.
    Deferred(Duration),
}

#[derive(Debug, Clone)]
pub struct RefreshCoalescer {
    quiet_period: Duration,
    refresh_delay: Duration,
    last_event: Option<Instant>,
    pending: bool,
    deferred: bool,
}

impl RefreshCoalescer {
    #[must_use]
    pub fn new(quiet_period: Duration, refresh_delay: Duration) -> Self {
        Self { quiet_period, refresh_delay, last_event: None, pending: false, deferred: false }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    #[must_use]
    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    /// Record a change event observed at `now`.
    pub fn on_event(&mut self, now: Instant) -> Decision {
        let previous = self.last_event.replace(now);

        if self.pending {
            return Decision::Coalesced;
        }

        let quiet = previous.is_none_or(|last| now.saturating_duration_since(last) > self.quiet_period);
        if quiet {
            self.pending = true;
            self.deferred = false;
            Decision::Schedule(self.refresh_delay)
        } else {
            self.deferred = true;
            Decision::Deferred(self.quiet_period)
        }
    }

    /// Quiet-period timer expired. Returns the refresh delay if deferred
    /// events should now be flushed.
    pub fn on_quiet(&mut self, now: Instant) -> Option<Duration> {
        if !self.deferred || self.pending {
            return None;
        }
        let settled = self
            .last_event
            .is_none_or(|last| now.saturating_duration_since(last) >= self.quiet_period);
        if !settled {
            return None;
        }
        self.deferred = false;
        self.pending = true;
        Some(self.refresh_delay)
    }

    /// The scheduled refresh ran.
    pub fn fired(&mut self) {
        self.pending = false;
    }

    /// Forget pending and deferred work (subscription released).
    pub fn reset(&mut self) {
        self.pending = false;
        self.deferred = false;
    }
}

#[cfg(test)]
#[path = "coalesce_test.rs"]
mod tests;
