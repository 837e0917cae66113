//! Subscription state machine.
//!
//! DESIGN
//! ======
//! `Idle → Connecting → Subscribed`, with failures moving to `Retrying`
//! (timed backoff) or, once the attempt budget is spent, `Cooldown`.
//! Transitions are pure: [`ReconnectMachine::handle`] returns the effects the
//! driver must perform (connect, release, arm a timer, refresh, notify) and
//! never touches I/O itself.
//!
//! Signals that do not apply to the current phase (a late failure from a
//! released handle, a timer that fired after `Stop`) are ignored.

use std::time::Duration;

use serde::Serialize;

use super::policy::ReconnectPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Connecting,
    Subscribed,
    Retrying { attempt: u32 },
    Cooldown,
}

impl Phase {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Connecting => "connecting",
            Phase::Subscribed => "subscribed",
            Phase::Retrying { .. } => "retrying",
            Phase::Cooldown => "cooldown",
        }
    }
}

/// Why the transport gave up on a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Error,
    Closed,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Start,
    Subscribed,
    Failed(Failure),
    RetryDue,
    CooldownElapsed,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Open a subscription on the transport.
    Connect,
    /// Drop the current subscription handle.
    Release,
    ScheduleRetry(Duration),
    ScheduleCooldown(Duration),
    CancelTimers,
    /// Run the refresh callback now, bypassing coalescing.
    Refresh,
    /// Tell consumers realtime updates are temporarily unavailable.
    NotifyUnavailable,
    /// Tell consumers realtime updates are back after an outage.
    NotifyAvailable,
}

#[derive(Debug, Clone)]
pub struct ReconnectMachine {
    policy: ReconnectPolicy,
    phase: Phase,
    attempts: u32,
    /// Set once `NotifyUnavailable` was emitted, cleared on recovery.
    degraded: bool,
}

impl ReconnectMachine {
    #[must_use]
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, phase: Phase::Idle, attempts: 0, degraded: false }
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Apply a signal and return the effects to perform, in order.
    pub fn handle(&mut self, signal: Signal) -> Vec<Effect> {
        match (self.phase, signal) {
            (Phase::Idle, Signal::Start) => {
                self.phase = Phase::Connecting;
                vec![Effect::Connect]
            }
            (Phase::Connecting, Signal::Subscribed) => {
                self.attempts = 0;
                self.phase = Phase::Subscribed;
                if self.degraded {
                    self.degraded = false;
                    vec![Effect::NotifyAvailable, Effect::Refresh]
                } else {
                    vec![Effect::Refresh]
                }
            }
            (Phase::Connecting | Phase::Subscribed, Signal::Failed(_)) => self.fail(),
            (Phase::Retrying { .. }, Signal::RetryDue) => {
                self.phase = Phase::Connecting;
                vec![Effect::Connect]
            }
            (Phase::Cooldown, Signal::CooldownElapsed) => {
                self.attempts = 0;
                self.phase = Phase::Connecting;
                vec![Effect::Connect]
            }
            (Phase::Idle, Signal::Stop) => Vec::new(),
            (_, Signal::Stop) => {
                self.phase = Phase::Idle;
                vec![Effect::CancelTimers, Effect::Release]
            }
            _ => Vec::new(),
        }
    }

    fn fail(&mut self) -> Vec<Effect> {
        if self.attempts >= self.policy.max_attempts {
            self.phase = Phase::Cooldown;
            self.degraded = true;
            return vec![Effect::Release, Effect::NotifyUnavailable, Effect::ScheduleCooldown(self.policy.cooldown)];
        }

        self.attempts += 1;
        self.phase = Phase::Retrying { attempt: self.attempts };
        vec![Effect::Release, Effect::ScheduleRetry(self.policy.retry_delay(self.attempts))]
    }
}

#[cfg(test)]
#[path = "machine_test.rs"]
mod tests;
