use super::*;

const QUIET: Duration = Duration::from_millis(1000);
const DELAY: Duration = Duration::from_millis(300);

fn coalescer() -> RefreshCoalescer {
    RefreshCoalescer::new(QUIET, DELAY)
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[test]
fn first_event_schedules_refresh() {
    let mut c = coalescer();
    assert_eq!(c.on_event(Instant::now()), Decision::Schedule(DELAY));
    assert!(c.is_pending());
}

#[test]
fn burst_collapses_into_pending_refresh() {
    let mut c = coalescer();
    let t0 = Instant::now();
    assert_eq!(c.on_event(t0), Decision::Schedule(DELAY));
    for i in 1..20 {
        assert_eq!(c.on_event(t0 + ms(i * 10)), Decision::Coalesced);
    }
    assert!(!c.is_deferred());
}

#[test]
fn event_soon_after_fire_is_deferred_then_flushed() {
    let mut c = coalescer();
    let t0 = Instant::now();
    c.on_event(t0);
    c.fired();

    assert_eq!(c.on_event(t0 + ms(400)), Decision::Deferred(QUIET));
    assert!(c.is_deferred());

    // Timer fires before the burst has settled: nothing yet.
    assert_eq!(c.on_quiet(t0 + ms(900)), None);
    // Settled: flush exactly once.
    assert_eq!(c.on_quiet(t0 + ms(1400)), Some(DELAY));
    assert!(c.is_pending());
    assert_eq!(c.on_quiet(t0 + ms(2000)), None);
}

#[test]
fn event_after_quiet_period_schedules_again() {
    let mut c = coalescer();
    let t0 = Instant::now();
    c.on_event(t0);
    c.fired();
    assert_eq!(c.on_event(t0 + ms(1001)), Decision::Schedule(DELAY));
}

#[test]
fn scheduling_clears_deferred_flag() {
    let mut c = coalescer();
    let t0 = Instant::now();
    c.on_event(t0);
    c.fired();
    c.on_event(t0 + ms(100));
    assert!(c.is_deferred());

    assert_eq!(c.on_event(t0 + ms(1200)), Decision::Schedule(DELAY));
    assert!(!c.is_deferred());
}

#[test]
fn quiet_without_deferred_events_is_noop() {
    let mut c = coalescer();
    assert_eq!(c.on_quiet(Instant::now()), None);
}

#[test]
fn reset_forgets_pending_work() {
    let mut c = coalescer();
    let t0 = Instant::now();
    c.on_event(t0);
    c.reset();
    assert!(!c.is_pending());
    assert!(!c.is_deferred());
}
