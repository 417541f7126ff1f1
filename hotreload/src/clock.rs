//! Time source for the resync ticker.
//!
//! The reconciler never reads wall-clock time directly; it asks a [`Clock`]
//! for a [`Ticker`]. Production uses [`SystemClock`], tests drive a
//! [`FakeClock`] by hand.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// A periodic wake-up source. `tick` must be cancel safe.
#[async_trait]
pub trait Ticker: Send {
    async fn tick(&mut self);
}

pub trait Clock: Send + Sync {
    /// Create a ticker whose first tick fires one `period` from now.
    ///
    /// Panics if `period` is zero.
    fn ticker(&self, period: Duration) -> Box<dyn Ticker>;
}

// =============================================================================
// System clock
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

struct IntervalTicker(Interval);

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) {
        self.0.tick().await;
    }
}

impl Clock for SystemClock {
    fn ticker(&self, period: Duration) -> Box<dyn Ticker> {
        let mut interval = interval_at(Instant::now() + period, period);
        // A slow pass shifts the schedule instead of bursting catch-up ticks.
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Box::new(IntervalTicker(interval))
    }
}

// =============================================================================
// Fake clock
// =============================================================================

/// Manually stepped clock.
///
/// Each ticker buffers at most one pending tick, so stepping past several
/// periods without draining the ticker yields a single tick.
#[derive(Clone, Default)]
pub struct FakeClock {
    inner: Arc<Mutex<FakeInner>>,
}

#[derive(Default)]
struct FakeInner {
    now: Duration,
    waiters: Vec<Waiter>,
}

struct Waiter {
    period: Duration,
    next: Duration,
    tx: mpsc::Sender<()>,
}

struct FakeTicker {
    rx: mpsc::Receiver<()>,
}

#[async_trait]
impl Ticker for FakeTicker {
    async fn tick(&mut self) {
        if self.rx.recv().await.is_none() {
            // Clock dropped: never tick again.
            std::future::pending::<()>().await;
        }
    }
}

impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time elapsed on this clock since it was created.
    pub fn elapsed(&self) -> Duration {
        self.lock().now
    }

    /// Advance the clock and fire every ticker that came due.
    pub fn step(&self, by: Duration) {
        let mut inner = self.lock();
        inner.now += by;
        let now = inner.now;
        inner.waiters.retain_mut(|w| {
            if w.tx.is_closed() {
                return false;
            }
            if w.next <= now {
                let _ = w.tx.try_send(());
                while w.next <= now {
                    w.next += w.period;
                }
            }
            true
        });
    }

    /// Whether any live ticker is registered.
    pub fn has_tickers(&self) -> bool {
        let mut inner = self.lock();
        inner.waiters.retain(|w| !w.tx.is_closed());
        !inner.waiters.is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for FakeClock {
    fn ticker(&self, period: Duration) -> Box<dyn Ticker> {
        assert!(!period.is_zero(), "ticker period must be non-zero");
        let (tx, rx) = mpsc::channel(1);
        let mut inner = self.lock();
        let next = inner.now + period;
        inner.waiters.push(Waiter { period, next, tx });
        Box::new(FakeTicker { rx })
    }
}
