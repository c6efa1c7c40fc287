//! Trailing-edge debounce driven by caller-supplied instants.
//!
//! Nothing runs in the background: the owner calls [`Debouncer::poll`] from
//! its event loop and gets the latest scheduled value back once the quiet
//! period has elapsed.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Replaces any pending value and restarts the quiet period at `now`.
    pub fn schedule(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now));
    }

    /// Returns the pending value if its quiet period has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let (_, scheduled_at) = self.pending.as_ref()?;
        if now.saturating_duration_since(*scheduled_at) < self.delay {
            return None;
        }
        self.pending.take().map(|(value, _)| value)
    }

    /// Returns the pending value regardless of the quiet period.
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|(value, _)| value)
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Time left before `poll` would fire, `None` if nothing is pending.
    pub fn time_until_ready(&self, now: Instant) -> Option<Duration> {
        let (_, scheduled_at) = self.pending.as_ref()?;
        let elapsed = now.saturating_duration_since(*scheduled_at);
        Some(self.delay.saturating_sub(elapsed))
    }
}
