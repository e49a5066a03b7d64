//! Single pending timer per concern.
//!
//! Each concern (bounds reporting, notes autosave, the per-second tick)
//! owns one `Debounce`. Scheduling again cancels whatever was pending and
//! starts a fresh delay, so at most one action per concern is ever queued.
//! The owner polls it from its frame loop; nothing runs on its own.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Debounce<T> {
    delay: Duration,
    pending: Option<(Instant, T)>,
}

impl<T> Debounce<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Cancel any pending value and schedule `value` at `now + delay`.
    ///
    /// Returns `true` if something was already pending (and got replaced).
    pub fn schedule(&mut self, value: T, now: Instant) -> bool {
        self.pending.replace((now + self.delay, value)).is_some()
    }

    /// Take the pending value once its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((due, _)) if now >= *due => self.pending.take().map(|(_, value)| value),
            _ => None,
        }
    }

    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(_, value)| value)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// When the pending value fires, if any.
    pub fn due_at(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(due, _)| *due)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(350);

    #[test]
    fn fires_once_after_delay() {
        let t0 = Instant::now();
        let mut d = Debounce::new(DELAY);
        d.schedule("a", t0);

        assert_eq!(d.poll(t0 + Duration::from_millis(349)), None);
        assert_eq!(d.poll(t0 + DELAY), Some("a"));
        assert_eq!(d.poll(t0 + DELAY * 2), None);
        assert!(!d.is_pending());
    }

    #[test]
    fn reschedule_cancels_previous() {
        let t0 = Instant::now();
        let mut d = Debounce::new(DELAY);
        assert!(!d.schedule(1, t0));
        assert!(d.schedule(2, t0 + Duration::from_millis(200)));

        // The first deadline passes without firing.
        assert_eq!(d.poll(t0 + DELAY), None);
        assert_eq!(d.poll(t0 + Duration::from_millis(550)), Some(2));
        assert_eq!(d.poll(t0 + Duration::from_secs(5)), None);
    }

    #[test]
    fn cancel_clears_pending() {
        let t0 = Instant::now();
        let mut d = Debounce::new(DELAY);
        d.schedule((), t0);
        assert_eq!(d.due_at(), Some(t0 + DELAY));
        assert_eq!(d.cancel(), Some(()));
        assert_eq!(d.poll(t0 + DELAY), None);
    }
}
