//! Single-shot reconnect scheduling.

use std::time::{Duration, Instant};

/// Deadline for the next reconnect attempt.
///
/// At most one deadline is pending at a time. Arming again replaces it, so repeated
/// failures reschedule with the same delay instead of stacking attempts.
#[derive(Debug, Default, Clone)]
pub struct ReconnectTimer {
    deadline: Option<Instant>,
    attempts: u32,
}

impl ReconnectTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, now: Instant, delay: Duration) {
        self.deadline = Some(now + delay);
        self.attempts = self.attempts.saturating_add(1);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Cancels and forgets previous attempts, after a successful connect.
    pub fn reset(&mut self) {
        self.deadline = None;
        self.attempts = 0;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Number of times the timer was armed since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_due_only_after_delay() {
        let start = Instant::now();
        let mut timer = ReconnectTimer::new();
        assert!(!timer.is_due(start));

        timer.arm(start, Duration::from_secs(3));
        assert!(!timer.is_due(start + Duration::from_secs(2)));
        assert!(timer.is_due(start + Duration::from_secs(3)));
    }

    #[test]
    fn test_rearm_replaces_deadline() {
        let start = Instant::now();
        let mut timer = ReconnectTimer::new();
        timer.arm(start, Duration::from_secs(3));
        timer.arm(start + Duration::from_secs(5), Duration::from_secs(3));

        assert!(!timer.is_due(start + Duration::from_secs(4)));
        assert_eq!(timer.attempts(), 2);
    }

    #[test]
    fn test_cancel_and_reset() {
        let start = Instant::now();
        let mut timer = ReconnectTimer::new();
        timer.arm(start, Duration::ZERO);
        timer.cancel();
        assert!(!timer.is_armed());
        assert_eq!(timer.attempts(), 1);

        timer.reset();
        assert_eq!(timer.attempts(), 0);
    }
}
