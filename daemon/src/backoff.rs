use tokio::time::Duration;

/// Delay before the first reconnect attempt.
pub const INITIAL_DELAY: Duration = Duration::from_secs(1);
/// Ceiling on the doubling schedule.
pub const MAX_DELAY: Duration = Duration::from_secs(32);
/// Attempts allowed before giving up, unless running with `--daemon`.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Exponential reconnect schedule: 1 s, 2 s, 4 s, … capped at [`MAX_DELAY`].
///
/// A bounded schedule yields a fixed number of delays and then reports
/// exhaustion; an unbounded one (service mode) keeps yielding the capped
/// delay forever. The attempt counter resets after a successful identify,
/// so a healthy connection always restarts the schedule from 1 s.
#[derive(Debug)]
pub struct Backoff {
    attempt: u32,
    max_attempts: Option<u32>,
}

impl Backoff {
    pub fn bounded(max_attempts: u32) -> Self {
        Self { attempt: 0, max_attempts: Some(max_attempts) }
    }

    pub fn unbounded() -> Self {
        Self { attempt: 0, max_attempts: None }
    }

    /// The delay to sleep before the next attempt, or `None` when the
    /// schedule is exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if self.attempt >= max {
                return None;
            }
        }
        // 2^5 already reaches the 32 s ceiling; clamp the exponent so the
        // shift cannot overflow on long-running unbounded schedules.
        let exponent = self.attempt.min(5);
        self.attempt += 1;
        Some((INITIAL_DELAY * 2u32.pow(exponent)).min(MAX_DELAY))
    }

    /// Restarts the schedule. Called after each successful identify.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(backoff: &mut Backoff, n: usize) -> Vec<u64> {
        (0..n)
            .map_while(|_| backoff.next_delay())
            .map(|d| d.as_secs())
            .collect()
    }

    #[test]
    fn doubles_up_to_the_cap() {
        let mut b = Backoff::bounded(10);
        assert_eq!(secs(&mut b, 10), vec![1, 2, 4, 8, 16, 32, 32, 32, 32, 32]);
    }

    #[test]
    fn bounded_schedule_exhausts_after_max_attempts() {
        let mut b = Backoff::bounded(3);
        assert_eq!(secs(&mut b, 10), vec![1, 2, 4]);
        assert_eq!(b.next_delay(), None);
        // Exhaustion is sticky until reset.
        assert_eq!(b.next_delay(), None);
    }

    #[test]
    fn zero_attempts_is_immediately_exhausted() {
        let mut b = Backoff::bounded(0);
        assert_eq!(b.next_delay(), None);
    }

    #[test]
    fn reset_restarts_the_schedule() {
        let mut b = Backoff::bounded(3);
        assert_eq!(secs(&mut b, 10), vec![1, 2, 4]);
        b.reset();
        assert_eq!(secs(&mut b, 10), vec![1, 2, 4]);
    }

    #[test]
    fn unbounded_schedule_never_exhausts() {
        let mut b = Backoff::unbounded();
        let delays = secs(&mut b, 100);
        assert_eq!(delays.len(), 100);
        assert_eq!(*delays.last().unwrap(), 32);
    }
}
