//! Backoff against runaway NCP reset loops.
//!
//! An NCP that keeps resetting on its own would otherwise be
//! re-initialized back to back, saturating the link. Each unexpected
//! reset raises a counter that decays while the NCP stays quiet; once
//! the counter passes a small allowance the next init is delayed,
//! doubling per extra reset up to a cap.

use std::time::{Duration, Instant};

const DEFAULT_DECAY_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_FREE_RESETS: u32 = 3;
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(300);

/// Tracks unexpected resets and derives the delay before the next init.
#[derive(Debug, Clone)]
pub struct RunawayResetBackoff {
    count: u32,
    last_reset: Option<Instant>,
    /// Quiet time that forgives one counted reset.
    decay_interval: Duration,
    /// Resets tolerated without any delay.
    free_resets: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RunawayResetBackoff {
    pub fn new() -> Self {
        Self::with_params(
            DEFAULT_DECAY_INTERVAL,
            DEFAULT_FREE_RESETS,
            DEFAULT_BASE_DELAY,
            DEFAULT_MAX_DELAY,
        )
    }

    pub fn with_params(
        decay_interval: Duration,
        free_resets: u32,
        base_delay: Duration,
        max_delay: Duration,
    ) -> Self {
        Self {
            count: 0,
            last_reset: None,
            decay_interval,
            free_resets,
            base_delay,
            max_delay,
        }
    }

    /// Count an unexpected reset now and return the delay to apply.
    pub fn delay_for_unexpected_reset(&mut self) -> Duration {
        self.delay_for_unexpected_reset_at(Instant::now())
    }

    /// Count an unexpected reset at `now` (useful for testing).
    pub fn delay_for_unexpected_reset_at(&mut self, now: Instant) -> Duration {
        self.decay(now);
        self.count = self.count.saturating_add(1);
        self.last_reset = Some(now);

        if self.count <= self.free_resets {
            return Duration::ZERO;
        }
        let exponent = (self.count - self.free_resets - 1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Unexpected resets currently counted against the NCP.
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn clear(&mut self) {
        self.count = 0;
        self.last_reset = None;
    }

    // ── Internal ─────────────────────────────────────────────────

    fn decay(&mut self, now: Instant) {
        let Some(last) = self.last_reset else {
            return;
        };
        if self.decay_interval.is_zero() {
            self.count = 0;
            return;
        }
        let quiet = now.saturating_duration_since(last);
        let forgiven = quiet.as_millis() / self.decay_interval.as_millis().max(1);
        self.count = self
            .count
            .saturating_sub(u32::try_from(forgiven).unwrap_or(u32::MAX));
    }
}

impl Default for RunawayResetBackoff {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_resets_are_free() {
        let mut backoff = RunawayResetBackoff::new();
        let t0 = Instant::now();
        for i in 0..DEFAULT_FREE_RESETS {
            let d = backoff.delay_for_unexpected_reset_at(t0 + Duration::from_secs(i as u64));
            assert_eq!(d, Duration::ZERO);
        }
    }

    #[test]
    fn rapid_resets_never_decrease_delay() {
        let mut backoff = RunawayResetBackoff::new();
        let t0 = Instant::now();
        let mut previous = Duration::ZERO;
        for i in 0..20u64 {
            let d = backoff.delay_for_unexpected_reset_at(t0 + Duration::from_secs(i));
            assert!(d >= previous, "reset {i}: {d:?} < {previous:?}");
            previous = d;
        }
        assert_eq!(previous, DEFAULT_MAX_DELAY);
    }

    #[test]
    fn delay_doubles_past_allowance() {
        let mut backoff = RunawayResetBackoff::new();
        let t0 = Instant::now();
        for _ in 0..DEFAULT_FREE_RESETS {
            backoff.delay_for_unexpected_reset_at(t0);
        }
        assert_eq!(backoff.delay_for_unexpected_reset_at(t0), Duration::from_secs(1));
        assert_eq!(backoff.delay_for_unexpected_reset_at(t0), Duration::from_secs(2));
        assert_eq!(backoff.delay_for_unexpected_reset_at(t0), Duration::from_secs(4));
    }

    #[test]
    fn quiet_period_returns_to_zero() {
        let mut backoff = RunawayResetBackoff::new();
        let t0 = Instant::now();
        for _ in 0..10 {
            backoff.delay_for_unexpected_reset_at(t0);
        }
        assert!(backoff.count() > DEFAULT_FREE_RESETS);

        let later = t0 + DEFAULT_DECAY_INTERVAL * 10;
        assert_eq!(backoff.delay_for_unexpected_reset_at(later), Duration::ZERO);
        assert_eq!(backoff.count(), 1);
    }

    #[test]
    fn partial_quiet_decays_partially() {
        let mut backoff = RunawayResetBackoff::new();
        let t0 = Instant::now();
        for _ in 0..6 {
            backoff.delay_for_unexpected_reset_at(t0);
        }
        // Two intervals forgive two resets: 6 - 2 + 1 = 5.
        let d = backoff.delay_for_unexpected_reset_at(t0 + DEFAULT_DECAY_INTERVAL * 2);
        assert_eq!(backoff.count(), 5);
        assert_eq!(d, Duration::from_secs(2));
    }
}
