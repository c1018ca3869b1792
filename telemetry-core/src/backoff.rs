// Exponential retry delay tracking for the publish path.
// Invariants: `base <= current <= ceiling`; success always restores `base`.

use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffState {
    base: Duration,
    ceiling: Duration,
    current: Duration,
}

impl BackoffState {
    /// `ceiling` below `base` is raised to `base`.
    pub fn new(base: Duration, ceiling: Duration) -> Self {
        let ceiling = ceiling.max(base);
        Self {
            base,
            ceiling,
            current: base,
        }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }

    pub fn reset(&mut self) {
        self.current = self.base;
    }

    /// Doubles the delay up to the ceiling and returns the delay that was in effect
    /// when the failure happened.
    pub fn record_failure(&mut self) -> Duration {
        let in_effect = self.current;
        self.current = self
            .current
            .checked_mul(2)
            .map_or(self.ceiling, |next| next.min(self.ceiling));
        in_effect
    }
}
