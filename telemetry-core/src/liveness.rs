// Liveness evaluation for the telemetry source.
// Invariants: timestamps are monotonic milliseconds; a silent transition is reported once per
// observed packet timestamp.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceState {
    Never,
    Active,
    Silent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LivenessReport {
    pub state: SourceState,
    pub silent_for_ms: Option<u64>,
    pub went_silent: bool,
}

impl LivenessReport {
    pub fn is_active(&self) -> bool {
        self.state == SourceState::Active
    }
}

#[derive(Clone, Debug)]
pub struct SilenceDetector {
    staleness_timeout_ms: u64,
    announced_for: Option<u64>,
}

impl SilenceDetector {
    pub fn new(staleness_timeout_ms: u64) -> Self {
        Self {
            staleness_timeout_ms,
            announced_for: None,
        }
    }

    pub fn staleness_timeout_ms(&self) -> u64 {
        self.staleness_timeout_ms
    }

    pub fn evaluate(&mut self, last_seen_ms: Option<u64>, now_ms: u64) -> LivenessReport {
        let Some(last_seen) = last_seen_ms else {
            return LivenessReport {
                state: SourceState::Never,
                silent_for_ms: None,
                went_silent: false,
            };
        };

        let age_ms = now_ms.saturating_sub(last_seen);
        if age_ms < self.staleness_timeout_ms {
            return LivenessReport {
                state: SourceState::Active,
                silent_for_ms: None,
                went_silent: false,
            };
        }

        // A newer packet re-arms the notice even if it was never observed as active.
        let went_silent = self.announced_for != Some(last_seen);
        self.announced_for = Some(last_seen);
        LivenessReport {
            state: SourceState::Silent,
            silent_for_ms: Some(age_ms),
            went_silent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_seen_is_inactive_without_notice() {
        let mut detector = SilenceDetector::new(3_000);
        for now in [0, 1_000, 10_000] {
            let report = detector.evaluate(None, now);
            assert_eq!(report.state, SourceState::Never);
            assert!(!report.is_active());
            assert!(!report.went_silent);
        }
    }

    #[test]
    fn active_strictly_within_timeout() {
        let mut detector = SilenceDetector::new(3_000);
        assert!(detector.evaluate(Some(1_000), 1_000).is_active());
        assert!(detector.evaluate(Some(1_000), 3_999).is_active());
        assert!(!detector.evaluate(Some(1_000), 4_000).is_active());
    }

    #[test]
    fn silence_is_announced_once_per_transition() {
        let mut detector = SilenceDetector::new(3_000);
        let notices: usize = (0..=10u64)
            .map(|tick| detector.evaluate(Some(500), 500 + tick * 1_000))
            .filter(|report| report.went_silent)
            .count();
        assert_eq!(notices, 1);
    }

    #[test]
    fn fresh_packet_rearms_the_notice() {
        let mut detector = SilenceDetector::new(3_000);
        assert!(detector.evaluate(Some(0), 3_000).went_silent);
        assert!(!detector.evaluate(Some(0), 4_000).went_silent);

        assert!(detector.evaluate(Some(5_000), 5_500).is_active());
        let report = detector.evaluate(Some(5_000), 8_000);
        assert!(report.went_silent);
        assert_eq!(report.silent_for_ms, Some(3_000));
    }

    #[test]
    fn clock_skew_does_not_underflow() {
        let mut detector = SilenceDetector::new(3_000);
        assert!(detector.evaluate(Some(9_000), 8_000).is_active());
    }
}
