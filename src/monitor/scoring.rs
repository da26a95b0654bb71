use crate::{config::MonitorConfig, models::Severity};

pub const INITIAL_SCORE: u32 = 100;

/// Session trust metric: starts at 100, deducted per alert severity,
/// floored at 0. Monotonically non-increasing while a session is
/// active; the controller freezes it at session end.
#[derive(Debug, Clone)]
pub struct IntegrityScorer {
    score: u32,
}

impl IntegrityScorer {
    pub fn new() -> Self {
        Self {
            score: INITIAL_SCORE,
        }
    }

    /// Applies the penalty for one alert and returns the new score.
    pub fn penalize(&mut self, severity: Severity, config: &MonitorConfig) -> u32 {
        let penalty = match severity {
            Severity::Error => config.error_penalty,
            Severity::Warning => config.warning_penalty,
        };
        self.score = self.score.saturating_sub(penalty);
        self.score
    }

    pub fn snapshot(&self) -> u32 {
        self.score
    }
}

impl Default for IntegrityScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn penalties_follow_the_severity_table() {
        let config = MonitorConfig::default();
        let mut scorer = IntegrityScorer::new();

        assert_eq!(scorer.penalize(Severity::Error, &config), 90);
        assert_eq!(scorer.penalize(Severity::Warning, &config), 85);
        assert_eq!(scorer.snapshot(), 85);
    }

    #[test]
    fn score_saturates_at_zero() {
        let config = MonitorConfig::default();
        let mut scorer = IntegrityScorer::new();

        // 12 errors would be -120; the floor holds at 0.
        for _ in 0..12 {
            scorer.penalize(Severity::Error, &config);
        }
        assert_eq!(scorer.snapshot(), 0);
        assert_eq!(scorer.penalize(Severity::Warning, &config), 0);
    }

    #[test]
    fn score_never_increases() {
        let config = MonitorConfig::default();
        let mut scorer = IntegrityScorer::new();
        let mut previous = scorer.snapshot();

        for severity in [
            Severity::Warning,
            Severity::Error,
            Severity::Warning,
            Severity::Error,
        ] {
            let next = scorer.penalize(severity, &config);
            assert!(next <= previous);
            assert!(next <= 100);
            previous = next;
        }
    }

    #[test]
    fn snapshot_is_side_effect_free() {
        let scorer = IntegrityScorer::new();
        assert_eq!(scorer.snapshot(), scorer.snapshot());
        assert_eq!(scorer.snapshot(), INITIAL_SCORE);
    }
}
