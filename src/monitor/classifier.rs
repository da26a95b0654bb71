use chrono::{DateTime, Utc};

use crate::{
    config::MonitorConfig,
    detect::FaceLandmarks,
    models::{EventKind, Violation},
};

/// Classifies one detection result into attention violations, applying
/// per-condition hysteresis so a flapping detector does not flood the
/// timeline. Timestamps are threaded in explicitly, which keeps the
/// debounce logic testable without a real clock.
pub struct AttentionClassifier {
    /// Last time a face was seen, or the last `no_face` fire.
    last_face_at: DateTime<Utc>,
    /// Last time the candidate was focused, or the last `not_focused` fire.
    last_focused_at: DateTime<Utc>,
}

impl AttentionClassifier {
    pub fn new(session_start: DateTime<Utc>) -> Self {
        Self {
            last_face_at: session_start,
            last_focused_at: session_start,
        }
    }

    pub fn classify(
        &mut self,
        faces: &[FaceLandmarks],
        now: DateTime<Utc>,
        config: &MonitorConfig,
    ) -> Vec<Violation> {
        let mut violations = Vec::new();

        match faces.len() {
            0 => {
                let absent_ms = (now - self.last_face_at).num_milliseconds();
                if absent_ms >= config.no_face_debounce_ms {
                    violations.push(no_face_violation(config));
                    self.last_face_at = now;
                }
            }
            1 => {
                self.last_face_at = now;
                // Focus evaluation needs eye-eye-nose landmarks; with
                // fewer points the cycle is inconclusive and the timer
                // is left untouched.
                if let Some(focused) = evaluate_focus(&faces[0], config) {
                    if focused {
                        // A momentary focused glance resets the clock:
                        // off-focus time must be continuous, not
                        // cumulative.
                        self.last_focused_at = now;
                    } else {
                        let unfocused_ms = (now - self.last_focused_at).num_milliseconds();
                        if unfocused_ms >= config.not_focused_debounce_ms {
                            violations.push(not_focused_violation(config));
                            self.last_focused_at = now;
                        }
                    }
                }
            }
            _ => {
                // Co-presence is unambiguous; fire every cycle it holds.
                self.last_face_at = now;
                violations.push(Violation {
                    kind: EventKind::MultipleFaces,
                    message: "Multiple faces detected".into(),
                    alert_message: "Multiple people detected".into(),
                });
            }
        }

        violations
    }
}

/// Heuristic proxy for "looking at camera" from the first three
/// landmarks (left eye, right eye, nose). Returns `None` when the face
/// carries too few landmarks to evaluate.
fn evaluate_focus(face: &FaceLandmarks, config: &MonitorConfig) -> Option<bool> {
    if face.landmarks.len() < 3 {
        return None;
    }

    let left_eye = face.landmarks[0];
    let right_eye = face.landmarks[1];
    let nose = face.landmarks[2];

    let eye_slope = (left_eye[1] - right_eye[1]).abs();
    let face_width = (right_eye[0] - left_eye[0]).abs();
    let nose_offset = (nose[0] - (left_eye[0] + right_eye[0]) / 2.0).abs();

    Some(eye_slope < config.eye_slope_max && nose_offset < config.nose_offset_ratio * face_width)
}

fn no_face_violation(config: &MonitorConfig) -> Violation {
    Violation {
        kind: EventKind::NoFace,
        message: format!(
            "No face detected > {}s",
            config.no_face_debounce_ms / 1000
        ),
        alert_message: "Candidate left the screen".into(),
    }
}

fn not_focused_violation(config: &MonitorConfig) -> Violation {
    Violation {
        kind: EventKind::NotFocused,
        message: format!(
            "Candidate not looking > {}s",
            config.not_focused_debounce_ms / 1000
        ),
        alert_message: "Candidate not focused".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn t(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn focused_face() -> FaceLandmarks {
        // Level eyes, nose centered between them.
        FaceLandmarks {
            landmarks: vec![[100.0, 100.0], [140.0, 100.0], [120.0, 110.0]],
        }
    }

    fn unfocused_face() -> FaceLandmarks {
        // Nose offset 18 against a 40-wide face; 0.3 * 40 = 12.
        FaceLandmarks {
            landmarks: vec![[100.0, 100.0], [140.0, 100.0], [138.0, 110.0]],
        }
    }

    fn tilted_face() -> FaceLandmarks {
        // Eye slope 15 exceeds the default threshold of 10.
        FaceLandmarks {
            landmarks: vec![[100.0, 100.0], [140.0, 115.0], [120.0, 110.0]],
        }
    }

    fn kinds(violations: &[Violation]) -> Vec<EventKind> {
        violations.iter().map(|v| v.kind).collect()
    }

    #[test]
    fn no_face_fires_once_per_debounce_window() {
        let config = MonitorConfig::default();
        let mut classifier = AttentionClassifier::new(t(0));

        assert_eq!(classifier.classify(&[], t(0), &config), vec![]);
        assert_eq!(classifier.classify(&[], t(9_999), &config), vec![]);

        let fired = classifier.classify(&[], t(10_000), &config);
        assert_eq!(kinds(&fired), vec![EventKind::NoFace]);

        // Absence persists: nothing before the window elapses again.
        assert_eq!(classifier.classify(&[], t(15_000), &config), vec![]);
        let fired = classifier.classify(&[], t(20_000), &config);
        assert_eq!(kinds(&fired), vec![EventKind::NoFace]);
    }

    #[test]
    fn face_presence_resets_absence_timer() {
        let config = MonitorConfig::default();
        let mut classifier = AttentionClassifier::new(t(0));

        classifier.classify(&[focused_face()], t(9_000), &config);
        assert_eq!(classifier.classify(&[], t(15_000), &config), vec![]);

        let fired = classifier.classify(&[], t(19_000), &config);
        assert_eq!(kinds(&fired), vec![EventKind::NoFace]);
    }

    #[test]
    fn momentary_focus_resets_the_clock() {
        let config = MonitorConfig::default();
        let mut classifier = AttentionClassifier::new(t(0));

        // Unfocused 4900ms, focused one tick, unfocused 4900ms: neither
        // interval reaches the 5000ms window, so nothing fires.
        assert_eq!(
            classifier.classify(&[unfocused_face()], t(4_900), &config),
            vec![]
        );
        assert_eq!(
            classifier.classify(&[focused_face()], t(5_000), &config),
            vec![]
        );
        assert_eq!(
            classifier.classify(&[unfocused_face()], t(9_900), &config),
            vec![]
        );
    }

    #[test]
    fn sustained_unfocus_fires_and_rearms() {
        let config = MonitorConfig::default();
        let mut classifier = AttentionClassifier::new(t(0));

        let fired = classifier.classify(&[unfocused_face()], t(5_000), &config);
        assert_eq!(kinds(&fired), vec![EventKind::NotFocused]);

        assert_eq!(
            classifier.classify(&[unfocused_face()], t(6_000), &config),
            vec![]
        );
        let fired = classifier.classify(&[unfocused_face()], t(10_000), &config);
        assert_eq!(kinds(&fired), vec![EventKind::NotFocused]);
    }

    #[test]
    fn tilted_head_counts_as_unfocused() {
        let config = MonitorConfig::default();
        let mut classifier = AttentionClassifier::new(t(0));

        let fired = classifier.classify(&[tilted_face()], t(5_000), &config);
        assert_eq!(kinds(&fired), vec![EventKind::NotFocused]);
    }

    #[test]
    fn multiple_faces_fire_every_cycle() {
        let config = MonitorConfig::default();
        let mut classifier = AttentionClassifier::new(t(0));
        let faces = vec![focused_face(), focused_face()];

        for cycle in 0..3 {
            let fired = classifier.classify(&faces, t(cycle * 1_000), &config);
            assert_eq!(kinds(&fired), vec![EventKind::MultipleFaces]);
        }
    }

    #[test]
    fn insufficient_landmarks_are_inconclusive() {
        let config = MonitorConfig::default();
        let mut classifier = AttentionClassifier::new(t(0));
        let sparse = FaceLandmarks {
            landmarks: vec![[100.0, 100.0], [140.0, 100.0]],
        };

        // No violation even though far past every debounce window.
        assert_eq!(
            classifier.classify(&[sparse], t(60_000), &config),
            vec![]
        );
    }
}
