use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Alert severity; also selects the score penalty applied per violation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    NoFace,
    MultipleFaces,
    NotFocused,
    SuspiciousItem,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::NoFace => "no_face",
            EventKind::MultipleFaces => "multiple_faces",
            EventKind::NotFocused => "not_focused",
            EventKind::SuspiciousItem => "suspicious_item",
        }
    }

    /// Losing focus is a warning; everything else is unambiguous enough
    /// to be treated as an error.
    pub fn severity(&self) -> Severity {
        match self {
            EventKind::NotFocused => Severity::Warning,
            EventKind::NoFace | EventKind::MultipleFaces | EventKind::SuspiciousItem => {
                Severity::Error
            }
        }
    }
}

/// Immutable record of a detected condition. Append-only; insertion
/// order is temporal order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    pub message: String,
    pub severity: Severity,
}

/// User-facing notification paired with an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub severity: Severity,
}

/// A classified violation produced by one detection cycle, before it is
/// stamped into the timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub kind: EventKind,
    pub message: String,
    pub alert_message: String,
}

impl Violation {
    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    /// Stamp the violation into its event/alert pair.
    pub fn into_records(self, timestamp: DateTime<Utc>) -> (Event, Alert) {
        let severity = self.kind.severity();
        let event = Event {
            timestamp,
            kind: self.kind,
            message: self.message,
            severity,
        };
        let alert = Alert {
            timestamp,
            message: self.alert_message,
            severity,
        };
        (event, alert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn severity_mapping_per_kind() {
        assert_eq!(EventKind::NotFocused.severity(), Severity::Warning);
        assert_eq!(EventKind::NoFace.severity(), Severity::Error);
        assert_eq!(EventKind::MultipleFaces.severity(), Severity::Error);
        assert_eq!(EventKind::SuspiciousItem.severity(), Severity::Error);
    }

    #[test]
    fn violation_stamps_matching_event_and_alert() {
        let now = Utc.timestamp_millis_opt(1_000).unwrap();
        let violation = Violation {
            kind: EventKind::SuspiciousItem,
            message: "cell phone detected".into(),
            alert_message: "Suspicious item: cell phone".into(),
        };

        let (event, alert) = violation.into_records(now);
        assert_eq!(event.kind, EventKind::SuspiciousItem);
        assert_eq!(event.severity, Severity::Error);
        assert_eq!(alert.severity, Severity::Error);
        assert_eq!(event.timestamp, alert.timestamp);
    }
}
