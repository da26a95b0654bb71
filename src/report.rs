use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{EventKind, SessionSnapshot};

/// Final proctoring report: a pure projection of a sealed session.
/// Deriving it never mutates the session, so regenerating it always
/// yields the same value.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub candidate_name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Whole minutes, `"N/A"` when the end boundary is missing.
    pub duration: String,
    pub focus_lost: usize,
    pub multiple_faces: usize,
    pub suspicious_items: usize,
    pub integrity_score: u32,
}

impl Report {
    pub fn from_snapshot(snapshot: &SessionSnapshot) -> Self {
        let session = &snapshot.session;

        let duration = match session.ended_at {
            Some(ended_at) => {
                let minutes = (ended_at - session.started_at).num_seconds() / 60;
                format!("{minutes} mins")
            }
            None => "N/A".to_string(),
        };

        let count = |kind: EventKind| {
            snapshot
                .events
                .iter()
                .filter(|event| event.kind == kind)
                .count()
        };

        Self {
            candidate_name: session.candidate_name.clone(),
            started_at: session.started_at,
            ended_at: session.ended_at,
            duration,
            focus_lost: count(EventKind::NotFocused),
            multiple_faces: count(EventKind::MultipleFaces),
            suspicious_items: count(EventKind::SuspiciousItem),
            integrity_score: session.final_score.unwrap_or(session.integrity_score),
        }
    }
}
