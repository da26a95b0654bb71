use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Alert, Event};

/// Session lifecycle. No backward transitions; `Ended` and `Reported`
/// are terminal with respect to mutation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Created,
    Active,
    Ended,
    Reported,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Created => "Created",
            SessionStatus::Active => "Active",
            SessionStatus::Ended => "Ended",
            SessionStatus::Reported => "Reported",
        }
    }
}

impl Default for SessionStatus {
    fn default() -> Self {
        SessionStatus::Created
    }
}

/// One persisted session row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub candidate_name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Running score, updated throughout the active phase.
    pub integrity_score: u32,
    /// Recorded once at session end; preferred over the running score
    /// when both exist.
    pub final_score: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full persisted view of a session: the row plus its ordered timelines.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session: SessionRecord,
    pub events: Vec<Event>,
    pub alerts: Vec<Alert>,
}
