use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    config::MonitorConfig,
    detect::DetectionSummary,
    models::{Alert, Event, SessionStatus, Violation},
};

use super::scoring::IntegrityScorer;

/// Canonical in-memory state of the monitored session. Owned by the
/// `SessionController` behind a single mutex; the sampling loop and the
/// lifecycle operations are the only writers, serialized by that lock.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub status: SessionStatus,
    pub session_id: Option<String>,
    pub candidate_name: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub scorer: IntegrityScorer,
    /// Append-only timelines; insertion order is detection order.
    pub events: Vec<Event>,
    pub alerts: Vec<Alert>,
    /// Recorded once when the session is sealed.
    pub final_score: Option<u32>,
    /// Most recent detection summary, for live UI polling.
    pub last_detections: DetectionSummary,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            status: SessionStatus::Created,
            session_id: None,
            candidate_name: None,
            started_at: None,
            ended_at: None,
            scorer: IntegrityScorer::new(),
            events: Vec::new(),
            alerts: Vec::new(),
            final_score: None,
            last_detections: DetectionSummary::default(),
        }
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_session(
        &mut self,
        session_id: String,
        candidate_name: String,
        started_at: DateTime<Utc>,
    ) {
        *self = Self {
            status: SessionStatus::Active,
            session_id: Some(session_id),
            candidate_name: Some(candidate_name),
            started_at: Some(started_at),
            ..Self::default()
        };
    }

    /// Appends the event/alert pair for one violation and applies its
    /// penalty. Returns copies of the appended records plus the updated
    /// score, for mirroring to the store; taking the persisted score
    /// from the just-updated state keeps the update single-writer.
    pub fn record_violation(
        &mut self,
        violation: Violation,
        now: DateTime<Utc>,
        config: &MonitorConfig,
    ) -> (Event, Alert, u32) {
        let severity = violation.severity();
        let (event, alert) = violation.into_records(now);
        self.events.push(event.clone());
        self.alerts.push(alert.clone());
        let score = self.scorer.penalize(severity, config);
        (event, alert, score)
    }

    /// Seals the session: records the end time and freezes the score.
    /// No mutation is applied past this point.
    pub fn seal(&mut self, ended_at: DateTime<Utc>) {
        self.status = SessionStatus::Ended;
        self.ended_at = Some(ended_at);
        self.final_score = Some(self.scorer.snapshot());
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            status: self.status,
            session_id: self.session_id.clone(),
            candidate_name: self.candidate_name.clone(),
            started_at: self.started_at,
            ended_at: self.ended_at,
            integrity_score: self.final_score.unwrap_or_else(|| self.scorer.snapshot()),
            event_count: self.events.len(),
            alert_count: self.alerts.len(),
            last_detections: self.last_detections.clone(),
        }
    }
}

/// Read-only view of the session for UI polling.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSnapshot {
    pub status: SessionStatus,
    pub session_id: Option<String>,
    pub candidate_name: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub integrity_score: u32,
    pub event_count: usize,
    pub alert_count: usize,
    pub last_detections: DetectionSummary,
}
