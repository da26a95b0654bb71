use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use log::{error, info};
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    config::MonitorConfig,
    db::Database,
    detect::{Detector, FrameSource},
    models::{SessionRecord, SessionStatus},
    monitor::scoring::INITIAL_SCORE,
    report::Report,
};

use super::{loop_worker::monitor_loop, state::SessionState, MonitorSnapshot};

struct MonitorWorker {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl MonitorWorker {
    fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    async fn stop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                error!("monitor loop task failed to join: {err}");
            }
        }
    }
}

/// Owns the session lifecycle (`Created → Active → Ended → Reported`)
/// and is the only component that writes session state or talks to the
/// store. The frame source and detector are injected at start so the
/// core stays independent of camera and model runtimes.
#[derive(Clone)]
pub struct SessionController {
    state: Arc<Mutex<SessionState>>,
    db: Database,
    config: MonitorConfig,
    worker: Arc<Mutex<MonitorWorker>>,
}

impl SessionController {
    pub fn new(db: Database, config: MonitorConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::new())),
            db,
            config,
            worker: Arc::new(Mutex::new(MonitorWorker::new())),
        }
    }

    /// Starts monitoring a new session. Rejects if one is already
    /// active; a previous session must be ended first.
    pub async fn start_session(
        &self,
        candidate_name: &str,
        frames: Box<dyn FrameSource>,
        detector: Box<dyn Detector>,
    ) -> Result<MonitorSnapshot> {
        self.config
            .validate()
            .context("refusing to start session")?;

        {
            let state = self.state.lock().await;
            if state.status == SessionStatus::Active {
                bail!("session already active");
            }
        }

        let started_at = Utc::now();
        let session_id = format!("{}_{}", candidate_name, started_at.timestamp_millis());

        let record = SessionRecord {
            id: session_id.clone(),
            candidate_name: candidate_name.to_string(),
            started_at,
            ended_at: None,
            integrity_score: INITIAL_SCORE,
            final_score: None,
            created_at: started_at,
            updated_at: started_at,
        };
        self.db
            .insert_session(&record)
            .await
            .context("failed to create session record")?;

        {
            let mut state = self.state.lock().await;
            state.begin_session(session_id.clone(), candidate_name.to_string(), started_at);
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(monitor_loop(
            session_id.clone(),
            self.state.clone(),
            self.db.clone(),
            self.config.clone(),
            frames,
            detector,
            cancel_token.clone(),
        ));

        {
            let mut worker = self.worker.lock().await;
            worker.handle = Some(handle);
            worker.cancel_token = Some(cancel_token);
        }

        info!("session {session_id} started for candidate {candidate_name}");
        Ok(self.state.lock().await.snapshot())
    }

    /// Ends the active session: seals the in-memory state, stops the
    /// sampling loop, and records the end time and final score. The
    /// seal happens first, so an in-flight detection cycle cannot
    /// mutate state afterwards.
    pub async fn end_session(&self) -> Result<MonitorSnapshot> {
        let ended_at = Utc::now();

        let (session_id, final_score) = {
            let mut state = self.state.lock().await;
            if state.status != SessionStatus::Active {
                bail!("no active session");
            }
            state.seal(ended_at);
            let session_id = state
                .session_id
                .clone()
                .ok_or_else(|| anyhow!("active session is missing its id"))?;
            let final_score = state.final_score.unwrap_or_else(|| state.scorer.snapshot());
            (session_id, final_score)
        };

        self.worker.lock().await.stop().await;

        // The in-memory seal stands even if this write fails.
        if let Err(err) = self
            .db
            .mark_session_ended(&session_id, ended_at, final_score, ended_at)
            .await
        {
            error!("failed to persist end of session {session_id}: {err:#}");
        }

        info!("session {session_id} ended with score {final_score}");
        Ok(self.state.lock().await.snapshot())
    }

    /// Projects the final report from the sealed session's persisted
    /// snapshot. Idempotent: repeated calls yield an identical report.
    pub async fn generate_report(&self) -> Result<Report> {
        let session_id = {
            let state = self.state.lock().await;
            match state.status {
                SessionStatus::Ended | SessionStatus::Reported => {}
                SessionStatus::Created | SessionStatus::Active => bail!("session not ended"),
            }
            state
                .session_id
                .clone()
                .ok_or_else(|| anyhow!("sealed session is missing its id"))?
        };

        let snapshot = self
            .db
            .get_session_snapshot(&session_id)
            .await
            .context("failed to read session snapshot")?;
        let report = Report::from_snapshot(&snapshot);

        {
            let mut state = self.state.lock().await;
            if state.status == SessionStatus::Ended {
                state.status = SessionStatus::Reported;
            }
        }

        Ok(report)
    }

    /// Live view of the session for UI polling.
    pub async fn state(&self) -> MonitorSnapshot {
        self.state.lock().await.snapshot()
    }
}
