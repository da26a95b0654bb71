use std::sync::Arc;

use chrono::Utc;
use log::{debug, error, info};
use tokio::{
    sync::{mpsc, Mutex},
    time::{Duration, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    config::MonitorConfig,
    db::Database,
    detect::{DetectionAdapter, Detector, FrameSource},
    models::{Alert, Event, SessionStatus},
};

use super::{classifier::AttentionClassifier, policy::ObjectPolicy, state::SessionState};

/// All store writes produced by one detection cycle, in insertion order.
struct CycleWrites {
    records: Vec<(Event, Alert)>,
    score: u32,
}

/// Periodic sampling loop: one detection cycle per tick while the
/// session is active. Late ticks are dropped, never queued, so a slow
/// detector cannot build up a backlog of overlapping cycles.
pub(crate) async fn monitor_loop(
    session_id: String,
    state: Arc<Mutex<SessionState>>,
    db: Database,
    config: MonitorConfig,
    mut frames: Box<dyn FrameSource>,
    detector: Box<dyn Detector>,
    cancel_token: CancellationToken,
) {
    let started_at = {
        let guard = state.lock().await;
        guard.started_at.unwrap_or_else(Utc::now)
    };

    let mut adapter = DetectionAdapter::new(detector);
    let mut classifier = AttentionClassifier::new(started_at);
    let policy = ObjectPolicy::new(&config);

    let mut ticker = tokio::time::interval(Duration::from_millis(config.sample_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // Single writer behind a channel: the persisted timeline keeps
    // insertion order without the ticks ever blocking on the store.
    // Closing the channel on shutdown flushes everything before the
    // controller joins us.
    let (write_tx, write_rx) = mpsc::unbounded_channel::<CycleWrites>();
    let writer = tokio::spawn(write_cycles(session_id.clone(), db, write_rx));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_cycle(
                    &session_id,
                    &state,
                    &config,
                    frames.as_mut(),
                    &mut adapter,
                    &mut classifier,
                    &policy,
                    &write_tx,
                )
                .await;
            }
            _ = cancel_token.cancelled() => {
                info!("monitor loop for session {session_id} shutting down");
                break;
            }
        }
    }

    drop(write_tx);
    if let Err(err) = writer.await {
        error!("store writer for session {session_id} failed to join: {err}");
    }
}

async fn write_cycles(
    session_id: String,
    db: Database,
    mut write_rx: mpsc::UnboundedReceiver<CycleWrites>,
) {
    while let Some(batch) = write_rx.recv().await {
        for (event, alert) in &batch.records {
            if let Err(err) = db.insert_event(&session_id, event).await {
                error!("failed to persist event for session {session_id}: {err:#}");
            }
            if let Err(err) = db.insert_alert(&session_id, alert).await {
                error!("failed to persist alert for session {session_id}: {err:#}");
            }
        }
        if let Err(err) = db
            .update_session_score(&session_id, batch.score, Utc::now())
            .await
        {
            error!("failed to persist score for session {session_id}: {err:#}");
        }
    }
}

async fn run_cycle(
    session_id: &str,
    state: &Arc<Mutex<SessionState>>,
    config: &MonitorConfig,
    frames: &mut dyn FrameSource,
    adapter: &mut DetectionAdapter,
    classifier: &mut AttentionClassifier,
    policy: &ObjectPolicy,
    write_tx: &mpsc::UnboundedSender<CycleWrites>,
) {
    let now = Utc::now();

    let Some(frame) = frames.next_frame() else {
        debug!("frame unavailable for session {session_id}, skipping cycle");
        return;
    };

    // Detector failure means "no data" for this cycle; in particular it
    // must not be classified as an absent face.
    let Some(detections) = adapter.run(&frame) else {
        return;
    };

    let mut violations = classifier.classify(&detections.faces, now, config);
    violations.extend(policy.inspect(&detections.objects));

    // Apply under the state lock. A cycle that was in flight when the
    // session got sealed drops its results here.
    let batch: Option<CycleWrites> = {
        let mut guard = state.lock().await;
        if guard.status != SessionStatus::Active {
            debug!("session {session_id} no longer active, dropping cycle results");
            return;
        }
        guard.last_detections = detections.summary();

        if violations.is_empty() {
            None
        } else {
            let mut records = Vec::with_capacity(violations.len());
            let mut score = guard.scorer.snapshot();
            for violation in violations {
                let (event, alert, new_score) = guard.record_violation(violation, now, config);
                records.push((event, alert));
                score = new_score;
            }
            Some(CycleWrites { records, score })
        }
    };

    // A send failure means the writer died; the in-memory timeline is
    // already current, so the cycle carries on.
    if let Some(batch) = batch {
        if write_tx.send(batch).is_err() {
            error!("store writer for session {session_id} is gone, dropping cycle writes");
        }
    }
}
