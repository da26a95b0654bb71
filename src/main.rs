use std::{
    collections::VecDeque,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::Parser;
use log::warn;
use tokio::time::{sleep, Duration};

use vigil::{
    Database, Detections, Detector, Frame, FrameSource, MonitorConfig, SessionController,
};

/// Replay a recorded detection trace through a full proctoring session
/// and print the final report. One JSON detection result per line, one
/// line per sampling cycle.
#[derive(Parser, Debug)]
#[clap(version, about)]
struct Cli {
    /// JSONL file with one detection result per sampling cycle
    #[clap(short, long)]
    trace: PathBuf,

    /// candidate name recorded on the session
    #[clap(short, long)]
    candidate: String,

    /// sqlite database path
    #[clap(long, default_value = "vigil.sqlite3")]
    db: PathBuf,

    /// JSON file overriding the default thresholds
    #[clap(long)]
    config: Option<PathBuf>,

    /// sampling interval override, useful for fast replays
    #[clap(long)]
    interval_ms: Option<u64>,
}

/// The recorded trace, shared between the frame source and the
/// detector so frame supply ends exactly when the recording does.
type TraceQueue = Arc<Mutex<VecDeque<Detections>>>;

/// Supplies one frame per remaining trace entry. Once the trace is
/// exhausted this reports "frame unavailable", so trailing ticks are
/// skipped instead of being classified as an empty (zero-face) cycle
/// that was never in the recording.
struct TraceFrames {
    ticks: TraceQueue,
    seq: u64,
}

impl FrameSource for TraceFrames {
    fn next_frame(&mut self) -> Option<Frame> {
        let exhausted = self.ticks.lock().map(|queue| queue.is_empty()).unwrap_or(true);
        if exhausted {
            return None;
        }
        self.seq += 1;
        Some(Frame {
            seq: self.seq,
            captured_at: Utc::now(),
            data: Vec::new(),
        })
    }
}

/// Feeds the pre-recorded detection result for each supplied frame.
struct TraceFeed {
    ticks: TraceQueue,
}

impl Detector for TraceFeed {
    fn detect(&mut self, _frame: &Frame) -> Result<Detections> {
        let mut queue = self
            .ticks
            .lock()
            .map_err(|_| anyhow!("trace queue poisoned"))?;
        Ok(queue.pop_front().unwrap_or_default())
    }
}

fn remaining_ticks(ticks: &TraceQueue) -> usize {
    ticks.lock().map(|queue| queue.len()).unwrap_or(0)
}

fn read_trace(path: &Path) -> Result<VecDeque<Detections>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read trace from {}", path.display()))?;

    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("invalid detection result on line {}", index + 1))
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => MonitorConfig::load(path)?,
        None => MonitorConfig::default(),
    };
    if let Some(interval_ms) = cli.interval_ms {
        config.sample_interval_ms = interval_ms;
    }

    let db = Database::new(cli.db.clone())?;

    // Seal any session a previous crash left open, so it can still be
    // reported on.
    if let Some(open) = db.find_open_session().await? {
        warn!(
            "Recovered incomplete session {}; sealing at last update",
            open.id
        );
        db.mark_session_ended(&open.id, open.updated_at, open.integrity_score, Utc::now())
            .await?;
    }

    let ticks: TraceQueue = Arc::new(Mutex::new(read_trace(&cli.trace)?));
    let total = remaining_ticks(&ticks);
    let frames = TraceFrames {
        ticks: ticks.clone(),
        seq: 0,
    };
    let feed = TraceFeed {
        ticks: ticks.clone(),
    };

    let controller = SessionController::new(db, config.clone());
    controller
        .start_session(&cli.candidate, Box::new(frames), Box::new(feed))
        .await?;
    log::info!(
        "replaying {total} detection cycles at {}ms intervals",
        config.sample_interval_ms
    );

    while remaining_ticks(&ticks) > 0 {
        sleep(Duration::from_millis(config.sample_interval_ms / 2 + 1)).await;
    }
    // Let the final cycle's results land before sealing.
    sleep(Duration::from_millis(config.sample_interval_ms)).await;

    controller.end_session().await?;
    let report = controller.generate_report().await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use vigil::detect::FaceLandmarks;
    use vigil::SessionStatus;

    fn focused_face() -> Detections {
        Detections {
            faces: vec![FaceLandmarks {
                landmarks: vec![[100.0, 100.0], [140.0, 100.0], [120.0, 110.0]],
            }],
            objects: Vec::new(),
        }
    }

    #[tokio::test]
    async fn exhausted_trace_fires_no_trailing_events() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("vigil-test.sqlite3")).unwrap();

        // Aggressive absence window: any post-trace cycle classified as
        // zero faces would fire no_face immediately.
        let config = MonitorConfig {
            sample_interval_ms: 20,
            no_face_debounce_ms: 1,
            ..MonitorConfig::default()
        };

        let ticks: TraceQueue = Arc::new(Mutex::new(
            (0..3).map(|_| focused_face()).collect::<VecDeque<_>>(),
        ));
        let frames = TraceFrames {
            ticks: ticks.clone(),
            seq: 0,
        };
        let feed = TraceFeed {
            ticks: ticks.clone(),
        };

        let controller = SessionController::new(db, config);
        controller
            .start_session("kate", Box::new(frames), Box::new(feed))
            .await
            .unwrap();

        // Run well past exhaustion: the trace lasts ~60ms, the session
        // keeps ticking for another ~140ms on unavailable frames.
        while remaining_ticks(&ticks) > 0 {
            sleep(Duration::from_millis(10)).await;
        }
        sleep(Duration::from_millis(140)).await;

        let ended = controller.end_session().await.unwrap();
        assert_eq!(ended.status, SessionStatus::Ended);
        assert_eq!(ended.event_count, 0);
        assert_eq!(ended.integrity_score, 100);
    }
}
