//! Session store: append-only event/alert timelines plus the running
//! score, behind a dedicated worker thread so the async monitoring loop
//! never blocks on sqlite.

use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use log::{error, info};
use rusqlite::{params, Connection, Row};
use tokio::sync::oneshot;

mod migrations;

use migrations::run_migrations;

use crate::models::{
    Alert, Event, EventKind, SessionRecord, SessionSnapshot, Severity,
};

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to DB thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join DB thread: {join_err:?}");
            }
        }
    }
}

fn parse_datetime(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| anyhow!("invalid datetime '{value}': {err}"))
}

fn kind_from_str(value: &str) -> Result<EventKind> {
    match value {
        "no_face" => Ok(EventKind::NoFace),
        "multiple_faces" => Ok(EventKind::MultipleFaces),
        "not_focused" => Ok(EventKind::NotFocused),
        "suspicious_item" => Ok(EventKind::SuspiciousItem),
        _ => Err(anyhow!("unknown event kind '{value}'")),
    }
}

fn severity_from_str(value: &str) -> Result<Severity> {
    match value {
        "warning" => Ok(Severity::Warning),
        "error" => Ok(Severity::Error),
        _ => Err(anyhow!("unknown severity '{value}'")),
    }
}

fn row_to_session(row: &Row<'_>) -> Result<SessionRecord> {
    let started_at: String = row.get("started_at")?;
    let ended_at: Option<String> = row.get("ended_at")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(SessionRecord {
        id: row.get("id")?,
        candidate_name: row.get("candidate_name")?,
        started_at: parse_datetime(&started_at)?,
        ended_at: ended_at.as_deref().map(parse_datetime).transpose()?,
        integrity_score: row.get("integrity_score")?,
        final_score: row.get("final_score")?,
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

const SESSION_COLUMNS: &str =
    "id, candidate_name, started_at, ended_at, integrity_score, final_score, created_at, updated_at";

#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("vigil-db".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite database")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }
                if let Err(err) = conn.pragma_update(None, "foreign_keys", "ON") {
                    error!("Failed to enable foreign keys: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run database migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("DB initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Database thread shutting down");
            })
            .with_context(|| "failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before signaling readiness")??;

        info!("Database initialized at {}", db_path.as_path().display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("DB caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to DB thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread terminated unexpectedly"))?
    }

    pub async fn insert_session(&self, session: &SessionRecord) -> Result<()> {
        let record = session.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, candidate_name, started_at, ended_at, integrity_score, final_score, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.id,
                    record.candidate_name,
                    record.started_at.to_rfc3339(),
                    record.ended_at.as_ref().map(|dt| dt.to_rfc3339()),
                    record.integrity_score,
                    record.final_score,
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to insert session")?;
            Ok(())
        })
        .await
    }

    pub async fn insert_event(&self, session_id: &str, event: &Event) -> Result<()> {
        let session_id = session_id.to_string();
        let record = event.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO events (session_id, timestamp, kind, message, severity)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    session_id,
                    record.timestamp.to_rfc3339(),
                    record.kind.as_str(),
                    record.message,
                    record.severity.as_str(),
                ],
            )
            .with_context(|| "failed to insert event")?;
            Ok(())
        })
        .await
    }

    pub async fn insert_alert(&self, session_id: &str, alert: &Alert) -> Result<()> {
        let session_id = session_id.to_string();
        let record = alert.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO alerts (session_id, timestamp, message, severity)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    session_id,
                    record.timestamp.to_rfc3339(),
                    record.message,
                    record.severity.as_str(),
                ],
            )
            .with_context(|| "failed to insert alert")?;
            Ok(())
        })
        .await
    }

    pub async fn update_session_score(
        &self,
        session_id: &str,
        score: u32,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE sessions
                 SET integrity_score = ?1,
                     updated_at = ?2
                 WHERE id = ?3",
                params![score, updated_at.to_rfc3339(), session_id],
            )
            .with_context(|| "failed to update session score")?;
            Ok(())
        })
        .await
    }

    pub async fn mark_session_ended(
        &self,
        session_id: &str,
        ended_at: DateTime<Utc>,
        final_score: u32,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE sessions
                 SET ended_at = ?1,
                     final_score = ?2,
                     integrity_score = ?2,
                     updated_at = ?3
                 WHERE id = ?4",
                params![
                    ended_at.to_rfc3339(),
                    final_score,
                    updated_at.to_rfc3339(),
                    session_id,
                ],
            )
            .with_context(|| "failed to mark session ended")?;
            Ok(())
        })
        .await
    }

    /// Most recent session without an end time, if any. Used on startup
    /// to recover sessions left open by a crash.
    pub async fn find_open_session(&self) -> Result<Option<SessionRecord>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE ended_at IS NULL
                 ORDER BY started_at DESC
                 LIMIT 1",
            ))?;

            let mut rows = stmt.query([])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_session(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    /// Full persisted view of a session: row plus ordered timelines.
    pub async fn get_session_snapshot(&self, session_id: &str) -> Result<SessionSnapshot> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let session = {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1",
                ))?;
                let mut rows = stmt.query(params![session_id])?;
                match rows.next()? {
                    Some(row) => row_to_session(row)?,
                    None => return Err(anyhow!("session '{session_id}' not found")),
                }
            };

            let mut events = Vec::new();
            {
                let mut stmt = conn.prepare(
                    "SELECT timestamp, kind, message, severity FROM events
                     WHERE session_id = ?1
                     ORDER BY id ASC",
                )?;
                let mut rows = stmt.query(params![session_id])?;
                while let Some(row) = rows.next()? {
                    let timestamp: String = row.get(0)?;
                    let kind: String = row.get(1)?;
                    let severity: String = row.get(3)?;
                    events.push(Event {
                        timestamp: parse_datetime(&timestamp)?,
                        kind: kind_from_str(&kind)?,
                        message: row.get(2)?,
                        severity: severity_from_str(&severity)?,
                    });
                }
            }

            let mut alerts = Vec::new();
            {
                let mut stmt = conn.prepare(
                    "SELECT timestamp, message, severity FROM alerts
                     WHERE session_id = ?1
                     ORDER BY id ASC",
                )?;
                let mut rows = stmt.query(params![session_id])?;
                while let Some(row) = rows.next()? {
                    let timestamp: String = row.get(0)?;
                    let severity: String = row.get(2)?;
                    alerts.push(Alert {
                        timestamp: parse_datetime(&timestamp)?,
                        message: row.get(1)?,
                        severity: severity_from_str(&severity)?,
                    });
                }
            }

            Ok(SessionSnapshot {
                session,
                events,
                alerts,
            })
        })
        .await
    }
}
