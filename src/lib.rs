pub mod config;
pub mod db;
pub mod detect;
pub mod models;
pub mod monitor;
pub mod report;

pub use config::MonitorConfig;
pub use db::Database;
pub use detect::{Detections, DetectionSummary, Detector, Frame, FrameSource};
pub use models::{Alert, Event, EventKind, SessionStatus, Severity};
pub use monitor::{MonitorSnapshot, SessionController};
pub use report::Report;
