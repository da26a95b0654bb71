//! Boundary to the external frame source and face/object detectors.
//!
//! The core never talks to a camera or an inference runtime directly;
//! both are injected behind the `FrameSource` and `Detector` traits and
//! normalized into the `Detections` shape below.

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

/// One sampled video frame. The payload is opaque to the core; only the
/// detector interprets it.
#[derive(Debug, Clone)]
pub struct Frame {
    pub seq: u64,
    pub captured_at: DateTime<Utc>,
    pub data: Vec<u8>,
}

/// Landmarks of one detected face, in the detector's pixel scale.
/// The first three points are expected in eye-eye-nose order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FaceLandmarks {
    pub landmarks: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectedObject {
    pub label: String,
    #[serde(default)]
    pub bbox: BoundingBox,
}

/// Normalized output of one detection pass over one frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Detections {
    #[serde(default)]
    pub faces: Vec<FaceLandmarks>,
    #[serde(default)]
    pub objects: Vec<DetectedObject>,
}

impl Detections {
    pub fn summary(&self) -> DetectionSummary {
        DetectionSummary {
            faces: self.faces.len(),
            objects: self.objects.iter().map(|o| o.label.clone()).collect(),
        }
    }
}

/// Live `{faces, objects}` counts for UI polling.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DetectionSummary {
    pub faces: usize,
    pub objects: Vec<String>,
}

/// Supplies frames at a steady cadence. `None` means "frame unavailable
/// this tick"; the cycle is skipped without inferring a violation.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Option<Frame>;
}

/// Black-box face/object detector.
pub trait Detector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Detections>;
}

/// Fail-soft wrapper around the injected detector: a transient model
/// failure must not crash the monitoring loop, and must not be
/// mistaken for an empty (zero-face) result.
pub struct DetectionAdapter {
    inner: Box<dyn Detector>,
}

impl DetectionAdapter {
    pub fn new(detector: Box<dyn Detector>) -> Self {
        Self { inner: detector }
    }

    /// Runs the detector on one frame. Returns `None` on failure; the
    /// caller treats that cycle as "no data".
    pub fn run(&mut self, frame: &Frame) -> Option<Detections> {
        match self.inner.detect(frame) {
            Ok(detections) => Some(detections),
            Err(err) => {
                warn!("detector failed on frame {}: {err:#}", frame.seq);
                None
            }
        }
    }
}
