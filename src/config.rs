use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Monitoring configuration with tunable thresholds. Every field falls
/// back to its default, so a config file only needs the overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MonitorConfig {
    /// Sampling cadence of the detection loop.
    pub sample_interval_ms: u64,

    /// Minimum time between repeated `no_face` firings.
    pub no_face_debounce_ms: i64,

    /// Minimum continuous off-focus time before `not_focused` fires.
    pub not_focused_debounce_ms: i64,

    /// Focus heuristic: max vertical eye offset, in landmark units.
    pub eye_slope_max: f64,
    /// Focus heuristic: max nose offset as a fraction of eye distance.
    pub nose_offset_ratio: f64,

    /// Score deductions per alert severity.
    pub error_penalty: u32,
    pub warning_penalty: u32,

    /// Object labels that raise a `suspicious_item` violation.
    /// Matched exactly against the detector's label vocabulary.
    pub prohibited_items: Vec<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 1000,
            no_face_debounce_ms: 10_000,
            not_focused_debounce_ms: 5_000,
            eye_slope_max: 10.0,
            nose_offset_ratio: 0.3,
            error_penalty: 10,
            warning_penalty: 5,
            prohibited_items: vec![
                "cell phone".into(),
                "book".into(),
                "laptop".into(),
                "tablet".into(),
            ],
        }
    }
}

impl MonitorConfig {
    /// Load overrides from a JSON file; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// A zero interval would stall the sampling loop, leaving the
    /// session active but unmonitored.
    pub fn validate(&self) -> Result<()> {
        if self.sample_interval_ms == 0 {
            bail!("sampleIntervalMs must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_deployment_baseline() {
        let config = MonitorConfig::default();
        assert_eq!(config.sample_interval_ms, 1000);
        assert_eq!(config.no_face_debounce_ms, 10_000);
        assert_eq!(config.not_focused_debounce_ms, 5_000);
        assert_eq!(config.error_penalty, 10);
        assert_eq!(config.warning_penalty, 5);
        assert!(config
            .prohibited_items
            .iter()
            .any(|item| item == "cell phone"));
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"noFaceDebounceMs": 3000, "errorPenalty": 20}"#).unwrap();

        let config = MonitorConfig::load(&path).unwrap();
        assert_eq!(config.no_face_debounce_ms, 3000);
        assert_eq!(config.error_penalty, 20);
        assert_eq!(config.not_focused_debounce_ms, 5000);
        assert_eq!(config.sample_interval_ms, 1000);
    }

    #[test]
    fn zero_sample_interval_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"sampleIntervalMs": 0}"#).unwrap();

        let err = MonitorConfig::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("sampleIntervalMs must be positive"));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = MonitorConfig::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config.warning_penalty, 5);
    }
}
