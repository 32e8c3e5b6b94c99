//! JSON configuration and report helpers for calibration runs.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use court_vision_markers::{MarkerRegistry, MarkerSpec, PoseParams, DEFAULT_EXPERIENCE_URL};
use court_vision_qr::{CameraRequest, RqrrDecoder, RqrrParams};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::coordinator::{
    CalibrationCoordinator, CalibrationError, CalibrationEvent, CalibrationSnapshot,
    CalibrationState, CoordinatorParams, ScanStats,
};
use crate::session::DetectedMarker;

#[derive(thiserror::Error, Debug)]
pub enum CalibrationIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn default_base_url() -> String {
    DEFAULT_EXPERIENCE_URL.to_string()
}

/// Configuration for a calibration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Custom marker table. When absent, the surveyed court markers are used.
    #[serde(default)]
    pub markers: Option<Vec<MarkerSpec>>,
    /// Experience page the printed codes link to.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub pose: PoseParams,
    #[serde(default)]
    pub camera: CameraRequest,
    #[serde(default)]
    pub decoder: RqrrParams,
    #[serde(default)]
    pub stall_after_ms: Option<u64>,
    #[serde(default)]
    pub output_path: Option<String>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            markers: None,
            base_url: default_base_url(),
            pose: PoseParams::default(),
            camera: CameraRequest::default(),
            decoder: RqrrParams::default(),
            stall_after_ms: None,
            output_path: None,
        }
    }
}

impl CalibrationConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CalibrationIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CalibrationIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Resolve the output report path.
    pub fn output_path(&self) -> PathBuf {
        self.output_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("court_vision_report.json"))
    }

    /// Build a validated registry from the config.
    pub fn build_registry(&self) -> Result<MarkerRegistry, CalibrationError> {
        let specs = match &self.markers {
            Some(specs) => specs.clone(),
            None => MarkerRegistry::with_base_url(&self.base_url).specs().to_vec(),
        };
        Ok(MarkerRegistry::new(specs)?)
    }

    pub fn build_params(&self) -> CoordinatorParams {
        CoordinatorParams {
            pose: self.pose.clone(),
            camera: self.camera.clone(),
            stall_after_ms: self.stall_after_ms,
        }
    }

    /// Build an rqrr-backed coordinator from this config.
    pub fn build_coordinator(&self) -> Result<CalibrationCoordinator, CalibrationError> {
        CalibrationCoordinator::new(
            self.build_registry()?,
            RqrrDecoder::new(self.decoder.clone()),
            self.build_params(),
        )
    }

    /// Like [`Self::build_coordinator`], with an explicit clock.
    pub fn build_coordinator_with_clock(
        &self,
        clock: Box<dyn Clock>,
    ) -> Result<CalibrationCoordinator, CalibrationError> {
        CalibrationCoordinator::with_clock(
            self.build_registry()?,
            RqrrDecoder::new(self.decoder.clone()),
            self.build_params(),
            clock,
        )
    }
}

/// Outcome of a calibration run, written as JSON by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationReport {
    /// Where the frames came from (directory, device name, ...).
    pub source: String,
    #[serde(default)]
    pub config_path: Option<String>,
    pub state: CalibrationState,
    pub stats: ScanStats,
    pub markers: Vec<DetectedMarker>,
    /// Row-major 4x4 placement transform.
    #[serde(default)]
    pub transform: Option<[[f64; 4]; 4]>,
    #[serde(default)]
    pub yaw_degrees: Option<f64>,
    #[serde(default)]
    pub events: Vec<CalibrationEvent>,
    #[serde(default)]
    pub elapsed: Option<Duration>,
    #[serde(default)]
    pub error: Option<String>,
}

impl CalibrationReport {
    pub fn new(source: impl Into<String>, config_path: Option<&Path>) -> Self {
        Self {
            source: source.into(),
            config_path: config_path.map(|p| p.to_string_lossy().into_owned()),
            state: CalibrationState::Idle,
            stats: ScanStats::default(),
            markers: Vec::new(),
            transform: None,
            yaw_degrees: None,
            events: Vec::new(),
            elapsed: None,
            error: None,
        }
    }

    /// Populate the report from the coordinator's final state.
    pub fn set_snapshot(&mut self, snapshot: CalibrationSnapshot) {
        self.state = snapshot.state;
        self.stats = snapshot.stats;
        self.markers = snapshot.markers;
        self.transform = snapshot.transform.map(|t| t.to_rows());
        self.yaw_degrees = snapshot.transform.map(|t| t.yaw_radians().to_degrees());
    }

    /// Record a run error.
    pub fn set_error(&mut self, err: impl std::fmt::Display) {
        self.error = Some(err.to_string());
    }

    pub fn is_complete(&self) -> bool {
        self.state == CalibrationState::Complete
    }

    /// Load a report from JSON on disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CalibrationIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this report to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CalibrationIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
