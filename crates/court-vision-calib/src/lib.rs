//! Marker-based court calibration.
//!
//! This crate provides:
//! - [`CalibrationSession`]: detected markers and the transform, with the
//!   invariant that a transform exists exactly when all markers are found,
//! - [`CalibrationCoordinator`]: the `idle -> scanning -> complete` state
//!   machine driven once per display frame,
//! - [`build_court_transform`]: the 4x4 placement transform derived from the
//!   surveyed marker positions,
//! - JSON config and report helpers in [`io`].
//!
//! ## Quickstart
//!
//! ```no_run
//! use court_vision_calib::{CalibrationConfig, ScanOutcome};
//! use court_vision_core::GrayImage;
//! use court_vision_qr::ReplaySource;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut coordinator = CalibrationConfig::default().build_coordinator()?;
//! coordinator.on_calibration_complete(|markers, transform| {
//!     println!("{} markers, yaw {:.1} rad", markers.len(), transform.yaw_radians());
//! });
//!
//! let mut camera = ReplaySource::new(vec![GrayImage::filled(640, 480, 255)]);
//! coordinator.start(&mut camera)?;
//! while coordinator.tick() != ScanOutcome::StreamEnded {}
//! # Ok(())
//! # }
//! ```

pub mod clock;
mod coordinator;
pub mod io;
mod session;
mod transform;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use coordinator::{
    AnalyticsObserver, AnalyticsSink, CalibrationCoordinator, CalibrationError, CalibrationEvent,
    CalibrationObserver, CalibrationSnapshot, CalibrationState, ChannelObserver,
    CoordinatorParams, ModelPlacer, PlacementObserver, Progress, ScanOutcome, ScanStats,
};
pub use io::{CalibrationConfig, CalibrationIoError, CalibrationReport};
pub use session::{CalibrationSession, DetectedMarker, RecordOutcome};
pub use transform::{
    build_court_transform, build_from_positions, BasisAxis, CourtTransform, TransformError,
};
