//! High-level facade crate for the `court-vision-*` workspace.
//!
//! This crate provides:
//! - stable, convenient re-exports of the underlying crates
//! - (feature-gated) [`frames::ImageSequenceSource`], a camera stand-in that
//!   replays a directory of images through the calibration pipeline.
//!
//! ## Quickstart
//!
//! ```no_run
//! use court_vision::calib::{CalibrationConfig, ScanOutcome};
//! use court_vision::frames::ImageSequenceSource;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut coordinator = CalibrationConfig::default().build_coordinator()?;
//! let mut frames = ImageSequenceSource::from_dir("captures/")?;
//!
//! coordinator.start(&mut frames)?;
//! while coordinator.tick() != ScanOutcome::StreamEnded {}
//!
//! if let Some(transform) = coordinator.transform() {
//!     println!("court placed, yaw {:.1} deg", transform.yaw_radians().to_degrees());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `court_vision::core`: grayscale images, corner quads, logger setup.
//! - `court_vision::qr`: frame sampling and QR decoding.
//! - `court_vision::markers`: marker registry, payload validation, pose estimate.
//! - `court_vision::calib`: session, coordinator, transform, JSON config/report.
//! - `court_vision::frames` (feature `image`): image-sequence video source.

pub use court_vision_calib as calib;
pub use court_vision_core as core;
pub use court_vision_markers as markers;
pub use court_vision_qr as qr;

pub use court_vision_calib::{
    CalibrationConfig, CalibrationCoordinator, CalibrationEvent, CalibrationState, CourtTransform,
    DetectedMarker,
};
pub use court_vision_markers::{MarkerId, MarkerRegistry, MarkerSpec};

#[cfg(feature = "image")]
pub mod frames;
