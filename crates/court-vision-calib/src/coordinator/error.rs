use court_vision_core::FrameError;
use court_vision_markers::RegistryError;
use court_vision_qr::AcquireError;

use crate::transform::TransformError;

/// Errors surfaced by the calibration coordinator.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// Camera unavailable or denied. Needs user action, then `reset` + `start`.
    #[error(transparent)]
    Acquire(#[from] AcquireError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Frame(#[from] FrameError),
}

impl CalibrationError {
    /// Stable tag used in `error_occurred` events.
    pub fn error_type(&self) -> &'static str {
        match self {
            CalibrationError::Acquire(AcquireError::PermissionDenied) => "camera_permission_denied",
            CalibrationError::Acquire(AcquireError::NoCamera) => "camera_unavailable",
            CalibrationError::Acquire(_) => "camera_error",
            CalibrationError::Transform(_) => "degenerate_geometry",
            CalibrationError::Registry(_) => "invalid_registry",
            CalibrationError::Frame(_) => "invalid_frame",
        }
    }

    /// True for errors the user can fix (camera permission or hardware).
    pub fn is_user_actionable(&self) -> bool {
        matches!(self, CalibrationError::Acquire(_))
    }
}
