//! Surveyed calibration markers.
//!
//! Current focus:
//! - a static registry of the three court markers (payload patterns, surveyed
//!   world position, printed size),
//! - validation of decoded QR payloads against that registry,
//! - a lightweight pose estimate (screen center, distance, scale) from the
//!   detected corner quad.
//!
//! World coordinates always come from the registry. The pose estimate is
//! informational; there is no perspective-n-point solve.

mod pose;
mod registry;
mod validator;

pub use pose::{PoseError, PoseEstimate, PoseEstimator, PoseParams};
pub use registry::{
    MarkerId, MarkerRegistry, MarkerSpec, PayloadMatch, RegistryError, DEFAULT_EXPERIENCE_URL,
    PAYLOAD_KEYS,
};
pub use validator::{ConfirmedMarkers, MarkerValidator, ValidatedDetection, ValidationReject};
