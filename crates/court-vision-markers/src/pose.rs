//! Screen-space pose estimate for a detected marker.
//!
//! The estimate is a pinhole approximation with a fixed focal length: camera
//! intrinsics are not measured at runtime, so `estimated_distance` is only good
//! for UI feedback. The world position is copied from the registry.

use court_vision_core::Quad;
use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::registry::{MarkerId, MarkerSpec};

/// Quads whose mean side is at or below this many pixels are degenerate.
const MIN_SIDE_PX: f64 = 1e-6;

/// Pose estimator configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseParams {
    /// Assumed focal length in pixels.
    pub focal_length_px: f64,
}

impl Default for PoseParams {
    fn default() -> Self {
        Self {
            focal_length_px: 1000.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoseEstimate {
    /// Mean of the four corners, pixels.
    pub screen_center: Point2<f32>,
    /// Mean of the top-edge width and left-edge height, pixels.
    pub pixel_size: f64,
    /// Approximate camera distance, meters.
    pub estimated_distance: f64,
    /// Pixels per meter of printed code.
    pub estimated_scale: f64,
    /// Surveyed marker position, copied from the [`MarkerSpec`].
    pub world_position: Point3<f64>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PoseError {
    #[error("degenerate marker quad (mean side {mean_side} px)")]
    DegenerateQuad { mean_side: f64 },
    #[error("marker quad has non-finite corners")]
    NonFiniteCorners,
    #[error("marker {id} has invalid physical size {size}")]
    InvalidPhysicalSize { id: MarkerId, size: f64 },
}

#[derive(Clone, Debug, Default)]
pub struct PoseEstimator {
    params: PoseParams,
}

impl PoseEstimator {
    pub fn new(params: PoseParams) -> Self {
        Self { params }
    }

    #[inline]
    pub fn params(&self) -> &PoseParams {
        &self.params
    }

    /// Estimate screen center, distance and scale from the corner quad.
    ///
    /// Zero-size or non-finite quads are rejected so no infinite distance or
    /// scale ever leaves this function.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, spec, corners), fields(marker = %spec.id))
    )]
    pub fn estimate(&self, spec: &MarkerSpec, corners: &Quad) -> Result<PoseEstimate, PoseError> {
        if !corners.is_finite() {
            return Err(PoseError::NonFiniteCorners);
        }
        if !spec.physical_size.is_finite() || spec.physical_size <= 0.0 {
            return Err(PoseError::InvalidPhysicalSize {
                id: spec.id,
                size: spec.physical_size,
            });
        }

        let pixel_size = corners.mean_side() as f64;
        if pixel_size <= MIN_SIDE_PX {
            return Err(PoseError::DegenerateQuad {
                mean_side: pixel_size,
            });
        }

        let estimated_distance = spec.physical_size * self.params.focal_length_px / pixel_size;
        let estimated_scale = pixel_size / spec.physical_size;
        if !estimated_distance.is_finite() || !estimated_scale.is_finite() {
            return Err(PoseError::DegenerateQuad {
                mean_side: pixel_size,
            });
        }

        Ok(PoseEstimate {
            screen_center: corners.center(),
            pixel_size,
            estimated_distance,
            estimated_scale,
            world_position: spec.world_position,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MarkerRegistry;
    use approx::assert_relative_eq;

    fn quad(x: f32, y: f32, w: f32, h: f32) -> Quad {
        Quad::new(
            Point2::new(x, y),
            Point2::new(x + w, y),
            Point2::new(x + w, y + h),
            Point2::new(x, y + h),
        )
    }

    #[test]
    fn distance_and_scale_follow_pinhole_model() {
        let reg = MarkerRegistry::court_default();
        let entrance = reg.get(MarkerId::Entrance).expect("spec");
        let est = PoseEstimator::default()
            .estimate(entrance, &quad(100.0, 50.0, 120.0, 180.0))
            .expect("estimate");

        // mean side = (120 + 180) / 2 = 150 px, size = 0.15 m
        assert_relative_eq!(est.pixel_size, 150.0);
        assert_relative_eq!(est.estimated_distance, 1.0, epsilon = 1e-9);
        assert_relative_eq!(est.estimated_scale, 1000.0, epsilon = 1e-9);
        assert_relative_eq!(est.screen_center.x, 160.0);
        assert_relative_eq!(est.screen_center.y, 140.0);
        assert_eq!(est.world_position, entrance.world_position);
    }

    #[test]
    fn world_position_ignores_image_location() {
        let reg = MarkerRegistry::court_default();
        let left = reg.get(MarkerId::LeftHoop).expect("spec");
        let est = PoseEstimator::default();
        let a = est.estimate(left, &quad(0.0, 0.0, 10.0, 10.0)).expect("a");
        let b = est.estimate(left, &quad(500.0, 300.0, 80.0, 60.0)).expect("b");
        assert_eq!(a.world_position, b.world_position);
    }

    #[test]
    fn zero_size_quad_is_rejected() {
        let reg = MarkerRegistry::court_default();
        let right = reg.get(MarkerId::RightHoop).expect("spec");
        let err = PoseEstimator::default()
            .estimate(right, &quad(40.0, 40.0, 0.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, PoseError::DegenerateQuad { .. }));
    }

    #[test]
    fn non_finite_quad_is_rejected() {
        let reg = MarkerRegistry::court_default();
        let right = reg.get(MarkerId::RightHoop).expect("spec");
        let err = PoseEstimator::default()
            .estimate(right, &quad(f32::NAN, 0.0, 10.0, 10.0))
            .unwrap_err();
        assert_eq!(err, PoseError::NonFiniteCorners);
    }
}
