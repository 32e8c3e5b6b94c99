//! Court placement transform built from the three surveyed marker positions.
//!
//! The basis is derived from world positions only:
//! - `right`   = horizontal direction from the left hoop to the right hoop,
//! - `forward` = horizontal direction from the entrance to the court center,
//! - `up`      = world +Y.
//!
//! The translation is the entrance marker. Detection order and timing do not
//! enter the computation, so the same registry always yields the same matrix.

use std::fmt;

use court_vision_markers::MarkerId;
use log::{debug, warn};
use nalgebra::{Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::session::DetectedMarker;

/// Horizontal vectors shorter than this are treated as degenerate.
const MIN_AXIS_LENGTH: f64 = 1e-9;
/// Tolerance used when warning about a sheared basis.
const ORTHONORMAL_TOLERANCE: f64 = 1e-6;

/// Which basis vector could not be derived.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BasisAxis {
    /// Left and right hoop coincide in the horizontal plane.
    Right,
    /// Entrance sits on the court center in the horizontal plane.
    Forward,
}

impl fmt::Display for BasisAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BasisAxis::Right => f.write_str("right"),
            BasisAxis::Forward => f.write_str("forward"),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("cannot build court transform, missing markers: {missing:?}")]
    MissingMarkers { missing: Vec<MarkerId> },
    #[error("degenerate {axis} axis: surveyed marker positions are corrupted or misplaced")]
    DegenerateAxis { axis: BasisAxis },
}

/// 4x4 rigid placement transform for the court model.
///
/// Columns are `right`, `up`, `forward` and the translation; the bottom row
/// is `(0, 0, 0, 1)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CourtTransform {
    matrix: Matrix4<f64>,
}

impl CourtTransform {
    /// Assemble a transform from its basis vectors and origin.
    pub fn from_basis(
        right: Vector3<f64>,
        up: Vector3<f64>,
        forward: Vector3<f64>,
        origin: Point3<f64>,
    ) -> Self {
        #[rustfmt::skip]
        let matrix = Matrix4::new(
            right.x, up.x, forward.x, origin.x,
            right.y, up.y, forward.y, origin.y,
            right.z, up.z, forward.z, origin.z,
            0.0,     0.0,  0.0,       1.0,
        );
        Self { matrix }
    }

    #[inline]
    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    pub fn right(&self) -> Vector3<f64> {
        self.column(0)
    }

    pub fn up(&self) -> Vector3<f64> {
        self.column(1)
    }

    pub fn forward(&self) -> Vector3<f64> {
        self.column(2)
    }

    pub fn translation(&self) -> Point3<f64> {
        Point3::from(self.column(3))
    }

    /// Rotation about +Y that turns the model's +Z toward `forward`.
    pub fn yaw_radians(&self) -> f64 {
        let f = self.forward();
        f.x.atan2(f.z)
    }

    /// Whether the basis columns are unit length and mutually perpendicular.
    pub fn is_orthonormal(&self, tolerance: f64) -> bool {
        let (r, u, f) = (self.right(), self.up(), self.forward());
        [
            r.norm() - 1.0,
            u.norm() - 1.0,
            f.norm() - 1.0,
            r.dot(&u),
            r.dot(&f),
            u.dot(&f),
        ]
        .iter()
        .all(|e| e.abs() <= tolerance)
    }

    /// Row-major nested array, convenient for JSON reports.
    pub fn to_rows(&self) -> [[f64; 4]; 4] {
        let mut rows = [[0.0; 4]; 4];
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = self.matrix[(r, c)];
            }
        }
        rows
    }

    /// Column-major flat array, the layout WebGL-style renderers consume.
    pub fn to_column_major(&self) -> [f64; 16] {
        let mut out = [0.0; 16];
        out.copy_from_slice(self.matrix.as_slice());
        out
    }

    /// Map a model-space point into the world frame.
    pub fn apply(&self, point: &Point3<f64>) -> Point3<f64> {
        let p = self.matrix * point.to_homogeneous();
        Point3::new(p.x, p.y, p.z)
    }

    fn column(&self, c: usize) -> Vector3<f64> {
        Vector3::new(self.matrix[(0, c)], self.matrix[(1, c)], self.matrix[(2, c)])
    }
}

/// Build the transform from a set of detected markers.
///
/// Fails with [`TransformError::MissingMarkers`] unless all three markers are
/// present. If an id appears more than once, the first entry is used.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(detected), fields(markers = detected.len()))
)]
pub fn build_court_transform(detected: &[DetectedMarker]) -> Result<CourtTransform, TransformError> {
    let position = |id: MarkerId| {
        detected
            .iter()
            .find(|m| m.marker_id == id)
            .map(|m| m.world_position)
    };

    let missing: Vec<MarkerId> = MarkerId::ALL
        .into_iter()
        .filter(|id| position(*id).is_none())
        .collect();

    match (
        position(MarkerId::Entrance),
        position(MarkerId::LeftHoop),
        position(MarkerId::RightHoop),
    ) {
        (Some(entrance), Some(left), Some(right)) => build_from_positions(entrance, left, right),
        _ => Err(TransformError::MissingMarkers { missing }),
    }
}

/// Build the transform directly from the three surveyed positions.
///
/// `right` and `forward` are normalized independently and are orthogonal only
/// when the entrance lies on the perpendicular bisector of the two hoops, as
/// it does for the surveyed court. A custom marker table with the entrance off
/// that line yields a sheared basis; check [`CourtTransform::is_orthonormal`]
/// before treating the matrix as rigid.
pub fn build_from_positions(
    entrance: Point3<f64>,
    left: Point3<f64>,
    right: Point3<f64>,
) -> Result<CourtTransform, TransformError> {
    let center = nalgebra::center(&left, &right);

    let right_axis = horizontal_unit(right - left).ok_or(TransformError::DegenerateAxis {
        axis: BasisAxis::Right,
    })?;
    let forward_axis = horizontal_unit(center - entrance).ok_or(TransformError::DegenerateAxis {
        axis: BasisAxis::Forward,
    })?;

    debug!(
        "court basis: right={:?} forward={:?} origin={:?}",
        right_axis.as_slice(),
        forward_axis.as_slice(),
        entrance.coords.as_slice()
    );

    let transform = CourtTransform::from_basis(right_axis, Vector3::y(), forward_axis, entrance);
    if !transform.is_orthonormal(ORTHONORMAL_TOLERANCE) {
        warn!(
            "entrance is off the hoop bisector; right/forward are {:.1} deg apart",
            right_axis.angle(&forward_axis).to_degrees()
        );
    }
    Ok(transform)
}

/// Project onto the ground plane (y = 0) and normalize.
fn horizontal_unit(v: Vector3<f64>) -> Option<Vector3<f64>> {
    let flat = Vector3::new(v.x, 0.0, v.z);
    let len = flat.norm();
    if !len.is_finite() || len < MIN_AXIS_LENGTH {
        return None;
    }
    Some(flat / len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn court() -> (Point3<f64>, Point3<f64>, Point3<f64>) {
        (
            Point3::origin(),
            Point3::new(-14.0, 1.6, 28.0),
            Point3::new(14.0, 1.6, 28.0),
        )
    }

    #[test]
    fn surveyed_court_gives_identity_rotation() {
        let (e, l, r) = court();
        let t = build_from_positions(e, l, r).expect("transform");

        assert_relative_eq!(t.right(), Vector3::x(), epsilon = 1e-12);
        assert_relative_eq!(t.up(), Vector3::y(), epsilon = 1e-12);
        assert_relative_eq!(t.forward(), Vector3::z(), epsilon = 1e-12);
        assert_relative_eq!(t.translation(), Point3::origin(), epsilon = 1e-12);
        assert_relative_eq!(t.yaw_radians(), 0.0, epsilon = 1e-12);
        assert_eq!(t.to_rows()[3], [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn off_axis_entrance_gives_sheared_basis() {
        let (_, l, r) = court();
        let t = build_from_positions(Point3::new(5.0, 0.0, 0.0), l, r).expect("transform");
        assert!(!t.is_orthonormal(1e-6));
        assert_relative_eq!(t.right().norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(t.forward().norm(), 1.0, epsilon = 1e-12);
        assert!(t.right().dot(&t.forward()).abs() > 0.1);

        let (e, l, r) = court();
        assert!(build_from_positions(e, l, r)
            .expect("transform")
            .is_orthonormal(1e-9));
    }

    #[test]
    fn vertical_offsets_are_ignored() {
        let e = Point3::new(2.0, -3.0, 1.0);
        let l = Point3::new(-5.0, 9.0, 11.0);
        let r = Point3::new(5.0, -7.0, 11.0);
        let t = build_from_positions(e, l, r).expect("transform");
        assert_relative_eq!(t.right().y, 0.0);
        assert_relative_eq!(t.forward().y, 0.0);
        assert_relative_eq!(t.right().norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(t.translation(), e, epsilon = 1e-12);
    }

    #[test]
    fn rotated_court_reports_yaw() {
        // Court turned 90 degrees: hoops along -z/+z, forward along +x.
        let e = Point3::origin();
        let l = Point3::new(28.0, 0.0, 14.0);
        let r = Point3::new(28.0, 0.0, -14.0);
        let t = build_from_positions(e, l, r).expect("transform");
        assert_relative_eq!(t.forward(), Vector3::x(), epsilon = 1e-12);
        assert_relative_eq!(t.yaw_radians(), std::f64::consts::FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn coincident_hoops_are_rejected() {
        let (e, l, _) = court();
        let err = build_from_positions(e, l, l).unwrap_err();
        assert_eq!(
            err,
            TransformError::DegenerateAxis {
                axis: BasisAxis::Right
            }
        );
    }

    #[test]
    fn hoops_stacked_vertically_are_rejected() {
        let e = Point3::origin();
        let l = Point3::new(0.0, 1.0, 28.0);
        let r = Point3::new(0.0, 3.0, 28.0);
        assert!(matches!(
            build_from_positions(e, l, r),
            Err(TransformError::DegenerateAxis {
                axis: BasisAxis::Right
            })
        ));
    }

    #[test]
    fn entrance_at_court_center_is_rejected() {
        let l = Point3::new(-14.0, 1.6, 28.0);
        let r = Point3::new(14.0, 1.6, 28.0);
        let e = Point3::new(0.0, 0.0, 28.0);
        assert_eq!(
            build_from_positions(e, l, r).unwrap_err(),
            TransformError::DegenerateAxis {
                axis: BasisAxis::Forward
            }
        );
    }

    #[test]
    fn apply_moves_model_points_into_world() {
        let e = Point3::new(10.0, 0.0, -4.0);
        let l = Point3::new(-4.0, 0.0, 24.0);
        let r = Point3::new(24.0, 0.0, 24.0);
        let t = build_from_positions(e, l, r).expect("transform");
        assert_relative_eq!(t.apply(&Point3::origin()), e, epsilon = 1e-12);
        assert_relative_eq!(
            t.apply(&Point3::new(1.0, 0.0, 0.0)),
            Point3::new(11.0, 0.0, -4.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn column_major_layout_puts_translation_last() {
        let e = Point3::new(1.0, 2.0, 3.0);
        let l = Point3::new(-14.0, 0.0, 28.0);
        let r = Point3::new(14.0, 0.0, 28.0);
        let t = build_from_positions(e, l, r).expect("transform");
        let flat = t.to_column_major();
        assert_eq!(&flat[12..16], &[1.0, 2.0, 3.0, 1.0]);
        assert_eq!(t.to_rows()[0][3], 1.0);
    }

    #[test]
    fn missing_markers_are_listed() {
        let err = build_court_transform(&[]).unwrap_err();
        assert_eq!(
            err,
            TransformError::MissingMarkers {
                missing: MarkerId::ALL.to_vec()
            }
        );
    }
}
