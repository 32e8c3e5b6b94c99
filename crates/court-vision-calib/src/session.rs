//! Per-run calibration state owned by the coordinator.

use std::time::Duration;

use court_vision_core::Quad;
use court_vision_markers::{ConfirmedMarkers, MarkerId};
use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

use crate::transform::{CourtTransform, TransformError};

/// A marker confirmed for the first time in the running session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedMarker {
    pub marker_id: MarkerId,
    /// Monotonic time of confirmation, relative to the coordinator clock.
    pub detected_at: Duration,
    pub screen_center: Point2<f32>,
    /// Corners ordered TL, TR, BR, BL.
    pub corner_quad: Quad,
    pub estimated_distance: f64,
    pub estimated_scale: f64,
    /// Copied from the registry, never derived from the image.
    pub world_position: Point3<f64>,
}

/// Result of [`CalibrationSession::record`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The marker was already confirmed; nothing changed.
    Duplicate,
    /// The marker id is not part of this session's required set.
    NotRequired,
    /// Stored as detection number `step`; more markers are needed.
    Added { step: usize },
    /// Stored as detection number `step`, completing the set.
    Completed { step: usize },
}

/// Detected markers (in detection order) and the transform, once complete.
///
/// `transform` is set exactly when every required id has been detected.
#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationSession {
    detected: Vec<DetectedMarker>,
    required: [MarkerId; 3],
    transform: Option<CourtTransform>,
}

impl Default for CalibrationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CalibrationSession {
    pub fn new() -> Self {
        Self {
            detected: Vec::with_capacity(3),
            required: MarkerId::ALL,
            transform: None,
        }
    }

    /// Store a first-time detection.
    ///
    /// When the insert completes the required set, `build` is called with
    /// every detection. If it fails, the insert is undone and the error
    /// returned, so the session is never complete without a transform.
    pub fn record<F>(
        &mut self,
        marker: DetectedMarker,
        build: F,
    ) -> Result<RecordOutcome, TransformError>
    where
        F: FnOnce(&[DetectedMarker]) -> Result<CourtTransform, TransformError>,
    {
        if !self.required.contains(&marker.marker_id) {
            return Ok(RecordOutcome::NotRequired);
        }
        if self.contains(marker.marker_id) {
            return Ok(RecordOutcome::Duplicate);
        }

        self.detected.push(marker);
        let step = self.detected.len();
        if !self.is_complete() {
            return Ok(RecordOutcome::Added { step });
        }

        match build(&self.detected) {
            Ok(transform) => {
                self.transform = Some(transform);
                Ok(RecordOutcome::Completed { step })
            }
            Err(err) => {
                self.detected.pop();
                Err(err)
            }
        }
    }

    /// Set equality between detected ids and the required ids.
    pub fn is_complete(&self) -> bool {
        self.required.iter().all(|id| self.contains(*id))
    }

    pub fn contains(&self, id: MarkerId) -> bool {
        self.detected.iter().any(|m| m.marker_id == id)
    }

    pub fn get(&self, id: MarkerId) -> Option<&DetectedMarker> {
        self.detected.iter().find(|m| m.marker_id == id)
    }

    /// Detections in the order they were confirmed.
    #[inline]
    pub fn detected(&self) -> &[DetectedMarker] {
        &self.detected
    }

    #[inline]
    pub fn required(&self) -> &[MarkerId; 3] {
        &self.required
    }

    #[inline]
    pub fn transform(&self) -> Option<&CourtTransform> {
        self.transform.as_ref()
    }

    /// First required id that has not been detected yet.
    pub fn next_expected(&self) -> Option<MarkerId> {
        self.required.iter().copied().find(|id| !self.contains(*id))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.detected.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.detected.is_empty()
    }

    /// Drop all detections and the transform.
    pub fn clear(&mut self) {
        self.detected.clear();
        self.transform = None;
    }
}

impl ConfirmedMarkers for CalibrationSession {
    fn is_confirmed(&self, id: MarkerId) -> bool {
        self.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{build_court_transform, BasisAxis};

    fn marker(id: MarkerId, x: f64) -> DetectedMarker {
        DetectedMarker {
            marker_id: id,
            detected_at: Duration::from_millis(10),
            screen_center: Point2::new(5.0, 5.0),
            corner_quad: Quad::new(
                Point2::new(0.0, 0.0),
                Point2::new(10.0, 0.0),
                Point2::new(10.0, 10.0),
                Point2::new(0.0, 10.0),
            ),
            estimated_distance: 1.0,
            estimated_scale: 100.0,
            world_position: Point3::new(x, 0.0, if id == MarkerId::Entrance { 0.0 } else { 28.0 }),
        }
    }

    #[test]
    fn completes_only_with_all_three() {
        let mut s = CalibrationSession::new();
        assert_eq!(
            s.record(marker(MarkerId::RightHoop, 14.0), build_court_transform),
            Ok(RecordOutcome::Added { step: 1 })
        );
        assert_eq!(
            s.record(marker(MarkerId::Entrance, 0.0), build_court_transform),
            Ok(RecordOutcome::Added { step: 2 })
        );
        assert!(!s.is_complete());
        assert!(s.transform().is_none());
        assert_eq!(s.next_expected(), Some(MarkerId::LeftHoop));

        assert_eq!(
            s.record(marker(MarkerId::LeftHoop, -14.0), build_court_transform),
            Ok(RecordOutcome::Completed { step: 3 })
        );
        assert!(s.is_complete());
        assert!(s.transform().is_some());
        assert_eq!(s.next_expected(), None);
    }

    #[test]
    fn duplicates_do_not_change_state() {
        let mut s = CalibrationSession::new();
        s.record(marker(MarkerId::Entrance, 0.0), build_court_transform)
            .expect("first");
        let before = s.clone();
        assert_eq!(
            s.record(marker(MarkerId::Entrance, 3.0), build_court_transform),
            Ok(RecordOutcome::Duplicate)
        );
        assert_eq!(s, before);
    }

    #[test]
    fn failed_build_rolls_back_the_insert() {
        let mut s = CalibrationSession::new();
        s.record(marker(MarkerId::Entrance, 0.0), build_court_transform)
            .expect("entrance");
        s.record(marker(MarkerId::LeftHoop, 5.0), build_court_transform)
            .expect("left");
        let err = s
            .record(marker(MarkerId::RightHoop, 5.0), build_court_transform)
            .unwrap_err();
        assert_eq!(
            err,
            TransformError::DegenerateAxis {
                axis: BasisAxis::Right
            }
        );
        assert_eq!(s.len(), 2);
        assert!(!s.is_complete());
        assert!(s.transform().is_none());
    }

    #[test]
    fn clear_resets_everything() {
        let mut s = CalibrationSession::new();
        for (id, x) in [
            (MarkerId::Entrance, 0.0),
            (MarkerId::LeftHoop, -14.0),
            (MarkerId::RightHoop, 14.0),
        ] {
            s.record(marker(id, x), build_court_transform).expect("record");
        }
        s.clear();
        assert!(s.is_empty());
        assert!(s.transform().is_none());
        assert!(!s.is_confirmed(MarkerId::Entrance));
    }
}
