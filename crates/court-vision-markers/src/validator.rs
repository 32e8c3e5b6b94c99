//! Payload validation against the registry.

use std::collections::{BTreeSet, HashSet};

use court_vision_core::Quad;
use log::debug;

use crate::registry::{MarkerId, MarkerRegistry, MarkerSpec, PayloadMatch};

/// Read-only view of which markers are already confirmed in the running session.
pub trait ConfirmedMarkers {
    fn is_confirmed(&self, id: MarkerId) -> bool;
}

impl ConfirmedMarkers for [MarkerId] {
    fn is_confirmed(&self, id: MarkerId) -> bool {
        self.contains(&id)
    }
}

impl ConfirmedMarkers for HashSet<MarkerId> {
    fn is_confirmed(&self, id: MarkerId) -> bool {
        self.contains(&id)
    }
}

impl ConfirmedMarkers for BTreeSet<MarkerId> {
    fn is_confirmed(&self, id: MarkerId) -> bool {
        self.contains(&id)
    }
}

/// A decoded payload that names a known, not-yet-confirmed marker.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedDetection {
    pub spec: MarkerSpec,
    pub corners: Quad,
    pub matched_by: PayloadMatch,
}

/// Why a decoded payload was not accepted. Neither case is user-visible.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationReject {
    #[error("unknown payload {payload:?}")]
    Unknown { payload: String },
    #[error("marker {0} already confirmed")]
    Duplicate(MarkerId),
}

/// Matches decoded payloads against a [`MarkerRegistry`].
#[derive(Clone, Copy, Debug)]
pub struct MarkerValidator<'r> {
    registry: &'r MarkerRegistry,
}

impl<'r> MarkerValidator<'r> {
    pub fn new(registry: &'r MarkerRegistry) -> Self {
        Self { registry }
    }

    /// Resolve `payload` and check it against the already-confirmed set.
    ///
    /// A confirmed marker is never re-processed, even when it is seen again
    /// with different corners.
    pub fn validate<C>(
        &self,
        payload: &str,
        corners: Quad,
        confirmed: &C,
    ) -> Result<ValidatedDetection, ValidationReject>
    where
        C: ConfirmedMarkers + ?Sized,
    {
        let Some((spec, matched_by)) = self.registry.lookup_with_match(payload) else {
            debug!("ignoring unknown payload {payload:?}");
            return Err(ValidationReject::Unknown {
                payload: payload.to_string(),
            });
        };
        if confirmed.is_confirmed(spec.id) {
            debug!("ignoring repeat detection of {}", spec.id);
            return Err(ValidationReject::Duplicate(spec.id));
        }
        Ok(ValidatedDetection {
            spec: spec.clone(),
            corners,
            matched_by,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;

    fn quad() -> Quad {
        Quad::new(
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(0.0, 10.0),
        )
    }

    #[test]
    fn accepts_new_marker() {
        let reg = MarkerRegistry::court_default();
        let v = MarkerValidator::new(&reg);
        let none: [MarkerId; 0] = [];
        let det = v.validate("left", quad(), &none[..]).expect("valid");
        assert_eq!(det.spec.id, MarkerId::LeftHoop);
        assert_eq!(det.matched_by, PayloadMatch::BareId);
        assert_eq!(det.corners, quad());
    }

    #[test]
    fn rejects_confirmed_marker() {
        let reg = MarkerRegistry::court_default();
        let v = MarkerValidator::new(&reg);
        let confirmed: HashSet<MarkerId> = [MarkerId::RightHoop].into_iter().collect();
        let err = v
            .validate("https://a.b/c?marker=right", quad(), &confirmed)
            .unwrap_err();
        assert_eq!(err, ValidationReject::Duplicate(MarkerId::RightHoop));
    }

    #[test]
    fn rejects_unknown_payload() {
        let reg = MarkerRegistry::court_default();
        let v = MarkerValidator::new(&reg);
        let err = v
            .validate("https://a.b/c?marker=center", quad(), &BTreeSet::<MarkerId>::new())
            .unwrap_err();
        assert!(matches!(err, ValidationReject::Unknown { .. }));
    }
}
