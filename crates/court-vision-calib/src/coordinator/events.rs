//! Calibration events and the observers that consume them.
//!
//! Events are delivered synchronously, in order, from inside the frame turn
//! that produced them.

use std::sync::mpsc;
use std::time::Duration;

use court_vision_markers::{MarkerId, PoseEstimate};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::session::DetectedMarker;
use crate::transform::CourtTransform;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CalibrationEvent {
    /// A marker was confirmed for the first time in this session.
    MarkerDetected {
        marker_id: MarkerId,
        /// Number of confirmed markers including this one.
        step: usize,
        pose: PoseEstimate,
    },
    /// All required markers are confirmed. Fires once per session.
    CalibrationComplete {
        markers: Vec<DetectedMarker>,
        transform: CourtTransform,
        /// Time from the start of scanning to completion.
        duration: Duration,
    },
    ErrorOccurred {
        error_type: String,
        message: String,
    },
    /// No new marker was confirmed for the configured stall period.
    ScanStalled {
        waited: Duration,
        next_expected: Option<MarkerId>,
    },
}

impl CalibrationEvent {
    /// Event type tag, as used by analytics.
    pub fn event_type(&self) -> &'static str {
        match self {
            CalibrationEvent::MarkerDetected { .. } => "marker_detected",
            CalibrationEvent::CalibrationComplete { .. } => "calibration_complete",
            CalibrationEvent::ErrorOccurred { .. } => "error_occurred",
            CalibrationEvent::ScanStalled { .. } => "scan_stalled",
        }
    }

    /// Analytics payload: `{markerId, step}`, `{duration, markers}` or
    /// `{errorType, message}`. Durations are milliseconds.
    pub fn analytics_payload(&self) -> serde_json::Value {
        match self {
            CalibrationEvent::MarkerDetected {
                marker_id, step, ..
            } => json!({ "markerId": marker_id, "step": step }),
            CalibrationEvent::CalibrationComplete {
                markers, duration, ..
            } => json!({
                "duration": duration.as_millis() as u64,
                "markers": markers.iter().map(|m| m.marker_id).collect::<Vec<_>>(),
            }),
            CalibrationEvent::ErrorOccurred {
                error_type,
                message,
            } => json!({ "errorType": error_type, "message": message }),
            CalibrationEvent::ScanStalled {
                waited,
                next_expected,
            } => json!({
                "waited": waited.as_millis() as u64,
                "nextExpected": next_expected,
            }),
        }
    }
}

/// Receives every event emitted by a coordinator.
pub trait CalibrationObserver {
    fn on_event(&mut self, event: &CalibrationEvent);
}

impl<F> CalibrationObserver for F
where
    F: FnMut(&CalibrationEvent),
{
    fn on_event(&mut self, event: &CalibrationEvent) {
        self(event)
    }
}

/// Forwards events into an mpsc channel. A dropped receiver is ignored.
#[derive(Debug)]
pub struct ChannelObserver {
    tx: mpsc::Sender<CalibrationEvent>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::Sender<CalibrationEvent>) -> Self {
        Self { tx }
    }

    /// Observer plus the receiving end.
    pub fn channel() -> (Self, mpsc::Receiver<CalibrationEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl CalibrationObserver for ChannelObserver {
    fn on_event(&mut self, event: &CalibrationEvent) {
        if self.tx.send(event.clone()).is_err() {
            debug!("event receiver dropped, discarding {}", event.event_type());
        }
    }
}

/// External analytics collector: `record(event_type, data)`.
pub trait AnalyticsSink {
    fn record(&mut self, event_type: &str, data: serde_json::Value);
}

impl AnalyticsSink for Vec<(String, serde_json::Value)> {
    fn record(&mut self, event_type: &str, data: serde_json::Value) {
        self.push((event_type.to_string(), data));
    }
}

/// Maps calibration events onto an [`AnalyticsSink`].
#[derive(Debug, Default)]
pub struct AnalyticsObserver<S> {
    sink: S,
}

impl<S: AnalyticsSink> AnalyticsObserver<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_inner(self) -> S {
        self.sink
    }
}

impl<S: AnalyticsSink> CalibrationObserver for AnalyticsObserver<S> {
    fn on_event(&mut self, event: &CalibrationEvent) {
        self.sink
            .record(event.event_type(), event.analytics_payload());
    }
}

/// External renderer: places the court model once calibration completes.
pub trait ModelPlacer {
    fn place_model(&mut self, transform: &CourtTransform);
}

/// Calls [`ModelPlacer::place_model`] once per completed calibration.
#[derive(Debug, Default)]
pub struct PlacementObserver<P> {
    placer: P,
}

impl<P: ModelPlacer> PlacementObserver<P> {
    pub fn new(placer: P) -> Self {
        Self { placer }
    }

    pub fn placer(&self) -> &P {
        &self.placer
    }

    pub fn into_inner(self) -> P {
        self.placer
    }
}

impl<P: ModelPlacer> CalibrationObserver for PlacementObserver<P> {
    fn on_event(&mut self, event: &CalibrationEvent) {
        if let CalibrationEvent::CalibrationComplete { transform, .. } = event {
            self.placer.place_model(transform);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point2, Point3};

    fn pose() -> PoseEstimate {
        PoseEstimate {
            screen_center: Point2::new(1.0, 2.0),
            pixel_size: 100.0,
            estimated_distance: 1.5,
            estimated_scale: 666.0,
            world_position: Point3::origin(),
        }
    }

    #[test]
    fn analytics_payloads_use_camel_case_keys() {
        let ev = CalibrationEvent::MarkerDetected {
            marker_id: MarkerId::LeftHoop,
            step: 2,
            pose: pose(),
        };
        assert_eq!(ev.event_type(), "marker_detected");
        assert_eq!(
            ev.analytics_payload(),
            json!({ "markerId": "left-hoop", "step": 2 })
        );

        let err = CalibrationEvent::ErrorOccurred {
            error_type: "camera_permission_denied".into(),
            message: "camera permission denied".into(),
        };
        assert_eq!(
            err.analytics_payload()["errorType"],
            json!("camera_permission_denied")
        );
    }

    #[test]
    fn analytics_observer_forwards_every_event() {
        let mut obs = AnalyticsObserver::new(Vec::<(String, serde_json::Value)>::new());
        obs.on_event(&CalibrationEvent::ScanStalled {
            waited: Duration::from_secs(30),
            next_expected: Some(MarkerId::RightHoop),
        });
        let recorded = obs.into_inner();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].0, "scan_stalled");
        assert_eq!(recorded[0].1["waited"], json!(30_000));
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let ev = CalibrationEvent::ErrorOccurred {
            error_type: "camera_error".into(),
            message: "boom".into(),
        };
        let v = serde_json::to_value(&ev).expect("json");
        assert_eq!(v["type"], json!("error_occurred"));
        let back: CalibrationEvent = serde_json::from_value(v).expect("back");
        assert_eq!(back, ev);
    }

    #[test]
    fn channel_observer_survives_dropped_receiver() {
        let (mut obs, rx) = ChannelObserver::channel();
        drop(rx);
        obs.on_event(&CalibrationEvent::ScanStalled {
            waited: Duration::ZERO,
            next_expected: None,
        });
    }
}
