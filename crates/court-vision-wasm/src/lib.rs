//! Browser binding for the court calibration pipeline.
//!
//! The page owns the camera (`getUserMedia`) and the animation loop. Once per
//! `requestAnimationFrame` it hands the current video frame to
//! [`WasmCalibrator::process_rgba`] (or a code decoded by its own QR reader
//! to [`WasmCalibrator::process_code`]) and drains events with
//! [`WasmCalibrator::take_events`].

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use court_vision_calib::{
    CalibrationConfig, CalibrationCoordinator, CalibrationEvent, CalibrationState, ManualClock,
    ScanOutcome,
};
use court_vision_core::{rgba_to_gray, Quad};
use court_vision_qr::{AcquireError, QrCode};
use serde::Serialize;
use wasm_bindgen::prelude::*;

/// Calibration coordinator driven from JavaScript.
#[wasm_bindgen]
pub struct WasmCalibrator {
    coordinator: CalibrationCoordinator,
    clock: ManualClock,
    events: Rc<RefCell<Vec<CalibrationEvent>>>,
}

#[wasm_bindgen]
impl WasmCalibrator {
    /// Create a calibrator. `config` is a `CalibrationConfig` object, or
    /// `undefined` for the surveyed court defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<WasmCalibrator, JsError> {
        let cfg: CalibrationConfig = if config.is_undefined() || config.is_null() {
            CalibrationConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config).map_err(|e| JsError::new(&e.to_string()))?
        };
        let clock = ManualClock::new();
        let mut coordinator = cfg.build_coordinator_with_clock(Box::new(clock.clone()))?;

        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        coordinator.subscribe(move |ev: &CalibrationEvent| sink.borrow_mut().push(ev.clone()));

        Ok(Self {
            coordinator,
            clock,
            events,
        })
    }

    /// Begin scanning. Call once the camera stream is playing.
    pub fn start(&mut self) {
        self.coordinator.begin();
    }

    /// Pause scanning (e.g. tab hidden). Progress is kept.
    pub fn stop(&mut self) {
        self.coordinator.stop();
    }

    /// Clear all detections and the transform.
    pub fn reset(&mut self) {
        self.coordinator.reset();
    }

    /// Report a camera failure. `kind` is the DOMException name, e.g.
    /// `NotAllowedError` or `NotFoundError`.
    #[wasm_bindgen(js_name = reportCameraError)]
    pub fn report_camera_error(&mut self, kind: &str, message: &str) {
        self.coordinator
            .report_acquire_error(acquire_error_from_dom(kind, message));
    }

    /// Decode one RGBA frame. Returns the outcome tag (`no_code`,
    /// `confirmed`, `completed`, ...).
    #[wasm_bindgen(js_name = processRgba)]
    pub fn process_rgba(
        &mut self,
        rgba: &[u8],
        width: usize,
        height: usize,
        timestamp_ms: f64,
    ) -> Result<String, JsError> {
        self.set_time(timestamp_ms);
        let gray = rgba_to_gray(rgba, width, height)?;
        let outcome = self.coordinator.process_frame(&gray.view());
        Ok(outcome_tag(&outcome).to_string())
    }

    /// Handle a code decoded by the page's own QR reader. `corners` holds
    /// eight numbers: TL, TR, BR, BL as `x, y` pairs.
    #[wasm_bindgen(js_name = processCode)]
    pub fn process_code(
        &mut self,
        payload: &str,
        corners: &[f32],
        timestamp_ms: f64,
    ) -> Result<String, JsError> {
        self.set_time(timestamp_ms);
        let code = code_from_parts(payload, corners)
            .ok_or_else(|| JsError::new("corners must hold 8 finite numbers"))?;
        let outcome = self.coordinator.process_code(&code);
        Ok(outcome_tag(&outcome).to_string())
    }

    /// `idle`, `scanning` or `complete`.
    pub fn state(&self) -> String {
        state_name(self.coordinator.state()).to_string()
    }

    #[wasm_bindgen(js_name = detectedCount)]
    pub fn detected_count(&self) -> usize {
        self.coordinator.progress().detected
    }

    /// Canonical id of the marker to scan next, if any.
    #[wasm_bindgen(js_name = nextExpected)]
    pub fn next_expected(&self) -> Option<String> {
        self.coordinator.next_expected().map(|id| id.to_string())
    }

    /// Column-major 4x4 placement transform, once calibration is complete.
    pub fn transform(&self) -> Option<js_sys::Float64Array> {
        self.coordinator
            .transform()
            .map(|t| js_sys::Float64Array::from(&t.to_column_major()[..]))
    }

    /// Yaw of the court about +Y, radians.
    #[wasm_bindgen(js_name = yawRadians)]
    pub fn yaw_radians(&self) -> Option<f64> {
        self.coordinator.transform().map(|t| t.yaw_radians())
    }

    /// Drain events emitted since the last call, as plain JS objects.
    #[wasm_bindgen(js_name = takeEvents)]
    pub fn take_events(&mut self) -> Result<JsValue, JsError> {
        let events = std::mem::take(&mut *self.events.borrow_mut());
        to_js(&events)
    }

    /// Debug export of the whole calibration state.
    pub fn snapshot(&self) -> Result<JsValue, JsError> {
        to_js(&self.coordinator.snapshot())
    }

    fn set_time(&self, timestamp_ms: f64) {
        if let Some(now) = duration_from_ms(timestamp_ms) {
            self.clock.set(now);
        }
    }
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsError> {
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    value
        .serialize(&serializer)
        .map_err(|e| JsError::new(&e.to_string()))
}

fn duration_from_ms(ms: f64) -> Option<Duration> {
    (ms.is_finite() && ms >= 0.0).then(|| Duration::from_secs_f64(ms / 1000.0))
}

fn code_from_parts(payload: &str, corners: &[f32]) -> Option<QrCode> {
    let corners = Quad::from_flat(corners)?;
    corners.is_finite().then(|| QrCode {
        payload: payload.to_string(),
        corners,
    })
}

fn acquire_error_from_dom(kind: &str, message: &str) -> AcquireError {
    match kind {
        "NotAllowedError" | "SecurityError" => AcquireError::PermissionDenied,
        "NotFoundError" | "OverconstrainedError" => AcquireError::NoCamera,
        _ => AcquireError::Device(format!("{kind}: {message}")),
    }
}

fn state_name(state: CalibrationState) -> &'static str {
    match state {
        CalibrationState::Idle => "idle",
        CalibrationState::Scanning => "scanning",
        CalibrationState::Complete => "complete",
    }
}

fn outcome_tag(outcome: &ScanOutcome) -> &'static str {
    match outcome {
        ScanOutcome::Inactive => "inactive",
        ScanOutcome::StreamEnded => "stream_ended",
        ScanOutcome::NoCode => "no_code",
        ScanOutcome::Rejected(_) => "rejected",
        ScanOutcome::Discarded(_) => "discarded",
        ScanOutcome::Confirmed { .. } => "confirmed",
        ScanOutcome::Completed { .. } => "completed",
        ScanOutcome::Failed(_) => "failed",
    }
}
