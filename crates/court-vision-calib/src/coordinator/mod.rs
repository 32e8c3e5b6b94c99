//! Calibration coordinator: `idle -> scanning -> complete`.
//!
//! The coordinator owns the [`CalibrationSession`] and drives one detection
//! attempt per display frame. Every session mutation happens inside
//! [`CalibrationCoordinator::tick`], [`CalibrationCoordinator::process_frame`]
//! or [`CalibrationCoordinator::process_code`], so no locking is needed.

mod error;
mod events;
mod params;

pub use error::CalibrationError;
pub use events::{
    AnalyticsObserver, AnalyticsSink, CalibrationEvent, CalibrationObserver, ChannelObserver,
    ModelPlacer, PlacementObserver,
};
pub use params::CoordinatorParams;

use std::time::Duration;

use court_vision_core::GrayImageView;
use court_vision_markers::{
    MarkerId, MarkerRegistry, MarkerSpec, MarkerValidator, PoseError, PoseEstimate, PoseEstimator,
    ValidationReject,
};
use court_vision_qr::{AcquireError, FrameSampler, QrCode, QrDecoder, RqrrDecoder, VideoSource};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::clock::{Clock, MonotonicClock};
use crate::session::{CalibrationSession, DetectedMarker, RecordOutcome};
use crate::transform::{
    build_court_transform, build_from_positions, CourtTransform, TransformError,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationState {
    Idle,
    Scanning,
    Complete,
}

/// What happened during one frame turn.
#[derive(Clone, Debug, PartialEq)]
pub enum ScanOutcome {
    /// Not scanning (idle, paused or already complete). Nothing was decoded.
    Inactive,
    /// The camera stream ended. Progress is kept; the coordinator is idle.
    StreamEnded,
    /// No readable code in the frame.
    NoCode,
    /// Unknown payload or already-confirmed marker.
    Rejected(ValidationReject),
    /// Known marker with a degenerate quad; the detection was dropped.
    Discarded(PoseError),
    Confirmed { marker_id: MarkerId, step: usize },
    Completed { marker_id: MarkerId, step: usize },
    /// The last marker was found but the transform could not be built.
    Failed(TransformError),
}

/// Detected vs required marker counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub detected: usize,
    pub required: usize,
}

/// Frame and detection counters for the coordinator's lifetime.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    pub frames_sampled: u64,
    pub frames_processed: u64,
    pub codes_decoded: u64,
    pub rejected_unknown: u64,
    pub rejected_duplicate: u64,
    pub discarded: u64,
}

/// Serializable debug view of a coordinator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSnapshot {
    pub state: CalibrationState,
    pub progress: Progress,
    pub next_expected: Option<MarkerId>,
    pub markers: Vec<DetectedMarker>,
    pub transform: Option<CourtTransform>,
    pub registry: Vec<MarkerSpec>,
    pub stats: ScanStats,
}

/// Sequences marker detections and builds the court transform.
pub struct CalibrationCoordinator<D = RqrrDecoder> {
    registry: MarkerRegistry,
    decoder: D,
    pose: PoseEstimator,
    params: CoordinatorParams,
    sampler: FrameSampler,
    session: CalibrationSession,
    state: CalibrationState,
    /// Input is live: a camera stream, or a host feeding frames after `begin`.
    active: bool,
    observers: Vec<Box<dyn CalibrationObserver>>,
    clock: Box<dyn Clock>,
    scan_started_at: Option<Duration>,
    last_progress_at: Duration,
    stall_reported: bool,
    stats: ScanStats,
}

impl<D: QrDecoder> CalibrationCoordinator<D> {
    /// Create a coordinator using a monotonic system clock.
    pub fn new(
        registry: MarkerRegistry,
        decoder: D,
        params: CoordinatorParams,
    ) -> Result<Self, CalibrationError> {
        Self::with_clock(registry, decoder, params, Box::new(MonotonicClock::new()))
    }

    /// Create a coordinator with an explicit clock.
    ///
    /// Fails when the registry geometry cannot produce a transform, so the
    /// completion transition can always populate one.
    pub fn with_clock(
        registry: MarkerRegistry,
        decoder: D,
        params: CoordinatorParams,
        clock: Box<dyn Clock>,
    ) -> Result<Self, CalibrationError> {
        check_registry_geometry(&registry)?;
        Ok(Self {
            registry,
            decoder,
            pose: PoseEstimator::new(params.pose.clone()),
            params,
            sampler: FrameSampler::new(),
            session: CalibrationSession::new(),
            state: CalibrationState::Idle,
            active: false,
            observers: Vec::new(),
            last_progress_at: clock.now(),
            clock,
            scan_started_at: None,
            stall_reported: false,
            stats: ScanStats::default(),
        })
    }

    /// Register an observer. Observers are called in registration order.
    pub fn subscribe(&mut self, observer: impl CalibrationObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Call `f(marker_id, step, pose)` for every first-time detection.
    pub fn on_marker_detected<F>(&mut self, mut f: F)
    where
        F: FnMut(MarkerId, usize, &PoseEstimate) + 'static,
    {
        self.subscribe(move |event: &CalibrationEvent| {
            if let CalibrationEvent::MarkerDetected {
                marker_id,
                step,
                pose,
            } = event
            {
                f(*marker_id, *step, pose);
            }
        });
    }

    /// Call `f(markers, transform)` once per completed calibration.
    pub fn on_calibration_complete<F>(&mut self, mut f: F)
    where
        F: FnMut(&[DetectedMarker], &CourtTransform) + 'static,
    {
        self.subscribe(move |event: &CalibrationEvent| {
            if let CalibrationEvent::CalibrationComplete {
                markers, transform, ..
            } = event
            {
                f(markers, transform);
            }
        });
    }

    /// Acquire the camera from `source` and start scanning.
    ///
    /// Acquisition failures are returned and reported as `error_occurred`;
    /// the state does not change. After a stop, this resumes with the
    /// session's progress intact.
    pub fn start(&mut self, source: &mut dyn VideoSource) -> Result<(), CalibrationError> {
        match self.sampler.start(source, &self.params.camera) {
            Ok(()) => {
                self.begin();
                Ok(())
            }
            Err(AcquireError::AlreadyActive) => {
                Err(CalibrationError::Acquire(AcquireError::AlreadyActive))
            }
            Err(err) => Err(self.report_acquire_error(err)),
        }
    }

    /// Report a camera failure from a host-managed camera (e.g. a browser
    /// `getUserMedia` rejection) as an `error_occurred` event.
    pub fn report_acquire_error(&mut self, err: AcquireError) -> CalibrationError {
        let err = CalibrationError::from(err);
        error!("camera acquisition failed: {err}");
        self.emit_error(&err);
        err
    }

    /// Start scanning without a camera. The host feeds frames or codes
    /// through [`Self::process_frame`] / [`Self::process_code`].
    pub fn begin(&mut self) {
        self.active = true;
        let now = self.clock.now();
        self.last_progress_at = now;
        self.stall_reported = false;
        if self.state == CalibrationState::Idle {
            self.state = CalibrationState::Scanning;
            self.scan_started_at.get_or_insert(now);
            info!(
                "scanning for markers ({}/{} confirmed)",
                self.session.len(),
                self.session.required().len()
            );
        }
    }

    /// Release the camera and pause. Session state is kept. Idempotent.
    pub fn stop(&mut self) {
        self.sampler.stop();
        self.active = false;
        if self.state == CalibrationState::Scanning {
            self.state = CalibrationState::Idle;
            debug!("scanning paused");
        }
    }

    /// Clear all detections and the transform. Safe from any state.
    ///
    /// Returns to scanning if input is still live, otherwise to idle.
    pub fn reset(&mut self) {
        self.session.clear();
        self.scan_started_at = None;
        self.stall_reported = false;
        self.state = CalibrationState::Idle;
        if self.active {
            self.begin();
        }
        info!("calibration reset");
    }

    /// One frame turn: sample the latest camera frame and try to decode it.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn tick(&mut self) -> ScanOutcome {
        if !self.sampler.is_active() {
            return ScanOutcome::Inactive;
        }
        let scanning = self.state == CalibrationState::Scanning;
        let decoded = match self.sampler.sample() {
            Some(frame) if scanning => Some(self.decoder.decode(&frame.image.view())),
            Some(_) => return ScanOutcome::Inactive,
            None => None,
        };
        let Some(code) = decoded else {
            return self.on_stream_ended();
        };
        self.stats.frames_processed += 1;
        self.finish_turn(code.as_ref())
    }

    /// Decode a frame supplied by the host.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "trace", skip(self, image), fields(width = image.width, height = image.height))
    )]
    pub fn process_frame(&mut self, image: &GrayImageView<'_>) -> ScanOutcome {
        if self.state != CalibrationState::Scanning {
            return ScanOutcome::Inactive;
        }
        self.stats.frames_processed += 1;
        let code = self.decoder.decode(image);
        self.finish_turn(code.as_ref())
    }

    /// Handle a code decoded by the host's own QR reader.
    pub fn process_code(&mut self, code: &QrCode) -> ScanOutcome {
        if self.state != CalibrationState::Scanning {
            return ScanOutcome::Inactive;
        }
        self.finish_turn(Some(code))
    }

    #[inline]
    pub fn state(&self) -> CalibrationState {
        self.state
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.session.is_complete()
    }

    #[inline]
    pub fn session(&self) -> &CalibrationSession {
        &self.session
    }

    pub fn progress(&self) -> Progress {
        Progress {
            detected: self.session.len(),
            required: self.session.required().len(),
        }
    }

    /// The marker the user should look for next.
    pub fn next_expected(&self) -> Option<MarkerId> {
        self.session.next_expected()
    }

    pub fn detected_markers(&self) -> &[DetectedMarker] {
        self.session.detected()
    }

    pub fn marker(&self, id: MarkerId) -> Option<&DetectedMarker> {
        self.session.get(id)
    }

    pub fn transform(&self) -> Option<&CourtTransform> {
        self.session.transform()
    }

    #[inline]
    pub fn registry(&self) -> &MarkerRegistry {
        &self.registry
    }

    #[inline]
    pub fn params(&self) -> &CoordinatorParams {
        &self.params
    }

    #[inline]
    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// True while a camera stream is held.
    pub fn is_streaming(&self) -> bool {
        self.sampler.is_active()
    }

    pub fn stats(&self) -> ScanStats {
        ScanStats {
            frames_sampled: self.sampler.frames_sampled(),
            ..self.stats.clone()
        }
    }

    pub fn snapshot(&self) -> CalibrationSnapshot {
        CalibrationSnapshot {
            state: self.state,
            progress: self.progress(),
            next_expected: self.next_expected(),
            markers: self.session.detected().to_vec(),
            transform: self.session.transform().copied(),
            registry: self.registry.specs().to_vec(),
            stats: self.stats(),
        }
    }

    fn finish_turn(&mut self, code: Option<&QrCode>) -> ScanOutcome {
        let outcome = match code {
            Some(code) => self.handle_code(code),
            None => ScanOutcome::NoCode,
        };
        self.check_stall();
        outcome
    }

    fn handle_code(&mut self, code: &QrCode) -> ScanOutcome {
        self.stats.codes_decoded += 1;

        let validated = match MarkerValidator::new(&self.registry).validate(
            &code.payload,
            code.corners,
            &self.session,
        ) {
            Ok(validated) => validated,
            Err(reject) => {
                match reject {
                    ValidationReject::Unknown { .. } => self.stats.rejected_unknown += 1,
                    ValidationReject::Duplicate(_) => self.stats.rejected_duplicate += 1,
                }
                return ScanOutcome::Rejected(reject);
            }
        };
        let marker_id = validated.spec.id;

        let pose = match self.pose.estimate(&validated.spec, &validated.corners) {
            Ok(pose) => pose,
            Err(err) => {
                warn!("discarding detection of {marker_id}: {err}");
                self.stats.discarded += 1;
                return ScanOutcome::Discarded(err);
            }
        };

        let now = self.clock.now();
        let marker = DetectedMarker {
            marker_id,
            detected_at: now,
            screen_center: pose.screen_center,
            corner_quad: validated.corners,
            estimated_distance: pose.estimated_distance,
            estimated_scale: pose.estimated_scale,
            world_position: pose.world_position,
        };

        match self.session.record(marker, build_court_transform) {
            Ok(RecordOutcome::Added { step }) => {
                self.confirmed(marker_id, step, pose, now);
                ScanOutcome::Confirmed { marker_id, step }
            }
            Ok(RecordOutcome::Completed { step }) => {
                self.confirmed(marker_id, step, pose, now);
                self.completed(now);
                ScanOutcome::Completed { marker_id, step }
            }
            Ok(RecordOutcome::Duplicate) => {
                self.stats.rejected_duplicate += 1;
                ScanOutcome::Rejected(ValidationReject::Duplicate(marker_id))
            }
            Ok(RecordOutcome::NotRequired) => {
                self.stats.rejected_unknown += 1;
                ScanOutcome::Rejected(ValidationReject::Unknown {
                    payload: code.payload.clone(),
                })
            }
            Err(err) => {
                error!("court transform failed: {err}");
                self.emit_error(&CalibrationError::Transform(err.clone()));
                ScanOutcome::Failed(err)
            }
        }
    }

    fn confirmed(&mut self, marker_id: MarkerId, step: usize, pose: PoseEstimate, now: Duration) {
        info!(
            "confirmed marker {marker_id} ({step}/{}), ~{:.2} m away",
            self.session.required().len(),
            pose.estimated_distance
        );
        self.last_progress_at = now;
        self.stall_reported = false;
        self.emit(CalibrationEvent::MarkerDetected {
            marker_id,
            step,
            pose,
        });
    }

    fn completed(&mut self, now: Duration) {
        let Some(transform) = self.session.transform().copied() else {
            return;
        };
        self.state = CalibrationState::Complete;
        let duration = now.saturating_sub(self.scan_started_at.unwrap_or(now));
        info!(
            "calibration complete in {:.1} s, yaw {:.1} deg",
            duration.as_secs_f64(),
            transform.yaw_radians().to_degrees()
        );
        self.emit(CalibrationEvent::CalibrationComplete {
            markers: self.session.detected().to_vec(),
            transform,
            duration,
        });
    }

    fn on_stream_ended(&mut self) -> ScanOutcome {
        self.active = false;
        if self.state == CalibrationState::Scanning {
            self.state = CalibrationState::Idle;
        }
        ScanOutcome::StreamEnded
    }

    fn check_stall(&mut self) {
        let Some(limit) = self.params.stall_after() else {
            return;
        };
        if self.state != CalibrationState::Scanning || self.stall_reported {
            return;
        }
        let waited = self.clock.now().saturating_sub(self.last_progress_at);
        if waited < limit {
            return;
        }
        self.stall_reported = true;
        let next_expected = self.next_expected();
        warn!(
            "no new marker for {:.1} s, still waiting for {:?}",
            waited.as_secs_f64(),
            next_expected
        );
        self.emit(CalibrationEvent::ScanStalled {
            waited,
            next_expected,
        });
    }

    fn emit_error(&mut self, err: &CalibrationError) {
        self.emit(CalibrationEvent::ErrorOccurred {
            error_type: err.error_type().to_string(),
            message: err.to_string(),
        });
    }

    fn emit(&mut self, event: CalibrationEvent) {
        for observer in &mut self.observers {
            observer.on_event(&event);
        }
    }
}

impl<D> std::fmt::Debug for CalibrationCoordinator<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalibrationCoordinator")
            .field("state", &self.state)
            .field("detected", &self.session.len())
            .field("sampler", &self.sampler)
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// The transform depends only on surveyed positions, so a registry that
/// cannot produce one is rejected up front.
fn check_registry_geometry(registry: &MarkerRegistry) -> Result<CourtTransform, TransformError> {
    let position = |id| registry.get(id).map(|spec| spec.world_position);
    match (
        position(MarkerId::Entrance),
        position(MarkerId::LeftHoop),
        position(MarkerId::RightHoop),
    ) {
        (Some(entrance), Some(left), Some(right)) => build_from_positions(entrance, left, right),
        _ => Err(TransformError::MissingMarkers {
            missing: MarkerId::ALL
                .into_iter()
                .filter(|id| registry.get(*id).is_none())
                .collect(),
        }),
    }
}
