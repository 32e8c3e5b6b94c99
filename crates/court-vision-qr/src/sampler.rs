//! Camera acquisition and per-display-frame sampling.

use court_vision_core::GrayImage;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Which physical camera to ask for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraFacing {
    /// Rear camera, pointing away from the user.
    #[default]
    Environment,
    User,
}

/// Camera request. Resolution is a hint; the platform may deliver something else.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraRequest {
    pub facing: CameraFacing,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl Default for CameraRequest {
    fn default() -> Self {
        Self {
            facing: CameraFacing::Environment,
            ideal_width: 1280,
            ideal_height: 720,
        }
    }
}

/// Camera acquisition failures. These are user-actionable and never mean
/// "no marker in view".
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquireError {
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("no camera available")]
    NoCamera,
    #[error("camera stream already active")]
    AlreadyActive,
    #[error("camera device error: {0}")]
    Device(String),
}

/// One sampled camera frame.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Monotonic frame counter assigned by the stream.
    pub seq: u64,
    pub image: GrayImage,
}

/// A camera-like producer of frames.
pub trait VideoSource {
    /// Acquire the device. Exactly one open stream may exist per source.
    fn open(&mut self, request: &CameraRequest) -> Result<Box<dyn FrameStream>, AcquireError>;
}

/// A live stream handed out by a [`VideoSource`].
pub trait FrameStream {
    /// Most recent frame, or `None` once the stream has ended.
    ///
    /// Must not block; a stream that has not produced anything new may hand
    /// back its last frame again.
    fn latest_frame(&mut self) -> Option<Frame>;

    /// Release the underlying device. Called at most once by the sampler.
    fn release(&mut self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplerState {
    Idle,
    Streaming,
    Ended,
}

/// Exposes the latest camera frame as a decodable buffer.
///
/// Frames are pulled on demand, once per display refresh, so there is never
/// a backlog: a frame that was not sampled in time is simply skipped.
#[derive(Default)]
pub struct FrameSampler {
    stream: Option<Box<dyn FrameStream>>,
    current: Option<Frame>,
    ended: bool,
    frames_sampled: u64,
}

impl FrameSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a stream from `source`.
    ///
    /// Fails fast with [`AcquireError::AlreadyActive`] if a stream is already held.
    pub fn start(
        &mut self,
        source: &mut dyn VideoSource,
        request: &CameraRequest,
    ) -> Result<(), AcquireError> {
        if self.stream.is_some() {
            return Err(AcquireError::AlreadyActive);
        }
        let stream = source.open(request)?;
        info!(
            "camera stream acquired ({:?}, ideal {}x{})",
            request.facing, request.ideal_width, request.ideal_height
        );
        self.stream = Some(stream);
        self.current = None;
        self.ended = false;
        Ok(())
    }

    /// Pull the latest frame from the stream and make it current.
    ///
    /// Returns `None` when not started or once the stream has ended; an ended
    /// stream is released immediately.
    pub fn sample(&mut self) -> Option<&Frame> {
        let stream = self.stream.as_mut()?;
        match stream.latest_frame() {
            Some(frame) => {
                self.frames_sampled += 1;
                self.current = Some(frame);
                self.current.as_ref()
            }
            None => {
                warn!("camera stream ended");
                self.release_stream();
                self.ended = true;
                None
            }
        }
    }

    /// The frame produced by the last [`FrameSampler::sample`] call.
    pub fn current_frame(&self) -> Option<&Frame> {
        if self.stream.is_none() {
            return None;
        }
        self.current.as_ref()
    }

    /// Stop sampling and release the camera. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if self.release_stream() {
            debug!("camera stream released");
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    pub fn state(&self) -> SamplerState {
        if self.stream.is_some() {
            SamplerState::Streaming
        } else if self.ended {
            SamplerState::Ended
        } else {
            SamplerState::Idle
        }
    }

    #[inline]
    pub fn frames_sampled(&self) -> u64 {
        self.frames_sampled
    }

    fn release_stream(&mut self) -> bool {
        self.current = None;
        match self.stream.take() {
            Some(mut stream) => {
                stream.release();
                true
            }
            None => false,
        }
    }
}

impl Drop for FrameSampler {
    fn drop(&mut self) {
        self.release_stream();
    }
}

impl std::fmt::Debug for FrameSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSampler")
            .field("state", &self.state())
            .field("frames_sampled", &self.frames_sampled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReplaySource;

    fn frames(n: usize) -> Vec<GrayImage> {
        (0..n).map(|i| GrayImage::filled(4, 4, i as u8)).collect()
    }

    #[test]
    fn not_started_has_no_frame() {
        let mut sampler = FrameSampler::new();
        assert!(sampler.sample().is_none());
        assert!(sampler.current_frame().is_none());
        assert_eq!(sampler.state(), SamplerState::Idle);
    }

    #[test]
    fn samples_until_stream_ends() {
        let mut source = ReplaySource::new(frames(2));
        let mut sampler = FrameSampler::new();
        sampler
            .start(&mut source, &CameraRequest::default())
            .expect("start");

        assert_eq!(sampler.sample().map(|f| f.seq), Some(0));
        assert_eq!(sampler.sample().map(|f| f.seq), Some(1));
        assert_eq!(sampler.current_frame().map(|f| f.image.data[0]), Some(1));
        assert!(sampler.sample().is_none());
        assert_eq!(sampler.state(), SamplerState::Ended);
        assert!(sampler.current_frame().is_none());
        assert_eq!(source.release_count(), 1);
    }

    #[test]
    fn second_start_fails_fast() {
        let mut source = ReplaySource::new(frames(1));
        let mut sampler = FrameSampler::new();
        sampler
            .start(&mut source, &CameraRequest::default())
            .expect("start");
        let err = sampler
            .start(&mut source, &CameraRequest::default())
            .unwrap_err();
        assert_eq!(err, AcquireError::AlreadyActive);
    }

    #[test]
    fn stop_is_idempotent_and_releases_once() {
        let mut source = ReplaySource::new(frames(3));
        let mut sampler = FrameSampler::new();
        sampler
            .start(&mut source, &CameraRequest::default())
            .expect("start");
        sampler.stop();
        sampler.stop();
        assert!(!sampler.is_active());
        assert_eq!(source.release_count(), 1);
    }

    #[test]
    fn acquisition_error_is_surfaced() {
        let mut source = ReplaySource::failing(AcquireError::PermissionDenied);
        let mut sampler = FrameSampler::new();
        let err = sampler
            .start(&mut source, &CameraRequest::default())
            .unwrap_err();
        assert_eq!(err, AcquireError::PermissionDenied);
        assert_eq!(sampler.state(), SamplerState::Idle);
    }
}
