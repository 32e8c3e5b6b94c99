//! Frame sampling and QR decoding.
//!
//! This crate focuses on:
//! - pulling the latest frame from a camera-like [`VideoSource`] once per display frame,
//! - turning a grayscale frame into at most one decoded [`QrCode`] (payload + corner quad).
//!
//! It does **not** know which payloads are meaningful; validation against the
//! surveyed markers lives in `court-vision-markers`.

mod decoder;
mod replay;
mod sampler;

pub use decoder::{QrCode, QrDecoder, RqrrDecoder, RqrrParams};
pub use replay::{ReplaySource, ReplayStream};
pub use sampler::{
    AcquireError, CameraFacing, CameraRequest, Frame, FrameSampler, FrameStream, SamplerState,
    VideoSource,
};
