//! Core types shared by the court-vision calibration crates.
//!
//! This crate is intentionally small: grayscale image views, the four-corner
//! quad returned by a QR decoder, and logger setup. It does not depend on any
//! concrete QR decoder or camera API.

mod geometry;
mod image;
mod logger;

pub use geometry::Quad;
pub use image::{rgba_to_gray, FrameError, GrayImage, GrayImageView};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_filter, init_with_level, LogFilter};
