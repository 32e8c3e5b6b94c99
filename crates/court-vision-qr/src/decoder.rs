//! Single-frame QR decoding.

use court_vision_core::{GrayImageView, Quad};
use log::debug;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// One decoded QR code: its text payload and the image-space corner quad.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QrCode {
    pub payload: String,
    /// Corners ordered TL, TR, BR, BL relative to the code's own orientation.
    pub corners: Quad,
}

/// A pure single-frame decoder: `decode(pixels) -> code | none`.
///
/// "No code in frame" and "code found but unreadable" both map to `None`;
/// neither is an error for the calibration flow.
pub trait QrDecoder {
    fn decode(&self, image: &GrayImageView<'_>) -> Option<QrCode>;
}

impl<F> QrDecoder for F
where
    F: Fn(&GrayImageView<'_>) -> Option<QrCode>,
{
    fn decode(&self, image: &GrayImageView<'_>) -> Option<QrCode> {
        self(image)
    }
}

/// Settings for [`RqrrDecoder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RqrrParams {
    /// Maximum number of candidate grids to try per frame.
    pub max_grids: usize,
    /// Optional fixed binarization threshold (`pixel < threshold` is dark).
    ///
    /// `None` lets rqrr pick its own adaptive threshold.
    pub binarize_threshold: Option<u8>,
}

impl Default for RqrrParams {
    fn default() -> Self {
        Self {
            max_grids: 4,
            binarize_threshold: None,
        }
    }
}

/// [`QrDecoder`] backed by the pure-Rust `rqrr` crate.
#[derive(Clone, Debug, Default)]
pub struct RqrrDecoder {
    params: RqrrParams,
}

impl RqrrDecoder {
    pub fn new(params: RqrrParams) -> Self {
        Self { params }
    }

    #[inline]
    pub fn params(&self) -> &RqrrParams {
        &self.params
    }
}

impl QrDecoder for RqrrDecoder {
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, image), fields(width = image.width, height = image.height))
    )]
    fn decode(&self, image: &GrayImageView<'_>) -> Option<QrCode> {
        if image.width == 0 || image.height == 0 {
            return None;
        }

        let threshold = self.params.binarize_threshold;
        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(image.width, image.height, |x, y| {
                let v = image.get(x, y);
                match threshold {
                    Some(t) if v < t => 0,
                    Some(_) => 255,
                    None => v,
                }
            });
        let grids = prepared.detect_grids();

        for grid in grids.iter().take(self.params.max_grids.max(1)) {
            match grid.decode() {
                Ok((_, payload)) => {
                    return Some(QrCode {
                        payload,
                        corners: quad_from_bounds(&grid.bounds),
                    });
                }
                Err(err) => debug!("qr grid found but not decodable: {err:?}"),
            }
        }
        None
    }
}

fn quad_from_bounds(bounds: &[rqrr::Point; 4]) -> Quad {
    let p = |i: usize| Point2::new(bounds[i].x as f32, bounds[i].y as f32);
    Quad::new(p(0), p(1), p(2), p(3))
}

#[cfg(test)]
mod tests {
    use super::*;
    use court_vision_core::GrayImage;

    #[test]
    fn blank_frame_has_no_code() {
        let img = GrayImage::filled(64, 48, 255);
        assert!(RqrrDecoder::default().decode(&img.view()).is_none());
    }

    #[test]
    fn thresholded_blank_frame_has_no_code() {
        let img = GrayImage::filled(64, 48, 0);
        let decoder = RqrrDecoder::new(RqrrParams {
            binarize_threshold: Some(128),
            ..RqrrParams::default()
        });
        assert!(decoder.decode(&img.view()).is_none());
    }

    fn fixed_left(_: &GrayImageView<'_>) -> Option<QrCode> {
        Some(QrCode {
            payload: "left".to_string(),
            corners: Quad::from_flat(&[0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0])?,
        })
    }

    #[test]
    fn plain_functions_act_as_decoders() {
        let img = GrayImage::filled(2, 2, 0);
        let code = fixed_left.decode(&img.view()).expect("code");
        assert_eq!(code.payload, "left");
    }

    #[test]
    fn bounds_map_in_order() {
        let bounds = [
            rqrr::Point { x: 1, y: 2 },
            rqrr::Point { x: 11, y: 2 },
            rqrr::Point { x: 11, y: 12 },
            rqrr::Point { x: 1, y: 12 },
        ];
        let q = quad_from_bounds(&bounds);
        assert_eq!(q.top_left, Point2::new(1.0, 2.0));
        assert_eq!(q.bottom_right, Point2::new(11.0, 12.0));
        assert_eq!(q.bottom_left, Point2::new(1.0, 12.0));
    }
}
