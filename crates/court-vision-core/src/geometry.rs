use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Four image-space corners of a detected code, ordered TL, TR, BR, BL.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    pub top_left: Point2<f32>,
    pub top_right: Point2<f32>,
    pub bottom_right: Point2<f32>,
    pub bottom_left: Point2<f32>,
}

impl Quad {
    pub fn new(
        top_left: Point2<f32>,
        top_right: Point2<f32>,
        bottom_right: Point2<f32>,
        bottom_left: Point2<f32>,
    ) -> Self {
        Self {
            top_left,
            top_right,
            bottom_right,
            bottom_left,
        }
    }

    /// Build from `[TL, TR, BR, BL]`.
    pub fn from_corners(c: [Point2<f32>; 4]) -> Self {
        Self::new(c[0], c[1], c[2], c[3])
    }

    /// Build from eight interleaved coordinates `x0, y0, ..., x3, y3` (TL, TR, BR, BL).
    pub fn from_flat(xy: &[f32]) -> Option<Self> {
        if xy.len() != 8 {
            return None;
        }
        Some(Self::new(
            Point2::new(xy[0], xy[1]),
            Point2::new(xy[2], xy[3]),
            Point2::new(xy[4], xy[5]),
            Point2::new(xy[6], xy[7]),
        ))
    }

    #[inline]
    pub fn corners(&self) -> [Point2<f32>; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    /// Arithmetic mean of the four corners.
    pub fn center(&self) -> Point2<f32> {
        let (sx, sy) = self
            .corners()
            .iter()
            .fold((0.0f32, 0.0f32), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point2::new(sx / 4.0, sy / 4.0)
    }

    /// Horizontal pixel span of the top edge (`|TR.x - TL.x|`).
    #[inline]
    pub fn width(&self) -> f32 {
        (self.top_right.x - self.top_left.x).abs()
    }

    /// Vertical pixel span of the left edge (`|BL.y - TL.y|`).
    #[inline]
    pub fn height(&self) -> f32 {
        (self.bottom_left.y - self.top_left.y).abs()
    }

    /// Mean of [`Quad::width`] and [`Quad::height`].
    #[inline]
    pub fn mean_side(&self) -> f32 {
        (self.width() + self.height()) * 0.5
    }

    pub fn is_finite(&self) -> bool {
        self.corners()
            .iter()
            .all(|p| p.x.is_finite() && p.y.is_finite())
    }
}
