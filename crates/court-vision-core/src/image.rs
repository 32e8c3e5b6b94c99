/// Errors raised when wrapping raw pixel buffers.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("invalid frame buffer length (expected {expected} bytes, got {got})")]
    InvalidBuffer { expected: usize, got: usize },

    #[error("invalid frame dimensions (width={width}, height={height})")]
    InvalidDimensions { width: usize, height: usize },
}

#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

impl<'a> GrayImageView<'a> {
    /// Wrap a row-major 8-bit buffer, checking that it covers `width * height` pixels.
    pub fn new(width: usize, height: usize, data: &'a [u8]) -> Result<Self, FrameError> {
        let expected = checked_area(width, height)?;
        if data.len() != expected {
            return Err(FrameError::InvalidBuffer {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    /// Take ownership of a row-major 8-bit buffer.
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Result<Self, FrameError> {
        GrayImageView::new(width, height, &data)?;
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A uniform image, mostly useful for tests and blank frames.
    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    #[inline]
    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }
}

fn checked_area(width: usize, height: usize) -> Result<usize, FrameError> {
    if width == 0 || height == 0 {
        return Err(FrameError::InvalidDimensions { width, height });
    }
    width
        .checked_mul(height)
        .ok_or(FrameError::InvalidDimensions { width, height })
}

/// Convert an interleaved RGBA8 buffer (canvas `ImageData` layout) to 8-bit luma.
///
/// Uses the BT.601 weights in 8-bit fixed point; alpha is ignored.
pub fn rgba_to_gray(rgba: &[u8], width: usize, height: usize) -> Result<GrayImage, FrameError> {
    let area = checked_area(width, height)?;
    let expected = area
        .checked_mul(4)
        .ok_or(FrameError::InvalidDimensions { width, height })?;
    if rgba.len() != expected {
        return Err(FrameError::InvalidBuffer {
            expected,
            got: rgba.len(),
        });
    }

    let data = rgba
        .chunks_exact(4)
        .map(|px| {
            let r = px[0] as u32;
            let g = px[1] as u32;
            let b = px[2] as u32;
            ((77 * r + 150 * g + 29 * b + 128) >> 8) as u8
        })
        .collect();

    Ok(GrayImage {
        width,
        height,
        data,
    })
}
