//! Image files as a [`VideoSource`].

use std::fs;
use std::path::{Path, PathBuf};

use court_vision_core::{FrameError, GrayImage};
use court_vision_qr::{AcquireError, CameraRequest, FrameStream, ReplaySource, VideoSource};
use log::{debug, info};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// File extensions picked up by [`ImageSequenceSource::from_dir`].
pub const FRAME_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "pgm", "webp"];

#[derive(thiserror::Error, Debug)]
pub enum FrameSourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("no image frames found in {0}")]
    Empty(PathBuf),
}

/// Replays image files in order, one per frame, as if they came from a camera.
///
/// All frames are decoded to grayscale up front.
#[derive(Clone, Debug)]
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    replay: ReplaySource,
}

impl ImageSequenceSource {
    /// Load every image in `dir`, sorted by file name.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, FrameSourceError> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir).map_err(|source| FrameSourceError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|source| FrameSourceError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?
                .path();
            if path.is_file() && has_frame_extension(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        if paths.is_empty() {
            return Err(FrameSourceError::Empty(dir.to_path_buf()));
        }
        Self::from_paths(paths)
    }

    /// Load the given images in order.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(paths)))]
    pub fn from_paths(paths: Vec<PathBuf>) -> Result<Self, FrameSourceError> {
        let frames = paths
            .iter()
            .map(|p| load_gray(p))
            .collect::<Result<Vec<_>, _>>()?;
        info!("loaded {} frames", frames.len());
        Ok(Self {
            paths,
            replay: ReplaySource::new(frames),
        })
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Frames not yet handed out to a stream.
    pub fn remaining(&self) -> usize {
        self.replay.remaining()
    }
}

impl VideoSource for ImageSequenceSource {
    fn open(&mut self, request: &CameraRequest) -> Result<Box<dyn FrameStream>, AcquireError> {
        self.replay.open(request)
    }
}

fn has_frame_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Decode an image file into the core grayscale type.
pub fn load_gray(path: &Path) -> Result<GrayImage, FrameSourceError> {
    let img = image::open(path)
        .map_err(|source| FrameSourceError::Decode {
            path: path.to_path_buf(),
            source,
        })?
        .to_luma8();
    let (width, height) = img.dimensions();
    debug!("{}: {width}x{height}", path.display());
    Ok(GrayImage::from_raw(
        width as usize,
        height as usize,
        img.into_raw(),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(path: &Path, value: u8) {
        image::GrayImage::from_pixel(6, 4, image::Luma([value]))
            .save(path)
            .expect("write png");
    }

    #[test]
    fn frames_are_sorted_and_filtered() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_png(&dir.path().join("b.png"), 20);
        write_png(&dir.path().join("a.png"), 10);
        fs::write(dir.path().join("notes.txt"), "skip me").expect("write");

        let mut source = ImageSequenceSource::from_dir(dir.path()).expect("source");
        assert_eq!(source.len(), 2);
        assert!(source.paths()[0].ends_with("a.png"));

        let mut stream = source.open(&CameraRequest::default()).expect("open");
        let first = stream.latest_frame().expect("frame");
        assert_eq!((first.image.width, first.image.height), (6, 4));
        assert_eq!(first.image.data[0], 10);
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            ImageSequenceSource::from_dir(dir.path()),
            Err(FrameSourceError::Empty(_))
        ));
    }

    #[test]
    fn corrupt_image_reports_its_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let bad = dir.path().join("bad.png");
        fs::write(&bad, b"not a png").expect("write");
        let err = ImageSequenceSource::from_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains("bad.png"));
    }
}
