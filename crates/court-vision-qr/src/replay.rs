//! In-memory [`VideoSource`] that replays a fixed list of frames.
//!
//! Used by the CLI (frames loaded from disk) and by tests. Frames are consumed
//! in order, one per `latest_frame` call; closing and reopening the source
//! continues where the previous stream stopped.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use court_vision_core::GrayImage;

use crate::sampler::{AcquireError, CameraRequest, Frame, FrameStream, VideoSource};

#[derive(Debug, Default)]
struct ReplayState {
    frames: VecDeque<GrayImage>,
    next_seq: u64,
    open: bool,
    releases: usize,
}

/// Replays frames from memory.
#[derive(Clone, Debug)]
pub struct ReplaySource {
    state: Rc<RefCell<ReplayState>>,
    failure: Option<AcquireError>,
}

impl ReplaySource {
    pub fn new(frames: impl IntoIterator<Item = GrayImage>) -> Self {
        Self {
            state: Rc::new(RefCell::new(ReplayState {
                frames: frames.into_iter().collect(),
                ..ReplayState::default()
            })),
            failure: None,
        }
    }

    /// A source whose every `open` fails with `err`.
    pub fn failing(err: AcquireError) -> Self {
        Self {
            failure: Some(err),
            ..Self::new(Vec::new())
        }
    }

    /// Frames not yet handed out.
    pub fn remaining(&self) -> usize {
        self.state.borrow().frames.len()
    }

    /// How many streams have been released so far.
    pub fn release_count(&self) -> usize {
        self.state.borrow().releases
    }
}

impl VideoSource for ReplaySource {
    fn open(&mut self, _request: &CameraRequest) -> Result<Box<dyn FrameStream>, AcquireError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        let mut state = self.state.borrow_mut();
        if state.open {
            return Err(AcquireError::AlreadyActive);
        }
        state.open = true;
        Ok(Box::new(ReplayStream {
            state: Rc::clone(&self.state),
            released: false,
        }))
    }
}

/// Stream handed out by [`ReplaySource`].
#[derive(Debug)]
pub struct ReplayStream {
    state: Rc<RefCell<ReplayState>>,
    released: bool,
}

impl FrameStream for ReplayStream {
    fn latest_frame(&mut self) -> Option<Frame> {
        if self.released {
            return None;
        }
        let mut state = self.state.borrow_mut();
        let image = state.frames.pop_front()?;
        let seq = state.next_seq;
        state.next_seq += 1;
        Some(Frame { seq, image })
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let mut state = self.state.borrow_mut();
        state.open = false;
        state.releases += 1;
    }
}
