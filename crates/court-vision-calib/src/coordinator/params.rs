use std::time::Duration;

use court_vision_markers::PoseParams;
use court_vision_qr::CameraRequest;
use serde::{Deserialize, Serialize};

/// Coordinator configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorParams {
    pub pose: PoseParams,
    pub camera: CameraRequest,
    /// Emit one `scan_stalled` event when no new marker was confirmed for
    /// this many milliseconds. `None` disables it.
    pub stall_after_ms: Option<u64>,
}

impl CoordinatorParams {
    pub fn stall_after(&self) -> Option<Duration> {
        self.stall_after_ms.map(Duration::from_millis)
    }
}
