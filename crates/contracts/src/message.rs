//! SyncMessage - match notification
//!
//! Emitted once per matched pair to every registered notify queue.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{CameraId, FrameType, SyncType};

/// Bound of every notify queue and of the selector's message history.
pub const MESSAGE_MAX: usize = 32;

/// Match notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMessage {
    /// Camera whose submit completed the pair
    pub camera_id: CameraId,

    /// Sync id shared by both members of the pair
    pub sync_id: u32,

    /// Timestamp of the submitting frame (ms)
    pub timestamp_ms: i64,

    /// Zoom of the submitting frame
    pub zoom: i32,

    pub sync_type: SyncType,

    pub frame_type: FrameType,
}

impl fmt::Display for SyncMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} sync_id={} ts={}ms zoom={} {:?}/{:?}",
            self.camera_id,
            self.sync_id,
            self.timestamp_ms,
            self.zoom,
            self.sync_type,
            self.frame_type
        )
    }
}
