//! Camera parameter and peer selector contracts

use serde::{Deserialize, Serialize};
use std::fmt;

/// Dual standby mode of one camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DualStandbyMode {
    #[default]
    Inactive,
    /// Sensor stream stopped
    ActiveInSensor,
    /// Sensor streaming, post-processing stopped
    ActiveInPost,
    /// Standby requested, not yet applied
    ReadyForSensor,
}

impl DualStandbyMode {
    pub fn is_active(self) -> bool {
        matches!(
            self,
            DualStandbyMode::ActiveInSensor | DualStandbyMode::ActiveInPost
        )
    }
}

/// Read-only view of camera parameters
pub trait CameraParameters: Send + Sync + fmt::Debug {
    fn dual_standby_mode(&self) -> DualStandbyMode;

    /// False while the camera is still settling after leaving standby.
    fn is_stable_from_standby(&self) -> bool;

    /// True when frames from this camera cannot be paired right now.
    fn is_in_standby(&self) -> bool {
        self.dual_standby_mode().is_active() || !self.is_stable_from_standby()
    }
}

/// Single-camera hold-list selector that runs beside the dual selector
pub trait HoldListSelector: Send + Sync + fmt::Debug {
    fn hold_frame_count(&self) -> usize;
}
