//! Mock 相机参数与单摄 hold list

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use contracts::{CameraParameters, DualStandbyMode, HoldListSelector};

/// 可在运行时切换 standby 状态的相机参数
#[derive(Debug)]
pub struct MockParameters {
    standby: Mutex<DualStandbyMode>,
    stable: AtomicBool,
}

impl Default for MockParameters {
    fn default() -> Self {
        Self {
            standby: Mutex::new(DualStandbyMode::Inactive),
            stable: AtomicBool::new(true),
        }
    }
}

impl MockParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_standby(&self, mode: DualStandbyMode) {
        if let Ok(mut standby) = self.standby.lock() {
            *standby = mode;
        }
    }

    pub fn set_stable_from_standby(&self, stable: bool) {
        self.stable.store(stable, Ordering::SeqCst);
    }
}

impl CameraParameters for MockParameters {
    fn dual_standby_mode(&self) -> DualStandbyMode {
        self.standby
            .lock()
            .map(|mode| *mode)
            .unwrap_or(DualStandbyMode::Inactive)
    }

    fn is_stable_from_standby(&self) -> bool {
        self.stable.load(Ordering::SeqCst)
    }
}

/// 固定大小的单摄 hold list
#[derive(Debug, Default)]
pub struct FixedHoldList {
    count: AtomicUsize,
}

impl FixedHoldList {
    pub fn new(count: usize) -> Self {
        Self {
            count: AtomicUsize::new(count),
        }
    }

    pub fn set(&self, count: usize) {
        self.count.store(count, Ordering::Relaxed);
    }
}

impl HoldListSelector for FixedHoldList {
    fn hold_frame_count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }
}
