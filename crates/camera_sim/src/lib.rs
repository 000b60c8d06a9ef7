//! # Camera Sim
//!
//! 双摄选择器的协作方模拟实现，用于测试与 CLI 演示：
//!
//! - [`MockFrame`]：内部可变的管线帧
//! - [`PoolBufferManager`]：固定容量缓冲池，检测重复释放
//! - [`MockParameters`]：可切换 standby 状态的相机参数
//! - [`MockCameraSource`]：按帧率产生带抖动时间戳的帧流

mod frame;
mod params;
mod pool;
mod source;

pub use frame::{MockFrame, MockFrameBuilder};
pub use params::{FixedHoldList, MockParameters};
pub use pool::PoolBufferManager;
pub use source::{MockCameraConfig, MockCameraSource, SourceMetrics, SourceMetricsSnapshot};
