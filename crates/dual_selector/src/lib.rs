//! # Dual Selector
//!
//! 双摄帧同步引擎：两路相机管线异步提交帧，按时间戳配对，
//! 为每对帧分配 sync id，再由规则表决定输出主摄、副摄、融合帧或丢弃。
//!
//! ## Flow
//! 1. 生产者 `submit(camera, frame)`：在对侧待匹配队列中寻找时间戳相近的帧
//! 2. 配对成功：双方进入已匹配队列，共享 sync id，向所有 notify 队列广播
//! 3. 消费者 `select_pair(camera)` / `select_single(camera)` 取出输出帧，
//!    未被选中一侧的缓冲区归还给它所属相机的 BufferManager
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use camera_sim::{MockFrame, MockParameters, PoolBufferManager};
//! use contracts::{CameraId, SelectorConfig, SelectorRole};
//! use dual_selector::DualFrameSelector;
//!
//! let selector = DualFrameSelector::new(SelectorConfig::for_role(SelectorRole::Preview));
//! selector.set_valid_camera_pair(CameraId::BACK, CameraId::BACK_1).unwrap();
//! for camera in [CameraId::BACK, CameraId::BACK_1] {
//!     let pool = Arc::new(PoolBufferManager::new(camera.to_string(), camera, 8));
//!     selector
//!         .set_info(camera, Arc::new(MockParameters::new()), pool, None)
//!         .unwrap();
//! }
//!
//! let master = MockFrame::builder(0).timestamp_ms(100).build();
//! let slave = MockFrame::builder(0).timestamp_ms(104).build();
//! selector.submit(CameraId::BACK, master, 0, false, None).unwrap();
//! selector.submit(CameraId::BACK_1, slave, 0, false, None).unwrap();
//!
//! let fused = selector.select_pair(CameraId::BACK).unwrap();
//! assert!(fused.is_some());
//! ```

mod matching;
mod notify;
mod policy;
mod queue;
mod selector;
mod state;
mod sync_obj;

pub use policy::{decide, PairTags};
pub use queue::SyncQueue;
pub use selector::{DualFrameSelector, QueueDepths};
pub use sync_obj::{SelectState, SyncObjKind, SyncObject};
