//! # Contracts
//!
//! Frozen interface contracts (ICD) of the dual-camera frame selector: the
//! collaborator traits the selector consumes (frames, buffer managers, camera
//! parameters), the shared value types, and the selector configuration.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Frames carry the sensor capture timestamp in nanoseconds
//! - The selector matches on milliseconds (`timestamp_ns / 1_000_000`)

mod buffer;
mod camera_id;
mod error;
mod frame;
mod message;
mod outcome;
mod params;
mod selector_config;

pub use buffer::*;
pub use camera_id::{CameraId, CAMERA_ID_MAX};
pub use error::*;
pub use frame::*;
pub use message::*;
pub use outcome::*;
pub use params::*;
pub use selector_config::*;
