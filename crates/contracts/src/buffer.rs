//! BufferManager - buffer pool contract
//!
//! The selector never allocates buffers. It reads pool pressure to size the
//! pending queue and hands back buffers of frames it discards.

use std::fmt;

use crate::ContractError;

/// Per-camera buffer pool.
pub trait BufferManager: Send + Sync + fmt::Debug {
    /// Pool name for logs.
    fn name(&self) -> &str;

    /// Buffers currently free for the producer.
    fn available_buffer_count(&self) -> usize;

    /// Upper bound on buffers the pool may hand out.
    fn max_allowed_buffer_count(&self) -> usize;

    /// Return a buffer to the pool.
    fn release_buffer(&self, index: u32) -> Result<(), ContractError>;
}
