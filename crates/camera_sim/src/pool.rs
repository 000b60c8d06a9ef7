//! Fixed-capacity buffer pool

use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use contracts::{BufferManager, CameraBuffer, CameraId, ContractError};
use tracing::trace;

#[derive(Debug)]
struct PoolState {
    free: VecDeque<u32>,
    in_use: BTreeSet<u32>,
    /// Forces `available_buffer_count` to a fixed value
    available_override: Option<usize>,
}

/// Buffer pool backing one camera.
///
/// Rejects releases of buffers that are not checked out, so tests can catch
/// double releases and leaks.
#[derive(Debug)]
pub struct PoolBufferManager {
    name: String,
    owner: CameraId,
    capacity: usize,
    state: Mutex<PoolState>,
    released: AtomicU64,
}

impl PoolBufferManager {
    pub fn new(name: impl Into<String>, owner: CameraId, capacity: usize) -> Self {
        Self {
            name: name.into(),
            owner,
            capacity,
            state: Mutex::new(PoolState {
                free: (0..capacity as u32).collect(),
                in_use: BTreeSet::new(),
                available_override: None,
            }),
            released: AtomicU64::new(0),
        }
    }

    fn state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check out a free buffer.
    pub fn acquire(&self) -> Option<CameraBuffer> {
        let mut state = self.state();
        let index = state.free.pop_front()?;
        state.in_use.insert(index);
        trace!(pool = %self.name, index, "buffer acquired");
        Some(CameraBuffer {
            index,
            owner: self.owner,
        })
    }

    pub fn owner(&self) -> CameraId {
        self.owner
    }

    pub fn is_in_use(&self, index: u32) -> bool {
        self.state().in_use.contains(&index)
    }

    pub fn in_use_count(&self) -> usize {
        self.state().in_use.len()
    }

    /// Total successful releases.
    pub fn released_count(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }

    /// Pin the reported available count, `None` restores the real value.
    pub fn set_available_override(&self, available: Option<usize>) {
        self.state().available_override = available;
    }
}

impl BufferManager for PoolBufferManager {
    fn name(&self) -> &str {
        &self.name
    }

    fn available_buffer_count(&self) -> usize {
        let state = self.state();
        state.available_override.unwrap_or(state.free.len())
    }

    fn max_allowed_buffer_count(&self) -> usize {
        self.capacity
    }

    fn release_buffer(&self, index: u32) -> Result<(), ContractError> {
        let mut state = self.state();
        if !state.in_use.remove(&index) {
            return Err(ContractError::buffer_release(
                &self.name,
                index,
                "buffer is not checked out",
            ));
        }
        state.free.push_back(index);
        self.released.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("camera_sim_buffers_released_total", "pool" => self.name.clone())
            .increment(1);
        Ok(())
    }
}
