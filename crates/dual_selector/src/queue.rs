//! Per-camera FIFO of sync objects.
//!
//! The queue only reorders and removes entries. Evicted entries are handed
//! back to the caller, which owns buffer release and removal notification.

use std::collections::VecDeque;
use std::fmt;

use contracts::ContractError;

use crate::sync_obj::{SelectState, SyncObject};

/// Pending or matched queue of one camera.
#[derive(Default)]
pub struct SyncQueue {
    entries: VecDeque<SyncObject>,
    out_of_order_count: u64,
    last_timestamp: Option<i64>,
}

impl fmt::Debug for SyncQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncQueue")
            .field("len", &self.entries.len())
            .field("out_of_order", &self.out_of_order_count)
            .finish()
    }
}

impl SyncQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append at the back. Arrivals older than the previous push are counted
    /// but still appended.
    #[inline]
    pub fn push(&mut self, obj: SyncObject) {
        let timestamp = obj.timestamp_ms();
        if self.last_timestamp.is_some_and(|last| timestamp < last) {
            self.out_of_order_count += 1;
        }
        self.last_timestamp = Some(timestamp);
        self.entries.push_back(obj);
    }

    #[inline]
    pub fn pop_front(&mut self) -> Option<SyncObject> {
        self.entries.pop_front()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SyncObject> {
        self.entries.iter()
    }

    #[inline]
    pub fn out_of_order_count(&self) -> u64 {
        self.out_of_order_count
    }

    /// Move out the first entry satisfying `pred`, keeping the rest in order.
    pub fn take_first(&mut self, mut pred: impl FnMut(&SyncObject) -> bool) -> Option<SyncObject> {
        let index = self.entries.iter().position(|obj| pred(obj))?;
        self.entries.remove(index)
    }

    pub fn position_by_state(&self, state: SelectState) -> Option<usize> {
        self.entries
            .iter()
            .position(|obj| obj.select_state() == state)
    }

    pub fn position_by_sync_id(&self, sync_id: u32) -> Option<usize> {
        self.entries
            .iter()
            .position(|obj| obj.sync_id() == Some(sync_id))
    }

    pub fn get(&self, index: usize) -> Option<&SyncObject> {
        self.entries.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut SyncObject> {
        self.entries.get_mut(index)
    }

    pub fn remove_by_sync_id(&mut self, sync_id: u32) -> Result<SyncObject, ContractError> {
        self.position_by_sync_id(sync_id)
            .and_then(|index| self.entries.remove(index))
            .ok_or_else(|| ContractError::not_enough_data(format!("sync id {sync_id} not queued")))
    }

    /// Remove `NotSelected` entries from the front until at most `max_len`
    /// remain. Selected and WillBeSelected entries are skipped, so the queue
    /// can stay above `max_len`.
    pub fn evict_to_len(&mut self, max_len: usize) -> Vec<SyncObject> {
        let mut evicted = Vec::new();
        let mut index = 0;
        while self.entries.len() > max_len && index < self.entries.len() {
            if self.entries[index].select_state() == SelectState::NotSelected {
                if let Some(obj) = self.entries.remove(index) {
                    evicted.push(obj);
                }
            } else {
                index += 1;
            }
        }
        evicted
    }

    /// Remove `NotSelected` entries from the front whose timestamp is at most
    /// `timestamp_ms`, stopping at the first newer entry.
    pub fn evict_up_to(&mut self, timestamp_ms: i64) -> Vec<SyncObject> {
        let mut evicted = Vec::new();
        let mut index = 0;
        while let Some(obj) = self.entries.get(index) {
            if obj.timestamp_ms() > timestamp_ms {
                break;
            }
            if obj.select_state() == SelectState::NotSelected {
                if let Some(obj) = self.entries.remove(index) {
                    evicted.push(obj);
                }
            } else {
                index += 1;
            }
        }
        evicted
    }

    pub fn drain_all(&mut self) -> Vec<SyncObject> {
        self.last_timestamp = None;
        self.entries.drain(..).collect()
    }
}
