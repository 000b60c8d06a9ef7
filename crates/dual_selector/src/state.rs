//! Selector session state and the helpers shared by matching and selection.
//!
//! Everything here runs under the selector's lock.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use contracts::{
    BufferManager, CameraId, CameraParameters, ContractError, EvictionReason, FrameType,
    HoldListSelector, SelectorConfig, SyncType,
};
use observability::{
    record_buffer_release_failure, record_consistency_violation, record_eviction,
    record_queue_depth,
};
use tracing::{debug, error, trace, warn};

use crate::notify::NotificationChannels;
use crate::queue::SyncQueue;
use crate::sync_obj::SyncObject;

/// Registration of one camera.
pub(crate) struct CameraSlot {
    pub(crate) params: Arc<dyn CameraParameters>,
    pub(crate) buffer_manager: Arc<dyn BufferManager>,
    pub(crate) peer: Option<Arc<dyn HoldListSelector>>,
    pub(crate) pending: SyncQueue,
    pub(crate) matched: SyncQueue,
}

pub(crate) struct SelectorState {
    pub(crate) config: SelectorConfig,
    pub(crate) slots: BTreeMap<CameraId, CameraSlot>,
    /// Declared (master, slave)
    pub(crate) pair: Option<(CameraId, CameraId)>,
    pub(crate) next_sync_id: u32,
    pub(crate) hold_count: usize,
    pub(crate) prepare_hold_count: usize,
    pub(crate) prevent_drop: bool,
    pub(crate) last_sync_type: SyncType,
    /// Timestamp of the last completed match
    pub(crate) last_timestamp_ms: Option<i64>,
    pub(crate) channels: NotificationChannels,
}

impl SelectorState {
    pub(crate) fn new(config: SelectorConfig) -> Self {
        Self {
            hold_count: config.hold_count,
            prepare_hold_count: config.prepare_hold_count,
            prevent_drop: config.prevent_drop,
            config,
            slots: BTreeMap::new(),
            pair: None,
            next_sync_id: 0,
            last_sync_type: SyncType::Base,
            last_timestamp_ms: None,
            channels: NotificationChannels::new(),
        }
    }

    #[inline]
    pub(crate) fn name(&self) -> &str {
        &self.config.name
    }

    pub(crate) fn is_registered(&self, camera: CameraId) -> bool {
        self.slots.contains_key(&camera)
    }

    pub(crate) fn require_registered(&self, camera: CameraId) -> Result<(), ContractError> {
        if self.is_registered(camera) {
            Ok(())
        } else {
            Err(ContractError::invalid_operation(format!(
                "{camera} is not registered"
            )))
        }
    }

    /// The other member of the declared pair when registered, otherwise the
    /// other registered camera.
    pub(crate) fn opposite(&self, camera: CameraId) -> Option<CameraId> {
        let declared = self.pair.and_then(|(master, slave)| {
            if camera == master {
                Some(slave)
            } else if camera == slave {
                Some(master)
            } else {
                None
            }
        });

        declared
            .filter(|other| self.slots.contains_key(other))
            .or_else(|| self.slots.keys().copied().find(|&id| id != camera))
    }

    /// Declared master, or the lowest registered camera.
    pub(crate) fn master(&self) -> Option<CameraId> {
        self.pair
            .map(|(master, _)| master)
            .or_else(|| self.slots.keys().next().copied())
    }

    pub(crate) fn slot_mut(&mut self, camera: CameraId) -> Option<&mut CameraSlot> {
        self.slots.get_mut(&camera)
    }

    /// Release the entry's buffer to its owner's manager.
    ///
    /// Dummies carry no buffer, internal frames may not. Failures are logged
    /// and counted; the caller still drops the entry.
    pub(crate) fn release_buffer(&self, obj: &SyncObject) -> bool {
        if obj.is_dummy() {
            return false;
        }

        let buffer = match obj.buffer() {
            Ok(buffer) => buffer,
            Err(_) if obj.frame_type() == FrameType::Internal => {
                trace!(entry = %obj, "internal frame without buffer");
                return false;
            }
            Err(e) => {
                warn!(entry = %obj, error = %e, "no buffer to release");
                record_buffer_release_failure(self.name(), obj.camera_id());
                return false;
            }
        };

        let Some(slot) = self.slots.get(&buffer.owner) else {
            warn!(entry = %obj, %buffer, "buffer owner is not registered");
            record_buffer_release_failure(self.name(), obj.camera_id());
            return false;
        };

        match slot.buffer_manager.release_buffer(buffer.index) {
            Ok(()) => {
                trace!(%buffer, manager = slot.buffer_manager.name(), "buffer released");
                true
            }
            Err(e) => {
                error!(entry = %obj, error = %e, "buffer release failed");
                record_buffer_release_failure(self.name(), obj.camera_id());
                false
            }
        }
    }

    /// Release the buffer and, when `notify`, hand the frame to the camera's
    /// removal queue.
    pub(crate) fn discard(&self, obj: SyncObject, notify: bool) {
        self.release_buffer(&obj);
        let camera = obj.camera_id();
        if notify {
            if let Some(frame) = obj.into_frame() {
                self.channels.notify_removal(camera, frame);
            }
        }
    }

    /// Discard an entry that left its queue without being selected. The
    /// frame always goes to its camera's removal queue.
    pub(crate) fn evict(&self, obj: SyncObject, reason: EvictionReason) {
        if self.config.trace_removal {
            warn!(entry = %obj, reason = reason.label(), "sync object removed");
        } else {
            debug!(entry = %obj, reason = reason.label(), "sync object removed");
        }
        record_eviction(self.name(), obj.camera_id(), reason);
        self.discard(obj, true);
    }

    pub(crate) fn evict_all(&self, objs: Vec<SyncObject>, reason: EvictionReason) -> usize {
        let count = objs.len();
        for obj in objs {
            self.evict(obj, reason);
        }
        count
    }

    pub(crate) fn flush_pending(&mut self, camera: CameraId) {
        let drained = self
            .slot_mut(camera)
            .map(|slot| slot.pending.drain_all())
            .unwrap_or_default();
        self.evict_all(drained, EvictionReason::Flush);
    }

    pub(crate) fn flush_matched_queue(&mut self, camera: CameraId) {
        let drained = self
            .slot_mut(camera)
            .map(|slot| slot.matched.drain_all())
            .unwrap_or_default();
        self.evict_all(drained, EvictionReason::Flush);
    }

    /// Drain all channels, then clear every queue of every camera. The
    /// removal queues end up holding exactly the flushed frames.
    pub(crate) fn flush_everything(&mut self) {
        self.channels.drain_all();
        let cameras: Vec<CameraId> = self.slots.keys().copied().collect();
        for camera in cameras {
            self.flush_pending(camera);
            self.flush_matched_queue(camera);
        }
    }

    /// Build a `ConsistencyViolation`, flushing every queue first when the
    /// selector is configured to recover.
    pub(crate) fn violation(&mut self, camera: CameraId, message: String) -> ContractError {
        let dump = self.dump(camera);
        error!(%message, "consistency violation\n{dump}");
        record_consistency_violation(self.name());

        if self.config.recover_on_violation {
            self.flush_everything();
            warn!("all queues flushed after consistency violation");
        }
        ContractError::consistency(self.name(), message, dump)
    }

    /// Matched queues of `camera` and its opposite must be the same length.
    pub(crate) fn check_parity(&mut self, camera: CameraId, other: CameraId) -> Result<(), ContractError> {
        let own = self.slots.get(&camera).map_or(0, |slot| slot.matched.len());
        let opposite = self.slots.get(&other).map_or(0, |slot| slot.matched.len());
        if own == opposite {
            Ok(())
        } else {
            Err(self.violation(
                camera,
                format!("matched queue size mismatch: {camera}={own} {other}={opposite}"),
            ))
        }
    }

    pub(crate) fn record_depths(&self, camera: CameraId) {
        if let Some(slot) = self.slots.get(&camera) {
            record_queue_depth(self.name(), camera, slot.pending.len(), slot.matched.len());
        }
    }

    /// Back to the state of a fresh selector, keeping the channels of nobody.
    pub(crate) fn reset_session(&mut self) {
        self.next_sync_id = 0;
        self.hold_count = self.config.hold_count;
        self.prepare_hold_count = self.config.prepare_hold_count;
        self.prevent_drop = self.config.prevent_drop;
        self.last_sync_type = SyncType::Base;
        self.last_timestamp_ms = None;
        self.pair = None;
        self.channels.clear_history();
    }

    /// Human-readable snapshot of the session and of both cameras' queues.
    pub(crate) fn dump(&self, camera: CameraId) -> String {
        let mut out = String::new();
        let opposite = self.opposite(camera);
        let _ = writeln!(
            out,
            "[{}] {} opposite={} pair={:?} next_sync_id={} hold={} prepare={} prevent_drop={} last={:?}@{:?}",
            self.name(),
            camera,
            opposite.map_or_else(|| "-".to_string(), |id| id.to_string()),
            self.pair,
            self.next_sync_id,
            self.hold_count,
            self.prepare_hold_count,
            self.prevent_drop,
            self.last_sync_type,
            self.last_timestamp_ms,
        );

        for id in [Some(camera), opposite].into_iter().flatten() {
            let Some(slot) = self.slots.get(&id) else {
                let _ = writeln!(out, "  {id}: not registered");
                continue;
            };
            let _ = writeln!(
                out,
                "  {id}: standby={} available={}/{} peer_hold={} notify={} removal={} out_of_order={}",
                slot.params.is_in_standby(),
                slot.buffer_manager.available_buffer_count(),
                slot.buffer_manager.max_allowed_buffer_count(),
                slot.peer
                    .as_ref()
                    .map_or_else(|| "-".to_string(), |peer| peer.hold_frame_count().to_string()),
                self.channels.notify_len(id),
                self.channels.removal_len(id),
                slot.pending.out_of_order_count(),
            );
            for (label, queue) in [("pending", &slot.pending), ("matched", &slot.matched)] {
                let _ = write!(out, "    {label}({}):", queue.len());
                for obj in queue.iter() {
                    let _ = write!(out, " {obj}");
                }
                let _ = writeln!(out);
            }
        }

        let recent = self.channels.recent_messages();
        let _ = writeln!(out, "  recent messages ({}):", recent.len());
        for message in recent.iter().rev().take(4) {
            let _ = writeln!(out, "    {message}");
        }
        out
    }
}

/// Register `camera` with default mock parameters, bypassing the facade.
#[cfg(test)]
pub(crate) fn register(
    state: &mut SelectorState,
    camera: CameraId,
    pool: Arc<camera_sim::PoolBufferManager>,
) {
    state.slots.insert(
        camera,
        CameraSlot {
            params: Arc::new(camera_sim::MockParameters::new()),
            buffer_manager: pool,
            peer: None,
            pending: SyncQueue::new(),
            matched: SyncQueue::new(),
        },
    );
}
