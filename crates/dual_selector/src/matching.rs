//! Timestamp matching of submitted frames
//!
//! Two matchers share the same completion path:
//!
//! - `Basic`: scan the opposite pending queue in order, move out the first
//!   entry within the calibration window, keep everything else.
//! - `SyncAware`: pop opposite entries until one matches, dropping the ones
//!   scanned past. Adds the bypass/switch/transition policy: standby re-tag,
//!   dummy partners, and the drop hysteresis around the last match.

use contracts::{
    CameraFrame, CameraId, ContractError, EvictionReason, FrameRef, FrameState, FrameType,
    MatchMode, PipeId, SubmitOutcome, SyncMessage, SyncType,
};
use observability::record_pair_matched;
use tracing::{debug, info, trace};

use crate::state::SelectorState;
use crate::sync_obj::SyncObject;

/// Frames kept free in the buffer pool before the pending queue shrinks.
const MIN_AVAILABLE_BUFFERS: i64 = 2;

impl SelectorState {
    pub(crate) fn submit(
        &mut self,
        camera: CameraId,
        frame: FrameRef,
        pipe_id: PipeId,
        is_src: bool,
        node_index: Option<usize>,
    ) -> Result<SubmitOutcome, ContractError> {
        self.require_registered(camera)?;

        let outcome = match self.config.match_mode {
            MatchMode::Basic => self.submit_basic(camera, frame, pipe_id, is_src, node_index),
            MatchMode::SyncAware => {
                self.submit_sync_aware(camera, frame, pipe_id, is_src, node_index)?
            }
        };

        if !matches!(outcome, SubmitOutcome::Ignored | SubmitOutcome::Discarded) {
            self.trim_pending_to_prepare_hold(camera);
        }
        Ok(outcome)
    }

    fn submit_basic(
        &mut self,
        camera: CameraId,
        frame: FrameRef,
        pipe_id: PipeId,
        is_src: bool,
        node_index: Option<usize>,
    ) -> SubmitOutcome {
        let obj = SyncObject::new(camera, frame, pipe_id, is_src, node_index);
        let Some(other) = self.opposite(camera) else {
            return self.push_pending(obj);
        };

        let tolerance = i64::from(self.config.calib_time_ms);
        let partner = self
            .slot_mut(other)
            .and_then(|slot| slot.pending.take_first(|cand| obj.is_similar_timestamp(cand, tolerance)));

        match partner {
            Some(partner) => SubmitOutcome::Matched(self.complete_match(obj, partner)),
            None => self.push_pending(obj),
        }
    }

    fn submit_sync_aware(
        &mut self,
        camera: CameraId,
        frame: FrameRef,
        pipe_id: PipeId,
        is_src: bool,
        node_index: Option<usize>,
    ) -> Result<SubmitOutcome, ContractError> {
        let frame_type = frame.frame_type();
        if frame_type == FrameType::Internal {
            trace!(frame = frame.frame_count(), "internal frame ignored");
            return Ok(SubmitOutcome::Ignored);
        }

        let other = self.opposite(camera);

        if frame.frame_state().is_discarded() {
            debug!(
                frame = frame.frame_count(),
                state = ?frame.frame_state(),
                "discarded frame, flushing pending queues"
            );
            self.flush_pending(camera);
            if let Some(other) = other {
                self.flush_pending(other);
            }
            frame.set_frame_state(FrameState::Skipped);
            self.discard(SyncObject::new(camera, frame, pipe_id, is_src, node_index), true);
            return Ok(SubmitOutcome::Discarded);
        }

        let mut sync_type = frame.sync_type();
        if let Some(other) = other {
            let opposite_standby = self
                .slots
                .get(&other)
                .is_some_and(|slot| slot.params.is_in_standby());
            if opposite_standby {
                sync_type = if self.master() == Some(camera) {
                    SyncType::Bypass
                } else {
                    SyncType::Switch
                };
                debug!(%other, ?sync_type, "opposite camera in standby, frame re-tagged");
                frame.set_sync_type(sync_type);
                self.last_sync_type = sync_type;
            }
        }

        if sync_type == SyncType::Base {
            return Err(ContractError::invalid_operation(format!(
                "frame {} from {camera} has no sync type",
                frame.frame_count()
            )));
        }

        let obj = SyncObject::new(camera, frame, pipe_id, is_src, node_index);
        let Some(other) = other else {
            return Ok(self.push_pending(obj));
        };

        // hysteresis only moves for frames that can pair
        if !self.prevent_drop && self.should_drop(&obj, sync_type, frame_type) {
            if self.config.trace_removal {
                info!(entry = %obj, last = ?self.last_sync_type, "frame dropped");
            } else {
                debug!(entry = %obj, last = ?self.last_sync_type, "frame dropped");
            }
            self.discard(obj, true);
            return Ok(SubmitOutcome::Dropped);
        }

        if matches!(sync_type, SyncType::Bypass | SyncType::Switch) {
            let dummy = SyncObject::dummy(other, obj.timestamp_ms());
            return Ok(SubmitOutcome::Matched(self.complete_match(obj, dummy)));
        }

        let tolerance = i64::from(self.config.calib_time_ms);
        let mut partner = None;
        while let Some(candidate) = self.slot_mut(other).and_then(|slot| slot.pending.pop_front()) {
            if obj.is_similar_timestamp(&candidate, tolerance) {
                partner = Some(candidate);
                break;
            }
            self.evict(candidate, EvictionReason::Unmatched);
        }

        match partner {
            Some(partner) => Ok(SubmitOutcome::Matched(self.complete_match(obj, partner))),
            None => {
                if self.config.flush_on_mismatch && !self.prevent_drop {
                    self.flush_pending(camera);
                    self.flush_pending(other);
                }
                Ok(self.push_pending(obj))
            }
        }
    }

    /// Drop hysteresis around the last match.
    fn should_drop(&mut self, obj: &SyncObject, sync_type: SyncType, frame_type: FrameType) -> bool {
        let tolerance = i64::from(self.config.calib_time_ms);
        let near_last = self
            .last_timestamp_ms
            .is_some_and(|last| (obj.timestamp_ms() - last).abs() < tolerance);

        match sync_type {
            SyncType::Bypass | SyncType::Switch => {
                if frame_type == FrameType::Transition
                    && self.last_sync_type != SyncType::Base
                    && self.last_sync_type != sync_type
                {
                    true
                } else if near_last {
                    if frame_type != FrameType::Transition {
                        self.last_sync_type = sync_type;
                    }
                    true
                } else {
                    false
                }
            }
            SyncType::Sync => near_last,
            SyncType::Base => false,
        }
    }

    fn push_pending(&mut self, obj: SyncObject) -> SubmitOutcome {
        trace!(entry = %obj, "queued as pending");
        if let Some(slot) = self.slot_mut(obj.camera_id()) {
            slot.pending.push(obj);
        }
        SubmitOutcome::Pending
    }

    /// Give both entries the next sync id, move them to the matched queues,
    /// trim, and notify.
    pub(crate) fn complete_match(&mut self, mut obj: SyncObject, mut partner: SyncObject) -> u32 {
        let sync_id = self.next_sync_id;
        self.next_sync_id = self.next_sync_id.wrapping_add(1);

        obj.assign_sync_id(sync_id);
        partner.assign_sync_id(sync_id);

        let camera = obj.camera_id();
        let other = partner.camera_id();
        let own_ts = obj.timestamp_ms();
        let partner_ts = partner.timestamp_ms();
        let message = SyncMessage {
            camera_id: camera,
            sync_id,
            timestamp_ms: own_ts,
            zoom: obj.zoom(),
            sync_type: obj.sync_type(),
            frame_type: obj.frame_type(),
        };

        if self.config.trace_push {
            info!(entry = %obj, partner = %partner, "pair matched");
        } else {
            debug!(entry = %obj, partner = %partner, "pair matched");
        }

        if let Some(slot) = self.slot_mut(camera) {
            slot.matched.push(obj);
        }
        if let Some(slot) = self.slot_mut(other) {
            slot.matched.push(partner);
        }

        let hold_count = self.hold_count;
        for id in [camera, other] {
            let evicted = self
                .slot_mut(id)
                .map(|slot| slot.matched.evict_to_len(hold_count))
                .unwrap_or_default();
            self.evict_all(evicted, EvictionReason::HoldCount);
        }

        for (id, limit) in [(camera, own_ts), (other, partner_ts)] {
            let stale = self
                .slot_mut(id)
                .map(|slot| slot.pending.evict_up_to(limit))
                .unwrap_or_default();
            self.evict_all(stale, EvictionReason::Stale);
        }

        self.last_timestamp_ms = Some(own_ts);
        self.last_sync_type = message.sync_type;
        self.channels.broadcast(message);
        record_pair_matched(self.name(), sync_id, own_ts - partner_ts);

        sync_id
    }

    /// Shrink the pending queue to the prepare hold count: the configured
    /// value, or derived from how many buffers the pool still has free.
    fn trim_pending_to_prepare_hold(&mut self, camera: CameraId) {
        let Some(slot) = self.slots.get(&camera) else {
            return;
        };
        let pending_len = slot.pending.len() as i64;

        let limit = if self.prepare_hold_count > 0 {
            self.prepare_hold_count as i64
        } else {
            let available = slot.buffer_manager.available_buffer_count() as i64;
            if available < MIN_AVAILABLE_BUFFERS {
                pending_len - (MIN_AVAILABLE_BUFFERS - available)
            } else {
                pending_len
            }
        };

        let limit = if limit < 0 {
            match self.config.match_mode {
                MatchMode::Basic => 0,
                MatchMode::SyncAware => 1,
            }
        } else {
            limit as usize
        };

        let evicted = self
            .slot_mut(camera)
            .map(|slot| slot.pending.evict_to_len(limit))
            .unwrap_or_default();
        if !evicted.is_empty() {
            trace!(limit, evicted = evicted.len(), "pending queue trimmed");
        }
        self.evict_all(evicted, EvictionReason::PrepareHoldCount);
    }
}
