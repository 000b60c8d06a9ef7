//! Output selection for matched pairs
//!
//! `select_pair` pops one pair and runs it through the rule table. The camera
//! asking is the master of the pair, the opposite camera is the slave.
//! `select_single` hands each camera its own half through a two-phase
//! Selected / WillBeSelected negotiation.

use contracts::{
    CameraFrame, CameraId, ContractError, FrameRef, FrameState, FrameType, OutputNode, Selection,
    SyncType, NODE_GROUP_MAX,
};
use observability::record_selection;
use tracing::{debug, error, trace};

use crate::state::SelectorState;
use crate::sync_obj::{SelectState, SyncObject};

/// What the rule table looks at for one side of a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairTags {
    pub dummy: bool,
    pub sync_type: SyncType,
    pub frame_type: FrameType,
}

impl PairTags {
    pub fn of(obj: &SyncObject) -> Self {
        Self {
            dummy: obj.is_dummy(),
            sync_type: obj.sync_type(),
            frame_type: obj.frame_type(),
        }
    }
}

/// The rule table. First matching rule wins.
pub fn decide(master: &PairTags, slave: &PairTags) -> Selection {
    let master_transition = master.frame_type == FrameType::Transition;
    let slave_transition = slave.frame_type == FrameType::Transition;

    if slave.dummy {
        Selection::Master
    } else if master.dummy {
        Selection::Slave
    } else if master.sync_type == SyncType::Bypass && !master_transition {
        Selection::Master
    } else if slave.sync_type == SyncType::Switch && !slave_transition {
        Selection::Slave
    } else if master.sync_type == SyncType::Sync
        && slave.sync_type == SyncType::Sync
        && slave.frame_type != FrameType::Internal
    {
        Selection::Fused
    } else if master.sync_type == SyncType::Bypass {
        Selection::Master
    } else if slave.sync_type == SyncType::Switch {
        Selection::Slave
    } else {
        Selection::Dropped
    }
}

/// Move the slave's buffer and metadata onto the master frame's secondary
/// node.
pub(crate) fn merge_into_master(
    master: &FrameRef,
    master_pipe: contracts::PipeId,
    slave: &SyncObject,
) -> Result<(), ContractError> {
    let slave_frame = slave.frame().ok_or_else(|| {
        ContractError::invalid_operation(format!("{slave} cannot be fused: no frame"))
    })?;

    let buffer = slave.buffer()?;
    master.set_src_buffer(master_pipe, buffer, OutputNode::Secondary)?;

    for index in 0..NODE_GROUP_MAX {
        master.store_node_group(
            slave_frame.node_group(index, OutputNode::Primary),
            index,
            OutputNode::Secondary,
        );
    }
    master.store_shot_meta(slave_frame.shot_meta(OutputNode::Primary), OutputNode::Secondary);
    master.set_zoom(slave_frame.zoom(OutputNode::Primary), OutputNode::Secondary);
    master.set_sync_type(slave_frame.sync_type());
    master.set_frame_type(slave_frame.frame_type());

    if master.frame_state().is_discarded() {
        master.set_frame_state(FrameState::Ready);
    }
    Ok(())
}

impl SelectorState {
    pub(crate) fn select_pair(
        &mut self,
        camera: CameraId,
    ) -> Result<Option<(Selection, FrameRef)>, ContractError> {
        let Some(other) = self.opposite(camera) else {
            trace!("no opposite camera registered");
            return Ok(None);
        };

        let own_len = self.slots.get(&camera).map_or(0, |slot| slot.matched.len());
        if own_len == 0 {
            return Ok(None);
        }
        self.check_parity(camera, other)?;

        let master = self.slot_mut(camera).and_then(|slot| slot.matched.pop_front());
        let slave = self.slot_mut(other).and_then(|slot| slot.matched.pop_front());
        let (master, slave) = match (master, slave) {
            (Some(master), Some(slave)) => (master, slave),
            (master, slave) => {
                for obj in [master, slave].into_iter().flatten() {
                    self.discard(obj, false);
                }
                return Err(self.violation(camera, "matched pair could not be popped".into()));
            }
        };

        if master.sync_id() != slave.sync_id() || (master.is_dummy() && slave.is_dummy()) {
            let message = format!("inconsistent pair: {master} / {slave}");
            self.discard(master, false);
            self.discard(slave, false);
            return Err(self.violation(camera, message));
        }

        let mut selection = decide(&PairTags::of(&master), &PairTags::of(&slave));
        debug!(%master, %slave, selection = selection.label(), "pair selected");

        let frame = match selection {
            Selection::Fused => {
                let (fused, frame) = self.fuse(master, slave);
                selection = fused;
                frame
            }
            Selection::Slave => {
                self.discard(master, true);
                let frame = slave.into_frame();
                if let Some(frame) = &frame {
                    frame.set_frame_state(FrameState::Complete);
                }
                frame
            }
            Selection::Master => {
                self.discard(slave, true);
                master.into_frame()
            }
            Selection::Dropped => {
                self.release_buffer(&master);
                self.discard(slave, true);
                let frame = master.into_frame();
                if let Some(frame) = &frame {
                    frame.set_frame_state(FrameState::Skipped);
                }
                frame
            }
        };

        record_selection(self.name(), selection);
        Ok(frame.map(|frame| (selection, frame)))
    }

    /// Install the slave buffer on the master frame. The slave buffer is only
    /// released when it does not end up on the output.
    fn fuse(&self, master: SyncObject, slave: SyncObject) -> (Selection, Option<FrameRef>) {
        let Some(frame) = master.frame().cloned() else {
            self.discard(slave, true);
            return (Selection::Fused, None);
        };

        match merge_into_master(&frame, master.pipe_id(), &slave) {
            Ok(()) => (Selection::Fused, Some(frame)),
            Err(e) => {
                error!(error = %e, "fusion failed, falling back to master only");
                self.discard(slave, true);
                (Selection::Master, Some(frame))
            }
        }
    }

    pub(crate) fn select_single(&mut self, camera: CameraId) -> Result<Option<FrameRef>, ContractError> {
        let Some(other) = self.opposite(camera) else {
            return Ok(None);
        };

        let Some((index, sync_id)) = self.slots.get(&camera).and_then(|slot| {
            let index = slot
                .matched
                .position_by_state(SelectState::WillBeSelected)
                .or_else(|| slot.matched.position_by_state(SelectState::NotSelected))?;
            Some((index, slot.matched.get(index)?.sync_id()))
        }) else {
            return Ok(None);
        };

        let Some(sync_id) = sync_id else {
            return Err(self.violation(camera, format!("matched entry {index} has no sync id")));
        };

        let partner = self.slots.get(&other).and_then(|slot| {
            let partner_index = slot.matched.position_by_sync_id(sync_id)?;
            Some((partner_index, slot.matched.get(partner_index)?.select_state()))
        });
        let Some((partner_index, partner_state)) = partner else {
            return Err(self.violation(
                camera,
                format!("sync id {sync_id} has no partner in {other} matched queue"),
            ));
        };

        if partner_state == SelectState::Selected {
            // both halves handed out: the pair leaves the matched queues
            let own = self
                .slot_mut(camera)
                .map(|slot| slot.matched.remove_by_sync_id(sync_id))
                .transpose()?;
            self.slot_mut(other)
                .map(|slot| slot.matched.remove_by_sync_id(sync_id))
                .transpose()?;
            trace!(sync_id, "pair completed");
            return Ok(own.and_then(SyncObject::into_frame));
        }

        let mut frame = None;
        if let Some(slot) = self.slot_mut(camera) {
            if let Some(obj) = slot.matched.get_mut(index) {
                obj.set_select_state(SelectState::Selected);
                frame = obj.frame().cloned();
            }
        }
        if let Some(slot) = self.slot_mut(other) {
            if let Some(obj) = slot.matched.get_mut(partner_index) {
                obj.set_select_state(SelectState::WillBeSelected);
            }
        }
        trace!(sync_id, "half selected, partner will be selected");
        Ok(frame)
    }
}
