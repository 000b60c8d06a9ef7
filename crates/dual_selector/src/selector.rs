//! `DualFrameSelector` - thread-safe facade over the selector state

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_channel::Receiver;
use contracts::{
    BufferManager, CameraId, CameraParameters, ContractError, FrameRef,
    HoldListSelector, PipeId, Selection, SelectorConfig, SubmitOutcome, SyncMessage,
};
use observability::record_submit;
use tracing::{debug, error, info, instrument};

use crate::queue::SyncQueue;
use crate::state::{CameraSlot, SelectorState};

/// Queue lengths of one camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueDepths {
    pub pending: usize,
    pub matched: usize,
}

/// Dual-camera frame selector.
///
/// One instance per use (preview, capture, ...). Producers call
/// [`submit`](Self::submit) from each camera's pipeline; consumers wait on the
/// notify queue and call [`select_pair`](Self::select_pair) or
/// [`select_single`](Self::select_single). All operations take one lock and
/// never wait for the other camera.
pub struct DualFrameSelector {
    name: String,
    state: Mutex<SelectorState>,
}

impl std::fmt::Debug for DualFrameSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DualFrameSelector")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl DualFrameSelector {
    pub fn new(config: SelectorConfig) -> Self {
        debug!(
            selector = %config.name,
            calib_time_ms = config.calib_time_ms,
            mode = ?config.match_mode,
            "dual frame selector created"
        );
        Self {
            name: config.name.clone(),
            state: Mutex::new(SelectorState::new(config)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> SelectorConfig {
        self.lock().config.clone()
    }

    // every mutation finishes before the guard drops, a poisoned state is still whole
    fn lock(&self) -> MutexGuard<'_, SelectorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Declare which camera is master and which is slave.
    ///
    /// Only allowed before any camera registers.
    #[instrument(name = "dual_selector_set_pair", skip(self), fields(selector = %self.name))]
    pub fn set_valid_camera_pair(
        &self,
        master: CameraId,
        slave: CameraId,
    ) -> Result<(), ContractError> {
        let mut state = self.lock();
        let result = if !state.slots.is_empty() {
            Err(ContractError::invalid_operation(format!(
                "camera pair must be set before registration ({} registered)",
                state.slots.len()
            )))
        } else if master == slave {
            Err(ContractError::invalid_operation(format!(
                "master and slave are both {master}"
            )))
        } else {
            Ok(())
        };
        result.inspect_err(|e| error!(error = %e))?;

        state.pair = Some((master, slave));
        info!(%master, %slave, "dual camera pair set");
        Ok(())
    }

    /// Register a camera, or update the collaborators of a registered one.
    #[instrument(
        name = "dual_selector_set_info",
        skip(self, params, buffer_manager, peer),
        fields(selector = %self.name, camera = %camera)
    )]
    pub fn set_info(
        &self,
        camera: CameraId,
        params: Arc<dyn CameraParameters>,
        buffer_manager: Arc<dyn BufferManager>,
        peer: Option<Arc<dyn HoldListSelector>>,
    ) -> Result<(), ContractError> {
        let mut state = self.lock();

        if let Some(slot) = state.slot_mut(camera) {
            slot.params = params;
            slot.buffer_manager = buffer_manager;
            slot.peer = peer;
            debug!("camera info updated");
            return Ok(());
        }

        let result = if state.slots.len() >= 2 {
            Err(ContractError::invalid_operation(format!(
                "{camera} would be a third camera"
            )))
        } else if let Some((master, slave)) = state.pair.filter(|&(m, s)| camera != m && camera != s)
        {
            Err(ContractError::invalid_operation(format!(
                "{camera} is not part of the declared pair {master}/{slave}"
            )))
        } else {
            Ok(())
        };
        result.inspect_err(|e| error!(error = %e))?;

        info!(manager = buffer_manager.name(), "camera registered");
        state.slots.insert(
            camera,
            CameraSlot {
                params,
                buffer_manager,
                peer,
                pending: SyncQueue::new(),
                matched: SyncQueue::new(),
            },
        );
        Ok(())
    }

    /// Unregister a camera.
    ///
    /// Releases its queued buffers, clears the opposite matched queue and
    /// closes its notification queues. Flushed frames reach the removal queues
    /// before they close. The last camera out resets the session.
    #[instrument(name = "dual_selector_deinit", skip(self), fields(selector = %self.name, camera = %camera))]
    pub fn deinit(&self, camera: CameraId) {
        let mut state = self.lock();
        if !state.is_registered(camera) {
            info!("already deinited");
            return;
        }

        let opposite = state.opposite(camera);
        state.flush_pending(camera);
        state.flush_matched_queue(camera);
        if let Some(other) = opposite {
            state.flush_matched_queue(other);
        }
        state.channels.unregister(camera);
        state.slots.remove(&camera);

        if state.slots.is_empty() {
            state.reset_session();
            info!("last camera deinited, session reset");
        } else {
            info!("camera deinited");
        }
    }

    /// Notify queue of `camera`: one message per completed match.
    pub fn register_notify(&self, camera: CameraId) -> Result<Receiver<SyncMessage>, ContractError> {
        self.lock()
            .channels
            .register_notify(camera)
            .inspect_err(|e| error!(selector = %self.name, %camera, error = %e))
    }

    /// Removal queue of `camera`: frames the selector dropped.
    pub fn register_removal(&self, camera: CameraId) -> Result<Receiver<FrameRef>, ContractError> {
        self.lock()
            .channels
            .register_removal(camera)
            .inspect_err(|e| error!(selector = %self.name, %camera, error = %e))
    }

    /// Offer a frame for pairing.
    #[instrument(
        level = "trace",
        name = "dual_selector_submit",
        skip(self, frame),
        fields(selector = %self.name, camera = %camera)
    )]
    pub fn submit(
        &self,
        camera: CameraId,
        frame: FrameRef,
        pipe_id: PipeId,
        is_src: bool,
        node_index: Option<usize>,
    ) -> Result<SubmitOutcome, ContractError> {
        let mut state = self.lock();
        let outcome = state
            .submit(camera, frame, pipe_id, is_src, node_index)
            .inspect_err(|e| error!(error = %e, "submit rejected"))?;

        record_submit(&self.name, camera, outcome);
        state.record_depths(camera);
        Ok(outcome)
    }

    /// Pop the oldest matched pair and return the frame the rule table picks.
    pub fn select_pair(&self, camera: CameraId) -> Result<Option<FrameRef>, ContractError> {
        Ok(self
            .select_pair_with_outcome(camera)?
            .map(|(_, frame)| frame))
    }

    /// [`select_pair`](Self::select_pair), also reporting which rule applied.
    #[instrument(
        level = "trace",
        name = "dual_selector_select_pair",
        skip(self),
        fields(selector = %self.name, camera = %camera)
    )]
    pub fn select_pair_with_outcome(
        &self,
        camera: CameraId,
    ) -> Result<Option<(Selection, FrameRef)>, ContractError> {
        let mut state = self.lock();
        state.require_registered(camera)?;
        let selected = state
            .select_pair(camera)
            .inspect_err(|e| error!(error = %e, "select_pair failed"))?;
        state.record_depths(camera);
        Ok(selected)
    }

    /// Hand out this camera's half of the oldest unconsumed pair.
    ///
    /// The pair leaves the matched queues once both cameras took their half.
    #[instrument(
        level = "trace",
        name = "dual_selector_select_single",
        skip(self),
        fields(selector = %self.name, camera = %camera)
    )]
    pub fn select_single(&self, camera: CameraId) -> Result<Option<FrameRef>, ContractError> {
        let mut state = self.lock();
        state.require_registered(camera)?;
        let selected = state
            .select_single(camera)
            .inspect_err(|e| error!(error = %e, "select_single failed"))?;
        state.record_depths(camera);
        Ok(selected)
    }

    /// Drop the matched pairs of `camera` and its opposite, plus the pending
    /// queue of `camera`.
    ///
    /// `camera`'s queues are drained first, so afterwards its removal queue
    /// holds only the flushed frames.
    #[instrument(name = "dual_selector_flush_matched", skip(self), fields(selector = %self.name, camera = %camera))]
    pub fn flush_matched(&self, camera: CameraId) -> Result<(), ContractError> {
        let mut state = self.lock();
        state.require_registered(camera)?;

        let drained = state.channels.drain(camera);
        let opposite = state.opposite(camera);
        state.flush_matched_queue(camera);
        if let Some(other) = opposite {
            state.flush_matched_queue(other);
        }
        state.flush_pending(camera);
        debug!(notify = drained.0, removal = drained.1, "matched queues flushed");
        Ok(())
    }

    /// Clear every queue of every camera. Every flushed frame goes to its
    /// camera's removal queue.
    #[instrument(name = "dual_selector_flush_all", skip(self), fields(selector = %self.name, camera = %camera))]
    pub fn flush_all(&self, camera: CameraId) -> Result<(), ContractError> {
        let mut state = self.lock();
        state.require_registered(camera)?;
        state.flush_everything();
        debug!("all queues flushed");
        Ok(())
    }

    /// Matched queue bound and pending queue bound (0 = derived from the
    /// buffer pool).
    pub fn set_hold_count(
        &self,
        camera: CameraId,
        hold_count: usize,
        prepare_hold_count: usize,
    ) -> Result<(), ContractError> {
        if hold_count == 0 {
            return Err(ContractError::invalid_operation("hold count must be at least 1"))
                .inspect_err(|e| error!(selector = %self.name, %camera, error = %e));
        }
        let mut state = self.lock();
        state.hold_count = hold_count;
        state.prepare_hold_count = prepare_hold_count;
        debug!(selector = %self.name, %camera, hold_count, prepare_hold_count, "hold count set");
        Ok(())
    }

    pub fn set_prevent_drop(&self, camera: CameraId, prevent_drop: bool) {
        self.lock().prevent_drop = prevent_drop;
        debug!(selector = %self.name, %camera, prevent_drop, "prevent drop set");
    }

    /// `None` for an unregistered camera.
    pub fn queue_depths(&self, camera: CameraId) -> Option<QueueDepths> {
        let state = self.lock();
        state.slots.get(&camera).map(|slot| QueueDepths {
            pending: slot.pending.len(),
            matched: slot.matched.len(),
        })
    }

    /// Last `MESSAGE_MAX` match notifications, oldest first.
    pub fn recent_messages(&self) -> Vec<SyncMessage> {
        self.lock().channels.recent_messages()
    }

    pub fn registered_cameras(&self) -> Vec<CameraId> {
        self.lock().slots.keys().copied().collect()
    }

    pub fn dump(&self, camera: CameraId) -> String {
        self.lock().dump(camera)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camera_sim::{MockFrame, MockParameters, PoolBufferManager};
    use contracts::{
        CameraFrame, DualStandbyMode, FrameState, FrameType, MatchMode, OutputNode, SyncType,
    };
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use crate::sync_obj::SyncObject;

    const MASTER: CameraId = CameraId::BACK;
    const SLAVE: CameraId = CameraId::BACK_1;

    struct Rig {
        selector: DualFrameSelector,
        pools: [Arc<PoolBufferManager>; 2],
        params: [Arc<MockParameters>; 2],
    }

    impl Rig {
        fn new(config: SelectorConfig) -> Self {
            let rig = Self {
                selector: DualFrameSelector::new(config),
                pools: [
                    Arc::new(PoolBufferManager::new("master", MASTER, 64)),
                    Arc::new(PoolBufferManager::new("slave", SLAVE, 64)),
                ],
                params: [Arc::new(MockParameters::new()), Arc::new(MockParameters::new())],
            };
            rig.register_all();
            rig
        }

        fn register_all(&self) {
            self.selector.set_valid_camera_pair(MASTER, SLAVE).unwrap();
            for (i, camera) in [MASTER, SLAVE].into_iter().enumerate() {
                self.selector
                    .set_info(camera, self.params[i].clone(), self.pools[i].clone(), None)
                    .unwrap();
            }
        }

        fn slot(camera: CameraId) -> usize {
            if camera == MASTER {
                0
            } else {
                1
            }
        }

        fn pool(&self, camera: CameraId) -> &PoolBufferManager {
            &self.pools[Self::slot(camera)]
        }

        fn params(&self, camera: CameraId) -> &MockParameters {
            &self.params[Self::slot(camera)]
        }

        fn frame(&self, camera: CameraId, count: u32, ts_ms: u64) -> Arc<MockFrame> {
            self.frame_with(camera, count, ts_ms, SyncType::Sync)
        }

        fn frame_with(
            &self,
            camera: CameraId,
            count: u32,
            ts_ms: u64,
            sync_type: SyncType,
        ) -> Arc<MockFrame> {
            let buffer = self.pool(camera).acquire().expect("pool exhausted");
            MockFrame::builder(count)
                .timestamp_ms(ts_ms)
                .sync_type(sync_type)
                .dst_buffer(0, buffer)
                .build()
        }

        fn submit(&self, camera: CameraId, frame: &Arc<MockFrame>) -> SubmitOutcome {
            self.selector
                .submit(camera, frame.clone(), 0, false, None)
                .unwrap()
        }

        fn depths(&self, camera: CameraId) -> QueueDepths {
            self.selector.queue_depths(camera).unwrap()
        }

        /// Submit master then slave with the given timestamps.
        fn pair(&self, count: u32, master_ts: u64, slave_ts: u64) -> SubmitOutcome {
            let master = self.frame(MASTER, count, master_ts);
            let slave = self.frame(SLAVE, count, slave_ts);
            assert_eq!(self.submit(MASTER, &master), SubmitOutcome::Pending);
            self.submit(SLAVE, &slave)
        }
    }

    fn basic() -> SelectorConfig {
        SelectorConfig::default().with_match_mode(MatchMode::Basic)
    }

    #[test]
    fn test_selector_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DualFrameSelector>();
    }

    #[test]
    fn test_sync_pair_fuses() {
        let rig = Rig::new(SelectorConfig::default());
        let master = rig.frame(MASTER, 0, 100);
        let slave_buffer = rig.pool(SLAVE).acquire().unwrap();
        let slave = MockFrame::builder(0)
            .timestamp_ms(101)
            .zoom(3)
            .dst_buffer(0, slave_buffer)
            .build();

        assert_eq!(rig.submit(MASTER, &master), SubmitOutcome::Pending);
        assert_eq!(rig.submit(SLAVE, &slave), SubmitOutcome::Matched(0));
        // skipped downstream after matching; fusion revives it
        master.set_frame_state(FrameState::Skipped);

        let (selection, frame) = rig
            .selector
            .select_pair_with_outcome(MASTER)
            .unwrap()
            .unwrap();
        assert_eq!(selection, Selection::Fused);
        assert_eq!(frame.timestamp_ns(), master.timestamp_ns());

        assert_eq!(
            master
                .src_buffer(0, Some(OutputNode::Secondary.index()))
                .unwrap(),
            slave_buffer
        );
        assert_eq!(master.zoom(OutputNode::Secondary), 3);
        assert_eq!(master.frame_state(), FrameState::Ready);
        // ownership moved to the fused frame, nothing released
        assert!(rig.pool(SLAVE).is_in_use(slave_buffer.index));
        assert_eq!(rig.pool(MASTER).in_use_count(), 1);
        assert_eq!(rig.depths(MASTER), QueueDepths::default());
        assert_eq!(rig.depths(SLAVE), QueueDepths::default());
    }

    #[test]
    fn test_basic_tolerance_boundary() {
        let rig = Rig::new(basic());
        assert_eq!(rig.pair(0, 100, 102), SubmitOutcome::Matched(0));
        assert_eq!(rig.pair(1, 200, 203), SubmitOutcome::Pending);

        assert_eq!(rig.depths(MASTER), QueueDepths { pending: 1, matched: 1 });
        assert_eq!(rig.depths(SLAVE), QueueDepths { pending: 1, matched: 1 });
    }

    #[test]
    fn test_basic_keeps_unmatched_entries() {
        let rig = Rig::new(basic());
        let early = rig.frame(SLAVE, 0, 50);
        let late = rig.frame(SLAVE, 1, 100);
        rig.submit(SLAVE, &early);
        rig.submit(SLAVE, &late);

        let master = rig.frame(MASTER, 0, 100);
        assert_eq!(rig.submit(MASTER, &master), SubmitOutcome::Matched(0));
        // 50 is older than the match and trimmed as stale, not scanned past
        assert_eq!(rig.depths(SLAVE), QueueDepths { pending: 0, matched: 1 });
        assert!(!rig.pool(SLAVE).is_in_use(early.dst_buffer(0, None).unwrap().index));
    }

    #[test]
    fn test_pairing_is_deterministic() {
        fn run(seed: u64) -> Vec<SubmitOutcome> {
            let rig = Rig::new(basic().with_calib_time_ms(5));
            rig.selector.set_hold_count(MASTER, 64, 0).unwrap();
            let mut rng = StdRng::seed_from_u64(seed);
            let mut outcomes = Vec::new();
            for n in 0..20u32 {
                let base = 100 + u64::from(n) * 33;
                let master = rig.frame(MASTER, n, base + rng.random_range(0..4));
                let slave = rig.frame(SLAVE, n, base + rng.random_range(0..8));
                outcomes.push(rig.submit(MASTER, &master));
                outcomes.push(rig.submit(SLAVE, &slave));
                rig.selector.select_pair(MASTER).unwrap();
            }
            outcomes
        }

        assert_eq!(run(7), run(7));
    }

    #[test]
    fn test_sync_ids_unique_and_parity() {
        let rig = Rig::new(SelectorConfig::default());
        rig.selector.set_hold_count(MASTER, 8, 0).unwrap();

        let ids: Vec<SubmitOutcome> = (0..5u32)
            .map(|i| rig.pair(i, 100 + 33 * u64::from(i), 101 + 33 * u64::from(i)))
            .collect();
        assert_eq!(
            ids,
            (0..5).map(SubmitOutcome::Matched).collect::<Vec<_>>()
        );
        assert_eq!(rig.depths(MASTER).matched, 5);
        assert_eq!(rig.depths(SLAVE).matched, 5);

        let history: Vec<u32> = rig
            .selector
            .recent_messages()
            .iter()
            .map(|m| m.sync_id)
            .collect();
        assert_eq!(history, vec![0, 1, 2, 3, 4]);

        for _ in 0..5 {
            assert!(rig.selector.select_pair(MASTER).unwrap().is_some());
        }
        assert!(rig.selector.select_pair(MASTER).unwrap().is_none());
    }

    #[test]
    fn test_hold_count_bound() {
        let rig = Rig::new(SelectorConfig::default());
        let master_removal = rig.selector.register_removal(MASTER).unwrap();
        let slave_removal = rig.selector.register_removal(SLAVE).unwrap();

        for i in 0..3u32 {
            let ts = 100 + 33 * u64::from(i);
            assert_eq!(rig.pair(i, ts, ts + 1), SubmitOutcome::Matched(i));
        }

        assert_eq!(rig.depths(MASTER).matched, 1);
        assert_eq!(rig.depths(SLAVE).matched, 1);
        assert_eq!(master_removal.len(), 2);
        assert_eq!(slave_removal.len(), 2);
        assert_eq!(rig.pool(MASTER).in_use_count(), 1);
        assert_eq!(rig.pool(SLAVE).in_use_count(), 1);
    }

    #[test]
    fn test_select_single_two_phase() {
        let rig = Rig::new(SelectorConfig::default());
        assert_eq!(rig.pair(0, 100, 101), SubmitOutcome::Matched(0));

        let own = rig.selector.select_single(MASTER).unwrap().unwrap();
        assert_eq!(own.timestamp_ns(), 100_000_000);
        assert_eq!(rig.depths(MASTER).matched, 1);
        assert!(rig.selector.select_single(MASTER).unwrap().is_none());

        let partner = rig.selector.select_single(SLAVE).unwrap().unwrap();
        assert_eq!(partner.timestamp_ns(), 101_000_000);
        assert_eq!(rig.depths(MASTER).matched, 0);
        assert_eq!(rig.depths(SLAVE).matched, 0);
        // both halves went downstream
        assert_eq!(rig.pool(MASTER).in_use_count(), 1);
        assert_eq!(rig.pool(SLAVE).in_use_count(), 1);
    }

    #[test]
    fn test_bypass_pairs_with_dummy() {
        let rig = Rig::new(SelectorConfig::default());
        let master = rig.frame_with(MASTER, 0, 100, SyncType::Bypass);
        assert_eq!(rig.submit(MASTER, &master), SubmitOutcome::Matched(0));
        assert_eq!(rig.depths(SLAVE).matched, 1);

        let (selection, frame) = rig
            .selector
            .select_pair_with_outcome(MASTER)
            .unwrap()
            .unwrap();
        assert_eq!(selection, Selection::Master);
        assert_eq!(frame.frame_count(), 0);
        assert_eq!(rig.pool(MASTER).in_use_count(), 1);
    }

    #[test]
    fn test_standby_retags_master_to_bypass() {
        let rig = Rig::new(SelectorConfig::default());
        rig.params(SLAVE).set_standby(DualStandbyMode::ActiveInSensor);

        let master = rig.frame(MASTER, 0, 100);
        assert_eq!(rig.submit(MASTER, &master), SubmitOutcome::Matched(0));
        assert_eq!(master.sync_type(), SyncType::Bypass);

        let (selection, _) = rig
            .selector
            .select_pair_with_outcome(MASTER)
            .unwrap()
            .unwrap();
        assert_eq!(selection, Selection::Master);
    }

    #[test]
    fn test_standby_retags_slave_to_switch() {
        let rig = Rig::new(SelectorConfig::default());
        rig.params(MASTER).set_stable_from_standby(false);

        let slave = rig.frame(SLAVE, 0, 100);
        assert_eq!(rig.submit(SLAVE, &slave), SubmitOutcome::Matched(0));
        assert_eq!(slave.sync_type(), SyncType::Switch);
    }

    #[test]
    fn test_drop_hysteresis() {
        let rig = Rig::new(SelectorConfig::default().with_calib_time_ms(10));
        let removal = rig.selector.register_removal(MASTER).unwrap();
        assert_eq!(rig.pair(0, 100, 104), SubmitOutcome::Matched(0));

        let close = rig.frame(MASTER, 1, 110);
        assert_eq!(rig.submit(MASTER, &close), SubmitOutcome::Dropped);
        assert!(!rig.pool(MASTER).is_in_use(close.dst_buffer(0, None).unwrap().index));
        assert_eq!(removal.len(), 1);

        rig.selector.set_prevent_drop(MASTER, true);
        let kept = rig.frame(MASTER, 2, 112);
        assert_eq!(rig.submit(MASTER, &kept), SubmitOutcome::Pending);
    }

    #[test]
    fn test_transition_dropped_on_sync_type_change() {
        let rig = Rig::new(SelectorConfig::default());
        assert_eq!(rig.pair(0, 100, 101), SubmitOutcome::Matched(0));

        let buffer = rig.pool(MASTER).acquire().unwrap();
        let transition = MockFrame::builder(1)
            .timestamp_ms(200)
            .sync_type(SyncType::Bypass)
            .frame_type(FrameType::Transition)
            .dst_buffer(0, buffer)
            .build();
        assert_eq!(rig.submit(MASTER, &transition), SubmitOutcome::Dropped);
        assert!(!rig.pool(MASTER).is_in_use(buffer.index));
    }

    #[test]
    fn test_sync_aware_scan_evicts_older() {
        let rig = Rig::new(SelectorConfig::default());
        let removal = rig.selector.register_removal(SLAVE).unwrap();

        let early = rig.frame(SLAVE, 0, 50);
        let close = rig.frame(SLAVE, 1, 80);
        assert_eq!(rig.submit(SLAVE, &early), SubmitOutcome::Pending);
        assert_eq!(rig.submit(SLAVE, &close), SubmitOutcome::Pending);

        let master = rig.frame(MASTER, 0, 81);
        assert_eq!(rig.submit(MASTER, &master), SubmitOutcome::Matched(0));

        assert_eq!(removal.len(), 1);
        assert_eq!(removal.try_recv().unwrap().timestamp_ns(), 50_000_000);
        assert_eq!(rig.pool(SLAVE).released_count(), 1);
        assert_eq!(rig.depths(SLAVE), QueueDepths { pending: 0, matched: 1 });
    }

    #[test]
    fn test_flush_on_mismatch() {
        let mut config = SelectorConfig::default();
        config.flush_on_mismatch = true;
        let rig = Rig::new(config);

        let first = rig.frame(SLAVE, 0, 50);
        let second = rig.frame(SLAVE, 1, 60);
        assert_eq!(rig.submit(SLAVE, &first), SubmitOutcome::Pending);
        assert_eq!(rig.submit(SLAVE, &second), SubmitOutcome::Pending);

        // no master frame to match, so the older slave entry was flushed
        assert_eq!(rig.depths(SLAVE).pending, 1);
        assert!(!rig.pool(SLAVE).is_in_use(first.dst_buffer(0, None).unwrap().index));
    }

    #[test]
    fn test_prepare_hold_manual() {
        let rig = Rig::new(SelectorConfig::default());
        let removal = rig.selector.register_removal(MASTER).unwrap();
        rig.selector.set_hold_count(MASTER, 1, 2).unwrap();

        for i in 0..3u32 {
            let frame = rig.frame(MASTER, i, 100 + 100 * u64::from(i));
            assert_eq!(rig.submit(MASTER, &frame), SubmitOutcome::Pending);
        }
        assert_eq!(rig.depths(MASTER).pending, 2);
        assert_eq!(removal.try_recv().unwrap().timestamp_ns(), 100_000_000);
        assert_eq!(rig.pool(MASTER).in_use_count(), 2);
    }

    #[test]
    fn test_prepare_hold_from_pool_pressure() {
        let rig = Rig::new(SelectorConfig::default());
        rig.pool(MASTER).set_available_override(Some(0));
        let frame = rig.frame(MASTER, 0, 100);
        rig.submit(MASTER, &frame);
        // sync-aware keeps one entry when the pool is drained
        assert_eq!(rig.depths(MASTER).pending, 1);

        let rig = Rig::new(basic());
        rig.pool(MASTER).set_available_override(Some(0));
        let frame = rig.frame(MASTER, 0, 100);
        rig.submit(MASTER, &frame);
        assert_eq!(rig.depths(MASTER).pending, 0);
        assert_eq!(rig.pool(MASTER).in_use_count(), 0);
    }

    #[test]
    fn test_discarded_frame_flushes_pending() {
        let rig = Rig::new(SelectorConfig::default());
        let removal = rig.selector.register_removal(SLAVE).unwrap();
        let slave = rig.frame(SLAVE, 0, 50);
        rig.submit(SLAVE, &slave);

        let buffer = rig.pool(MASTER).acquire().unwrap();
        let invalid = MockFrame::builder(0)
            .timestamp_ms(60)
            .state(FrameState::Invalid)
            .dst_buffer(0, buffer)
            .build();
        assert_eq!(rig.submit(MASTER, &invalid), SubmitOutcome::Discarded);

        assert_eq!(invalid.frame_state(), FrameState::Skipped);
        assert_eq!(removal.len(), 1);
        assert_eq!(rig.depths(SLAVE).pending, 0);
        assert_eq!(rig.pool(MASTER).in_use_count(), 0);
        assert_eq!(rig.pool(SLAVE).in_use_count(), 0);
    }

    #[test]
    fn test_internal_frame_ignored() {
        let rig = Rig::new(SelectorConfig::default());
        let frame = MockFrame::builder(0)
            .timestamp_ms(100)
            .frame_type(FrameType::Internal)
            .build();
        assert_eq!(rig.submit(MASTER, &frame), SubmitOutcome::Ignored);
        assert_eq!(rig.depths(MASTER), QueueDepths::default());
    }

    #[test]
    fn test_invalid_submissions() {
        let rig = Rig::new(SelectorConfig::default());
        let untagged = rig.frame_with(MASTER, 0, 100, SyncType::Base);
        let err = rig
            .selector
            .submit(MASTER, untagged, 0, false, None)
            .unwrap_err();
        assert!(matches!(err, ContractError::InvalidOperation { .. }));

        let stranger = MockFrame::builder(0).timestamp_ms(100).build();
        let err = rig
            .selector
            .submit(CameraId::FRONT, stranger, 0, false, None)
            .unwrap_err();
        assert!(matches!(err, ContractError::InvalidOperation { .. }));
        assert_eq!(rig.depths(MASTER), QueueDepths::default());
    }

    #[test]
    fn test_registration_guards() {
        let rig = Rig::new(SelectorConfig::default());
        let pool = Arc::new(PoolBufferManager::new("front", CameraId::FRONT, 4));
        let err = rig
            .selector
            .set_info(CameraId::FRONT, Arc::new(MockParameters::new()), pool, None)
            .unwrap_err();
        assert!(matches!(err, ContractError::InvalidOperation { .. }));

        assert!(rig.selector.set_valid_camera_pair(SLAVE, MASTER).is_err());
        assert!(rig.selector.set_hold_count(MASTER, 0, 0).is_err());

        // updating a registered camera is fine
        rig.selector
            .set_info(MASTER, rig.params[0].clone(), rig.pools[0].clone(), None)
            .unwrap();
        assert_eq!(rig.selector.registered_cameras(), vec![MASTER, SLAVE]);
    }

    #[test]
    fn test_notify_per_match() {
        let rig = Rig::new(SelectorConfig::default());
        let master_rx = rig.selector.register_notify(MASTER).unwrap();
        let slave_rx = rig.selector.register_notify(SLAVE).unwrap();

        rig.pair(0, 100, 101);
        let message = master_rx.try_recv().unwrap();
        assert_eq!(message.camera_id, SLAVE);
        assert_eq!(message.sync_id, 0);
        assert_eq!(message.timestamp_ms, 101);
        assert_eq!(slave_rx.try_recv().unwrap(), message);

        rig.pair(1, 200, 201);
        assert!(matches!(
            rig.selector.register_notify(MASTER),
            Err(ContractError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn test_deinit_resets_session() {
        let rig = Rig::new(SelectorConfig::default());
        rig.selector.set_hold_count(MASTER, 4, 0).unwrap();
        let master_removal = rig.selector.register_removal(MASTER).unwrap();
        let slave_removal = rig.selector.register_removal(SLAVE).unwrap();
        assert_eq!(rig.pair(0, 100, 101), SubmitOutcome::Matched(0));

        rig.selector.deinit(SLAVE);
        assert!(rig.selector.queue_depths(SLAVE).is_none());
        // each flushed half went to its own camera's removal queue
        assert_eq!(master_removal.try_recv().unwrap().timestamp_ns(), 100_000_000);
        assert_eq!(slave_removal.try_recv().unwrap().timestamp_ns(), 101_000_000);
        assert_eq!(rig.depths(MASTER), QueueDepths::default());
        assert_eq!(rig.pool(MASTER).in_use_count(), 0);
        assert_eq!(rig.pool(SLAVE).in_use_count(), 0);

        rig.selector.deinit(SLAVE);
        rig.selector.deinit(MASTER);
        assert!(rig.selector.registered_cameras().is_empty());
        assert!(rig.selector.recent_messages().is_empty());
        assert_eq!(rig.selector.lock().hold_count, 1);

        rig.register_all();
        assert_eq!(rig.pair(1, 300, 301), SubmitOutcome::Matched(0));
    }

    #[test]
    fn test_flush_idempotent() {
        let rig = Rig::new(SelectorConfig::default());
        let notify = rig.selector.register_notify(MASTER).unwrap();
        let removal = rig.selector.register_removal(MASTER).unwrap();
        rig.pair(0, 100, 101);
        let pending = rig.frame(MASTER, 1, 200);
        rig.submit(MASTER, &pending);

        rig.selector.flush_matched(MASTER).unwrap();
        rig.selector.flush_matched(MASTER).unwrap();

        assert_eq!(rig.depths(MASTER), QueueDepths::default());
        assert_eq!(rig.depths(SLAVE), QueueDepths::default());
        assert!(notify.is_empty());
        // matched and pending master frames, once each
        assert_eq!(removal.len(), 2);
        assert_eq!(rig.pool(MASTER).in_use_count(), 0);
        assert_eq!(rig.pool(SLAVE).in_use_count(), 0);

        // flush_all drains the old removals before reporting the new ones
        let late = rig.frame(MASTER, 2, 300);
        rig.submit(MASTER, &late);
        rig.selector.flush_all(SLAVE).unwrap();
        assert_eq!(removal.len(), 1);
        assert_eq!(removal.try_recv().unwrap().timestamp_ns(), 300_000_000);
        rig.selector.flush_all(SLAVE).unwrap();
        assert!(removal.is_empty());
        assert!(rig.selector.flush_all(CameraId::FRONT).is_err());
    }

    #[test]
    fn test_violation_recovery() {
        let rig = Rig::new(SelectorConfig::default());
        rig.pair(0, 100, 101);

        let stray = rig.frame(MASTER, 9, 150);
        rig.selector
            .lock()
            .slot_mut(MASTER)
            .unwrap()
            .matched
            .push(SyncObject::new(MASTER, stray, 0, false, None));

        let err = rig.selector.select_pair(MASTER).unwrap_err();
        match err {
            ContractError::ConsistencyViolation { selector, dump, .. } => {
                assert_eq!(selector, "generic");
                assert!(dump.contains("matched(2)"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(rig.depths(MASTER), QueueDepths::default());
        assert_eq!(rig.depths(SLAVE), QueueDepths::default());
        assert_eq!(rig.pool(MASTER).in_use_count(), 0);
    }

    #[test]
    fn test_basic_slave_selection() {
        let rig = Rig::new(basic());
        let removal = rig.selector.register_removal(MASTER).unwrap();
        let master = rig.frame(MASTER, 0, 100);
        let slave = rig.frame_with(SLAVE, 0, 101, SyncType::Switch);
        rig.submit(MASTER, &master);
        assert_eq!(rig.submit(SLAVE, &slave), SubmitOutcome::Matched(0));

        let (selection, frame) = rig
            .selector
            .select_pair_with_outcome(MASTER)
            .unwrap()
            .unwrap();
        assert_eq!(selection, Selection::Slave);
        assert_eq!(frame.timestamp_ns(), 101_000_000);
        assert_eq!(slave.frame_state(), FrameState::Complete);
        assert_eq!(rig.pool(MASTER).in_use_count(), 0);
        assert_eq!(removal.len(), 1);
    }

    #[test]
    fn test_basic_dropped_selection() {
        let rig = Rig::new(basic());
        let removal = rig.selector.register_removal(SLAVE).unwrap();
        let master = rig.frame_with(MASTER, 0, 100, SyncType::Switch);
        let slave = rig.frame(SLAVE, 0, 101);
        rig.submit(MASTER, &master);
        rig.submit(SLAVE, &slave);

        let (selection, frame) = rig
            .selector
            .select_pair_with_outcome(MASTER)
            .unwrap()
            .unwrap();
        assert_eq!(selection, Selection::Dropped);
        assert_eq!(frame.frame_state(), FrameState::Skipped);
        assert_eq!(rig.pool(MASTER).in_use_count(), 0);
        assert_eq!(rig.pool(SLAVE).in_use_count(), 0);
        assert_eq!(removal.len(), 1);
    }

    #[test]
    fn test_bypass_master_with_real_slave() {
        let rig = Rig::new(basic());
        let removal = rig.selector.register_removal(SLAVE).unwrap();
        let master = rig.frame_with(MASTER, 0, 100, SyncType::Bypass);
        let slave = rig.frame(SLAVE, 0, 101);
        let slave_buffer = slave.dst_buffer(0, None).unwrap();
        let master_state = master.frame_state();
        rig.submit(MASTER, &master);
        assert_eq!(rig.submit(SLAVE, &slave), SubmitOutcome::Matched(0));

        let (selection, frame) = rig
            .selector
            .select_pair_with_outcome(MASTER)
            .unwrap()
            .unwrap();
        assert_eq!(selection, Selection::Master);
        assert_eq!(frame.timestamp_ns(), 100_000_000);
        assert_eq!(master.frame_state(), master_state);
        assert!(!rig.pool(SLAVE).is_in_use(slave_buffer.index));
        assert_eq!(rig.pool(MASTER).in_use_count(), 1);
        assert_eq!(removal.len(), 1);
    }

    #[test]
    fn test_basic_internal_pair_dropped() {
        let rig = Rig::new(basic());
        let internal = |camera, ts_ms| {
            let buffer = rig.pool(camera).acquire().unwrap();
            MockFrame::builder(0)
                .timestamp_ms(ts_ms)
                .sync_type(SyncType::Sync)
                .frame_type(FrameType::Internal)
                .dst_buffer(0, buffer)
                .build()
        };
        let master = internal(MASTER, 100);
        let slave = internal(SLAVE, 101);
        assert_eq!(rig.submit(MASTER, &master), SubmitOutcome::Pending);
        assert_eq!(rig.submit(SLAVE, &slave), SubmitOutcome::Matched(0));

        let (selection, frame) = rig
            .selector
            .select_pair_with_outcome(MASTER)
            .unwrap()
            .unwrap();
        assert_eq!(selection, Selection::Dropped);
        assert_eq!(frame.frame_state(), FrameState::Skipped);
        assert_eq!(rig.pool(MASTER).in_use_count(), 0);
        assert_eq!(rig.pool(SLAVE).in_use_count(), 0);
    }

    #[test]
    fn test_unpaired_frame_keeps_hysteresis() {
        let rig = Rig::new(SelectorConfig::default().with_calib_time_ms(10));
        assert_eq!(rig.pair(0, 100, 101), SubmitOutcome::Matched(0));
        rig.selector.deinit(SLAVE);

        let lonely = rig.frame_with(MASTER, 1, 105, SyncType::Bypass);
        assert_eq!(rig.submit(MASTER, &lonely), SubmitOutcome::Pending);
        let state = rig.selector.lock();
        assert_eq!(state.last_sync_type, SyncType::Sync);
        assert_eq!(state.last_timestamp_ms, Some(101));
    }

    #[test]
    fn test_dump_lists_queues() {
        let rig = Rig::new(SelectorConfig::default());
        rig.pair(0, 100, 101);
        let dump = rig.selector.dump(MASTER);
        assert!(dump.starts_with("[generic] CAM0"));
        assert!(dump.contains("matched(1): CAM0[F0 T100ms ID0"));
        assert!(dump.contains("recent messages (1)"));
    }
}
