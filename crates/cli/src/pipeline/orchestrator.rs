//! Pipeline orchestrator - drives one selector with two simulated cameras.
//!
//! Frames from both cameras are submitted as they arrive. Every match
//! notification on the master's queue triggers one consume step, which plays
//! the downstream role: it takes the output frame and hands its buffers back
//! to the owning pool.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_channel::Receiver;
use camera_sim::{MockCameraConfig, MockCameraSource, MockFrame, MockParameters, PoolBufferManager};
use contracts::{
    BufferManager, CameraFrame, CameraId, ContractError, DualStandbyMode, FrameRef, FrameState,
    OutputNode, PipeId, SelectorConfig, Selection, SubmitOutcome, SyncMessage,
};
use dual_selector::DualFrameSelector;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::PipelineStats;
use crate::cli::SelectMode;
use crate::error::CliError;

const MASTER: CameraId = CameraId::BACK;
const SLAVE: CameraId = CameraId::BACK_1;

/// Sensor clock of the master camera starts here (ms)
const START_OFFSET_MS: u64 = 100;

/// All frames carry their buffer on this pipe
const PIPE_ID: PipeId = 0;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Resolved selector profile
    pub selector: SelectorConfig,

    /// Frames per camera (None = unlimited)
    pub frames: Option<u32>,

    pub master_fps: f64,
    pub slave_fps: f64,

    /// Timestamp jitter bound (ms)
    pub jitter_ms: u64,

    /// Slave clock offset (ms)
    pub slave_offset_ms: u64,

    pub select_mode: SelectMode,

    /// Buffers per camera pool
    pub pool_size: usize,

    /// Playback speed multiplier (0 = unpaced)
    pub speed: f64,

    /// Slave enters standby after this many master frames
    pub standby_after: Option<u32>,

    /// Pipeline timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Channel buffer size
    pub buffer_size: usize,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// One simulated camera
struct Camera {
    id: CameraId,
    pool: Arc<PoolBufferManager>,
    params: Arc<MockParameters>,
    source: MockCameraSource,
    removals: Option<Receiver<FrameRef>>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline to completion
    pub async fn run(self) -> Result<PipelineStats> {
        let start_time = Instant::now();

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let selector = DualFrameSelector::new(self.config.selector.clone());
        selector
            .set_valid_camera_pair(MASTER, SLAVE)
            .context("Failed to declare camera pair")?;

        let mut master = self.camera(MASTER, self.config.master_fps, START_OFFSET_MS);
        let mut slave = self.camera(
            SLAVE,
            self.config.slave_fps,
            START_OFFSET_MS + self.config.slave_offset_ms,
        );
        for camera in [&mut master, &mut slave] {
            register(&selector, camera)?;
        }
        let notify_rx = selector
            .register_notify(MASTER)
            .context("Failed to register match notifications")?;

        info!(
            selector = %selector.name(),
            calib_time_ms = self.config.selector.calib_time_ms,
            match_mode = ?self.config.selector.match_mode,
            select_mode = ?self.config.select_mode,
            "Selector configured"
        );

        let mut master_rx = master.source.start(self.config.buffer_size);
        let mut slave_rx = slave.source.start(self.config.buffer_size);
        let (mut master_done, mut slave_done) = (false, false);

        let mut stats = PipelineStats {
            selector: selector.name().to_string(),
            ..Default::default()
        };

        let deadline = async {
            match self.config.timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(deadline);

        info!(frames = ?self.config.frames, "Pipeline running");

        while !(master_done && slave_done) {
            tokio::select! {
                frame = master_rx.recv(), if !master_done => match frame {
                    Some(frame) => {
                        if self
                            .config
                            .standby_after
                            .is_some_and(|after| frame.frame_count() == after)
                        {
                            info!(camera = %SLAVE, "Slave camera entering standby");
                            slave.params.set_standby(DualStandbyMode::ActiveInSensor);
                            slave.source.stop();
                        }
                        submit(&selector, &master, frame, &mut stats);
                    }
                    None => master_done = true,
                },
                frame = slave_rx.recv(), if !slave_done => match frame {
                    Some(frame) => submit(&selector, &slave, frame, &mut stats),
                    None => slave_done = true,
                },
                message = notify_rx.recv() => match message {
                    Ok(message) => self.consume(&selector, &[&master, &slave], &message, &mut stats),
                    Err(_) => {
                        warn!("Notification channel closed");
                        break;
                    }
                },
                _ = &mut deadline => {
                    warn!("Pipeline timed out");
                    break;
                }
            }
            drain_removals(&[&master, &slave], &mut stats);
        }

        // Shutdown
        info!("Shutting down pipeline...");
        master.source.stop();
        slave.source.stop();
        drain_sources(&[&master, &slave], [&mut master_rx, &mut slave_rx]);

        // pairs whose notification was overwritten are still queued
        while self.consume_one(&selector, &[&master, &slave], &mut stats) {}

        // flush_all empties the removal queues before reporting what it flushed
        drain_removals(&[&master, &slave], &mut stats);
        if let Err(e) = selector.flush_all(MASTER) {
            warn!(error = %e, "Flush failed during shutdown");
        }
        drain_removals(&[&master, &slave], &mut stats);
        selector.deinit(MASTER);
        selector.deinit(SLAVE);

        for camera in [&master, &slave] {
            let source = camera.source.metrics().snapshot();
            stats.frames_starved += source.frames_starved;
            stats.buffers_in_use += camera.pool.in_use_count();
        }
        if stats.buffers_in_use > 0 {
            warn!(
                buffers = stats.buffers_in_use,
                "Buffers still held after shutdown"
            );
        }

        stats.duration = start_time.elapsed();

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            fps = format!("{:.2}", stats.fps()),
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }

    fn camera(&self, id: CameraId, fps: f64, start_offset_ms: u64) -> Camera {
        let pool = Arc::new(PoolBufferManager::new(
            format!("{id}-pool"),
            id,
            self.config.pool_size,
        ));
        let source = MockCameraSource::new(
            MockCameraConfig {
                camera_id: id,
                fps,
                start_offset_ms,
                jitter_ms: self.config.jitter_ms,
                pipe_id: PIPE_ID,
                frame_limit: self.config.frames,
                speed: self.config.speed,
                ..Default::default()
            },
            pool.clone(),
        );

        Camera {
            id,
            pool,
            params: Arc::new(MockParameters::new()),
            source,
            removals: None,
        }
    }

    /// One consume step per match notification
    fn consume(
        &self,
        selector: &DualFrameSelector,
        cameras: &[&Camera],
        message: &SyncMessage,
        stats: &mut PipelineStats,
    ) {
        debug!(%message, "Match notification");
        self.consume_one(selector, cameras, stats);
    }

    /// Take one output out of the selector. Returns false when nothing was
    /// left to take.
    fn consume_one(
        &self,
        selector: &DualFrameSelector,
        cameras: &[&Camera],
        stats: &mut PipelineStats,
    ) -> bool {
        match self.config.select_mode {
            SelectMode::Pair => match selector.select_pair_with_outcome(MASTER) {
                Ok(Some((selection, frame))) => {
                    stats.metrics.update_selection(selection);
                    if selection == Selection::Fused {
                        stats.metrics.update_match_delta(fusion_delta_ms(&frame));
                    }
                    deliver(cameras, &frame, stats);
                    true
                }
                Ok(None) => false,
                Err(e) => {
                    record_select_error(e, stats);
                    false
                }
            },
            SelectMode::Single => {
                let mut taken = false;
                for camera in [MASTER, SLAVE] {
                    match selector.select_single(camera) {
                        Ok(Some(frame)) => {
                            deliver(cameras, &frame, stats);
                            taken = true;
                        }
                        // a dummy half completes the pair without a frame
                        Ok(None) => {}
                        Err(e) => record_select_error(e, stats),
                    }
                }
                taken
            }
        }
    }
}

fn register(selector: &DualFrameSelector, camera: &mut Camera) -> Result<()> {
    selector
        .set_info(
            camera.id,
            camera.params.clone(),
            camera.pool.clone(),
            None,
        )
        .map_err(|e| CliError::camera_setup(camera.id, e.to_string()))?;
    camera.removals = Some(
        selector
            .register_removal(camera.id)
            .map_err(|e| CliError::camera_setup(camera.id, e.to_string()))?,
    );
    Ok(())
}

fn submit(
    selector: &DualFrameSelector,
    camera: &Camera,
    frame: Arc<MockFrame>,
    stats: &mut PipelineStats,
) {
    stats.frames_submitted += 1;
    match selector.submit(camera.id, frame.clone(), PIPE_ID, false, None) {
        Ok(outcome) => {
            stats.metrics.update_submit(outcome);
            if matches!(outcome, SubmitOutcome::Matched(_)) {
                stats.pairs_matched += 1;
            }
            if let Some(depths) = selector.queue_depths(camera.id) {
                stats.metrics.update_pending_depth(depths.pending);
            }
        }
        Err(e) => {
            // rejected frames never entered a queue, the buffer is still ours
            warn!(camera = %camera.id, error = %e, "Submit rejected");
            stats.submit_errors += 1;
            for buffer in frame.buffers() {
                if let Err(e) = camera.pool.release_buffer(buffer.index) {
                    warn!(camera = %camera.id, error = %e, "Buffer release failed");
                }
            }
        }
    }
}

/// Downstream side: the output frame is done, return its buffers
fn deliver(cameras: &[&Camera], frame: &FrameRef, stats: &mut PipelineStats) {
    stats.outputs += 1;
    if frame.frame_state() == FrameState::Skipped {
        // the selector already released a skipped frame
        return;
    }

    let buffers = [
        frame.dst_buffer(PIPE_ID, None),
        frame.src_buffer(PIPE_ID, Some(OutputNode::Secondary.index())),
    ];
    for buffer in buffers.into_iter().flatten() {
        let Some(camera) = cameras.iter().find(|c| c.id == buffer.owner) else {
            warn!(%buffer, "Output buffer has no owning pool");
            continue;
        };
        if let Err(e) = camera.pool.release_buffer(buffer.index) {
            warn!(%buffer, error = %e, "Output buffer release failed");
        }
    }
}

/// Master timestamp minus the fused slave timestamp
fn fusion_delta_ms(frame: &FrameRef) -> i64 {
    let master_ms = (frame.timestamp_ns() / 1_000_000) as i64;
    let slave_ms = (frame.shot_meta(OutputNode::Secondary).sensor_timestamp_ns / 1_000_000) as i64;
    master_ms - slave_ms
}

fn record_select_error(error: ContractError, stats: &mut PipelineStats) {
    if matches!(error, ContractError::ConsistencyViolation { .. }) {
        stats.metrics.update_violation();
    }
    warn!(error = %error, "Select failed");
    stats.select_errors += 1;
}

fn drain_removals(cameras: &[&Camera], stats: &mut PipelineStats) {
    for camera in cameras {
        if let Some(removals) = &camera.removals {
            while removals.try_recv().is_ok() {
                stats.frames_removed += 1;
            }
        }
    }
}

/// Frames still in flight after the sources stopped go straight back to
/// their pools.
fn drain_sources(cameras: &[&Camera], receivers: [&mut mpsc::Receiver<Arc<MockFrame>>; 2]) {
    for (camera, rx) in cameras.iter().zip(receivers) {
        rx.close();
        while let Ok(frame) = rx.try_recv() {
            for buffer in frame.buffers() {
                if let Err(e) = camera.pool.release_buffer(buffer.index) {
                    warn!(camera = %camera.id, error = %e, "Buffer release failed");
                }
            }
        }
    }
}
