//! Mock 相机源
//!
//! 按帧率产生带抖动时间戳的帧，每帧从相机自己的缓冲池取一个目标缓冲区。
//! 时间戳是模拟的传感器时钟 (offset + n * period ± jitter)，与实际调度无关，
//! 因此配对结果只取决于配置。

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{CameraId, PipeId, ShotMeta, SyncType};
use rand::Rng;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::{MockFrame, PoolBufferManager};

/// Mock 相机源配置
#[derive(Debug, Clone)]
pub struct MockCameraConfig {
    /// 相机 ID
    pub camera_id: CameraId,

    /// 帧率
    pub fps: f64,

    /// 传感器时钟起点 (ms)
    pub start_offset_ms: u64,

    /// 时间戳抖动上限 (ms)
    pub jitter_ms: u64,

    /// 目标缓冲区所在的管线阶段
    pub pipe_id: PipeId,

    /// 帧的同步类型
    pub sync_type: SyncType,

    pub zoom: i32,

    /// 产生多少帧后停止 (None = 不限)
    pub frame_limit: Option<u32>,

    /// 回放速度倍率；0 表示不等待
    pub speed: f64,
}

impl Default for MockCameraConfig {
    fn default() -> Self {
        Self {
            camera_id: CameraId::BACK,
            fps: 30.0,
            start_offset_ms: 100,
            jitter_ms: 0,
            pipe_id: 0,
            sync_type: SyncType::Sync,
            zoom: 1,
            frame_limit: None,
            speed: 1.0,
        }
    }
}

impl MockCameraConfig {
    /// 帧间隔 (ms)
    pub fn period_ms(&self) -> f64 {
        1000.0 / self.fps
    }
}

/// 源统计
#[derive(Debug, Default)]
pub struct SourceMetrics {
    /// 已发送帧数
    pub frames_emitted: AtomicU64,

    /// 缓冲池耗尽导致跳过的帧数
    pub frames_starved: AtomicU64,
}

impl SourceMetrics {
    pub fn snapshot(&self) -> SourceMetricsSnapshot {
        SourceMetricsSnapshot {
            frames_emitted: self.frames_emitted.load(Ordering::Relaxed),
            frames_starved: self.frames_starved.load(Ordering::Relaxed),
        }
    }
}

/// 源统计快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceMetricsSnapshot {
    pub frames_emitted: u64,
    pub frames_starved: u64,
}

/// Mock 相机源
pub struct MockCameraSource {
    config: MockCameraConfig,
    pool: Arc<PoolBufferManager>,
    running: Arc<AtomicBool>,
    metrics: Arc<SourceMetrics>,
}

impl MockCameraSource {
    /// 创建新的 Mock 相机源
    pub fn new(config: MockCameraConfig, pool: Arc<PoolBufferManager>) -> Self {
        Self {
            config,
            pool,
            running: Arc::new(AtomicBool::new(false)),
            metrics: Arc::new(SourceMetrics::default()),
        }
    }

    pub fn config(&self) -> &MockCameraConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<SourceMetrics> {
        self.metrics.clone()
    }

    /// 构造第 `frame_count` 帧；缓冲池耗尽时返回 None
    pub fn make_frame(&self, frame_count: u32, jitter_ms: i64) -> Option<Arc<MockFrame>> {
        build_frame(&self.config, &self.pool, frame_count, jitter_ms)
    }

    /// 启动 Mock 源，返回帧流接收端
    pub fn start(&self, channel_capacity: usize) -> mpsc::Receiver<Arc<MockFrame>> {
        let (tx, rx) = mpsc::channel(channel_capacity);
        let config = self.config.clone();
        let pool = self.pool.clone();
        let running = self.running.clone();
        let metrics = self.metrics.clone();

        running.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            let pace = (config.speed > 0.0)
                .then(|| Duration::from_secs_f64(config.period_ms() / 1000.0 / config.speed));
            let jitter = config.jitter_ms as i64;
            let mut frame_count: u32 = 0;

            debug!(
                camera = %config.camera_id,
                fps = config.fps,
                offset_ms = config.start_offset_ms,
                "mock camera source started"
            );

            while running.load(Ordering::Relaxed) {
                if config
                    .frame_limit
                    .is_some_and(|limit| frame_count >= limit)
                {
                    break;
                }

                let offset = if jitter > 0 {
                    rand::rng().random_range(-jitter..=jitter)
                } else {
                    0
                };

                match build_frame(&config, &pool, frame_count, offset) {
                    Some(frame) => {
                        metrics.frames_emitted.fetch_add(1, Ordering::Relaxed);
                        if tx.send(frame).await.is_err() {
                            debug!(camera = %config.camera_id, "mock camera channel closed");
                            break;
                        }
                        trace!(camera = %config.camera_id, frame_count, "mock frame sent");
                    }
                    None => {
                        metrics.frames_starved.fetch_add(1, Ordering::Relaxed);
                        trace!(camera = %config.camera_id, frame_count, "buffer pool exhausted");
                    }
                }
                frame_count += 1;

                match pace {
                    Some(interval) => tokio::time::sleep(interval).await,
                    None => tokio::task::yield_now().await,
                }
            }

            running.store(false, Ordering::SeqCst);
            debug!(camera = %config.camera_id, frame_count, "mock camera source stopped");
        });

        rx
    }

    /// 停止 Mock 源
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// 检查是否正在运行
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

fn build_frame(
    config: &MockCameraConfig,
    pool: &PoolBufferManager,
    frame_count: u32,
    jitter_ms: i64,
) -> Option<Arc<MockFrame>> {
    let buffer = pool.acquire()?;
    let nominal = config.start_offset_ms as f64 + frame_count as f64 * config.period_ms();
    let timestamp_ms = (nominal as i64 + jitter_ms).max(1) as u64;

    Some(
        MockFrame::builder(frame_count)
            .timestamp_ms(timestamp_ms)
            .sync_type(config.sync_type)
            .zoom(config.zoom)
            .dst_buffer(config.pipe_id, buffer)
            .shot_meta(ShotMeta {
                sensor_timestamp_ns: timestamp_ms * 1_000_000,
                raw: Default::default(),
            })
            .build(),
    )
}
