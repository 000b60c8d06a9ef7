//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置文件 → 选择器的跨 crate 测试
//! - Mock 相机源 e2e 测试
//! - 多线程提交/选择压力测试

#[cfg(test)]
mod support {
    use std::sync::Arc;

    use camera_sim::{MockFrame, MockParameters, PoolBufferManager};
    use contracts::{BufferManager, CameraFrame, CameraId, FrameRef, FrameState, OutputNode};
    use dual_selector::DualFrameSelector;

    pub const MASTER: CameraId = CameraId::BACK;
    pub const SLAVE: CameraId = CameraId::BACK_1;

    /// Two cameras with their own pools, registered on one selector
    pub struct Cameras {
        pub pools: [Arc<PoolBufferManager>; 2],
        pub params: [Arc<MockParameters>; 2],
    }

    impl Cameras {
        pub fn register(selector: &DualFrameSelector, capacity: usize) -> Self {
            let cameras = Self {
                pools: [
                    Arc::new(PoolBufferManager::new("cam0", MASTER, capacity)),
                    Arc::new(PoolBufferManager::new("cam2", SLAVE, capacity)),
                ],
                params: [
                    Arc::new(MockParameters::new()),
                    Arc::new(MockParameters::new()),
                ],
            };
            selector.set_valid_camera_pair(MASTER, SLAVE).unwrap();
            for (i, camera) in [MASTER, SLAVE].into_iter().enumerate() {
                selector
                    .set_info(
                        camera,
                        cameras.params[i].clone(),
                        cameras.pools[i].clone(),
                        None,
                    )
                    .unwrap();
            }
            cameras
        }

        pub fn pool(&self, camera: CameraId) -> &PoolBufferManager {
            if camera == MASTER {
                &self.pools[0]
            } else {
                &self.pools[1]
            }
        }

        pub fn frame(&self, camera: CameraId, count: u32, ts_ms: u64) -> Arc<MockFrame> {
            let buffer = self.pool(camera).acquire().expect("pool exhausted");
            MockFrame::builder(count)
                .timestamp_ms(ts_ms)
                .dst_buffer(0, buffer)
                .build()
        }

        /// Downstream consumer: hand the output's buffers back to their pools
        pub fn release_output(&self, frame: &FrameRef) {
            if frame.frame_state() == FrameState::Skipped {
                return;
            }
            let buffers = [
                frame.dst_buffer(0, None),
                frame.src_buffer(0, Some(OutputNode::Secondary.index())),
            ];
            for buffer in buffers.into_iter().flatten() {
                self.pool(buffer.owner)
                    .release_buffer(buffer.index)
                    .expect("output buffer released twice");
            }
        }

        pub fn in_use(&self) -> usize {
            self.pools.iter().map(|pool| pool.in_use_count()).sum()
        }
    }
}

#[cfg(test)]
mod config_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{MatchMode, SelectorRole, SubmitOutcome};
    use dual_selector::DualFrameSelector;

    use crate::support::{Cameras, MASTER, SLAVE};

    const PROFILES: &str = r#"
[[selectors]]
name = "bench"
calib_time_ms = 4
hold_count = 4
match_mode = "basic"

[[selectors]]
name = "preview"
role = "preview"
"#;

    #[test]
    fn test_builtin_profiles_round_trip() {
        let builtin = config_loader::SelectorProfiles::builtin();
        let toml = ConfigLoader::to_toml(&builtin).unwrap();
        let reloaded = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();
        assert_eq!(reloaded, builtin);
    }

    #[test]
    fn test_loaded_profile_drives_selector() {
        let profiles = ConfigLoader::load_from_str(PROFILES, ConfigFormat::Toml).unwrap();
        let bench = profiles.get("bench").unwrap().clone();
        assert_eq!(bench.role, SelectorRole::Generic);
        assert_eq!(bench.match_mode, MatchMode::Basic);

        let selector = DualFrameSelector::new(bench);
        let cameras = Cameras::register(&selector, 16);

        // the newer slave frame stays pending after the match
        let partner = cameras.frame(SLAVE, 0, 103);
        let later = cameras.frame(SLAVE, 1, 110);
        assert_eq!(
            selector.submit(SLAVE, partner, 0, false, None).unwrap(),
            SubmitOutcome::Pending
        );
        assert_eq!(
            selector.submit(SLAVE, later, 0, false, None).unwrap(),
            SubmitOutcome::Pending
        );
        let master = cameras.frame(MASTER, 0, 100);
        assert_eq!(
            selector.submit(MASTER, master, 0, false, None).unwrap(),
            SubmitOutcome::Matched(0)
        );
        assert_eq!(selector.queue_depths(SLAVE).unwrap().pending, 1);

        let output = selector.select_pair(MASTER).unwrap().unwrap();
        cameras.release_output(&output);
        selector.flush_all(MASTER).unwrap();
        assert_eq!(cameras.in_use(), 0);
    }

    #[test]
    fn test_preview_profile_window() {
        let profiles = ConfigLoader::load_from_str(PROFILES, ConfigFormat::Toml).unwrap();
        let selector = DualFrameSelector::new(profiles.get("preview").unwrap().clone());
        let cameras = Cameras::register(&selector, 8);

        let master = cameras.frame(MASTER, 0, 100);
        let far = cameras.frame(SLAVE, 0, 116);
        selector.submit(MASTER, master, 0, false, None).unwrap();
        assert_eq!(
            selector.submit(SLAVE, far, 0, false, None).unwrap(),
            SubmitOutcome::Pending
        );

        let near = cameras.frame(MASTER, 1, 130);
        assert!(matches!(
            selector.submit(MASTER, near, 0, false, None).unwrap(),
            SubmitOutcome::Matched(_)
        ));
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use camera_sim::{MockCameraConfig, MockCameraSource};
    use contracts::{
        CameraFrame, DualStandbyMode, FrameRef, Selection, SelectorConfig, SelectorRole,
        SubmitOutcome, SyncType,
    };
    use dual_selector::DualFrameSelector;
    use observability::SelectorMetricsAggregator;

    use crate::support::{Cameras, MASTER, SLAVE};

    const FRAMES: u32 = 50;

    /// End-to-end: MockCameraSource x2 -> DualFrameSelector -> consumer
    ///
    /// 验证完整的数据流：
    /// 1. 两路 Mock 相机以相同帧率、3ms 时钟偏移产生帧
    /// 2. 每次匹配通知触发一次 select_pair
    /// 3. 消费者归还输出帧的缓冲区，结束后缓冲池全部回收
    #[tokio::test]
    async fn test_e2e_mock_cameras() {
        let selector = DualFrameSelector::new(SelectorConfig::for_role(SelectorRole::Preview));
        let cameras = Cameras::register(&selector, 64);
        let notify = selector.register_notify(MASTER).unwrap();
        let removals = selector.register_removal(MASTER).unwrap();

        let source = |index: usize, camera, offset| {
            MockCameraSource::new(
                MockCameraConfig {
                    camera_id: camera,
                    start_offset_ms: offset,
                    frame_limit: Some(FRAMES),
                    speed: 0.0,
                    ..Default::default()
                },
                cameras.pools[index].clone(),
            )
        };
        let master_source = source(0, MASTER, 100);
        let slave_source = source(1, SLAVE, 103);
        let mut master_rx = master_source.start(8);
        let mut slave_rx = slave_source.start(8);

        let mut metrics = SelectorMetricsAggregator::new();
        let run = async {
            let (mut master_done, mut slave_done) = (false, false);
            while !(master_done && slave_done) {
                let (camera, frame) = tokio::select! {
                    frame = master_rx.recv(), if !master_done => match frame {
                        Some(frame) => (MASTER, frame),
                        None => { master_done = true; continue; }
                    },
                    frame = slave_rx.recv(), if !slave_done => match frame {
                        Some(frame) => (SLAVE, frame),
                        None => { slave_done = true; continue; }
                    },
                };

                let outcome = selector.submit(camera, frame, 0, false, None).unwrap();
                metrics.update_submit(outcome);

                while notify.try_recv().is_ok() {
                    let (selection, output) = selector
                        .select_pair_with_outcome(MASTER)
                        .unwrap()
                        .expect("notified pair is queued");
                    metrics.update_selection(selection);
                    cameras.release_output(&output);
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(10), run)
            .await
            .expect("pipeline timed out");

        let summary = metrics.summary();
        assert_eq!(summary.total_submitted, u64::from(FRAMES) * 2);
        assert_eq!(summary.matched_pairs, u64::from(FRAMES));
        assert_eq!(summary.total_selected, u64::from(FRAMES));
        assert_eq!(summary.fusion_rate, 100.0);
        assert_eq!(
            metrics.selections.get(&Selection::Fused).copied(),
            Some(u64::from(FRAMES))
        );
        assert!(removals.is_empty());

        selector.flush_all(MASTER).unwrap();
        assert_eq!(cameras.in_use(), 0);
        assert_eq!(master_source.metrics().snapshot().frames_starved, 0);
    }

    /// 副摄进入 standby 后主摄帧改为 bypass，与 dummy 配对
    #[tokio::test]
    async fn test_e2e_slave_standby() {
        let selector = DualFrameSelector::new(SelectorConfig::for_role(SelectorRole::Preview));
        let cameras = Cameras::register(&selector, 16);
        cameras.params[1].set_standby(DualStandbyMode::ActiveInSensor);

        let master_source = MockCameraSource::new(
            MockCameraConfig {
                camera_id: MASTER,
                frame_limit: Some(10),
                speed: 0.0,
                ..Default::default()
            },
            cameras.pools[0].clone(),
        );
        let mut rx = master_source.start(4);

        let mut outputs = 0;
        while let Some(frame) = rx.recv().await {
            let frame: FrameRef = frame;
            let outcome = selector
                .submit(MASTER, frame.clone(), 0, false, None)
                .unwrap();
            assert!(matches!(outcome, SubmitOutcome::Matched(_)));
            assert_eq!(frame.sync_type(), SyncType::Bypass);

            let (selection, output) = selector
                .select_pair_with_outcome(MASTER)
                .unwrap()
                .unwrap();
            assert_eq!(selection, Selection::Master);
            assert!(Arc::ptr_eq(&output, &frame));
            cameras.release_output(&output);
            outputs += 1;
        }

        assert_eq!(outputs, 10);
        assert_eq!(cameras.in_use(), 0);
    }
}

#[cfg(test)]
mod concurrency_tests {
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    use contracts::{CameraFrame, CameraId, SelectorConfig, SelectorRole, SubmitOutcome};
    use dual_selector::DualFrameSelector;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::support::{Cameras, MASTER, SLAVE};

    const FRAMES: u32 = 400;

    fn produce(
        selector: &DualFrameSelector,
        cameras: &Cameras,
        camera: CameraId,
        offset_ms: i64,
        seed: u64,
    ) -> Vec<u32> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut sync_ids = Vec::new();
        for n in 0..FRAMES {
            let jitter: i64 = rng.random_range(-2..=2);
            let ts = 1000 + i64::from(n) * 33 + offset_ms + jitter;
            let frame = cameras.frame(camera, n, ts as u64);
            let outcome = selector.submit(camera, frame, 0, false, None).unwrap();
            if let SubmitOutcome::Matched(sync_id) = outcome {
                sync_ids.push(sync_id);
            }
            if n % 16 == 0 {
                thread::yield_now();
            }
        }
        sync_ids
    }

    fn assert_unique_and_dense(ids: Vec<u32>) {
        let count = ids.len();
        let unique: BTreeSet<u32> = ids.into_iter().collect();
        assert_eq!(unique.len(), count, "sync id handed out twice");
        assert_eq!(
            unique.into_iter().collect::<Vec<_>>(),
            (0..count as u32).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_concurrent_submit_and_select_pair() {
        let selector = Arc::new(DualFrameSelector::new(SelectorConfig::for_role(
            SelectorRole::Preview,
        )));
        let cameras = Cameras::register(&selector, FRAMES as usize);
        let done = AtomicUsize::new(0);

        let (ids, outputs) = thread::scope(|s| {
            let producers: Vec<_> = [(MASTER, 0, 7), (SLAVE, 3, 11)]
                .into_iter()
                .map(|(camera, offset, seed)| {
                    let (selector, cameras, done) = (&selector, &cameras, &done);
                    s.spawn(move || {
                        let ids = produce(selector, cameras, camera, offset, seed);
                        done.fetch_add(1, Ordering::SeqCst);
                        ids
                    })
                })
                .collect();

            let consumer = s.spawn(|| {
                let mut outputs = 0u32;
                loop {
                    let finished = done.load(Ordering::SeqCst) == 2;
                    match selector.select_pair(MASTER).unwrap() {
                        Some(frame) => {
                            cameras.release_output(&frame);
                            outputs += 1;
                        }
                        None if finished => break,
                        None => thread::yield_now(),
                    }
                }
                outputs
            });

            let ids: Vec<u32> = producers
                .into_iter()
                .flat_map(|handle| handle.join().unwrap())
                .collect();
            (ids, consumer.join().unwrap())
        });

        let pairs = ids.len() as u32;
        assert!(pairs > 0);
        assert!(outputs > 0 && outputs <= pairs);
        assert_unique_and_dense(ids);

        let master = selector.queue_depths(MASTER).unwrap();
        let slave = selector.queue_depths(SLAVE).unwrap();
        assert_eq!(master.matched, slave.matched);
        assert_eq!(master.matched, 0);

        selector.flush_all(MASTER).unwrap();
        assert_eq!(cameras.in_use(), 0);
    }

    #[test]
    fn test_concurrent_select_single() {
        let selector = Arc::new(DualFrameSelector::new(SelectorConfig::for_role(
            SelectorRole::Preview,
        )));
        let cameras = Cameras::register(&selector, FRAMES as usize);
        selector.set_hold_count(MASTER, 8, 0).unwrap();
        let done = AtomicUsize::new(0);

        let (ids, taken) = thread::scope(|s| {
            let producers: Vec<_> = [(MASTER, 0, 3), (SLAVE, 2, 5)]
                .into_iter()
                .map(|(camera, offset, seed)| {
                    let (selector, cameras, done) = (&selector, &cameras, &done);
                    s.spawn(move || {
                        let ids = produce(selector, cameras, camera, offset, seed);
                        done.fetch_add(1, Ordering::SeqCst);
                        ids
                    })
                })
                .collect();

            let consumers: Vec<_> = [MASTER, SLAVE]
                .into_iter()
                .map(|camera| {
                    let (selector, cameras, done) = (&selector, &cameras, &done);
                    s.spawn(move || {
                        let mut taken = 0u32;
                        loop {
                            let finished = done.load(Ordering::SeqCst) == 2;
                            match selector.select_single(camera).unwrap() {
                                Some(frame) => {
                                    assert_eq!(
                                        frame.dst_buffer(0, None).unwrap().owner,
                                        camera
                                    );
                                    cameras.release_output(&frame);
                                    taken += 1;
                                }
                                None if finished => break,
                                None => thread::yield_now(),
                            }
                        }
                        taken
                    })
                })
                .collect();

            let ids: Vec<u32> = producers
                .into_iter()
                .flat_map(|handle| handle.join().unwrap())
                .collect();
            let taken: Vec<u32> = consumers
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect();
            (ids, taken)
        });

        assert_unique_and_dense(ids);
        assert!(taken[0] > 0);
        assert_eq!(taken[0], taken[1]);
        assert_eq!(selector.queue_depths(MASTER).unwrap().matched, 0);
        assert_eq!(selector.queue_depths(SLAVE).unwrap().matched, 0);

        selector.flush_all(MASTER).unwrap();
        assert_eq!(cameras.in_use(), 0);
    }
}
