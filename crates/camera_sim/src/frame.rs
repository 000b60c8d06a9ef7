//! Mock 管线帧
//!
//! 所有可变字段放在一把锁后面，满足 `CameraFrame` 的共享访问约定。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use contracts::{
    CameraBuffer, CameraFrame, ContractError, FrameState, FrameType, NodeGroupInfo, OutputNode,
    PipeId, ShotMeta, SyncType, NODE_GROUP_MAX,
};

#[derive(Debug, Default, Clone)]
struct FrameFields {
    frame_type: FrameType,
    sync_type: SyncType,
    frame_state: FrameState,
    zoom: [i32; 2],
    src: HashMap<(PipeId, usize), CameraBuffer>,
    dst: HashMap<(PipeId, usize), CameraBuffer>,
    node_groups: [[NodeGroupInfo; NODE_GROUP_MAX]; 2],
    shot: [ShotMeta; 2],
}

/// Mock 管线帧
#[derive(Debug)]
pub struct MockFrame {
    frame_count: u32,
    timestamp_ns: u64,
    fields: Mutex<FrameFields>,
}

impl MockFrame {
    /// 创建构建器
    pub fn builder(frame_count: u32) -> MockFrameBuilder {
        MockFrameBuilder {
            frame_count,
            timestamp_ns: 0,
            fields: FrameFields {
                frame_type: FrameType::Normal,
                sync_type: SyncType::Sync,
                ..Default::default()
            },
        }
    }

    fn fields(&self) -> MutexGuard<'_, FrameFields> {
        self.fields.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 帧上登记的所有缓冲区 (src 与 dst)
    pub fn buffers(&self) -> Vec<CameraBuffer> {
        let fields = self.fields();
        fields.dst.values().chain(fields.src.values()).copied().collect()
    }
}

impl CameraFrame for MockFrame {
    fn frame_count(&self) -> u32 {
        self.frame_count
    }

    fn timestamp_ns(&self) -> u64 {
        self.timestamp_ns
    }

    fn frame_type(&self) -> FrameType {
        self.fields().frame_type
    }

    fn set_frame_type(&self, frame_type: FrameType) {
        self.fields().frame_type = frame_type;
    }

    fn sync_type(&self) -> SyncType {
        self.fields().sync_type
    }

    fn set_sync_type(&self, sync_type: SyncType) {
        self.fields().sync_type = sync_type;
    }

    fn frame_state(&self) -> FrameState {
        self.fields().frame_state
    }

    fn set_frame_state(&self, state: FrameState) {
        self.fields().frame_state = state;
    }

    fn zoom(&self, node: OutputNode) -> i32 {
        self.fields().zoom[node.index()]
    }

    fn set_zoom(&self, zoom: i32, node: OutputNode) {
        self.fields().zoom[node.index()] = zoom;
    }

    fn src_buffer(
        &self,
        pipe_id: PipeId,
        node: Option<usize>,
    ) -> Result<CameraBuffer, ContractError> {
        let slot = node.unwrap_or(0);
        self.fields()
            .src
            .get(&(pipe_id, slot))
            .copied()
            .ok_or_else(|| ContractError::BufferUnavailable {
                pipe_id,
                node,
                message: format!("frame {} has no src buffer", self.frame_count),
            })
    }

    fn dst_buffer(
        &self,
        pipe_id: PipeId,
        node: Option<usize>,
    ) -> Result<CameraBuffer, ContractError> {
        let slot = node.unwrap_or(0);
        self.fields()
            .dst
            .get(&(pipe_id, slot))
            .copied()
            .ok_or_else(|| ContractError::BufferUnavailable {
                pipe_id,
                node,
                message: format!("frame {} has no dst buffer", self.frame_count),
            })
    }

    fn set_src_buffer(
        &self,
        pipe_id: PipeId,
        buffer: CameraBuffer,
        node: OutputNode,
    ) -> Result<(), ContractError> {
        self.fields().src.insert((pipe_id, node.index()), buffer);
        Ok(())
    }

    fn node_group(&self, index: usize, node: OutputNode) -> NodeGroupInfo {
        self.fields().node_groups[node.index()]
            .get(index)
            .cloned()
            .unwrap_or_default()
    }

    fn store_node_group(&self, info: NodeGroupInfo, index: usize, node: OutputNode) {
        if let Some(slot) = self.fields().node_groups[node.index()].get_mut(index) {
            *slot = info;
        }
    }

    fn shot_meta(&self, node: OutputNode) -> ShotMeta {
        self.fields().shot[node.index()].clone()
    }

    fn store_shot_meta(&self, meta: ShotMeta, node: OutputNode) {
        self.fields().shot[node.index()] = meta;
    }
}

/// MockFrame 构建器
#[derive(Debug, Clone)]
pub struct MockFrameBuilder {
    frame_count: u32,
    timestamp_ns: u64,
    fields: FrameFields,
}

impl MockFrameBuilder {
    pub fn timestamp_ns(mut self, timestamp_ns: u64) -> Self {
        self.timestamp_ns = timestamp_ns;
        self
    }

    pub fn timestamp_ms(self, timestamp_ms: u64) -> Self {
        self.timestamp_ns(timestamp_ms * 1_000_000)
    }

    pub fn sync_type(mut self, sync_type: SyncType) -> Self {
        self.fields.sync_type = sync_type;
        self
    }

    pub fn frame_type(mut self, frame_type: FrameType) -> Self {
        self.fields.frame_type = frame_type;
        self
    }

    pub fn state(mut self, state: FrameState) -> Self {
        self.fields.frame_state = state;
        self
    }

    pub fn zoom(mut self, zoom: i32) -> Self {
        self.fields.zoom[OutputNode::Primary.index()] = zoom;
        self
    }

    /// 登记默认节点上的目标缓冲区
    pub fn dst_buffer(mut self, pipe_id: PipeId, buffer: CameraBuffer) -> Self {
        self.fields.dst.insert((pipe_id, 0), buffer);
        self
    }

    pub fn src_buffer(mut self, pipe_id: PipeId, node: usize, buffer: CameraBuffer) -> Self {
        self.fields.src.insert((pipe_id, node), buffer);
        self
    }

    pub fn node_group(mut self, index: usize, info: NodeGroupInfo) -> Self {
        if let Some(slot) = self.fields.node_groups[OutputNode::Primary.index()].get_mut(index) {
            *slot = info;
        }
        self
    }

    pub fn shot_meta(mut self, meta: ShotMeta) -> Self {
        self.fields.shot[OutputNode::Primary.index()] = meta;
        self
    }

    pub fn build(self) -> Arc<MockFrame> {
        Arc::new(MockFrame {
            frame_count: self.frame_count,
            timestamp_ns: self.timestamp_ns,
            fields: Mutex::new(self.fields),
        })
    }
}
