//! CameraFrame - 管线帧契约
//!
//! 选择器只通过此 trait 访问帧：时间戳、缓冲区、帧类型/同步类型/帧状态、
//! 以及融合时需要复制的节点组与 shot 元数据。

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::{CameraId, ContractError};

/// 管线阶段 ID
pub type PipeId = u32;

/// 每帧节点组数量
pub const NODE_GROUP_MAX: usize = 3;

/// 共享帧引用
///
/// 帧在生产管线、选择器队列和下游消费者之间共享。
pub type FrameRef = Arc<dyn CameraFrame>;

/// 同步类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncType {
    /// 未标记
    #[default]
    Base,
    /// 双摄同步输出（融合）
    Sync,
    /// 只输出主摄
    Bypass,
    /// 只输出副摄
    Switch,
}

/// 帧类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameType {
    #[default]
    Base,
    /// 普通预览/拍照帧
    Normal,
    /// 同步类型切换期间的过渡帧
    Transition,
    /// 内部帧，不携带输出缓冲区
    Internal,
}

/// 帧状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameState {
    #[default]
    Ready,
    Running,
    Complete,
    Skipped,
    Invalid,
}

impl FrameState {
    /// Skipped / Invalid 帧不会被下游处理
    pub fn is_discarded(self) -> bool {
        matches!(self, FrameState::Skipped | FrameState::Invalid)
    }
}

/// 输出节点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputNode {
    /// 主摄输出 (OUTPUT_NODE_1)
    Primary,
    /// 融合时副摄数据所在的节点 (OUTPUT_NODE_2)
    Secondary,
}

impl OutputNode {
    pub fn index(self) -> usize {
        match self {
            OutputNode::Primary => 0,
            OutputNode::Secondary => 1,
        }
    }
}

/// 相机缓冲区句柄
///
/// `owner` 是负责回收此缓冲区的相机，释放时走它的 BufferManager。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CameraBuffer {
    /// 缓冲区索引
    pub index: u32,
    /// 所属相机
    pub owner: CameraId,
}

impl fmt::Display for CameraBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.owner, self.index)
    }
}

/// 裁剪区域
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// 每帧节点组信息
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeGroupInfo {
    /// leader 节点的输入/输出裁剪
    pub leader: CropRegion,
    /// capture 节点裁剪
    #[serde(default)]
    pub captures: Vec<CropRegion>,
}

/// Shot 元数据
///
/// 选择器只负责复制，不解析 `raw` 的内容。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShotMeta {
    /// 传感器时间戳 (ns)
    pub sensor_timestamp_ns: u64,
    /// 序列化后的 shot 结构
    pub raw: Bytes,
}

/// 管线帧
///
/// 实现需要内部可变性：帧以 [`FrameRef`] 的形式被多个所有者共享。
pub trait CameraFrame: Send + Sync + fmt::Debug {
    /// 帧序号 (诊断用)
    fn frame_count(&self) -> u32;

    /// 捕获时间戳 (ns)
    fn timestamp_ns(&self) -> u64;

    fn frame_type(&self) -> FrameType;
    fn set_frame_type(&self, frame_type: FrameType);

    fn sync_type(&self) -> SyncType;
    fn set_sync_type(&self, sync_type: SyncType);

    fn frame_state(&self) -> FrameState;
    fn set_frame_state(&self, state: FrameState);

    /// 指定输出节点的变焦值
    fn zoom(&self, node: OutputNode) -> i32;
    fn set_zoom(&self, zoom: i32, node: OutputNode);

    /// 源缓冲区；`node` 为 `None` 时取默认节点
    fn src_buffer(&self, pipe_id: PipeId, node: Option<usize>)
        -> Result<CameraBuffer, ContractError>;

    /// 目标缓冲区；`node` 为 `None` 时取默认节点
    fn dst_buffer(&self, pipe_id: PipeId, node: Option<usize>)
        -> Result<CameraBuffer, ContractError>;

    /// 在指定输出节点上安装源缓冲区 (状态置为 requested)
    fn set_src_buffer(
        &self,
        pipe_id: PipeId,
        buffer: CameraBuffer,
        node: OutputNode,
    ) -> Result<(), ContractError>;

    fn node_group(&self, index: usize, node: OutputNode) -> NodeGroupInfo;
    fn store_node_group(&self, info: NodeGroupInfo, index: usize, node: OutputNode);

    fn shot_meta(&self, node: OutputNode) -> ShotMeta;
    fn store_shot_meta(&self, meta: ShotMeta, node: OutputNode);
}
