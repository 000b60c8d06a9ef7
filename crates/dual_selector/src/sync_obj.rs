//! One frame enrolled for dual-camera pairing.

use std::fmt;

use contracts::{
    CameraBuffer, CameraFrame, CameraId, ContractError, FrameRef, FrameType, OutputNode, PipeId,
    SyncType,
};

/// Negotiation state of a matched entry between the two consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectState {
    #[default]
    Unset,
    NotSelected,
    /// Handed to this camera's consumer
    Selected,
    /// The opposite consumer took its half; this half goes out on the next call
    WillBeSelected,
}

impl SelectState {
    fn short(self) -> &'static str {
        match self {
            SelectState::Unset => "-",
            SelectState::NotSelected => "N",
            SelectState::Selected => "S",
            SelectState::WillBeSelected => "W",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncObjKind {
    #[default]
    Unset,
    Normal,
    /// Placeholder for "no frame from this camera in the window"
    Dummy,
}

/// Queue entry binding a pipeline frame to its dual-sync identity.
#[derive(Debug, Clone)]
pub struct SyncObject {
    camera_id: CameraId,
    frame: Option<FrameRef>,
    pipe_id: PipeId,
    is_src: bool,
    node_index: Option<usize>,
    timestamp_ms: i64,
    sync_id: Option<u32>,
    select_state: SelectState,
    kind: SyncObjKind,
}

impl SyncObject {
    pub fn new(
        camera_id: CameraId,
        frame: FrameRef,
        pipe_id: PipeId,
        is_src: bool,
        node_index: Option<usize>,
    ) -> Self {
        let timestamp_ms = (frame.timestamp_ns() / 1_000_000) as i64;
        Self {
            camera_id,
            frame: Some(frame),
            pipe_id,
            is_src,
            node_index,
            timestamp_ms,
            sync_id: None,
            select_state: SelectState::NotSelected,
            kind: SyncObjKind::Normal,
        }
    }

    pub fn dummy(camera_id: CameraId, timestamp_ms: i64) -> Self {
        Self {
            camera_id,
            frame: None,
            pipe_id: 0,
            is_src: false,
            node_index: None,
            timestamp_ms,
            sync_id: None,
            select_state: SelectState::NotSelected,
            kind: SyncObjKind::Dummy,
        }
    }

    pub fn camera_id(&self) -> CameraId {
        self.camera_id
    }

    pub fn frame(&self) -> Option<&FrameRef> {
        self.frame.as_ref()
    }

    pub fn pipe_id(&self) -> PipeId {
        self.pipe_id
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    pub fn sync_id(&self) -> Option<u32> {
        self.sync_id
    }

    pub fn select_state(&self) -> SelectState {
        self.select_state
    }

    pub fn kind(&self) -> SyncObjKind {
        self.kind
    }

    pub fn is_dummy(&self) -> bool {
        self.kind == SyncObjKind::Dummy
    }

    /// `Base` for dummies.
    pub fn sync_type(&self) -> SyncType {
        self.frame
            .as_ref()
            .map_or(SyncType::Base, |frame| frame.sync_type())
    }

    /// `Base` for dummies.
    pub fn frame_type(&self) -> FrameType {
        self.frame
            .as_ref()
            .map_or(FrameType::Base, |frame| frame.frame_type())
    }

    pub fn zoom(&self) -> i32 {
        self.frame
            .as_ref()
            .map_or(0, |frame| frame.zoom(OutputNode::Primary))
    }

    /// Both timestamps nonzero and at most `tolerance_ms` apart.
    pub fn is_similar_timestamp(&self, other: &SyncObject, tolerance_ms: i64) -> bool {
        self.timestamp_ms != 0
            && other.timestamp_ms != 0
            && (self.timestamp_ms - other.timestamp_ms).abs() <= tolerance_ms
    }

    /// The buffer this entry holds: src or dst of its pipe at its node.
    pub fn buffer(&self) -> Result<CameraBuffer, ContractError> {
        let frame = self
            .frame
            .as_ref()
            .ok_or_else(|| ContractError::BufferUnavailable {
                pipe_id: self.pipe_id,
                node: self.node_index,
                message: format!("{} dummy entry has no frame", self.camera_id),
            })?;

        if self.is_src {
            frame.src_buffer(self.pipe_id, self.node_index)
        } else {
            frame.dst_buffer(self.pipe_id, self.node_index)
        }
    }

    pub(crate) fn assign_sync_id(&mut self, sync_id: u32) {
        self.sync_id = Some(sync_id);
    }

    pub(crate) fn set_select_state(&mut self, state: SelectState) {
        self.select_state = state;
    }

    /// Drop the entry, keeping only its frame reference.
    pub fn into_frame(self) -> Option<FrameRef> {
        self.frame
    }
}

impl fmt::Display for SyncObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.camera_id)?;
        match &self.frame {
            Some(frame) => write!(f, "F{}", frame.frame_count())?,
            None => write!(f, "dummy")?,
        }
        write!(f, " T{}ms", self.timestamp_ms)?;
        match self.sync_id {
            Some(id) => write!(f, " ID{id}")?,
            None => write!(f, " ID-")?,
        }
        write!(
            f,
            " {} {:?}/{:?}]",
            self.select_state.short(),
            self.sync_type(),
            self.frame_type()
        )
    }
}
