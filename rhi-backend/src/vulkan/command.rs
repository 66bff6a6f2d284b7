//! Pool-backed recording contexts and the `CommandList` state machine
//! that gates which encoding calls are legal in which recording state.

use std::collections::HashMap;

use ash::vk;
use rhi_types::{
    BufferHandle, PipelineHandle, PipelineLayoutHandle, QueueType, TextureHandle,
};

use super::resource_state::AccessState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Initial,
    Recording,
    Executable,
    Submitted,
    Completed,
    Invalid,
}

pub struct CommandAllocator {
    pub pool: vk::CommandPool,
    pub queue_type: QueueType,
}

/// Shadow state the public contract does not require for correctness
/// (automatic cross-command barriers are a non-goal) but which backs
/// batching decisions and precondition assertions.
pub struct CommandList {
    pub buffer: vk::CommandBuffer,
    pub allocator_queue_type: QueueType,
    pub state: RecordingState,
    pub bound_pipeline: Option<PipelineHandle>,
    pub bound_layout: Option<PipelineLayoutHandle>,
    pub bound_vertex_buffer: Option<(BufferHandle, u64)>,
    pub bound_index_buffer: Option<(BufferHandle, u64)>,
    pub push_constant_stage_mask: vk::ShaderStageFlags,
    pub in_render_pass: bool,
    pub touched_buffers: HashMap<BufferHandle, AccessState>,
    pub touched_textures: HashMap<TextureHandle, AccessState>,
}

impl CommandList {
    pub fn new(buffer: vk::CommandBuffer, queue_type: QueueType) -> Self {
        Self {
            buffer,
            allocator_queue_type: queue_type,
            state: RecordingState::Initial,
            bound_pipeline: None,
            bound_layout: None,
            bound_vertex_buffer: None,
            bound_index_buffer: None,
            push_constant_stage_mask: vk::ShaderStageFlags::empty(),
            in_render_pass: false,
            touched_buffers: HashMap::new(),
            touched_textures: HashMap::new(),
        }
    }

    fn reset_shadow_state(&mut self) {
        self.bound_pipeline = None;
        self.bound_layout = None;
        self.bound_vertex_buffer = None;
        self.bound_index_buffer = None;
        self.push_constant_stage_mask = vk::ShaderStageFlags::empty();
        self.in_render_pass = false;
        self.touched_buffers.clear();
        self.touched_textures.clear();
    }

    pub fn assert_state(&self, expected: RecordingState) {
        assert_eq!(
            self.state, expected,
            "command list precondition violated: expected {expected:?}, was {:?}",
            self.state
        );
    }

    pub fn open(&mut self) {
        self.assert_state(RecordingState::Initial);
        self.state = RecordingState::Recording;
    }

    pub fn close(&mut self) {
        self.assert_state(RecordingState::Recording);
        assert!(!self.in_render_pass, "close called with an open render pass");
        self.state = RecordingState::Executable;
    }

    pub fn mark_submitted(&mut self) {
        self.assert_state(RecordingState::Executable);
        self.state = RecordingState::Submitted;
    }

    pub fn mark_completed(&mut self) {
        self.assert_state(RecordingState::Submitted);
        self.state = RecordingState::Completed;
    }

    /// Returns the list to `INITIAL`, legal from any state except
    /// `Submitted` (the caller must observe completion first, or call
    /// `mark_completed` immediately before reset if it already waited).
    pub fn reset(&mut self) {
        assert_ne!(
            self.state,
            RecordingState::Submitted,
            "reset called on a command list still in flight"
        );
        self.reset_shadow_state();
        self.state = RecordingState::Initial;
    }

    pub fn mark_invalid(&mut self) {
        self.state = RecordingState::Invalid;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> CommandList {
        CommandList::new(vk::CommandBuffer::null(), QueueType::Graphics)
    }

    #[test]
    fn happy_path_state_sequence() {
        let mut list = fresh();
        assert_eq!(list.state, RecordingState::Initial);
        list.open();
        assert_eq!(list.state, RecordingState::Recording);
        list.close();
        assert_eq!(list.state, RecordingState::Executable);
        list.mark_submitted();
        assert_eq!(list.state, RecordingState::Submitted);
        list.mark_completed();
        assert_eq!(list.state, RecordingState::Completed);
    }

    #[test]
    #[should_panic(expected = "precondition violated")]
    fn close_before_open_panics() {
        let mut list = fresh();
        list.close();
    }

    #[test]
    #[should_panic(expected = "open render pass")]
    fn close_with_open_render_pass_panics() {
        let mut list = fresh();
        list.open();
        list.in_render_pass = true;
        list.close();
    }

    #[test]
    fn reset_clears_shadow_state() {
        let mut list = fresh();
        list.open();
        list.bound_vertex_buffer = Some((rhi_types::Handle::from_raw(1), 16));
        list.close();
        list.mark_submitted();
        list.mark_completed();
        list.reset();
        assert_eq!(list.state, RecordingState::Initial);
        assert!(list.bound_vertex_buffer.is_none());
    }

    #[test]
    #[should_panic(expected = "still in flight")]
    fn reset_while_submitted_panics() {
        let mut list = fresh();
        list.open();
        list.close();
        list.mark_submitted();
        list.reset();
    }
}
