//! Stub OpenGL backend. `init`/`shutdown` are real (enough to let a
//! caller probe for the API and back out cleanly); every other
//! `Backend` method logs at `warn` and hands back an invalid handle or
//! a harmless default, matching the "not implemented" policy decided
//! for this backend.

use rhi_backend_traits::{Backend, DeviceError, DeviceResult};
use rhi_types::*;

macro_rules! not_implemented {
    ($name:expr) => {
        log::warn!("OpenGlBackend::{} is not implemented", $name)
    };
}

#[derive(Default)]
pub struct OpenGlBackend;

impl OpenGlBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Backend for OpenGlBackend {
    fn api(&self) -> GraphicsApi {
        GraphicsApi::OpenGl
    }

    fn init(&self, _desc: &InitDesc) -> DeviceResult<()> {
        log::info!("OpenGlBackend::init: this backend only implements init/shutdown");
        Ok(())
    }

    fn shutdown(&self) {}

    fn create_buffer(&self, _desc: &BufferDesc, _initial_data: Option<&[u8]>) -> BufferHandle {
        not_implemented!("create_buffer");
        BufferHandle::INVALID
    }

    fn destroy_buffer(&self, _handle: BufferHandle) {
        not_implemented!("destroy_buffer");
    }

    fn create_buffer_view(&self, _desc: &BufferViewDesc) -> BufferViewHandle {
        not_implemented!("create_buffer_view");
        BufferViewHandle::INVALID
    }

    fn destroy_buffer_view(&self, _handle: BufferViewHandle) {
        not_implemented!("destroy_buffer_view");
    }

    fn map_buffer(&self, _handle: BufferHandle) -> Option<*mut u8> {
        not_implemented!("map_buffer");
        None
    }

    fn unmap_buffer(&self, _handle: BufferHandle) {
        not_implemented!("unmap_buffer");
    }

    fn create_texture(&self, _desc: &TextureDesc) -> TextureHandle {
        not_implemented!("create_texture");
        TextureHandle::INVALID
    }

    fn destroy_texture(&self, _handle: TextureHandle) {
        not_implemented!("destroy_texture");
    }

    fn create_texture_view(&self, _desc: &TextureViewDesc) -> TextureViewHandle {
        not_implemented!("create_texture_view");
        TextureViewHandle::INVALID
    }

    fn destroy_texture_view(&self, _handle: TextureViewHandle) {
        not_implemented!("destroy_texture_view");
    }

    fn create_sampler(&self, _desc: &SamplerDesc) -> SamplerHandle {
        not_implemented!("create_sampler");
        SamplerHandle::INVALID
    }

    fn destroy_sampler(&self, _handle: SamplerHandle) {
        not_implemented!("destroy_sampler");
    }

    fn create_shader(&self, _desc: &ShaderDesc) -> ShaderHandle {
        not_implemented!("create_shader");
        ShaderHandle::INVALID
    }

    fn destroy_shader(&self, _handle: ShaderHandle) {
        not_implemented!("destroy_shader");
    }

    fn upload_buffer_immediate(&self, _dst: BufferHandle, _data: &[u8], _dst_offset: u64) {
        not_implemented!("upload_buffer_immediate");
    }

    fn upload_texture_immediate(
        &self,
        _dst: TextureHandle,
        _data: &[u8],
        _mip_level: u32,
        _array_layer: u32,
    ) {
        not_implemented!("upload_texture_immediate");
    }

    fn begin_immediate_batch(&self) {
        not_implemented!("begin_immediate_batch");
    }

    fn upload_buffer_batched(&self, _dst: BufferHandle, _data: &[u8], _dst_offset: u64) {
        not_implemented!("upload_buffer_batched");
    }

    fn upload_texture_batched(
        &self,
        _dst: TextureHandle,
        _data: &[u8],
        _mip_level: u32,
        _array_layer: u32,
    ) {
        not_implemented!("upload_texture_batched");
    }

    fn end_immediate_batch(&self) {
        not_implemented!("end_immediate_batch");
    }

    fn queue_deferred_buffer_upload(&self, _dst: BufferHandle, _data: &[u8], _dst_offset: u64) {
        not_implemented!("queue_deferred_buffer_upload");
    }

    fn queue_deferred_texture_upload(
        &self,
        _dst: TextureHandle,
        _data: &[u8],
        _mip_level: u32,
        _array_layer: u32,
    ) {
        not_implemented!("queue_deferred_texture_upload");
    }

    fn flush_deferred_uploads(&self) -> Timeline {
        not_implemented!("flush_deferred_uploads");
        Timeline(0)
    }

    fn retire_staging(&self, _completed: Timeline) {
        not_implemented!("retire_staging");
    }

    fn create_set_layout(&self, _desc: &SetLayoutDesc) -> SetLayoutHandle {
        not_implemented!("create_set_layout");
        SetLayoutHandle::INVALID
    }

    fn destroy_set_layout(&self, _handle: SetLayoutHandle) {
        not_implemented!("destroy_set_layout");
    }

    fn create_descriptor_pool(
        &self,
        _layout: SetLayoutHandle,
        _capacity: u32,
        _flags: DescriptorPoolFlags,
    ) -> DescriptorPoolHandle {
        not_implemented!("create_descriptor_pool");
        DescriptorPoolHandle::INVALID
    }

    fn destroy_descriptor_pool(&self, _handle: DescriptorPoolHandle) {
        not_implemented!("destroy_descriptor_pool");
    }

    fn reset_descriptor_pool(&self, _handle: DescriptorPoolHandle) {
        not_implemented!("reset_descriptor_pool");
    }

    fn allocate_set(&self, _pool: DescriptorPoolHandle) -> DescriptorSetHandle {
        not_implemented!("allocate_set");
        DescriptorSetHandle::INVALID
    }

    fn allocate_sets(&self, _pool: DescriptorPoolHandle, _count: u32) -> Vec<DescriptorSetHandle> {
        not_implemented!("allocate_sets");
        Vec::new()
    }

    fn free_set(&self, _pool: DescriptorPoolHandle, _set: DescriptorSetHandle) {
        not_implemented!("free_set");
    }

    fn write_set(&self, _set: DescriptorSetHandle, _writes: &[ResourceGroupBinding]) {
        not_implemented!("write_set");
    }

    fn write_sets(&self, _sets: &[DescriptorSetHandle], _writes: &[&[ResourceGroupBinding]]) {
        not_implemented!("write_sets");
    }

    fn create_descriptor_heap(
        &self,
        _heap_type: DescriptorHeapType,
        _capacity: u32,
        _shader_visible: bool,
    ) -> DescriptorHeapHandle {
        not_implemented!("create_descriptor_heap");
        DescriptorHeapHandle::INVALID
    }

    fn destroy_descriptor_heap(&self, _handle: DescriptorHeapHandle) {
        not_implemented!("destroy_descriptor_heap");
    }

    fn descriptor_heap_slot_ptr(
        &self,
        _heap: DescriptorHeapHandle,
        _index: u32,
    ) -> (Option<*mut u8>, u64, u32) {
        not_implemented!("descriptor_heap_slot_ptr");
        (None, 0, 0)
    }

    fn create_resource_group_layout(&self, _desc: &SetLayoutDesc) -> ResourceGroupLayoutHandle {
        not_implemented!("create_resource_group_layout");
        ResourceGroupLayoutHandle::INVALID
    }

    fn destroy_resource_group_layout(&self, _handle: ResourceGroupLayoutHandle) {
        not_implemented!("destroy_resource_group_layout");
    }

    fn create_resource_group(&self, _desc: &ResourceGroupDesc) -> ResourceGroupHandle {
        not_implemented!("create_resource_group");
        ResourceGroupHandle::INVALID
    }

    fn destroy_resource_group(&self, _handle: ResourceGroupHandle) {
        not_implemented!("destroy_resource_group");
    }

    fn create_pipeline_layout(&self, _desc: &PipelineLayoutDesc) -> PipelineLayoutHandle {
        not_implemented!("create_pipeline_layout");
        PipelineLayoutHandle::INVALID
    }

    fn destroy_pipeline_layout(&self, _handle: PipelineLayoutHandle) {
        not_implemented!("destroy_pipeline_layout");
    }

    fn create_graphics_pipeline(&self, _desc: &GraphicsPipelineDesc) -> PipelineHandle {
        not_implemented!("create_graphics_pipeline");
        PipelineHandle::INVALID
    }

    fn create_compute_pipeline(&self, _desc: &ComputePipelineDesc) -> PipelineHandle {
        not_implemented!("create_compute_pipeline");
        PipelineHandle::INVALID
    }

    fn destroy_pipeline(&self, _handle: PipelineHandle) {
        not_implemented!("destroy_pipeline");
    }

    fn create_render_pass(&self, _desc: &RenderPassDesc) -> RenderPassHandle {
        not_implemented!("create_render_pass");
        RenderPassHandle::INVALID
    }

    fn destroy_render_pass(&self, _handle: RenderPassHandle) {
        not_implemented!("destroy_render_pass");
    }

    fn create_framebuffer(&self, _desc: &FramebufferDesc) -> FramebufferHandle {
        not_implemented!("create_framebuffer");
        FramebufferHandle::INVALID
    }

    fn destroy_framebuffer(&self, _handle: FramebufferHandle) {
        not_implemented!("destroy_framebuffer");
    }

    fn create_swapchain(&self, _desc: &SwapchainDesc) -> DeviceResult<SwapchainHandle> {
        not_implemented!("create_swapchain");
        Err(DeviceError::Backend(
            "OpenGlBackend does not implement swapchain support".to_string(),
        ))
    }

    fn destroy_swapchain(&self, _handle: SwapchainHandle) {
        not_implemented!("destroy_swapchain");
    }

    fn resize_swapchain(&self, _handle: SwapchainHandle, _width: u32, _height: u32) -> DeviceResult<()> {
        not_implemented!("resize_swapchain");
        Err(DeviceError::Backend(
            "OpenGlBackend does not implement swapchain support".to_string(),
        ))
    }

    fn acquire_next_image(&self, _handle: SwapchainHandle) -> DeviceResult<u32> {
        not_implemented!("acquire_next_image");
        Err(DeviceError::Backend(
            "OpenGlBackend does not implement swapchain support".to_string(),
        ))
    }

    fn present(&self, _handle: SwapchainHandle, _queue: QueueType, _image_index: u32) -> DeviceResult<()> {
        not_implemented!("present");
        Err(DeviceError::Backend(
            "OpenGlBackend does not implement swapchain support".to_string(),
        ))
    }

    fn swapchain_image_view(&self, _handle: SwapchainHandle, _index: u32) -> TextureViewHandle {
        not_implemented!("swapchain_image_view");
        TextureViewHandle::INVALID
    }

    fn swapchain_format(&self, _handle: SwapchainHandle) -> Format {
        not_implemented!("swapchain_format");
        Format::Undefined
    }

    fn swapchain_image_count(&self, _handle: SwapchainHandle) -> u32 {
        not_implemented!("swapchain_image_count");
        0
    }

    fn submit(&self, _info: &SubmitInfo) -> Timeline {
        not_implemented!("submit");
        Timeline(0)
    }

    fn queue_wait(&self, _queue: QueueType, _timeline: Timeline, _timeout_ns: u64) -> bool {
        not_implemented!("queue_wait");
        false
    }

    fn queue_wait_idle(&self, _queue: QueueType) {
        not_implemented!("queue_wait_idle");
    }

    fn queue_poll(&self, _queue: QueueType, _timeline: Timeline) -> bool {
        not_implemented!("queue_poll");
        false
    }

    fn queue_completed(&self, _queue: QueueType) -> Timeline {
        not_implemented!("queue_completed");
        Timeline(0)
    }

    fn queue_submitted(&self, _queue: QueueType) -> Timeline {
        not_implemented!("queue_submitted");
        Timeline(0)
    }

    fn create_command_allocator(&self, _queue: QueueType) -> CommandAllocatorHandle {
        not_implemented!("create_command_allocator");
        CommandAllocatorHandle::INVALID
    }

    fn destroy_command_allocator(&self, _handle: CommandAllocatorHandle) {
        not_implemented!("destroy_command_allocator");
    }

    fn reset_command_allocator(&self, _handle: CommandAllocatorHandle) {
        not_implemented!("reset_command_allocator");
    }

    fn allocate_command_list(&self, _allocator: CommandAllocatorHandle) -> CommandListHandle {
        not_implemented!("allocate_command_list");
        CommandListHandle::INVALID
    }

    fn reset_command_list(&self, _handle: CommandListHandle) {
        not_implemented!("reset_command_list");
    }

    fn cmd_open(&self, _list: CommandListHandle) {
        not_implemented!("cmd_open");
    }

    fn cmd_close(&self, _list: CommandListHandle) {
        not_implemented!("cmd_close");
    }

    fn cmd_set_pipeline(&self, _list: CommandListHandle, _pipeline: PipelineHandle) {
        not_implemented!("cmd_set_pipeline");
    }

    fn cmd_set_vertex_buffer(&self, _list: CommandListHandle, _buffer: BufferHandle, _offset: u64) {
        not_implemented!("cmd_set_vertex_buffer");
    }

    fn cmd_set_index_buffer(&self, _list: CommandListHandle, _buffer: BufferHandle, _offset: u64) {
        not_implemented!("cmd_set_index_buffer");
    }

    fn cmd_set_viewport(&self, _list: CommandListHandle, _viewport: Viewport) {
        not_implemented!("cmd_set_viewport");
    }

    fn cmd_set_scissor(&self, _list: CommandListHandle, _scissor: Scissor) {
        not_implemented!("cmd_set_scissor");
    }

    fn cmd_draw(
        &self,
        _list: CommandListHandle,
        _vertex_count: u32,
        _instance_count: u32,
        _first_vertex: u32,
        _first_instance: u32,
    ) {
        not_implemented!("cmd_draw");
    }

    fn cmd_draw_indexed(
        &self,
        _list: CommandListHandle,
        _index_count: u32,
        _vertex_offset: i32,
        _instance_count: u32,
        _first_index: u32,
        _first_instance: u32,
    ) {
        not_implemented!("cmd_draw_indexed");
    }

    fn cmd_begin_render_pass(
        &self,
        _list: CommandListHandle,
        _render_pass: RenderPassHandle,
        _framebuffer: FramebufferHandle,
        _clears: &[ClearValue],
    ) {
        not_implemented!("cmd_begin_render_pass");
    }

    fn cmd_end_render_pass(&self, _list: CommandListHandle) {
        not_implemented!("cmd_end_render_pass");
    }

    fn cmd_begin_rendering(&self, _list: CommandListHandle, _info: &RenderingInfo) {
        not_implemented!("cmd_begin_rendering");
    }

    fn cmd_end_rendering(&self, _list: CommandListHandle) {
        not_implemented!("cmd_end_rendering");
    }

    fn cmd_set_descriptor_set(&self, _list: CommandListHandle, _slot: u32, _set: DescriptorSetHandle) {
        not_implemented!("cmd_set_descriptor_set");
    }

    fn cmd_set_descriptor_sets(&self, _list: CommandListHandle, _first: u32, _sets: &[DescriptorSetHandle]) {
        not_implemented!("cmd_set_descriptor_sets");
    }

    fn cmd_push_constants(&self, _list: CommandListHandle, _offset: u32, _data: &[u8]) {
        not_implemented!("cmd_push_constants");
    }

    fn cmd_write_buffer(&self, _list: CommandListHandle, _dst: BufferHandle, _offset: u64, _data: &[u8]) {
        not_implemented!("cmd_write_buffer");
    }

    fn cmd_barrier(&self, _list: CommandListHandle, _batch: &BarrierBatch) {
        not_implemented!("cmd_barrier");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_opengl_api() {
        let backend = OpenGlBackend::new();
        assert_eq!(backend.api(), GraphicsApi::OpenGl);
    }

    #[test]
    fn init_and_shutdown_are_no_ops() {
        let backend = OpenGlBackend::new();
        let desc = InitDesc {
            api: GraphicsApi::OpenGl,
            app_name: "test".to_string(),
            enable_validation: false,
            surface: None,
        };
        assert!(backend.init(&desc).is_ok());
        backend.shutdown();
    }

    #[test]
    fn unimplemented_calls_return_invalid_handles() {
        let backend = OpenGlBackend::new();
        assert!(!backend.create_buffer(&BufferDesc::default(), None).is_valid());
        assert!(backend.create_swapchain(&SwapchainDesc::default()).is_err());
    }
}
