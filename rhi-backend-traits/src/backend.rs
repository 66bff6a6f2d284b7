//! The `Backend` trait: one Rust trait standing in for a
//! function-pointer dispatch table. `rhi::dispatch` stores exactly one
//! `Box<dyn Backend>` behind a `OnceLock`; every `rhi::api` function
//! forwards a call through it.
//!
//! Methods take `&self` rather than `&mut self` because the dispatch
//! cell only ever hands out a shared reference — each backend is
//! responsible for its own interior mutability at whichever boundaries
//! need one (an external `parking_lot::Mutex`/`RwLock` per subsystem,
//! not one big lock).

use rhi_types::*;

use crate::error::DeviceResult;

/// Implemented once per backend (`VulkanBackend`, and a stub
/// `OpenGlBackend`). Object-safe by construction: no generic methods,
/// no `impl Trait` outside of slices/`Vec`/`Box`.
pub trait Backend: Send + Sync {
    fn api(&self) -> GraphicsApi;

    /// Brings up the instance/device/queues/allocator/uploaders. Called
    /// once by `rhi::init`; never called again for the lifetime of the
    /// backend object.
    fn init(&self, desc: &InitDesc) -> DeviceResult<()>;

    /// Waits device-idle, then tears down in reverse bring-up order:
    /// swapchain, resource pools, staging allocator, deferred uploader,
    /// immediate uploader, queues, allocator, device, instance.
    /// Idempotent — a second call is a no-op.
    fn shutdown(&self);

    // ---- Buffers, textures, samplers ----

    fn create_buffer(&self, desc: &BufferDesc, initial_data: Option<&[u8]>) -> BufferHandle;
    fn destroy_buffer(&self, handle: BufferHandle);
    fn create_buffer_view(&self, desc: &BufferViewDesc) -> BufferViewHandle;
    fn destroy_buffer_view(&self, handle: BufferViewHandle);
    /// `None` for `GPU_ONLY` buffers; always `Some` for `CPU_TO_GPU`
    /// (persistent mapping).
    fn map_buffer(&self, handle: BufferHandle) -> Option<*mut u8>;
    fn unmap_buffer(&self, handle: BufferHandle);

    fn create_texture(&self, desc: &TextureDesc) -> TextureHandle;
    fn destroy_texture(&self, handle: TextureHandle);
    fn create_texture_view(&self, desc: &TextureViewDesc) -> TextureViewHandle;
    fn destroy_texture_view(&self, handle: TextureViewHandle);
    fn create_sampler(&self, desc: &SamplerDesc) -> SamplerHandle;
    fn destroy_sampler(&self, handle: SamplerHandle);

    fn create_shader(&self, desc: &ShaderDesc) -> ShaderHandle;
    fn destroy_shader(&self, handle: ShaderHandle);

    // ---- Uploads: immediate and deferred paths ----

    fn upload_buffer_immediate(&self, dst: BufferHandle, data: &[u8], dst_offset: u64);
    fn upload_texture_immediate(
        &self,
        dst: TextureHandle,
        data: &[u8],
        mip_level: u32,
        array_layer: u32,
    );
    fn begin_immediate_batch(&self);
    fn upload_buffer_batched(&self, dst: BufferHandle, data: &[u8], dst_offset: u64);
    fn upload_texture_batched(
        &self,
        dst: TextureHandle,
        data: &[u8],
        mip_level: u32,
        array_layer: u32,
    );
    fn end_immediate_batch(&self);

    fn queue_deferred_buffer_upload(&self, dst: BufferHandle, data: &[u8], dst_offset: u64);
    fn queue_deferred_texture_upload(
        &self,
        dst: TextureHandle,
        data: &[u8],
        mip_level: u32,
        array_layer: u32,
    );
    /// Records and submits every queued upload as one transfer-queue
    /// submission; returns the timeline value that retires it.
    fn flush_deferred_uploads(&self) -> Timeline;
    /// Recycles staging chunks whose stamped submission has completed.
    /// Callers typically call this once per frame with the transfer
    /// queue's current `completed()` value.
    fn retire_staging(&self, completed: Timeline);

    // ---- Descriptor subsystem ----

    fn create_set_layout(&self, desc: &SetLayoutDesc) -> SetLayoutHandle;
    fn destroy_set_layout(&self, handle: SetLayoutHandle);

    fn create_descriptor_pool(
        &self,
        layout: SetLayoutHandle,
        capacity: u32,
        flags: DescriptorPoolFlags,
    ) -> DescriptorPoolHandle;
    fn destroy_descriptor_pool(&self, handle: DescriptorPoolHandle);
    /// Legal only on a `LINEAR` pool; asserts otherwise.
    fn reset_descriptor_pool(&self, handle: DescriptorPoolHandle);

    fn allocate_set(&self, pool: DescriptorPoolHandle) -> DescriptorSetHandle;
    fn allocate_sets(&self, pool: DescriptorPoolHandle, count: u32) -> Vec<DescriptorSetHandle>;
    /// Asserts if `pool` is `LINEAR`.
    fn free_set(&self, pool: DescriptorPoolHandle, set: DescriptorSetHandle);

    fn write_set(&self, set: DescriptorSetHandle, writes: &[ResourceGroupBinding]);
    fn write_sets(&self, sets: &[DescriptorSetHandle], writes: &[&[ResourceGroupBinding]]);

    fn create_descriptor_heap(
        &self,
        heap_type: DescriptorHeapType,
        capacity: u32,
        shader_visible: bool,
    ) -> DescriptorHeapHandle;
    fn destroy_descriptor_heap(&self, handle: DescriptorHeapHandle);
    /// `(cpu_ptr_or_null, gpu_virtual_address, descriptor_byte_size)`.
    fn descriptor_heap_slot_ptr(
        &self,
        heap: DescriptorHeapHandle,
        index: u32,
    ) -> (Option<*mut u8>, u64, u32);

    /// Classifies the requested binding model from `desc.layout`'s
    /// flags and delegates to the sets or descriptor-buffer path,
    /// caching by content hash when the model is cacheable.
    fn create_resource_group_layout(&self, desc: &SetLayoutDesc) -> ResourceGroupLayoutHandle;
    fn destroy_resource_group_layout(&self, handle: ResourceGroupLayoutHandle);
    fn create_resource_group(&self, desc: &ResourceGroupDesc) -> ResourceGroupHandle;
    fn destroy_resource_group(&self, handle: ResourceGroupHandle);

    // ---- Pipeline layout + pipeline ----

    fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc) -> PipelineLayoutHandle;
    fn destroy_pipeline_layout(&self, handle: PipelineLayoutHandle);
    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> PipelineHandle;
    fn create_compute_pipeline(&self, desc: &ComputePipelineDesc) -> PipelineHandle;
    fn destroy_pipeline(&self, handle: PipelineHandle);

    // ---- Render pass + framebuffer ----

    fn create_render_pass(&self, desc: &RenderPassDesc) -> RenderPassHandle;
    fn destroy_render_pass(&self, handle: RenderPassHandle);
    fn create_framebuffer(&self, desc: &FramebufferDesc) -> FramebufferHandle;
    fn destroy_framebuffer(&self, handle: FramebufferHandle);

    // ---- Swapchain ----

    fn create_swapchain(&self, desc: &SwapchainDesc) -> DeviceResult<SwapchainHandle>;
    fn destroy_swapchain(&self, handle: SwapchainHandle);
    fn resize_swapchain(&self, handle: SwapchainHandle, width: u32, height: u32) -> DeviceResult<()>;
    /// Blocks (driver-internal `UINT64_MAX` timeout) until an image is
    /// available; returns its index.
    fn acquire_next_image(&self, handle: SwapchainHandle) -> DeviceResult<u32>;
    fn present(&self, handle: SwapchainHandle, queue: QueueType, image_index: u32) -> DeviceResult<()>;
    fn swapchain_image_view(&self, handle: SwapchainHandle, index: u32) -> TextureViewHandle;
    fn swapchain_format(&self, handle: SwapchainHandle) -> Format;
    fn swapchain_image_count(&self, handle: SwapchainHandle) -> u32;

    // ---- Command queue ----

    fn submit(&self, info: &SubmitInfo) -> Timeline;
    fn queue_wait(&self, queue: QueueType, timeline: Timeline, timeout_ns: u64) -> bool;
    fn queue_wait_idle(&self, queue: QueueType);
    fn queue_poll(&self, queue: QueueType, timeline: Timeline) -> bool;
    fn queue_completed(&self, queue: QueueType) -> Timeline;
    fn queue_submitted(&self, queue: QueueType) -> Timeline;

    // ---- Command allocator + command list ----

    fn create_command_allocator(&self, queue: QueueType) -> CommandAllocatorHandle;
    fn destroy_command_allocator(&self, handle: CommandAllocatorHandle);
    fn reset_command_allocator(&self, handle: CommandAllocatorHandle);
    fn allocate_command_list(&self, allocator: CommandAllocatorHandle) -> CommandListHandle;
    fn reset_command_list(&self, handle: CommandListHandle);

    fn cmd_open(&self, list: CommandListHandle);
    fn cmd_close(&self, list: CommandListHandle);
    fn cmd_set_pipeline(&self, list: CommandListHandle, pipeline: PipelineHandle);
    fn cmd_set_vertex_buffer(&self, list: CommandListHandle, buffer: BufferHandle, offset: u64);
    fn cmd_set_index_buffer(&self, list: CommandListHandle, buffer: BufferHandle, offset: u64);
    fn cmd_set_viewport(&self, list: CommandListHandle, viewport: Viewport);
    fn cmd_set_scissor(&self, list: CommandListHandle, scissor: Scissor);
    fn cmd_draw(&self, list: CommandListHandle, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32);
    fn cmd_draw_indexed(
        &self,
        list: CommandListHandle,
        index_count: u32,
        vertex_offset: i32,
        instance_count: u32,
        first_index: u32,
        first_instance: u32,
    );
    fn cmd_begin_render_pass(
        &self,
        list: CommandListHandle,
        render_pass: RenderPassHandle,
        framebuffer: FramebufferHandle,
        clears: &[ClearValue],
    );
    fn cmd_end_render_pass(&self, list: CommandListHandle);
    fn cmd_begin_rendering(&self, list: CommandListHandle, info: &RenderingInfo);
    fn cmd_end_rendering(&self, list: CommandListHandle);
    fn cmd_set_descriptor_set(&self, list: CommandListHandle, slot: u32, set: DescriptorSetHandle);
    fn cmd_set_descriptor_sets(&self, list: CommandListHandle, first: u32, sets: &[DescriptorSetHandle]);
    fn cmd_push_constants(&self, list: CommandListHandle, offset: u32, data: &[u8]);
    fn cmd_write_buffer(&self, list: CommandListHandle, dst: BufferHandle, offset: u64, data: &[u8]);
    fn cmd_barrier(&self, list: CommandListHandle, batch: &BarrierBatch);
}
