//! Thin `#[inline]` forwarders over the dispatch cell. Every function
//! here does exactly one thing — call the same-named method on
//! whatever backend `rhi::init` bound — so application code never
//! touches `rhi_backend_traits::Backend` or a concrete backend type
//! directly.

use rhi_backend_traits::DeviceResult;
use rhi_types::*;

use crate::dispatch::backend;

// ---- Buffers, textures, samplers ----

#[inline]
pub fn create_buffer(desc: &BufferDesc, initial_data: Option<&[u8]>) -> BufferHandle {
    backend().create_buffer(desc, initial_data)
}

#[inline]
pub fn destroy_buffer(handle: BufferHandle) {
    backend().destroy_buffer(handle)
}

#[inline]
pub fn create_buffer_view(desc: &BufferViewDesc) -> BufferViewHandle {
    backend().create_buffer_view(desc)
}

#[inline]
pub fn destroy_buffer_view(handle: BufferViewHandle) {
    backend().destroy_buffer_view(handle)
}

#[inline]
pub fn map_buffer(handle: BufferHandle) -> Option<*mut u8> {
    backend().map_buffer(handle)
}

#[inline]
pub fn unmap_buffer(handle: BufferHandle) {
    backend().unmap_buffer(handle)
}

#[inline]
pub fn create_texture(desc: &TextureDesc) -> TextureHandle {
    backend().create_texture(desc)
}

#[inline]
pub fn destroy_texture(handle: TextureHandle) {
    backend().destroy_texture(handle)
}

#[inline]
pub fn create_texture_view(desc: &TextureViewDesc) -> TextureViewHandle {
    backend().create_texture_view(desc)
}

#[inline]
pub fn destroy_texture_view(handle: TextureViewHandle) {
    backend().destroy_texture_view(handle)
}

#[inline]
pub fn create_sampler(desc: &SamplerDesc) -> SamplerHandle {
    backend().create_sampler(desc)
}

#[inline]
pub fn destroy_sampler(handle: SamplerHandle) {
    backend().destroy_sampler(handle)
}

#[inline]
pub fn create_shader(desc: &ShaderDesc) -> ShaderHandle {
    backend().create_shader(desc)
}

#[inline]
pub fn destroy_shader(handle: ShaderHandle) {
    backend().destroy_shader(handle)
}

// ---- Uploads ----

#[inline]
pub fn upload_buffer_immediate(dst: BufferHandle, data: &[u8], dst_offset: u64) {
    backend().upload_buffer_immediate(dst, data, dst_offset)
}

#[inline]
pub fn upload_texture_immediate(dst: TextureHandle, data: &[u8], mip_level: u32, array_layer: u32) {
    backend().upload_texture_immediate(dst, data, mip_level, array_layer)
}

#[inline]
pub fn begin_immediate_batch() {
    backend().begin_immediate_batch()
}

#[inline]
pub fn upload_buffer_batched(dst: BufferHandle, data: &[u8], dst_offset: u64) {
    backend().upload_buffer_batched(dst, data, dst_offset)
}

#[inline]
pub fn upload_texture_batched(dst: TextureHandle, data: &[u8], mip_level: u32, array_layer: u32) {
    backend().upload_texture_batched(dst, data, mip_level, array_layer)
}

#[inline]
pub fn end_immediate_batch() {
    backend().end_immediate_batch()
}

#[inline]
pub fn queue_deferred_buffer_upload(dst: BufferHandle, data: &[u8], dst_offset: u64) {
    backend().queue_deferred_buffer_upload(dst, data, dst_offset)
}

#[inline]
pub fn queue_deferred_texture_upload(dst: TextureHandle, data: &[u8], mip_level: u32, array_layer: u32) {
    backend().queue_deferred_texture_upload(dst, data, mip_level, array_layer)
}

#[inline]
pub fn flush_deferred_uploads() -> Timeline {
    backend().flush_deferred_uploads()
}

#[inline]
pub fn retire_staging(completed: Timeline) {
    backend().retire_staging(completed)
}

// ---- Descriptor subsystem ----

#[inline]
pub fn create_set_layout(desc: &SetLayoutDesc) -> SetLayoutHandle {
    backend().create_set_layout(desc)
}

#[inline]
pub fn destroy_set_layout(handle: SetLayoutHandle) {
    backend().destroy_set_layout(handle)
}

#[inline]
pub fn create_descriptor_pool(
    layout: SetLayoutHandle,
    capacity: u32,
    flags: DescriptorPoolFlags,
) -> DescriptorPoolHandle {
    backend().create_descriptor_pool(layout, capacity, flags)
}

#[inline]
pub fn destroy_descriptor_pool(handle: DescriptorPoolHandle) {
    backend().destroy_descriptor_pool(handle)
}

#[inline]
pub fn reset_descriptor_pool(handle: DescriptorPoolHandle) {
    backend().reset_descriptor_pool(handle)
}

#[inline]
pub fn allocate_set(pool: DescriptorPoolHandle) -> DescriptorSetHandle {
    backend().allocate_set(pool)
}

#[inline]
pub fn allocate_sets(pool: DescriptorPoolHandle, count: u32) -> Vec<DescriptorSetHandle> {
    backend().allocate_sets(pool, count)
}

#[inline]
pub fn free_set(pool: DescriptorPoolHandle, set: DescriptorSetHandle) {
    backend().free_set(pool, set)
}

#[inline]
pub fn write_set(set: DescriptorSetHandle, writes: &[ResourceGroupBinding]) {
    backend().write_set(set, writes)
}

#[inline]
pub fn write_sets(sets: &[DescriptorSetHandle], writes: &[&[ResourceGroupBinding]]) {
    backend().write_sets(sets, writes)
}

#[inline]
pub fn create_descriptor_heap(
    heap_type: DescriptorHeapType,
    capacity: u32,
    shader_visible: bool,
) -> DescriptorHeapHandle {
    backend().create_descriptor_heap(heap_type, capacity, shader_visible)
}

#[inline]
pub fn destroy_descriptor_heap(handle: DescriptorHeapHandle) {
    backend().destroy_descriptor_heap(handle)
}

#[inline]
pub fn descriptor_heap_slot_ptr(heap: DescriptorHeapHandle, index: u32) -> (Option<*mut u8>, u64, u32) {
    backend().descriptor_heap_slot_ptr(heap, index)
}

#[inline]
pub fn create_resource_group_layout(desc: &SetLayoutDesc) -> ResourceGroupLayoutHandle {
    backend().create_resource_group_layout(desc)
}

#[inline]
pub fn destroy_resource_group_layout(handle: ResourceGroupLayoutHandle) {
    backend().destroy_resource_group_layout(handle)
}

#[inline]
pub fn create_resource_group(desc: &ResourceGroupDesc) -> ResourceGroupHandle {
    backend().create_resource_group(desc)
}

#[inline]
pub fn destroy_resource_group(handle: ResourceGroupHandle) {
    backend().destroy_resource_group(handle)
}

// ---- Pipeline layout + pipeline ----

#[inline]
pub fn create_pipeline_layout(desc: &PipelineLayoutDesc) -> PipelineLayoutHandle {
    backend().create_pipeline_layout(desc)
}

#[inline]
pub fn destroy_pipeline_layout(handle: PipelineLayoutHandle) {
    backend().destroy_pipeline_layout(handle)
}

#[inline]
pub fn create_graphics_pipeline(desc: &GraphicsPipelineDesc) -> PipelineHandle {
    backend().create_graphics_pipeline(desc)
}

#[inline]
pub fn create_compute_pipeline(desc: &ComputePipelineDesc) -> PipelineHandle {
    backend().create_compute_pipeline(desc)
}

#[inline]
pub fn destroy_pipeline(handle: PipelineHandle) {
    backend().destroy_pipeline(handle)
}

// ---- Render pass + framebuffer ----

#[inline]
pub fn create_render_pass(desc: &RenderPassDesc) -> RenderPassHandle {
    backend().create_render_pass(desc)
}

#[inline]
pub fn destroy_render_pass(handle: RenderPassHandle) {
    backend().destroy_render_pass(handle)
}

#[inline]
pub fn create_framebuffer(desc: &FramebufferDesc) -> FramebufferHandle {
    backend().create_framebuffer(desc)
}

#[inline]
pub fn destroy_framebuffer(handle: FramebufferHandle) {
    backend().destroy_framebuffer(handle)
}

// ---- Swapchain ----

#[inline]
pub fn create_swapchain(desc: &SwapchainDesc) -> DeviceResult<SwapchainHandle> {
    backend().create_swapchain(desc)
}

#[inline]
pub fn destroy_swapchain(handle: SwapchainHandle) {
    backend().destroy_swapchain(handle)
}

#[inline]
pub fn resize_swapchain(handle: SwapchainHandle, width: u32, height: u32) -> DeviceResult<()> {
    backend().resize_swapchain(handle, width, height)
}

#[inline]
pub fn acquire_next_image(handle: SwapchainHandle) -> DeviceResult<u32> {
    backend().acquire_next_image(handle)
}

#[inline]
pub fn present(handle: SwapchainHandle, queue: QueueType, image_index: u32) -> DeviceResult<()> {
    backend().present(handle, queue, image_index)
}

#[inline]
pub fn swapchain_image_view(handle: SwapchainHandle, index: u32) -> TextureViewHandle {
    backend().swapchain_image_view(handle, index)
}

#[inline]
pub fn swapchain_format(handle: SwapchainHandle) -> Format {
    backend().swapchain_format(handle)
}

#[inline]
pub fn swapchain_image_count(handle: SwapchainHandle) -> u32 {
    backend().swapchain_image_count(handle)
}

// ---- Command queue ----

#[inline]
pub fn submit(info: &SubmitInfo) -> Timeline {
    backend().submit(info)
}

#[inline]
pub fn queue_wait(queue: QueueType, timeline: Timeline, timeout_ns: u64) -> bool {
    backend().queue_wait(queue, timeline, timeout_ns)
}

#[inline]
pub fn queue_wait_idle(queue: QueueType) {
    backend().queue_wait_idle(queue)
}

#[inline]
pub fn queue_poll(queue: QueueType, timeline: Timeline) -> bool {
    backend().queue_poll(queue, timeline)
}

#[inline]
pub fn queue_completed(queue: QueueType) -> Timeline {
    backend().queue_completed(queue)
}

#[inline]
pub fn queue_submitted(queue: QueueType) -> Timeline {
    backend().queue_submitted(queue)
}

// ---- Command allocator + command list ----

#[inline]
pub fn create_command_allocator(queue: QueueType) -> CommandAllocatorHandle {
    backend().create_command_allocator(queue)
}

#[inline]
pub fn destroy_command_allocator(handle: CommandAllocatorHandle) {
    backend().destroy_command_allocator(handle)
}

#[inline]
pub fn reset_command_allocator(handle: CommandAllocatorHandle) {
    backend().reset_command_allocator(handle)
}

#[inline]
pub fn allocate_command_list(allocator: CommandAllocatorHandle) -> CommandListHandle {
    backend().allocate_command_list(allocator)
}

#[inline]
pub fn reset_command_list(handle: CommandListHandle) {
    backend().reset_command_list(handle)
}

#[inline]
pub fn cmd_open(list: CommandListHandle) {
    backend().cmd_open(list)
}

#[inline]
pub fn cmd_close(list: CommandListHandle) {
    backend().cmd_close(list)
}

#[inline]
pub fn cmd_set_pipeline(list: CommandListHandle, pipeline: PipelineHandle) {
    backend().cmd_set_pipeline(list, pipeline)
}

#[inline]
pub fn cmd_set_vertex_buffer(list: CommandListHandle, buffer: BufferHandle, offset: u64) {
    backend().cmd_set_vertex_buffer(list, buffer, offset)
}

#[inline]
pub fn cmd_set_index_buffer(list: CommandListHandle, buffer: BufferHandle, offset: u64) {
    backend().cmd_set_index_buffer(list, buffer, offset)
}

#[inline]
pub fn cmd_set_viewport(list: CommandListHandle, viewport: Viewport) {
    backend().cmd_set_viewport(list, viewport)
}

#[inline]
pub fn cmd_set_scissor(list: CommandListHandle, scissor: Scissor) {
    backend().cmd_set_scissor(list, scissor)
}

#[inline]
pub fn cmd_draw(list: CommandListHandle, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
    backend().cmd_draw(list, vertex_count, instance_count, first_vertex, first_instance)
}

#[inline]
pub fn cmd_draw_indexed(
    list: CommandListHandle,
    index_count: u32,
    vertex_offset: i32,
    instance_count: u32,
    first_index: u32,
    first_instance: u32,
) {
    backend().cmd_draw_indexed(list, index_count, vertex_offset, instance_count, first_index, first_instance)
}

#[inline]
pub fn cmd_begin_render_pass(
    list: CommandListHandle,
    render_pass: RenderPassHandle,
    framebuffer: FramebufferHandle,
    clears: &[ClearValue],
) {
    backend().cmd_begin_render_pass(list, render_pass, framebuffer, clears)
}

#[inline]
pub fn cmd_end_render_pass(list: CommandListHandle) {
    backend().cmd_end_render_pass(list)
}

#[inline]
pub fn cmd_begin_rendering(list: CommandListHandle, info: &RenderingInfo) {
    backend().cmd_begin_rendering(list, info)
}

#[inline]
pub fn cmd_end_rendering(list: CommandListHandle) {
    backend().cmd_end_rendering(list)
}

#[inline]
pub fn cmd_set_descriptor_set(list: CommandListHandle, slot: u32, set: DescriptorSetHandle) {
    backend().cmd_set_descriptor_set(list, slot, set)
}

#[inline]
pub fn cmd_set_descriptor_sets(list: CommandListHandle, first: u32, sets: &[DescriptorSetHandle]) {
    backend().cmd_set_descriptor_sets(list, first, sets)
}

#[inline]
pub fn cmd_push_constants(list: CommandListHandle, offset: u32, data: &[u8]) {
    backend().cmd_push_constants(list, offset, data)
}

#[inline]
pub fn cmd_write_buffer(list: CommandListHandle, dst: BufferHandle, offset: u64, data: &[u8]) {
    backend().cmd_write_buffer(list, dst, offset, data)
}

#[inline]
pub fn cmd_barrier(list: CommandListHandle, batch: &BarrierBatch) {
    backend().cmd_barrier(list, batch)
}
