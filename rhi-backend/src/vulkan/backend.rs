//! `VulkanBackend`: the single type that implements
//! `rhi_backend_traits::Backend`. Owns every subsystem built up in this
//! module (instance, device, allocator, uploaders, descriptor storage,
//! pipelines, swapchains, queues, command lists) behind a `OnceLock`
//! that's populated once by `init`.
//!
//! One struct owns every Vulkan subsystem, with per-resource-kind
//! storage tables and a handful of cross-cutting mutexes rather than
//! one global lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use ash::khr;
use ash::vk;
use parking_lot::{Mutex, RwLock};

use rhi_backend_traits::{Backend, DeviceError, DeviceResult};
use rhi_types::*;

use super::command::{CommandAllocator, CommandList, RecordingState};
use super::descriptor::{
    self, BindingModel, VulkanDescriptorHeap, VulkanDescriptorPool, VulkanDescriptorSet,
    VulkanSetLayout,
};
use super::device::LogicalDevice;
use super::format_mapping::{
    buffer_usage_to_vk, descriptor_type_to_vk, filter_to_vk, format_to_vk, shader_stage_to_vk,
    texture_type_to_vk_image_type, texture_type_to_vk_view_type, texture_usage_to_vk, wrap_to_vk,
};
use super::instance::Instance;
use super::memory::MemoryAllocator;
use super::phy_device::PhyDevice;
use super::pipeline::{
    self, build_push_constant_ranges, color_blend_attachment_state, depth_stencil_state,
    dynamic_rendering_info, input_assembly_state, multisample_state, rasterization_state,
    validate_pipeline_layout_desc, vertex_input_attributes, vertex_input_bindings,
    VulkanPipeline, VulkanPipelineLayout, DYNAMIC_STATES,
};
use super::queue::{CommandQueue, SubmitRequest, SwapchainSync};
use super::render_pass::{
    build_attachment_descriptions, color_attachment_references, depth_attachment_reference,
    VulkanFramebuffer, VulkanRenderPass,
};
use super::resource_state::SparseTextureState;
use super::resources::{
    buffer_view_content_hash, undefined_access_state, VulkanBuffer, VulkanBufferView, VulkanSampler,
    VulkanShader, VulkanTexture, VulkanTextureView,
};
use super::staging::StagingAllocator;
use super::swapchain::Swapchain;
use super::upload::{DeferredUploader, ImmediateUploader};

fn queue_index(ty: QueueType) -> usize {
    match ty {
        QueueType::Graphics => 0,
        QueueType::Compute => 1,
        QueueType::Transfer => 2,
    }
}

/// A resolved `ResourceGroup`: which concrete set storage backs it, plus
/// enough bookkeeping to free it and to evict it from the content-hash
/// cache on destroy.
struct VulkanResourceGroup {
    pool: DescriptorPoolHandle,
    set: DescriptorSetHandle,
    model: BindingModel,
    content_hash: Option<u64>,
}

struct VulkanSwapchainEntry {
    swapchain: Swapchain,
    present_queue_family: u32,
    frame_index: AtomicUsize,
    image_textures: Vec<TextureHandle>,
    image_views: Vec<TextureViewHandle>,
}

/// Everything `init` brings up. Lives inside a `OnceLock` so the struct
/// occupies a stable address for the program's lifetime once
/// populated — required because `descriptor_buffer`'s device-address
/// plumbing and the descriptor-buffer EXT loader hold raw pointers that
/// must not be invalidated by a move.
struct Context {
    instance: Arc<Instance>,
    phy_device: Arc<PhyDevice>,
    device: Arc<LogicalDevice>,
    memory: Arc<MemoryAllocator>,
    staging: Arc<StagingAllocator>,
    immediate: ImmediateUploader,
    deferred: DeferredUploader,
    queues: [CommandQueue; 3],
    descriptor_buffer_loader: khr_descriptor_buffer::Device,
    surface: Option<(khr::surface::Instance, vk::SurfaceKHR)>,

    buffers: RwLock<ResourcePool<VulkanBuffer, BufferTag>>,
    buffer_views: RwLock<ResourcePool<VulkanBufferView, BufferViewTag>>,
    textures: RwLock<ResourcePool<VulkanTexture, TextureTag>>,
    texture_views: RwLock<ResourcePool<VulkanTextureView, TextureViewTag>>,
    samplers: RwLock<ResourcePool<VulkanSampler, SamplerTag>>,
    shaders: RwLock<ResourcePool<VulkanShader, ShaderTag>>,

    set_layouts: RwLock<ResourcePool<VulkanSetLayout, SetLayoutTag>>,
    descriptor_pools: RwLock<ResourcePool<VulkanDescriptorPool, DescriptorPoolTag>>,
    descriptor_sets: RwLock<ResourcePool<VulkanDescriptorSet, DescriptorSetTag>>,
    descriptor_heaps: RwLock<ResourcePool<VulkanDescriptorHeap, DescriptorHeapTag>>,
    resource_group_layouts: RwLock<ResourcePool<VulkanSetLayout, ResourceGroupLayoutTag>>,
    resource_groups: RwLock<ResourcePool<VulkanResourceGroup, ResourceGroupTag>>,
    resource_group_cache: Mutex<HashMap<u64, ResourceGroupHandle>>,
    resource_group_pools: Mutex<HashMap<u64, DescriptorPoolHandle>>,

    pipeline_layouts: RwLock<ResourcePool<VulkanPipelineLayout, PipelineLayoutTag>>,
    pipelines: RwLock<ResourcePool<VulkanPipeline, PipelineTag>>,

    render_passes: RwLock<ResourcePool<VulkanRenderPass, RenderPassTag>>,
    framebuffers: RwLock<ResourcePool<VulkanFramebuffer, FramebufferTag>>,

    swapchains: RwLock<ResourcePool<VulkanSwapchainEntry, SwapchainTag>>,
    last_acquire: Mutex<Option<(SwapchainHandle, usize)>>,

    command_allocators: RwLock<ResourcePool<CommandAllocator, CommandAllocatorTag>>,
    command_lists: RwLock<ResourcePool<CommandList, CommandListTag>>,
}

/// `ash::ext::descriptor_buffer` under a shorter alias used throughout
/// this file.
mod khr_descriptor_buffer {
    pub use ash::ext::descriptor_buffer::Device;
}

pub struct VulkanBackend {
    context: OnceLock<Context>,
}

impl Default for VulkanBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl VulkanBackend {
    pub fn new() -> Self {
        Self { context: OnceLock::new() }
    }

    fn ctx(&self) -> &Context {
        self.context
            .get()
            .expect("VulkanBackend method called before init")
    }
}

// SAFETY: every interior-mutable field is a `parking_lot` lock or an
// atomic; raw Vulkan handles are `Copy` and carry no thread affinity.
unsafe impl Send for VulkanBackend {}
unsafe impl Sync for VulkanBackend {}

impl Backend for VulkanBackend {
    fn api(&self) -> GraphicsApi {
        GraphicsApi::Vulkan
    }

    fn init(&self, desc: &InitDesc) -> DeviceResult<()> {
        let result = (|| -> anyhow::Result<Context> {
            let extra_extensions = surface_instance_extensions(desc)?;
            let instance = Arc::new(Instance::new(&desc.app_name, desc.enable_validation, &extra_extensions)?);
            let surface = create_bound_surface(&instance, desc)?;
            let phy_device = Arc::new(PhyDevice::select(instance.clone())?);
            let (device, raw_queues) = LogicalDevice::new(instance.clone(), phy_device.clone())?;
            let device = Arc::new(device);
            let memory = Arc::new(MemoryAllocator::new(instance.clone(), device.clone())?);
            let staging = Arc::new(StagingAllocator::new(memory.clone()));

            let families = phy_device.queue_families;
            let mut timeline_semaphores = Vec::with_capacity(3);
            for _ in 0..3 {
                let mut type_info = vk::SemaphoreTypeCreateInfo::default()
                    .semaphore_type(vk::SemaphoreType::TIMELINE)
                    .initial_value(0);
                let info = vk::SemaphoreCreateInfo::default().push_next(&mut type_info);
                timeline_semaphores.push(unsafe { device.raw.create_semaphore(&info, None) }?);
            }
            let queues = [
                CommandQueue::new(raw_queues[0], families.graphics, QueueType::Graphics, timeline_semaphores[0]),
                CommandQueue::new(raw_queues[1], families.compute, QueueType::Compute, timeline_semaphores[1]),
                CommandQueue::new(raw_queues[2], families.transfer, QueueType::Transfer, timeline_semaphores[2]),
            ];

            let immediate = ImmediateUploader::new(
                device.clone(),
                staging.clone(),
                raw_queues[2],
                families.transfer,
            )?;
            let deferred = DeferredUploader::new(device.clone(), staging.clone(), families.transfer)?;

            let descriptor_buffer_loader =
                khr_descriptor_buffer::Device::new(&instance.vk_instance, &device.raw);

            Ok(Context {
                instance,
                phy_device,
                device,
                memory,
                staging,
                immediate,
                deferred,
                queues,
                descriptor_buffer_loader,
                surface,
                buffers: RwLock::new(ResourcePool::new()),
                buffer_views: RwLock::new(ResourcePool::new()),
                textures: RwLock::new(ResourcePool::new()),
                texture_views: RwLock::new(ResourcePool::new()),
                samplers: RwLock::new(ResourcePool::new()),
                shaders: RwLock::new(ResourcePool::new()),
                set_layouts: RwLock::new(ResourcePool::new()),
                descriptor_pools: RwLock::new(ResourcePool::new()),
                descriptor_sets: RwLock::new(ResourcePool::new()),
                descriptor_heaps: RwLock::new(ResourcePool::new()),
                resource_group_layouts: RwLock::new(ResourcePool::new()),
                resource_groups: RwLock::new(ResourcePool::new()),
                resource_group_cache: Mutex::new(HashMap::new()),
                resource_group_pools: Mutex::new(HashMap::new()),
                pipeline_layouts: RwLock::new(ResourcePool::new()),
                pipelines: RwLock::new(ResourcePool::new()),
                render_passes: RwLock::new(ResourcePool::new()),
                framebuffers: RwLock::new(ResourcePool::new()),
                swapchains: RwLock::new(ResourcePool::new()),
                last_acquire: Mutex::new(None),
                command_allocators: RwLock::new(ResourcePool::new()),
                command_lists: RwLock::new(ResourcePool::new()),
            })
        })();

        match result {
            Ok(context) => {
                if self.context.set(context).is_err() {
                    panic!("VulkanBackend::init called twice");
                }
                Ok(())
            }
            Err(err) => Err(DeviceError::InitializationFailed(err.to_string())),
        }
    }

    fn shutdown(&self) {
        let ctx = self.ctx();
        ctx.device.wait_idle();

        for (_, mut entry) in each_swapchain(ctx) {
            entry.swapchain.destroy(&ctx.device.raw);
        }

        for queue in &ctx.queues {
            queue.wait_idle(&ctx.device.raw);
        }
        ctx.staging.destroy_all();

        if let Some((loader, surface)) = &ctx.surface {
            unsafe { loader.destroy_surface(*surface, None) };
        }
    }

    // ---- Buffers, textures, samplers ----

    fn create_buffer(&self, desc: &BufferDesc, initial_data: Option<&[u8]>) -> BufferHandle {
        let ctx = self.ctx();
        let vk_usage = buffer_usage_to_vk(desc.usage) | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS;
        let allocated = match ctx.memory.create_buffer(desc.size, vk_usage, desc.memory_usage, "buffer") {
            Ok(allocated) => allocated,
            Err(err) => {
                log::error!(target: "vulkan", "create_buffer failed: {err}");
                return BufferHandle::INVALID;
            }
        };

        let handle = ctx.buffers.write().allocate(VulkanBuffer {
            allocated,
            usage: desc.usage,
            access: undefined_access_state(ctx.device.queue_family_index(QueueType::Graphics)),
            debug_name: String::new(),
        });

        if let Some(data) = initial_data {
            self.upload_buffer_immediate(handle, data, 0);
        }
        handle
    }

    fn destroy_buffer(&self, handle: BufferHandle) {
        let ctx = self.ctx();
        if let Some(buffer) = ctx.buffers.write().free(handle) {
            ctx.memory.destroy_buffer(buffer.allocated);
        }
    }

    fn create_buffer_view(&self, desc: &BufferViewDesc) -> BufferViewHandle {
        let ctx = self.ctx();
        let content_hash = buffer_view_content_hash(desc.buffer, desc.offset, desc.range);
        ctx.buffer_views.write().allocate(VulkanBufferView {
            buffer: desc.buffer,
            offset: desc.offset,
            range: desc.range,
            content_hash,
        })
    }

    fn destroy_buffer_view(&self, handle: BufferViewHandle) {
        self.ctx().buffer_views.write().free(handle);
    }

    fn map_buffer(&self, handle: BufferHandle) -> Option<*mut u8> {
        self.ctx().buffers.read().get(handle).and_then(|b| b.allocated.mapped_ptr())
    }

    fn unmap_buffer(&self, _handle: BufferHandle) {
        // `gpu-allocator` allocations backing `CPU_TO_GPU`/`GPU_TO_CPU`
        // memory stay persistently mapped; unmap is a no-op kept for API
        // symmetry with backends that don't.
    }

    fn create_texture(&self, desc: &TextureDesc) -> TextureHandle {
        let ctx = self.ctx();
        let (array_layers, depth) = match desc.texture_type {
            TextureType::Texture3D => (1, desc.depth_or_array_layers),
            TextureType::TextureCube => (6, 1),
            _ => (desc.depth_or_array_layers.max(1), 1),
        };
        let image_info = vk::ImageCreateInfo::default()
            .image_type(texture_type_to_vk_image_type(desc.texture_type))
            .format(format_to_vk(desc.format))
            .extent(vk::Extent3D { width: desc.width, height: desc.height, depth })
            .mip_levels(desc.mip_levels.max(1))
            .array_layers(array_layers)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(texture_usage_to_vk(desc.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .flags(if desc.texture_type == TextureType::TextureCube {
                vk::ImageCreateFlags::CUBE_COMPATIBLE
            } else {
                vk::ImageCreateFlags::empty()
            });

        let allocated = match ctx.memory.create_image(&image_info, "texture") {
            Ok(allocated) => allocated,
            Err(err) => {
                log::error!(target: "vulkan", "create_texture failed: {err}");
                return TextureHandle::INVALID;
            }
        };

        ctx.textures.write().allocate(VulkanTexture {
            image: allocated.image,
            allocated: Some(allocated),
            format: desc.format,
            width: desc.width,
            height: desc.height,
            mip_levels: desc.mip_levels.max(1),
            array_layers,
            is_swapchain_owned: false,
            state: SparseTextureState::default(),
            debug_name: String::new(),
        })
    }

    fn destroy_texture(&self, handle: TextureHandle) {
        let ctx = self.ctx();
        if let Some(texture) = ctx.textures.write().free(handle) {
            if let Some(allocated) = texture.allocated {
                ctx.memory.destroy_image(allocated);
            }
        }
    }

    fn create_texture_view(&self, desc: &TextureViewDesc) -> TextureViewHandle {
        let ctx = self.ctx();
        let textures = ctx.textures.read();
        let Some(texture) = textures.get(desc.texture) else {
            log::warn!(target: "vulkan", "create_texture_view: stale texture handle");
            return TextureViewHandle::INVALID;
        };
        let format = resolve_view_format(desc.format, texture.format);
        let view_info = vk::ImageViewCreateInfo::default()
            .image(texture.image)
            .view_type(texture_type_to_vk_view_type(TextureType::Texture2D))
            .format(format_to_vk(format))
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: desc.base_mip_level,
                level_count: desc.mip_level_count,
                base_array_layer: desc.base_array_layer,
                layer_count: desc.array_layer_count,
            });
        let view = match unsafe { ctx.device.raw.create_image_view(&view_info, None) } {
            Ok(view) => view,
            Err(err) => {
                log::error!(target: "vulkan", "vkCreateImageView failed: {err}");
                return TextureViewHandle::INVALID;
            }
        };
        drop(textures);
        ctx.texture_views.write().allocate(VulkanTextureView {
            texture: desc.texture,
            view,
            format,
            base_mip_level: desc.base_mip_level,
            mip_level_count: desc.mip_level_count,
            base_array_layer: desc.base_array_layer,
            array_layer_count: desc.array_layer_count,
        })
    }

    fn destroy_texture_view(&self, handle: TextureViewHandle) {
        let ctx = self.ctx();
        if let Some(view) = ctx.texture_views.write().free(handle) {
            unsafe { ctx.device.raw.destroy_image_view(view.view, None) };
        }
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> SamplerHandle {
        let ctx = self.ctx();
        let (min_filter, mipmap_mode) = filter_to_vk(desc.min_filter);
        let (mag_filter, _) = filter_to_vk(desc.mag_filter);
        let mut info = vk::SamplerCreateInfo::default()
            .min_filter(min_filter)
            .mag_filter(mag_filter)
            .mipmap_mode(mipmap_mode)
            .address_mode_u(wrap_to_vk(desc.wrap_u))
            .address_mode_v(wrap_to_vk(desc.wrap_v))
            .address_mode_w(wrap_to_vk(desc.wrap_w))
            .max_lod(vk::LOD_CLAMP_NONE)
            .anisotropy_enable(desc.max_anisotropy > 1.0)
            .max_anisotropy(desc.max_anisotropy);
        if let Some(compare) = desc.compare {
            info = info
                .compare_enable(true)
                .compare_op(super::format_mapping::compare_func_to_vk(compare));
        }
        let sampler = match unsafe { ctx.device.raw.create_sampler(&info, None) } {
            Ok(sampler) => sampler,
            Err(err) => {
                log::error!(target: "vulkan", "vkCreateSampler failed: {err}");
                return SamplerHandle::INVALID;
            }
        };
        ctx.samplers.write().allocate(VulkanSampler { sampler })
    }

    fn destroy_sampler(&self, handle: SamplerHandle) {
        let ctx = self.ctx();
        if let Some(sampler) = ctx.samplers.write().free(handle) {
            unsafe { ctx.device.raw.destroy_sampler(sampler.sampler, None) };
        }
    }

    fn create_shader(&self, desc: &ShaderDesc) -> ShaderHandle {
        let ctx = self.ctx();
        if desc.bytecode.len() % 4 != 0 {
            log::error!(target: "vulkan", "shader bytecode length {} is not a multiple of 4", desc.bytecode.len());
            return ShaderHandle::INVALID;
        }
        let code: Vec<u32> = desc
            .bytecode
            .chunks_exact(4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        let info = vk::ShaderModuleCreateInfo::default().code(&code);
        let module = match unsafe { ctx.device.raw.create_shader_module(&info, None) } {
            Ok(module) => module,
            Err(err) => {
                log::error!(target: "vulkan", "vkCreateShaderModule failed: {err}");
                return ShaderHandle::INVALID;
            }
        };
        ctx.shaders.write().allocate(VulkanShader {
            module,
            stage: desc.stage,
            entry_point: desc.entry_point.to_string(),
        })
    }

    fn destroy_shader(&self, handle: ShaderHandle) {
        let ctx = self.ctx();
        if let Some(shader) = ctx.shaders.write().free(handle) {
            unsafe { ctx.device.raw.destroy_shader_module(shader.module, None) };
        }
    }

    // ---- Uploads ----

    fn upload_buffer_immediate(&self, dst: BufferHandle, data: &[u8], dst_offset: u64) {
        let ctx = self.ctx();
        let Some(vk_buffer) = ctx.buffers.read().get(dst).map(|b| b.allocated.buffer) else {
            log::warn!(target: "vulkan", "upload_buffer_immediate: stale buffer handle");
            return;
        };
        if let Err(err) = ctx.immediate.upload_buffer(vk_buffer, dst_offset, data) {
            log::error!(target: "vulkan", "upload_buffer_immediate failed: {err}");
        }
    }

    fn upload_texture_immediate(&self, dst: TextureHandle, data: &[u8], mip_level: u32, array_layer: u32) {
        let ctx = self.ctx();
        let Some((image, width, height)) = ctx
            .textures
            .read()
            .get(dst)
            .map(|t| (t.image, (t.width >> mip_level).max(1), (t.height >> mip_level).max(1)))
        else {
            log::warn!(target: "vulkan", "upload_texture_immediate: stale texture handle");
            return;
        };
        if let Err(err) = ctx.immediate.upload_texture(image, data, width, height, mip_level, array_layer) {
            log::error!(target: "vulkan", "upload_texture_immediate failed: {err}");
        }
    }

    fn begin_immediate_batch(&self) {
        if let Err(err) = self.ctx().immediate.begin_batch_manual() {
            log::error!(target: "vulkan", "begin_immediate_batch failed: {err}");
        }
    }

    fn upload_buffer_batched(&self, dst: BufferHandle, data: &[u8], dst_offset: u64) {
        let ctx = self.ctx();
        let Some(vk_buffer) = ctx.buffers.read().get(dst).map(|b| b.allocated.buffer) else {
            log::warn!(target: "vulkan", "upload_buffer_batched: stale buffer handle");
            return;
        };
        if let Err(err) = ctx.immediate.record_buffer_copy_locked(vk_buffer, dst_offset, data) {
            log::error!(target: "vulkan", "upload_buffer_batched failed: {err}");
        }
    }

    fn upload_texture_batched(&self, dst: TextureHandle, data: &[u8], mip_level: u32, array_layer: u32) {
        let ctx = self.ctx();
        let Some((image, width, height)) = ctx
            .textures
            .read()
            .get(dst)
            .map(|t| (t.image, (t.width >> mip_level).max(1), (t.height >> mip_level).max(1)))
        else {
            log::warn!(target: "vulkan", "upload_texture_batched: stale texture handle");
            return;
        };
        if let Err(err) = ctx.immediate.record_texture_copy_locked(image, data, width, height, mip_level, array_layer) {
            log::error!(target: "vulkan", "upload_texture_batched failed: {err}");
        }
    }

    fn end_immediate_batch(&self) {
        if let Err(err) = self.ctx().immediate.end_batch_manual() {
            log::error!(target: "vulkan", "end_immediate_batch failed: {err}");
        }
    }

    fn queue_deferred_buffer_upload(&self, dst: BufferHandle, data: &[u8], dst_offset: u64) {
        let ctx = self.ctx();
        let Some(vk_buffer) = ctx.buffers.read().get(dst).map(|b| b.allocated.buffer) else {
            log::warn!(target: "vulkan", "queue_deferred_buffer_upload: stale buffer handle");
            return;
        };
        if let Err(err) = ctx.deferred.queue_buffer_upload(vk_buffer, dst_offset, data) {
            log::error!(target: "vulkan", "queue_deferred_buffer_upload failed: {err}");
        }
    }

    fn queue_deferred_texture_upload(&self, dst: TextureHandle, data: &[u8], mip_level: u32, array_layer: u32) {
        let ctx = self.ctx();
        let Some((image, width, height)) = ctx
            .textures
            .read()
            .get(dst)
            .map(|t| (t.image, (t.width >> mip_level).max(1), (t.height >> mip_level).max(1)))
        else {
            log::warn!(target: "vulkan", "queue_deferred_texture_upload: stale texture handle");
            return;
        };
        if let Err(err) = ctx.deferred.queue_texture_upload(image, data, width, height, mip_level, array_layer) {
            log::error!(target: "vulkan", "queue_deferred_texture_upload failed: {err}");
        }
    }

    fn flush_deferred_uploads(&self) -> Timeline {
        let ctx = self.ctx();
        match ctx.deferred.flush(&ctx.queues[queue_index(QueueType::Transfer)]) {
            Ok(timeline) => timeline,
            Err(err) => {
                log::error!(target: "vulkan", "flush_deferred_uploads failed: {err}");
                Timeline::NONE
            }
        }
    }

    fn retire_staging(&self, completed: Timeline) {
        self.ctx().deferred.retire(completed);
    }

    // ---- Descriptor subsystem ----

    fn create_set_layout(&self, desc: &SetLayoutDesc) -> SetLayoutHandle {
        let ctx = self.ctx();
        let layout = build_set_layout(ctx, desc);
        match layout {
            Some(layout) => ctx.set_layouts.write().allocate(layout),
            None => SetLayoutHandle::INVALID,
        }
    }

    fn destroy_set_layout(&self, handle: SetLayoutHandle) {
        let ctx = self.ctx();
        if let Some(layout) = ctx.set_layouts.write().free(handle) {
            unsafe { ctx.device.raw.destroy_descriptor_set_layout(layout.native, None) };
        }
    }

    fn create_descriptor_pool(&self, layout: SetLayoutHandle, capacity: u32, flags: DescriptorPoolFlags) -> DescriptorPoolHandle {
        let ctx = self.ctx();
        let layouts = ctx.set_layouts.read();
        let Some(set_layout) = layouts.get(layout) else {
            log::warn!(target: "vulkan", "create_descriptor_pool: stale set layout handle");
            return DescriptorPoolHandle::INVALID;
        };
        let pool = build_descriptor_pool(ctx, set_layout, capacity, flags);
        drop(layouts);
        match pool {
            Some(pool) => ctx.descriptor_pools.write().allocate(pool),
            None => DescriptorPoolHandle::INVALID,
        }
    }

    fn destroy_descriptor_pool(&self, handle: DescriptorPoolHandle) {
        let ctx = self.ctx();
        if let Some(pool) = ctx.descriptor_pools.write().free(handle) {
            if let VulkanDescriptorPool::Sets { native, .. } = pool {
                unsafe { ctx.device.raw.destroy_descriptor_pool(native, None) };
            }
        }
    }

    fn reset_descriptor_pool(&self, handle: DescriptorPoolHandle) {
        let ctx = self.ctx();
        let mut pools = ctx.descriptor_pools.write();
        let Some(pool) = pools.get_mut(handle) else {
            log::warn!(target: "vulkan", "reset_descriptor_pool: stale pool handle");
            return;
        };
        assert!(pool.is_linear(), "reset_descriptor_pool called on a non-LINEAR pool");
        match pool {
            VulkanDescriptorPool::Sets { native, .. } => {
                if let Err(err) = unsafe {
                    ctx.device
                        .raw
                        .reset_descriptor_pool(*native, vk::DescriptorPoolResetFlags::empty())
                } {
                    log::error!(target: "vulkan", "vkResetDescriptorPool failed: {err}");
                }
            }
            VulkanDescriptorPool::Buffer { .. } => pool.reset_linear(),
        }
    }

    fn allocate_set(&self, pool: DescriptorPoolHandle) -> DescriptorSetHandle {
        self.allocate_sets(pool, 1).into_iter().next().unwrap_or(DescriptorSetHandle::INVALID)
    }

    fn allocate_sets(&self, pool: DescriptorPoolHandle, count: u32) -> Vec<DescriptorSetHandle> {
        let ctx = self.ctx();
        let mut pools = ctx.descriptor_pools.write();
        let Some(pool_entry) = pools.get_mut(pool) else {
            log::warn!(target: "vulkan", "allocate_sets: stale pool handle");
            return Vec::new();
        };
        match pool_entry {
            VulkanDescriptorPool::Sets { native, layout_native, .. } => {
                let layouts = vec![*layout_native; count as usize];
                let info = vk::DescriptorSetAllocateInfo::default()
                    .descriptor_pool(*native)
                    .set_layouts(&layouts);
                match unsafe { ctx.device.raw.allocate_descriptor_sets(&info) } {
                    Ok(sets) => {
                        drop(pools);
                        let mut set_pool = ctx.descriptor_sets.write();
                        sets.into_iter()
                            .map(|set| set_pool.allocate(VulkanDescriptorSet::Native(set)))
                            .collect()
                    }
                    Err(err) => {
                        log::error!(target: "vulkan", "vkAllocateDescriptorSets failed: {err}");
                        Vec::new()
                    }
                }
            }
            VulkanDescriptorPool::Buffer { .. } => {
                let mut handles = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let Some(offset) = pool_entry.allocate_buffer_slot() else {
                        log::warn!(target: "vulkan", "descriptor buffer pool exhausted");
                        break;
                    };
                    handles.push(offset);
                }
                drop(pools);
                let mut set_pool = ctx.descriptor_sets.write();
                handles
                    .into_iter()
                    .map(|byte_offset| set_pool.allocate(VulkanDescriptorSet::Buffer { pool, byte_offset }))
                    .collect()
            }
        }
    }

    fn free_set(&self, pool: DescriptorPoolHandle, set: DescriptorSetHandle) {
        let ctx = self.ctx();
        let mut pools = ctx.descriptor_pools.write();
        let Some(pool_entry) = pools.get_mut(pool) else { return };
        assert!(!pool_entry.is_linear(), "free_set called on a LINEAR pool");
        let Some(set_value) = ctx.descriptor_sets.write().free(set) else { return };
        if let (VulkanDescriptorPool::Sets { native, .. }, VulkanDescriptorSet::Native(raw_set)) = (&*pool_entry, set_value) {
            if let Err(err) = unsafe { ctx.device.raw.free_descriptor_sets(*native, &[raw_set]) } {
                log::error!(target: "vulkan", "vkFreeDescriptorSets failed: {err}");
            }
        }
    }

    fn write_set(&self, set: DescriptorSetHandle, writes: &[ResourceGroupBinding]) {
        self.write_sets(&[set], &[writes]);
    }

    fn write_sets(&self, sets: &[DescriptorSetHandle], writes: &[&[ResourceGroupBinding]]) {
        let ctx = self.ctx();
        let descriptor_sets = ctx.descriptor_sets.read();
        let buffers = ctx.buffers.read();
        let texture_views = ctx.texture_views.read();

        // buffer/image info storage must outlive the `WriteDescriptorSet`
        // array built below.
        let mut buffer_infos = Vec::new();
        let mut image_infos = Vec::new();
        let mut writes_out = Vec::new();

        for (&set, &binding_writes) in sets.iter().zip(writes) {
            match descriptor_sets.get(set) {
                Some(VulkanDescriptorSet::Native(raw_set)) => {
                    for binding in binding_writes {
                        match binding.value {
                            ResourceGroupBindingValue::Buffer { buffer, offset, range } => {
                                let Some(vk_buffer) = buffers.get(buffer).map(|b| b.allocated.buffer) else { continue };
                                buffer_infos.push(vk::DescriptorBufferInfo {
                                    buffer: vk_buffer,
                                    offset,
                                    range: if range == 0 { vk::WHOLE_SIZE } else { range },
                                });
                                writes_out.push((*raw_set, binding.binding, vk::DescriptorType::UNIFORM_BUFFER, true));
                            }
                            ResourceGroupBindingValue::Texture { view } => {
                                let Some(vk_view) = texture_views.get(view).map(|v| v.view) else { continue };
                                image_infos.push(vk::DescriptorImageInfo {
                                    sampler: vk::Sampler::null(),
                                    image_view: vk_view,
                                    image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                                });
                                writes_out.push((*raw_set, binding.binding, vk::DescriptorType::SAMPLED_IMAGE, false));
                            }
                        }
                    }
                }
                Some(VulkanDescriptorSet::Buffer { pool, byte_offset }) => {
                    self.write_buffer_descriptor_set(ctx, *pool, *byte_offset, binding_writes, &buffers, &texture_views);
                }
                None => continue,
            }
        }

        let mut buffer_cursor = 0usize;
        let mut image_cursor = 0usize;
        let descriptor_writes: Vec<vk::WriteDescriptorSet> = writes_out
            .iter()
            .map(|&(raw_set, binding, ty, is_buffer)| {
                if is_buffer {
                    let info = &buffer_infos[buffer_cursor..buffer_cursor + 1];
                    buffer_cursor += 1;
                    vk::WriteDescriptorSet::default()
                        .dst_set(raw_set)
                        .dst_binding(binding)
                        .descriptor_type(ty)
                        .buffer_info(info)
                } else {
                    let info = &image_infos[image_cursor..image_cursor + 1];
                    image_cursor += 1;
                    vk::WriteDescriptorSet::default()
                        .dst_set(raw_set)
                        .dst_binding(binding)
                        .descriptor_type(ty)
                        .image_info(info)
                }
            })
            .collect();

        if !descriptor_writes.is_empty() {
            unsafe { ctx.device.raw.update_descriptor_sets(&descriptor_writes, &[]) };
        }
    }

    fn create_descriptor_heap(&self, heap_type: DescriptorHeapType, capacity: u32, shader_visible: bool) -> DescriptorHeapHandle {
        let ctx = self.ctx();
        let descriptor_size: u32 = match heap_type {
            DescriptorHeapType::Resources => ctx
                .phy_device
                .min_storage_buffer_offset_alignment
                .max(64) as u32,
            DescriptorHeapType::Samplers => 64,
        };
        let size = u64::from(descriptor_size) * u64::from(capacity);
        let mut usage = vk::BufferUsageFlags::RESOURCE_DESCRIPTOR_BUFFER_EXT
            | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS;
        if heap_type == DescriptorHeapType::Samplers {
            usage = vk::BufferUsageFlags::SAMPLER_DESCRIPTOR_BUFFER_EXT | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS;
        }
        let memory_usage = if shader_visible { MemoryUsage::CpuToGpu } else { MemoryUsage::GpuOnly };
        let allocated = match ctx.memory.create_buffer(size.max(1), usage, memory_usage, "descriptor-heap") {
            Ok(allocated) => allocated,
            Err(err) => {
                log::error!(target: "vulkan", "create_descriptor_heap failed: {err}");
                return DescriptorHeapHandle::INVALID;
            }
        };
        let device_address = unsafe {
            ctx.device.raw.get_buffer_device_address(&vk::BufferDeviceAddressInfo::default().buffer(allocated.buffer))
        };
        let mapped_ptr = allocated.mapped_ptr();
        ctx.descriptor_heaps.write().allocate(VulkanDescriptorHeap {
            buffer: allocated,
            mapped_ptr,
            device_address,
            descriptor_size,
            capacity,
            heap_type,
        })
    }

    fn destroy_descriptor_heap(&self, handle: DescriptorHeapHandle) {
        let ctx = self.ctx();
        if let Some(heap) = ctx.descriptor_heaps.write().free(handle) {
            ctx.memory.destroy_buffer(heap.buffer);
        }
    }

    fn descriptor_heap_slot_ptr(&self, heap: DescriptorHeapHandle, index: u32) -> (Option<*mut u8>, u64, u32) {
        match self.ctx().descriptor_heaps.read().get(heap) {
            Some(heap) => heap.slot_ptr(index),
            None => {
                log::warn!(target: "vulkan", "descriptor_heap_slot_ptr: stale heap handle");
                (None, 0, 0)
            }
        }
    }

    fn create_resource_group_layout(&self, desc: &SetLayoutDesc) -> ResourceGroupLayoutHandle {
        let ctx = self.ctx();
        match build_set_layout(ctx, desc) {
            Some(layout) => ctx.resource_group_layouts.write().allocate(layout),
            None => ResourceGroupLayoutHandle::INVALID,
        }
    }

    fn destroy_resource_group_layout(&self, handle: ResourceGroupLayoutHandle) {
        let ctx = self.ctx();
        if let Some(layout) = ctx.resource_group_layouts.write().free(handle) {
            unsafe { ctx.device.raw.destroy_descriptor_set_layout(layout.native, None) };
        }
    }

    fn create_resource_group(&self, desc: &ResourceGroupDesc) -> ResourceGroupHandle {
        let ctx = self.ctx();
        let set_layouts = ctx.set_layouts.read();
        let Some(layout) = set_layouts.get(desc.layout) else {
            log::warn!(target: "vulkan", "create_resource_group: stale layout handle");
            return ResourceGroupHandle::INVALID;
        };
        let model = descriptor::classify_binding_model(layout.flags, layout.has_variable_count);
        let cacheable = descriptor::is_cacheable(model);
        let content_hash = cacheable.then(|| descriptor::resource_group_content_hash(layout.native, desc.bindings));

        if let Some(hash) = content_hash {
            if let Some(&cached) = ctx.resource_group_cache.lock().get(&hash) {
                if ctx.resource_groups.read().is_alive(cached) {
                    return cached;
                }
            }
        }

        let layout_raw = {
            use ash::vk::Handle;
            layout.native.as_raw()
        };
        let layout_native = layout.native;
        let layout_flags = layout.flags;
        drop(set_layouts);

        let pool_handle = {
            let mut pool_cache = ctx.resource_group_pools.lock();
            match pool_cache.get(&layout_raw).copied() {
                Some(pool) if ctx.descriptor_pools.read().is_alive(pool) => pool,
                _ => {
                    let set_layouts = ctx.set_layouts.read();
                    let layout = set_layouts.get(desc.layout).unwrap();
                    let Some(pool) = build_descriptor_pool(ctx, layout, 64, layout_flags | DescriptorPoolFlags::POOL)
                    else {
                        return ResourceGroupHandle::INVALID;
                    };
                    drop(set_layouts);
                    let handle = ctx.descriptor_pools.write().allocate(pool);
                    pool_cache.insert(layout_raw, handle);
                    handle
                }
            }
        };

        let Some(set) = self.allocate_set_internal(pool_handle, layout_native) else {
            return ResourceGroupHandle::INVALID;
        };
        self.write_set(set, desc.bindings);

        let handle = ctx.resource_groups.write().allocate(VulkanResourceGroup {
            pool: pool_handle,
            set,
            model,
            content_hash,
        });
        if let Some(hash) = content_hash {
            ctx.resource_group_cache.lock().insert(hash, handle);
        }
        handle
    }

    fn destroy_resource_group(&self, handle: ResourceGroupHandle) {
        let ctx = self.ctx();
        let Some(group) = ctx.resource_groups.write().free(handle) else { return };
        if let Some(hash) = group.content_hash {
            ctx.resource_group_cache.lock().remove(&hash);
        }
        self.free_set(group.pool, group.set);
    }

    // ---- Pipeline layout + pipeline ----

    fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc) -> PipelineLayoutHandle {
        let ctx = self.ctx();
        if let Err(err) = validate_pipeline_layout_desc(
            desc.set_layouts.len(),
            desc.push_constants,
            ctx.phy_device.max_push_constants_size,
        ) {
            log::error!(target: "vulkan", "create_pipeline_layout rejected: {err}");
            return PipelineLayoutHandle::INVALID;
        }

        let set_layouts = ctx.set_layouts.read();
        let mut native_layouts = Vec::with_capacity(desc.set_layouts.len());
        for &handle in desc.set_layouts {
            let Some(layout) = set_layouts.get(handle) else {
                log::warn!(target: "vulkan", "create_pipeline_layout: stale set layout handle");
                return PipelineLayoutHandle::INVALID;
            };
            native_layouts.push(layout.native);
        }
        drop(set_layouts);

        let push_ranges: Vec<vk::PushConstantRange> = desc
            .push_constants
            .iter()
            .map(|r| {
                vk::PushConstantRange::default()
                    .stage_flags(super::format_mapping::shader_stage_flags_to_vk(r.stages))
                    .offset(r.offset)
                    .size(r.size)
            })
            .collect();

        let info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&native_layouts)
            .push_constant_ranges(&push_ranges);
        let native = match unsafe { ctx.device.raw.create_pipeline_layout(&info, None) } {
            Ok(native) => native,
            Err(err) => {
                log::error!(target: "vulkan", "vkCreatePipelineLayout failed: {err}");
                return PipelineLayoutHandle::INVALID;
            }
        };

        ctx.pipeline_layouts.write().allocate(VulkanPipelineLayout {
            native,
            push_ranges: build_push_constant_ranges(desc.push_constants),
        })
    }

    fn destroy_pipeline_layout(&self, handle: PipelineLayoutHandle) {
        let ctx = self.ctx();
        if let Some(layout) = ctx.pipeline_layouts.write().free(handle) {
            unsafe { ctx.device.raw.destroy_pipeline_layout(layout.native, None) };
        }
    }

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> PipelineHandle {
        let ctx = self.ctx();
        let layouts = ctx.pipeline_layouts.read();
        let Some(layout) = layouts.get(desc.layout) else {
            log::warn!(target: "vulkan", "create_graphics_pipeline: stale layout handle");
            return PipelineHandle::INVALID;
        };
        let native_layout = layout.native;
        drop(layouts);

        let shaders = ctx.shaders.read();
        let (Some(vertex), Some(fragment)) = (shaders.get(desc.vertex_shader), shaders.get(desc.fragment_shader)) else {
            log::warn!(target: "vulkan", "create_graphics_pipeline: stale shader handle");
            return PipelineHandle::INVALID;
        };
        let entry_vertex = std::ffi::CString::new(vertex.entry_point.clone()).unwrap();
        let entry_fragment = std::ffi::CString::new(fragment.entry_point.clone()).unwrap();
        let stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vertex.module)
                .name(&entry_vertex),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(fragment.module)
                .name(&entry_fragment),
        ];
        drop(shaders);

        let bindings = vertex_input_bindings(desc);
        let attributes = vertex_input_attributes(desc);
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);
        let input_assembly = input_assembly_state(desc.topology);
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);
        let rasterization = rasterization_state(&desc.rasterization);
        let multisample = multisample_state();
        let depth_stencil = depth_stencil_state(&desc.depth_stencil);
        let blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> =
            desc.color_blend_attachments.iter().map(color_blend_attachment_state).collect();
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default().attachments(&blend_attachments);
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&DYNAMIC_STATES);

        let render_passes = ctx.render_passes.read();
        let (native_render_pass, mut rendering_info, color_formats);
        if desc.render_pass.is_valid() {
            let Some(pass) = render_passes.get(desc.render_pass) else {
                log::warn!(target: "vulkan", "create_graphics_pipeline: stale render pass handle");
                return PipelineHandle::INVALID;
            };
            native_render_pass = pass.native;
            color_formats = Vec::new();
            rendering_info = None;
        } else {
            native_render_pass = vk::RenderPass::null();
            color_formats = desc
                .color_blend_attachments
                .iter()
                .map(|_| format_to_vk(Format::Bgra8Srgb))
                .collect::<Vec<_>>();
            rendering_info = Some(dynamic_rendering_info(&color_formats, None));
        }
        drop(render_passes);

        let mut create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(native_layout)
            .render_pass(native_render_pass);
        if let Some(info) = rendering_info.as_mut() {
            create_info = create_info.push_next(info);
        }

        let pipelines = unsafe {
            ctx.device
                .raw
                .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
        };
        let native = match pipelines {
            Ok(pipelines) => pipelines[0],
            Err((_, err)) => {
                log::error!(target: "vulkan", "vkCreateGraphicsPipelines failed: {err}");
                return PipelineHandle::INVALID;
            }
        };

        ctx.pipelines.write().allocate(VulkanPipeline {
            native,
            layout: native_layout,
            bind_point: vk::PipelineBindPoint::GRAPHICS,
        })
    }

    fn create_compute_pipeline(&self, desc: &ComputePipelineDesc) -> PipelineHandle {
        let ctx = self.ctx();
        let layouts = ctx.pipeline_layouts.read();
        let Some(layout) = layouts.get(desc.layout) else {
            log::warn!(target: "vulkan", "create_compute_pipeline: stale layout handle");
            return PipelineHandle::INVALID;
        };
        let native_layout = layout.native;
        drop(layouts);

        let shaders = ctx.shaders.read();
        let Some(shader) = shaders.get(desc.shader) else {
            log::warn!(target: "vulkan", "create_compute_pipeline: stale shader handle");
            return PipelineHandle::INVALID;
        };
        let entry = std::ffi::CString::new(shader.entry_point.clone()).unwrap();
        let stage = vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(shader.module)
            .name(&entry);
        drop(shaders);

        let create_info = vk::ComputePipelineCreateInfo::default().stage(stage).layout(native_layout);
        let pipelines = unsafe {
            ctx.device
                .raw
                .create_compute_pipelines(vk::PipelineCache::null(), &[create_info], None)
        };
        let native = match pipelines {
            Ok(pipelines) => pipelines[0],
            Err((_, err)) => {
                log::error!(target: "vulkan", "vkCreateComputePipelines failed: {err}");
                return PipelineHandle::INVALID;
            }
        };

        ctx.pipelines.write().allocate(VulkanPipeline {
            native,
            layout: native_layout,
            bind_point: vk::PipelineBindPoint::COMPUTE,
        })
    }

    fn destroy_pipeline(&self, handle: PipelineHandle) {
        let ctx = self.ctx();
        if let Some(pipeline) = ctx.pipelines.write().free(handle) {
            unsafe { ctx.device.raw.destroy_pipeline(pipeline.native, None) };
        }
    }

    // ---- Render pass + framebuffer ----

    fn create_render_pass(&self, desc: &RenderPassDesc) -> RenderPassHandle {
        let ctx = self.ctx();
        let attachments = build_attachment_descriptions(desc);
        let color_refs = color_attachment_references(desc.color_attachments.len());
        let depth_ref = desc.depth_attachment.as_ref().map(|_| depth_attachment_reference(desc.color_attachments.len()));

        let mut subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs);
        if let Some(depth_ref) = depth_ref.as_ref() {
            subpass = subpass.depth_stencil_attachment(depth_ref);
        }
        let subpasses = [subpass];

        let info = vk::RenderPassCreateInfo::default().attachments(&attachments).subpasses(&subpasses);
        let native = match unsafe { ctx.device.raw.create_render_pass(&info, None) } {
            Ok(native) => native,
            Err(err) => {
                log::error!(target: "vulkan", "vkCreateRenderPass failed: {err}");
                return RenderPassHandle::INVALID;
            }
        };

        ctx.render_passes.write().allocate(VulkanRenderPass {
            native,
            color_attachment_count: desc.color_attachments.len() as u32,
            has_depth_attachment: desc.depth_attachment.is_some(),
        })
    }

    fn destroy_render_pass(&self, handle: RenderPassHandle) {
        let ctx = self.ctx();
        if let Some(pass) = ctx.render_passes.write().free(handle) {
            unsafe { ctx.device.raw.destroy_render_pass(pass.native, None) };
        }
    }

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> FramebufferHandle {
        let ctx = self.ctx();
        let render_passes = ctx.render_passes.read();
        let Some(pass) = render_passes.get(desc.render_pass) else {
            log::warn!(target: "vulkan", "create_framebuffer: stale render pass handle");
            return FramebufferHandle::INVALID;
        };
        let native_pass = pass.native;
        drop(render_passes);

        let texture_views = ctx.texture_views.read();
        let mut attachments = Vec::with_capacity(desc.attachments.len());
        for &handle in desc.attachments {
            let Some(view) = texture_views.get(handle) else {
                log::warn!(target: "vulkan", "create_framebuffer: stale texture view handle");
                return FramebufferHandle::INVALID;
            };
            attachments.push(view.view);
        }
        drop(texture_views);

        let info = vk::FramebufferCreateInfo::default()
            .render_pass(native_pass)
            .attachments(&attachments)
            .width(desc.width)
            .height(desc.height)
            .layers(1);
        let native = match unsafe { ctx.device.raw.create_framebuffer(&info, None) } {
            Ok(native) => native,
            Err(err) => {
                log::error!(target: "vulkan", "vkCreateFramebuffer failed: {err}");
                return FramebufferHandle::INVALID;
            }
        };

        ctx.framebuffers.write().allocate(VulkanFramebuffer { native, width: desc.width, height: desc.height })
    }

    fn destroy_framebuffer(&self, handle: FramebufferHandle) {
        let ctx = self.ctx();
        if let Some(framebuffer) = ctx.framebuffers.write().free(handle) {
            unsafe { ctx.device.raw.destroy_framebuffer(framebuffer.native, None) };
        }
    }

    // ---- Swapchain ----

    fn create_swapchain(&self, desc: &SwapchainDesc) -> DeviceResult<SwapchainHandle> {
        let ctx = self.ctx();
        let Some((surface_loader, surface)) = ctx.surface.clone() else {
            return Err(DeviceError::Backend(
                "no surface bound; pass InitDesc::surface before calling create_swapchain".to_string(),
            ));
        };

        let swapchain = Swapchain::new(
            &ctx.instance,
            &ctx.device,
            surface,
            surface_loader,
            desc.width,
            desc.height,
            desc.vsync,
            desc.preferred_format,
            desc.frames_in_flight,
            vk::SwapchainKHR::null(),
        )
        .map_err(|err| DeviceError::Backend(err.to_string()))?;

        let mut textures = ctx.textures.write();
        let mut texture_views = ctx.texture_views.write();
        let mut image_textures = Vec::with_capacity(swapchain.images.len());
        let mut image_views = Vec::with_capacity(swapchain.images.len());
        let format = swapchain.format();
        for image in &swapchain.images {
            let texture_handle = textures.allocate(VulkanTexture {
                image: image.image,
                allocated: None,
                format,
                width: desc.width,
                height: desc.height,
                mip_levels: 1,
                array_layers: 1,
                is_swapchain_owned: true,
                state: SparseTextureState::default(),
                debug_name: String::new(),
            });
            let view_handle = texture_views.allocate(VulkanTextureView {
                texture: texture_handle,
                view: image.view,
                format,
                base_mip_level: 0,
                mip_level_count: 1,
                base_array_layer: 0,
                array_layer_count: 1,
            });
            image_textures.push(texture_handle);
            image_views.push(view_handle);
        }
        drop(textures);
        drop(texture_views);

        Ok(ctx.swapchains.write().allocate(VulkanSwapchainEntry {
            swapchain,
            present_queue_family: ctx.device.queue_family_index(QueueType::Graphics),
            frame_index: AtomicUsize::new(0),
            image_textures,
            image_views,
        }))
    }

    fn destroy_swapchain(&self, handle: SwapchainHandle) {
        let ctx = self.ctx();
        if let Some(mut entry) = ctx.swapchains.write().free(handle) {
            for view in entry.image_views.drain(..) {
                self.destroy_texture_view(view);
            }
            for texture in entry.image_textures.drain(..) {
                ctx.textures.write().free(texture);
            }
            entry.swapchain.destroy(&ctx.device.raw);
        }
    }

    fn resize_swapchain(&self, handle: SwapchainHandle, width: u32, height: u32) -> DeviceResult<()> {
        let ctx = self.ctx();
        ctx.device.wait_idle();
        let mut swapchains = ctx.swapchains.write();
        let Some(entry) = swapchains.get_mut(handle) else {
            return Err(DeviceError::Backend("resize_swapchain: stale handle".to_string()));
        };

        let old_raw = entry.swapchain.raw;
        let surface = entry.swapchain.surface;
        let surface_loader = entry.swapchain.surface_loader.clone();
        let rebuilt = Swapchain::new(
            &ctx.instance,
            &ctx.device,
            surface,
            surface_loader,
            width,
            height,
            entry.swapchain.present_mode != vk::PresentModeKHR::FIFO,
            entry.swapchain.format(),
            entry.swapchain.image_count(),
            old_raw,
        );
        let mut rebuilt = rebuilt.map_err(|err| DeviceError::Backend(err.to_string()))?;
        std::mem::swap(&mut entry.swapchain, &mut rebuilt);
        rebuilt.destroy(&ctx.device.raw);

        // The old images' views were just destroyed along with `rebuilt`;
        // free the pool slots without touching the native handles again,
        // then allocate fresh ones so callers see genuinely new handles.
        let old_textures = std::mem::take(&mut entry.image_textures);
        let old_views = std::mem::take(&mut entry.image_views);
        {
            let mut texture_views = ctx.texture_views.write();
            for view in old_views {
                texture_views.free(view);
            }
        }
        {
            let mut textures = ctx.textures.write();
            for texture in old_textures {
                textures.free(texture);
            }
        }

        let format = entry.swapchain.format();
        let mut textures = ctx.textures.write();
        let mut texture_views = ctx.texture_views.write();
        let mut image_textures = Vec::with_capacity(entry.swapchain.images.len());
        let mut image_views = Vec::with_capacity(entry.swapchain.images.len());
        for image in &entry.swapchain.images {
            let texture_handle = textures.allocate(VulkanTexture {
                image: image.image,
                allocated: None,
                format,
                width,
                height,
                mip_levels: 1,
                array_layers: 1,
                is_swapchain_owned: true,
                state: SparseTextureState::default(),
                debug_name: String::new(),
            });
            let view_handle = texture_views.allocate(VulkanTextureView {
                texture: texture_handle,
                view: image.view,
                format,
                base_mip_level: 0,
                mip_level_count: 1,
                base_array_layer: 0,
                array_layer_count: 1,
            });
            image_textures.push(texture_handle);
            image_views.push(view_handle);
        }
        drop(textures);
        drop(texture_views);
        entry.image_textures = image_textures;
        entry.image_views = image_views;
        Ok(())
    }

    fn acquire_next_image(&self, handle: SwapchainHandle) -> DeviceResult<u32> {
        let ctx = self.ctx();
        let swapchains = ctx.swapchains.read();
        let Some(entry) = swapchains.get(handle) else {
            return Err(DeviceError::Backend("acquire_next_image: stale handle".to_string()));
        };
        let frame_index = entry.frame_index.fetch_add(1, Ordering::AcqRel);
        match entry.swapchain.acquire_next_image(frame_index, u64::MAX) {
            Ok(Some(index)) => {
                *ctx.last_acquire.lock() = Some((handle, frame_index % entry.swapchain.images.len().max(1)));
                Ok(index)
            }
            Ok(None) => Err(DeviceError::SurfaceLost("swapchain out of date; call resize_swapchain".to_string())),
            Err(err) => Err(DeviceError::Backend(err.to_string())),
        }
    }

    fn present(&self, handle: SwapchainHandle, queue: QueueType, image_index: u32) -> DeviceResult<()> {
        let ctx = self.ctx();
        let swapchains = ctx.swapchains.read();
        let Some(entry) = swapchains.get(handle) else {
            return Err(DeviceError::Backend("present: stale handle".to_string()));
        };
        let frame_index = entry.frame_index.load(Ordering::Acquire).wrapping_sub(1);
        let command_queue = &ctx.queues[queue_index(queue)];
        match entry
            .swapchain
            .present(command_queue.raw, &entry.swapchain.swapchain_loader, frame_index, image_index)
        {
            Ok(needs_resize) => {
                if needs_resize {
                    log::debug!(target: "vulkan", "swapchain suboptimal/out-of-date; caller should resize");
                }
                Ok(())
            }
            Err(err) => Err(DeviceError::Backend(err.to_string())),
        }
    }

    fn swapchain_image_view(&self, handle: SwapchainHandle, index: u32) -> TextureViewHandle {
        match self.ctx().swapchains.read().get(handle) {
            Some(entry) => entry.image_views.get(index as usize).copied().unwrap_or(TextureViewHandle::INVALID),
            None => TextureViewHandle::INVALID,
        }
    }

    fn swapchain_format(&self, handle: SwapchainHandle) -> Format {
        match self.ctx().swapchains.read().get(handle) {
            Some(entry) => entry.swapchain.format(),
            None => Format::Undefined,
        }
    }

    fn swapchain_image_count(&self, handle: SwapchainHandle) -> u32 {
        match self.ctx().swapchains.read().get(handle) {
            Some(entry) => entry.swapchain.image_count(),
            None => 0,
        }
    }

    // ---- Command queue ----

    fn submit(&self, info: &SubmitInfo) -> Timeline {
        let ctx = self.ctx();
        let command_lists = ctx.command_lists.read();
        let mut buffers = Vec::with_capacity(info.command_lists.len());
        for &handle in info.command_lists {
            let Some(list) = command_lists.get(handle) else {
                log::warn!(target: "vulkan", "submit: stale command list handle");
                continue;
            };
            list.assert_state(RecordingState::Executable);
            buffers.push(list.buffer);
        }
        drop(command_lists);

        let dependencies: Vec<(QueueDependency, vk::Semaphore)> = info
            .dependencies
            .iter()
            .map(|&dep| (dep, ctx.queues[queue_index(dep.queue)].timeline_semaphore))
            .collect();

        let swapchain_sync = if info.wait_for_acquire || info.signal_for_present {
            ctx.last_acquire.lock().and_then(|(swapchain, frame)| {
                ctx.swapchains.read().get(swapchain).map(|entry| SwapchainSync {
                    image_available: entry.swapchain.acquire_semaphores[frame],
                    render_complete: entry.swapchain.present_semaphores[frame],
                })
            })
        } else {
            None
        };

        let request = SubmitRequest { command_buffers: &buffers, dependencies: &dependencies, swapchain_sync };
        let timeline = match ctx.queues[queue_index(info.queue)].submit(&ctx.device.raw, &request) {
            Ok(timeline) => timeline,
            Err(err) => {
                log::error!(target: "vulkan", "submit failed: {err}");
                return Timeline::NONE;
            }
        };

        let mut command_lists = ctx.command_lists.write();
        for &handle in info.command_lists {
            if let Some(list) = command_lists.get_mut(handle) {
                list.mark_submitted();
            }
        }
        timeline
    }

    fn queue_wait(&self, queue: QueueType, timeline: Timeline, timeout_ns: u64) -> bool {
        self.ctx().queues[queue_index(queue)].wait(&self.ctx().device.raw, timeline, timeout_ns)
    }

    fn queue_wait_idle(&self, queue: QueueType) {
        self.ctx().queues[queue_index(queue)].wait_idle(&self.ctx().device.raw);
    }

    fn queue_poll(&self, queue: QueueType, timeline: Timeline) -> bool {
        self.ctx().queues[queue_index(queue)].poll(&self.ctx().device.raw, timeline)
    }

    fn queue_completed(&self, queue: QueueType) -> Timeline {
        self.ctx().queues[queue_index(queue)].completed(&self.ctx().device.raw)
    }

    fn queue_submitted(&self, queue: QueueType) -> Timeline {
        self.ctx().queues[queue_index(queue)].submitted()
    }

    // ---- Command allocator + command list ----

    fn create_command_allocator(&self, queue: QueueType) -> CommandAllocatorHandle {
        let ctx = self.ctx();
        let info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(ctx.device.queue_family_index(queue))
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let pool = match unsafe { ctx.device.raw.create_command_pool(&info, None) } {
            Ok(pool) => pool,
            Err(err) => {
                log::error!(target: "vulkan", "vkCreateCommandPool failed: {err}");
                return CommandAllocatorHandle::INVALID;
            }
        };
        ctx.command_allocators.write().allocate(CommandAllocator { pool, queue_type: queue })
    }

    fn destroy_command_allocator(&self, handle: CommandAllocatorHandle) {
        let ctx = self.ctx();
        if let Some(allocator) = ctx.command_allocators.write().free(handle) {
            unsafe { ctx.device.raw.destroy_command_pool(allocator.pool, None) };
        }
    }

    fn reset_command_allocator(&self, handle: CommandAllocatorHandle) {
        let ctx = self.ctx();
        let Some(pool) = ctx.command_allocators.read().get(handle).map(|a| a.pool) else { return };
        if let Err(err) = unsafe { ctx.device.raw.reset_command_pool(pool, vk::CommandPoolResetFlags::empty()) } {
            log::error!(target: "vulkan", "vkResetCommandPool failed: {err}");
        }
    }

    fn allocate_command_list(&self, allocator: CommandAllocatorHandle) -> CommandListHandle {
        let ctx = self.ctx();
        let allocators = ctx.command_allocators.read();
        let Some(alloc) = allocators.get(allocator) else {
            log::warn!(target: "vulkan", "allocate_command_list: stale allocator handle");
            return CommandListHandle::INVALID;
        };
        let info = vk::CommandBufferAllocateInfo::default()
            .command_pool(alloc.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let queue_type = alloc.queue_type;
        drop(allocators);
        let buffer = match unsafe { ctx.device.raw.allocate_command_buffers(&info) } {
            Ok(buffers) => buffers[0],
            Err(err) => {
                log::error!(target: "vulkan", "vkAllocateCommandBuffers failed: {err}");
                return CommandListHandle::INVALID;
            }
        };
        ctx.command_lists.write().allocate(CommandList::new(buffer, queue_type))
    }

    fn reset_command_list(&self, handle: CommandListHandle) {
        let ctx = self.ctx();
        let mut lists = ctx.command_lists.write();
        if let Some(list) = lists.get_mut(handle) {
            list.reset();
        }
    }

    fn cmd_open(&self, list: CommandListHandle) {
        let ctx = self.ctx();
        let mut lists = ctx.command_lists.write();
        let Some(cmd) = lists.get_mut(list) else { return };
        cmd.open();
        let buffer = cmd.buffer;
        drop(lists);
        if let Err(err) = unsafe {
            ctx.device
                .raw
                .begin_command_buffer(buffer, &vk::CommandBufferBeginInfo::default())
        } {
            log::error!(target: "vulkan", "vkBeginCommandBuffer failed: {err}");
        }
    }

    fn cmd_close(&self, list: CommandListHandle) {
        let ctx = self.ctx();
        let mut lists = ctx.command_lists.write();
        let Some(cmd) = lists.get_mut(list) else { return };
        cmd.close();
        let buffer = cmd.buffer;
        drop(lists);
        if let Err(err) = unsafe { ctx.device.raw.end_command_buffer(buffer) } {
            log::error!(target: "vulkan", "vkEndCommandBuffer failed: {err}");
        }
    }

    fn cmd_set_pipeline(&self, list: CommandListHandle, pipeline: PipelineHandle) {
        let ctx = self.ctx();
        let mut lists = ctx.command_lists.write();
        let Some(cmd) = lists.get_mut(list) else { return };
        cmd.assert_state(RecordingState::Recording);
        let pipelines = ctx.pipelines.read();
        let Some(pipeline_entry) = pipelines.get(pipeline) else { return };
        unsafe { ctx.device.raw.cmd_bind_pipeline(cmd.buffer, pipeline_entry.bind_point, pipeline_entry.native) };
        cmd.bound_pipeline = Some(pipeline);
        cmd.bound_layout = None;
    }

    fn cmd_set_vertex_buffer(&self, list: CommandListHandle, buffer: BufferHandle, offset: u64) {
        let ctx = self.ctx();
        let mut lists = ctx.command_lists.write();
        let Some(cmd) = lists.get_mut(list) else { return };
        cmd.assert_state(RecordingState::Recording);
        let Some(vk_buffer) = ctx.buffers.read().get(buffer).map(|b| b.allocated.buffer) else { return };
        unsafe { ctx.device.raw.cmd_bind_vertex_buffers(cmd.buffer, 0, &[vk_buffer], &[offset]) };
        cmd.bound_vertex_buffer = Some((buffer, offset));
    }

    fn cmd_set_index_buffer(&self, list: CommandListHandle, buffer: BufferHandle, offset: u64) {
        let ctx = self.ctx();
        let mut lists = ctx.command_lists.write();
        let Some(cmd) = lists.get_mut(list) else { return };
        cmd.assert_state(RecordingState::Recording);
        let Some(vk_buffer) = ctx.buffers.read().get(buffer).map(|b| b.allocated.buffer) else { return };
        unsafe { ctx.device.raw.cmd_bind_index_buffer(cmd.buffer, vk_buffer, offset, vk::IndexType::UINT32) };
        cmd.bound_index_buffer = Some((buffer, offset));
    }

    fn cmd_set_viewport(&self, list: CommandListHandle, viewport: Viewport) {
        let ctx = self.ctx();
        let lists = ctx.command_lists.read();
        let Some(cmd) = lists.get(list) else { return };
        cmd.assert_state(RecordingState::Recording);
        let vp = vk::Viewport {
            x: viewport.x,
            y: viewport.y,
            width: viewport.width,
            height: viewport.height,
            min_depth: viewport.min_depth,
            max_depth: viewport.max_depth,
        };
        unsafe { ctx.device.raw.cmd_set_viewport(cmd.buffer, 0, &[vp]) };
    }

    fn cmd_set_scissor(&self, list: CommandListHandle, scissor: Scissor) {
        let ctx = self.ctx();
        let lists = ctx.command_lists.read();
        let Some(cmd) = lists.get(list) else { return };
        cmd.assert_state(RecordingState::Recording);
        let rect = vk::Rect2D {
            offset: vk::Offset2D { x: scissor.x, y: scissor.y },
            extent: vk::Extent2D { width: scissor.width, height: scissor.height },
        };
        unsafe { ctx.device.raw.cmd_set_scissor(cmd.buffer, 0, &[rect]) };
    }

    fn cmd_draw(&self, list: CommandListHandle, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        let ctx = self.ctx();
        let lists = ctx.command_lists.read();
        let Some(cmd) = lists.get(list) else { return };
        cmd.assert_state(RecordingState::Recording);
        unsafe { ctx.device.raw.cmd_draw(cmd.buffer, vertex_count, instance_count, first_vertex, first_instance) };
    }

    fn cmd_draw_indexed(
        &self,
        list: CommandListHandle,
        index_count: u32,
        vertex_offset: i32,
        instance_count: u32,
        first_index: u32,
        first_instance: u32,
    ) {
        let ctx = self.ctx();
        let lists = ctx.command_lists.read();
        let Some(cmd) = lists.get(list) else { return };
        cmd.assert_state(RecordingState::Recording);
        unsafe {
            ctx.device.raw.cmd_draw_indexed(
                cmd.buffer,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            )
        };
    }

    fn cmd_begin_render_pass(&self, list: CommandListHandle, render_pass: RenderPassHandle, framebuffer: FramebufferHandle, clears: &[ClearValue]) {
        let ctx = self.ctx();
        let mut lists = ctx.command_lists.write();
        let Some(cmd) = lists.get_mut(list) else { return };
        cmd.assert_state(RecordingState::Recording);
        let render_passes = ctx.render_passes.read();
        let framebuffers = ctx.framebuffers.read();
        let (Some(pass), Some(fb)) = (render_passes.get(render_pass), framebuffers.get(framebuffer)) else { return };
        let clear_values: Vec<vk::ClearValue> = clears
            .iter()
            .map(|c| match c {
                ClearValue::Color(color) => vk::ClearValue { color: vk::ClearColorValue { float32: color.0 } },
                ClearValue::DepthStencil(ds) => vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue { depth: ds.depth, stencil: ds.stencil },
                },
            })
            .collect();
        let info = vk::RenderPassBeginInfo::default()
            .render_pass(pass.native)
            .framebuffer(fb.native)
            .render_area(vk::Rect2D { offset: vk::Offset2D::default(), extent: vk::Extent2D { width: fb.width, height: fb.height } })
            .clear_values(&clear_values);
        unsafe { ctx.device.raw.cmd_begin_render_pass(cmd.buffer, &info, vk::SubpassContents::INLINE) };
        cmd.in_render_pass = true;
    }

    fn cmd_end_render_pass(&self, list: CommandListHandle) {
        let ctx = self.ctx();
        let mut lists = ctx.command_lists.write();
        let Some(cmd) = lists.get_mut(list) else { return };
        assert!(cmd.in_render_pass, "cmd_end_render_pass called without an open render pass");
        unsafe { ctx.device.raw.cmd_end_render_pass(cmd.buffer) };
        cmd.in_render_pass = false;
    }

    fn cmd_begin_rendering(&self, list: CommandListHandle, info: &RenderingInfo) {
        let ctx = self.ctx();
        let mut lists = ctx.command_lists.write();
        let Some(cmd) = lists.get_mut(list) else { return };
        cmd.assert_state(RecordingState::Recording);
        let texture_views = ctx.texture_views.read();

        let mut color_attachments = Vec::with_capacity(info.color_attachments.len());
        for attachment in info.color_attachments {
            let Some(view) = texture_views.get(attachment.view) else { continue };
            let mut info = vk::RenderingAttachmentInfo::default()
                .image_view(view.view)
                .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .load_op(if attachment.load_clear.is_some() { vk::AttachmentLoadOp::CLEAR } else { vk::AttachmentLoadOp::LOAD })
                .store_op(vk::AttachmentStoreOp::STORE);
            if let Some(ClearValue::Color(color)) = attachment.load_clear {
                info = info.clear_value(vk::ClearValue { color: vk::ClearColorValue { float32: color.0 } });
            }
            color_attachments.push(info);
        }

        let depth_attachment = info.depth_attachment.and_then(|attachment| {
            texture_views.get(attachment.view).map(|view| {
                let mut info = vk::RenderingAttachmentInfo::default()
                    .image_view(view.view)
                    .image_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                    .load_op(if attachment.load_clear.is_some() { vk::AttachmentLoadOp::CLEAR } else { vk::AttachmentLoadOp::LOAD })
                    .store_op(vk::AttachmentStoreOp::STORE);
                if let Some(ClearValue::DepthStencil(ds)) = attachment.load_clear {
                    info = info.clear_value(vk::ClearValue {
                        depth_stencil: vk::ClearDepthStencilValue { depth: ds.depth, stencil: ds.stencil },
                    });
                }
                info
            })
        });
        drop(texture_views);

        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: info.render_area.x, y: info.render_area.y },
            extent: vk::Extent2D { width: info.render_area.width, height: info.render_area.height },
        };
        let mut rendering_info = vk::RenderingInfo::default()
            .render_area(render_area)
            .layer_count(1)
            .color_attachments(&color_attachments);
        if let Some(depth) = depth_attachment.as_ref() {
            rendering_info = rendering_info.depth_attachment(depth);
        }
        unsafe { ctx.device.raw.cmd_begin_rendering(cmd.buffer, &rendering_info) };
        cmd.in_render_pass = true;
    }

    fn cmd_end_rendering(&self, list: CommandListHandle) {
        let ctx = self.ctx();
        let mut lists = ctx.command_lists.write();
        let Some(cmd) = lists.get_mut(list) else { return };
        assert!(cmd.in_render_pass, "cmd_end_rendering called without an open rendering scope");
        unsafe { ctx.device.raw.cmd_end_rendering(cmd.buffer) };
        cmd.in_render_pass = false;
    }

    fn cmd_set_descriptor_set(&self, list: CommandListHandle, slot: u32, set: DescriptorSetHandle) {
        self.cmd_set_descriptor_sets(list, slot, &[set]);
    }

    fn cmd_set_descriptor_sets(&self, list: CommandListHandle, first: u32, sets: &[DescriptorSetHandle]) {
        let ctx = self.ctx();
        let lists = ctx.command_lists.read();
        let Some(cmd) = lists.get(list) else { return };
        cmd.assert_state(RecordingState::Recording);
        let Some(pipeline) = cmd.bound_pipeline else {
            log::warn!(target: "vulkan", "cmd_set_descriptor_sets called with no bound pipeline");
            return;
        };
        let pipelines = ctx.pipelines.read();
        let Some(pipeline_entry) = pipelines.get(pipeline) else { return };
        let (native_layout, bind_point) = (pipeline_entry.layout, pipeline_entry.bind_point);
        drop(pipelines);

        let descriptor_sets = ctx.descriptor_sets.read();
        let mut native_sets = Vec::with_capacity(sets.len());
        for &handle in sets {
            match descriptor_sets.get(handle) {
                Some(VulkanDescriptorSet::Native(raw)) => native_sets.push(*raw),
                Some(VulkanDescriptorSet::Buffer { byte_offset, .. }) => {
                    let buffer_indices = [0u32];
                    let offsets = [*byte_offset];
                    unsafe {
                        ctx.descriptor_buffer_loader.cmd_set_descriptor_buffer_offsets(
                            cmd.buffer,
                            bind_point,
                            native_layout,
                            first,
                            &buffer_indices,
                            &offsets,
                        )
                    };
                    return;
                }
                None => return,
            }
        }
        unsafe { ctx.device.raw.cmd_bind_descriptor_sets(cmd.buffer, bind_point, native_layout, first, &native_sets, &[]) };
    }

    fn cmd_push_constants(&self, list: CommandListHandle, offset: u32, data: &[u8]) {
        let ctx = self.ctx();
        let lists = ctx.command_lists.read();
        let Some(cmd) = lists.get(list) else { return };
        cmd.assert_state(RecordingState::Recording);
        let Some(pipeline) = cmd.bound_pipeline else { return };
        let pipelines = ctx.pipelines.read();
        let Some(pipeline_entry) = pipelines.get(pipeline) else { return };
        let native_layout = pipeline_entry.layout;
        drop(pipelines);

        let pipeline_layouts = ctx.pipeline_layouts.read();
        let stage_mask = pipeline_layouts
            .covering_stage_mask_by_native(native_layout, offset, data.len() as u32)
            .unwrap_or(vk::ShaderStageFlags::ALL);
        drop(pipeline_layouts);

        unsafe { ctx.device.raw.cmd_push_constants(cmd.buffer, native_layout, stage_mask, offset, data) };
    }

    fn cmd_write_buffer(&self, list: CommandListHandle, dst: BufferHandle, offset: u64, data: &[u8]) {
        let ctx = self.ctx();
        let lists = ctx.command_lists.read();
        let Some(cmd) = lists.get(list) else { return };
        cmd.assert_state(RecordingState::Recording);
        let Some(vk_buffer) = ctx.buffers.read().get(dst).map(|b| b.allocated.buffer) else { return };
        unsafe { ctx.device.raw.cmd_update_buffer(cmd.buffer, vk_buffer, offset, data) };
    }

    fn cmd_barrier(&self, list: CommandListHandle, batch: &BarrierBatch) {
        let ctx = self.ctx();
        let lists = ctx.command_lists.read();
        let Some(cmd) = lists.get(list) else { return };
        cmd.assert_state(RecordingState::Recording);

        if !batch.memory.is_empty() {
            let barrier = vk::MemoryBarrier::default();
            unsafe {
                ctx.device.raw.cmd_pipeline_barrier(
                    cmd.buffer,
                    vk::PipelineStageFlags::ALL_COMMANDS,
                    vk::PipelineStageFlags::ALL_COMMANDS,
                    vk::DependencyFlags::empty(),
                    &[barrier],
                    &[],
                    &[],
                );
            }
        }

        let buffers = ctx.buffers.read();
        let buffer_barriers: Vec<vk::BufferMemoryBarrier> = batch
            .buffers
            .iter()
            .filter_map(|b| {
                buffers.get(b.buffer).map(|buf| {
                    vk::BufferMemoryBarrier::default()
                        .buffer(buf.allocated.buffer)
                        .offset(b.offset)
                        .size(if b.size == 0 { vk::WHOLE_SIZE } else { b.size })
                })
            })
            .collect();
        drop(buffers);

        let textures = ctx.textures.read();
        let image_barriers: Vec<vk::ImageMemoryBarrier> = batch
            .images
            .iter()
            .filter_map(|b| {
                textures.get(b.texture).map(|tex| {
                    vk::ImageMemoryBarrier::default()
                        .image(tex.image)
                        .old_layout(vk::ImageLayout::UNDEFINED)
                        .new_layout(vk::ImageLayout::GENERAL)
                        .subresource_range(vk::ImageSubresourceRange {
                            aspect_mask: vk::ImageAspectFlags::COLOR,
                            base_mip_level: b.base_mip_level,
                            level_count: b.mip_level_count,
                            base_array_layer: b.base_array_layer,
                            layer_count: b.array_layer_count,
                        })
                })
            })
            .collect();
        drop(textures);

        if !buffer_barriers.is_empty() || !image_barriers.is_empty() {
            unsafe {
                ctx.device.raw.cmd_pipeline_barrier(
                    cmd.buffer,
                    vk::PipelineStageFlags::ALL_COMMANDS,
                    vk::PipelineStageFlags::ALL_COMMANDS,
                    vk::DependencyFlags::empty(),
                    &[],
                    &buffer_barriers,
                    &image_barriers,
                );
            }
        }
    }
}

impl VulkanBackend {
    fn allocate_set_internal(&self, pool: DescriptorPoolHandle, layout_native: vk::DescriptorSetLayout) -> Option<DescriptorSetHandle> {
        let ctx = self.ctx();
        let mut pools = ctx.descriptor_pools.write();
        let pool_entry = pools.get_mut(pool)?;
        match pool_entry {
            VulkanDescriptorPool::Sets { native, .. } => {
                let layouts = [layout_native];
                let info = vk::DescriptorSetAllocateInfo::default().descriptor_pool(*native).set_layouts(&layouts);
                let set = unsafe { ctx.device.raw.allocate_descriptor_sets(&info) }.ok()?.into_iter().next()?;
                drop(pools);
                Some(ctx.descriptor_sets.write().allocate(VulkanDescriptorSet::Native(set)))
            }
            VulkanDescriptorPool::Buffer { .. } => {
                let offset = pool_entry.allocate_buffer_slot()?;
                drop(pools);
                Some(ctx.descriptor_sets.write().allocate(VulkanDescriptorSet::Buffer { pool, byte_offset: offset }))
            }
        }
    }

    /// Writes one descriptor-buffer set's bindings directly into the
    /// owning heap's mapped memory: for each binding, finds its byte
    /// offset within the set's region and asks the driver for the raw
    /// descriptor bytes via `vkGetDescriptorEXT`, then copies them in.
    fn write_buffer_descriptor_set(
        &self,
        ctx: &Context,
        pool: DescriptorPoolHandle,
        set_byte_offset: u64,
        binding_writes: &[ResourceGroupBinding],
        buffers: &ResourcePool<VulkanBuffer, BufferTag>,
        texture_views: &ResourcePool<VulkanTextureView, TextureViewTag>,
    ) {
        let pools = ctx.descriptor_pools.read();
        let Some(VulkanDescriptorPool::Buffer { heap, bindings, .. }) = pools.get(pool) else {
            log::warn!(target: "vulkan", "write_set: descriptor set points at a non-buffer or stale pool");
            return;
        };
        let heap = *heap;
        let bindings = bindings.clone();
        drop(pools);

        let heaps = ctx.descriptor_heaps.read();
        let Some(heap_entry) = heaps.get(heap) else {
            log::warn!(target: "vulkan", "write_set: stale descriptor heap handle");
            return;
        };
        let Some(base_ptr) = heap_entry.mapped_ptr else {
            log::warn!(target: "vulkan", "write_set: descriptor heap is not host-mapped");
            return;
        };
        let descriptor_size = heap_entry.descriptor_size as usize;

        for binding in binding_writes {
            let Some(binding_offset) = descriptor::conservative_binding_offset(&bindings, binding.binding) else {
                log::warn!(target: "vulkan", "write_set: binding {} not present in its set layout", binding.binding);
                continue;
            };
            let mut out = vec![0u8; descriptor_size];
            match binding.value {
                ResourceGroupBindingValue::Buffer { buffer, offset, range } => {
                    let Some(vk_buffer) = buffers.get(buffer) else { continue };
                    let address = unsafe {
                        ctx.device
                            .raw
                            .get_buffer_device_address(&vk::BufferDeviceAddressInfo::default().buffer(vk_buffer.allocated.buffer))
                    };
                    let address_info = vk::DescriptorAddressInfoEXT::default()
                        .address(address + offset)
                        .range(if range == 0 { vk_buffer.allocated.size - offset } else { range })
                        .format(vk::Format::UNDEFINED);
                    let get_info = vk::DescriptorGetInfoEXT::default()
                        .ty(vk::DescriptorType::UNIFORM_BUFFER)
                        .data(vk::DescriptorDataEXT { p_uniform_buffer: &address_info });
                    unsafe { ctx.descriptor_buffer_loader.get_descriptor(&get_info, &mut out) };
                }
                ResourceGroupBindingValue::Texture { view } => {
                    let Some(vk_view) = texture_views.get(view).map(|v| v.view) else { continue };
                    let image_info = vk::DescriptorImageInfo {
                        sampler: vk::Sampler::null(),
                        image_view: vk_view,
                        image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                    };
                    let get_info = vk::DescriptorGetInfoEXT::default()
                        .ty(vk::DescriptorType::SAMPLED_IMAGE)
                        .data(vk::DescriptorDataEXT { p_sampled_image: &image_info });
                    unsafe { ctx.descriptor_buffer_loader.get_descriptor(&get_info, &mut out) };
                }
            }
            let dst_offset = (set_byte_offset + binding_offset) as usize;
            unsafe { std::ptr::copy_nonoverlapping(out.as_ptr(), base_ptr.add(dst_offset), out.len()) };
        }
    }

}

#[cfg(feature = "window")]
fn surface_instance_extensions(desc: &InitDesc) -> anyhow::Result<Vec<*const i8>> {
    match desc.surface {
        Some(handle) => super::window::required_instance_extensions(handle),
        None => Ok(Vec::new()),
    }
}

#[cfg(not(feature = "window"))]
fn surface_instance_extensions(_desc: &InitDesc) -> anyhow::Result<Vec<*const i8>> {
    Ok(Vec::new())
}

#[cfg(feature = "window")]
fn create_bound_surface(
    instance: &Instance,
    desc: &InitDesc,
) -> anyhow::Result<Option<(khr::surface::Instance, vk::SurfaceKHR)>> {
    match desc.surface {
        Some(handle) => {
            let (loader, surface) = super::window::create_surface(&instance.entry, &instance.vk_instance, handle)?;
            Ok(Some((loader, surface)))
        }
        None => Ok(None),
    }
}

#[cfg(not(feature = "window"))]
fn create_bound_surface(
    _instance: &Instance,
    _desc: &InitDesc,
) -> anyhow::Result<Option<(khr::surface::Instance, vk::SurfaceKHR)>> {
    Ok(None)
}

/// Drains every live swapchain out of the pool so `shutdown` can destroy
/// each one by value; used only there, since every other call site frees
/// swapchains one handle at a time via `destroy_swapchain`.
fn each_swapchain(ctx: &Context) -> Vec<(SwapchainHandle, VulkanSwapchainEntry)> {
    let mut pool = ctx.swapchains.write();
    let mut handles = Vec::with_capacity(pool.len());
    pool.for_each(|handle, _| handles.push(handle));
    handles.into_iter().filter_map(|handle| pool.free(handle).map(|entry| (handle, entry))).collect()
}

fn build_set_layout(ctx: &Context, desc: &SetLayoutDesc) -> Option<VulkanSetLayout> {
    let native_bindings: Vec<vk::DescriptorSetLayoutBinding> = desc
        .bindings
        .iter()
        .map(|b| {
            let count = if b.count == u32::MAX { 1 } else { b.count };
            vk::DescriptorSetLayoutBinding::default()
                .binding(b.binding)
                .descriptor_type(descriptor_type_to_vk(b.descriptor_type))
                .descriptor_count(count)
                .stage_flags(super::format_mapping::shader_stage_flags_to_vk(b.stages))
        })
        .collect();

    let has_variable_count = desc.bindings.iter().any(|b| b.count == u32::MAX);
    let mut flags_info;
    let mut binding_flags = Vec::new();
    let mut create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&native_bindings);

    if desc.flags.contains(DescriptorPoolFlags::DESCRIPTOR_BUFFER) {
        create_info = create_info.flags(vk::DescriptorSetLayoutCreateFlags::DESCRIPTOR_BUFFER_EXT);
    } else if desc.flags.contains(DescriptorPoolFlags::UPDATE_AFTER_BIND) || has_variable_count {
        create_info = create_info.flags(vk::DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL);
        binding_flags = native_bindings
            .iter()
            .enumerate()
            .map(|(i, _)| {
                if desc.bindings[i].count == u32::MAX {
                    vk::DescriptorBindingFlags::VARIABLE_DESCRIPTOR_COUNT | vk::DescriptorBindingFlags::UPDATE_AFTER_BIND
                } else {
                    vk::DescriptorBindingFlags::UPDATE_AFTER_BIND
                }
            })
            .collect();
        flags_info = vk::DescriptorSetLayoutBindingFlagsCreateInfo::default().binding_flags(&binding_flags);
        create_info = create_info.push_next(&mut flags_info);
    }

    let native = unsafe { ctx.device.raw.create_descriptor_set_layout(&create_info, None) }
        .map_err(|err| log::error!(target: "vulkan", "vkCreateDescriptorSetLayout failed: {err}"))
        .ok()?;

    let bindings: Vec<SetLayoutBinding> = desc.bindings.to_vec();
    let stride_per_set = descriptor::compute_stride_per_set(&bindings);
    Some(VulkanSetLayout { native, bindings, flags: desc.flags, stride_per_set, has_variable_count })
}

fn build_descriptor_pool(ctx: &Context, layout: &VulkanSetLayout, capacity: u32, flags: DescriptorPoolFlags) -> Option<VulkanDescriptorPool> {
    if flags.contains(DescriptorPoolFlags::DESCRIPTOR_BUFFER) {
        // The caller is expected to have created a heap via
        // `create_descriptor_heap` and to address into it directly; the
        // legacy `ResourceGroup` path instead carves a sub-range out of
        // a shared heap lazily created the first time it's needed.
        let heap = get_or_create_shared_descriptor_heap(ctx)?;
        return Some(VulkanDescriptorPool::Buffer {
            heap,
            base_offset: 0,
            stride: layout.stride_per_set,
            capacity,
            write_ptr: 0,
            freelist: Vec::new(),
            bindings: layout.bindings.clone(),
        });
    }

    let pool_sizes = descriptor::build_pool_sizes(&layout.bindings, capacity);
    let create_flags = descriptor::classic_pool_create_flags(flags);
    let info = vk::DescriptorPoolCreateInfo::default()
        .pool_sizes(&pool_sizes)
        .max_sets(capacity)
        .flags(create_flags);
    let native = unsafe { ctx.device.raw.create_descriptor_pool(&info, None) }
        .map_err(|err| log::error!(target: "vulkan", "vkCreateDescriptorPool failed: {err}"))
        .ok()?;
    Some(VulkanDescriptorPool::Sets { native, layout_native: layout.native, flags })
}

fn get_or_create_shared_descriptor_heap(ctx: &Context) -> Option<DescriptorHeapHandle> {
    let mut heaps = ctx.descriptor_heaps.write();
    if heaps.is_empty() {
        return None;
    }
    let mut first = None;
    heaps.for_each(|handle, _| {
        if first.is_none() {
            first = Some(handle);
        }
    });
    first
}

trait PipelineLayoutLookupExt {
    fn covering_stage_mask_by_native(&self, native: vk::PipelineLayout, offset: u32, len: u32) -> Option<vk::ShaderStageFlags>;
}

impl PipelineLayoutLookupExt for ResourcePool<VulkanPipelineLayout, PipelineLayoutTag> {
    fn covering_stage_mask_by_native(&self, native: vk::PipelineLayout, offset: u32, len: u32) -> Option<vk::ShaderStageFlags> {
        let mut found = None;
        self.for_each(|_, layout| {
            if found.is_none() && layout.native == native {
                found = layout.covering_stage_mask(offset, len);
            }
        });
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_index_is_stable_and_distinct() {
        assert_eq!(queue_index(QueueType::Graphics), 0);
        assert_eq!(queue_index(QueueType::Compute), 1);
        assert_eq!(queue_index(QueueType::Transfer), 2);
    }
}
