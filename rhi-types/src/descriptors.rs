//! Creation-info structs passed into the `rhi` façade's `create_*`
//! operations: buffers, textures, views, samplers, shaders, pipelines,
//! descriptor layouts, render passes, and swapchains.

use crate::enums::{
    BlendFactor, BlendOp, BufferUsageFlags, CompareFunc, CullMode, DescriptorPoolFlags,
    DescriptorType, FillMode, Filter, GraphicsApi, LoadOp, MemoryUsage, QueueType, ShaderStage,
    ShaderStageFlags, StoreOp, TextureType, TextureUsageFlags, TextureWrap, Topology,
};
use crate::format::Format;
use crate::handles::{
    BufferHandle, CommandListHandle, PipelineLayoutHandle, RenderPassHandle, SetLayoutHandle,
    ShaderHandle, TextureHandle, TextureViewHandle,
};

/// A raw platform window/display handle pair, opaque to `rhi-types`.
/// `rhi-backend`'s windowing glue downcasts this into
/// `raw-window-handle` trait objects.
#[derive(Debug, Clone, Copy)]
pub struct RawSurfaceHandle {
    pub window: *mut std::ffi::c_void,
    pub display: *mut std::ffi::c_void,
}

// SAFETY: these are opaque platform pointers threaded through to a
// single initialization call; the caller owns the real synchronization.
unsafe impl Send for RawSurfaceHandle {}
unsafe impl Sync for RawSurfaceHandle {}

/// Device/instance bring-up parameters.
#[derive(Debug, Clone)]
pub struct InitDesc {
    pub api: GraphicsApi,
    pub app_name: String,
    pub enable_validation: bool,
    pub surface: Option<RawSurfaceHandle>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BufferDesc {
    pub size: u64,
    pub usage: BufferUsageFlags,
    pub memory_usage: MemoryUsage,
}

impl BufferDesc {
    pub fn new(size: u64, usage: BufferUsageFlags) -> Self {
        Self {
            size,
            usage,
            memory_usage: MemoryUsage::Auto,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BufferViewDesc {
    pub buffer: BufferHandle,
    pub offset: u64,
    /// `0` means "from offset to the end of the buffer".
    pub range: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct TextureDesc {
    pub texture_type: TextureType,
    pub format: Format,
    pub width: u32,
    pub height: u32,
    pub depth_or_array_layers: u32,
    pub mip_levels: u32,
    pub usage: TextureUsageFlags,
    pub memory_usage: MemoryUsage,
}

impl Default for TextureDesc {
    fn default() -> Self {
        Self {
            texture_type: TextureType::Texture2D,
            format: Format::Rgba8Unorm,
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
            mip_levels: 1,
            usage: TextureUsageFlags::empty(),
            memory_usage: MemoryUsage::GpuOnly,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TextureViewDesc {
    pub texture: TextureHandle,
    pub format: Format,
    pub base_mip_level: u32,
    pub mip_level_count: u32,
    pub base_array_layer: u32,
    pub array_layer_count: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct SamplerDesc {
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub wrap_u: TextureWrap,
    pub wrap_v: TextureWrap,
    pub wrap_w: TextureWrap,
    pub max_anisotropy: f32,
    pub compare: Option<CompareFunc>,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            min_filter: Filter::Linear,
            mag_filter: Filter::Linear,
            wrap_u: TextureWrap::Repeat,
            wrap_v: TextureWrap::Repeat,
            wrap_w: TextureWrap::Repeat,
            max_anisotropy: 1.0,
            compare: None,
        }
    }
}

/// `bytecode` is the target backend's native intermediate representation
/// (SPIR-V for Vulkan). `rhi` never cross-compiles shaders.
#[derive(Debug, Clone)]
pub struct ShaderDesc<'a> {
    pub stage: ShaderStage,
    pub bytecode: &'a [u8],
    pub entry_point: &'a str,
}

/// A single binding slot within a descriptor set layout / resource
/// group layout — the same logical concept whether the backend encodes
/// it as a classic descriptor set or a bindless descriptor buffer.
#[derive(Debug, Clone, Copy)]
pub struct SetLayoutBinding {
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    pub count: u32,
    pub stages: ShaderStageFlags,
}

#[derive(Debug, Clone)]
pub struct SetLayoutDesc<'a> {
    pub bindings: &'a [SetLayoutBinding],
    /// Descriptor-buffer layouts need `EXT_descriptor_buffer`'s
    /// "resource descriptor buffer" bit baked into the layout at
    /// creation; `flags` carries that request through from the caller.
    pub flags: DescriptorPoolFlags,
}

#[derive(Debug, Clone, Copy)]
pub struct PushConstantRange {
    pub stages: ShaderStageFlags,
    pub offset: u32,
    pub size: u32,
}

#[derive(Debug, Clone)]
pub struct PipelineLayoutDesc<'a> {
    pub set_layouts: &'a [SetLayoutHandle],
    pub push_constants: &'a [PushConstantRange],
}

#[derive(Debug, Clone, Copy)]
pub struct VertexAttribute {
    pub location: u32,
    pub binding: u32,
    pub format: Format,
    pub offset: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct VertexBinding {
    pub binding: u32,
    pub stride: u32,
    pub per_instance: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ColorBlendAttachment {
    pub blend_enable: bool,
    pub src_color: BlendFactor,
    pub dst_color: BlendFactor,
    pub color_op: BlendOp,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
    pub alpha_op: BlendOp,
}

impl Default for ColorBlendAttachment {
    fn default() -> Self {
        Self {
            blend_enable: false,
            src_color: BlendFactor::One,
            dst_color: BlendFactor::Zero,
            color_op: BlendOp::Add,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::Zero,
            alpha_op: BlendOp::Add,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RasterizationState {
    pub cull_mode: CullMode,
    pub fill_mode: FillMode,
    pub front_face_cw: bool,
    pub depth_bias: f32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DepthStencilState {
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: CompareFunc,
}

#[derive(Debug, Clone)]
pub struct GraphicsPipelineDesc<'a> {
    pub layout: PipelineLayoutHandle,
    pub render_pass: RenderPassHandle,
    pub vertex_shader: ShaderHandle,
    pub fragment_shader: ShaderHandle,
    pub vertex_bindings: &'a [VertexBinding],
    pub vertex_attributes: &'a [VertexAttribute],
    pub topology: Topology,
    pub rasterization: RasterizationState,
    pub depth_stencil: DepthStencilState,
    pub color_blend_attachments: &'a [ColorBlendAttachment],
}

#[derive(Debug, Clone)]
pub struct ComputePipelineDesc {
    pub layout: PipelineLayoutHandle,
    pub shader: ShaderHandle,
}

#[derive(Debug, Clone, Copy)]
pub struct AttachmentDesc {
    pub format: Format,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub initial_state_undefined: bool,
    pub final_state_present: bool,
}

#[derive(Debug, Clone)]
pub struct RenderPassDesc<'a> {
    pub color_attachments: &'a [AttachmentDesc],
    pub depth_attachment: Option<AttachmentDesc>,
}

#[derive(Debug, Clone)]
pub struct FramebufferDesc<'a> {
    pub render_pass: RenderPassHandle,
    pub attachments: &'a [TextureViewHandle],
    pub width: u32,
    pub height: u32,
}

/// Swapchain bring-up parameters. `vsync` keeps the same decision
/// input as a `PresentModeKHR`-style backend, but drives a simplified
/// `MAILBOX`/`FIFO` present-mode search rather than a multi-tier
/// vsync-off fallback chain.
#[derive(Debug, Clone, Copy)]
pub struct SwapchainDesc {
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
    pub preferred_format: Format,
    pub frames_in_flight: u32,
}

impl Default for SwapchainDesc {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            vsync: true,
            preferred_format: Format::Bgra8Srgb,
            frames_in_flight: 2,
        }
    }
}

/// A cross-queue ordering constraint declared at submit time, resolved
/// against the dependency queue's timeline counter rather than a
/// binary semaphore.
#[derive(Debug, Clone, Copy)]
pub struct QueueDependency {
    pub queue: QueueType,
    /// Wait until this queue's timeline has completed at least this many
    /// submissions; `None` means "the submission about to be made on
    /// that queue", resolved by the backend at submit time.
    pub wait_value: Option<u64>,
    pub wait_stages: ShaderStageFlags,
}

#[derive(Debug, Clone)]
pub struct SubmitInfo<'a> {
    pub queue: QueueType,
    pub command_lists: &'a [CommandListHandle],
    pub dependencies: &'a [QueueDependency],
    /// Binary semaphore wait, only meaningful for the first submission
    /// of a frame that consumes a swapchain image.
    pub wait_for_acquire: bool,
    /// Binary semaphore signal, only meaningful for the submission that
    /// hands a swapchain image back to `present`.
    pub signal_for_present: bool,
}

/// A resource group's binding slots, resolved once at build time and
/// then treated as immutable.
#[derive(Debug, Clone, Copy)]
pub enum ResourceGroupBindingValue {
    Buffer {
        buffer: BufferHandle,
        offset: u64,
        range: u64,
    },
    Texture {
        view: TextureViewHandle,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct ResourceGroupBinding {
    pub binding: u32,
    pub value: ResourceGroupBindingValue,
}

#[derive(Debug, Clone)]
pub struct ResourceGroupDesc<'a> {
    pub layout: SetLayoutHandle,
    pub bindings: &'a [ResourceGroupBinding],
}
