//! Tag markers and the handle aliases applications actually hold.
//!
//! One zero-sized tag type per resource kind; see `pool::Handle`.

use crate::pool::Handle;

pub struct BufferTag;
pub struct TextureTag;
pub struct BufferViewTag;
pub struct TextureViewTag;
pub struct SamplerTag;
pub struct ShaderTag;
pub struct SetLayoutTag;
pub struct DescriptorPoolTag;
pub struct DescriptorSetTag;
pub struct DescriptorHeapTag;
pub struct ResourceGroupLayoutTag;
pub struct ResourceGroupTag;
pub struct PipelineLayoutTag;
pub struct PipelineTag;
pub struct RenderPassTag;
pub struct FramebufferTag;
pub struct SwapchainTag;
pub struct QueueTag;
pub struct CommandAllocatorTag;
pub struct CommandListTag;

pub type BufferHandle = Handle<BufferTag>;
pub type TextureHandle = Handle<TextureTag>;
pub type BufferViewHandle = Handle<BufferViewTag>;
pub type TextureViewHandle = Handle<TextureViewTag>;
pub type SamplerHandle = Handle<SamplerTag>;
pub type ShaderHandle = Handle<ShaderTag>;
pub type SetLayoutHandle = Handle<SetLayoutTag>;
pub type DescriptorPoolHandle = Handle<DescriptorPoolTag>;
pub type DescriptorSetHandle = Handle<DescriptorSetTag>;
pub type DescriptorHeapHandle = Handle<DescriptorHeapTag>;
pub type ResourceGroupLayoutHandle = Handle<ResourceGroupLayoutTag>;
pub type ResourceGroupHandle = Handle<ResourceGroupTag>;
pub type PipelineLayoutHandle = Handle<PipelineLayoutTag>;
pub type PipelineHandle = Handle<PipelineTag>;
pub type RenderPassHandle = Handle<RenderPassTag>;
pub type FramebufferHandle = Handle<FramebufferTag>;
pub type SwapchainHandle = Handle<SwapchainTag>;
pub type QueueHandle = Handle<QueueTag>;
pub type CommandAllocatorHandle = Handle<CommandAllocatorTag>;
pub type CommandListHandle = Handle<CommandListTag>;
