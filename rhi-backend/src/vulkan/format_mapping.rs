//! Pure, total translation functions from `rhi_types` enums to `ash::vk`
//! enums. No state, no handle lookups, no side effects beyond the
//! warning log on an unrecognized input.

use ash::vk;
use rhi_types::{
    BlendFactor, BlendOp, BufferUsageFlags, CompareFunc, CullMode, DescriptorType, Filter,
    Format, LoadOp, ShaderStage, StoreOp, TextureType, TextureUsageFlags, TextureWrap, Topology,
};

pub fn format_to_vk(format: Format) -> vk::Format {
    match format {
        Format::Undefined => vk::Format::UNDEFINED,
        Format::R8Unorm => vk::Format::R8_UNORM,
        Format::Rg8Unorm => vk::Format::R8G8_UNORM,
        Format::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
        Format::Rgba8Srgb => vk::Format::R8G8B8A8_SRGB,
        Format::Bgra8Unorm => vk::Format::B8G8R8A8_UNORM,
        Format::Bgra8Srgb => vk::Format::B8G8R8A8_SRGB,
        Format::R16Sfloat => vk::Format::R16_SFLOAT,
        Format::Rg16Sfloat => vk::Format::R16G16_SFLOAT,
        Format::Rgba16Sfloat => vk::Format::R16G16B16A16_SFLOAT,
        Format::R32Sfloat => vk::Format::R32_SFLOAT,
        Format::Rg32Sfloat => vk::Format::R32G32_SFLOAT,
        Format::Rgb32Sfloat => vk::Format::R32G32B32_SFLOAT,
        Format::Rgba32Sfloat => vk::Format::R32G32B32A32_SFLOAT,
        Format::D24UnormS8Uint => vk::Format::D24_UNORM_S8_UINT,
        Format::D32Sfloat => vk::Format::D32_SFLOAT,
        Format::Bc1RgbaUnorm => vk::Format::BC1_RGBA_UNORM_BLOCK,
        Format::Bc1RgbaSrgb => vk::Format::BC1_RGBA_SRGB_BLOCK,
        Format::Bc3Unorm => vk::Format::BC3_UNORM_BLOCK,
        Format::Bc3Srgb => vk::Format::BC3_SRGB_BLOCK,
    }
}

/// Inverse of `format_to_vk`, used when a swapchain surface format
/// (chosen by the driver from a list, see `swapchain::choose_format`)
/// needs to be reported back as an `rhi_types::Format`.
pub fn format_from_vk(format: vk::Format) -> Format {
    match format {
        vk::Format::UNDEFINED => Format::Undefined,
        vk::Format::R8_UNORM => Format::R8Unorm,
        vk::Format::R8G8_UNORM => Format::Rg8Unorm,
        vk::Format::R8G8B8A8_UNORM => Format::Rgba8Unorm,
        vk::Format::R8G8B8A8_SRGB => Format::Rgba8Srgb,
        vk::Format::B8G8R8A8_UNORM => Format::Bgra8Unorm,
        vk::Format::B8G8R8A8_SRGB => Format::Bgra8Srgb,
        vk::Format::R16_SFLOAT => Format::R16Sfloat,
        vk::Format::R16G16_SFLOAT => Format::Rg16Sfloat,
        vk::Format::R16G16B16A16_SFLOAT => Format::Rgba16Sfloat,
        vk::Format::R32_SFLOAT => Format::R32Sfloat,
        vk::Format::R32G32_SFLOAT => Format::Rg32Sfloat,
        vk::Format::R32G32B32_SFLOAT => Format::Rgb32Sfloat,
        vk::Format::R32G32B32A32_SFLOAT => Format::Rgba32Sfloat,
        vk::Format::D24_UNORM_S8_UINT => Format::D24UnormS8Uint,
        vk::Format::D32_SFLOAT => Format::D32Sfloat,
        vk::Format::BC1_RGBA_UNORM_BLOCK => Format::Bc1RgbaUnorm,
        vk::Format::BC1_RGBA_SRGB_BLOCK => Format::Bc1RgbaSrgb,
        vk::Format::BC3_UNORM_BLOCK => Format::Bc3Unorm,
        vk::Format::BC3_SRGB_BLOCK => Format::Bc3Srgb,
        other => {
            log::warn!("unrecognized vk::Format {other:?}, reporting as Undefined");
            Format::Undefined
        }
    }
}

pub fn texture_type_to_vk_image_type(ty: TextureType) -> vk::ImageType {
    match ty {
        TextureType::Texture1D | TextureType::Texture1DArray => vk::ImageType::TYPE_1D,
        TextureType::Texture2D
        | TextureType::Texture2DArray
        | TextureType::TextureCube => vk::ImageType::TYPE_2D,
        TextureType::Texture3D => vk::ImageType::TYPE_3D,
    }
}

pub fn texture_type_to_vk_view_type(ty: TextureType) -> vk::ImageViewType {
    match ty {
        TextureType::Texture1D => vk::ImageViewType::TYPE_1D,
        TextureType::Texture1DArray => vk::ImageViewType::TYPE_1D_ARRAY,
        TextureType::Texture2D => vk::ImageViewType::TYPE_2D,
        TextureType::Texture2DArray => vk::ImageViewType::TYPE_2D_ARRAY,
        TextureType::Texture3D => vk::ImageViewType::TYPE_3D,
        TextureType::TextureCube => vk::ImageViewType::CUBE,
    }
}

pub fn topology_to_vk(topology: Topology) -> vk::PrimitiveTopology {
    match topology {
        Topology::Points => vk::PrimitiveTopology::POINT_LIST,
        Topology::Lines => vk::PrimitiveTopology::LINE_LIST,
        Topology::LineStrip => vk::PrimitiveTopology::LINE_STRIP,
        Topology::Triangles => vk::PrimitiveTopology::TRIANGLE_LIST,
        Topology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        Topology::TriangleFan => vk::PrimitiveTopology::TRIANGLE_FAN,
    }
}

pub fn compare_func_to_vk(func: CompareFunc) -> vk::CompareOp {
    match func {
        CompareFunc::Never => vk::CompareOp::NEVER,
        CompareFunc::Less => vk::CompareOp::LESS,
        CompareFunc::Equal => vk::CompareOp::EQUAL,
        CompareFunc::LessEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareFunc::Greater => vk::CompareOp::GREATER,
        CompareFunc::NotEqual => vk::CompareOp::NOT_EQUAL,
        CompareFunc::GreaterEqual => vk::CompareOp::GREATER_OR_EQUAL,
        CompareFunc::Always => vk::CompareOp::ALWAYS,
    }
}

pub fn blend_factor_to_vk(factor: BlendFactor) -> vk::BlendFactor {
    match factor {
        BlendFactor::One => vk::BlendFactor::ONE,
        BlendFactor::Zero => vk::BlendFactor::ZERO,
        BlendFactor::SrcAlpha => vk::BlendFactor::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        BlendFactor::DstAlpha => vk::BlendFactor::DST_ALPHA,
        BlendFactor::OneMinusDstAlpha => vk::BlendFactor::ONE_MINUS_DST_ALPHA,
        BlendFactor::SrcColor => vk::BlendFactor::SRC_COLOR,
        BlendFactor::OneMinusSrcColor => vk::BlendFactor::ONE_MINUS_SRC_COLOR,
        BlendFactor::DstColor => vk::BlendFactor::DST_COLOR,
        BlendFactor::OneMinusDstColor => vk::BlendFactor::ONE_MINUS_DST_COLOR,
    }
}

pub fn blend_op_to_vk(op: BlendOp) -> vk::BlendOp {
    match op {
        BlendOp::Add => vk::BlendOp::ADD,
        BlendOp::Subtract => vk::BlendOp::SUBTRACT,
        BlendOp::ReverseSubtract => vk::BlendOp::REVERSE_SUBTRACT,
        BlendOp::Min => vk::BlendOp::MIN,
        BlendOp::Max => vk::BlendOp::MAX,
    }
}

pub fn cull_mode_to_vk(mode: CullMode) -> vk::CullModeFlags {
    match mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
        CullMode::FrontAndBack => vk::CullModeFlags::FRONT_AND_BACK,
    }
}

pub fn filter_to_vk(filter: Filter) -> (vk::Filter, vk::SamplerMipmapMode) {
    match filter {
        Filter::Nearest => (vk::Filter::NEAREST, vk::SamplerMipmapMode::NEAREST),
        Filter::Linear => (vk::Filter::LINEAR, vk::SamplerMipmapMode::LINEAR),
        Filter::NearestMipmapNearest => (vk::Filter::NEAREST, vk::SamplerMipmapMode::NEAREST),
        Filter::NearestMipmapLinear => (vk::Filter::NEAREST, vk::SamplerMipmapMode::LINEAR),
        Filter::LinearMipmapNearest => (vk::Filter::LINEAR, vk::SamplerMipmapMode::NEAREST),
        Filter::LinearMipmapLinear => (vk::Filter::LINEAR, vk::SamplerMipmapMode::LINEAR),
    }
}

pub fn wrap_to_vk(wrap: TextureWrap) -> vk::SamplerAddressMode {
    match wrap {
        TextureWrap::Repeat => vk::SamplerAddressMode::REPEAT,
        TextureWrap::MirroredRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
        TextureWrap::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        TextureWrap::ClampToBorder => vk::SamplerAddressMode::CLAMP_TO_BORDER,
    }
}

pub fn shader_stage_to_vk(stage: ShaderStage) -> vk::ShaderStageFlags {
    match stage {
        ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
        ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
        ShaderStage::Compute => vk::ShaderStageFlags::COMPUTE,
    }
}

pub fn shader_stage_flags_to_vk(flags: rhi_types::ShaderStageFlags) -> vk::ShaderStageFlags {
    let mut out = vk::ShaderStageFlags::empty();
    if flags.contains(rhi_types::ShaderStageFlags::VERTEX) {
        out |= vk::ShaderStageFlags::VERTEX;
    }
    if flags.contains(rhi_types::ShaderStageFlags::FRAGMENT) {
        out |= vk::ShaderStageFlags::FRAGMENT;
    }
    if flags.contains(rhi_types::ShaderStageFlags::COMPUTE) {
        out |= vk::ShaderStageFlags::COMPUTE;
    }
    if out.is_empty() {
        log::warn!("shader stage mask {flags:?} mapped to no vk stages");
    }
    out
}

pub fn buffer_usage_to_vk(usage: BufferUsageFlags) -> vk::BufferUsageFlags {
    let mut out = vk::BufferUsageFlags::empty();
    if usage.contains(BufferUsageFlags::VERTEX) {
        out |= vk::BufferUsageFlags::VERTEX_BUFFER;
    }
    if usage.contains(BufferUsageFlags::INDEX) {
        out |= vk::BufferUsageFlags::INDEX_BUFFER;
    }
    if usage.contains(BufferUsageFlags::UNIFORM) {
        out |= vk::BufferUsageFlags::UNIFORM_BUFFER;
    }
    if usage.contains(BufferUsageFlags::STORAGE) {
        out |= vk::BufferUsageFlags::STORAGE_BUFFER;
    }
    if usage.contains(BufferUsageFlags::TRANSFER_SRC) {
        out |= vk::BufferUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(BufferUsageFlags::TRANSFER_DST) {
        out |= vk::BufferUsageFlags::TRANSFER_DST;
    }
    if usage.contains(BufferUsageFlags::INDIRECT) {
        out |= vk::BufferUsageFlags::INDIRECT_BUFFER;
    }
    out
}

pub fn texture_usage_to_vk(usage: TextureUsageFlags) -> vk::ImageUsageFlags {
    let mut out = vk::ImageUsageFlags::empty();
    if usage.contains(TextureUsageFlags::SAMPLED) {
        out |= vk::ImageUsageFlags::SAMPLED;
    }
    if usage.contains(TextureUsageFlags::STORAGE) {
        out |= vk::ImageUsageFlags::STORAGE;
    }
    if usage.contains(TextureUsageFlags::COLOR_ATTACHMENT) {
        out |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
    }
    if usage.contains(TextureUsageFlags::DEPTH_STENCIL_ATTACHMENT) {
        out |= vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
    }
    if usage.contains(TextureUsageFlags::TRANSFER_SRC) {
        out |= vk::ImageUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(TextureUsageFlags::TRANSFER_DST) {
        out |= vk::ImageUsageFlags::TRANSFER_DST;
    }
    out
}

pub fn load_op_to_vk(op: LoadOp) -> vk::AttachmentLoadOp {
    match op {
        LoadOp::Load => vk::AttachmentLoadOp::LOAD,
        LoadOp::Clear => vk::AttachmentLoadOp::CLEAR,
        LoadOp::DontCare => vk::AttachmentLoadOp::DONT_CARE,
    }
}

pub fn store_op_to_vk(op: StoreOp) -> vk::AttachmentStoreOp {
    match op {
        StoreOp::Store => vk::AttachmentStoreOp::STORE,
        StoreOp::DontCare => vk::AttachmentStoreOp::DONT_CARE,
    }
}

/// Descriptor type mapping used both by classic-set writes and by
/// descriptor-buffer's `get_descriptor` byte encoding.
pub fn descriptor_type_to_vk(ty: DescriptorType) -> vk::DescriptorType {
    match ty {
        DescriptorType::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        DescriptorType::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
        DescriptorType::UniformBufferDynamic => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
        DescriptorType::SampledImage => vk::DescriptorType::SAMPLED_IMAGE,
        DescriptorType::StorageImage => vk::DescriptorType::STORAGE_IMAGE,
        DescriptorType::Sampler => vk::DescriptorType::SAMPLER,
        DescriptorType::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_round_trips_through_vk() {
        for fmt in [
            Format::Rgba8Unorm,
            Format::Bgra8Srgb,
            Format::D32Sfloat,
            Format::Bc3Srgb,
        ] {
            assert_eq!(format_from_vk(format_to_vk(fmt)), fmt);
        }
    }

    #[test]
    fn unknown_vk_format_falls_back_to_undefined() {
        assert_eq!(format_from_vk(vk::Format::A2R10G10B10_UNORM_PACK32), Format::Undefined);
    }

    #[test]
    fn empty_shader_stage_mask_warns_and_returns_empty() {
        assert!(shader_stage_flags_to_vk(rhi_types::ShaderStageFlags::empty()).is_empty());
    }
}
