//! Pipeline layout validation/caching and graphics/compute pipeline
//! creation via dynamic rendering.

use ash::vk;
use rhi_types::{GraphicsPipelineDesc, PushConstantRange, Topology};

use super::descriptor::{MAX_PUSH_RANGES, MAX_SET_LAYOUTS};
use super::format_mapping::{
    blend_factor_to_vk, blend_op_to_vk, compare_func_to_vk, cull_mode_to_vk,
    format_to_vk, shader_stage_flags_to_vk, topology_to_vk,
};

pub struct CachedPushRange {
    pub offset: u32,
    pub size: u32,
    pub stage_mask: vk::ShaderStageFlags,
}

pub struct VulkanPipelineLayout {
    pub native: vk::PipelineLayout,
    pub push_ranges: Vec<CachedPushRange>,
}

impl VulkanPipelineLayout {
    /// The smallest push range whose `[offset, offset+size)` fully
    /// covers the caller's `[offset, offset+len)` write, so
    /// `cmd_push_constants` pushes to the narrowest covering stage
    /// mask. Returns `None` if nothing covers it.
    pub fn covering_stage_mask(&self, offset: u32, len: u32) -> Option<vk::ShaderStageFlags> {
        offset.checked_add(len)?;
        self.push_ranges
            .iter()
            .filter(|range| range.offset <= offset && offset + len <= range.offset + range.size)
            .min_by_key(|range| range.size)
            .map(|range| range.stage_mask)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineLayoutError {
    #[error("pipeline layout requests {0} set layouts, exceeding the limit of {MAX_SET_LAYOUTS}")]
    TooManySetLayouts(usize),
    #[error("pipeline layout requests {0} push-constant ranges, exceeding the limit of {MAX_PUSH_RANGES}")]
    TooManyPushRanges(usize),
    #[error("total push-constant size {total} exceeds the device limit of {limit}")]
    PushConstantBudgetExceeded { total: u32, limit: u32 },
}

/// Pure precondition checks for pipeline layout descriptors, split out
/// so they're testable without a device.
pub fn validate_pipeline_layout_desc(
    set_layout_count: usize,
    push_ranges: &[PushConstantRange],
    max_push_constants_size: u32,
) -> Result<(), PipelineLayoutError> {
    if set_layout_count > MAX_SET_LAYOUTS {
        return Err(PipelineLayoutError::TooManySetLayouts(set_layout_count));
    }
    if push_ranges.len() > MAX_PUSH_RANGES {
        return Err(PipelineLayoutError::TooManyPushRanges(push_ranges.len()));
    }
    let total: u32 = push_ranges.iter().map(|range| range.offset + range.size).max().unwrap_or(0);
    if total > max_push_constants_size {
        return Err(PipelineLayoutError::PushConstantBudgetExceeded {
            total,
            limit: max_push_constants_size,
        });
    }
    Ok(())
}

pub fn build_push_constant_ranges(push_ranges: &[PushConstantRange]) -> Vec<CachedPushRange> {
    push_ranges
        .iter()
        .map(|range| CachedPushRange {
            offset: range.offset,
            size: range.size,
            stage_mask: shader_stage_flags_to_vk(range.stages),
        })
        .collect()
}

pub struct VulkanPipeline {
    pub native: vk::Pipeline,
    pub layout: vk::PipelineLayout,
    pub bind_point: vk::PipelineBindPoint,
}

/// Viewport and scissor are always dynamic: the returned
/// `vk::PipelineViewportStateCreateInfo` carries zero viewports/scissors
/// and relies on `VK_DYNAMIC_STATE_VIEWPORT`/`VK_DYNAMIC_STATE_SCISSOR`
/// in the dynamic-state list, so callers set both per draw instead of
/// baking them into the pipeline.
pub const DYNAMIC_STATES: [vk::DynamicState; 2] =
    [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];

pub fn input_assembly_state(topology: Topology) -> vk::PipelineInputAssemblyStateCreateInfo<'static> {
    vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(topology_to_vk(topology))
        .primitive_restart_enable(false)
}

pub fn rasterization_state(desc: &rhi_types::RasterizationState) -> vk::PipelineRasterizationStateCreateInfo<'static> {
    vk::PipelineRasterizationStateCreateInfo::default()
        .polygon_mode(match desc.fill_mode {
            rhi_types::FillMode::Solid => vk::PolygonMode::FILL,
            rhi_types::FillMode::Wireframe => vk::PolygonMode::LINE,
        })
        .cull_mode(cull_mode_to_vk(desc.cull_mode))
        .front_face(if desc.front_face_cw { vk::FrontFace::CLOCKWISE } else { vk::FrontFace::COUNTER_CLOCKWISE })
        .depth_bias_enable(desc.depth_bias != 0.0)
        .depth_bias_constant_factor(desc.depth_bias)
        .line_width(1.0)
}

pub fn multisample_state() -> vk::PipelineMultisampleStateCreateInfo<'static> {
    // Multisampling is not exposed; every pipeline runs at one sample.
    vk::PipelineMultisampleStateCreateInfo::default().rasterization_samples(vk::SampleCountFlags::TYPE_1)
}

pub fn depth_stencil_state(desc: &rhi_types::DepthStencilState) -> vk::PipelineDepthStencilStateCreateInfo<'static> {
    vk::PipelineDepthStencilStateCreateInfo::default()
        .depth_test_enable(desc.depth_test)
        .depth_write_enable(desc.depth_write)
        .depth_compare_op(compare_func_to_vk(desc.depth_compare))
}

pub fn color_blend_attachment_state(desc: &rhi_types::ColorBlendAttachment) -> vk::PipelineColorBlendAttachmentState {
    vk::PipelineColorBlendAttachmentState::default()
        .blend_enable(desc.blend_enable)
        .src_color_blend_factor(blend_factor_to_vk(desc.src_color))
        .dst_color_blend_factor(blend_factor_to_vk(desc.dst_color))
        .color_blend_op(blend_op_to_vk(desc.color_op))
        .src_alpha_blend_factor(blend_factor_to_vk(desc.src_alpha))
        .dst_alpha_blend_factor(blend_factor_to_vk(desc.dst_alpha))
        .alpha_blend_op(blend_op_to_vk(desc.alpha_op))
        .color_write_mask(vk::ColorComponentFlags::RGBA)
}

pub fn vertex_input_bindings(desc: &GraphicsPipelineDesc) -> Vec<vk::VertexInputBindingDescription> {
    desc.vertex_bindings
        .iter()
        .map(|binding| {
            vk::VertexInputBindingDescription::default()
                .binding(binding.binding)
                .stride(binding.stride)
                .input_rate(if binding.per_instance { vk::VertexInputRate::INSTANCE } else { vk::VertexInputRate::VERTEX })
        })
        .collect()
}

pub fn vertex_input_attributes(desc: &GraphicsPipelineDesc) -> Vec<vk::VertexInputAttributeDescription> {
    desc.vertex_attributes
        .iter()
        .map(|attribute| {
            vk::VertexInputAttributeDescription::default()
                .location(attribute.location)
                .binding(attribute.binding)
                .format(format_to_vk(attribute.format))
                .offset(attribute.offset)
        })
        .collect()
}

/// Builds `VkPipelineRenderingCreateInfo` for the dynamic-rendering
/// path: color formats plus an optional depth format, used instead of
/// a render pass handle when the caller supplies one.
pub fn dynamic_rendering_info(
    color_formats: &[vk::Format],
    depth_format: Option<vk::Format>,
) -> vk::PipelineRenderingCreateInfo<'_> {
    let mut info = vk::PipelineRenderingCreateInfo::default().color_attachment_formats(color_formats);
    if let Some(format) = depth_format {
        info = info.depth_attachment_format(format);
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhi_types::ShaderStageFlags;

    fn range(offset: u32, size: u32, stages: ShaderStageFlags) -> PushConstantRange {
        PushConstantRange { stages, offset, size }
    }

    #[test]
    fn validate_rejects_too_many_set_layouts() {
        let err = validate_pipeline_layout_desc(MAX_SET_LAYOUTS + 1, &[], 256);
        assert!(matches!(err, Err(PipelineLayoutError::TooManySetLayouts(_))));
    }

    #[test]
    fn validate_rejects_too_many_push_ranges() {
        let ranges = vec![range(0, 4, ShaderStageFlags::VERTEX); MAX_PUSH_RANGES + 1];
        let err = validate_pipeline_layout_desc(1, &ranges, 256);
        assert!(matches!(err, Err(PipelineLayoutError::TooManyPushRanges(_))));
    }

    #[test]
    fn validate_rejects_oversized_push_constant_budget() {
        let ranges = [range(0, 300, ShaderStageFlags::VERTEX)];
        let err = validate_pipeline_layout_desc(1, &ranges, 128);
        assert!(matches!(err, Err(PipelineLayoutError::PushConstantBudgetExceeded { .. })));
    }

    #[test]
    fn validate_accepts_well_formed_layout() {
        let ranges = [range(0, 64, ShaderStageFlags::VERTEX)];
        assert!(validate_pipeline_layout_desc(2, &ranges, 128).is_ok());
    }

    #[test]
    fn covering_stage_mask_picks_smallest_matching_range() {
        let layout = VulkanPipelineLayout {
            native: vk::PipelineLayout::null(),
            push_ranges: vec![
                CachedPushRange { offset: 0, size: 64, stage_mask: vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT },
                CachedPushRange { offset: 0, size: 16, stage_mask: vk::ShaderStageFlags::VERTEX },
            ],
        };
        assert_eq!(layout.covering_stage_mask(4, 8), Some(vk::ShaderStageFlags::VERTEX));
    }

    #[test]
    fn covering_stage_mask_none_when_nothing_covers() {
        let layout = VulkanPipelineLayout {
            native: vk::PipelineLayout::null(),
            push_ranges: vec![CachedPushRange { offset: 0, size: 16, stage_mask: vk::ShaderStageFlags::VERTEX }],
        };
        assert_eq!(layout.covering_stage_mask(8, 16), None);
    }
}
