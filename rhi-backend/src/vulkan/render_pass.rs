//! Single-subpass render pass + framebuffer creation. Used only for
//! backends/surfaces that don't go through dynamic rendering (the
//! pipeline module's `begin_rendering` path covers the common case).

use ash::vk;
use rhi_types::RenderPassDesc;

use super::format_mapping::{format_to_vk, load_op_to_vk, store_op_to_vk};

pub struct VulkanRenderPass {
    pub native: vk::RenderPass,
    pub color_attachment_count: u32,
    pub has_depth_attachment: bool,
}

pub struct VulkanFramebuffer {
    pub native: vk::Framebuffer,
    pub width: u32,
    pub height: u32,
}

/// Builds the attachment descriptions for a single-subpass render pass:
/// color attachments go `UNDEFINED -> PRESENT_SRC_KHR` for swapchain
/// usage, the optional depth-stencil attachment keeps independent
/// load/store ops for depth and stencil components and ends in
/// `DEPTH_STENCIL_ATTACHMENT_OPTIMAL`.
pub fn build_attachment_descriptions(desc: &RenderPassDesc) -> Vec<vk::AttachmentDescription> {
    let mut attachments = Vec::with_capacity(desc.color_attachments.len() + 1);
    for color in desc.color_attachments {
        let initial_layout = if color.initial_state_undefined {
            vk::ImageLayout::UNDEFINED
        } else {
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
        };
        let final_layout = if color.final_state_present {
            vk::ImageLayout::PRESENT_SRC_KHR
        } else {
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
        };
        attachments.push(
            vk::AttachmentDescription::default()
                .format(format_to_vk(color.format))
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(load_op_to_vk(color.load_op))
                .store_op(store_op_to_vk(color.store_op))
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(initial_layout)
                .final_layout(final_layout),
        );
    }
    if let Some(depth) = &desc.depth_attachment {
        attachments.push(
            vk::AttachmentDescription::default()
                .format(format_to_vk(depth.format))
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(load_op_to_vk(depth.load_op))
                .store_op(store_op_to_vk(depth.store_op))
                .stencil_load_op(load_op_to_vk(depth.load_op))
                .stencil_store_op(store_op_to_vk(depth.store_op))
                .initial_layout(if depth.initial_state_undefined {
                    vk::ImageLayout::UNDEFINED
                } else {
                    vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
                })
                .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
        );
    }
    attachments
}

pub fn color_attachment_references(count: usize) -> Vec<vk::AttachmentReference> {
    (0..count)
        .map(|index| {
            vk::AttachmentReference::default()
                .attachment(index as u32)
                .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
        })
        .collect()
}

pub fn depth_attachment_reference(color_count: usize) -> vk::AttachmentReference {
    vk::AttachmentReference::default()
        .attachment(color_count as u32)
        .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhi_types::{AttachmentDesc, Format, LoadOp, StoreOp};

    #[test]
    fn color_only_render_pass_has_no_depth_attachment() {
        let desc = RenderPassDesc {
            color_attachments: &[AttachmentDesc {
                format: Format::Bgra8Srgb,
                load_op: LoadOp::Clear,
                store_op: StoreOp::Store,
                initial_state_undefined: true,
                final_state_present: true,
            }],
            depth_attachment: None,
        };
        let attachments = build_attachment_descriptions(&desc);
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].final_layout, vk::ImageLayout::PRESENT_SRC_KHR);
    }

    #[test]
    fn depth_attachment_appended_after_color_attachments() {
        let desc = RenderPassDesc {
            color_attachments: &[AttachmentDesc {
                format: Format::Bgra8Srgb,
                load_op: LoadOp::Clear,
                store_op: StoreOp::Store,
                initial_state_undefined: true,
                final_state_present: false,
            }],
            depth_attachment: Some(AttachmentDesc {
                format: Format::D32Sfloat,
                load_op: LoadOp::Clear,
                store_op: StoreOp::DontCare,
                initial_state_undefined: true,
                final_state_present: false,
            }),
        };
        let attachments = build_attachment_descriptions(&desc);
        assert_eq!(attachments.len(), 2);
        assert_eq!(attachments[1].final_layout, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
    }

    #[test]
    fn depth_attachment_reference_points_past_color_attachments() {
        let reference = depth_attachment_reference(3);
        assert_eq!(reference.attachment, 3);
    }
}
