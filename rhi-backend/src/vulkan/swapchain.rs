//! Swapchain bring-up, per-image view creation, resize, and the
//! acquire/present binary-semaphore pair.
//!
//! Surface property queries clamp image count and extent to the
//! surface's reported bounds; present-mode and format selection follow
//! a simple two-tier preference chain (`MAILBOX` else `FIFO` for
//! present mode, `BGRA8_SRGB`+`SRGB_NONLINEAR` else `BGRA8_UNORM` else
//! the first available format) rather than a longer platform-dependent
//! fallback list.

use ash::khr;
use ash::vk;
use rhi_types::Format;

use super::device::LogicalDevice;
use super::format_mapping::format_from_vk;
use super::instance::Instance;

pub struct SwapchainImage {
    pub image: vk::Image,
    pub view: vk::ImageView,
}

pub struct Swapchain {
    pub surface_loader: khr::surface::Instance,
    pub surface: vk::SurfaceKHR,
    pub swapchain_loader: khr::swapchain::Device,
    pub raw: vk::SwapchainKHR,
    pub images: Vec<SwapchainImage>,
    pub format: vk::Format,
    pub color_space: vk::ColorSpaceKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub acquire_semaphores: Vec<vk::Semaphore>,
    pub present_semaphores: Vec<vk::Semaphore>,
}

/// Clamps a wishlist against what the surface actually supports,
/// falling back to the one mode every conformant implementation must
/// expose: `MAILBOX` when tearing is unwanted and available, else
/// `FIFO`.
fn choose_present_mode(available: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if !vsync && available.contains(&vk::PresentModeKHR::MAILBOX) {
        return vk::PresentModeKHR::MAILBOX;
    }
    vk::PresentModeKHR::FIFO
}

/// Prefers `BGRA8_SRGB` + `SRGB_NONLINEAR`, then plain `BGRA8_UNORM`
/// in any color space, then the surface's first reported format.
fn choose_surface_format(
    available: &[vk::SurfaceFormatKHR],
    _preferred: vk::Format,
) -> vk::SurfaceFormatKHR {
    if let Some(found) = available.iter().find(|f| {
        f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    }) {
        return *found;
    }
    if let Some(found) = available.iter().find(|f| f.format == vk::Format::B8G8R8A8_UNORM) {
        return *found;
    }
    available
        .first()
        .copied()
        .unwrap_or(vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        })
}

fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, requested: (u32, u32)) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: requested
            .0
            .clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
        height: requested
            .1
            .clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
    }
}

fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR, requested: u32) -> u32 {
    let mut count = requested.max(capabilities.min_image_count);
    if capabilities.max_image_count != 0 {
        count = count.min(capabilities.max_image_count);
    }
    count
}

impl Swapchain {
    pub fn new(
        instance: &Instance,
        device: &LogicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: khr::surface::Instance,
        width: u32,
        height: u32,
        vsync: bool,
        preferred_format: Format,
        image_count: u32,
        old_swapchain: vk::SwapchainKHR,
    ) -> anyhow::Result<Self> {
        let physical_device = device.phy_device.physical_device;
        let capabilities = unsafe {
            surface_loader.get_physical_device_surface_capabilities(physical_device, surface)
        }?;
        let formats =
            unsafe { surface_loader.get_physical_device_surface_formats(physical_device, surface) }?;
        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(physical_device, surface)
        }?;

        let surface_format = choose_surface_format(&formats, super::format_mapping::format_to_vk(preferred_format));
        let present_mode = choose_present_mode(&present_modes, vsync);
        let extent = choose_extent(&capabilities, (width, height));
        let min_image_count = choose_image_count(&capabilities, image_count);

        let swapchain_loader = khr::swapchain::Device::new(&instance.vk_instance, &device.raw);
        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(min_image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let raw = unsafe { swapchain_loader.create_swapchain(&create_info, None) }
            .map_err(|err| anyhow::anyhow!("vkCreateSwapchainKHR failed: {err}"))?;

        let raw_images = unsafe { swapchain_loader.get_swapchain_images(raw) }
            .map_err(|err| anyhow::anyhow!("vkGetSwapchainImagesKHR failed: {err}"))?;

        let mut images = Vec::with_capacity(raw_images.len());
        for image in raw_images {
            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(surface_format.format)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            let view = unsafe { device.raw.create_image_view(&view_info, None) }
                .map_err(|err| anyhow::anyhow!("vkCreateImageView failed: {err}"))?;
            images.push(SwapchainImage { image, view });
        }

        let mut acquire_semaphores = Vec::with_capacity(images.len());
        let mut present_semaphores = Vec::with_capacity(images.len());
        for _ in 0..images.len() {
            let semaphore_info = vk::SemaphoreCreateInfo::default();
            acquire_semaphores.push(unsafe { device.raw.create_semaphore(&semaphore_info, None) }?);
            present_semaphores.push(unsafe { device.raw.create_semaphore(&semaphore_info, None) }?);
        }

        Ok(Self {
            surface_loader,
            surface,
            swapchain_loader,
            raw,
            images,
            format: surface_format.format,
            color_space: surface_format.color_space,
            present_mode,
            extent,
            acquire_semaphores,
            present_semaphores,
        })
    }

    pub fn format(&self) -> Format {
        format_from_vk(self.format)
    }

    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    /// Acquires the next swapchain image, signaling `acquire_semaphores
    /// [frame_index]`. `VK_ERROR_OUT_OF_DATE_KHR`/`SUBOPTIMAL_KHR` are
    /// surfaced as `Ok(None)` so the caller resizes and retries rather
    /// than treating a stale swapchain as a hard error.
    pub fn acquire_next_image(
        &self,
        frame_index: usize,
        timeout_ns: u64,
    ) -> anyhow::Result<Option<u32>> {
        let semaphore = self.acquire_semaphores[frame_index % self.acquire_semaphores.len()];
        match unsafe {
            self.swapchain_loader
                .acquire_next_image(self.raw, timeout_ns, semaphore, vk::Fence::null())
        } {
            Ok((index, suboptimal)) => {
                if suboptimal {
                    log::debug!(target: "vulkan", "swapchain image {index} acquired suboptimal");
                }
                Ok(Some(index))
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(None),
            Err(err) => Err(anyhow::anyhow!("vkAcquireNextImageKHR failed: {err}")),
        }
    }

    /// Presents `image_index`, waiting on `present_semaphores
    /// [frame_index]`. Returns `true` if the caller should resize
    /// before the next acquire.
    pub fn present(
        &self,
        queue: vk::Queue,
        queue_loader: &khr::swapchain::Device,
        frame_index: usize,
        image_index: u32,
    ) -> anyhow::Result<bool> {
        let wait_semaphore = self.present_semaphores[frame_index % self.present_semaphores.len()];
        let swapchains = [self.raw];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { queue_loader.queue_present(queue, &present_info) } {
            Ok(suboptimal) => Ok(suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(true),
            Err(err) => Err(anyhow::anyhow!("vkQueuePresentKHR failed: {err}")),
        }
    }

    pub fn destroy(&mut self, device: &ash::Device) {
        for image in self.images.drain(..) {
            unsafe { device.destroy_image_view(image.view, None) };
        }
        for semaphore in self.acquire_semaphores.drain(..).chain(self.present_semaphores.drain(..)) {
            unsafe { device.destroy_semaphore(semaphore, None) };
        }
        unsafe { self.swapchain_loader.destroy_swapchain(self.raw, None) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capabilities(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D { width: u32::MAX, height: u32::MAX },
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D { width: 4096, height: 4096 },
            ..Default::default()
        }
    }

    #[test]
    fn present_mode_prefers_mailbox_without_vsync() {
        let available = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&available, false), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn present_mode_falls_back_to_fifo_with_vsync() {
        let available = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&available, true), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn present_mode_falls_back_to_fifo_when_mailbox_unavailable() {
        let available = [vk::PresentModeKHR::FIFO];
        assert_eq!(choose_present_mode(&available, false), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn surface_format_prefers_bgra8_srgb() {
        let available = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        let chosen = choose_surface_format(&available, vk::Format::R8G8B8A8_UNORM);
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn surface_format_falls_back_to_bgra8_unorm() {
        let available = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        let chosen = choose_surface_format(&available, vk::Format::R8G8B8A8_UNORM);
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_UNORM);
    }

    #[test]
    fn surface_format_falls_back_to_first_entry() {
        let available = [vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];
        let chosen = choose_surface_format(&available, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(chosen.format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn image_count_clamps_to_max_when_nonzero() {
        let caps = capabilities(2, 3);
        assert_eq!(choose_image_count(&caps, 8), 3);
    }

    #[test]
    fn image_count_unbounded_when_max_is_zero() {
        let caps = capabilities(2, 0);
        assert_eq!(choose_image_count(&caps, 8), 8);
    }

    #[test]
    fn image_count_raised_to_minimum() {
        let caps = capabilities(3, 0);
        assert_eq!(choose_image_count(&caps, 1), 3);
    }

    #[test]
    fn extent_uses_current_extent_when_pinned() {
        let mut caps = capabilities(2, 0);
        caps.current_extent = vk::Extent2D { width: 800, height: 600 };
        let extent = choose_extent(&caps, (1920, 1080));
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn extent_clamps_requested_size_when_not_pinned() {
        let caps = capabilities(2, 0);
        let extent = choose_extent(&caps, (8000, 1));
        assert_eq!(extent.width, 4096);
        assert_eq!(extent.height, 1);
    }
}
