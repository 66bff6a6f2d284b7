//! Logical device and the up-to-three queue handles (graphics,
//! compute, transfer) pulled from it.

use std::sync::Arc;

use anyhow::{anyhow, Context};
use ash::vk;
use rhi_types::QueueType;

use super::instance::Instance;
use super::phy_device::PhyDevice;

pub struct LogicalDevice {
    pub instance: Arc<Instance>,
    pub phy_device: Arc<PhyDevice>,
    pub raw: ash::Device,
}

impl LogicalDevice {
    pub fn new(instance: Arc<Instance>, phy_device: Arc<PhyDevice>) -> anyhow::Result<(Self, [vk::Queue; 3])> {
        let families = phy_device.queue_families;
        let unique_families = families.unique_indices();

        let priorities = [1.0f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
            })
            .collect();

        let extension_names = [
            ash::khr::swapchain::NAME.as_ptr(),
            ash::ext::descriptor_buffer::NAME.as_ptr(),
        ];

        let mut timeline_semaphore_features =
            vk::PhysicalDeviceVulkan12Features::default().timeline_semaphore(true);
        let mut dynamic_rendering_features =
            vk::PhysicalDeviceVulkan13Features::default().dynamic_rendering(true);
        let mut descriptor_buffer_features =
            vk::PhysicalDeviceDescriptorBufferFeaturesEXT::default().descriptor_buffer(true);

        let device_features = vk::PhysicalDeviceFeatures::default();
        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&device_features)
            .push_next(&mut timeline_semaphore_features)
            .push_next(&mut dynamic_rendering_features)
            .push_next(&mut descriptor_buffer_features);

        let raw = unsafe {
            instance
                .vk_instance
                .create_device(phy_device.physical_device, &create_info, None)
        }
        .map_err(|err| anyhow!("vkCreateDevice failed: {err}"))
        .context("creating logical device")?;

        let graphics = unsafe { raw.get_device_queue(families.graphics, 0) };
        let compute = unsafe { raw.get_device_queue(families.compute, 0) };
        let transfer = unsafe { raw.get_device_queue(families.transfer, 0) };

        Ok((
            Self {
                instance,
                phy_device,
                raw,
            },
            [graphics, compute, transfer],
        ))
    }

    pub fn queue_family_index(&self, ty: QueueType) -> u32 {
        self.phy_device.queue_families.index_for(ty)
    }

    pub fn wait_idle(&self) {
        if let Err(err) = unsafe { self.raw.device_wait_idle() } {
            log::error!(target: "vulkan", "vkDeviceWaitIdle failed: {err}");
        }
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        self.wait_idle();
        unsafe { self.raw.destroy_device(None) };
    }
}
