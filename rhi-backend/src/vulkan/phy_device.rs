//! Physical device selection and queue family discovery. The
//! vendor-id-to-name table, driver-version formatting, and GPU-type
//! scoring are vendor trivia shared with any Vulkan instance wrapper.
//! Queue family discovery looks for up to three distinct families
//! (graphics, compute, transfer), preferring a dedicated compute family
//! and a dedicated transfer family when the device exposes them.

use std::ffi::CStr;

use anyhow::{anyhow, Context};
use ash::vk;
use rhi_types::QueueType;

use super::instance::Instance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub compute: u32,
    pub transfer: u32,
}

impl QueueFamilies {
    pub fn index_for(&self, ty: QueueType) -> u32 {
        match ty {
            QueueType::Graphics => self.graphics,
            QueueType::Compute => self.compute,
            QueueType::Transfer => self.transfer,
        }
    }

    /// Distinct family indices, for building `VkDeviceQueueCreateInfo`
    /// without requesting the same family twice.
    pub fn unique_indices(&self) -> Vec<u32> {
        let mut v = vec![self.graphics, self.compute, self.transfer];
        v.sort_unstable();
        v.dedup();
        v
    }
}

pub struct PhyDevice {
    pub instance: std::sync::Arc<Instance>,
    pub physical_device: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
    pub queue_families: QueueFamilies,
    pub renderer_name: String,
    pub vendor_name: String,
    pub version_name: String,
    pub min_uniform_buffer_offset_alignment: u64,
    pub min_storage_buffer_offset_alignment: u64,
    pub max_push_constants_size: u32,
}

/// from: https://github.com/SaschaWillems/vulkan.gpuinfo.org
fn driver_version_string(driver_version: u32, vendor_id: u32) -> String {
    if vendor_id == 0x10DE {
        format!(
            "{}.{}.{}.{}",
            (driver_version >> 22) & 0x3ff,
            (driver_version >> 14) & 0x0ff,
            (driver_version >> 6) & 0x0ff,
            driver_version & 0x003f
        )
    } else if vendor_id == 0x8086 {
        format!("{}.{}", driver_version >> 14, driver_version & 0x3fff)
    } else {
        format!(
            "{}.{}.{}",
            driver_version >> 22,
            (driver_version >> 12) & 0x3ff,
            driver_version & 0xfff
        )
    }
}

fn vendor_name_for(vendor_id: u32) -> &'static str {
    match vendor_id {
        0x1002 => "AMD",
        0x1010 => "ImgTec",
        0x106B => "Apple",
        0x10DE => "NVIDIA",
        0x13B5 => "ARM",
        0x5143 => "Qualcomm",
        0x8086 => "INTEL",
        0x10005 => "Mesa",
        other => {
            log::warn!("unknown gpu vendor {other}");
            "unknown"
        }
    }
}

/// Picks the family best matching `wanted`, preferring one that does
/// NOT also advertise `avoid` when an alternative exists (so compute
/// and transfer prefer dedicated queues over the combined graphics
/// family), falling back to any family advertising `wanted`.
fn pick_family(
    props: &[vk::QueueFamilyProperties],
    wanted: vk::QueueFlags,
    avoid: vk::QueueFlags,
) -> Option<u32> {
    let dedicated = props.iter().position(|p| {
        p.queue_count > 0 && p.queue_flags.contains(wanted) && !p.queue_flags.intersects(avoid)
    });
    if let Some(index) = dedicated {
        return Some(index as u32);
    }
    props
        .iter()
        .position(|p| p.queue_count > 0 && p.queue_flags.contains(wanted))
        .map(|i| i as u32)
}

fn discover_queue_families(props: &[vk::QueueFamilyProperties]) -> anyhow::Result<QueueFamilies> {
    let graphics = pick_family(props, vk::QueueFlags::GRAPHICS, vk::QueueFlags::empty())
        .ok_or_else(|| anyhow!("no queue family supports GRAPHICS"))?;
    // A dedicated compute/transfer family is one that does not also
    // carry GRAPHICS, so async compute/transfer actually run off the
    // graphics-queue critical path.
    let compute = pick_family(props, vk::QueueFlags::COMPUTE, vk::QueueFlags::GRAPHICS)
        .unwrap_or(graphics);
    let transfer = pick_family(
        props,
        vk::QueueFlags::TRANSFER,
        vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE,
    )
    .unwrap_or(graphics);

    Ok(QueueFamilies {
        graphics,
        compute,
        transfer,
    })
}

impl PhyDevice {
    pub fn select(instance: std::sync::Arc<Instance>) -> anyhow::Result<Self> {
        let devices = unsafe { instance.vk_instance.enumerate_physical_devices() }
            .context("enumerate_physical_devices failed")?;
        if devices.is_empty() {
            return Err(anyhow!("no Vulkan physical devices found"));
        }

        // Prefer the first discrete GPU; otherwise take the first device
        // at all. A real deployment would also weigh integrated/virtual
        // more carefully, but this keeps selection simple without a
        // multi-GPU config surface.
        let mut chosen = devices[0];
        let mut chosen_props = unsafe { instance.vk_instance.get_physical_device_properties(chosen) };
        for &device in &devices {
            let props = unsafe { instance.vk_instance.get_physical_device_properties(device) };
            if props.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
                chosen = device;
                chosen_props = props;
                break;
            }
        }

        let queue_props =
            unsafe { instance.vk_instance.get_physical_device_queue_family_properties(chosen) };
        let queue_families = discover_queue_families(&queue_props)?;

        let renderer_name = unsafe { CStr::from_ptr(chosen_props.device_name.as_ptr()) }
            .to_str()
            .unwrap_or("unknown")
            .to_string();
        let vendor_name = vendor_name_for(chosen_props.vendor_id).to_string();
        let version_name = format!(
            "Vulkan {}.{}.{} (driver {})",
            vk::api_version_major(chosen_props.api_version),
            vk::api_version_minor(chosen_props.api_version),
            vk::api_version_patch(chosen_props.api_version),
            driver_version_string(chosen_props.driver_version, chosen_props.vendor_id),
        );
        log::info!("{version_name}, {vendor_name}, {renderer_name}");

        Ok(Self {
            min_uniform_buffer_offset_alignment: chosen_props
                .limits
                .min_uniform_buffer_offset_alignment,
            min_storage_buffer_offset_alignment: chosen_props
                .limits
                .min_storage_buffer_offset_alignment,
            max_push_constants_size: chosen_props.limits.max_push_constants_size,
            instance,
            physical_device: chosen,
            properties: chosen_props,
            queue_families,
            renderer_name,
            vendor_name,
            version_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags, count: u32) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: count,
            ..Default::default()
        }
    }

    #[test]
    fn prefers_dedicated_compute_and_transfer_families() {
        let props = vec![
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, 1),
            family(vk::QueueFlags::COMPUTE, 2),
            family(vk::QueueFlags::TRANSFER, 1),
        ];
        let families = discover_queue_families(&props).unwrap();
        assert_eq!(families.graphics, 0);
        assert_eq!(families.compute, 1);
        assert_eq!(families.transfer, 2);
    }

    #[test]
    fn falls_back_to_graphics_family_when_no_dedicated_queue_exists() {
        let props = vec![family(
            vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
            1,
        )];
        let families = discover_queue_families(&props).unwrap();
        assert_eq!(families.graphics, 0);
        assert_eq!(families.compute, 0);
        assert_eq!(families.transfer, 0);
    }

    #[test]
    fn unique_indices_dedups() {
        let families = QueueFamilies {
            graphics: 0,
            compute: 0,
            transfer: 1,
        };
        assert_eq!(families.unique_indices(), vec![0, 1]);
    }
}
