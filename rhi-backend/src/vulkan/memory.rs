//! The block-allocator wrapper. `gpu-allocator` provides the
//! sub-allocation strategy VMA would in a C++ equivalent; see
//! DESIGN.md for the dependency choice.

use std::sync::Arc;

use anyhow::{anyhow, Context};
use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, Allocator, AllocatorCreateDesc};
use gpu_allocator::MemoryLocation;
use parking_lot::Mutex;
use rhi_types::MemoryUsage;

use super::device::LogicalDevice;
use super::instance::Instance;

fn memory_usage_to_location(usage: MemoryUsage, cpu_visible_hint: bool) -> MemoryLocation {
    match usage {
        MemoryUsage::GpuOnly => MemoryLocation::GpuOnly,
        MemoryUsage::CpuToGpu => MemoryLocation::CpuToGpu,
        MemoryUsage::GpuToCpu => MemoryLocation::GpuToCpu,
        MemoryUsage::Auto => {
            if cpu_visible_hint {
                MemoryLocation::CpuToGpu
            } else {
                MemoryLocation::GpuOnly
            }
        }
    }
}

pub struct AllocatedBuffer {
    pub buffer: vk::Buffer,
    pub allocation: Allocation,
    pub size: u64,
}

impl AllocatedBuffer {
    /// Non-null only for `CPU_TO_GPU`/`GPU_TO_CPU` allocations;
    /// `GPU_ONLY` buffers are never host-mapped, so this is always null
    /// for them.
    pub fn mapped_ptr(&self) -> Option<*mut u8> {
        self.allocation.mapped_ptr().map(|p| p.as_ptr() as *mut u8)
    }
}

pub struct AllocatedImage {
    pub image: vk::Image,
    pub allocation: Allocation,
}

pub struct MemoryAllocator {
    device: Arc<LogicalDevice>,
    allocator: Mutex<Allocator>,
}

impl MemoryAllocator {
    pub fn new(instance: Arc<Instance>, device: Arc<LogicalDevice>) -> anyhow::Result<Self> {
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.vk_instance.clone(),
            device: device.raw.clone(),
            physical_device: device.phy_device.physical_device,
            debug_settings: Default::default(),
            buffer_device_address: true,
            allocation_sizes: Default::default(),
        })
        .context("gpu_allocator::vulkan::Allocator::new failed")?;

        Ok(Self {
            device,
            allocator: Mutex::new(allocator),
        })
    }

    /// `usage` chooses buffer-usage bits; `memory_usage` chooses the
    /// allocator location (`AUTO` resolves to host-visible only when
    /// `usage` requests transfer-src or uniform/storage with the
    /// `CPU_TO_GPU`-implying flags, resolving location at allocation
    /// time based on usage).
    pub fn create_buffer(
        &self,
        size: u64,
        vk_usage: vk::BufferUsageFlags,
        memory_usage: MemoryUsage,
        name: &str,
    ) -> anyhow::Result<AllocatedBuffer> {
        if size == 0 {
            return Err(anyhow!("zero-size buffer requested"));
        }
        let cpu_visible_hint = vk_usage.contains(vk::BufferUsageFlags::TRANSFER_SRC);
        let location = memory_usage_to_location(memory_usage, cpu_visible_hint);

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(vk_usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { self.device.raw.create_buffer(&buffer_info, None) }
            .map_err(|err| anyhow!("vkCreateBuffer failed: {err}"))?;
        let requirements = unsafe { self.device.raw.get_buffer_memory_requirements(buffer) };

        let allocation = self
            .allocator
            .lock()
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear: true,
                allocation_scheme: gpu_allocator::vulkan::AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|err| {
                unsafe { self.device.raw.destroy_buffer(buffer, None) };
                anyhow!("buffer allocation failed: {err}")
            })?;

        unsafe {
            self.device
                .raw
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
        }
        .map_err(|err| anyhow!("vkBindBufferMemory failed: {err}"))?;

        Ok(AllocatedBuffer {
            buffer,
            allocation,
            size,
        })
    }

    pub fn destroy_buffer(&self, buffer: AllocatedBuffer) {
        if let Err(err) = self.allocator.lock().free(buffer.allocation) {
            log::error!(target: "vulkan", "freeing buffer allocation failed: {err}");
        }
        unsafe { self.device.raw.destroy_buffer(buffer.buffer, None) };
    }

    pub fn create_image(
        &self,
        image_info: &vk::ImageCreateInfo,
        name: &str,
    ) -> anyhow::Result<AllocatedImage> {
        let image = unsafe { self.device.raw.create_image(image_info, None) }
            .map_err(|err| anyhow!("vkCreateImage failed: {err}"))?;
        let requirements = unsafe { self.device.raw.get_image_memory_requirements(image) };

        let allocation = self
            .allocator
            .lock()
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: gpu_allocator::vulkan::AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|err| {
                unsafe { self.device.raw.destroy_image(image, None) };
                anyhow!("image allocation failed: {err}")
            })?;

        unsafe {
            self.device
                .raw
                .bind_image_memory(image, allocation.memory(), allocation.offset())
        }
        .map_err(|err| anyhow!("vkBindImageMemory failed: {err}"))?;

        Ok(AllocatedImage { image, allocation })
    }

    pub fn destroy_image(&self, image: AllocatedImage) {
        if let Err(err) = self.allocator.lock().free(image.allocation) {
            log::error!(target: "vulkan", "freeing image allocation failed: {err}");
        }
        unsafe { self.device.raw.destroy_image(image.image, None) };
    }
}
