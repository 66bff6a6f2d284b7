//! The immediate (fence-blocking) and deferred (queue-timeline-retired)
//! upload paths, both built on top of `StagingAllocator`.
//!
//! A single mutex guards each uploader's context so callers may upload
//! from any thread; both paths issue the same pre/post-copy barrier
//! pair for textures, and both use a `submit(UINT64_MAX)`/
//! `retire(UINT64_MAX)` sentinel for work that is already known
//! complete by the time it reaches the staging allocator.

use std::sync::Arc;

use ash::vk;
use lock_api::RawMutex as _;
use parking_lot::{Mutex, MutexGuard};
use rhi_types::Timeline;

use super::device::LogicalDevice;
use super::queue::CommandQueue;
use super::staging::{StagingAllocation, StagingAllocator, DEFAULT_ALIGNMENT};

/// Sentinel passed to `StagingAllocator::submit`/`retire` for uploads
/// whose completion was already observed via a fence wait, so the
/// chunk is immediately eligible for reuse.
const IMMEDIATE_COMPLETE: Timeline = Timeline(u64::MAX);

pub struct ImmediateUploader {
    device: Arc<LogicalDevice>,
    staging: Arc<StagingAllocator>,
    pool: vk::CommandPool,
    buffer: vk::CommandBuffer,
    fence: vk::Fence,
    queue: vk::Queue,
    lock: Mutex<()>,
}

impl ImmediateUploader {
    pub fn new(
        device: Arc<LogicalDevice>,
        staging: Arc<StagingAllocator>,
        queue: vk::Queue,
        queue_family_index: u32,
    ) -> anyhow::Result<Self> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family_index)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let pool = unsafe { device.raw.create_command_pool(&pool_info, None) }?;

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffer = unsafe { device.raw.allocate_command_buffers(&alloc_info) }?[0];

        let fence = unsafe { device.raw.create_fence(&vk::FenceCreateInfo::default(), None) }?;

        Ok(Self {
            device,
            staging,
            pool,
            buffer,
            fence,
            queue,
            lock: Mutex::new(()),
        })
    }

    fn begin_recording(&self) -> anyhow::Result<()> {
        unsafe {
            self.device.raw.wait_for_fences(&[self.fence], true, u64::MAX)?;
            self.device.raw.reset_fences(&[self.fence])?;
            self.device
                .raw
                .reset_command_buffer(self.buffer, vk::CommandBufferResetFlags::empty())?;
            self.device.raw.begin_command_buffer(
                self.buffer,
                &vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT),
            )?;
        }
        Ok(())
    }

    fn submit_and_wait(&self) -> anyhow::Result<()> {
        unsafe {
            self.device.raw.end_command_buffer(self.buffer)?;
            let buffers = [self.buffer];
            let submit_info = vk::SubmitInfo::default().command_buffers(&buffers);
            self.device
                .raw
                .queue_submit(self.queue, &[submit_info], self.fence)?;
            self.device.raw.wait_for_fences(&[self.fence], true, u64::MAX)?;
        }
        self.staging.submit(IMMEDIATE_COMPLETE);
        self.staging.retire(IMMEDIATE_COMPLETE);
        Ok(())
    }

    fn record_buffer_copy(&self, dst: vk::Buffer, dst_offset: u64, data: &[u8]) -> anyhow::Result<()> {
        let allocation = self.staging.allocate(data.len() as u64, DEFAULT_ALIGNMENT)?;
        copy_into_staging(&allocation, data);
        let region = vk::BufferCopy {
            src_offset: allocation.offset,
            dst_offset,
            size: data.len() as u64,
        };
        unsafe {
            self.device
                .raw
                .cmd_copy_buffer(self.buffer, allocation.buffer, dst, &[region]);
        }
        Ok(())
    }

    fn record_texture_copy(
        &self,
        dst: vk::Image,
        data: &[u8],
        width: u32,
        height: u32,
        mip_level: u32,
        array_layer: u32,
    ) -> anyhow::Result<()> {
        let allocation = self.staging.allocate(data.len() as u64, DEFAULT_ALIGNMENT)?;
        copy_into_staging(&allocation, data);

        let subresource = vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: mip_level,
            level_count: 1,
            base_array_layer: array_layer,
            layer_count: 1,
        };
        let to_transfer_dst = vk::ImageMemoryBarrier::default()
            .old_layout(vk::ImageLayout::UNDEFINED)
            .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .image(dst)
            .subresource_range(subresource);
        unsafe {
            self.device.raw.cmd_pipeline_barrier(
                self.buffer,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_transfer_dst],
            );
        }

        let region = vk::BufferImageCopy {
            buffer_offset: allocation.offset,
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level,
                base_array_layer: array_layer,
                layer_count: 1,
            },
            image_offset: vk::Offset3D::default(),
            image_extent: vk::Extent3D { width, height, depth: 1 },
        };
        unsafe {
            self.device.raw.cmd_copy_buffer_to_image(
                self.buffer,
                allocation.buffer,
                dst,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        }

        let to_shader_read = vk::ImageMemoryBarrier::default()
            .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .dst_access_mask(vk::AccessFlags::SHADER_READ)
            .image(dst)
            .subresource_range(subresource);
        unsafe {
            self.device.raw.cmd_pipeline_barrier(
                self.buffer,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_shader_read],
            );
        }
        Ok(())
    }

    pub fn upload_buffer(&self, dst: vk::Buffer, dst_offset: u64, data: &[u8]) -> anyhow::Result<()> {
        let _guard = self.lock.lock();
        self.begin_recording()?;
        self.record_buffer_copy(dst, dst_offset, data)?;
        self.submit_and_wait()
    }

    pub fn upload_texture(
        &self,
        dst: vk::Image,
        data: &[u8],
        width: u32,
        height: u32,
        mip_level: u32,
        array_layer: u32,
    ) -> anyhow::Result<()> {
        let _guard = self.lock.lock();
        self.begin_recording()?;
        self.record_texture_copy(dst, data, width, height, mip_level, array_layer)?;
        self.submit_and_wait()
    }

    /// Opens a batch: every `upload_*` call on the returned guard
    /// records into the same command buffer; dropping or calling
    /// `.end()` submits once and waits, amortizing fence cost across
    /// multiple uploads.
    pub fn begin_batch(&self) -> anyhow::Result<ImmediateBatch<'_>> {
        let guard = self.lock.lock();
        self.begin_recording()?;
        Ok(ImmediateBatch { uploader: self, _guard: guard, ended: false })
    }

    /// Manual-pair variant of `begin_batch` for callers that cross an
    /// FFI-shaped boundary (`Backend::begin_immediate_batch`/
    /// `end_immediate_batch`) where the guard can't be threaded through
    /// as a borrow. Locks `self.lock`'s raw mutex directly; the matching
    /// `end_batch_manual` call is responsible for unlocking it.
    pub fn begin_batch_manual(&self) -> anyhow::Result<()> {
        unsafe { self.lock.raw().lock() };
        if let Err(err) = self.begin_recording() {
            unsafe { self.lock.raw().unlock() };
            return Err(err);
        }
        Ok(())
    }

    /// Must only be called while `begin_batch_manual` holds the lock.
    pub fn record_buffer_copy_locked(&self, dst: vk::Buffer, dst_offset: u64, data: &[u8]) -> anyhow::Result<()> {
        self.record_buffer_copy(dst, dst_offset, data)
    }

    pub fn record_texture_copy_locked(
        &self,
        dst: vk::Image,
        data: &[u8],
        width: u32,
        height: u32,
        mip_level: u32,
        array_layer: u32,
    ) -> anyhow::Result<()> {
        self.record_texture_copy(dst, data, width, height, mip_level, array_layer)
    }

    pub fn end_batch_manual(&self) -> anyhow::Result<()> {
        let result = self.submit_and_wait();
        unsafe { self.lock.raw().unlock() };
        result
    }
}

pub struct ImmediateBatch<'a> {
    uploader: &'a ImmediateUploader,
    _guard: MutexGuard<'a, ()>,
    ended: bool,
}

impl<'a> ImmediateBatch<'a> {
    pub fn upload_buffer(&mut self, dst: vk::Buffer, dst_offset: u64, data: &[u8]) -> anyhow::Result<()> {
        self.uploader.record_buffer_copy(dst, dst_offset, data)
    }

    pub fn upload_texture(
        &mut self,
        dst: vk::Image,
        data: &[u8],
        width: u32,
        height: u32,
        mip_level: u32,
        array_layer: u32,
    ) -> anyhow::Result<()> {
        self.uploader
            .record_texture_copy(dst, data, width, height, mip_level, array_layer)
    }

    pub fn end(mut self) -> anyhow::Result<()> {
        self.ended = true;
        self.uploader.submit_and_wait()
    }
}

impl Drop for ImmediateBatch<'_> {
    fn drop(&mut self) {
        if !self.ended {
            if let Err(err) = self.uploader.submit_and_wait() {
                log::error!(target: "vulkan", "immediate batch submit on drop failed: {err}");
            }
        }
    }
}

impl Drop for ImmediateUploader {
    fn drop(&mut self) {
        unsafe {
            self.device.raw.destroy_fence(self.fence, None);
            self.device.raw.destroy_command_pool(self.pool, None);
        }
    }
}

fn copy_into_staging(allocation: &StagingAllocation, data: &[u8]) {
    unsafe {
        std::ptr::copy_nonoverlapping(data.as_ptr(), allocation.ptr, data.len());
    }
}

struct PendingBufferUpload {
    staging_buffer: vk::Buffer,
    staging_offset: u64,
    dst: vk::Buffer,
    dst_offset: u64,
    size: u64,
}

struct PendingTextureUpload {
    staging_buffer: vk::Buffer,
    staging_offset: u64,
    dst: vk::Image,
    width: u32,
    height: u32,
    mip_level: u32,
    array_layer: u32,
}

#[derive(Default)]
struct PendingQueues {
    buffers: Vec<PendingBufferUpload>,
    textures: Vec<PendingTextureUpload>,
}

pub struct DeferredUploader {
    device: Arc<LogicalDevice>,
    staging: Arc<StagingAllocator>,
    pool: vk::CommandPool,
    buffer: vk::CommandBuffer,
    pending: Mutex<PendingQueues>,
}

impl DeferredUploader {
    pub fn new(device: Arc<LogicalDevice>, staging: Arc<StagingAllocator>, queue_family_index: u32) -> anyhow::Result<Self> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family_index)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let pool = unsafe { device.raw.create_command_pool(&pool_info, None) }?;
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffer = unsafe { device.raw.allocate_command_buffers(&alloc_info) }?[0];

        Ok(Self {
            device,
            staging,
            pool,
            buffer,
            pending: Mutex::new(PendingQueues::default()),
        })
    }

    pub fn queue_buffer_upload(&self, dst: vk::Buffer, dst_offset: u64, data: &[u8]) -> anyhow::Result<()> {
        let allocation = self.staging.allocate(data.len() as u64, DEFAULT_ALIGNMENT)?;
        copy_into_staging(&allocation, data);
        self.pending.lock().buffers.push(PendingBufferUpload {
            staging_buffer: allocation.buffer,
            staging_offset: allocation.offset,
            dst,
            dst_offset,
            size: data.len() as u64,
        });
        Ok(())
    }

    pub fn queue_texture_upload(
        &self,
        dst: vk::Image,
        data: &[u8],
        width: u32,
        height: u32,
        mip_level: u32,
        array_layer: u32,
    ) -> anyhow::Result<()> {
        let allocation = self.staging.allocate(data.len() as u64, DEFAULT_ALIGNMENT)?;
        copy_into_staging(&allocation, data);
        self.pending.lock().textures.push(PendingTextureUpload {
            staging_buffer: allocation.buffer,
            staging_offset: allocation.offset,
            dst,
            width,
            height,
            mip_level,
            array_layer,
        });
        Ok(())
    }

    /// Records every pending copy into one command buffer and submits
    /// it on `queue`, returning the timeline value that retires the
    /// staging chunks it used.
    pub fn flush(&self, queue: &CommandQueue) -> anyhow::Result<Timeline> {
        let mut pending = self.pending.lock();
        if pending.buffers.is_empty() && pending.textures.is_empty() {
            return Ok(queue.submitted());
        }

        unsafe {
            self.device
                .raw
                .reset_command_buffer(self.buffer, vk::CommandBufferResetFlags::empty())?;
            self.device.raw.begin_command_buffer(
                self.buffer,
                &vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT),
            )?;

            for upload in &pending.buffers {
                let region = vk::BufferCopy {
                    src_offset: upload.staging_offset,
                    dst_offset: upload.dst_offset,
                    size: upload.size,
                };
                self.device
                    .raw
                    .cmd_copy_buffer(self.buffer, upload.staging_buffer, upload.dst, &[region]);
            }

            for upload in &pending.textures {
                let subresource = vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: upload.mip_level,
                    level_count: 1,
                    base_array_layer: upload.array_layer,
                    layer_count: 1,
                };
                let to_transfer_dst = vk::ImageMemoryBarrier::default()
                    .old_layout(vk::ImageLayout::UNDEFINED)
                    .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                    .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                    .image(upload.dst)
                    .subresource_range(subresource);
                self.device.raw.cmd_pipeline_barrier(
                    self.buffer,
                    vk::PipelineStageFlags::TOP_OF_PIPE,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[to_transfer_dst],
                );

                let region = vk::BufferImageCopy {
                    buffer_offset: upload.staging_offset,
                    buffer_row_length: 0,
                    buffer_image_height: 0,
                    image_subresource: vk::ImageSubresourceLayers {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        mip_level: upload.mip_level,
                        base_array_layer: upload.array_layer,
                        layer_count: 1,
                    },
                    image_offset: vk::Offset3D::default(),
                    image_extent: vk::Extent3D { width: upload.width, height: upload.height, depth: 1 },
                };
                self.device.raw.cmd_copy_buffer_to_image(
                    self.buffer,
                    upload.staging_buffer,
                    upload.dst,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region],
                );

                let to_shader_read = vk::ImageMemoryBarrier::default()
                    .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                    .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                    .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                    .dst_access_mask(vk::AccessFlags::SHADER_READ)
                    .image(upload.dst)
                    .subresource_range(subresource);
                self.device.raw.cmd_pipeline_barrier(
                    self.buffer,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::FRAGMENT_SHADER,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[to_shader_read],
                );
            }

            self.device.raw.end_command_buffer(self.buffer)?;
        }

        let request = super::queue::SubmitRequest {
            command_buffers: &[self.buffer],
            dependencies: &[],
            swapchain_sync: None,
        };
        let timeline = queue.submit(&self.device.raw, &request)?;
        self.staging.submit(timeline);

        pending.buffers.clear();
        pending.textures.clear();
        Ok(timeline)
    }

    pub fn retire(&self, completed: Timeline) {
        self.staging.retire(completed);
    }
}

impl Drop for DeferredUploader {
    fn drop(&mut self) {
        unsafe { self.device.raw.destroy_command_pool(self.pool, None) };
    }
}
