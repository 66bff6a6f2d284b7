//! One timeline semaphore per `CommandQueue`, a submit-time wait/signal
//! dependency graph built from scratch arrays, and the swapchain's
//! binary-semaphore acquire/present pair.

use std::sync::atomic::{AtomicU64, Ordering};

use ash::vk;
use rhi_types::{QueueDependency, QueueType, Timeline};

/// Holds no `ash::Device` of its own — every method that needs the
/// device takes `&ash::Device` from the caller, so this type cannot
/// wait on in-flight work from its own `Drop`. `VulkanBackend::shutdown`
/// wait-idles every queue before the device is torn down; that call
/// order, not a destructor here, is what keeps orphaned work from
/// racing queue/device destruction.
pub struct CommandQueue {
    pub raw: vk::Queue,
    pub family_index: u32,
    pub queue_type: QueueType,
    pub timeline_semaphore: vk::Semaphore,
    submitted: AtomicU64,
    completed_cache: AtomicU64,
}

/// A swapchain's per-frame binary semaphore pair, supplied to `submit`
/// only for the submission that acquires/presents that frame.
#[derive(Debug, Clone, Copy)]
pub struct SwapchainSync {
    pub image_available: vk::Semaphore,
    pub render_complete: vk::Semaphore,
}

pub struct SubmitRequest<'a> {
    pub command_buffers: &'a [vk::CommandBuffer],
    pub dependencies: &'a [(QueueDependency, vk::Semaphore)],
    pub swapchain_sync: Option<SwapchainSync>,
}

impl CommandQueue {
    pub fn new(raw: vk::Queue, family_index: u32, queue_type: QueueType, timeline_semaphore: vk::Semaphore) -> Self {
        Self {
            raw,
            family_index,
            queue_type,
            timeline_semaphore,
            submitted: AtomicU64::new(0),
            completed_cache: AtomicU64::new(0),
        }
    }

    /// Builds the aggregate wait/signal arrays and issues one
    /// `vkQueueSubmit2` (conceptually — `ash`'s `queue_submit2` with a
    /// `VkSubmitInfo2`), matching §4.K steps 1-5. Returns the new
    /// timeline value (step 6).
    pub fn submit(&self, device: &ash::Device, request: &SubmitRequest) -> anyhow::Result<Timeline> {
        let new_value = self.submitted.fetch_add(1, Ordering::AcqRel) + 1;

        let mut wait_infos = Vec::with_capacity(request.dependencies.len() + 1);
        for (dependency, semaphore) in request.dependencies {
            let value = dependency.wait_value.unwrap_or(new_value);
            wait_infos.push(
                vk::SemaphoreSubmitInfo::default()
                    .semaphore(*semaphore)
                    .value(value)
                    .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS),
            );
        }
        if let Some(sync) = request.swapchain_sync {
            wait_infos.push(
                vk::SemaphoreSubmitInfo::default()
                    .semaphore(sync.image_available)
                    .stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT),
            );
        }

        let mut signal_infos = vec![vk::SemaphoreSubmitInfo::default()
            .semaphore(self.timeline_semaphore)
            .value(new_value)
            .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)];
        if let Some(sync) = request.swapchain_sync {
            signal_infos.push(
                vk::SemaphoreSubmitInfo::default()
                    .semaphore(sync.render_complete)
                    .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS),
            );
        }

        let buffer_infos: Vec<vk::CommandBufferSubmitInfo> = request
            .command_buffers
            .iter()
            .map(|&cmd| vk::CommandBufferSubmitInfo::default().command_buffer(cmd))
            .collect();

        let submit_info = vk::SubmitInfo2::default()
            .wait_semaphore_infos(&wait_infos)
            .signal_semaphore_infos(&signal_infos)
            .command_buffer_infos(&buffer_infos);

        unsafe { device.queue_submit2(self.raw, &[submit_info], vk::Fence::null()) }
            .map_err(|err| anyhow::anyhow!("vkQueueSubmit2 failed: {err}"))?;

        Ok(Timeline(new_value))
    }

    pub fn wait(&self, device: &ash::Device, timeline: Timeline, timeout_ns: u64) -> bool {
        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(std::slice::from_ref(&self.timeline_semaphore))
            .values(std::slice::from_ref(&timeline.0));
        match unsafe { device.wait_semaphores(&wait_info, timeout_ns) } {
            Ok(()) => {
                self.refresh_completed(device);
                true
            }
            Err(vk::Result::TIMEOUT) => false,
            Err(err) => {
                log::error!(target: "vulkan", "vkWaitSemaphores failed: {err}");
                false
            }
        }
    }

    pub fn wait_idle(&self, device: &ash::Device) {
        let submitted = Timeline(self.submitted.load(Ordering::Acquire));
        if submitted.0 > 0 {
            self.wait(device, submitted, u64::MAX);
        }
    }

    fn refresh_completed(&self, device: &ash::Device) {
        match unsafe { device.get_semaphore_counter_value(self.timeline_semaphore) } {
            Ok(value) => self.completed_cache.store(value, Ordering::Release),
            Err(err) => log::error!(target: "vulkan", "vkGetSemaphoreCounterValue failed: {err}"),
        }
    }

    pub fn poll(&self, device: &ash::Device, timeline: Timeline) -> bool {
        self.refresh_completed(device);
        timeline.is_reached(Timeline(self.completed_cache.load(Ordering::Acquire)))
    }

    pub fn completed(&self, device: &ash::Device) -> Timeline {
        self.refresh_completed(device);
        Timeline(self.completed_cache.load(Ordering::Acquire))
    }

    pub fn submitted(&self) -> Timeline {
        Timeline(self.submitted.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeline_is_reached_is_inclusive() {
        assert!(Timeline(3).is_reached(Timeline(3)));
        assert!(Timeline(2).is_reached(Timeline(3)));
        assert!(!Timeline(4).is_reached(Timeline(3)));
    }
}
